//! C6: the in-memory authoritative issue model (spec.md §4.6).
//!
//! Grounded on the teacher's `SqliteStorage` CRUD surface
//! (`insert`/`get`/`update`/`delete`/`list_issues`), generalized from a
//! SQL-backed store into a JSONL-backed one: the state here is a plain
//! `Vec<Issue>` plus an id→index map, not a database connection.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{BeadsError, Result};
use crate::jsonl;
use crate::model::{Comment, Dependency, Issue, IssueType, Priority, Status};
use crate::util::content_hash;

/// Ordering key for [`Filters::order_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    #[default]
    CreatedAt,
    UpdatedAt,
    Priority,
}

/// Query filters for [`IssueStore::list`] (spec.md §4.6 "Filters").
///
/// `Default` is implemented by hand, not derived: spec.md §4.6 mandates
/// `order_desc=true` as the default, which `bool::default()` cannot give us.
#[derive(Debug, Clone)]
pub struct Filters {
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub issue_type: Option<IssueType>,
    pub assignee: Option<String>,
    pub label: Option<String>,
    pub include_tombstones: bool,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub order_by: OrderBy,
    pub order_desc: bool,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            status: None,
            priority: None,
            issue_type: None,
            assignee: None,
            label: None,
            include_tombstones: false,
            limit: None,
            offset: None,
            order_by: OrderBy::default(),
            order_desc: true,
        }
    }
}

impl Filters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn matches(&self, issue: &Issue) -> bool {
        if !self.include_tombstones && issue.status == Status::Tombstone {
            return false;
        }
        if let Some(status) = &self.status {
            if issue.status != *status {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if issue.priority != priority {
                return false;
            }
        }
        if let Some(issue_type) = &self.issue_type {
            if issue.issue_type != *issue_type {
                return false;
            }
        }
        if let Some(assignee) = &self.assignee {
            if issue.assignee.as_deref() != Some(assignee.as_str()) {
                return false;
            }
        }
        if let Some(label) = &self.label {
            if !issue.labels.iter().any(|l| l == label) {
                return false;
            }
        }
        true
    }
}

/// A partial update applied by [`IssueStore::update`]. `None` leaves a
/// field untouched; for `Option<T>` issue fields, `Some(None)` clears
/// the field and `Some(Some(value))` replaces it.
#[derive(Debug, Clone, Default)]
pub struct IssueUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub design: Option<Option<String>>,
    pub acceptance_criteria: Option<Option<String>>,
    pub notes: Option<Option<String>>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub issue_type: Option<IssueType>,
    pub assignee: Option<Option<String>>,
    pub owner: Option<Option<String>>,
    pub estimated_minutes: Option<Option<i32>>,
    pub closed_at: Option<Option<DateTime<Utc>>>,
    pub close_reason: Option<Option<String>>,
    pub due_at: Option<Option<DateTime<Utc>>>,
    pub defer_until: Option<Option<DateTime<Utc>>>,
    pub external_ref: Option<Option<String>>,
    pub source_system: Option<Option<String>>,
    pub pinned: Option<bool>,
    pub is_template: Option<bool>,
}

/// How [`IssueStore::count`] groups its per-group totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountGroupBy {
    Status,
    IssueType,
    Priority,
    Assignee,
}

/// The in-memory authoritative issue store: an ordered sequence of
/// issues, an id→index map, and dirty tracking, bound to one JSONL
/// path (spec.md §4.6 "State").
pub struct IssueStore {
    issues: Vec<Issue>,
    index: HashMap<String, usize>,
    dirty_at: HashMap<String, i64>,
    dirty: bool,
    path: PathBuf,
}

impl IssueStore {
    /// Create an empty store bound to `path`. Call [`IssueStore::load_from_file`]
    /// to populate it from disk.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            issues: Vec::new(),
            index: HashMap::new(),
            dirty_at: HashMap::new(),
            dirty: false,
            path: path.into(),
        }
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .issues
            .iter()
            .enumerate()
            .map(|(idx, issue)| (issue.id.clone(), idx))
            .collect();
    }

    fn mark_dirty(&mut self, id: &str, now: i64) {
        self.dirty = true;
        self.dirty_at.insert(id.to_string(), now);
    }

    /// Replace in-memory state with the contents of the bound JSONL
    /// file. Clears the dirty flag and dirty set on success.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be mapped or contains a
    /// malformed line (spec.md §9: abort-on-parse-error policy).
    pub fn load_from_file(&mut self) -> Result<()> {
        self.issues = jsonl::read_all(&self.path)?;
        self.rebuild_index();
        self.dirty = false;
        self.dirty_at.clear();
        tracing::debug!(count = self.issues.len(), "loaded issues from file");
        Ok(())
    }

    /// Persist in-memory state to the bound JSONL file. Clears the
    /// dirty flag and dirty set on success.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the atomic write fails.
    pub fn save_to_file(&mut self) -> Result<()> {
        jsonl::write_all(&self.path, &self.issues)?;
        self.dirty = false;
        self.dirty_at.clear();
        tracing::debug!(count = self.issues.len(), "saved issues to file");
        Ok(())
    }

    /// The JSONL path this store is bound to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert `issue`, failing if its id is already present.
    ///
    /// # Errors
    ///
    /// Returns [`BeadsError::DuplicateId`] if the id exists, or
    /// [`BeadsError::InvalidPriority`] if its priority is out of range.
    pub fn insert(&mut self, mut issue: Issue) -> Result<()> {
        if self.index.contains_key(&issue.id) {
            return Err(BeadsError::DuplicateId { id: issue.id });
        }
        if !issue.priority.is_valid() {
            return Err(BeadsError::InvalidPriority {
                priority: issue.priority.0,
            });
        }
        issue.content_hash = Some(content_hash(&issue));
        let now = issue.updated_at.timestamp();
        let id = issue.id.clone();
        self.index.insert(id.clone(), self.issues.len());
        self.issues.push(issue);
        self.mark_dirty(&id, now);
        Ok(())
    }

    /// An owned deep copy of the issue with `id`, if present.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Issue> {
        self.get_ref(id).cloned()
    }

    /// A non-owning reference to the issue with `id`, if present.
    /// Invalid after any mutation of the store — do not retain past a
    /// subsequent `&mut self` call.
    #[must_use]
    pub fn get_ref(&self, id: &str) -> Option<&Issue> {
        self.index.get(id).map(|&idx| &self.issues[idx])
    }

    /// Apply a partial update to the issue with `id`, stamping
    /// `updated_at = now`.
    ///
    /// # Errors
    ///
    /// Returns [`BeadsError::IssueNotFound`] if `id` is absent, or
    /// [`BeadsError::InvalidPriority`] if the update sets an
    /// out-of-range priority.
    pub fn update(&mut self, id: &str, update: IssueUpdate, now: DateTime<Utc>) -> Result<()> {
        let idx = *self
            .index
            .get(id)
            .ok_or_else(|| BeadsError::IssueNotFound { id: id.to_string() })?;

        if let Some(priority) = update.priority {
            if !priority.is_valid() {
                return Err(BeadsError::InvalidPriority { priority: priority.0 });
            }
        }

        let issue = &mut self.issues[idx];
        if let Some(title) = update.title {
            issue.title = title;
        }
        if let Some(description) = update.description {
            issue.description = description;
        }
        if let Some(design) = update.design {
            issue.design = design;
        }
        if let Some(acceptance_criteria) = update.acceptance_criteria {
            issue.acceptance_criteria = acceptance_criteria;
        }
        if let Some(notes) = update.notes {
            issue.notes = notes;
        }
        if let Some(status) = update.status {
            issue.status = status;
        }
        if let Some(priority) = update.priority {
            issue.priority = priority;
        }
        if let Some(issue_type) = update.issue_type {
            issue.issue_type = issue_type;
        }
        if let Some(assignee) = update.assignee {
            issue.assignee = assignee;
        }
        if let Some(owner) = update.owner {
            issue.owner = owner;
        }
        if let Some(estimated_minutes) = update.estimated_minutes {
            issue.estimated_minutes = estimated_minutes;
        }
        if let Some(closed_at) = update.closed_at {
            issue.closed_at = closed_at;
        }
        if let Some(close_reason) = update.close_reason {
            issue.close_reason = close_reason;
        }
        if let Some(due_at) = update.due_at {
            issue.due_at = due_at;
        }
        if let Some(defer_until) = update.defer_until {
            issue.defer_until = defer_until;
        }
        if let Some(external_ref) = update.external_ref {
            issue.external_ref = external_ref;
        }
        if let Some(source_system) = update.source_system {
            issue.source_system = source_system;
        }
        if let Some(pinned) = update.pinned {
            issue.pinned = pinned;
        }
        if let Some(is_template) = update.is_template {
            issue.is_template = is_template;
        }
        issue.updated_at = now;
        issue.content_hash = Some(content_hash(issue));

        self.mark_dirty(id, now.timestamp());
        Ok(())
    }

    /// Soft-delete the issue with `id`: equivalent to `update` with
    /// `status = Tombstone`.
    ///
    /// # Errors
    ///
    /// Returns [`BeadsError::IssueNotFound`] if `id` is absent.
    pub fn delete(&mut self, id: &str, now: DateTime<Utc>) -> Result<()> {
        self.update(
            id,
            IssueUpdate {
                status: Some(Status::Tombstone),
                ..IssueUpdate::default()
            },
            now,
        )
    }

    /// Append `label` to the issue with `id`, unless already present.
    ///
    /// # Errors
    ///
    /// Returns [`BeadsError::IssueNotFound`] if `id` is absent.
    pub fn add_label(&mut self, id: &str, label: impl Into<String>) -> Result<()> {
        let idx = *self
            .index
            .get(id)
            .ok_or_else(|| BeadsError::IssueNotFound { id: id.to_string() })?;
        let label = label.into();
        let issue = &mut self.issues[idx];
        if !issue.labels.contains(&label) {
            issue.labels.push(label);
            self.mark_dirty(id, Utc::now().timestamp());
        }
        Ok(())
    }

    /// Remove `label` from the issue with `id`, preserving the order
    /// of the rest. No-op if absent.
    ///
    /// # Errors
    ///
    /// Returns [`BeadsError::IssueNotFound`] if `id` is absent.
    pub fn remove_label(&mut self, id: &str, label: &str) -> Result<()> {
        let idx = *self
            .index
            .get(id)
            .ok_or_else(|| BeadsError::IssueNotFound { id: id.to_string() })?;
        let issue = &mut self.issues[idx];
        let before = issue.labels.len();
        issue.labels.retain(|l| l != label);
        if issue.labels.len() != before {
            self.mark_dirty(id, Utc::now().timestamp());
        }
        Ok(())
    }

    /// Append `comment` to the issue with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`BeadsError::IssueNotFound`] if `id` is absent.
    pub fn add_comment(&mut self, id: &str, comment: Comment) -> Result<()> {
        let idx = *self
            .index
            .get(id)
            .ok_or_else(|| BeadsError::IssueNotFound { id: id.to_string() })?;
        self.issues[idx].comments.push(comment);
        self.mark_dirty(id, Utc::now().timestamp());
        Ok(())
    }

    /// Append `dependency` to the issue with `id`, respecting the
    /// uniqueness invariant on `(issue_id, depends_on_id, dep_type)`
    /// (spec.md §3 "Dependency").
    ///
    /// # Errors
    ///
    /// Returns [`BeadsError::IssueNotFound`] if `id` is absent, or
    /// [`BeadsError::DuplicateDependency`] if an equal-keyed dependency
    /// is already present.
    pub fn add_dependency(&mut self, id: &str, dependency: Dependency) -> Result<()> {
        let idx = *self
            .index
            .get(id)
            .ok_or_else(|| BeadsError::IssueNotFound { id: id.to_string() })?;
        let issue = &mut self.issues[idx];
        let conflict = issue.dependencies.iter().any(|d| {
            d.issue_id == dependency.issue_id
                && d.depends_on_id == dependency.depends_on_id
                && d.dep_type == dependency.dep_type
        });
        if conflict {
            return Err(BeadsError::DuplicateDependency {
                issue_id: dependency.issue_id,
                depends_on_id: dependency.depends_on_id,
                dep_type: dependency.dep_type.as_str().to_string(),
            });
        }
        issue.dependencies.push(dependency);
        self.mark_dirty(id, Utc::now().timestamp());
        Ok(())
    }

    /// Remove the dependency keyed `(issue_id, depends_on_id, dep_type)`
    /// from `id`'s dependency list, preserving the order of the rest.
    /// No-op if absent.
    ///
    /// # Errors
    ///
    /// Returns [`BeadsError::IssueNotFound`] if `id` is absent.
    pub fn remove_dependency(
        &mut self,
        id: &str,
        depends_on_id: &str,
        dep_type: &crate::model::DependencyType,
    ) -> Result<()> {
        let idx = *self
            .index
            .get(id)
            .ok_or_else(|| BeadsError::IssueNotFound { id: id.to_string() })?;
        let issue = &mut self.issues[idx];
        let before = issue.dependencies.len();
        issue
            .dependencies
            .retain(|d| !(d.depends_on_id == depends_on_id && d.dep_type == *dep_type));
        if issue.dependencies.len() != before {
            self.mark_dirty(id, Utc::now().timestamp());
        }
        Ok(())
    }

    /// An owned copy of `id`'s dependencies.
    ///
    /// # Errors
    ///
    /// Returns [`BeadsError::IssueNotFound`] if `id` is absent.
    pub fn get_dependencies(&self, id: &str) -> Result<Vec<Dependency>> {
        self.get_ref(id)
            .map(|issue| issue.dependencies.clone())
            .ok_or_else(|| BeadsError::IssueNotFound { id: id.to_string() })
    }

    /// An owned copy of `id`'s comments.
    ///
    /// # Errors
    ///
    /// Returns [`BeadsError::IssueNotFound`] if `id` is absent.
    pub fn get_comments(&self, id: &str) -> Result<Vec<Comment>> {
        self.get_ref(id)
            .map(|issue| issue.comments.clone())
            .ok_or_else(|| BeadsError::IssueNotFound { id: id.to_string() })
    }

    /// List issues matching `filters`, sorted and paged per spec.md
    /// §4.6 "Sort": unstable-sort-acceptable with insertion-order
    /// tie-break, applied before offset/limit.
    #[must_use]
    pub fn list(&self, filters: &Filters) -> Vec<Issue> {
        let mut matched: Vec<&Issue> = self
            .issues
            .iter()
            .filter(|issue| filters.matches(issue))
            .collect();

        matched.sort_by(|a, b| {
            let ordering = match filters.order_by {
                OrderBy::CreatedAt => a.created_at.cmp(&b.created_at),
                OrderBy::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                OrderBy::Priority => a.priority.cmp(&b.priority),
            };
            if filters.order_desc {
                ordering.reverse()
            } else {
                ordering
            }
        });

        let offset = filters.offset.unwrap_or(0);
        let iter = matched.into_iter().skip(offset);
        match filters.limit {
            Some(limit) => iter.take(limit).cloned().collect(),
            None => iter.cloned().collect(),
        }
    }

    /// Per-group counts, always excluding tombstones. `None` groups
    /// everything under `"total"`.
    #[must_use]
    pub fn count(&self, group_by: Option<CountGroupBy>) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for issue in self.issues.iter().filter(|i| i.status != Status::Tombstone) {
            let key = match group_by {
                None => "total".to_string(),
                Some(CountGroupBy::Status) => issue.status.as_str().to_string(),
                Some(CountGroupBy::IssueType) => issue.issue_type.as_str().to_string(),
                Some(CountGroupBy::Priority) => issue.priority.to_string(),
                Some(CountGroupBy::Assignee) => issue
                    .assignee
                    .clone()
                    .unwrap_or_else(|| "unassigned".to_string()),
            };
            *counts.entry(key).or_insert(0) += 1;
        }
        counts
    }

    /// Fuzzy "did you mean" suggestions for `target`, scored per
    /// spec.md §4.6 "Similar-ID scoring", tombstones excluded, top
    /// `max_count` by score descending.
    #[must_use]
    pub fn find_similar_ids(&self, target: &str, max_count: usize) -> Vec<Issue> {
        let mut scored: Vec<(i64, &Issue)> = self
            .issues
            .iter()
            .filter(|issue| issue.status != Status::Tombstone)
            .map(|issue| (similarity_score(target, &issue.id), issue))
            .filter(|(score, _)| *score > 0)
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored
            .into_iter()
            .take(max_count)
            .map(|(_, issue)| issue.clone())
            .collect()
    }

    /// Whether `id` is present.
    #[must_use]
    pub fn exists(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Whether any mutation has occurred since the last load/save.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// An owned snapshot of every dirtied id.
    #[must_use]
    pub fn get_dirty_ids(&self) -> Vec<String> {
        self.dirty_at.keys().cloned().collect()
    }

    /// Remove one id from the dirty set.
    pub fn clear_dirty(&mut self, id: &str) {
        self.dirty_at.remove(id);
        if self.dirty_at.is_empty() {
            self.dirty = false;
        }
    }

    /// Total issue count, excluding tombstones.
    #[must_use]
    pub fn count_total(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.status != Status::Tombstone)
            .count()
    }
}

fn similarity_score(target: &str, candidate: &str) -> i64 {
    let mut score: i64 = 0;

    if candidate.starts_with(target) {
        score += 100;
    } else if target.starts_with(candidate) {
        score += 80;
    }

    let common_prefix = target
        .chars()
        .zip(candidate.chars())
        .take_while(|(a, b)| a == b)
        .count();
    score += 5 * i64::try_from(common_prefix).unwrap_or(0);

    if candidate.contains(target) {
        score += 30;
    }

    let len_diff = (target.chars().count() as i64 - candidate.chars().count() as i64).abs();
    if len_diff <= 2 {
        score += 10;
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IssueType;
    use chrono::TimeZone;

    fn at(epoch: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(epoch, 0).unwrap()
    }

    fn issue(id: &str, created: i64) -> Issue {
        Issue {
            id: id.to_string(),
            content_hash: None,
            title: "Title".to_string(),
            description: None,
            design: None,
            acceptance_criteria: None,
            notes: None,
            status: Status::Open,
            priority: Priority::MEDIUM,
            issue_type: IssueType::Task,
            assignee: None,
            owner: None,
            estimated_minutes: None,
            created_at: at(created),
            updated_at: at(created),
            closed_at: None,
            close_reason: None,
            due_at: None,
            defer_until: None,
            external_ref: None,
            source_system: None,
            pinned: false,
            is_template: false,
            labels: vec![],
            dependencies: vec![],
            comments: vec![],
        }
    }

    #[test]
    fn insert_then_get_round_trips() {
        let mut store = IssueStore::new("/tmp/does-not-matter.jsonl");
        store.insert(issue("bd-1", 1000)).unwrap();
        assert_eq!(store.get("bd-1").unwrap().title, "Title");
        assert!(store.is_dirty());
        assert_eq!(store.get_dirty_ids(), vec!["bd-1".to_string()]);
    }

    #[test]
    fn insert_computes_content_hash() {
        let mut store = IssueStore::new("/tmp/does-not-matter.jsonl");
        store.insert(issue("bd-1", 1000)).unwrap();
        let stored = store.get("bd-1").unwrap();
        assert_eq!(
            stored.content_hash.as_deref(),
            Some(crate::util::content_hash(&stored).as_str())
        );
    }

    #[test]
    fn update_recomputes_content_hash() {
        let mut store = IssueStore::new("/tmp/does-not-matter.jsonl");
        store.insert(issue("bd-1", 1000)).unwrap();
        let before = store.get("bd-1").unwrap().content_hash;

        store
            .update(
                "bd-1",
                IssueUpdate {
                    title: Some("A different title".to_string()),
                    ..IssueUpdate::default()
                },
                at(2000),
            )
            .unwrap();

        let after = store.get("bd-1").unwrap();
        assert_ne!(after.content_hash, before);
        assert_eq!(
            after.content_hash.as_deref(),
            Some(crate::util::content_hash(&after).as_str())
        );
    }

    #[test]
    fn insert_duplicate_id_fails() {
        let mut store = IssueStore::new("/tmp/does-not-matter.jsonl");
        store.insert(issue("bd-1", 1000)).unwrap();
        let err = store.insert(issue("bd-1", 2000)).unwrap_err();
        assert!(matches!(err, BeadsError::DuplicateId { .. }));
    }

    #[test]
    fn insert_rejects_invalid_priority() {
        let mut store = IssueStore::new("/tmp/does-not-matter.jsonl");
        let mut bad = issue("bd-1", 1000);
        bad.priority = Priority(9);
        let err = store.insert(bad).unwrap_err();
        assert!(matches!(err, BeadsError::InvalidPriority { .. }));
    }

    #[test]
    fn update_bumps_updated_at_and_marks_dirty() {
        let mut store = IssueStore::new("/tmp/does-not-matter.jsonl");
        store.insert(issue("bd-1", 1000)).unwrap();
        store.clear_dirty("bd-1");

        store
            .update(
                "bd-1",
                IssueUpdate {
                    title: Some("New title".to_string()),
                    ..IssueUpdate::default()
                },
                at(2000),
            )
            .unwrap();

        let updated = store.get("bd-1").unwrap();
        assert_eq!(updated.title, "New title");
        assert_eq!(updated.updated_at, at(2000));
        assert!(updated.updated_at >= updated.created_at);
        assert!(store.is_dirty());
    }

    #[test]
    fn update_missing_id_fails() {
        let mut store = IssueStore::new("/tmp/does-not-matter.jsonl");
        let err = store
            .update("bd-missing", IssueUpdate::default(), at(1000))
            .unwrap_err();
        assert!(matches!(err, BeadsError::IssueNotFound { .. }));
    }

    #[test]
    fn delete_is_idempotent_tombstone_transition() {
        let mut store = IssueStore::new("/tmp/does-not-matter.jsonl");
        store.insert(issue("bd-1", 1000)).unwrap();
        store.delete("bd-1", at(2000)).unwrap();
        store.delete("bd-1", at(3000)).unwrap();

        let deleted = store.get("bd-1").unwrap();
        assert_eq!(deleted.status, Status::Tombstone);
        assert_eq!(deleted.updated_at, at(3000));
    }

    #[test]
    fn list_excludes_tombstones_by_default() {
        let mut store = IssueStore::new("/tmp/does-not-matter.jsonl");
        store.insert(issue("bd-1", 1000)).unwrap();
        store.delete("bd-1", at(2000)).unwrap();

        assert!(store.list(&Filters::new()).is_empty());
        assert_eq!(
            store
                .list(&Filters {
                    include_tombstones: true,
                    ..Filters::new()
                })
                .len(),
            1
        );
    }

    #[test]
    fn list_applies_filters_order_and_paging() {
        let mut store = IssueStore::new("/tmp/does-not-matter.jsonl");
        store.insert(issue("bd-1", 1000)).unwrap();
        store.insert(issue("bd-2", 2000)).unwrap();
        store.insert(issue("bd-3", 3000)).unwrap();

        let results = store.list(&Filters {
            order_by: OrderBy::CreatedAt,
            order_desc: true,
            limit: Some(2),
            ..Filters::new()
        });
        assert_eq!(
            results.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
            vec!["bd-3", "bd-2"]
        );
    }

    #[test]
    fn labels_are_idempotent_and_order_preserving() {
        let mut store = IssueStore::new("/tmp/does-not-matter.jsonl");
        store.insert(issue("bd-1", 1000)).unwrap();
        store.add_label("bd-1", "a").unwrap();
        store.add_label("bd-1", "b").unwrap();
        store.add_label("bd-1", "a").unwrap();
        assert_eq!(store.get("bd-1").unwrap().labels, vec!["a", "b"]);

        store.remove_label("bd-1", "a").unwrap();
        assert_eq!(store.get("bd-1").unwrap().labels, vec!["b"]);
    }

    #[test]
    fn add_dependency_rejects_duplicate_key() {
        use crate::model::DependencyType;

        let mut store = IssueStore::new("/tmp/does-not-matter.jsonl");
        store.insert(issue("bd-1", 1000)).unwrap();
        store.insert(issue("bd-2", 1000)).unwrap();

        let dep = Dependency {
            issue_id: "bd-1".to_string(),
            depends_on_id: "bd-2".to_string(),
            dep_type: DependencyType::Blocks,
            created_at: at(1000),
            created_by: None,
            metadata: None,
            thread_id: None,
        };
        store.add_dependency("bd-1", dep.clone()).unwrap();
        assert_eq!(store.get_dependencies("bd-1").unwrap().len(), 1);

        let err = store.add_dependency("bd-1", dep).unwrap_err();
        assert!(matches!(err, BeadsError::DuplicateDependency { .. }));
    }

    #[test]
    fn remove_dependency_is_a_noop_when_absent_and_preserves_order() {
        use crate::model::DependencyType;

        let mut store = IssueStore::new("/tmp/does-not-matter.jsonl");
        store.insert(issue("bd-1", 1000)).unwrap();
        store.insert(issue("bd-2", 1000)).unwrap();
        store.insert(issue("bd-3", 1000)).unwrap();

        let dep = |depends_on_id: &str| Dependency {
            issue_id: "bd-1".to_string(),
            depends_on_id: depends_on_id.to_string(),
            dep_type: DependencyType::Blocks,
            created_at: at(1000),
            created_by: None,
            metadata: None,
            thread_id: None,
        };
        store.add_dependency("bd-1", dep("bd-2")).unwrap();
        store.add_dependency("bd-1", dep("bd-3")).unwrap();

        store
            .remove_dependency("bd-1", "nonexistent", &DependencyType::Blocks)
            .unwrap();
        assert_eq!(store.get_dependencies("bd-1").unwrap().len(), 2);

        store
            .remove_dependency("bd-1", "bd-2", &DependencyType::Blocks)
            .unwrap();
        let remaining = store.get_dependencies("bd-1").unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].depends_on_id, "bd-3");
    }

    #[test]
    fn similar_id_scoring_prefers_exact_prefix_match() {
        let mut store = IssueStore::new("/tmp/does-not-matter.jsonl");
        store.insert(issue("bd-abc123", 1000)).unwrap();
        store.insert(issue("bd-abd999", 2000)).unwrap();

        let results = store.find_similar_ids("bd-abc", 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "bd-abc123");
        assert_eq!(results[1].id, "bd-abd999");
        assert!(similarity_score("bd-abc", "bd-abc123") >= 100);
        assert!(similarity_score("bd-abc", "bd-abd999") <= 25);
    }

    #[test]
    fn similar_ids_exclude_tombstones() {
        let mut store = IssueStore::new("/tmp/does-not-matter.jsonl");
        store.insert(issue("bd-abc123", 1000)).unwrap();
        store.delete("bd-abc123", at(2000)).unwrap();

        assert!(store.find_similar_ids("bd-abc", 5).is_empty());
    }

    #[test]
    fn count_total_excludes_tombstones() {
        let mut store = IssueStore::new("/tmp/does-not-matter.jsonl");
        store.insert(issue("bd-1", 1000)).unwrap();
        store.insert(issue("bd-2", 2000)).unwrap();
        store.delete("bd-2", at(3000)).unwrap();
        assert_eq!(store.count_total(), 1);
    }

    #[test]
    fn count_groups_by_status() {
        let mut store = IssueStore::new("/tmp/does-not-matter.jsonl");
        store.insert(issue("bd-1", 1000)).unwrap();
        store.insert(issue("bd-2", 2000)).unwrap();
        store
            .update(
                "bd-2",
                IssueUpdate {
                    status: Some(Status::Closed),
                    ..IssueUpdate::default()
                },
                at(3000),
            )
            .unwrap();

        let counts = store.count(Some(CountGroupBy::Status));
        assert_eq!(counts.get("open"), Some(&1));
        assert_eq!(counts.get("closed"), Some(&1));
    }

    #[test]
    fn save_then_load_round_trips_through_jsonl() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("issues.jsonl");

        let mut store = IssueStore::new(&path);
        store.insert(issue("bd-1", 1000)).unwrap();
        store.insert(issue("bd-2", 2000)).unwrap();
        store.save_to_file().unwrap();
        assert!(!store.is_dirty());

        let mut reloaded = IssueStore::new(&path);
        reloaded.load_from_file().unwrap();
        assert_eq!(reloaded.count_total(), 2);
        assert_eq!(reloaded.get("bd-1").unwrap().title, "Title");
        assert!(!reloaded.is_dirty());
    }

    #[test]
    fn clear_dirty_removes_one_entry_without_clearing_others() {
        let mut store = IssueStore::new("/tmp/does-not-matter.jsonl");
        store.insert(issue("bd-1", 1000)).unwrap();
        store.insert(issue("bd-2", 2000)).unwrap();
        store.clear_dirty("bd-1");
        assert!(store.is_dirty());
        assert_eq!(store.get_dirty_ids(), vec!["bd-2".to_string()]);
    }
}
