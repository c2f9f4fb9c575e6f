#![allow(dead_code)]

use bead_store::{Issue, IssueType, Priority, Status};
use chrono::{DateTime, TimeZone, Utc};

/// A fixed base instant so fixtures are deterministic across runs.
pub fn base_time() -> DateTime<Utc> {
    Utc.timestamp_opt(1_735_689_600, 0).unwrap() // 2025-01-01T00:00:00Z
}

/// A minimal, valid issue with the given id, created at [`base_time`].
pub fn issue(id: &str) -> Issue {
    issue_at(id, base_time())
}

/// A minimal, valid issue with the given id and `created_at`/`updated_at`.
pub fn issue_at(id: &str, created_at: DateTime<Utc>) -> Issue {
    Issue {
        id: id.to_string(),
        content_hash: None,
        title: format!("Title for {id}"),
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
        created_at,
        updated_at: created_at,
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
