//! End-to-end scenarios from the storage core's behavioral contract: a
//! fresh repository, insert-then-reload, fuzzy id suggestions, tombstone
//! filtering, and migration rollback, each driven through the public
//! crate API rather than any one module's internals.

mod common;

use bead_store::migration::{Migration, MigrationEngine};
use bead_store::store::{Filters, IssueStore};
use bead_store::{BeadsError, Metadata};
use common::fixtures;

/// E1: a fresh, empty directory needs no migration and leaves no backup.
#[test]
fn fresh_init_is_a_no_op() {
    common::init_test_logging();
    let tmp = tempfile::tempdir().unwrap();
    let engine = MigrationEngine::new();

    let result = engine.migrate_if_needed(tmp.path()).unwrap();
    assert!(!result.migrated);
    assert_eq!(result.from_version, 1);
    assert_eq!(result.to_version, 1);
    assert!(result.backup_path.is_none());

    let backups: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
    assert!(backups.is_empty());
}

/// E2: insert, save, reload through a fresh store bound to the same path.
#[test]
fn insert_save_and_reload_round_trips() {
    common::init_test_logging();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("issues.jsonl");

    let mut store = IssueStore::new(&path);
    let mut issue = fixtures::issue("bd-1");
    issue.title = "A".to_string();
    store.insert(issue).unwrap();
    store.save_to_file().unwrap();

    let mut reloaded = IssueStore::new(&path);
    reloaded.load_from_file().unwrap();
    assert_eq!(reloaded.get("bd-1").unwrap().title, "A");
}

/// E3: "did you mean" suggestions rank an exact-prefix match over a
/// same-length sibling with a shorter common prefix.
#[test]
fn similar_id_suggestions_rank_prefix_match_first() {
    common::init_test_logging();
    let mut store = IssueStore::new("/tmp/unused.jsonl");
    store.insert(fixtures::issue("bd-abc123")).unwrap();
    store.insert(fixtures::issue("bd-abd999")).unwrap();

    let results = store.find_similar_ids("bd-abc", 2);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, "bd-abc123");
    assert_eq!(results[1].id, "bd-abd999");
}

/// E4: a deleted issue is excluded from default listings but reachable
/// with `include_tombstones`.
#[test]
fn tombstone_filtering_is_opt_in() {
    common::init_test_logging();
    let mut store = IssueStore::new("/tmp/unused.jsonl");
    store.insert(fixtures::issue("bd-x")).unwrap();
    store
        .delete("bd-x", bead_store::util::time::from_epoch_secs(2000).unwrap())
        .unwrap();

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

/// E5: a migration that fails mid-apply leaves the issues file and
/// metadata's schema version untouched, and a backup file survives.
#[test]
fn failed_migration_rolls_back_completely() {
    common::init_test_logging();
    let tmp = tempfile::tempdir().unwrap();
    let issues_path = tmp.path().join("issues.jsonl");
    let original = b"{\"id\":\"bd-1\",\"title\":\"t\",\"status\":\"open\",\"priority\":2,\"issue_type\":\"task\",\"created_at\":\"2025-01-01T00:00:00Z\",\"updated_at\":\"2025-01-01T00:00:00Z\"}\n";
    std::fs::write(&issues_path, original).unwrap();

    let metadata_path = tmp.path().join("metadata.json");
    let meta = Metadata {
        schema_version: 0,
        created_at: "2025-01-01T00:00:00Z".to_string(),
        bz_version: "0.0.0".to_string(),
        prefix: "bd".to_string(),
    };
    bead_store::metadata::write(&metadata_path, &meta).unwrap();

    struct AlwaysFails;
    impl Migration for AlwaysFails {
        fn from_version(&self) -> u32 {
            0
        }
        fn to_version(&self) -> u32 {
            1
        }
        fn transform(&self, _content: &str) -> bead_store::Result<Option<String>> {
            Err(BeadsError::MigrationFailed {
                from_version: 0,
                to_version: 1,
                reason: "synthetic".to_string(),
            })
        }
    }

    let mut engine = MigrationEngine::new();
    engine.register(Box::new(AlwaysFails)).unwrap();

    let err = engine.migrate_if_needed(tmp.path()).unwrap_err();
    assert!(matches!(err, BeadsError::MigrationFailed { .. }));

    assert_eq!(std::fs::read(&issues_path).unwrap(), original);
    let reloaded = bead_store::metadata::read(&metadata_path).unwrap().unwrap();
    assert_eq!(reloaded.schema_version, 0);

    let backup_exists = std::fs::read_dir(tmp.path())
        .unwrap()
        .filter_map(Result::ok)
        .any(|entry| entry.file_name().to_string_lossy().contains(".backup-v"));
    assert!(backup_exists);
}

/// E6: blank lines and `#`-prefixed comment lines are tolerated on read.
#[test]
fn jsonl_tolerates_blank_and_comment_lines() {
    common::init_test_logging();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("issues.jsonl");
    let issue = fixtures::issue("bd-1");
    let json = serde_json::to_string(&issue).unwrap();
    std::fs::write(&path, format!("\n# a comment\n{json}\n\n")).unwrap();

    let loaded = bead_store::jsonl::read_all(&path).unwrap();
    assert_eq!(loaded, vec![issue]);
}
