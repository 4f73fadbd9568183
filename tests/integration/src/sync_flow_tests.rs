//! End-to-end tests of the sync engine against real git repositories
//!
//! Each test builds a bare remote with one or two clones and drives the
//! engine through `GitCli`, exercising the real command output that the
//! error classifier depends on.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use autosync_core::{
    ChangeDebouncer, PullOutcome, SharedSettings, SyncOrchestrator, SyncSettings, SyncStatus,
};
use autosync_test_utils::{Notification, RecordingReporter, RemoteSetup, git, init_repo};
use autosync_vcs::GitCli;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

struct Engine {
    orchestrator: Arc<SyncOrchestrator>,
    reporter: Arc<RecordingReporter>,
}

fn engine(root: &Path, settings: SyncSettings) -> Engine {
    let vcs = Arc::new(GitCli::new(
        root,
        settings.remote.clone(),
        settings.command_timeout(),
    ));
    let reporter = Arc::new(RecordingReporter::new());
    let orchestrator = SyncOrchestrator::new(root, vcs, Arc::new(SharedSettings::new(settings)))
        .with_status_sink(reporter.clone())
        .with_notifier(reporter.clone());

    Engine {
        orchestrator: Arc::new(orchestrator),
        reporter,
    }
}

/// Settings for one-shot runs: no background polling
fn manual_settings() -> SyncSettings {
    SyncSettings {
        auto_sync: false,
        ..SyncSettings::default()
    }
}

async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    condition()
}

#[tokio::test(flavor = "multi_thread")]
async fn manual_sync_publishes_local_edits() {
    let setup = RemoteSetup::new();
    fs::write(setup.alice().join("todo.md"), "- water plants\n").unwrap();

    let engine = engine(&setup.alice(), manual_settings());
    assert_eq!(engine.orchestrator.initialize().await, SyncStatus::Enabled);

    let status = engine.orchestrator.full_sync().await;

    assert_eq!(status, SyncStatus::SyncComplete);
    assert_eq!(setup.remote_commit_count(), 2);
    assert!(setup.remote_head_subject().starts_with("Manual sync: "));
    assert!(engine.reporter.notifications().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_edits_are_committed_with_markers() {
    let setup = RemoteSetup::new();
    let bob = setup.clone_as("bob");
    fs::write(bob.join("notes.md"), "bob was here\n").unwrap();
    git(&bob, &["commit", "-am", "Bob edits"]);
    git(&bob, &["push"]);

    fs::write(setup.alice().join("notes.md"), "alice was here\n").unwrap();
    let engine = engine(&setup.alice(), manual_settings());
    engine.orchestrator.initialize().await;

    let status = engine.orchestrator.full_sync().await;

    assert_eq!(status, SyncStatus::SyncCompleteWithConflicts);
    assert!(setup.remote_head_subject().ends_with("(with conflicts)"));
    assert_eq!(
        engine.reporter.notifications(),
        vec![Notification::ConflictsDetected(1)]
    );

    let conflicts = engine.orchestrator.conflicts().await.unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].relative_path, "notes.md");
    assert_eq!(conflicts[0].count, 1);
    assert_eq!(conflicts[0].regions[0].start_line, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn pull_integrates_remote_commits() {
    let setup = RemoteSetup::new();
    let bob = setup.clone_as("bob");
    fs::write(bob.join("shared.md"), "from bob\n").unwrap();
    git(&bob, &["add", "."]);
    git(&bob, &["commit", "-m", "Add shared notes"]);
    git(&bob, &["push"]);

    let engine = engine(&setup.alice(), manual_settings());
    engine.orchestrator.initialize().await;

    assert_eq!(engine.orchestrator.pull().await, PullOutcome::Reconciled);
    assert_eq!(
        fs::read_to_string(setup.alice().join("shared.md")).unwrap(),
        "from bob\n"
    );
    assert_eq!(engine.orchestrator.pull().await, PullOutcome::UpToDate);
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_remote_goes_offline() {
    let setup = RemoteSetup::new();
    git(
        &setup.alice(),
        &["remote", "set-url", "origin", "/nonexistent/remote.git"],
    );
    fs::write(setup.alice().join("todo.md"), "offline edit\n").unwrap();

    let engine = engine(&setup.alice(), manual_settings());
    engine.orchestrator.initialize().await;
    let status = engine.orchestrator.full_sync().await;

    // The edit is kept in a local commit either way
    assert_eq!(git(&setup.alice(), &["status", "--porcelain"]), "");
    assert!(matches!(status, SyncStatus::Offline | SyncStatus::Enabled));
    assert_eq!(setup.remote_commit_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn fresh_repository_is_initialized_local_only() {
    let temp = TempDir::new().unwrap();
    init_repo(temp.path());

    let engine = engine(temp.path(), manual_settings());
    assert_eq!(engine.orchestrator.initialize().await, SyncStatus::LocalOnly);
    assert_eq!(engine.reporter.notifications(), vec![Notification::NoRemote]);

    let history = engine.orchestrator.history(10, 0).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].message, "Initialize repository");

    fs::write(temp.path().join("draft.md"), "text\n").unwrap();
    assert_eq!(engine.orchestrator.full_sync().await, SyncStatus::LocalOnly);
    assert_eq!(engine.orchestrator.history(10, 0).await.unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn debounced_saves_are_pushed_after_quiet_period() {
    let setup = RemoteSetup::new();
    let settings = SyncSettings {
        quiet_period_secs: 1,
        pull_interval_min_secs: 3600,
        pull_interval_max_secs: 3600,
        ..SyncSettings::default()
    };
    let engine = engine(&setup.alice(), settings);
    engine.orchestrator.initialize().await;
    let orchestrator = engine.orchestrator.clone();
    let debouncer = ChangeDebouncer::new(orchestrator.clone(), orchestrator.puller());

    fs::write(setup.alice().join("a.md"), "first\n").unwrap();
    debouncer.queue_change("a.md");
    fs::write(setup.alice().join("b.md"), "second\n").unwrap();
    debouncer.queue_change("b.md");

    let pushed = wait_until(Duration::from_secs(20), || {
        setup.remote_commit_count() == 2 && debouncer.pending().is_empty()
    })
    .await;
    assert!(pushed, "debounced commit never reached the remote");

    let message = git(&setup.remote(), &["log", "-1", "--format=%B", "main"]);
    assert!(message.starts_with("Auto-sync: "));
    assert!(message.contains("- a.md"));
    assert!(message.contains("- b.md"));

    engine.orchestrator.scheduler().cancel_all();
}
