//! In-memory VCS with scripted failures.
//!
//! [`ScriptedVcs`] starts out as a healthy repository with a remote and
//! uncommitted changes. Builder methods take prerequisites away, and the
//! `fail_*` methods queue failures carrying realistic git stderr so the
//! engine's classifier sees what it would see from real git.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use autosync_vcs::{CommitRecord, Result, Vcs, VcsError};
use chrono::Utc;

/// Stderr of a push that cannot reach the remote
pub const NETWORK_STDERR: &str =
    "fatal: unable to access 'https://example.com/notes.git/': Could not resolve host: example.com";

/// Stderr of a push rejected because the remote moved on
pub const REJECTED_STDERR: &str = "To https://example.com/notes.git\n ! [rejected]        HEAD -> main (fetch first)\nerror: failed to push some refs";

/// Stderr of a merge or commit that hit a conflict
pub const CONFLICT_STDERR: &str = "CONFLICT (content): Merge conflict in notes.md";

/// Stderr of a credential failure
pub const AUTH_STDERR: &str = "fatal: Authentication failed for 'https://example.com/notes.git/'";

/// Stderr that matches no known category
pub const UNKNOWN_STDERR: &str = "fatal: bad object HEAD";

/// File body left behind by a conflicting merge
pub const CONFLICTED_CONTENT: &str =
    "<<<<<<< HEAD\nlocal edit\n=======\nremote edit\n>>>>>>> origin/main\n";

/// One recorded call into the capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    IsAvailable,
    HasLocalRepository,
    IsInitialized,
    InitializeRepository,
    HasRemote,
    HasUncommittedChanges,
    Commit(String),
    Push,
    Fetch,
    IsBehindRemote,
    Reconcile,
    ListConflictedFiles,
    CommitHistory,
    ChangedFiles(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Step {
    Commit,
    Push,
    Fetch,
    Reconcile,
    Status,
}

impl Step {
    fn command(self) -> &'static str {
        match self {
            Self::Commit => "commit -m",
            Self::Push => "push -u origin HEAD",
            Self::Fetch => "fetch origin",
            Self::Reconcile => "merge --no-edit origin/main",
            Self::Status => "status --porcelain",
        }
    }
}

#[derive(Debug)]
struct State {
    available: bool,
    repository: bool,
    initialized: bool,
    remote: bool,
    dirty: bool,
    behind: bool,
    conflicted: Vec<String>,
    /// Files marked conflicted when a scripted reconcile conflict fires
    conflict_files: Vec<String>,
    /// Where conflicting merges write their marker files
    workdir: Option<PathBuf>,
    one_shot: HashMap<Step, VecDeque<String>>,
    always: HashMap<Step, String>,
    push_delay: Duration,
    commits: Vec<String>,
    calls: Vec<Op>,
}

/// Scriptable [`Vcs`] for engine tests.
#[derive(Debug)]
pub struct ScriptedVcs {
    state: Mutex<State>,
}

impl Default for ScriptedVcs {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedVcs {
    /// Healthy repository: tool present, initialized, remote configured,
    /// uncommitted changes, not behind.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                available: true,
                repository: true,
                initialized: true,
                remote: true,
                dirty: true,
                behind: false,
                conflicted: Vec::new(),
                conflict_files: vec!["notes.md".to_string()],
                workdir: None,
                one_shot: HashMap::new(),
                always: HashMap::new(),
                push_delay: Duration::ZERO,
                commits: Vec::new(),
                calls: Vec::new(),
            }),
        }
    }

    pub fn without_git(self) -> Self {
        self.state().available = false;
        self
    }

    pub fn without_repository(self) -> Self {
        self.state().repository = false;
        self
    }

    /// Repository with an unborn HEAD
    pub fn uninitialized(self) -> Self {
        self.state().initialized = false;
        self
    }

    pub fn without_remote(self) -> Self {
        self.state().remote = false;
        self
    }

    /// No uncommitted changes
    pub fn clean(self) -> Self {
        self.state().dirty = false;
        self
    }

    /// Remote has commits the local branch lacks
    pub fn behind(self) -> Self {
        self.state().behind = true;
        self
    }

    /// Files reported as conflicted from the start
    pub fn with_conflicted_files(self, files: &[&str]) -> Self {
        self.state().conflicted = files.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Write marker files into `dir` whenever a reconcile conflict fires
    pub fn attach_workdir(&self, dir: &Path) {
        self.state().workdir = Some(dir.to_path_buf());
    }

    /// Every push sleeps this long before answering
    pub fn with_push_delay(self, delay: Duration) -> Self {
        self.state().push_delay = delay;
        self
    }

    pub fn fail_next_commit(&self, stderr: &str) {
        self.queue_failure(Step::Commit, stderr);
    }

    pub fn fail_next_push(&self, stderr: &str) {
        self.queue_failure(Step::Push, stderr);
    }

    pub fn fail_next_fetch(&self, stderr: &str) {
        self.queue_failure(Step::Fetch, stderr);
    }

    pub fn fail_next_reconcile(&self, stderr: &str) {
        self.queue_failure(Step::Reconcile, stderr);
    }

    pub fn fail_next_status(&self, stderr: &str) {
        self.queue_failure(Step::Status, stderr);
    }

    /// Every push fails with `stderr` until [`ScriptedVcs::heal_push`]
    pub fn fail_push_always(&self, stderr: &str) {
        self.state().always.insert(Step::Push, stderr.to_string());
    }

    pub fn heal_push(&self) {
        self.state().always.remove(&Step::Push);
    }

    /// Next reconcile fails with a merge conflict and leaves conflicted files
    pub fn conflict_on_reconcile(&self) {
        self.queue_failure(Step::Reconcile, CONFLICT_STDERR);
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.state().dirty = dirty;
    }

    pub fn set_behind(&self, behind: bool) {
        self.state().behind = behind;
    }

    pub fn set_remote(&self, remote: bool) {
        self.state().remote = remote;
    }

    /// Every call so far, in order
    pub fn calls(&self) -> Vec<Op> {
        self.state().calls.clone()
    }

    /// Commit attempts, failed ones included
    pub fn commit_count(&self) -> usize {
        self.count(|op| matches!(op, Op::Commit(_)))
    }

    /// Push attempts, failed ones included
    pub fn push_count(&self) -> usize {
        self.count(|op| *op == Op::Push)
    }

    pub fn fetch_count(&self) -> usize {
        self.count(|op| *op == Op::Fetch)
    }

    pub fn reconcile_count(&self) -> usize {
        self.count(|op| *op == Op::Reconcile)
    }

    /// Messages of every commit attempt, in order
    pub fn commit_messages(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|op| match op {
                Op::Commit(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// Messages of successful commits, in order
    pub fn committed(&self) -> Vec<String> {
        self.state().commits.clone()
    }

    /// True if no VCS mutation has been attempted
    pub fn untouched(&self) -> bool {
        self.count(|op| {
            matches!(
                op,
                Op::Commit(_) | Op::Push | Op::Fetch | Op::Reconcile | Op::InitializeRepository
            )
        }) == 0
    }

    fn count(&self, predicate: impl Fn(&Op) -> bool) -> usize {
        self.state().calls.iter().filter(|op| predicate(op)).count()
    }

    fn queue_failure(&self, step: Step, stderr: &str) {
        self.state()
            .one_shot
            .entry(step)
            .or_default()
            .push_back(stderr.to_string());
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, op: Op) {
        self.state().calls.push(op);
    }

    /// Pop the scripted failure for `step`, if any
    fn scripted(&self, step: Step) -> Result<()> {
        let mut state = self.state();
        let stderr = state
            .one_shot
            .get_mut(&step)
            .and_then(VecDeque::pop_front)
            .or_else(|| state.always.get(&step).cloned());

        match stderr {
            Some(stderr) => Err(VcsError::command_failed(step.command(), 1, "", stderr)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Vcs for ScriptedVcs {
    async fn is_available(&self) -> bool {
        self.record(Op::IsAvailable);
        self.state().available
    }

    async fn has_local_repository(&self, _path: &Path) -> bool {
        self.record(Op::HasLocalRepository);
        self.state().repository
    }

    async fn is_initialized(&self) -> Result<bool> {
        self.record(Op::IsInitialized);
        Ok(self.state().initialized)
    }

    async fn initialize_repository(&self) -> Result<()> {
        self.record(Op::InitializeRepository);
        self.state().initialized = true;
        Ok(())
    }

    async fn has_remote(&self) -> Result<bool> {
        self.record(Op::HasRemote);
        Ok(self.state().remote)
    }

    async fn has_uncommitted_changes(&self) -> Result<bool> {
        self.record(Op::HasUncommittedChanges);
        self.scripted(Step::Status)?;
        Ok(self.state().dirty)
    }

    async fn commit(&self, message: &str) -> Result<()> {
        self.record(Op::Commit(message.to_string()));
        self.scripted(Step::Commit)?;

        let mut state = self.state();
        state.dirty = false;
        state.commits.push(message.to_string());
        Ok(())
    }

    async fn push(&self) -> Result<()> {
        self.record(Op::Push);
        let delay = self.state().push_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.scripted(Step::Push)
    }

    async fn fetch(&self) -> Result<()> {
        self.record(Op::Fetch);
        self.scripted(Step::Fetch)
    }

    async fn is_behind_remote(&self) -> Result<bool> {
        self.record(Op::IsBehindRemote);
        Ok(self.state().behind)
    }

    async fn reconcile_with_remote(&self) -> Result<()> {
        self.record(Op::Reconcile);
        let result = self.scripted(Step::Reconcile);

        let mut state = self.state();
        match &result {
            Ok(()) => state.behind = false,
            Err(e) if e.message().contains("CONFLICT") => {
                state.behind = false;
                state.dirty = true;
                for file in state.conflict_files.clone() {
                    if let Some(dir) = &state.workdir {
                        fs::write(dir.join(&file), CONFLICTED_CONTENT)
                            .expect("failed to write conflicted file");
                    }
                    if !state.conflicted.contains(&file) {
                        state.conflicted.push(file);
                    }
                }
            }
            Err(_) => {}
        }
        result
    }

    async fn list_conflicted_files(&self) -> Result<Vec<String>> {
        self.record(Op::ListConflictedFiles);
        Ok(self.state().conflicted.clone())
    }

    async fn commit_history(&self, limit: usize, offset: usize) -> Result<Vec<CommitRecord>> {
        self.record(Op::CommitHistory);
        let state = self.state();
        Ok(state
            .commits
            .iter()
            .rev()
            .enumerate()
            .skip(offset)
            .take(limit)
            .map(|(index, message)| {
                let id = format!("{:040x}", state.commits.len() - index);
                CommitRecord {
                    hash: id[..7].to_string(),
                    id,
                    message: message.lines().next().unwrap_or_default().to_string(),
                    author: "Test User".to_string(),
                    timestamp: Utc::now(),
                }
            })
            .collect())
    }

    async fn changed_files(&self, revision: &str) -> Result<Vec<String>> {
        self.record(Op::ChangedFiles(revision.to_string()));
        if revision.starts_with('-') {
            return Err(VcsError::InvalidRevision {
                revision: revision.to_string(),
            });
        }
        Ok(vec!["notes.md".to_string()])
    }
}
