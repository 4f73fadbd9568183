//! Commit history extraction

use chrono::{DateTime, TimeZone, Utc};
use git2::{ErrorCode, Repository};

use crate::Result;

/// A single commit as shown to users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Short commit hash (7 characters)
    pub hash: String,

    /// Full commit id
    pub id: String,

    /// First line of the commit message
    pub message: String,

    /// Commit author name
    pub author: String,

    /// Commit timestamp
    pub timestamp: DateTime<Utc>,
}

/// Walk history from HEAD, skipping `offset` commits and returning at most `limit`.
///
/// Commits are time-sorted, most recent first. An unborn HEAD (no commits
/// yet) yields an empty list rather than an error.
pub fn list_commits(repo: &Repository, limit: usize, offset: usize) -> Result<Vec<CommitRecord>> {
    let head = match repo.head() {
        Ok(head) => head,
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };
    let tip = head.peel_to_commit()?;

    let mut revwalk = repo.revwalk()?;
    revwalk.push(tip.id())?;
    revwalk.set_sorting(git2::Sort::TIME)?;

    let mut commits = Vec::with_capacity(limit);

    for oid_result in revwalk.skip(offset).take(limit) {
        let oid = oid_result?;
        let commit = repo.find_commit(oid)?;

        let timestamp = Utc
            .timestamp_opt(commit.time().seconds(), 0)
            .single()
            .unwrap_or_default();

        let message = commit
            .message()
            .unwrap_or("")
            .lines()
            .next()
            .unwrap_or("")
            .to_string();

        let author = commit.author().name().unwrap_or("Unknown").to_string();

        commits.push(CommitRecord {
            hash: format!("{:.7}", oid),
            id: oid.to_string(),
            message,
            author,
            timestamp,
        });
    }

    Ok(commits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn commit(repo: &Repository, message: &str) {
        let sig = git2::Signature::now("Test User", "test@example.com").unwrap();
        let tree_id = repo.index().unwrap().write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let parents = match repo.head() {
            Ok(head) => vec![head.peel_to_commit().unwrap()],
            Err(_) => vec![],
        };
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .unwrap();
    }

    #[test]
    fn unborn_head_has_empty_history() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();

        assert!(list_commits(&repo, 10, 0).unwrap().is_empty());
    }

    #[test]
    fn limit_and_offset_page_through_history() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        commit(&repo, "first");
        commit(&repo, "second\n\nbody text");
        commit(&repo, "third");

        let all = list_commits(&repo, 10, 0).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].hash.len(), 7);
        assert!(all[0].id.starts_with(&all[0].hash));

        let page = list_commits(&repo, 1, 1).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, all[1].id);
        assert_eq!(page[0].author, "Test User");
    }

    #[test]
    fn message_is_summary_line_only() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init(temp.path()).unwrap();
        commit(&repo, "summary\n\nlong body");

        let commits = list_commits(&repo, 1, 0).unwrap();
        assert_eq!(commits[0].message, "summary");
    }
}
