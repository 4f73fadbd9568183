//! Mapping raw VCS failures to semantic error kinds
//!
//! Classification happens once, at the VCS boundary. Everything above it
//! branches on [`ErrorKind`] and never inspects failure text again.

use std::fmt;

use autosync_vcs::VcsError;

/// Semantic category of a sync failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Tool or capability missing. Fatal for initialization, never retried
    NotFound,
    /// Transient connectivity failure. Retried a bounded number of times
    Network,
    /// Remote has commits we lack. Pull once, then retry
    RemoteChanged,
    /// Merge conflict. Recorded and committed through
    Conflict,
    /// Credentials rejected. Needs user action
    Auth,
    /// Anything else. The current cycle is abandoned
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not-found",
            Self::Network => "network",
            Self::RemoteChanged => "remote-changed",
            Self::Conflict => "conflict",
            Self::Auth => "auth",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// A classified failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticError {
    pub kind: ErrorKind,
    pub message: String,
}

impl SemanticError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

impl std::error::Error for SemanticError {}

/// Phrases tested against the lower-cased failure text, highest priority first
const PATTERNS: &[(ErrorKind, &[&str])] = &[
    (
        ErrorKind::NotFound,
        &[
            "command not found",
            "is not recognized as an internal or external command",
            "executable file not found",
            "no such file or directory (os error 2)",
        ],
    ),
    (
        ErrorKind::Network,
        &[
            "connection refused",
            "connection reset",
            "connection timed out",
            "timed out",
            "timeout",
            "could not resolve host",
            "could not resolve hostname",
            "name or service not known",
            "temporary failure in name resolution",
            "network is unreachable",
            "no route to host",
            "unable to access",
            "failed to connect",
        ],
    ),
    (
        ErrorKind::RemoteChanged,
        &[
            "non-fast-forward",
            "[rejected]",
            "fetch first",
            "updates were rejected",
            "remote contains work",
            "tip of your current branch is behind",
        ],
    ),
    (
        ErrorKind::Conflict,
        &["conflict", "unmerged", "fix conflicts"],
    ),
    (
        ErrorKind::Auth,
        &[
            "authentication failed",
            "permission denied",
            "could not read username",
            "could not read password",
            "invalid username or password",
            "access denied",
            "terminal prompts disabled",
            "403",
        ],
    ),
];

/// Classify free-form failure text.
///
/// `message` and `output` are concatenated and lower-cased, then tested
/// against fixed phrase lists in priority order. Total: anything unmatched
/// is [`ErrorKind::Unknown`] carrying `message` verbatim.
pub fn classify_text(message: &str, output: Option<&str>) -> SemanticError {
    let haystack = match output {
        Some(output) => format!("{message}\n{output}").to_lowercase(),
        None => message.to_lowercase(),
    };

    let kind = PATTERNS
        .iter()
        .find(|(_, phrases)| phrases.iter().any(|p| haystack.contains(p)))
        .map(|(kind, _)| *kind)
        .unwrap_or(ErrorKind::Unknown);

    SemanticError::new(kind, message)
}

/// Classify a raw VCS failure
pub fn classify(error: &VcsError) -> SemanticError {
    classify_text(&error.message(), error.output())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("bash: git: command not found", ErrorKind::NotFound)]
    #[case("'git' is not recognized as an internal or external command", ErrorKind::NotFound)]
    #[case("fatal: unable to access 'https://example.com/r.git/': Could not resolve host: example.com", ErrorKind::Network)]
    #[case("ssh: connect to host example.com port 22: Connection refused", ErrorKind::Network)]
    #[case("`git push -u origin HEAD` timed out after 30s", ErrorKind::Network)]
    #[case(" ! [rejected]        HEAD -> main (fetch first)", ErrorKind::RemoteChanged)]
    #[case("error: failed to push some refs\nhint: Updates were rejected because the tip of your current branch is behind", ErrorKind::RemoteChanged)]
    #[case("CONFLICT (content): Merge conflict in notes.md", ErrorKind::Conflict)]
    #[case("error: Committing is not possible because you have unmerged files.", ErrorKind::Conflict)]
    #[case("remote: Invalid username or password.\nfatal: Authentication failed for 'https://example.com/'", ErrorKind::Auth)]
    #[case("git@example.com: Permission denied (publickey).", ErrorKind::Auth)]
    #[case("fatal: could not read Username for 'https://example.com': terminal prompts disabled", ErrorKind::Auth)]
    #[case("fatal: bad object HEAD", ErrorKind::Unknown)]
    fn classifies_known_phrases(#[case] message: &str, #[case] expected: ErrorKind) {
        assert_eq!(classify_text(message, None).kind, expected);
    }

    #[test]
    fn earlier_category_wins_on_overlap() {
        let err = classify_text("command not found while waiting: timeout", None);
        assert_eq!(err.kind, ErrorKind::NotFound);

        let err = classify_text("[rejected] after connection reset", None);
        assert_eq!(err.kind, ErrorKind::Network);
    }

    #[test]
    fn conflict_match_is_case_insensitive() {
        assert_eq!(classify_text("Merge CONFLICT", None).kind, ErrorKind::Conflict);
        assert_eq!(classify_text("merge conflict", None).kind, ErrorKind::Conflict);
    }

    #[test]
    fn secondary_output_participates() {
        let err = classify_text(
            "`git merge --no-edit origin/main` failed (exit code 1): ",
            Some("Auto-merging notes.md\nCONFLICT (content): Merge conflict in notes.md\n"),
        );
        assert_eq!(err.kind, ErrorKind::Conflict);
        assert_eq!(
            err.message,
            "`git merge --no-edit origin/main` failed (exit code 1): "
        );
    }

    #[test]
    fn unknown_keeps_message_verbatim() {
        let err = classify_text("Something Odd Happened", Some("extra"));
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert_eq!(err.message, "Something Odd Happened");
    }

    #[test]
    fn classifies_vcs_errors() {
        let timeout = VcsError::Timeout {
            command: "fetch origin".into(),
            seconds: 30,
        };
        assert_eq!(classify(&timeout).kind, ErrorKind::Network);

        let spawn = VcsError::Spawn {
            program: "git".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(classify(&spawn).kind, ErrorKind::NotFound);
    }

    proptest! {
        #[test]
        fn classification_is_total_and_stable(message in "\\PC+", output in proptest::option::of("\\PC*")) {
            let first = classify_text(&message, output.as_deref());
            let second = classify_text(&message, output.as_deref());
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.message, message);
        }

        #[test]
        fn not_found_beats_network(prefix in "[a-z ]{0,12}", suffix in "[a-z ]{0,12}") {
            let message = format!("{prefix}command not found{suffix} timeout");
            prop_assert_eq!(classify_text(&message, None).kind, ErrorKind::NotFound);
        }
    }
}
