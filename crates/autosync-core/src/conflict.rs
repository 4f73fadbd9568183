//! Conflict-marker scanning
//!
//! A conflict region opens at a line starting with seven `<` and closes at
//! the next line starting with seven `>`. The `=======` separator is not
//! validated. While a region is open, further start markers are ignored, so
//! nested blocks produce one region from the outer start to the first close.
//! A start marker that is never closed produces no region.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

const START_MARKER: &str = "<<<<<<<";
const END_MARKER: &str = ">>>>>>>";

/// Existence check equivalent to `!scan(..).is_empty()`: a start-marker line
/// followed by an end-marker line somewhere after it.
static MARKED_REGION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^<{7}[^\n]*\n(?s:.*?)^>{7}").unwrap());

/// One unresolved conflict block inside a file (1-based, inclusive lines)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictRegion {
    pub file_path: PathBuf,
    pub start_line: usize,
    pub end_line: usize,
}

/// All conflict regions of a single file, as presented to users
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictFile {
    pub file_path: PathBuf,
    pub relative_path: String,
    pub count: usize,
    pub regions: Vec<ConflictRegion>,
}

/// Find every closed conflict region in `content`
pub fn scan(path: &Path, content: &str) -> Vec<ConflictRegion> {
    let mut regions = Vec::new();
    let mut open: Option<usize> = None;

    for (index, line) in content.lines().enumerate() {
        let line_number = index + 1;

        if line.starts_with(START_MARKER) {
            open.get_or_insert(line_number);
        } else if line.starts_with(END_MARKER)
            && let Some(start_line) = open.take()
        {
            regions.push(ConflictRegion {
                file_path: path.to_path_buf(),
                start_line,
                end_line: line_number,
            });
        }
    }

    regions
}

/// Cheap check for at least one conflict region
pub fn contains_markers(content: &str) -> bool {
    MARKED_REGION.is_match(content)
}

/// Scan a file on disk.
///
/// Unreadable or missing files yield no regions.
pub fn scan_file(path: &Path) -> Vec<ConflictRegion> {
    match std::fs::read_to_string(path) {
        Ok(content) => scan(path, &content),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Skipping unreadable file");
            Vec::new()
        }
    }
}

/// Scan `relative_paths` under `root` and group regions per file.
///
/// Files without any region are left out.
pub fn collect_conflict_files<S: AsRef<str>>(
    root: &Path,
    relative_paths: &[S],
) -> Vec<ConflictFile> {
    relative_paths
        .iter()
        .filter_map(|relative| {
            let relative = relative.as_ref();
            let file_path = root.join(relative);
            let regions = scan_file(&file_path);
            if regions.is_empty() {
                return None;
            }
            Some(ConflictFile {
                file_path,
                relative_path: relative.to_string(),
                count: regions.len(),
                regions,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn region(start_line: usize, end_line: usize) -> ConflictRegion {
        ConflictRegion {
            file_path: PathBuf::from("notes.md"),
            start_line,
            end_line,
        }
    }

    #[test]
    fn finds_single_region() {
        let content = "intro\n<<<<<<< HEAD\nmine\n=======\ntheirs\n>>>>>>> origin/main\noutro\n";

        assert_eq!(scan(Path::new("notes.md"), content), vec![region(2, 6)]);
        assert!(contains_markers(content));
    }

    #[test]
    fn finds_multiple_regions() {
        let content = "<<<<<<< a\nx\n=======\ny\n>>>>>>> b\nmiddle\n<<<<<<< a\n>>>>>>> b\n";

        assert_eq!(
            scan(Path::new("notes.md"), content),
            vec![region(1, 5), region(7, 8)]
        );
    }

    #[test]
    fn unterminated_region_is_ignored() {
        let content = "<<<<<<< HEAD\nmine\n=======\ntheirs\n";

        assert!(scan(Path::new("notes.md"), content).is_empty());
        assert!(!contains_markers(content));
    }

    #[test]
    fn markers_must_start_the_line() {
        let content = "  <<<<<<< HEAD\nmine\n  >>>>>>> theirs\n";

        assert!(scan(Path::new("notes.md"), content).is_empty());
        assert!(!contains_markers(content));
    }

    #[test]
    fn end_marker_before_start_does_not_close() {
        let content = ">>>>>>> stray\n<<<<<<< HEAD\n";

        assert!(scan(Path::new("notes.md"), content).is_empty());
        assert!(!contains_markers(content));
    }

    #[test]
    fn separator_alone_is_not_a_conflict() {
        let content = "title\n=======\nbody\n";
        assert!(scan(Path::new("notes.md"), content).is_empty());
        assert!(!contains_markers(content));
    }

    // Nested blocks: the outer start is kept and the first close ends the
    // region. The outer close is then unmatched and ignored.
    #[test]
    fn nested_markers_close_at_first_end() {
        let content = "<<<<<<< outer\n<<<<<<< inner\na\n>>>>>>> inner\nb\n>>>>>>> outer\n";

        assert_eq!(scan(Path::new("notes.md"), content), vec![region(1, 4)]);
        assert!(contains_markers(content));
    }

    #[test]
    fn crlf_lines_are_scanned() {
        let content = "<<<<<<< HEAD\r\nmine\r\n=======\r\ntheirs\r\n>>>>>>> main\r\n";

        assert_eq!(scan(Path::new("notes.md"), content), vec![region(1, 5)]);
        assert!(contains_markers(content));
    }

    #[test]
    fn missing_file_yields_nothing() {
        let temp = tempfile::TempDir::new().unwrap();
        assert!(scan_file(&temp.path().join("absent.md")).is_empty());
    }

    #[test]
    fn collect_groups_regions_per_file() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("a.md"),
            "<<<<<<< HEAD\n1\n=======\n2\n>>>>>>> x\n<<<<<<< HEAD\n>>>>>>> x\n",
        )
        .unwrap();
        std::fs::write(temp.path().join("clean.md"), "nothing here\n").unwrap();

        let files = collect_conflict_files(temp.path(), &["a.md", "clean.md", "gone.md"]);

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "a.md");
        assert_eq!(files[0].count, 2);
        assert_eq!(files[0].file_path, temp.path().join("a.md"));
        assert_eq!(files[0].regions[1].start_line, 6);
    }

    fn marker_heavy_line() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("<<<<<<< HEAD".to_string()),
            Just(">>>>>>> theirs".to_string()),
            Just("=======".to_string()),
            Just("<<<<<<<".to_string()),
            Just(">>>>>>>".to_string()),
            Just(" <<<<<<< indented".to_string()),
            "[a-z<>= ]{0,10}",
        ]
    }

    proptest! {
        #[test]
        fn contains_markers_agrees_with_scan(
            lines in proptest::collection::vec(marker_heavy_line(), 0..12),
            crlf in any::<bool>(),
            trailing_newline in any::<bool>(),
        ) {
            let separator = if crlf { "\r\n" } else { "\n" };
            let mut content = lines.join(separator);
            if trailing_newline {
                content.push_str(separator);
            }

            let scanned = !scan(Path::new("f"), &content).is_empty();
            prop_assert_eq!(contains_markers(&content), scanned);
        }

        #[test]
        fn contains_markers_agrees_with_scan_on_arbitrary_text(content in "\\PC*") {
            let scanned = !scan(Path::new("f"), &content).is_empty();
            prop_assert_eq!(contains_markers(&content), scanned);
        }
    }
}
