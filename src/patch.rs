//! The in-memory patch model and the unified diff parser.

use crate::ParseError;
use log::{debug, trace};
use regex::Regex;
use similar::{ChangeTag, TextDiff};
use std::sync::OnceLock;

/// The kind of a single line inside a hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// An unchanged line (` ` marker). It must exist in the original file.
    Context,
    /// A line introduced by the patch (`+` marker).
    Addition,
    /// A line removed by the patch (`-` marker). It must exist in the original file.
    Deletion,
}

impl Operation {
    /// Classifies a diff body line by its leading marker character.
    ///
    /// Returns `None` for anything that is not one of the three hunk markers,
    /// such as the `\ No newline at end of file` annotation.
    ///
    /// # Example
    ///
    /// ```
    /// # use hunktrace::Operation;
    /// assert_eq!(Operation::from_marker('-'), Some(Operation::Deletion));
    /// assert_eq!(Operation::from_marker('\\'), None);
    /// ```
    pub fn from_marker(marker: char) -> Option<Self> {
        match marker {
            ' ' => Some(Operation::Context),
            '+' => Some(Operation::Addition),
            '-' => Some(Operation::Deletion),
            _ => None,
        }
    }

    /// The marker character this operation is written with in a unified diff.
    pub fn marker(self) -> char {
        match self {
            Operation::Context => ' ',
            Operation::Addition => '+',
            Operation::Deletion => '-',
        }
    }

    /// Returns `true` for lines that are expected to exist in the original file
    /// (context and deletions).
    pub fn is_retained(self) -> bool {
        !matches!(self, Operation::Addition)
    }
}

/// A single line of a hunk, with its diff marker stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// What the patch does with this line.
    pub operation: Operation,
    /// The line text without its marker or line ending.
    pub content: String,
}

impl Line {
    /// Creates a line from an operation and its unmarked text.
    pub fn new(operation: Operation, content: impl Into<String>) -> Self {
        Self {
            operation,
            content: content.into(),
        }
    }
}

/// A block of changes introduced by a `@@ -O,o +M,m @@` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// The target file path, taken from the preceding `diff --git` header.
    pub file_name: String,
    /// The 1-based sequence number of this hunk within its file.
    pub hunk_no: usize,
    /// The 1-based first line of the original range.
    pub original_start_line: usize,
    /// The number of lines in the original range.
    pub original_lines: usize,
    /// The 1-based first line of the modified range.
    pub modified_start_line: usize,
    /// The number of lines in the modified range.
    pub modified_lines: usize,
    /// The free text following the closing `@@`, usually a function signature.
    pub description: String,
    /// The hunk body in diff order.
    pub lines: Vec<Line>,
}

impl Hunk {
    /// Extracts the lines that must exist in the target file for this hunk to apply.
    ///
    /// These are the context and deletion lines, in diff order. Additions are
    /// excluded since they have no counterpart in the original file.
    ///
    /// # Example
    ///
    /// ```
    /// # use hunktrace::parse_patch;
    /// let diff = "diff --git a/f.txt b/f.txt\n@@ -1,2 +1,2 @@\n keep\n-old\n+new\n";
    /// let patch = parse_patch(diff).unwrap();
    /// assert_eq!(patch.hunks[0].retained_lines(), vec!["keep", "old"]);
    /// ```
    pub fn retained_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|l| l.operation.is_retained())
            .map(|l| l.content.as_str())
            .collect()
    }

    /// Extracts the lines introduced by this hunk.
    pub fn added_lines(&self) -> Vec<&str> {
        self.lines_with(Operation::Addition)
    }

    /// Extracts the lines removed by this hunk.
    pub fn removed_lines(&self) -> Vec<&str> {
        self.lines_with(Operation::Deletion)
    }

    fn lines_with(&self, operation: Operation) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|l| l.operation == operation)
            .map(|l| l.content.as_str())
            .collect()
    }

    /// The 0-based index at which the header says the retained lines begin.
    ///
    /// Unified diffs number lines from 1, except for an empty original range,
    /// where the start names the line *after which* the hunk is inserted.
    ///
    /// # Example
    ///
    /// ```
    /// # use hunktrace::parse_patch;
    /// let diff = "diff --git a/f b/f\n@@ -10,3 +10,4 @@\n foo\n@@ -4,0 +5,1 @@\n+bar\n";
    /// let patch = parse_patch(diff).unwrap();
    /// assert_eq!(patch.hunks[0].expected_index(), 9);
    /// assert_eq!(patch.hunks[1].expected_index(), 4);
    /// ```
    pub fn expected_index(&self) -> usize {
        if self.original_lines == 0 {
            self.original_start_line
        } else {
            self.original_start_line.saturating_sub(1)
        }
    }
}

/// A parsed unified diff: every hunk of every file, in diff order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
    pub hunks: Vec<Hunk>,
}

impl Patch {
    /// Returns the distinct target paths touched by this patch, in first-seen order.
    pub fn files(&self) -> Vec<&str> {
        let mut files: Vec<&str> = Vec::new();
        for hunk in &self.hunks {
            if !files.contains(&hunk.file_name.as_str()) {
                files.push(&hunk.file_name);
            }
        }
        files
    }

    /// Creates a single-file `Patch` by comparing two texts.
    ///
    /// Hunks are built directly from the grouped operations of a line diff, so
    /// the resulting headers always carry explicit counts.
    ///
    /// # Example
    ///
    /// ```
    /// # use hunktrace::Patch;
    /// let old = "a\nb\nc\nd\n";
    /// let new = "a\nb\nC\nd\n";
    /// let patch = Patch::from_texts("src/lib.rs", old, new, 1);
    ///
    /// assert_eq!(patch.hunks.len(), 1);
    /// let hunk = &patch.hunks[0];
    /// assert_eq!(hunk.file_name, "src/lib.rs");
    /// assert_eq!((hunk.original_start_line, hunk.original_lines), (2, 3));
    /// assert_eq!(hunk.removed_lines(), vec!["c"]);
    /// assert_eq!(hunk.added_lines(), vec!["C"]);
    /// ```
    pub fn from_texts(
        file_name: impl Into<String>,
        old_text: &str,
        new_text: &str,
        context_len: usize,
    ) -> Patch {
        let file_name = file_name.into();
        let diff = TextDiff::from_lines(old_text, new_text);
        let mut hunks = Vec::new();

        for (i, group) in diff.grouped_ops(context_len).iter().enumerate() {
            let (Some(first), Some(last)) = (group.first(), group.last()) else {
                continue;
            };
            let old_range = first.old_range().start..last.old_range().end;
            let new_range = first.new_range().start..last.new_range().end;

            let lines = group
                .iter()
                .flat_map(|op| diff.iter_changes(op))
                .map(|change| {
                    let operation = match change.tag() {
                        ChangeTag::Equal => Operation::Context,
                        ChangeTag::Delete => Operation::Deletion,
                        ChangeTag::Insert => Operation::Addition,
                    };
                    Line::new(operation, strip_line_ending(change.value()))
                })
                .collect();

            hunks.push(Hunk {
                file_name: file_name.clone(),
                hunk_no: i + 1,
                original_start_line: header_start(old_range.start, old_range.len()),
                original_lines: old_range.len(),
                modified_start_line: header_start(new_range.start, new_range.len()),
                modified_lines: new_range.len(),
                description: String::new(),
                lines,
            });
        }

        Patch { hunks }
    }
}

fn header_start(start: usize, len: usize) -> usize {
    if len == 0 {
        start
    } else {
        start + 1
    }
}

fn strip_line_ending(value: &str) -> &str {
    let value = value.strip_suffix('\n').unwrap_or(value);
    value.strip_suffix('\r').unwrap_or(value)
}

fn hunk_header_regex() -> &'static Regex {
    static HUNK_HEADER: OnceLock<Regex> = OnceLock::new();
    HUNK_HEADER.get_or_init(|| {
        Regex::new(r"^@@ -(\d+),(\d+) \+(\d+),(\d+) @@(.*)$").expect("hunk header pattern is valid")
    })
}

/// Parses a unified diff into a [`Patch`].
///
/// The parser is line oriented:
/// - `index `, `--- ` and `+++ ` lines are skipped.
/// - `diff --git a/x b/x` sets the current file (the fourth field, without its
///   `a/` or `b/` prefix) and restarts hunk numbering.
/// - `@@ -O,o +M,m @@ description` opens a new hunk.
/// - Any other line inside a hunk is kept if it starts with ` `, `+` or `-`.
///
/// Lines before the first hunk are ignored.
///
/// # Errors
///
/// Returns [`ParseError::InvalidHunkHeader`] if a line starting with `@@` does
/// not carry all four range numbers. No partial patch is returned.
///
/// # Example
///
/// ```
/// use hunktrace::{parse_patch, Operation};
///
/// let diff = "\
/// diff --git a/src/main.c b/src/main.c
/// index 3b18e51..a2c4f1e 100644
/// --- a/src/main.c
/// +++ b/src/main.c
/// @@ -10,3 +10,4 @@ int main(void)
///  foo
/// -bar
/// +baz
///  qux
/// ";
///
/// let patch = parse_patch(diff).unwrap();
/// let hunk = &patch.hunks[0];
/// assert_eq!(hunk.file_name, "src/main.c");
/// assert_eq!(hunk.hunk_no, 1);
/// assert_eq!(hunk.original_start_line, 10);
/// assert_eq!(hunk.modified_lines, 4);
/// assert_eq!(hunk.description, "int main(void)");
/// assert_eq!(hunk.lines.len(), 4);
/// assert_eq!(hunk.lines[1].operation, Operation::Deletion);
/// ```
pub fn parse_patch(content: &str) -> Result<Patch, ParseError> {
    let mut patch = Patch::default();
    let mut file_name = String::new();
    let mut hunk_no = 0;
    // Body lines only count once a hunk header has been seen.
    let mut in_hunk = false;

    for (line_index, line) in content.lines().enumerate() {
        if line.starts_with("index ") || line.starts_with("+++ ") || line.starts_with("--- ") {
            continue;
        }

        if line.starts_with("diff --git") {
            hunk_no = 0;
            let fields: Vec<_> = line.split_whitespace().collect();
            if let Some(path) = fields.get(3) {
                file_name = strip_side_prefix(path).to_string();
                debug!("Parsing hunks for file '{}'", file_name);
            } else {
                trace!(
                    "  diff header on line {} has no target path, keeping '{}'",
                    line_index + 1,
                    file_name
                );
            }
        } else if line.starts_with("@@") {
            hunk_no += 1;
            let hunk = parse_hunk_header(line, line_index + 1, &file_name, hunk_no)?;
            trace!(
                "  Hunk #{} at -{},{} +{},{}",
                hunk.hunk_no,
                hunk.original_start_line,
                hunk.original_lines,
                hunk.modified_start_line,
                hunk.modified_lines
            );
            patch.hunks.push(hunk);
            in_hunk = true;
        } else if in_hunk {
            let mut chars = line.chars();
            let Some(operation) = chars.next().and_then(Operation::from_marker) else {
                continue;
            };
            if let Some(hunk) = patch.hunks.last_mut() {
                hunk.lines.push(Line::new(operation, chars.as_str()));
            }
        }
    }

    debug!(
        "Parsed {} hunk(s) across {} file(s).",
        patch.hunks.len(),
        patch.files().len()
    );
    Ok(patch)
}

/// Parses a diff read as raw bytes.
///
/// Invalid UTF-8 sequences are replaced with `U+FFFD`, the same decoding
/// [`FsLineSource`](crate::FsLineSource) applies to target files, so lines
/// carrying the same stray bytes still compare equal.
///
/// # Example
///
/// ```
/// # use hunktrace::parse_patch_bytes;
/// let diff = b"diff --git a/f.c b/f.c\n@@ -1,1 +1,1 @@\n-/* J\xf6rg */\n+/* Joerg */\n";
/// let patch = parse_patch_bytes(diff).unwrap();
/// assert_eq!(patch.hunks[0].removed_lines(), vec!["/* J\u{FFFD}rg */"]);
/// ```
pub fn parse_patch_bytes(bytes: &[u8]) -> Result<Patch, ParseError> {
    parse_patch(&String::from_utf8_lossy(bytes))
}

fn strip_side_prefix(path: &str) -> &str {
    path.strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path)
}

fn parse_hunk_header(
    line: &str,
    line_number: usize,
    file_name: &str,
    hunk_no: usize,
) -> Result<Hunk, ParseError> {
    let invalid = || ParseError::InvalidHunkHeader {
        line: line_number,
        header: line.to_string(),
    };
    let captures = hunk_header_regex().captures(line).ok_or_else(invalid)?;
    let number = |group: usize| -> Result<usize, ParseError> {
        captures[group].parse::<usize>().map_err(|_| invalid())
    };

    Ok(Hunk {
        file_name: file_name.to_string(),
        hunk_no,
        original_start_line: number(1)?,
        original_lines: number(2)?,
        modified_start_line: number(3)?,
        modified_lines: number(4)?,
        description: captures[5].trim().to_string(),
        lines: Vec::new(),
    })
}
