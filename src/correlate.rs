//! Turning an imperfect alignment into a list of commits that likely caused it.

use crate::history::Commit;
use crate::locate::{AlignedLine, TargetFile};
use crate::patch::{Hunk, Operation};
use crate::DiagnoseOptions;
use log::{debug, trace};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

/// One step of the walk over a hunk's fuzzy alignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEntry {
    /// A retained hunk line found in the file.
    Resolved {
        hunk_line: usize,
        text_line: usize,
        operation: Operation,
        content: String,
    },
    /// A retained hunk line with no reachable counterpart in the file.
    Unresolved {
        hunk_line: usize,
        operation: Operation,
        content: String,
    },
    /// A file line skipped over between two consecutive resolved lines.
    Gap { text_line: usize, content: String },
}

/// Walks an alignment in order, inserting a [`TranscriptEntry::Gap`] for every
/// file line that sits between two resolved lines which are not adjacent.
///
/// # Example
///
/// ```
/// # use hunktrace::{build_transcript, AlignedLine, Operation, TranscriptEntry};
/// let file: Vec<String> = ["a", "new", "b"].iter().map(|s| s.to_string()).collect();
/// let aligned = |hunk_line, text_line, content: &str| AlignedLine {
///     hunk_line,
///     text_line,
///     content: content.to_string(),
///     operation: Operation::Context,
/// };
/// let transcript = build_transcript(&[aligned(0, Some(0), "a"), aligned(1, Some(2), "b")], &file);
///
/// assert_eq!(transcript.len(), 3);
/// assert_eq!(
///     transcript[1],
///     TranscriptEntry::Gap { text_line: 1, content: "new".to_string() }
/// );
/// ```
pub fn build_transcript<T: AsRef<str>>(
    alignment: &[AlignedLine],
    target_lines: &[T],
) -> Vec<TranscriptEntry> {
    let mut transcript = Vec::with_capacity(alignment.len());
    let mut prev_text_line: Option<usize> = None;

    for entry in alignment {
        let Some(text_line) = entry.text_line else {
            transcript.push(TranscriptEntry::Unresolved {
                hunk_line: entry.hunk_line,
                operation: entry.operation,
                content: entry.content.clone(),
            });
            continue;
        };

        if let Some(prev) = prev_text_line {
            if text_line != prev + 1 {
                for (i, line) in target_lines
                    .iter()
                    .enumerate()
                    .take(text_line)
                    .skip(prev + 1)
                {
                    transcript.push(TranscriptEntry::Gap {
                        text_line: i,
                        content: line.as_ref().to_string(),
                    });
                }
            }
        }

        transcript.push(TranscriptEntry::Resolved {
            hunk_line: entry.hunk_line,
            text_line,
            operation: entry.operation,
            content: entry.content.clone(),
        });
        prev_text_line = Some(text_line);
    }

    transcript
}

fn word_regex() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"[0-9A-Za-z_]+").expect("word pattern is valid"))
}

/// Length of the longest run of ASCII word characters in `line`.
///
/// # Example
///
/// ```
/// # use hunktrace::longest_token_len;
/// assert_eq!(longest_token_len("\tret = foo_bar(x);"), 7);
/// assert_eq!(longest_token_len("}"), 0);
/// ```
pub fn longest_token_len(line: &str) -> usize {
    word_regex()
        .find_iter(line)
        .map(|m| m.as_str().len())
        .max()
        .unwrap_or(0)
}

/// Why a commit was suggested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionReason {
    /// The commit's patch contains a hunk line that no longer exists in the file.
    Missing,
    /// The commit's patch removes a line that now sits inside the hunk's span.
    Other,
}

impl fmt::Display for SuggestionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuggestionReason::Missing => write!(f, "missing"),
            SuggestionReason::Other => write!(f, "other"),
        }
    }
}

/// A commit suggested as an explanation for a hunk that does not apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub file: String,
    pub hunk_no: usize,
    pub commit: String,
    pub author: String,
    pub date: String,
    pub subject: String,
    /// The text that was found in the commit's patch.
    pub ref_text: String,
    pub reason: SuggestionReason,
}

/// Suggestions accumulated over a whole run, at most one per commit.
///
/// Recording a commit that is already present replaces the earlier suggestion.
/// Iteration is ordered by commit identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuggestionSet {
    by_commit: BTreeMap<String, Suggestion>,
}

impl SuggestionSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `suggestion`, returning the one it replaced, if any.
    pub fn record(&mut self, suggestion: Suggestion) -> Option<Suggestion> {
        self.by_commit.insert(suggestion.commit.clone(), suggestion)
    }

    /// The suggestion recorded for `commit`, if any.
    pub fn get(&self, commit: &str) -> Option<&Suggestion> {
        self.by_commit.get(commit)
    }

    /// The number of distinct commits suggested.
    pub fn len(&self) -> usize {
        self.by_commit.len()
    }

    /// Returns `true` if no commit has been suggested.
    pub fn is_empty(&self) -> bool {
        self.by_commit.is_empty()
    }

    /// Iterates over the suggestions in commit identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &Suggestion> {
        self.by_commit.values()
    }
}

/// Searches `commits` for patches that explain the unresolved and gap lines of
/// one hunk's transcript, recording matches into `suggestions`.
///
/// - An unresolved line whose longest token is longer than
///   `options.token_threshold` is searched for verbatim in every commit patch.
///   Matches are recorded as [`SuggestionReason::Missing`].
/// - A gap line with a long enough token that occurs fewer than
///   `options.rarity_threshold` times in the file is searched for as a removed
///   (`-` prefixed) line. Matches are recorded as [`SuggestionReason::Other`].
///
/// Returns the number of suggestions recorded for this hunk.
pub fn correlate_hunk(
    hunk: &Hunk,
    transcript: &[TranscriptEntry],
    target: &TargetFile,
    commits: &[Commit],
    options: &DiagnoseOptions,
    suggestions: &mut SuggestionSet,
) -> usize {
    let mut recorded = 0;
    let mut record = |commit: &Commit, ref_text: &str, reason: SuggestionReason| {
        trace!(
            "    Commit {} matches '{}' ({})",
            commit.hash,
            ref_text,
            reason
        );
        suggestions.record(Suggestion {
            file: hunk.file_name.clone(),
            hunk_no: hunk.hunk_no,
            commit: commit.hash.clone(),
            author: commit.author.clone(),
            date: commit.date.clone(),
            subject: commit.subject().to_string(),
            ref_text: ref_text.to_string(),
            reason,
        });
        recorded += 1;
    };

    for entry in transcript {
        match entry {
            TranscriptEntry::Unresolved { content, .. } => {
                if longest_token_len(content) <= options.token_threshold {
                    continue;
                }
                for commit in commits.iter().filter(|c| c.patch.contains(content.as_str())) {
                    record(commit, content, SuggestionReason::Missing);
                }
            }
            TranscriptEntry::Gap { content, .. } => {
                if longest_token_len(content) <= options.token_threshold
                    || target.occurrences(content) >= options.rarity_threshold
                {
                    continue;
                }
                let removed = format!("-{}", content);
                for commit in commits.iter().filter(|c| c.patch.contains(&removed)) {
                    record(commit, &removed, SuggestionReason::Other);
                }
            }
            TranscriptEntry::Resolved { .. } => {}
        }
    }

    debug!(
        "  Hunk #{}: {} commit match(es) recorded.",
        hunk.hunk_no, recorded
    );
    recorded
}
