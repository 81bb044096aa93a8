//! Finding where a hunk's retained lines sit in the current target file.
//!
//! Two strategies are used, in order:
//!
//! 1. [`find_exact_position`]: a byte-for-byte scan for the hunk's retained
//!    lines as one contiguous block.
//! 2. A [`HunkAligner`], by default [`GreedyAligner`], which maps each retained
//!    line to a line of the file individually when the block no longer exists
//!    as a whole.

use crate::patch::{Hunk, Operation};
use log::{debug, trace};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::collections::HashMap;

/// The current content of a target file together with its candidate-position index.
///
/// The index maps every distinct line to the ascending list of indices where it
/// occurs. It is built once on construction and never modified.
#[derive(Debug, Clone, Default)]
pub struct TargetFile {
    lines: Vec<String>,
    positions: HashMap<String, Vec<usize>>,
}

impl TargetFile {
    /// Builds the file model and its position index from a list of lines.
    ///
    /// # Example
    ///
    /// ```
    /// # use hunktrace::TargetFile;
    /// let file = TargetFile::new(vec!["a".into(), "b".into(), "a".into()]);
    /// assert_eq!(file.positions("a"), Some(&[0, 2][..]));
    /// assert_eq!(file.occurrences("b"), 1);
    /// assert_eq!(file.positions("z"), None);
    /// ```
    pub fn new(lines: Vec<String>) -> Self {
        let mut positions: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, line) in lines.iter().enumerate() {
            positions.entry(line.clone()).or_default().push(i);
        }
        Self { lines, positions }
    }

    /// Splits `content` into lines and builds the file model from them.
    pub fn from_content(content: &str) -> Self {
        Self::new(content.lines().map(String::from).collect())
    }

    /// The file's lines, without line endings.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The number of lines in the file.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns `true` if the file has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// All indices where `text` occurs, in ascending order.
    pub fn positions(&self, text: &str) -> Option<&[usize]> {
        self.positions.get(text).map(Vec::as_slice)
    }

    /// How many times `text` occurs in the file.
    pub fn occurrences(&self, text: &str) -> usize {
        self.positions.get(text).map_or(0, Vec::len)
    }
}

// --- Exact Locator ---

/// Finds the first index where the hunk's retained lines occur as one
/// contiguous block in `target_lines`.
///
/// An empty retained block matches at index 0.
///
/// # Example
///
/// ```
/// # use hunktrace::{parse_patch, find_exact_position};
/// let diff = "diff --git a/f b/f\n@@ -2,2 +2,2 @@\n two\n-three\n+3\n";
/// let hunk = &parse_patch(diff).unwrap().hunks[0];
///
/// assert_eq!(find_exact_position(hunk, &["one", "two", "three"]), Some(1));
/// assert_eq!(find_exact_position(hunk, &["one", "three", "two"]), None);
/// ```
pub fn find_exact_position<T: AsRef<str>>(hunk: &Hunk, target_lines: &[T]) -> Option<usize> {
    let retained = hunk.retained_lines();
    if retained.is_empty() {
        return Some(0);
    }
    if retained.len() > target_lines.len() {
        return None;
    }
    target_lines.windows(retained.len()).position(|window| {
        window
            .iter()
            .map(|s| s.as_ref())
            .eq(retained.iter().copied())
    })
}

/// Where an exactly matching hunk was found, relative to its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The retained lines start exactly where the header says they should.
    Perfect { index: usize },
    /// The retained lines were found elsewhere.
    Offset {
        index: usize,
        /// The header's expected 0-based index minus the found index.
        offset: isize,
    },
}

impl Placement {
    /// The 0-based index where the retained lines were found.
    pub fn index(&self) -> usize {
        match *self {
            Placement::Perfect { index } | Placement::Offset { index, .. } => index,
        }
    }
}

/// Runs the exact locator and classifies the result against the hunk header.
///
/// # Example
///
/// ```
/// # use hunktrace::{parse_patch, locate_exact, Placement};
/// let diff = "diff --git a/f b/f\n@@ -3,1 +3,1 @@\n-c\n+C\n";
/// let hunk = &parse_patch(diff).unwrap().hunks[0];
///
/// assert_eq!(locate_exact(hunk, &["a", "b", "c"]), Some(Placement::Perfect { index: 2 }));
/// assert_eq!(
///     locate_exact(hunk, &["c", "a", "b"]),
///     Some(Placement::Offset { index: 0, offset: 2 })
/// );
/// ```
pub fn locate_exact<T: AsRef<str>>(hunk: &Hunk, target_lines: &[T]) -> Option<Placement> {
    let index = find_exact_position(hunk, target_lines)?;
    let expected = hunk.expected_index();
    if index == expected {
        debug!("  Hunk #{} found exactly at index {}.", hunk.hunk_no, index);
        Some(Placement::Perfect { index })
    } else {
        let offset = expected as isize - index as isize;
        debug!(
            "  Hunk #{} found at index {} (offset {}).",
            hunk.hunk_no, index, offset
        );
        Some(Placement::Offset { index, offset })
    }
}

// --- Fuzzy Aligner ---

/// One retained hunk line and the file line it was mapped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedLine {
    /// Index of the line within [`Hunk::lines`].
    pub hunk_line: usize,
    /// The 0-based file line it was resolved to, or `None` if it is unresolved.
    pub text_line: Option<usize>,
    pub content: String,
    pub operation: Operation,
}

impl AlignedLine {
    pub fn is_resolved(&self) -> bool {
        self.text_line.is_some()
    }
}

/// A strategy for mapping a hunk's retained lines onto a drifted target file.
pub trait HunkAligner {
    /// Returns one entry per retained line considered, in hunk order.
    fn align(&self, hunk: &Hunk, target: &TargetFile) -> Vec<AlignedLine>;
}

/// Greedy, order-preserving nearest-occurrence alignment.
///
/// Every start offset in the file is scored. For a fixed offset, a cursor walks
/// forward through the file and each retained line is mapped to its nearest
/// occurrence at or after the cursor. Each match earns
/// `hunk_len - distance_from_cursor - jump_from_previous_match`, each miss costs
/// one point, and the index of the first match is subtracted at the end. Once
/// the remaining hunk lines no longer fit between the cursor and the end of the
/// file, the offset is abandoned with a score of `-file_len`. The highest
/// scoring offset wins; the first one wins a tie.
///
/// This is not a minimum edit distance alignment: there is no backtracking, so a
/// line matched too early can push later lines out of reach.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyAligner;

#[derive(Debug, Clone, Copy)]
struct Slot {
    hunk_line: usize,
    text_line: Option<usize>,
}

impl GreedyAligner {
    /// Returns the score the aligner assigns to starting at `position`.
    ///
    /// # Example
    ///
    /// ```
    /// # use hunktrace::{parse_patch, GreedyAligner, TargetFile};
    /// let diff = "diff --git a/f b/f\n@@ -1,2 +1,2 @@\n a\n b\n";
    /// let hunk = &parse_patch(diff).unwrap().hunks[0];
    /// let file = TargetFile::from_content("a\nb\nx\ny\n");
    ///
    /// // `a` costs nothing to reach, `b` is one line further on.
    /// assert_eq!(GreedyAligner.score_offset(hunk, &file, 0), 2 + (2 - 1 - 1));
    /// ```
    pub fn score_offset(&self, hunk: &Hunk, target: &TargetFile, position: usize) -> i64 {
        Self::evaluate(hunk, target, position).0
    }

    fn evaluate(hunk: &Hunk, target: &TargetFile, position: usize) -> (i64, Vec<Slot>) {
        let hunk_len = hunk.lines.len();
        let text_size = target.len();
        let mut slots = Vec::new();
        let mut cursor = position;
        let mut score: i64 = 0;
        let mut initial_offset: Option<usize> = None;
        let mut prev_pos: Option<usize> = None;

        for (i, line) in hunk.lines.iter().enumerate() {
            if cursor + (hunk_len - i) > text_size {
                score = -(text_size as i64);
                break;
            }
            if line.operation == Operation::Addition {
                continue;
            }

            // Positions are ascending, so the first one at or past the cursor is the nearest.
            let best = target.positions(&line.content).and_then(|positions| {
                let next = positions.partition_point(|&p| p < cursor);
                positions.get(next).copied()
            });

            match best {
                Some(best_pos) => {
                    let distance = best_pos - cursor;
                    let jump = best_pos - prev_pos.unwrap_or(best_pos);
                    score += hunk_len as i64 - distance as i64 - jump as i64;
                    initial_offset.get_or_insert(best_pos);
                    prev_pos = Some(best_pos);
                    cursor = best_pos;
                    slots.push(Slot {
                        hunk_line: i,
                        text_line: Some(best_pos),
                    });
                }
                None => {
                    score -= 1;
                    slots.push(Slot {
                        hunk_line: i,
                        text_line: None,
                    });
                }
            }
        }

        let initial_offset = initial_offset.map_or(-1, |o| o as i64);
        (score - initial_offset, slots)
    }

    /// Replaces `best` only on a strictly greater score.
    fn keep_better(
        best: Option<(usize, i64, Vec<Slot>)>,
        position: usize,
        score: i64,
        slots: Vec<Slot>,
    ) -> Option<(usize, i64, Vec<Slot>)> {
        match best {
            Some((_, best_score, _)) if score <= best_score => best,
            _ => {
                trace!("    New best score {} at offset {}", score, position);
                Some((position, score, slots))
            }
        }
    }
}

impl HunkAligner for GreedyAligner {
    fn align(&self, hunk: &Hunk, target: &TargetFile) -> Vec<AlignedLine> {
        trace!(
            "  Aligning hunk #{} ({} lines) against {} target lines.",
            hunk.hunk_no,
            hunk.lines.len(),
            target.len()
        );

        // Offsets are scored independently; the winner is picked in offset order
        // so that ties resolve to the lowest offset either way.
        #[cfg(feature = "parallel")]
        let best = {
            let scored: Vec<(i64, Vec<Slot>)> = (0..target.len())
                .into_par_iter()
                .map(|position| Self::evaluate(hunk, target, position))
                .collect();
            scored
                .into_iter()
                .enumerate()
                .fold(None, |best, (position, (score, slots))| {
                    Self::keep_better(best, position, score, slots)
                })
        };

        #[cfg(not(feature = "parallel"))]
        let best = (0..target.len()).fold(None, |best, position| {
            let (score, slots) = Self::evaluate(hunk, target, position);
            Self::keep_better(best, position, score, slots)
        });

        let Some((position, score, slots)) = best else {
            debug!("  Target file is empty, nothing to align against.");
            return Vec::new();
        };
        debug!(
            "  Best alignment for hunk #{} starts at offset {} (score {}).",
            hunk.hunk_no, position, score
        );

        slots
            .into_iter()
            .map(|slot| {
                let line = &hunk.lines[slot.hunk_line];
                AlignedLine {
                    hunk_line: slot.hunk_line,
                    text_line: slot.text_line,
                    content: line.content.clone(),
                    operation: line.operation,
                }
            })
            .collect()
    }
}
