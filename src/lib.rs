//! Diagnose why a unified diff no longer applies, and find the commits that explain it.
//!
//! `hunktrace` is for the engineer rebasing or backporting a patch onto a
//! codebase that has moved on since the patch was written. It never modifies
//! the target tree. For each hunk it answers two questions:
//!
//! 1. **Does it still apply?** The hunk's context and deletion lines are looked
//!    up as one contiguous block. If found, the hunk applies, either exactly
//!    where its header says or at an offset.
//! 2. **If not, why?** The hunk is aligned line by line against the current
//!    file, which shows which expected lines are gone and which foreign lines
//!    now sit in the middle of the hunk. Those lines are then searched for in
//!    the file's commit history to point at the commits that removed or
//!    inserted them.
//!
//! ## Getting Started
//!
//! ```rust
//! use hunktrace::{
//!     diagnose_patch, parse_patch, Commit, DiagnoseOptions, HistoryError, HistorySource,
//!     HunkStatus, LineSource,
//! };
//! use std::io;
//! use std::path::Path;
//!
//! struct Tree;
//! impl LineSource for Tree {
//!     fn read_lines(&self, _path: &Path) -> io::Result<Vec<String>> {
//!         let lines = ["int x;", "int z;", "", "int main(void)", "{", "}"];
//!         Ok(lines.iter().map(|s| s.to_string()).collect())
//!     }
//! }
//!
//! struct Log;
//! impl HistorySource for Log {
//!     fn fetch_history(&self, _path: &Path) -> Result<Vec<Commit>, HistoryError> {
//!         Ok(vec![Commit {
//!             hash: "c0ffee".into(),
//!             patch: "diff --git a/f.c b/f.c\n-int unused_counter;\n".into(),
//!             ..Commit::default()
//!         }])
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let diff = "\
//! diff --git a/f.c b/f.c
//! @@ -1,3 +1,3 @@
//!  int x;
//! -int unused_counter;
//! +int y;
//!  int z;
//! ";
//! let patch = parse_patch(diff)?;
//! let report = diagnose_patch(&patch, &Tree, &Log, &DiagnoseOptions::default())?;
//!
//! assert!(matches!(report.hunks[0].status, HunkStatus::NotApplying { .. }));
//! assert!(report.suggestions.get("c0ffee").is_some());
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Concepts
//!
//! - [`Patch`], [`Hunk`] and [`Line`] model a parsed diff. [`parse_patch`]
//!   builds them from `git diff` style text.
//! - [`find_exact_position`] and [`locate_exact`] are the exact locator.
//! - [`GreedyAligner`] is the fuzzy aligner, behind the [`HunkAligner`] trait.
//! - [`correlate_hunk`] matches unresolved and gap lines against [`Commit`]
//!   patches, collecting at most one [`Suggestion`] per commit in a
//!   [`SuggestionSet`].
//! - [`LineSource`] and [`HistorySource`] are the two external capabilities:
//!   [`FsLineSource`] and [`GitHistory`] are the real ones.
//! - [`render_report`] turns a [`DiagnosisReport`] into colored text.
//!
//! ## Feature Flags
//!
//! ### `parallel`
//!
//! - **Enabled by default.**
//! - Scores the candidate start offsets of the fuzzy aligner on a
//!   [`rayon`](https://crates.io/crates/rayon) thread pool. The result is
//!   identical to the sequential scan.
use std::path::PathBuf;
use thiserror::Error;

mod correlate;
mod diagnose;
mod history;
mod locate;
mod patch;
mod report;

pub use correlate::{
    build_transcript, correlate_hunk, longest_token_len, Suggestion, SuggestionReason,
    SuggestionSet, TranscriptEntry,
};
pub use diagnose::{
    diagnose_patch, diagnose_patch_with, DiagnosisReport, FsLineSource, HunkReport, HunkStatus,
    LineSource,
};
pub use history::{parse_git_log, Commit, GitHistory, HistorySource};
pub use locate::{
    find_exact_position, locate_exact, AlignedLine, GreedyAligner, HunkAligner, Placement,
    TargetFile,
};
pub use patch::{parse_patch, parse_patch_bytes, Hunk, Line, Operation, Patch};
pub use report::render_report;

// --- Error Types ---

/// Represents errors that can occur while parsing a diff.
#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    /// A line starting with `@@` did not have the `@@ -O,o +M,m @@` shape.
    #[error("Invalid hunk header on line {line}: '{header}'")]
    InvalidHunkHeader {
        /// The 1-based line number of the header.
        line: usize,
        header: String,
    },
}

/// Represents errors that can occur while fetching a file's commit history.
#[derive(Error, Debug)]
pub enum HistoryError {
    /// `git` could not be started.
    #[error("Failed to run git for '{}': {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// `git log` ran but exited unsuccessfully.
    #[error("git log failed for '{}' ({status}): {stderr}", .path.display())]
    GitFailed {
        path: PathBuf,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Represents the "hard" errors that stop a diagnostic run.
#[derive(Error, Debug)]
pub enum DiagnoseError {
    /// The target file of a hunk does not exist.
    #[error("Target file not found: {0}")]
    TargetNotFound(PathBuf),
    /// The user does not have permission to read the specified path.
    #[error("Permission denied for path: {path:?}")]
    PermissionDenied { path: PathBuf },
    /// The target path exists but is a directory, not a file.
    #[error("Target path is a directory, not a file: {path:?}")]
    TargetIsDirectory { path: PathBuf },
    /// Any other I/O error while reading a target file.
    #[error("I/O error while reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Fetching a file's commit history failed.
    #[error(transparent)]
    History(#[from] HistoryError),
}

// --- Options ---

/// Options for configuring a diagnostic run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnoseOptions {
    /// If `true`, a hunk whose target file cannot be read is reported as
    /// [`HunkStatus::Unreadable`] instead of aborting the run.
    pub keep_going: bool,
    /// A line is only searched for in commit history if its longest word is
    /// longer than this many characters.
    pub token_threshold: usize,
    /// A gap line is only searched for if it occurs fewer than this many times
    /// in the target file.
    pub rarity_threshold: usize,
}

impl Default for DiagnoseOptions {
    fn default() -> Self {
        Self {
            keep_going: false,
            token_threshold: 5,
            rarity_threshold: 3,
        }
    }
}

impl DiagnoseOptions {
    /// Creates a new builder for `DiagnoseOptions`.
    ///
    /// # Example
    ///
    /// ```
    /// # use hunktrace::DiagnoseOptions;
    /// let options = DiagnoseOptions::builder()
    ///     .keep_going(true)
    ///     .token_threshold(8)
    ///     .build();
    ///
    /// assert!(options.keep_going);
    /// assert_eq!(options.token_threshold, 8);
    /// assert_eq!(options.rarity_threshold, 3);
    /// ```
    pub fn builder() -> DiagnoseOptionsBuilder {
        DiagnoseOptionsBuilder::default()
    }
}

/// A builder for creating `DiagnoseOptions`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnoseOptionsBuilder {
    keep_going: Option<bool>,
    token_threshold: Option<usize>,
    rarity_threshold: Option<usize>,
}

impl DiagnoseOptionsBuilder {
    /// Report unreadable target files per hunk instead of aborting.
    pub fn keep_going(mut self, keep_going: bool) -> Self {
        self.keep_going = Some(keep_going);
        self
    }

    /// Sets the minimum longest-word length (exclusive) for history searches.
    pub fn token_threshold(mut self, token_threshold: usize) -> Self {
        self.token_threshold = Some(token_threshold);
        self
    }

    /// Sets the occurrence count (exclusive) below which a gap line is searched for.
    pub fn rarity_threshold(mut self, rarity_threshold: usize) -> Self {
        self.rarity_threshold = Some(rarity_threshold);
        self
    }

    /// Builds the `DiagnoseOptions`.
    pub fn build(self) -> DiagnoseOptions {
        let default = DiagnoseOptions::default();
        DiagnoseOptions {
            keep_going: self.keep_going.unwrap_or(default.keep_going),
            token_threshold: self.token_threshold.unwrap_or(default.token_threshold),
            rarity_threshold: self.rarity_threshold.unwrap_or(default.rarity_threshold),
        }
    }
}
