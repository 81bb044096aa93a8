//! The per-hunk diagnostic pipeline.

use crate::correlate::{build_transcript, correlate_hunk, SuggestionSet, TranscriptEntry};
use crate::history::{Commit, HistorySource};
use crate::locate::{locate_exact, GreedyAligner, HunkAligner, Placement, TargetFile};
use crate::patch::Patch;
use crate::{DiagnoseError, DiagnoseOptions};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A source of target file content.
pub trait LineSource {
    fn read_lines(&self, path: &Path) -> io::Result<Vec<String>>;
}

/// Reads target files from disk, relative to a root directory.
#[derive(Debug, Clone)]
pub struct FsLineSource {
    root: PathBuf,
}

impl FsLineSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl LineSource for FsLineSource {
    fn read_lines(&self, path: &Path) -> io::Result<Vec<String>> {
        let full_path = self.root.join(path);
        if full_path.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("'{}' is a directory", full_path.display()),
            ));
        }
        let bytes = fs::read(&full_path)?;
        Ok(String::from_utf8_lossy(&bytes)
            .lines()
            .map(String::from)
            .collect())
    }
}

/// The outcome for one hunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HunkStatus {
    /// The hunk applies exactly where its header says.
    Perfect { index: usize },
    /// The hunk applies exactly, but at a different position.
    Offset { index: usize, offset: isize },
    /// The hunk does not apply; this is the best-effort alignment walk.
    NotApplying { transcript: Vec<TranscriptEntry> },
    /// The target file could not be read and the run was told to keep going.
    Unreadable { reason: String },
}

impl From<Placement> for HunkStatus {
    fn from(placement: Placement) -> Self {
        match placement {
            Placement::Perfect { index } => HunkStatus::Perfect { index },
            Placement::Offset { index, offset } => HunkStatus::Offset { index, offset },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunkReport {
    pub file_name: String,
    pub hunk_no: usize,
    pub status: HunkStatus,
}

/// Everything learned about a patch in one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosisReport {
    pub hunks: Vec<HunkReport>,
    pub suggestions: SuggestionSet,
}

impl DiagnosisReport {
    /// Returns `true` if every hunk applies exactly, with or without an offset.
    pub fn all_apply(&self) -> bool {
        self.hunks.iter().all(|h| {
            matches!(
                h.status,
                HunkStatus::Perfect { .. } | HunkStatus::Offset { .. }
            )
        })
    }
}

/// Converts a `std::io::Error` into a more specific `DiagnoseError`.
fn map_io_error(path: PathBuf, e: io::Error) -> DiagnoseError {
    match e.kind() {
        io::ErrorKind::NotFound => DiagnoseError::TargetNotFound(path),
        io::ErrorKind::PermissionDenied => DiagnoseError::PermissionDenied { path },
        io::ErrorKind::IsADirectory => DiagnoseError::TargetIsDirectory { path },
        _ => DiagnoseError::Io { path, source: e },
    }
}

/// Diagnoses every hunk of `patch` with the default [`GreedyAligner`].
///
/// See [`diagnose_patch_with`].
pub fn diagnose_patch(
    patch: &Patch,
    lines: &impl LineSource,
    history: &impl HistorySource,
    options: &DiagnoseOptions,
) -> Result<DiagnosisReport, DiagnoseError> {
    diagnose_patch_with(patch, lines, history, &GreedyAligner, options)
}

/// Diagnoses every hunk of `patch`, in order.
///
/// For each hunk the exact locator runs first. If it fails, the file's commit
/// history is fetched, the hunk is aligned with `aligner`, and the resulting
/// transcript is correlated against the history. Suggestions accumulate across
/// all hunks.
///
/// Target files and histories are read at most once per path during a run.
///
/// # Errors
///
/// - A target file that cannot be read aborts the run, unless
///   `options.keep_going` is set, in which case the hunk is reported as
///   [`HunkStatus::Unreadable`].
/// - A failure to fetch history always aborts the run.
pub fn diagnose_patch_with(
    patch: &Patch,
    lines: &impl LineSource,
    history: &impl HistorySource,
    aligner: &dyn HunkAligner,
    options: &DiagnoseOptions,
) -> Result<DiagnosisReport, DiagnoseError> {
    let mut report = DiagnosisReport::default();
    let mut files: HashMap<&str, TargetFile> = HashMap::new();
    let mut histories: HashMap<&str, Vec<Commit>> = HashMap::new();
    let total_hunks = patch.hunks.len();

    for (i, hunk) in patch.hunks.iter().enumerate() {
        info!(
            "Processing hunk #{} on file {} ({}/{})",
            hunk.hunk_no,
            hunk.file_name,
            i + 1,
            total_hunks
        );
        let path = Path::new(&hunk.file_name);

        if !files.contains_key(hunk.file_name.as_str()) {
            match lines.read_lines(path) {
                Ok(content) => {
                    debug!("  Read {} lines from '{}'.", content.len(), hunk.file_name);
                    files.insert(&hunk.file_name, TargetFile::new(content));
                }
                Err(e) => {
                    let error = map_io_error(path.to_path_buf(), e);
                    if !options.keep_going {
                        return Err(error);
                    }
                    warn!("  Skipping hunk #{}: {}", hunk.hunk_no, error);
                    report.hunks.push(HunkReport {
                        file_name: hunk.file_name.clone(),
                        hunk_no: hunk.hunk_no,
                        status: HunkStatus::Unreadable {
                            reason: error.to_string(),
                        },
                    });
                    continue;
                }
            }
        }
        let Some(target) = files.get(hunk.file_name.as_str()) else {
            continue;
        };

        let status = match locate_exact(hunk, target.lines()) {
            Some(placement) => HunkStatus::from(placement),
            None => {
                debug!(
                    "  No exact match for hunk #{}, aligning fuzzily.",
                    hunk.hunk_no
                );
                if !histories.contains_key(hunk.file_name.as_str()) {
                    let commits = history.fetch_history(path)?;
                    histories.insert(&hunk.file_name, commits);
                }
                let commits = histories
                    .get(hunk.file_name.as_str())
                    .map(Vec::as_slice)
                    .unwrap_or_default();

                let alignment = aligner.align(hunk, target);
                let transcript = build_transcript(&alignment, target.lines());
                correlate_hunk(
                    hunk,
                    &transcript,
                    target,
                    commits,
                    options,
                    &mut report.suggestions,
                );
                HunkStatus::NotApplying { transcript }
            }
        };

        report.hunks.push(HunkReport {
            file_name: hunk.file_name.clone(),
            hunk_no: hunk.hunk_no,
            status,
        });
    }

    info!(
        "Diagnosed {} hunk(s); {} commit(s) suggested.",
        report.hunks.len(),
        report.suggestions.len()
    );
    Ok(report)
}
