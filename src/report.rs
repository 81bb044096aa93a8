//! Human-readable rendering of a [`DiagnosisReport`].

use crate::correlate::TranscriptEntry;
use crate::diagnose::{DiagnosisReport, HunkReport, HunkStatus};
use colored::Colorize;
use std::fmt;

/// Renders a report as colored text.
///
/// Colors follow the `colored` crate's global settings, so they disappear when
/// `NO_COLOR` is set or `colored::control::set_override(false)` was called.
///
/// # Example
///
/// ```
/// # use hunktrace::{render_report, DiagnosisReport, HunkReport, HunkStatus};
/// colored::control::set_override(false);
/// let report = DiagnosisReport {
///     hunks: vec![HunkReport {
///         file_name: "src/main.c".to_string(),
///         hunk_no: 1,
///         status: HunkStatus::Perfect { index: 9 },
///     }],
///     ..DiagnosisReport::default()
/// };
/// let text = render_report(&report);
/// assert!(text.contains("Processing hunk #1 on file src/main.c"));
/// assert!(text.contains("hunk #1 applies perfectly"));
/// ```
pub fn render_report(report: &DiagnosisReport) -> String {
    report.to_string()
}

impl fmt::Display for DiagnosisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for hunk in &self.hunks {
            write_hunk(f, hunk)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f, "You may want to look at these commits:")?;
            for s in self.suggestions.iter() {
                writeln!(
                    f,
                    "File {}:H{} Commit: {} Reason {} [{}]",
                    s.file,
                    s.hunk_no,
                    s.commit.bright_yellow(),
                    s.reason,
                    s.ref_text
                )?;
                if !s.author.is_empty() {
                    writeln!(f, "    {} ({}) {}", s.author, s.date, s.subject.dimmed())?;
                }
            }
        } else if !self.all_apply() {
            writeln!(f, "No commits found that explain the failing hunks.")?;
        }
        Ok(())
    }
}

fn write_hunk(f: &mut fmt::Formatter<'_>, hunk: &HunkReport) -> fmt::Result {
    let label = format!("#{}", hunk.hunk_no);
    writeln!(
        f,
        "Processing hunk {} on file {}",
        label.yellow(),
        hunk.file_name.yellow()
    )?;

    match &hunk.status {
        HunkStatus::Perfect { .. } => {
            writeln!(f, "hunk {} {}", label.yellow(), "applies perfectly".green())
        }
        HunkStatus::Offset { offset, .. } => writeln!(
            f,
            "hunk {} {} {}",
            label.yellow(),
            "applies with offset".green(),
            offset.to_string().yellow()
        ),
        HunkStatus::Unreadable { reason } => writeln!(
            f,
            "hunk {} {}: {}",
            label.yellow(),
            "skipped".red(),
            reason
        ),
        HunkStatus::NotApplying { transcript } => {
            writeln!(f, "hunk {} {}", label.yellow(), "does NOT apply".red())?;
            for entry in transcript {
                write_transcript_entry(f, entry)?;
            }
            Ok(())
        }
    }
}

fn write_transcript_entry(f: &mut fmt::Formatter<'_>, entry: &TranscriptEntry) -> fmt::Result {
    match entry {
        TranscriptEntry::Resolved {
            operation, content, ..
        } => writeln!(
            f,
            "{}{}",
            operation.marker().to_string().bright_yellow(),
            content.green()
        ),
        TranscriptEntry::Unresolved {
            operation, content, ..
        } => writeln!(
            f,
            "{}{}",
            operation.marker().to_string().bright_yellow(),
            content.red()
        ),
        TranscriptEntry::Gap { content, .. } => writeln!(f, "{}", format!("#{}", content).yellow()),
    }
}
