//! Commit history for a file, as reported by `git log -p`.

use crate::HistoryError;
use log::{debug, trace};
use std::path::{Path, PathBuf};
use std::process::Command;

/// A commit touching a file, with the full patch it applied to that file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Commit {
    pub hash: String,
    pub author: String,
    pub date: String,
    pub message: String,
    /// The commit's patch text, starting at its first `diff --git` line.
    pub patch: String,
}

impl Commit {
    /// The first non-blank line of the commit message.
    pub fn subject(&self) -> &str {
        self.message
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("")
    }
}

/// A source of commit history for files of one repository.
///
/// Commits are expected newest first.
pub trait HistorySource {
    fn fetch_history(&self, file_path: &Path) -> Result<Vec<Commit>, HistoryError>;
}

/// Fetches history by running `git log -p` in a repository.
#[derive(Debug, Clone)]
pub struct GitHistory {
    repo_root: PathBuf,
}

impl GitHistory {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }
}

impl HistorySource for GitHistory {
    fn fetch_history(&self, file_path: &Path) -> Result<Vec<Commit>, HistoryError> {
        debug!(
            "Fetching history of '{}' from '{}'",
            file_path.display(),
            self.repo_root.display()
        );
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.repo_root)
            .args(["log", "-p", "--no-color", "--no-decorate", "--"])
            .arg(file_path)
            .output()
            .map_err(|source| HistoryError::Spawn {
                path: file_path.to_path_buf(),
                source,
            })?;

        if !output.status.success() {
            return Err(HistoryError::GitFailed {
                path: file_path.to_path_buf(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let commits = parse_git_log(&String::from_utf8_lossy(&output.stdout));
        debug!(
            "  {} commit(s) found for '{}'",
            commits.len(),
            file_path.display()
        );
        Ok(commits)
    }
}

/// Parses the output of `git log -p` into commits.
///
/// # Example
///
/// ```
/// # use hunktrace::parse_git_log;
/// let log = "\
/// commit 1f2e3d
/// Author: Ada <ada@example.com>
/// Date:   Mon Jan 1 00:00:00 2024 +0000
///
///     Drop the legacy probe path
///
/// diff --git a/drv.c b/drv.c
/// @@ -1,2 +1,1 @@
///  keep
/// -legacy_probe();
/// ";
/// let commits = parse_git_log(log);
/// assert_eq!(commits.len(), 1);
/// assert_eq!(commits[0].hash, "1f2e3d");
/// assert_eq!(commits[0].author, "Ada <ada@example.com>");
/// assert_eq!(commits[0].subject(), "Drop the legacy probe path");
/// assert!(commits[0].patch.contains("-legacy_probe();"));
/// ```
pub fn parse_git_log(log: &str) -> Vec<Commit> {
    let mut commits = Vec::new();
    let mut current: Option<Commit> = None;
    let mut in_patch = false;

    for line in log.lines() {
        if let Some(hash) = line.strip_prefix("commit ") {
            commits.extend(current.take());
            trace!("  Reading commit {}", hash);
            current = Some(Commit {
                hash: hash.trim().to_string(),
                ..Commit::default()
            });
            in_patch = false;
            continue;
        }
        let Some(commit) = current.as_mut() else {
            continue;
        };

        if let Some(author) = line.strip_prefix("Author: ") {
            commit.author = author.to_string();
        } else if let Some(date) = line.strip_prefix("Date:   ") {
            commit.date = date.to_string();
        } else if line.starts_with("diff --git ") || in_patch {
            in_patch = true;
            commit.patch.push_str(line);
            commit.patch.push('\n');
        } else {
            commit.message.push_str(line);
            commit.message.push('\n');
        }
    }

    commits.extend(current);
    commits
}
