//! User-facing progress for upload runs.
//!
//! The orchestrator reports through the [`Progress`] trait so it never writes
//! to the terminal itself. [`TerminalProgress`] renders a spinner/bar with
//! coloured status lines; [`SilentProgress`] discards everything and is what
//! tests and library callers use.

use std::path::Path;
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::contract::Dataset;
use crate::error::UploadError;
use crate::upload::{UploadOutcome, UploadReport, UploadStatus};

pub trait Progress: Send + Sync {
    fn dataset_created(&self, _dataset: &Dataset) {}
    fn scanning(&self, _root: &Path) {}
    fn files_found(&self, _count: usize) {}
    fn file_finished(&self, _outcome: &UploadOutcome) {}
    fn completed(&self, _report: &UploadReport) {}
    fn failed(&self, _error: &UploadError) {}
}

pub struct SilentProgress;

impl Progress for SilentProgress {}

pub struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            bar.set_style(style);
        }
        bar.enable_steady_tick(Duration::from_millis(100));
        TerminalProgress { bar }
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress for TerminalProgress {
    fn dataset_created(&self, dataset: &Dataset) {
        self.bar.set_message(format!(
            "Created dataset {} ({})",
            dataset.name.cyan(),
            dataset.id
        ));
    }

    fn scanning(&self, root: &Path) {
        self.bar.set_message(format!("Scanning {}...", root.display()));
    }

    fn files_found(&self, count: usize) {
        self.bar.set_length(count as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            self.bar.set_style(style.progress_chars("#>-"));
        }
        self.bar
            .set_message(format!("Found {count} files. Starting upload..."));
    }

    fn file_finished(&self, outcome: &UploadOutcome) {
        match &outcome.status {
            UploadStatus::Succeeded { .. } => {
                self.bar
                    .set_message(format!("Uploaded: {}", outcome.path.green()));
            }
            UploadStatus::Failed { stage, message } => {
                self.bar.suspend(|| {
                    eprintln!(
                        "{} Failed to {} {}: {}",
                        "Warning:".yellow().bold(),
                        stage,
                        outcome.path.red(),
                        message
                    );
                });
            }
        }
        self.bar.inc(1);
    }

    fn completed(&self, report: &UploadReport) {
        self.bar.finish_and_clear();
        println!(
            "Dataset {} ({}): {} attempted, {} succeeded, {} failed",
            report.dataset.name.cyan(),
            report.dataset.id,
            report.attempted(),
            report.succeeded(),
            report.failed()
        );
        if report.failed() == 0 {
            println!("{}", "Upload completed successfully!".green().bold());
        } else {
            println!(
                "{}",
                format!("Upload completed with {} failed files", report.failed())
                    .yellow()
                    .bold()
            );
        }
    }

    fn failed(&self, error: &UploadError) {
        self.bar.abandon();
        eprintln!("{} {}", "Upload failed:".red().bold(), error);
    }
}
