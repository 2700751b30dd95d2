//! Progress reporting for a scan.
//!
//! [`Notifier`] picks between an `indicatif` progress bar and plain log lines
//! from a single verbosity switch:
//! - [`VerbosityLevel::Quiet`] → only warnings are logged; a bar tracks containers.
//! - [`VerbosityLevel::Info`]/[`VerbosityLevel::Debug`]/[`VerbosityLevel::Trace`] → text logs.
//!
//! Warnings raised while the bar is drawn go through [`Progress::warn`] so they
//! are not overwritten by the next redraw.

use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn, LevelFilter};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VerbosityLevel {
    Quiet = 0, // Progress bar, warnings only
    Info = 1,
    Debug = 2,
    Trace = 3,
}

impl From<u8> for VerbosityLevel {
    fn from(level: u8) -> Self {
        match level {
            0 => VerbosityLevel::Quiet,
            1 => VerbosityLevel::Info,
            2 => VerbosityLevel::Debug,
            _ => VerbosityLevel::Trace,
        }
    }
}

impl VerbosityLevel {
    pub fn to_log_level(self) -> LevelFilter {
        match self {
            VerbosityLevel::Quiet => LevelFilter::Warn,
            VerbosityLevel::Info => LevelFilter::Info,
            VerbosityLevel::Debug => LevelFilter::Debug,
            VerbosityLevel::Trace => LevelFilter::Trace,
        }
    }
}

pub struct Notifier {
    verbosity: VerbosityLevel,
    show_bar: bool,
}

impl Notifier {
    /// `allow_bar` lets callers turn the bar off when stdout carries machine output
    pub fn new(verbosity_level: u8, allow_bar: bool) -> Self {
        let verbosity = VerbosityLevel::from(verbosity_level);
        Self {
            verbosity,
            show_bar: allow_bar && verbosity == VerbosityLevel::Quiet,
        }
    }

    /// Notifier that never draws; used by tests and library callers
    pub fn silent() -> Self {
        Self::new(0, false)
    }

    pub fn verbosity_level(&self) -> VerbosityLevel {
        self.verbosity
    }

    pub fn log_level(&self) -> LevelFilter {
        self.verbosity.to_log_level()
    }

    pub fn start(&self, total: u64, message: &str) -> Progress {
        if !self.show_bar {
            info!("{} ({} total)", message, total);
            return Progress { bar: None, total };
        }

        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>4}/{len:4} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        let bar = ProgressBar::new(total);
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_message(message.to_string());
        Progress {
            bar: Some(bar),
            total,
        }
    }
}

/// Handle for one tracked loop, returned by [`Notifier::start`]
pub struct Progress {
    bar: Option<ProgressBar>,
    total: u64,
}

impl Progress {
    pub fn step(&self, current: u64, item: &str) {
        match &self.bar {
            Some(bar) => {
                bar.set_position(current);
                bar.set_message(item.to_string());
            }
            None => info!("[{}/{}] {}", current, self.total, item),
        }
    }

    pub fn warn(&self, message: &str) {
        match &self.bar {
            Some(bar) => bar.suspend(|| warn!("{}", message)),
            None => warn!("{}", message),
        }
    }

    pub fn finish(self) {
        if let Some(bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}
