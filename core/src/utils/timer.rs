//! Timing utilities
//!
//! This module provides a timer that measures the stages of one write and
//! logs stages that exceed a threshold.

use std::time::{Duration, Instant};
use std::fmt::{Display, Formatter, Result as FmtResult};
use log::{debug, warn};

/// Timer for the stages of a single write
#[derive(Debug, Clone)]
pub struct StageTimer {
    /// Name of the timed operation
    name: String,

    /// Start of the operation
    start: Instant,

    /// Start of the current stage
    stage_start: Instant,

    /// Stages slower than this are logged at warn level
    slow_threshold: Option<Duration>,

    /// Completed stages and their durations
    stages: Vec<(String, Duration)>,

    /// Whether to log the total on drop
    log_on_drop: bool,
}

impl StageTimer {
    /// Create a new timer with the given name
    pub fn new(name: impl Into<String>) -> Self {
        let now = Instant::now();
        StageTimer {
            name: name.into(),
            start: now,
            stage_start: now,
            slow_threshold: None,
            stages: Vec::new(),
            log_on_drop: true,
        }
    }

    /// Set the slow-stage threshold
    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = Some(threshold);
        self
    }

    /// Disable automatic logging on drop
    pub fn without_auto_log(mut self) -> Self {
        self.log_on_drop = false;
        self
    }

    /// Time since the timer was created
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Close the current stage, log it and start the next one
    pub fn stage(&mut self, stage: impl Into<String>) -> Duration {
        let stage = stage.into();
        let elapsed = self.stage_start.elapsed();
        if self.is_slow(elapsed) {
            warn!("{} stage {} took {:?} [SLOW]", self.name, stage, elapsed);
        } else {
            debug!("{} stage {}: {:?}", self.name, stage, elapsed);
        }
        self.stages.push((stage, elapsed));
        self.stage_start = Instant::now();
        elapsed
    }

    /// Completed stages in order
    pub fn stages(&self) -> &[(String, Duration)] {
        &self.stages
    }

    fn is_slow(&self, elapsed: Duration) -> bool {
        self.slow_threshold.map(|t| elapsed > t).unwrap_or(false)
    }

    /// Execute a closure as one named stage
    pub fn measure<F, T>(&mut self, stage: impl Into<String>, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        self.stage_start = Instant::now();
        let result = f();
        self.stage(stage);
        result
    }
}

impl Display for StageTimer {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}: {:?}", self.name, self.elapsed())
    }
}

impl Drop for StageTimer {
    fn drop(&mut self) {
        if self.log_on_drop {
            let total = self.elapsed();
            if self.is_slow(total) {
                warn!("{} completed in {:?} [SLOW]", self.name, total);
            } else {
                debug!("{} completed in {:?}", self.name, total);
            }
        }
    }
}
