use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, info};

/// Stages of a sequence load, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadStep {
    ListInputs,
    Decode,
    Stack,
}

impl LoadStep {
    pub const ALL: [LoadStep; 3] = [LoadStep::ListInputs, LoadStep::Decode, LoadStep::Stack];

    pub fn as_str(self) -> &'static str {
        match self {
            LoadStep::ListInputs => "list_inputs",
            LoadStep::Decode => "decode",
            LoadStep::Stack => "stack",
        }
    }
}

impl fmt::Display for LoadStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wall-clock time spent in each [`LoadStep`] of one `open` call.
#[derive(Debug, Default, Clone)]
pub struct LoadTimings {
    elapsed: [Duration; 3],
}

impl LoadTimings {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(step: LoadStep) -> usize {
        step as usize
    }

    /// Adds `duration` to `step`; a step timed twice accumulates.
    pub fn record(&mut self, step: LoadStep, duration: Duration) {
        self.elapsed[Self::slot(step)] += duration;
    }

    /// Runs `f` and charges its wall time to `step`.
    pub fn time<T>(&mut self, step: LoadStep, f: impl FnOnce() -> T) -> T {
        let timer = StepTimer::start(step);
        let out = f();
        let (step, duration) = timer.stop();
        self.record(step, duration);
        out
    }

    pub fn get(&self, step: LoadStep) -> Duration {
        self.elapsed[Self::slot(step)]
    }

    pub fn total(&self) -> Duration {
        self.elapsed.iter().sum()
    }

    /// MiB per second over the whole load, `None` before anything was timed.
    pub fn throughput_mib_s(&self, bytes: usize) -> Option<f64> {
        let secs = self.total().as_secs_f64();
        (secs > 0.0).then(|| bytes as f64 / 1024.0 / 1024.0 / secs)
    }

    pub fn log_summary(&self) {
        let total = self.total().as_secs_f64();
        for step in LoadStep::ALL {
            let secs = self.get(step).as_secs_f64();
            let share = if total > 0.0 { secs / total * 100.0 } else { 0.0 };
            debug!(step = %step, ms = secs * 1000.0, share_pct = share, "step timing");
        }
        info!("load took {:.3}ms", total * 1000.0);
    }
}

/// Running measurement of a single step.
pub struct StepTimer {
    step: LoadStep,
    start: Instant,
}

impl StepTimer {
    pub fn start(step: LoadStep) -> Self {
        Self {
            step,
            start: Instant::now(),
        }
    }

    pub fn stop(self) -> (LoadStep, Duration) {
        (self.step, self.start.elapsed())
    }
}
