//! Clock/progress driver.
//!
//! A cancellable periodic task that pushes tick events into the owning event
//! loop.  The loop samples the playback device on each tick and calls
//! [`ClockDriver::sample`] to decide whether the stage budget is used up.
//!
//! At most one timer exists per driver: `start` aborts the previous task
//! before spawning a new one, and every start bumps a generation counter so a
//! tick that was already queued by an aborted task is recognisably stale.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// What a tick sample means for the current stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress {
    Running(f64),
    /// Budget reached or the clip ended.  The driver must be stopped.
    BudgetExhausted(f64),
}

pub struct ClockDriver {
    period: Duration,
    generation: u64,
    task: Option<AbortHandle>,
}

impl ClockDriver {
    /// A zero `period` is raised to one millisecond.
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
            generation: 0,
            task: None,
        }
    }

    /// Start ticking into `tx`, cancelling any running timer first.
    /// Returns the generation carried by this timer's ticks.
    pub fn start<T, F>(&mut self, tx: mpsc::Sender<T>, make_tick: F) -> u64
    where
        T: Send + 'static,
        F: Fn(u64) -> T + Send + 'static,
    {
        self.stop();
        self.generation += 1;
        let generation = self.generation;
        let period = self.period;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tx.send(make_tick(generation)).await.is_err() {
                    break;
                }
            }
        });
        self.task = Some(handle.abort_handle());
        debug!("clock: started generation {} ({:?})", generation, period);
        generation
    }

    /// Cancel the running timer, if any.  Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("clock: stopped generation {}", self.generation);
        }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    /// True only for ticks from the timer that is currently running.
    pub fn accepts(&self, generation: u64) -> bool {
        self.task.is_some() && generation == self.generation
    }

    /// Stage-boundary check for one sample.
    pub fn sample(elapsed: f64, ended: bool, budget: f64) -> Progress {
        if ended || elapsed >= budget {
            Progress::BudgetExhausted(elapsed)
        } else {
            Progress::Running(elapsed)
        }
    }
}

impl Drop for ClockDriver {
    fn drop(&mut self) {
        self.stop();
    }
}
