//! Step Runner - background thread that steps a shared world at a fixed cadence
//!
//! The world itself never schedules anything; this is one possible caller.
//! The mutex serializes the runner's ticks with any other caller's access.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::world::{StepSummary, WorldSimulation};

pub type SharedWorld = Arc<Mutex<WorldSimulation>>;

pub struct StepRunner {
    is_running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl StepRunner {
    pub fn new() -> Self {
        Self {
            is_running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Step `world` once every `interval`, handing each summary to `callback`.
    ///
    /// The thread stops on its own if a step fails or the lock is poisoned.
    pub fn start<F>(&mut self, world: SharedWorld, interval: Duration, callback: F)
    where
        F: Fn(StepSummary) + Send + 'static,
    {
        if self.is_running.load(Ordering::Relaxed) {
            tracing::warn!("step runner already running");
            return;
        }

        tracing::info!(interval_ms = interval.as_millis() as u64, "starting step runner");
        self.is_running.store(true, Ordering::Relaxed);
        let running = Arc::clone(&self.is_running);

        let handle = thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                let summary = match world.lock() {
                    Ok(mut w) => w.step(1),
                    Err(_) => {
                        tracing::error!("world lock poisoned; stopping runner");
                        break;
                    }
                };
                match summary {
                    Ok(summary) => callback(summary),
                    Err(e) => {
                        tracing::error!(error = %e, "step failed; stopping runner");
                        break;
                    }
                }
                thread::sleep(interval);
            }
            running.store(false, Ordering::Relaxed);
            tracing::info!("step runner thread stopped");
        });

        self.thread_handle = Some(handle);
    }

    pub fn stop(&mut self) {
        self.is_running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join(); // Thread panic result intentionally ignored during shutdown
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }
}

impl Default for StepRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for StepRunner {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::generation::AgentParams;
    use std::sync::atomic::AtomicU64;

    #[test]
    fn test_step_runner() {
        let world: SharedWorld = Arc::new(Mutex::new(
            WorldSimulation::new(SimulationConfig::default()).unwrap(),
        ));
        for _ in 0..10 {
            world.lock().unwrap().create_agent(AgentParams::new()).unwrap();
        }

        let tick_count = Arc::new(AtomicU64::new(0));
        let tick_count_clone = Arc::clone(&tick_count);

        let mut runner = StepRunner::new();
        runner.start(Arc::clone(&world), Duration::from_millis(10), move |summary| {
            tick_count_clone.fetch_add(summary.ticks, Ordering::Relaxed);
        });
        assert!(runner.is_running());

        thread::sleep(Duration::from_millis(200));
        runner.stop();
        assert!(!runner.is_running());

        let count = tick_count.load(Ordering::Relaxed);
        assert!(count >= 1, "expected at least one tick, got {count}");
        assert_eq!(world.lock().unwrap().clock().ticks, count);
    }
}
