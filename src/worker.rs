//! Named background thread that runs a closure on a fixed period.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const STOP_POLL: Duration = Duration::from_millis(5);

/// Periodic worker thread, stopped and joined on [`PeriodicWorker::stop`] or drop.
#[derive(Debug)]
pub struct PeriodicWorker {
    name: String,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicWorker {
    /// Spawn `name`, calling `tick` roughly every `period`.
    ///
    /// A tick that overruns the period is followed immediately by the next one.
    pub fn spawn<F>(name: &str, period: Duration, mut tick: F) -> io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while !thread_stop.load(Ordering::Relaxed) {
                    let started = Instant::now();
                    tick();
                    if period.is_zero() {
                        thread::yield_now();
                        continue;
                    }
                    while !thread_stop.load(Ordering::Relaxed) {
                        let elapsed = started.elapsed();
                        if elapsed >= period {
                            break;
                        }
                        thread::sleep((period - elapsed).min(STOP_POLL));
                    }
                }
            })?;
        tracing::debug!("Started worker {name} (period {period:?})");
        Ok(Self {
            name: name.to_string(),
            stop,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Signal the thread and wait for its current tick to finish.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Worker {} panicked", self.name);
            } else {
                tracing::debug!("Stopped worker {}", self.name);
            }
        }
    }
}

impl Drop for PeriodicWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
