// Synthetic load generator
//
// Hashes a constant string as fast as possible for a fixed window, then
// reports hashes per millisecond to the coordinator and starts over. It is
// CPU-bound by construction and must run on its own OS thread.

use std::thread;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha512};
use tracing::{debug, info};

use crate::coordinator::CoordinatorHandle;

const HASH_INPUT: &[u8] = b"This is a random string";
const DEFAULT_WINDOW: Duration = Duration::from_secs(2);

/// Integer work rate for `iterations` completed within `window`
///
/// Sub-millisecond windows are treated as one millisecond.
pub fn work_rate(iterations: u64, window: Duration) -> u64 {
    let window_ms = (window.as_millis() as u64).max(1);
    iterations / window_ms
}

/// Busy-loop hashing worker
#[derive(Debug, Clone, Copy)]
pub struct LoadGenerator {
    window: Duration,
}

impl Default for LoadGenerator {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
        }
    }
}

impl LoadGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// One unit of synthetic work: SHA-512 of the constant input, hex-encoded
    pub fn hash_once() -> String {
        let digest = Sha512::digest(HASH_INPUT);
        hex::encode(digest)
    }

    /// Hash until the window has elapsed and return the iteration count
    pub fn measure_window(&self) -> u64 {
        let deadline = Instant::now() + self.window;
        let mut iterations = 0u64;
        while Instant::now() < deadline {
            std::hint::black_box(Self::hash_once());
            iterations += 1;
        }
        iterations
    }

    /// Measure windows back to back, reporting each rate through `report`
    ///
    /// Stops only when `report` returns false.
    pub fn run_with<F>(&self, mut report: F)
    where
        F: FnMut(u64) -> bool,
    {
        loop {
            let iterations = self.measure_window();
            let rate = work_rate(iterations, self.window);
            debug!(iterations, rate, "Load window complete");
            if !report(rate) {
                break;
            }
        }
    }

    /// Spawn the generator on a dedicated thread feeding `handle`
    ///
    /// The thread ends once the coordinator stops accepting events.
    pub fn spawn(self, handle: CoordinatorHandle) -> std::io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("load-generator".to_string())
            .spawn(move || {
                info!(window_ms = self.window.as_millis() as u64, "Load generator started");
                self.run_with(|rate| handle.report_work_rate_blocking(rate).is_ok());
                debug!("Load generator stopped");
            })
    }
}
