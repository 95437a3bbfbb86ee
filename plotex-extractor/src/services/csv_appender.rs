//! Durable CSV appends under multi-process contention
//!
//! Several extractor processes (one per plot) may append to the same CSV file.
//! There is no locking: a failed open is retried after a randomized backoff so
//! that colliding writers spread out.
//!
//! **Open loop:**
//! 1. Attempt append-mode open
//! 2. On failure, if attempts remain: compute the next delay, sleep, retry
//! 3. After `max_attempts` failures: log ERROR, report `false`
//!
//! **Backoff:** see [`next_delay`].
//!
//! The header is written when the opened file is empty. That check is made on
//! the open handle, so it holds across process restarts and concurrent writers.

use plotex_common::config::CsvConfig;
use plotex_common::{Error, Result};
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

/// Source of uniformly distributed values in `[0, 1)`
pub trait UnitDraw {
    fn draw(&mut self) -> f64;
}

/// OS entropy, falling back to the thread-local PRNG if the OS source fails
#[derive(Debug)]
pub struct SystemDraw {
    os_available: bool,
}

impl SystemDraw {
    pub fn new() -> Self {
        Self { os_available: true }
    }
}

impl Default for SystemDraw {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitDraw for SystemDraw {
    fn draw(&mut self) -> f64 {
        if self.os_available {
            let mut bytes = [0u8; 8];
            match OsRng.try_fill_bytes(&mut bytes) {
                Ok(()) => return unit_from_bits(u64::from_le_bytes(bytes)),
                Err(e) => {
                    // Don't try the OS source again for this appender
                    tracing::debug!("OS random source unavailable, using thread RNG: {}", e);
                    self.os_available = false;
                }
            }
        }
        rand::thread_rng().gen::<f64>()
    }
}

/// 53 high bits -> [0, 1)
fn unit_from_bits(bits: u64) -> f64 {
    (bits >> 11) as f64 / (1u64 << 53) as f64
}

/// Seconds (or configured time units) to wait before the next open attempt
///
/// - No previous delay: exactly 1, without consuming a draw.
/// - Otherwise `trunc(previous * u * 100) / 10` for a draw `u`.
/// - If that exceeds `ceiling`, the result is a fresh small delay
///   `max(0.1, trunc(u * 100) / 10)` instead of the ceiling.
pub fn next_delay(previous: Option<f64>, ceiling: f64, rng: &mut dyn UnitDraw) -> f64 {
    let Some(previous) = previous else {
        return 1.0;
    };

    let multiplier = rng.draw();
    let delay = (previous * multiplier * 100.0).trunc() / 10.0;
    if delay > ceiling {
        // TODO: confirm whether overflow should cap at `ceiling`; this redraw keeps
        // parity with the deployed extractors.
        return f64::max(0.1, (multiplier * 100.0).trunc() / 10.0);
    }
    delay
}

/// Appender for one shared CSV file at a time
pub struct CsvAppender {
    max_attempts: u32,
    max_sleep: f64,
    time_unit: Duration,
    rng: Box<dyn UnitDraw + Send>,
}

impl CsvAppender {
    /// Create appender from settings; delays are in seconds
    pub fn new(config: &CsvConfig) -> Self {
        Self {
            max_attempts: config.max_open_attempts.max(1),
            max_sleep: config.max_open_sleep_secs,
            time_unit: Duration::from_secs(1),
            rng: Box::new(SystemDraw::new()),
        }
    }

    /// Length of one backoff unit (1 s by default)
    pub fn with_time_unit(mut self, time_unit: Duration) -> Self {
        self.time_unit = time_unit;
        self
    }

    /// Replace the random source
    pub fn with_rng(mut self, rng: Box<dyn UnitDraw + Send>) -> Self {
        self.rng = rng;
        self
    }

    /// Append `data` to `path`, preceded by `header` when the file is empty
    ///
    /// Returns `Ok(false)` when the file could not be opened after all attempts
    /// or the write failed; `Err` only for an empty path or empty data.
    pub async fn append(&mut self, path: &Path, header: &str, data: &str) -> Result<bool> {
        if path.as_os_str().is_empty() || data.is_empty() {
            return Err(Error::InvalidInput(
                "Empty parameter passed to CSV append".to_string(),
            ));
        }

        let Some(mut file) = self.open_with_retry(path).await else {
            tracing::error!("Unable to open CSV file for writing: '{}'", path.display());
            return Ok(false);
        };

        match write_lines(&mut file, header, data) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Appended CSV row");
                Ok(true)
            }
            Err(e) => {
                tracing::error!("Exception while writing CSV file: '{}'", path.display());
                tracing::error!("    {}", e);
                Ok(false)
            }
        }
    }

    async fn open_with_retry(&mut self, path: &Path) -> Option<File> {
        let mut previous: Option<f64> = None;

        for attempt in 1..=self.max_attempts {
            match OpenOptions::new().create(true).append(true).open(path) {
                Ok(file) => {
                    if attempt > 1 {
                        tracing::debug!(path = %path.display(), attempt, "CSV file opened after retry");
                    }
                    return Some(file);
                }
                Err(e) => {
                    tracing::debug!(path = %path.display(), attempt, "CSV open failed: {}", e);
                }
            }

            if attempt < self.max_attempts {
                let delay = next_delay(previous, self.max_sleep, self.rng.as_mut());
                tracing::info!(
                    "Sleeping for {} seconds before trying to open CSV file again",
                    delay
                );
                tokio::time::sleep(self.time_unit.mul_f64(delay)).await;
                previous = Some(delay);
            }
        }

        None
    }
}

/// Header check and data line; both go out in one write
fn write_lines(file: &mut File, header: &str, data: &str) -> io::Result<()> {
    let mut buffer = String::with_capacity(header.len() + data.len() + 2);
    if file.metadata()?.len() == 0 && !header.is_empty() {
        buffer.push_str(header);
        buffer.push('\n');
    }
    buffer.push_str(data);
    buffer.push('\n');

    file.write_all(buffer.as_bytes())?;
    file.flush()
}
