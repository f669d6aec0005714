//! Parsing of ffmpeg's diagnostic stream.
//!
//! ffmpeg prints the input's `Duration:` once while opening the file, then a
//! status line roughly twice a second:
//!
//! ```text
//!   Duration: 00:01:40.00, start: 0.000000, bitrate: 1205 kb/s
//! frame=  240 fps= 60 q=28.0 size=     512kB time=00:00:10.00 bitrate= 419.4kbits/s speed=2.5x
//! ```
//!
//! Status lines are terminated by `\r`, so callers must split on both `\r`
//! and `\n` before feeding lines in.

use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Duration:\s*(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").expect("valid duration regex")
});

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"time=\s*(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").expect("valid time regex")
});

/// Parse an `HH:MM:SS(.frac)` timestamp.
///
/// ```
/// use std::time::Duration;
/// use vidbatch_av::progress::parse_timestamp;
///
/// assert_eq!(parse_timestamp("00:01:02.50"), Some(Duration::from_millis(62_500)));
/// assert_eq!(parse_timestamp("N/A"), None);
/// ```
pub fn parse_timestamp(s: &str) -> Option<Duration> {
    let mut parts = s.trim().split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return None;
    }

    Some(Duration::from_secs(hours * 3600 + minutes * 60) + Duration::from_secs_f64(seconds))
}

fn captured_timestamp(re: &Regex, line: &str) -> Option<Duration> {
    let caps = re.captures(line)?;
    parse_timestamp(&format!("{}:{}:{}", &caps[1], &caps[2], &caps[3]))
}

/// What a single diagnostic line contained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressEvent {
    /// The input duration was announced.
    Duration(Duration),
    /// A status line; `percent` is `None` until the duration is known.
    Progress {
        elapsed: Duration,
        percent: Option<f32>,
    },
    /// Anything else (banner, stream info, warnings, errors).
    Other,
}

/// Stateful parser turning ffmpeg diagnostic lines into progress.
#[derive(Debug, Clone, Default)]
pub struct ProgressParser {
    total: Option<Duration>,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total duration, once known.
    pub fn total(&self) -> Option<Duration> {
        self.total
    }

    /// Feed one line of ffmpeg output.
    pub fn feed(&mut self, line: &str) -> ProgressEvent {
        // Only the first Duration belongs to the input being converted.
        if self.total.is_none() {
            if let Some(total) = captured_timestamp(&DURATION_RE, line) {
                self.total = Some(total);
                return ProgressEvent::Duration(total);
            }
        }

        if line.contains("time=") {
            if let Some(elapsed) = captured_timestamp(&TIME_RE, line) {
                return ProgressEvent::Progress {
                    elapsed,
                    percent: self.percent(elapsed),
                };
            }
            // `time=N/A` status lines still aren't diagnostics worth keeping.
            if line.starts_with("frame=") || line.starts_with("size=") {
                return ProgressEvent::Progress {
                    elapsed: Duration::ZERO,
                    percent: None,
                };
            }
        }

        ProgressEvent::Other
    }

    fn percent(&self, elapsed: Duration) -> Option<f32> {
        let total = self.total?;
        if total.is_zero() {
            return None;
        }
        let ratio = elapsed.as_secs_f64() / total.as_secs_f64();
        Some((ratio * 100.0).clamp(0.0, 100.0) as f32)
    }
}
