//! Wall-clock progress file written by the solver

use serde::Serialize;
use std::fmt;
use std::path::Path;

pub const TIME_MONITOR_FILE: &str = "STKO_time_monitor.tim";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Elapsed {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl Elapsed {
    /// Negative spans (clock skew between the two stamps) count as zero.
    pub fn from_seconds(total: i64) -> Self {
        let total = total.max(0);
        Self {
            days: total / 86_400,
            hours: total % 86_400 / 3_600,
            minutes: total % 3_600 / 60,
            seconds: total % 60,
        }
    }

    pub fn total_seconds(&self) -> i64 {
        self.days * 86_400 + self.hours * 3_600 + self.minutes * 60 + self.seconds
    }
}

impl fmt::Display for Elapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} : {:02}:{:02}:{:02}",
            self.days, self.hours, self.minutes, self.seconds
        )
    }
}

/// Line 1 is the start stamp, line 2 the current one, both in seconds.
pub fn parse_elapsed(text: &str) -> Option<Elapsed> {
    let mut lines = text.lines().map(str::trim);
    let start: i64 = lines.next()?.parse().ok()?;
    let now: i64 = lines.next()?.parse().ok()?;
    Some(Elapsed::from_seconds(now - start))
}

pub fn read_elapsed(path: &Path) -> Option<Elapsed> {
    let text = std::fs::read_to_string(path).ok()?;
    let elapsed = parse_elapsed(&text);
    if elapsed.is_none() {
        tracing::debug!("{} is not complete yet", path.display());
    }
    elapsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        assert_eq!(parse_elapsed("0\n90061\n").unwrap().to_string(), "1 : 01:01:01");
        assert_eq!(Elapsed::from_seconds(59).to_string(), "0 : 00:00:59");
        assert_eq!(Elapsed::from_seconds(-5).to_string(), "0 : 00:00:00");
        assert_eq!(Elapsed::from_seconds(90061).total_seconds(), 90061);
    }

    #[test]
    fn test_incomplete_file() {
        assert!(parse_elapsed("1700000000\n").is_none());
        assert!(parse_elapsed("start\n12\n").is_none());
        assert!(read_elapsed(Path::new("/nonexistent/STKO_time_monitor.tim")).is_none());
    }
}
