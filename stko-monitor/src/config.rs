use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub dir: PathBuf,
    pub interval: Duration,
}

impl MonitorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let interval_ms = lookup("STKO_MONITOR_INTERVAL_MS").and_then(|v| match v.trim().parse::<u64>() {
            Ok(0) | Err(_) => {
                tracing::warn!("Ignoring invalid STKO_MONITOR_INTERVAL_MS '{}'", v);
                None
            }
            Ok(ms) => Some(ms),
        });

        Self {
            dir: lookup("STKO_MONITOR_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            interval: Duration::from_millis(interval_ms.unwrap_or(1000)),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
