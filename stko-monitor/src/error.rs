use thiserror::Error;

/// Errors inside one monitor tick. The dashboard logs them and carries on.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{file}:{line}: {reason}")]
    Parse {
        file: String,
        line: usize,
        reason: String,
    },
}

pub type MonitorResult<T> = Result<T, MonitorError>;
