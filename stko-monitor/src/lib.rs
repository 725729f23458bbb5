//! Headless reader for the progress files an STKO-launched OpenSees run
//! writes next to its model.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod plot;
pub mod statistics;
pub mod tail;
pub mod time_monitor;

pub use config::MonitorConfig;
pub use dashboard::{Monitor, PlotUpdate, Snapshot};
pub use error::{MonitorError, MonitorResult};
pub use plot::{Bounds, PlotSeries};
pub use statistics::{StatisticsRow, StatisticsTable};
pub use time_monitor::{read_elapsed, Elapsed};
