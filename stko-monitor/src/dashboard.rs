use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::plot::{AxisLabels, Bounds, PlotSeries, PLOT_EXTENSION};
use crate::statistics::{StatisticsRow, StatisticsTable, STATISTICS_FILE};
use crate::time_monitor::{read_elapsed, Elapsed, TIME_MONITOR_FILE};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotUpdate {
    pub name: String,
    pub labels: Option<AxisLabels>,
    pub new_rows: usize,
    pub total_rows: usize,
    pub bounds: Option<Bounds>,
}

/// What changed during one tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub elapsed: Option<Elapsed>,
    pub new_statistics: usize,
    pub latest: Option<StatisticsRow>,
    pub plots: Vec<PlotUpdate>,
}

impl Snapshot {
    pub fn has_updates(&self) -> bool {
        self.new_statistics > 0 || self.plots.iter().any(|p| p.new_rows > 0)
    }
}

/// Polls the monitor files the solver writes into one directory.
#[derive(Debug)]
pub struct Monitor {
    dir: PathBuf,
    statistics: StatisticsTable,
    plots: BTreeMap<String, PlotSeries>,
}

impl Monitor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            statistics: StatisticsTable::new(dir.join(STATISTICS_FILE)),
            plots: BTreeMap::new(),
            dir,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn statistics(&self) -> &StatisticsTable {
        &self.statistics
    }

    pub fn plot(&self, name: &str) -> Option<&PlotSeries> {
        self.plots.get(name)
    }

    pub fn tick(&mut self) -> Snapshot {
        let elapsed = read_elapsed(&self.dir.join(TIME_MONITOR_FILE));

        let new_statistics = self.statistics.poll().unwrap_or_else(|e| {
            tracing::debug!("Skipping statistics this tick: {}", e);
            0
        });

        self.scan_plots();
        let plots = self
            .plots
            .iter_mut()
            .map(|(name, series)| {
                let new_rows = series.load().unwrap_or_else(|e| {
                    tracing::debug!("Skipping {} this tick: {}", name, e);
                    0
                });
                PlotUpdate {
                    name: name.clone(),
                    labels: series.labels().cloned(),
                    new_rows,
                    total_rows: series.points().len(),
                    bounds: series.bounds(),
                }
            })
            .collect();

        Snapshot {
            elapsed,
            new_statistics,
            latest: self.statistics.latest().cloned(),
            plots,
        }
    }

    /// Pick up `.plt` files that appeared since the last tick.
    fn scan_plots(&mut self) {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!("Cannot scan {}: {}", self.dir.display(), e);
                return;
            }
        };

        for path in entries.filter_map(|e| e.ok().map(|e| e.path())) {
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(PLOT_EXTENSION) {
                continue;
            }
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };
            if !self.plots.contains_key(&name) {
                tracing::info!("Tracking plot {}", name);
                self.plots.insert(name, PlotSeries::new(path));
            }
        }
    }
}
