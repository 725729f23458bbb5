//! Incremental `.plt` series
//!
//! Line 1 holds the two axis labels, every following line one `x<TAB>y`
//! sample.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::{MonitorError, MonitorResult};
use crate::tail::{Line, Tail};

pub const PLOT_EXTENSION: &str = "plt";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Bounds {
    fn point(x: f64, y: f64) -> Self {
        Self {
            x_min: x,
            x_max: x,
            y_min: y,
            y_max: y,
        }
    }

    fn include(&mut self, x: f64, y: f64) {
        self.x_min = self.x_min.min(x);
        self.x_max = self.x_max.max(x);
        self.y_min = self.y_min.min(y);
        self.y_max = self.y_max.max(y);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisLabels {
    pub x: String,
    pub y: String,
}

#[derive(Debug)]
pub struct PlotSeries {
    tail: Tail,
    labels: Option<AxisLabels>,
    points: Vec<(f64, f64)>,
    bounds: Option<Bounds>,
}

impl PlotSeries {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            tail: Tail::new(path),
            labels: None,
            points: Vec::new(),
            bounds: None,
        }
    }

    pub fn path(&self) -> &Path {
        self.tail.path()
    }

    pub fn labels(&self) -> Option<&AxisLabels> {
        self.labels.as_ref()
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    /// Load the samples appended since the last call and return how many.
    /// Malformed rows are handled like [`crate::StatisticsTable::poll`]. A bad
    /// header is never skipped, the series stays unlabelled until it is fixed.
    pub fn load(&mut self) -> MonitorResult<usize> {
        let Some(pending) = self.tail.read()? else {
            return Ok(0);
        };
        if pending.truncated {
            self.labels = None;
            self.points.clear();
            self.bounds = None;
        }

        let mut added = 0;
        for line in &pending.lines {
            let header = self.labels.is_none();
            let parsed = if header {
                self.parse_labels(line).map(|labels| self.labels = Some(labels))
            } else if line.text.trim().is_empty() {
                Ok(())
            } else {
                self.parse_point(line).map(|(x, y)| {
                    self.push(x, y);
                    added += 1;
                })
            };
            match parsed {
                Ok(()) => self.tail.consume(line),
                Err(e) if header => return Err(e),
                Err(e) => {
                    self.tail.consume(line);
                    if added == 0 {
                        return Err(e);
                    }
                    tracing::warn!("Skipping {}", e);
                    break;
                }
            }
        }
        Ok(added)
    }

    fn push(&mut self, x: f64, y: f64) {
        self.points.push((x, y));
        match self.bounds.as_mut() {
            Some(bounds) => bounds.include(x, y),
            None => self.bounds = Some(Bounds::point(x, y)),
        }
    }

    fn error(&self, line: &Line, reason: String) -> MonitorError {
        MonitorError::Parse {
            file: self.tail.file_name(),
            line: line.number,
            reason,
        }
    }

    fn parse_labels(&self, line: &Line) -> MonitorResult<AxisLabels> {
        match line.text.split('\t').collect::<Vec<_>>().as_slice() {
            [x, y] => Ok(AxisLabels {
                x: x.trim().to_string(),
                y: y.trim().to_string(),
            }),
            fields => Err(self.error(line, format!("expected 2 axis labels, found {}", fields.len()))),
        }
    }

    fn parse_point(&self, line: &Line) -> MonitorResult<(f64, f64)> {
        let fields: Vec<&str> = line.text.split('\t').map(str::trim).collect();
        let [x, y] = fields.as_slice() else {
            return Err(self.error(line, format!("expected 2 columns, found {}", fields.len())));
        };
        let number = |s: &str| {
            s.parse::<f64>()
                .map_err(|_| self.error(line, format!("invalid number '{}'", s)))
        };
        Ok((number(*x)?, number(*y)?))
    }
}
