//! Step statistics table
//!
//! The solver appends one line per converged step:
//! `step_id dT time iterations norm percent`. Every analysis stage restarts
//! its step counter, so a step id lower than the previous one opens a new
//! stage.

use serde::Serialize;
use std::path::PathBuf;

use crate::error::{MonitorError, MonitorResult};
use crate::tail::{Line, Tail};

pub const STATISTICS_FILE: &str = "STKO_monitor_statistics.stats";

const FIELD_COUNT: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsRow {
    pub stage_id: u32,
    pub step_id: i64,
    pub dt: f64,
    pub time: f64,
    pub iterations: u32,
    pub norm: f64,
    pub percent: f64,
}

#[derive(Debug)]
pub struct StatisticsTable {
    tail: Tail,
    rows: Vec<StatisticsRow>,
}

impl StatisticsTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            tail: Tail::new(path),
            rows: Vec::new(),
        }
    }

    pub fn rows(&self) -> &[StatisticsRow] {
        &self.rows
    }

    pub fn latest(&self) -> Option<&StatisticsRow> {
        self.rows.last()
    }

    /// Read the rows appended since the last poll and return how many.
    ///
    /// A malformed line is skipped and ends the current poll. Rows before it
    /// are kept and counted; if there are none the poll returns its error.
    /// The next poll resumes after it.
    pub fn poll(&mut self) -> MonitorResult<usize> {
        let Some(pending) = self.tail.read()? else {
            return Ok(0);
        };
        if pending.truncated {
            self.rows.clear();
        }

        let mut added = 0;
        for line in &pending.lines {
            if line.text.trim().is_empty() {
                self.tail.consume(line);
                continue;
            }
            match self.parse_row(line) {
                Ok(row) => {
                    self.rows.push(row);
                    self.tail.consume(line);
                    added += 1;
                }
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

    fn parse_row(&self, line: &Line) -> MonitorResult<StatisticsRow> {
        let error = |reason: String| MonitorError::Parse {
            file: self.tail.file_name(),
            line: line.number,
            reason,
        };
        let tokens: Vec<&str> = line.text.split_whitespace().collect();
        if tokens.len() != FIELD_COUNT {
            return Err(error(format!("expected {} fields, found {}", FIELD_COUNT, tokens.len())));
        }
        let float = |i: usize| {
            tokens[i]
                .parse::<f64>()
                .map_err(|_| error(format!("invalid number '{}'", tokens[i])))
        };

        let step_id: i64 = tokens[0]
            .parse()
            .map_err(|_| error(format!("invalid step id '{}'", tokens[0])))?;
        let iterations: u32 = tokens[3]
            .parse()
            .map_err(|_| error(format!("invalid iteration count '{}'", tokens[3])))?;

        let stage_id = match self.rows.last() {
            None => 1,
            Some(previous) if step_id < previous.step_id => previous.stage_id + 1,
            Some(previous) => previous.stage_id,
        };

        Ok(StatisticsRow {
            stage_id,
            step_id,
            dt: float(1)?,
            time: float(2)?,
            iterations,
            norm: float(4)?,
            percent: float(5)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::fs;
    use std::io::Write;

    fn append(path: &std::path::Path, text: &str) {
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap()
            .write_all(text.as_bytes())
            .unwrap();
    }

    #[test]
    fn test_stage_increments_on_step_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STATISTICS_FILE);
        append(&path, "1 0.1 0.1 3 1.0e-8 10\n2 0.1 0.2 2 2.0e-9 20\n3 0.1 0.3 2 1.0e-9 30\n");

        let mut table = StatisticsTable::new(&path);
        assert_eq!(table.poll().unwrap(), 3);

        append(&path, "1 0.5 0.5 4 3.0e-7 50\n2 0.5 1.0 5 1.0e-6 100\n");
        assert_eq!(table.poll().unwrap(), 2);
        assert_eq!(table.poll().unwrap(), 0);

        let stages: Vec<u32> = table.rows().iter().map(|r| r.stage_id).collect();
        assert_eq!(stages, vec![1, 1, 1, 2, 2]);
        let latest = table.latest().unwrap();
        assert_eq!(latest.iterations, 5);
        assert_relative_eq!(latest.norm, 1.0e-6);
        assert_relative_eq!(latest.percent, 100.0);
    }

    #[test]
    fn test_malformed_line_ends_poll_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STATISTICS_FILE);
        append(&path, "1 0.1 0.1 3 1.0e-8 10\n2 0.1 0.2 2\n3 0.1 0.3 2 1.0e-9 30\n");

        let mut table = StatisticsTable::new(&path);
        assert_eq!(table.poll().unwrap(), 1);
        assert_eq!(table.poll().unwrap(), 1);
        assert_eq!(table.poll().unwrap(), 0);
        let steps: Vec<i64> = table.rows().iter().map(|r| r.step_id).collect();
        assert_eq!(steps, vec![1, 3]);
    }

    #[test]
    fn test_leading_malformed_line_reports_then_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STATISTICS_FILE);
        append(&path, "step dT time\n1 0.1 0.1 3 1.0e-8 10\n");

        let mut table = StatisticsTable::new(&path);
        assert!(matches!(table.poll(), Err(MonitorError::Parse { line: 1, .. })));
        assert_eq!(table.poll().unwrap(), 1);
        assert_eq!(table.rows()[0].step_id, 1);
        assert_eq!(table.rows()[0].stage_id, 1);
    }

    #[test]
    fn test_incomplete_line_waits_for_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STATISTICS_FILE);
        append(&path, "1 0.1 0.1 3 1.0e-8 10\n2 0.1 0.2");

        let mut table = StatisticsTable::new(&path);
        assert_eq!(table.poll().unwrap(), 1);
        append(&path, " 2 2.0e-9 20\n");
        assert_eq!(table.poll().unwrap(), 1);
        assert_eq!(table.rows()[1].step_id, 2);
    }

    #[test]
    fn test_restarted_file_resets_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STATISTICS_FILE);
        append(&path, "1 0.1 0.1 3 1.0e-8 10\n2 0.1 0.2 2 2.0e-9 20\n");

        let mut table = StatisticsTable::new(&path);
        assert_eq!(table.poll().unwrap(), 2);

        fs::write(&path, "1 1.0 1.0 1 0.0 5\n").unwrap();
        assert_eq!(table.poll().unwrap(), 1);
        assert_eq!(table.rows().len(), 1);
        assert_eq!(table.rows()[0].stage_id, 1);
    }

    #[test]
    fn test_missing_file_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = StatisticsTable::new(dir.path().join(STATISTICS_FILE));
        assert_eq!(table.poll().unwrap(), 0);
    }
}
