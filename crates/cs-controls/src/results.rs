//! Result aggregation at the instantaneous and averaged cadences.
//!
//! The simulation loop drives both cadences; nothing in here schedules itself.
//! Each cadence owns a [`ReportStream`]: one header written at initialization,
//! then rows whose width must match that header exactly.

use std::io;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ControlError, ControlResult};
use crate::system::ControllerSet;

/// Name of the leading column of every report row.
pub const TIME_COLUMN: &str = "time_s";

/// Simple-mean accumulator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningMean {
    sum: f64,
    count: u64,
}

impl RunningMean {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean of the accumulated values, `None` if nothing was added.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Reporting cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    /// One row per timestep.
    Instantaneous,
    /// One row per averaging interval.
    Averaged,
}

/// Columnar report channel.
///
/// The header is written once the column list is non-empty, so a stream
/// read back from JSON keeps accepting rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportStream {
    pub cadence: Cadence,
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl ReportStream {
    pub fn new(cadence: Cadence) -> Self {
        Self {
            cadence,
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn header_written(&self) -> bool {
        !self.columns.is_empty()
    }

    /// Establish the column identity. Allowed once per stream.
    pub fn write_header(&mut self, columns: Vec<String>) -> ControlResult<()> {
        if self.header_written() {
            return Err(ControlError::ReportShape {
                what: format!("{:?} header already written", self.cadence),
            });
        }
        if columns.is_empty() {
            return Err(ControlError::ReportShape {
                what: format!("{:?} header has no columns", self.cadence),
            });
        }
        self.columns = columns;
        Ok(())
    }

    /// Append a row. Its width must equal the header's.
    pub fn push_row(&mut self, row: Vec<f64>) -> ControlResult<()> {
        if !self.header_written() {
            return Err(ControlError::ReportShape {
                what: format!("{:?} row written before header", self.cadence),
            });
        }
        if row.len() != self.columns.len() {
            return Err(ControlError::ReportShape {
                what: format!(
                    "{:?} row has {} values, header has {} columns",
                    self.cadence,
                    row.len(),
                    self.columns.len()
                ),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// All values of one column, by name.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| row[index]).collect())
    }

    /// Render as tab-separated text: one header line, then one line per row.
    pub fn to_tsv(&self) -> String {
        let mut out = self.columns.join("\t");
        out.push('\n');
        for row in &self.rows {
            let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            out.push_str(&line.join("\t"));
            out.push('\n');
        }
        out
    }

    pub fn write_tsv(&self, mut writer: impl io::Write) -> io::Result<()> {
        writer.write_all(self.to_tsv().as_bytes())
    }
}

/// Drives both cadences over a [`ControllerSet`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResultAggregator {
    instant: ReportStream,
    averaged: ReportStream,
    intervals_closed: usize,
}

impl Default for ResultAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self {
            instant: ReportStream::new(Cadence::Instantaneous),
            averaged: ReportStream::new(Cadence::Averaged),
            intervals_closed: 0,
        }
    }

    /// Write both headers. Called once, before the first tick.
    pub fn write_headers(&mut self, controllers: &ControllerSet) -> ControlResult<()> {
        let mut instant = vec![TIME_COLUMN.to_string()];
        let mut averaged = vec![TIME_COLUMN.to_string()];
        for controller in controllers.iter() {
            controller.instant_header(&mut instant);
            controller.average_header(&mut averaged);
        }
        debug!(
            instant_columns = instant.len(),
            averaged_columns = averaged.len(),
            "report headers written"
        );
        self.instant.write_header(instant)?;
        self.averaged.write_header(averaged)
    }

    /// Compute and emit this tick's instantaneous row.
    pub fn record_instant(
        &mut self,
        time: f64,
        controllers: &mut ControllerSet,
    ) -> ControlResult<()> {
        let mut row = vec![time];
        for controller in controllers.iter_mut() {
            controller.compute_instantaneous();
            controller.instant_values(&mut row);
        }
        self.instant.push_row(row)
    }

    /// Start a new averaging interval.
    pub fn begin_interval(&mut self, controllers: &mut ControllerSet) {
        for controller in controllers.iter_mut() {
            controller.reset_averages();
        }
    }

    /// Fold this tick's outputs into the running averages.
    pub fn accumulate(&mut self, controllers: &mut ControllerSet) {
        for controller in controllers.iter_mut() {
            let current = controller.last_output();
            controller.accumulate_average(current);
        }
    }

    /// Finalize the interval and emit one averaged row stamped with `time`.
    pub fn close_interval(
        &mut self,
        time: f64,
        controllers: &mut ControllerSet,
    ) -> ControlResult<()> {
        let mut row = vec![time];
        for controller in controllers.iter_mut() {
            controller.finalize_average();
            controller.average_values(&mut row);
        }
        self.intervals_closed += 1;
        debug!(time, interval = self.intervals_closed, "averaging interval closed");
        self.averaged.push_row(row)
    }

    pub fn intervals_closed(&self) -> usize {
        self.intervals_closed
    }

    pub fn instant(&self) -> &ReportStream {
        &self.instant
    }

    pub fn averaged(&self) -> &ReportStream {
        &self.averaged
    }

    pub fn into_streams(self) -> (ReportStream, ReportStream) {
        (self.instant, self.averaged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_mean_is_simple_mean() {
        let mut mean = RunningMean::new();
        assert_eq!(mean.mean(), None);
        mean.add(2.0);
        mean.add(4.0);
        assert_eq!(mean.mean(), Some(3.0));
        assert_eq!(mean.count(), 2);
        mean.reset();
        assert_eq!(mean.mean(), None);
    }

    #[test]
    fn header_is_written_once() {
        let mut stream = ReportStream::new(Cadence::Averaged);
        stream.write_header(vec!["time_s".into()]).unwrap();
        assert!(matches!(
            stream.write_header(vec!["time_s".into()]),
            Err(ControlError::ReportShape { .. })
        ));
    }

    #[test]
    fn rows_must_match_header() {
        let mut stream = ReportStream::new(Cadence::Instantaneous);
        assert!(stream.push_row(vec![0.0]).is_err());
        stream
            .write_header(vec!["time_s".into(), "ctrl1/output".into()])
            .unwrap();
        stream.push_row(vec![0.0, 1.5]).unwrap();
        let err = stream.push_row(vec![0.1]).unwrap_err();
        assert!(err.to_string().contains("1 values, header has 2"));
        assert_eq!(stream.column("ctrl1/output"), Some(vec![1.5]));
        assert_eq!(stream.column("missing"), None);
    }

    #[test]
    fn empty_header_is_rejected() {
        let mut stream = ReportStream::new(Cadence::Averaged);
        assert!(stream.write_header(Vec::new()).is_err());
        assert!(!stream.header_written());
    }

    #[test]
    fn stream_read_back_from_json_accepts_rows() {
        let mut stream = ReportStream::new(Cadence::Instantaneous);
        stream.write_header(vec!["time_s".into(), "x".into()]).unwrap();
        stream.push_row(vec![0.0, 1.0]).unwrap();

        let json = serde_json::to_string(&stream).unwrap();
        let mut restored: ReportStream = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, stream);
        assert!(restored.header_written());
        restored.push_row(vec![0.1, 2.0]).unwrap();
        assert!(restored.write_header(vec!["time_s".into()]).is_err());
        assert_eq!(restored.column("x"), Some(vec![1.0, 2.0]));
    }

    #[test]
    fn tsv_has_header_then_rows() {
        let mut stream = ReportStream::new(Cadence::Instantaneous);
        stream.write_header(vec!["time_s".into(), "x".into()]).unwrap();
        stream.push_row(vec![0.5, 2.0]).unwrap();
        assert_eq!(stream.to_tsv(), "time_s\tx\n0.5\t2\n");

        let mut buf = Vec::new();
        stream.write_tsv(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), stream.to_tsv());
    }
}
