//! Destinations for aggregated records.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::aggregation::AggregatedRecord;
use crate::error::{Error, Result};

/// Column titles of the report table. The fourth column is reserved and
/// always left empty.
pub const REPORT_HEADER: [&str; 6] = [
    "Timestamp",
    "Total Vehicle Count",
    "Direction Counts",
    "",
    "Total Vehicles per Hour",
    "Unique Vehicles per Hour",
];

/// Append-only receiver of one record per reporting cycle.
pub trait ReportSink {
    fn write(&mut self, record: &AggregatedRecord) -> Result<()>;
}

/// Keeps every record in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Vec<AggregatedRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[AggregatedRecord] {
        &self.records
    }
}

impl ReportSink for MemorySink {
    fn write(&mut self, record: &AggregatedRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }
}

/// CSV table with [`REPORT_HEADER`] as its first row.
///
/// A file whose first row is not that header is moved aside to
/// `<name>.bak` and a fresh table is started.
#[derive(Debug, Clone)]
pub struct CsvReportSink {
    path: PathBuf,
}

impl CsvReportSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn header_line() -> String {
        csv_row(REPORT_HEADER.iter().map(|s| s.to_string()))
    }

    fn has_expected_header(&self) -> std::io::Result<Option<bool>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let mut first = String::new();
        BufReader::new(file).read_line(&mut first)?;
        Ok(Some(first.trim_end_matches(['\r', '\n']) == Self::header_line()))
    }

    fn start_fresh(&self) -> std::io::Result<()> {
        let mut file = File::create(&self.path)?;
        writeln!(file, "{}", Self::header_line())
    }

    fn prepare(&self) -> std::io::Result<()> {
        match self.has_expected_header() {
            Ok(Some(true)) => Ok(()),
            Ok(None) => {
                info!(path = %self.path.display(), "creating report file");
                self.start_fresh()
            }
            Ok(Some(false)) | Err(_) => {
                let mut backup = self.path.clone().into_os_string();
                backup.push(".bak");
                warn!(
                    path = %self.path.display(),
                    backup = ?backup,
                    "report file not found or invalid, creating a new one"
                );
                if let Err(e) = fs::rename(&self.path, &backup) {
                    warn!(error = %e, "could not move old report file aside");
                }
                self.start_fresh()
            }
        }
    }
}

impl ReportSink for CsvReportSink {
    fn write(&mut self, record: &AggregatedRecord) -> Result<()> {
        let sink_error = |source| Error::Sink {
            path: self.path.clone(),
            source,
        };
        self.prepare().map_err(sink_error)?;

        let row = csv_row([
            record.formatted_timestamp(),
            record.interval_vehicle_count.to_string(),
            record.direction_summary(),
            String::new(),
            record.total_vehicles_per_hour.to_string(),
            record.unique_vehicles_per_hour.to_string(),
        ]);
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(sink_error)?;
        writeln!(file, "{row}").map_err(sink_error)
    }
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn csv_row(fields: impl IntoIterator<Item = String>) -> String {
    fields
        .into_iter()
        .map(|f| csv_field(&f))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("roadscout-sink-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = fs::remove_file(&path);
        let mut backup = path.clone().into_os_string();
        backup.push(".bak");
        let _ = fs::remove_file(backup);
        path
    }

    fn record(directions: &[(&str, usize)]) -> AggregatedRecord {
        AggregatedRecord {
            timestamp: 1_700_000_000.0,
            interval_vehicle_count: 4,
            direction_counts: directions
                .iter()
                .map(|&(k, v)| (k.to_string(), v))
                .collect::<BTreeMap<_, _>>(),
            total_vehicles_per_hour: 9,
            unique_vehicles_per_hour: 6,
        }
    }

    #[test]
    fn test_csv_quoting() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("0 -> 1: 2, 1 -> 0: 1"), "\"0 -> 1: 2, 1 -> 0: 1\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_header_written_once() {
        let path = scratch("report.csv");
        let mut sink = CsvReportSink::new(&path);
        sink.write(&record(&[("0 -> 1", 2), ("1 -> 0", 1)])).unwrap();
        sink.write(&record(&[])).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "Timestamp,Total Vehicle Count,Direction Counts,,Total Vehicles per Hour,Unique Vehicles per Hour"
        );
        assert!(lines[1].ends_with(",4,\"0 -> 1: 2, 1 -> 0: 1\",,9,6"));
        assert!(lines[2].ends_with(",4,,,9,6"));
    }

    #[test]
    fn test_foreign_file_is_replaced() {
        let path = scratch("foreign.csv");
        fs::write(&path, "something,else\n1,2\n").unwrap();

        let mut sink = CsvReportSink::new(&path);
        sink.write(&record(&[])).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Timestamp,"));
        assert_eq!(text.lines().count(), 2);

        let mut backup = path.into_os_string();
        backup.push(".bak");
        assert_eq!(fs::read_to_string(backup).unwrap(), "something,else\n1,2\n");
    }

    #[test]
    fn test_memory_sink() {
        let mut sink = MemorySink::new();
        sink.write(&record(&[])).unwrap();
        assert_eq!(sink.records().len(), 1);
    }
}
