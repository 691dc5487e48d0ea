//! Streaming CSV export of snapshot records

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::snapshot::CanonicalSnapshotRecord;

/// Report columns, in output order
pub const COLUMNS: [&str; 13] = [
    "snapshot_id",
    "snapshot_type",
    "creation_date",
    "size_gb",
    "parent_resource_type",
    "parent_resource_id",
    "parent_name",
    "parent_state",
    "account_id",
    "environment",
    "region",
    "orphaned",
    "age_days",
];

/// Appended when costs are enabled
pub const COST_COLUMNS: [&str; 2] = ["monthly_cost", "cost_since_creation"];

/// Rows between progress log lines
const PROGRESS_EVERY: usize = 100;

/// Writes the header on creation, then one line per record.
pub struct CsvExporter<W: Write> {
    out: W,
    with_costs: bool,
    rows: usize,
}

impl CsvExporter<BufWriter<File>> {
    /// Open `path` for writing, creating parent directories.
    pub fn create(path: &Path, with_costs: bool) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), with_costs)
    }
}

impl<W: Write> CsvExporter<W> {
    pub fn new(mut out: W, with_costs: bool) -> Result<Self> {
        let mut header: Vec<&str> = COLUMNS.to_vec();
        if with_costs {
            header.extend(COST_COLUMNS);
        }
        writeln!(out, "{}", header.join(","))?;
        Ok(Self {
            out,
            with_costs,
            rows: 0,
        })
    }

    pub fn write_record(&mut self, record: &CanonicalSnapshotRecord) -> Result<()> {
        let mut fields = vec![
            csv_escape(&record.snapshot_id),
            record.snapshot_type.to_string(),
            record.creation_date_text(),
            record.size_text(),
            csv_escape(record.parent_resource_type()),
            csv_escape(record.parent_resource_id()),
            csv_escape(record.parent_name()),
            csv_escape(record.parent_state()),
            csv_escape(&record.account_id),
            csv_escape(&record.environment),
            csv_escape(&record.region),
            record.orphaned().to_string(),
            record.age_days.to_string(),
        ];
        if self.with_costs {
            fields.push(record.monthly_cost.to_string());
            fields.push(record.cost_since_creation.to_string());
        }
        writeln!(self.out, "{}", fields.join(","))?;

        self.rows += 1;
        if self.rows % PROGRESS_EVERY == 0 {
            log::info!("Wrote {} rows", self.rows);
        }
        Ok(())
    }

    /// Flush and return the number of rows written
    pub fn finish(mut self) -> Result<usize> {
        self.out.flush()?;
        Ok(self.rows)
    }
}

/// Quote a field when it contains a comma, quote or line break
fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{Cost, ParentInfo, SnapshotKind};
    use chrono::{TimeZone, Utc};

    fn record(id: &str, parent: Option<&str>) -> CanonicalSnapshotRecord {
        CanonicalSnapshotRecord {
            snapshot_id: id.to_string(),
            snapshot_type: SnapshotKind::Ebs,
            creation_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single(),
            age_days: 10,
            size_gb: Some(8.0),
            storage_tier: None,
            parent: parent.map(|p| ParentInfo {
                resource_type: "ec2_instance".into(),
                resource_id: p.into(),
                name: "web, primary".into(),
                state: "running".into(),
            }),
            account_id: "123".into(),
            region: "us-east-1".into(),
            environment: String::new(),
            monthly_cost: Cost::Amount(0.4),
            cost_since_creation: Cost::PricesNotProvided,
        }
    }

    fn export(records: &[CanonicalSnapshotRecord], with_costs: bool) -> String {
        let mut buf = Vec::new();
        let mut exporter = CsvExporter::new(&mut buf, with_costs).unwrap();
        for record in records {
            exporter.write_record(record).unwrap();
        }
        exporter.finish().unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_header_and_line_count() {
        let records = vec![record("snap-1", Some("i-1")), record("snap-2", None)];
        let out = export(&records, false);
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], COLUMNS.join(","));
    }

    #[test]
    fn test_header_only_when_empty() {
        let out = export(&[], true);
        assert_eq!(out.lines().count(), 1);
        assert!(out.trim_end().ends_with("age_days,monthly_cost,cost_since_creation"));
    }

    #[test]
    fn test_row_values() {
        let out = export(&[record("snap-1", Some("i-1")), record("snap-2", None)], true);
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(
            lines[1],
            "snap-1,ebs,2024-01-01T00:00:00+00:00,8,ec2_instance,i-1,\"web, primary\",running,123,,us-east-1,false,10,$0.4000,prices_not_provided"
        );
        assert_eq!(
            lines[2],
            "snap-2,ebs,2024-01-01T00:00:00+00:00,8,,,,,123,,us-east-1,true,10,$0.4000,prices_not_provided"
        );
    }

    #[test]
    fn test_csv_escape() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_escape("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_create_makes_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("out.csv");

        let mut exporter = CsvExporter::create(&path, false).unwrap();
        exporter.write_record(&record("snap-1", None)).unwrap();
        assert_eq!(exporter.finish().unwrap(), 1);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
