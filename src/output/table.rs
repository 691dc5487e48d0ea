//! Table output formatting

use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Rows},
};

/// Format data as a table
pub fn format_table<T: Tabled>(data: &[T]) -> String {
    if data.is_empty() {
        return "No results found.".to_string();
    }

    let mut table = Table::new(data);
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));

    table.to_string()
}

/// One line of a run summary
#[derive(Debug, Clone, Tabled)]
pub struct SummaryRow {
    #[tabled(rename = "METRIC")]
    pub metric: String,
    #[tabled(rename = "VALUE")]
    pub value: String,
}

/// Format `(metric, value)` pairs as a two-column summary table
pub fn format_summary<V: ToString>(pairs: &[(&str, V)]) -> String {
    let rows: Vec<SummaryRow> = pairs
        .iter()
        .map(|(metric, value)| SummaryRow {
            metric: metric.to_string(),
            value: value.to_string(),
        })
        .collect();
    format_table(&rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Tabled)]
    struct ArnRow {
        #[tabled(rename = "ARN")]
        arn: String,
    }

    #[test]
    fn test_format_table_empty() {
        let items: Vec<ArnRow> = vec![];
        assert_eq!(format_table(&items), "No results found.");
    }

    #[test]
    fn test_format_table_rows_and_style() {
        let items = vec![
            ArnRow { arn: "arn:aws:s3:::one".into() },
            ArnRow { arn: "arn:aws:s3:::two".into() },
        ];

        let result = format_table(&items);

        assert!(result.contains("ARN"));
        assert!(result.contains("arn:aws:s3:::one"));
        assert!(result.contains("arn:aws:s3:::two"));
        // Rounded style uses ╭ for top-left corner
        assert!(result.contains("╭"));
        assert!(result.contains("╰"));
    }

    #[test]
    fn test_format_summary() {
        let result = format_summary(&[("Snapshots", 12), ("Orphaned", 3)]);
        assert!(result.contains("METRIC"));
        assert!(result.contains("Snapshots"));
        assert!(result.contains("12"));
    }
}
