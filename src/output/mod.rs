//! Output formatting for CLI results and report files

use crate::cli::OutputFormat;
use crate::error::Result;

pub mod csv;
pub mod html;
pub mod json;
pub mod progress;
pub mod table;

/// Trait for types that can be formatted for output
pub trait Formattable {
    /// Format the data according to the specified format
    fn format(&self, format: OutputFormat) -> Result<String>;

    /// Format and print to stdout
    fn print(&self, format: OutputFormat) -> Result<()> {
        println!("{}", self.format(format)?);
        Ok(())
    }
}

impl Formattable for [crate::snapshot::pricing::PriceRow] {
    fn format(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Table => Ok(table::format_table(self)),
            OutputFormat::Json => json::format_json_list(self),
            OutputFormat::Plain => Ok(self
                .iter()
                .map(|row| format!("{}\t{}\t{}\t{}", row.region, row.ebs, row.ebs_archive, row.rds))
                .collect::<Vec<_>>()
                .join("\n")),
        }
    }
}
