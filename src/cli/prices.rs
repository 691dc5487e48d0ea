//! Price table command

use std::path::Path;

use crate::cli::OutputFormat;
use crate::error::Result;
use crate::output::Formattable;
use crate::snapshot::pricing::PriceTable;

/// Print the price table; needs no credentials
pub fn run(pricing_file: Option<&Path>, format: OutputFormat) -> Result<()> {
    let table = PriceTable::load(pricing_file)?;
    if format == OutputFormat::Table {
        println!("Snapshot prices per GB-month ({})", table.currency);
    }
    table.rows().print(format)
}
