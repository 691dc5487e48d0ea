//! Common CLI types shared across commands

/// Output format for results printed to the terminal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Rounded table, one row per entry
    #[default]
    Table,
    /// JSON with a metadata block
    Json,
    /// Bare values, one per line
    Plain,
}

/// Files written by the snapshot report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    #[default]
    Csv,
    Html,
    Both,
}

impl ReportFormat {
    pub fn csv(self) -> bool {
        matches!(self, ReportFormat::Csv | ReportFormat::Both)
    }

    pub fn html(self) -> bool {
        matches!(self, ReportFormat::Html | ReportFormat::Both)
    }
}
