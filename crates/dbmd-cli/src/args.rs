use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use dbmd_core::fetch::DateMapping;
use dbmd_core::output::DocumentFormat;

#[derive(Parser, Debug)]
#[command(
    name = "dbmd",
    about = "Snapshot relational database metadata into portable XML or JSON documents",
    version,
    after_help = "Examples:\n  dbmd fetch --db postgres://localhost/myapp --schema public metadata.xml\n  dbmd fetch --schema '*any-owners*' --no-views metadata.json   # DB from .env\n  dbmd fetch --exclude '^public\\.flyway_' --date-mapping dates-as-timestamps md.xml\n  dbmd inspect metadata.xml\n  dbmd inspect metadata.xml --relation public.orders"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch metadata from a database and write it to a document
    Fetch(FetchArgs),

    /// Summarize a metadata document
    Inspect(InspectArgs),
}

#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Output document path (.json for JSON, anything else for XML)
    pub output: PathBuf,

    /// Database connection URL (postgres://, mysql://, sqlite://)
    /// Falls back to DATABASE_URL env var or .env file
    #[arg(long, env = "DATABASE_URL")]
    pub db: Option<String>,

    /// Options file (default: ./dbmd.toml when present)
    #[arg(long)]
    pub options: Option<PathBuf>,

    /// Schema to fetch. `<none>` selects the empty-named schema,
    /// `*any-owners*` every schema
    #[arg(long)]
    pub schema: Option<String>,

    /// How columns of native type DATE are reported
    #[arg(long, value_enum)]
    pub date_mapping: Option<DateMappingArg>,

    /// Leave out relations whose `schema.name` matches this regex
    #[arg(long)]
    pub exclude: Option<String>,

    /// Skip tables
    #[arg(long)]
    pub no_tables: bool,

    /// Skip views
    #[arg(long)]
    pub no_views: bool,

    /// List relations without their fields
    #[arg(long)]
    pub no_fields: bool,

    /// Skip foreign keys
    #[arg(long)]
    pub no_foreign_keys: bool,

    /// Document format (auto-detected from file extension if not specified)
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}

#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Metadata document to read
    pub document: PathBuf,

    /// Show one relation in detail (`schema.name` or a bare name)
    #[arg(long)]
    pub relation: Option<String>,

    /// Document format (auto-detected from file extension if not specified)
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Xml,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateMappingArg {
    DatesAsDriverReported,
    DatesAsTimestamps,
    DatesAsDates,
}

impl From<OutputFormat> for DocumentFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Xml => DocumentFormat::Xml,
            OutputFormat::Json => DocumentFormat::Json,
        }
    }
}

impl From<DateMappingArg> for DateMapping {
    fn from(arg: DateMappingArg) -> Self {
        match arg {
            DateMappingArg::DatesAsDriverReported => DateMapping::DatesAsDriverReported,
            DateMappingArg::DatesAsTimestamps => DateMapping::DatesAsTimestamps,
            DateMappingArg::DatesAsDates => DateMapping::DatesAsDates,
        }
    }
}
