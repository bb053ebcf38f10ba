use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_DESCRIBE"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

#[derive(Debug, ClapParser)]
#[command(
    name         = env!("CARGO_PKG_NAME"),
    version      = env!("CARGO_PKG_VERSION"),
    long_version = LONG_VERSION,
    author       = env!("CARGO_PKG_AUTHORS"),
    about        = "Tools for inspecting and demultiplexing DTS-UHD (DTS:X Profile 2) bitstreams",
    long_about   = None,
)]
pub struct Cli {
    /// Log level filter (off, error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "info")]
    pub loglevel: log::LevelFilter,

    /// Abort on the first invalid frame instead of resynchronizing.
    #[arg(long, global = true)]
    pub strict: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Show progress bars during operations.
    #[arg(long, global = true)]
    pub progress: bool,

    /// Choose an operation to perform.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print stream configuration and frame statistics
    Info(InfoArgs),

    /// Extract the raw frame payload from a container file
    Demux(DemuxArgs),
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Input DTS-UHD bitstream (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,
}

#[derive(Debug, Args)]
pub struct DemuxArgs {
    /// Input DTS-UHD file.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output path for the raw elementary stream.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Write the MP4 sample entry extradata ("udts" box) to a file.
    #[arg(long, value_name = "PATH")]
    pub extradata: Option<PathBuf>,
}

/// Shape of each emitted log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines with second-resolution timestamps.
    Plain,
    /// One JSON object per record.
    Json,
}

impl LogFormat {
    /// Applies this record format to a logger builder.
    pub fn configure(self, builder: &mut env_logger::Builder) {
        match self {
            LogFormat::Plain => {
                builder.format_timestamp_secs();
            }
            LogFormat::Json => {
                builder.format(|buf, record| {
                    writeln!(
                        buf,
                        "{{\"ts\":{},\"lvl\":\"{}\",\"msg\":\"{}\"}}",
                        buf.timestamp(),
                        record.level(),
                        record.args()
                    )
                });
            }
        }
    }
}
