//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;

/// Date format of the positional argument.
pub const DATE_FORMAT: &str = "%d.%m.%Y";

/// Assemble one regional edition of a daily newspaper issue.
///
/// Downloads every page of the issue from the archive, picks the variant of
/// the desired edition for each page, strips the download watermark and binds
/// the pages into one PDF.
#[derive(Parser, Debug)]
#[command(name = "newsbinder")]
#[command(author, version, about)]
pub struct Args {
    /// Publish date as DD.MM.YYYY (default: today)
    #[arg(value_parser = parse_publish_date)]
    pub date: Option<NaiveDate>,

    /// Desired regional edition (overrides the config file)
    #[arg(short, long)]
    pub edition: Option<String>,

    /// Fallback edition for non-regional pages (overrides the config file)
    #[arg(long)]
    pub default_edition: Option<String>,

    /// Output directory (overrides the config file)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Config file (default: $XDG_CONFIG_HOME/newsbinder/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Bind already downloaded page files in this directory instead of downloading
    #[arg(long, value_name = "DIR", conflicts_with_all = ["date", "edition", "default_edition", "output_dir"])]
    pub from_dir: Option<PathBuf>,

    /// Include the weekday abbreviation in the output file name
    #[arg(long)]
    pub weekday: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

fn parse_publish_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| format!("invalid date '{value}', expected DD.MM.YYYY"))
}
