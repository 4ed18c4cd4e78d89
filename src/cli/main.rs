use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use exif_mapper::config::{self, RecordOrder};
use exif_mapper::export::ExportFormat;
use exif_mapper::record::ImageRecord;
use exif_mapper::{extract, pipeline, title};

#[derive(Parser, Debug)]
#[command(
    name = "exif-mapper",
    version,
    about = "Map geotagged photos to KMZ/KML/CSV/XLSX and write spreadsheet edits back into their EXIF"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract metadata from a directory and write the selected artifacts
    Export {
        /// Directory of photos (not searched recursively)
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Artifact to produce; repeat for several (default: from config, all four)
        #[arg(short, long = "format", value_enum)]
        formats: Vec<FormatArg>,

        /// Output directory (default: the photo directory)
        #[arg(short, long, value_name = "OUT_DIR")]
        output: Option<PathBuf>,

        /// Record order in every artifact
        #[arg(long, value_enum)]
        order: Option<OrderArg>,

        /// Output the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write NomePersonalizado/Descricao from an edited table back into the photos
    Update {
        /// Directory holding the original photos
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Edited spreadsheet (.xlsx) or flat table (.csv)
        #[arg(short, long, value_name = "FILE")]
        table: PathBuf,

        /// Report what would change without writing to files
        #[arg(long)]
        dry_run: bool,

        /// Output the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the extracted records of a directory and exit
    Show {
        #[arg(value_name = "DIR")]
        dir: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Kmz,
    Kml,
    Csv,
    Xlsx,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Kmz => ExportFormat::Kmz,
            FormatArg::Kml => ExportFormat::Kml,
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Xlsx => ExportFormat::Xlsx,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OrderArg {
    CaptureTime,
    Filename,
}

impl From<OrderArg> for RecordOrder {
    fn from(arg: OrderArg) -> Self {
        match arg {
            OrderArg::CaptureTime => RecordOrder::CaptureTime,
            OrderArg::Filename => RecordOrder::Filename,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    let Some(command) = cli.command else {
        anyhow::bail!("No command specified. Use --help for usage.");
    };

    // Load config
    let mut config = config::Config::load(cli.config.as_deref())?;

    match command {
        Command::Export { dir, formats, output, order, json } => {
            // CLI flags override file values
            if !formats.is_empty() {
                config.export.formats = formats.into_iter().map(ExportFormat::from).collect();
            }
            if output.is_some() {
                config.export.output_dir = output;
            }
            if let Some(order) = order {
                config.export.order = order.into();
            }

            let run = match pipeline::run_export(&dir, &config.export) {
                Ok(run) => run,
                Err(e) => {
                    log::error!("Export failed: {e:#}");
                    return Err(e);
                }
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&run)?);
                return Ok(());
            }

            for artifact in &run.export.artifacts {
                println!(
                    "{GREEN}✓{RESET} {:<5} {} {DIM}({} entries){RESET}",
                    artifact.format,
                    artifact.path.display(),
                    artifact.entries
                );
            }
            for failure in &run.export.format_failures {
                println!("{RED}✗{RESET} {:<5} {}", failure.format, failure.reason);
            }
            print_skips(
                "Skipped files",
                run.skipped.iter().map(|s| (s.name.as_str(), s.reason.as_str())),
            );
            print_skips(
                "Incomplete entries",
                run.export
                    .item_failures
                    .iter()
                    .map(|f| (f.filename.as_str(), f.reason.as_str())),
            );
            log::info!(
                "Done: {} images, {} records, {} artifacts written",
                run.found,
                run.records,
                run.export.artifacts.len()
            );
        }
        Command::Update { dir, table, dry_run, json } => {
            if dry_run {
                config.update.dry_run = true;
            }
            if config.update.dry_run {
                log::info!("Dry run: no files will be modified");
            }

            let report = match pipeline::run_update(&dir, &table, &config.update) {
                Ok(report) => report,
                Err(e) => {
                    log::error!("Update failed: {e:#}");
                    return Err(e);
                }
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }

            let verb = if report.dry_run { "would be updated" } else { "updated" };
            println!("{GREEN}{}{RESET} {verb}, {} unchanged", report.updated, report.unchanged);
            print_skips(
                "Skipped rows",
                report.skipped.iter().map(|s| (s.name.as_str(), s.reason.as_str())),
            );
        }
        Command::Show { dir } => {
            let images = pipeline::collect_images(&dir)?;
            let mut extraction = extract::extract_all(&images);
            extract::sort_records(&mut extraction.records, config.export.order);
            for record in &extraction.records {
                print_record(record);
            }
            print_skips(
                "Skipped files",
                extraction.skipped.iter().map(|s| (s.name.as_str(), s.reason.as_str())),
            );
        }
    }

    Ok(())
}

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Max width for the value column before wrapping.
const VAL_WIDTH: usize = 46;
/// Indent for continuation lines (tag column width + " : " = 25 chars + 2 leading spaces).
const INDENT: &str = "                           ";

fn print_skips<'a>(heading: &str, skips: impl Iterator<Item = (&'a str, &'a str)>) {
    let skips: Vec<_> = skips.collect();
    if skips.is_empty() {
        return;
    }
    println!();
    println!("{YELLOW}{heading} ({}):{RESET}", skips.len());
    for (name, reason) in skips {
        println!("  {name}: {DIM}{reason}{RESET}");
    }
}

/// Print one extracted record, organized like the placemark bubble.
fn print_record(record: &ImageRecord) {
    println!();
    println!("{BOLD}{}{RESET}", title::resolve(record));
    println!("{DIM}{}{RESET}", "─".repeat(72));

    print_row("File", &record.filename);
    print_optional("NomePersonalizado", record.custom_name.as_deref());
    print_optional("Descricao", record.description.as_deref());
    if let Some(ts) = record.capture_timestamp {
        print_row("DataHora", &ts.format("%Y-%m-%d %H:%M:%S").to_string());
    }
    print_row("Orientation", &record.orientation.to_exif().to_string());
    match (record.coordinates(), record.projected) {
        (Some((lat, lon)), Some(p)) => {
            print_row("Lat/Lon", &format!("{lat:.7}, {lon:.7}"));
            print_row(
                "UTM",
                &format!("Zona {}{}, E: {:.2}, N: {:.2}", p.zone, p.hemisphere, p.easting, p.northing),
            );
        }
        (Some((lat, lon)), None) => {
            print_row("Lat/Lon", &format!("{lat:.7}, {lon:.7}"));
            print_row("UTM", "(not projectable)");
        }
        _ => println!("  {DIM}(no GPS position){RESET}"),
    }
}

fn print_optional(tag: &str, value: Option<&str>) {
    if let Some(val) = value {
        if !val.trim().is_empty() {
            print_row(tag, val);
        }
    }
}

/// Print a single row in the record display table.
fn print_row(tag: &str, val: &str) {
    let tag_col = format!("{:<22}", tag);
    let lines = wrap_text(val, VAL_WIDTH);
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            println!("  {tag_col} : {line}");
        } else {
            println!("  {INDENT}{line}");
        }
    }
}

/// Wrap text at word boundaries to fit within max_width.
fn wrap_text(s: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in s.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.len() + 1 + word.len() <= max_width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(current_line);
            current_line = word.to_string();
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(s.to_string());
    }

    lines
}
