//! # Flotilla CLI
//!
//! Command-line interface for rendering naval unit sheets.
//!
//! ## Usage
//!
//! ```bash
//! # Render a unit (entity JSON with an optional layout_config) to PNG
//! flotilla render unit.json -o vespucci.png
//!
//! # Same unit as a one-slide presentation
//! flotilla render unit.json --format pptx
//!
//! # Render through a shared template with per-unit customizations
//! flotilla render unit.json --template template.json --customization custom.json
//!
//! # Export a group deck as 3x3 grid pages
//! flotilla deck group.json --grid 3x3 -o squadron.pptx
//!
//! # Remove orphaned temp files once, or keep sweeping until Ctrl-C
//! flotilla sweep
//! flotilla sweep --watch
//! ```

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

use flotilla::{
    DeckMode, DeckRequest, Document, ExportFormat, Exporter, FlotillaError, RenderConfig,
    RenderReport, UnitSheet,
    document::Customization,
    logging::init_logging,
    resource::sweep::{spawn_sweeper, sweep_stale},
};

/// Flotilla - naval unit sheet renderer
#[derive(Parser, Debug)]
#[command(name = "flotilla")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (JSON); defaults apply when omitted
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render one unit sheet to PNG or PPTX
    Render {
        /// Unit JSON (entity fields plus optional layout_config)
        input: PathBuf,

        /// Output format
        #[arg(long, short, default_value = "png")]
        format: ExportFormat,

        /// Output file (defaults to the unit name with the format's extension)
        #[arg(long, short, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Layout template to render with instead of the unit's own layout
        #[arg(long, value_name = "FILE")]
        template: Option<PathBuf>,

        /// Per-unit customizations applied over the template
        #[arg(long, value_name = "FILE", requires = "template")]
        customization: Option<PathBuf>,
    },

    /// Export a group of units to one PPTX deck
    Deck {
        /// Group JSON (name, units, mode, overrides)
        input: PathBuf,

        /// Output file (defaults to the group name)
        #[arg(long, short, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Grid pages of ROWSxCOLS units instead of the request's mode
        #[arg(long, value_name = "ROWSxCOLS")]
        grid: Option<String>,

        /// One slide per unit, overriding the request's mode
        #[arg(long, conflicts_with = "grid")]
        single: bool,

        /// Skip the title slide
        #[arg(long)]
        no_title: bool,
    },

    /// Delete orphaned temp files older than the configured age
    Sweep {
        /// Age threshold in seconds (defaults to the configured value)
        #[arg(long)]
        max_age: Option<u64>,

        /// Keep sweeping on the configured interval until interrupted
        #[arg(long)]
        watch: bool,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), FlotillaError> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RenderConfig::load(path)?,
        None => RenderConfig::default(),
    };
    init_logging(&config.logging);

    match cli.command {
        Commands::Render {
            input,
            format,
            output,
            template,
            customization,
        } => {
            let mut sheet = UnitSheet::from_json(&read(&input)?)?;
            if let Some(template) = template {
                let base = Document::from_json(&read(&template)?)?;
                let custom: Customization = match customization {
                    Some(path) => serde_json::from_str(&read(&path)?)?,
                    None => Customization::default(),
                };
                sheet = UnitSheet::from_template(sheet.unit, &base, &custom)?;
            }

            let exporter = Exporter::new(&config)?;
            let rendered = exporter.render(&sheet, format)?;
            let path = output.unwrap_or_else(|| default_output(&sheet.unit.name, format));
            std::fs::write(&path, &rendered.bytes)?;

            println!("Saved to {}", path.display());
            print_report(&rendered.report);
        }

        Commands::Deck {
            input,
            output,
            grid,
            single,
            no_title,
        } => {
            let mut request = DeckRequest::from_json(&read(&input)?)?;
            if let Some(grid) = grid {
                request.mode = parse_grid(&grid)?;
            } else if single {
                request.mode = DeckMode::Single;
            }
            if no_title {
                request.title_slide = false;
            }

            let exporter = Exporter::new(&config)?;
            let rendered = exporter.render_deck(&request)?;
            let path = output.unwrap_or_else(|| default_output(&request.name, ExportFormat::Pptx));
            std::fs::write(&path, &rendered.bytes)?;

            println!(
                "Saved {} units to {}",
                request.units.len(),
                path.display()
            );
            print_report(&rendered.report);
        }

        Commands::Sweep { max_age, watch } => {
            let max_age = max_age
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.sweep_max_age());

            if watch {
                let runtime = tokio::runtime::Runtime::new()?;
                runtime.block_on(async {
                    let sweeper =
                        spawn_sweeper(config.temp_dir.clone(), max_age, config.sweep_interval());
                    println!(
                        "Sweeping {} every {}s, Ctrl-C to stop",
                        config.temp_dir.display(),
                        config.sweep_interval().as_secs()
                    );
                    let stopped = tokio::signal::ctrl_c().await;
                    sweeper.abort();
                    stopped
                })?;
            } else {
                let stats = sweep_stale(&config.temp_dir, max_age)?;
                println!(
                    "Removed {} stale temp files, kept {}",
                    stats.removed, stats.kept
                );
            }
        }
    }

    Ok(())
}

fn read(path: &Path) -> Result<String, FlotillaError> {
    std::fs::read_to_string(path).map_err(|e| {
        FlotillaError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })
}

/// `ROWSxCOLS`, e.g. `3x3`.
fn parse_grid(value: &str) -> Result<DeckMode, FlotillaError> {
    let invalid = || FlotillaError::Config(format!("Invalid grid '{}', expected ROWSxCOLS", value));
    let (rows, cols) = value
        .to_ascii_lowercase()
        .split_once('x')
        .map(|(r, c)| (r.trim().parse::<usize>(), c.trim().parse::<usize>()))
        .ok_or_else(invalid)?;
    match (rows, cols) {
        (Ok(rows), Ok(cols)) if rows > 0 && cols > 0 => Ok(DeckMode::Grid { rows, cols }),
        _ => Err(invalid()),
    }
}

/// File name derived from a display name: alphanumerics kept, runs of
/// anything else collapsed to `_`.
fn default_output(name: &str, format: ExportFormat) -> PathBuf {
    let mut stem = String::new();
    for ch in name.trim().chars() {
        if ch.is_alphanumeric() {
            stem.push(ch);
        } else if !stem.ends_with('_') {
            stem.push('_');
        }
    }
    let stem = stem.trim_matches('_');
    let stem = if stem.is_empty() { "sheet" } else { stem };
    PathBuf::from(format!("{}.{}", stem, format.extension()))
}

fn print_report(report: &RenderReport) {
    println!("{}", report);
    for entry in report.placeholders().chain(report.failures()) {
        println!("  {}: {:?}", entry.id, entry.outcome);
    }
}
