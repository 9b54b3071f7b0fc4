use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use shelfcheck::config::{Config, check_unit_interval};
use shelfcheck::core::db::{
    CatalogDb, ComparisonRecord, ComparisonRepository, ImageRepository, PlanogramRepository,
};
use shelfcheck::detection::YoloLoader;
use shelfcheck::{AdherencePipeline, AdherenceReport, ComparisonResult, Detector, ImageRef, aggregate};

#[derive(Parser)]
#[command(name = "shelfcheck")]
#[command(about = "Score how closely a shelf photo matches its planogram")]
struct Cli {
    /// Configuration file (defaults to the per-user config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Detection model file, overrides the configuration
    #[arg(long, value_name = "FILE", global = true)]
    model: Option<PathBuf>,

    /// Class labels file, overrides the configuration
    #[arg(long, value_name = "FILE", global = true)]
    labels: Option<PathBuf>,

    /// Catalog database, overrides the configuration
    #[arg(long, value_name = "FILE", global = true)]
    database: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect and count products in one image
    Detect {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Minimum detection confidence
        #[arg(long, value_parser = parse_threshold)]
        confidence: Option<f32>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Compare a planogram image with a shelf image
    Compare {
        #[arg(value_name = "PLANOGRAM")]
        planogram: PathBuf,

        #[arg(value_name = "SHELF")]
        shelf: PathBuf,

        #[arg(long, value_parser = parse_threshold)]
        confidence: Option<f32>,

        #[arg(long)]
        json: bool,

        /// Save annotated images and the report to directory (must be empty)
        #[arg(long, value_name = "DIR")]
        debug_out: Option<PathBuf>,
    },

    /// Manage registered planograms, shelf images and results
    Catalog {
        #[command(subcommand)]
        command: CatalogCommand,
    },
}

#[derive(Subcommand)]
enum CatalogCommand {
    /// Register a shelf image
    AddImage {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Register a planogram image
    AddPlanogram {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// List registered planograms and images
    List,

    /// Compare two registered images and store the result
    Compare {
        #[arg(long)]
        planogram_id: i64,

        #[arg(long)]
        image_id: i64,

        #[arg(long, value_parser = parse_threshold)]
        confidence: Option<f32>,

        #[arg(long)]
        json: bool,
    },

    /// Show stored results for a planogram/image pair
    History {
        #[arg(long)]
        planogram_id: i64,

        #[arg(long)]
        image_id: i64,
    },
}

fn parse_threshold(value: &str) -> Result<f32, String> {
    let parsed: f32 = value.parse().map_err(|e| format!("{}", e))?;
    check_unit_interval("confidence", parsed).map_err(|e| e.to_string())?;
    Ok(parsed)
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "shelfcheck=debug" } else { "shelfcheck=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose);

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(model) = args.model {
        config.model.model_path = model;
    }
    if let Some(labels) = args.labels {
        config.model.labels_path = labels;
    }
    if let Some(database) = args.database {
        config.catalog.database_path = database;
    }

    let detector = Detector::new(YoloLoader::new(config.model.clone()));
    let default_threshold = config.model.confidence_threshold;

    match args.command {
        Command::Detect {
            image,
            confidence,
            json,
        } => {
            let threshold = confidence.unwrap_or(default_threshold);
            let detections = detector.detect(&ImageRef::Path(image), threshold)?;
            let multiset = aggregate(detections, threshold);

            if json {
                println!("{}", serde_json::to_string_pretty(&multiset)?);
            } else {
                println!("\n=== Detection Results ===");
                println!("Total detections: {}", multiset.total());
                if multiset.is_empty() {
                    println!("No objects detected.");
                }
                for (label, count) in multiset.counts() {
                    println!("  {}: {}", label, count);
                }
                if args.verbose {
                    println!("\nDetails:");
                    for d in multiset.details() {
                        let bbox = d.bbox();
                        println!(
                            "  {} at ({:.0}, {:.0}) {:.0}x{:.0} - confidence: {:.2}",
                            d.label(),
                            bbox.x1(),
                            bbox.y1(),
                            d.width(),
                            d.height(),
                            d.confidence()
                        );
                    }
                }
            }
        }

        Command::Compare {
            planogram,
            shelf,
            confidence,
            json,
            debug_out,
        } => {
            let mut pipeline =
                AdherencePipeline::new(&detector, confidence.unwrap_or(default_threshold))
                    .with_verbose(args.verbose);
            if let Some(debug_dir) = debug_out {
                pipeline = pipeline.with_debug(debug_dir)?;
            }

            let report = pipeline.run(&ImageRef::Path(planogram), &ImageRef::Path(shelf))?;
            print_report(&report, json)?;
        }

        Command::Catalog { command } => {
            let runtime = tokio::runtime::Runtime::new()?;
            let catalog = runtime.block_on(CatalogDb::open(&config.catalog.database_path))?;

            let outcome = run_catalog_command(
                &runtime,
                &catalog,
                &detector,
                command,
                default_threshold,
                args.verbose,
            );
            runtime.block_on(catalog.close())?;
            outcome?;
        }
    }

    Ok(())
}

fn run_catalog_command(
    runtime: &tokio::runtime::Runtime,
    catalog: &CatalogDb,
    detector: &Detector<YoloLoader>,
    command: CatalogCommand,
    default_threshold: f32,
    verbose: bool,
) -> anyhow::Result<()> {
    match command {
        CatalogCommand::AddImage { path } => {
            let image = runtime.block_on(catalog.add_image(&path))?;
            println!("Image uploaded successfully: {} (id {})", image.filename, image.id);
        }

        CatalogCommand::AddPlanogram { path } => {
            let planogram = runtime.block_on(catalog.add_planogram(&path))?;
            println!(
                "Planogram uploaded successfully: {} (id {})",
                planogram.file_name, planogram.id
            );
        }

        CatalogCommand::List => {
            let planograms = runtime.block_on(catalog.get_planograms())?;
            let images = runtime.block_on(catalog.get_images())?;

            println!("Planograms:");
            if planograms.is_empty() {
                println!("  (none)");
            }
            for p in &planograms {
                println!("  [{}] {}", p.id, p.file_path.display());
            }
            println!("Images:");
            if images.is_empty() {
                println!("  (none)");
            }
            for i in &images {
                println!("  [{}] {}", i.id, i.file_path.display());
            }
        }

        CatalogCommand::Compare {
            planogram_id,
            image_id,
            confidence,
            json,
        } => {
            let planogram_path = runtime
                .block_on(catalog.get_planogram_path(planogram_id))?
                .with_context(|| format!("No planogram with id {}", planogram_id))?;
            let image_path = runtime
                .block_on(catalog.get_image_path(image_id))?
                .with_context(|| format!("No image with id {}", image_id))?;

            let pipeline =
                AdherencePipeline::new(detector, confidence.unwrap_or(default_threshold))
                    .with_verbose(verbose);
            let report = pipeline.run(&ImageRef::Path(planogram_path), &ImageRef::Path(image_path))?;

            let record = runtime.block_on(catalog.record_comparison(
                planogram_id,
                image_id,
                &report.result,
            ))?;
            print_report(&report, json)?;
            if !json {
                println!("\nStored as {}", record.id);
            }
        }

        CatalogCommand::History {
            planogram_id,
            image_id,
        } => {
            let records = runtime.block_on(catalog.get_comparisons(planogram_id, image_id))?;
            if records.is_empty() {
                println!("No comparisons recorded.");
            }
            for record in &records {
                print_history_line(record);
            }
        }
    }

    Ok(())
}

fn print_report(report: &AdherenceReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    print_result(&report.result);
    Ok(())
}

fn print_result(result: &ComparisonResult) {
    println!("\n=== Planogram Adherence ===");
    println!("Adherence Score: {:.2}%", result.adherence_score);
    println!("Matched: {} of {} expected", result.total_matched, result.total_expected);
    if result.total_expected == 0 {
        println!("The planogram image has no detected products; the score is 0 by definition.");
    }

    if !result.missing_items.is_empty() {
        println!("\nMissing items:");
        for (label, count) in &result.missing_items {
            println!("  {}: {}", label, count);
        }
    }
    if !result.extra_items.is_empty() {
        println!("\nExtra items:");
        for (label, count) in &result.extra_items {
            println!("  {}: {}", label, count);
        }
    }
}

fn print_history_line(record: &ComparisonRecord) {
    println!(
        "{}  {}  {:.2}% ({} of {})",
        record.created_at,
        record.id,
        record.result.adherence_score,
        record.result.total_matched,
        record.result.total_expected
    );
}
