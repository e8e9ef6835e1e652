use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, warn};
use manual_press::capture::{ComposeStyle, ComposedSource, RasterSource, SnapshotSource};
use manual_press::export::{ExportFormat, ExportOptions, ManualExporter};
use manual_press::image_ref::embed_image_file;
use manual_press::manual::{FormSchema, ImagePolicy, ManualData};
use manual_press::PageGeometry;

/// Exports step-by-step manuals as paged PDFs or slide decks.
///
/// Regions are drawn from the manual JSON with the fonts found under
/// `MANUAL_PRESS_FONTS_DIR` or `assets/fonts`, unless `--snapshots` points at
/// a directory of pre-captured region PNGs.
#[derive(Parser)]
#[command(author, version, about = "Paginate manuals into PDF and slide decks")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a manual as a paged-image PDF.
    Pdf {
        #[command(flatten)]
        export: ExportArgs,

        /// Paper size.
        #[arg(long, value_enum, default_value_t = Paper::A4)]
        paper: Paper,

        /// Add an outline entry for the header and every step.
        #[arg(long)]
        bookmarks: bool,
    },

    /// Export a manual as a widescreen slide deck.
    Deck {
        #[command(flatten)]
        export: ExportArgs,
    },

    /// Validate a manual and list every field error.
    Check {
        /// Manual JSON file.
        manual: PathBuf,

        #[command(flatten)]
        form: FormArgs,
    },

    /// Write a starter manual with one blank step.
    Init {
        /// Destination JSON file.
        #[arg(default_value = "manual.json")]
        path: PathBuf,

        /// Replace an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Print an image file as a data URI for embedding in a manual.
    Embed {
        /// Image file to embed.
        image: PathBuf,
    },
}

#[derive(Args)]
struct FormArgs {
    /// Require images to be embedded data URIs.
    #[arg(long)]
    embedded_images: bool,

    /// Form variant without the introduction field.
    #[arg(long)]
    no_introduction: bool,
}

impl FormArgs {
    fn schema(&self) -> FormSchema {
        let policy = if self.embedded_images {
            ImagePolicy::Embedded
        } else {
            ImagePolicy::Url
        };
        FormSchema::default()
            .with_image_policy(policy)
            .with_introduction(!self.no_introduction)
    }
}

#[derive(Args)]
struct ExportArgs {
    /// Manual JSON file.
    manual: PathBuf,

    /// Output directory.
    #[arg(long, default_value = ".")]
    out: PathBuf,

    /// Output file name instead of one derived from the title.
    #[arg(long)]
    file_name: Option<String>,

    /// Page margin in points.
    #[arg(long)]
    margin: Option<f64>,

    /// Device pixels per CSS pixel for drawn regions.
    #[arg(long, default_value_t = 2.0)]
    scale: f32,

    /// Directory of `<element-id>.png` captures to use instead of drawing.
    #[arg(long)]
    snapshots: Option<PathBuf>,

    /// Export even when the manual fails validation.
    #[arg(long)]
    skip_validation: bool,

    #[command(flatten)]
    form: FormArgs,
}

#[derive(Clone, Copy, ValueEnum)]
enum Paper {
    A4,
    Letter,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Pdf {
            export,
            paper,
            bookmarks,
        } => {
            let geometry = match paper {
                Paper::A4 => PageGeometry::a4_portrait(),
                Paper::Letter => PageGeometry::letter_portrait(),
            };
            run_export(ExportFormat::Pdf, geometry, bookmarks, export).await
        }
        Commands::Deck { export } => {
            run_export(
                ExportFormat::Deck,
                PageGeometry::widescreen_slide(),
                false,
                export,
            )
            .await
        }
        Commands::Check { manual, form } => check(&manual, &form.schema()),
        Commands::Init { path, force } => init(&path, force),
        Commands::Embed { image } => embed_image_file(&image)
            .map(|uri| println!("{uri}"))
            .map_err(Into::into),
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        print_error_sources(err.as_ref());
        std::process::exit(1);
    }
}

type CliResult = Result<(), Box<dyn Error>>;

fn load_manual(path: &Path) -> Result<ManualData, Box<dyn Error>> {
    let json = fs::read_to_string(path)
        .map_err(|err| format!("cannot read {}: {err}", path.display()))?;
    Ok(ManualData::from_json(&json)?)
}

async fn run_export(
    format: ExportFormat,
    geometry: PageGeometry,
    bookmarks: bool,
    args: ExportArgs,
) -> CliResult {
    let manual = load_manual(&args.manual)?;
    let schema = args.form.schema();

    if let Err(errors) = manual.validate(&schema) {
        if !args.skip_validation {
            return Err(errors.into());
        }
        warn!("exporting despite validation errors: {errors}");
    }

    let geometry = match args.margin {
        Some(margin) => geometry.with_margin(margin)?,
        None => geometry,
    };
    let mut options = ExportOptions::new(format)
        .with_geometry(geometry)
        .with_output_dir(&args.out)
        .with_schema(schema)
        .with_bookmarks(bookmarks);
    if let Some(file_name) = &args.file_name {
        options = options.with_file_name(file_name);
    }

    let source: Box<dyn RasterSource> = match &args.snapshots {
        Some(directory) => {
            info!("using region snapshots from {}", directory.display());
            Box::new(SnapshotSource::new(directory))
        }
        None => {
            let range = ComposeStyle::MIN_SCALE..=ComposeStyle::MAX_SCALE;
            if !range.contains(&args.scale) {
                return Err(format!(
                    "--scale must be between {} and {}, got {}",
                    range.start(),
                    range.end(),
                    args.scale
                )
                .into());
            }
            Box::new(
                ComposedSource::with_default_fonts(manual.clone(), schema)?
                    .with_style(ComposeStyle::default().with_scale(args.scale)),
            )
        }
    };

    let report = ManualExporter::new()
        .export(&manual, source.as_ref(), &options)
        .await?;
    println!(
        "Wrote {} ({} page(s), {} bytes)",
        report.path.display(),
        report.pages,
        report.bytes
    );
    Ok(())
}

fn check(path: &Path, schema: &FormSchema) -> CliResult {
    let manual = load_manual(path)?;
    match manual.validate(schema) {
        Ok(()) => {
            println!(
                "{}: ok ({} step(s))",
                path.display(),
                manual.steps().len()
            );
            Ok(())
        }
        Err(errors) => {
            for error in errors.errors() {
                println!("{error}");
            }
            Err(errors.into())
        }
    }
}

fn init(path: &Path, force: bool) -> CliResult {
    if path.exists() && !force {
        return Err(format!("{} already exists; pass --force to replace it", path.display()).into());
    }
    fs::write(path, ManualData::starter().to_json_pretty()?)?;
    println!("Wrote starter manual to {}", path.display());
    Ok(())
}

fn print_error_sources(mut error: &(dyn Error + 'static)) {
    while let Some(source) = error.source() {
        eprintln!("  caused by: {}", source);
        error = source;
    }
}
