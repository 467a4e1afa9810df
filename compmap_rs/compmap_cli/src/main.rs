use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use compmap::{
    CategoryAxis, CourseRecord, Dashboard, FilterCriteria, ObjectiveCatalog, Palette, RenderMode,
    SchemaConfig, ALL_SENTINEL, OBJECTIVE_COUNT,
};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_COMMIT_HASH"), ")");

#[derive(Parser, Debug)]
#[command(author, version = VERSION, about = "Course competency objective mapping CLI", long_about = None)]
struct Cli {
    #[command(flatten)]
    source: SourceArgs,

    /// Verbose logging
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the filtered course table as CSV
    List(ListArgs),
    /// Show the options of both category selectors
    Categories,
    /// Render objective maps for the filtered or selected courses
    Render(RenderArgs),
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Course table CSV
    #[arg(long, global = true, default_value = "courses.csv", value_hint = ValueHint::FilePath)]
    data: PathBuf,

    /// JSON schema naming the code, name, category and objective columns
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    schema: Option<PathBuf>,

    /// Built-in schema used when --schema is not given
    #[arg(long, global = true, value_enum, default_value_t = PresetOpt::YearSemester)]
    preset: PresetOpt,

    /// JSON map of objective number to description
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    catalog: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Case-insensitive substring of the course code or name
    #[arg(short, long)]
    search: Option<String>,

    /// First category value ("All" for no restriction)
    #[arg(long)]
    category_a: Option<String>,

    /// Second category value ("All" for no restriction)
    #[arg(long)]
    category_b: Option<String>,
}

#[derive(Args, Debug)]
struct ListArgs {
    #[command(flatten)]
    filter: FilterArgs,

    /// Output CSV path (`-` for stdout)
    #[arg(short, long, default_value = "-", value_hint = ValueHint::FilePath)]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[command(flatten)]
    filter: FilterArgs,

    /// Course code to render (repeatable); defaults to the first match
    #[arg(short, long = "course")]
    courses: Vec<String>,

    /// Render every matching course
    #[arg(long, action = ArgAction::SetTrue, conflicts_with = "courses")]
    all: bool,

    /// Color scheme
    #[arg(long, value_enum, default_value_t = PaletteOpt::Light)]
    palette: PaletteOpt,

    /// Heatmap grid or proportional treemap
    #[arg(long, value_enum, default_value_t = ModeOpt::Heatmap)]
    mode: ModeOpt,

    /// Directory receiving the PNG files
    #[arg(long, default_value = ".", value_hint = ValueHint::DirPath)]
    out_dir: PathBuf,

    /// Optional JSON manifest describing the exported files
    #[arg(long, value_hint = ValueHint::FilePath)]
    manifest: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum PaletteOpt {
    Light,
    Dark,
}

impl From<PaletteOpt> for Palette {
    fn from(value: PaletteOpt) -> Self {
        match value {
            PaletteOpt::Light => Palette::Light,
            PaletteOpt::Dark => Palette::Dark,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ModeOpt {
    Heatmap,
    Treemap,
}

impl From<ModeOpt> for RenderMode {
    fn from(value: ModeOpt) -> Self {
        match value {
            ModeOpt::Heatmap => RenderMode::Heatmap,
            ModeOpt::Treemap => RenderMode::Treemap,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum PresetOpt {
    /// Year / Semester categories
    YearSemester,
    /// VM Term / Course Type categories
    TermType,
}

impl From<PresetOpt> for SchemaConfig {
    fn from(value: PresetOpt) -> Self {
        match value {
            PresetOpt::YearSemester => SchemaConfig::year_semester(),
            PresetOpt::TermType => SchemaConfig::term_type(),
        }
    }
}

impl From<&FilterArgs> for FilterCriteria {
    fn from(args: &FilterArgs) -> Self {
        let mut criteria = FilterCriteria::new();
        if let Some(text) = &args.search {
            criteria = criteria.with_text(text.as_str());
        }
        if let Some(value) = &args.category_a {
            criteria = criteria.with_category_a(value.as_str());
        }
        if let Some(value) = &args.category_b {
            criteria = criteria.with_category_b(value.as_str());
        }
        criteria
    }
}

#[derive(Serialize, Debug)]
struct Manifest {
    generated_at: String,
    data: String,
    entries: Vec<ManifestEntry>,
}

#[derive(Serialize, Debug)]
struct ManifestEntry {
    code: String,
    path: String,
    mode: RenderMode,
    palette: Palette,
    width: u32,
    height: u32,
    fingerprint: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let dashboard = open_dashboard(&cli.source)?;
    match cli.command {
        Command::List(args) => handle_list(&dashboard, &args),
        Command::Categories => handle_categories(&dashboard),
        Command::Render(args) => handle_render(&dashboard, &cli.source, &args),
    }
}

fn open_dashboard(source: &SourceArgs) -> Result<Dashboard> {
    let schema = match source.schema.as_ref() {
        Some(path) => SchemaConfig::from_path(path)
            .with_context(|| format!("failed to load schema {}", path.display()))?,
        None => SchemaConfig::from(source.preset),
    };
    let catalog = match source.catalog.as_ref() {
        Some(path) => ObjectiveCatalog::from_path(path)
            .with_context(|| format!("failed to load objective catalog {}", path.display()))?,
        None => ObjectiveCatalog::standard(),
    };
    debug!(
        "Schema: code={} name={} categories=({}, {})",
        schema.code_column, schema.name_column, schema.category_a, schema.category_b
    );
    Dashboard::open(&source.data, &schema, catalog)
        .with_context(|| format!("failed to load course table {}", source.data.display()))
}

fn handle_list(dashboard: &Dashboard, args: &ListArgs) -> Result<()> {
    let criteria = FilterCriteria::from(&args.filter);
    let view = dashboard.view(&criteria);
    let schema = dashboard.table().schema();

    if args.output.as_os_str() == "-" {
        let stdout = io::stdout();
        let mut writer = csv::Writer::from_writer(stdout.lock());
        write_course_rows(schema, &view, &mut writer)?;
    } else {
        let file = File::create(&args.output)
            .with_context(|| format!("failed to create {}", args.output.display()))?;
        let mut writer = csv::Writer::from_writer(file);
        write_course_rows(schema, &view, &mut writer)?;
        info!("Wrote course table: {}", args.output.display());
    }
    info!("{} of {} courses match", view.len(), dashboard.table().len());
    Ok(())
}

fn write_course_rows<W: Write>(
    schema: &SchemaConfig,
    records: &[&CourseRecord],
    writer: &mut csv::Writer<W>,
) -> Result<()> {
    let mut header = vec![
        "Course".to_string(),
        schema.category_column(CategoryAxis::A).to_string(),
        schema.category_column(CategoryAxis::B).to_string(),
    ];
    header.extend((1..=OBJECTIVE_COUNT).map(|n| format!("Obj {}", n)));
    writer.write_record(&header)?;

    for record in records {
        let mut row = vec![
            record.label(),
            record.category_a.clone(),
            record.category_b.clone(),
        ];
        row.extend(record.objectives.iter().map(|v| v.to_string()));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn handle_categories(dashboard: &Dashboard) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_categories(dashboard, &mut out)
}

fn write_categories<W: Write>(dashboard: &Dashboard, out: &mut W) -> Result<()> {
    let table = dashboard.table();
    for axis in [CategoryAxis::A, CategoryAxis::B] {
        let mut options = vec![ALL_SENTINEL];
        options.extend(table.category_values(axis));
        writeln!(
            out,
            "{}: {}",
            table.schema().category_column(axis),
            options.join(", ")
        )?;
    }
    Ok(())
}

fn handle_render(dashboard: &Dashboard, source: &SourceArgs, args: &RenderArgs) -> Result<()> {
    let criteria = FilterCriteria::from(&args.filter);
    let selection: Vec<String> = if args.all {
        dashboard
            .view(&criteria)
            .iter()
            .map(|record| record.code.clone())
            .collect()
    } else {
        args.courses.clone()
    };

    let records = dashboard.selected(&criteria, &selection)?;
    if records.is_empty() {
        println!("No matching courses found for the current filters.");
        return Ok(());
    }

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create {}", args.out_dir.display()))?;

    let palette = Palette::from(args.palette);
    let mode = RenderMode::from(args.mode);
    let entries = records
        .par_iter()
        .map(|record| export_course(dashboard, &record.code, palette, mode, &args.out_dir))
        .collect::<Result<Vec<_>>>()?;

    for entry in &entries {
        info!("Wrote {} ({}x{})", entry.path, entry.width, entry.height);
    }

    if let Some(path) = args.manifest.as_ref() {
        let manifest = Manifest {
            generated_at: Utc::now().to_rfc3339(),
            data: source.data.display().to_string(),
            entries,
        };
        write_manifest(&manifest, path)?;
        info!("Wrote manifest: {}", path.display());
    }
    Ok(())
}

fn export_course(
    dashboard: &Dashboard,
    code: &str,
    palette: Palette,
    mode: RenderMode,
    out_dir: &Path,
) -> Result<ManifestEntry> {
    let artifact = dashboard
        .render_course(code, palette, mode)
        .with_context(|| format!("failed to render {}", code))?;
    let path = artifact.save(out_dir)?;
    Ok(ManifestEntry {
        code: code.to_string(),
        path: path.display().to_string(),
        mode,
        palette,
        width: artifact.width(),
        height: artifact.height(),
        fingerprint: artifact.fingerprint(),
    })
}

fn write_manifest(manifest: &Manifest, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, manifest)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
