//! houseprice CLI - Cluster local authorities by median house-price growth
//!
//! # Main Command
//!
//! ```bash
//! houseprice analyze prices.xlsx --boundaries lad.geojson   # Full run: exports, charts, maps
//! ```
//!
//! # Step Commands
//!
//! ```bash
//! houseprice reshape prices.xlsx -o long.csv   # Wide table to long CSV
//! houseprice elbow prices.xlsx --max-k 12      # WCSS for k = 1..=max_k
//! houseprice cluster prices.xlsx -k 5          # Assignments CSV
//! ```
//!
//! `HOUSEPRICE_SHEET` and `HOUSEPRICE_SKIP_ROWS` (environment or `.env`)
//! change where the table is read from.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use houseprice::{
    analyze_table, elbow, filter_dates, parse_period, prepare_matrix, read_table, run, wide_to_long,
    AnalysisOptions, FeatureKind, Linkage, MissingPolicy,
};
use houseprice::report::{assignment_rows, export::write_csv, write_long_table, write_json};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "houseprice")]
#[command(about = "Cluster local authorities by median house-price growth", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where to read the wide table from
#[derive(Args)]
struct SourceArgs {
    /// Input workbook (.xlsx/.xls/.ods) or CSV export
    input: PathBuf,

    /// Sheet name (workbooks only) [default: 2a]
    #[arg(long, env = "HOUSEPRICE_SHEET")]
    sheet: Option<String>,

    /// Rows above the header row [default: 6]
    #[arg(long, env = "HOUSEPRICE_SKIP_ROWS")]
    skip_rows: Option<usize>,

    /// First date kept, e.g. 2005-03 or "Year ending Mar 2005"
    #[arg(long, value_parser = parse_date_arg)]
    from: Option<NaiveDate>,

    /// Last date kept
    #[arg(long, value_parser = parse_date_arg)]
    to: Option<NaiveDate>,
}

/// Feature and missing-value handling shared by clustering commands
#[derive(Args)]
struct MatrixArgs {
    /// Value clustered: index or price [default: index]
    #[arg(long)]
    feature: Option<FeatureKind>,

    /// Drop local authorities with gaps instead of failing
    #[arg(long)]
    drop_incomplete: bool,

    /// k-means seed [default: 42]
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Full pipeline: reshape, index, cluster, export, charts and maps
    Analyze {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        matrix: MatrixArgs,

        /// Number of clusters [default: 4]
        #[arg(short)]
        k: Option<usize>,

        /// Largest k on the elbow curve [default: 10]
        #[arg(long)]
        max_k: Option<usize>,

        /// Linkage: single, complete, average, weighted, ward [default: complete]
        #[arg(long)]
        linkage: Option<Linkage>,

        /// GeoJSON boundary file for choropleth maps
        #[arg(long)]
        boundaries: Option<PathBuf>,

        /// Boundary property holding the local-authority code [default: LAD21CD]
        #[arg(long)]
        code_field: Option<String>,

        /// Output directory [default: out]
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Skip SVG charts
        #[arg(long)]
        no_charts: bool,

        /// Skip maps even when boundaries are given
        #[arg(long)]
        no_map: bool,

        /// JSON options file; flags given here take precedence
        #[arg(long)]
        options: Option<PathBuf>,
    },

    /// Reshape the wide table into a long CSV (one row per location and date)
    Reshape {
        #[command(flatten)]
        source: SourceArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the k-means elbow curve
    Elbow {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        matrix: MatrixArgs,

        /// Largest k [default: 10]
        #[arg(long)]
        max_k: Option<usize>,

        /// Also write the JSON curve to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Cluster and print assignments CSV
    Cluster {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        matrix: MatrixArgs,

        /// Number of clusters [default: 4]
        #[arg(short)]
        k: Option<usize>,

        /// Linkage [default: complete]
        #[arg(long)]
        linkage: Option<Linkage>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Analyze {
            source,
            matrix,
            k,
            max_k,
            linkage,
            boundaries,
            code_field,
            out_dir,
            no_charts,
            no_map,
            options,
        } => build_options(options.as_deref(), &source, &matrix).and_then(|mut opts| {
            if let Some(k) = k {
                opts.k = k;
            }
            if let Some(max_k) = max_k {
                opts.max_k = max_k;
            }
            if let Some(linkage) = linkage {
                opts.linkage = linkage;
            }
            if boundaries.is_some() {
                opts.boundaries = boundaries;
            }
            if let Some(field) = code_field {
                opts.code_field = field;
            }
            if let Some(dir) = out_dir {
                opts.out_dir = dir;
            }
            opts.no_charts |= no_charts;
            opts.no_map |= no_map;
            cmd_analyze(&opts)
        }),

        Commands::Reshape { source, output } => cmd_reshape(&source, output.as_deref()),

        Commands::Elbow {
            source,
            matrix,
            max_k,
            output,
        } => build_options(None, &source, &matrix).and_then(|mut opts| {
            if let Some(max_k) = max_k {
                opts.max_k = max_k;
            }
            cmd_elbow(&opts, output.as_deref())
        }),

        Commands::Cluster {
            source,
            matrix,
            k,
            linkage,
            output,
        } => build_options(None, &source, &matrix).and_then(|mut opts| {
            if let Some(k) = k {
                opts.k = k;
            }
            if let Some(linkage) = linkage {
                opts.linkage = linkage;
            }
            opts.max_k = 1;
            cmd_cluster(&opts, output.as_deref())
        }),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    parse_period(value).ok_or_else(|| format!("not a date: '{}'", value))
}

/// Options file (or defaults) overlaid with explicit flags.
fn build_options(
    file: Option<&Path>,
    source: &SourceArgs,
    matrix: &MatrixArgs,
) -> Result<AnalysisOptions, Box<dyn std::error::Error>> {
    let mut opts = match file {
        Some(path) => AnalysisOptions::from_json_file(path)?,
        None => AnalysisOptions::default(),
    };

    opts.input = Some(source.input.clone());
    if let Some(sheet) = &source.sheet {
        opts.sheet = sheet.clone();
    }
    if let Some(skip) = source.skip_rows {
        opts.skip_rows = skip;
    }
    if source.from.is_some() {
        opts.from = source.from;
    }
    if source.to.is_some() {
        opts.to = source.to;
    }
    if let Some(feature) = matrix.feature {
        opts.feature = feature;
    }
    if matrix.drop_incomplete {
        opts.missing = MissingPolicy::DropIncomplete;
    }
    if let Some(seed) = matrix.seed {
        opts.seed = seed;
    }
    Ok(opts)
}

fn cmd_analyze(options: &AnalysisOptions) -> Result<(), Box<dyn std::error::Error>> {
    let result = run(options)?;
    let summary = &result.summary;

    eprintln!("\n📊 {} local authorities, {} dates", summary.counts.matrix_locations, summary.counts.dates);
    if !summary.counts.dropped.is_empty() {
        eprintln!("   Dropped: {}", summary.counts.dropped.join(", "));
    }
    for (algorithm, profiles) in &summary.profiles {
        let sizes: Vec<String> = profiles.iter().map(|p| format!("{}:{}", p.label, p.members)).collect();
        eprintln!("   {}: {}", algorithm, sizes.join("  "));
    }
    for path in &summary.outputs {
        eprintln!("   💾 {}", path.display());
    }

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_reshape(source: &SourceArgs, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let source_spec = houseprice::SourceSpec {
        sheet: source.sheet.clone().unwrap_or_else(|| houseprice::DEFAULT_SHEET.to_string()),
        skip_rows: source.skip_rows.unwrap_or(houseprice::DEFAULT_SKIP_ROWS),
    };
    eprintln!("📄 Reading: {}", source.input.display());

    let table = read_table(&source.input, &source_spec)?;
    let observations = filter_dates(wide_to_long(&table)?, source.from, source.to)?;
    eprintln!("✅ {} observations", observations.len());

    match output {
        Some(path) => {
            write_long_table(fs::File::create(path)?, &observations)?;
            eprintln!("💾 Output written to: {}", path.display());
        }
        None => write_long_table(io::stdout().lock(), &observations)?,
    }
    Ok(())
}

fn cmd_elbow(options: &AnalysisOptions, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let table = read_table(source_path(options)?, &options.source())?;
    let prepared = prepare_matrix(&table, options)?;
    let matrix = &prepared.matrix;

    let curve = elbow(&matrix.values, options.max_k, matrix.distinct_rows(), options.seed)?;
    println!("k,wcss");
    for point in &curve {
        println!("{},{:.4}", point.k, point.wcss);
    }

    if let Some(path) = output {
        write_json(path, &curve)?;
        eprintln!("💾 Output written to: {}", path.display());
    }
    Ok(())
}

fn cmd_cluster(options: &AnalysisOptions, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let table = read_table(source_path(options)?, &options.source())?;
    let analysis = analyze_table(&table, options)?;
    let rows = assignment_rows(&analysis.matrix, &analysis.kmeans, &analysis.hierarchical);

    match output {
        Some(path) => {
            write_csv(fs::File::create(path)?, &rows)?;
            eprintln!("💾 Output written to: {}", path.display());
        }
        None => write_csv(io::stdout().lock(), &rows)?,
    }
    Ok(())
}

fn source_path(options: &AnalysisOptions) -> Result<&Path, Box<dyn std::error::Error>> {
    options.input.as_deref().ok_or_else(|| "no input file given".into())
}
