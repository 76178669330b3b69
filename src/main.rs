use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sheetdigest::cli;
use sheetdigest::config::{Config, ConfigOverrides};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sheetdigest")]
#[command(about = "Spreadsheets to compact, LLM-ready JSON. Formulas preserved.")]
#[command(long_about = "sheetdigest - Spreadsheet to LLM JSON converter
Formula-preserving sampling | Abbreviated keys | Cross-workbook merge

COMMANDS:
  convert  - Convert one workbook to JSON
  batch    - Convert files, directories or glob patterns in parallel
  combine  - Convert a directory and merge it into one consolidated JSON
  merge    - Merge existing workbook JSON documents

EXAMPLES:
  sheetdigest convert Budget.xlsx -i             # Sample large sheets
  sheetdigest batch reports/ 'archive/*.xlsx' -j 8
  sheetdigest combine finance/ -o consolidated_json
  sheetdigest merge converted_json/*.json -n

LOGGING:
  Set SHEETDIGEST_LOG (e.g. sheetdigest=debug) for detailed logs on stderr.")]
#[command(version)]
struct Cli {
    /// YAML configuration file; command-line flags override its values
    #[arg(long, global = true, env = "SHEETDIGEST_CONFIG")]
    config: Option<PathBuf>,

    /// Log progress on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Conversion flags shared by convert, batch and combine
#[derive(Args, Debug, Default)]
struct ConvertArgs {
    /// Maximum rows per sheet when not sampling
    #[arg(short, long, value_name = "N")]
    rows: Option<u32>,

    /// Only formula cells, the cells they reference and a few data cells
    #[arg(short, long)]
    formulas_only: bool,

    /// Include cell validations, hyperlinks and comments (xlsx/xlsm)
    #[arg(short, long)]
    keep_formatting: bool,

    /// Skip the enriched context block
    #[arg(short = 'c', long)]
    no_context: bool,

    /// Formula-preserving sampling of sheets over 50 rows
    #[arg(short = 'i', long)]
    intelligent_sampling: bool,

    /// Sampling interval for repeated formula rows
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    base_rate: Option<u32>,

    /// Keep the base rate regardless of sheet size
    #[arg(long)]
    no_aggressive: bool,
}

/// Output flags shared by every command
#[derive(Args, Debug, Default)]
struct OutputArgs {
    /// Directory for the written JSON
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Write JSON without whitespace
    #[arg(short, long)]
    minify: bool,

    /// Use full property names instead of abbreviated ones
    #[arg(short = 'n', long)]
    full_names: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert one workbook to JSON
    Convert {
        /// Spreadsheet file (.xlsx, .xlsm, .xls)
        file: PathBuf,

        #[command(flatten)]
        convert: ConvertArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    #[command(long_about = "Convert many workbooks in parallel.

Each argument may be a file, a directory (searched recursively) or a glob
pattern such as 'reports/**/*.xlsx'. A failing workbook is reported and the
rest of the batch carries on.")]
    /// Convert files, directories or glob patterns in parallel
    Batch {
        /// Files, directories or glob patterns
        #[arg(required = true)]
        paths: Vec<String>,

        /// Worker threads (default: number of CPUs)
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        jobs: Option<u64>,

        #[command(flatten)]
        convert: ConvertArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    #[command(long_about = "Convert every workbook in a directory and merge the results.

Per-workbook documents go to 'converted_json' next to the directory; the
consolidated document goes to --output-dir (default 'consolidated_json').
Cross-workbook references such as ='[Budget2024.xlsx]Summary'!B2 are
resolved to workbook ids when the target is part of the set.")]
    /// Convert a directory and merge it into one consolidated JSON
    Combine {
        /// Directory containing the workbooks
        directory: PathBuf,

        /// Reuse the documents already in 'converted_json'
        #[arg(short, long)]
        skip_processing: bool,

        /// Worker threads (default: number of CPUs)
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        jobs: Option<u64>,

        #[command(flatten)]
        convert: ConvertArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Merge existing workbook JSON documents
    Merge {
        /// Workbook documents written by convert or batch
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,
    },
}

fn overrides(convert: &ConvertArgs, output: &OutputArgs, jobs: Option<u64>) -> ConfigOverrides {
    let flag = |set: bool| set.then_some(true);
    ConfigOverrides {
        output_dir: output.output_dir.clone(),
        rows: convert.rows,
        formulas_only: flag(convert.formulas_only),
        keep_formatting: flag(convert.keep_formatting),
        minify: flag(output.minify),
        full_names: flag(output.full_names),
        no_context: flag(convert.no_context),
        sampling: flag(convert.intelligent_sampling),
        base_rate: convert.base_rate,
        aggressive: convert.no_aggressive.then_some(false),
        jobs: jobs.map(|j| j as usize),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "sheetdigest=info"
    } else {
        "sheetdigest=warn"
    };
    let filter = EnvFilter::try_from_env("SHEETDIGEST_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load_or_default(cli.config.as_deref())
        .with_context(|| "Failed to load configuration")?;

    let overrides = match &cli.command {
        Commands::Convert {
            convert, output, ..
        } => overrides(convert, output, None),
        Commands::Batch {
            convert,
            output,
            jobs,
            ..
        }
        | Commands::Combine {
            convert,
            output,
            jobs,
            ..
        } => overrides(convert, output, *jobs),
        Commands::Merge { output, .. } => overrides(&ConvertArgs::default(), output, None),
    };
    config.apply_overrides(&overrides);
    config.validate()?;

    match cli.command {
        Commands::Convert { file, .. } => cli::convert(file, &config)?,
        Commands::Batch { paths, .. } => cli::batch(paths, &config)?,
        Commands::Combine {
            directory,
            skip_processing,
            ..
        } => cli::combine(directory, skip_processing, &config)?,
        Commands::Merge { files, .. } => cli::merge(files, &config)?,
    }

    Ok(())
}
