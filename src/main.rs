use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueHint};
use clap_complete::{generate, Shell};
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::info;

use straindb::config::Config;
use straindb::filter::FilterPass;
use straindb::normalize;
use straindb::parsers::{AlleleClassifier, GenotypeParser};

/// Laboratory strain record normalizer
#[derive(Parser, Debug)]
#[command(
    name = "straindb",
    version,
    about = "Normalizes laboratory strain, allele and plasmid records",
    long_about = r#"
A pipeline for cleaning free-text laboratory records:
- Validates strain, allele and plasmid rows against naming conventions
- Parses genotype notation into structured documents
- Classifies allele names (mutant, transgene, rearrangement)
- Flattens parsed genotypes into relational tables ready for database load
"#
)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Config file with the raw table paths and output directory
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "straindb.toml",
        value_hint = ValueHint::FilePath
    )]
    config: PathBuf,

    /// Override the configured output directory
    #[arg(short, long, value_name = "DIR", value_hint = ValueHint::DirPath)]
    output: Option<PathBuf>,

    /// Number of threads (0 = auto-detect)
    #[arg(short, long, default_value = "0", help = "Number of threads (0 = auto)")]
    threads: usize,

    /// Overwrite a non-empty output directory without asking
    #[arg(short = 'y', long)]
    yes: bool,

    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate raw rows and write filtered tables plus error logs
    Filter,
    /// Flatten filtered tables into relational output tables
    Normalize,
    /// Run the filter and normalize passes back to back
    Run,
    /// Parse one genotype string and print the document as JSON
    Parse { genotype: String },
    /// Classify one allele name
    Classify { allele: String },
    /// Generate shell completions
    Completions { shell: Shell },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle shell completions
    if let Commands::Completions { shell } = cli.command {
        generate_completions(shell);
        return Ok(());
    }

    // Initialize logging
    init_logging(cli.verbose);

    // Single-value debug helpers need neither config nor thread pool
    match &cli.command {
        Commands::Parse { genotype } => return run_parse(genotype),
        Commands::Classify { allele } => return run_classify(allele),
        _ => {}
    }

    let mut config = Config::load(&cli.config)?;
    if let Some(output) = cli.output.clone() {
        config.output_directory = output;
    }

    // Initialize thread pool
    init_thread_pool(cli.threads)?;

    info!("Using {} threads", rayon::current_num_threads());

    match cli.command {
        Commands::Filter => run_filter(&config, cli.yes)?,
        Commands::Normalize => run_normalize(&config)?,
        Commands::Run => {
            run_filter(&config, cli.yes)?;
            run_normalize(&config)?;
        }
        Commands::Parse { .. } | Commands::Classify { .. } | Commands::Completions { .. } => {}
    }

    Ok(())
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!("straindb={}", level))
        .init();
}

fn init_thread_pool(threads: usize) -> Result<()> {
    let num_threads = if threads == 0 {
        num_cpus::get()
    } else {
        threads
    };

    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
        .map_err(|e| anyhow::anyhow!("Failed to initialize thread pool: {}", e))?;

    Ok(())
}

fn run_parse(genotype: &str) -> Result<()> {
    let parser = GenotypeParser::new();
    match parser.parse(genotype) {
        Some(doc) => {
            println!("{}", serde_json::to_string_pretty(&doc)?);
            Ok(())
        }
        None => bail!("Could not parse genotype: {}", genotype),
    }
}

fn run_classify(allele: &str) -> Result<()> {
    let classifier = AlleleClassifier::new();
    let (cleaned, class) = classifier.classify(allele)?;
    println!("{} {}", style(&cleaned).bold(), class);
    Ok(())
}

fn run_filter(config: &Config, assume_yes: bool) -> Result<()> {
    confirm_overwrite(config, assume_yes)?;

    let pb = ProgressBar::new(3);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let pass = FilterPass::new(config)?;

    pb.set_message("Filtering strain table...");
    let mut all_stats = vec![pass.strains()?];
    pb.inc(1);

    pb.set_message("Filtering allele table...");
    all_stats.push(pass.alleles()?);
    pb.inc(1);

    pb.set_message("Filtering plasmid table...");
    all_stats.push(pass.plasmids()?);
    pb.inc(1);

    pb.finish_with_message("Filter pass complete");

    for stats in &all_stats {
        println!("{}", stats);
    }

    println!(
        "\n{} Filtered tables written to: {}",
        style("✓").green().bold(),
        style(config.filter_dir().display()).cyan()
    );

    Ok(())
}

fn run_normalize(config: &Config) -> Result<()> {
    let pb = ProgressBar::new(2);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    pb.set_message("Flattening genotypes into the strain_allele table...");
    let strain_rows = normalize::normalize_strains(config)?;
    pb.inc(1);

    pb.set_message("Splitting allele plasmid lists...");
    let allele_rows = normalize::normalize_alleles(config)?;
    pb.inc(1);

    pb.finish_with_message("Normalize pass complete");

    println!(
        "\n{} {} strain_allele rows and {} allele rows written to: {}",
        style("✓").green().bold(),
        strain_rows,
        allele_rows,
        style(config.normalize_dir().display()).cyan()
    );

    Ok(())
}

fn confirm_overwrite(config: &Config, assume_yes: bool) -> Result<()> {
    let outdir = &config.output_directory;
    if assume_yes || !outdir.exists() {
        return Ok(());
    }

    let occupied = fs::read_dir(outdir)
        .with_context(|| format!("Failed to read directory: {}", outdir.display()))?
        .next()
        .is_some();
    if !occupied {
        return Ok(());
    }

    let proceed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!(
            "Output directory {} is not empty. Overwrite?",
            outdir.display()
        ))
        .default(false)
        .interact()?;

    if !proceed {
        bail!("Aborted by user");
    }

    Ok(())
}
