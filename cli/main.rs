// ========================================================================================
//
//                            The command-line driver: boolnet
//
// ========================================================================================
//
// Parses arguments, layers the configuration (defaults, then an optional TOML file,
// then explicit flags), opens the bit-vector source and the output sink, and hands
// everything to the scanner. Every failure is reported on stderr with exit status 1.

#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

use boolnet::config::AnalysisConfig;
use boolnet::error::{NetworkError, Result};
use boolnet::gene_list::GeneList;
use boolnet::phenotype::{ALL_SAMPLES, MaskSpec};
use boolnet::scan::{BlockedPairScanner, ScanSummary};
use boolnet::shared::files::BitVectorFile;
use boolnet::sink::{OutputMode, open_sink};
use boolnet::types::RelationCode;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process;
use std::sync::Once;
use std::time::Instant;

// ========================================================================================
//                              Command-line interface definition
// ========================================================================================

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeCli {
    /// Packed balanced × balanced code matrix
    Dense,
    /// One TSV row per significant pair
    Sparse,
}

impl From<ModeCli> for OutputMode {
    fn from(mode: ModeCli) -> Self {
        match mode {
            ModeCli::Dense => OutputMode::Dense,
            ModeCli::Sparse => OutputMode::Sparse,
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "boolnet",
    version,
    about = "Builds Boolean implication networks from thresholded gene expression."
)]
struct Args {
    /// Tab-separated bit-vector file (header line, then id, name, tri-state string)
    #[clap(value_name = "BITVECTOR_PATH")]
    input: PathBuf,

    /// Output network file
    #[arg(long, short)]
    out: PathBuf,

    #[arg(long, value_enum, default_value_t = ModeCli::Sparse)]
    mode: ModeCli,

    /// TOML file with analysis settings; explicit flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum error score of a sparse cell [default: 0.10]
    #[arg(long)]
    threshold: Option<f64>,

    /// Minimum residual of a sparse cell [default: 3.0]
    #[arg(long)]
    stat_threshold: Option<f64>,

    /// Maximum minority proportion for a low/high gene [default: 0.05]
    #[arg(long)]
    single_threshold: Option<f64>,

    /// Minority count below which a gene may be low/high [default: 20]
    #[arg(long)]
    single_cutoff: Option<usize>,

    /// Genes per block [default: 8000]
    #[arg(long)]
    block_size: Option<usize>,

    /// Rows held by the reader's cache [default: 4096]
    #[arg(long)]
    cache_rows: Option<usize>,

    /// Phenotype file selecting a subset of samples
    #[arg(long)]
    phenotype_file: Option<PathBuf>,

    /// Phenotype id to use from --phenotype-file
    #[arg(long, default_value = ALL_SAMPLES)]
    phenotype: String,

    /// Restrict the run to the gene ids listed in this file
    #[arg(long)]
    genes: Option<PathBuf>,

    /// Worker threads for pair evaluation [default: all cores]
    #[arg(long)]
    threads: Option<usize>,
}

// ========================================================================================
//                              The main orchestration logic
// ========================================================================================

static RAYON_INIT: Once = Once::new();

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("Error: {e}");
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            eprintln!("  caused by: {cause}");
            source = cause.source();
        }
        process::exit(1);
    }
}

fn resolve_config(args: &Args) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_toml_file(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(v) = args.threshold {
        config.prob_threshold = v;
    }
    if let Some(v) = args.stat_threshold {
        config.stat_threshold = v;
    }
    if let Some(v) = args.single_threshold {
        config.single_threshold = v;
    }
    if let Some(v) = args.single_cutoff {
        config.single_cutoff = v;
    }
    if let Some(v) = args.block_size {
        config.block_size = v;
    }
    if let Some(v) = args.cache_rows {
        config.cache_rows = v;
    }
    config.validate()?;
    Ok(config)
}

fn resolve_mask(args: &Args) -> Result<MaskSpec> {
    match (&args.phenotype_file, args.phenotype.as_str()) {
        (_, ALL_SAMPLES) => Ok(MaskSpec::All),
        (Some(file), id) => Ok(MaskSpec::Named {
            file: file.clone(),
            id: id.to_string(),
        }),
        (None, id) => Err(NetworkError::config(format!(
            "phenotype '{id}' requested without --phenotype-file"
        ))),
    }
}

fn init_thread_pool(threads: Option<usize>) -> Result<()> {
    let mut outcome = Ok(());
    RAYON_INIT.call_once(|| {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(n) = threads {
            builder = builder.num_threads(n);
        }
        if let Err(e) = builder.build_global() {
            outcome = Err(NetworkError::config(format!(
                "failed to initialize the thread pool: {e}"
            )));
        }
    });
    outcome
}

fn run(args: Args) -> Result<()> {
    let overall_start = Instant::now();
    if args.threads == Some(0) {
        return Err(NetworkError::config("--threads must be at least 1"));
    }
    init_thread_pool(args.threads)?;

    let config = resolve_config(&args)?;
    let mask = resolve_mask(&args)?;
    let genes = args
        .genes
        .as_deref()
        .map(GeneList::from_file)
        .transpose()?;
    if let Some(list) = &genes {
        eprintln!("> Restricting the run to {} listed genes", list.len());
    }

    eprintln!("> Indexing bit-vector file {}", args.input.display());
    let mut source = BitVectorFile::open(&args.input, config.cache_rows)?;

    let mode = OutputMode::from(args.mode);
    let mut sink = open_sink(mode, &args.out);
    eprintln!(
        "> Scanning {} with block size {} ({:?} output to {})",
        args.input.display(),
        config.block_size,
        mode,
        args.out.display()
    );

    let mut scanner = BlockedPairScanner::new(config);
    let summary = scanner.run(&mut source, &mask, genes.as_ref(), sink.as_mut())?;
    report(&summary);
    eprintln!(
        "> Network written to {} in {:.2?}",
        args.out.display(),
        overall_start.elapsed()
    );
    Ok(())
}

fn report(summary: &ScanSummary) {
    eprintln!(
        "> {} genes over {} samples ({} after phenotype selection)",
        summary.gene_count, summary.raw_sample_count, summary.sample_count
    );
    eprintln!(
        "> {} low, {} high, {} balanced, {} without dynamic range, {} excluded",
        summary.low, summary.high, summary.balanced, summary.no_range, summary.excluded
    );
    eprintln!(
        "> {} pairs tested, {} relations",
        summary.pairs_tested, summary.relations
    );
    for value in 1..RelationCode::CATEGORIES as u8 {
        if let Some(code) = RelationCode::from_u8(value) {
            log::info!("  {value} {code:<11} {}", summary.tally(code));
        }
    }
}
