use std::path::PathBuf;
use std::process::exit;
use std::time;

use clap::{Args, Parser, Subcommand};
use log::{error, info};

use mzmerge::merge::{MergeConfig, Result, SpectrumMerger};
use mzmerge::Tolerance;

#[derive(Parser)]
#[command(name = "mzmerge")]
#[command(version, about = "Merge clustered MS/MS spectra into consensus spectra", long_about = None)]
struct Cli {
    #[command(flatten)]
    options: MergeOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct MergeOptions {
    /// The most input files kept open at once. More inputs than this are merged in bins
    #[arg(long, global = true, default_value_t = 60)]
    max_open_files: usize,

    /// The most spectra written to one intermediate bin file
    #[arg(long, global = true, default_value_t = 500_000)]
    max_spectra_per_intermediate: usize,

    /// The most consensus spectra written to one output file
    #[arg(long, global = true, default_value_t = 200_000)]
    max_consensus_per_output: usize,

    /// Pairwise method code used by `all --legacy`: 1, 2, 5, 6, 7, 9, 10 or 11
    #[arg(long, global = true, default_value_t = 10)]
    merge_method: u32,

    /// Combine raw intensities instead of square-root normalized ones
    #[arg(long, global = true)]
    no_normalize: bool,

    /// Write one consensus spectrum per precursor hypothesis
    #[arg(long, global = true)]
    split_precursors: bool,

    /// Largest charge difference between precursor hypotheses treated as the same
    #[arg(long, global = true, default_value_t = 0)]
    charge_tolerance: u32,

    /// Precursor mass tolerance in parts per million
    #[arg(long, global = true, default_value_t = 20.0)]
    precursor_ppm: f64,

    /// Worker threads, defaults to one per core
    #[arg(short, long, global = true)]
    threads: Option<usize>,
}

impl MergeOptions {
    fn config(&self) -> MergeConfig {
        MergeConfig::default()
            .with_max_open_files(self.max_open_files)
            .with_max_spectra_per_intermediate(self.max_spectra_per_intermediate)
            .with_max_consensus_per_output(self.max_consensus_per_output)
            .with_legacy_method(self.merge_method)
            .with_normalize(!self.no_normalize)
            .with_split_precursor_candidates(self.split_precursors)
            .with_charge_error_tolerance(self.charge_tolerance)
            .with_precursor_tolerance(Tolerance::PPM(self.precursor_ppm))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the clusters of a `<file path> <scan number>` listing
    Clusters {
        /// Cluster listing, clusters separated by blank lines
        clusters: PathBuf,
        /// Output file, its extension picks the format
        output: PathBuf,
    },
    /// Merge the clusters of a `<scan> <peptide> <charge> <q-value>` listing of one spectrum file
    Single {
        /// Cluster listing with a header line
        clusters: PathBuf,
        /// The spectrum file the scan numbers refer to
        spectra: PathBuf,
        /// Output file, its extension picks the format
        output: PathBuf,
        /// Echo every cluster's members and scores to this file
        #[arg(long)]
        weights: Option<PathBuf>,
    },
    /// Merge every spectrum of a file into one
    All {
        input: PathBuf,
        output: PathBuf,
        /// Fold spectra pairwise with `--merge-method` instead of binning
        #[arg(long)]
        legacy: bool,
    },
    /// Rename spectra `scan=<N>` and spell out their precursor charge hypotheses
    ExpandCandidates { input: PathBuf, output: PathBuf },
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.options.config();
    match cli.command {
        Commands::Clusters { clusters, output } => {
            let mut merger = SpectrumMerger::new(output, config)?;
            merger.read_cluster_file(&clusters)?;
            merger.merge_spectra()?;
        }
        Commands::Single {
            clusters,
            spectra,
            output,
            weights,
        } => {
            let mut merger = SpectrumMerger::new(output, config)?;
            merger.read_single_file_clusters(&clusters, &spectra, weights.as_deref())?;
            merger.merge_spectra()?;
        }
        Commands::All {
            input,
            output,
            legacy,
        } => {
            let merger = SpectrumMerger::new(output, config)?;
            if legacy {
                merger.merge_all_spectra_legacy(&input)?;
            } else {
                merger.merge_all_spectra(&input)?;
            }
        }
        Commands::ExpandCandidates { input, output } => {
            let merger = SpectrumMerger::new(output, config)?;
            merger.expand_precursor_candidates(&input)?;
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Some(threads) = cli.options.threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
        {
            error!("Failed to configure {threads} worker threads: {e}");
            exit(1);
        }
    }

    let start = time::Instant::now();
    if let Err(e) = run(cli) {
        error!("{e}");
        exit(1);
    }
    let elapsed = time::Instant::now() - start;
    info!("Finished in {:0.2} seconds", elapsed.as_secs_f64());
}
