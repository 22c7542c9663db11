use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use batchwise_core::{BatchResult, Tensor};
use batchwise_data::{BatchSource, DiskGenerator};
use batchwise_datasets::make_blobs;
use batchwise_fit::{FitConfig, FitDriver, FitTrace, KMeans, NormalDistribution};
use batchwise_io::{write_npy, DType};

#[derive(Parser, Debug)]
#[command(version, about = "Lazy batch generation and out-of-core model fitting")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write Gaussian blobs to a .npy file
    Generate {
        /// Output .npy path for the features
        #[arg(short, long)]
        output: PathBuf,

        /// Also write per-row weights in [0.5, 1.5) to this .npy path
        #[arg(long)]
        weights: Option<PathBuf>,

        #[arg(long, default_value_t = 10_000)]
        samples: usize,

        #[arg(long, default_value_t = 8)]
        features: usize,

        #[arg(long, default_value_t = 3)]
        centers: usize,

        #[arg(long, default_value_t = 1.0)]
        std: f64,

        #[arg(long)]
        seed: Option<u64>,

        /// Store as 32-bit floats
        #[arg(long)]
        f32: bool,
    },

    /// Fit a reference model over a .npy file, one batch at a time
    Fit {
        /// Input .npy path
        #[arg(short, long)]
        input: PathBuf,

        /// 1-D .npy path with one weight per row
        #[arg(long)]
        weights: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value_t = ModelKind::Normal)]
        model: ModelKind,

        /// Cluster count for kmeans
        #[arg(short = 'k', long, default_value_t = 3)]
        clusters: usize,

        /// JSON fit configuration; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Worker threads (0 = all cores)
        #[arg(short = 'j', long)]
        n_jobs: Option<usize>,

        #[arg(long)]
        stop_threshold: Option<f64>,

        #[arg(long)]
        max_iterations: Option<usize>,

        /// Seed for k-means++ initialization
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Log every iteration at info level
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelKind {
    /// Independent per-feature Gaussian
    Normal,
    /// K-Means clustering
    Kmeans,
}

/// Options of the `generate` command.
struct BlobSpec<'a> {
    output: &'a Path,
    weights: Option<&'a Path>,
    samples: usize,
    features: usize,
    centers: usize,
    std: f64,
    seed: Option<u64>,
    dtype: DType,
}

fn generate(spec: &BlobSpec<'_>) -> BatchResult<()> {
    let (x, _) = make_blobs(spec.samples, spec.features, spec.centers, spec.std, spec.seed)?;
    write_npy(spec.output, &x, spec.dtype)?;
    info!("wrote {} to {}", x.shape(), spec.output.display());

    if let Some(path) = spec.weights {
        let mut rng = match spec.seed {
            Some(s) => StdRng::seed_from_u64(s.wrapping_add(1)),
            None => StdRng::from_entropy(),
        };
        let w: Vec<f64> = (0..spec.samples).map(|_| 0.5 + rng.gen::<f64>()).collect();
        write_npy(path, &Tensor::from_slice(&w), spec.dtype)?;
        info!("wrote {} weights to {}", spec.samples, path.display());
    }
    Ok(())
}

fn run_fit<S: BatchSource<f64>>(
    driver: &FitDriver,
    source: &S,
    model: ModelKind,
    clusters: usize,
    seed: u64,
) -> BatchResult<FitTrace> {
    let n_features = source.shape().row_numel();
    match model {
        ModelKind::Normal => {
            let mut dist = NormalDistribution::new(n_features);
            let trace = driver.fit(&mut dist, source)?;
            info!("means {:?}", dist.means);
            info!("variances {:?}", dist.variances);
            Ok(trace)
        }
        ModelKind::Kmeans => {
            let mut km = KMeans::new(clusters);
            km.initialize(source, &mut StdRng::seed_from_u64(seed))?;
            let trace = driver.fit(&mut km, source)?;
            if let Some(c) = km.centroids() {
                info!("centroids\n{}", c);
            }
            Ok(trace)
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Generate {
            output,
            weights,
            samples,
            features,
            centers,
            std,
            seed,
            f32,
        } => generate(&BlobSpec {
            output: &output,
            weights: weights.as_deref(),
            samples,
            features,
            centers,
            std,
            seed,
            dtype: if f32 { DType::F4 } else { DType::F8 },
        })?,
        Command::Fit {
            input,
            weights,
            model,
            clusters,
            config,
            batch_size,
            n_jobs,
            stop_threshold,
            max_iterations,
            seed,
            verbose,
        } => {
            let mut fit_config = match config {
                Some(path) => FitConfig::from_json_file(path)?,
                None => FitConfig::default(),
            };
            if batch_size.is_some() {
                fit_config.batch_size = batch_size;
            }
            if let Some(n) = n_jobs {
                fit_config.n_jobs = n;
            }
            if let Some(t) = stop_threshold {
                fit_config.stop_threshold = t;
            }
            if let Some(n) = max_iterations {
                fit_config.max_iterations = n;
            }
            fit_config.verbose |= verbose;

            let source = DiskGenerator::<f64>::new(&input, weights.as_ref(), fit_config.batch_size)?;
            let driver = FitDriver::new(fit_config)?;
            let trace = run_fit(&driver, &source, model, clusters, seed)?;
            println!("{}", trace.to_json()?);
        }
    }
    Ok(())
}
