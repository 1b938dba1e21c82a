//! TSP Perturbation - Command Line Interface
//!
//! Runs two-node perturbation experiments on TSP instances and summarizes
//! the resulting trial tables.

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tsp_perturbation::baseline::{cache_in, ensure_distinct_names, file_stem, BaselineCache};
use tsp_perturbation::exact::{GurobiConfig, GurobiSolver};
use tsp_perturbation::experiment::{ExperimentConfig, PairSelection, PerturbationExperiment, RunReport};
use tsp_perturbation::graph::Rounding;
use tsp_perturbation::instance::Instance;
use tsp_perturbation::results::{read_table_file, InteractionSummary, TrialTable};
use tsp_perturbation::visualization::PlotDataWriter;
use tsp_perturbation::Result;

use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "tsp-perturbation")]
#[command(author = "M2 AI2D Student")]
#[command(version = "1.0")]
#[command(about = "Two-node perturbation experiments on optimal TSP tours")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run perturbation trials on one or more instances
    Run {
        /// JSON instance files
        #[arg(required = true)]
        instances: Vec<PathBuf>,

        /// Output directory for trial tables and run reports
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Directory holding cached optimal baselines
        #[arg(long, default_value = "solutions")]
        cache: PathBuf,

        /// Always solve the baseline and never persist it
        #[arg(long)]
        no_cache: bool,

        /// Experiment configuration (JSON); command line options override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Lower bound for perturbed coordinates
        #[arg(long)]
        min_coord: Option<f64>,

        /// Upper bound for perturbed coordinates
        #[arg(long)]
        max_coord: Option<f64>,

        /// First trial (0-based, inclusive)
        #[arg(long)]
        trials_start: Option<usize>,

        /// Last trial (0-based, exclusive)
        #[arg(short, long)]
        trials_end: Option<usize>,

        /// Random seed of the first iteration; drawn from OS entropy if absent
        #[arg(short, long)]
        seed: Option<u64>,

        /// Number of iterations per instance, each with its own seed and table
        #[arg(short, long, default_value = "1")]
        iterations: usize,

        /// Trial (0-based, like --trials-start) whose before/after tours are
        /// written as plot data, labelled itr_<i>_trial_<k+1>
        #[arg(long)]
        image_trial: Option<usize>,

        /// How the perturbed pair is chosen
        #[arg(long, value_enum)]
        pair: Option<PairArg>,

        /// Perturb these two nodes in every trial
        #[arg(long, num_args = 2, value_names = ["A", "B"])]
        nodes: Option<Vec<usize>>,

        /// Omit the seed column from trial tables
        #[arg(long)]
        no_seed_column: bool,

        /// Decimals written for distances
        #[arg(long)]
        precision: Option<usize>,

        /// Edge weight rounding
        #[arg(long, value_enum)]
        rounding: Option<RoundingArg>,

        /// Exact solver time limit per solve (seconds)
        #[arg(long, default_value = "3600")]
        time_limit: f64,

        /// Exact solver threads (0 = automatic)
        #[arg(long, default_value = "0")]
        threads: i32,
    },

    /// Solve and cache the optimal baseline of instances
    Baseline {
        /// JSON instance files
        #[arg(required = true)]
        instances: Vec<PathBuf>,

        /// Directory holding cached optimal baselines
        #[arg(long, default_value = "solutions")]
        cache: PathBuf,

        /// Edge weight rounding
        #[arg(long, value_enum, default_value = "nearest")]
        rounding: RoundingArg,

        /// Exact solver time limit (seconds)
        #[arg(long, default_value = "3600")]
        time_limit: f64,
    },

    /// Summarize trial tables
    Summary {
        /// Trial table CSV files
        #[arg(required = true)]
        tables: Vec<PathBuf>,

        /// Interactions within this tolerance count as additive
        #[arg(long, default_value = "1e-6")]
        tolerance: f64,

        /// Write the summary as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Generate a uniform random instance
    Generate {
        /// Number of nodes
        #[arg(short, long)]
        nodes: usize,

        /// Output JSON file
        #[arg(short, long)]
        output: PathBuf,

        /// Instance name (defaults to the output file stem)
        #[arg(long)]
        name: Option<String>,

        #[arg(long, default_value = "0")]
        min_coord: f64,

        #[arg(long, default_value = "1000")]
        max_coord: f64,

        /// Random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum PairArg {
    /// One random pair per run
    Fixed,
    /// A new random pair every trial
    PerTrial,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum RoundingArg {
    /// Round to the nearest integer
    Nearest,
    /// Round up
    Ceiling,
    /// Keep exact Euclidean distances
    Exact,
}

impl From<RoundingArg> for Rounding {
    fn from(arg: RoundingArg) -> Self {
        match arg {
            RoundingArg::Nearest => Rounding::Nearest,
            RoundingArg::Ceiling => Rounding::Ceiling,
            RoundingArg::Exact => Rounding::Exact,
        }
    }
}

/// Everything a worker needs to run the iterations of one instance
struct RunSettings {
    config: ExperimentConfig,
    output: PathBuf,
    cache: BaselineCache,
    seed: Option<u64>,
    iterations: usize,
    gurobi: GurobiConfig,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Run {
            instances, output, cache, no_cache, config, min_coord, max_coord, trials_start,
            trials_end, seed, iterations, image_trial, pair, nodes, no_seed_column, precision,
            rounding, time_limit, threads,
        } => {
            let settings = build_config(
                config.as_deref(), min_coord, max_coord, trials_start, trials_end, image_trial,
                pair, nodes, no_seed_column, precision, rounding,
            )
            .map(|config| RunSettings {
                config,
                output,
                cache: cache_in((!no_cache).then_some(cache.as_path())),
                seed,
                iterations,
                gurobi: GurobiConfig { time_limit, threads, ..Default::default() },
            });
            settings.and_then(|settings| run_experiments(&instances, &settings))
        }

        Commands::Baseline { instances, cache, rounding, time_limit } => {
            solve_baselines(&instances, &cache, rounding.into(), time_limit)
        }

        Commands::Summary { tables, tolerance, json } => summarize(&tables, tolerance, json.as_deref()),

        Commands::Generate { nodes, output, name, min_coord, max_coord, seed } => {
            generate_instance(nodes, &output, name, min_coord, max_coord, seed)
        }
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[allow(clippy::too_many_arguments)]
fn build_config(
    path: Option<&Path>,
    min_coord: Option<f64>,
    max_coord: Option<f64>,
    trials_start: Option<usize>,
    trials_end: Option<usize>,
    image_trial: Option<usize>,
    pair: Option<PairArg>,
    nodes: Option<Vec<usize>>,
    no_seed_column: bool,
    precision: Option<usize>,
    rounding: Option<RoundingArg>,
) -> Result<ExperimentConfig> {
    let mut config = match path {
        Some(p) => ExperimentConfig::from_json_file(p)?,
        None => ExperimentConfig::default(),
    };

    if let Some(v) = min_coord {
        config.min_coord = v;
    }
    if let Some(v) = max_coord {
        config.max_coord = v;
    }
    if let Some(v) = trials_start {
        config.trials_start = v;
    }
    if let Some(v) = trials_end {
        config.trials_end = v;
    }
    if image_trial.is_some() {
        config.image_trial = image_trial;
    }
    if let Some(v) = precision {
        config.precision = v;
    }
    if let Some(v) = rounding {
        config.rounding = v.into();
    }
    if no_seed_column {
        config.include_seed = false;
    }
    match (nodes.as_deref(), pair) {
        (Some(&[a, b]), _) => config.pair_selection = PairSelection::Nodes(a, b),
        (_, Some(PairArg::Fixed)) => config.pair_selection = PairSelection::RandomFixed,
        (_, Some(PairArg::PerTrial)) => config.pair_selection = PairSelection::PerTrial,
        _ => {}
    }

    Ok(config)
}

fn run_experiments(paths: &[PathBuf], settings: &RunSettings) -> Result<()> {
    let instances = paths
        .iter()
        .map(Instance::from_json_file)
        .collect::<Result<Vec<_>>>()?;
    // Instances sharing a name would share output and cache files
    ensure_distinct_names(&instances)?;

    std::fs::create_dir_all(&settings.output)?;
    println!(
        "Running trials {}..{} on {} instance(s), {} iteration(s) each",
        settings.config.trials_start,
        settings.config.trials_end,
        paths.len(),
        settings.iterations
    );

    let pb = ProgressBar::new((paths.len() * settings.iterations) as u64);
    if let Ok(style) = ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}") {
        pb.set_style(style);
    }

    let start = Instant::now();
    let outcomes: Vec<(String, Result<Vec<RunReport>>)> = instances
        .into_par_iter()
        .map(|instance| (instance.name.clone(), run_instance(instance, settings, &pb)))
        .collect();
    pb.finish_with_message("done");

    let mut failed = 0;
    println!("\n========== Runs ==========");
    println!("{:<24} {:>5} {:>20} {:>12} {:>10} {:>10}", "Instance", "Itr", "Seed", "Baseline", "Recorded", "Discarded");
    println!("{}", "-".repeat(86));
    for (name, outcome) in &outcomes {
        match outcome {
            Ok(reports) => {
                for r in reports {
                    println!(
                        "{:<24} {:>5} {:>20} {:>12.2} {:>10} {:>10}",
                        r.instance, r.iteration, r.seed, r.baseline_distance, r.trials_recorded, r.discarded.len()
                    );
                }
            }
            Err(e) => {
                failed += 1;
                log::error!("Skipping {}: {}", name, e);
                println!("{:<24} failed: {}", name, e);
            }
        }
    }
    println!("\nFinished in {:.2}s, results in {:?}", start.elapsed().as_secs_f64(), settings.output);

    if failed == outcomes.len() && failed > 0 {
        return Err(tsp_perturbation::Error::config("every instance failed"));
    }
    Ok(())
}

fn run_instance(mut instance: Instance, settings: &RunSettings, pb: &ProgressBar) -> Result<Vec<RunReport>> {
    let dir = settings.output.join(file_stem(&instance.name));
    std::fs::create_dir_all(&dir)?;

    let mut reports = Vec::with_capacity(settings.iterations);
    for itr in 0..settings.iterations {
        let seed = match settings.seed {
            Some(s) => s.wrapping_add(itr as u64),
            None => rand::random(),
        };
        pb.set_message(format!("{} itr {}", instance.name, itr));

        let solver = GurobiSolver::new(settings.gurobi.clone());
        let mut experiment = PerturbationExperiment::new(settings.config.clone(), solver, settings.cache.clone())
            .with_iteration(itr)
            .with_visualization(Box::new(PlotDataWriter::new(dir.join("plots"))));

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut table = TrialTable::create(
            dir.join(format!("itr_{}.csv", itr)),
            settings.config.include_seed,
            settings.config.precision,
        )?;
        let report = experiment.run(&mut instance, &mut rng, seed, &mut table)?;
        report.save_json(dir.join(format!("itr_{}.json", itr)))?;

        reports.push(report);
        pb.inc(1);
    }

    Ok(reports)
}

fn solve_baselines(paths: &[PathBuf], cache_dir: &Path, rounding: Rounding, time_limit: f64) -> Result<()> {
    let cache = BaselineCache::new(cache_dir);
    let mut solver = GurobiSolver::new(GurobiConfig { time_limit, ..Default::default() });

    for path in paths {
        let mut instance = Instance::from_json_file(path)?;
        instance.build_graph(rounding);

        let start = Instant::now();
        match cache.acquire(&instance, &mut solver) {
            Ok(baseline) => println!(
                "{:<24} n={:<5} distance={:.2} ({:.2}s)",
                instance.name,
                instance.dimension(),
                baseline.distance,
                start.elapsed().as_secs_f64()
            ),
            Err(e) => {
                log::error!("Unable to find optimal solution for TSP {}: {}", instance.name, e);
                println!("{:<24} n={:<5} failed: {}", instance.name, instance.dimension(), e);
            }
        }
    }

    Ok(())
}

fn summarize(tables: &[PathBuf], tolerance: f64, json: Option<&Path>) -> Result<()> {
    let mut records = Vec::new();
    for path in tables {
        let rows = read_table_file(path)?;
        log::info!("{:?}: {} trials", path, rows.len());
        records.extend(rows);
    }

    let summary = InteractionSummary::from_records(&records, tolerance)?;
    println!("{}", summary.report());

    if let Some(path) = json {
        std::fs::write(path, serde_json::to_string_pretty(&summary)?)?;
        println!("Summary saved to {:?}", path);
    }
    Ok(())
}

fn generate_instance(
    nodes: usize,
    output: &Path,
    name: Option<String>,
    min_coord: f64,
    max_coord: f64,
    seed: u64,
) -> Result<()> {
    let name = name.unwrap_or_else(|| {
        output
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("random{}", nodes))
    });

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let instance = Instance::random(name, nodes, min_coord, max_coord, &mut rng)?;
    instance.save_json(output)?;
    println!("Generated {} (n={}) to {:?}", instance.name, instance.dimension(), output);
    Ok(())
}
