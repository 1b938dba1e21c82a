//! TSP Perturbation Library
//!
//! Measures how the optimal tour of a Euclidean TSP instance reacts when one
//! or two node coordinates are moved at random.
//!
//! # Features
//!
//! - Proven-optimal baselines, cached on disk per instance
//! - Two-node perturbation trials (`T`, `T'`, `T''`, `T'''`) with guaranteed
//!   rollback of the coordinate table
//! - Exact solver using Gurobi MIP (behind the `gurobi` feature)
//! - CSV trial tables, JSON run reports and interaction statistics
//!
//! # Example
//!
//! ```no_run
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//! use tsp_perturbation::baseline::BaselineCache;
//! use tsp_perturbation::exact::{GurobiConfig, GurobiSolver};
//! use tsp_perturbation::experiment::{ExperimentConfig, PerturbationExperiment};
//! use tsp_perturbation::instance::Instance;
//! use tsp_perturbation::results::TrialTable;
//!
//! let mut instance = Instance::from_json_file("berlin52.json").unwrap();
//! let solver = GurobiSolver::new(GurobiConfig::default());
//! let mut experiment = PerturbationExperiment::new(
//!     ExperimentConfig::default(),
//!     solver,
//!     BaselineCache::new("solutions"),
//! );
//!
//! let seed = 42;
//! let mut rng = ChaCha8Rng::seed_from_u64(seed);
//! let mut table = TrialTable::create("berlin52.csv", true, 6).unwrap();
//! let report = experiment.run(&mut instance, &mut rng, seed, &mut table).unwrap();
//!
//! println!("{} trials recorded", report.trials_recorded);
//! ```

pub mod baseline;
pub mod error;
pub mod exact;
pub mod experiment;
pub mod graph;
pub mod instance;
pub mod perturbation;
pub mod results;
pub mod solution;
pub mod visualization;

pub use error::{Error, Result};
pub use experiment::{ExperimentConfig, PerturbationExperiment, RunReport};
pub use instance::Instance;
pub use solution::Solution;
