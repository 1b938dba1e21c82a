//! Two-node perturbation experiment.
//!
//! One run proceeds as follows:
//!
//! 1. Build the graph from the unperturbed coordinates and acquire the
//!    proven-optimal baseline tour `T` (cached or solved).
//! 2. For every trial, with a pair of distinct nodes `(A, B)`:
//!    - perturb A, solve `T'`;
//!    - restore A (keeping its perturbed point), perturb B, solve `T''`;
//!    - reinstall the perturbed A, solve `T'''`;
//!    - record `(T, T', T'', T''')` and restore both nodes.
//!
//! A trial whose solves cannot all be proven optimal, or whose solver fails,
//! is dropped with a warning and the run moves on to the next trial. Whatever happens inside a trial, the coordinates go back to the
//! baseline points before the next trial starts.

use crate::baseline::BaselineCache;
use crate::error::{Error, Result};
use crate::exact::ExactSolver;
use crate::graph::Rounding;
use crate::instance::Instance;
use crate::perturbation::PerturbationScope;
use crate::results::{TrialRecord, TrialTable};
use crate::solution::Solution;
use crate::visualization::{ComparisonFrame, PathGeometry, VisualizationHook};
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// How the perturbed node pair is chosen
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PairSelection {
    /// One random pair, drawn once per run
    #[default]
    RandomFixed,
    /// A fresh random pair for every trial
    PerTrial,
    /// The given pair for the whole run
    Nodes(usize, usize),
}

/// Experiment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Rounding of Euclidean distances into edge weights
    pub rounding: Rounding,
    /// Lower bound for perturbed coordinates
    pub min_coord: f64,
    /// Upper bound for perturbed coordinates
    pub max_coord: f64,
    /// First trial (0-based, inclusive)
    pub trials_start: usize,
    /// Last trial (0-based, exclusive)
    pub trials_end: usize,
    pub pair_selection: PairSelection,
    /// 0-based trial handed to the visualization hook; its artifacts are
    /// labelled with the 1-based trial number
    pub image_trial: Option<usize>,
    /// Write the seed column in the trial table
    pub include_seed: bool,
    /// Decimals written for distances
    pub precision: usize,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        ExperimentConfig {
            rounding: Rounding::Nearest,
            min_coord: 0.0,
            max_coord: 1000.0,
            trials_start: 0,
            trials_end: 100,
            pair_selection: PairSelection::RandomFixed,
            image_trial: None,
            include_seed: true,
            precision: 6,
        }
    }
}

impl ExperimentConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Check the configuration against an instance of `dimension` nodes
    pub fn validate(&self, dimension: usize) -> Result<()> {
        if !self.min_coord.is_finite() || !self.max_coord.is_finite() || self.min_coord > self.max_coord {
            return Err(Error::config(format!(
                "invalid perturbation bounds [{}, {}]",
                self.min_coord, self.max_coord
            )));
        }
        if self.trials_start > self.trials_end {
            return Err(Error::config(format!(
                "trial range {}..{} is empty",
                self.trials_start, self.trials_end
            )));
        }
        if dimension < 2 {
            return Err(Error::config("at least two nodes are needed to perturb a pair"));
        }
        if let PairSelection::Nodes(a, b) = self.pair_selection {
            if a == b || a >= dimension || b >= dimension {
                return Err(Error::config(format!(
                    "invalid node pair ({}, {}) for dimension {}",
                    a, b, dimension
                )));
            }
        }
        Ok(())
    }

    pub fn trial_count(&self) -> usize {
        self.trials_end - self.trials_start
    }
}

/// Solve that failed the optimality gate
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Stage {
    /// T': node A perturbed
    PerturbA,
    /// T'': node B perturbed, A at baseline
    PerturbB,
    /// T''': both nodes perturbed
    ReperturbA,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::PerturbA => write!(f, "T'"),
            Stage::PerturbB => write!(f, "T''"),
            Stage::ReperturbA => write!(f, "T'''"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscardedTrial {
    /// 1-based trial index
    pub trial: usize,
    pub stage: Stage,
    pub reason: String,
}

/// Summary of one experiment run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub instance: String,
    pub dimension: usize,
    pub iteration: usize,
    pub seed: u64,
    pub solver: String,
    /// Node pair used for the whole run, if fixed
    pub pair: Option<(usize, usize)>,
    pub baseline_distance: f64,
    pub trials_attempted: usize,
    pub trials_recorded: usize,
    pub discarded: Vec<DiscardedTrial>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

enum TrialOutcome {
    Recorded(TrialRecord),
    Discarded(DiscardedTrial),
}

enum Attempt {
    Optimal(Solution),
    Unattainable(String),
}

/// Draw the fixed pair: shuffle all nodes and take the first two
pub fn draw_fixed_pair<R: Rng + ?Sized>(dimension: usize, rng: &mut R) -> (usize, usize) {
    let mut nodes: Vec<usize> = (0..dimension).collect();
    nodes.shuffle(rng);
    (nodes[0], nodes[1])
}

/// Draw a pair of distinct nodes: A uniform over all nodes, B uniform over
/// the remaining ones
pub fn draw_distinct_pair<R: Rng + ?Sized>(dimension: usize, rng: &mut R) -> (usize, usize) {
    let a = rng.gen_range(0..dimension);
    // Index into the pool with A removed
    let b = rng.gen_range(0..dimension - 1);
    let b = if b >= a { b + 1 } else { b };
    (a, b)
}

/// Controller for perturbation runs on one instance at a time
pub struct PerturbationExperiment<S: ExactSolver> {
    config: ExperimentConfig,
    solver: S,
    cache: BaselineCache,
    hook: Option<Box<dyn VisualizationHook>>,
    iteration: usize,
}

impl<S: ExactSolver> PerturbationExperiment<S> {
    pub fn new(config: ExperimentConfig, solver: S, cache: BaselineCache) -> Self {
        PerturbationExperiment {
            config,
            solver,
            cache,
            hook: None,
            iteration: 0,
        }
    }

    /// Hand the designated image trial to `hook`
    pub fn with_visualization(mut self, hook: Box<dyn VisualizationHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Iteration number used to label the run's artifacts
    pub fn with_iteration(mut self, iteration: usize) -> Self {
        self.iteration = iteration;
        self
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Run the configured trial range on `instance`, appending one row per
    /// valid trial to `table`. `rng` must be seeded from `seed`, which is
    /// recorded alongside every row.
    pub fn run<R: Rng + ?Sized, W: Write>(
        &mut self,
        instance: &mut Instance,
        rng: &mut R,
        seed: u64,
        table: &mut TrialTable<W>,
    ) -> Result<RunReport> {
        let started_at = Utc::now();
        let n = instance.dimension();
        self.config.validate(n)?;

        instance.build_graph(self.config.rounding);
        let baseline = match self.cache.acquire(instance, &mut self.solver) {
            Ok(baseline) => baseline,
            Err(e) => {
                log::error!("Unable to find optimal solution for TSP {}: {}", instance.name, e);
                return Err(e);
            }
        };

        let fixed_pair = match self.config.pair_selection {
            PairSelection::RandomFixed => Some(draw_fixed_pair(n, rng)),
            PairSelection::Nodes(a, b) => Some((a, b)),
            PairSelection::PerTrial => None,
        };
        if let Some((a, b)) = fixed_pair {
            log::info!("{}: perturbing nodes {} and {}", instance.name, a, b);
        }

        let mut report = RunReport {
            instance: instance.name.clone(),
            dimension: n,
            iteration: self.iteration,
            seed,
            solver: self.solver.name().to_string(),
            pair: fixed_pair,
            baseline_distance: baseline.distance,
            trials_attempted: 0,
            trials_recorded: 0,
            discarded: Vec::new(),
            started_at,
            finished_at: started_at,
        };

        for k in self.config.trials_start..self.config.trials_end {
            let pair = match fixed_pair {
                Some(pair) => pair,
                None => draw_distinct_pair(n, rng),
            };
            report.trials_attempted += 1;

            match self.run_trial(instance, rng, k, pair, &baseline, seed)? {
                TrialOutcome::Recorded(record) => {
                    table.append(&record)?;
                    report.trials_recorded += 1;
                }
                TrialOutcome::Discarded(discarded) => {
                    log::warn!(
                        "Unable to find optimal solution in trial {} ({}): {}",
                        discarded.trial, discarded.stage, discarded.reason
                    );
                    report.discarded.push(discarded);
                }
            }
        }

        instance.build_graph(self.config.rounding);
        report.finished_at = Utc::now();
        log::info!(
            "{}: {}/{} trials recorded",
            instance.name, report.trials_recorded, report.trials_attempted
        );
        Ok(report)
    }

    fn run_trial<R: Rng + ?Sized>(
        &mut self,
        instance: &mut Instance,
        rng: &mut R,
        k: usize,
        (a, b): (usize, usize),
        baseline: &Solution,
        seed: u64,
    ) -> Result<TrialOutcome> {
        let trial = k + 1;
        let (low, high) = (self.config.min_coord, self.config.max_coord);
        let discard = |stage: Stage, reason: String| -> Result<TrialOutcome> {
            Ok(TrialOutcome::Discarded(DiscardedTrial { trial, stage, reason }))
        };

        let before = (self.hook.is_some() && self.config.image_trial == Some(k))
            .then(|| PathGeometry::capture(&*instance, baseline, a));

        log::debug!("Trial {}: nodes {} and {}", trial, a, b);
        let mut scope = PerturbationScope::new(instance);

        scope.perturb_randomly(a, low, high, rng)?;
        let t_prime = match self.solve_current(&mut scope)? {
            Attempt::Optimal(solution) => solution,
            Attempt::Unattainable(reason) => return discard(Stage::PerturbA, reason),
        };

        if let Some(before) = before {
            let frame = ComparisonFrame {
                label: format!("itr_{}_trial_{}", self.iteration, trial),
                before,
                after: PathGeometry::capture(scope.instance(), &t_prime, a),
            };
            self.render(&frame);
        }

        let new_a = scope.restore(a)?;

        scope.perturb_randomly(b, low, high, rng)?;
        let t_double_prime = match self.solve_current(&mut scope)? {
            Attempt::Optimal(solution) => solution,
            Attempt::Unattainable(reason) => return discard(Stage::PerturbB, reason),
        };

        if let Some(point) = new_a {
            scope.install(a, point)?;
        }
        let t_triple_prime = match self.solve_current(&mut scope)? {
            Attempt::Optimal(solution) => solution,
            Attempt::Unattainable(reason) => return discard(Stage::ReperturbA, reason),
        };

        let record = TrialRecord {
            trial,
            baseline: baseline.distance,
            a_perturbed: t_prime.distance,
            b_perturbed: t_double_prime.distance,
            ab_perturbed: t_triple_prime.distance,
            seed,
        };

        let ledger = scope.rollback();
        log::trace!("Trial {} rollback: {:?}", trial, ledger);
        Ok(TrialOutcome::Recorded(record))
    }

    /// Rebuild the graph for the scope's current coordinates and solve it
    fn solve_current(&mut self, scope: &mut PerturbationScope<'_>) -> Result<Attempt> {
        scope.rebuild_graph(self.config.rounding);
        let instance = scope.instance();
        let solution = self.solver.solve(instance.graph()?)?;

        if !solution.optimal {
            return Ok(Attempt::Unattainable("optimality not proven".to_string()));
        }
        if let Err(e) = solution.validate(instance.dimension()) {
            return Ok(Attempt::Unattainable(e.to_string()));
        }
        Ok(Attempt::Optimal(solution))
    }

    fn render(&mut self, frame: &ComparisonFrame) {
        if let Some(hook) = self.hook.as_mut() {
            if let Err(e) = hook.render(frame) {
                log::warn!("Visualization of {} failed: {}", frame.label, e);
            }
        }
    }
}
