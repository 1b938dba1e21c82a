//! Exact solvers module.
//!
//! The experiment only consumes solvers through [`ExactSolver`]: solve the
//! graph, report the tour and whether its optimality was proven.

use crate::error::Result;
use crate::graph::Graph;
use crate::solution::Solution;

/// A solver able to prove tour optimality on a graph
pub trait ExactSolver {
    /// Solve `graph`. A solution with `optimal == false` is returned when the
    /// solver ran out of budget before closing the gap; `Err` is reserved for
    /// backend failures.
    fn solve(&mut self, graph: &Graph) -> Result<Solution>;

    fn name(&self) -> &str {
        "exact"
    }
}

impl<S: ExactSolver + ?Sized> ExactSolver for &mut S {
    fn solve(&mut self, graph: &Graph) -> Result<Solution> {
        (**self).solve(graph)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<S: ExactSolver + ?Sized> ExactSolver for Box<S> {
    fn solve(&mut self, graph: &Graph) -> Result<Solution> {
        (**self).solve(graph)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

// When built with the `gurobi` feature, expose the real implementation
#[cfg(feature = "gurobi")]
mod gurobi;
#[cfg(feature = "gurobi")]
pub use gurobi::*;

// Otherwise provide a lightweight stub so the rest of the codebase can compile
#[cfg(not(feature = "gurobi"))]
mod gurobi_stub {
	use super::ExactSolver;
	use crate::error::{Error, Result};
	use crate::graph::Graph;
	use crate::solution::Solution;

	#[derive(Debug, Clone)]
	pub struct GurobiConfig {
		pub time_limit: f64,
		pub mip_gap: f64,
		pub threads: i32,
		pub verbose: bool,
	}

	impl Default for GurobiConfig {
		fn default() -> Self {
			GurobiConfig { time_limit: 3600.0, mip_gap: 1e-9, threads: 0, verbose: false }
		}
	}

	pub struct GurobiSolver { pub config: GurobiConfig }

	impl GurobiSolver {
		pub fn new(config: GurobiConfig) -> Self { GurobiSolver { config } }
	}

	impl ExactSolver for GurobiSolver {
		fn solve(&mut self, _graph: &Graph) -> Result<Solution> {
			Err(Error::Solver("Gurobi feature not enabled in this build".to_string()))
		}

		fn name(&self) -> &str {
			"gurobi"
		}
	}
}

#[cfg(not(feature = "gurobi"))]
pub use gurobi_stub::*;

/// Solvers that replay canned answers, for exercising the experiment protocol
#[cfg(test)]
pub(crate) mod scripted {
    use super::ExactSolver;
    use crate::error::{Error, Result};
    use crate::graph::Graph;
    use crate::solution::Solution;
    use std::collections::VecDeque;

    /// What the scripted solver does on one call
    #[derive(Debug, Clone)]
    pub enum Step {
        Optimal(f64),
        NotOptimal(f64),
        Fail,
    }

    /// Replays `steps` in order, answering with the identity path.
    /// Once the script runs out every call returns `fallback`.
    pub struct ScriptedSolver {
        steps: VecDeque<Step>,
        fallback: Step,
        /// Graphs seen by each call, in order
        pub graphs: Vec<Graph>,
    }

    impl ScriptedSolver {
        pub fn new(steps: Vec<Step>) -> Self {
            ScriptedSolver {
                steps: steps.into(),
                fallback: Step::Optimal(1.0),
                graphs: Vec::new(),
            }
        }

        pub fn calls(&self) -> usize {
            self.graphs.len()
        }

        pub fn revisions(&self) -> Vec<u64> {
            self.graphs.iter().map(Graph::revision).collect()
        }
    }

    impl ExactSolver for ScriptedSolver {
        fn solve(&mut self, graph: &Graph) -> Result<Solution> {
            let path: Vec<usize> = (0..graph.num_nodes()).collect();
            self.graphs.push(graph.clone());

            let step = self.steps.pop_front().unwrap_or_else(|| self.fallback.clone());
            match step {
                Step::Optimal(d) => Ok(Solution::new(d, path, true)),
                Step::NotOptimal(d) => Ok(Solution::new(d, path, false)),
                Step::Fail => Err(Error::Solver("scripted failure".to_string())),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    /// Answers with the identity path and its true length on the graph
    pub struct IdentityTourSolver;

    impl ExactSolver for IdentityTourSolver {
        fn solve(&mut self, graph: &Graph) -> Result<Solution> {
            let path: Vec<usize> = (0..graph.num_nodes()).collect();
            Ok(Solution::new(graph.tour_length(&path), path, true))
        }
    }
}
