//! Exact TSP solver using Gurobi.
//!
//! The formulation uses:
//! - Binary variables x[i][j] for directed edges
//! - Continuous variables u[i] for MTZ subtour elimination
//!
//! Node 0 is the fixed start of the tour.

use super::ExactSolver;
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::solution::Solution;
use grb::prelude::*;

/// Gurobi solver configuration
#[derive(Debug, Clone)]
pub struct GurobiConfig {
    /// Time limit in seconds
    pub time_limit: f64,
    /// MIP gap tolerance
    pub mip_gap: f64,
    /// Number of threads (0 = automatic)
    pub threads: i32,
    /// Enable verbose output
    pub verbose: bool,
}

impl Default for GurobiConfig {
    fn default() -> Self {
        GurobiConfig {
            time_limit: 3600.0,
            mip_gap: 1e-9,
            threads: 0,
            verbose: false,
        }
    }
}

/// Gurobi-based exact solver
pub struct GurobiSolver {
    pub config: GurobiConfig,
}

fn grb_err(context: &str) -> impl Fn(grb::Error) -> Error + '_ {
    move |e| Error::Solver(format!("{}: {}", context, e))
}

impl GurobiSolver {
    pub fn new(config: GurobiConfig) -> Self {
        GurobiSolver { config }
    }

    fn solve_mtz(&self, graph: &Graph) -> Result<Solution> {
        let n = graph.num_nodes();
        if n < 3 {
            let path: Vec<usize> = (0..n).collect();
            return Ok(Solution::new(graph.tour_length(&path), path, true));
        }

        let env = Env::new("").map_err(grb_err("Failed to create Gurobi environment"))?;
        let mut model = Model::with_env("TSP", env).map_err(grb_err("Failed to create model"))?;

        model.set_param(param::TimeLimit, self.config.time_limit)
            .map_err(grb_err("Failed to set time limit"))?;
        model.set_param(param::MIPGap, self.config.mip_gap)
            .map_err(grb_err("Failed to set MIP gap"))?;
        model.set_param(param::Threads, self.config.threads)
            .map_err(grb_err("Failed to set threads"))?;
        if !self.config.verbose {
            model.set_param(param::OutputFlag, 0)
                .map_err(grb_err("Failed to set output flag"))?;
        }

        // x[i][j] = 1 if the tour goes from i to j
        let mut x: Vec<Vec<Var>> = Vec::with_capacity(n);
        for i in 0..n {
            let mut row = Vec::with_capacity(n);
            for j in 0..n {
                let var = add_binvar!(model,
                    name: &format!("x_{}_{}", i, j),
                    obj: graph.weight(i, j)
                ).map_err(grb_err("Failed to add edge variable"))?;
                row.push(var);
            }
            x.push(row);
        }

        // u[i] = position of node i in the tour
        let mut u: Vec<Var> = Vec::with_capacity(n);
        for i in 0..n {
            let var = add_ctsvar!(model,
                name: &format!("u_{}", i),
                bounds: 0.0..(n - 1) as f64
            ).map_err(grb_err("Failed to add position variable"))?;
            u.push(var);
        }

        model.update().map_err(grb_err("Failed to update model"))?;

        for j in 0..n {
            let expr_in: Expr = (0..n).filter(|&i| i != j).map(|i| x[i][j]).grb_sum();
            model.add_constr(&format!("in_{}", j), c!(expr_in == 1.0))
                .map_err(grb_err("Failed to add in-degree constraint"))?;

            let expr_out: Expr = (0..n).filter(|&k| k != j).map(|k| x[j][k]).grb_sum();
            model.add_constr(&format!("out_{}", j), c!(expr_out == 1.0))
                .map_err(grb_err("Failed to add out-degree constraint"))?;
        }

        // No self-loops
        for i in 0..n {
            model.add_constr(&format!("no_loop_{}", i), c!(x[i][i] == 0.0))
                .map_err(grb_err("Failed to add no-loop constraint"))?;
        }

        // MTZ subtour elimination
        for i in 1..n {
            for j in 1..n {
                if i != j {
                    model.add_constr(
                        &format!("mtz_{}_{}", i, j),
                        c!(u[j] >= u[i] + 1.0 - (n as f64) * (1.0 - x[i][j])),
                    ).map_err(grb_err("Failed to add MTZ constraint"))?;
                }
            }
        }
        model.add_constr("start_position", c!(u[0] == 0.0))
            .map_err(grb_err("Failed to add start position constraint"))?;

        model.update().map_err(grb_err("Failed to update model before optimization"))?;
        model.optimize().map_err(grb_err("Optimization failed"))?;

        let status = model.status().map_err(grb_err("Failed to get status"))?;
        log::debug!("Gurobi finished with status {:?}", status);

        let has_incumbent = matches!(status, Status::Optimal | Status::TimeLimit | Status::SolutionLimit)
            && model.get_attr(attr::SolCount).unwrap_or(0) > 0;
        if !has_incumbent {
            return Ok(Solution::new(f64::INFINITY, Vec::new(), false));
        }

        // Follow the selected edges from node 0
        let mut path = Vec::with_capacity(n);
        let mut visited = vec![false; n];
        let mut current = 0;
        path.push(0);
        visited[0] = true;
        for _ in 1..n {
            let mut next = None;
            for j in 0..n {
                if !visited[j] {
                    let val = model.get_obj_attr(attr::X, &x[current][j]).unwrap_or(0.0);
                    if val > 0.5 {
                        next = Some(j);
                        break;
                    }
                }
            }
            match next {
                Some(j) => {
                    path.push(j);
                    visited[j] = true;
                    current = j;
                }
                None => break,
            }
        }

        let distance = graph.tour_length(&path);
        Ok(Solution::new(distance, path, status == Status::Optimal))
    }
}

impl ExactSolver for GurobiSolver {
    fn solve(&mut self, graph: &Graph) -> Result<Solution> {
        self.solve_mtz(graph)
    }

    fn name(&self) -> &str {
        "gurobi"
    }
}
