//! Visualization hook for a designated trial.
//!
//! The experiment never draws anything. It hands a [`ComparisonFrame`] (the
//! baseline tour and the tour after perturbing node A, with coordinates) to a
//! [`VisualizationHook`]. [`PlotDataWriter`] dumps frames as plain-text data
//! files for external plotting tools.

use crate::error::Result;
use crate::instance::Instance;
use crate::solution::Solution;
use std::fs;
use std::path::PathBuf;

/// One tour laid out in the plane
#[derive(Debug, Clone, PartialEq)]
pub struct PathGeometry {
    /// Node coordinates in visiting order
    pub coordinates: Vec<(f64, f64)>,
    /// Visiting order
    pub path: Vec<usize>,
    /// Perturbed node
    pub node: usize,
    /// Position of `node` in `path`
    pub position: Option<usize>,
    /// Tour length
    pub distance: f64,
}

impl PathGeometry {
    /// Capture the tour of `solution` over the instance's current coordinates
    pub fn capture(instance: &Instance, solution: &Solution, node: usize) -> Self {
        PathGeometry {
            coordinates: instance.path_coordinates(&solution.path),
            path: solution.path.clone(),
            node,
            position: solution.position(node),
            distance: solution.distance,
        }
    }
}

/// Before/after pair handed to a visualization hook
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonFrame {
    /// Artifact name, e.g. `itr_0_trial_3`
    pub label: String,
    pub before: PathGeometry,
    pub after: PathGeometry,
}

/// Consumer of comparison frames
pub trait VisualizationHook {
    fn render(&mut self, frame: &ComparisonFrame) -> Result<()>;
}

/// Writes each frame to `<dir>/<label>.dat`
pub struct PlotDataWriter {
    dir: PathBuf,
}

impl PlotDataWriter {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        PlotDataWriter { dir: dir.into() }
    }

    /// Render a frame in the plot data format
    pub fn format_frame(frame: &ComparisonFrame) -> String {
        let mut data = String::new();

        data.push_str("# Perturbation comparison\n");
        data.push_str(&format!("# Frame: {}\n", frame.label));

        for (name, geometry) in [("before", &frame.before), ("after", &frame.after)] {
            data.push_str(&format!("\n# Tour: {}\n", name));
            data.push_str(&format!("# Distance: {:.2}\n", geometry.distance));
            let position = geometry
                .position
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string());
            data.push_str(&format!("# Perturbed node: {} (position {})\n", geometry.node, position));
            data.push_str("# position, node, x, y\n");
            for (i, (&node, &(x, y))) in geometry.path.iter().zip(&geometry.coordinates).enumerate() {
                data.push_str(&format!("{},{},{},{}\n", i, node, x, y));
            }
        }

        data
    }
}

impl VisualizationHook for PlotDataWriter {
    fn render(&mut self, frame: &ComparisonFrame) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}.dat", frame.label));
        fs::write(&path, Self::format_frame(frame))?;
        log::info!("Plot data written to {:?}", path);
        Ok(())
    }
}
