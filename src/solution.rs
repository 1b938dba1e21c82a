//! Solutions produced by an exact solver.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An optimal-tour candidate for one graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    /// Tour length
    pub distance: f64,
    /// Visiting order, a permutation of all node indices
    pub path: Vec<usize>,
    /// Whether the solver proved that no shorter tour exists
    pub optimal: bool,
}

impl Solution {
    pub fn new(distance: f64, path: Vec<usize>, optimal: bool) -> Self {
        Solution { distance, path, optimal }
    }

    /// Check that the path visits each of `0..dimension` exactly once
    pub fn validate(&self, dimension: usize) -> Result<()> {
        if self.path.len() != dimension {
            return Err(Error::MalformedSolution(format!(
                "path has {} nodes, expected {}",
                self.path.len(),
                dimension
            )));
        }

        let mut seen = vec![false; dimension];
        for &node in &self.path {
            if node >= dimension || seen[node] {
                return Err(Error::MalformedSolution(format!(
                    "node {} is out of range or repeated",
                    node
                )));
            }
            seen[node] = true;
        }

        if !self.distance.is_finite() {
            return Err(Error::MalformedSolution("non-finite distance".to_string()));
        }

        Ok(())
    }

    /// Position of `node` in the path
    pub fn position(&self, node: usize) -> Option<usize> {
        self.path.iter().position(|&n| n == node)
    }
}

impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Solution")?;
        writeln!(f, "  Distance: {:.2}", self.distance)?;
        writeln!(f, "  Optimal: {}", self.optimal)?;
        writeln!(f, "  Path: {:?}", self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_permutation() {
        assert!(Solution::new(10.0, vec![2, 0, 1], true).validate(3).is_ok());
        assert!(Solution::new(10.0, vec![0, 1], true).validate(3).is_err());
        assert!(Solution::new(10.0, vec![0, 1, 1], true).validate(3).is_err());
        assert!(Solution::new(10.0, vec![0, 1, 3], true).validate(3).is_err());
        assert!(Solution::new(f64::NAN, vec![0, 1, 2], true).validate(3).is_err());
    }

    #[test]
    fn test_position() {
        let sol = Solution::new(1.0, vec![3, 1, 0, 2], true);
        assert_eq!(sol.position(0), Some(2));
        assert_eq!(sol.position(5), None);
    }
}
