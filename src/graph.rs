//! Weighted complete graph derived from an instance's coordinate table.
//!
//! Edge weights are Euclidean distances passed through a rounding policy,
//! mirroring the TSPLIB conventions (`EUC_2D` rounds to the nearest integer,
//! `CEIL_2D` rounds up).

use crate::instance::CoordinateStore;
use serde::{Deserialize, Serialize};

/// Rounding applied to Euclidean distances when deriving edge weights
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rounding {
    /// Round to the nearest integer (TSPLIB `nint`)
    #[default]
    Nearest,
    /// Round up to the next integer
    Ceiling,
    /// Keep the raw floating-point distance
    Exact,
}

impl Rounding {
    #[inline]
    pub fn apply(self, distance: f64) -> f64 {
        match self {
            Rounding::Nearest => (distance + 0.5).floor(),
            Rounding::Ceiling => distance.ceil(),
            Rounding::Exact => distance,
        }
    }
}

/// Symmetric weighted complete graph over the instance nodes
#[derive(Debug, Clone)]
pub struct Graph {
    dimension: usize,
    /// Row-major weight matrix
    weights: Vec<f64>,
    /// Coordinate revision this graph was built from
    revision: u64,
    rounding: Rounding,
}

impl Graph {
    /// Build the graph from the current contents of the coordinate store
    pub fn build(coords: &CoordinateStore, rounding: Rounding) -> Self {
        let n = coords.dimension();
        let points: Vec<_> = coords.iter().collect();
        let mut weights = vec![0.0; n * n];

        for i in 0..n {
            for j in (i + 1)..n {
                let w = rounding.apply(points[i].distance(points[j]));
                weights[i * n + j] = w;
                weights[j * n + i] = w;
            }
        }

        Graph {
            dimension: n,
            weights,
            revision: coords.revision(),
            rounding,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.dimension
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn rounding(&self) -> Rounding {
        self.rounding
    }

    /// Weight of edge (i, j)
    #[inline]
    pub fn weight(&self, i: usize, j: usize) -> f64 {
        self.weights[i * self.dimension + j]
    }

    /// Length of the closed tour visiting `path` in order
    pub fn tour_length(&self, path: &[usize]) -> f64 {
        if path.len() < 2 {
            return 0.0;
        }

        let mut length: f64 = path.windows(2).map(|w| self.weight(w[0], w[1])).sum();
        length += self.weight(path[path.len() - 1], path[0]);
        length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::Point;

    fn square() -> CoordinateStore {
        CoordinateStore::new(vec![
            Point::new(0.0, 0.0),
            Point::new(3.0, 0.0),
            Point::new(3.0, 4.0),
            Point::new(0.0, 4.0),
        ])
    }

    #[test]
    fn test_rounding_policies() {
        assert_eq!(Rounding::Nearest.apply(2.5), 3.0);
        assert_eq!(Rounding::Nearest.apply(2.49), 2.0);
        assert_eq!(Rounding::Ceiling.apply(2.01), 3.0);
        assert_eq!(Rounding::Exact.apply(2.01), 2.01);
    }

    #[test]
    fn test_graph_weights_symmetric() {
        let graph = Graph::build(&square(), Rounding::Nearest);

        assert_eq!(graph.num_nodes(), 4);
        assert_eq!(graph.weight(0, 2), 5.0);
        assert_eq!(graph.weight(2, 0), 5.0);
        assert_eq!(graph.weight(1, 1), 0.0);
    }

    #[test]
    fn test_tour_length_closes_cycle() {
        let graph = Graph::build(&square(), Rounding::Exact);
        assert!((graph.tour_length(&[0, 1, 2, 3]) - 14.0).abs() < 1e-10);
        assert!((graph.tour_length(&[0, 2, 1, 3]) - 18.0).abs() < 1e-10);
    }
}
