//! TSP instances and their coordinate tables.
//!
//! An [`Instance`] owns a fixed-size [`CoordinateStore`] of boxed points and
//! the [`Graph`] derived from it. Points are handed out by value when a slot
//! is overwritten, so the caller always owns whatever it displaced.

use crate::error::{Error, Result};
use crate::graph::{Graph, Rounding};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// A node coordinate in the plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    /// Sample a point with each dimension uniform in `[low, high]`
    pub fn random<R: Rng + ?Sized>(low: f64, high: f64, rng: &mut R) -> Self {
        let x = rng.gen_range(low..=high);
        let y = rng.gen_range(low..=high);
        Point { x, y }
    }

    #[inline]
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Indexed table of owned points, one slot per node.
///
/// Every replacement bumps the revision so that graphs built from an older
/// table can be detected.
#[derive(Debug)]
pub struct CoordinateStore {
    slots: Vec<Box<Point>>,
    revision: u64,
}

impl CoordinateStore {
    pub fn new(points: Vec<Point>) -> Self {
        CoordinateStore {
            slots: points.into_iter().map(Box::new).collect(),
            revision: 0,
        }
    }

    pub fn dimension(&self) -> usize {
        self.slots.len()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Point currently installed at `slot`
    pub fn get(&self, slot: usize) -> Option<&Point> {
        self.slots.get(slot).map(|p| &**p)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.slots.iter().map(|p| &**p)
    }

    pub(crate) fn check_slot(&self, slot: usize) -> Result<()> {
        if slot < self.slots.len() {
            Ok(())
        } else {
            Err(Error::SlotOutOfRange { slot, dimension: self.slots.len() })
        }
    }

    /// Install `point` at `slot` and hand back the point it displaced
    pub fn replace(&mut self, point: Box<Point>, slot: usize) -> Result<Box<Point>> {
        self.check_slot(slot)?;
        self.revision += 1;
        Ok(std::mem::replace(&mut self.slots[slot], point))
    }

    /// Install a fresh random point at `slot` and hand back the displaced one
    pub fn replace_randomly<R: Rng + ?Sized>(
        &mut self,
        slot: usize,
        low: f64,
        high: f64,
        rng: &mut R,
    ) -> Result<Box<Point>> {
        self.check_slot(slot)?;
        let point = Box::new(Point::random(low, high, rng));
        self.replace(point, slot)
    }
}

/// Serialized form of an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceDescription {
    pub name: String,
    #[serde(default)]
    pub comment: String,
    pub points: Vec<Point>,
}

/// A TSP instance: coordinates plus the graph derived from them
#[derive(Debug)]
pub struct Instance {
    /// Name of the instance, also its identity for the baseline cache
    pub name: String,
    pub comment: String,
    coords: CoordinateStore,
    graph: Option<Graph>,
}

impl Instance {
    pub fn new(name: impl Into<String>, comment: impl Into<String>, points: Vec<Point>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::config("instance name must not be empty"));
        }
        if points.is_empty() {
            return Err(Error::config(format!("instance '{}' has no points", name)));
        }

        Ok(Instance {
            name,
            comment: comment.into(),
            coords: CoordinateStore::new(points),
            graph: None,
        })
    }

    /// Generate an instance with `dimension` uniform random points in `[low, high]^2`
    pub fn random<R: Rng + ?Sized>(
        name: impl Into<String>,
        dimension: usize,
        low: f64,
        high: f64,
        rng: &mut R,
    ) -> Result<Self> {
        if low > high {
            return Err(Error::config(format!("invalid bounds [{}, {}]", low, high)));
        }
        let points = (0..dimension).map(|_| Point::random(low, high, rng)).collect();
        Instance::new(name, "uniform random instance", points)
    }

    /// Load an instance from its JSON description
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        let description: InstanceDescription = serde_json::from_reader(BufReader::new(file))?;
        Instance::new(description.name, description.comment, description.points)
    }

    pub fn description(&self) -> InstanceDescription {
        InstanceDescription {
            name: self.name.clone(),
            comment: self.comment.clone(),
            points: self.coords.iter().cloned().collect(),
        }
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &self.description())?;
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.coords.dimension()
    }

    pub fn coords(&self) -> &CoordinateStore {
        &self.coords
    }

    pub fn coords_mut(&mut self) -> &mut CoordinateStore {
        &mut self.coords
    }

    /// Rebuild the graph from the current coordinates
    pub fn build_graph(&mut self, rounding: Rounding) {
        self.graph = Some(Graph::build(&self.coords, rounding));
    }

    /// Graph to solve against; fails if coordinates changed since it was built
    pub fn graph(&self) -> Result<&Graph> {
        let graph = self.graph.as_ref().ok_or(Error::MissingGraph)?;
        if graph.revision() != self.coords.revision() {
            return Err(Error::StaleGraph {
                built: graph.revision(),
                current: self.coords.revision(),
            });
        }
        Ok(graph)
    }

    /// Coordinates of the nodes of `path`, in path order
    pub fn path_coordinates(&self, path: &[usize]) -> Vec<(f64, f64)> {
        path.iter()
            .filter_map(|&n| self.coords.get(n))
            .map(|p| (p.x, p.y))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn line(n: usize) -> Instance {
        let points = (0..n).map(|i| Point::new(i as f64, 0.0)).collect();
        Instance::new("line", "", points).unwrap()
    }

    #[test]
    fn test_replace_returns_displaced_point() {
        let mut instance = line(3);
        let original: *const Point = instance.coords().get(1).unwrap();

        let displaced = instance.coords_mut().replace(Box::new(Point::new(9.0, 9.0)), 1).unwrap();
        assert!(std::ptr::eq(&*displaced, original));
        assert_eq!(instance.coords().get(1), Some(&Point::new(9.0, 9.0)));

        let perturbed = instance.coords_mut().replace(displaced, 1).unwrap();
        assert!(std::ptr::eq(instance.coords().get(1).unwrap(), original));
        assert_eq!(*perturbed, Point::new(9.0, 9.0));
    }

    #[test]
    fn test_replace_randomly_within_bounds() {
        let mut instance = line(4);
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        for _ in 0..100 {
            let _ = instance.coords_mut().replace_randomly(2, -1.0, 1.0, &mut rng).unwrap();
            let p = instance.coords().get(2).unwrap();
            assert!((-1.0..=1.0).contains(&p.x));
            assert!((-1.0..=1.0).contains(&p.y));
        }
    }

    #[test]
    fn test_replace_out_of_range() {
        let mut instance = line(2);
        let result = instance.coords_mut().replace(Box::new(Point::new(0.0, 0.0)), 2);
        assert!(matches!(result, Err(Error::SlotOutOfRange { slot: 2, dimension: 2 })));
        assert_eq!(instance.coords().revision(), 0);
    }

    #[test]
    fn test_stale_graph_detected() {
        let mut instance = line(3);
        assert!(matches!(instance.graph(), Err(Error::MissingGraph)));

        instance.build_graph(Rounding::Nearest);
        assert!(instance.graph().is_ok());

        let _ = instance.coords_mut().replace(Box::new(Point::new(5.0, 5.0)), 0).unwrap();
        assert!(matches!(instance.graph(), Err(Error::StaleGraph { built: 0, current: 1 })));

        instance.build_graph(Rounding::Nearest);
        assert_eq!(instance.graph().unwrap().revision(), 1);
    }

    #[test]
    fn test_json_roundtrip_preserves_points() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("line.json");

        let instance = line(5);
        instance.save_json(&path).unwrap();
        let loaded = Instance::from_json_file(&path).unwrap();

        assert_eq!(loaded.name, "line");
        assert_eq!(loaded.dimension(), 5);
        assert_eq!(loaded.coords().get(4), Some(&Point::new(4.0, 0.0)));
    }

    #[test]
    fn test_empty_instance_rejected() {
        assert!(Instance::new("empty", "", Vec::new()).is_err());
    }
}
