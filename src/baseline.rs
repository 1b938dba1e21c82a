//! Persistent cache of proven-optimal baseline solutions.
//!
//! One plain-text file per instance, named after the instance: the tour
//! distance on the first line (fixed-point, six decimals) followed by one
//! node index per line. Files are
//! only ever written for solutions the solver proved optimal, so a cached
//! file is trusted without re-solving.

use crate::error::{Error, Result};
use crate::exact::ExactSolver;
use crate::instance::Instance;
use crate::solution::Solution;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Baseline cache rooted at an optional directory.
///
/// A cache without a directory never hits and never persists.
#[derive(Debug, Clone, Default)]
pub struct BaselineCache {
    dir: Option<PathBuf>,
}

/// File-system safe form of an instance name
pub fn file_stem(instance_name: &str) -> String {
    instance_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect()
}

/// Reject instance sets in which two names map to the same file stem
pub fn ensure_distinct_names(instances: &[Instance]) -> Result<()> {
    let mut seen: HashMap<String, &str> = HashMap::with_capacity(instances.len());
    for instance in instances {
        if let Some(previous) = seen.insert(file_stem(&instance.name), &instance.name) {
            return Err(Error::config(format!(
                "instances '{}' and '{}' would share output and cache files",
                previous, instance.name
            )));
        }
    }
    Ok(())
}

/// Parse a persisted record for an instance of `dimension` nodes
pub fn parse_record(text: &str, dimension: usize) -> Result<Solution> {
    let mut tokens = text.split_whitespace();
    let distance: f64 = tokens
        .next()
        .ok_or_else(|| Error::MalformedSolution("empty baseline record".to_string()))?
        .parse()
        .map_err(|_| Error::MalformedSolution("invalid baseline distance".to_string()))?;

    let path = tokens
        .map(|t| t.parse::<usize>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| Error::MalformedSolution("invalid node index in baseline record".to_string()))?;

    let solution = Solution::new(distance, path, true);
    solution.validate(dimension)?;
    Ok(solution)
}

/// Render a solution in the persisted record format
pub fn format_record(solution: &Solution) -> String {
    let mut text = format!("{:.6}\n", solution.distance);
    for node in &solution.path {
        text.push_str(&node.to_string());
        text.push('\n');
    }
    text
}

impl BaselineCache {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        BaselineCache { dir: Some(dir.into()) }
    }

    pub fn disabled() -> Self {
        BaselineCache { dir: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// File holding the baseline for `instance_name`
    pub fn path_for(&self, instance_name: &str) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|d| d.join(format!("{}.sol", file_stem(instance_name))))
    }

    /// Load the cached baseline, if one exists and is readable
    pub fn load(&self, instance: &Instance) -> Option<Solution> {
        let path = self.path_for(&instance.name)?;
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("Cannot read baseline cache {:?}: {}", path, e);
                }
                return None;
            }
        };

        match parse_record(&text, instance.dimension()) {
            Ok(solution) => Some(solution),
            Err(e) => {
                log::warn!("Ignoring baseline cache {:?}: {}", path, e);
                None
            }
        }
    }

    /// Persist a proven-optimal baseline
    pub fn store(&self, instance_name: &str, solution: &Solution) -> Result<()> {
        let Some(path) = self.path_for(instance_name) else {
            return Ok(());
        };
        if !solution.optimal {
            return Err(Error::config("refusing to cache a non-optimal baseline"));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write then rename so a partially written record is never loaded
        let tmp = path.with_extension("sol.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(format_record(solution).as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Baseline for the instance's current graph: from the cache if present,
    /// otherwise solved and, when proven optimal, persisted.
    pub fn acquire<S: ExactSolver + ?Sized>(&self, instance: &Instance, solver: &mut S) -> Result<Solution> {
        if let Some(solution) = self.load(instance) {
            log::info!("Loaded cached baseline for {} (distance {:.2})", instance.name, solution.distance);
            return Ok(solution);
        }

        let graph = instance.graph()?;
        let solution = solver.solve(graph)?;
        if !solution.optimal {
            return Err(Error::BaselineUnattainable { instance: instance.name.clone() });
        }
        solution.validate(instance.dimension())?;
        log::info!("Solved baseline for {} (distance {:.2})", instance.name, solution.distance);

        if let Err(e) = self.store(&instance.name, &solution) {
            log::warn!("Cannot persist baseline for {}: {}", instance.name, e);
        }

        Ok(solution)
    }
}

/// Convenience for callers holding a path rather than a cache
pub fn cache_in(dir: Option<&Path>) -> BaselineCache {
    match dir {
        Some(d) => BaselineCache::new(d),
        None => BaselineCache::disabled(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exact::scripted::{ScriptedSolver, Step};
    use crate::graph::Rounding;
    use crate::instance::Point;

    fn pentagon() -> Instance {
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(13.0, 9.0),
            Point::new(5.0, 15.0),
            Point::new(-3.0, 9.0),
        ];
        let mut instance = Instance::new("penta gon", "", points).unwrap();
        instance.build_graph(Rounding::Nearest);
        instance
    }

    #[test]
    fn test_record_format_roundtrip() {
        let solution = Solution::new(100.25, vec![0, 3, 1, 4, 2], true);
        let text = format_record(&solution);
        assert_eq!(text, "100.250000\n0\n3\n1\n4\n2\n");
        assert_eq!(parse_record(&text, 5).unwrap(), solution);
    }

    #[test]
    fn test_duplicate_instance_names_rejected() {
        let named = |name: &str| Instance::new(name, "", vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)]).unwrap();

        assert!(ensure_distinct_names(&[named("a"), named("b")]).is_ok());
        assert!(matches!(ensure_distinct_names(&[named("a"), named("b"), named("a")]), Err(Error::Config(_))));
        // Distinct names with the same file stem collide too
        assert!(ensure_distinct_names(&[named("berlin 52"), named("berlin_52")]).is_err());
    }

    #[test]
    fn test_integral_distance_written_fixed_point() {
        let solution = Solution::new(7542.0, vec![2, 0, 1], true);
        assert_eq!(format_record(&solution), "7542.000000\n2\n0\n1\n");
    }

    #[test]
    fn test_parse_accepts_fixed_point_and_rejects_short_paths() {
        let parsed = parse_record("100.000000 0 1 2 3 4", 5).unwrap();
        assert_eq!(parsed.distance, 100.0);
        assert!(parsed.optimal);

        assert!(parse_record("100.0\n0\n1\n2\n", 5).is_err());
        assert!(parse_record("abc\n0\n1\n2\n3\n4\n", 5).is_err());
        assert!(parse_record("", 5).is_err());
    }

    #[test]
    fn test_acquire_solves_then_hits_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BaselineCache::new(dir.path());
        let instance = pentagon();
        let mut solver = ScriptedSolver::new(vec![Step::Optimal(100.0)]);

        let first = cache.acquire(&instance, &mut solver).unwrap();
        assert_eq!(solver.calls(), 1);
        assert!(cache.path_for(&instance.name).unwrap().ends_with("penta_gon.sol"));

        let second = cache.acquire(&instance, &mut solver).unwrap();
        assert_eq!(solver.calls(), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn test_acquire_without_cache_is_deterministic() {
        let cache = BaselineCache::disabled();
        let instance = pentagon();
        let mut solver = ScriptedSolver::new(vec![Step::Optimal(42.0), Step::Optimal(42.0)]);

        let first = cache.acquire(&instance, &mut solver).unwrap();
        let second = cache.acquire(&instance, &mut solver).unwrap();
        assert_eq!(first, second);
        assert_eq!(solver.calls(), 2);
    }

    #[test]
    fn test_non_optimal_baseline_is_unattainable_and_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BaselineCache::new(dir.path());
        let instance = pentagon();
        let mut solver = ScriptedSolver::new(vec![Step::NotOptimal(99.0)]);

        let result = cache.acquire(&instance, &mut solver);
        assert!(matches!(result, Err(Error::BaselineUnattainable { .. })));
        assert!(!cache.path_for(&instance.name).unwrap().exists());
    }

    #[test]
    fn test_cached_baseline_trusted_without_solving() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BaselineCache::new(dir.path());
        let instance = pentagon();
        fs::write(cache.path_for(&instance.name).unwrap(), "77.5\n4\n3\n2\n1\n0\n").unwrap();

        let mut solver = ScriptedSolver::new(vec![Step::Fail]);
        let baseline = cache.acquire(&instance, &mut solver).unwrap();
        assert_eq!(baseline.distance, 77.5);
        assert_eq!(baseline.path, vec![4, 3, 2, 1, 0]);
        assert_eq!(solver.calls(), 0);
    }

    #[test]
    fn test_malformed_cache_falls_back_to_solver() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BaselineCache::new(dir.path());
        let instance = pentagon();
        fs::write(cache.path_for(&instance.name).unwrap(), "12.0\n0\n1\n").unwrap();

        let mut solver = ScriptedSolver::new(vec![Step::Optimal(50.0)]);
        let baseline = cache.acquire(&instance, &mut solver).unwrap();
        assert_eq!(baseline.distance, 50.0);
        assert_eq!(solver.calls(), 1);
    }

    #[test]
    fn test_unwritable_cache_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let cache = BaselineCache::new(blocker.join("cache"));
        let instance = pentagon();

        let mut solver = ScriptedSolver::new(vec![Step::Optimal(60.0)]);
        let baseline = cache.acquire(&instance, &mut solver).unwrap();
        assert_eq!(baseline.distance, 60.0);
    }
}
