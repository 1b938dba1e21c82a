//! Transactional coordinate perturbation.
//!
//! [`PerturbationScope`] borrows an instance for the duration of one trial.
//! The first time a slot is overwritten the scope keeps the displaced baseline
//! point; every later point displaced from that slot is a perturbed point and
//! is either handed back to the caller ([`PerturbationScope::restore`]) or
//! dropped. When the scope ends, by [`PerturbationScope::rollback`] or by
//! going out of scope on an early return, each baseline point is reinstalled
//! and the perturbed point it evicts is dropped.

use crate::error::Result;
use crate::graph::Rounding;
use crate::instance::{Instance, Point};
use rand::Rng;

/// Counters describing what a scope did with the points it displaced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopeLedger {
    /// Baseline points taken out of the store
    pub baselines_taken: usize,
    /// Baseline points put back into the store
    pub baselines_restored: usize,
    /// Perturbed points dropped by the scope
    pub perturbed_disposed: usize,
    /// Perturbed points handed back to the caller
    pub perturbed_released: usize,
}

/// Scoped write access to an instance's coordinates that always rolls back
pub struct PerturbationScope<'a> {
    instance: &'a mut Instance,
    /// Baseline points of the slots currently diverged from baseline
    saved: Vec<(usize, Box<Point>)>,
    ledger: ScopeLedger,
}

impl<'a> PerturbationScope<'a> {
    pub fn new(instance: &'a mut Instance) -> Self {
        PerturbationScope {
            instance,
            saved: Vec::with_capacity(2),
            ledger: ScopeLedger::default(),
        }
    }

    pub fn instance(&self) -> &Instance {
        &*self.instance
    }

    /// Rebuild the instance graph from the current (perturbed) coordinates
    pub fn rebuild_graph(&mut self, rounding: Rounding) {
        self.instance.build_graph(rounding);
    }

    pub fn ledger(&self) -> ScopeLedger {
        self.ledger
    }

    /// Whether `slot` currently holds something other than its baseline point
    pub fn is_perturbed(&self, slot: usize) -> bool {
        self.saved.iter().any(|(s, _)| *s == slot)
    }

    fn take_displaced(&mut self, slot: usize, displaced: Box<Point>) {
        if self.is_perturbed(slot) {
            self.ledger.perturbed_disposed += 1;
            drop(displaced);
        } else {
            self.ledger.baselines_taken += 1;
            self.saved.push((slot, displaced));
        }
    }

    /// Install `point` at `slot`
    pub fn install(&mut self, slot: usize, point: Box<Point>) -> Result<()> {
        let displaced = self.instance.coords_mut().replace(point, slot)?;
        self.take_displaced(slot, displaced);
        Ok(())
    }

    /// Install a random point with coordinates in `[low, high]` at `slot`
    pub fn perturb_randomly<R: Rng + ?Sized>(
        &mut self,
        slot: usize,
        low: f64,
        high: f64,
        rng: &mut R,
    ) -> Result<()> {
        let displaced = self.instance.coords_mut().replace_randomly(slot, low, high, rng)?;
        self.take_displaced(slot, displaced);
        Ok(())
    }

    /// Reinstall the baseline point at `slot` and release the perturbed point
    /// it displaces to the caller. Returns `None` if the slot is at baseline.
    pub fn restore(&mut self, slot: usize) -> Result<Option<Box<Point>>> {
        let Some(idx) = self.saved.iter().position(|(s, _)| *s == slot) else {
            return Ok(None);
        };
        let (_, baseline) = self.saved.swap_remove(idx);
        let perturbed = self.instance.coords_mut().replace(baseline, slot)?;
        self.ledger.baselines_restored += 1;
        self.ledger.perturbed_released += 1;
        Ok(Some(perturbed))
    }

    fn restore_all(&mut self) {
        while let Some((slot, baseline)) = self.saved.pop() {
            // Saved slots were validated when their baseline was taken.
            match self.instance.coords_mut().replace(baseline, slot) {
                Ok(perturbed) => {
                    self.ledger.baselines_restored += 1;
                    self.ledger.perturbed_disposed += 1;
                    drop(perturbed);
                }
                Err(e) => log::error!("Failed to restore slot {}: {}", slot, e),
            }
        }
    }

    /// Reinstall every baseline point and report what happened in the scope
    pub fn rollback(mut self) -> ScopeLedger {
        self.restore_all();
        log::trace!("Rolled back perturbation scope: {:?}", self.ledger);
        self.ledger
    }
}

impl Drop for PerturbationScope<'_> {
    fn drop(&mut self) {
        if !self.saved.is_empty() {
            log::trace!("Rolling back {} perturbed slot(s) on scope exit", self.saved.len());
            self.restore_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn grid() -> Instance {
        let points = (0..5).map(|i| Point::new(i as f64, (i * i) as f64)).collect();
        Instance::new("grid", "", points).unwrap()
    }

    fn addresses(instance: &Instance) -> Vec<*const Point> {
        instance.coords().iter().map(|p| p as *const Point).collect()
    }

    #[test]
    fn test_rollback_restores_identity() {
        let mut instance = grid();
        let before = addresses(&instance);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let mut scope = PerturbationScope::new(&mut instance);
        scope.perturb_randomly(1, 0.0, 10.0, &mut rng).unwrap();
        scope.perturb_randomly(3, 0.0, 10.0, &mut rng).unwrap();
        assert!(scope.is_perturbed(1));
        assert!(scope.is_perturbed(3));
        assert!(!scope.is_perturbed(0));

        let ledger = scope.rollback();
        assert_eq!(ledger.baselines_taken, 2);
        assert_eq!(ledger.baselines_restored, 2);
        assert_eq!(ledger.perturbed_disposed, 2);
        assert_eq!(addresses(&instance), before);
    }

    #[test]
    fn test_drop_restores_on_early_exit() {
        let mut instance = grid();
        let before = addresses(&instance);
        let mut rng = ChaCha8Rng::seed_from_u64(2);

        let attempt = |instance: &mut Instance, rng: &mut ChaCha8Rng| -> crate::error::Result<()> {
            let mut scope = PerturbationScope::new(instance);
            scope.perturb_randomly(2, 0.0, 10.0, rng)?;
            scope.perturb_randomly(7, 0.0, 10.0, rng)?;
            Ok(())
        };

        assert!(matches!(attempt(&mut instance, &mut rng), Err(Error::SlotOutOfRange { .. })));
        assert_eq!(addresses(&instance), before);
        assert_eq!(instance.coords().get(2), Some(&Point::new(2.0, 4.0)));
    }

    #[test]
    fn test_restore_then_reinstall_perturbed_point() {
        let mut instance = grid();
        let before = addresses(&instance);
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let mut scope = PerturbationScope::new(&mut instance);
        scope.perturb_randomly(0, 50.0, 60.0, &mut rng).unwrap();
        let perturbed_addr: *const Point = scope.instance().coords().get(0).unwrap();

        let new_a = scope.restore(0).unwrap().expect("slot 0 was perturbed");
        assert!(std::ptr::eq(&*new_a, perturbed_addr));
        assert!(std::ptr::eq(scope.instance().coords().get(0).unwrap(), before[0]));
        assert!(!scope.is_perturbed(0));

        scope.install(0, new_a).unwrap();
        assert!(std::ptr::eq(scope.instance().coords().get(0).unwrap(), perturbed_addr));

        let ledger = scope.rollback();
        assert_eq!(ledger.baselines_taken, 2);
        assert_eq!(ledger.baselines_restored, 2);
        assert_eq!(ledger.perturbed_released, 1);
        assert_eq!(ledger.perturbed_disposed, 1);
        assert_eq!(addresses(&instance), before);
    }

    #[test]
    fn test_repeated_perturbation_disposes_intermediate_points() {
        let mut instance = grid();
        let before = addresses(&instance);
        let mut rng = ChaCha8Rng::seed_from_u64(4);

        let mut scope = PerturbationScope::new(&mut instance);
        for _ in 0..3 {
            scope.perturb_randomly(4, 0.0, 1.0, &mut rng).unwrap();
        }
        let ledger = scope.rollback();

        assert_eq!(ledger.baselines_taken, 1);
        assert_eq!(ledger.perturbed_disposed, 3);
        assert_eq!(addresses(&instance), before);
    }

    #[test]
    fn test_restore_unperturbed_slot_is_noop() {
        let mut instance = grid();
        let mut scope = PerturbationScope::new(&mut instance);
        assert!(scope.restore(1).unwrap().is_none());
        assert_eq!(scope.rollback(), ScopeLedger::default());
    }
}
