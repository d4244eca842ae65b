//! Adaptation measures and the scheduler that carries their orders through
//! construction.
//!
//! Each order runs a countdown: planned with `time_remaining = lead_time`,
//! decremented once per year, implemented the moment it reaches zero. At most
//! one order is in flight per target; a strictly larger order preempts a
//! smaller one and inherits partial credit for the planning years already
//! spent. The scheduler owns all in-flight orders of a single run; runs
//! never share scheduler state.

use crate::city::{FloodProtectionAsset, ResidentialArea};
use thiserror::Error;

/// Fraction of the years already spent on a preempted order that is credited
/// to its replacement.
pub const MEASURE_BONUS_FACTOR: f64 = 0.5;

/// An order's countdown was negative before decrementing. This means the
/// preemption/bonus bookkeeping produced an invalid lead time; it must abort
/// the run rather than be clamped.
#[derive(Debug, Clone, Error)]
#[error("countdown of measure '{measure}' reached {time_remaining} in year index {year}")]
pub struct NegativeCountdownError {
    pub measure: String,
    pub time_remaining: i64,
    pub year: usize,
}

/// What an adaptation measure does once built.
#[derive(Debug, Clone, PartialEq)]
pub enum MeasureKind {
    /// Permanently raise a protection asset's level by `heightening` [m].
    FloodProtectionUpgrade { heightening: f64 },
    /// Flood-proof the households of a residential area.
    ResidentialMitigation,
}

/// An adaptation measure a strategy can order.
#[derive(Debug, Clone)]
pub struct Measure {
    pub name: String,
    /// Years from ordering to completion.
    pub lead_time: i64,
    pub kind: MeasureKind,
}

impl Measure {
    pub fn upgrade(name: impl Into<String>, lead_time: i64, heightening: f64) -> Self {
        Measure {
            name: name.into(),
            lead_time,
            kind: MeasureKind::FloodProtectionUpgrade { heightening },
        }
    }

    pub fn mitigation(name: impl Into<String>, lead_time: i64) -> Self {
        Measure {
            name: name.into(),
            lead_time,
            kind: MeasureKind::ResidentialMitigation,
        }
    }

    /// Size of the measure for preemption comparisons; mitigation never
    /// preempts anything.
    fn size(&self) -> f64 {
        match self.kind {
            MeasureKind::FloodProtectionUpgrade { heightening } => heightening,
            MeasureKind::ResidentialMitigation => 0.0,
        }
    }
}

/// What a measure applies to, by index into the city's collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasureTarget {
    Protection(usize),
    Area(usize),
}

/// An order in flight: the (possibly bonus-shortened) measure, its target,
/// and the years left until completion.
#[derive(Debug, Clone)]
pub struct ActiveMeasure {
    pub measure: Measure,
    pub target: MeasureTarget,
    pub time_remaining: i64,
}

impl ActiveMeasure {
    /// Years already spent on this order.
    fn elapsed(&self) -> i64 {
        self.measure.lead_time - self.time_remaining
    }
}

/// Per-run registry of in-flight measures.
#[derive(Debug, Clone)]
pub struct Scheduler {
    active: Vec<ActiveMeasure>,
    bonus_factor: f64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Scheduler::new(MEASURE_BONUS_FACTOR)
    }
}

impl Scheduler {
    pub fn new(bonus_factor: f64) -> Self {
        Scheduler {
            active: Vec::new(),
            bonus_factor,
        }
    }

    /// The order currently in flight for `target`, if any.
    pub fn active_for(&self, target: MeasureTarget) -> Option<&ActiveMeasure> {
        self.active.iter().find(|m| m.target == target)
    }

    pub fn in_flight(&self) -> usize {
        self.active.len()
    }

    /// Place an order unconditionally, recording it in the asset's measure
    /// history. Callers go through [`Scheduler::propose`], which enforces the
    /// one-order-per-target rule.
    fn plan(
        &mut self,
        measure: Measure,
        target: MeasureTarget,
        assets: &mut [FloodProtectionAsset],
        year: usize,
    ) {
        if let (MeasureTarget::Protection(asset), MeasureKind::FloodProtectionUpgrade { heightening }) =
            (target, &measure.kind)
        {
            assets[asset].measure_history[year] = *heightening;
        }
        let time_remaining = measure.lead_time;
        self.active.push(ActiveMeasure {
            measure,
            target,
            time_remaining,
        });
    }

    /// Propose an order for `target`, applying the preemption rule.
    ///
    /// With no order in flight the proposal is planned as-is. A proposal that
    /// is not strictly larger than the in-flight order is discarded. A
    /// strictly larger proposal cancels the in-flight order and starts with
    /// its lead time reduced by `round(elapsed × bonus_factor)` (ties to
    /// even, never below zero credit).
    ///
    /// Returns whether the proposal was planned.
    pub fn propose(
        &mut self,
        measure: Measure,
        target: MeasureTarget,
        assets: &mut [FloodProtectionAsset],
        year: usize,
    ) -> bool {
        let in_flight = match self.active.iter().position(|m| m.target == target) {
            None => {
                self.plan(measure, target, assets, year);
                return true;
            }
            Some(pos) => pos,
        };

        if measure.size() <= self.active[in_flight].measure.size() {
            return false;
        }

        let old = self.active.remove(in_flight);
        let bonus = ((old.elapsed() as f64 * self.bonus_factor).round_ties_even() as i64).max(0);

        let mut replacement = measure;
        replacement.lead_time -= bonus;
        self.plan(replacement, target, assets, year);
        true
    }

    /// Advance all in-flight orders by one year, implementing any whose
    /// countdown reaches zero: upgrades raise their asset's protection level
    /// from `year` to the end of the run, mitigation flood-proofs its area.
    pub fn advance(
        &mut self,
        year: usize,
        assets: &mut [FloodProtectionAsset],
        areas: &mut [ResidentialArea],
    ) -> Result<(), NegativeCountdownError> {
        let mut index = 0;
        while index < self.active.len() {
            let order = &mut self.active[index];
            if order.time_remaining < 0 {
                return Err(NegativeCountdownError {
                    measure: order.measure.name.clone(),
                    time_remaining: order.time_remaining,
                    year,
                });
            }
            if order.time_remaining > 0 {
                order.time_remaining -= 1;
            }
            if order.time_remaining == 0 {
                let order = self.active.remove(index);
                implement(&order, year, assets, areas);
            } else {
                index += 1;
            }
        }
        Ok(())
    }
}

fn implement(
    order: &ActiveMeasure,
    year: usize,
    assets: &mut [FloodProtectionAsset],
    areas: &mut [ResidentialArea],
) {
    match (&order.measure.kind, order.target) {
        (MeasureKind::FloodProtectionUpgrade { heightening }, MeasureTarget::Protection(asset)) => {
            let asset = &mut assets[asset];
            let raised = asset.protection_level[year] + heightening;
            for level in asset.protection_level.iter_mut().skip(year) {
                *level = raised;
            }
        }
        (MeasureKind::ResidentialMitigation, MeasureTarget::Area(area)) => {
            areas[area].enable_flood_proofing(year);
        }
        // Mismatched kind/target pairs cannot be constructed through the
        // strategy helpers; ignore rather than corrupt state.
        _ => {}
    }
}
