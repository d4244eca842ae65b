//! Management strategies ("mayors"): pluggable policies that read the city
//! state each year and decide whether to order protection upgrades or
//! household mitigation.
//!
//! Every strategy is polymorphic over the single [`Mayor::apply_strategy`]
//! capability. Orders go through the scheduler, which enforces the
//! one-order-per-target and preemption rules; the strategies themselves are
//! thresholds over the model state.

use crate::city::City;
use crate::measures::{Measure, MeasureTarget, Scheduler};
use crate::scenario::SurgeLevel;

/// The small and large protection upgrades available to the strategies of
/// one experiment.
#[derive(Debug, Clone)]
pub struct MeasureSet {
    pub small: Measure,
    pub large: Measure,
}

impl MeasureSet {
    /// The standard pair: a 0.5 m and a 1.0 m dike heightening with the
    /// given (small, large) implementation times in years.
    pub fn standard(implementation_times: (i64, i64)) -> Self {
        MeasureSet {
            small: Measure::upgrade("minor dike heightening", implementation_times.0, 0.5),
            large: Measure::upgrade("major dike heightening", implementation_times.1, 1.0),
        }
    }
}

/// A flood-protection management strategy.
pub trait Mayor: Send + Sync {
    /// Short identifier used in experiment names and output paths.
    fn name(&self) -> &str;

    /// Label used in reports.
    fn paper_name(&self) -> &str {
        self.name()
    }

    /// Read the model state of year index `i` (calendar year `year`) and
    /// possibly place orders via the scheduler.
    fn apply_strategy(
        &self,
        city: &mut City,
        surge: &SurgeLevel,
        measures: &MeasureSet,
        scheduler: &mut Scheduler,
        i: usize,
        year: i32,
    );
}

/// Asset protecting the strategy's watched area.
fn protecting_asset(city: &City, area: usize) -> usize {
    city.areas[area].params.protected_by
}

/// Orders upgrades only after something happened: a near-miss alarm triggers
/// the small heightening, a flood alarm the large one.
#[derive(Debug, Clone)]
pub struct Reactive {
    /// Area whose alarms are acted on.
    pub area: usize,
    /// Event impact that marks a near miss in the alarm table.
    pub near_miss_impact: f64,
}

impl Default for Reactive {
    fn default() -> Self {
        Reactive {
            area: 1,
            near_miss_impact: 10.0,
        }
    }
}

impl Mayor for Reactive {
    fn name(&self) -> &str {
        "reactive"
    }

    fn paper_name(&self) -> &str {
        "Reactive"
    }

    fn apply_strategy(
        &self,
        city: &mut City,
        _surge: &SurgeLevel,
        measures: &MeasureSet,
        scheduler: &mut Scheduler,
        i: usize,
        _year: i32,
    ) {
        let impact = city.areas[self.area].event_impact[i];
        let target = MeasureTarget::Protection(protecting_asset(city, self.area));

        // NaN (trust not evaluated, e.g. t = 0) matches neither branch.
        if impact == self.near_miss_impact {
            scheduler.propose(measures.small.clone(), target, &mut city.assets, i);
        } else if impact > self.near_miss_impact {
            scheduler.propose(measures.large.clone(), target, &mut city.assets, i);
        }
    }
}

/// Follows the legal protection standard: upgrades whenever the return
/// period implied by the protection level underceeds a threshold.
#[derive(Debug, Clone)]
pub struct ProtectionStandard {
    pub area: usize,
    /// Underceedance threshold [years] for the small upgrade.
    pub threshold_small: f64,
    /// Underceedance threshold [years] for the large upgrade.
    pub threshold_large: f64,
}

impl Default for ProtectionStandard {
    fn default() -> Self {
        ProtectionStandard {
            area: 1,
            threshold_small: 10_000.0,
            threshold_large: 2_000.0,
        }
    }
}

impl Mayor for ProtectionStandard {
    fn name(&self) -> &str {
        "protection-standard"
    }

    fn paper_name(&self) -> &str {
        "Proactive"
    }

    fn apply_strategy(
        &self,
        city: &mut City,
        _surge: &SurgeLevel,
        measures: &MeasureSet,
        scheduler: &mut Scheduler,
        i: usize,
        _year: i32,
    ) {
        let return_period = city.areas[self.area].protection_return_period[i];
        let target = MeasureTarget::Protection(protecting_asset(city, self.area));

        if self.threshold_large < return_period && return_period <= self.threshold_small {
            scheduler.propose(measures.small.clone(), target, &mut city.assets, i);
        }
        if return_period <= self.threshold_large {
            scheduler.propose(measures.large.clone(), target, &mut city.assets, i);
        }
    }
}

/// Household flood-proofing side policy of the cost-benefit strategy.
#[derive(Debug, Clone)]
pub struct FloodProofingPolicy {
    /// Area to flood-proof.
    pub area: usize,
    /// Objective area risk [M currency/year] above which proofing is ordered.
    pub risk_threshold: f64,
}

impl Default for FloodProofingPolicy {
    fn default() -> Self {
        FloodProofingPolicy {
            area: 0,
            risk_threshold: 0.5,
        }
    }
}

/// Orders upgrades when the objective flood risk of the watched area exceeds
/// cost-benefit thresholds; optionally flood-proofs a second area.
#[derive(Debug, Clone)]
pub struct CostBenefit {
    pub area: usize,
    /// Risk [M currency/year] from which the small upgrade pays off.
    pub threshold_small: f64,
    /// Risk [M currency/year] from which the large upgrade pays off.
    pub threshold_large: f64,
    pub flood_proofing: Option<FloodProofingPolicy>,
}

impl Default for CostBenefit {
    fn default() -> Self {
        CostBenefit {
            area: 1,
            threshold_small: 5.0,
            threshold_large: 10.0,
            flood_proofing: None,
        }
    }
}

impl CostBenefit {
    /// The variant that also flood-proofs the outer-dike area once its risk
    /// exceeds the proofing threshold.
    pub fn with_flood_proofing() -> Self {
        CostBenefit {
            flood_proofing: Some(FloodProofingPolicy::default()),
            ..CostBenefit::default()
        }
    }
}

impl Mayor for CostBenefit {
    fn name(&self) -> &str {
        if self.flood_proofing.is_some() {
            "cost-benefit-proofing"
        } else {
            "cost-benefit"
        }
    }

    fn paper_name(&self) -> &str {
        "Economic"
    }

    fn apply_strategy(
        &self,
        city: &mut City,
        _surge: &SurgeLevel,
        measures: &MeasureSet,
        scheduler: &mut Scheduler,
        i: usize,
        _year: i32,
    ) {
        if let Some(proofing) = &self.flood_proofing {
            let at_risk = city.areas[proofing.area].risk[i] > proofing.risk_threshold;
            if at_risk && !city.areas[proofing.area].flood_proofing[i] {
                scheduler.propose(
                    Measure::mitigation("household flood proofing", 0),
                    MeasureTarget::Area(proofing.area),
                    &mut city.assets,
                    i,
                );
            }
        }

        let risk = city.areas[self.area].risk[i];
        let target = MeasureTarget::Protection(protecting_asset(city, self.area));

        if self.threshold_small <= risk && risk < self.threshold_large {
            scheduler.propose(measures.small.clone(), target, &mut city.assets, i);
        } else if risk >= self.threshold_large {
            scheduler.propose(measures.large.clone(), target, &mut city.assets, i);
        }
    }
}

/// As [`CostBenefit`], but acting on the *perceived* risk of the watched
/// area: upgrades track public sentiment rather than objective risk.
#[derive(Debug, Clone)]
pub struct Sentiment {
    pub area: usize,
    pub threshold_small: f64,
    pub threshold_large: f64,
}

impl Default for Sentiment {
    fn default() -> Self {
        Sentiment {
            area: 1,
            threshold_small: 5.0,
            threshold_large: 10.0,
        }
    }
}

impl Mayor for Sentiment {
    fn name(&self) -> &str {
        "sentiment"
    }

    fn paper_name(&self) -> &str {
        "Sentiment"
    }

    fn apply_strategy(
        &self,
        city: &mut City,
        _surge: &SurgeLevel,
        measures: &MeasureSet,
        scheduler: &mut Scheduler,
        i: usize,
        _year: i32,
    ) {
        let perceived = city.areas[self.area].risk_perceived[i];
        let target = MeasureTarget::Protection(protecting_asset(city, self.area));

        if self.threshold_small <= perceived && perceived < self.threshold_large {
            scheduler.propose(measures.small.clone(), target, &mut city.assets, i);
        } else if perceived >= self.threshold_large {
            scheduler.propose(measures.large.clone(), target, &mut city.assets, i);
        }
    }
}

/// All bundled strategies with their reference thresholds.
pub fn all_mayors() -> Vec<Box<dyn Mayor>> {
    vec![
        Box::new(Reactive::default()),
        Box::new(ProtectionStandard::default()),
        Box::new(CostBenefit::default()),
        Box::new(CostBenefit::with_flood_proofing()),
        Box::new(Sentiment::default()),
    ]
}

/// Look a bundled strategy up by its short identifier.
pub fn mayor_by_name(name: &str) -> Option<Box<dyn Mayor>> {
    all_mayors().into_iter().find(|m| m.name() == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::delta_city;

    fn setup() -> (City, SurgeLevel, MeasureSet, Scheduler) {
        let mut city = delta_city();
        city.init_time(20);
        let surge = SurgeLevel {
            name: "test".to_string(),
            slr_name: "slr".to_string(),
            surge_name: "surge".to_string(),
            years: (2020..2040).collect(),
            level: vec![3.0; 20],
            sealevel: vec![0.0; 20],
        };
        (city, surge, MeasureSet::standard((7, 10)), Scheduler::default())
    }

    #[test]
    fn test_protection_standard_orders_small_between_thresholds() {
        let (mut city, surge, measures, mut scheduler) = setup();
        city.areas[1].protection_return_period[0] = 5_000.0;

        ProtectionStandard::default().apply_strategy(&mut city, &surge, &measures, &mut scheduler, 0, 2020);

        let asset = city.areas[1].params.protected_by;
        let active = scheduler.active_for(MeasureTarget::Protection(asset)).unwrap();
        assert_eq!(active.measure.name, "minor dike heightening");
    }

    #[test]
    fn test_protection_standard_orders_large_below_lower_threshold() {
        let (mut city, surge, measures, mut scheduler) = setup();
        city.areas[1].protection_return_period[0] = 800.0;

        ProtectionStandard::default().apply_strategy(&mut city, &surge, &measures, &mut scheduler, 0, 2020);

        let asset = city.areas[1].params.protected_by;
        let active = scheduler.active_for(MeasureTarget::Protection(asset)).unwrap();
        assert_eq!(active.measure.name, "major dike heightening");
    }

    #[test]
    fn test_protection_standard_ignores_unset_return_period() {
        let (mut city, surge, measures, mut scheduler) = setup();
        // protection_return_period[0] is NaN: no order either way.
        ProtectionStandard::default().apply_strategy(&mut city, &surge, &measures, &mut scheduler, 0, 2020);
        assert_eq!(scheduler.in_flight(), 0);
    }

    #[test]
    fn test_cost_benefit_escalates_with_risk() {
        let (mut city, surge, measures, mut scheduler) = setup();
        let mayor = CostBenefit::default();
        let asset = city.areas[1].params.protected_by;

        city.areas[1].risk[0] = 3.0;
        mayor.apply_strategy(&mut city, &surge, &measures, &mut scheduler, 0, 2020);
        assert_eq!(scheduler.in_flight(), 0);

        city.areas[1].risk[1] = 7.0;
        mayor.apply_strategy(&mut city, &surge, &measures, &mut scheduler, 1, 2021);
        assert_eq!(
            scheduler
                .active_for(MeasureTarget::Protection(asset))
                .unwrap()
                .measure
                .name,
            "minor dike heightening"
        );

        // Risk keeps growing: the large order preempts the small one.
        city.areas[1].risk[2] = 15.0;
        mayor.apply_strategy(&mut city, &surge, &measures, &mut scheduler, 2, 2022);
        assert_eq!(
            scheduler
                .active_for(MeasureTarget::Protection(asset))
                .unwrap()
                .measure
                .name,
            "major dike heightening"
        );
        assert_eq!(scheduler.in_flight(), 1);
    }

    #[test]
    fn test_cost_benefit_flood_proofing_orders_mitigation() {
        let (mut city, surge, measures, mut scheduler) = setup();
        let mayor = CostBenefit::with_flood_proofing();

        city.areas[0].risk[0] = 0.8;
        mayor.apply_strategy(&mut city, &surge, &measures, &mut scheduler, 0, 2020);

        let active = scheduler.active_for(MeasureTarget::Area(0)).unwrap();
        assert_eq!(active.measure.name, "household flood proofing");
    }

    #[test]
    fn test_reactive_acts_on_alarms_only() {
        let (mut city, surge, measures, mut scheduler) = setup();
        let mayor = Reactive::default();
        let asset = city.areas[1].params.protected_by;

        // Nothing happened (NaN impact): no order.
        mayor.apply_strategy(&mut city, &surge, &measures, &mut scheduler, 0, 2020);
        assert_eq!(scheduler.in_flight(), 0);

        city.areas[1].event_impact[1] = 10.0; // near miss
        mayor.apply_strategy(&mut city, &surge, &measures, &mut scheduler, 1, 2021);
        assert_eq!(
            scheduler
                .active_for(MeasureTarget::Protection(asset))
                .unwrap()
                .measure
                .name,
            "minor dike heightening"
        );

        city.areas[1].event_impact[2] = 40.0; // major flood
        mayor.apply_strategy(&mut city, &surge, &measures, &mut scheduler, 2, 2022);
        assert_eq!(
            scheduler
                .active_for(MeasureTarget::Protection(asset))
                .unwrap()
                .measure
                .name,
            "major dike heightening"
        );
    }

    #[test]
    fn test_sentiment_reads_perceived_risk() {
        let (mut city, surge, measures, mut scheduler) = setup();
        let mayor = Sentiment::default();
        let asset = city.areas[1].params.protected_by;

        city.areas[1].risk[0] = 50.0; // objective risk is ignored
        city.areas[1].risk_perceived[0] = 1.0;
        mayor.apply_strategy(&mut city, &surge, &measures, &mut scheduler, 0, 2020);
        assert_eq!(scheduler.in_flight(), 0);

        city.areas[1].risk_perceived[1] = 12.0;
        mayor.apply_strategy(&mut city, &surge, &measures, &mut scheduler, 1, 2021);
        assert_eq!(
            scheduler
                .active_for(MeasureTarget::Protection(asset))
                .unwrap()
                .measure
                .name,
            "major dike heightening"
        );
    }

    #[test]
    fn test_mayor_registry_round_trips_names() {
        for mayor in all_mayors() {
            let found = mayor_by_name(mayor.name()).unwrap();
            assert_eq!(found.paper_name(), mayor.paper_name());
        }
        assert!(mayor_by_name("unknown").is_none());
    }
}
