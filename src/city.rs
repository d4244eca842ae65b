//! The city model: flood-protection assets, residential areas, and the
//! shared hazard/behaviour parameters.
//!
//! A `City` is a template: the engine clones it per run, materializes the
//! per-year series with `init_time`, and mutates only its own clone. Areas
//! reference their protecting asset by index into `City::assets`, so clones
//! never share state.

use crate::damage::DamageCurve;
use crate::perception::{BayesianWeights, ExperienceCurve};
use crate::risk::GumbelParams;
use thiserror::Error;

/// An area references a flood-protection asset that the city does not own.
#[derive(Debug, Clone, Error)]
#[error("residential area '{area}' is protected by asset index {asset}, but the city has {assets} assets")]
pub struct InvalidCityError {
    pub area: String,
    pub asset: usize,
    pub assets: usize,
}

/// What happened to an area in a given year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum YearEvent {
    #[default]
    Nothing,
    NearMiss,
    Flood,
}

/// One row of the alarm-condition table: events at least `threshold` metres
/// above (or below) the protection level cost `penalty` points of trust.
#[derive(Debug, Clone)]
pub struct AlarmCondition {
    pub threshold: f64,
    pub label: String,
    pub penalty: f64,
}

/// Event-severity table keyed by (surge level − protection level), ordered
/// from the most to the least severe condition.
#[derive(Debug, Clone)]
pub struct AlarmTable {
    conditions: Vec<AlarmCondition>,
}

impl AlarmTable {
    /// Build from (threshold, label, penalty) rows; rows are sorted so the
    /// most severe condition is matched first.
    pub fn new(mut conditions: Vec<AlarmCondition>) -> Self {
        conditions.sort_by(|a, b| b.threshold.total_cmp(&a.threshold));
        AlarmTable { conditions }
    }

    /// Trust penalty for an event `difference` metres above the protection
    /// level (negative when the surge stayed below it). Zero when no
    /// condition matches.
    pub fn impact_of(&self, difference: f64) -> f64 {
        self.conditions
            .iter()
            .find(|c| difference >= c.threshold)
            .map(|c| c.penalty)
            .unwrap_or(0.0)
    }
}

/// Trust sub-model constants: relaxation rate `k` toward equilibrium `t_eq`,
/// and the initial trust level.
#[derive(Debug, Clone, Copy)]
pub struct TrustParams {
    pub k: f64,
    pub t_eq: f64,
    pub trust_0: f64,
}

impl Default for TrustParams {
    fn default() -> Self {
        TrustParams {
            k: 0.2,
            t_eq: 70.0,
            trust_0: 70.0,
        }
    }
}

/// City-wide parameters shared by all areas.
#[derive(Debug, Clone)]
pub struct CityParams {
    /// Storm-surge climatology at the city's coast.
    pub gumbel: GumbelParams,
    /// Experience-interpolation curve for the risk-perception update.
    pub experience: ExperienceCurve,
    /// Event-severity table for the trust sub-model.
    pub alarms: AlarmTable,
    /// Trust relaxation constants.
    pub trust: TrustParams,
}

/// A single protective structure (dike, quay wall, ...).
#[derive(Debug, Clone)]
pub struct FloodProtectionAsset {
    pub name: String,
    /// Protection standard [m] at construction; never changes.
    pub baseline_level: f64,
    /// Protection standard per simulated year; materialized by `init_time`,
    /// raised only by completed measures, never lowered.
    pub protection_level: Vec<f64>,
    /// Heightening [m] of the upgrade ordered in each year (0 = none).
    pub measure_history: Vec<f64>,
}

impl FloodProtectionAsset {
    pub fn new(name: impl Into<String>, baseline_level: f64) -> Self {
        FloodProtectionAsset {
            name: name.into(),
            baseline_level,
            protection_level: Vec::new(),
            measure_history: Vec::new(),
        }
    }

    /// Allocate the per-year series for a run of `n` years.
    pub fn init_time(&mut self, n: usize) {
        self.protection_level = vec![self.baseline_level; n];
        self.measure_history = vec![0.0; n];
    }
}

/// Static configuration of a residential area.
#[derive(Debug, Clone)]
pub struct AreaParams {
    pub name: String,
    /// Ground elevation [m].
    pub elevation: f64,
    /// Surface area [km²].
    pub surface_area: f64,
    pub inhabitants: f64,
    pub nr_houses: f64,
    /// House price at t = 0 [currency].
    pub house_price_0: f64,
    /// Valuation horizon for discounting [years].
    pub house_price_horizon: usize,
    /// Discount rate per year.
    pub discount_rate: f64,
    /// Area-scale depth-damage curve (max damage in currency/m²).
    pub damage_curve: DamageCurve,
    /// Household-scale depth-damage curve (max damage in currency/house).
    pub household_damage_curve: DamageCurve,
    /// Index of the protecting asset in `City::assets`.
    pub protected_by: usize,
    /// Overtopping [m] below which inundation is attenuated linearly.
    pub volume_threshold: f64,
    /// Initial risk-perception state in [0, 1].
    pub risk_perception_0: f64,
    /// Area whose risk perception feeds this area's social-influence term.
    pub social_influence_from: Option<usize>,
    /// Weighting of the risk-perception update per outcome category.
    pub bayesian: BayesianWeights,
}

/// A population/housing cluster and its per-year state.
///
/// Every `Vec` field below holds one entry per simulated year once
/// `init_time` has run; unset values are NaN (or `YearEvent::Nothing` /
/// `false` for the tag and flag series). Entries are written once, in year
/// order, by the simulation engine.
#[derive(Debug, Clone)]
pub struct ResidentialArea {
    pub params: AreaParams,

    pub event_history: Vec<YearEvent>,
    pub flood_depth: Vec<f64>,
    pub near_miss_margin: Vec<f64>,
    pub flood_damage: Vec<f64>,
    /// Objective expected annual damage, area scale [M currency/year].
    pub risk: Vec<f64>,
    /// Objective expected annual damage per household [currency/year].
    pub risk_household: Vec<f64>,
    /// Perceived expected annual damage, area scale [M currency/year].
    pub risk_perceived: Vec<f64>,
    pub risk_household_perceived: Vec<f64>,
    pub risk_household_discounted: Vec<f64>,
    pub risk_household_discounted_perceived: Vec<f64>,
    /// Return period [years] implied by the protection level in place.
    pub protection_return_period: Vec<f64>,
    /// Subjective risk-perception state in [0, 1].
    pub risk_perception: Vec<f64>,
    pub house_price_objective: Vec<f64>,
    pub house_price_subjective: Vec<f64>,
    /// Household flood-proofing in effect this year.
    pub flood_proofing: Vec<bool>,
    pub trust: Vec<f64>,
    pub event_impact: Vec<f64>,
}

impl ResidentialArea {
    pub fn new(params: AreaParams) -> Self {
        ResidentialArea {
            params,
            event_history: Vec::new(),
            flood_depth: Vec::new(),
            near_miss_margin: Vec::new(),
            flood_damage: Vec::new(),
            risk: Vec::new(),
            risk_household: Vec::new(),
            risk_perceived: Vec::new(),
            risk_household_perceived: Vec::new(),
            risk_household_discounted: Vec::new(),
            risk_household_discounted_perceived: Vec::new(),
            protection_return_period: Vec::new(),
            risk_perception: Vec::new(),
            house_price_objective: Vec::new(),
            house_price_subjective: Vec::new(),
            flood_proofing: Vec::new(),
            trust: Vec::new(),
            event_impact: Vec::new(),
        }
    }

    /// Allocate the per-year series for a run of `n` years and seed the t=0
    /// values (initial house price, perception, and trust).
    pub fn init_time(&mut self, n: usize, trust: &TrustParams) {
        self.event_history = vec![YearEvent::Nothing; n];
        self.flood_depth = vec![f64::NAN; n];
        self.near_miss_margin = vec![f64::NAN; n];
        self.flood_damage = vec![f64::NAN; n];
        self.risk = vec![f64::NAN; n];
        self.risk_household = vec![f64::NAN; n];
        self.risk_perceived = vec![f64::NAN; n];
        self.risk_household_perceived = vec![f64::NAN; n];
        self.risk_household_discounted = vec![f64::NAN; n];
        self.risk_household_discounted_perceived = vec![f64::NAN; n];
        self.protection_return_period = vec![f64::NAN; n];
        self.risk_perception = vec![f64::NAN; n];
        self.house_price_objective = vec![f64::NAN; n];
        self.house_price_subjective = vec![f64::NAN; n];
        self.flood_proofing = vec![false; n];
        self.trust = vec![f64::NAN; n];
        self.event_impact = vec![f64::NAN; n];

        if n > 0 {
            self.risk_perception[0] = self.params.risk_perception_0;
            self.house_price_objective[0] = self.params.house_price_0;
            self.house_price_subjective[0] = self.params.house_price_0;
            self.trust[0] = trust.trust_0;
        }
    }

    /// Total residential capital at t = 0 [currency].
    pub fn residential_capital(&self) -> f64 {
        self.params.nr_houses * self.params.house_price_0
    }

    /// Turn on household flood-proofing from `year` to the end of the run.
    pub fn enable_flood_proofing(&mut self, year: usize) {
        for flag in self.flood_proofing.iter_mut().skip(year) {
            *flag = true;
        }
    }
}

/// A named city: protection assets, residential areas, shared parameters.
#[derive(Debug, Clone)]
pub struct City {
    pub name: String,
    pub assets: Vec<FloodProtectionAsset>,
    pub areas: Vec<ResidentialArea>,
    pub params: CityParams,
}

impl City {
    pub fn new(name: impl Into<String>, params: CityParams) -> Self {
        City {
            name: name.into(),
            assets: Vec::new(),
            areas: Vec::new(),
            params,
        }
    }

    pub fn add_asset(&mut self, asset: FloodProtectionAsset) {
        self.assets.push(asset);
    }

    pub fn add_area(&mut self, area: ResidentialArea) {
        self.areas.push(area);
    }

    /// Check that every area's asset reference (and social-influence
    /// reference) resolves within this city.
    pub fn validate(&self) -> Result<(), InvalidCityError> {
        for area in &self.areas {
            if area.params.protected_by >= self.assets.len() {
                return Err(InvalidCityError {
                    area: area.params.name.clone(),
                    asset: area.params.protected_by,
                    assets: self.assets.len(),
                });
            }
        }
        Ok(())
    }

    /// Allocate all per-year series for a run of `n` years.
    pub fn init_time(&mut self, n: usize) {
        for asset in &mut self.assets {
            asset.init_time(n);
        }
        let trust = self.params.trust;
        for area in &mut self.areas {
            area.init_time(n, &trust);
        }
    }

    /// Protection level [m] of the asset protecting `area` in year `t`.
    pub fn protection_level_of(&self, area: usize, t: usize) -> f64 {
        let asset = self.areas[area].params.protected_by;
        self.assets[asset].protection_level[t]
    }
}
