//! The per-year simulation engine.
//!
//! One run is a strict sequential fold over the years of its surge-level
//! forcing. Each year, in order: flood and near-miss detection, the trust
//! update, objective and perceived risk (and the house prices they imply),
//! the risk-perception update, the strategy's decisions, and the measure
//! countdowns. No year starts before the previous year's state is final.
//!
//! The engine never mutates its inputs: it clones the template city and
//! returns the post-run clone inside an [`Experiment`].

use crate::city::{City, InvalidCityError, YearEvent};
use crate::mayor::{Mayor, MeasureSet};
use crate::measures::{NegativeCountdownError, Scheduler};
use crate::perception::{shift_return_period, shift_return_periods, RangeError};
use crate::risk::{
    discount_risk, gumbel_inverse, gumbel_return_period, risk_fp, FormatError, HorizonError,
    REFERENCE_RETURN_PERIODS,
};
use crate::scenario::SurgeLevel;
use crate::tipping::Metric;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// A surge at most this far below the protection level counts as a near
/// miss [m].
const NEAR_MISS_MARGIN: f64 = 0.5;

/// A fatal error aborting one run. Errors never cross runs: a batch driver
/// reports the failed experiment and continues with its siblings.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    InvalidCity(#[from] InvalidCityError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Range(#[from] RangeError),

    #[error(transparent)]
    Horizon(#[from] HorizonError),

    #[error(transparent)]
    NegativeCountdown(#[from] NegativeCountdownError),
}

/// The result of one completed run: the post-run city state with its
/// forcing, strategy, and timing metadata.
#[derive(Debug, Clone)]
pub struct Experiment {
    pub name: String,
    pub city: City,
    pub surge: SurgeLevel,
    pub mayor_name: String,
    pub mayor_label: String,
    pub implementation_times: (i64, i64),
    /// Moment the experiment finished.
    pub time: DateTime<Utc>,
}

impl Experiment {
    /// The output metrics of interest: objective and subjective house-price
    /// series per residential area.
    pub fn metrics(&self) -> Vec<Metric> {
        let mut metrics = Vec::new();
        for area in &self.city.areas {
            metrics.push(Metric::new(
                format!("{}_house_price_objective", area.params.name),
                self.surge.years.clone(),
                &area.house_price_objective,
            ));
            metrics.push(Metric::new(
                format!("{}_house_price_subjective", area.params.name),
                self.surge.years.clone(),
                &area.house_price_subjective,
            ));
        }
        metrics
    }
}

/// Linear attenuation of inundation for marginal overtopping: below the
/// threshold only part of the flood volume enters, at or above it the full
/// bathtub level applies.
fn attenuation_factor(overtopping: f64, threshold: f64) -> f64 {
    if overtopping < threshold {
        overtopping / threshold
    } else {
        1.0
    }
}

/// Run one experiment: `city` under `surge`, managed by `mayor`, with the
/// given (small, large) measure implementation times in years.
///
/// The run spans exactly the years of `surge` and owns all of its state: the
/// template city is cloned and a fresh scheduler is created, so independent
/// runs from one template never share anything.
pub fn run(
    city: &City,
    surge: &SurgeLevel,
    mayor: &dyn Mayor,
    implementation_times: (i64, i64),
) -> Result<Experiment, EngineError> {
    let mut city = city.clone();
    city.validate()?;

    let n = surge.len();
    city.init_time(n);

    let measures = MeasureSet::standard(implementation_times);
    let mut scheduler = Scheduler::default();

    for i in 0..n {
        let years_remaining = n - i;
        let surge_level = surge.level[i];

        // Flood / near-miss detection and the trust response.
        for idx in 0..city.areas.len() {
            let protection = city.protection_level_of(idx, i);
            let impact = city.params.alarms.impact_of(surge_level - protection);
            let trust = city.params.trust;

            let area = &mut city.areas[idx];
            if protection < surge_level {
                let overtopping = surge_level - protection;
                let attenuation = attenuation_factor(overtopping, area.params.volume_threshold);
                let depth = (surge_level - area.params.elevation) * attenuation;
                area.flood_depth[i] = depth;
                area.flood_damage[i] = area.area_damage(depth, i);
                area.event_history[i] = YearEvent::Flood;
            }
            let margin = protection - surge_level;
            if 0.0 < margin && margin <= NEAR_MISS_MARGIN {
                area.near_miss_margin[i] = margin;
                area.event_history[i] = YearEvent::NearMiss;
            }

            // Trust reacts to the year's event severity, then relaxes toward
            // its equilibrium. The first year keeps its initial condition.
            if i != 0 {
                area.event_impact[i] = impact;
                let mut level = area.trust[i - 1] - impact;
                level += (level - trust.t_eq) * -trust.k;
                area.trust[i] = level;
            }
        }

        // Risk, perception, and house prices.
        for idx in 0..city.areas.len() {
            let protection = city.protection_level_of(idx, i);
            let sealevel = surge.sealevel[i];
            let gumbel = city.params.gumbel;
            let experience = city.params.experience;

            // Social influence reads the neighbour's perception of *this*
            // year; areas are updated in city order, so an influencing area
            // must precede the influenced one.
            let i_social = city.areas[idx]
                .params
                .social_influence_from
                .map(|source| city.areas[source].risk_perception[i])
                .unwrap_or(0.0);

            let area = &mut city.areas[idx];

            // The largest storm surge this protection can cope with, and its
            // return period under the sea level of this year.
            let max_surge = protection - sealevel;
            let protection_rp = gumbel_return_period(max_surge, gumbel.mu, gumbel.beta);
            area.protection_return_period[i] = protection_rp;

            // Synthetic exceedance-damage curve over the reference events.
            let mut damages = Vec::with_capacity(REFERENCE_RETURN_PERIODS.len());
            let mut damages_household = Vec::with_capacity(REFERENCE_RETURN_PERIODS.len());
            for &rp in &REFERENCE_RETURN_PERIODS {
                let waterlevel = gumbel_inverse(rp, gumbel.mu, gumbel.beta) + sealevel;
                let overtopping = waterlevel - protection;
                let attenuation = attenuation_factor(overtopping, area.params.volume_threshold);
                let inundation = (waterlevel - area.params.elevation) * attenuation;
                damages.push(area.area_damage(inundation, i));
                damages_household.push(area.household_damage(inundation, i));
            }

            area.risk[i] = risk_fp(&damages, &REFERENCE_RETURN_PERIODS, protection_rp)? * 1e-6;
            area.risk_household[i] =
                risk_fp(&damages_household, &REFERENCE_RETURN_PERIODS, protection_rp)?;

            // Rational housing market: discount the current household EAD as
            // a constant annuity over the valuation horizon. Skipped once
            // fewer years remain than the horizon covers.
            let horizon = area.params.house_price_horizon;
            if years_remaining > horizon {
                let future_ead = vec![area.risk_household[i]; horizon];
                area.risk_household_discounted[i] =
                    discount_risk(&future_ead, area.params.discount_rate, horizon)?;
                let flood_discount =
                    area.risk_household_discounted[i] - area.risk_household_discounted[0];
                area.house_price_objective[i] = area.params.house_price_0 - flood_discount;
            }

            if i != 0 {
                area.update_risk_perception(i, i_social, 0.0, &experience);
            }

            // Boundedly rational track: the same risk integral over
            // perception-shifted return periods.
            let perception = area.risk_perception[i];
            let shifted_rps = shift_return_periods(&REFERENCE_RETURN_PERIODS, perception)?;
            let shifted_pl = shift_return_period(protection_rp, perception)?;
            area.risk_perceived[i] = risk_fp(&damages, &shifted_rps, shifted_pl)? * 1e-6;
            area.risk_household_perceived[i] =
                risk_fp(&damages_household, &shifted_rps, shifted_pl)?;

            if years_remaining > horizon {
                let future_ead = vec![area.risk_household_perceived[i]; horizon];
                area.risk_household_discounted_perceived[i] =
                    discount_risk(&future_ead, area.params.discount_rate, horizon)?;
                let flood_discount = area.risk_household_discounted_perceived[i]
                    - area.risk_household_discounted[0];
                area.house_price_subjective[i] = area.params.house_price_0 - flood_discount;
            }
        }

        // The mayor reads this year's state and may place orders; afterwards
        // every in-flight order advances one year. Orders completing now
        // raise protection from this year onward, which areas see from next
        // year's asset lookup.
        mayor.apply_strategy(&mut city, surge, &measures, &mut scheduler, i, surge.years[i]);
        scheduler.advance(i, &mut city.assets, &mut city.areas)?;
    }

    let name = format!(
        "{}_{}_{}_{}-{}",
        city.name,
        surge.name,
        mayor.name(),
        implementation_times.0,
        implementation_times.1
    );
    Ok(Experiment {
        name,
        city,
        surge: surge.clone(),
        mayor_name: mayor.name().to_string(),
        mayor_label: mayor.paper_name().to_string(),
        implementation_times,
        time: Utc::now(),
    })
}
