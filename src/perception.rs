//! Subjective risk: the exponentially-weighted risk-perception state and the
//! perceived-return-period shift.
//!
//! The perception update is adapted from Haer et al. (2017), citing Viscusi
//! (1985, 1989). Despite the Bayesian styling it is an exponential-smoothing
//! update with configured weights, not a posterior; the weights are
//! configuration, not learned.

use crate::city::ResidentialArea;
use crate::helpers::lin_interp;
use thiserror::Error;

/// A risk-perception factor outside [0, 1].
#[derive(Debug, Clone, Error)]
#[error("risk perception factor must lie in [0, 1], got {0}")]
pub struct RangeError(pub f64);

/// Index into the per-outcome weight triples.
const NOTHING: usize = 0;
const NEAR_MISS: usize = 1;
const FLOOD: usize = 2;

/// Weights of the risk-perception update, one per outcome category
/// (no flood / near miss / flood):
///
/// ```text
///            a·RP[t-1] + b·I_exp + c·I_social + d·I_media
/// RP[t] =    --------------------------------------------
///                          a + b + c + d
/// ```
///
/// `d` weighs an external media/science signal and is all-zero in the
/// reference configuration.
#[derive(Debug, Clone)]
pub struct BayesianWeights {
    pub a: [f64; 3],
    pub b: [f64; 3],
    pub c: [f64; 3],
    pub d: [f64; 3],
}

impl BayesianWeights {
    pub fn new(a: [f64; 3], b: [f64; 3], c: [f64; 3]) -> Self {
        BayesianWeights {
            a,
            b,
            c,
            d: [0.0; 3],
        }
    }
}

/// Two-point curve translating flood depth [m] into an experience signal
/// in [0, 1]. Near misses use the reversed response: a margin of zero is a
/// full experience, a margin at the curve's end none at all.
#[derive(Debug, Clone, Copy)]
pub struct ExperienceCurve {
    pub depth: [f64; 2],
    pub response: [f64; 2],
}

impl Default for ExperienceCurve {
    fn default() -> Self {
        // Haer et al. (2017), p. 1982: full experience at 0.5 m depth.
        ExperienceCurve {
            depth: [0.0, 0.5],
            response: [0.0, 1.0],
        }
    }
}

impl ExperienceCurve {
    /// Experience signal of a flood with the given inundation depth.
    pub fn flood_experience(&self, depth: f64) -> f64 {
        lin_interp(depth, &self.depth, &self.response)
    }

    /// Experience signal of a near miss with the given margin below the
    /// protection level.
    pub fn near_miss_experience(&self, margin: f64) -> f64 {
        lin_interp(margin, &self.depth, &[self.response[1], self.response[0]])
    }
}

impl ResidentialArea {
    /// Weighted risk-perception update for year `t` (t ≥ 1).
    ///
    /// The outcome category follows this year's recorded series: a flood when
    /// the flood depth is positive, else a near miss when the margin is
    /// positive, else nothing (unset NaN values compare false and fall
    /// through to the nothing branch).
    pub fn update_risk_perception(
        &mut self,
        t: usize,
        i_social: f64,
        i_media: f64,
        curve: &ExperienceCurve,
    ) {
        debug_assert!(t >= 1, "t = 0 uses the configured initial perception");

        let depth = self.flood_depth[t];
        let margin = self.near_miss_margin[t];

        let (outcome, i_exp) = if depth > 0.0 {
            (FLOOD, curve.flood_experience(depth))
        } else if margin > 0.0 {
            (NEAR_MISS, curve.near_miss_experience(margin))
        } else {
            (NOTHING, 0.0)
        };

        let weights = &self.params.bayesian;
        let (a, b, c, d) = (
            weights.a[outcome],
            weights.b[outcome],
            weights.c[outcome],
            weights.d[outcome],
        );

        self.risk_perception[t] =
            (a * self.risk_perception[t - 1] + b * i_exp + c * i_social + d * i_media)
                / (a + b + c + d);
    }
}

/// Shift a return period [years] by a risk-perception factor.
///
/// The event probability is scaled by `10^(2·perception − 1)` (Botzen et
/// al., 2009): perception 0.5 leaves it unchanged, 0 makes events seem ten
/// times rarer (overconfidence), 1 ten times more frequent (overreaction).
pub fn shift_return_period(return_period: f64, perception: f64) -> Result<f64, RangeError> {
    if !(0.0..=1.0).contains(&perception) {
        return Err(RangeError(perception));
    }
    let factor = 10f64.powf(2.0 * perception - 1.0);
    let perceived_probability = factor * (1.0 / return_period);
    Ok(1.0 / perceived_probability)
}

/// Shift a whole series of return periods; see [`shift_return_period`].
pub fn shift_return_periods(
    return_periods: &[f64],
    perception: f64,
) -> Result<Vec<f64>, RangeError> {
    return_periods
        .iter()
        .map(|&rp| shift_return_period(rp, perception))
        .collect()
}
