//! Objective flood-risk computation: the Gumbel surge climatology, the
//! protection-censored risk integral, and risk discounting for house-price
//! valuation.

use crate::helpers::trapezoid;
use thiserror::Error;

/// Reference return periods [years] of the synthetic events used to build
/// exceedance-damage curves, from rare to frequent.
pub const REFERENCE_RETURN_PERIODS: [f64; 12] = [
    10_000.0, 5_000.0, 2_000.0, 1_000.0, 500.0, 200.0, 100.0, 50.0, 20.0, 10.0, 5.0, 2.0,
];

/// Return periods not ordered the way the risk integral requires.
#[derive(Debug, Clone, Error)]
#[error("return periods must be strictly descending, e.g. [500, 100, 10]")]
pub struct FormatError;

/// A discounting horizon longer than the available damage series.
#[derive(Debug, Clone, Error)]
#[error("requested time horizon {horizon} exceeds the {available} available expected annual damages")]
pub struct HorizonError {
    pub horizon: usize,
    pub available: usize,
}

/// Gumbel parameters of the storm-surge climatology.
#[derive(Debug, Clone, Copy)]
pub struct GumbelParams {
    /// Location [m].
    pub mu: f64,
    /// Scale [m].
    pub beta: f64,
}

/// Cumulative probability that the annual maximum surge stays at or below `x`.
pub fn gumbel_cdf(x: f64, mu: f64, beta: f64) -> f64 {
    (-((mu - x) / beta).exp()).exp()
}

/// Water level [m] of the event with the given return period [years].
pub fn gumbel_inverse(return_period: f64, mu: f64, beta: f64) -> f64 {
    mu - beta * (-((return_period - 1.0) / return_period).ln()).ln()
}

/// Return period [years] of an annual-maximum surge of height `h` [m].
pub fn gumbel_return_period(h: f64, mu: f64, beta: f64) -> f64 {
    1.0 / (1.0 - gumbel_cdf(h, mu, beta))
}

/// Annualized expected damage from a discretized exceedance-damage curve,
/// censored by the protection level in place.
///
/// `damages` and `return_periods` run from the rarest event to the most
/// frequent (strictly descending return periods); `protection_level` is the
/// return period [years] the flood protection withstands.
///
/// Assumptions baked into the integration:
/// - events rarer than the rarest simulated one cause that event's damage;
/// - events more frequent than the most frequent simulated one cause none;
/// - between simulated events, damage is linear in exceedance *frequency*,
///   so the crossover at the protection level is interpolated over 1/RP,
///   not over RP.
pub fn risk_fp(
    damages: &[f64],
    return_periods: &[f64],
    protection_level: f64,
) -> Result<f64, FormatError> {
    if damages.is_empty() || damages.len() != return_periods.len() {
        return Err(FormatError);
    }
    if return_periods.windows(2).any(|pair| pair[1] >= pair[0]) {
        return Err(FormatError);
    }

    let mut dam = damages.to_vec();
    let mut rps = return_periods.to_vec();
    let last = rps.len() - 1;

    if protection_level >= rps[0] {
        // Protection withstands even the rarest simulated event: only the
        // implied exceedance frequency of the protection itself contributes.
        return Ok(dam[0] / protection_level);
    }

    if rps[last] < protection_level && protection_level < rps[0] {
        // The protection level falls between two simulated events: cut the
        // curve off there, interpolating the damage at frequency 1/PL.
        let pos = rps
            .iter()
            .position(|&rp| rp < protection_level)
            .expect("protection level is above the smallest return period");
        let crossover_frequency = 1.0 / protection_level;
        let fraction = (crossover_frequency - 1.0 / rps[pos - 1])
            / (1.0 / rps[pos] - 1.0 / rps[pos - 1]);
        dam.truncate(pos + 1);
        dam[pos] = dam[pos - 1] + fraction * (dam[pos] - dam[pos - 1]);
        rps[pos] = protection_level;
        rps.truncate(pos + 1);
    }
    // Otherwise the protection is below the most frequent simulated event:
    // integrate the whole curve, assuming no damage beyond it.

    // Re-add the rarest damage for the 1-in-infinity event at frequency zero.
    dam.insert(0, dam[0]);
    let mut frequencies: Vec<f64> = rps.iter().map(|rp| 1.0 / rp).collect();
    frequencies.insert(0, 0.0);

    let integral = trapezoid(&dam, &frequencies);
    Ok((integral * 100.0).round() / 100.0)
}

/// Discounted present value of a series of expected annual damages.
///
/// Discounts the first `horizon` entries of `ead` at rate `discount` per year.
pub fn discount_risk(ead: &[f64], discount: f64, horizon: usize) -> Result<f64, HorizonError> {
    if horizon > ead.len() {
        return Err(HorizonError {
            horizon,
            available: ead.len(),
        });
    }

    let mut present_value = 0.0;
    for (t, &annual) in ead.iter().take(horizon).enumerate() {
        present_value += annual / (1.0 + discount).powi(t as i32);
    }
    Ok(present_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const MU: f64 = 2.33;
    const BETA: f64 = 0.234;

    #[test]
    fn test_gumbel_cdf_is_monotone() {
        let mut previous = 0.0;
        for step in 0..60 {
            let level = 1.0 + step as f64 * 0.1;
            let p = gumbel_cdf(level, MU, BETA);
            assert!(p >= previous);
            previous = p;
        }
    }

    #[test]
    fn test_gumbel_inverse_round_trips_return_period() {
        for &rp in &REFERENCE_RETURN_PERIODS {
            let level = gumbel_inverse(rp, MU, BETA);
            let recovered = gumbel_return_period(level, MU, BETA);
            assert_relative_eq!(recovered, rp, max_relative = 1e-6);
        }
    }

    #[test]
    fn test_gumbel_inverse_rarer_events_are_higher() {
        let h100 = gumbel_inverse(100.0, MU, BETA);
        let h10000 = gumbel_inverse(10_000.0, MU, BETA);
        assert!(h10000 > h100);
    }

    #[test]
    fn test_risk_fp_rejects_unsorted_return_periods() {
        assert!(risk_fp(&[100.0, 50.0], &[10.0, 500.0], 20.0).is_err());
        assert!(risk_fp(&[100.0, 50.0], &[500.0, 500.0], 20.0).is_err());
        assert!(risk_fp(&[100.0], &[500.0, 100.0], 20.0).is_err());
    }

    #[test]
    fn test_risk_fp_protection_beyond_rarest_event() {
        let damages = [100.0, 80.0, 50.0];
        let rps = [500.0, 100.0, 10.0];

        // Exactly at the rarest simulated event and far beyond it take the
        // same branch: damage of the rarest event at its frequency.
        assert_relative_eq!(risk_fp(&damages, &rps, 500.0).unwrap(), 100.0 / 500.0);
        assert_relative_eq!(risk_fp(&damages, &rps, 50_000.0).unwrap(), 100.0 / 50_000.0);
    }

    #[test]
    fn test_risk_fp_protection_below_most_frequent_event() {
        let damages = [100.0, 80.0, 50.0];
        let rps = [500.0, 100.0, 10.0];

        // No censoring: trapezoid over frequencies [0, 1/500, 1/100, 1/10]
        // with damages [100, 100, 80, 50].
        let expected: f64 = (1.0 / 500.0) * (100.0 + 100.0) / 2.0
            + (1.0 / 100.0 - 1.0 / 500.0) * (100.0 + 80.0) / 2.0
            + (1.0 / 10.0 - 1.0 / 100.0) * (80.0 + 50.0) / 2.0;
        let expected = (expected * 100.0).round() / 100.0;

        assert_relative_eq!(risk_fp(&damages, &rps, 2.0).unwrap(), expected);
    }

    #[test]
    fn test_risk_fp_interpolates_crossover_in_frequency_space() {
        // Protection level 150 falls between RP 100 and RP 200; damage at the
        // crossover interpolates between 80 and 50 over 1/RP.
        let damages = [100.0, 80.0, 50.0, 10.0];
        let rps = [500.0, 200.0, 100.0, 10.0];
        let pl = 150.0;

        let f = 1.0 / pl;
        let crossover_damage =
            80.0 + (f - 1.0 / 200.0) / (1.0 / 100.0 - 1.0 / 200.0) * (50.0 - 80.0);
        let expected: f64 = (1.0 / 500.0) * (100.0 + 100.0) / 2.0
            + (1.0 / 200.0 - 1.0 / 500.0) * (100.0 + 80.0) / 2.0
            + (f - 1.0 / 200.0) * (80.0 + crossover_damage) / 2.0;
        let expected = (expected * 100.0).round() / 100.0;

        assert_relative_eq!(risk_fp(&damages, &rps, pl).unwrap(), expected);
    }

    #[test]
    fn test_risk_fp_monotone_in_protection_level() {
        let damages = [100.0, 80.0, 50.0, 10.0];
        let rps = [500.0, 200.0, 100.0, 10.0];

        let levels = [2.0, 10.0, 50.0, 150.0, 300.0, 500.0, 5_000.0];
        let mut previous = f64::INFINITY;
        for &pl in &levels {
            let risk = risk_fp(&damages, &rps, pl).unwrap();
            assert!(
                risk <= previous,
                "risk increased from {} to {} at PL {}",
                previous,
                risk,
                pl
            );
            previous = risk;
        }
    }

    #[test]
    fn test_discount_risk_constant_annuity() {
        // 80 years of a constant EAD at 3%: geometric series.
        let ead = vec![100.0; 80];
        let value = discount_risk(&ead, 0.03, 80).unwrap();

        let q: f64 = 1.0 / 1.03;
        let expected = 100.0 * (1.0 - q.powi(80)) / (1.0 - q);
        assert_relative_eq!(value, expected, max_relative = 1e-10);
    }

    #[test]
    fn test_discount_risk_zero_rate_is_plain_sum() {
        let ead = vec![5.0; 10];
        assert_relative_eq!(discount_risk(&ead, 0.0, 10).unwrap(), 50.0);
    }

    #[test]
    fn test_discount_risk_rejects_short_series() {
        let err = discount_risk(&[1.0, 2.0], 0.03, 5).unwrap_err();
        assert_eq!(err.horizon, 5);
        assert_eq!(err.available, 2);
    }
}
