//! Depth-damage curves and the flood-proofing mitigation rule.

use crate::city::ResidentialArea;
use crate::helpers::lin_interp;

/// Share of the unmitigated damage that remains when household
/// flood-proofing is effective (Haer et al., 2017).
const FLOOD_PROOFING_FACTOR: f64 = 0.3;

/// Flood-proofing only works for water depths below this [m].
const FLOOD_PROOFING_MAX_DEPTH: f64 = 1.0;

/// A monotone depth → damage-fraction curve plus the maximum damage it
/// scales.
///
/// For the area scale, `max_damage` is in currency/m²; for the household
/// scale it is the replacement value of one house. Depths outside the curve
/// take the boundary fraction.
#[derive(Debug, Clone)]
pub struct DamageCurve {
    pub max_damage: f64,
    pub depth: Vec<f64>,
    pub fraction: Vec<f64>,
}

impl DamageCurve {
    pub fn new(max_damage: f64, depth: Vec<f64>, fraction: Vec<f64>) -> Self {
        debug_assert_eq!(depth.len(), fraction.len());
        DamageCurve {
            max_damage,
            depth,
            fraction,
        }
    }

    /// Damage fraction [0, 1] at the given inundation depth [m].
    pub fn fraction_at(&self, inundation: f64) -> f64 {
        lin_interp(inundation, &self.depth, &self.fraction)
    }
}

/// Apply the flood-proofing rule: shallow floods are mitigated to 30% of the
/// unmitigated damage, deeper floods are not. A policy rule, not a physical
/// model.
fn mitigate(damage: f64, inundation: f64, proofed: bool) -> f64 {
    if proofed && inundation < FLOOD_PROOFING_MAX_DEPTH {
        damage * FLOOD_PROOFING_FACTOR
    } else {
        damage
    }
}

impl ResidentialArea {
    /// Flood damage to the whole area [currency] at the given inundation
    /// depth, honouring the flood-proofing flag of year `t`.
    ///
    /// Also used with synthetic events to build exceedance-damage curves,
    /// not only for realized floods.
    pub fn area_damage(&self, inundation: f64, t: usize) -> f64 {
        let curve = &self.params.damage_curve;
        let damage =
            (curve.max_damage * 1e6 * self.params.surface_area * curve.fraction_at(inundation))
                .round();
        mitigate(damage, inundation, self.flood_proofing[t])
    }

    /// Flood damage to one household [currency] at the given inundation
    /// depth, honouring the flood-proofing flag of year `t`.
    pub fn household_damage(&self, inundation: f64, t: usize) -> f64 {
        let curve = &self.params.household_damage_curve;
        let damage = (curve.max_damage * curve.fraction_at(inundation)).round();
        mitigate(damage, inundation, self.flood_proofing[t])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{delta_city, residential_damage_curve};

    fn test_area() -> ResidentialArea {
        let mut city = delta_city();
        city.init_time(10);
        city.areas.remove(0)
    }

    #[test]
    fn test_fraction_interpolates_between_curve_points() {
        let curve = residential_damage_curve();
        // Reference curve: 0.25 at 0.5 m, 0.4 at 1.0 m.
        assert!((curve.fraction_at(0.75) - 0.325).abs() < 1e-12);
    }

    #[test]
    fn test_fraction_clamps_at_curve_ends() {
        let curve = residential_damage_curve();
        assert_eq!(curve.fraction_at(-0.5), 0.0);
        assert_eq!(curve.fraction_at(25.0), 1.0);
    }

    #[test]
    fn test_area_damage_scales_with_surface_area() {
        let area = test_area();
        // 1 m depth → fraction 0.4 of 168 €/m² over 0.4 km².
        let expected = (168.0 * 1e6 * 0.4 * 0.4_f64).round();
        assert_eq!(area.area_damage(1.0, 0), expected);
    }

    #[test]
    fn test_household_damage_uses_replacement_value() {
        let area = test_area();
        let expected = (84_175.0 * 0.4_f64).round();
        assert_eq!(area.household_damage(1.0, 0), expected);
    }

    #[test]
    fn test_negative_inundation_causes_no_damage() {
        let area = test_area();
        assert_eq!(area.area_damage(-2.0, 0), 0.0);
        assert_eq!(area.household_damage(-2.0, 0), 0.0);
    }

    #[test]
    fn test_flood_proofing_reduces_shallow_damage_only() {
        let mut area = test_area();
        let shallow_unproofed = area.household_damage(0.6, 2);
        let deep_unproofed = area.household_damage(1.5, 2);

        area.enable_flood_proofing(2);

        let shallow = area.household_damage(0.6, 2);
        let deep = area.household_damage(1.5, 2);

        assert!((shallow - shallow_unproofed * 0.3).abs() < 1e-9);
        assert_eq!(deep, deep_unproofed);
    }

    #[test]
    fn test_flood_proofing_respects_year_flag() {
        let mut area = test_area();
        area.enable_flood_proofing(5);

        let before = area.household_damage(0.6, 4);
        let after = area.household_damage(0.6, 5);

        assert!(after < before);
    }
}
