//! Reference city configurations.
//!
//! Cities are constructed programmatically; the values here are
//! configuration, not algorithm. `delta_city` is a stylized delta port: a
//! small outer-dike settlement on a quay wall next to a large inner-dike
//! centre behind a sea dike.

use crate::city::{
    AlarmCondition, AlarmTable, AreaParams, City, CityParams, FloodProtectionAsset,
    ResidentialArea, TrustParams,
};
use crate::damage::DamageCurve;
use crate::perception::{BayesianWeights, ExperienceCurve};
use crate::risk::GumbelParams;

/// Maximum residential damage, land-use based [€/m²] (Huizinga et al., 2017,
/// 2010 price level, The Netherlands).
const MAX_DAMAGE_PER_M2: f64 = 168.0;

/// Maximum residential damage, object based [€/house].
const MAX_DAMAGE_PER_HOUSE: f64 = 84_175.0;

/// JRC residential depth-damage curve, area scale.
pub fn residential_damage_curve() -> DamageCurve {
    DamageCurve::new(
        MAX_DAMAGE_PER_M2,
        vec![0.0, 0.5, 1.0, 1.5, 2.0, 3.0, 4.0, 5.0, 6.0],
        vec![0.0, 0.25, 0.4, 0.5, 0.6, 0.75, 0.85, 0.95, 1.0],
    )
}

/// JRC residential depth-damage curve, household scale.
pub fn household_damage_curve() -> DamageCurve {
    DamageCurve::new(
        MAX_DAMAGE_PER_HOUSE,
        vec![0.0, 0.5, 1.0, 1.5, 2.0, 3.0, 4.0, 5.0, 6.0],
        vec![0.0, 0.25, 0.4, 0.5, 0.6, 0.75, 0.85, 0.95, 1.0],
    )
}

fn alarm_table() -> AlarmTable {
    AlarmTable::new(vec![
        AlarmCondition {
            threshold: 1.0,
            label: "major flood".to_string(),
            penalty: 40.0,
        },
        AlarmCondition {
            threshold: 0.0,
            label: "small flood".to_string(),
            penalty: 20.0,
        },
        AlarmCondition {
            threshold: -0.2,
            label: "near miss".to_string(),
            penalty: 10.0,
        },
        AlarmCondition {
            threshold: -0.4,
            label: "major wake-up".to_string(),
            penalty: 7.0,
        },
        AlarmCondition {
            threshold: -1.0,
            label: "minor wake-up".to_string(),
            penalty: 5.0,
        },
        AlarmCondition {
            threshold: -10.0,
            label: "nothing happens".to_string(),
            penalty: 0.0,
        },
    ])
}

/// The reference two-area city.
///
/// Asset 0 is the unreinforced quay wall of the outer-dike settlement,
/// asset 1 the sea dike of the city centre. The centre's risk perception is
/// socially influenced by the settlement's, not the other way around.
pub fn delta_city() -> City {
    let params = CityParams {
        // Surge climatology per Sterl et al. (2009).
        gumbel: GumbelParams {
            mu: 2.33,
            beta: 0.234,
        },
        experience: ExperienceCurve::default(),
        alarms: alarm_table(),
        trust: TrustParams::default(),
    };

    let mut city = City::new("delta_city", params);

    city.add_asset(FloodProtectionAsset::new("quay wall", 3.5));
    city.add_asset(FloodProtectionAsset::new("sea dike", 4.5));

    city.add_area(ResidentialArea::new(AreaParams {
        name: "harbourfront".to_string(),
        elevation: 3.0,
        surface_area: 0.4,
        inhabitants: 1_500.0,
        nr_houses: 750.0,
        house_price_0: 300e3,
        house_price_horizon: 80,
        discount_rate: 0.03,
        damage_curve: residential_damage_curve(),
        household_damage_curve: household_damage_curve(),
        protected_by: 0,
        volume_threshold: 0.1,
        risk_perception_0: 0.0,
        social_influence_from: None,
        // A near miss leaves the harbourfront as unimpressed as a calm year.
        bayesian: BayesianWeights::new([1.0, 1.0, 0.1], [0.04, 0.04, 1.0], [0.0, 0.0, 0.0]),
    }));

    city.add_area(ResidentialArea::new(AreaParams {
        name: "city_centre".to_string(),
        elevation: -1.0,
        surface_area: 25.0,
        inhabitants: 500e3,
        nr_houses: 250e3,
        house_price_0: 350e3,
        house_price_horizon: 80,
        discount_rate: 0.03,
        damage_curve: residential_damage_curve(),
        household_damage_curve: household_damage_curve(),
        protected_by: 1,
        volume_threshold: 1.0,
        risk_perception_0: 0.0,
        social_influence_from: Some(0),
        bayesian: BayesianWeights::new([1.0, 0.1, 0.1], [0.04, 0.5, 1.0], [0.02, 0.4, 0.0]),
    }));

    city
}
