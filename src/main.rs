//! Coastal SETP model - demo run
//!
//! Runs the reference city through one seeded storm-surge realisation under
//! every bundled management strategy and reports flood counts, protection
//! development, and the tipping points detected in the house-price series.

use coastal_setp::city::YearEvent;
use coastal_setp::engine::run;
use coastal_setp::mayor::all_mayors;
use coastal_setp::models::delta_city;
use coastal_setp::output::{setp_report, SetpParams};
use coastal_setp::scenario::{combine, SlrScenario, SurgeHeight};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn main() {
    println!("=== Coastal flood-risk ABM with tipping-point detection ===\n");

    let city = delta_city();
    let seed = 42;
    let start_year = 2020;
    let end_year = 2200;
    let implementation_times = (7, 10);

    println!("City: {}", city.name);
    for area in &city.areas {
        let asset = &city.assets[area.params.protected_by];
        println!(
            "  {} (elevation {:.1} m, {} houses) behind {} at {:.1} m",
            area.params.name, area.params.elevation, area.params.nr_houses, asset.name,
            asset.baseline_level
        );
    }

    // Accelerating sea-level rise plus one seeded extreme-value realisation.
    let years: Vec<i32> = (start_year..=end_year).collect();
    let sealevel: Vec<f64> = years
        .iter()
        .map(|&y| {
            let t = (y - start_year) as f64;
            0.002 * t + 0.00004 * t * t
        })
        .collect();
    let slr = SlrScenario::new("accelerating", years, sealevel);

    let mut rng = StdRng::seed_from_u64(seed);
    let gumbel = city.params.gumbel;
    let surge_height = SurgeHeight::from_gumbel(
        format!("gumbel_{}", seed),
        start_year,
        end_year,
        gumbel.mu,
        gumbel.beta,
        &mut rng,
    )
    .expect("reference Gumbel parameters are valid");

    let surge = combine(&slr, &surge_height).expect("series share the full year range");
    println!(
        "\nForcing: {} ({} years, seed {})",
        surge.name,
        surge.len(),
        seed
    );
    println!(
        "  Sea level rises {:.2} m over the run",
        surge.sealevel.last().unwrap() - surge.sealevel.first().unwrap()
    );

    let setp_params = SetpParams::default();

    for mayor in all_mayors() {
        println!("\n--- Strategy: {} ---", mayor.paper_name());

        let experiment = match run(&city, &surge, mayor.as_ref(), implementation_times) {
            Ok(experiment) => experiment,
            Err(error) => {
                eprintln!("  Run failed: {}", error);
                continue;
            }
        };

        for area in &experiment.city.areas {
            let floods = area
                .event_history
                .iter()
                .filter(|&&event| event == YearEvent::Flood)
                .count();
            let near_misses = area
                .event_history
                .iter()
                .filter(|&&event| event == YearEvent::NearMiss)
                .count();
            let asset = &experiment.city.assets[area.params.protected_by];
            println!(
                "  {:<13} floods: {:>3}  near misses: {:>3}  {} {:.1} -> {:.1} m",
                area.params.name,
                floods,
                near_misses,
                asset.name,
                asset.baseline_level,
                asset.protection_level.last().unwrap()
            );
        }

        for metric in experiment.metrics() {
            let report = setp_report(&metric, &setp_params);
            if report.negative_tipping_years.is_empty() && report.positive_tipping_years.is_empty()
            {
                continue;
            }
            println!(
                "  {:<42} tipping years: down {:?} up {:?}",
                report.metric, report.negative_tipping_years, report.positive_tipping_years
            );
        }
    }

    println!("\nDone.");
}
