//! Batch Experiment Runner
//!
//! Executes sweeps of scenario × strategy × implementation-time experiments
//! from a TOML configuration file.
//!
//! Usage:
//!   cargo run --release --bin run_experiment -- experiments/baseline.toml

use coastal_setp::engine::run;
use coastal_setp::mayor::mayor_by_name;
use coastal_setp::models::delta_city;
use coastal_setp::output::{ExperimentOutput, SetpParams};
use coastal_setp::scenario::{ScenarioCatalog, SlrScenario, SurgeHeight, SurgeLevel};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Top-level experiment configuration.
#[derive(Debug, Clone, Deserialize)]
struct ExperimentConfig {
    experiment: ExperimentMetadata,
    scenarios: ScenarioConfig,
    strategies: StrategyConfig,
    #[serde(default)]
    setp: SetpConfig,
    output: OutputSettings,
}

#[derive(Debug, Clone, Deserialize)]
struct ExperimentMetadata {
    name: String,
    description: String,
    start_year: i32,
    end_year: i32,
    num_realisations: usize,
    base_seed: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct ScenarioConfig {
    /// Directory of SLR CSVs; generated synthetically when absent.
    slr_dir: Option<String>,
    /// Directory of surge-height CSVs; drawn from the city's Gumbel
    /// climatology when absent.
    surge_dir: Option<String>,
    /// Linear component of synthetic sea-level rise [m/year].
    #[serde(default)]
    slr_rise_per_year: f64,
    /// Quadratic component of synthetic sea-level rise [m/year²].
    #[serde(default)]
    slr_acceleration: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct StrategyConfig {
    mayors: Vec<String>,
    implementation_times: Vec<(i64, i64)>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
struct SetpConfig {
    window: usize,
    margin: usize,
    c1: f64,
    c2: f64,
    c3: f64,
}

impl Default for SetpConfig {
    fn default() -> Self {
        let params = SetpParams::default();
        SetpConfig {
            window: params.window,
            margin: params.margin,
            c1: params.c1,
            c2: params.c2,
            c3: params.c3,
        }
    }
}

impl SetpConfig {
    fn to_params(self) -> SetpParams {
        SetpParams {
            window: self.window,
            margin: self.margin,
            c1: self.c1,
            c2: self.c2,
            c3: self.c3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct OutputSettings {
    save_timeseries: bool,
    save_summary: bool,
}

/// Tipping-point counts aggregated over one strategy's experiments.
#[derive(Debug, Clone, Default, Serialize)]
struct AggregateMetrics {
    runs: usize,
    failed_runs: usize,
    runs_with_negative_setp: usize,
    total_negative_setps: usize,
    total_positive_setps: usize,
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <experiment_config.toml>", args[0]);
        eprintln!("Example: {} experiments/baseline.toml", args[0]);
        std::process::exit(1);
    }

    let config_path = &args[1];
    println!("=== Coastal SETP Experiment Runner ===\n");
    println!("Loading experiment config: {}\n", config_path);

    let config_str = fs::read_to_string(config_path).unwrap_or_else(|error| {
        eprintln!("Error reading config file: {}", error);
        std::process::exit(1);
    });
    let config: ExperimentConfig = toml::from_str(&config_str).unwrap_or_else(|error| {
        eprintln!("Error parsing TOML config: {}", error);
        std::process::exit(1);
    });

    println!("Experiment: {}", config.experiment.name);
    println!("Description: {}", config.experiment.description);

    for name in &config.strategies.mayors {
        if mayor_by_name(name).is_none() {
            eprintln!("Unknown strategy '{}' in config", name);
            std::process::exit(1);
        }
    }

    let output_base = PathBuf::from("results").join(&config.experiment.name);
    fs::create_dir_all(&output_base).unwrap_or_else(|error| {
        eprintln!("Error creating output directory: {}", error);
        std::process::exit(1);
    });

    let catalog = build_catalog(&config).unwrap_or_else(|error| {
        eprintln!("Error preparing scenarios: {}", error);
        std::process::exit(1);
    });

    let mayors = &config.strategies.mayors;
    let times_list = &config.strategies.implementation_times;
    let combos: Vec<(&SurgeLevel, &String, (i64, i64))> = catalog
        .surge_levels
        .iter()
        .flat_map(|surge| {
            mayors.iter().flat_map(move |mayor| {
                times_list.iter().map(move |&times| (surge, mayor, times))
            })
        })
        .collect();

    println!(
        "Running {} surge levels × {} strategies × {} timing pairs = {} experiments\n",
        catalog.surge_levels.len(),
        config.strategies.mayors.len(),
        config.strategies.implementation_times.len(),
        combos.len()
    );

    let city = delta_city();
    let setp_params = config.setp.to_params();
    let start_time = Instant::now();

    // Each experiment clones the template city and owns its scheduler state,
    // so the fan-out shares nothing mutable.
    let results: Vec<(String, Result<ExperimentOutput, String>)> = combos
        .par_iter()
        .map(|&(surge, mayor_name, times)| {
            let mayor = mayor_by_name(mayor_name).expect("validated above");
            let result = run(&city, surge, mayor.as_ref(), times)
                .map(|experiment| ExperimentOutput::from_experiment(experiment, &setp_params))
                .map_err(|error| error.to_string());
            (mayor_name.clone(), result)
        })
        .collect();

    let mut aggregates: BTreeMap<String, AggregateMetrics> = BTreeMap::new();
    for (mayor_name, result) in &results {
        let entry = aggregates.entry(mayor_name.clone()).or_default();
        entry.runs += 1;

        match result {
            Ok(output) => {
                let negative: usize = output
                    .setp_reports
                    .iter()
                    .map(|report| report.negative_tipping_years.len())
                    .sum();
                let positive: usize = output
                    .setp_reports
                    .iter()
                    .map(|report| report.positive_tipping_years.len())
                    .sum();
                entry.total_negative_setps += negative;
                entry.total_positive_setps += positive;
                if negative > 0 {
                    entry.runs_with_negative_setp += 1;
                }

                save_output(output, &output_base, &config.output);
                println!(
                    "  {} ✓ setps: {} down / {} up",
                    output.metadata.name, negative, positive
                );
            }
            Err(error) => {
                entry.failed_runs += 1;
                eprintln!("  {} run failed: {}", mayor_name, error);
            }
        }
    }

    let aggregate_json = serde_json::to_string_pretty(&aggregates).unwrap();
    fs::write(output_base.join("aggregate_summary.json"), aggregate_json).unwrap();

    println!("\n=== Aggregate ===");
    for (mayor, metrics) in &aggregates {
        println!(
            "  {:<22} {}/{} runs tipped ({} negative SETPs total, {} failed)",
            mayor,
            metrics.runs_with_negative_setp,
            metrics.runs,
            metrics.total_negative_setps,
            metrics.failed_runs
        );
    }

    let elapsed = start_time.elapsed();
    println!(
        "\n✓ {} experiments in {:.1}s",
        combos.len(),
        elapsed.as_secs_f64()
    );
    println!("Results saved to: {}", output_base.display());
}

/// Load or synthesize the scenario catalog described by the config.
fn build_catalog(config: &ExperimentConfig) -> Result<ScenarioCatalog, Box<dyn std::error::Error>> {
    let mut catalog = ScenarioCatalog::new();
    let experiment = &config.experiment;
    let scenarios = &config.scenarios;

    match &scenarios.slr_dir {
        Some(dir) => {
            let loaded = catalog.load_slr_dir(dir)?;
            println!("Loaded {} SLR scenarios from {}", loaded, dir);
        }
        None => {
            let years: Vec<i32> = (experiment.start_year..=experiment.end_year).collect();
            let sealevel: Vec<f64> = years
                .iter()
                .map(|&year| {
                    let t = (year - experiment.start_year) as f64;
                    scenarios.slr_rise_per_year * t + scenarios.slr_acceleration * t * t
                })
                .collect();
            catalog
                .slr_scenarios
                .push(SlrScenario::new("synthetic", years, sealevel));
            println!("Generated 1 synthetic SLR scenario");
        }
    }

    match &scenarios.surge_dir {
        Some(dir) => {
            let loaded = catalog.load_surge_height_dir(dir)?;
            println!("Loaded {} surge-height series from {}", loaded, dir);
        }
        None => {
            let gumbel = delta_city().params.gumbel;
            for realisation in 0..experiment.num_realisations {
                let seed = experiment.base_seed + realisation as u64;
                let mut rng = StdRng::seed_from_u64(seed);
                let surge = SurgeHeight::from_gumbel(
                    format!("gumbel_{}", seed),
                    experiment.start_year,
                    experiment.end_year,
                    gumbel.mu,
                    gumbel.beta,
                    &mut rng,
                )?;
                catalog.surge_heights.push(surge);
            }
            println!(
                "Generated {} Gumbel surge realisations (base seed {})",
                experiment.num_realisations, experiment.base_seed
            );
        }
    }

    catalog.combine_all()?;
    Ok(catalog)
}

/// Save one experiment's outputs based on the settings.
fn save_output(output: &ExperimentOutput, base: &Path, settings: &OutputSettings) {
    if !settings.save_timeseries && !settings.save_summary {
        return;
    }

    let dir = base.join(&output.metadata.name);
    fs::create_dir_all(&dir).unwrap();

    if settings.save_timeseries {
        output
            .write_timeseries_csv(dir.join("timeseries.csv"))
            .unwrap();
    }
    if settings.save_summary {
        output.write_summary_json(dir.join("summary.json")).unwrap();
    }
}
