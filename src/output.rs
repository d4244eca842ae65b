//! Structured export of experiment results: per-year time series to CSV and
//! a run summary (metadata plus tipping-point reports) to JSON, for analysis
//! in Python (pandas, matplotlib).

use crate::city::YearEvent;
use crate::engine::Experiment;
use crate::tipping::{create_statistics, find_candidates, select, Metric, SelectOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Tuning of the tipping-point detector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SetpParams {
    /// Rolling-window width [years].
    pub window: usize,
    /// Lookaround distance for stable states [years].
    pub margin: usize,
    /// Rapid-change threshold as a fraction of the t=0 value.
    pub c1: f64,
    /// Stability threshold on the rolling variance.
    pub c2: f64,
    /// Percent difference below which two states count as one level.
    pub c3: f64,
}

impl Default for SetpParams {
    fn default() -> Self {
        SetpParams {
            window: 4,
            margin: 2,
            c1: 0.15,
            c2: 2e9,
            c3: 10.0,
        }
    }
}

/// Tipping points detected in one output metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetpReport {
    pub metric: String,
    pub candidates: usize,
    pub negative_tipping_years: Vec<i32>,
    pub positive_tipping_years: Vec<i32>,
}

/// Run the full detection pipeline on one metric.
pub fn setp_report(metric: &Metric, params: &SetpParams) -> SetpReport {
    let statistics = create_statistics(metric, params.window);
    let candidates = find_candidates(
        &statistics,
        params.c1,
        params.c2,
        params.c3,
        params.margin,
    );
    SetpReport {
        metric: metric.name.clone(),
        candidates: candidates.len(),
        negative_tipping_years: select(&candidates, -1, &SelectOptions::default()),
        positive_tipping_years: select(&candidates, 1, &SelectOptions::default()),
    }
}

/// Metadata identifying one experiment, for reproducibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentMetadata {
    pub name: String,
    pub city: String,
    pub slr_scenario: String,
    pub surge_height: String,
    pub mayor: String,
    pub mayor_label: String,
    pub implementation_times: (i64, i64),
    pub first_year: i32,
    pub last_year: i32,
    pub timestamp: String,
}

/// Everything written to disk for one experiment.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentOutput {
    pub metadata: ExperimentMetadata,
    pub setp_reports: Vec<SetpReport>,
    #[serde(skip)]
    experiment: Experiment,
}

fn event_tag(event: YearEvent) -> &'static str {
    match event {
        YearEvent::Nothing => "",
        YearEvent::NearMiss => "near_miss",
        YearEvent::Flood => "flood",
    }
}

impl ExperimentOutput {
    /// Bundle an experiment with tipping-point reports over its house-price
    /// metrics.
    pub fn from_experiment(experiment: Experiment, setp: &SetpParams) -> Self {
        let setp_reports = experiment
            .metrics()
            .iter()
            .map(|metric| setp_report(metric, setp))
            .collect();

        let metadata = ExperimentMetadata {
            name: experiment.name.clone(),
            city: experiment.city.name.clone(),
            slr_scenario: experiment.surge.slr_name.clone(),
            surge_height: experiment.surge.surge_name.clone(),
            mayor: experiment.mayor_name.clone(),
            mayor_label: experiment.mayor_label.clone(),
            implementation_times: experiment.implementation_times,
            first_year: experiment.surge.years.first().copied().unwrap_or(0),
            last_year: experiment.surge.years.last().copied().unwrap_or(0),
            timestamp: experiment.time.to_rfc3339(),
        };

        ExperimentOutput {
            metadata,
            setp_reports,
            experiment,
        }
    }

    pub fn experiment(&self) -> &Experiment {
        &self.experiment
    }

    /// Write the per-year state of every area as long-format CSV: one row
    /// per (year, area).
    pub fn write_timeseries_csv<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut writer = csv::Writer::from_path(path)?;

        writer.write_record([
            "year",
            "surge_level",
            "sea_level",
            "area",
            "event",
            "flood_depth",
            "near_miss_margin",
            "flood_damage",
            "risk",
            "risk_household",
            "risk_perceived",
            "risk_household_perceived",
            "protection_return_period",
            "risk_perception",
            "trust",
            "house_price_objective",
            "house_price_subjective",
            "flood_proofing",
            "protection_level",
            "measure_ordered",
        ])?;

        let city = &self.experiment.city;
        let surge = &self.experiment.surge;
        for (t, &year) in surge.years.iter().enumerate() {
            for area in &city.areas {
                let asset = &city.assets[area.params.protected_by];
                writer.write_record(&[
                    year.to_string(),
                    surge.level[t].to_string(),
                    surge.sealevel[t].to_string(),
                    area.params.name.clone(),
                    event_tag(area.event_history[t]).to_string(),
                    area.flood_depth[t].to_string(),
                    area.near_miss_margin[t].to_string(),
                    area.flood_damage[t].to_string(),
                    area.risk[t].to_string(),
                    area.risk_household[t].to_string(),
                    area.risk_perceived[t].to_string(),
                    area.risk_household_perceived[t].to_string(),
                    area.protection_return_period[t].to_string(),
                    area.risk_perception[t].to_string(),
                    area.trust[t].to_string(),
                    area.house_price_objective[t].to_string(),
                    area.house_price_subjective[t].to_string(),
                    area.flood_proofing[t].to_string(),
                    asset.protection_level[t].to_string(),
                    asset.measure_history[t].to_string(),
                ])?;
            }
        }

        writer.flush()?;
        Ok(())
    }

    /// Write metadata and tipping-point reports as pretty-printed JSON.
    pub fn write_summary_json<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Write all outputs into a directory:
    /// - timeseries.csv
    /// - summary.json
    pub fn write_all<P: AsRef<Path>>(&self, dir: P) -> Result<(), Box<dyn std::error::Error>> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        self.write_timeseries_csv(dir.join("timeseries.csv"))?;
        self.write_summary_json(dir.join("summary.json"))?;
        Ok(())
    }
}
