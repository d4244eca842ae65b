//! Forcing scenarios: sea-level-rise trajectories, storm-surge-height
//! realisations, and their combination into the annual surge-level series
//! that drives the simulation engine.
//!
//! A `SurgeLevel` is the pointwise sum of one `SlrScenario` and one
//! `SurgeHeight`, restricted to the year range both series cover. Surge
//! heights are either loaded from CSV or drawn year-by-year from a
//! Gumbel(mu, beta) extreme-value distribution.

use rand::Rng;
use rand_distr::{Distribution, Gumbel};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// The two input series share no years, so no surge level can be formed.
#[derive(Debug, Clone, Error)]
#[error("no overlapping years between sea-level series '{slr}' and surge-height series '{surge}'")]
pub struct DataGapError {
    pub slr: String,
    pub surge: String,
}

/// Failure while loading or generating a scenario series.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("bad value in row {row}: {message}")]
    BadRow { row: usize, message: String },

    #[error("invalid Gumbel parameters (mu={mu}, beta={beta})")]
    InvalidDistribution { mu: f64, beta: f64 },
}

/// Read a two-column, headerless (year, level) CSV into parallel vectors.
fn read_series<R: io::Read>(reader: R) -> Result<(Vec<i32>, Vec<f64>), ScenarioError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut years = Vec::new();
    let mut values = Vec::new();
    for (row, record) in csv_reader.records().enumerate() {
        let record = record?;
        if record.len() < 2 {
            return Err(ScenarioError::BadRow {
                row,
                message: "expected two columns (year, level)".to_string(),
            });
        }
        let year: i32 = record[0].parse().map_err(|e| ScenarioError::BadRow {
            row,
            message: format!("year: {}", e),
        })?;
        // Years read as floats ("2020.0") are tolerated by upstream tooling;
        // we only accept integers, matching the written format.
        let value: f64 = record[1].parse().map_err(|e| ScenarioError::BadRow {
            row,
            message: format!("level: {}", e),
        })?;
        years.push(year);
        values.push(value);
    }
    Ok((years, values))
}

/// A sea-level-rise trajectory: sea level [m] per year.
#[derive(Debug, Clone)]
pub struct SlrScenario {
    pub name: String,
    pub years: Vec<i32>,
    pub sealevel: Vec<f64>,
}

impl SlrScenario {
    pub fn new(name: impl Into<String>, years: Vec<i32>, sealevel: Vec<f64>) -> Self {
        SlrScenario {
            name: name.into(),
            years,
            sealevel,
        }
    }

    /// Load from a two-column (year, sea level) CSV without header.
    pub fn from_csv<P: AsRef<Path>>(name: impl Into<String>, path: P) -> Result<Self, ScenarioError> {
        let file = fs::File::open(path)?;
        let (years, sealevel) = read_series(file)?;
        Ok(SlrScenario::new(name, years, sealevel))
    }
}

/// A storm-surge-height realisation: one extreme surge height [m] per year,
/// independent of the sea level.
#[derive(Debug, Clone)]
pub struct SurgeHeight {
    pub name: String,
    pub years: Vec<i32>,
    pub height: Vec<f64>,
}

impl SurgeHeight {
    pub fn new(name: impl Into<String>, years: Vec<i32>, height: Vec<f64>) -> Self {
        SurgeHeight {
            name: name.into(),
            years,
            height,
        }
    }

    /// Load from a two-column (year, surge height) CSV without header.
    pub fn from_csv<P: AsRef<Path>>(name: impl Into<String>, path: P) -> Result<Self, ScenarioError> {
        let file = fs::File::open(path)?;
        let (years, height) = read_series(file)?;
        Ok(SurgeHeight::new(name, years, height))
    }

    /// Draw one annual extreme per year from a Gumbel(mu, beta) distribution
    /// over the inclusive year range `[startyear, endyear]`.
    ///
    /// Reproducible for a given seeded `rng`.
    pub fn from_gumbel<R: Rng>(
        name: impl Into<String>,
        startyear: i32,
        endyear: i32,
        mu: f64,
        beta: f64,
        rng: &mut R,
    ) -> Result<Self, ScenarioError> {
        let gumbel =
            Gumbel::new(mu, beta).map_err(|_| ScenarioError::InvalidDistribution { mu, beta })?;
        let years: Vec<i32> = (startyear..=endyear).collect();
        let height: Vec<f64> = years.iter().map(|_| gumbel.sample(rng)).collect();
        Ok(SurgeHeight::new(name, years, height))
    }

    /// Persist the realisation in the same two-column CSV format the loaders
    /// accept.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), ScenarioError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)?;
        for (year, height) in self.years.iter().zip(&self.height) {
            writer.write_record(&[year.to_string(), height.to_string()])?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// The annual storm-surge level [m]: sea level plus surge height per year.
///
/// Keeps the sea-level component alongside the sum: the engine shifts the
/// surge climatology by the year's sea level when building exceedance curves.
#[derive(Debug, Clone)]
pub struct SurgeLevel {
    pub name: String,
    pub slr_name: String,
    pub surge_name: String,
    pub years: Vec<i32>,
    pub level: Vec<f64>,
    pub sealevel: Vec<f64>,
}

impl SurgeLevel {
    /// Number of simulated years.
    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }
}

/// Combine a sea-level-rise scenario and a surge-height realisation into a
/// surge-level series over the years both series cover.
///
/// The overlap is `max(first years) ..= min(last years)`; both inputs are
/// ascending, contiguous year series. An empty overlap is a `DataGapError`.
pub fn combine(slr: &SlrScenario, surge: &SurgeHeight) -> Result<SurgeLevel, DataGapError> {
    let gap = || DataGapError {
        slr: slr.name.clone(),
        surge: surge.name.clone(),
    };

    let (&slr_first, &slr_last) = match (slr.years.first(), slr.years.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(gap()),
    };
    let (&surge_first, &surge_last) = match (surge.years.first(), surge.years.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(gap()),
    };

    let start = slr_first.max(surge_first);
    let end = slr_last.min(surge_last);
    if start > end {
        return Err(gap());
    }

    let n = (end - start + 1) as usize;
    let slr_offset = (start - slr_first) as usize;
    let surge_offset = (start - surge_first) as usize;

    let years: Vec<i32> = (start..=end).collect();
    let sealevel: Vec<f64> = slr.sealevel[slr_offset..slr_offset + n].to_vec();
    let level: Vec<f64> = sealevel
        .iter()
        .zip(&surge.height[surge_offset..surge_offset + n])
        .map(|(sl, sh)| sl + sh)
        .collect();

    Ok(SurgeLevel {
        name: format!("{}__{}", slr.name, surge.name),
        slr_name: slr.name.clone(),
        surge_name: surge.name.clone(),
        years,
        level,
        sealevel,
    })
}

/// Owned container for loaded scenario objects.
///
/// Replaces process-wide registries: each session constructs one catalog,
/// loads series into it, and passes it to whatever needs scenario lookup.
#[derive(Debug, Default)]
pub struct ScenarioCatalog {
    pub slr_scenarios: Vec<SlrScenario>,
    pub surge_heights: Vec<SurgeHeight>,
    pub surge_levels: Vec<SurgeLevel>,
}

impl ScenarioCatalog {
    pub fn new() -> Self {
        ScenarioCatalog::default()
    }

    /// Load every `.csv` in a directory as a sea-level-rise scenario, named
    /// after its file stem.
    pub fn load_slr_dir<P: AsRef<Path>>(&mut self, dir: P) -> Result<usize, ScenarioError> {
        let mut loaded = 0;
        for path in csv_files(dir.as_ref())? {
            let name = file_stem(&path);
            self.slr_scenarios.push(SlrScenario::from_csv(name, &path)?);
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Load every `.csv` in a directory as a surge-height realisation, named
    /// after its file stem.
    pub fn load_surge_height_dir<P: AsRef<Path>>(&mut self, dir: P) -> Result<usize, ScenarioError> {
        let mut loaded = 0;
        for path in csv_files(dir.as_ref())? {
            let name = file_stem(&path);
            self.surge_heights.push(SurgeHeight::from_csv(name, &path)?);
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Combine every loaded SLR scenario with every loaded surge height.
    pub fn combine_all(&mut self) -> Result<(), DataGapError> {
        self.surge_levels.clear();
        for slr in &self.slr_scenarios {
            for surge in &self.surge_heights {
                self.surge_levels.push(combine(slr, surge)?);
            }
        }
        Ok(())
    }

    /// Surge levels filtered by the names of their source series; `None`
    /// leaves that dimension unfiltered.
    pub fn surge_levels_matching(
        &self,
        slr_name: Option<&str>,
        surge_name: Option<&str>,
    ) -> Vec<&SurgeLevel> {
        self.surge_levels
            .iter()
            .filter(|sl| slr_name.map_or(true, |name| sl.slr_name == name))
            .filter(|sl| surge_name.map_or(true, |name| sl.surge_name == name))
            .collect()
    }
}

fn csv_files(dir: &Path) -> Result<Vec<std::path::PathBuf>, ScenarioError> {
    let mut paths: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().map_or(false, |ext| ext == "csv"))
        .collect();
    paths.sort();
    Ok(paths)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn flat_slr(name: &str, start: i32, end: i32, level: f64) -> SlrScenario {
        let years: Vec<i32> = (start..=end).collect();
        let sealevel = vec![level; years.len()];
        SlrScenario::new(name, years, sealevel)
    }

    #[test]
    fn test_combine_sums_over_overlap() {
        let slr = SlrScenario::new("slr", vec![2020, 2021, 2022, 2023], vec![0.0, 0.1, 0.2, 0.3]);
        let surge = SurgeHeight::new("surge", vec![2021, 2022, 2023, 2024], vec![2.0, 3.0, 4.0, 5.0]);

        let combined = combine(&slr, &surge).unwrap();

        assert_eq!(combined.years, vec![2021, 2022, 2023]);
        assert_eq!(combined.level, vec![2.1, 3.2, 4.3]);
        assert_eq!(combined.sealevel, vec![0.1, 0.2, 0.3]);
        assert_eq!(combined.name, "slr__surge");
    }

    #[test]
    fn test_combine_identical_ranges() {
        let slr = flat_slr("flat", 2020, 2029, 0.0);
        let surge = SurgeHeight::new("s", (2020..=2029).collect(), vec![4.0; 10]);

        let combined = combine(&slr, &surge).unwrap();

        assert_eq!(combined.len(), 10);
        assert!(combined.level.iter().all(|&l| l == 4.0));
    }

    #[test]
    fn test_combine_empty_overlap_is_data_gap() {
        let slr = flat_slr("early", 2000, 2010, 0.0);
        let surge = SurgeHeight::new("late", (2050..=2060).collect(), vec![1.0; 11]);

        let err = combine(&slr, &surge).unwrap_err();
        assert!(err.to_string().contains("early"));
        assert!(err.to_string().contains("late"));
    }

    #[test]
    fn test_combine_empty_series_is_data_gap() {
        let slr = SlrScenario::new("empty", vec![], vec![]);
        let surge = SurgeHeight::new("s", vec![2020], vec![1.0]);

        assert!(combine(&slr, &surge).is_err());
    }

    #[test]
    fn test_from_gumbel_covers_inclusive_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let surge = SurgeHeight::from_gumbel("g", 2020, 2119, 2.33, 0.234, &mut rng).unwrap();

        assert_eq!(surge.years.len(), 100);
        assert_eq!(surge.years[0], 2020);
        assert_eq!(*surge.years.last().unwrap(), 2119);
    }

    #[test]
    fn test_from_gumbel_is_reproducible() {
        let mut rng1 = StdRng::seed_from_u64(42);
        let mut rng2 = StdRng::seed_from_u64(42);

        let a = SurgeHeight::from_gumbel("a", 2020, 2120, 2.33, 0.234, &mut rng1).unwrap();
        let b = SurgeHeight::from_gumbel("b", 2020, 2120, 2.33, 0.234, &mut rng2).unwrap();

        assert_eq!(a.height, b.height);
    }

    #[test]
    fn test_from_gumbel_rejects_bad_beta() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(SurgeHeight::from_gumbel("bad", 2020, 2021, 2.33, -1.0, &mut rng).is_err());
    }

    #[test]
    fn test_read_series_parses_two_columns() {
        let data = "2020,0.05\n2021,0.06\n2022,0.07\n";
        let (years, values) = read_series(data.as_bytes()).unwrap();

        assert_eq!(years, vec![2020, 2021, 2022]);
        assert_eq!(values, vec![0.05, 0.06, 0.07]);
    }

    #[test]
    fn test_read_series_rejects_malformed_rows() {
        let data = "2020,not_a_number\n";
        assert!(read_series(data.as_bytes()).is_err());
    }

    #[test]
    fn test_catalog_combines_and_filters() {
        let mut catalog = ScenarioCatalog::new();
        catalog.slr_scenarios.push(flat_slr("slr_a", 2020, 2030, 0.0));
        catalog.slr_scenarios.push(flat_slr("slr_b", 2020, 2030, 0.5));
        catalog
            .surge_heights
            .push(SurgeHeight::new("h1", (2020..=2030).collect(), vec![2.0; 11]));

        catalog.combine_all().unwrap();

        assert_eq!(catalog.surge_levels.len(), 2);
        assert_eq!(catalog.surge_levels_matching(Some("slr_b"), None).len(), 1);
        assert_eq!(catalog.surge_levels_matching(None, Some("h1")).len(), 2);
        assert!(catalog
            .surge_levels_matching(Some("missing"), None)
            .is_empty());
    }
}
