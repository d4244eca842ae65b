//! Socio-economic tipping point (SETP) detection on simulation output
//! metrics.
//!
//! A tipping point is an abrupt, persistent regime shift in a metric (here:
//! house prices). Detection runs three criteria over a metric time series:
//!
//! 1. **Rapid change**: a first difference of at least `c1` times the t=0
//!    value marks a candidate year;
//! 2. **State stability**: years whose rolling-window variance stays below
//!    `c2` form stable states, and a genuine shift needs a stable state
//!    shortly before and after the candidate;
//! 3. **Substantial difference**: the mean levels of those two states must
//!    differ by more than `c3` percent.
//!
//! Candidates that describe the same state-to-state transition are collapsed
//! into one representative plus duplicates.

use crate::helpers::nan_mean;

/// A named output time series, read-only once constructed.
///
/// Values below zero are clamped to zero on construction (house prices
/// cannot be negative in this model); unset values stay NaN and are skipped
/// by all statistics.
#[derive(Debug, Clone)]
pub struct Metric {
    pub name: String,
    pub years: Vec<i32>,
    pub values: Vec<f64>,
}

impl Metric {
    pub fn new(name: impl Into<String>, years: Vec<i32>, data: &[f64]) -> Self {
        debug_assert_eq!(years.len(), data.len());
        let values = data
            .iter()
            .map(|&v| if v < 0.0 { 0.0 } else { v })
            .collect();
        Metric {
            name: name.into(),
            years,
            values,
        }
    }
}

/// Per-year statistics of a metric, produced by [`create_statistics`].
///
/// Rolling statistics are right-aligned: the entry at year t describes the
/// window ending at t, and is NaN until the window is full (or whenever the
/// window contains an unset value).
#[derive(Debug, Clone)]
pub struct Statistics {
    pub years: Vec<i32>,
    pub values: Vec<f64>,
    pub first_derivative: Vec<f64>,
    pub second_derivative: Vec<f64>,
    pub window_mean: Vec<f64>,
    pub window_variance: Vec<f64>,
    pub window: usize,
}

/// Compute derivatives and rolling statistics of a metric over a window of
/// `window` years.
pub fn create_statistics(metric: &Metric, window: usize) -> Statistics {
    let values = metric.values.clone();
    let n = values.len();

    let mut first_derivative = vec![f64::NAN; n];
    for t in 1..n {
        first_derivative[t] = values[t] - values[t - 1];
    }

    let mut second_derivative = vec![f64::NAN; n];
    for t in 1..n {
        second_derivative[t] = first_derivative[t] - first_derivative[t - 1];
    }

    let mut window_mean = vec![f64::NAN; n];
    let mut window_variance = vec![f64::NAN; n];
    for t in 0..n {
        if t + 1 < window {
            continue;
        }
        let slice = &values[t + 1 - window..=t];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        let mean = slice.iter().sum::<f64>() / window as f64;
        window_mean[t] = mean;
        if window >= 2 {
            // Sample variance (ddof = 1), matching the rolling statistic the
            // thresholds were tuned against.
            let ss: f64 = slice.iter().map(|v| (v - mean).powi(2)).sum();
            window_variance[t] = ss / (window - 1) as f64;
        }
    }

    Statistics {
        years: metric.years.clone(),
        values,
        first_derivative,
        second_derivative,
        window_mean,
        window_variance,
        window,
    }
}

/// Classification of a tipping-point candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetpType {
    #[default]
    Unclassified,
    /// Stable before and after the rapid change: a genuine regime shift.
    Real,
    /// The states before and after are the same state: no shift.
    SameWindow,
    /// Only stable before the rapid change.
    OnlyStableBefore,
    /// Only stable after the rapid change.
    OnlyStableAfter,
    /// Stable neither before nor after.
    NotStable,
    /// The states differ by no more than c3 percent.
    Unsubstantial,
    /// The before-state mean is zero, so no percent difference exists.
    ZeroDivision,
}

/// Role of a candidate among candidates describing the same transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DupRole {
    #[default]
    None,
    /// Earliest of a group of duplicates; `dups_with` lists the others.
    FirstOfDuplicates,
    /// Later repetition of an already-seen transition.
    Duplicate,
}

/// A socio-economic tipping point candidate.
#[derive(Debug, Clone)]
pub struct Setp {
    pub year: i32,
    /// Direction of the rapid change: +1 or -1.
    pub sign: i8,
    pub setp_type: SetpType,
    pub dup_role: DupRole,
    /// Years of this candidate's later duplicates (first-of-duplicates only).
    pub dups_with: Vec<i32>,
    /// Index of the stable state ending shortly before the candidate.
    pub before: Option<usize>,
    /// Index of the stable state starting shortly after the candidate.
    pub after: Option<usize>,
}

impl Setp {
    fn new(year: i32, sign: i8) -> Self {
        Setp {
            year,
            sign,
            setp_type: SetpType::Unclassified,
            dup_role: DupRole::None,
            dups_with: Vec::new(),
            before: None,
            after: None,
        }
    }
}

/// A contiguous year interval over which the rolling variance stayed below
/// the stability threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StableState {
    pub start: i32,
    pub end: i32,
}

/// Segment the metric into stable states: maximal runs of years whose
/// rolling variance is below `c2`.
///
/// The rolling statistic is right-aligned, so a run's start is corrected
/// backward by `window − 1` years to the first year actually inside the
/// window. A run still open at the last year of the series is not closed
/// out.
pub fn find_stable_states(stats: &Statistics, c2: f64) -> Vec<StableState> {
    let mut states = Vec::new();
    let mut start: Option<i32> = None;
    let mut end = 0;

    for (idx, &variance) in stats.window_variance.iter().enumerate() {
        let year = stats.years[idx];
        if variance < c2 {
            if start.is_none() {
                start = Some(year);
            }
            end = year;
        } else if let Some(run_start) = start.take() {
            states.push(StableState {
                start: run_start - (stats.window as i32 - 1),
                end,
            });
        }
    }
    states
}

/// Stable states within `margin` years before and after a candidate year.
fn states_around(year: i32, states: &[StableState], margin: i32) -> (Option<usize>, Option<usize>) {
    let mut before = None;
    let mut after = None;
    for (idx, state) in states.iter().enumerate() {
        if state.start <= year - margin && year - margin <= state.end {
            before = Some(idx);
        }
        if state.start <= year + margin && year + margin <= state.end {
            after = Some(idx);
        }
    }
    (before, after)
}

/// Mean metric value over a state's year interval, clipped to the series.
fn state_mean(stats: &Statistics, state: &StableState) -> f64 {
    let first_year = stats.years[0];
    let n = stats.values.len() as i32;
    let lo = (state.start - first_year).clamp(0, n - 1) as usize;
    let hi = (state.end - first_year).clamp(0, n - 1) as usize;
    nan_mean(&stats.values[lo..=hi])
}

/// Tag candidates that describe the identical (before, after) state pair:
/// the earliest becomes the group's representative and records the years of
/// the others.
pub fn identify_duplicates(candidates: &mut [Setp]) {
    for i in 0..candidates.len() {
        for j in i + 1..candidates.len() {
            let same_transition = candidates[i].before == candidates[j].before
                && candidates[i].after == candidates[j].after;
            if !same_transition {
                continue;
            }
            if candidates[i].dup_role != DupRole::Duplicate {
                candidates[i].dup_role = DupRole::FirstOfDuplicates;
                let dup_year = candidates[j].year;
                if !candidates[i].dups_with.contains(&dup_year) {
                    candidates[i].dups_with.push(dup_year);
                }
            }
            candidates[j].dup_role = DupRole::Duplicate;
        }
    }
}

/// Scan a metric's statistics for tipping-point candidates and classify
/// them.
///
/// `c1` is the rapid-change threshold as a fraction of the t=0 value, `c2`
/// the stability threshold on the rolling variance, `c3` the percent
/// difference below which two states count as the same level, and `margin`
/// how many years around a candidate to look for stable states.
pub fn find_candidates(stats: &Statistics, c1: f64, c2: f64, c3: f64, margin: usize) -> Vec<Setp> {
    if stats.values.is_empty() {
        return Vec::new();
    }
    let threshold = c1 * stats.values[0];

    // Criterion 1: rapid change.
    let mut candidates = Vec::new();
    for (idx, &derivative) in stats.first_derivative.iter().enumerate() {
        if derivative <= -threshold {
            candidates.push(Setp::new(stats.years[idx], -1));
        } else if derivative >= threshold {
            candidates.push(Setp::new(stats.years[idx], 1));
        }
    }

    // Criterion 2: stable states around each candidate.
    let states = find_stable_states(stats, c2);
    for cand in &mut candidates {
        let (before, after) = states_around(cand.year, &states, margin as i32);
        cand.before = before;
        cand.after = after;
    }

    identify_duplicates(&mut candidates);

    // An identical state on both sides (including none on both sides) means
    // the rapid change did not move the system anywhere.
    for cand in &mut candidates {
        if cand.before == cand.after {
            cand.setp_type = SetpType::SameWindow;
        }
    }

    for cand in &mut candidates {
        if cand.setp_type == SetpType::SameWindow {
            continue;
        }
        cand.setp_type = match (cand.before, cand.after) {
            (Some(_), Some(_)) => SetpType::Real,
            (Some(_), None) => SetpType::OnlyStableBefore,
            (None, Some(_)) => SetpType::OnlyStableAfter,
            (None, None) => SetpType::NotStable,
        };
    }

    // Criterion 3: the two states must differ substantially, comparing state
    // means.
    for cand in &mut candidates {
        if cand.setp_type != SetpType::Real {
            continue;
        }
        let before_mean = state_mean(stats, &states[cand.before.expect("real implies before")]);
        let after_mean = state_mean(stats, &states[cand.after.expect("real implies after")]);
        if before_mean == 0.0 {
            cand.setp_type = SetpType::ZeroDivision;
        } else {
            let percent_difference = 100.0 * ((after_mean - before_mean) / before_mean).abs();
            if percent_difference <= c3 {
                cand.setp_type = SetpType::Unsubstantial;
            }
        }
    }

    candidates
}

/// Which borderline candidate classes [`select`] should include besides the
/// real, non-duplicate ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectOptions {
    pub include_stable_before: bool,
    pub include_stable_after: bool,
    pub include_unsubstantial: bool,
}

/// Select the tipping years of the requested sign from classified
/// candidates.
///
/// Always includes non-duplicate `Real` candidates; the options add the
/// only-stable-before / only-stable-after / unsubstantial classes. A
/// positive first-of-duplicates candidate additionally surfaces its first
/// `Real` duplicate of the requested sign: the only way a regime shift
/// recorded under an opposite-signed duplicate stays recoverable.
pub fn select(candidates: &[Setp], sign: i8, options: &SelectOptions) -> Vec<i32> {
    let matching = |setp_type: SetpType| {
        candidates
            .iter()
            .filter(move |c| c.sign == sign && c.setp_type == setp_type)
    };

    let mut years: Vec<i32> = matching(SetpType::Real)
        .filter(|c| c.dup_role != DupRole::Duplicate)
        .map(|c| c.year)
        .collect();

    if options.include_stable_before {
        years.extend(matching(SetpType::OnlyStableBefore).map(|c| c.year));
    }
    if options.include_stable_after {
        years.extend(matching(SetpType::OnlyStableAfter).map(|c| c.year));
    }
    if options.include_unsubstantial {
        years.extend(matching(SetpType::Unsubstantial).map(|c| c.year));
    }

    for first in candidates
        .iter()
        .filter(|c| c.sign == 1 && c.dup_role == DupRole::FirstOfDuplicates)
    {
        for dup_year in &first.dups_with {
            let duplicate = candidates.iter().find(|c| c.year == *dup_year);
            if let Some(duplicate) = duplicate {
                if duplicate.sign == sign && duplicate.setp_type == SetpType::Real {
                    years.push(duplicate.year);
                    break;
                }
            }
        }
    }

    years
}
