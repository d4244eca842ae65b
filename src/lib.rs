//! Coastal flood-risk ABM with socio-economic tipping point detection
//!
//! This crate simulates a coastal city under sea-level rise and storm surge
//! on an annual timestep: flood protection overtops or holds, households
//! update a subjective risk perception from what they experienced, house
//! prices capitalize (objective and perceived) flood risk, and a pluggable
//! management strategy (the "mayor") orders dike heightenings with
//! multi-year lead times.
//!
//! Key pieces:
//! - [`scenario`]: sea-level-rise and storm-surge forcing series
//! - [`engine`]: the per-year simulation loop producing an [`engine::Experiment`]
//! - [`mayor`]: the strategy contract and the bundled strategies
//! - [`tipping`]: offline detection of abrupt, persistent regime shifts
//!   (tipping points) in house-price trajectories
//!
//! Expected outcomes, per the reference configuration:
//! - gradual house-price erosion as sea level rise eats protection standards
//! - discrete price drops (tipping points) when floods hit risk perception
//! - protection upgrades restoring prices after their lead time

pub mod city;
pub mod damage;
pub mod engine;
pub mod helpers;
pub mod mayor;
pub mod measures;
pub mod models;
pub mod output;
pub mod perception;
pub mod risk;
pub mod scenario;
pub mod tipping;

pub use city::City;
pub use engine::{run, Experiment};
pub use mayor::Mayor;
pub use scenario::{combine, ScenarioCatalog, SlrScenario, SurgeHeight, SurgeLevel};
