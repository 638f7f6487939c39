//! Pure numeric logic for Biosphere.
//!
//! This crate holds everything in the habitat simulation that does not need a
//! world, a scheduler, or agent state: curve generation, random variation,
//! unit handling and the plant physiology response functions. Functions take
//! plain data (plus an explicit random stream where noise is involved) and
//! return results, so they can be tested in isolation and shared by the
//! engine and any offline tooling.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`growth`] | Step-value curves (linear, log, sigmoid, bell, clipped, switch) and daily composition |
//! | [`optimize`] | Bounded Nelder-Mead and bisection used to infer missing curve parameters |
//! | [`variation`] | Multiplicative noise factors (normal, exponential, uniform) |
//! | [`units`] | Unit-tagged scalars and the conversion table used for storage ratios |
//! | [`time`] | Time units and per-step rate conversion |
//! | [`location`] | Simulated location and its day length |
//! | [`photosynthesis`] | Photoperiod light envelope and CO2 response of C3/C4 plants |

pub mod growth;
pub mod location;
pub mod optimize;
pub mod photosynthesis;
pub mod time;
pub mod units;
pub mod variation;

pub use growth::{get_growth_values, CurveCache, CurveError, CurveSpec, GrowthType};
pub use location::Location;
pub use time::TimeUnit;
pub use units::{Dimension, Unit};
pub use variation::{Distribution, VariationSpec};
