//! Biosphere Core - Closed-Loop Habitat Simulation Engine
//!
//! An ECS-based model of a sealed habitat: crew, plants, machines and
//! storages exchange currencies (gases, water, food, power, light) once per
//! simulated step, and what each agent can take or give depends on what its
//! connected storages hold.
//!
//! # Architecture
//!
//! The simulation uses an Entity Component System (ECS) architecture via `hecs`:
//! - **Entities**: one per configured agent (or per member when agents are
//!   not aggregated)
//! - **Components**: capabilities assembled per agent type ([`Storage`],
//!   [`Exchange`], [`Growth`], [`Plant`], [`Events`], [`Custom`])
//! - **Systems**: the per-agent step, run in scheduler order
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Serde configuration model and aggregated validation |
//! | [`currency`] | Currency and class registry |
//! | [`components`] | Agent components |
//! | [`systems`] | Lifecycle, thresholds, custom functions, events, plant response, exchange |
//! | [`scheduler`] | Priority-class activation order |
//! | [`engine`] | [`Model`]: construction, stepping, queries |
//! | [`report`] | Step-level reporting feed |
//! | [`persistence`] | Versioned bincode/JSON snapshots |
//!
//! [`Storage`]: components::Storage
//! [`Exchange`]: components::Exchange
//! [`Growth`]: components::Growth
//! [`Plant`]: components::Plant
//! [`Events`]: components::Events
//! [`Custom`]: components::Custom
//!
//! # Example
//!
//! ```rust,no_run
//! use biosphere_core::prelude::*;
//!
//! let text = std::fs::read_to_string("habitat.json").unwrap();
//! let config = SimulationConfig::from_json(&text).unwrap();
//! let mut model = Model::new(&config).unwrap();
//!
//! // Run until a termination rule fires
//! while model.step() {
//!     let report = model.report();
//!     println!("step {}: {:?}", report.step_num, report.agent_counts);
//! }
//! ```

pub mod clock;
pub mod components;
pub mod config;
pub mod currency;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod report;
pub mod scheduler;
mod spawn;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::config::{Direction, SimulationConfig};
    pub use crate::engine::Model;
    pub use crate::error::{BuildError, ConfigError, InitError, SnapshotError};
    pub use crate::report::StepReport;
}
