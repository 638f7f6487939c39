//! Component definitions for the ECS simulation.
//!
//! Components are data attached to agent entities. Every agent has an
//! [`Agent`]; the others are capabilities assembled per agent type and
//! checked by presence.

mod agent;
mod events;
mod exchange;
mod growth;
mod storage;

pub use agent::*;
pub use events::*;
pub use exchange::*;
pub use growth::*;
pub use storage::*;
