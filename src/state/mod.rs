//! Game state module
//!
//! Holds:
//! - Player positions and the WASD movement rules
//! - The durable per-client player store
//! - The in-memory registry of connected client ids

mod player;
mod registry;
mod store;

pub use player::*;
pub use registry::*;
pub use store::*;
