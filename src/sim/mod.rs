//! Deterministic simulation module
//!
//! All physics lives here. This module must stay pure and deterministic:
//! - Fixed substeps per frame
//! - Seeded RNG only
//! - Stable iteration order (by body ID)
//! - No rendering, threading or platform dependencies

pub mod body;
pub mod bowl;
pub mod capacity;
pub mod contact;
pub mod immersion;
pub mod state;
pub mod step;

pub use body::{Body, BodyId, BodySnapshot, ColorTag};
pub use bowl::{BowlGeometry, reflect_velocity};
pub use capacity::{CapacityTracker, FillLevel};
pub use contact::{ContactOutcome, resolve_pair};
pub use immersion::{Immersion, Transition};
pub use state::{CapacityExceeded, Simulation, Summary};
