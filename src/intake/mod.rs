//! Spawn triggers
//!
//! Three producers turn outside events into `Simulation::spawn` calls:
//! - manual drops, called inline on the simulation thread
//! - `autodrop`: a rate accumulator, also inline
//! - `feed`: a background worker whose requests cross threads through `queue`

pub mod autodrop;
pub mod feed;
pub mod queue;

pub use autodrop::{AutoDrop, DropColor};
pub use feed::{
    DeltaTracker, Detection, DetectionSource, DetectorStatus, FeedError, FeedPoller, FeedSnapshot, FeedStatus,
    FeedWorker, JsonFileSource, ScriptedSource, severity_color,
};
pub use queue::{DrainReport, SpawnQueue, SpawnSender, spawn_queue};
