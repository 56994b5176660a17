//! Per-frame loop
//!
//! Owns the simulation on its thread. Each frame clamps the clock delta, runs
//! autodrop, drains a bounded batch of feed requests and then steps physics.

use crate::config::PhysicsConfig;
use crate::consts::{MAX_FEED_DROPS_PER_FRAME, MAX_FRAME_DT};
use crate::intake::{AutoDrop, DrainReport, SpawnQueue};
use crate::sim::{BodyId, CapacityExceeded, ColorTag, Simulation};

/// What happened during one frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameReport {
    /// Delta actually simulated after clamping
    pub dt: f32,
    pub autodrop: DrainReport,
    pub feed: DrainReport,
}

pub struct FrameDriver {
    sim: Simulation,
    autodrop: AutoDrop,
    feed: SpawnQueue,
    feed_drops: bool,
}

impl FrameDriver {
    pub fn new(sim: Simulation, autodrop: AutoDrop, feed: SpawnQueue) -> Self {
        Self {
            sim,
            autodrop,
            feed,
            feed_drops: true,
        }
    }

    pub fn sim(&self) -> &Simulation {
        &self.sim
    }

    pub fn autodrop(&self) -> &AutoDrop {
        &self.autodrop
    }

    pub fn autodrop_mut(&mut self) -> &mut AutoDrop {
        &mut self.autodrop
    }

    /// When off, feed requests wait in the queue
    pub fn set_feed_drops(&mut self, enabled: bool) {
        self.feed_drops = enabled;
    }

    pub fn pending_feed(&self) -> usize {
        self.feed.pending()
    }

    /// Manual single drop
    pub fn drop_body(&mut self, color: ColorTag) -> Result<BodyId, CapacityExceeded> {
        self.sim.spawn(color)
    }

    pub fn shake(&mut self) {
        self.sim.shake();
    }

    /// Empty the bowl and forget pending work
    pub fn clear(&mut self) {
        self.sim.clear();
        self.autodrop.reset();
        let discarded = self.feed.discard();
        if discarded > 0 {
            log::info!("Discarded {discarded} pending feed drops");
        }
    }

    /// Swap physics config between frames
    pub fn apply_config(&mut self, config: PhysicsConfig) {
        self.sim.apply_config(config);
    }

    /// Advance one frame of wall-clock time `raw_dt`
    pub fn frame(&mut self, raw_dt: f32) -> FrameReport {
        let dt = raw_dt.clamp(0.0, MAX_FRAME_DT);

        let autodrop = self.autodrop.run(&mut self.sim, dt);
        let feed = if self.feed_drops {
            self.feed.drain_into(&mut self.sim, MAX_FEED_DROPS_PER_FRAME)
        } else {
            DrainReport::default()
        };

        self.sim.step(dt);

        FrameReport { dt, autodrop, feed }
    }
}
