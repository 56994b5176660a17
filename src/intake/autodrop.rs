//! Rate-based automatic spawning
//!
//! Accumulates `rate * dt` each frame and spawns the whole part, carrying the
//! fraction over. A frame never spawns more than `MAX_AUTODROP_PER_FRAME`.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::queue::DrainReport;
use crate::consts::MAX_AUTODROP_PER_FRAME;
use crate::sim::{ColorTag, Simulation};

/// How autodrop picks colors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropColor {
    Random,
    Fixed(ColorTag),
}

#[derive(Debug, Clone)]
pub struct AutoDrop {
    enabled: bool,
    /// Bodies per second
    rate: f32,
    color: DropColor,
    accum: f32,
    rng: Pcg32,
}

impl AutoDrop {
    pub fn new(rate: f32, color: DropColor, seed: u64) -> Self {
        Self {
            enabled: false,
            rate: rate.max(0.0),
            color,
            accum: 0.0,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Disabling drops any fractional progress
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.accum = 0.0;
        }
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn set_rate(&mut self, rate: f32) {
        self.rate = rate.max(0.0);
    }

    pub fn set_color(&mut self, color: DropColor) {
        self.color = color;
    }

    pub fn reset(&mut self) {
        self.accum = 0.0;
    }

    /// Number of bodies due this frame
    pub fn advance(&mut self, dt: f32) -> u32 {
        if !self.enabled {
            self.accum = 0.0;
            return 0;
        }
        if self.rate <= 0.0 || dt <= 0.0 {
            return 0;
        }

        self.accum += dt * self.rate;
        let due = self.accum.floor();
        if due < 1.0 {
            return 0;
        }
        self.accum -= due;
        (due as u32).min(MAX_AUTODROP_PER_FRAME)
    }

    pub fn next_color(&mut self) -> ColorTag {
        match self.color {
            DropColor::Fixed(color) => color,
            DropColor::Random => ColorTag::ALL[self.rng.random_range(0..ColorTag::ALL.len())],
        }
    }

    /// Advance and spawn directly into the simulation
    pub fn run(&mut self, sim: &mut Simulation, dt: f32) -> DrainReport {
        let mut report = DrainReport::default();
        for _ in 0..self.advance(dt) {
            let color = self.next_color();
            match sim.spawn(color) {
                Ok(_) => report.spawned += 1,
                Err(_) => report.rejected += 1,
            }
        }
        report
    }
}
