//! Simulation state and lifecycle operations
//!
//! The `Simulation` owns every body and the bowl. Nothing outside this module
//! mutates body state; renderers read `BodySnapshot`s.

use std::collections::BTreeMap;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::body::{Body, BodyId, BodySnapshot, ColorTag};
use super::bowl::BowlGeometry;
use super::capacity::{CapacityTracker, FillLevel};
use super::immersion::Immersion;
use crate::config::PhysicsConfig;
use crate::consts::*;
use crate::uniform;

/// A spawn request was rejected because the bowl is full
///
/// Not a fault: callers surface the message and carry on.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum CapacityExceeded {
    #[error("Hard stop: bowl is overfilled ({:.1}%). Clear some bodies.", .fill_ratio * 100.0)]
    HardStop { fill_ratio: f32 },
    #[error("Too many bodies for stability ({count}). Clear some bodies.")]
    BodyLimit { count: usize, fill_ratio: f32 },
}

/// Observability summary (never feeds back into physics)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_bodies: usize,
    pub asleep: usize,
    pub underwater: usize,
    pub fill_percent: f32,
    pub fill_level: FillLevel,
    pub counts: BTreeMap<ColorTag, u32>,
}

/// The whole physics world
#[derive(Debug, Clone)]
pub struct Simulation {
    pub(super) config: PhysicsConfig,
    pub(super) bowl: BowlGeometry,
    pub(super) immersion: Immersion,
    pub(super) capacity: CapacityTracker,
    /// Insertion order == id order
    pub(super) bodies: Vec<Body>,
    pub(super) counts: BTreeMap<ColorTag, u32>,
    /// Simulated seconds
    pub(super) time: f64,
    pub(super) frame: u64,
    pub(super) rng: Pcg32,
    seed: u64,
    next_id: BodyId,
}

impl Simulation {
    /// Build a simulation from an already validated config
    pub fn new(config: PhysicsConfig, seed: u64) -> Self {
        let bowl = BowlGeometry::new(config.bowl, config.bowl_restitution);
        let immersion = Immersion::new(&config);
        let capacity = CapacityTracker::new(bowl.bowl_area(), config.overflow_at, config.hard_stop_at);
        log::info!(
            "Bowl ready: area={:.0}, opening=[{:.1}, {:.1}], waterline={:?}",
            bowl.bowl_area(),
            bowl.rim_left(),
            bowl.rim_right(),
            immersion.waterline_y()
        );
        Self {
            config,
            bowl,
            immersion,
            capacity,
            bodies: Vec::new(),
            counts: BTreeMap::new(),
            time: 0.0,
            frame: 0,
            rng: Pcg32::seed_from_u64(seed),
            seed,
            next_id: 1,
        }
    }

    pub fn with_defaults(seed: u64) -> Self {
        Self::new(PhysicsConfig::default(), seed)
    }

    /// Re-apply a config between frames; bodies are kept
    pub fn apply_config(&mut self, config: PhysicsConfig) {
        self.bowl = BowlGeometry::new(config.bowl, config.bowl_restitution);
        self.immersion = Immersion::new(&config);
        self.capacity = CapacityTracker::new(self.bowl.bowl_area(), config.overflow_at, config.hard_stop_at);
        self.capacity.recompute(self.bodies.iter().map(Body::radius));
        self.config = config;
        log::info!("Physics config re-applied ({} bodies kept)", self.bodies.len());
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn bowl(&self) -> &BowlGeometry {
        &self.bowl
    }

    pub fn waterline_y(&self) -> Option<f32> {
        self.immersion.waterline_y()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Simulated seconds since construction
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies
            .binary_search_by_key(&id, |b| b.id)
            .ok()
            .map(|i| &self.bodies[i])
    }

    pub fn snapshots(&self) -> impl Iterator<Item = BodySnapshot> + '_ {
        self.bodies.iter().map(Body::snapshot)
    }

    pub fn fill_ratio(&self) -> f32 {
        self.capacity.fill_ratio()
    }

    pub fn fill_level(&self) -> FillLevel {
        self.capacity.level()
    }

    /// Bodies spawned per color since the last clear
    pub fn counts(&self) -> &BTreeMap<ColorTag, u32> {
        &self.counts
    }

    pub fn summary(&self) -> Summary {
        Summary {
            total_bodies: self.bodies.len(),
            asleep: self.bodies.iter().filter(|b| b.asleep).count(),
            underwater: self.bodies.iter().filter(|b| b.underwater).count(),
            fill_percent: self.fill_ratio() * 100.0,
            fill_level: self.fill_level(),
            counts: self.counts.clone(),
        }
    }

    /// Reject spawns once the bowl is past the hard stop, or at the body cap while overflowing
    pub fn check_capacity(&self) -> Result<(), CapacityExceeded> {
        let fill_ratio = self.capacity.fill_ratio();
        if self.capacity.is_hard_stopped() {
            return Err(CapacityExceeded::HardStop { fill_ratio });
        }
        if self.bodies.len() >= self.config.max_bodies && self.capacity.is_overflowing() {
            return Err(CapacityExceeded::BodyLimit {
                count: self.bodies.len(),
                fill_ratio,
            });
        }
        Ok(())
    }

    /// Drop a new body into the opening with a random size and velocity
    pub fn spawn(&mut self, color: ColorTag) -> Result<BodyId, CapacityExceeded> {
        self.check_capacity()
            .inspect_err(|e| log::debug!("Spawn rejected: {e}"))?;

        let rng = &mut self.rng;
        let r = uniform(rng, self.config.radius_min, self.config.radius_max);
        let x = uniform(
            rng,
            self.bowl.rim_left() + r + SPAWN_INSET,
            self.bowl.rim_right() - r - SPAWN_INSET,
        );
        let y = self.bowl.rim_y() - r - uniform(rng, SPAWN_HEIGHT_MIN, SPAWN_HEIGHT_MAX);
        let vel = Vec2::new(
            uniform(rng, -SPAWN_VX, SPAWN_VX),
            uniform(rng, SPAWN_VY_MIN, SPAWN_VY_MAX),
        );

        Ok(self.insert(color, r, Vec2::new(x, y), vel))
    }

    /// Spawn with explicit radius, position and velocity (scripted drops)
    pub fn spawn_at(
        &mut self,
        color: ColorTag,
        radius: f32,
        pos: Vec2,
        vel: Vec2,
    ) -> Result<BodyId, CapacityExceeded> {
        self.check_capacity()
            .inspect_err(|e| log::debug!("Spawn rejected: {e}"))?;
        Ok(self.insert(color, radius.max(f32::EPSILON), pos, vel))
    }

    fn insert(&mut self, color: ColorTag, radius: f32, pos: Vec2, vel: Vec2) -> BodyId {
        let id = self.next_id;
        self.next_id += 1;

        let mut body = Body::new(id, color, radius, pos, vel);
        body.wobble_phase = self.rng.random::<f32>() * std::f32::consts::TAU;
        body.wobble_freq = uniform(
            &mut self.rng,
            self.config.wobble_freq_min,
            self.config.wobble_freq_max,
        );
        body.underwater = self.immersion.is_underwater(pos.y);

        self.capacity.add(radius);
        *self.counts.entry(color).or_insert(0) += 1;
        self.bodies.push(body);
        id
    }

    /// Wake everything and kick it with a random impulse
    pub fn shake(&mut self) {
        for body in &mut self.bodies {
            body.wake();
            body.vel.x += uniform(&mut self.rng, -SHAKE_VX, SHAKE_VX);
            body.vel.y += uniform(&mut self.rng, SHAKE_VY_MIN, SHAKE_VY_MAX);
        }
        log::info!("Shook {} bodies", self.bodies.len());
    }

    /// Remove every body and reset counters; ids keep increasing
    pub fn clear(&mut self) {
        if !self.bodies.is_empty() {
            log::info!("Cleared {} bodies", self.bodies.len());
        }
        self.bodies.clear();
        self.counts.clear();
        self.capacity.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_spawn_places_body_above_opening() {
        let mut sim = Simulation::with_defaults(12345);
        for color in ColorTag::ALL {
            let id = sim.spawn(color).unwrap();
            let body = sim.body(id).unwrap();
            let r = body.radius();
            assert!((sim.config().radius_min..=sim.config().radius_max).contains(&r));
            assert!(body.pos.y < sim.bowl().rim_y() - r);
            assert!(body.pos.x >= sim.bowl().rim_left() + r);
            assert!(body.pos.x <= sim.bowl().rim_right() - r);
            assert!(!body.asleep);
        }
        assert_eq!(sim.len(), 12);
        assert_eq!(sim.counts()[&ColorTag::Red], 1);
    }

    #[test]
    fn test_ids_are_stable_and_increasing() {
        let mut sim = Simulation::with_defaults(1);
        let a = sim.spawn(ColorTag::Blue).unwrap();
        let b = sim.spawn(ColorTag::Blue).unwrap();
        assert!(b > a);
        sim.clear();
        let c = sim.spawn(ColorTag::Blue).unwrap();
        assert!(c > b);
        assert!(sim.body(a).is_none());
        assert_eq!(sim.body(c).unwrap().id, c);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut sim = Simulation::with_defaults(5);
        for _ in 0..10 {
            sim.spawn(ColorTag::Orange).unwrap();
        }
        assert!(sim.fill_ratio() > 0.0);
        sim.clear();
        sim.clear();
        assert!(sim.is_empty());
        assert!(sim.counts().is_empty());
        assert_eq!(sim.fill_ratio(), 0.0);
        assert_eq!(sim.fill_level(), FillLevel::Normal);
    }

    #[test]
    fn test_hard_stop_rejects_spawns() {
        let mut sim = Simulation::with_defaults(77);
        let hard_stop = sim.config().hard_stop_at;
        let mut spawned = 0;
        while sim.spawn(ColorTag::Red).is_ok() {
            spawned += 1;
            assert!(spawned < 10_000);
        }
        assert!(sim.fill_ratio() >= hard_stop);

        let count = sim.len();
        for _ in 0..20 {
            let err = sim.spawn(ColorTag::Blue).unwrap_err();
            assert!(matches!(err, CapacityExceeded::HardStop { .. }));
        }
        assert_eq!(sim.len(), count);
        assert_eq!(sim.fill_level(), FillLevel::HardStop);
        assert!(!sim.counts().contains_key(&ColorTag::Blue));
    }

    #[test]
    fn test_body_limit_needs_overflow() {
        let mut config = PhysicsConfig::default();
        config.max_bodies = 3;
        let mut sim = Simulation::new(config, 9);
        // At the cap but far from full: still allowed
        for _ in 0..5 {
            sim.spawn(ColorTag::Pink).unwrap();
        }

        // Large bodies push the fill past overflow
        let mut config = sim.config().clone();
        config.radius_min = 60.0;
        config.radius_max = 60.0;
        config.max_bodies = 3;
        sim.apply_config(config);
        let result = loop {
            match sim.spawn(ColorTag::Pink) {
                Ok(_) => continue,
                Err(e) => break e,
            }
        };
        assert!(sim.fill_level() >= FillLevel::Overflow);
        assert!(matches!(
            result,
            CapacityExceeded::BodyLimit { .. } | CapacityExceeded::HardStop { .. }
        ));
    }

    #[test]
    fn test_shake_wakes_everything() {
        let mut sim = Simulation::with_defaults(3);
        for _ in 0..4 {
            sim.spawn(ColorTag::Black).unwrap();
        }
        for body in &mut sim.bodies {
            body.sleep();
            body.sleep_counter = 18;
        }
        let before: Vec<Vec2> = sim.bodies().iter().map(|b| b.pos).collect();
        sim.shake();
        for (body, pos) in sim.bodies().iter().zip(before) {
            assert!(!body.asleep);
            assert_eq!(body.sleep_counter, 0);
            assert_eq!(body.pos, pos);
            assert!(body.vel != Vec2::ZERO);
        }
    }

    #[test]
    fn test_summary_serializes() {
        let mut sim = Simulation::with_defaults(8);
        sim.spawn(ColorTag::Red).unwrap();
        sim.spawn(ColorTag::Red).unwrap();
        sim.spawn(ColorTag::Cyan).unwrap();
        let summary = sim.summary();
        assert_eq!(summary.total_bodies, 3);
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"red\":2"));
        assert!(json.contains("\"cyan\":1"));
    }

    #[test]
    fn test_same_seed_same_spawns() {
        let mut a = Simulation::with_defaults(2024);
        let mut b = Simulation::with_defaults(2024);
        for _ in 0..8 {
            a.spawn(ColorTag::Green).unwrap();
            b.spawn(ColorTag::Green).unwrap();
        }
        for (x, y) in a.bodies().iter().zip(b.bodies()) {
            assert_eq!(x.pos, y.pos);
            assert_eq!(x.vel, y.vel);
            assert_eq!(x.radius(), y.radius());
        }
    }

    proptest! {
        #[test]
        fn prop_fill_is_monotone(seed in any::<u64>(), colors in prop::collection::vec(0usize..12, 1..200)) {
            let mut sim = Simulation::with_defaults(seed);
            let mut last = sim.fill_ratio();
            for c in colors {
                let _ = sim.spawn(ColorTag::ALL[c]);
                let now = sim.fill_ratio();
                prop_assert!(now >= last);
                last = now;
            }
        }
    }
}
