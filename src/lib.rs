//! Fishbowl - circle physics inside a partially open elliptical bowl
//!
//! Core modules:
//! - `sim`: Deterministic simulation (bodies, bowl collider, contacts, sleep, capacity)
//! - `config`: Versioned physics configuration consumed at construction
//! - `intake`: Spawn triggers (manual queue, autodrop, background detection feed)
//! - `driver`: Per-frame loop tying intake and simulation together
//!
//! Coordinates are screen-style: +y points down, so gravity is positive and
//! "above the rim" means a smaller y.

pub mod config;
pub mod driver;
pub mod intake;
pub mod sim;

pub use config::{BowlShape, ConfigError, PhysicsConfig};
pub use driver::FrameDriver;
pub use sim::{Body, BodyId, BodySnapshot, CapacityExceeded, ColorTag, FillLevel, Simulation};

use rand::Rng;

/// Fixed tuning constants that are not part of [`PhysicsConfig`]
pub mod consts {
    /// Largest frame delta the driver will hand to `step` (stall protection)
    pub const MAX_FRAME_DT: f32 = 1.0 / 30.0;

    /// Gap kept between a body and the bowl wall at the opening
    pub const OPENING_MARGIN: f32 = 6.0;
    /// Half-width of the opening (as a fraction of `a`) when the rim misses the ellipse
    pub const DEGENERATE_RIM_FRACTION: f32 = 0.05;
    /// Bodies whose center is above `rim_y - FUNNEL_FACTOR * r` fall freely
    pub const FUNNEL_FACTOR: f32 = 0.6;
    /// Floor for the radius-shrunk ellipse axes
    pub const MIN_SHRUNK_AXIS: f32 = 5.0;
    /// Velocity damping applied after a wall bounce
    pub const WALL_DAMP_X: f32 = 0.99;
    pub const WALL_DAMP_Y: f32 = 0.995;
    /// Area sampling grid used for the capacity denominator
    pub const AREA_SAMPLES_X: u32 = 140;
    pub const AREA_SAMPLES_Y: u32 = 180;

    /// Overlap beyond which a contact wakes a resting pair
    pub const DISTURB_OVERLAP: f32 = 0.6;
    /// Squared distance under which two centers count as coincident
    pub const COINCIDENT_DIST_SQ: f32 = 1e-9;

    /// One-shot velocity scaling on water entry / exit
    pub const WATER_ENTRY_DAMP_X: f32 = 0.78;
    pub const WATER_ENTRY_DAMP_Y: f32 = 0.60;
    pub const WATER_EXIT_BOOST_X: f32 = 1.05;
    /// Wobble fades to zero below `sleep_speed * WOBBLE_FADE_SPEEDS`
    pub const WOBBLE_FADE_SPEEDS: f32 = 2.5;

    /// Spawn placement
    pub const SPAWN_INSET: f32 = 10.0;
    pub const SPAWN_HEIGHT_MIN: f32 = 45.0;
    pub const SPAWN_HEIGHT_MAX: f32 = 120.0;
    pub const SPAWN_VX: f32 = 240.0;
    pub const SPAWN_VY_MIN: f32 = -40.0;
    pub const SPAWN_VY_MAX: f32 = 120.0;

    /// Shake impulse ranges
    pub const SHAKE_VX: f32 = 760.0;
    pub const SHAKE_VY_MIN: f32 = -560.0;
    pub const SHAKE_VY_MAX: f32 = 220.0;

    /// Autodrop spawns at most this many bodies per frame
    pub const MAX_AUTODROP_PER_FRAME: u32 = 10;
    /// Feed requests drained per frame
    pub const MAX_FEED_DROPS_PER_FRAME: usize = 6;
    /// Pending feed requests held before new ones are dropped
    pub const FEED_QUEUE_CAPACITY: usize = 512;
    /// Seconds between detection polls
    pub const FEED_POLL_SECONDS: f32 = 4.0;
}

/// Clamp `v` into `[lo, hi]`; an empty range collapses to its midpoint
#[inline]
pub fn clamp_or_center(v: f32, lo: f32, hi: f32) -> f32 {
    if lo > hi {
        (lo + hi) * 0.5
    } else {
        v.clamp(lo, hi)
    }
}

/// Uniform sample between two bounds, in either order
#[inline]
pub fn uniform<R: Rng + ?Sized>(rng: &mut R, a: f32, b: f32) -> f32 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    if hi - lo <= f32::EPSILON {
        lo
    } else {
        rng.random_range(lo..hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_clamp_or_center() {
        assert_eq!(clamp_or_center(5.0, 0.0, 10.0), 5.0);
        assert_eq!(clamp_or_center(-1.0, 0.0, 10.0), 0.0);
        assert_eq!(clamp_or_center(11.0, 0.0, 10.0), 10.0);
        // Inverted range: opening narrower than the body
        assert_eq!(clamp_or_center(3.0, 10.0, 0.0), 5.0);
    }

    #[test]
    fn test_uniform_bounds() {
        let mut rng = Pcg32::seed_from_u64(7);
        for _ in 0..100 {
            let v = uniform(&mut rng, 4.0, -2.0);
            assert!((-2.0..4.0).contains(&v));
        }
        assert_eq!(uniform(&mut rng, 3.0, 3.0), 3.0);
    }
}
