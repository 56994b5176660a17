//! Physics configuration
//!
//! Consumed once by `Simulation::new` and only re-applied explicitly between
//! frames. Stored as versioned JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current on-disk config version
pub const CONFIG_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported config version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Ellipse and rim line describing the bowl
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BowlShape {
    pub cx: f32,
    pub cy: f32,
    /// Horizontal semi-axis
    pub a: f32,
    /// Vertical semi-axis
    pub b: f32,
    /// y of the opening; the ellipse is open above this line
    pub rim_y: f32,
}

impl Default for BowlShape {
    fn default() -> Self {
        // Laid out on a 760x520 canvas
        let (cx, cy, a, b) = (760.0 * 0.52, 520.0 * 0.67, 760.0 * 0.235, 520.0 * 0.295);
        Self {
            cx,
            cy,
            a,
            b,
            rim_y: cy - b * 0.8,
        }
    }
}

/// Simulation tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub version: u32,
    pub bowl: BowlShape,

    // === Forces ===
    pub gravity_air: f32,
    pub gravity_water: f32,
    /// Per-substep multiplier on vx
    pub friction_air: f32,
    pub friction_water: f32,
    /// Per-substep multiplier on vy
    pub vertical_drag_air: f32,
    pub vertical_drag_water: f32,

    // === Collisions ===
    pub bowl_restitution: f32,
    pub body_restitution: f32,
    pub substeps: u32,
    pub collision_passes: u32,

    // === Sleep ===
    pub sleep_speed: f32,
    pub sleep_frames: u32,

    // === Capacity ===
    pub overflow_at: f32,
    pub hard_stop_at: f32,
    pub max_bodies: usize,

    // === Water ===
    pub water_enabled: bool,
    /// Distance of the waterline below the rim
    pub waterline_offset: f32,
    pub wobble_accel: f32,
    pub wobble_freq_min: f32,
    pub wobble_freq_max: f32,
    pub wobble_damp: f32,

    // === Spawning ===
    pub radius_min: f32,
    pub radius_max: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        let bowl = BowlShape::default();
        Self {
            version: CONFIG_VERSION,
            bowl,

            gravity_air: 1750.0,
            gravity_water: 720.0,
            friction_air: 0.985,
            friction_water: 0.965,
            vertical_drag_air: 0.999,
            vertical_drag_water: 0.990,

            bowl_restitution: 0.45,
            body_restitution: 0.10,
            substeps: 2,
            collision_passes: 2,

            sleep_speed: 22.0,
            sleep_frames: 18,

            overflow_at: 0.95,
            hard_stop_at: 1.10,
            max_bodies: 260,

            water_enabled: true,
            waterline_offset: bowl.b * 0.20,
            wobble_accel: 120.0,
            wobble_freq_min: 0.6,
            wobble_freq_max: 1.6,
            wobble_damp: 0.10,

            radius_min: 11.0,
            radius_max: 18.0,
        }
    }
}

impl PhysicsConfig {
    /// Absolute y of the waterline; `None` when water is disabled
    pub fn waterline_y(&self) -> Option<f32> {
        self.water_enabled
            .then_some(self.bowl.rim_y + self.waterline_offset)
    }

    /// Parse and validate a JSON config
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&json)?;
        log::info!("Loaded physics config from {}", path.display());
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject configs the simulation cannot run stably with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.version != CONFIG_VERSION {
            return Err(ConfigError::Version {
                found: self.version,
                expected: CONFIG_VERSION,
            });
        }
        if !(self.bowl.a > 0.0 && self.bowl.b > 0.0) {
            return invalid("bowl semi-axes must be positive");
        }
        if self.substeps == 0 || self.collision_passes == 0 {
            return invalid("substeps and collision_passes must be at least 1");
        }
        if !(self.radius_min > 0.0 && self.radius_min <= self.radius_max) {
            return invalid("radius range must be positive and ordered");
        }
        if self.wobble_freq_min > self.wobble_freq_max {
            return invalid("wobble frequency range is inverted");
        }
        if !(self.overflow_at > 0.0 && self.overflow_at <= self.hard_stop_at) {
            return invalid("overflow_at must be positive and not exceed hard_stop_at");
        }
        if self.max_bodies == 0 {
            return invalid("max_bodies must be at least 1");
        }
        if self.sleep_speed < 0.0 {
            return invalid("sleep_speed must not be negative");
        }
        Ok(())
    }
}
