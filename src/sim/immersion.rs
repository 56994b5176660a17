//! Air/water regime for bodies
//!
//! The regime is a pure function of the waterline. Crossing it applies a
//! one-time drag impulse; submerged bodies that are still moving also get a
//! small sinusoidal sideways push.

use std::f32::consts::TAU;

use super::body::Body;
use crate::config::PhysicsConfig;
use crate::consts::*;

/// Edge of a regime change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Entered,
    Exited,
}

#[derive(Debug, Clone)]
pub struct Immersion {
    /// `None` when water is disabled
    waterline_y: Option<f32>,
    wobble_accel: f32,
    sleep_speed: f32,
}

impl Immersion {
    pub fn new(config: &PhysicsConfig) -> Self {
        Self {
            waterline_y: config.waterline_y(),
            wobble_accel: config.wobble_accel,
            sleep_speed: config.sleep_speed,
        }
    }

    pub fn waterline_y(&self) -> Option<f32> {
        self.waterline_y
    }

    pub fn is_underwater(&self, y: f32) -> bool {
        self.waterline_y.is_some_and(|w| y >= w)
    }

    /// Update the body's regime flag, applying the entry/exit impulse on change
    pub fn update(&self, body: &mut Body) -> Option<Transition> {
        let under = self.is_underwater(body.pos.y);
        if under == body.underwater {
            return None;
        }
        body.underwater = under;
        if under {
            body.vel.x *= WATER_ENTRY_DAMP_X;
            body.vel.y *= WATER_ENTRY_DAMP_Y;
            Some(Transition::Entered)
        } else {
            body.vel.x *= WATER_EXIT_BOOST_X;
            Some(Transition::Exited)
        }
    }

    /// Sideways wobble acceleration at simulation time `t`
    ///
    /// Fades to zero as the body approaches sleep speed. Only the fractional
    /// cycle count reaches f32, so the phase stays exact on long runs.
    pub fn wobble_accel(&self, body: &Body, t: f64) -> f32 {
        let fade_speed = self.sleep_speed * WOBBLE_FADE_SPEEDS;
        let fade = if fade_speed > 0.0 {
            (body.speed() / fade_speed).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let cycles = (f64::from(body.wobble_freq) * t).fract() as f32;
        let wave = (body.wobble_phase + TAU * cycles).sin();
        self.wobble_accel * wave * fade
    }
}
