//! Body entity and render snapshot types

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Stable body handle; ids are never reused within a `Simulation`
pub type BodyId = u32;

/// Opaque color label carried for rendering; never affects physics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorTag {
    Green,
    Blue,
    Yellow,
    Red,
    Purple,
    Orange,
    Pink,
    Brown,
    Black,
    White,
    Cyan,
    Magenta,
}

impl ColorTag {
    /// Palette in display order
    pub const ALL: [ColorTag; 12] = [
        ColorTag::Green,
        ColorTag::Blue,
        ColorTag::Yellow,
        ColorTag::Red,
        ColorTag::Purple,
        ColorTag::Orange,
        ColorTag::Pink,
        ColorTag::Brown,
        ColorTag::Black,
        ColorTag::White,
        ColorTag::Cyan,
        ColorTag::Magenta,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColorTag::Green => "green",
            ColorTag::Blue => "blue",
            ColorTag::Yellow => "yellow",
            ColorTag::Red => "red",
            ColorTag::Purple => "purple",
            ColorTag::Orange => "orange",
            ColorTag::Pink => "pink",
            ColorTag::Brown => "brown",
            ColorTag::Black => "black",
            ColorTag::White => "white",
            ColorTag::Cyan => "cyan",
            ColorTag::Magenta => "magenta",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

impl std::fmt::Display for ColorTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One simulated circle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Body {
    pub id: BodyId,
    pub color: ColorTag,
    /// Fixed for the lifetime of the body
    radius: f32,
    pub pos: Vec2,
    pub vel: Vec2,
    /// Kinematically inert until disturbed; velocity is zero while set
    pub asleep: bool,
    /// Consecutive low-speed frames below the rim
    pub sleep_counter: u32,
    pub underwater: bool,
    pub wobble_phase: f32,
    /// Hz
    pub wobble_freq: f32,
}

impl Body {
    pub fn new(id: BodyId, color: ColorTag, radius: f32, pos: Vec2, vel: Vec2) -> Self {
        Self {
            id,
            color,
            radius,
            pos,
            vel,
            asleep: false,
            sleep_counter: 0,
            underwater: false,
            wobble_phase: 0.0,
            wobble_freq: 1.0,
        }
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    #[inline]
    pub fn area(&self) -> f32 {
        std::f32::consts::PI * self.radius * self.radius
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.vel.length()
    }

    /// Clear sleep state so the body integrates again
    pub fn wake(&mut self) {
        self.asleep = false;
        self.sleep_counter = 0;
    }

    /// Put the body to rest
    pub fn sleep(&mut self) {
        self.asleep = true;
        self.vel = Vec2::ZERO;
    }

    pub fn snapshot(&self) -> BodySnapshot {
        BodySnapshot {
            id: self.id,
            pos: self.pos,
            radius: self.radius,
            asleep: self.asleep,
            underwater: self.underwater,
            color: self.color,
        }
    }
}

/// Read-only view of a body handed to renderers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodySnapshot {
    pub id: BodyId,
    pub pos: Vec2,
    pub radius: f32,
    pub asleep: bool,
    pub underwater: bool,
    pub color: ColorTag,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_parse() {
        assert_eq!(ColorTag::parse("Red"), Some(ColorTag::Red));
        assert_eq!(ColorTag::parse(" magenta "), Some(ColorTag::Magenta));
        assert_eq!(ColorTag::parse("teal"), None);
        for color in ColorTag::ALL {
            assert_eq!(ColorTag::parse(color.as_str()), Some(color));
        }
    }

    #[test]
    fn test_sleep_zeroes_velocity() {
        let mut body = Body::new(1, ColorTag::Blue, 12.0, Vec2::ZERO, Vec2::new(3.0, -4.0));
        assert_eq!(body.speed(), 5.0);
        body.sleep_counter = 5;
        body.sleep();
        assert!(body.asleep);
        assert_eq!(body.vel, Vec2::ZERO);

        body.wake();
        assert!(!body.asleep);
        assert_eq!(body.sleep_counter, 0);
    }

    #[test]
    fn test_snapshot_copies_render_state() {
        let mut body = Body::new(9, ColorTag::Cyan, 15.0, Vec2::new(1.0, 2.0), Vec2::ZERO);
        body.underwater = true;
        let snap = body.snapshot();
        assert_eq!(snap.id, 9);
        assert_eq!(snap.radius, 15.0);
        assert!(snap.underwater);
        assert_eq!(snap.color, ColorTag::Cyan);
    }
}
