//! Bowl collider: an ellipse open above a horizontal rim line
//!
//! Bodies above the rim fall freely but are kept inside the opening's
//! x-range. Below it, each body collides with the ellipse shrunk by its own
//! radius, which turns a circle-vs-curve test into a point-vs-ellipse test.

use glam::Vec2;

use super::body::Body;
use crate::clamp_or_center;
use crate::config::BowlShape;
use crate::consts::*;

/// Immutable bowl geometry with cached rim extent and usable area
#[derive(Debug, Clone)]
pub struct BowlGeometry {
    center: Vec2,
    a: f32,
    b: f32,
    rim_y: f32,
    restitution: f32,
    rim_left: f32,
    rim_right: f32,
    bowl_area: f32,
}

impl BowlGeometry {
    pub fn new(shape: BowlShape, restitution: f32) -> Self {
        let center = Vec2::new(shape.cx, shape.cy);
        let (rim_left, rim_right) = rim_extent(center, shape.a, shape.b, shape.rim_y);
        let mut bowl = Self {
            center,
            a: shape.a,
            b: shape.b,
            rim_y: shape.rim_y,
            restitution,
            rim_left,
            rim_right,
            bowl_area: 1.0,
        };
        bowl.bowl_area = bowl.sample_area();
        bowl
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn semi_axes(&self) -> (f32, f32) {
        (self.a, self.b)
    }

    pub fn rim_y(&self) -> f32 {
        self.rim_y
    }

    pub fn rim_left(&self) -> f32 {
        self.rim_left
    }

    pub fn rim_right(&self) -> f32 {
        self.rim_right
    }

    /// Lowest point of the bowl interior
    pub fn floor_y(&self) -> f32 {
        self.center.y + self.b
    }

    /// Approximate area of the ellipse below the rim (capacity denominator)
    pub fn bowl_area(&self) -> f32 {
        self.bowl_area
    }

    /// Point inside the ellipse and at or below the rim
    pub fn is_inside(&self, x: f32, y: f32) -> bool {
        let dx = (x - self.center.x) / self.a;
        let dy = (y - self.center.y) / self.b;
        dx * dx + dy * dy <= 1.0 && y >= self.rim_y
    }

    /// Clamp x so a body of radius `r` fits through the opening
    pub fn clamp_to_opening(&self, x: f32, r: f32) -> f32 {
        clamp_or_center(
            x,
            self.rim_left + r + OPENING_MARGIN,
            self.rim_right - r - OPENING_MARGIN,
        )
    }

    /// Body center is still in the open funnel above the bowl
    #[inline]
    pub fn in_funnel(&self, pos: Vec2, r: f32) -> bool {
        pos.y < self.rim_y - r * FUNNEL_FACTOR
    }

    /// Body is close enough to the rim that the opening walls apply
    #[inline]
    fn near_rim(&self, pos: Vec2, r: f32) -> bool {
        pos.y < self.rim_y + r
    }

    /// Semi-axes of the ellipse traced by the center of a body of radius `r`
    #[inline]
    pub fn shrunk_axes(&self, r: f32) -> (f32, f32) {
        (
            (self.a - r).max(MIN_SHRUNK_AXIS),
            (self.b - r).max(MIN_SHRUNK_AXIS),
        )
    }

    /// Normalized squared distance of a body center against its shrunk ellipse
    pub fn shrunk_distance_sq(&self, pos: Vec2, r: f32) -> f32 {
        let (a, b) = self.shrunk_axes(r);
        let d = pos - self.center;
        let e = Vec2::new(d.x / a, d.y / b);
        e.length_squared()
    }

    /// Keep a body inside the bowl, bouncing it off the wall
    ///
    /// Returns true if the body hit the curved wall.
    pub fn collide(&self, body: &mut Body) -> bool {
        let r = body.radius();
        if self.in_funnel(body.pos, r) {
            body.pos.x = self.clamp_to_opening(body.pos.x, r);
            return false;
        }

        let (a, b) = self.shrunk_axes(r);
        let d = body.pos - self.center;
        let s2 = self.shrunk_distance_sq(body.pos, r);

        if s2 <= 1.0 {
            if self.near_rim(body.pos, r) {
                body.pos.x = self.clamp_to_opening(body.pos.x, r);
            }
            return false;
        }

        // Project back onto the shrunk ellipse along the ray from its center
        let s = if s2 > 1e-12 { s2.sqrt() } else { 1.0 };
        body.pos = self.center + d / s;

        // Gradient of the quadratic form is the outward surface normal
        let normal = Vec2::new(d.x / (a * a), d.y / (b * b));
        if normal.length_squared() < 1e-18 {
            return true;
        }
        let normal = normal.normalize();

        body.vel = reflect_velocity(body.vel, normal, self.restitution);
        body.vel.x *= WALL_DAMP_X;
        body.vel.y *= WALL_DAMP_Y;

        if self.near_rim(body.pos, r) {
            body.pos.x = self.clamp_to_opening(body.pos.x, r);
        }
        true
    }

    /// Position-only containment: pull a body that contact resolution pushed
    /// through the wall back onto its shrunk ellipse
    pub fn contain(&self, body: &mut Body) {
        let r = body.radius();
        if self.in_funnel(body.pos, r) {
            return;
        }
        let s2 = self.shrunk_distance_sq(body.pos, r);
        if s2 > 1.0 {
            let d = body.pos - self.center;
            body.pos = self.center + d / s2.sqrt();
        }
    }

    /// Midpoint-sampled area of the ellipse region below the rim
    fn sample_area(&self) -> f32 {
        let x0 = self.center.x - self.a;
        let x1 = self.center.x + self.a;
        let y0 = self.rim_y;
        let y1 = self.center.y + self.b;
        let dx = (x1 - x0) / AREA_SAMPLES_X as f32;
        let dy = (y1 - y0) / AREA_SAMPLES_Y as f32;

        let mut inside = 0u32;
        for iy in 0..AREA_SAMPLES_Y {
            let y = y0 + (iy as f32 + 0.5) * dy;
            for ix in 0..AREA_SAMPLES_X {
                let x = x0 + (ix as f32 + 0.5) * dx;
                if self.is_inside(x, y) {
                    inside += 1;
                }
            }
        }

        let total = (AREA_SAMPLES_X * AREA_SAMPLES_Y) as f32;
        let rect_area = (x1 - x0) * (y1 - y0);
        (rect_area * inside as f32 / total).max(1.0)
    }
}

/// Left/right x of the ellipse at the rim line
fn rim_extent(center: Vec2, a: f32, b: f32, rim_y: f32) -> (f32, f32) {
    let dy = rim_y - center.y;
    let t = 1.0 - (dy * dy) / (b * b);
    let half = if t <= 0.0 {
        a * DEGENERATE_RIM_FRACTION
    } else {
        a * t.sqrt()
    };
    (center.x - half, center.x + half)
}

/// Reflect the normal component of `velocity` with restitution `e`
///
/// `e = 1` is a perfect mirror: v' = v - 2(v·n)n
#[inline]
pub fn reflect_velocity(velocity: Vec2, normal: Vec2, e: f32) -> Vec2 {
    velocity - (1.0 + e) * velocity.dot(normal) * normal
}
