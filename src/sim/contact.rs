//! Pairwise circle contact resolution
//!
//! Position correction first (sleeping bodies act as anchors), then an
//! equal-and-opposite impulse along the contact normal.

use glam::Vec2;
use rand::Rng;

use super::body::Body;
use crate::consts::*;

/// What a contact did to the pair
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContactOutcome {
    pub touching: bool,
    /// Overlap removed along the normal
    pub overlap: f32,
    /// The contact was violent enough to wake a resting pair
    pub disturbed: bool,
}

/// Borrow two distinct bodies mutably (`i < j`)
pub fn pair_mut(bodies: &mut [Body], i: usize, j: usize) -> (&mut Body, &mut Body) {
    debug_assert!(i < j);
    let (head, tail) = bodies.split_at_mut(j);
    (&mut head[i], &mut tail[0])
}

/// Separate two overlapping bodies and exchange a normal impulse
pub fn resolve_pair<R: Rng + ?Sized>(
    a: &mut Body,
    b: &mut Body,
    restitution: f32,
    rng: &mut R,
) -> ContactOutcome {
    let delta = b.pos - a.pos;
    let dist_sq = delta.length_squared();
    let min_dist = a.radius() + b.radius();

    if dist_sq >= min_dist * min_dist {
        return ContactOutcome::default();
    }

    // Coincident centers have no normal; pick one at random
    let (normal, dist) = if dist_sq <= COINCIDENT_DIST_SQ {
        let angle = rng.random::<f32>() * std::f32::consts::TAU;
        (Vec2::from_angle(angle), 0.0)
    } else {
        let dist = dist_sq.sqrt();
        (delta / dist, dist)
    };
    let overlap = min_dist - dist;

    match (a.asleep, b.asleep) {
        (true, false) => b.pos += normal * overlap,
        (false, true) => a.pos -= normal * overlap,
        _ => {
            let push = normal * (overlap * 0.5);
            a.pos -= push;
            b.pos += push;
        }
    }

    let disturbed = overlap > DISTURB_OVERLAP;
    if disturbed {
        a.wake();
        b.wake();
    }

    let vel_n = (b.vel - a.vel).dot(normal);
    if vel_n < 0.0 {
        let impulse = normal * (-(1.0 + restitution) * vel_n * 0.5);
        if !a.asleep {
            a.vel -= impulse;
        }
        if !b.asleep {
            b.vel += impulse;
        }
    }

    ContactOutcome {
        touching: true,
        overlap,
        disturbed,
    }
}
