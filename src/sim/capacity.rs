//! Fill ratio accounting against the usable bowl area

use serde::{Deserialize, Serialize};

/// Which capacity threshold the fill ratio has crossed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum FillLevel {
    #[default]
    Normal,
    /// At or above the soft overflow threshold
    Overflow,
    /// At or above the hard stop; spawns are rejected
    HardStop,
}

impl FillLevel {
    /// Warning line for status displays (empty when normal)
    pub fn status_text(&self) -> &'static str {
        match self {
            FillLevel::Normal => "",
            FillLevel::Overflow => "Warning: bowl almost full",
            FillLevel::HardStop => "OVERFLOW: hard stop reached",
        }
    }
}

/// Running sum of body area over the bowl area
#[derive(Debug, Clone)]
pub struct CapacityTracker {
    bowl_area: f32,
    filled_area: f32,
    overflow_at: f32,
    hard_stop_at: f32,
}

impl CapacityTracker {
    pub fn new(bowl_area: f32, overflow_at: f32, hard_stop_at: f32) -> Self {
        Self {
            bowl_area: bowl_area.max(1.0),
            filled_area: 0.0,
            overflow_at,
            hard_stop_at,
        }
    }

    /// Account for a new body of radius `r`
    pub fn add(&mut self, r: f32) {
        self.filled_area += std::f32::consts::PI * r * r;
    }

    /// Recompute from scratch (guards against drift from incremental sums)
    pub fn recompute(&mut self, radii: impl Iterator<Item = f32>) {
        self.filled_area = radii.map(|r| std::f32::consts::PI * r * r).sum();
    }

    pub fn reset(&mut self) {
        self.filled_area = 0.0;
    }

    pub fn fill_ratio(&self) -> f32 {
        self.filled_area / self.bowl_area
    }

    pub fn level(&self) -> FillLevel {
        let ratio = self.fill_ratio();
        if ratio >= self.hard_stop_at {
            FillLevel::HardStop
        } else if ratio >= self.overflow_at {
            FillLevel::Overflow
        } else {
            FillLevel::Normal
        }
    }

    pub fn is_overflowing(&self) -> bool {
        self.level() >= FillLevel::Overflow
    }

    pub fn is_hard_stopped(&self) -> bool {
        self.level() == FillLevel::HardStop
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_levels() {
        // One unit-radius body fills PI
        let mut cap = CapacityTracker::new(PI * 10.0, 0.45, 0.75);
        assert_eq!(cap.level(), FillLevel::Normal);
        for _ in 0..5 {
            cap.add(1.0);
        }
        assert!((cap.fill_ratio() - 0.5).abs() < 1e-5);
        assert_eq!(cap.level(), FillLevel::Overflow);
        for _ in 0..3 {
            cap.add(1.0);
        }
        assert!(cap.is_hard_stopped());
        assert_eq!(cap.level().status_text(), "OVERFLOW: hard stop reached");

        cap.reset();
        assert_eq!(cap.fill_ratio(), 0.0);
        assert_eq!(cap.level(), FillLevel::Normal);
    }

    #[test]
    fn test_recompute_matches_incremental() {
        let mut cap = CapacityTracker::new(1000.0, 0.9, 1.1);
        let radii = [3.0, 4.5, 7.25];
        for r in radii {
            cap.add(r);
        }
        let incremental = cap.fill_ratio();
        cap.recompute(radii.into_iter());
        assert!((cap.fill_ratio() - incremental).abs() < 1e-6);
    }

    #[test]
    fn test_zero_area_is_floored() {
        let mut cap = CapacityTracker::new(0.0, 0.9, 1.1);
        cap.add(1.0);
        assert!(cap.fill_ratio().is_finite());
    }
}
