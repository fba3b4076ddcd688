//! Circular mask compositor
//!
//! Keeps the closed disk of radius `S/2` centred at `(S/2, S/2)` (integer
//! division) and forces every other pixel to black. A pixel `(x, y)` is kept
//! iff `(x - c)^2 + (y - c)^2 <= r^2`; the test is exact integer arithmetic,
//! so boundary pixels are always kept.

use crate::domain::model::Frame;

/// Precomputed row spans for one frame side
#[derive(Debug, Clone, PartialEq)]
pub struct CircleMask {
    side: u32,
    /// Inclusive `[start, end]` kept columns per row; `None` for rows fully outside
    spans: Vec<Option<(u32, u32)>>,
}

impl CircleMask {
    pub fn new(side: u32) -> Self {
        let centre = (side / 2) as i64;
        let radius_sq = centre * centre;

        let spans = (0..side as i64)
            .map(|y| {
                let dy = y - centre;
                let rem = radius_sq - dy * dy;
                if rem < 0 {
                    return None;
                }
                let half = isqrt(rem);
                let start = (centre - half).max(0);
                let end = (centre + half).min(side as i64 - 1);
                if start > end {
                    None
                } else {
                    Some((start as u32, end as u32))
                }
            })
            .collect();

        Self { side, spans }
    }

    pub fn side(&self) -> u32 {
        self.side
    }

    /// Whether pixel `(x, y)` lies inside or on the circle
    pub fn keeps(&self, x: u32, y: u32) -> bool {
        match self.spans.get(y as usize).copied().flatten() {
            Some((start, end)) => x >= start && x <= end,
            None => false,
        }
    }

    /// Black out every pixel outside the circle, in place.
    ///
    /// The frame must be square with the side this mask was built for.
    pub fn apply(&self, frame: &mut Frame) {
        debug_assert!(frame.is_square() && frame.width == self.side);

        let row_len = frame.row_len();
        let channels = Frame::CHANNELS;
        for (y, row) in frame.data.chunks_exact_mut(row_len).enumerate() {
            match self.spans.get(y).copied().flatten() {
                None => row.fill(0),
                Some((start, end)) => {
                    row[..start as usize * channels].fill(0);
                    row[(end as usize + 1) * channels..].fill(0);
                }
            }
        }
    }
}

/// Mask a single square frame without keeping the precomputed spans around
pub fn apply_circle_mask(frame: &mut Frame) {
    CircleMask::new(frame.width).apply(frame);
}

fn isqrt(value: i64) -> i64 {
    let mut root = (value as f64).sqrt() as i64;
    while root * root > value {
        root -= 1;
    }
    while (root + 1) * (root + 1) <= value {
        root += 1;
    }
    root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keeps_exact(side: u32, x: u32, y: u32) -> bool {
        let c = (side / 2) as i64;
        let dx = x as i64 - c;
        let dy = y as i64 - c;
        dx * dx + dy * dy <= c * c
    }

    fn patterned(side: u32) -> Frame {
        let mut frame = Frame::black(side, side, 0.0);
        for y in 0..side {
            for x in 0..side {
                frame.set_pixel(x, y, [(x % 251) as u8 + 1, (y % 251) as u8 + 1, 200]);
            }
        }
        frame
    }

    #[test]
    fn test_spans_match_exact_disk() {
        for side in 1..=64u32 {
            let mask = CircleMask::new(side);
            for y in 0..side {
                for x in 0..side {
                    assert_eq!(
                        mask.keeps(x, y),
                        keeps_exact(side, x, y),
                        "side {} pixel ({}, {})",
                        side,
                        x,
                        y
                    );
                }
            }
        }
    }

    #[test]
    fn test_interior_unchanged_exterior_black() {
        let side = 320;
        let original = patterned(side);
        let mut masked = original.clone();
        apply_circle_mask(&mut masked);

        for y in 0..side {
            for x in 0..side {
                if keeps_exact(side, x, y) {
                    assert_eq!(masked.pixel(x, y), original.pixel(x, y));
                } else {
                    assert_eq!(masked.pixel(x, y), [0, 0, 0]);
                }
            }
        }
    }

    #[test]
    fn test_boundary_pixels_kept() {
        let side = 320;
        let mut frame = patterned(side);
        apply_circle_mask(&mut frame);

        // Exactly on the circle: top, left and centre-row extremes
        assert_ne!(frame.pixel(160, 0), [0, 0, 0]);
        assert_ne!(frame.pixel(0, 160), [0, 0, 0]);
        assert_ne!(frame.pixel(160, 160), [0, 0, 0]);
        // Corners are always outside
        assert_eq!(frame.pixel(0, 0), [0, 0, 0]);
        assert_eq!(frame.pixel(319, 319), [0, 0, 0]);
    }

    #[test]
    fn test_masking_is_idempotent() {
        let mut once = patterned(33);
        apply_circle_mask(&mut once);
        let mut twice = once.clone();
        apply_circle_mask(&mut twice);
        assert_eq!(once, twice);
    }
}
