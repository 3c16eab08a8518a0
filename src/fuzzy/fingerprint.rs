// File: src/fuzzy/fingerprint.rs
use crate::core::types::{GesturePath, KeyboardFrame, Point};

/// Compact, approximately-matched descriptor of a swipe.
///
/// Points are in keyboard pixels so that the similarity threshold has the
/// same meaning whatever the keyboard size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureFingerprint {
    pub start: Point,
    pub end: Point,
    pub mean: Point,
    pub sample_count: usize,
}

impl GestureFingerprint {
    pub fn of(path: &GesturePath, frame: &KeyboardFrame) -> Self {
        Self {
            start: frame.to_pixels(path.first()),
            end: frame.to_pixels(path.last()),
            mean: frame.to_pixels(path.mean()),
            sample_count: path.len(),
        }
    }

    /// Same gesture if the sample counts are within `length_tolerance` of each
    /// other and start, end and mean are all closer than `distance_threshold`.
    pub fn is_similar_to(&self, other: &Self, distance_threshold: f32, length_tolerance: f32) -> bool {
        if other.sample_count == 0 {
            return false;
        }
        let ratio = self.sample_count as f32 / other.sample_count as f32;
        if ratio < 1.0 - length_tolerance || ratio > 1.0 + length_tolerance {
            return false;
        }
        self.start.distance(&other.start) < distance_threshold
            && self.end.distance(&other.end) < distance_threshold
            && self.mean.distance(&other.mean) < distance_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize, dx: f32) -> GesturePath {
        let pts: Vec<(f32, f32)> = (0..n)
            .map(|i| (0.1 + dx + 0.6 * i as f32 / (n - 1) as f32, 0.5))
            .collect();
        GesturePath::from_points(&pts, 10).unwrap()
    }

    #[test]
    fn similarity_tolerates_small_shifts() {
        let frame = KeyboardFrame::new(1000.0, 500.0);
        let a = GestureFingerprint::of(&line(10, 0.0), &frame);
        let b = GestureFingerprint::of(&line(11, 0.02), &frame);
        assert!(a.is_similar_to(&b, 50.0, 0.2));

        let far = GestureFingerprint::of(&line(10, 0.1), &frame);
        assert!(!a.is_similar_to(&far, 50.0, 0.2));

        let long = GestureFingerprint::of(&line(13, 0.0), &frame);
        assert!(!a.is_similar_to(&long, 50.0, 0.2));
    }
}
