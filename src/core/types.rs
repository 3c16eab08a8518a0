// File: src/core/types.rs
use crate::error::GestureError;
use serde::{Deserialize, Serialize};

/// A point in the normalized `[0,1] x [0,1]` keyboard frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// One touch sample of a swipe. `t_ms` is milliseconds since an arbitrary origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GestureSample {
    pub x: f32,
    pub y: f32,
    pub t_ms: u64,
}

impl GestureSample {
    pub fn new(x: f32, y: f32, t_ms: u64) -> Self {
        Self { x, y, t_ms }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Pixel dimensions of the on-screen keyboard.
///
/// Paths and key geometry live in normalized space; the frame scales them back
/// to pixels for the distance heuristics (fingerprint matching, length scoring).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyboardFrame {
    pub width: f32,
    pub height: f32,
}

impl KeyboardFrame {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn to_pixels(&self, point: Point) -> Point {
        Point::new(point.x * self.width, point.y * self.height)
    }
}

impl Default for KeyboardFrame {
    fn default() -> Self {
        Self::new(1080.0, 720.0)
    }
}

/// Pixel-space bounds of a single key, as reported by the layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeyBounds {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl KeyBounds {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

/// The ordered samples of one swipe.
///
/// Every path built through [`GesturePath::new`] has at least two samples,
/// finite coordinates and non-decreasing timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GesturePath {
    samples: Vec<GestureSample>,
}

impl GesturePath {
    pub fn new(samples: Vec<GestureSample>) -> Result<Self, GestureError> {
        if samples.len() < 2 {
            return Err(GestureError::TooShort(samples.len()));
        }
        for (i, s) in samples.iter().enumerate() {
            if !s.x.is_finite() || !s.y.is_finite() {
                return Err(GestureError::NonFinite(i));
            }
            if i > 0 && s.t_ms < samples[i - 1].t_ms {
                return Err(GestureError::NonMonotonic(i));
            }
        }
        Ok(Self { samples })
    }

    /// Builds a path from `(x, y)` pairs spaced `step_ms` apart.
    pub fn from_points(points: &[(f32, f32)], step_ms: u64) -> Result<Self, GestureError> {
        let samples = points
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| GestureSample::new(x, y, i as u64 * step_ms))
            .collect();
        Self::new(samples)
    }

    pub fn samples(&self) -> &[GestureSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        self.samples.iter().map(GestureSample::point)
    }

    pub fn first(&self) -> Point {
        self.samples[0].point()
    }

    pub fn last(&self) -> Point {
        self.samples[self.samples.len() - 1].point()
    }

    /// Arithmetic mean of all sample positions.
    pub fn mean(&self) -> Point {
        let n = self.samples.len() as f32;
        let (sx, sy) = self
            .samples
            .iter()
            .fold((0.0f32, 0.0f32), |(ax, ay), s| (ax + s.x, ay + s.y));
        Point::new(sx / n, sy / n)
    }

    /// Polyline length measured in the pixel space of `frame`.
    pub fn pixel_length(&self, frame: &KeyboardFrame) -> f32 {
        self.samples
            .windows(2)
            .map(|w| frame.to_pixels(w[0].point()).distance(&frame.to_pixels(w[1].point())))
            .sum()
    }

    /// Elapsed time between the first and the last sample, in seconds.
    pub fn duration_secs(&self) -> f32 {
        let first = self.samples[0].t_ms;
        let last = self.samples[self.samples.len() - 1].t_ms;
        (last - first) as f32 / 1000.0
    }
}

/// Summary of a gesture's shape used by context scoring.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GestureShape {
    /// Path length in pixels.
    pub path_length: f32,
    /// Duration in seconds.
    pub duration: f32,
    /// Endpoint distance over path length; 1.0 for a straight line.
    pub straightness: f32,
}

impl GestureShape {
    pub fn of(path: &GesturePath, frame: &KeyboardFrame) -> Self {
        let path_length = path.pixel_length(frame);
        let chord = frame.to_pixels(path.first()).distance(&frame.to_pixels(path.last()));
        let straightness = if path_length > 0.0 { chord / path_length } else { 1.0 };
        Self {
            path_length,
            duration: path.duration_secs(),
            straightness,
        }
    }
}

/// Raw output unit of the inference engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateWord {
    pub word: String,
    pub confidence: f32,
}

impl CandidateWord {
    pub fn new(word: impl Into<String>, confidence: f32) -> Self {
        Self { word: word.into(), confidence }
    }
}

/// Final output unit; lists of these are ordered by descending score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPrediction {
    pub word: String,
    pub score: f32,
}

impl RankedPrediction {
    pub fn new(word: impl Into<String>, score: f32) -> Self {
        Self { word: word.into(), score }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_and_unordered_paths() {
        assert!(matches!(
            GesturePath::from_points(&[(0.1, 0.1)], 10),
            Err(GestureError::TooShort(1))
        ));
        let samples = vec![GestureSample::new(0.1, 0.1, 20), GestureSample::new(0.2, 0.2, 10)];
        assert!(matches!(GesturePath::new(samples), Err(GestureError::NonMonotonic(1))));
        let samples = vec![GestureSample::new(f32::NAN, 0.1, 0), GestureSample::new(0.2, 0.2, 10)];
        assert!(matches!(GesturePath::new(samples), Err(GestureError::NonFinite(0))));
    }

    #[test]
    fn shape_measures_pixels_and_seconds() {
        let path = GesturePath::from_points(&[(0.0, 0.0), (0.5, 0.0), (1.0, 0.0)], 250).unwrap();
        let frame = KeyboardFrame::new(200.0, 100.0);
        let shape = GestureShape::of(&path, &frame);
        assert!((shape.path_length - 200.0).abs() < 1e-3);
        assert!((shape.duration - 0.5).abs() < 1e-6);
        assert!((shape.straightness - 1.0).abs() < 1e-6);
        assert_eq!(path.mean(), Point::new(0.5, 0.0));
    }
}
