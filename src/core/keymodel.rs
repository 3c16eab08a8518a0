// File: src/core/keymodel.rs
use crate::config::KeyModelConfig;
use crate::core::types::{GesturePath, KeyBounds, KeyboardFrame, Point};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Normalized geometry of one key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyInfo {
    pub center: Point,
    pub width: f32,
    pub height: f32,
    pub sigma_x: f32,
    pub sigma_y: f32,
}

impl KeyInfo {
    fn new(center: Point, width: f32, height: f32, config: &KeyModelConfig) -> Self {
        Self {
            center,
            width,
            height,
            sigma_x: width * config.sigma_x_factor,
            sigma_y: height * config.sigma_y_factor,
        }
    }

    /// Separable 2D Gaussian around the key center.
    fn probability(&self, point: Point) -> f32 {
        if self.sigma_x <= 0.0 || self.sigma_y <= 0.0 {
            return 0.0;
        }
        let dx = point.x - self.center.x;
        let dy = point.y - self.center.y;
        let px = (-(dx * dx) / (2.0 * self.sigma_x * self.sigma_x)).exp();
        let py = (-(dy * dy) / (2.0 * self.sigma_y * self.sigma_y)).exp();
        px * py
    }
}

/// One immutable generation of the layout.
#[derive(Debug, Default)]
struct KeyTable {
    keys: HashMap<char, KeyInfo>,
    frame: KeyboardFrame,
}

/// Converts touch coordinates into per-letter likelihoods.
///
/// The key table is swapped wholesale on every layout update; each scoring call
/// works on the snapshot it started with, so it never sees a half-built table.
pub struct KeyProbabilityModel {
    config: KeyModelConfig,
    table: RwLock<Arc<KeyTable>>,
}

impl KeyProbabilityModel {
    /// Creates a model with the built-in QWERTY layout.
    pub fn new(config: KeyModelConfig) -> Self {
        let keys = qwerty_layout(&config);
        Self {
            config,
            table: RwLock::new(Arc::new(KeyTable {
                keys,
                frame: KeyboardFrame::default(),
            })),
        }
    }

    /// Creates a model with no keys; every probability is 0 until a layout is set.
    pub fn empty(config: KeyModelConfig) -> Self {
        Self {
            config,
            table: RwLock::new(Arc::new(KeyTable::default())),
        }
    }

    fn snapshot(&self) -> Arc<KeyTable> {
        Arc::clone(&self.table.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replaces the whole layout from pixel-space key bounds.
    pub fn update_layout(&self, key_bounds: &HashMap<char, KeyBounds>, width: f32, height: f32) {
        let mut keys = HashMap::with_capacity(key_bounds.len());
        if width > 0.0 && height > 0.0 {
            for (&c, bounds) in key_bounds {
                let center = Point::new(
                    (bounds.left + bounds.right) / 2.0 / width,
                    (bounds.top + bounds.bottom) / 2.0 / height,
                );
                let info = KeyInfo::new(
                    center,
                    bounds.width() / width,
                    bounds.height() / height,
                    &self.config,
                );
                keys.insert(c.to_ascii_lowercase(), info);
            }
        }
        let table = Arc::new(KeyTable {
            keys,
            frame: KeyboardFrame::new(width, height),
        });
        debug!(keys = table.keys.len(), width, height, "key layout updated");
        *self.table.write().unwrap_or_else(PoisonError::into_inner) = table;
    }

    pub fn key_count(&self) -> usize {
        self.snapshot().keys.len()
    }

    /// Pixel dimensions recorded by the last layout update.
    pub fn keyboard_frame(&self) -> KeyboardFrame {
        self.snapshot().frame
    }

    pub fn key_info(&self, key: char) -> Option<KeyInfo> {
        self.snapshot().keys.get(&key.to_ascii_lowercase()).copied()
    }

    /// Likelihood in `[0,1]` that `point` was aimed at `key`. Unknown keys score 0.
    pub fn probability_of(&self, point: Point, key: char) -> f32 {
        self.snapshot()
            .keys
            .get(&key.to_ascii_lowercase())
            .map_or(0.0, |info| info.probability(point))
    }

    /// All keys whose likelihood at `point` reaches the configured floor.
    pub fn probabilities_at(&self, point: Point) -> HashMap<char, f32> {
        let table = self.snapshot();
        self.probabilities_in(&table, point)
    }

    fn probabilities_in(&self, table: &KeyTable, point: Point) -> HashMap<char, f32> {
        table
            .keys
            .iter()
            .filter_map(|(&c, info)| {
                let p = info.probability(point);
                (p >= self.config.min_probability).then_some((c, p))
            })
            .collect()
    }

    pub fn most_probable_key(&self, point: Point) -> Option<char> {
        let table = self.snapshot();
        let mut best: Option<(char, f32)> = None;
        for (&c, info) in &table.keys {
            let p = info.probability(point);
            if p > self.config.min_probability && best.map_or(true, |(_, bp)| p > bp) {
                best = Some((c, p));
            }
        }
        best.map(|(c, _)| c)
    }

    /// Position-weighted letter distribution over a whole path.
    ///
    /// Endpoints weigh 1.5, the midpoint 1.0. The result sums to 1, or is empty
    /// when no sample came close enough to any key.
    pub fn path_probabilities(&self, path: &GesturePath) -> HashMap<char, f32> {
        let table = self.snapshot();
        let n = path.len();
        let mut acc: HashMap<char, f32> = HashMap::new();
        for (i, point) in path.points().enumerate() {
            let weight = point_weight(i, n);
            for (c, p) in self.probabilities_in(&table, point) {
                *acc.entry(c).or_insert(0.0) += p * weight;
            }
        }
        let total: f32 = acc.values().sum();
        if total <= 0.0 {
            return HashMap::new();
        }
        for p in acc.values_mut() {
            *p /= total;
        }
        acc
    }

    /// How well `path` spells `word`: each letter is scored against an equal
    /// slice of the samples, and the per-letter averages are averaged again.
    pub fn word_confidence(&self, word: &str, path: &GesturePath) -> f32 {
        let letters: Vec<char> = word.chars().map(|c| c.to_ascii_lowercase()).collect();
        if letters.is_empty() || path.is_empty() {
            return 0.0;
        }
        let table = self.snapshot();
        let samples = path.samples();
        let per_letter = (samples.len() / letters.len()).max(1);
        let mut total = 0.0;
        for (i, letter) in letters.iter().enumerate() {
            let Some(info) = table.keys.get(letter) else {
                continue;
            };
            let start = (i * per_letter).min(samples.len() - 1);
            let end = ((i + 1) * per_letter).min(samples.len()).max(start + 1);
            let slice = &samples[start..end];
            let sum: f32 = slice.iter().map(|s| info.probability(s.point())).sum();
            total += sum / slice.len() as f32;
        }
        total / letters.len() as f32
    }
}

impl Default for KeyProbabilityModel {
    fn default() -> Self {
        Self::new(KeyModelConfig::default())
    }
}

/// U-shaped weight: 1.5 at both ends of the path, 1.0 in the middle.
pub fn point_weight(index: usize, total: usize) -> f32 {
    if total <= 1 {
        return 1.0;
    }
    let position = index as f32 / (total - 1) as f32;
    1.0 + 0.5 * (2.0 * position - 1.0).abs()
}

fn qwerty_layout(config: &KeyModelConfig) -> HashMap<char, KeyInfo> {
    const KEY_WIDTH: f32 = 0.1;
    const KEY_HEIGHT: f32 = 0.25;
    let rows: [(&str, f32, f32); 3] = [
        ("qwertyuiop", 0.05, 0.125),
        ("asdfghjkl", 0.10, 0.375),
        ("zxcvbnm", 0.15, 0.625),
    ];
    let mut keys = HashMap::new();
    for (letters, x0, y) in rows {
        for (i, c) in letters.chars().enumerate() {
            let center = Point::new(x0 + i as f32 * KEY_WIDTH, y);
            keys.insert(c, KeyInfo::new(center, KEY_WIDTH, KEY_HEIGHT, config));
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn center(model: &KeyProbabilityModel, c: char) -> Point {
        model.key_info(c).unwrap().center
    }

    #[test]
    fn probability_peaks_at_key_center() {
        let model = KeyProbabilityModel::default();
        let g = center(&model, 'g');
        assert!((model.probability_of(g, 'g') - 1.0).abs() < 1e-6);
        assert!(model.probability_of(g, 'h') < 0.1);
        assert_eq!(model.probability_of(g, '#'), 0.0);
        assert_eq!(model.most_probable_key(g), Some('g'));
        assert!((model.probability_of(g, 'G') - 1.0).abs() < 1e-6);
    }

    #[test]
    fn probabilities_at_respects_floor() {
        let model = KeyProbabilityModel::default();
        let probs = model.probabilities_at(center(&model, 'a'));
        assert!(probs.contains_key(&'a'));
        assert!(!probs.contains_key(&'p'));
        assert!(probs.values().all(|&p| p >= 0.01));
    }

    #[test]
    fn path_weights_favor_endpoints() {
        assert!((point_weight(0, 5) - 1.5).abs() < 1e-6);
        assert!((point_weight(4, 5) - 1.5).abs() < 1e-6);
        assert!((point_weight(2, 5) - 1.0).abs() < 1e-6);
        assert_eq!(point_weight(0, 1), 1.0);
    }

    #[test]
    fn path_probabilities_normalize() {
        let model = KeyProbabilityModel::default();
        let t = center(&model, 't');
        let h = center(&model, 'h');
        let e = center(&model, 'e');
        let path = GesturePath::from_points(&[(t.x, t.y), (h.x, h.y), (e.x, e.y)], 30).unwrap();
        let probs = model.path_probabilities(&path);
        let sum: f32 = probs.values().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(probs[&'t'] > probs.get(&'q').copied().unwrap_or(0.0));
    }

    #[test]
    fn empty_layout_scores_zero() {
        let model = KeyProbabilityModel::empty(KeyModelConfig::default());
        let path = GesturePath::from_points(&[(0.1, 0.1), (0.2, 0.2)], 10).unwrap();
        assert_eq!(model.probability_of(Point::new(0.1, 0.1), 'q'), 0.0);
        assert!(model.path_probabilities(&path).is_empty());
        assert_eq!(model.most_probable_key(Point::new(0.1, 0.1)), None);
    }

    #[test]
    fn update_layout_replaces_table() {
        let model = KeyProbabilityModel::default();
        let mut bounds = HashMap::new();
        bounds.insert('A', KeyBounds::new(0.0, 0.0, 100.0, 50.0));
        bounds.insert('b', KeyBounds::new(100.0, 0.0, 200.0, 50.0));
        model.update_layout(&bounds, 200.0, 100.0);
        assert_eq!(model.key_count(), 2);
        assert_eq!(model.keyboard_frame(), KeyboardFrame::new(200.0, 100.0));
        let a = model.key_info('a').unwrap();
        assert!((a.center.x - 0.25).abs() < 1e-6);
        assert!((a.center.y - 0.25).abs() < 1e-6);
        assert!((a.sigma_x - 0.5 * 0.4).abs() < 1e-6);
        assert_eq!(model.probability_of(a.center, 'q'), 0.0);
    }

    #[test]
    fn word_confidence_prefers_traced_word() {
        let model = KeyProbabilityModel::default();
        let pts: Vec<(f32, f32)> = "the"
            .chars()
            .flat_map(|c| {
                let p = center(&model, c);
                [(p.x, p.y), (p.x, p.y)]
            })
            .collect();
        let path = GesturePath::from_points(&pts, 20).unwrap();
        assert!(model.word_confidence("the", &path) > model.word_confidence("pin", &path));
        assert_eq!(model.word_confidence("", &path), 0.0);
    }

    fn layout_strategy() -> impl Strategy<Value = Vec<(f32, f32, f32, f32)>> {
        proptest::collection::vec((0.0f32..900.0, 0.0f32..600.0, 20.0f32..100.0, 20.0f32..100.0), 1..12)
    }

    proptest! {
        #[test]
        fn probability_bounded_and_center_is_max(
            rects in layout_strategy(),
            px in 0.0f32..1.0,
            py in 0.0f32..1.0,
        ) {
            let model = KeyProbabilityModel::default();
            let letters: Vec<char> = ('a'..='z').collect();
            let bounds: HashMap<char, KeyBounds> = rects
                .iter()
                .zip(letters.iter())
                .map(|(&(l, t, w, h), &c)| (c, KeyBounds::new(l, t, l + w, t + h)))
                .collect();
            model.update_layout(&bounds, 1000.0, 700.0);
            for &c in bounds.keys() {
                let p = model.probability_of(Point::new(px, py), c);
                prop_assert!((0.0..=1.0).contains(&p));
                let key_center = model.key_info(c).unwrap().center;
                let at_center = model.probability_of(key_center, c);
                prop_assert!(at_center >= p);
                for &other in bounds.keys() {
                    prop_assert!(model.probability_of(key_center, other) <= at_center);
                }
            }
        }

        #[test]
        fn path_probabilities_sum_to_one_or_empty(
            pts in proptest::collection::vec((0.0f32..1.0, 0.0f32..1.0), 2..40),
        ) {
            let model = KeyProbabilityModel::default();
            let path = GesturePath::from_points(&pts, 10).unwrap();
            let probs = model.path_probabilities(&path);
            if !probs.is_empty() {
                let sum: f32 = probs.values().sum();
                prop_assert!((sum - 1.0).abs() < 1e-5);
            }
        }
    }
}
