//! Perlin noise relief over the planar point field.

use noise::{NoiseFn, Perlin};
use terrain::PointField;
use terrain::prelude::Coord;

/// Fractal Perlin noise sampled at planar coordinates.
///
/// Each octave halves the amplitude and doubles the frequency; the sum is
/// normalised by the total amplitude before scaling, so values sit around
/// `base` within roughly `± scale`.
#[derive(Debug, Clone)]
pub struct ReliefGenerator {
    perlin: Perlin,
    base: f64,
    scale: f64,
    frequency: f64,
    octaves: u32,
}

impl ReliefGenerator {
    /// Gentle rolling relief sized for an 800 x 500 map.
    pub fn new(seed: u32) -> Self {
        Self {
            perlin: Perlin::new(seed),
            base: 0.0,
            scale: 300.0,
            frequency: 0.005,
            octaves: 4,
        }
    }

    pub fn with_base(mut self, base: f64) -> Self {
        self.base = base;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_frequency(mut self, frequency: f64) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_octaves(mut self, octaves: u32) -> Self {
        self.octaves = octaves.max(1);
        self
    }

    pub fn value_at(&self, point: Coord<f64>) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = self.frequency;
        let mut max_amplitude = 0.0;

        for _ in 0..self.octaves {
            total += self.perlin.get([point.x * frequency, point.y * frequency]) * amplitude;
            max_amplitude += amplitude;
            amplitude *= 0.5;
            frequency *= 2.0;
        }

        self.base + (total / max_amplitude) * self.scale
    }

    /// One value per point, in point order.
    pub fn sample(&self, points: &PointField) -> Vec<f64> {
        points.points().iter().map(|&p| self.value_at(p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relief_is_deterministic() {
        let relief = ReliefGenerator::new(42);
        let p = Coord { x: 123.4, y: 56.7 };
        assert_eq!(relief.value_at(p), relief.value_at(p));
        assert_eq!(
            ReliefGenerator::new(42).value_at(p),
            ReliefGenerator::new(42).value_at(p)
        );
    }

    #[test]
    fn test_relief_stays_within_scale() {
        let relief = ReliefGenerator::new(7).with_base(100.0).with_scale(50.0);
        for i in 0..200 {
            let p = Coord {
                x: i as f64 * 3.7,
                y: i as f64 * 2.1,
            };
            let z = relief.value_at(p);
            assert!((40.0..=160.0).contains(&z), "{z} out of range");
        }
    }

    #[test]
    fn test_sample_matches_point_count() {
        let points = PointField::from_points(
            10.0,
            10.0,
            vec![Coord { x: 0.0, y: 0.0 }, Coord { x: 5.0, y: 5.0 }],
        )
        .unwrap();
        let values = ReliefGenerator::new(1)
            .with_base(0.2)
            .with_scale(0.15)
            .sample(&points);
        assert_eq!(values.len(), 2);
        assert!(values.iter().all(|v| (0.02..=0.38).contains(v)));
    }
}
