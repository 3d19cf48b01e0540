//! Per-band reservoir sampling
//!
//! The sampling pass draws a fixed-size uniform sample of every band
//! (Algorithm R) while streaming windows. NoData detection and the
//! histogram bin estimate work on these samples.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::raster::WindowData;

/// Uniform sample of one band
#[derive(Debug, Clone)]
pub struct Reservoir {
    capacity: usize,
    seen: u64,
    values: Vec<f64>,
    rng: StdRng,
}

impl Reservoir {
    pub fn new(capacity: usize, seed: u64) -> Self {
        Reservoir {
            capacity,
            seen: 0,
            values: Vec::with_capacity(capacity.min(1 << 16)),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn offer(&mut self, value: f64) {
        self.seen += 1;
        if self.values.len() < self.capacity {
            self.values.push(value);
            return;
        }
        let slot = self.rng.gen_range(0..self.seen);
        if (slot as usize) < self.capacity {
            self.values[slot as usize] = value;
        }
    }

    /// Values offered so far
    pub fn seen(&self) -> u64 {
        self.seen
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }
}

/// One reservoir per band, each with its own seed so bands are sampled
/// independently but reproducibly
pub struct BandSampler {
    reservoirs: Vec<Reservoir>,
}

impl BandSampler {
    pub fn new(band_count: usize, capacity: usize, seed: u64) -> Self {
        BandSampler {
            reservoirs: (0..band_count)
                .map(|band| Reservoir::new(capacity, seed.wrapping_add(band as u64)))
                .collect(),
        }
    }

    pub fn observe(&mut self, data: &WindowData) {
        for (reservoir, values) in self.reservoirs.iter_mut().zip(&data.bands) {
            values.iter().for_each(|v| reservoir.offer(*v));
        }
    }

    /// The finished samples, band-ordered
    pub fn finish(self) -> Vec<Vec<f64>> {
        self.reservoirs.into_iter().map(Reservoir::into_values).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Window;

    #[test]
    fn test_small_input_is_kept_whole() {
        let mut r = Reservoir::new(10, 1);
        (0..5).for_each(|i| r.offer(i as f64));
        assert_eq!(r.values(), &[0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_reservoir_is_bounded_and_deterministic() {
        let run = |seed| {
            let mut r = Reservoir::new(16, seed);
            (0..10_000).for_each(|i| r.offer(i as f64));
            r
        };
        let a = run(3);
        assert_eq!(a.values().len(), 16);
        assert_eq!(a.seen(), 10_000);
        assert_eq!(a.values(), run(3).values());
        // later values must have a chance to replace early ones
        assert!(a.values().iter().any(|v| *v >= 16.0));
    }

    #[test]
    fn test_sampler_keeps_bands_apart() {
        let mut data = WindowData::new(Window::new(0, 2, 2), 2);
        data.bands[0] = vec![1.0; 4];
        data.bands[1] = vec![2.0; 4];
        let mut sampler = BandSampler::new(2, 100, 0);
        sampler.observe(&data);
        let samples = sampler.finish();
        assert_eq!(samples[0], vec![1.0; 4]);
        assert_eq!(samples[1], vec![2.0; 4]);
    }
}
