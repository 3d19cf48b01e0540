//! Bucket grid over sample positions
//!
//! Samples are hashed into square buckets in pixel space. A k-nearest
//! query walks rings of buckets outwards from the query bucket and stops
//! once no unvisited ring can hold anything closer than the current k-th
//! neighbour.

/// A sample position and its value for one band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexedSample {
    pub x: f64,
    pub y: f64,
    pub value: f64,
}

/// A neighbour found by a query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub distance: f64,
    pub value: f64,
}

pub struct SampleIndex {
    width: usize,
    height: usize,
    bucket_size: f64,
    across: usize,
    down: usize,
    buckets: Vec<Vec<IndexedSample>>,
    len: usize,
}

impl SampleIndex {
    /// Index `samples` lying in a `width` x `height` pixel area
    pub fn new(samples: Vec<IndexedSample>, width: usize, height: usize, bucket_size: usize) -> Self {
        let size = bucket_size.max(1);
        let across = width.div_ceil(size).max(1);
        let down = height.div_ceil(size).max(1);
        let mut buckets = vec![Vec::new(); across * down];
        let len = samples.len();

        let mut index = SampleIndex { width, height, bucket_size: size as f64, across, down, buckets: Vec::new(), len };
        for sample in samples {
            let (bx, by) = index.bucket_of(sample.x, sample.y);
            buckets[by * across + bx].push(sample);
        }
        index.buckets = buckets;
        index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Indexed area in pixels
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn bucket_of(&self, x: f64, y: f64) -> (usize, usize) {
        let clamp = |v: f64, n: usize| ((v / self.bucket_size).floor().max(0.0) as usize).min(n - 1);
        (clamp(x, self.across), clamp(y, self.down))
    }

    /// Up to `k` samples nearest to (`x`, `y`), closest first
    pub fn nearest(&self, x: f64, y: f64, k: usize) -> Vec<Neighbor> {
        let mut found: Vec<Neighbor> = Vec::with_capacity(k + 1);
        if self.is_empty() || k == 0 {
            return found;
        }
        let (bx, by) = self.bucket_of(x, y);
        let max_ring = self.across.max(self.down);

        for ring in 0..=max_ring {
            self.visit_ring(bx, by, ring, |sample| {
                let distance = (sample.x - x).hypot(sample.y - y);
                if found.len() == k && distance >= found[k - 1].distance {
                    return;
                }
                let at = found.partition_point(|n| n.distance <= distance);
                found.insert(at, Neighbor { distance, value: sample.value });
                found.truncate(k);
            });

            // anything in ring + 1 is at least `ring` buckets away
            if found.len() == k && found[k - 1].distance <= ring as f64 * self.bucket_size {
                break;
            }
        }
        found
    }

    fn visit_ring(&self, bx: usize, by: usize, ring: usize, mut f: impl FnMut(&IndexedSample)) {
        let (bx, by, ring) = (bx as i64, by as i64, ring as i64);
        for y in (by - ring)..=(by + ring) {
            if y < 0 || y >= self.down as i64 {
                continue;
            }
            let on_edge_row = y == by - ring || y == by + ring;
            let step = if on_edge_row || ring == 0 { 1 } else { (2 * ring) as usize };
            for x in ((bx - ring)..=(bx + ring)).step_by(step) {
                if x < 0 || x >= self.across as i64 {
                    continue;
                }
                self.buckets[y as usize * self.across + x as usize].iter().for_each(&mut f);
            }
        }
    }
}
