use changeblind_core::RingLayout;
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::debug;

/// Spreads a block's trials over the permitted ring layouts so their counts
/// stay within one of each other.
#[derive(Debug, Clone)]
pub struct RingBalancer {
    layouts: Vec<RingLayout>,
    counts: Vec<usize>,
    capacity: usize,
}

impl RingBalancer {
    pub fn new(layouts: Vec<RingLayout>, block_trials: usize) -> Self {
        let mut balancer = Self {
            counts: vec![0; layouts.len()],
            layouts,
            capacity: 0,
        };
        balancer.reset(block_trials);
        balancer
    }

    /// Starts a new block of `block_trials` trials.
    pub fn reset(&mut self, block_trials: usize) {
        self.counts.iter_mut().for_each(|c| *c = 0);
        self.capacity = block_trials.div_ceil(self.layouts.len().max(1));
    }

    /// Picks uniformly among the least-used layouts that still have room.
    /// Once every layout is full the least-used one is reused.
    pub fn next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> RingLayout {
        if self.layouts.len() <= 1 {
            if let Some(c) = self.counts.first_mut() {
                *c += 1;
            }
            return self.layouts.first().copied().unwrap_or(RingLayout::Single);
        }

        let min = self.counts.iter().copied().min().unwrap_or(0);
        let open: Vec<usize> = (0..self.layouts.len())
            .filter(|&i| self.counts[i] == min && self.counts[i] < self.capacity)
            .collect();
        let fallback = (0..self.layouts.len())
            .filter(|&i| self.counts[i] == min)
            .collect::<Vec<_>>();
        let candidates = if open.is_empty() { &fallback } else { &open };

        let index = candidates.choose(rng).copied().unwrap_or(0);
        self.counts[index] += 1;
        debug!(layout = ?self.layouts[index], counts = ?self.counts, "ring layout chosen");
        self.layouts[index]
    }

    /// Gives back a layout whose trial was aborted, so the re-run slot can
    /// land on it again.
    pub fn release(&mut self, layout: RingLayout) {
        if let Some(i) = self.layouts.iter().position(|l| *l == layout) {
            self.counts[i] = self.counts[i].saturating_sub(1);
        }
    }

    pub fn counts(&self) -> impl Iterator<Item = (RingLayout, usize)> + '_ {
        self.layouts.iter().copied().zip(self.counts.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn spread(b: &RingBalancer) -> usize {
        let counts: Vec<usize> = b.counts().map(|(_, c)| c).collect();
        counts.iter().max().unwrap() - counts.iter().min().unwrap()
    }

    #[test]
    fn single_layout_always_chosen() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut b = RingBalancer::new(vec![RingLayout::Single], 5);
        for _ in 0..5 {
            assert_eq!(b.next(&mut rng), RingLayout::Single);
        }
    }

    #[test]
    fn counts_stay_within_one() {
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut b = RingBalancer::new(vec![RingLayout::Single, RingLayout::Dual], 7);
            for _ in 0..7 {
                b.next(&mut rng);
                assert!(spread(&b) <= 1);
            }
            let total: usize = b.counts().map(|(_, c)| c).sum();
            assert_eq!(total, 7);
        }
    }

    #[test]
    fn both_layouts_get_used_across_seeds() {
        let mut first = Vec::new();
        for seed in 0..32 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut b = RingBalancer::new(vec![RingLayout::Single, RingLayout::Dual], 4);
            first.push(b.next(&mut rng));
        }
        assert!(first.contains(&RingLayout::Single));
        assert!(first.contains(&RingLayout::Dual));
    }

    #[test]
    fn release_returns_the_slot() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut b = RingBalancer::new(vec![RingLayout::Single, RingLayout::Dual], 2);
        let first = b.next(&mut rng);
        b.release(first);
        assert!(b.counts().all(|(_, c)| c == 0));
        b.release(first);
        assert!(b.counts().all(|(_, c)| c == 0));
    }

    #[test]
    fn reset_clears_counts() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut b = RingBalancer::new(vec![RingLayout::Single, RingLayout::Dual], 2);
        b.next(&mut rng);
        b.next(&mut rng);
        b.reset(4);
        assert!(b.counts().all(|(_, c)| c == 0));
    }
}
