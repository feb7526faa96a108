//! Candidate registration and the two ranking algorithms.

use std::collections::VecDeque;

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use ember_staking::StakerSet;
use ember_types::{Address, ChainConfig, StateView};

use crate::range::Range;
use crate::rng::{derive_seed, DeterministicRng};
use crate::vote::{VoteResult, VoteResults};

/// Hard cap on ranked producers per election.
pub const MAX_MINER: usize = 10_000;

/// Score handed to rank 1.
const MAX_ELECT_SCORE: i64 = 5_000_000;
/// Floor the per-rank score gap is stretched toward.
const MIN_ELECT_SCORE: i64 = 10_000;

/// One registered staker: its weight and the cumulative weight of every
/// candidate registered up to and including it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub address: Address,
    pub point: u64,
    prefix_sum: u64,
}

impl Candidate {
    pub(crate) fn prefix_sum(&self) -> u64 {
        self.prefix_sum
    }
}

/// The candidate array for one election run.
///
/// Insertion order fixes candidate indices; `prefix_sum` is assigned at
/// insertion and the cached `total` always equals the last entry's prefix
/// sum. The array is owned by exactly one election run.
#[derive(Clone, Debug, Default)]
pub struct Candidates {
    selections: Vec<Candidate>,
    total: u64,
    /// Tie-breaker timestamp folded into queue-variant scores.
    ts: u64,
}

impl Candidates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a staker for election.
    pub fn add(&mut self, address: Address, point: u64) {
        self.total += point;
        self.selections.push(Candidate {
            address,
            point,
            prefix_sum: self.total,
        });
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn len(&self) -> usize {
        self.selections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    pub(crate) fn as_slice(&self) -> &[Candidate] {
        &self.selections
    }

    /// Rank every candidate for the given block number.
    ///
    /// Fully deterministic: the seed derives from the number alone, so any
    /// node running the same candidate array obtains identical results.
    /// The fork height picks the algorithm; both weigh rank-1 probability
    /// by each candidate's share of the total point.
    pub fn into_vote_results(self, config: &ChainConfig, number: u64) -> VoteResults {
        let seed = derive_seed(config, number);
        if config.is_bip3(number) {
            self.select_linear(seed)
        } else {
            self.select_queue(seed)
        }
    }

    /// Pre-BIP3 ranking: a FIFO queue of prefix-sum ranges.
    ///
    /// Each election splits its range around the winner, so the candidate
    /// array survives intact and the whole order costs O(n log n) draws.
    fn select_queue(&self, seed: i64) -> VoteResults {
        let mut results = VoteResults::new();
        if self.selections.is_empty() {
            return results;
        }

        let mut rng = DeterministicRng::from_seed(seed);
        let mut current_score = MAX_ELECT_SCORE;
        let gap = (MAX_ELECT_SCORE - MIN_ELECT_SCORE) / self.selections.len() as i64;

        let mut queue: VecDeque<Range> = VecDeque::new();
        queue.push_back(Range {
            min: 0,
            max: self.total,
            start: 0,
            end: self.selections.len(),
        });

        let mut rank = 1u32;
        while rank as usize <= MAX_MINER {
            let Some(range) = queue.pop_front() else {
                break;
            };
            let address = range.binary_search(&mut queue, self, &mut rng);
            results.insert(
                address,
                VoteResult {
                    score: BigInt::from(current_score + self.ts as i64),
                    rank,
                },
            );
            current_score -= gap;
            rank += 1;
        }
        results
    }

    /// BIP3 ranking: strict weighted sampling without replacement.
    ///
    /// Each winner is removed from the array, shifting the suffix left and
    /// deflating its prefix sums, until no candidate remains.
    fn select_linear(mut self, seed: i64) -> VoteResults {
        let mut results = VoteResults::new();
        if self.selections.is_empty() {
            return results;
        }

        let mut rng = DeterministicRng::from_seed(seed);
        let mut current_score = MAX_ELECT_SCORE;
        let gap = (MAX_ELECT_SCORE - MIN_ELECT_SCORE) / self.selections.len() as i64;
        let mut rank = 1u32;

        while !self.selections.is_empty() {
            let elected_weight = rng.int_below(self.total);

            let mut start = 0usize;
            let mut end = self.selections.len() - 1;
            let chosen = loop {
                let mid = (start + end) / 2;
                let lo = if mid > 0 {
                    self.selections[mid - 1].prefix_sum
                } else {
                    0
                };
                let hi = self.selections[mid].prefix_sum;

                if elected_weight >= lo && elected_weight <= hi {
                    results.insert(
                        self.selections[mid].address,
                        VoteResult {
                            score: BigInt::from(current_score),
                            rank,
                        },
                    );
                    current_score -= gap;
                    rank += 1;
                    break mid;
                }

                if elected_weight < lo {
                    end = mid - 1;
                }
                if elected_weight > hi {
                    start = mid + 1;
                }
            };

            let removed = self.selections[chosen];
            for i in chosen..self.selections.len() - 1 {
                let mut next = self.selections[i + 1];
                next.prefix_sum -= removed.point;
                self.selections[i] = next;
            }
            self.selections.pop();
            self.total -= removed.point;
        }
        results
    }
}

/// Build the candidate array from a staker snapshot and the Selection
/// Points stored in account state, then run the election for `number`.
pub fn select_block_creator(
    config: &ChainConfig,
    number: u64,
    stakers: &StakerSet,
    state: &dyn StateView,
) -> VoteResults {
    let mut candidates = Candidates::new();
    for addr in stakers.iter() {
        let point = state.point(addr).to_u64().unwrap_or(u64::MAX);
        candidates.add(*addr, point);
    }
    tracing::trace!(
        candidates = candidates.len(),
        total = candidates.total(),
        number,
        "running producer election"
    );
    candidates.into_vote_results(config, number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_types::config::EngineConfig;

    fn addr(n: u8) -> Address {
        Address::new([n; 20])
    }

    /// Five candidates with points 5, 10, 15, 20, 25 — total 75.
    fn five_candidates() -> Candidates {
        let mut cs = Candidates::new();
        for i in 1..=5u8 {
            cs.add(addr(i), i as u64 * 5);
        }
        cs
    }

    fn queue_config() -> ChainConfig {
        // BIP2 active (full-number seed), BIP3 inactive (queue variant).
        ChainConfig {
            bip1_block: Some(0),
            bip2_block: Some(0),
            bip3_block: None,
            engine: EngineConfig::default(),
        }
    }

    #[test]
    fn prefix_sums_are_cumulative() {
        let cs = five_candidates();
        assert_eq!(cs.total(), 75);
        let sums: Vec<u64> = cs.as_slice().iter().map(Candidate::prefix_sum).collect();
        assert_eq!(sums, vec![5, 15, 30, 50, 75]);
    }

    #[test]
    fn queue_variant_is_reproducible() {
        let config = queue_config();
        let first = five_candidates().into_vote_results(&config, 1_000_000);
        let second = five_candidates().into_vote_results(&config, 1_000_000);
        assert_eq!(first.len(), 5);
        assert_eq!(first, second);
    }

    #[test]
    fn linear_variant_is_reproducible() {
        let config = ChainConfig::dev();
        let first = five_candidates().into_vote_results(&config, 1_000_000);
        let second = five_candidates().into_vote_results(&config, 1_000_000);
        assert_eq!(first.len(), 5);
        assert_eq!(first, second);
    }

    #[test]
    fn ranks_are_a_permutation_with_decreasing_scores() {
        for config in [queue_config(), ChainConfig::dev()] {
            let results = five_candidates().into_vote_results(&config, 123_456);
            let mut by_rank: Vec<(u32, BigInt)> = results
                .iter()
                .map(|(_, r)| (r.rank, r.score.clone()))
                .collect();
            by_rank.sort_by_key(|(rank, _)| *rank);

            let ranks: Vec<u32> = by_rank.iter().map(|(rank, _)| *rank).collect();
            assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
            for pair in by_rank.windows(2) {
                assert!(pair[0].1 > pair[1].1, "scores must strictly decrease");
            }
        }
    }

    #[test]
    fn variants_differ_but_cover_everyone() {
        let queue = five_candidates().into_vote_results(&queue_config(), 9_999);
        let linear = five_candidates().into_vote_results(&ChainConfig::dev(), 9_999);
        assert_eq!(queue.len(), 5);
        assert_eq!(linear.len(), 5);
        for i in 1..=5u8 {
            assert!(queue.get(&addr(i)).is_some());
            assert!(linear.get(&addr(i)).is_some());
        }
    }

    #[test]
    fn empty_candidates_elect_nobody() {
        let config = ChainConfig::dev();
        assert!(Candidates::new().into_vote_results(&config, 1).is_empty());
    }

    #[test]
    fn single_candidate_gets_rank_one() {
        let mut cs = Candidates::new();
        cs.add(addr(9), 1000);
        let results = cs.into_vote_results(&ChainConfig::dev(), 55);
        assert_eq!(results.rank_of(&addr(9)), Some(1));
    }

    #[test]
    fn heavier_candidate_wins_rank_one_more_often() {
        // 90/10 split: across many seeds the heavy candidate must take
        // rank 1 far more often than the light one.
        let config = ChainConfig::dev();
        let mut heavy_wins = 0;
        for number in 0..200u64 {
            let mut cs = Candidates::new();
            cs.add(addr(1), 90);
            cs.add(addr(2), 10);
            let results = cs.into_vote_results(&config, number);
            if results.rank_of(&addr(1)) == Some(1) {
                heavy_wins += 1;
            }
        }
        assert!(heavy_wins > 140, "heavy candidate won only {heavy_wins}/200");
    }
}
