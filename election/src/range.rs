//! Sub-range bookkeeping for the queue-variant elector.

use std::collections::VecDeque;

use ember_types::Address;

use crate::candidate::Candidates;
use crate::rng::DeterministicRng;

/// A half-open window over the candidate array paired with the span of
/// prefix-sum space it covers: indices `[start, end)` own the weight
/// interval `[min, max]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Range {
    pub min: u64,
    pub max: u64,
    pub start: usize,
    pub end: usize,
}

impl Range {
    /// Elect one candidate from this range.
    ///
    /// Draws a random weight, binary-searches the owning candidate, and
    /// enqueues the surviving sub-ranges on either side. A window already
    /// narrowed to a single candidate is elected without a draw.
    pub(crate) fn binary_search(
        &self,
        queue: &mut VecDeque<Range>,
        candidates: &Candidates,
        rng: &mut DeterministicRng,
    ) -> Address {
        let selections = candidates.as_slice();
        if self.end - self.start <= 1 {
            return selections[self.start].address;
        }
        // A window whose weight span has collapsed (zero-point suffix)
        // cannot be hit by any draw; elect it front-first and requeue the
        // remainder.
        if self.min > self.max {
            queue.push_back(Range {
                min: self.min,
                max: self.max,
                start: self.start + 1,
                end: self.end,
            });
            return selections[self.start].address;
        }

        let random = rng.int_below(self.max - self.min) + self.min;
        let mut start = self.start;
        let mut end = self.end;
        loop {
            let target = (start + end) / 2;
            let a = if target > 0 {
                selections[target - 1].prefix_sum()
            } else {
                self.min
            };
            let b = selections[target].prefix_sum();

            if random >= a && random <= b {
                if self.start != target {
                    queue.push_back(Range {
                        min: self.min,
                        max: a.saturating_sub(1),
                        start: self.start,
                        end: target,
                    });
                }
                if target + 1 != self.end {
                    queue.push_back(Range {
                        min: b + 1,
                        max: self.max,
                        start: target + 1,
                        end: self.end,
                    });
                }
                return selections[target].address;
            }

            if random < a {
                end = target;
            } else {
                start = target + 1;
            }
        }
    }
}
