//! Rank grouping and the per-signer seal delay.
//!
//! Ranks are bucketed into fixed-size groups; a producer waits one
//! `GROUP_DELAY` per group ahead of it plus one `TERM_DELAY` per rank ahead
//! of it inside its own group. The top group races within a single group
//! window, which absorbs ordering jitter without stretching latency.

use std::time::Duration;

use crate::error::EngineError;

/// Delay per signer within the same group.
pub const TERM_DELAY: Duration = Duration::from_millis(100);
/// Delay per group.
pub const GROUP_DELAY: Duration = Duration::from_secs(1);
/// Number of ranks per group.
pub const COMMON_DIFF: u32 = 3;

/// Buckets ranks into consecutive groups.
pub trait SequenceGroup: Send + Sync {
    /// The 1-based group a rank belongs to.
    fn group_order(&self, rank: u32) -> Result<u32, EngineError>;

    /// The inclusive `(start, end)` rank range of a group.
    fn group_range(&self, order: u32) -> Result<(u32, u32), EngineError>;
}

/// Arithmetic grouping: group g covers ranks
/// `[1 + (g − 1) · common_diff, g · common_diff]`.
#[derive(Clone, Copy, Debug)]
pub struct ArithmeticGroup {
    pub common_diff: u32,
}

impl SequenceGroup for ArithmeticGroup {
    fn group_order(&self, rank: u32) -> Result<u32, EngineError> {
        if rank < 1 {
            return Err(EngineError::Unauthorized);
        }
        Ok((rank + self.common_diff - 1) / self.common_diff)
    }

    fn group_range(&self, order: u32) -> Result<(u32, u32), EngineError> {
        if order < 1 {
            return Err(EngineError::Unauthorized);
        }
        let start = 1 + (order - 1) * self.common_diff;
        Ok((start, order * self.common_diff))
    }
}

/// The seal delay a given rank must wait out. Rank 1 seals immediately.
pub fn seal_delay(group: &dyn SequenceGroup, rank: u32) -> Result<Duration, EngineError> {
    if rank <= 1 {
        return Ok(Duration::ZERO);
    }
    let order = group.group_order(rank)?;
    let (start, _) = group.group_range(order)?;
    Ok(GROUP_DELAY * (order - 1) + TERM_DELAY * (rank - start))
}
