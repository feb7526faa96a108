//! Selection Point calculation.
//!
//! The point stays close to the staked balance while rewarding stake age:
//! the advantage term approaches the previous stake as the staking block
//! recedes a year behind the chain head, and collapses to zero the moment
//! a top-up changes the integer ratio `prev / (prev + add)`.

use num_bigint::BigInt;
use num_traits::Zero;

use ember_types::config::DEFAULT_BLOCK_SECONDS;

/// Blocks produced per year at the reference 10-second cadence.
pub const BLOCKS_PER_YEAR: u64 = 3_600_000;

/// Compute a staker's Selection Point.
///
/// All balances are whole-coin denominated. Integer divisions floor toward
/// zero, matching the consensus-critical fixed formula:
///
/// ```text
/// ratio     = min(100, now_block * 100 / (reference_block + stake_block))
/// advantage = prev * (prev / (prev + add)) * ratio / 100
/// point     = prev + advantage + add
/// ```
///
/// `period` rescales the blocks-per-year reference when the chain runs at
/// a cadence other than the default 10 seconds.
pub fn calc_point(
    prev_stake: &BigInt,
    add_stake: &BigInt,
    now_block: &BigInt,
    stake_block: &BigInt,
    period: u64,
) -> BigInt {
    let total = prev_stake + add_stake;
    if total.is_zero() {
        return BigInt::zero();
    }

    let correction = period as f64 / DEFAULT_BLOCK_SECONDS;
    let reference_block = (BLOCKS_PER_YEAR as f64 / correction) as i64;

    let mut ratio = (now_block * 100) / (BigInt::from(reference_block) + stake_block);
    if ratio > BigInt::from(100) {
        ratio = BigInt::from(100);
    }

    let advantage = prev_stake * (prev_stake / &total) * ratio / 100;

    prev_stake + advantage + add_stake
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reproducible_and_non_negative() {
        let result = calc_point(
            &BigInt::from(1000),
            &BigInt::from(80),
            &BigInt::from(7_200_021),
            &BigInt::from(5000),
            360,
        );
        assert_eq!(result, calc_point(
            &BigInt::from(1000),
            &BigInt::from(80),
            &BigInt::from(7_200_021),
            &BigInt::from(5000),
            360,
        ));
        assert!(result >= BigInt::zero());
        // A top-up zeroes the integer prev/(prev+add) factor, so the point
        // is exactly the combined stake.
        assert_eq!(result, BigInt::from(1080));
    }

    #[test]
    fn identity_when_no_top_up_and_no_age() {
        // Chain young enough that the age ratio floors to zero.
        let prev = BigInt::from(1000);
        let point = calc_point(
            &prev,
            &BigInt::zero(),
            &BigInt::from(100),
            &BigInt::from(50),
            10,
        );
        assert_eq!(point, prev);
    }

    #[test]
    fn full_age_doubles_untouched_stake() {
        // Ratio clamps at 100 once a year of blocks has passed, and with
        // no top-up the advantage equals the previous stake.
        let prev = BigInt::from(1000);
        let point = calc_point(
            &prev,
            &BigInt::zero(),
            &BigInt::from(BLOCKS_PER_YEAR * 2),
            &BigInt::from(1),
            10,
        );
        assert_eq!(point, BigInt::from(2000));
    }

    #[test]
    fn zero_everything_is_zero() {
        assert_eq!(
            calc_point(
                &BigInt::zero(),
                &BigInt::zero(),
                &BigInt::from(10),
                &BigInt::zero(),
                10
            ),
            BigInt::zero()
        );
    }

    #[test]
    fn period_rescales_reference_block() {
        // Longer periods shrink the reference window, so the same height
        // yields a larger (clamped earlier) ratio.
        let args = (BigInt::from(500), BigInt::zero(), BigInt::from(200_000), BigInt::from(0));
        let slow = calc_point(&args.0, &args.1, &args.2, &args.3, 360);
        let fast = calc_point(&args.0, &args.1, &args.2, &args.3, 10);
        assert!(slow >= fast);
    }
}
