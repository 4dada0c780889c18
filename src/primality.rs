//! Primality oracle
//!
//! Trial division over odd candidates up to the integer square root. The bound is
//! checked as `d <= n / d`, so there is no floating-point square root to round the
//! wrong way and no `d * d` product to overflow near `u64::MAX`.

use crate::parallel::SweepRange;

/// Decide whether `n` is prime. Accepts any machine integer; everything below 2 is
/// not prime.
#[inline]
pub fn is_prime(n: i64) -> bool {
    if n < 2 {
        return false;
    }
    is_prime_u64(n.unsigned_abs())
}

/// Unsigned variant used by the counting hot loop.
#[inline]
pub fn is_prime_u64(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n == 2 {
        return true;
    }
    if n % 2 == 0 {
        return false;
    }

    let mut d = 3;
    while d <= n / d {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

/// Count primes in `[start, end)` on the calling thread.
#[inline]
pub fn count_in(start: u64, end: u64) -> u64 {
    (start..end).filter(|&n| is_prime_u64(n)).count() as u64
}

/// Single-threaded ground truth over a whole range
pub fn count_primes_sequential(range: SweepRange) -> u64 {
    count_in(range.start(), range.end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_below_two_is_never_prime() {
        for n in [i64::MIN, -7, -2, -1, 0, 1] {
            assert!(!is_prime(n), "{n} must not be prime");
        }
    }

    #[test]
    fn test_small_values() {
        let primes: Vec<i64> = (0..30).filter(|&n| is_prime(n)).collect();
        assert_eq!(primes, vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
    }

    #[test]
    fn test_squares_of_primes_are_composite() {
        // A bound that stops one short of the root would let these through
        for p in [3u64, 5, 7, 11, 13, 31, 101, 997, 65_521] {
            assert!(!is_prime_u64(p * p), "{} is {p}^2", p * p);
            assert!(!is_prime_u64(p * (p + 2)));
        }
    }

    #[test]
    fn test_large_values() {
        assert!(!is_prime_u64(u64::MAX));
        assert!(!is_prime(i64::MAX));
        assert!(is_prime(2_147_483_647));
        // 2^40 - 87, largest prime below 2^40
        assert!(is_prime_u64(1_099_511_627_689));
        // (2^20 - 3)^2
        assert!(!is_prime_u64(1_048_573 * 1_048_573));
    }

    #[test]
    fn test_count_in_small_ranges() {
        assert_eq!(count_in(2, 2), 0);
        assert_eq!(count_in(2, 10), 4);
        assert_eq!(count_in(2, 100), 25);
        assert_eq!(count_in(90, 100), 1);
        assert_eq!(count_in(0, 3), 1);
    }

    #[test]
    fn test_sequential_range_count() {
        let range = SweepRange::new(1_000).unwrap();
        assert_eq!(count_primes_sequential(range), 168);
    }
}
