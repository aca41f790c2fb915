
use crate::errors::{CapacityKind, PhasingError};

/// The widest Gray code we can enumerate; indices are stored in a u64.
pub const MAX_GRAYCODE_WIDTH: usize = 63;

/// Enumerates all `2^width` values of a reflected binary Gray code.
/// Consecutive values (including the wrap-around from the last to the first) differ in exactly one bit.
/// Each step reports which bit changed relative to the previous value, so callers can update state in O(1).
#[derive(Clone, Debug)]
pub struct GrayCodes {
    /// number of bits in each code
    width: usize,
    /// the number of codes handed out so far
    counter: u64
}

impl GrayCodes {
    /// Creates a new enumerator.
    /// # Arguments
    /// * `width` - the number of bits in each code
    /// # Errors
    /// * if `width` is larger than `MAX_GRAYCODE_WIDTH`
    pub fn new(width: usize) -> Result<GrayCodes, PhasingError> {
        if width > MAX_GRAYCODE_WIDTH {
            return Err(PhasingError::CapacityExceeded {
                what: CapacityKind::CombinatorialWidth,
                position: 0,
                observed: width,
                limit: MAX_GRAYCODE_WIDTH
            });
        }
        Ok(GrayCodes {
            width,
            counter: 0
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Total number of codes, `2^width`.
    pub fn len(&self) -> u64 {
        1_u64 << self.width
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Restarts the enumeration at code 0.
    pub fn reset(&mut self) {
        self.counter = 0;
    }

    /// Returns true if there are more codes to hand out
    pub fn has_next(&self) -> bool {
        self.counter < self.len()
    }

    /// Returns the Gray code at a given rank.
    pub fn code_at(rank: u64) -> u64 {
        rank ^ (rank >> 1)
    }

    /// Returns the bit that flips when moving from `rank-1` to `rank` (rank > 0).
    pub fn changed_bit_at(rank: u64) -> usize {
        debug_assert!(rank > 0);
        rank.trailing_zeros() as usize
    }
}

impl Iterator for GrayCodes {
    /// (code, changed bit); the changed bit is None for the first code
    type Item = (u64, Option<usize>);

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_next() {
            return None;
        }
        let rank = self.counter;
        self.counter += 1;
        let changed = if rank == 0 { None } else { Some(GrayCodes::changed_bit_at(rank)) };
        Some((GrayCodes::code_at(rank), changed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graycode_properties() {
        for width in 0..12 {
            let codes: Vec<(u64, Option<usize>)> = GrayCodes::new(width).unwrap().collect();
            assert_eq!(codes.len() as u64, 1_u64 << width);

            // every value is visited once
            let mut seen = vec![false; codes.len()];
            for &(c, _) in codes.iter() {
                assert!(!seen[c as usize]);
                seen[c as usize] = true;
            }

            // neighbors differ in exactly the reported bit
            for i in 1..codes.len() {
                let diff = codes[i].0 ^ codes[i-1].0;
                assert_eq!(diff.count_ones(), 1);
                assert_eq!(codes[i].1, Some(diff.trailing_zeros() as usize));
            }
            assert_eq!(codes[0], (0, None));

            // wrap-around
            if width > 0 {
                let diff = codes[codes.len()-1].0 ^ codes[0].0;
                assert_eq!(diff.count_ones(), 1);
            }
        }
    }

    #[test]
    fn test_graycode_reset() {
        let mut codes = GrayCodes::new(3).unwrap();
        let first_pass: Vec<_> = codes.by_ref().collect();
        assert!(!codes.has_next());
        codes.reset();
        let second_pass: Vec<_> = codes.collect();
        assert_eq!(first_pass, second_pass);
        assert_eq!(first_pass.iter().map(|c| c.0).collect::<Vec<u64>>(), vec![0, 1, 3, 2, 6, 7, 5, 4]);
    }

    #[test]
    fn test_graycode_capacity() {
        assert!(GrayCodes::new(MAX_GRAYCODE_WIDTH).is_ok());
        match GrayCodes::new(MAX_GRAYCODE_WIDTH + 1) {
            Err(PhasingError::CapacityExceeded { observed, limit, .. }) => {
                assert_eq!(observed, 64);
                assert_eq!(limit, 63);
            },
            _ => panic!("expected capacity error")
        };
    }
}
