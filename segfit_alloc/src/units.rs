//! Strongly-typed wrappers over byte and word counts.
//!
//! Plain `usize` arithmetic makes it easy to accidentally mix up a byte count
//! and a word count (off by a factor of `size_of::<usize>()`). These newtypes
//! make that class of bug a compile error instead of a heap corruption.

use core::mem;
use core::ops;

/// The natural pointer-sized unsigned integer of the target, in bytes.
///
/// Re-exported at the crate root as `segfit_alloc::WORD`.
pub const WORD: usize = mem::size_of::<usize>();

/// Every returned payload address is aligned to this many bytes (2 words).
///
/// Re-exported at the crate root as `segfit_alloc::ALIGNMENT`.
pub const ALIGNMENT: usize = 2 * WORD;

/// Smallest legal block size: header + two free-list link words + footer.
///
/// Re-exported at the crate root as `segfit_alloc::MIN_BLOCK_SIZE`.
pub const MIN_BLOCK_SIZE: usize = 4 * WORD;

/// Rounds `n` up to the nearest multiple of `divisor`, returning the count
/// of `divisor`-sized units (not the rounded byte count itself).
#[inline]
pub(crate) fn round_up_to(n: usize, divisor: usize) -> usize {
    extra_assert!(divisor > 0);
    (n + divisor - 1) / divisor
}

pub(crate) trait RoundUpTo<T> {
    fn round_up_to(self) -> T;
}

macro_rules! define_unit_type {
    ( $name:ident ) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
        pub(crate) struct $name(pub usize);

        impl<T: Into<Self>> ops::Add<T> for $name {
            type Output = Self;

            #[inline]
            fn add(self, rhs: T) -> Self {
                $name(self.0 + rhs.into().0)
            }
        }

        impl<T: Into<Self>> ops::Sub<T> for $name {
            type Output = Self;

            #[inline]
            fn sub(self, rhs: T) -> Self {
                $name(self.0 - rhs.into().0)
            }
        }

        impl<T: Into<Self>> ops::Mul<T> for $name {
            type Output = Self;

            #[inline]
            fn mul(self, rhs: T) -> Self {
                $name(self.0 * rhs.into().0)
            }
        }
    };
}

define_unit_type!(Bytes);
define_unit_type!(Words);

impl From<Words> for Bytes {
    #[inline]
    fn from(words: Words) -> Bytes {
        Bytes(words.0 * mem::size_of::<usize>())
    }
}

impl RoundUpTo<Words> for Bytes {
    #[inline]
    fn round_up_to(self) -> Words {
        Words(round_up_to(self.0, mem::size_of::<usize>()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_to_bytes() {
        assert_eq!(Bytes::from(Words(3)).0, 3 * mem::size_of::<usize>());
    }

    #[test]
    fn round_up_to_words() {
        let w = mem::size_of::<usize>();
        assert_eq!(Bytes(1).round_up_to(), Words(1));
        assert_eq!(Bytes(w).round_up_to(), Words(1));
        assert_eq!(Bytes(w + 1).round_up_to(), Words(2));
    }
}
