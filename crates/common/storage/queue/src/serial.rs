// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! 24-bit ring serial numbers.
//!
//! Every record gets a [`Serial`] from the `tip` counter. The space is finite
//! and wraps from `0xFFFFFF` back to `0`, so ordering is only meaningful for
//! values that are close together. Near the wrap point a value in the top
//! boundary band (`0xFFF000..=0xFFFFFF`) sorts *before* a value in the bottom
//! band (`0x000000..=0x000FFF`):
//!
//! ```text
//!   0x000000 ... 0x000FFF  ...  0xFFF000 ... 0xFFFFFF
//!   └── bottom band ──┘          └──── top band ────┘
//!            ▲                             │
//!            └───── "comes after" ─────────┘
//! ```

use std::{cmp::Ordering, fmt, num::ParseIntError, str::FromStr};

/// Number of bits in a serial number.
pub const SERIAL_BITS: u32 = 24;

/// Mask selecting the valid serial bits.
pub const SERIAL_MASK: u32 = (1 << SERIAL_BITS) - 1;

/// Mask selecting the boundary band of a serial (the top 12 bits).
const BAND_MASK: u32 = 0x00FF_F000;

/// Smallest page shift: two records per page.
pub const MIN_PAGE_SHIFT: u32 = 1;

/// Largest page shift the boundary band supports: one page never spans more
/// than the 4096 serials of the band.
pub const MAX_PAGE_SHIFT: u32 = 12;

/// A record's allocation order, a counter in `0..2^24`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Serial(u32);

impl Serial {
    /// The first serial handed out on a fresh queue.
    pub const FIRST: Self = Self(1);
    /// Largest representable serial.
    pub const MAX: Self = Self(SERIAL_MASK);

    /// Creates a serial, discarding any bits above the 24-bit range.
    #[must_use]
    pub const fn new(value: u32) -> Self { Self(value & SERIAL_MASK) }

    #[must_use]
    pub const fn get(self) -> u32 { self.0 }

    /// `(n + 1) mod 2^24`.
    #[must_use]
    pub const fn next(self) -> Self { Self(self.0.wrapping_add(1) & SERIAL_MASK) }

    /// Boundary-aware comparison.
    ///
    /// A serial whose band is the top sentinel precedes one whose band is
    /// zero; everything else is plain numeric order. `Serial` is not `Ord`
    /// because this relation is not transitive across far-apart values.
    #[must_use]
    pub const fn ring_cmp(self, other: Self) -> Ordering {
        let a = self.0 & BAND_MASK;
        let b = other.0 & BAND_MASK;
        if a == BAND_MASK && b == 0 {
            return Ordering::Less;
        }
        if a == 0 && b == BAND_MASK {
            return Ordering::Greater;
        }
        if self.0 < other.0 {
            Ordering::Less
        } else if self.0 > other.0 {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }

    /// `true` when `self` comes strictly after `other` on the ring.
    #[must_use]
    pub const fn is_after(self, other: Self) -> bool {
        matches!(self.ring_cmp(other), Ordering::Greater)
    }

    /// Number of allocations needed to walk from `earlier` to `self`.
    #[must_use]
    pub const fn distance_from(self, earlier: Self) -> u32 {
        self.0.wrapping_sub(earlier.0) & SERIAL_MASK
    }

    /// Page holding this serial for a given page shift.
    #[must_use]
    pub const fn page(self, shift: u32) -> PageId { PageId(self.0 >> shift) }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<u32> for Serial {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value > SERIAL_MASK {
            Err(value)
        } else {
            Ok(Self(value))
        }
    }
}

/// Error returned when text is not a decimal serial in range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseSerialError {
    Invalid(ParseIntError),
    OutOfRange(u32),
}

impl fmt::Display for ParseSerialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(e) => write!(f, "invalid serial: {e}"),
            Self::OutOfRange(v) => write!(f, "serial {v} exceeds {SERIAL_MASK}"),
        }
    }
}

impl std::error::Error for ParseSerialError {}

impl FromStr for Serial {
    type Err = ParseSerialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().parse::<u32>().map_err(ParseSerialError::Invalid)?;
        Self::try_from(value).map_err(ParseSerialError::OutOfRange)
    }
}

/// Identifier of a page (shard) file: `serial >> shift`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageId(pub u32);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Chronological ordering of page ids for one scan.
///
/// Pages normally sort by id. When any page involved in the scan sits in the
/// page-level boundary band, ids are rotated so the band sorts before the low
/// pages that were written after the ring rolled over.
#[derive(Debug, Clone, Copy)]
pub struct PageOrder {
    page_count: u32,
    rotation:   u32,
}

impl PageOrder {
    /// Builds the ordering for `pages` under `shift`.
    pub fn new(shift: u32, pages: impl IntoIterator<Item = PageId>) -> Self {
        let page_count = 1u32 << (SERIAL_BITS - shift);
        let band_start = BAND_MASK >> shift;
        let wrapped = pages.into_iter().any(|p| p.0 >= band_start);
        Self {
            page_count,
            rotation: if wrapped { page_count - band_start } else { 0 },
        }
    }

    /// Sort key: smaller means older.
    #[must_use]
    pub const fn key(&self, page: PageId) -> u32 { (page.0 + self.rotation) % self.page_count }

    #[must_use]
    pub const fn is_rotated(&self) -> bool { self.rotation != 0 }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn test_next_wraps() {
        assert_eq!(Serial::new(5).next(), Serial::new(6));
        assert_eq!(Serial::MAX.next(), Serial::new(0));
    }

    #[test]
    fn test_new_masks_high_bits() {
        assert_eq!(Serial::new(0x0100_0005), Serial::new(5));
        assert_eq!(Serial::try_from(0x0100_0000), Err(0x0100_0000));
    }

    #[test_case(0xFFF0AB, 0x000005, Ordering::Less ; "top band precedes bottom band")]
    #[test_case(0x000005, 0xFFF0AB, Ordering::Greater ; "bottom band follows top band")]
    #[test_case(0xFFFFFF, 0x000000, Ordering::Less ; "exact wrap point")]
    #[test_case(3, 7, Ordering::Less ; "plain less")]
    #[test_case(0x800000, 0x000001, Ordering::Greater ; "outside bands is numeric")]
    #[test_case(0xFFEFFF, 0x000001, Ordering::Greater ; "just below the band is numeric")]
    #[test_case(0xFFF000, 0x001000, Ordering::Greater ; "just above the bottom band is numeric")]
    #[test_case(42, 42, Ordering::Equal ; "reflexive")]
    fn test_ring_cmp(a: u32, b: u32, expected: Ordering) {
        assert_eq!(Serial::new(a).ring_cmp(Serial::new(b)), expected);
    }

    #[test]
    fn test_distance_across_wrap() {
        assert_eq!(Serial::new(2).distance_from(Serial::new(0xFFFFFE)), 4);
        assert_eq!(Serial::new(10).distance_from(Serial::new(10)), 0);
    }

    #[test]
    fn test_parse() {
        assert_eq!("17".parse::<Serial>().unwrap(), Serial::new(17));
        assert_eq!(" 17\n".parse::<Serial>().unwrap(), Serial::new(17));
        assert!("x".parse::<Serial>().is_err());
        assert_eq!(
            "16777216".parse::<Serial>(),
            Err(ParseSerialError::OutOfRange(16_777_216))
        );
    }

    #[test]
    fn test_page() {
        assert_eq!(Serial::new(7).page(3), PageId(0));
        assert_eq!(Serial::new(8).page(3), PageId(1));
        assert_eq!(Serial::MAX.page(12), PageId(0xFFF));
    }

    #[test]
    fn test_page_order_plain() {
        let order = PageOrder::new(3, [PageId(0), PageId(5)]);
        assert!(!order.is_rotated());
        assert!(order.key(PageId(0)) < order.key(PageId(5)));
    }

    #[test]
    fn test_page_order_rotated_across_wrap() {
        let top = Serial::MAX.page(3);
        let order = PageOrder::new(3, [PageId(0), top]);
        assert!(order.is_rotated());
        assert!(order.key(top) < order.key(PageId(0)));
        assert!(order.key(PageId(0)) < order.key(PageId(1)));
    }

    #[test]
    fn test_page_order_band_only_keeps_relative_order() {
        let a = Serial::new(0xFFF000).page(6);
        let b = Serial::new(0xFFFFC0).page(6);
        let order = PageOrder::new(6, [a, b]);
        assert!(order.key(a) < order.key(b));
    }
}
