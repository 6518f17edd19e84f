//! Morton (Z-order) encoding and range decomposition
//!
//! Interleaving the bits of the coordinates makes every aligned cube of side
//! `2^level` a contiguous run of `2^(level * D)` codes. Range decomposition
//! walks that cube hierarchy: cubes inside the query become one range each,
//! cubes outside are skipped, straddling cubes are split. Once the range
//! budget is spent, straddling cubes are emitted whole, which over-covers
//! but never misses a key.

use crate::{merge_ranges, IndexRange, IndexRanges};

/// Bits per coordinate in 2D codes
pub const BITS_2D: u32 = 32;
/// Bits per coordinate in 3D codes
pub const BITS_3D: u32 = 21;
/// Ranges emitted before straddling cubes stop being split
pub const DEFAULT_RANGE_BUDGET: usize = 512;

/// Spread the low 32 bits of `v` over the even bits of a `u64`
fn spread_by_1(v: u32) -> u64 {
    let mut x = u64::from(v);
    x = (x | (x << 16)) & 0x0000_FFFF_0000_FFFF;
    x = (x | (x << 8)) & 0x00FF_00FF_00FF_00FF;
    x = (x | (x << 4)) & 0x0F0F_0F0F_0F0F_0F0F;
    x = (x | (x << 2)) & 0x3333_3333_3333_3333;
    x = (x | (x << 1)) & 0x5555_5555_5555_5555;
    x
}

/// Inverse of [`spread_by_1`]
fn compact_by_1(z: u64) -> u32 {
    let mut x = z & 0x5555_5555_5555_5555;
    x = (x | (x >> 1)) & 0x3333_3333_3333_3333;
    x = (x | (x >> 2)) & 0x0F0F_0F0F_0F0F_0F0F;
    x = (x | (x >> 4)) & 0x00FF_00FF_00FF_00FF;
    x = (x | (x >> 8)) & 0x0000_FFFF_0000_FFFF;
    x = (x | (x >> 16)) & 0x0000_0000_FFFF_FFFF;
    x as u32
}

/// Spread the low 21 bits of `v` over every third bit of a `u64`
fn spread_by_2(v: u32) -> u64 {
    let mut x = u64::from(v) & 0x1F_FFFF;
    x = (x | (x << 32)) & 0x001F_0000_0000_FFFF;
    x = (x | (x << 16)) & 0x001F_0000_FF00_00FF;
    x = (x | (x << 8)) & 0x100F_00F0_0F00_F00F;
    x = (x | (x << 4)) & 0x10C3_0C30_C30C_30C3;
    x = (x | (x << 2)) & 0x1249_2492_4924_9249;
    x
}

/// Inverse of [`spread_by_2`]
fn compact_by_2(z: u64) -> u32 {
    let mut x = z & 0x1249_2492_4924_9249;
    x = (x | (x >> 2)) & 0x10C3_0C30_C30C_30C3;
    x = (x | (x >> 4)) & 0x100F_00F0_0F00_F00F;
    x = (x | (x >> 8)) & 0x001F_0000_FF00_00FF;
    x = (x | (x >> 16)) & 0x001F_0000_0000_FFFF;
    x = (x | (x >> 32)) & 0x1F_FFFF;
    x as u32
}

/// 2D code; `x` takes the even bits
pub fn encode2(x: u32, y: u32) -> u64 {
    spread_by_1(x) | (spread_by_1(y) << 1)
}

/// Inverse of [`encode2`]
pub fn decode2(z: u64) -> (u32, u32) {
    (compact_by_1(z), compact_by_1(z >> 1))
}

/// 3D code over the low 21 bits of each coordinate
pub fn encode3(x: u32, y: u32, t: u32) -> u64 {
    spread_by_2(x) | (spread_by_2(y) << 1) | (spread_by_2(t) << 2)
}

/// Inverse of [`encode3`]
pub fn decode3(z: u64) -> (u32, u32, u32) {
    (compact_by_2(z), compact_by_2(z >> 1), compact_by_2(z >> 2))
}

/// Inclusive box of coordinates in `D` dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZBox<const D: usize> {
    /// Lower corner
    pub min: [u32; D],
    /// Upper corner (inclusive)
    pub max: [u32; D],
}

struct Decomposer<'a, const D: usize> {
    query: &'a ZBox<D>,
    encode: fn(&[u32; D]) -> u64,
    budget: usize,
    out: IndexRanges,
}

impl<const D: usize> Decomposer<'_, D> {
    fn visit(&mut self, origin: [u32; D], level: u32) {
        let side_max: [u64; D] = std::array::from_fn(|i| u64::from(origin[i]) + (1u64 << level) - 1);

        let disjoint = (0..D).any(|i| {
            u64::from(self.query.max[i]) < u64::from(origin[i])
                || u64::from(self.query.min[i]) > side_max[i]
        });
        if disjoint {
            return;
        }

        let inside = (0..D).all(|i| {
            u64::from(self.query.min[i]) <= u64::from(origin[i])
                && side_max[i] <= u64::from(self.query.max[i])
        });
        if inside || level == 0 || self.out.len() >= self.budget {
            let start = (self.encode)(&origin);
            let span = 1u128 << (level as usize * D);
            let end = (u128::from(start) + span - 1).min(u128::from(u64::MAX)) as u64;
            self.out.push(IndexRange::new(start, end));
            return;
        }

        let half = 1u32 << (level - 1);
        // Child `c` sets bit `i` of its offset when bit `i` of `c` is set;
        // visiting children in ascending `c` visits them in code order.
        for child in 0..(1usize << D) {
            let mut next = origin;
            for (i, coord) in next.iter_mut().enumerate() {
                if child & (1 << i) != 0 {
                    *coord += half;
                }
            }
            self.visit(next, level - 1);
        }
    }
}

/// Code ranges covering every point of `query`
///
/// `bits` is the number of bits per coordinate the codes use; coordinates
/// in `query` must fit in it.
pub fn decompose<const D: usize>(
    query: &ZBox<D>,
    bits: u32,
    encode: fn(&[u32; D]) -> u64,
    budget: usize,
) -> IndexRanges {
    let top = query.max.iter().copied().max().unwrap_or(0);
    // Smallest level whose cube at the origin contains the query.
    let mut level = 0;
    while level < bits && (u64::from(top) >> level) > 0 {
        level += 1;
    }

    let mut decomposer = Decomposer {
        query,
        encode,
        budget,
        out: IndexRanges::new(),
    };
    decomposer.visit([0; D], level);
    let mut ranges = decomposer.out;
    merge_ranges(&mut ranges);
    ranges
}

/// Adapter for [`decompose`] in two dimensions
pub fn encode2_array(p: &[u32; 2]) -> u64 {
    encode2(p[0], p[1])
}

/// Adapter for [`decompose`] in three dimensions
pub fn encode3_array(p: &[u32; 3]) -> u64 {
    encode3(p[0], p[1], p[2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode2_small_values() {
        assert_eq!(encode2(0, 0), 0);
        assert_eq!(encode2(1, 0), 1);
        assert_eq!(encode2(0, 1), 2);
        assert_eq!(encode2(1, 1), 3);
        assert_eq!(encode2(2, 0), 4);
        assert_eq!(encode2(3, 3), 15);
    }

    #[test]
    fn test_encode3_small_values() {
        assert_eq!(encode3(1, 0, 0), 1);
        assert_eq!(encode3(0, 1, 0), 2);
        assert_eq!(encode3(0, 0, 1), 4);
        assert_eq!(encode3(1, 1, 1), 7);
        assert_eq!(encode3(2, 0, 0), 8);
    }

    #[test]
    fn test_decode_inverts_encode() {
        assert_eq!(decode2(encode2(u32::MAX, 12345)), (u32::MAX, 12345));
        assert_eq!(decode3(encode3(0x1F_FFFF, 7, 99)), (0x1F_FFFF, 7, 99));
    }

    #[test]
    fn test_decompose_aligned_quad_is_one_range() {
        let query = ZBox {
            min: [0, 0],
            max: [3, 3],
        };
        let ranges = decompose(&query, BITS_2D, encode2_array, DEFAULT_RANGE_BUDGET);
        assert_eq!(ranges.as_slice(), &[IndexRange::new(0, 15)]);
    }

    #[test]
    fn test_decompose_single_cell() {
        let query = ZBox {
            min: [5, 9],
            max: [5, 9],
        };
        let ranges = decompose(&query, BITS_2D, encode2_array, DEFAULT_RANGE_BUDGET);
        let z = encode2(5, 9);
        assert_eq!(ranges.as_slice(), &[IndexRange::new(z, z)]);
    }

    #[test]
    fn test_decompose_budget_over_covers() {
        let query = ZBox {
            min: [1, 1],
            max: [30, 30],
        };
        let tight = decompose(&query, BITS_2D, encode2_array, DEFAULT_RANGE_BUDGET);
        let coarse = decompose(&query, BITS_2D, encode2_array, 1);
        assert!(coarse.len() <= tight.len());
        for x in 1..=30 {
            for y in 1..=30 {
                let z = encode2(x, y);
                assert!(coarse.iter().any(|r| r.contains(z)));
            }
        }
    }

    proptest! {
        #[test]
        fn prop_decompose2_covers_exactly_when_unbudgeted(
            x0 in 0u32..40, y0 in 0u32..40, w in 0u32..12, h in 0u32..12
        ) {
            let query = ZBox { min: [x0, y0], max: [x0 + w, y0 + h] };
            let ranges = decompose(&query, BITS_2D, encode2_array, usize::MAX);
            let covered: u64 = ranges.iter().map(|r| r.end - r.start + 1).sum();
            prop_assert_eq!(covered, u64::from(w + 1) * u64::from(h + 1));
            for x in x0..=x0 + w {
                for y in y0..=y0 + h {
                    let z = encode2(x, y);
                    prop_assert!(ranges.iter().any(|r| r.contains(z)));
                }
            }
        }

        #[test]
        fn prop_decompose3_covers(
            x0 in 0u32..10, y0 in 0u32..10, t0 in 0u32..10, w in 0u32..5, h in 0u32..5, d in 0u32..5
        ) {
            let query = ZBox { min: [x0, y0, t0], max: [x0 + w, y0 + h, t0 + d] };
            let ranges = decompose(&query, BITS_3D, encode3_array, DEFAULT_RANGE_BUDGET);
            for x in x0..=x0 + w {
                for y in y0..=y0 + h {
                    for t in t0..=t0 + d {
                        let z = encode3(x, y, t);
                        prop_assert!(ranges.iter().any(|r| r.contains(z)));
                    }
                }
            }
            prop_assert!(ranges.windows(2).all(|p| p[0].end < p[1].start));
        }
    }
}
