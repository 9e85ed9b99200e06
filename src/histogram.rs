//! The coarse RGB histogram and its summed-area (moment) form.
//!
//! Colors are binned by their top 5 bits per channel into a `33³` lattice whose row 0
//! on every axis is a permanently zero border. After accumulation the whole table is
//! converted in place into 3D inclusive prefix sums, which lets the partitioner
//! evaluate any axis-aligned box of bins with a handful of lookups.

use crate::HIST_SIDE;
use alloc::boxed::Box;
use bytemuck::Zeroable;
use core::ops::{Add, AddAssign, Index, IndexMut, Sub};
use num_traits::Zero;
use palette::Srgb;

/// Statistics for a histogram bin.
///
/// One cell fuses the five per-bin quantities the quantizer needs: the pixel count,
/// the per-channel color sums, and the sum of squared channel magnitudes.
#[derive(Clone, Copy, Debug, PartialEq, Zeroable)]
pub(crate) struct BinStats {
    /// The number of pixels assigned to the bin.
    pub(crate) count: u64,
    /// The component-wise sum of the colors assigned to the bin.
    pub(crate) components: [u64; 3],
    /// The sum of `r² + g² + b²` over the colors assigned to the bin.
    pub(crate) sum_squared: f64,
}

impl Add for BinStats {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self {
            count: self.count + rhs.count,
            components: [
                self.components[0] + rhs.components[0],
                self.components[1] + rhs.components[1],
                self.components[2] + rhs.components[2],
            ],
            sum_squared: self.sum_squared + rhs.sum_squared,
        }
    }
}

impl Sub for BinStats {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            count: self.count - rhs.count,
            components: [
                self.components[0] - rhs.components[0],
                self.components[1] - rhs.components[1],
                self.components[2] - rhs.components[2],
            ],
            sum_squared: self.sum_squared - rhs.sum_squared,
        }
    }
}

impl AddAssign for BinStats {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.count += rhs.count;
        for (component, value) in self.components.iter_mut().zip(rhs.components) {
            *component += value;
        }
        self.sum_squared += rhs.sum_squared;
    }
}

impl Zero for BinStats {
    #[inline]
    fn zero() -> Self {
        Self { count: 0, components: [0; 3], sum_squared: 0.0 }
    }

    #[inline]
    fn is_zero(&self) -> bool {
        self.count == 0
    }
}

/// Returns the sum of the squares of the given components.
#[inline]
#[allow(clippy::cast_precision_loss)]
pub(crate) fn sum_of_squares(components: [u64; 3]) -> f64 {
    let mut square = 0.0;
    for component in components {
        let component = component as f64;
        square += component * component;
    }
    square
}

/// Returns the 1-based histogram bin for each channel of `color`.
///
/// The top 5 bits of a channel select one of 32 bins; the `+ 1` skips the zero
/// border row, landing in `1..=32`.
#[inline]
pub(crate) fn bin_of(color: Srgb<u8>) -> [u8; 3] {
    [color.red, color.green, color.blue].map(|channel| (channel >> 3) + 1)
}

/// Returns the flat index of a histogram bin, matching the memory layout of
/// [`Histogram3`].
#[allow(clippy::cast_possible_truncation)]
#[inline]
pub(crate) fn flat_bin_index(bin: [u8; 3]) -> u16 {
    let [r, g, b] = bin.map(usize::from);
    ((r * HIST_SIDE + g) * HIST_SIDE + b) as u16
}

/// A new type wrapper around a cube-shaped 3-dimensional array.
#[repr(transparent)]
#[derive(Debug, Clone)]
pub(crate) struct Histogram3<T, const B: usize>(Box<[[[T; B]; B]; B]>);

impl<T, const B: usize> Index<[usize; 3]> for Histogram3<T, B> {
    type Output = T;

    #[inline]
    fn index(&self, index: [usize; 3]) -> &Self::Output {
        &self.0[index[0]][index[1]][index[2]]
    }
}

impl<T, const B: usize> IndexMut<[usize; 3]> for Histogram3<T, B> {
    #[inline]
    fn index_mut(&mut self, index: [usize; 3]) -> &mut Self::Output {
        &mut self.0[index[0]][index[1]][index[2]]
    }
}

impl<T, const B: usize> Index<[u8; 3]> for Histogram3<T, B> {
    type Output = T;

    #[inline]
    fn index(&self, index: [u8; 3]) -> &Self::Output {
        &self[index.map(usize::from)]
    }
}

impl<T, const B: usize> IndexMut<[u8; 3]> for Histogram3<T, B> {
    #[inline]
    fn index_mut(&mut self, index: [u8; 3]) -> &mut Self::Output {
        &mut self[index.map(usize::from)]
    }
}

impl<T, const B: usize> Histogram3<T, B>
where
    T: Zero + Zeroable + PartialEq,
{
    /// Create a new [`Histogram3`] from zeroed memory.
    pub(crate) fn new() -> Self {
        const {
            assert!(1 <= B && B <= u8::MAX as usize);
        }
        assert!(
            T::zero() == T::zeroed(),
            "the zero value for the bin type should be representable by the all zero byte pattern"
        );
        Self(bytemuck::zeroed_box())
    }
}

impl<T, const B: usize> Histogram3<T, B> {
    /// Returns a flat slice of bins, laid out with the last index varying fastest.
    #[inline]
    pub(crate) fn as_flattened(&self) -> &[T] {
        self.0.as_flattened().as_flattened()
    }
}

impl<T, const B: usize> Histogram3<T, B>
where
    T: Zero + Copy + AddAssign + Add<Output = T>,
{
    /// Convert the histogram bins in place into 3D inclusive prefix sums.
    ///
    /// Bins must only occupy indices `1..B`; the zero border at index 0 is what makes
    /// the inclusion-exclusion lookups uniform. Runs in one pass with a single row of
    /// auxiliary state per red slice.
    pub(crate) fn calc_cumulative_moments(&mut self) {
        for r in 1..B {
            let area = &mut [T::zero(); B];

            for g in 1..B {
                let mut line = T::zero();

                for b in 1..B {
                    line += self[[r, g, b]];
                    let area = &mut area[b];
                    *area += line;
                    self[[r, g, b]] = self[[r - 1, g, b]] + *area;
                }
            }
        }
    }
}

/// The number of `u64` words needed for one presence bit per RGB triple.
const COLOR_SET_WORDS: usize = (1 << 24) / u64::BITS as usize;

/// Records which distinct flattened colors have been seen.
///
/// One bit per 24-bit RGB triple, packed into `u64` words so that counting is a
/// popcount sweep rather than a walk over all 2²⁴ bits.
pub(crate) struct ColorSet(Box<[u64; COLOR_SET_WORDS]>);

impl ColorSet {
    /// Create an empty [`ColorSet`].
    pub(crate) fn new() -> Self {
        Self(bytemuck::zeroed_box())
    }

    /// Record `color` as seen.
    #[inline]
    pub(crate) fn insert(&mut self, color: Srgb<u8>) {
        let packed = u32::from(color.red) << 16 | u32::from(color.green) << 8
            | u32::from(color.blue);
        let word = (packed / u64::BITS) as usize;
        let bit = packed % u64::BITS;
        self.0[word] |= 1 << bit;
    }

    /// Returns the number of distinct colors recorded so far.
    pub(crate) fn count(&self) -> u32 {
        self.0.iter().map(|word| word.count_ones()).sum()
    }
}
