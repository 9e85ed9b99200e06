//! Greedy orthogonal bipartitioning of the histogram lattice.
//!
//! Starting from one box spanning all of color space, the partitioner repeatedly picks
//! the box with the greatest variance and splits it along the axis and bin boundary
//! that maximize the separation of the two halves. Every candidate split is scored in
//! constant time against the summed-area moment table.

use crate::{
    HIST_SIDE, MAX_CUBES, PaletteSize,
    histogram::{BinStats, Histogram3, sum_of_squares},
};
use alloc::vec::Vec;
use palette::Srgb;

/// A box over a range of histogram bins.
///
/// Bounds follow the summed-area convention: the minimum is exclusive and the maximum
/// inclusive, so the box covers the bins `min + 1 ..= max` on each axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Cube {
    /// The lower bin indices (exclusive).
    pub(crate) min: [u8; 3],
    /// The upper bin indices (inclusive).
    pub(crate) max: [u8; 3],
}

impl Cube {
    /// The box spanning the whole histogram lattice.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn whole() -> Self {
        Self { min: [0; 3], max: [HIST_SIDE as u8 - 1; 3] }
    }

    /// The number of lattice cells the box covers.
    pub(crate) fn volume(&self) -> u32 {
        self.min
            .iter()
            .zip(self.max)
            .map(|(&min, max)| u32::from(max - min))
            .product()
    }
}

/// Stamp each lattice cell covered by one of `cubes` with that cube's index.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn tag_cubes(cubes: &[Cube]) -> Histogram3<u8, HIST_SIDE> {
    debug_assert!(cubes.len() <= usize::from(u8::MAX) + 1);
    let mut tags = Histogram3::new();
    for (index, cube) in cubes.iter().enumerate() {
        for r in cube.min[0] + 1..=cube.max[0] {
            for g in cube.min[1] + 1..=cube.max[1] {
                for b in cube.min[2] + 1..=cube.max[2] {
                    tags[[r, g, b]] = index as u8;
                }
            }
        }
    }
    tags
}

/// Runs the greedy split search over a summed-area moment table.
pub(crate) struct Partitioner<'a> {
    /// The moment table, already in cumulative form.
    moments: &'a Histogram3<BinStats, HIST_SIDE>,
}

impl<'a> Partitioner<'a> {
    /// Create a [`Partitioner`] over `moments`, which must already hold cumulative sums.
    pub(crate) fn new(moments: &'a Histogram3<BinStats, HIST_SIDE>) -> Self {
        Self { moments }
    }

    /// Returns the sum of the bins inside `cube`.
    ///
    /// Subtractions are grouped so that every intermediate value is a sum over a
    /// subset of the final range, which keeps the unsigned counters from wrapping.
    pub(crate) fn volume(&self, cube: Cube) -> BinStats {
        let moments = self.moments;
        let [g0, b0] = [usize::from(cube.min[1]), usize::from(cube.min[2])];
        let [g1, b1] = [usize::from(cube.max[1]), usize::from(cube.max[2])];
        let slab = |r: usize| {
            (moments[[r, g1, b1]] - moments[[r, g1, b0]])
                - (moments[[r, g0, b1]] - moments[[r, g0, b0]])
        };
        slab(usize::from(cube.max[0])) - slab(usize::from(cube.min[0]))
    }

    /// Returns the sum of the bins of `cube` with one axis pinned to the plane `at`.
    ///
    /// Combined with the same plane at the box minimum, this gives the moment of
    /// either half of a candidate split in constant time.
    fn volume_face(&self, cube: Cube, axis: usize, at: u8) -> BinStats {
        let moments = self.moments;
        let min = cube.min.map(usize::from);
        let max = cube.max.map(usize::from);
        let at = usize::from(at);
        match axis {
            0 => {
                (moments[[at, max[1], max[2]]] - moments[[at, max[1], min[2]]])
                    - (moments[[at, min[1], max[2]]] - moments[[at, min[1], min[2]]])
            }
            1 => {
                (moments[[max[0], at, max[2]]] - moments[[max[0], at, min[2]]])
                    - (moments[[min[0], at, max[2]]] - moments[[min[0], at, min[2]]])
            }
            2 => {
                (moments[[max[0], max[1], at]] - moments[[max[0], min[1], at]])
                    - (moments[[min[0], max[1], at]] - moments[[min[0], min[1], at]])
            }
            #[allow(clippy::panic)]
            _ => panic!("axis must be < 3"),
        }
    }

    /// Compute the variance of the colors inside `cube`: the squared error left by
    /// approximating every pixel in the box with the box mean.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn variance(&self, cube: Cube) -> f64 {
        let BinStats { count, components, sum_squared } = self.volume(cube);
        debug_assert!(count > 0);
        sum_squared - sum_of_squares(components) / count as f64
    }

    /// Find the best split plane of `cube` along `axis`.
    ///
    /// Returns the score of the best plane and its position, or a zero score and no
    /// position when every plane leaves one half empty. The first plane achieving the
    /// maximum wins, keeping results deterministic.
    fn maximize(&self, cube: Cube, axis: usize, whole: BinStats) -> (f64, Option<u8>) {
        let base = self.volume_face(cube, axis, cube.min[axis]);

        let mut best_score = 0.0;
        let mut best_plane = None;
        for plane in cube.min[axis] + 1..cube.max[axis] {
            let lower = self.volume_face(cube, axis, plane) - base;
            if lower.count == 0 {
                continue;
            }
            let upper = whole - lower;
            if upper.count == 0 {
                continue;
            }

            #[allow(clippy::cast_precision_loss)]
            let score = sum_of_squares(lower.components) / lower.count as f64
                + sum_of_squares(upper.components) / upper.count as f64;
            if score > best_score {
                best_score = score;
                best_plane = Some(plane);
            }
        }

        (best_score, best_plane)
    }

    /// Attempt to split `cube` in two, shrinking it in place and returning the upper half.
    ///
    /// The split axis is the one whose best plane scores highest, with ties resolved in
    /// red, green, blue order. Returns `None` when no plane separates two non-empty halves.
    pub(crate) fn cut(&self, cube: &mut Cube) -> Option<Cube> {
        let whole = self.volume(*cube);

        let (score_r, plane_r) = self.maximize(*cube, 0, whole);
        let (score_g, plane_g) = self.maximize(*cube, 1, whole);
        let (score_b, plane_b) = self.maximize(*cube, 2, whole);

        let (axis, plane) = if score_r >= score_g && score_r >= score_b {
            (0, plane_r?)
        } else if score_g >= score_r && score_g >= score_b {
            (1, plane_g?)
        } else {
            (2, plane_b?)
        };

        let mut upper = *cube;
        upper.min[axis] = plane;
        cube.max[axis] = plane;
        Some(upper)
    }

    /// Partition color space into at most `k` boxes.
    ///
    /// Each round splits the box with the greatest variance; a box that cannot be split
    /// drops out of consideration, and the search stops early once no box would shrink
    /// the total error any further.
    pub(crate) fn partition(&self, k: PaletteSize) -> Vec<Cube> {
        let mut cubes = [Cube::default(); MAX_CUBES];
        let mut variances = [0.0f64; MAX_CUBES];
        cubes[0] = Cube::whole();

        let mut next = 0;
        let mut filled = 1;
        while filled < k.as_usize() {
            let mut lower = cubes[next];
            if let Some(upper) = self.cut(&mut lower) {
                variances[next] = self.split_variance(lower);
                variances[filled] = self.split_variance(upper);
                cubes[next] = lower;
                cubes[filled] = upper;
                filled += 1;
            } else {
                variances[next] = 0.0;
            }

            // lowest index wins ties
            let mut best = 0;
            for (index, &variance) in variances.iter().enumerate().take(filled).skip(1) {
                if variance > variances[best] {
                    best = index;
                }
            }
            if variances[best] <= 0.0 {
                break;
            }
            next = best;
        }

        cubes[..filled].to_vec()
    }

    /// The variance used to prioritize further splits; single-cell boxes score zero.
    fn split_variance(&self, cube: Cube) -> f64 {
        if cube.volume() > 1 { self.variance(cube) } else { 0.0 }
    }

    /// Returns the mean color of `cube`, truncated per channel, or black for an
    /// empty box.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn centroid(&self, cube: Cube) -> Srgb<u8> {
        let BinStats { count, components, .. } = self.volume(cube);
        if count == 0 {
            return Srgb::new(0, 0, 0);
        }
        let [r, g, b] = components.map(|component| (component / count) as u8);
        Srgb::new(r, g, b)
    }
}
