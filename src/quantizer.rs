//! The stateful quantizer tying together flattening, histogram accumulation,
//! partitioning, palette refinement, and the palette index stream.

use crate::{
    HIST_SIDE, Palette, PaletteBuf, PaletteSize, QuantizeError,
    flatten::Flattener,
    histogram::{BinStats, ColorSet, Histogram3, bin_of, flat_bin_index, sum_of_squares},
    partition::{Partitioner, tag_cubes},
};
use alloc::{vec, vec::Vec};
use core::mem;
use palette::Srgb;

/// The nearest-centroid search starts from this distance, far above any possible
/// squared RGB distance, so the first candidate always replaces it.
const INITIAL_BEST_DISTANCE: i32 = 100_000_000;

/// Reduces the colors of one image to a palette of representative colors.
///
/// A quantizer walks a strict lifecycle: [`prepare`](Self::prepare) declares the image
/// dimensions, [`add_color`](Self::add_color) is called once per pixel in order,
/// [`build_palette`](Self::build_palette) runs the partitioner exactly once, and
/// [`palette_index_for_next_pixel`](Self::palette_index_for_next_pixel) then streams
/// the palette index of every pixel back in the original order. Calls outside this
/// order fail with [`QuantizeError::InvalidState`].
///
/// Translucent input pixels are composited onto the configured background color
/// (white unless overridden with [`with_background`](Self::with_background)) before
/// they enter the histogram. The resulting palette is always fully opaque.
///
/// A quantizer serves exactly one image; quantizing another image means creating
/// another instance. Instances own all of their tables and may freely live on
/// different threads.
///
/// # Examples
///
/// ```
/// use palcube::{PaletteSize, Quantizer};
///
/// # fn main() -> Result<(), palcube::QuantizeError> {
/// let mut quantizer = Quantizer::new();
/// quantizer.prepare(1, 2)?;
/// quantizer.add_color(0xFF112233)?;
/// quantizer.add_color(0xFFEEDDCC)?;
/// let palette = quantizer.build_palette(PaletteSize::MIN)?;
/// assert_eq!(palette.len(), 2);
/// # Ok(())
/// # }
/// ```
pub struct Quantizer {
    /// Composites translucent pixels onto the configured background.
    flattener: Flattener,
    /// Where the instance currently is in its lifecycle.
    state: State,
}

/// The lifecycle states of a [`Quantizer`].
enum State {
    /// Freshly constructed; waiting for `prepare`.
    Empty,
    /// Accepting colors into the histogram.
    Accumulating(Accumulator),
    /// Palette built; serving index queries.
    Indexed(Indexed),
}

/// Everything accumulated between `prepare` and `build_palette`.
struct Accumulator {
    /// The pixel count declared by `prepare`.
    expected: u64,
    /// The histogram of fused bin statistics, later converted to cumulative form.
    hist: Histogram3<BinStats, HIST_SIDE>,
    /// Which distinct flattened colors have been seen.
    seen: ColorSet,
    /// The flat histogram bin of every pixel, in input order.
    bins: Vec<u16>,
    /// The flattened color of every pixel, in input order.
    colors: Vec<Srgb<u8>>,
}

impl Accumulator {
    /// Record one flattened color.
    fn add(&mut self, color: Srgb<u8>) {
        let bin = bin_of(color);
        let components = [color.red, color.green, color.blue].map(u64::from);

        let stats = &mut self.hist[bin];
        stats.count += 1;
        for (sum, value) in stats.components.iter_mut().zip(components) {
            *sum += value;
        }
        stats.sum_squared += sum_of_squares(components);

        self.seen.insert(color);
        self.bins.push(flat_bin_index(bin));
        self.colors.push(color);
    }

    /// The number of colors added so far.
    fn added(&self) -> u64 {
        self.colors.len() as u64
    }
}

/// The retained results of `build_palette`.
struct Indexed {
    /// Which distinct flattened colors were seen, kept for the distinct-color query.
    seen: ColorSet,
    /// The final palette, at most as long as the requested size.
    palette: PaletteBuf<Srgb<u8>>,
    /// The palette index of every pixel, in input order.
    indices: Vec<u8>,
    /// How far the index stream has been read.
    cursor: usize,
}

impl Quantizer {
    /// Create a [`Quantizer`] that composites translucent pixels onto white.
    #[must_use]
    pub fn new() -> Self {
        Self::with_background(Flattener::default_background())
    }

    /// Create a [`Quantizer`] that composites translucent pixels onto `background`.
    #[must_use]
    pub fn with_background(background: Srgb<u8>) -> Self {
        Self { flattener: Flattener::new(background), state: State::Empty }
    }

    /// Returns the background color translucent pixels are composited onto.
    #[inline]
    #[must_use]
    pub fn background(&self) -> Srgb<u8> {
        self.flattener.background()
    }

    /// Declare the dimensions of the image about to be added.
    ///
    /// Allocates the histogram and per-pixel tables for `width * height` pixels.
    ///
    /// # Errors
    ///
    /// Returns [`QuantizeError::InvalidState`] if called more than once and
    /// [`QuantizeError::OutOfRange`] for a zero-sized image.
    pub fn prepare(&mut self, width: u32, height: u32) -> Result<(), QuantizeError> {
        if !matches!(self.state, State::Empty) {
            return Err(QuantizeError::InvalidState);
        }
        let expected = u64::from(width) * u64::from(height);
        if expected == 0 {
            return Err(QuantizeError::OutOfRange);
        }

        let capacity = usize::try_from(expected).unwrap_or(usize::MAX);
        self.state = State::Accumulating(Accumulator {
            expected,
            hist: Histogram3::new(),
            seen: ColorSet::new(),
            bins: Vec::with_capacity(capacity),
            colors: Vec::with_capacity(capacity),
        });
        Ok(())
    }

    /// Add the next pixel of the image as a packed `0xAARRGGBB` value.
    ///
    /// Pixels must be added in the order their palette indices will later be read.
    ///
    /// # Errors
    ///
    /// Returns [`QuantizeError::InvalidState`] before `prepare` or after
    /// `build_palette`, and [`QuantizeError::CapacityExceeded`] once more pixels have
    /// been added than `prepare` declared.
    pub fn add_color(&mut self, argb: u32) -> Result<(), QuantizeError> {
        let State::Accumulating(accumulator) = &mut self.state else {
            return Err(QuantizeError::InvalidState);
        };
        if accumulator.added() >= accumulator.expected {
            return Err(QuantizeError::CapacityExceeded);
        }
        accumulator.add(self.flattener.flatten(argb));
        Ok(())
    }

    /// Returns the number of distinct colors seen so far, after compositing.
    ///
    /// # Errors
    ///
    /// Returns [`QuantizeError::InvalidState`] before `prepare`.
    pub fn distinct_color_count(&self) -> Result<u32, QuantizeError> {
        match &self.state {
            State::Empty => Err(QuantizeError::InvalidState),
            State::Accumulating(accumulator) => Ok(accumulator.seen.count()),
            State::Indexed(indexed) => Ok(indexed.seen.count()),
        }
    }

    /// Partition color space and build a palette of at most `k` colors.
    ///
    /// The palette may come out shorter than `k` when no remaining box of color space
    /// can be profitably split. After the greedy partition, every pixel is reassigned
    /// to its nearest palette color and each palette entry is recentered on the pixels
    /// it actually won; the per-pixel assignments are retained for
    /// [`palette_index_for_next_pixel`](Self::palette_index_for_next_pixel).
    ///
    /// # Errors
    ///
    /// Returns [`QuantizeError::InvalidState`] unless every declared pixel has been
    /// added and the palette has not already been built.
    pub fn build_palette(&mut self, k: PaletteSize) -> Result<&Palette<Srgb<u8>>, QuantizeError> {
        match &self.state {
            State::Accumulating(accumulator) if accumulator.added() == accumulator.expected => {}
            _ => return Err(QuantizeError::InvalidState),
        }
        let State::Accumulating(accumulator) = mem::replace(&mut self.state, State::Empty) else {
            return Err(QuantizeError::InvalidState);
        };

        let Accumulator { mut hist, seen, bins, colors, .. } = accumulator;
        hist.calc_cumulative_moments();

        let partitioner = Partitioner::new(&hist);
        let cubes = partitioner.partition(k);
        let tags = tag_cubes(&cubes);
        let centroids: Vec<Srgb<u8>> =
            cubes.iter().map(|&cube| partitioner.centroid(cube)).collect();

        let (palette, indices) = refine(&centroids, &tags, &bins, &colors);

        self.state = State::Indexed(Indexed { seen, palette, indices, cursor: 0 });
        if let State::Indexed(indexed) = &self.state {
            Ok(indexed.palette.as_palette())
        } else {
            Err(QuantizeError::InvalidState)
        }
    }

    /// Returns the palette index of the next pixel, in the order pixels were added.
    ///
    /// The stream starts at the first pixel after `build_palette` and yields exactly
    /// one index per added pixel.
    ///
    /// # Errors
    ///
    /// Returns [`QuantizeError::InvalidState`] before `build_palette` and
    /// [`QuantizeError::OutOfRange`] once every pixel's index has been read.
    pub fn palette_index_for_next_pixel(&mut self) -> Result<u8, QuantizeError> {
        let State::Indexed(indexed) = &mut self.state else {
            return Err(QuantizeError::InvalidState);
        };
        let index = indexed
            .indices
            .get(indexed.cursor)
            .copied()
            .ok_or(QuantizeError::OutOfRange)?;
        indexed.cursor += 1;
        Ok(index)
    }

    /// Returns the palette index of the nearest palette color to `argb`.
    ///
    /// The pixel is composited onto the background first, and distance ties resolve
    /// to the lowest palette index, matching the per-pixel assignments.
    ///
    /// # Errors
    ///
    /// Returns [`QuantizeError::InvalidState`] before `build_palette`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn palette_index_for_color(&self, argb: u32) -> Result<u8, QuantizeError> {
        let State::Indexed(indexed) = &self.state else {
            return Err(QuantizeError::InvalidState);
        };
        let color = self.flattener.flatten(argb);

        let mut best = 0;
        let mut best_distance = INITIAL_BEST_DISTANCE;
        for (index, &candidate) in indexed.palette.as_slice().iter().enumerate() {
            let distance = distance_squared(color, candidate);
            if distance < best_distance {
                best_distance = distance;
                best = index;
            }
        }
        Ok(best as u8)
    }

    /// Returns the palette once it has been built.
    #[inline]
    #[must_use]
    pub fn palette(&self) -> Option<&Palette<Srgb<u8>>> {
        match &self.state {
            State::Indexed(indexed) => Some(indexed.palette.as_palette()),
            _ => None,
        }
    }

    /// Returns the palette index of every pixel, in input order, once the palette has
    /// been built.
    #[inline]
    #[must_use]
    pub fn indices(&self) -> Option<&[u8]> {
        match &self.state {
            State::Indexed(indexed) => Some(&indexed.indices),
            _ => None,
        }
    }

    /// Consume the quantizer and return its palette and per-pixel indices.
    ///
    /// # Errors
    ///
    /// Returns [`QuantizeError::InvalidState`] before `build_palette`.
    pub fn into_quantized(self) -> Result<Quantized, QuantizeError> {
        match self.state {
            State::Indexed(indexed) => Ok(Quantized {
                palette: indexed.palette,
                indices: indexed.indices,
            }),
            _ => Err(QuantizeError::InvalidState),
        }
    }
}

#[cfg(feature = "image")]
impl Quantizer {
    /// Add every pixel of `image` in row-major order.
    ///
    /// # Errors
    ///
    /// Forwards the errors of [`add_color`](Self::add_color).
    pub fn add_rgba_image(&mut self, image: &image::RgbaImage) -> Result<(), QuantizeError> {
        for &image::Rgba([r, g, b, a]) in image.pixels() {
            self.add_color(u32::from_be_bytes([a, r, g, b]))?;
        }
        Ok(())
    }
}

impl Default for Quantizer {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

/// A quantized image: the palette plus one palette index per input pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quantized {
    /// The palette of representative colors.
    palette: PaletteBuf<Srgb<u8>>,
    /// The palette index of every pixel, in input order.
    indices: Vec<u8>,
}

impl Quantized {
    /// Returns the palette of representative colors.
    #[inline]
    #[must_use]
    pub fn palette(&self) -> &Palette<Srgb<u8>> {
        self.palette.as_palette()
    }

    /// Returns the palette index of every pixel, in input order.
    #[inline]
    #[must_use]
    pub fn indices(&self) -> &[u8] {
        &self.indices
    }

    /// Split a [`Quantized`] into its palette and indices.
    #[must_use]
    pub fn into_parts(self) -> (PaletteBuf<Srgb<u8>>, Vec<u8>) {
        (self.palette, self.indices)
    }
}

/// Quantize a whole image of packed `0xAARRGGBB` pixels in one call.
///
/// Translucent pixels are composited onto white; use [`quantize_with_background`] to
/// composite onto another color.
///
/// # Errors
///
/// Returns [`QuantizeError::OutOfRange`] if `pixels` does not hold exactly
/// `width * height` entries or the image is zero-sized.
///
/// # Examples
///
/// ```
/// use palcube::{PaletteSize, quantize};
///
/// # fn main() -> Result<(), palcube::QuantizeError> {
/// let pixels = [0xFF000000u32, 0xFF000000, 0xFFFFFFFF, 0xFFFFFFFF];
/// let quantized = quantize(&pixels, (4, 1), PaletteSize::MIN)?;
/// assert_eq!(quantized.palette().len(), 2);
/// assert_eq!(quantized.indices()[0], quantized.indices()[1]);
/// # Ok(())
/// # }
/// ```
pub fn quantize(
    pixels: &[u32],
    (width, height): (u32, u32),
    k: PaletteSize,
) -> Result<Quantized, QuantizeError> {
    quantize_with_background(pixels, (width, height), k, Flattener::default_background())
}

/// Quantize a whole image, compositing translucent pixels onto `background`.
///
/// # Errors
///
/// See [`quantize`].
pub fn quantize_with_background(
    pixels: &[u32],
    (width, height): (u32, u32),
    k: PaletteSize,
    background: Srgb<u8>,
) -> Result<Quantized, QuantizeError> {
    if pixels.len() as u64 != u64::from(width) * u64::from(height) {
        return Err(QuantizeError::OutOfRange);
    }
    let mut quantizer = Quantizer::with_background(background);
    quantizer.prepare(width, height)?;
    for &pixel in pixels {
        quantizer.add_color(pixel)?;
    }
    quantizer.build_palette(k)?;
    quantizer.into_quantized()
}

/// Quantize a decoded RGBA image in one call.
///
/// # Errors
///
/// Returns [`QuantizeError::OutOfRange`] for a zero-sized image.
#[cfg(feature = "image")]
pub fn quantize_rgba_image(
    image: &image::RgbaImage,
    k: PaletteSize,
) -> Result<Quantized, QuantizeError> {
    let mut quantizer = Quantizer::new();
    quantizer.prepare(image.width(), image.height())?;
    quantizer.add_rgba_image(image)?;
    quantizer.build_palette(k)?;
    quantizer.into_quantized()
}

/// Reassign every pixel to its nearest centroid and recenter each palette entry on
/// the pixels it won.
///
/// The incumbent assignment comes from the box that claimed the pixel's histogram
/// bin; any strictly closer centroid takes over, so equal distances keep the lowest
/// palette index. Entries that win no pixels keep their unrefined centroid.
fn refine(
    centroids: &[Srgb<u8>],
    tags: &Histogram3<u8, HIST_SIDE>,
    bins: &[u16],
    colors: &[Srgb<u8>],
) -> (PaletteBuf<Srgb<u8>>, Vec<u8>) {
    let mut sums = vec![[0u64; 3]; centroids.len()];
    let mut counts = vec![0u64; centroids.len()];
    let mut indices = Vec::with_capacity(colors.len());

    let flat_tags = tags.as_flattened();
    for (&bin, &color) in bins.iter().zip(colors) {
        let mut best = usize::from(flat_tags[usize::from(bin)]);
        let mut best_distance = INITIAL_BEST_DISTANCE;
        for (index, &centroid) in centroids.iter().enumerate() {
            let distance = distance_squared(color, centroid);
            if distance < best_distance {
                best_distance = distance;
                best = index;
            }
        }

        let [r_sum, g_sum, b_sum] = &mut sums[best];
        *r_sum += u64::from(color.red);
        *g_sum += u64::from(color.green);
        *b_sum += u64::from(color.blue);
        counts[best] += 1;
        #[allow(clippy::cast_possible_truncation)]
        indices.push(best as u8);
    }

    let palette = centroids
        .iter()
        .enumerate()
        .map(|(index, &centroid)| {
            let count = counts[index];
            if count == 0 {
                centroid
            } else {
                #[allow(clippy::cast_possible_truncation)]
                let [r, g, b] = sums[index].map(|sum| (sum / count) as u8);
                Srgb::new(r, g, b)
            }
        })
        .collect();

    (PaletteBuf::new_unchecked(palette), indices)
}

/// Squared euclidean distance between two colors in RGB.
#[inline]
fn distance_squared(a: Srgb<u8>, b: Srgb<u8>) -> i32 {
    let dr = i32::from(a.red) - i32::from(b.red);
    let dg = i32::from(a.green) - i32::from(b.green);
    let db = i32::from(a.blue) - i32::from(b.blue);
    dr * dr + dg * dg + db * db
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::*;

    /// Run the full lifecycle over opaque `pixels` laid out as a single row.
    fn quantize_row(pixels: &[u32], k: PaletteSize) -> Quantized {
        #[allow(clippy::cast_possible_truncation)]
        let width = pixels.len() as u32;
        quantize(pixels, (width, 1), k).unwrap()
    }

    #[test]
    fn operations_outside_the_lifecycle_are_rejected() {
        let mut quantizer = Quantizer::new();
        assert_eq!(quantizer.add_color(0xFF000000), Err(QuantizeError::InvalidState));
        assert_eq!(quantizer.distinct_color_count(), Err(QuantizeError::InvalidState));
        assert_eq!(
            quantizer.build_palette(PaletteSize::MIN).err(),
            Some(QuantizeError::InvalidState)
        );
        assert_eq!(
            quantizer.palette_index_for_next_pixel(),
            Err(QuantizeError::InvalidState)
        );
        assert_eq!(
            quantizer.palette_index_for_color(0xFF000000),
            Err(QuantizeError::InvalidState)
        );
        assert!(quantizer.palette().is_none());
        assert!(quantizer.indices().is_none());

        quantizer.prepare(2, 1).unwrap();
        assert_eq!(quantizer.prepare(2, 1), Err(QuantizeError::InvalidState));

        // the palette cannot be built until every declared pixel has arrived
        quantizer.add_color(0xFF000000).unwrap();
        assert_eq!(
            quantizer.build_palette(PaletteSize::MIN).err(),
            Some(QuantizeError::InvalidState)
        );

        quantizer.add_color(0xFFFFFFFF).unwrap();
        assert_eq!(quantizer.add_color(0xFF123456), Err(QuantizeError::CapacityExceeded));

        quantizer.build_palette(PaletteSize::MIN).unwrap();
        assert_eq!(quantizer.add_color(0xFF000000), Err(QuantizeError::InvalidState));
        assert_eq!(
            quantizer.build_palette(PaletteSize::MIN).err(),
            Some(QuantizeError::InvalidState)
        );

        quantizer.palette_index_for_next_pixel().unwrap();
        quantizer.palette_index_for_next_pixel().unwrap();
        assert_eq!(
            quantizer.palette_index_for_next_pixel(),
            Err(QuantizeError::OutOfRange)
        );
    }

    #[test]
    fn zero_sized_images_are_rejected() {
        let mut quantizer = Quantizer::new();
        assert_eq!(quantizer.prepare(0, 100), Err(QuantizeError::OutOfRange));
        assert_eq!(quantize(&[], (0, 0), PaletteSize::MIN), Err(QuantizeError::OutOfRange));
        assert_eq!(
            quantize(&[0xFF000000], (2, 1), PaletteSize::MIN),
            Err(QuantizeError::OutOfRange)
        );
    }

    #[test]
    fn a_single_color_image_collapses_to_one_entry() {
        let pixels = alloc::vec![opaque(255, 0, 0); 100];

        let mut quantizer = Quantizer::new();
        quantizer.prepare(10, 10).unwrap();
        for &pixel in &pixels {
            quantizer.add_color(pixel).unwrap();
        }
        assert_eq!(quantizer.distinct_color_count().unwrap(), 1);

        let palette = quantizer.build_palette(PaletteSize::try_from(4u16).unwrap()).unwrap();
        assert_eq!(palette, [Srgb::new(255u8, 0, 0)]);

        for _ in 0..pixels.len() {
            assert_eq!(quantizer.palette_index_for_next_pixel().unwrap(), 0);
        }
        assert_eq!(quantizer.distinct_color_count().unwrap(), 1);
    }

    #[test]
    fn two_well_separated_clusters_get_one_entry_each() {
        let pixels = two_clusters();
        let quantized = quantize_row(&pixels, PaletteSize::MIN);

        let palette = quantized.palette();
        assert_eq!(palette.len(), 2);
        assert!(palette.as_slice().contains(&Srgb::new(0, 0, 0)));
        assert!(palette.as_slice().contains(&Srgb::new(255, 255, 255)));

        let indices = quantized.indices();
        let black = indices[0];
        let white = indices[99];
        assert_ne!(black, white);
        assert!(indices[..50].iter().all(|&index| index == black));
        assert!(indices[50..].iter().all(|&index| index == white));
    }

    #[test]
    fn translucent_pixels_are_composited_before_quantization() {
        let mut quantizer = Quantizer::new();
        quantizer.prepare(1, 1).unwrap();
        quantizer.add_color(argb(0x80, 255, 0, 0)).unwrap();
        let palette = quantizer.build_palette(PaletteSize::MIN).unwrap();
        assert_eq!(palette, [Srgb::new(255u8, 127, 127)]);
    }

    #[test]
    fn a_grayscale_ramp_maps_monotonically() {
        let pixels = gray_ramp();
        let k = PaletteSize::try_from(8u16).unwrap();
        let quantized = quantize_row(&pixels, k);

        let palette = quantized.palette();
        assert_eq!(palette.len(), 8);
        for color in palette {
            // gray in, gray out
            assert_eq!(color.red, color.green);
            assert_eq!(color.green, color.blue);
        }

        // darker pixels never map to lighter palette entries than lighter pixels
        let grays: Vec<u8> = quantized
            .indices()
            .iter()
            .map(|&index| palette[index].red)
            .collect();
        assert!(grays.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn overrequesting_returns_one_entry_per_distinct_color() {
        let colors = [
            Srgb::new(0u8, 0, 0),
            Srgb::new(255, 0, 0),
            Srgb::new(0, 255, 0),
            Srgb::new(0, 0, 255),
        ];
        let mut pixels = Vec::new();
        for &color in &colors {
            pixels.extend(alloc::vec![opaque(color.red, color.green, color.blue); 3]);
        }

        let quantized = quantize_row(&pixels, PaletteSize::try_from(16u16).unwrap());
        let palette = quantized.palette();
        assert_eq!(palette.len(), colors.len());
        for &color in &colors {
            assert!(palette.as_slice().contains(&color));
        }

        // every pixel maps exactly onto its own color
        assert_eq!(squared_error(&pixels, &quantized), 0);
    }

    #[test]
    fn error_never_grows_with_more_palette_entries() {
        let pixels = gray_ramp();
        let mut previous = u64::MAX;
        for k in [2u16, 4, 8, 16, 32] {
            let quantized = quantize_row(&pixels, PaletteSize::from_u16_clamped(k));
            let error = squared_error(&pixels, &quantized);
            assert!(error <= previous, "error grew from {previous} to {error} at k = {k}");
            previous = error;
        }
    }

    #[test]
    fn requantizing_a_quantized_image_does_not_lose_accuracy() {
        let pixels = gray_ramp();
        let k = PaletteSize::try_from(8u16).unwrap();
        let quantized = quantize_row(&pixels, k);
        let first_error = squared_error(&pixels, &quantized);

        let reconstructed: Vec<u32> = quantized
            .indices()
            .iter()
            .map(|&index| {
                let color = quantized.palette()[index];
                opaque(color.red, color.green, color.blue)
            })
            .collect();

        let requantized = quantize_row(&reconstructed, k);
        let second_error = squared_error(&reconstructed, &requantized);
        assert!(second_error <= first_error);
    }

    #[test]
    fn indices_stay_in_range_and_stream_in_input_order() {
        let pixels: Vec<u32> = (0..64u32)
            .map(|i| {
                #[allow(clippy::cast_possible_truncation)]
                let i = (i * 4) as u8;
                opaque(i, 255 - i, i / 2)
            })
            .collect();

        let mut quantizer = Quantizer::new();
        quantizer.prepare(8, 8).unwrap();
        for &pixel in &pixels {
            quantizer.add_color(pixel).unwrap();
        }
        let k = PaletteSize::try_from(16u16).unwrap();
        let palette_len = quantizer.build_palette(k).unwrap().len();

        let streamed: Vec<u8> = (0..pixels.len())
            .map(|_| quantizer.palette_index_for_next_pixel().unwrap())
            .collect();
        assert!(streamed.iter().all(|&index| usize::from(index) < palette_len));
        assert_eq!(Some(streamed.as_slice()), quantizer.indices());
    }

    #[test]
    fn color_lookup_agrees_with_the_stored_assignments() {
        let pixels = two_clusters();
        let mut quantizer = Quantizer::new();
        quantizer.prepare(10, 10).unwrap();
        for &pixel in &pixels {
            quantizer.add_color(pixel).unwrap();
        }
        quantizer.build_palette(PaletteSize::MIN).unwrap();

        let indices = quantizer.indices().unwrap().to_vec();
        assert_eq!(quantizer.palette_index_for_color(opaque(0, 0, 0)).unwrap(), indices[0]);
        assert_eq!(
            quantizer.palette_index_for_color(opaque(255, 255, 255)).unwrap(),
            indices[99]
        );
        // near-black still snaps to the black entry
        assert_eq!(quantizer.palette_index_for_color(opaque(10, 10, 10)).unwrap(), indices[0]);
    }

    #[test]
    fn custom_backgrounds_change_the_composite() {
        let quantized = quantize_with_background(
            &[argb(0, 255, 255, 255)],
            (1, 1),
            PaletteSize::MIN,
            Srgb::new(0, 128, 0),
        )
        .unwrap();
        assert_eq!(quantized.palette(), &[Srgb::new(0u8, 128, 0)][..]);
    }
}
