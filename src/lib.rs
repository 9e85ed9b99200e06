//! A library for reducing the color palette of an image to a fixed number of
//! representative colors, suitable for indexed-color output such as 8-bit PNG or GIF.
//!
//! `palcube` implements Wu's greedy variance-minimization method (Greedy Orthogonal
//! Bipartitioning) over a coarse 3D RGB histogram. Compared to median cut, it gives
//! noticeably better palettes at nearly the same cost: the histogram is converted into
//! 3D summed-area tables, so evaluating any candidate split of a color-space box takes
//! constant time.
//!
//! # Usage
//!
//! A [`Quantizer`] is fed every pixel of exactly one image and then asked for a palette
//! and per-pixel palette indices:
//!
//! ```
//! use palcube::{PaletteSize, Quantizer};
//!
//! # fn main() -> Result<(), palcube::QuantizeError> {
//! // 2x2 image of packed 0xAARRGGBB pixels
//! let pixels = [0xFF000000u32, 0xFFFFFFFF, 0xFFFF0000, 0xFF0000FF];
//!
//! let mut quantizer = Quantizer::new();
//! quantizer.prepare(2, 2)?;
//! for &pixel in &pixels {
//!     quantizer.add_color(pixel)?;
//! }
//! assert_eq!(quantizer.distinct_color_count()?, 4);
//!
//! let palette = quantizer.build_palette(PaletteSize::MAX)?.to_owned();
//! assert_eq!(palette.len(), 4);
//!
//! // indices stream back in the original pixel order
//! let first = quantizer.palette_index_for_next_pixel()?;
//! assert_eq!(palette[first], palcube::deps::palette::Srgb::new(0u8, 0, 0));
//! # Ok(())
//! # }
//! ```
//!
//! For the common one-image case there is also the one-shot [`quantize`] function.
//!
//! Pixels are 32-bit `0xAARRGGBB` words. Translucent pixels are composited onto a
//! configurable opaque background (white by default) before they enter the histogram;
//! the output palette is always opaque.
//!
//! A [`Quantizer`] is strictly single-threaded and owns all of its tables. The intended
//! parallelism model is one quantizer per image across however many threads you like.

#![no_std]
#![deny(unsafe_code, unsafe_op_in_unsafe_fn)]
#![warn(
    clippy::pedantic,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,
    clippy::unwrap_in_result,
    clippy::expect_used,
    clippy::unneeded_field_pattern,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::unnecessary_self_imports,
    clippy::str_to_string,
    clippy::string_to_string,
    clippy::string_slice,
    missing_docs,
    clippy::missing_docs_in_private_items,
    rustdoc::all,
    clippy::float_cmp_const,
    clippy::lossy_float_literal
)]
#![allow(
    clippy::doc_markdown,
    clippy::module_name_repetitions,
    clippy::many_single_char_names,
    clippy::missing_panics_doc,
    clippy::unreadable_literal
)]

extern crate alloc;

mod flatten;
mod histogram;
mod partition;
mod quantizer;
mod types;

pub mod deps;

pub use quantizer::*;
pub use types::*;

/// The maximum supported number of palette colors is `256`.
pub const MAX_COLORS: u16 = u8::MAX as u16 + 1;

/// The side length of the histogram lattice: 32 bins per channel plus the zero
/// border row used by the summed-area arithmetic.
pub(crate) const HIST_SIDE: usize = 33;

/// The size of the box workspace used while partitioning color space.
///
/// Twice [`MAX_COLORS`], leaving headroom for boxes that are retried after a
/// failed split.
pub(crate) const MAX_CUBES: usize = 2 * MAX_COLORS as usize;
