//! Re-exports of third party crates whose types are present in `palcube`'s public API.

#[cfg(feature = "image")]
pub use image;
pub use palette;
