//! # fw-hex: Intel HEX decoding and image assembly
//!
//! This crate turns Intel HEX text (or an MPLAB IPE memory table dump) into
//! a dense firmware image suitable for programming over the bootloader
//! protocol.
//!
//! ## Memory layout
//!
//! Target addresses are 24-bit microcontroller *word* addresses; the image
//! byte index for word address `a_p` is `2 * a_p`. Every fourth image byte
//! is a phantom byte (always `0x00`) that has no counterpart in device
//! flash — see [`densify`] and [`DenseImage::is_phantom_index`].
//!
//! ## Parsing paths
//!
//! [`load_hex`] is the primary Intel HEX decoder. [`load_mplab_table`]
//! decodes a secondary tabular export format used only to cross-validate
//! `load_hex` output against an independently produced dump.

mod densify;
mod error;
mod image;
mod intel_hex;
mod mplab_table;

pub use densify::densify;
pub use error::HexError;
pub use image::{DenseImage, SparseImage};
pub use intel_hex::load_hex;
pub use mplab_table::load_mplab_table;

use std::path::Path;

/// Read and decode an Intel HEX file, densifying it in one step.
///
/// `size` behaves as in [`densify`]: `None` defaults to `max(address) + 1`.
pub fn load_hex_file(path: impl AsRef<Path>, size: Option<usize>) -> Result<DenseImage, HexError> {
    let text = std::fs::read_to_string(path)?;
    let sparse = load_hex(&text)?;
    Ok(densify(&sparse, size))
}
