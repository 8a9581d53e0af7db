use crate::image::{DenseImage, SparseImage};

/// Expand a sparse address-to-byte map into a dense, indexable image.
///
/// Every byte defaults to `0xFF` (erased flash), except phantom bytes
/// (`(i+1) % 4 == 0`) which default to `0x00`; sparse entries overlay these
/// defaults. Entries whose address is at or beyond `size` are silently
/// dropped. When `size` is `None`, it defaults to `max(keys) + 1`.
pub fn densify(sparse: &SparseImage, size: Option<usize>) -> DenseImage {
    let size = size.unwrap_or_else(|| sparse.max_address().map(|m| m as usize + 1).unwrap_or(0));

    let mut bytes = vec![0xFFu8; size];
    for i in 0..size {
        if DenseImage::is_phantom_index(i) {
            bytes[i] = 0x00;
        }
    }

    for (addr, value) in sparse.iter() {
        let idx = addr as usize;
        if idx < size {
            bytes[idx] = value;
        } else {
            log::debug!("address {addr:#X} is out of range for image of size {size}");
        }
    }

    DenseImage::from_vec(bytes)
}
