use std::collections::BTreeMap;
use std::ops::{Deref, Index, Range};

/// Address-to-byte mapping produced by a HEX parser.
///
/// Keys are absolute byte addresses; insertion order carries no meaning, so
/// this is a `BTreeMap` rather than the list-of-tuples the original tool
/// used, giving deterministic iteration for free.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SparseImage(BTreeMap<u32, u8>);

impl SparseImage {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn set(&mut self, addr: u32, value: u8) {
        self.0.insert(addr, value);
    }

    pub fn get(&self, addr: u32) -> Option<u8> {
        self.0.get(&addr).copied()
    }

    pub fn max_address(&self) -> Option<u32> {
        self.0.keys().next_back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u8)> + '_ {
        self.0.iter().map(|(&a, &b)| (a, b))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A fully expanded firmware image: one byte per index, 0..N.
///
/// Every fourth byte (`(i+1) % 4 == 0`) is a phantom byte and is always
/// `0x00`; every other unset byte reads as `0xFF`, the erased-flash value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenseImage(Vec<u8>);

impl DenseImage {
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn is_phantom_index(index: usize) -> bool {
        (index + 1) % 4 == 0
    }

    /// The byte range covering a target memory window `[start_word,
    /// start_word + length_words)`, in image-byte coordinates.
    pub fn window_range(start_word: u32, length_words: u32) -> std::ops::Range<usize> {
        let start = 2 * start_word as usize;
        let end = 2 * (start_word as usize + length_words as usize);
        start..end
    }
}

impl Deref for DenseImage {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl Index<usize> for DenseImage {
    type Output = u8;

    fn index(&self, index: usize) -> &u8 {
        &self.0[index]
    }
}

impl Index<Range<usize>> for DenseImage {
    type Output = [u8];

    fn index(&self, index: Range<usize>) -> &[u8] {
        &self.0[index]
    }
}
