use crate::error::HexError;
use crate::image::SparseImage;

/// Parse a tabular memory dump exported from MPLAB IPE's "Output to file"
/// feature (Target Memory Views -> Program view).
///
/// Each line begins with a 6-hex-digit base *word* address followed by
/// space-separated 24-bit big-endian words rendered as `HHMMLL`. Every word
/// expands into four image bytes: `LL`, `MM`, `HH`, then a `0x00` phantom
/// byte. This is a secondary path used only to cross-validate `load_hex`
/// against an independently produced dump; it is not the primary decoder.
pub fn load_mplab_table(text: &str) -> Result<SparseImage, HexError> {
    let mut image = SparseImage::new();

    for (idx, raw) in text.lines().enumerate().skip(1) {
        let line_no = idx + 1;
        if raw.is_empty() {
            continue;
        }
        if raw.len() < 6 {
            return Err(HexError::BadMplabAddress { line: line_no });
        }

        let base_word_addr = u32::from_str_radix(&raw[0..6], 16)
            .map_err(|_| HexError::BadMplabAddress { line: line_no })?;
        let mut cursor = base_word_addr * 2;

        let values_field = if raw.len() > 14 {
            &raw[14..raw.len().min(50)]
        } else {
            ""
        };

        for word in values_field.split(' ').filter(|s| !s.is_empty()) {
            if word.len() != 6 {
                return Err(HexError::InvalidHexDigit { line: line_no });
            }
            let hh = u8::from_str_radix(&word[0..2], 16)
                .map_err(|_| HexError::InvalidHexDigit { line: line_no })?;
            let mm = u8::from_str_radix(&word[2..4], 16)
                .map_err(|_| HexError::InvalidHexDigit { line: line_no })?;
            let ll = u8::from_str_radix(&word[4..6], 16)
                .map_err(|_| HexError::InvalidHexDigit { line: line_no })?;

            image.set(cursor, ll);
            image.set(cursor + 1, mm);
            image.set(cursor + 2, hh);
            image.set(cursor + 3, 0x00);
            cursor += 4;
        }
    }

    Ok(image)
}
