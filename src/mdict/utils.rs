//! Low-level byte reading and text decoding primitives.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE};

use super::error::{MdictError, Result};

/// Read a 4 or 8 byte big-endian number.
///
/// Used throughout the MDict format for size and count fields. The width
/// depends on the format version (v1.x uses 4 bytes, v2.x uses 8 bytes).
///
/// # Panics
/// Panics if `number_width` is not 4 or 8. This is considered a programmer
/// error, as the value is fixed after parsing the header.
pub fn read_number(reader: &mut impl Read, number_width: usize) -> Result<u64> {
    match number_width {
        8 => Ok(reader.read_u64::<BigEndian>()?),
        4 => Ok(reader.read_u32::<BigEndian>()? as u64),
        // This path is logically impossible if the header is parsed correctly.
        _ => unreachable!("Invalid number width: must be 4 or 8"),
    }
}

/// Read a 1 or 2 byte big-endian number.
///
/// Used for the first/last key length prefixes in key block info.
///
/// # Panics
/// Panics if `number_width` is not 1 or 2. This is a programmer error.
pub fn read_small_number(reader: &mut impl Read, number_width: usize) -> Result<u64> {
    match number_width {
        2 => Ok(reader.read_u16::<BigEndian>()? as u64),
        1 => Ok(reader.read_u8()? as u64),
        // This path is logically impossible.
        _ => unreachable!("Invalid small number width: must be 1 or 2"),
    }
}

/// Big-endian u32 from the start of a slice; 0 if the slice is too short.
pub fn read_u32_be(bytes: &[u8]) -> u32 {
    if bytes.len() < 4 {
        return 0;
    }
    BigEndian::read_u32(bytes)
}

/// Little-endian u32 from the start of a slice; 0 if the slice is too short.
pub fn read_u32_le(bytes: &[u8]) -> u32 {
    if bytes.len() < 4 {
        return 0;
    }
    LittleEndian::read_u32(bytes)
}

/// True when the encoding stores text as 16-bit code units.
pub fn is_utf16(encoding: &'static Encoding) -> bool {
    encoding == UTF_16LE || encoding == UTF_16BE
}

/// Width in bytes of one text unit for the encoding (2 for UTF-16, else 1).
pub fn unit_width(encoding: &'static Encoding) -> usize {
    if is_utf16(encoding) {
        2
    } else {
        1
    }
}

/// Decode UTF-16LE bytes, truncating an odd-length tail and stripping
/// trailing null code units.
pub fn decode_utf16le(bytes: &[u8]) -> String {
    decode_utf16(bytes, UTF_16LE)
}

/// Decode UTF-16BE bytes with the same tail handling as the LE variant.
pub fn decode_utf16be(bytes: &[u8]) -> String {
    decode_utf16(bytes, UTF_16BE)
}

fn decode_utf16(bytes: &[u8], encoding: &'static Encoding) -> String {
    let mut src = bytes;
    if src.len() % 2 != 0 {
        src = &src[..src.len() - 1];
    }
    while src.len() >= 2 && src[src.len() - 2..] == [0, 0] {
        src = &src[..src.len() - 2];
    }
    if src.is_empty() {
        return String::new();
    }
    let (text, _, had_errors) = encoding.decode(src);
    if had_errors {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    text.into_owned()
}

/// Decode bytes in the dictionary's encoding.
///
/// Falls back to reinterpreting the raw bytes as UTF-8 when the decoder
/// reports errors, so a mislabeled header never loses the entry outright.
pub fn decode_text(bytes: &[u8], encoding: &'static Encoding) -> String {
    if bytes.is_empty() {
        return String::new();
    }
    if is_utf16(encoding) {
        return decode_utf16(bytes, encoding);
    }
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return String::from_utf8_lossy(bytes).into_owned();
    }
    text.into_owned()
}

/// Extract a null-terminated string from the front of `bytes`.
///
/// UTF-16 text and MDD keywords use an aligned double-null sentinel; byte
/// encodings use a single null. Returns the decoded text and the number of
/// bytes consumed including the terminator. An unterminated tail consumes
/// the whole slice.
pub fn null_terminated(
    bytes: &[u8],
    encoding: &'static Encoding,
    is_mdd: bool,
) -> (String, usize) {
    if is_utf16(encoding) || is_mdd {
        let wide = if is_utf16(encoding) { encoding } else { UTF_16LE };
        let mut i = 0;
        while i + 1 < bytes.len() {
            if bytes[i] == 0 && bytes[i + 1] == 0 {
                return (decode_utf16(&bytes[..i], wide), i + 2);
            }
            i += 2;
        }
        (decode_utf16(bytes, wide), bytes.len())
    } else {
        match bytes.iter().position(|&b| b == 0) {
            Some(i) => (decode_text(&bytes[..i], encoding), i + 1),
            None => (decode_text(bytes, encoding), bytes.len()),
        }
    }
}

/// Read `len` bytes at absolute `offset`, leaving the file cursor just past
/// the section.
///
/// Bounds are checked against the file length up front so a hostile header
/// cannot request a multi-gigabyte allocation.
pub fn read_section(file: &mut File, offset: u64, len: u64) -> Result<Vec<u8>> {
    let file_len = file.metadata()?.len();
    if offset.checked_add(len).map_or(true, |end| end > file_len) {
        return Err(MdictError::MalformedBlock(format!(
            "section [{}, +{}) extends past end of file ({} bytes)",
            offset, len, file_len
        )));
    }
    file.seek(SeekFrom::Start(offset))?;
    let mut data = vec![0u8; len as usize];
    file.read_exact(&mut data)?;
    Ok(data)
}
