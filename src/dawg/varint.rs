//! Self-terminating big-endian varints: 7 payload bits per byte, high bit
//! set on every byte except the last, most significant group first.

use std::io::Write;

use super::bits::{BitReader, BitWriter};
use super::error::{DawgError, Result};
use super::source::ReadAt;

/// Longest accepted encoding, in bytes. Four bytes cover every count the
/// header can carry; anything wider is a corrupt or oversized image.
const MAX_BYTES: u32 = 4;

/// Returns the encoded length of `n` in bytes.
///
/// The thresholds are exclusive (`0x7f` itself takes two bytes); the
/// emitted images depend on these exact boundaries.
pub(crate) fn unsigned_length(n: u64) -> Result<u32> {
    if n < 0x7f {
        Ok(1)
    } else if n < 0x3fff {
        Ok(2)
    } else if n < 0x1f_ffff {
        Ok(3)
    } else if n < 0xfff_ffff {
        Ok(4)
    } else {
        Err(DawgError::EncodingLimit(n))
    }
}

/// Writes `n` through the bit writer as whole 8-bit groups.
pub(crate) fn write_unsigned<W: Write>(w: &mut BitWriter<W>, n: u64) -> Result<()> {
    let len = unsigned_length(n)?;
    for group in (0..len).rev() {
        let mut byte = (n >> (7 * group)) & 0x7f;
        if group > 0 {
            byte |= 0x80;
        }
        w.write_bits(byte, 8)?;
    }
    Ok(())
}

/// Reads one varint at the reader's cursor.
pub(crate) fn read_unsigned<S: ReadAt + ?Sized>(r: &mut BitReader<'_, S>) -> Result<u64> {
    let mut result = 0u64;
    for _ in 0..MAX_BYTES {
        let byte = r.read_bits(8)?;
        result = (result << 7) | (byte & 0x7f);
        if byte & 0x80 == 0 {
            return Ok(result);
        }
    }
    Err(DawgError::EncodingLimit(result))
}

#[cfg(test)]
mod test {
    use super::*;

    fn encode(n: u64) -> Vec<u8> {
        let mut out = Vec::new();
        let mut w = BitWriter::new(&mut out);
        write_unsigned(&mut w, n).unwrap();
        w.flush().unwrap();
        out
    }

    fn decode(bytes: &[u8]) -> Result<u64> {
        let mut r = BitReader::new(bytes, 0, bytes.len() as u64);
        read_unsigned(&mut r)
    }

    #[test]
    fn single_byte_values() {
        assert_eq!(encode(0), [0x00]);
        assert_eq!(encode(1), [0x01]);
        assert_eq!(encode(0x7e), [0x7e]);
    }

    #[test]
    fn boundary_values_use_the_wider_form() {
        // The 1-byte bound is exclusive: 0x7f spills into two bytes.
        assert_eq!(encode(0x7f), [0x80, 0x7f]);
        assert_eq!(encode(0x3fff), [0x80, 0xff, 0x7f]);
        assert_eq!(encode(0x1f_ffff), [0x80, 0xff, 0xff, 0x7f]);
    }

    #[test]
    fn lengths_match_encodings() {
        for n in [0, 1, 0x7e, 0x7f, 0x100, 0x3ffe, 0x3fff, 0x1f_fffe, 0x1f_ffff, 0xfff_fffe] {
            assert_eq!(
                unsigned_length(n).unwrap() as usize,
                encode(n).len(),
                "length mismatch for {n:#x}"
            );
        }
    }

    #[test]
    fn round_trips() {
        for n in [0u64, 1, 42, 0x7e, 0x7f, 0x80, 0x3fff, 0x4000, 0x1f_ffff, 0xfff_fffe] {
            assert_eq!(decode(&encode(n)).unwrap(), n, "round trip of {n:#x}");
        }
    }

    #[test]
    fn oversized_value_is_rejected() {
        let mut out = Vec::new();
        let mut w = BitWriter::new(&mut out);
        assert!(matches!(
            write_unsigned(&mut w, 0xfff_ffff),
            Err(DawgError::EncodingLimit(_))
        ));
    }

    #[test]
    fn runaway_continuation_is_rejected() {
        assert!(matches!(
            decode(&[0xff, 0xff, 0xff, 0xff, 0xff]),
            Err(DawgError::EncodingLimit(_))
        ));
    }
}
