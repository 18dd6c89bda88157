//! Minimal SCALE (Simple Concatenated Aggregate Little-Endian) decoding
//!
//! Covers what the indexer reads straight from node storage and digests:
//! compact integers, fixed-width little-endian integers, length-prefixed byte
//! vectors and vectors of 32-byte account ids.
use super::DecodeError;

/// Parse a `0x`-prefixed (or bare) hex string into bytes
pub fn hex_to_bytes(hex_str: &str) -> Result<Vec<u8>, DecodeError> {
    Ok(hex::decode(hex_str.trim().trim_start_matches("0x"))?)
}

/// Render bytes as a lowercase `0x`-prefixed hex string
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Forward-only cursor over a SCALE-encoded byte slice
pub struct ScaleReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ScaleReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Take everything that has not been consumed yet
    pub fn rest(&mut self) -> &'a [u8] {
        let rest = &self.bytes[self.pos..];
        self.pos = self.bytes.len();
        rest
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::UnexpectedEnd {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let mut arr = [0u8; 4];
        arr.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(arr))
    }

    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        let mut arr = [0u8; 8];
        arr.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(arr))
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut arr = [0u8; N];
        arr.copy_from_slice(self.take(N)?);
        Ok(arr)
    }

    /// Decode a SCALE compact-encoded integer
    ///
    /// Compact encoding modes:
    /// - 0b00: Single-byte mode (0-63)
    /// - 0b01: Two-byte mode (64-16383)
    /// - 0b10: Four-byte mode (16384-1073741823)
    /// - 0b11: Big-integer mode (> 2^30 - not supported here)
    pub fn read_compact(&mut self) -> Result<usize, DecodeError> {
        let first = self.read_u8()?;
        match first & 0b11 {
            0b00 => Ok((first >> 2) as usize),
            0b01 => {
                let second = self.read_u8()?;
                Ok((((first as u16) >> 2) | ((second as u16) << 6)) as usize)
            }
            0b10 => {
                let rest = self.take(3)?;
                Ok((((first as u32) >> 2)
                    | ((rest[0] as u32) << 6)
                    | ((rest[1] as u32) << 14)
                    | ((rest[2] as u32) << 22)) as usize)
            }
            _ => Err(DecodeError::UnsupportedCompact),
        }
    }

    /// Decode a compact-length-prefixed byte vector (`Vec<u8>`)
    pub fn read_bytes(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.read_compact()?;
        self.take(len)
    }
}

/// Decode a SCALE-encoded `Vec<AccountId32>` storage value
///
/// Format: 0x[compact_count][key1][key2]...[keyN], 32 bytes per key.
/// An empty storage value decodes to an empty set.
pub fn decode_account_ids(hex_value: &str) -> Result<Vec<String>, DecodeError> {
    let bytes = hex_to_bytes(hex_value)?;
    if bytes.is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = ScaleReader::new(&bytes);
    let count = reader.read_compact()?;
    let key_data = reader.rest();
    let expected = count * 32;
    if key_data.len() != expected {
        return Err(DecodeError::InvalidLength {
            expected,
            actual: key_data.len(),
        });
    }

    Ok(key_data.chunks_exact(32).map(bytes_to_hex).collect())
}

/// Decode a SCALE-encoded `u32` storage value
pub fn decode_u32(hex_value: &str) -> Result<u32, DecodeError> {
    let bytes = hex_to_bytes(hex_value)?;
    ScaleReader::new(&bytes).read_u32()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compact(bytes: &[u8]) -> Result<usize, DecodeError> {
        ScaleReader::new(bytes).read_compact()
    }

    #[test]
    fn test_decode_compact_single_byte() {
        assert_eq!(compact(&[0x00]).unwrap(), 0);
        // 63 encoded: (63 << 2) | 0b00 = 0xFC
        assert_eq!(compact(&[0xFC]).unwrap(), 63);
    }

    #[test]
    fn test_decode_compact_two_byte() {
        assert_eq!(compact(&[0x01, 0x01]).unwrap(), 64);
        // 1199: (1199 << 2) | 0b01 = 0x12BD, LE bytes
        assert_eq!(compact(&[0xBD, 0x12]).unwrap(), 1199);
    }

    #[test]
    fn test_decode_compact_four_byte() {
        // 16384: (16384 << 2) | 0b10 = 0x00010002
        assert_eq!(compact(&[0x02, 0x00, 0x01, 0x00]).unwrap(), 16384);
    }

    #[test]
    fn test_decode_compact_big_integer_rejected() {
        assert!(matches!(compact(&[0x03]), Err(DecodeError::UnsupportedCompact)));
    }

    #[test]
    fn test_read_bytes_truncated() {
        // Declares 4 bytes, carries 2
        let mut reader = ScaleReader::new(&[0x10, 0xaa, 0xbb]);
        assert!(matches!(
            reader.read_bytes(),
            Err(DecodeError::UnexpectedEnd { needed: 4, remaining: 2 })
        ));
    }

    #[test]
    fn test_decode_account_ids_empty() {
        assert!(decode_account_ids("0x00").unwrap().is_empty());
        assert!(decode_account_ids("0x").unwrap().is_empty());
    }

    #[test]
    fn test_decode_account_ids_single() {
        let key = "a".repeat(64);
        let result = decode_account_ids(&format!("0x04{}", key)).unwrap();
        assert_eq!(result, vec![format!("0x{}", key)]);
    }

    #[test]
    fn test_decode_account_ids_invalid_length() {
        // Compact says 2 keys but only 1 key worth of data
        let key = "b".repeat(64);
        assert!(decode_account_ids(&format!("0x08{}", key)).is_err());
    }

    #[test]
    fn test_decode_u32() {
        assert_eq!(decode_u32("0x2a000000").unwrap(), 42);
        assert!(decode_u32("0x2a00").is_err());
    }
}
