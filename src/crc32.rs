//! CRC32 table (polynomial 0xEDB88320).
//!
//! The BT4 match finder mixes it into its 2/3/4-byte hashes.

const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB88320;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// Table entry for `byte`.
#[inline]
pub(crate) fn crc32_byte(byte: u8) -> u32 {
    CRC32_TABLE[byte as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crc32(data: &[u8]) -> u32 {
        let mut crc = 0xFFFFFFFF_u32;
        for &byte in data {
            let index = ((crc ^ byte as u32) & 0xFF) as usize;
            crc = (crc >> 8) ^ CRC32_TABLE[index];
        }
        crc ^ 0xFFFFFFFF
    }

    #[test]
    fn test_table() {
        assert_eq!(CRC32_TABLE[0], 0);
        assert_eq!(CRC32_TABLE[1], 0x77073096);
        assert_eq!(CRC32_TABLE[255], 0x2D02EF8D);
        assert_eq!(crc32_byte(0xFF), CRC32_TABLE[255]);
        assert_eq!(crc32(b"123456789"), 0xCBF43926);
    }
}
