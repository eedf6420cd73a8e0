//! Decoder output window.
//!
//! Decoding targets a complete in-memory buffer, so the window is the output
//! itself: back-references read from bytes already produced.

use super::{LzmaError, Result};

/// Growing output buffer with LZ back-reference copies.
pub struct OutWindow {
    buffer: Vec<u8>,
}

impl OutWindow {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a window expecting about `capacity` output bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Reset for reuse, keeping the allocation.
    #[inline]
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    #[inline]
    pub fn put_byte(&mut self, byte: u8) {
        self.buffer.push(byte);
    }

    /// Byte `distance + 1` positions back; 0 before any output.
    #[inline]
    pub fn get_byte(&self, distance: u32) -> u8 {
        let len = self.buffer.len();
        match len.checked_sub(distance as usize + 1) {
            Some(idx) => self.buffer[idx],
            None => 0,
        }
    }

    /// Append `length` bytes copied from `distance + 1` positions back.
    #[inline]
    pub fn copy_block(&mut self, distance: u32, length: u32) -> Result<()> {
        let dist = distance as usize + 1;
        let len = length as usize;
        let start = self
            .buffer
            .len()
            .checked_sub(dist)
            .ok_or(LzmaError::DataCorruption("match distance beyond output"))?;

        // Fast path: source doesn't overlap the bytes being written
        if dist >= len {
            self.buffer.extend_from_within(start..start + len);
            return Ok(());
        }

        // Overlapping copies repeat the last `dist` bytes
        self.buffer.reserve(len);
        for i in 0..len {
            let byte = self.buffer[start + i];
            self.buffer.push(byte);
        }
        Ok(())
    }

    /// Bytes produced so far.
    #[inline]
    pub fn total_written(&self) -> u64 {
        self.buffer.len() as u64
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

impl Default for OutWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_output() {
        let mut window = OutWindow::new();
        for &b in b"Hello" {
            window.put_byte(b);
        }
        assert_eq!(window.total_written(), 5);
        assert_eq!(window.get_byte(0), b'o');
        assert_eq!(window.get_byte(4), b'H');
        assert_eq!(window.as_slice(), b"Hello");
    }

    #[test]
    fn test_copy_block() {
        let mut window = OutWindow::new();
        for &b in b"abc" {
            window.put_byte(b);
        }
        // Distance 2 = three bytes back
        window.copy_block(2, 6).unwrap();
        assert_eq!(window.as_slice(), b"abcabcabc");
    }

    #[test]
    fn test_overlapping_copy() {
        let mut window = OutWindow::new();
        window.put_byte(b'a');
        window.copy_block(0, 5).unwrap();
        assert_eq!(window.into_inner(), b"aaaaaa");
    }

    #[test]
    fn test_invalid_distance() {
        let mut window = OutWindow::new();
        window.put_byte(b'a');
        assert!(matches!(
            window.copy_block(1, 1),
            Err(LzmaError::DataCorruption(_))
        ));
        assert_eq!(OutWindow::new().get_byte(0), 0);
    }
}
