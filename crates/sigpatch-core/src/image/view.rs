use crate::error::{Error, Result};

/// Bounds-checked view over a contiguous image byte range.
///
/// All offsets are module-relative. Every access is validated against the
/// view length, so neither the scanner nor the derivation engine can
/// express an out-of-bounds read.
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a> {
    base: u64,
    bytes: &'a [u8],
    ptr_size: usize,
}

impl<'a> ImageView<'a> {
    /// Pointer width used when none is given explicitly.
    pub const NATIVE_PTR_SIZE: usize = std::mem::size_of::<usize>();

    pub fn new(base: u64, bytes: &'a [u8]) -> Self {
        Self {
            base,
            bytes,
            ptr_size: Self::NATIVE_PTR_SIZE,
        }
    }

    /// Override the pointer width (4 or 8).
    pub fn with_ptr_size(mut self, ptr_size: usize) -> Self {
        debug_assert!(ptr_size == 4 || ptr_size == 8);
        self.ptr_size = ptr_size;
        self
    }

    /// Address the image is loaded at.
    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn ptr_size(&self) -> usize {
        self.ptr_size
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Read the byte at a module-relative offset.
    pub fn byte_at(&self, offset: u64) -> Result<u8> {
        usize::try_from(offset)
            .ok()
            .and_then(|index| self.bytes.get(index))
            .copied()
            .ok_or(Error::OutOfBounds { offset })
    }

    /// Read a pointer-width little-endian value at a module-relative offset.
    pub fn read_ptr(&self, offset: u64) -> Result<u64> {
        let start = usize::try_from(offset).map_err(|_| Error::OutOfBounds { offset })?;
        let end = start
            .checked_add(self.ptr_size)
            .ok_or(Error::OutOfBounds { offset })?;
        let slice = self
            .bytes
            .get(start..end)
            .ok_or(Error::OutOfBounds { offset })?;

        let mut value = 0u64;
        for (index, byte) in slice.iter().enumerate() {
            value |= (*byte as u64) << (index * 8);
        }
        Ok(value)
    }

    /// Apply a signed displacement to a module-relative offset.
    pub fn offset_by(&self, offset: u64, delta: i64) -> Result<u64> {
        offset
            .checked_add_signed(delta)
            .ok_or(Error::OutOfBounds { offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_at_in_bounds() {
        let bytes = [0x11, 0x22, 0x33];
        let view = ImageView::new(0x1000, &bytes);
        assert_eq!(view.byte_at(0).unwrap(), 0x11);
        assert_eq!(view.byte_at(2).unwrap(), 0x33);
    }

    #[test]
    fn test_byte_at_out_of_bounds() {
        let bytes = [0x11];
        let view = ImageView::new(0, &bytes);
        assert!(matches!(
            view.byte_at(1),
            Err(Error::OutOfBounds { offset: 1 })
        ));
    }

    #[test]
    fn test_read_ptr_little_endian_4() {
        let bytes = [0x00, 0xEF, 0xBE, 0xAD, 0xDE];
        let view = ImageView::new(0, &bytes).with_ptr_size(4);
        assert_eq!(view.read_ptr(1).unwrap(), 0xDEADBEEF);
    }

    #[test]
    fn test_read_ptr_little_endian_8() {
        let bytes = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let view = ImageView::new(0, &bytes).with_ptr_size(8);
        assert_eq!(view.read_ptr(0).unwrap(), 0x0807060504030201);
    }

    #[test]
    fn test_read_ptr_truncated_tail() {
        let bytes = [0x01, 0x02, 0x03];
        let view = ImageView::new(0, &bytes).with_ptr_size(4);
        assert!(view.read_ptr(0).is_err());
    }

    #[test]
    fn test_offset_by_signed() {
        let bytes = [0u8; 16];
        let view = ImageView::new(0, &bytes);
        assert_eq!(view.offset_by(8, -3).unwrap(), 5);
        assert_eq!(view.offset_by(8, 3).unwrap(), 11);
        assert!(view.offset_by(2, -5).is_err());
    }
}
