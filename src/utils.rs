//! Various utilities for the bytecode

/// Reads a big-endian `i16` from a `u8` pointer.
///
/// # Safety
///
/// The pointer must point to at least 2 bytes.
#[inline]
pub unsafe fn read_i16(ptr: *const u8) -> i16 {
    read_u16(ptr) as i16
}

/// Reads a big-endian `u16` from a `u8` pointer.
///
/// # Safety
///
/// The pointer must point to at least 2 bytes.
#[inline]
pub unsafe fn read_u16(ptr: *const u8) -> u16 {
    u16::from_be_bytes(unsafe { ptr.cast::<[u8; 2]>().read() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_u16_big_endian() {
        // These functions should always read big-endian regardless of CPU architecture
        let data = [0x12, 0x34, 0x56, 0x78];
        let ptr = data.as_ptr();

        unsafe {
            // Always reads as big-endian: first byte is MSB
            assert_eq!(read_u16(ptr), 0x1234);
            assert_eq!(read_u16(ptr.add(1)), 0x3456);
            assert_eq!(read_u16(ptr.add(2)), 0x5678);
        }
    }

    #[test]
    fn test_read_i16_boundary_values() {
        unsafe {
            // i16::MAX = 32767 = 0x7FFF in big-endian
            let max_data = [0x7F, 0xFF];
            assert_eq!(read_i16(max_data.as_ptr()), i16::MAX);

            // i16::MIN = -32768 = 0x8000 in big-endian
            let min_data = [0x80, 0x00];
            assert_eq!(read_i16(min_data.as_ptr()), i16::MIN);

            // -1 = 0xFFFF in big-endian
            let neg_one_data = [0xFF, 0xFF];
            assert_eq!(read_i16(neg_one_data.as_ptr()), -1);

            // 1 = 0x0001 in big-endian
            let one_data = [0x00, 0x01];
            assert_eq!(read_i16(one_data.as_ptr()), 1);
        }
    }
}
