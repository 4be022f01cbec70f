//! Which ROM sizes an image accepts.
//!
//! Everything else in the crate only relies on `offset % size == 0`, so this is
//! the one place to touch if non power of two sizes ever become placeable.

use crate::LayoutError;

pub fn check_size(size: u32, min_rom_size: u32) -> Result<(), LayoutError> {
    if size == 0 {
        return Err(LayoutError::ZeroSize);
    }
    if !size.is_power_of_two() {
        return Err(LayoutError::NotPowerOfTwo { size });
    }
    if size < min_rom_size {
        return Err(LayoutError::BelowMinimum {
            size,
            min: min_rom_size,
        });
    }
    Ok(())
}

/// Smallest size accepted by [`check_size`] that holds `len` bytes.
///
/// Returns `None` when that size does not fit in a `u32`.
pub fn rom_size_for(len: u64, min_rom_size: u32) -> Option<u32> {
    let size = len.max(min_rom_size as u64).checked_next_power_of_two()?;
    u32::try_from(size).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::MIN_ROM_SIZE;

    #[test]
    pub fn accepts_powers_of_two_above_minimum() {
        for shift in 15..32 {
            assert!(check_size(1 << shift, MIN_ROM_SIZE).is_ok());
        }
    }

    #[test]
    pub fn rejects_bad_sizes() {
        assert!(matches!(
            check_size(0, MIN_ROM_SIZE),
            Err(LayoutError::ZeroSize)
        ));
        assert!(matches!(
            check_size(0x9000, MIN_ROM_SIZE),
            Err(LayoutError::NotPowerOfTwo { size: 0x9000 })
        ));
        assert!(matches!(
            check_size(0x4000, MIN_ROM_SIZE),
            Err(LayoutError::BelowMinimum {
                size: 0x4000,
                min: MIN_ROM_SIZE
            })
        ));
    }

    #[test]
    pub fn rounds_up_to_policy() {
        assert_eq!(rom_size_for(0, MIN_ROM_SIZE), Some(MIN_ROM_SIZE));
        assert_eq!(rom_size_for(1, MIN_ROM_SIZE), Some(MIN_ROM_SIZE));
        assert_eq!(rom_size_for(0x8000, MIN_ROM_SIZE), Some(0x8000));
        assert_eq!(rom_size_for(0x8001, MIN_ROM_SIZE), Some(0x10000));
        assert_eq!(rom_size_for(0x30_0000, MIN_ROM_SIZE), Some(0x40_0000));
        assert_eq!(rom_size_for(0x1_0000_0001, MIN_ROM_SIZE), None);
    }
}
