pub use ems32m::EMS32M;
pub use ems64m::EMS64M;

use static_assertions::const_assert;

pub mod ems32m;
pub mod ems64m;

/// Smallest unit a ROM can occupy in a page.
pub const MIN_ROM_SIZE: u32 = 32768;

const_assert!(MIN_ROM_SIZE.is_power_of_two());

/// Bounds enforced by the checked insert operations of an [`Image`](crate::Image).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Limits {
    pub min_rom_size: u32,
    /// When `None` the page size is left for the caller to enforce
    pub page_size: Option<u32>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            min_rom_size: MIN_ROM_SIZE,
            page_size: None,
        }
    }
}

/// This is a helper struct, which allows you to iterate over every cartridge defined
pub struct CartridgeIter {
    inner: std::vec::IntoIter<Box<dyn Cartridge>>,
}

impl CartridgeIter {
    pub fn new() -> Self {
        Self {
            inner: vec![
                Box::new(EMS64M::default()) as Box<dyn Cartridge>,
                Box::new(EMS32M::default()),
            ]
            .into_iter(),
        }
    }

    pub fn find_by_name(name: &str) -> Option<Box<dyn Cartridge>> {
        Self::new().find(|cart| cart.name().eq_ignore_ascii_case(name))
    }
}

impl Default for CartridgeIter {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for CartridgeIter {
    type Item = Box<dyn Cartridge>;
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// Describes the flash geometry of one kind of cartridge.
pub trait Cartridge {
    /// Bytes in one page. ROMs never straddle pages.
    fn page_size(&self) -> u32;

    fn page_count(&self) -> u32;

    /// Optional, defaults to [`MIN_ROM_SIZE`]
    fn min_rom_size(&self) -> u32 {
        MIN_ROM_SIZE
    }

    /// Physical flash offset of the first byte of `page`, if the cartridge has that page
    fn page_base(&self, page: u32) -> Option<u32> {
        if page < self.page_count() {
            page.checked_mul(self.page_size())
        } else {
            None
        }
    }

    fn limits(&self) -> Limits {
        Limits {
            min_rom_size: self.min_rom_size(),
            page_size: Some(self.page_size()),
        }
    }

    fn name(&self) -> String;
}
