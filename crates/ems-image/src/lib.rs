//! The page image model behind ems-layout.
//!
//! A page of an EMS flash cartridge holds several ROMs. An [`Image`] keeps the
//! ROMs of one page ordered by offset and hands out stable [`RomId`] handles to
//! navigate and edit that order. Choosing *where* a ROM goes is left to the
//! caller: the unchecked primitives store what they are given, the `try_*`
//! variants and [`Image::insert`] refuse anything that would break the layout.

use std::fmt;

use thiserror::Error;

pub mod cartridge;
pub mod image;
pub mod policy;
pub mod rom;

pub use cartridge::{Cartridge, CartridgeIter, Limits, MIN_ROM_SIZE};
pub use image::{Image, Iter, RomId, Walker};
pub use rom::{Rom, RomSource};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("ROM size must not be zero")]
    ZeroSize,
    #[error("ROM size {size:#x} is not a power of two")]
    NotPowerOfTwo { size: u32 },
    #[error("ROM size {size:#x} is below the minimum of {min:#x}")]
    BelowMinimum { size: u32, min: u32 },
    #[error("ROM at {offset:#08x} is not aligned to its size {size:#x}")]
    Misaligned { offset: u32, size: u32 },
    #[error("ROM at {offset:#08x} ({size:#x} bytes) overlaps ROM {conflict} at {conflict_offset:#08x} ({conflict_size:#x} bytes)")]
    Overlap {
        offset: u32,
        size: u32,
        conflict: RomId,
        conflict_offset: u32,
        conflict_size: u32,
    },
    #[error("ROM at {offset:#08x} would be out of order next to ROM {neighbor} at {neighbor_offset:#08x}")]
    OutOfOrder {
        offset: u32,
        neighbor: RomId,
        neighbor_offset: u32,
    },
    #[error("ROM at {offset:#08x} ({size:#x} bytes) does not fit in a page of {page_size:#x} bytes")]
    OutOfPage {
        offset: u32,
        size: u32,
        page_size: u32,
    },
    #[error("ROM {0} is not in this image")]
    DanglingRom(RomId),
}

/// A rejected insert. The image was left untouched and the ROM is handed back.
pub struct InsertError<H, F> {
    pub rom: Rom<H, F>,
    pub error: LayoutError,
}

impl<H, F> InsertError<H, F> {
    pub fn new(rom: Rom<H, F>, error: LayoutError) -> Self {
        Self { rom, error }
    }

    pub fn into_rom(self) -> Rom<H, F> {
        self.rom
    }
}

impl<H, F> fmt::Debug for InsertError<H, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InsertError")
            .field("offset", &self.rom.offset)
            .field("size", &self.rom.size)
            .field("error", &self.error)
            .finish()
    }
}

impl<H, F> fmt::Display for InsertError<H, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl<H, F> std::error::Error for InsertError<H, F> {}
