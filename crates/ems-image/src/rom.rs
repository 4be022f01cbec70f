/// Where the bytes of a ROM come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RomSource<F> {
    /// Already programmed, living at `origin_offset` in the flash device
    Flash { origin_offset: u32 },
    /// Staged from outside the cartridge. The payload is the caller's and is never looked at here.
    File(F),
}

impl<F> RomSource<F> {
    pub fn is_flash(&self) -> bool {
        matches!(self, RomSource::Flash { .. })
    }

    pub fn is_file(&self) -> bool {
        matches!(self, RomSource::File(_))
    }

    pub fn origin_offset(&self) -> Option<u32> {
        match self {
            RomSource::Flash { origin_offset } => Some(*origin_offset),
            RomSource::File(_) => None,
        }
    }

    pub fn file_info(&self) -> Option<&F> {
        match self {
            RomSource::Flash { .. } => None,
            RomSource::File(info) => Some(info),
        }
    }
}

/// One ROM placed in a page.
///
/// `size` is the space taken in the page and may be larger than the size the
/// header advertises. `H` is the decoded header and `F` the staging reference of
/// file sourced ROMs; neither is interpreted by the image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rom<H, F> {
    pub offset: u32,
    pub size: u32,
    pub source: RomSource<F>,
    pub header: H,
}

impl<H, F> Rom<H, F> {
    pub const fn new(offset: u32, size: u32, source: RomSource<F>, header: H) -> Self {
        Self {
            offset,
            size,
            source,
            header,
        }
    }

    pub const fn from_flash(offset: u32, size: u32, origin_offset: u32, header: H) -> Self {
        Self::new(offset, size, RomSource::Flash { origin_offset }, header)
    }

    pub const fn from_file(offset: u32, size: u32, file_info: F, header: H) -> Self {
        Self::new(offset, size, RomSource::File(file_info), header)
    }

    /// First byte past the ROM. Computed in 64 bits so it never wraps.
    pub fn end(&self) -> u64 {
        self.offset as u64 + self.size as u64
    }

    pub fn overlaps<H2, F2>(&self, other: &Rom<H2, F2>) -> bool {
        (self.offset as u64) < other.end() && (other.offset as u64) < self.end()
    }

    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.offset && (addr as u64) < self.end()
    }

    /// A ROM must start on a multiple of its own size. Zero sized ROMs are never aligned.
    pub fn is_aligned(&self) -> bool {
        self.size != 0 && self.offset % self.size == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestRom = Rom<(), &'static str>;

    #[test]
    pub fn end_does_not_wrap() {
        let rom = TestRom::from_flash(0x8000_0000, 0x8000_0000, 0, ());
        assert_eq!(rom.end(), 0x1_0000_0000);
    }

    #[test]
    pub fn overlap_is_half_open() {
        let a = TestRom::from_flash(0, 0x8000, 0, ());
        let b = TestRom::from_flash(0x8000, 0x8000, 0x8000, ());
        let c = TestRom::from_file(0x4000, 0x8000, "c.gb", ());

        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
        assert!(a.overlaps(&a));
    }

    #[test]
    pub fn alignment() {
        assert!(TestRom::from_flash(0x10000, 0x8000, 0, ()).is_aligned());
        assert!(!TestRom::from_flash(100, 0x8000, 0, ()).is_aligned());
        assert!(!TestRom::from_flash(0, 0, 0, ()).is_aligned());
    }

    #[test]
    pub fn source_accessors() {
        let flash = TestRom::from_flash(0, 0x8000, 0x40_0000, ());
        assert!(flash.source.is_flash());
        assert_eq!(flash.source.origin_offset(), Some(0x40_0000));
        assert_eq!(flash.source.file_info(), None);

        let file = TestRom::from_file(0, 0x8000, "tetris.gb", ());
        assert!(file.source.is_file());
        assert_eq!(file.source.origin_offset(), None);
        assert_eq!(file.source.file_info(), Some(&"tetris.gb"));
    }

    #[test]
    pub fn contains_address() {
        let rom = TestRom::from_flash(0x8000, 0x8000, 0, ());
        assert!(!rom.contains(0x7fff));
        assert!(rom.contains(0x8000));
        assert!(rom.contains(0xffff));
        assert!(!rom.contains(0x10000));
    }
}
