use std::{fs, io::Write, path::PathBuf};

use ems_image::{policy::rom_size_for, Cartridge, CartridgeIter, Image, Rom};
use log::{debug, info};

use crate::Staged;

/// Header decoding is not done here, file ROMs carry no header
pub type FileImage = Image<(), PathBuf>;

/// Stages every file at its offset and writes the resulting layout to `output`.
///
/// Stops at the first ROM the page cannot take.
pub fn check(
    cartridge: &dyn Cartridge,
    page: u32,
    roms: Vec<Staged>,
    mut output: impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let base = cartridge.page_base(page).ok_or_else(|| {
        format!(
            "Cartridge {} has no page {} (it has {})",
            cartridge.name(),
            page,
            cartridge.page_count()
        )
    })?;

    info!(
        "Laying out {} ROM(s) in page {} of {}",
        roms.len(),
        page,
        cartridge.name()
    );

    let image = stage(cartridge, roms)?;
    write_layout(&image, base, cartridge.page_size(), &mut output)?;

    Ok(())
}

pub fn stage(
    cartridge: &dyn Cartridge,
    roms: Vec<Staged>,
) -> Result<FileImage, Box<dyn std::error::Error>> {
    let mut image = FileImage::with_limits(cartridge.limits());

    for Staged { path, offset } in roms {
        let len = fs::metadata(&path)
            .map_err(|err| format!("{}: {}", path.display(), err))?
            .len();
        let size = rom_size_for(len, cartridge.min_rom_size())
            .ok_or_else(|| format!("{}: {} bytes is too large", path.display(), len))?;

        debug!(
            "{}: {} bytes, placed as {:#x} at {:#08x}",
            path.display(),
            len,
            size,
            offset
        );

        if let Err(err) = image.insert(Rom::from_file(offset, size, path, ())) {
            let path = err.rom.source.file_info().cloned().unwrap_or_default();
            return Err(format!("{}: {}", path.display(), err.error).into());
        }
    }

    Ok(image)
}

pub fn write_layout(
    image: &FileImage,
    base: u32,
    page_size: u32,
    output: &mut impl Write,
) -> std::io::Result<()> {
    for (_, rom) in image {
        let name = match rom.source.file_info() {
            Some(path) => path.display().to_string(),
            None => format!("flash @ {:#08x}", rom.source.origin_offset().unwrap_or(0)),
        };
        writeln!(
            output,
            "{:#08x}..{:#08x} {:>8} {}",
            base as u64 + rom.offset as u64,
            base as u64 + rom.end(),
            rom.size / 1024,
            name
        )?;
    }

    let free = (page_size as u64).saturating_sub(image.used_bytes());
    writeln!(output, "{} KiB free of {} KiB", free / 1024, page_size / 1024)
}

pub fn list_cartridges(mut output: impl Write) -> Result<(), Box<dyn std::error::Error>> {
    for cartridge in CartridgeIter::new() {
        writeln!(
            output,
            "{:<8} {} page(s) of {} KiB, ROMs of at least {} KiB",
            cartridge.name(),
            cartridge.page_count(),
            cartridge.page_size() / 1024,
            cartridge.min_rom_size() / 1024
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ems_image::cartridge::{EMS32M, EMS64M};
    use std::path::Path;
    use tempfile::tempdir;

    /// Writes `len` bytes of erased flash to `dir/name`
    fn rom_file(dir: &Path, name: &str, len: usize) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, vec![0xffu8; len]).unwrap();
        path
    }

    #[test]
    pub fn stages_and_rounds_up() {
        let dir = tempdir().unwrap();
        let small = rom_file(dir.path(), "small.gb", 100);
        let odd = rom_file(dir.path(), "odd.gb", 0x9000);

        let image = stage(
            &EMS64M,
            vec![
                Staged {
                    path: odd,
                    offset: 0x10000,
                },
                Staged {
                    path: small.clone(),
                    offset: 0,
                },
            ],
        )
        .unwrap();

        let roms: Vec<_> = image.iter().map(|(_, rom)| rom).collect();
        assert_eq!(roms.len(), 2);
        assert_eq!((roms[0].offset, roms[0].size), (0, 0x8000));
        assert_eq!(roms[0].source.file_info(), Some(&small));
        assert_eq!((roms[1].offset, roms[1].size), (0x10000, 0x10000));
        assert!(image.validate().is_ok());
    }

    #[test]
    pub fn rejects_overlap_with_file_name() {
        let dir = tempdir().unwrap();
        let a = rom_file(dir.path(), "a.gb", 0x8000);
        let b = rom_file(dir.path(), "b.gb", 0x10000);

        let err = stage(
            &EMS32M,
            vec![
                Staged { path: a, offset: 0 },
                Staged {
                    path: b.clone(),
                    offset: 0,
                },
            ],
        )
        .unwrap_err()
        .to_string();

        assert!(err.starts_with(&b.display().to_string()), "{}", err);
        assert!(err.contains("overlaps"), "{}", err);
    }

    #[test]
    pub fn missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let err = stage(
            &EMS64M,
            vec![Staged {
                path: dir.path().join("nope.gb"),
                offset: 0,
            }],
        );
        assert!(err.is_err());
    }

    #[test]
    pub fn layout_on_second_page() {
        let dir = tempdir().unwrap();
        let rom = rom_file(dir.path(), "tetris.gb", 0x8000);

        let mut out = Vec::new();
        check(
            &EMS64M,
            1,
            vec![Staged {
                path: rom.clone(),
                offset: 0x8000,
            }],
            &mut out,
        )
        .unwrap();

        let out = String::from_utf8(out).unwrap();
        let mut lines = out.lines();
        assert_eq!(
            lines.next().unwrap(),
            format!("0x408000..0x410000       32 {}", rom.display())
        );
        assert_eq!(lines.next().unwrap(), "4064 KiB free of 4096 KiB");

        assert!(check(&EMS64M, 2, Vec::new(), Vec::new()).is_err());
    }

    #[test]
    pub fn flash_roms_are_listed_by_origin() {
        let mut image = FileImage::new();
        image.insert_tail(Rom::from_flash(0, 0x8000, 0x40_8000, ()));

        let mut out = Vec::new();
        write_layout(&image, 0, 0x40_0000, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("0x000000..0x008000       32 flash @ 0x408000\n"), "{}", out);
    }

    #[test]
    pub fn lists_every_cartridge() {
        let mut out = Vec::new();
        list_cartridges(&mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.lines().count(), CartridgeIter::new().count());
        assert!(out.contains("ems64m   2 page(s) of 4096 KiB"), "{}", out);
    }
}
