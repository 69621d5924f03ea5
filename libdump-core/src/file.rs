//! Reading an image from disk instead of from a loaded library.

use crate::image::Image;
use crate::view::{Endian, ImageView};
use crate::{DumpError, Result};
use goblin::mach::constants::cputype::CPU_ARCH_ABI64;
use goblin::mach::fat::{FAT_MAGIC, SIZEOF_FAT_ARCH, SIZEOF_FAT_HEADER};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Magic of a universal file whose slice offsets and sizes are 64-bit.
const FAT_MAGIC_64: u32 = 0xcafe_babf;
/// `fat_arch_64`: cputype, cpusubtype, offset, size, align, reserved.
const SIZEOF_FAT_ARCH_64: usize = 32;

#[cfg(target_arch = "aarch64")]
const HOST_CPU_TYPE: u32 = goblin::mach::constants::cputype::CPU_TYPE_ARM64;
#[cfg(not(target_arch = "aarch64"))]
const HOST_CPU_TYPE: u32 = goblin::mach::constants::cputype::CPU_TYPE_X86_64;

/// An image file read fully into memory.
pub struct ImageFile {
    pub path: PathBuf,
    bytes: Vec<u8>,
}

impl ImageFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = std::fs::File::open(&path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        log::info!("Read {} bytes from {}", bytes.len(), path.as_ref().display());
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            bytes,
        })
    }

    /// Returns the image to decode. Universal files are narrowed to one slice.
    pub fn image(&self) -> Result<Image<'_>> {
        Image::parse(thin_slice(&self.bytes)?)
    }
}

#[derive(Debug, Clone, Copy)]
struct FatArch {
    cputype: u32,
    offset: u64,
    size: u64,
}

/// Returns the Mach-O slice to decode from `bytes`.
///
/// Thin files are returned unchanged. For universal files, with 32-bit or
/// 64-bit slice tables, the slice for the host CPU is preferred, then the
/// first 64-bit slice.
pub fn thin_slice(bytes: &[u8]) -> Result<&[u8]> {
    let wide = match bytes.get(..4) {
        Some(&[a, b, c, d]) => match u32::from_be_bytes([a, b, c, d]) {
            FAT_MAGIC => false,
            FAT_MAGIC_64 => true,
            _ => return Ok(bytes),
        },
        _ => return Ok(bytes),
    };
    let arch_size = if wide {
        SIZEOF_FAT_ARCH_64
    } else {
        SIZEOF_FAT_ARCH
    };

    // Fat headers are always big-endian
    let view = ImageView::new(bytes, Endian::Big);
    let nfat_arch = view.read_u32(4)? as usize;
    let mut arches = Vec::with_capacity(nfat_arch.min(16));
    for i in 0..nfat_arch {
        let mut fields = view.fields(SIZEOF_FAT_HEADER + i * arch_size, arch_size)?;
        let cputype = fields.u32()?;
        let _cpusubtype = fields.u32()?;
        let (offset, size) = if wide {
            (fields.u64()?, fields.u64()?)
        } else {
            (u64::from(fields.u32()?), u64::from(fields.u32()?))
        };
        arches.push(FatArch {
            cputype,
            offset,
            size,
        });
    }

    let chosen = arches
        .iter()
        .find(|arch| arch.cputype == HOST_CPU_TYPE)
        .or_else(|| arches.iter().find(|arch| arch.cputype & CPU_ARCH_ABI64 != 0))
        .ok_or_else(|| {
            DumpError::UnsupportedImage(format!(
                "universal file with {nfat_arch} slices has no 64-bit slice"
            ))
        })?;

    log::info!(
        "Universal file: using slice for cputype {:#x} at {:#x} ({} bytes)",
        chosen.cputype,
        chosen.offset,
        chosen.size
    );
    let offset = usize::try_from(chosen.offset)
        .map_err(|_| DumpError::UnsupportedImage("slice offset exceeds address space".into()))?;
    let size = usize::try_from(chosen.size)
        .map_err(|_| DumpError::UnsupportedImage("slice size exceeds address space".into()))?;
    view.bytes_at(offset, size)
}
