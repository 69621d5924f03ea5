pub mod macho;

pub use macho::MachHeader64;

use crate::view::{Endian, ImageView};
use crate::{DumpError, Result};
use goblin::mach::header::{MH_CIGAM_64, MH_MAGIC_64};

pub trait Header: std::fmt::Debug + Send + Sync {
    /// Returns the number of load commands following the header.
    fn command_count(&self) -> u32;

    /// Returns the declared byte size of the load-command region.
    fn commands_size(&self) -> u32;

    /// Returns the size of the fixed header, i.e. where the first command starts.
    fn header_size(&self) -> usize;

    /// Returns a short human-readable name, e.g. "Mach-O 64".
    fn format_name(&self) -> &'static str;

    /// Returns a short name for the file type, e.g. "DYLIB".
    fn file_type_name(&self) -> &'static str;
}

/// Returns the byte order implied by the magic at the start of `bytes`, or
/// `None` if the magic is not a 64-bit Mach-O one.
pub fn detect_endian(bytes: &[u8]) -> Option<Endian> {
    let magic: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
    match u32::from_le_bytes(magic) {
        MH_MAGIC_64 => Some(Endian::Little),
        MH_CIGAM_64 => Some(Endian::Big),
        _ => None,
    }
}

/// Checks that `bytes` begins with a recognized Mach-O 64-bit magic.
///
/// Nothing past the magic is inspected; deeper problems surface as
/// `MalformedRecord` while walking the load commands.
pub fn validate(bytes: &[u8]) -> bool {
    if bytes.is_empty() {
        log::error!("Image buffer is empty");
        return false;
    }
    if detect_endian(bytes).is_none() {
        log::error!("Invalid Mach-O magic number");
        return false;
    }
    true
}

/// Wraps `bytes` in a view with the byte order taken from its magic.
pub fn identify(bytes: &[u8]) -> Result<ImageView<'_>> {
    match detect_endian(bytes) {
        Some(endian) => Ok(ImageView::new(bytes, endian)),
        None => Err(DumpError::ValidationFailure {
            actual: bytes.iter().take(4).copied().collect(),
        }),
    }
}
