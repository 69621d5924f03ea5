//! Loading a library into this process and finding where its image is mapped.

use crate::autoscan::ImageSource;
use crate::header::identify;
use crate::image::Image;
use crate::{DumpError, Result};
use goblin::mach::header::SIZEOF_HEADER_64;
use libloading::os::unix::{Library, Symbol, RTLD_LAZY};
use std::ffi::c_void;
use std::path::Path;
use std::ptr::NonNull;

/// A library opened with lazy binding. The handle is closed when this value
/// is dropped.
pub struct LoadedLibrary {
    path: String,
    library: Library,
}

impl LoadedLibrary {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let display = path.as_ref().display().to_string();
        // SAFETY: loading runs the library's initializers. The caller chose
        // this library; nothing else is assumed about it.
        let library = unsafe { Library::open(Some(path.as_ref()), RTLD_LAZY) }.map_err(|err| {
            DumpError::LoadFailure {
                path: display.clone(),
                reason: err.to_string(),
            }
        })?;
        log::info!("Loaded {display}");
        Ok(Self {
            path: display,
            library,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Looks `symbol` up through the dynamic symbol table.
    pub fn symbol_address(&self, symbol: &str) -> Result<NonNull<c_void>> {
        // SAFETY: the symbol is only used as an address and never called or
        // dereferenced as `T`.
        let found: Symbol<*mut c_void> = unsafe { self.library.get(symbol.as_bytes()) }
            .map_err(|err| DumpError::unresolved(symbol, err.to_string()))?;
        NonNull::new(*found).ok_or_else(|| DumpError::unresolved(symbol, "symbol address is null"))
    }

    /// Returns the base address of the image that defines `symbol`.
    pub fn base_address(&self, symbol: &str) -> Result<NonNull<u8>> {
        let address = self.symbol_address(symbol)?;

        // SAFETY: an all-zero Dl_info is a valid value for dladdr to fill in.
        let mut info: libc::Dl_info = unsafe { std::mem::zeroed() };
        // SAFETY: `address` came from dlsym on a library we keep loaded.
        if unsafe { libc::dladdr(address.as_ptr() as *const c_void, &mut info) } == 0 {
            return Err(DumpError::unresolved(symbol, "dladdr failed"));
        }

        let base = NonNull::new(info.dli_fbase as *mut u8)
            .ok_or_else(|| DumpError::unresolved(symbol, "dli_fbase is null"))?;
        log::info!("{symbol} is defined in the image at {:p}", base.as_ptr());
        Ok(base)
    }

    /// Views the image mapped at `base`, which must have been returned by
    /// [`LoadedLibrary::base_address`].
    ///
    /// The view starts as the fixed header, grows to cover the load commands
    /// once the magic is known good, and finally to the mapped segments.
    pub fn image_at(&self, base: NonNull<u8>) -> Result<Image<'_>> {
        // SAFETY: dyld maps at least the header page of every loaded image
        // and the image stays mapped while `self` keeps the library open.
        let head = unsafe { std::slice::from_raw_parts(base.as_ptr(), SIZEOF_HEADER_64) };
        let header_only = Image::from_view(identify(head)?)?;

        let commands_len = SIZEOF_HEADER_64 + header_only.header().sizeofcmds as usize;
        // SAFETY: the load commands live in the same mapped page run as the header.
        let commands = unsafe { std::slice::from_raw_parts(base.as_ptr(), commands_len) };
        let mapped_len = Image::parse(commands)?.mapped_len()?;

        log::debug!("Image at {:p} maps {mapped_len:#x} bytes", base.as_ptr());
        // SAFETY: `mapped_len` only spans segments contiguous with the header,
        // all of which dyld mapped when it loaded the image.
        let bytes = unsafe { std::slice::from_raw_parts(base.as_ptr(), mapped_len) };
        Image::parse(bytes)
    }
}

impl ImageSource for LoadedLibrary {
    fn locate(&self, symbol: &str) -> Result<NonNull<u8>> {
        self.base_address(symbol)
    }

    fn image(&self, base: NonNull<u8>) -> Result<Image<'_>> {
        self.image_at(base)
    }
}

impl Drop for LoadedLibrary {
    fn drop(&mut self) {
        log::debug!("Closing {}", self.path);
    }
}
