//! Dumping the images behind a fixed list of well-known symbols.

use crate::image::Image;
use crate::Result;
use std::fmt;
use std::ptr::NonNull;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Function,
    Variable,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SymbolKind::Function => "function",
            SymbolKind::Variable => "variable",
        };
        write!(f, "{}", name)
    }
}

/// A symbol name to look up during a scan. The kind is informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WellKnownSymbol {
    pub name: &'static str,
    pub kind: SymbolKind,
}

const fn function(name: &'static str) -> WellKnownSymbol {
    WellKnownSymbol {
        name,
        kind: SymbolKind::Function,
    }
}

const fn variable(name: &'static str) -> WellKnownSymbol {
    WellKnownSymbol {
        name,
        kind: SymbolKind::Variable,
    }
}

/// Allocator, stdio, dl* and C++ runtime symbols, sorted by name. Names are
/// passed to the dynamic linker exactly as written.
pub const DEFAULT_SCAN_LIST: &[WellKnownSymbol] = &[
    function("__assert_rtn"),
    function("__builtin_frame_address"),
    function("__builtin_return_address"),
    function("__cxa_atexit"),
    function("__cxa_begin_catch"),
    function("__cxa_end_catch"),
    function("__cxa_finalize"),
    function("__cxa_guard_abort"),
    function("__cxa_guard_acquire"),
    function("__cxa_guard_release"),
    function("__cxa_pure_virtual"),
    function("__cxa_rethrow"),
    function("__cxa_throw"),
    variable("__dso_handle"),
    function("__stack_chk_fail"),
    function("_dlclose"),
    function("_dlerror"),
    function("_dlopen"),
    function("_dlsym"),
    variable("_environ"),
    function("_free"),
    function("_malloc"),
    function("_memcpy"),
    function("_printf"),
    function("_strcmp"),
];

/// An image found through one of its symbols.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedImage<'a> {
    /// Address the image is mapped at.
    pub base: usize,
    pub image: Image<'a>,
}

/// Progress of one table entry through a scan.
#[derive(Debug, Clone, Copy)]
pub enum ScanEvent<'a> {
    /// The symbol resolved to an image mapped at `base`. Its header has not
    /// been checked yet.
    Located { base: usize },
    /// The image at `base` has a valid header.
    Image(ResolvedImage<'a>),
}

/// Maps symbol names to the images that define them.
pub trait ImageSource {
    /// Returns the base address of the image defining `symbol`, or
    /// `ResolutionFailure` when the symbol or its image cannot be found.
    fn locate(&self, symbol: &str) -> Result<NonNull<u8>>;

    /// Views the image mapped at a base returned by [`ImageSource::locate`].
    /// Fails with `ValidationFailure` when the header is not recognized.
    fn image(&self, base: NonNull<u8>) -> Result<Image<'_>>;
}

pub struct AutoScanner<'t> {
    table: &'t [WellKnownSymbol],
}

impl<'t> AutoScanner<'t> {
    pub fn new(table: &'t [WellKnownSymbol]) -> Self {
        Self { table }
    }

    /// Resolves every symbol of the table in order. `on_event` sees each
    /// base address as soon as it is known, then the validated image. A
    /// symbol that cannot be resolved is skipped; any other error ends the
    /// scan. Returns the number of images handed over.
    pub fn run<'s, S, F>(&self, source: &'s S, mut on_event: F) -> Result<usize>
    where
        S: ImageSource,
        F: FnMut(&WellKnownSymbol, ScanEvent<'s>) -> Result<()>,
    {
        let mut dumped = 0;
        for entry in self.table {
            let base = match source.locate(entry.name) {
                Ok(base) => base,
                Err(err) if err.is_resolution() => {
                    log::warn!("Skipping {} {}: {err}", entry.kind, entry.name);
                    continue;
                }
                Err(err) => return Err(err),
            };
            let address = base.as_ptr() as usize;
            on_event(entry, ScanEvent::Located { base: address })?;

            let image = source.image(base)?;
            on_event(
                entry,
                ScanEvent::Image(ResolvedImage {
                    base: address,
                    image,
                }),
            )?;
            dumped += 1;
        }
        Ok(dumped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ImageBuilder;
    use crate::DumpError;
    use std::cell::RefCell;
    use std::collections::HashMap;

    struct FakeSource {
        images: HashMap<&'static str, Vec<u8>>,
        calls: RefCell<Vec<String>>,
    }

    impl ImageSource for FakeSource {
        fn locate(&self, symbol: &str) -> Result<NonNull<u8>> {
            self.calls.borrow_mut().push(symbol.to_string());
            let bytes = self
                .images
                .get(symbol)
                .ok_or_else(|| DumpError::unresolved(symbol, "not defined"))?;
            NonNull::new(bytes.as_ptr() as *mut u8)
                .ok_or_else(|| DumpError::unresolved(symbol, "empty image"))
        }

        fn image(&self, base: NonNull<u8>) -> Result<Image<'_>> {
            let bytes = self
                .images
                .values()
                .find(|bytes| bytes.as_ptr() == base.as_ptr() as *const u8)
                .ok_or_else(|| DumpError::UnsupportedImage("unknown base".to_string()))?;
            Image::parse(bytes)
        }
    }

    const TABLE: &[WellKnownSymbol] = &[function("_a"), variable("_b"), function("_c")];

    #[test]
    fn test_default_table_is_sorted_and_complete() {
        assert_eq!(DEFAULT_SCAN_LIST.len(), 25);
        assert!(DEFAULT_SCAN_LIST.windows(2).all(|w| w[0].name < w[1].name));
        let variables: Vec<_> = DEFAULT_SCAN_LIST
            .iter()
            .filter(|s| s.kind == SymbolKind::Variable)
            .map(|s| s.name)
            .collect();
        assert_eq!(variables, vec!["__dso_handle", "_environ"]);
    }

    #[test]
    fn test_unresolved_symbols_are_skipped() {
        let source = FakeSource {
            images: HashMap::from([
                ("_a", ImageBuilder::new().build()),
                ("_c", ImageBuilder::new().command(0x1b, &[0u8; 16]).build()),
            ]),
            calls: RefCell::new(Vec::new()),
        };

        let mut seen = Vec::new();
        let dumped = AutoScanner::new(TABLE)
            .run(&source, |entry, event| {
                if let ScanEvent::Image(resolved) = event {
                    seen.push((entry.name, resolved.image.header().ncmds));
                }
                Ok(())
            })
            .unwrap();

        assert_eq!(dumped, 2);
        assert_eq!(seen, vec![("_a", 0), ("_c", 1)]);
        assert_eq!(*source.calls.borrow(), vec!["_a", "_b", "_c"]);
    }

    #[test]
    fn test_base_is_reported_before_validation() {
        let source = FakeSource {
            images: HashMap::from([
                ("_a", b"\x7fELF\x02\x01\x01\x00".to_vec()),
                ("_c", ImageBuilder::new().build()),
            ]),
            calls: RefCell::new(Vec::new()),
        };
        let elf_base = source.images["_a"].as_ptr() as usize;

        let mut located = Vec::new();
        let mut dumped = 0;
        let err = AutoScanner::new(TABLE)
            .run(&source, |entry, event| {
                match event {
                    ScanEvent::Located { base } => located.push((entry.name, base)),
                    ScanEvent::Image(_) => dumped += 1,
                }
                Ok(())
            })
            .unwrap_err();

        assert!(matches!(err, DumpError::ValidationFailure { .. }));
        assert_eq!(located, vec![("_a", elf_base)]);
        assert_eq!(dumped, 0);
        assert_eq!(*source.calls.borrow(), vec!["_a"]);
    }

    #[test]
    fn test_events_arrive_in_order_per_symbol() {
        let source = FakeSource {
            images: HashMap::from([("_c", ImageBuilder::new().build())]),
            calls: RefCell::new(Vec::new()),
        };
        let expected = source.images["_c"].as_ptr() as usize;

        let mut events = Vec::new();
        AutoScanner::new(TABLE)
            .run(&source, |_, event| {
                events.push(match event {
                    ScanEvent::Located { base } => ("located", base),
                    ScanEvent::Image(resolved) => ("image", resolved.base),
                });
                Ok(())
            })
            .unwrap();

        assert_eq!(events, vec![("located", expected), ("image", expected)]);
    }

    #[test]
    fn test_symbol_kind_display() {
        assert_eq!(SymbolKind::Function.to_string(), "function");
        assert_eq!(SymbolKind::Variable.to_string(), "variable");
    }
}
