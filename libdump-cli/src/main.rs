use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use libdump_core::{render_text, Image, ImageFile};
use std::io::{self, Write};
use std::path::PathBuf;

/// Mach-O load command dumper
#[derive(Parser)]
#[command(
    name = "libdump",
    about = "Dump the symbol table, __text sections and linker metadata of a Mach-O library",
    version,
    author
)]
struct Cli {
    /// Path to the library
    #[arg(required = true)]
    library: PathBuf,

    /// Dump the image that defines this symbol
    symbol: Option<String>,

    /// Dump the images behind a built-in list of well-known symbols
    #[arg(long, conflicts_with = "symbol")]
    auto_dump: bool,

    /// Decode the library file on disk instead of loading it
    #[arg(long, conflicts_with_all = ["symbol", "auto_dump"])]
    file: bool,

    /// Print decoded records as JSON
    #[arg(long)]
    json: bool,
}

enum Mode {
    Symbol(String),
    AutoDump,
    File,
}

impl Cli {
    fn mode(&self) -> Result<Mode> {
        match (&self.symbol, self.auto_dump, self.file) {
            (Some(symbol), false, false) => Ok(Mode::Symbol(symbol.clone())),
            (None, true, false) => Ok(Mode::AutoDump),
            (None, false, true) => Ok(Mode::File),
            _ => bail!(
                "Invalid usage: expected <library_path> [<symbol_name> | --auto-dump | --file]"
            ),
        }
    }
}

fn main() {
    env_logger::init();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            std::process::exit(if err.use_stderr() { 1 } else { 0 });
        }
    };

    if let Err(err) = run(&cli) {
        eprintln!("{} {err:#}", "error:".red().bold());
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.mode()? {
        Mode::File => {
            let file = ImageFile::open(&cli.library)
                .with_context(|| format!("Failed to read {}", cli.library.display()))?;
            let image = file.image().context("Invalid library headers")?;
            dump(&image, None, cli.json, &mut out)?;
        }
        Mode::Symbol(symbol) => dump_symbol(cli, &symbol, &mut out)?,
        Mode::AutoDump => auto_dump(cli, &mut out)?,
    }

    out.flush()?;
    Ok(())
}

#[cfg(unix)]
fn dump_symbol<W: Write>(cli: &Cli, symbol: &str, out: &mut W) -> Result<()> {
    use libdump_core::LoadedLibrary;

    let library = LoadedLibrary::open(&cli.library).context("Failed to load library")?;
    let base = library
        .base_address(symbol)
        .context("Failed to get library base address")?;
    if !cli.json {
        writeln!(out, "Library base address: {:#x}", base.as_ptr() as usize)?;
    }
    let image = library.image_at(base).context("Invalid library headers")?;
    dump(&image, Some(base.as_ptr() as usize), cli.json, out)?;
    Ok(())
}

/// Dumps every image found through the built-in symbol table. As in
/// single-symbol mode, each base address is printed before its header is
/// checked.
#[cfg(unix)]
fn auto_dump<W: Write>(cli: &Cli, out: &mut W) -> Result<()> {
    use libdump_core::{AutoScanner, LoadedLibrary, ScanEvent, DEFAULT_SCAN_LIST};

    let library = LoadedLibrary::open(&cli.library).context("Failed to load library")?;
    let dumped = AutoScanner::new(DEFAULT_SCAN_LIST)
        .run(&library, |entry, event| match event {
            ScanEvent::Located { base } => {
                log::info!("Dumping the image of {} {}", entry.kind, entry.name);
                if !cli.json {
                    writeln!(out, "Library base address: {base:#x}")?;
                }
                Ok(())
            }
            ScanEvent::Image(resolved) => {
                dump(&resolved.image, Some(resolved.base), cli.json, &mut *out)
            }
        })
        .context("Auto-dump aborted")?;
    log::info!("Dumped {dumped} images from {}", library.path());
    Ok(())
}

#[cfg(not(unix))]
fn dump_symbol<W: Write>(_cli: &Cli, _symbol: &str, _out: &mut W) -> Result<()> {
    bail!("Loading libraries is only supported on unix; use --file")
}

#[cfg(not(unix))]
fn auto_dump<W: Write>(_cli: &Cli, _out: &mut W) -> Result<()> {
    bail!("Loading libraries is only supported on unix; use --file")
}

/// Decodes `image` and writes it as text, or as one JSON document per image.
fn dump<W: Write>(
    image: &Image<'_>,
    base: Option<usize>,
    json: bool,
    out: &mut W,
) -> libdump_core::Result<()> {
    let report = image.report()?;
    log::info!(
        "Decoded {} records: {} symbols, {} __text sections",
        report.records.len(),
        report.symbols().count(),
        report.text_sections().count()
    );
    if json {
        let document = serde_json::json!({
            "base": base.map(|b| format!("{b:#x}")),
            "report": report,
        });
        serde_json::to_writer_pretty(&mut *out, &document).map_err(io::Error::from)?;
        writeln!(out)?;
    } else {
        render_text(&report, out)?;
    }
    Ok(())
}
