//! Traversal of the load-command region that follows the header.

use crate::header::Header;
use crate::view::ImageView;
use crate::{DumpError, Result};
use goblin::mach::load_command::{cmd_to_str, SIZEOF_LOAD_COMMAND};

/// A load command located by the walker, before decoding.
#[derive(Debug, Clone, Copy)]
pub struct RawCommand {
    /// Offset of the command from the start of the image.
    pub offset: usize,
    pub cmd: u32,
    pub cmdsize: u32,
}

impl RawCommand {
    pub fn name(&self) -> &'static str {
        cmd_to_str(self.cmd)
    }
}

/// Iterator over the `ncmds` load commands of an image.
///
/// Each command's `cmdsize` locates the next one. A command whose size is
/// smaller than the common prefix or that runs past the end of the image
/// yields a `MalformedRecord` error, after which the iterator is exhausted.
pub struct LoadCommands<'a> {
    view: ImageView<'a>,
    cursor: usize,
    remaining: u32,
}

impl<'a> LoadCommands<'a> {
    pub fn new(view: ImageView<'a>, header: &dyn Header) -> Self {
        Self {
            view,
            cursor: header.header_size(),
            remaining: header.command_count(),
        }
    }

    fn read_next(&mut self) -> Result<RawCommand> {
        let offset = self.cursor;
        let mut prefix = self.view.fields(offset, SIZEOF_LOAD_COMMAND)?;
        let cmd = prefix.u32()?;
        let cmdsize = prefix.u32()?;

        if (cmdsize as usize) < SIZEOF_LOAD_COMMAND {
            return Err(DumpError::malformed(
                offset,
                format!("{} declares cmdsize {cmdsize}", cmd_to_str(cmd)),
            ));
        }
        self.view.bytes_at(offset, cmdsize as usize)?;

        self.cursor = offset + cmdsize as usize;
        Ok(RawCommand {
            offset,
            cmd,
            cmdsize,
        })
    }
}

impl<'a> Iterator for LoadCommands<'a> {
    type Item = Result<RawCommand>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        match self.read_next() {
            Ok(command) => {
                self.remaining -= 1;
                log::debug!(
                    "{} at {:#x} ({} bytes)",
                    command.name(),
                    command.offset,
                    command.cmdsize
                );
                Some(Ok(command))
            }
            Err(err) => {
                self.remaining = 0;
                Some(Err(err))
            }
        }
    }
}

/// Calls `on_record` once per load command, in order, and returns how many
/// commands were visited. Stops at the first malformed command or the first
/// error returned by `on_record`.
pub fn walk<F>(view: ImageView<'_>, header: &dyn Header, mut on_record: F) -> Result<usize>
where
    F: FnMut(RawCommand) -> Result<()>,
{
    let mut visited = 0;
    for command in LoadCommands::new(view, header) {
        on_record(command?)?;
        visited += 1;
    }
    Ok(visited)
}
