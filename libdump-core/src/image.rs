use crate::header::{identify, Header, MachHeader64};
use crate::load_command::LoadCommands;
use crate::records::Record;
use crate::report::Report;
use crate::sections::Segment;
use crate::view::ImageView;
use crate::Result;

/// A validated Mach-O 64-bit image borrowed from memory.
#[derive(Debug, Clone, Copy)]
pub struct Image<'a> {
    view: ImageView<'a>,
    header: MachHeader64,
}

impl<'a> Image<'a> {
    /// Validates the magic and reads the header.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        Self::from_view(identify(bytes)?)
    }

    pub fn from_view(view: ImageView<'a>) -> Result<Self> {
        let header = MachHeader64::parse(&view)?;
        log::debug!(
            "{} {} image: {} load commands, {} bytes of commands",
            header.format_name(),
            header.file_type_name(),
            header.ncmds,
            header.sizeofcmds
        );
        Ok(Self { view, header })
    }

    pub fn header(&self) -> &MachHeader64 {
        &self.header
    }

    pub fn load_commands(&self) -> LoadCommands<'a> {
        LoadCommands::new(self.view, &self.header)
    }

    /// Decodes every load command. Any malformed command fails the whole
    /// pass, so a returned report is never partial.
    pub fn report(&self) -> Result<Report> {
        let records = self
            .load_commands()
            .map(|raw| Record::decode(&self.view, &raw?))
            .collect::<Result<Vec<_>>>()?;
        Ok(Report::new(self.header, records))
    }

    /// Decodes only the segment commands.
    pub fn segments(&self) -> Result<Vec<Segment>> {
        let mut segments = Vec::new();
        for raw in self.load_commands() {
            let raw = raw?;
            if raw.cmd == goblin::mach::load_command::LC_SEGMENT_64 {
                segments.push(Segment::parse(&self.view, &raw)?);
            }
        }
        Ok(segments)
    }

    /// Returns how many bytes from the header onward are mapped when the
    /// image is loaded: the segment holding the header plus every segment
    /// that continues it without a gap. Never less than the header and its
    /// load commands.
    pub fn mapped_len(&self) -> Result<usize> {
        let commands_end = self.header.header_size() + self.header.sizeofcmds as usize;
        let mut segments: Vec<_> = self
            .segments()?
            .into_iter()
            .filter(|s| s.vmsize > 0)
            .collect();
        segments.sort_by_key(|s| s.vmaddr);

        // Images inside the shared cache carry cache-relative file offsets,
        // so fall back to the segment name there.
        let anchor = segments
            .iter()
            .find(|s| s.fileoff == 0 && s.filesize > 0)
            .or_else(|| segments.iter().find(|s| s.segname == "__TEXT"));
        let Some(anchor) = anchor else {
            return Ok(commands_end);
        };
        let start = anchor.vmaddr;
        let mut end = start.saturating_add(anchor.vmsize);
        for segment in segments.iter().filter(|s| s.vmaddr >= start) {
            if segment.vmaddr > end {
                break;
            }
            end = end.max(segment.vmaddr.saturating_add(segment.vmsize));
        }

        let span = usize::try_from(end - start).unwrap_or(usize::MAX);
        Ok(span.max(commands_end))
    }
}
