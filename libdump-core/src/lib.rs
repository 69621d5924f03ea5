pub mod autoscan;
pub mod error;
pub mod file;
pub mod header;
pub mod image;
pub mod linkedit;
#[cfg(unix)]
pub mod loader;
pub mod load_command;
pub mod records;
pub mod report;
pub mod sections;
pub mod symbols;
pub mod view;

#[cfg(test)]
mod testutil;

pub use autoscan::*;
pub use error::*;
pub use file::ImageFile;
pub use header::{validate, Header, MachHeader64};
pub use image::*;
#[cfg(unix)]
pub use loader::*;
pub use records::*;
pub use report::*;
