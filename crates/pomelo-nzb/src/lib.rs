//! NZB manifest handling: a streaming reader, a round-tripping writer, and
//! the model types they share. An NZB file is the XML shopping list a
//! downloader walks while fetching binaries from a news server.

pub mod error;
pub mod model;
pub mod reader;
pub mod writer;

pub use error::NzbError;
pub use model::{Nzb, NzbFile, NzbMeta, Segment};
pub use reader::{extract_filename, read, read_auto};
pub use writer::write;
