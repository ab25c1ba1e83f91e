//! yEnc ([draft 1.3](http://www.yenc.org/yenc-draft.1.3.txt)) decoding and
//! encoding with CRC32 verification, operating on materialized article
//! lines. Fetching and framing those lines is someone else's job.

pub mod decode;
pub mod encode;
pub mod error;
pub mod model;

pub use decode::{decode_part, unescape_line};
pub use encode::Encoder;
pub use error::{CrcScope, YencError};
pub use model::DecodedPart;
