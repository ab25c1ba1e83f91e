/// One decoded yEnc part, with its placement inside the target file.
///
/// `begin`/`end` are the 1-based inclusive byte offsets from the `=ypart`
/// line; a single-part article covers the whole file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPart {
    pub filename: String,
    pub file_size: u64,
    pub part_number: Option<u32>,
    pub begin: u64,
    pub end: u64,
    pub data: Vec<u8>,
    pub crc32: u32,
}

impl DecodedPart {
    /// Zero-based offset at which `data` belongs in the assembled file.
    pub fn file_offset(&self) -> u64 {
        self.begin - 1
    }
}
