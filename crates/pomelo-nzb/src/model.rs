use serde::{Deserialize, Serialize};

/// The `<head>` metadata block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NzbMeta {
    pub title: Option<String>,
    pub password: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    /// Meta keys this library does not interpret, in document order.
    pub extra: Vec<(String, String)>,
}

/// One article holding a slice of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub number: u32,
    pub bytes: u64,
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NzbFile {
    pub poster: String,
    /// Posting time as a unix timestamp, as NZB writes it.
    pub date: i64,
    pub subject: String,
    /// Extracted from the quoted portion of the subject, when present.
    pub filename: Option<String>,
    pub groups: Vec<String>,
    /// Sorted by segment number.
    pub segments: Vec<Segment>,
}

impl NzbFile {
    pub fn total_bytes(&self) -> u64 {
        self.segments.iter().map(|s| s.bytes).sum()
    }
}

/// A parsed NZB manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nzb {
    pub meta: NzbMeta,
    pub files: Vec<NzbFile>,
}

impl Nzb {
    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(NzbFile::total_bytes).sum()
    }

    pub fn segment_count(&self) -> usize {
        self.files.iter().map(|f| f.segments.len()).sum()
    }
}
