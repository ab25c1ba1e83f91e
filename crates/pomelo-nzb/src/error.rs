use thiserror::Error;

#[derive(Debug, Error)]
pub enum NzbError {
    #[error("XML error: {0}")]
    Xml(String),

    #[error("document has no <nzb> root element")]
    MissingRoot,

    #[error("document contains no files")]
    NoFiles,

    #[error("file {subject:?} lists no groups")]
    FileWithoutGroups { subject: String },

    #[error("file {subject:?} lists no segments")]
    FileWithoutSegments { subject: String },

    #[error("segment is missing its message-id")]
    SegmentWithoutMessageId,

    #[error("invalid or missing {attribute} attribute on <{element}>")]
    InvalidAttribute {
        element: &'static str,
        attribute: &'static str,
    },
}
