//! Streaming NZB reader.
//!
//! Element context is tracked with a path stack rather than a full DOM, so
//! arbitrarily large manifests parse in one pass with bounded memory.

use std::io::BufRead;
use std::sync::LazyLock;

use flate2::read::GzDecoder;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;

use crate::error::NzbError;
use crate::model::{Nzb, NzbFile, NzbMeta, Segment};

/// Parse an NZB document, sniffing for gzip compression first. Indexers
/// commonly serve `.nzb.gz`.
pub fn read_auto(data: &[u8]) -> Result<Nzb, NzbError> {
    if data.starts_with(&[0x1f, 0x8b]) {
        read(std::io::BufReader::new(GzDecoder::new(data)))
    } else {
        read(std::io::BufReader::new(data))
    }
}

/// Parse an NZB document from a reader.
pub fn read<R: BufRead>(input: R) -> Result<Nzb, NzbError> {
    let mut reader = Reader::from_reader(input);
    reader.config_mut().trim_text(true);

    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut buf = Vec::with_capacity(4096);
    let mut text = String::new();

    let mut meta = NzbMeta::default();
    let mut meta_key: Option<String> = None;
    let mut files: Vec<NzbFile> = Vec::new();
    let mut file: Option<PendingFile> = None;
    let mut segment: Option<(u32, u64)> = None;
    let mut saw_root = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = e.name().as_ref().to_vec();
                text.clear();
                let tags: Vec<&[u8]> = path.iter().map(Vec::as_slice).collect();
                match (tags.as_slice(), name.as_slice()) {
                    ([], b"nzb") => saw_root = true,
                    ([b"nzb"], b"file") => {
                        let date = attr(e, "date")?.and_then(|v| v.parse().ok()).ok_or(
                            NzbError::InvalidAttribute {
                                element: "file",
                                attribute: "date",
                            },
                        )?;
                        file = Some(PendingFile {
                            poster: attr(e, "poster")?.unwrap_or_default(),
                            date,
                            subject: attr(e, "subject")?.unwrap_or_default(),
                            groups: Vec::new(),
                            segments: Vec::new(),
                        });
                    }
                    ([b"nzb", b"head"], b"meta") => {
                        meta_key = attr(e, "type")?;
                    }
                    ([.., b"file", b"segments"], b"segment") => {
                        let number = attr(e, "number")?.and_then(|v| v.parse().ok()).ok_or(
                            NzbError::InvalidAttribute {
                                element: "segment",
                                attribute: "number",
                            },
                        )?;
                        let bytes = attr(e, "bytes")?.and_then(|v| v.parse().ok()).ok_or(
                            NzbError::InvalidAttribute {
                                element: "segment",
                                attribute: "bytes",
                            },
                        )?;
                        segment = Some((number, bytes));
                    }
                    _ => {}
                }
                path.push(name);
            }
            Ok(Event::End(ref e)) => {
                let name = e.name().as_ref().to_vec();
                path.pop();
                match name.as_slice() {
                    b"meta" => {
                        let value = std::mem::take(&mut text);
                        match meta_key.take().as_deref() {
                            Some("title") => meta.title = Some(value),
                            Some("password") => meta.password = Some(value),
                            Some("category") => meta.category = Some(value),
                            Some("tag") => meta.tags.push(value),
                            Some(other) => meta.extra.push((other.to_string(), value)),
                            None => {}
                        }
                    }
                    b"group" => {
                        if let Some(f) = file.as_mut() {
                            f.groups.push(std::mem::take(&mut text));
                        }
                    }
                    b"segment" => {
                        if let Some((number, bytes)) = segment.take() {
                            let message_id = std::mem::take(&mut text);
                            if message_id.is_empty() {
                                return Err(NzbError::SegmentWithoutMessageId);
                            }
                            if let Some(f) = file.as_mut() {
                                f.segments.push(Segment {
                                    number,
                                    bytes,
                                    message_id,
                                });
                            }
                        }
                    }
                    b"file" => {
                        if let Some(pending) = file.take() {
                            files.push(pending.finish()?);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                text.push_str(&e.unescape().map_err(|e| NzbError::Xml(e.to_string()))?);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(NzbError::Xml(e.to_string())),
        }
        buf.clear();
    }

    if !saw_root {
        return Err(NzbError::MissingRoot);
    }
    if files.is_empty() {
        return Err(NzbError::NoFiles);
    }
    Ok(Nzb { meta, files })
}

struct PendingFile {
    poster: String,
    date: i64,
    subject: String,
    groups: Vec<String>,
    segments: Vec<Segment>,
}

impl PendingFile {
    fn finish(mut self) -> Result<NzbFile, NzbError> {
        if self.groups.is_empty() {
            return Err(NzbError::FileWithoutGroups {
                subject: self.subject,
            });
        }
        if self.segments.is_empty() {
            return Err(NzbError::FileWithoutSegments {
                subject: self.subject,
            });
        }
        self.segments.sort_by_key(|s| s.number);
        let filename = extract_filename(&self.subject);
        Ok(NzbFile {
            poster: self.poster,
            date: self.date,
            subject: self.subject,
            filename,
            groups: self.groups,
            segments: self.segments,
        })
    }
}

fn attr(e: &BytesStart, name: &str) -> Result<Option<String>, NzbError> {
    for a in e.attributes().flatten() {
        if a.key.as_ref() == name.as_bytes() {
            return Ok(Some(
                a.unescape_value()
                    .map_err(|e| NzbError::Xml(e.to_string()))?
                    .into_owned(),
            ));
        }
    }
    Ok(None)
}

static FILENAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+\.[A-Za-z0-9]{2,4})""#).expect("valid regex"));

/// Pull the quoted filename out of a usenet subject line. The last quoted
/// candidate wins, matching how posters append counters after the name.
pub fn extract_filename(subject: &str) -> Option<String> {
    FILENAME_RE
        .captures_iter(subject)
        .last()
        .map(|cap| cap[1].to_string())
}
