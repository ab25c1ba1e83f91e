//! yEnc decoding over materialized article lines.
//!
//! The transform is byte-wise: every encoded byte is the original plus 42
//! (mod 256), and bytes that would collide with NUL/CR/LF/`=` are escaped
//! as `=` followed by the byte plus a further 64. Headers are
//! space-separated `key=value` lines opened by `=ybegin`, `=ypart` and
//! `=yend` keywords.

use std::collections::HashMap;

use crc32fast::Hasher;

use crate::error::{CrcScope, YencError};
use crate::model::DecodedPart;

/// Unescape one body line into `out`. Returns the number of bytes added.
///
/// An escape marker with nothing after it means the line was cut short;
/// decoding it lossily would corrupt the part, so it is an error.
pub fn unescape_line(line: &[u8], out: &mut Vec<u8>) -> Result<usize, YencError> {
    let start = out.len();
    let mut i = 0;
    while i < line.len() {
        match line[i] {
            b'\r' | b'\n' => {}
            b'=' => {
                i += 1;
                match line.get(i) {
                    Some(b'\r') | Some(b'\n') | None => return Err(YencError::TruncatedInput),
                    Some(&next) => out.push(next.wrapping_sub(64).wrapping_sub(42)),
                }
            }
            b => out.push(b.wrapping_sub(42)),
        }
        i += 1;
    }
    Ok(out.len() - start)
}

/// Decode a complete single-part yEnc article body.
///
/// `lines` are the article lines as the transport delivered them (framing
/// dots already removed, CR/LF already stripped). Non-yEnc preamble before
/// `=ybegin` is skipped; the part CRC from the `=yend` trailer is verified
/// when present.
pub fn decode_part(lines: &[Vec<u8>]) -> Result<DecodedPart, YencError> {
    let mut iter = lines.iter();

    let begin_line = iter
        .by_ref()
        .find(|l| l.starts_with(b"=ybegin "))
        .ok_or(YencError::MissingKeyword { keyword: "=ybegin" })?;
    let begin_fields = parse_fields(begin_line)?;
    let filename = begin_fields
        .get("name")
        .ok_or(YencError::MissingField { field: "name" })?
        .clone();
    let file_size = field_u64(&begin_fields, "size")?
        .ok_or(YencError::MissingField { field: "size" })?;
    let part_number = field_u32(&begin_fields, "part")?;

    // multi-part articles carry an =ypart line with the byte range
    let mut part_begin = 1u64;
    let mut part_end = file_size;
    if part_number.is_some() {
        let part_line = iter
            .next()
            .filter(|l| l.starts_with(b"=ypart "))
            .ok_or(YencError::MissingKeyword { keyword: "=ypart" })?;
        let part_fields = parse_fields(part_line)?;
        part_begin = field_u64(&part_fields, "begin")?
            .ok_or(YencError::MissingField { field: "begin" })?;
        part_end =
            field_u64(&part_fields, "end")?.ok_or(YencError::MissingField { field: "end" })?;
        if part_end < part_begin {
            return Err(YencError::InvalidField {
                field: "end",
                value: part_end.to_string(),
            });
        }
    }
    // an empty single-part article has begin=1, end=0
    let expected_len = if part_end >= part_begin {
        part_end - part_begin + 1
    } else {
        0
    };

    let mut data = Vec::with_capacity(expected_len as usize);
    let mut hasher = Hasher::new();
    let mut trailer = None;
    for line in iter {
        if line.starts_with(b"=yend ") {
            trailer = Some(parse_fields(line)?);
            break;
        }
        let before = data.len();
        unescape_line(line, &mut data)?;
        hasher.update(&data[before..]);
        if data.len() as u64 > expected_len {
            return Err(YencError::SizeOverflow {
                limit: expected_len,
            });
        }
    }
    let trailer = trailer.ok_or(YencError::TruncatedInput)?;

    if let Some(declared) = field_u64(&trailer, "size")?
        && declared != data.len() as u64
    {
        return Err(YencError::SizeMismatch {
            declared,
            actual: data.len() as u64,
        });
    }

    let crc32 = hasher.finalize();
    let expected_crc = match field_hex_u32(&trailer, "pcrc32")? {
        Some(crc) => Some(crc),
        // single-part trailers carry the whole-file crc32 instead
        None => field_hex_u32(&trailer, "crc32")?,
    };
    if let Some(expected) = expected_crc
        && expected != crc32
    {
        return Err(YencError::CrcMismatch {
            scope: if part_number.is_some() {
                CrcScope::Part
            } else {
                CrcScope::File
            },
            expected,
            actual: crc32,
        });
    }

    Ok(DecodedPart {
        filename,
        file_size,
        part_number,
        begin: part_begin,
        end: part_end,
        data,
        crc32,
    })
}

fn parse_fields(line: &[u8]) -> Result<HashMap<String, String>, YencError> {
    let text = std::str::from_utf8(line).map_err(|_| YencError::InvalidField {
        field: "header",
        value: String::from("<non-utf8>"),
    })?;
    let mut fields = HashMap::new();
    // `name` comes last and may contain spaces; everything else is simple
    let (head, name) = match text.split_once(" name=") {
        Some((head, name)) => (head, Some(name)),
        None => (text, None),
    };
    for token in head.split_whitespace().skip(1) {
        if let Some((key, value)) = token.split_once('=') {
            fields.insert(key.to_string(), value.to_string());
        }
    }
    if let Some(name) = name {
        fields.insert("name".to_string(), name.trim().to_string());
    }
    Ok(fields)
}

fn field_u64(fields: &HashMap<String, String>, field: &'static str) -> Result<Option<u64>, YencError> {
    fields
        .get(field)
        .map(|value| {
            value.parse().map_err(|_| YencError::InvalidField {
                field,
                value: value.clone(),
            })
        })
        .transpose()
}

fn field_u32(fields: &HashMap<String, String>, field: &'static str) -> Result<Option<u32>, YencError> {
    fields
        .get(field)
        .map(|value| {
            value.parse().map_err(|_| YencError::InvalidField {
                field,
                value: value.clone(),
            })
        })
        .transpose()
}

fn field_hex_u32(
    fields: &HashMap<String, String>,
    field: &'static str,
) -> Result<Option<u32>, YencError> {
    fields
        .get(field)
        .map(|value| {
            let value = value.trim();
            u32::from_str_radix(value, 16).map_err(|_| YencError::InvalidField {
                field,
                value: value.to_string(),
            })
        })
        .transpose()
}
