//! yEnc encoding: the inverse of [`crate::decode`], producing article lines
//! ready to hand to a posting session.

use crc32fast::Hasher;

const CRITICAL: [u8; 4] = [0x00, 0x0a, 0x0d, 0x3d];

/// Line-wrapping yEnc encoder.
#[derive(Debug, Clone)]
pub struct Encoder {
    line_length: usize,
}

impl Encoder {
    pub fn new() -> Self {
        Self { line_length: 128 }
    }

    pub fn with_line_length(mut self, line_length: usize) -> Self {
        self.line_length = line_length.max(1);
        self
    }

    /// Encode a whole file as one single-part article body.
    pub fn encode_single(&self, filename: &str, data: &[u8]) -> Vec<Vec<u8>> {
        let crc = crc32fast::hash(data);
        let mut lines = Vec::new();
        lines.push(
            format!(
                "=ybegin line={} size={} name={filename}",
                self.line_length,
                data.len()
            )
            .into_bytes(),
        );
        lines.extend(self.encode_body(data));
        lines.push(format!("=yend size={} crc32={crc:08x}", data.len()).into_bytes());
        lines
    }

    /// Encode one part of a multi-part file. `begin` is the 1-based offset
    /// of the part's first byte within the file.
    pub fn encode_part(
        &self,
        filename: &str,
        file_size: u64,
        part_number: u32,
        begin: u64,
        data: &[u8],
    ) -> Vec<Vec<u8>> {
        let mut hasher = Hasher::new();
        hasher.update(data);
        let crc = hasher.finalize();
        let end = begin + data.len() as u64 - 1;

        let mut lines = Vec::new();
        lines.push(
            format!(
                "=ybegin part={part_number} line={} size={file_size} name={filename}",
                self.line_length
            )
            .into_bytes(),
        );
        lines.push(format!("=ypart begin={begin} end={end}").into_bytes());
        lines.extend(self.encode_body(data));
        lines.push(
            format!(
                "=yend size={} part={part_number} pcrc32={crc:08x}",
                data.len()
            )
            .into_bytes(),
        );
        lines
    }

    fn encode_body(&self, data: &[u8]) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        let mut line: Vec<u8> = Vec::with_capacity(self.line_length + 2);
        for &byte in data {
            let out = byte.wrapping_add(42);
            // dot, tab and space are only troublesome at line start
            let escape = CRITICAL.contains(&out)
                || (line.is_empty() && matches!(out, b'.' | b'\t' | b' '));
            if escape {
                line.push(b'=');
                line.push(out.wrapping_add(64));
            } else {
                line.push(out);
            }
            if line.len() >= self.line_length {
                lines.push(std::mem::take(&mut line));
            }
        }
        if !line.is_empty() {
            lines.push(line);
        }
        lines
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}
