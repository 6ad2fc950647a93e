//! Delimiter framing with JSON serialisation for [Record]s.
//!
//! A record on the wire is its JSON object followed by a single `|`. JSON never needs a raw
//! `|` outside of string literals, so the encoder rewrites any `|` inside strings as the
//! escape `\u007c`. That keeps the delimiter unique without changing the decoded value.

use crate::protocol::Record;

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use std::io;

/// Terminates every record on the wire.
pub const DELIMITER: u8 = b'|';

/// Upper bound on a single buffered record, delimiter excluded.
pub const MAX_RECORD_LENGTH: usize = 64 * 1024;

const ESCAPED_DELIMITER: &[u8] = b"\\u007c";

/// Buffers partial records across reads and yields each complete one exactly once.
///
/// Complete frames that fail to parse are skipped with a warning, so one bad record
/// does not tear down the connection carrying it.
#[derive(Debug, Clone)]
pub struct RecordCodec {
    /// How far into the buffer we already searched for a delimiter.
    next_index: usize,
    max_length: usize,
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordCodec {
    pub fn new() -> Self {
        RecordCodec { next_index: 0, max_length: MAX_RECORD_LENGTH }
    }

    pub fn with_max_length(max_length: usize) -> Self {
        RecordCodec { next_index: 0, max_length }
    }
}

impl Decoder for RecordCodec {
    type Item = Record;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Record>, io::Error> {
        loop {
            let offset = match src[self.next_index..].iter().position(|b| *b == DELIMITER) {
                Some(offset) => offset,
                None => {
                    if src.len() > self.max_length {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            format!("record exceeds {} bytes without a delimiter", self.max_length),
                        ));
                    }
                    self.next_index = src.len();
                    return Ok(None);
                }
            };
            let frame = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            let body = &frame[..frame.len() - 1];
            if body.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<Record>(body) {
                Ok(record) => return Ok(Some(record)),
                Err(err) => {
                    warn!("dropping malformed record ({}): {}", err, String::from_utf8_lossy(body));
                    continue;
                }
            }
        }
    }
}

impl Encoder<Record> for RecordCodec {
    type Error = io::Error;

    fn encode(&mut self, record: Record, dst: &mut BytesMut) -> Result<(), io::Error> {
        let bytes = encode(&record)?;
        dst.reserve(bytes.len());
        dst.put_slice(&bytes);
        Ok(())
    }
}

/// Serialises a record into its delimited wire form.
pub fn encode(record: &Record) -> io::Result<Vec<u8>> {
    let json =
        serde_json::to_vec(record).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let mut out = Vec::with_capacity(json.len() + 1);
    for b in json {
        if b == DELIMITER {
            out.extend_from_slice(ESCAPED_DELIMITER);
        } else {
            out.push(b);
        }
    }
    out.push(DELIMITER);
    Ok(out)
}

/// Drains every complete record currently held in `buf`, leaving any trailing partial
/// record in place for the next read.
pub fn decode_all(codec: &mut RecordCodec, buf: &mut BytesMut) -> io::Result<Vec<Record>> {
    let mut records = vec![];
    while let Some(record) = codec.decode(buf)? {
        records.push(record);
    }
    Ok(records)
}
