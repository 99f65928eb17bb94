// SPDX-License-Identifier: GPL-3.0-or-later

/*
 *  src/parser.rs - Parser library for PAT tester result streams.
 *  Copyright (C) 2026  Forest Crossman <cyrozap@gmail.com>
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

/*!
 * # `parser` Module
 *
 * This module reads a result stream: concatenated records, each a six-byte
 * header (payload length, two reserved bytes, 16-bit byte-sum checksum)
 * followed by a payload of tagged sub-records ending with tag `0xFF`.
 *
 * Streams start out using the version 1 tag table. The first visual
 * inspection sub-record tagged `0x11` or `0x12` switches the rest of the
 * stream to version 2, where measurement sub-records carry a repeat count
 * and a pass flag.
 *
 * ## Usage Example
 *
 * ```no_run
 * use std::fs::File;
 * use std::io::BufReader;
 *
 * use patdecode::parser::decode_telemetry;
 *
 * fn main() -> Result<(), Box<dyn std::error::Error>> {
 *     let file = File::open("example.sss")?;
 *     let reader = BufReader::new(file);
 *
 *     for record in decode_telemetry(reader) {
 *         let record = record?;
 *         for sub in &record.sub_records {
 *             println!("{}", sub.label);
 *             for (name, value) in sub.fields.iter() {
 *                 println!("  {}: {}", name, value);
 *             }
 *         }
 *     }
 *
 *     Ok(())
 * }
 * ```
 */

use std::io::prelude::*;

use tracing::{debug, info, trace, warn};

use crate::decoder::read_full;
use crate::error::{Error, Result};
use crate::interpreter::{END_OF_RECORD, FormatVersion, SubRecordKind, VERSION_2_MARKERS, lookup};
use crate::schema::{Field, Fields, RecordSchema};

const RECORD_HEADER: RecordSchema = RecordSchema::new(&[
    Field::unsigned("payload_length", 2),
    Field::unsigned("reserved", 2),
    Field::unsigned("checksum", 2),
]);

/// Width of a record header in bytes.
pub const RECORD_HEADER_LENGTH: usize = RECORD_HEADER.width();

/// The six-byte header in front of every record payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub payload_length: u16,
    /// Zero in every stream seen so far; possibly a protocol version.
    pub reserved: u16,
    pub checksum: u16,
}

impl RecordHeader {
    fn from_fields(fields: &Fields) -> Self {
        let field = |name: &str| fields.unsigned(name).unwrap_or_default() as u16;
        Self {
            payload_length: field("payload_length"),
            reserved: field("reserved"),
            checksum: field("checksum"),
        }
    }
}

/// One decoded sub-record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubRecord {
    pub tag: u8,
    pub kind: SubRecordKind,
    pub label: &'static str,
    /// Repeat count, present on version 2 measurement sub-records.
    pub repeat: Option<u8>,
    pub fields: Fields,
}

/// One record: its header and every sub-record up to and including the end
/// marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRecord {
    pub header: RecordHeader,
    pub sub_records: Vec<SubRecord>,
}

impl DecodedRecord {
    /// Whether the record holds an overall pass or fail verdict.
    pub fn overall_pass(&self) -> Option<bool> {
        self.sub_records.iter().find_map(|s| match s.kind {
            SubRecordKind::OverallPass => Some(true),
            SubRecordKind::OverallFail => Some(false),
            _ => None,
        })
    }
}

/// The 16-bit truncated sum of every payload byte.
pub fn checksum(payload: &[u8]) -> u16 {
    payload
        .iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(u16::from(b)))
}

/// Returns an iterator over the records of a result stream.
pub fn decode_telemetry<R: Read>(reader: R) -> TelemetryReader<R> {
    TelemetryReader::new(reader)
}

/// A single-pass iterator over the records of a result stream.
///
/// The active [FormatVersion] only ever moves from version 1 to version 2.
/// After the first error the iterator is exhausted.
#[derive(Debug)]
pub struct TelemetryReader<R> {
    reader: R,
    version: FormatVersion,
    offset: u64,
    index: usize,
    done: bool,
}

impl<R: Read> TelemetryReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_version(reader, FormatVersion::V1)
    }

    /// Starts decoding with `version` already active.
    pub fn with_version(reader: R, version: FormatVersion) -> Self {
        Self {
            reader,
            version,
            offset: 0,
            index: 0,
            done: false,
        }
    }

    pub fn version(&self) -> FormatVersion {
        self.version
    }

    fn upgrade(&mut self, tag: u8, offset: u64) {
        if self.version == FormatVersion::V1 {
            info!(record = self.index, offset, tag, "switching to version 2 tag table");
            self.version = FormatVersion::V2;
        }
    }

    fn read_record(&mut self) -> Result<Option<DecodedRecord>> {
        let header_offset = self.offset;
        let mut buffer = [0u8; RECORD_HEADER_LENGTH];
        let n = read_full(&mut self.reader, &mut buffer)?;
        if n == 0 {
            debug!(records = self.index, offset = self.offset, "end of stream");
            return Ok(None);
        }
        if n < buffer.len() {
            return Err(Error::TruncatedHeader {
                record: self.index,
                offset: header_offset,
                expected: RECORD_HEADER_LENGTH,
                available: n,
            });
        }
        self.offset += RECORD_HEADER_LENGTH as u64;

        let header = RecordHeader::from_fields(&RECORD_HEADER.decode(&buffer)?);
        if header.payload_length == 0 {
            return Err(Error::EmptyPayload {
                record: self.index,
                offset: header_offset,
            });
        }
        if header.reserved != 0 {
            warn!(
                record = self.index,
                offset = header_offset,
                reserved = header.reserved,
                "record header reserved bytes are not zero"
            );
        }

        let payload_offset = self.offset;
        let expected = usize::from(header.payload_length);
        let mut payload = vec![0u8; expected];
        let n = read_full(&mut self.reader, &mut payload)?;
        if n < expected {
            return Err(Error::TruncatedPayload {
                record: self.index,
                offset: payload_offset,
                expected,
                available: n,
            });
        }
        self.offset += expected as u64;

        let computed = checksum(&payload);
        if computed != header.checksum {
            return Err(Error::ChecksumMismatch {
                record: self.index,
                offset: header_offset,
                expected: header.checksum,
                computed,
            });
        }

        debug!(
            record = self.index,
            offset = header_offset,
            payload_length = header.payload_length,
            "read record"
        );

        let sub_records = self.dispatch(&payload, payload_offset)?;
        self.index += 1;

        Ok(Some(DecodedRecord {
            header,
            sub_records,
        }))
    }

    fn dispatch(&mut self, payload: &[u8], payload_offset: u64) -> Result<Vec<SubRecord>> {
        let mut sub_records = Vec::new();
        let mut pos = 0;

        while let Some(&tag) = payload.get(pos) {
            let offset = payload_offset + pos as u64;
            if VERSION_2_MARKERS.contains(&tag) {
                self.upgrade(tag, offset);
            }

            let def = lookup(self.version, tag).ok_or(Error::UnknownTag {
                record: self.index,
                offset,
                tag,
            })?;

            let body = &payload[pos + 1..];
            if body.len() < def.width() {
                return Err(Error::TruncatedSubRecord {
                    record: self.index,
                    offset,
                    tag,
                    expected: def.width(),
                    available: body.len(),
                });
            }

            let (repeat, fields) = def
                .decode(&body[..def.width()])
                .map_err(|e| e.rebase(self.index, offset))?;
            trace!(record = self.index, offset, tag, label = def.label, "sub-record");
            sub_records.push(SubRecord {
                tag,
                kind: def.kind,
                label: def.label,
                repeat,
                fields,
            });
            pos += 1 + def.width();

            if tag == END_OF_RECORD {
                break;
            }
        }

        Ok(sub_records)
    }
}

impl<R: Read> Iterator for TelemetryReader<R> {
    type Item = Result<DecodedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = self.read_record().transpose();
        if !matches!(result, Some(Ok(_))) {
            self.done = true;
        }
        result
    }
}
