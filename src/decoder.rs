// SPDX-License-Identifier: GPL-3.0-or-later

/*
 *  src/decoder.rs - Decoder library for PAT tester archive containers.
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
 * # `decoder` Module
 *
 * This module unpacks archive containers: a four-byte magic/version word
 * followed by length-prefixed member records. Each member payload starts with
 * a plaintext sub-header, and the rest is masked with a [Keystream] seeded
 * from that sub-header and then zlib-compressed.
 *
 * ## Usage Example
 *
 * ```no_run
 * use std::fs::File;
 * use std::io::BufReader;
 *
 * use patdecode::decoder::decode_container;
 *
 * fn main() -> Result<(), Box<dyn std::error::Error>> {
 *     let file = File::open("example.gar")?;
 *     let reader = BufReader::new(file);
 *
 *     for member in decode_container(reader)? {
 *         let member = member?;
 *         println!("{}: {} bytes", member.name_lossy(), member.content.len());
 *     }
 *
 *     Ok(())
 * }
 * ```
 */

use std::io::ErrorKind;
use std::io::prelude::*;

use flate2::read::ZlibDecoder;
use tracing::debug;

use crate::crypto::Keystream;
use crate::crypto::Op;
use crate::error::{Error, Result};

pub const CONTAINER_MAGIC: u32 = 0xCABCAB;
pub const CONTAINER_VERSION: u8 = 1;
pub const SUB_HEADER_LENGTH: u16 = 12;
/// Keystream masking over a zlib stream; the only method seen in the wild.
pub const METHOD_XORSHIFT_ZLIB: u16 = 1;

// Declared lengths are untrusted; larger members grow the buffer as they go.
const MAX_PREALLOCATION: u32 = 1 << 20;

/// The plaintext header at the start of every member payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadSubHeader {
    pub header_length: u16,
    pub method: u16,
    /// Truncated creation time. Seeds keystream word `x`.
    pub timestamp: u32,
    /// Length of the member after decompression. Seeds keystream word `y`.
    pub original_length: u32,
}

impl PayloadSubHeader {
    fn from_bytes(bytes: &[u8; 12]) -> Self {
        Self {
            header_length: u16::from_be_bytes([bytes[0], bytes[1]]),
            method: u16::from_be_bytes([bytes[2], bytes[3]]),
            timestamp: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            original_length: u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
        }
    }
}

/// A member file recovered from a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMember {
    /// The member name, verbatim. It may contain path separators or spaces.
    pub name: Vec<u8>,
    /// The unmasked, decompressed member bytes.
    pub content: Vec<u8>,
}

impl DecodedMember {
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).to_string()
    }
}

/// A member record as stored, before unmasking and decompression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMember {
    /// Zero-based position of the record in the container.
    pub index: usize,
    /// Absolute offset of the payload's first byte.
    pub payload_offset: u64,
    pub name: Vec<u8>,
    pub payload: Vec<u8>,
}

impl RawMember {
    /// Parses the payload sub-header without touching the masked bytes.
    pub fn sub_header(&self) -> Result<PayloadSubHeader> {
        let bytes: &[u8; 12] = self
            .payload
            .get(..12)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| Error::MalformedHeader {
                offset: self.payload_offset,
                detail: format!(
                    "member {} payload is {} bytes, shorter than its sub-header",
                    self.index,
                    self.payload.len()
                ),
            })?;
        let header = PayloadSubHeader::from_bytes(bytes);

        if header.header_length != SUB_HEADER_LENGTH {
            return Err(Error::MalformedHeader {
                offset: self.payload_offset,
                detail: format!(
                    "member {} sub-header length {}, expected {}",
                    self.index, header.header_length, SUB_HEADER_LENGTH
                ),
            });
        }
        if header.method != METHOD_XORSHIFT_ZLIB {
            return Err(Error::MalformedHeader {
                offset: self.payload_offset + 2,
                detail: format!(
                    "member {} uses method {}, expected {}",
                    self.index, header.method, METHOD_XORSHIFT_ZLIB
                ),
            });
        }

        Ok(header)
    }

    /// Unmasks and decompresses the payload.
    pub fn decode(self) -> Result<DecodedMember> {
        let header = self.sub_header()?;
        let masked = &self.payload[12..];
        let check_offset = self.payload_offset + 12;

        if masked.len() < 4 {
            return Err(Error::TruncatedRecord {
                record: self.index,
                offset: check_offset,
                expected: 4,
                actual: masked.len() as u64,
            });
        }

        // One keystream runs across the length check and the compressed data.
        let mut keystream = Keystream::new(header.timestamp, header.original_length);
        let mut length_bytes = [masked[0], masked[1], masked[2], masked[3]];
        keystream.apply(&mut length_bytes, Op::Subtract);
        let expected_length = u32::from_be_bytes(length_bytes);

        if expected_length != header.original_length {
            return Err(Error::LengthMismatch {
                record: self.index,
                offset: check_offset,
                expected: header.original_length.into(),
                actual: expected_length.into(),
            });
        }

        let compressed = keystream.unmask(&masked[4..]);
        let content = decompress(expected_length, &compressed).map_err(|source| {
            Error::DecompressionError {
                record: self.index,
                offset: check_offset + 4,
                source,
            }
        })?;

        if content.len() as u64 != u64::from(expected_length) {
            return Err(Error::LengthMismatch {
                record: self.index,
                offset: check_offset + 4,
                expected: expected_length.into(),
                actual: content.len() as u64,
            });
        }

        debug!(
            record = self.index,
            name = %String::from_utf8_lossy(&self.name),
            compressed = compressed.len(),
            length = content.len(),
            "decoded member"
        );

        Ok(DecodedMember {
            name: self.name,
            content,
        })
    }
}

// Reads one byte past the expected length so oversized output is detectable
// without inflating all of it.
fn decompress(capacity: u32, data: &[u8]) -> std::io::Result<Vec<u8>> {
    let decoder = ZlibDecoder::new(data);
    let mut buffer = Vec::with_capacity(capacity.min(MAX_PREALLOCATION) as usize);
    decoder
        .take(u64::from(capacity) + 1)
        .read_to_end(&mut buffer)?;
    Ok(buffer)
}

// Like read_exact, but reports how many bytes arrived before end-of-input.
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Reads the container header and returns an iterator over its members.
pub fn decode_container<R: Read>(reader: R) -> Result<ContainerReader<R>> {
    ContainerReader::new(reader)
}

/// A single-pass iterator over the members of a container.
///
/// After the first error the iterator is exhausted.
#[derive(Debug)]
pub struct ContainerReader<R> {
    reader: R,
    offset: u64,
    index: usize,
    done: bool,
}

impl<R: Read> ContainerReader<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        let mut header = [0u8; 4];
        let n = read_full(&mut reader, &mut header)?;
        if n < header.len() {
            return Err(Error::MalformedHeader {
                offset: 0,
                detail: format!("container header is {} bytes, expected 4", n),
            });
        }

        let word = u32::from_be_bytes(header);
        let magic = word >> 8;
        let version = (word & 0xff) as u8;
        if magic != CONTAINER_MAGIC {
            return Err(Error::MalformedHeader {
                offset: 0,
                detail: format!("bad magic {:#08x}, expected {:#08x}", magic, CONTAINER_MAGIC),
            });
        }
        if version != CONTAINER_VERSION {
            return Err(Error::MalformedHeader {
                offset: 3,
                detail: format!(
                    "unsupported version {}, expected {}",
                    version, CONTAINER_VERSION
                ),
            });
        }

        Ok(Self {
            reader,
            offset: 4,
            index: 0,
            done: false,
        })
    }

    /// Reads the next member record without decoding its payload.
    ///
    /// Returns `None` once fewer than four bytes remain where the next name
    /// length would be; there is no end marker.
    pub fn next_raw(&mut self) -> Option<Result<RawMember>> {
        if self.done {
            return None;
        }
        let result = self.read_raw().transpose();
        if !matches!(result, Some(Ok(_))) {
            self.done = true;
        }
        result
    }

    fn read_raw(&mut self) -> Result<Option<RawMember>> {
        let mut length = [0u8; 4];
        let n = read_full(&mut self.reader, &mut length)?;
        if n < length.len() {
            debug!(records = self.index, offset = self.offset, "end of container");
            return Ok(None);
        }
        self.offset += 4;

        let name_length = u32::from_be_bytes(length);
        let name = self.read_field(name_length.into())?;

        let mut length = [0u8; 4];
        let n = read_full(&mut self.reader, &mut length)?;
        if n < length.len() {
            return Err(self.truncated(4, n));
        }
        self.offset += 4;

        let payload_length = u32::from_be_bytes(length);
        let payload_offset = self.offset;
        let payload = self.read_field(payload_length.into())?;

        let index = self.index;
        self.index += 1;

        debug!(
            record = index,
            name_length,
            payload_length,
            payload_offset,
            "read container record"
        );

        Ok(Some(RawMember {
            index,
            payload_offset,
            name,
            payload,
        }))
    }

    fn read_field(&mut self, length: u64) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let n = (&mut self.reader).take(length).read_to_end(&mut buffer)?;
        if (n as u64) < length {
            return Err(self.truncated(length, n));
        }
        self.offset += length;
        Ok(buffer)
    }

    fn truncated(&self, expected: u64, actual: usize) -> Error {
        Error::TruncatedRecord {
            record: self.index,
            offset: self.offset,
            expected,
            actual: actual as u64,
        }
    }
}

impl<R: Read> Iterator for ContainerReader<R> {
    type Item = Result<DecodedMember>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = match self.next_raw()? {
            Ok(raw) => raw,
            Err(e) => return Some(Err(e)),
        };
        let result = raw.decode();
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}
