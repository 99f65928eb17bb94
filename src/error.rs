// SPDX-License-Identifier: GPL-3.0-or-later

/*
 *  src/error.rs - Error types for PAT archive and result stream decoding.
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

use std::io;

use thiserror::Error;

/// Errors produced while decoding an archive container or a result stream.
///
/// Record indices are zero-based. Offsets are absolute byte positions in the
/// stream being decoded.
#[derive(Error, Debug)]
pub enum Error {
    /// The container magic, version, or a member's payload sub-header is
    /// invalid.
    #[error("malformed header at byte {offset}: {detail}")]
    MalformedHeader { offset: u64, detail: String },

    /// A declared length disagrees with the length actually recovered.
    #[error("length mismatch in member {record} at byte {offset}: expected {expected}, got {actual}")]
    LengthMismatch {
        record: usize,
        offset: u64,
        expected: u64,
        actual: u64,
    },

    /// The unmasked member payload is not a valid compressed stream.
    #[error("decompression failed for member {record} at byte {offset}: {source}")]
    DecompressionError {
        record: usize,
        offset: u64,
        #[source]
        source: io::Error,
    },

    /// The stream ended part way through a container record.
    #[error("truncated container record {record} at byte {offset}: wanted {expected} bytes, got {actual}")]
    TruncatedRecord {
        record: usize,
        offset: u64,
        expected: u64,
        actual: u64,
    },

    /// The stream ended part way through a result record header.
    #[error("truncated header for record {record} at byte {offset}: {available} of {expected} bytes")]
    TruncatedHeader {
        record: usize,
        offset: u64,
        expected: usize,
        available: usize,
    },

    /// A result record declared a zero-length payload.
    #[error("record {record} at byte {offset} has an empty payload")]
    EmptyPayload { record: usize, offset: u64 },

    /// The stream ended part way through a result record payload.
    #[error("truncated payload for record {record} at byte {offset}: {available} of {expected} bytes")]
    TruncatedPayload {
        record: usize,
        offset: u64,
        expected: usize,
        available: usize,
    },

    /// The payload byte sum disagrees with the header checksum.
    #[error("checksum mismatch in record {record} at byte {offset}: header {expected:#06x}, computed {computed:#06x}")]
    ChecksumMismatch {
        record: usize,
        offset: u64,
        expected: u16,
        computed: u16,
    },

    /// A sub-record type tag is not known to the active tag table.
    #[error("unknown sub-record tag {tag:#04x} in record {record} at byte {offset}")]
    UnknownTag { record: usize, offset: u64, tag: u8 },

    /// Fewer payload bytes remain than the sub-record layout requires.
    #[error("truncated sub-record {tag:#04x} in record {record} at byte {offset}: {available} of {expected} bytes")]
    TruncatedSubRecord {
        record: usize,
        offset: u64,
        tag: u8,
        expected: usize,
        available: usize,
    },

    /// A coded field holds a value outside its enumeration.
    #[error("unknown value {value} for field {field} in record {record} at byte {offset}")]
    UnknownEnumValue {
        record: usize,
        offset: u64,
        field: &'static str,
        value: u32,
    },

    /// A buffer is smaller than the schema that should decode it.
    #[error("buffer too short: need {expected} bytes, got {actual}")]
    ShortBuffer { expected: usize, actual: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The absolute byte offset of the failure, where one is known.
    pub fn offset(&self) -> Option<u64> {
        match self {
            Error::MalformedHeader { offset, .. }
            | Error::LengthMismatch { offset, .. }
            | Error::DecompressionError { offset, .. }
            | Error::TruncatedRecord { offset, .. }
            | Error::TruncatedHeader { offset, .. }
            | Error::EmptyPayload { offset, .. }
            | Error::TruncatedPayload { offset, .. }
            | Error::ChecksumMismatch { offset, .. }
            | Error::UnknownTag { offset, .. }
            | Error::TruncatedSubRecord { offset, .. }
            | Error::UnknownEnumValue { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    /// Places an error raised while decoding one sub-record into its stream.
    ///
    /// Errors from [crate::interpreter::SubRecordDef::decode] carry offsets
    /// relative to the start of the sub-record.
    pub(crate) fn rebase(self, record: usize, base: u64) -> Self {
        match self {
            Error::UnknownEnumValue {
                offset,
                field,
                value,
                ..
            } => Error::UnknownEnumValue {
                record,
                offset: base + offset,
                field,
                value,
            },
            other => other,
        }
    }

    /// A distinct non-zero process exit code for each kind of error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::MalformedHeader { .. } => 10,
            Error::LengthMismatch { .. } => 11,
            Error::DecompressionError { .. } => 12,
            Error::TruncatedRecord { .. } => 13,
            Error::TruncatedHeader { .. } => 20,
            Error::EmptyPayload { .. } => 21,
            Error::TruncatedPayload { .. } => 22,
            Error::ChecksumMismatch { .. } => 23,
            Error::UnknownTag { .. } => 24,
            Error::TruncatedSubRecord { .. } => 25,
            Error::UnknownEnumValue { .. } => 26,
            Error::ShortBuffer { .. } => 27,
            Error::Io(_) => 74,
            Error::Csv(_) => 75,
        }
    }
}
