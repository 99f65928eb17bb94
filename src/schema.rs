// SPDX-License-Identifier: GPL-3.0-or-later

/*
 *  src/schema.rs - Fixed-layout binary record schemas.
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
 * # `schema` Module
 *
 * A [RecordSchema] is an ordered list of big-endian fields with a fixed total
 * width. Decoding a buffer with it yields [Fields], an ordered mapping from
 * field name to [FieldValue].
 */

use std::fmt;

use rust_decimal::Decimal;

use crate::error::{Error, Result};

/// The raw encoding of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Fixed-length, zero-padded text.
    Text,
    /// Big-endian unsigned integer of 1, 2, or 4 bytes.
    Unsigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    pub width: usize,
}

impl Field {
    pub const fn text(name: &'static str, width: usize) -> Self {
        Self {
            name,
            kind: FieldKind::Text,
            width,
        }
    }

    pub const fn unsigned(name: &'static str, width: usize) -> Self {
        assert!(
            width == 1 || width == 2 || width == 4,
            "unsigned fields are 1, 2, or 4 bytes wide"
        );
        Self {
            name,
            kind: FieldKind::Unsigned,
            width,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSchema {
    fields: &'static [Field],
    width: usize,
}

impl RecordSchema {
    pub const fn new(fields: &'static [Field]) -> Self {
        let mut width = 0;
        let mut i = 0;
        while i < fields.len() {
            width += fields[i].width;
            i += 1;
        }
        Self { fields, width }
    }

    pub const fn fields(&self) -> &'static [Field] {
        self.fields
    }

    /// Total width in bytes of every field.
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Decodes the first [RecordSchema::width] bytes of `buf`.
    pub fn decode(&self, buf: &[u8]) -> Result<Fields> {
        if buf.len() < self.width {
            return Err(Error::ShortBuffer {
                expected: self.width,
                actual: buf.len(),
            });
        }

        let mut fields = Fields::default();
        let mut pos = 0;
        for field in self.fields {
            let bytes = &buf[pos..pos + field.width];
            let value = match field.kind {
                FieldKind::Text => FieldValue::Text(decode_text(bytes)),
                FieldKind::Unsigned => FieldValue::Unsigned(decode_unsigned(bytes)),
            };
            fields.insert(field.name, value);
            pos += field.width;
        }

        Ok(fields)
    }
}

// Zero bytes are dropped wherever they appear, then trailing whitespace.
fn decode_text(bytes: &[u8]) -> String {
    let kept: Vec<u8> = bytes.iter().copied().filter(|&b| b != 0).collect();
    String::from_utf8_lossy(&kept).trim_end().to_string()
}

fn decode_unsigned(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Unsigned(u32),
    Bool(bool),
    /// A rescaled measurement.
    Real(Decimal),
    /// A label looked up from a coded field.
    Label(&'static str),
    /// The device recorded no result, e.g. an open circuit.
    NoResult,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{:?}", s),
            FieldValue::Unsigned(v) => write!(f, "{}", v),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Real(d) => write!(f, "{}", d),
            FieldValue::Label(l) => write!(f, "{}", l),
            FieldValue::NoResult => f.write_str("(no result)"),
        }
    }
}

/// Decoded fields in schema order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(Vec<(&'static str, FieldValue)>);

impl Fields {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    /// Replaces the value of an existing field, or appends a new one.
    pub fn insert(&mut self, name: &'static str, value: FieldValue) {
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn unsigned(&self, name: &str) -> Option<u32> {
        match self.get(name) {
            Some(FieldValue::Unsigned(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(FieldValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn real(&self, name: &str) -> Option<Decimal> {
        match self.get(name) {
            Some(FieldValue::Real(d)) => Some(*d),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        self.0.iter().map(|(n, v)| (*n, v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
