// SPDX-License-Identifier: GPL-3.0-or-later

/*
 *  src/export.rs - CSV export of decoded result records.
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

use std::io::Write;

use crate::error::Result;
use crate::parser::DecodedRecord;
use crate::schema::FieldValue;

pub const CSV_HEADINGS: [&str; 6] = ["record", "tag", "test", "repeat", "field", "value"];

/// Writes one CSV row per decoded field.
///
/// Sub-records without fields, such as the overall verdict, get a single row
/// with empty field and value columns.
pub fn write_csv<'a, W, I>(writer: W, records: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a DecodedRecord>,
{
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(CSV_HEADINGS)?;

    for (index, record) in records.into_iter().enumerate() {
        let index = index.to_string();
        for sub in &record.sub_records {
            let tag = format!("{:02X}", sub.tag);
            let repeat = sub.repeat.map(|r| r.to_string()).unwrap_or_default();

            if sub.fields.is_empty() {
                csv_writer.write_record([
                    index.as_str(),
                    tag.as_str(),
                    sub.label,
                    repeat.as_str(),
                    "",
                    "",
                ])?;
                continue;
            }

            for (name, value) in sub.fields.iter() {
                let value = match value {
                    FieldValue::Text(s) => s.clone(),
                    other => other.to_string(),
                };
                csv_writer.write_record([
                    index.as_str(),
                    tag.as_str(),
                    sub.label,
                    repeat.as_str(),
                    name,
                    value.as_str(),
                ])?;
            }
        }
    }

    csv_writer.flush()?;
    Ok(())
}
