// SPDX-License-Identifier: GPL-3.0-or-later

/*
 *  src/lib.rs - Decoder and parser library for PAT tester files.
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
 * # `patdecode` Crate
 *
 * A library for decoding the files written by Seaward portable appliance
 * test (PAT) equipment.
 *
 * Two formats are handled:
 *
 * 1. [decoder]: Unpacks archive containers (magic `0xCABCAB`), unmasking and
 *    decompressing each member file.
 * 2. [parser]: Reads result streams, verifying each record's checksum and
 *    dispatching its tagged sub-records.
 *
 * [interpreter] describes every sub-record layout and turns raw integers into
 * measurements; [schema] is the fixed-layout field decoder underneath it.
 *
 * ## Usage Example
 *
 * ```no_run
 * use std::fs::File;
 * use std::io::BufReader;
 *
 * use patdecode::{decode_container, decode_telemetry};
 *
 * fn main() -> Result<(), Box<dyn std::error::Error>> {
 *     let file = File::open("example.gar")?;
 *     let reader = BufReader::new(file);
 *
 *     for member in decode_container(reader)? {
 *         let member = member?;
 *         if !member.name_lossy().ends_with(".sss") {
 *             continue;
 *         }
 *
 *         for record in decode_telemetry(member.content.as_slice()) {
 *             let record = record?;
 *             println!("{:?}: {:?}", record.header, record.overall_pass());
 *         }
 *     }
 *
 *     Ok(())
 * }
 * ```
 */

pub mod crypto;
pub mod decoder;
pub mod error;
pub mod export;
pub mod interpreter;
pub mod parser;
pub mod schema;

pub use decoder::{DecodedMember, decode_container};
pub use error::{Error, Result};
pub use parser::{DecodedRecord, decode_telemetry};
