// SPDX-License-Identifier: GPL-3.0-or-later

/*
 *  src/interpreter.rs - Sub-record layouts and measurement decoding.
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
 * # `interpreter` Module
 *
 * This module knows what every sub-record tag means. Each [SubRecordDef]
 * pairs a [RecordSchema] with a fixup that turns raw integers into
 * measurements, pass/fail flags, and labels.
 *
 * Most 16-bit measurements use a split fixed-point encoding: the top two bits
 * pick a decimal exponent and the low fourteen bits are the mantissa, so the
 * value is `mantissa * 10^-exponent`. The version 1 insulation result instead
 * carries a pass flag in the top bit and hundredths in the low fifteen bits.
 */

use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::schema::{Field, FieldValue, Fields, RecordSchema};

/// Scale applied to raw load current readings, in amps per count.
///
/// Derived from two identical samples; treat as provisional.
pub const LOAD_CURRENT_SCALE: Decimal = Decimal::from_parts(625, 0, 0, false, 5);

/// Largest insulation resistance the meters display, in megohms.
pub const INSULATION_DISPLAY_CAP: Decimal = Decimal::from_parts(9999, 0, 0, false, 2);

pub const END_OF_RECORD: u8 = 0xff;

/// Tags that only appear in version 2 streams and switch the stream over.
pub const VERSION_2_MARKERS: [u8; 2] = [0x11, 0x12];

/// Labels for the coded fields of a user-data mapping sub-record.
pub const USER_DATA_MEANINGS: [&str; 6] = [
    "Notes",
    "Asset Description",
    "Asset Group",
    "Make",
    "Model",
    "Serial No.",
];

/// Which tag table a stream is using.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum FormatVersion {
    #[default]
    V1,
    V2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubRecordKind {
    VisualPass,
    VisualFail,
    Unknown,
    UserDataMapping,
    Retest,
    OverallPass,
    OverallFail,
    EarthResistance,
    EarthInsulation,
    SubstituteLeakage,
    FlashLeakage,
    LoadLeakage,
    Continuity,
    LeadContinuityPass,
    UserText,
    SoftwareVersion,
    EndOfRecord,
}

type Fixup = fn(&mut Fields) -> Result<()>;

/// How to decode one sub-record tag.
#[derive(Debug)]
pub struct SubRecordDef {
    pub tag: u8,
    pub kind: SubRecordKind,
    pub label: &'static str,
    pub schema: RecordSchema,
    /// Whether a repeat-count byte sits between the tag and the fields.
    pub counted: bool,
    fixup: Fixup,
}

impl SubRecordDef {
    /// Bytes following the tag byte.
    pub const fn width(&self) -> usize {
        self.schema.width() + self.counted as usize
    }

    /// Decodes the bytes after the tag, including any repeat count.
    ///
    /// Errors carry record 0 and offsets relative to the sub-record's tag
    /// byte.
    pub fn decode(&self, buf: &[u8]) -> Result<(Option<u8>, Fields)> {
        let (repeat, rest) = match (self.counted, buf.split_first()) {
            (false, _) => (None, buf),
            (true, Some((&count, rest))) => (Some(count), rest),
            (true, None) => {
                return Err(Error::ShortBuffer {
                    expected: self.width(),
                    actual: 0,
                });
            }
        };
        let mut fields = self.schema.decode(rest)?;
        (self.fixup)(&mut fields)?;
        Ok((repeat, fields))
    }
}

/// Finds the definition for `tag` under `version`.
///
/// Version 2 definitions take precedence; tags they do not redefine fall back
/// to version 1.
pub fn lookup(version: FormatVersion, tag: u8) -> Option<&'static SubRecordDef> {
    let v2 = match version {
        FormatVersion::V2 => VERSION_2.iter().find(|d| d.tag == tag),
        FormatVersion::V1 => None,
    };
    v2.or_else(|| VERSION_1.iter().find(|d| d.tag == tag))
}

/// Rescales a split fixed-point value: `(v & 0x3fff) * 10^-(v >> 14)`.
pub fn rescale(raw: u32) -> Decimal {
    let raw = raw & 0xffff;
    Decimal::new(i64::from(raw & 0x3fff), raw >> 14)
}

/// Splits a legacy value into its top-bit pass flag and hundredths.
pub fn legacy_centi(raw: u32) -> (bool, Decimal) {
    let raw = raw & 0xffff;
    (raw & 0x8000 != 0, Decimal::new(i64::from(raw & 0x7fff), 2))
}

fn unsigned(fields: &Fields, name: &'static str) -> u32 {
    fields.unsigned(name).unwrap_or_default()
}

fn rescale_field(fields: &mut Fields, name: &'static str) {
    let value = rescale(unsigned(fields, name));
    fields.insert(name, FieldValue::Real(value));
}

fn pass_flag(fields: &mut Fields) {
    let passed = unsigned(fields, "pass") == 1;
    fields.insert("pass", FieldValue::Bool(passed));
}

fn no_result_if_zero(fields: &mut Fields, name: &'static str) {
    if fields.real(name) == Some(Decimal::ZERO) {
        fields.insert(name, FieldValue::NoResult);
    }
}

fn cap_insulation(fields: &mut Fields) {
    if let Some(value) = fields.real("resistance") {
        fields.insert("resistance_uncapped", FieldValue::Real(value));
        fields.insert(
            "resistance",
            FieldValue::Real(value.min(INSULATION_DISPLAY_CAP)),
        );
    }
}

fn no_fixup(_: &mut Fields) -> Result<()> {
    Ok(())
}

fn fix_resistance(fields: &mut Fields) -> Result<()> {
    rescale_field(fields, "resistance");
    Ok(())
}

fn fix_resistance_v2(fields: &mut Fields) -> Result<()> {
    rescale_field(fields, "resistance");
    pass_flag(fields);
    Ok(())
}

fn fix_insulation(fields: &mut Fields) -> Result<()> {
    let (passed, value) = legacy_centi(unsigned(fields, "resistance"));
    fields.insert("pass", FieldValue::Bool(passed));
    fields.insert("resistance", FieldValue::Real(value));
    cap_insulation(fields);
    Ok(())
}

fn fix_insulation_v2(fields: &mut Fields) -> Result<()> {
    rescale_field(fields, "resistance");
    pass_flag(fields);
    cap_insulation(fields);
    Ok(())
}

fn fix_current(fields: &mut Fields) -> Result<()> {
    rescale_field(fields, "current");
    Ok(())
}

fn fix_current_v2(fields: &mut Fields) -> Result<()> {
    rescale_field(fields, "current");
    pass_flag(fields);
    Ok(())
}

fn fix_load(fields: &mut Fields) -> Result<()> {
    rescale_field(fields, "leakage");
    let load = Decimal::from(unsigned(fields, "load")) * LOAD_CURRENT_SCALE;
    fields.insert("load", FieldValue::Real(load));
    Ok(())
}

fn fix_load_v2(fields: &mut Fields) -> Result<()> {
    fix_load(fields)?;
    pass_flag(fields);
    Ok(())
}

fn fix_continuity(fields: &mut Fields) -> Result<()> {
    rescale_field(fields, "resistance");
    no_result_if_zero(fields, "resistance");
    Ok(())
}

fn fix_continuity_v2(fields: &mut Fields) -> Result<()> {
    fix_continuity(fields)?;
    pass_flag(fields);
    Ok(())
}

fn fix_user_data_mapping(fields: &mut Fields) -> Result<()> {
    const MEANINGS: [(&str, &str); 4] = [
        ("mapping1", "meaning1"),
        ("mapping2", "meaning2"),
        ("mapping3", "meaning3"),
        ("mapping4", "meaning4"),
    ];
    for (code, meaning) in MEANINGS {
        let value = unsigned(fields, code);
        let label = USER_DATA_MEANINGS
            .get(value as usize)
            .ok_or(Error::UnknownEnumValue {
                record: 0,
                offset: 0,
                field: code,
                value,
            })?;
        fields.insert(meaning, FieldValue::Label(label));
    }
    Ok(())
}

const NO_DATA: RecordSchema = RecordSchema::new(&[]);

const VISUAL: RecordSchema = RecordSchema::new(&[
    Field::text("id", 16),
    Field::unsigned("hour", 1),
    Field::unsigned("minute", 1),
    Field::unsigned("day", 1),
    Field::unsigned("month", 1),
    Field::unsigned("year", 2),
    Field::text("site", 16),
    Field::text("location", 16),
    Field::text("tester", 11),
    Field::text("testcode1", 10),
    Field::text("testcode2", 11),
]);

const USER_DATA_MAPPING: RecordSchema = RecordSchema::new(&[
    Field::unsigned("mapping1", 1),
    Field::unsigned("mapping2", 1),
    Field::unsigned("mapping3", 1),
    Field::unsigned("mapping4", 1),
]);

const RETEST: RecordSchema = RecordSchema::new(&[
    Field::unsigned("nulls", 1),
    Field::unsigned("unknown", 1),
    Field::unsigned("frequency", 1),
]);

const RESISTANCE: RecordSchema = RecordSchema::new(&[Field::unsigned("resistance", 2)]);

const EARTH_RESISTANCE_V2: RecordSchema = RecordSchema::new(&[
    Field::unsigned("current", 1),
    Field::unsigned("pass", 1),
    Field::unsigned("resistance", 2),
]);

const RESISTANCE_V2: RecordSchema = RecordSchema::new(&[
    Field::unsigned("pass", 1),
    Field::unsigned("resistance", 2),
]);

const CURRENT: RecordSchema = RecordSchema::new(&[Field::unsigned("current", 2)]);

const CURRENT_V2: RecordSchema = RecordSchema::new(&[
    Field::unsigned("pass", 1),
    Field::unsigned("current", 2),
]);

const LOAD_LEAKAGE: RecordSchema = RecordSchema::new(&[
    Field::unsigned("leakage", 2),
    Field::unsigned("load", 2),
]);

const LOAD_LEAKAGE_V2: RecordSchema = RecordSchema::new(&[
    Field::unsigned("pass", 1),
    Field::unsigned("leakage", 2),
    Field::unsigned("load", 2),
]);

const USER_TEXT: RecordSchema = RecordSchema::new(&[
    Field::text("line1", 21),
    Field::text("line2", 21),
    Field::text("line3", 21),
    Field::text("line4", 21),
]);

const SOFTWARE_VERSION: RecordSchema = RecordSchema::new(&[
    Field::text("serialnumber", 11),
    Field::unsigned("firmware1", 1),
    Field::unsigned("firmware2", 1),
    Field::unsigned("firmware3", 1),
]);

const fn def(
    tag: u8,
    kind: SubRecordKind,
    label: &'static str,
    schema: RecordSchema,
    fixup: Fixup,
) -> SubRecordDef {
    SubRecordDef {
        tag,
        kind,
        label,
        schema,
        counted: false,
        fixup,
    }
}

const fn counted(
    tag: u8,
    kind: SubRecordKind,
    label: &'static str,
    schema: RecordSchema,
    fixup: Fixup,
) -> SubRecordDef {
    SubRecordDef {
        counted: true,
        ..def(tag, kind, label, schema, fixup)
    }
}

use SubRecordKind::*;

#[rustfmt::skip]
static VERSION_1: [SubRecordDef; 17] = [
    def(0x01, VisualPass, "Visual Pass (01)", VISUAL, no_fixup),
    def(0x02, VisualFail, "Visual Fail (02)", VISUAL, no_fixup),
    def(0x10, Unknown, "Unknown (10)", NO_DATA, no_fixup),
    def(0xe0, UserDataMapping, "User Data Mapping (E0)", USER_DATA_MAPPING, fix_user_data_mapping),
    def(0xe1, Retest, "Retest (E1)", RETEST, no_fixup),
    def(0xf0, OverallPass, "Overall Pass (F0)", NO_DATA, no_fixup),
    def(0xf1, OverallFail, "Overall Fail (F1)", NO_DATA, no_fixup),
    def(0xf2, EarthResistance, "Earth Resistance (F2)", RESISTANCE, fix_resistance),
    def(0xf3, EarthInsulation, "Earth Insulation (F3)", RESISTANCE, fix_insulation),
    def(0xf4, SubstituteLeakage, "Substitute Leakage (F4)", CURRENT, fix_current),
    def(0xf5, FlashLeakage, "Flash Leakage (F5)", CURRENT, fix_current),
    def(0xf6, LoadLeakage, "Load/Leakage (F6)", LOAD_LEAKAGE, fix_load),
    def(0xf7, FlashLeakage, "Flash Leakage (F7)", CURRENT, fix_current),
    def(0xf8, Continuity, "Continuity (F8)", RESISTANCE, fix_continuity),
    def(0xfb, UserText, "User Data (FB)", USER_TEXT, no_fixup),
    def(0xfe, SoftwareVersion, "Software Version (FE)", SOFTWARE_VERSION, no_fixup),
    def(END_OF_RECORD, EndOfRecord, "End of Record (FF)", NO_DATA, no_fixup),
];

#[rustfmt::skip]
static VERSION_2: [SubRecordDef; 10] = [
    def(0x11, VisualPass, "Visual Pass v2 (11)", VISUAL, no_fixup),
    def(0x12, VisualFail, "Visual Fail v2 (12)", VISUAL, no_fixup),
    counted(0xf2, EarthResistance, "Earth Resistance v2 (F2)", EARTH_RESISTANCE_V2, fix_resistance_v2),
    counted(0xf3, EarthInsulation, "Earth Insulation v2 (F3)", RESISTANCE_V2, fix_insulation_v2),
    counted(0xf4, SubstituteLeakage, "Substitute Leakage v2 (F4)", CURRENT_V2, fix_current_v2),
    counted(0xf5, FlashLeakage, "Flash Leakage v2 (F5)", CURRENT_V2, fix_current_v2),
    counted(0xf6, LoadLeakage, "Load/Leakage v2 (F6)", LOAD_LEAKAGE_V2, fix_load_v2),
    counted(0xf7, FlashLeakage, "Flash Leakage v2 (F7)", CURRENT_V2, fix_current_v2),
    counted(0xf8, Continuity, "Continuity v2 (F8)", RESISTANCE_V2, fix_continuity_v2),
    def(0xf9, LeadContinuityPass, "Lead Continuity Pass (F9)", NO_DATA, no_fixup),
];
