// SPDX-License-Identifier: GPL-3.0-or-later

/*
 *  src/crypto.rs - Keystream used to mask archive member payloads
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

/// Initial value of the `z` state word.
pub const DEFAULT_Z: u32 = 521288629;
/// Initial value of the `w` state word.
pub const DEFAULT_W: u32 = 88675123;

/// How keystream bytes are combined with data bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Modulo-256 addition, used to mask.
    Add,
    /// Modulo-256 subtraction, used to unmask.
    Subtract,
}

/// A 128-bit xorshift generator.
///
/// `x` and `y` are seeded per member payload from its sub-header timestamp
/// and original length. Because the first output depends only on the initial
/// `x` and `w`, the first masked byte can be checked against the timestamp
/// without knowing the length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keystream {
    x: u32,
    y: u32,
    z: u32,
    w: u32,
}

impl Keystream {
    pub fn new(x: u32, y: u32) -> Self {
        Self {
            x,
            y,
            z: DEFAULT_Z,
            w: DEFAULT_W,
        }
    }

    /// Advances the generator and returns the new `w` word.
    pub fn next_word(&mut self) -> u32 {
        let t = self.x ^ (self.x << 11);
        self.x = self.y;
        self.y = self.z;
        self.z = self.w;
        self.w = self.w ^ (self.w >> 19) ^ (t ^ (t >> 8));
        self.w
    }

    pub fn next_byte(&mut self) -> u8 {
        self.next_word().to_le_bytes()[0]
    }

    /// Combines every byte of `data` in place with one keystream byte.
    pub fn apply(&mut self, data: &mut [u8], op: Op) {
        for current_byte in data.iter_mut() {
            let k = self.next_byte();
            *current_byte = match op {
                Op::Add => current_byte.wrapping_add(k),
                Op::Subtract => current_byte.wrapping_sub(k),
            };
        }
    }

    pub fn mask(&mut self, data: &[u8]) -> Vec<u8> {
        let mut result = data.to_vec();
        self.apply(&mut result, Op::Add);
        result
    }

    pub fn unmask(&mut self, data: &[u8]) -> Vec<u8> {
        let mut result = data.to_vec();
        self.apply(&mut result, Op::Subtract);
        result
    }
}

impl Iterator for Keystream {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        Some(self.next_byte())
    }
}
