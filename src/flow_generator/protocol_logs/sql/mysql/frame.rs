/*
 * Copyright (c) 2024 Yunshan Networks
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use public::bytes::{read_u24_le, write_u24_le};

use super::consts::{HEADER_LEN, LENGTH_OFFSET, NUMBER_OFFSET};

/// One MySQL protocol packet: 3 bytes length, 1 byte sequence, `length` bytes payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MysqlFrame<'a> {
    pub length: u32,
    pub sequence: u8,
    pub payload: &'a [u8],
}

impl<'a> MysqlFrame<'a> {
    pub fn new(sequence: u8, payload: &'a [u8]) -> Self {
        Self {
            length: payload.len() as u32,
            sequence,
            payload,
        }
    }

    pub fn write_to(&self, buf: &mut Vec<u8>) {
        write_u24_le(buf, self.length);
        buf.push(self.sequence);
        buf.extend_from_slice(self.payload);
    }
}

// Splits a single TCP payload. Nothing is carried over between payloads, so a
// frame continued in the next segment is lost together with its tail here.
#[derive(Debug, Clone)]
pub struct MysqlFrameIter<'a> {
    buf: &'a [u8],
    offset: usize,
    finished: bool,
}

impl<'a> MysqlFrameIter<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            offset: 0,
            finished: false,
        }
    }

    // bytes after the last emitted frame
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }
}

impl<'a> Iterator for MysqlFrameIter<'a> {
    type Item = MysqlFrame<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let remain = &self.buf[self.offset..];
        if remain.len() < HEADER_LEN {
            self.finished = true;
            return None;
        }
        let length = read_u24_le(&remain[LENGTH_OFFSET..]);
        let sequence = remain[NUMBER_OFFSET];
        let end = HEADER_LEN + length as usize;
        if length == 0 || end > remain.len() {
            self.finished = true;
            return None;
        }
        self.offset += end;
        Some(MysqlFrame {
            length,
            sequence,
            payload: &remain[HEADER_LEN..end],
        })
    }
}

impl std::iter::FusedIterator for MysqlFrameIter<'_> {}

pub fn split(buf: &[u8]) -> MysqlFrameIter<'_> {
    MysqlFrameIter::new(buf)
}
