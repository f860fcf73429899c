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

//! Text mining over the binary parameter block of COM_STMT_EXECUTE.
//!
//! Without the column types announced in the PREPARE response the values
//! cannot be decoded faithfully, so readable runs of text are collected
//! instead. Integers, dates and other binary values are mostly lost.

use std::mem;
use std::str;

use super::consts::MIN_PARAM_CHARS;

#[derive(Debug, PartialEq, Eq)]
enum ScanState {
    Idle,
    InRun(String),
}

#[derive(Debug)]
pub struct ParamScanner {
    state: ScanState,
    params: Vec<String>,
}

impl ParamScanner {
    fn new() -> Self {
        Self {
            state: ScanState::Idle,
            params: vec![],
        }
    }

    pub fn scan(data: &[u8]) -> Vec<String> {
        let mut scanner = Self::new();
        let mut offset = 0;
        while offset < data.len() {
            match next_char(data, offset) {
                Some((c, len)) => {
                    scanner.extend(c);
                    offset += len;
                }
                None => {
                    scanner.flush();
                    offset += 1;
                }
            }
        }
        scanner.finish()
    }

    fn extend(&mut self, c: char) {
        if let ScanState::InRun(run) = &mut self.state {
            run.push(c);
        } else {
            self.state = ScanState::InRun(String::from(c));
        }
    }

    fn flush(&mut self) {
        if let ScanState::InRun(run) = mem::replace(&mut self.state, ScanState::Idle) {
            if run.chars().count() >= MIN_PARAM_CHARS {
                self.params.push(run);
            }
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.params
    }
}

// printable ascii, or one complete 2 or 3 byte utf-8 sequence
fn next_char(data: &[u8], offset: usize) -> Option<(char, usize)> {
    let len = match data[offset] {
        0x20..=0x7e => return Some((data[offset] as char, 1)),
        0xc2..=0xdf => 2,
        0xe0..=0xef => 3,
        _ => return None,
    };
    let seq = data.get(offset..offset + len)?;
    let c = str::from_utf8(seq).ok()?.chars().next()?;
    Some((c, len))
}
