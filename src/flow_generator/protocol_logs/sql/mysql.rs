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

mod consts;
mod frame;
mod param_scanner;

pub use frame::{split, MysqlFrame, MysqlFrameIter};

use std::borrow::Cow;

use log::trace;
use num_enum::TryFromPrimitive;
use serde::Serialize;

use public::bytes::{read_u16_le, read_u32_le};
use public::codecs::mysql::{decode_int, decode_string};

use consts::*;
use param_scanner::ParamScanner;

use crate::{
    common::flow::PacketDirection,
    flow_generator::protocol_logs::{LogMessageType, MysqlMessage},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum Command {
    Quit = 0x01,
    InitDb = 0x02,
    Query = 0x03,
    Ping = 0x0e,
    StmtPrepare = 0x16,
    StmtExecute = 0x17,
    StmtClose = 0x19,
}

impl Command {
    // Closed table from opcode to decoder, opcodes missing here are not reported.
    fn decode(self, payload: &[u8]) -> Option<String> {
        match self {
            Command::Quit => Some(QUIT_TEXT.to_owned()),
            Command::InitDb => command_text(payload).map(|db| format!("USE {}", db)),
            Command::Query => command_text(payload).map(Cow::into_owned),
            Command::Ping => Some(PING_TEXT.to_owned()),
            Command::StmtPrepare => command_text(payload).map(|sql| format!("[PREPARE] {}", sql)),
            Command::StmtExecute => Some(stmt_execute(payload)),
            Command::StmtClose => stmt_close(payload),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum ResponseCode {
    Ok = 0x00,
    Eof = 0xfe,
    Err = 0xff,
}

#[derive(Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MysqlPerfStats {
    pub request_count: u32,
    pub response_count: u32,
    pub err_count: u32,
    // frames that were decoded but produced no event
    pub ignored_count: u32,
}

#[derive(Debug, Default)]
pub struct MysqlLog {
    perf_stats: MysqlPerfStats,
}

impl MysqlLog {
    pub fn parse_payload(
        &mut self,
        payload: &[u8],
        direction: PacketDirection,
    ) -> Option<MysqlMessage> {
        let msg_type = LogMessageType::from(direction);
        let text = match msg_type {
            LogMessageType::Request => Self::request(payload),
            LogMessageType::Response => Self::response(payload),
        };
        trace!("mysql {:?} frame of {} bytes: {:?}", msg_type, payload.len(), text);
        let Some(text) = text else {
            self.perf_stats.ignored_count += 1;
            return None;
        };
        match msg_type {
            LogMessageType::Request => self.perf_stats.request_count += 1,
            LogMessageType::Response => {
                self.perf_stats.response_count += 1;
                if payload[RESPONSE_CODE_OFFSET] == ResponseCode::Err as u8 {
                    self.perf_stats.err_count += 1;
                }
            }
        }
        Some(MysqlMessage::new(msg_type, text))
    }

    pub fn perf_stats(&self) -> MysqlPerfStats {
        self.perf_stats
    }

    /// Decodes a client to server payload.
    pub fn request(payload: &[u8]) -> Option<String> {
        let opcode = *payload.get(COMMAND_OFFSET)?;
        Command::try_from(opcode).ok()?.decode(payload)
    }

    /// Decodes a server to client payload. Rules are tried in a fixed order
    /// and the first one producing text wins.
    pub fn response(payload: &[u8]) -> Option<String> {
        let code = *payload.get(RESPONSE_CODE_OFFSET)?;
        match ResponseCode::try_from(code) {
            Ok(ResponseCode::Err) => return Some(error_packet(payload)),
            Ok(ResponseCode::Eof) if payload.len() < EOF_PACKET_MAX_LEN => return None,
            _ => (),
        }
        if let Some(fields) = try_parse_row(payload) {
            if let Some(text) = row_text(fields) {
                return Some(text);
            }
        }
        match ResponseCode::try_from(code) {
            Ok(ResponseCode::Ok) if payload.len() < OK_PACKET_MAX_LEN => ok_packet(payload),
            _ => None,
        }
    }
}

fn command_text(payload: &[u8]) -> Option<Cow<'_, str>> {
    let body = payload.get(COMMAND_OFFSET + COMMAND_LEN..)?;
    let text = match String::from_utf8_lossy(body) {
        Cow::Borrowed(s) => Cow::Borrowed(s.trim()),
        Cow::Owned(s) => Cow::Owned(s.trim().to_owned()),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn stmt_execute(payload: &[u8]) -> String {
    if payload.len() < EXECUTE_STATEMENT_PARAMS_OFFSET {
        return EXECUTE_INCOMPLETE_TEXT.to_owned();
    }
    let stmt_id = read_u32_le(&payload[STATEMENT_ID_OFFSET..]);
    let params = ParamScanner::scan(&payload[EXECUTE_STATEMENT_PARAMS_OFFSET..]);
    if params.is_empty() {
        format!("[EXECUTE] stmt_id={}", stmt_id)
    } else {
        format!("[EXECUTE] stmt_id={}, params=[{}]", stmt_id, params.join(", "))
    }
}

fn stmt_close(payload: &[u8]) -> Option<String> {
    if payload.len() < STMT_CLOSE_LEN {
        return None;
    }
    let stmt_id = read_u32_le(&payload[STATEMENT_ID_OFFSET..]);
    Some(format!("[STMT_CLOSE] stmt_id={}", stmt_id))
}

fn error_packet(payload: &[u8]) -> String {
    if payload.len() < ERROR_PACKET_MIN_LEN {
        return ERROR_TEXT.to_owned();
    }
    let code = read_u16_le(&payload[ERROR_CODE_OFFSET..]);
    if payload[SQL_STATE_MARKER_OFFSET] == SQL_STATE_MARKER {
        let state = String::from_utf8_lossy(&payload[SQL_STATE_OFFSET..ERROR_MESSAGE_OFFSET]);
        let message = String::from_utf8_lossy(&payload[ERROR_MESSAGE_OFFSET..]);
        format!("ERROR {} ({}): {}", code, state, message)
    } else {
        let message = String::from_utf8_lossy(&payload[SQL_STATE_MARKER_OFFSET..]);
        format!("ERROR {}: {}", code, message)
    }
}

fn ok_packet(payload: &[u8]) -> Option<String> {
    if payload.len() < OK_PACKET_MIN_LEN {
        return None;
    }
    let (affected_rows, offset) = decode_int(payload, AFFECTED_ROWS_OFFSET);
    let (insert_id, _) = decode_int(payload, offset);
    match (affected_rows?, insert_id?) {
        (0, 0) => None,
        (affected_rows, insert_id) => Some(format!(
            "OK: affected_rows={}, insert_id={}",
            affected_rows, insert_id
        )),
    }
}

/// Reads the payload as a sequence of length-encoded strings.
///
/// Anything can be misread as a row, so the result is only trusted when the
/// decoded fields cover most of the payload.
pub fn try_parse_row(payload: &[u8]) -> Option<Vec<String>> {
    let mut fields = vec![];
    let mut offset = 0;
    while offset < payload.len() {
        let (Some(value), next) = decode_string(payload, offset) else {
            break;
        };
        offset = next;
        if value.as_str().len() < ROW_FIELD_MAX_LEN {
            fields.push(value.into_string());
        }
    }
    if !fields.is_empty() && offset * ROW_COVERAGE_DEN >= payload.len() * ROW_COVERAGE_NUM {
        Some(fields)
    } else {
        None
    }
}

fn row_text(fields: Vec<String>) -> Option<String> {
    if fields[0] == CATALOG_DEF {
        return column_definition(&fields);
    }
    let cleaned = fields
        .iter()
        .map(|f| clean_field(f))
        .filter(|f| f.chars().count() > 1)
        .collect::<Vec<_>>();
    let meaningful = cleaned
        .iter()
        .any(|f| f.chars().any(|c| c.is_alphanumeric() || !c.is_ascii()));
    if meaningful {
        Some(format!("ROW: {}", cleaned.join(" | ")))
    } else {
        None
    }
}

// catalog, schema, table, org_table, name, ...
fn column_definition(fields: &[String]) -> Option<String> {
    let table = fields.get(FIELD_TABLE_INDEX).map(String::as_str).unwrap_or("");
    let column = fields.get(FIELD_NAME_INDEX).map(String::as_str).unwrap_or("");
    if column.is_empty()
        || !column.chars().all(is_printable)
        || column.chars().count() >= FIELD_NAME_MAX_LEN
        || column.starts_with('?')
    {
        return None;
    }
    if table.is_empty() {
        Some(format!("FIELD: {}", column))
    } else {
        Some(format!("FIELD: {}.{}", table, column))
    }
}

// space is the only separator allowed, format characters are invisible
fn is_printable(c: char) -> bool {
    if c == ' ' {
        return true;
    }
    !(c.is_control()
        || c.is_whitespace()
        || matches!(
            c,
            '\u{ad}'
                | '\u{200b}'..='\u{200f}'
                | '\u{202a}'..='\u{202e}'
                | '\u{2060}'..='\u{2064}'
                | '\u{2066}'..='\u{206f}'
                | '\u{feff}'
        ))
}

fn clean_field(field: &str) -> String {
    field.trim().replace('\u{fffd}', "").trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    use public::codecs::mysql::{encode_int, encode_string, LengthEncodedValue};

    fn command(opcode: u8, body: &[u8]) -> Vec<u8> {
        let mut payload = vec![opcode];
        payload.extend_from_slice(body);
        payload
    }

    fn row(fields: &[Option<&str>]) -> Vec<u8> {
        let mut payload = vec![];
        for f in fields {
            let value = match f {
                Some(s) => LengthEncodedValue::Text(s.to_string()),
                None => LengthEncodedValue::Null,
            };
            encode_string(&mut payload, &value);
        }
        payload
    }

    fn execute(stmt_id: u32, params: &[u8]) -> Vec<u8> {
        let mut payload = vec![0x17];
        payload.extend_from_slice(&stmt_id.to_le_bytes());
        // flags + iteration count
        payload.extend_from_slice(&[0x00, 0x01, 0x00, 0x00, 0x00]);
        payload.extend_from_slice(params);
        payload
    }

    #[test]
    fn text_commands() {
        let cases: Vec<(Vec<u8>, Option<&str>)> = vec![
            (command(0x03, b"SELECT 1"), Some("SELECT 1")),
            (command(0x03, b"  SELECT 2 \n"), Some("SELECT 2")),
            (command(0x03, b"   "), None),
            (command(0x03, b""), None),
            (command(0x02, b"mydb"), Some("USE mydb")),
            (command(0x02, b" "), None),
            (
                command(0x16, b"SELECT * FROM t WHERE id = ?"),
                Some("[PREPARE] SELECT * FROM t WHERE id = ?"),
            ),
            (command(0x16, b""), None),
            (command(0x01, b""), Some("[QUIT]")),
            (command(0x0e, b""), Some("[PING]")),
        ];
        for (payload, expected) in cases {
            assert_eq!(
                MysqlLog::request(&payload).as_deref(),
                expected,
                "payload {:?}",
                payload
            );
        }
    }

    #[test]
    fn unknown_commands() {
        assert_eq!(MysqlLog::request(&[]), None);
        // COM_FIELD_LIST and COM_STMT_FETCH are not decoded
        assert_eq!(MysqlLog::request(&command(0x04, b"users\0")), None);
        assert_eq!(MysqlLog::request(&command(0x1c, &[1, 0, 0, 0])), None);
        assert_eq!(MysqlLog::request(&[0xff]), None);
    }

    #[test]
    fn lossy_query() {
        let payload = command(0x03, b"SELECT '\xff'");
        assert_eq!(
            MysqlLog::request(&payload).as_deref(),
            Some("SELECT '\u{fffd}'")
        );
    }

    #[test]
    fn stmt_execute_params() {
        let payload = execute(7, b"\x01\x00\xfe\x00\xfe\x00\x05alice\x0bwonderland!");
        assert_eq!(
            MysqlLog::request(&payload).as_deref(),
            Some("[EXECUTE] stmt_id=7, params=[alice, wonderland!]")
        );

        let payload = execute(258, &[0x00, 0x01, 0x03, 0x00, 0x2a, 0x00, 0x00, 0x00]);
        assert_eq!(
            MysqlLog::request(&payload).as_deref(),
            Some("[EXECUTE] stmt_id=258")
        );

        assert_eq!(
            MysqlLog::request(&execute(1, b"")).as_deref(),
            Some("[EXECUTE] stmt_id=1")
        );
        assert_eq!(
            MysqlLog::request(&[0x17, 0x01, 0x00, 0x00]).as_deref(),
            Some("[EXECUTE] (incomplete)")
        );
    }

    #[test]
    fn stmt_close() {
        assert_eq!(
            MysqlLog::request(&[0x19, 0x05, 0x01, 0x00, 0x00]).as_deref(),
            Some("[STMT_CLOSE] stmt_id=261")
        );
        assert_eq!(MysqlLog::request(&[0x19, 0x05, 0x01, 0x00]), None);
    }

    #[test]
    fn ok_response() {
        let payload = [0x00, 0x05, 0x0a, 0x02, 0x00, 0x00, 0x00];
        assert_eq!(
            MysqlLog::response(&payload).as_deref(),
            Some("OK: affected_rows=5, insert_id=10")
        );

        let mut payload = vec![0x00];
        encode_int(&mut payload, 300);
        encode_int(&mut payload, 0);
        payload.extend_from_slice(&[0x02, 0x00, 0x00, 0x00]);
        assert_eq!(
            MysqlLog::response(&payload).as_deref(),
            Some("OK: affected_rows=300, insert_id=0")
        );

        // nothing changed
        assert_eq!(
            MysqlLog::response(&[0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00]),
            None
        );
        // too short
        assert_eq!(MysqlLog::response(&[0x00, 0x05, 0x0a, 0x02]), None);
    }

    #[test]
    fn long_ok_not_reported() {
        let mut payload = vec![0x00, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00];
        payload.resize(OK_PACKET_MAX_LEN, 0x01);
        assert_eq!(MysqlLog::response(&payload), None);
    }

    #[test]
    fn error_response() {
        let mut payload = vec![0xff, 0x14, 0x04, b'#'];
        payload.extend_from_slice(b"42S02");
        payload.extend_from_slice(b"Table not found");
        assert_eq!(
            MysqlLog::response(&payload).as_deref(),
            Some("ERROR 1044 (42S02): Table not found")
        );

        let mut payload = vec![0xff, 0x15, 0x04];
        payload.extend_from_slice(b"Access denied");
        assert_eq!(
            MysqlLog::response(&payload).as_deref(),
            Some("ERROR 1045: Access denied")
        );

        assert_eq!(
            MysqlLog::response(&[0xff, 0x15, 0x04, b'#']).as_deref(),
            Some("ERROR")
        );
    }

    #[test]
    fn eof_response() {
        assert_eq!(MysqlLog::response(&[0xfe, 0x00, 0x00, 0x02, 0x00]), None);
        // 9 bytes or more starting with 0xfe is a row with a long first field
        let field = "a".repeat(254);
        let mut payload = vec![0xfe];
        payload.extend_from_slice(&254u64.to_le_bytes());
        payload.extend_from_slice(field.as_bytes());
        assert_eq!(
            MysqlLog::response(&payload),
            Some(format!("ROW: {}", field))
        );
    }

    #[test]
    fn row_response() {
        assert_eq!(
            MysqlLog::response(&row(&[Some("Alice")])).as_deref(),
            Some("ROW: Alice")
        );
        let payload = row(&[Some("1"), Some("Alice"), None, Some(" 北京 ")]);
        assert_eq!(
            MysqlLog::response(&payload).as_deref(),
            Some("ROW: Alice | NULL | 北京")
        );
        // nothing but punctuation
        assert_eq!(MysqlLog::response(&row(&[Some("--"), Some("..")])), None);
        // single characters are dropped
        assert_eq!(MysqlLog::response(&row(&[Some("a"), Some("b")])), None);
    }

    #[test]
    fn replacement_chars_stripped() {
        let mut payload = vec![0x07];
        payload.extend_from_slice(b"\xff\xfeBob  ");
        assert_eq!(
            MysqlLog::response(&payload).as_deref(),
            Some("ROW: Bob")
        );
    }

    #[test]
    fn field_response() {
        let def = |table: &str, column: &str| {
            row(&[
                Some("def"),
                Some("shop"),
                Some(table),
                Some(table),
                Some(column),
                Some(column),
            ])
        };
        assert_eq!(
            MysqlLog::response(&def("users", "name")).as_deref(),
            Some("FIELD: users.name")
        );
        assert_eq!(
            MysqlLog::response(&def("", "1")).as_deref(),
            Some("FIELD: 1")
        );
        assert_eq!(MysqlLog::response(&def("users", "")), None);
        assert_eq!(MysqlLog::response(&def("users", "?x")), None);
        assert_eq!(MysqlLog::response(&def("users", &"c".repeat(64))), None);
        assert_eq!(MysqlLog::response(&def("users", "a\tb")), None);
        assert_eq!(
            MysqlLog::response(&def("users", "first name")).as_deref(),
            Some("FIELD: users.first name")
        );
    }

    #[test]
    fn unprintable_column_names() {
        let def = |column: &str| {
            row(&[
                Some("def"),
                Some("shop"),
                Some("users"),
                Some("users"),
                Some(column),
                Some(column),
            ])
        };
        for column in ["na\u{200b}me", "na\u{a0}me", "na\u{2028}me", "\u{feff}name"] {
            assert_eq!(MysqlLog::response(&def(column)), None, "{:?}", column);
        }
        assert_eq!(
            MysqlLog::response(&def("名前")).as_deref(),
            Some("FIELD: users.名前")
        );
        assert_eq!(MysqlLog::response(&row(&[Some("def"), Some("shop")])), None);
    }

    #[test]
    fn row_coverage_threshold() {
        // 8 bytes of fields followed by 2 undecodable bytes: 80% covered
        let mut payload = row(&[Some("abc"), Some("xyz")]);
        payload.extend_from_slice(&[0xfc, 0x01]);
        assert_eq!(
            try_parse_row(&payload),
            Some(vec!["abc".to_owned(), "xyz".to_owned()])
        );

        // 8 bytes of fields followed by 3 undecodable bytes: below 80%
        payload.push(0xff);
        assert_eq!(payload.len(), 11);
        assert_eq!(try_parse_row(&payload), None);

        // nothing decodes
        assert_eq!(try_parse_row(&[0xff, 0x01, 0x02]), None);
        assert_eq!(try_parse_row(&[]), None);
    }

    #[test]
    fn oversized_field_skipped() {
        let big = "x".repeat(ROW_FIELD_MAX_LEN);
        let payload = row(&[Some(&big), Some("tail")]);
        assert_eq!(try_parse_row(&payload), Some(vec!["tail".to_owned()]));
    }

    #[test]
    fn perf_stats() {
        let mut log = MysqlLog::default();
        let c2s = PacketDirection::ClientToServer;
        let s2c = PacketDirection::ServerToClient;
        assert_eq!(
            log.parse_payload(b"\x03SELECT 1", c2s),
            Some(MysqlMessage::Command("SELECT 1".into()))
        );
        assert_eq!(
            log.parse_payload(b"\xff\x14\x04no such table", s2c),
            Some(MysqlMessage::Response("ERROR 1044: no such table".into()))
        );
        assert_eq!(log.parse_payload(&[0xfe, 0x00, 0x00], s2c), None);
        assert_eq!(
            log.perf_stats(),
            MysqlPerfStats {
                request_count: 1,
                response_count: 1,
                err_count: 1,
                ignored_count: 1,
            }
        );
    }
}
