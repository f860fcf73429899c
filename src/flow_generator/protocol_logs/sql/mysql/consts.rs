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

// Header
pub const HEADER_LEN: usize = 4;

pub const LENGTH_OFFSET: usize = 0;
pub const NUMBER_OFFSET: usize = 3;

// Request
pub const COMMAND_OFFSET: usize = 0;
pub const COMMAND_LEN: usize = 1;

pub const STATEMENT_ID_LEN: usize = 4;
pub const STATEMENT_ID_OFFSET: usize = COMMAND_OFFSET + COMMAND_LEN;
// stmt_id(4) + flags(1) + iteration_count(4)
pub const EXECUTE_STATEMENT_PARAMS_OFFSET: usize = STATEMENT_ID_OFFSET + STATEMENT_ID_LEN + 5;
pub const STMT_CLOSE_LEN: usize = STATEMENT_ID_OFFSET + STATEMENT_ID_LEN;

// a run of printable text shorter than this is treated as binary noise
pub const MIN_PARAM_CHARS: usize = 2;

// Response
pub const RESPONSE_CODE_LEN: usize = 1;
pub const ERROR_CODE_LEN: usize = 2;
pub const SQL_STATE_LEN: usize = 5;
pub const SQL_STATE_MARKER: u8 = b'#';

pub const RESPONSE_CODE_OFFSET: usize = 0;
pub const ERROR_CODE_OFFSET: usize = RESPONSE_CODE_OFFSET + RESPONSE_CODE_LEN;
pub const AFFECTED_ROWS_OFFSET: usize = RESPONSE_CODE_OFFSET + RESPONSE_CODE_LEN;
pub const SQL_STATE_MARKER_OFFSET: usize = ERROR_CODE_OFFSET + ERROR_CODE_LEN;
pub const SQL_STATE_OFFSET: usize = SQL_STATE_MARKER_OFFSET + 1;
pub const ERROR_MESSAGE_OFFSET: usize = SQL_STATE_OFFSET + SQL_STATE_LEN;

// shorter error packets are reported without code or message
pub const ERROR_PACKET_MIN_LEN: usize = ERROR_MESSAGE_OFFSET;
// 0xfe packets this long or longer are result rows, not EOF markers
pub const EOF_PACKET_MAX_LEN: usize = 9;
pub const OK_PACKET_MIN_LEN: usize = 7;
pub const OK_PACKET_MAX_LEN: usize = 50;

// Result set
pub const CATALOG_DEF: &str = "def";
pub const FIELD_TABLE_INDEX: usize = 2;
pub const FIELD_NAME_INDEX: usize = 4;
pub const FIELD_NAME_MAX_LEN: usize = 64;
pub const ROW_FIELD_MAX_LEN: usize = 10000;
// a row must cover at least ROW_COVERAGE_NUM / ROW_COVERAGE_DEN of the payload
pub const ROW_COVERAGE_NUM: usize = 4;
pub const ROW_COVERAGE_DEN: usize = 5;

pub const QUIT_TEXT: &str = "[QUIT]";
pub const PING_TEXT: &str = "[PING]";
pub const EXECUTE_INCOMPLETE_TEXT: &str = "[EXECUTE] (incomplete)";
pub const ERROR_TEXT: &str = "ERROR";
