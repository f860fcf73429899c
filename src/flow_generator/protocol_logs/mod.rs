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

pub mod sql;

pub use sql::{MysqlFrame, MysqlFrameIter, MysqlLog};

use std::fmt;

use serde::Serialize;

use crate::common::flow::{ConnectionKey, PacketDirection};

#[derive(Serialize, Debug, PartialEq, Eq, Clone, Copy)]
pub enum LogMessageType {
    Request,
    Response,
}

impl From<PacketDirection> for LogMessageType {
    fn from(d: PacketDirection) -> LogMessageType {
        match d {
            PacketDirection::ClientToServer => LogMessageType::Request,
            PacketDirection::ServerToClient => LogMessageType::Response,
        }
    }
}

#[derive(Serialize, Debug, PartialEq, Eq, Clone)]
#[serde(tag = "type", content = "text", rename_all = "lowercase")]
pub enum MysqlMessage {
    Command(String),
    Response(String),
}

impl MysqlMessage {
    pub fn new(msg_type: LogMessageType, text: String) -> Self {
        match msg_type {
            LogMessageType::Request => Self::Command(text),
            LogMessageType::Response => Self::Response(text),
        }
    }

    pub fn msg_type(&self) -> LogMessageType {
        match self {
            Self::Command(_) => LogMessageType::Request,
            Self::Response(_) => LogMessageType::Response,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Command(t) | Self::Response(t) => t.as_str(),
        }
    }
}

impl fmt::Display for MysqlMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(t) => write!(f, "SQL: {}", t),
            Self::Response(t) => write!(f, "Response: {}", t),
        }
    }
}

/// One decoded frame, immutable once appended to its connection.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    pub timestamp: f64,
    pub direction: PacketDirection,
    #[serde(skip)]
    pub connection_key: ConnectionKey,
    pub message: MysqlMessage,
}
