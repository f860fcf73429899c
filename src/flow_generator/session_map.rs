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

use std::collections::HashMap;
use std::fmt;

use log::debug;
use serde::Serialize;

use super::protocol_logs::{
    sql::{split, MysqlPerfStats},
    DecodedEvent, MysqlLog, MysqlMessage,
};
use crate::common::{flow::ConnectionKey, meta_packet::CapturedPacket};

/// Frames and decoded events of one TCP flow, in capture order.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct MysqlConnection {
    pub key: ConnectionKey,
    // every frame split from the flow, decoded or not
    pub frame_count: usize,
    pub events: Vec<DecodedEvent>,
}

impl MysqlConnection {
    fn new(key: ConnectionKey) -> Self {
        Self {
            key,
            frame_count: 0,
            events: vec![],
        }
    }
}

#[derive(Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DecodeStats {
    pub packets: u64,
    pub skipped_packets: u64,
    pub frames: u64,
    pub commands: u64,
    pub responses: u64,
    // bytes left over after the last whole frame of a payload
    pub dropped_bytes: u64,
}

impl fmt::Display for DecodeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "packets={} skipped={} frames={} commands={} responses={} dropped_bytes={}",
            self.packets,
            self.skipped_packets,
            self.frames,
            self.commands,
            self.responses,
            self.dropped_bytes
        )
    }
}

/// Groups captured packets by connection and decodes each frame they carry.
///
/// Connections are kept in order of first appearance, events inside a
/// connection in packet arrival order. Nothing is ever reordered or merged.
pub struct SessionMap {
    mysql_port: u16,
    index: HashMap<ConnectionKey, usize>,
    connections: Vec<MysqlConnection>,
    parser: MysqlLog,
    stats: DecodeStats,
}

impl SessionMap {
    pub fn new(mysql_port: u16) -> Self {
        Self {
            mysql_port,
            index: HashMap::new(),
            connections: vec![],
            parser: MysqlLog::default(),
            stats: DecodeStats::default(),
        }
    }

    pub fn inject_packet(&mut self, packet: &CapturedPacket) {
        self.stats.packets += 1;
        if !packet.touches_port(self.mysql_port) || packet.tcp_payload.is_empty() {
            self.stats.skipped_packets += 1;
            return;
        }

        let direction = packet.direction(self.mysql_port);
        let key = ConnectionKey::new(packet, direction);

        let mut frames = split(&packet.tcp_payload);
        for frame in frames.by_ref() {
            self.stats.frames += 1;
            let message = self.parser.parse_payload(frame.payload, direction);
            let connection = self.connection_mut(key);
            connection.frame_count += 1;
            let Some(message) = message else {
                continue;
            };
            match message {
                MysqlMessage::Command(_) => self.stats.commands += 1,
                MysqlMessage::Response(_) => self.stats.responses += 1,
            }
            self.connection_mut(key).events.push(DecodedEvent {
                timestamp: packet.timestamp,
                direction,
                connection_key: key,
                message,
            });
        }

        let remaining = frames.remaining();
        if remaining > 0 {
            debug!(
                "{} {}: dropped {} trailing bytes of {} byte payload",
                key,
                direction,
                remaining,
                packet.tcp_payload.len()
            );
            self.stats.dropped_bytes += remaining as u64;
        }
    }

    fn connection_mut(&mut self, key: ConnectionKey) -> &mut MysqlConnection {
        let connections = &mut self.connections;
        let index = *self.index.entry(key).or_insert_with(|| {
            connections.push(MysqlConnection::new(key));
            connections.len() - 1
        });
        &mut self.connections[index]
    }

    pub fn get(&self, key: &ConnectionKey) -> Option<&MysqlConnection> {
        self.index.get(key).map(|i| &self.connections[*i])
    }

    pub fn connections(&self) -> &[MysqlConnection] {
        &self.connections
    }

    pub fn total_frames(&self) -> usize {
        self.connections.iter().map(|c| c.frame_count).sum()
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    pub fn perf_stats(&self) -> MysqlPerfStats {
        self.parser.perf_stats()
    }

    pub fn mysql_port(&self) -> u16 {
        self.mysql_port
    }

    pub fn into_connections(self) -> Vec<MysqlConnection> {
        self.connections
    }
}
