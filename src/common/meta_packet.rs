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

use std::net::IpAddr;

use super::flow::PacketDirection;

/// One captured TCP segment, reduced to the fields the MySQL decoder needs.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedPacket {
    // seconds since unix epoch
    pub timestamp: f64,
    pub src_ip: IpAddr,
    pub src_port: u16,
    pub dst_ip: IpAddr,
    pub dst_port: u16,
    pub tcp_payload: Vec<u8>,
}

impl CapturedPacket {
    pub fn touches_port(&self, port: u16) -> bool {
        self.src_port == port || self.dst_port == port
    }

    pub fn direction(&self, server_port: u16) -> PacketDirection {
        if self.dst_port == server_port {
            PacketDirection::ClientToServer
        } else {
            PacketDirection::ServerToClient
        }
    }
}
