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

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use serde::{Serialize, Serializer};

use super::meta_packet::CapturedPacket;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketDirection {
    ClientToServer,
    ServerToClient,
}

impl Default for PacketDirection {
    fn default() -> PacketDirection {
        PacketDirection::ClientToServer
    }
}

impl fmt::Display for PacketDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientToServer => write!(f, "Client->Server"),
            Self::ServerToClient => write!(f, "Server->Client"),
        }
    }
}

/// Direction independent identity of one TCP flow, always stored from the
/// client's point of view.
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Clone, Copy)]
pub struct ConnectionKey {
    pub client_ip: IpAddr,
    pub client_port: u16,
    pub server_ip: IpAddr,
    pub server_port: u16,
}

impl ConnectionKey {
    pub fn new(packet: &CapturedPacket, direction: PacketDirection) -> Self {
        match direction {
            PacketDirection::ClientToServer => Self {
                client_ip: packet.src_ip,
                client_port: packet.src_port,
                server_ip: packet.dst_ip,
                server_port: packet.dst_port,
            },
            PacketDirection::ServerToClient => Self {
                client_ip: packet.dst_ip,
                client_port: packet.dst_port,
                server_ip: packet.src_ip,
                server_port: packet.src_port,
            },
        }
    }
}

impl Default for ConnectionKey {
    fn default() -> Self {
        Self {
            client_ip: Ipv4Addr::UNSPECIFIED.into(),
            client_port: 0,
            server_ip: Ipv4Addr::UNSPECIFIED.into(),
            server_port: 0,
        }
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ipv6 addresses are bracketed so the port stays unambiguous
        match (self.client_ip, self.server_ip) {
            (IpAddr::V4(c), IpAddr::V4(s)) => write!(
                f,
                "{}:{} -> {}:{}",
                c, self.client_port, s, self.server_port
            ),
            (c, s) => write!(
                f,
                "[{}]:{} -> [{}]:{}",
                c, self.client_port, s, self.server_port
            ),
        }
    }
}

impl Serialize for ConnectionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(src: &str, sport: u16, dst: &str, dport: u16) -> CapturedPacket {
        CapturedPacket {
            timestamp: 0.0,
            src_ip: src.parse().unwrap(),
            src_port: sport,
            dst_ip: dst.parse().unwrap(),
            dst_port: dport,
            tcp_payload: vec![],
        }
    }

    #[test]
    fn both_directions_share_key() {
        let request = packet("10.0.0.1", 52000, "10.0.0.2", 3306);
        let response = packet("10.0.0.2", 3306, "10.0.0.1", 52000);
        let k1 = ConnectionKey::new(&request, PacketDirection::ClientToServer);
        let k2 = ConnectionKey::new(&response, PacketDirection::ServerToClient);
        assert_eq!(k1, k2);
        assert_eq!(k1.to_string(), "10.0.0.1:52000 -> 10.0.0.2:3306");
    }

    #[test]
    fn ipv6_key_format() {
        let request = packet("::1", 40000, "::1", 3306);
        let key = ConnectionKey::new(&request, PacketDirection::ClientToServer);
        assert_eq!(key.to_string(), "[::1]:40000 -> [::1]:3306");
    }

    #[test]
    fn direction_format() {
        assert_eq!(PacketDirection::ClientToServer.to_string(), "Client->Server");
        assert_eq!(PacketDirection::ServerToClient.to_string(), "Server->Client");
    }
}
