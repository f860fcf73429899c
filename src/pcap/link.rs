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

use pcap_parser::Linktype;
use pnet::packet::{
    ethernet::{EtherType, EtherTypes, EthernetPacket},
    ip::IpNextHeaderProtocols,
    ipv4::Ipv4Packet,
    ipv6::Ipv6Packet,
    tcp::TcpPacket,
    vlan::VlanPacket,
    Packet,
};

use public::bytes::read_u16_be;

use crate::common::meta_packet::CapturedPacket;

const SLL_HEADER_LEN: usize = 16;
const SLL_PROTOCOL_OFFSET: usize = 14;
const NULL_HEADER_LEN: usize = 4;
const IPV6_HEADER_LEN: usize = 40;
const TCP_MIN_HEADER_LEN: usize = 20;

pub fn is_supported(linktype: Linktype) -> bool {
    matches!(
        linktype,
        Linktype::ETHERNET
            | Linktype::LINUX_SLL
            | Linktype::RAW
            | Linktype::IPV4
            | Linktype::IPV6
            | Linktype::NULL
            | Linktype::LOOP
    )
}

/// Extracts the TCP segment of one link layer frame. Anything that is not
/// TCP over IPv4 or IPv6 yields `None`.
pub fn decode_packet(linktype: Linktype, data: &[u8], timestamp: f64) -> Option<CapturedPacket> {
    let ip = match linktype {
        Linktype::ETHERNET => ethernet(data)?,
        Linktype::LINUX_SLL => {
            if data.len() < SLL_HEADER_LEN {
                return None;
            }
            let ethertype = EtherType::new(read_u16_be(&data[SLL_PROTOCOL_OFFSET..]));
            by_ethertype(ethertype, &data[SLL_HEADER_LEN..])?
        }
        Linktype::RAW | Linktype::IPV4 | Linktype::IPV6 => by_version(data)?,
        // address family is in host byte order, the version nibble is simpler
        Linktype::NULL | Linktype::LOOP => by_version(data.get(NULL_HEADER_LEN..)?)?,
        _ => return None,
    };
    tcp(ip, timestamp)
}

struct IpPayload<'a> {
    src: IpAddr,
    dst: IpAddr,
    payload: &'a [u8],
}

fn ethernet(data: &[u8]) -> Option<IpPayload<'_>> {
    let eth = EthernetPacket::new(data)?;
    let offset = data.len() - eth.payload().len();
    let ethertype = eth.get_ethertype();
    if ethertype == EtherTypes::Vlan {
        let vlan = VlanPacket::new(&data[offset..])?;
        let inner = offset + (data.len() - offset - vlan.payload().len());
        return by_ethertype(vlan.get_ethertype(), &data[inner..]);
    }
    by_ethertype(ethertype, &data[offset..])
}

fn by_ethertype(ethertype: EtherType, data: &[u8]) -> Option<IpPayload<'_>> {
    match ethertype {
        EtherTypes::Ipv4 => ipv4(data),
        EtherTypes::Ipv6 => ipv6(data),
        _ => None,
    }
}

fn by_version(data: &[u8]) -> Option<IpPayload<'_>> {
    match data.first()? >> 4 {
        4 => ipv4(data),
        6 => ipv6(data),
        _ => None,
    }
}

fn ipv4(data: &[u8]) -> Option<IpPayload<'_>> {
    let ip = Ipv4Packet::new(data)?;
    if ip.get_next_level_protocol() != IpNextHeaderProtocols::Tcp {
        return None;
    }
    let header_len = ip.get_header_length() as usize * 4;
    // total length 0 is seen with TSO captures
    let end = match ip.get_total_length() as usize {
        0 => data.len(),
        n => n.min(data.len()),
    };
    if header_len > end {
        return None;
    }
    Some(IpPayload {
        src: ip.get_source().into(),
        dst: ip.get_destination().into(),
        payload: &data[header_len..end],
    })
}

// extension headers are not walked
fn ipv6(data: &[u8]) -> Option<IpPayload<'_>> {
    let ip = Ipv6Packet::new(data)?;
    if ip.get_next_header() != IpNextHeaderProtocols::Tcp {
        return None;
    }
    let end = match ip.get_payload_length() as usize {
        0 => data.len(),
        n => (IPV6_HEADER_LEN + n).min(data.len()),
    };
    Some(IpPayload {
        src: ip.get_source().into(),
        dst: ip.get_destination().into(),
        payload: &data[IPV6_HEADER_LEN..end],
    })
}

fn tcp(ip: IpPayload<'_>, timestamp: f64) -> Option<CapturedPacket> {
    let segment = TcpPacket::new(ip.payload)?;
    let data_offset = segment.get_data_offset() as usize * 4;
    if data_offset < TCP_MIN_HEADER_LEN {
        return None;
    }
    let tcp_payload = ip.payload.get(data_offset..)?;
    Some(CapturedPacket {
        timestamp,
        src_ip: ip.src,
        src_port: segment.get_source(),
        dst_ip: ip.dst,
        dst_port: segment.get_destination(),
        tcp_payload: tcp_payload.to_vec(),
    })
}
