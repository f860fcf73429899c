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

use std::{fs::File, io::Read, path::Path};

use log::{debug, trace, warn};
use pcap_parser::{
    create_reader, pcapng::Block, traits::PcapReaderIterator, Linktype, PcapBlockOwned, PcapError,
};

use super::{link, PacketSource};
use crate::{
    common::meta_packet::CapturedPacket,
    error::{Error, Result},
};

const DEFAULT_BUFFER_SIZE: usize = 1 << 20;

const PCAP_MAGIC_NANOSECOND: u32 = 0xa1b23c4d;
const PCAP_MAGIC_NANOSECOND_SWAPPED: u32 = 0x4d3cb2a1;

const MICROS_PER_SECOND: f64 = 1e6;
const NANOS_PER_SECOND: f64 = 1e9;

#[derive(Debug)]
struct Interface {
    linktype: Linktype,
    units_per_second: f64,
    offset_seconds: f64,
    warned: bool,
}

impl Interface {
    fn new(linktype: Linktype, units_per_second: f64) -> Self {
        Self {
            linktype,
            units_per_second,
            offset_seconds: 0.0,
            warned: false,
        }
    }

    fn from_tsresol(linktype: Linktype, tsresol: u8, tsoffset: i64) -> Self {
        // high bit set means a power of two, else a power of ten
        let units_per_second = if tsresol & 0x80 == 0 {
            10f64.powi(tsresol as i32)
        } else {
            2f64.powi((tsresol & 0x7f) as i32)
        };
        Self {
            offset_seconds: tsoffset as f64,
            ..Self::new(linktype, units_per_second)
        }
    }

    fn decode(&mut self, data: &[u8], timestamp: f64) -> Option<CapturedPacket> {
        if !link::is_supported(self.linktype) {
            if !self.warned {
                warn!("unsupported link type {:?}, packets skipped", self.linktype);
                self.warned = true;
            }
            return None;
        }
        link::decode_packet(self.linktype, data, timestamp)
    }
}

/// Streams TCP segments out of a legacy pcap or pcapng file.
pub struct PcapFileSource {
    reader: Box<dyn PcapReaderIterator>,
    // legacy pcap has a single implicit interface
    interfaces: Vec<Interface>,
    read_block_count: usize,
    read_packet_count: usize,
}

impl PcapFileSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = Self::from_reader(File::open(path)?)?;
        debug!("opened capture {}", path.display());
        Ok(source)
    }

    pub fn from_reader<R: Read + Send + 'static>(input: R) -> Result<Self> {
        let reader = create_reader(DEFAULT_BUFFER_SIZE, input)
            .map_err(|e| Error::PcapParseFailed(format!("{:?}", e)))?;
        Ok(Self {
            reader,
            interfaces: vec![],
            read_block_count: 0,
            read_packet_count: 0,
        })
    }

    pub fn read_packet_count(&self) -> usize {
        self.read_packet_count
    }
}

impl PacketSource for PcapFileSource {
    fn next_packet(&mut self) -> Result<Option<CapturedPacket>> {
        let mut refilled = false;
        loop {
            let (offset, block) = match self.reader.next() {
                Ok((offset, block)) => (offset, block),
                Err(PcapError::Eof) => return Ok(None),
                Err(PcapError::Incomplete(_)) if !refilled => {
                    refilled = true;
                    match self.reader.refill() {
                        Ok(_) => continue,
                        Err(e) => return Err(Error::PcapParseFailed(format!("{:?}", e))),
                    }
                }
                Err(PcapError::UnexpectedEof | PcapError::Incomplete(_)) => {
                    warn!(
                        "capture truncated after {} packets, ignoring the rest",
                        self.read_packet_count
                    );
                    return Ok(None);
                }
                Err(e) => {
                    debug!("failed to parse block #{}: {:?}", self.read_block_count, e);
                    return Err(Error::PcapParseFailed(format!("{:?}", e)));
                }
            };
            refilled = false;
            self.read_block_count += 1;

            let packet = match block {
                PcapBlockOwned::LegacyHeader(header) => {
                    let units_per_second = match header.magic_number {
                        PCAP_MAGIC_NANOSECOND | PCAP_MAGIC_NANOSECOND_SWAPPED => NANOS_PER_SECOND,
                        _ => MICROS_PER_SECOND,
                    };
                    trace!(
                        "legacy pcap, link type {:?}, {} units per second",
                        header.network,
                        units_per_second
                    );
                    self.interfaces = vec![Interface::new(header.network, units_per_second)];
                    None
                }
                PcapBlockOwned::Legacy(block) => {
                    self.read_packet_count += 1;
                    match self.interfaces.first_mut() {
                        Some(interface) => {
                            let timestamp = block.ts_sec as f64
                                + block.ts_usec as f64 / interface.units_per_second;
                            let caplen = (block.caplen as usize).min(block.data.len());
                            interface.decode(&block.data[..caplen], timestamp)
                        }
                        None => {
                            return Err(Error::PcapParseFailed(
                                "packet before pcap header".to_owned(),
                            ))
                        }
                    }
                }
                PcapBlockOwned::NG(Block::SectionHeader(_)) => {
                    // interface ids are scoped to their section
                    self.interfaces.clear();
                    None
                }
                PcapBlockOwned::NG(Block::InterfaceDescription(idb)) => {
                    self.interfaces.push(Interface::from_tsresol(
                        idb.linktype,
                        idb.if_tsresol,
                        idb.if_tsoffset,
                    ));
                    None
                }
                PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => {
                    self.read_packet_count += 1;
                    match self.interfaces.get_mut(epb.if_id as usize) {
                        Some(interface) => {
                            let ticks = ((epb.ts_high as u64) << 32) | epb.ts_low as u64;
                            let timestamp = ticks as f64 / interface.units_per_second
                                + interface.offset_seconds;
                            let caplen = (epb.caplen as usize).min(epb.data.len());
                            interface.decode(&epb.data[..caplen], timestamp)
                        }
                        None => {
                            debug!("packet on unknown interface {}", epb.if_id);
                            None
                        }
                    }
                }
                PcapBlockOwned::NG(Block::SimplePacket(spb)) => {
                    self.read_packet_count += 1;
                    // no timestamp in simple packets
                    match self.interfaces.first_mut() {
                        Some(interface) => {
                            let len = (spb.origlen as usize).min(spb.data.len());
                            interface.decode(&spb.data[..len], 0.0)
                        }
                        None => None,
                    }
                }
                PcapBlockOwned::NG(_) => None,
            };
            self.reader.consume(offset);

            if let Some(packet) = packet {
                return Ok(Some(packet));
            }
        }
    }
}
