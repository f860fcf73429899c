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

use std::path::Path;

use log::{debug, info, warn};

use crate::{
    error::Result,
    flow_generator::SessionMap,
    pcap::{PacketSource, PcapFileSource},
};

/// Drains a packet source into a [`SessionMap`].
pub struct Analyzer<S> {
    source: S,
    session_map: SessionMap,
}

impl<S: PacketSource> Analyzer<S> {
    pub fn new(source: S, mysql_port: u16) -> Self {
        Self {
            source,
            session_map: SessionMap::new(mysql_port),
        }
    }

    /// Errors after the first packet only cut the capture short, everything
    /// decoded so far is kept.
    pub fn run(mut self) -> SessionMap {
        loop {
            match self.source.next_packet() {
                Ok(Some(packet)) => self.session_map.inject_packet(&packet),
                Ok(None) => break,
                Err(e) => {
                    warn!(
                        "stop reading capture after {} packets: {}",
                        self.session_map.stats().packets,
                        e
                    );
                    break;
                }
            }
        }
        info!(
            "decoded {} connections on port {}: {}",
            self.session_map.connections().len(),
            self.session_map.mysql_port(),
            self.session_map.stats()
        );
        debug!("mysql perf stats: {:?}", self.session_map.perf_stats());
        self.session_map
    }
}

/// Opens a capture file and decodes all MySQL traffic on `mysql_port`.
pub fn parse_pcap_file<P: AsRef<Path>>(path: P, mysql_port: u16) -> Result<SessionMap> {
    let path = path.as_ref();
    info!("reading {}", path.display());
    let source = PcapFileSource::open(path)?;
    Ok(Analyzer::new(source, mysql_port).run())
}
