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

mod link;
mod reader;

pub use link::decode_packet;
pub use reader::PcapFileSource;

use crate::{common::meta_packet::CapturedPacket, error::Result};

/// An ordered supply of captured TCP segments.
pub trait PacketSource {
    /// `Ok(None)` marks the end of the capture.
    fn next_packet(&mut self) -> Result<Option<CapturedPacket>>;
}

impl<S: PacketSource + ?Sized> PacketSource for Box<S> {
    fn next_packet(&mut self) -> Result<Option<CapturedPacket>> {
        (**self).next_packet()
    }
}
