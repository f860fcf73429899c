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

use chrono::{Local, TimeZone, Utc};
use serde::Serialize;

use crate::{
    common::flow::ConnectionKey,
    config::ReportFormat,
    flow_generator::{DecodedEvent, MysqlConnection},
};

const BANNER_WIDTH: usize = 80;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const MICROS_PER_SECOND: i64 = 1_000_000;

pub struct Reporter {
    format: ReportFormat,
    utc: bool,
}

impl Reporter {
    pub fn new(format: ReportFormat, utc: bool) -> Self {
        Self { format, utc }
    }

    pub fn render(&self, connections: &[MysqlConnection]) -> serde_json::Result<String> {
        match self.format {
            ReportFormat::Text => Ok(self.render_text(connections)),
            ReportFormat::Json => self.render_json(connections),
        }
    }

    pub fn render_text(&self, connections: &[MysqlConnection]) -> String {
        let banner = "=".repeat(BANNER_WIDTH);
        let total_frames: usize = connections.iter().map(|c| c.frame_count).sum();

        let mut lines = vec![
            banner.clone(),
            "MySQL Packet Analysis Report".to_owned(),
            banner.clone(),
            format!("\nTotal connections: {}", connections.len()),
            format!("Total MySQL packets: {}", total_frames),
        ];
        for conn in connections {
            lines.push(format!("\n{}", banner));
            lines.push(format!("Connection: {}", conn.key));
            lines.push(format!("Packets: {}", conn.frame_count));
            lines.push(banner.clone());
            for event in conn.events.iter() {
                lines.push(self.format_event(event));
            }
        }
        lines.join("\n")
    }

    fn format_event(&self, event: &DecodedEvent) -> String {
        format!(
            "\n[{}] {}\n{}",
            format_timestamp(event.timestamp, self.utc),
            event.direction,
            event.message
        )
    }

    pub fn render_json(&self, connections: &[MysqlConnection]) -> serde_json::Result<String> {
        let report = JsonReport {
            total_connections: connections.len(),
            total_frames: connections.iter().map(|c| c.frame_count).sum(),
            connections: connections
                .iter()
                .map(|c| JsonConnection {
                    key: c.key,
                    frame_count: c.frame_count,
                    events: c
                        .events
                        .iter()
                        .map(|e| JsonEvent {
                            time: format_timestamp(e.timestamp, self.utc),
                            event: e,
                        })
                        .collect(),
                })
                .collect(),
        };
        serde_json::to_string_pretty(&report)
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    total_connections: usize,
    total_frames: usize,
    connections: Vec<JsonConnection<'a>>,
}

#[derive(Serialize)]
struct JsonConnection<'a> {
    key: ConnectionKey,
    frame_count: usize,
    events: Vec<JsonEvent<'a>>,
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    time: String,
    #[serde(flatten)]
    event: &'a DecodedEvent,
}

/// Renders seconds since the epoch with microsecond precision.
pub fn format_timestamp(timestamp: f64, utc: bool) -> String {
    let micros = (timestamp * MICROS_PER_SECOND as f64).round() as i64;
    let secs = micros.div_euclid(MICROS_PER_SECOND);
    let nanos = (micros.rem_euclid(MICROS_PER_SECOND) * 1000) as u32;
    let formatted = if utc {
        Utc.timestamp_opt(secs, nanos)
            .single()
            .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
    } else {
        Local
            .timestamp_opt(secs, nanos)
            .earliest()
            .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
    };
    formatted.unwrap_or_else(|| format!("{:.6}", timestamp))
}
