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

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use ::mysql_pcap_parser::{
    config::{Config, ReportFormat},
    parse_pcap_file,
    report::Reporter,
    utils::logger,
};

#[derive(Parser)]
#[clap(version, about = "Rebuild MySQL commands and responses from a tcpdump capture")]
struct Opts {
    /// Capture file, pcap or pcapng
    pcap_file: PathBuf,

    /// Write the report to this file instead of stdout
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// MySQL server port, overrides the config file
    #[clap(short, long)]
    port: Option<u16>,

    /// Specify config file location
    #[clap(short = 'f', long)]
    config_file: Option<PathBuf>,

    /// Report format, overrides the config file
    #[clap(long, value_enum)]
    format: Option<ReportFormat>,

    /// Render timestamps in UTC
    #[clap(long)]
    utc: bool,
}

fn main() -> Result<()> {
    let opts = Opts::parse();

    let mut config = match opts.config_file.as_ref() {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(port) = opts.port {
        config.mysql_port = port;
    }
    if let Some(format) = opts.format {
        config.output_format = format;
    }
    config.utc_timestamps |= opts.utc;
    config.validate()?;

    let _logger = logger::init(&config)?;

    let session_map = parse_pcap_file(&opts.pcap_file, config.mysql_port)
        .with_context(|| format!("read {}", opts.pcap_file.display()))?;
    let connections = session_map.into_connections();
    let report =
        Reporter::new(config.output_format, config.utc_timestamps).render(&connections)?;

    match opts.output {
        Some(path) => {
            fs::write(&path, report).with_context(|| format!("write {}", path.display()))?;
            info!("report saved to {}", path.display());
        }
        None => println!("{}", report),
    }

    Ok(())
}
