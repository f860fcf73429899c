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
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::common::DEFAULT_MYSQL_PORT;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("mysql-port must not be 0")]
    MysqlPortInvalid,
    #[error("yaml config invalid: {0}")]
    YamlConfigInvalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Text,
    Json,
}

impl Default for ReportFormat {
    fn default() -> Self {
        ReportFormat::Text
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub mysql_port: u16,
    #[serde(with = "LevelDef")]
    pub log_level: log::Level,
    // empty for stderr only
    pub log_file: String,
    pub output_format: ReportFormat,
    pub utc_timestamps: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mysql_port: DEFAULT_MYSQL_PORT,
            log_level: log::Level::Info,
            log_file: String::new(),
            output_format: ReportFormat::Text,
            utc_timestamps: false,
        }
    }
}

impl Config {
    pub fn load_from_file<T: AsRef<Path>>(path: T) -> Result<Self, ConfigError> {
        let contents =
            fs::read_to_string(path).map_err(|e| ConfigError::YamlConfigInvalid(e.to_string()))?;
        Self::load(&contents)
    }

    pub fn load<C: AsRef<str>>(contents: C) -> Result<Self, ConfigError> {
        let contents = contents.as_ref();
        let cfg = if contents.trim().is_empty() {
            // parsing empty string leads to EOF error
            Self::default()
        } else {
            serde_yaml::from_str(contents)
                .map_err(|e| ConfigError::YamlConfigInvalid(e.to_string()))?
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mysql_port == 0 {
            return Err(ConfigError::MysqlPortInvalid);
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(remote = "log::Level", rename_all = "kebab-case")]
enum LevelDef {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_config_is_default() {
        assert_eq!(Config::load("").unwrap(), Config::default());
        assert_eq!(Config::load("\n  \n").unwrap().mysql_port, 3306);
    }

    #[test]
    fn read_yaml() {
        let yaml = r#"
mysql-port: 3307
log-level: debug
log-file: /tmp/mysql-pcap-parser.log
output-format: json
utc-timestamps: true
"#;
        let c = Config::load(yaml).unwrap();
        assert_eq!(c.mysql_port, 3307);
        assert_eq!(c.log_level, log::Level::Debug);
        assert_eq!(c.log_file, "/tmp/mysql-pcap-parser.log");
        assert_eq!(c.output_format, ReportFormat::Json);
        assert!(c.utc_timestamps);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let c = Config::load("output-format: json").unwrap();
        assert_eq!(c.mysql_port, DEFAULT_MYSQL_PORT);
        assert_eq!(c.log_level, log::Level::Info);
        assert_eq!(c.output_format, ReportFormat::Json);
    }

    #[test]
    fn invalid_yaml() {
        assert!(matches!(
            Config::load("mysql-port: [1, 2]"),
            Err(ConfigError::YamlConfigInvalid(_))
        ));
        assert!(matches!(
            Config::load("log-level: loud"),
            Err(ConfigError::YamlConfigInvalid(_))
        ));
        assert!(matches!(
            Config::load("mysql-port: 0"),
            Err(ConfigError::MysqlPortInvalid)
        ));
    }

    #[test]
    fn read_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "mysql-port: 13306").unwrap();
        let c = Config::load_from_file(file.path()).unwrap();
        assert_eq!(c.mysql_port, 13306);

        assert!(Config::load_from_file("/nonexistent/mysql-pcap-parser.yaml").is_err());
    }
}
