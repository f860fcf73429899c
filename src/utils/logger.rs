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

use flexi_logger::{colored_opt_format, Duplicate, FileSpec, Logger, LoggerHandle};

use crate::{config::Config, error::Result};

/// Starts the global logger. `RUST_LOG` takes precedence over the configured
/// level. The handle must be kept alive until the program exits.
pub fn init(config: &Config) -> Result<LoggerHandle> {
    let level = config.log_level.as_str().to_lowercase();
    let logger = Logger::try_with_env_or_str(level)?.format(colored_opt_format);
    let logger = if config.log_file.is_empty() {
        logger.log_to_stderr()
    } else {
        logger
            .log_to_file(FileSpec::try_from(&config.log_file)?)
            .append()
            .duplicate_to_stderr(Duplicate::Warn)
    };
    Ok(logger.start()?)
}
