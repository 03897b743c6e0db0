/////////////////////////////////////////////////////////////////////////////////////
//
// Network contagion model
//
// logging module
//
// console logger for the model run - progress goes to stdout through the log macros
//
////////////////////////////////////////////////////////////////////////////////////

use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::str::FromStr;

// ISO 8601 timestamp, colour coded level, module
const LOG_PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%S)} {h({l})} {t} - {m}{n}";

/// Parses names such as "info" or "TRACE".
pub fn parse_level(level: &str) -> Result<LevelFilter, String> {
    LevelFilter::from_str(level)
        .map_err(|_| format!("unknown log level {} - use off, error, warn, info, debug or trace", level))
}

/// Installs the global console logger. Can only succeed once per process.
pub fn init(level: LevelFilter) -> Result<(), String> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(level))
        .map_err(|e| format!("failed to build log config: {}", e))?;
    log4rs::init_config(config).map_err(|e| format!("failed to install logger: {}", e))?;
    Ok(())
}
