// Logging setup
//
// `log` facade everywhere, `env_logger` as the backend. The configured level
// is the default; RUST_LOG still wins when set.

use env_logger::{Builder, Target};
use log::LevelFilter;
use std::fs::OpenOptions;
use std::io::{self, Write};

use crate::config::DebugConfig;

/// Initialize logging, optionally redirecting output to the configured file.
pub fn init(config: &DebugConfig) {
    let mut builder = Builder::new();
    builder.filter_level(parse_level(&config.log_level));
    builder.parse_default_env();

    let mut file_error = None;
    if config.log_to_file {
        match OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&config.log_file)
        {
            Ok(mut file) => {
                if let Err(e) = write_header(&mut file) {
                    file_error = Some(format!(
                        "Failed to write log file header to {}: {}",
                        config.log_file, e
                    ));
                }
                builder.target(Target::Pipe(Box::new(file)));
            }
            Err(e) => {
                file_error = Some(format!("Failed to open log file {}: {}", config.log_file, e));
            }
        }
    }

    if builder.try_init().is_err() {
        return;
    }

    if let Some(message) = file_error {
        log::warn!("{}", message);
    }
}

fn write_header(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "=== Ember Log ===")?;
    writeln!(out, "Started: {:?}", std::time::SystemTime::now())?;
    writeln!(out)?;
    out.flush()
}

/// Parse a level name, falling back to `info` for anything unrecognized.
pub fn parse_level(level: &str) -> LevelFilter {
    level.trim().parse().unwrap_or(LevelFilter::Info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_level_accepts_any_case() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level("WARN"), LevelFilter::Warn);
        assert_eq!(parse_level(" off "), LevelFilter::Off);
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "no space left"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn header_starts_the_log() {
        let mut out = Vec::new();
        write_header(&mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("=== Ember Log ===\nStarted: "));
        assert!(text.ends_with("\n\n"));
    }

    #[test]
    fn header_write_failure_is_reported() {
        let err = write_header(&mut FullDisk).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }

    #[test]
    fn parse_level_falls_back_to_info() {
        assert_eq!(parse_level("loud"), LevelFilter::Info);
        assert_eq!(parse_level(""), LevelFilter::Info);
    }
}
