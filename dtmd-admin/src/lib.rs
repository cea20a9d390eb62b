//! Command-line configuration and logging setup for the daemon binary.
//! Kept deliberately small: a handful of `--flag value` pairs, parsed by
//! hand rather than pulled in through an argument-parsing crate, and a
//! `tracing-subscriber` setup that reads `RUST_LOG` the way the rest of
//! the workspace's tests already do via `test-log`.

use dtmd_base::{err, Error};

/// Runtime configuration for one daemon process.
#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_connections: usize,
    pub buffer_size: usize,
    /// Upper bound on concurrently in-flight channels per connection.
    /// Bounded by the wire protocol's 256-slot occupancy bitmap; the
    /// coordinator's `GlobalXid` table capacity is derived from this
    /// times `max_connections`.
    pub max_channels: u32,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: 6543,
            max_connections: 1024,
            buffer_size: 64 * 1024,
            max_channels: 256,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// The `GlobalXid` table's capacity: enough room for every
    /// connection to have every one of its channels occupied by a
    /// distinct transaction at once.
    pub fn coordinator_capacity(&self) -> usize {
        self.max_connections.saturating_mul(self.max_channels as usize)
    }

    /// Parses `--host HOST --port PORT --max-connections N
    /// --buffer-size N --max-channels N --log-level LEVEL`. Unknown
    /// flags or a flag missing its value are rejected; anything not
    /// given keeps its default.
    pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Config, Error> {
        let mut config = Config::default();
        let mut iter = args.into_iter();
        while let Some(flag) = iter.next() {
            let value = iter.next().ok_or_else(|| err(format!("flag {flag} is missing its value")))?;
            match flag.as_str() {
                "--host" => config.host = value,
                "--port" => config.port = value.parse().map_err(|_| err(format!("invalid --port value {value}")))?,
                "--max-connections" => {
                    config.max_connections = value.parse().map_err(|_| err(format!("invalid --max-connections value {value}")))?
                }
                "--buffer-size" => {
                    config.buffer_size = value.parse().map_err(|_| err(format!("invalid --buffer-size value {value}")))?
                }
                "--max-channels" => {
                    let parsed: u32 = value.parse().map_err(|_| err(format!("invalid --max-channels value {value}")))?;
                    if parsed == 0 || parsed > u32::from(u8::MAX) + 1 {
                        return Err(err(format!("--max-channels must be between 1 and 256, got {parsed}")));
                    }
                    config.max_channels = parsed;
                }
                "--log-level" => config.log_level = value,
                other => return Err(err(format!("unrecognized flag {other}"))),
            }
        }
        Ok(config)
    }
}

/// Installs a `tracing` subscriber that honors `RUST_LOG` if set, and
/// otherwise filters at `config.log_level`.
pub fn init_logging(config: &Config) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}
