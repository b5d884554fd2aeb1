//! Command-line interface for thermometer-bridge.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::net::IpAddr;
use std::path::PathBuf;

use crate::sensor::SamplingRate;

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Host address to bind to, if given on the command line.
    pub host: Option<IpAddr>,
    /// Port to listen on, if given on the command line.
    pub port: Option<u16>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Start timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Sensor sampling rate.
    pub rate: Option<SamplingRate>,
    /// Simulate a device with no ambient temperature sensor.
    pub no_sensor: bool,
    /// Fail a waiting caller when a newer start replaces it.
    pub fail_superseded: bool,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('H') | Long("host") => {
                let value: String = parser.value()?.parse()?;
                result.host = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("host", value))?,
                );
            }
            Short('p') | Long("port") => {
                let value: String = parser.value()?.parse()?;
                result.port = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("port", value))?,
                );
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Short('t') | Long("timeout-ms") => {
                let value: String = parser.value()?.parse()?;
                let ms: u64 = value
                    .parse()
                    .map_err(|_| ArgsError::InvalidValue("timeout-ms", value.clone()))?;
                if ms == 0 {
                    return Err(ArgsError::InvalidValue("timeout-ms", value));
                }
                result.timeout_ms = Some(ms);
            }
            Short('r') | Long("rate") => {
                let value: String = parser.value()?.parse()?;
                result.rate = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("rate", value))?,
                );
            }
            Long("no-sensor") => {
                result.no_sensor = true;
            }
            Long("fail-superseded") => {
                result.fail_superseded = true;
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"thermometer-bridge {version}
Ambient temperature sensor bridge for web-view hosted applications

USAGE:
    thermometer-bridge [OPTIONS]

OPTIONS:
    -H, --host <ADDR>        Host address to bind [default: 127.0.0.1]
    -p, --port <PORT>        Port to listen on [default: 3000]
    -c, --config <FILE>      Path to configuration file (JSON)
    -l, --log-level <LVL>    Log level (error, warn, info, debug, trace)
    -t, --timeout-ms <MS>    Start timeout in milliseconds [default: 2000]
    -r, --rate <RATE>        Sampling rate: fastest, game, ui, normal [default: ui]
        --no-sensor          Simulate a device without a thermometer
        --fail-superseded    Fail a waiting caller when a newer start replaces it
    -h, --help               Print help
    -V, --version            Print version

ENVIRONMENT VARIABLES:
    THERMOMETER_BRIDGE_HOST              Host address (overrides config)
    THERMOMETER_BRIDGE_PORT              Port number (overrides config)
    THERMOMETER_BRIDGE_LOG_LEVEL         Log level (overrides config)
    THERMOMETER_BRIDGE_START_TIMEOUT_MS  Start timeout (overrides config)
    RUST_LOG                             Alternative log level setting

EXAMPLES:
    # Start with defaults (localhost:3000, simulated sensor)
    thermometer-bridge

    # Start on all interfaces with a slower sampling rate
    thermometer-bridge -H 0.0.0.0 -p 8080 --rate normal

    # Start with config file
    thermometer-bridge -c /etc/thermometer-bridge/config.json
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("thermometer-bridge {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(args: &[&str]) -> Vec<OsString> {
        std::iter::once("thermometer-bridge")
            .chain(args.iter().copied())
            .map(OsString::from)
            .collect()
    }

    #[test]
    fn test_default_args() {
        let result = parse_args_from(args(&[])).unwrap();
        assert!(result.host.is_none());
        assert!(result.port.is_none());
        assert!(result.timeout_ms.is_none());
        assert!(!result.no_sensor);
        assert!(!result.fail_superseded);
    }

    #[test]
    fn test_host_port() {
        let result = parse_args_from(args(&["-H", "0.0.0.0", "-p", "8080"])).unwrap();
        assert_eq!(result.host, Some(IpAddr::from([0, 0, 0, 0])));
        assert_eq!(result.port, Some(8080));
    }

    #[test]
    fn test_timeout() {
        let result = parse_args_from(args(&["--timeout-ms", "1500"])).unwrap();
        assert_eq!(result.timeout_ms, Some(1500));

        assert!(parse_args_from(args(&["-t", "0"])).is_err());
        assert!(parse_args_from(args(&["-t", "soon"])).is_err());
    }

    #[test]
    fn test_rate() {
        let result = parse_args_from(args(&["-r", "game"])).unwrap();
        assert_eq!(result.rate, Some(SamplingRate::Game));
        assert!(parse_args_from(args(&["--rate", "ludicrous"])).is_err());
    }

    #[test]
    fn test_sensor_flags() {
        let result = parse_args_from(args(&["--no-sensor", "--fail-superseded"])).unwrap();
        assert!(result.no_sensor);
        assert!(result.fail_superseded);
    }

    #[test]
    fn test_help_and_version_flags() {
        assert!(parse_args_from(args(&["-h"])).unwrap().help);
        assert!(parse_args_from(args(&["--help"])).unwrap().help);
        assert!(parse_args_from(args(&["-V"])).unwrap().version);
        assert!(parse_args_from(args(&["--version"])).unwrap().version);
    }

    #[test]
    fn test_config_and_log_level() {
        let result = parse_args_from(args(&["-c", "/etc/bridge.json", "-l", "debug"])).unwrap();
        assert_eq!(result.config, Some(PathBuf::from("/etc/bridge.json")));
        assert_eq!(result.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_invalid_values() {
        assert!(parse_args_from(args(&["-p", "invalid"])).is_err());
        assert!(parse_args_from(args(&["-H", "not-an-ip"])).is_err());
        assert!(parse_args_from(args(&["stray"])).is_err());
        assert!(parse_args_from(args(&["--unknown"])).is_err());
    }
}
