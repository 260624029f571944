use std::{fmt, str::FromStr};

/// How each log event is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Full,
    Pretty,
    Json,
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            _ => Err(format!(
                "Invalid log format '{s}'. Valid options: full, pretty, json, compact"
            )),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
            Self::Compact => write!(f, "compact"),
        }
    }
}

/// Where log events are written.
///
/// Defaults to stderr so logs never mix with converted output written to stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogDestination {
    Stdout,
    #[default]
    Stderr,
}

impl FromStr for LogDestination {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stdout" => Ok(Self::Stdout),
            "stderr" => Ok(Self::Stderr),
            _ => Err(format!(
                "Invalid log destination '{s}'. Valid options: stdout, stderr"
            )),
        }
    }
}

impl fmt::Display for LogDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn log_format_round_trips_through_text() {
        for format in [
            LogFormat::Full,
            LogFormat::Pretty,
            LogFormat::Json,
            LogFormat::Compact,
        ] {
            assert_eq!(format.to_string().parse::<LogFormat>(), Ok(format));
        }
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
    }

    #[test]
    fn unknown_values_list_the_options() {
        let err = "logfmt".parse::<LogFormat>().unwrap_err();
        assert_eq!(
            err,
            "Invalid log format 'logfmt'. Valid options: full, pretty, json, compact"
        );

        let err = "file".parse::<LogDestination>().unwrap_err();
        assert_eq!(
            err,
            "Invalid log destination 'file'. Valid options: stdout, stderr"
        );
    }

    #[test]
    fn destination_defaults_to_stderr() {
        assert_eq!(LogDestination::default(), LogDestination::Stderr);
        assert_eq!("Stdout".parse::<LogDestination>(), Ok(LogDestination::Stdout));
    }
}
