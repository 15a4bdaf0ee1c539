use std::fmt;

use crate::parser::LineParser;
use crate::SdpResult;

/// The `t=` line: start and stop times as NTP timestamps. `0 0` means a
/// permanent session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeActive {
    pub start_time: i64,
    pub stop_time: i64,
}

impl TimeActive {
    pub fn parse(line: &str) -> SdpResult<TimeActive> {
        let mut parser = LineParser::new(line);

        if !parser.skip("t=") {
            return Err("time: expecting 't='".to_string());
        }

        let Some(start_time) = parser.read_int::<i64>() else {
            return Err("time: failed to parse start time as integer".to_string());
        };

        if !parser.skip_char(' ') {
            return Err("time: expecting space after start time".to_string());
        }

        let Some(stop_time) = parser.read_int::<i64>() else {
            return Err("time: failed to parse stop time as integer".to_string());
        };

        Ok(TimeActive { start_time, stop_time })
    }

    pub fn validate(&self) -> SdpResult<()> {
        if self.start_time < 0 {
            return Err("time: start time must be greater than or equal to 0".to_string());
        }
        if self.stop_time < 0 {
            return Err("time: stop time must be greater than or equal to 0".to_string());
        }
        Ok(())
    }
}

impl fmt::Display for TimeActive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={} {}", self.start_time, self.stop_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_integers() {
        let time = TimeActive::parse("t=0 0").unwrap();
        assert_eq!(time, TimeActive { start_time: 0, stop_time: 0 });
        assert!(time.validate().is_ok());
        assert_eq!(time.to_string(), "t=0 0");
    }

    #[test]
    fn negative_values_fail_validation() {
        let time = TimeActive::parse("t=-1 0").unwrap();
        assert!(time.validate().is_err());
    }

    #[test]
    fn missing_fields_fail_parsing() {
        assert!(TimeActive::parse("t=0").is_err());
        assert!(TimeActive::parse("t=x 0").is_err());
    }
}
