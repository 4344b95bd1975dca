//! Human readable time periods and frequencies

use std::time::Duration;

use toml::Value;

const TIME_UNITS: &[(&str, u64)] = &[
    ("us", 1),
    ("ms", 1_000),
    ("s", 1_000_000),
    ("min", 60_000_000),
    ("h", 3_600_000_000),
    ("d", 86_400_000_000),
];

const FREQUENCY_UNITS: &[(&str, u64)] = &[("hz", 1), ("khz", 1_000), ("mhz", 1_000_000)];

/// Parse a time period, bare integers are milliseconds
pub fn parse_time_period(raw: &Value) -> Result<Duration, String> {
    match raw {
        Value::Integer(ms) => {
            let ms = u64::try_from(*ms).map_err(|_| "time period must not be negative".to_string())?;
            Ok(Duration::from_millis(ms))
        }
        Value::String(s) => {
            let micros = scaled(s, TIME_UNITS, "time")?;
            Ok(Duration::from_micros(micros))
        }
        other => Err(format!("expected a time period, got {}", other)),
    }
}

/// Parse a time period that must be a whole number of milliseconds
pub fn parse_time_period_ms(raw: &Value) -> Result<Duration, String> {
    let period = parse_time_period(raw)?;
    if period.subsec_micros() % 1_000 != 0 {
        return Err("Maximum precision is milliseconds".to_string());
    }
    Ok(period)
}

/// Parse a frequency in Hz, bare integers are Hz
pub fn parse_frequency(raw: &Value) -> Result<u32, String> {
    let hz = match raw {
        Value::Integer(hz) => {
            u64::try_from(*hz).map_err(|_| "frequency must not be negative".to_string())?
        }
        Value::String(s) => scaled(&s.to_lowercase(), FREQUENCY_UNITS, "frequency")?,
        other => return Err(format!("expected a frequency, got {}", other)),
    };
    u32::try_from(hz).map_err(|_| format!("frequency {} Hz is out of range", hz))
}

/// Human readable rendering of a period, as used in config dumps
pub fn format_period(period: Duration) -> String {
    let ms = period.as_millis();
    if ms == 0 {
        format!("{}us", period.as_micros())
    } else if ms % 1_000 == 0 {
        format!("{}s", ms / 1_000)
    } else {
        format!("{}ms", ms)
    }
}

// Splits "<number><unit>" and multiplies by the unit scale, rounding to the base unit.
fn scaled(text: &str, units: &[(&str, u64)], what: &str) -> Result<u64, String> {
    let text = text.trim();
    let split = text
        .find(|c: char| c.is_ascii_alphabetic())
        .ok_or_else(|| format!("Don't know what '{}' means as it has no {} unit", text, what))?;
    let (number, unit) = text.split_at(split);
    let number = number.trim();
    let scale = units
        .iter()
        .find(|(name, _)| *name == unit.trim())
        .map(|(_, scale)| *scale)
        .ok_or_else(|| {
            let names: Vec<_> = units.iter().map(|(name, _)| *name).collect();
            format!(
                "unknown {} unit '{}', expected one of {}",
                what,
                unit,
                names.join(", ")
            )
        })?;
    let value: f64 = number
        .parse()
        .map_err(|_| format!("invalid {} '{}'", what, text))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{} must not be negative", what));
    }
    let total = value * scale as f64;
    if total > u64::MAX as f64 {
        return Err(format!("{} '{}' is too large", what, text));
    }
    Ok(total.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> Value {
        Value::String(text.to_string())
    }

    #[test]
    fn test_time_units() {
        assert_eq!(parse_time_period(&s("200ms")).unwrap(), Duration::from_millis(200));
        assert_eq!(parse_time_period(&s("1s")).unwrap(), Duration::from_secs(1));
        assert_eq!(parse_time_period(&s("0.5s")).unwrap(), Duration::from_millis(500));
        assert_eq!(parse_time_period(&s("2min")).unwrap(), Duration::from_secs(120));
        assert_eq!(parse_time_period(&s("10 us")).unwrap(), Duration::from_micros(10));
        assert_eq!(
            parse_time_period(&Value::Integer(15)).unwrap(),
            Duration::from_millis(15)
        );
    }

    #[test]
    fn test_time_rejects_garbage() {
        assert!(parse_time_period(&s("200")).unwrap_err().contains("no time unit"));
        assert!(parse_time_period(&s("200 fortnights")).is_err());
        assert!(parse_time_period(&s("-5ms")).is_err());
        assert!(parse_time_period(&Value::Integer(-5)).is_err());
        assert!(parse_time_period(&Value::Boolean(true)).is_err());
    }

    #[test]
    fn test_millisecond_precision() {
        assert!(parse_time_period_ms(&s("1500us")).is_err());
        assert_eq!(
            parse_time_period_ms(&s("2000us")).unwrap(),
            Duration::from_millis(2)
        );
    }

    #[test]
    fn test_frequency() {
        assert_eq!(parse_frequency(&s("2MHz")).unwrap(), 2_000_000);
        assert_eq!(parse_frequency(&s("200kHz")).unwrap(), 200_000);
        assert_eq!(parse_frequency(&Value::Integer(8_000_000)).unwrap(), 8_000_000);
        assert!(parse_frequency(&s("5GHz")).is_err());
    }

    #[test]
    fn test_format_period() {
        assert_eq!(format_period(Duration::from_secs(1)), "1s");
        assert_eq!(format_period(Duration::from_millis(250)), "250ms");
        assert_eq!(format_period(Duration::from_micros(10)), "10us");
    }
}
