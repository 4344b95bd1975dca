//! Pin descriptors and the pin validation collaborator
//!
//! Raw pins come straight from the configuration file and may be written as a bare
//! number (`17`), a string (`"GPIO17"`) or a table:
//!
//! ```toml
//! busy_pin = { number = 4, mode = "pullup", inverted = false }
//! ```

use std::fmt;

use toml::Value;

/// Direction the driver needs from a pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinRole {
    /// Driven by the MCU (DC, RST, CS)
    Output,
    /// Read by the MCU (BUSY)
    Input,
}

impl fmt::Display for PinRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinRole::Output => write!(f, "output"),
            PinRole::Input => write!(f, "input"),
        }
    }
}

/// Electrical mode requested for the pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input,
    Output,
    InputPullup,
    InputPulldown,
    OpenDrain,
}

impl PinMode {
    fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "input" => Some(PinMode::Input),
            "output" => Some(PinMode::Output),
            "pullup" | "input_pullup" => Some(PinMode::InputPullup),
            "pulldown" | "input_pulldown" => Some(PinMode::InputPulldown),
            "open_drain" => Some(PinMode::OpenDrain),
            _ => None,
        }
    }

    fn default_for(role: PinRole) -> Self {
        match role {
            PinRole::Output => PinMode::Output,
            PinRole::Input => PinMode::Input,
        }
    }

    /// Whether the mode can serve `role`
    fn serves(self, role: PinRole) -> bool {
        match role {
            PinRole::Output => matches!(self, PinMode::Output | PinMode::OpenDrain),
            PinRole::Input => !matches!(self, PinMode::Output),
        }
    }
}

/// A validated GPIO pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinDescriptor {
    pub number: u8,
    pub mode: PinMode,
    pub inverted: bool,
}

impl fmt::Display for PinDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPIO{}", self.number)?;
        if self.inverted {
            write!(f, " (inverted)")?;
        }
        Ok(())
    }
}

/// Turns a raw pin value into a descriptor usable for `role`
pub trait PinValidator {
    fn validate(&self, role: PinRole, raw: &Value) -> Result<PinDescriptor, String>;
}

/// GPIO capabilities of an ESP32 (WROOM/WROVER) module
pub struct Esp32Pins;

impl Esp32Pins {
    /// Highest GPIO number
    pub const MAX_GPIO: u8 = 39;
    /// Numbers that do not exist on the chip
    pub const MISSING: [u8; 6] = [20, 24, 28, 29, 30, 31];
    /// Connected to the SPI flash
    pub const FLASH: [u8; 6] = [6, 7, 8, 9, 10, 11];
    /// Input only, no output driver
    pub const INPUT_ONLY: [u8; 6] = [34, 35, 36, 37, 38, 39];
}

impl PinValidator for Esp32Pins {
    fn validate(&self, role: PinRole, raw: &Value) -> Result<PinDescriptor, String> {
        let (number, mode, inverted) = parse_raw_pin(raw)?;
        let mode = mode.unwrap_or(PinMode::default_for(role));

        if number > Self::MAX_GPIO || Self::MISSING.contains(&number) {
            return Err(format!("GPIO{} does not exist", number));
        }
        if Self::FLASH.contains(&number) {
            return Err(format!(
                "GPIO{} is used by the SPI flash and cannot be used",
                number
            ));
        }
        if !mode.serves(role) {
            return Err(format!("pin mode {:?} cannot be used as {}", mode, role));
        }
        if role == PinRole::Output && Self::INPUT_ONLY.contains(&number) {
            return Err(format!("GPIO{} is input only and cannot be used as output", number));
        }
        if matches!(mode, PinMode::InputPullup | PinMode::InputPulldown)
            && Self::INPUT_ONLY.contains(&number)
        {
            return Err(format!("GPIO{} has no internal pull resistors", number));
        }
        Ok(PinDescriptor {
            number,
            mode,
            inverted,
        })
    }
}

fn parse_raw_pin(raw: &Value) -> Result<(u8, Option<PinMode>, bool), String> {
    match raw {
        Value::Integer(_) | Value::String(_) => Ok((parse_number(raw)?, None, false)),
        Value::Table(table) => {
            let number = table
                .get("number")
                .ok_or_else(|| "pin table is missing 'number'".to_string())
                .and_then(parse_number)?;
            let mode = match table.get("mode") {
                None => None,
                Some(Value::String(name)) => Some(
                    PinMode::parse(name).ok_or_else(|| format!("unknown pin mode '{}'", name))?,
                ),
                Some(other) => return Err(format!("pin mode must be a string, got {}", other)),
            };
            let inverted = match table.get("inverted") {
                None => false,
                Some(Value::Boolean(b)) => *b,
                Some(other) => return Err(format!("'inverted' must be a boolean, got {}", other)),
            };
            if let Some(extra) = table
                .keys()
                .find(|k| !matches!(k.as_str(), "number" | "mode" | "inverted"))
            {
                return Err(format!("extra key '{}' not allowed in pin", extra));
            }
            Ok((number, mode, inverted))
        }
        other => Err(format!("expected a pin number, got {}", other)),
    }
}

fn parse_number(raw: &Value) -> Result<u8, String> {
    match raw {
        Value::Integer(n) => u8::try_from(*n).map_err(|_| format!("invalid pin number {}", n)),
        Value::String(s) => {
            let trimmed = s.trim();
            let digits = trimmed
                .strip_prefix("GPIO")
                .or_else(|| trimmed.strip_prefix("gpio"))
                .unwrap_or(trimmed);
            digits
                .parse::<u8>()
                .map_err(|_| format!("invalid pin number '{}'", s))
        }
        other => Err(format!("expected a pin number, got {}", other)),
    }
}
