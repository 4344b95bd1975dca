//! Declarative configuration schema
//!
//! A [`Schema`] is an ordered set of options, each with a value domain
//! ([`FieldKind`]) and a presence rule ([`Presence`]). Schemas are built with a
//! builder and merged with [`Schema::extend`], which is how the generic polling,
//! SPI device and display option sets are combined with the panel's own keys.
//!
//! Validation checks every key on its own and collects all failures before
//! returning, so a user sees every broken key in one pass.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::weact_epaper::error::{ConfigError, FieldError};
use crate::weact_epaper::model::{PanelCatalog, PanelModel};
use crate::weact_epaper::pins::{PinDescriptor, PinRole, PinValidator};
use crate::weact_epaper::units;

pub const CONF_ID: &str = "id";
pub const CONF_MODEL: &str = "model";
pub const CONF_DC_PIN: &str = "dc_pin";
pub const CONF_RESET_PIN: &str = "reset_pin";
pub const CONF_BUSY_PIN: &str = "busy_pin";
pub const CONF_FULL_UPDATE_EVERY: &str = "full_update_every";
pub const CONF_RESET_DURATION: &str = "reset_duration";
pub const CONF_UPDATE_INTERVAL: &str = "update_interval";
pub const CONF_SPI_ID: &str = "spi_id";
pub const CONF_CS_PIN: &str = "cs_pin";
pub const CONF_DATA_RATE: &str = "data_rate";
pub const CONF_SPI_MODE: &str = "spi_mode";
pub const CONF_ROTATION: &str = "rotation";
pub const CONF_LAMBDA: &str = "lambda";
pub const CONF_PAGES: &str = "pages";
pub const CONF_AUTO_CLEAR_ENABLED: &str = "auto_clear_enabled";
pub const CONF_SHOW_TEST_CARD: &str = "show_test_card";

/// Display rotation in degrees clockwise
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Rotation {
    #[default]
    Rotate0,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Rotation {
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Rotate0 => 0,
            Rotation::Rotate90 => 90,
            Rotation::Rotate180 => 180,
            Rotation::Rotate270 => 270,
        }
    }

    fn from_degrees(degrees: i64) -> Option<Self> {
        match degrees {
            0 => Some(Rotation::Rotate0),
            90 => Some(Rotation::Rotate90),
            180 => Some(Rotation::Rotate180),
            270 => Some(Rotation::Rotate270),
            _ => None,
        }
    }
}

/// One entry of the `pages` list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageConfig {
    pub id: Option<String>,
    /// Name of the render function drawing this page
    pub lambda: String,
}

/// A value that passed its field check
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Model(PanelModel),
    Pin(PinDescriptor),
    Int(u64),
    Duration(Duration),
    /// `None` means the component never polls
    Interval(Option<Duration>),
    Frequency(u32),
    Str(String),
    Bool(bool),
    Rotation(Rotation),
    Pages(Vec<PageConfig>),
}

/// Value domain of a single key
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// One of the catalog's model keys, case-insensitive
    Model,
    OutputPin,
    InputPin,
    IntRange { min: i64, max: i64 },
    /// Non-negative, millisecond precision, optionally capped
    TimePeriodMs { max: Option<Duration> },
    /// A time period or `never`
    UpdateInterval,
    Frequency,
    /// Identifier usable as a variable name
    Id,
    Lambda,
    Pages,
    Rotation,
    Bool,
}

/// Dependencies the field checks need
pub struct Context<'a> {
    pub pins: &'a dyn PinValidator,
    pub catalog: &'a PanelCatalog,
}

impl FieldKind {
    pub fn validate(&self, raw: &toml::Value, ctx: &Context<'_>) -> Result<Value, String> {
        match self {
            FieldKind::Model => {
                let name = raw
                    .as_str()
                    .ok_or_else(|| format!("expected a model name, got {}", raw))?;
                ctx.catalog.find(name).map(Value::Model).ok_or_else(|| {
                    let options: Vec<_> = ctx
                        .catalog
                        .sorted_keys()
                        .iter()
                        .map(|k| format!("'{}'", k))
                        .collect();
                    format!(
                        "Unknown value '{}', valid options are {}",
                        name,
                        options.join(", ")
                    )
                })
            }
            FieldKind::OutputPin => ctx.pins.validate(PinRole::Output, raw).map(Value::Pin),
            FieldKind::InputPin => ctx.pins.validate(PinRole::Input, raw).map(Value::Pin),
            FieldKind::IntRange { min, max } => {
                let n = parse_int(raw)?;
                if n < *min || n > *max {
                    return Err(format!(
                        "Value {} is out of range, must be in [{}, {}]",
                        n, min, max
                    ));
                }
                Ok(Value::Int(n as u64))
            }
            FieldKind::TimePeriodMs { max } => {
                let period = units::parse_time_period_ms(raw)?;
                match max {
                    Some(max) if period > *max => Err(format!(
                        "{} is larger than the maximum of {}",
                        units::format_period(period),
                        units::format_period(*max)
                    )),
                    _ => Ok(Value::Duration(period)),
                }
            }
            FieldKind::UpdateInterval => match raw.as_str() {
                Some(s) if s.trim().eq_ignore_ascii_case("never") => Ok(Value::Interval(None)),
                _ => units::parse_time_period_ms(raw).map(|p| Value::Interval(Some(p))),
            },
            FieldKind::Frequency => units::parse_frequency(raw).map(Value::Frequency),
            FieldKind::Id => {
                let id = raw
                    .as_str()
                    .ok_or_else(|| format!("expected an identifier, got {}", raw))?;
                validate_id(id).map(|_| Value::Str(id.to_string()))
            }
            FieldKind::Lambda => validate_lambda(raw).map(Value::Str),
            FieldKind::Pages => validate_pages(raw).map(Value::Pages),
            FieldKind::Rotation => {
                let degrees = match raw {
                    toml::Value::String(s) => s
                        .trim()
                        .trim_end_matches('°')
                        .parse::<i64>()
                        .map_err(|_| format!("invalid rotation '{}'", s))?,
                    other => parse_int(other)?,
                };
                Rotation::from_degrees(degrees)
                    .map(Value::Rotation)
                    .ok_or_else(|| {
                        format!(
                            "Unknown value '{}', valid options are '0', '90', '180', '270'",
                            degrees
                        )
                    })
            }
            FieldKind::Bool => raw
                .as_bool()
                .map(Value::Bool)
                .ok_or_else(|| format!("expected a boolean, got {}", raw)),
        }
    }
}

fn parse_int(raw: &toml::Value) -> Result<i64, String> {
    match raw {
        toml::Value::Integer(n) => Ok(*n),
        toml::Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("expected an integer, got '{}'", s)),
        other => Err(format!("expected an integer, got {}", other)),
    }
}

fn validate_id(id: &str) -> Result<(), String> {
    let mut chars = id.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(format!(
            "'{}' is not a valid id, use letters, digits and underscores",
            id
        ));
    }
    Ok(())
}

fn validate_lambda(raw: &toml::Value) -> Result<String, String> {
    match raw.as_str().map(str::trim) {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        Some(_) => Err("lambda must not be empty".to_string()),
        None => Err(format!("expected a lambda, got {}", raw)),
    }
}

fn validate_pages(raw: &toml::Value) -> Result<Vec<PageConfig>, String> {
    let list = raw
        .as_array()
        .ok_or_else(|| format!("expected a list of pages, got {}", raw))?;
    if list.is_empty() {
        return Err("pages must contain at least one page".to_string());
    }
    list.iter()
        .enumerate()
        .map(|(index, page)| {
            let table = page
                .as_table()
                .ok_or_else(|| format!("page {} must be a table", index))?;
            let id = match table.get(CONF_ID) {
                None => None,
                Some(value) => {
                    let id = value
                        .as_str()
                        .ok_or_else(|| format!("page {}: id must be a string", index))?;
                    validate_id(id).map_err(|e| format!("page {}: {}", index, e))?;
                    Some(id.to_string())
                }
            };
            let lambda = table
                .get(CONF_LAMBDA)
                .ok_or_else(|| format!("page {}: required key 'lambda' not provided", index))
                .and_then(|l| validate_lambda(l).map_err(|e| format!("page {}: {}", index, e)))?;
            if let Some(extra) = table.keys().find(|k| *k != CONF_ID && *k != CONF_LAMBDA) {
                return Err(format!("page {}: extra key '{}' not allowed", index, extra));
            }
            Ok(PageConfig { id, lambda })
        })
        .collect()
}

/// Whether and how a key must appear
#[derive(Debug, Clone, PartialEq)]
pub enum Presence {
    Required,
    Optional,
    /// Filled in with this raw value when absent, then validated like user input
    Default(toml::Value),
}

/// One accepted key
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigOption {
    pub key: &'static str,
    pub presence: Presence,
    pub kind: FieldKind,
}

/// Ordered collection of accepted keys
#[derive(Debug, Clone, Default)]
pub struct Schema {
    options: Vec<ConfigOption>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(self, key: &'static str, kind: FieldKind) -> Self {
        self.with(key, Presence::Required, kind)
    }

    pub fn optional(self, key: &'static str, kind: FieldKind) -> Self {
        self.with(key, Presence::Optional, kind)
    }

    pub fn optional_default(
        self,
        key: &'static str,
        default: impl Into<toml::Value>,
        kind: FieldKind,
    ) -> Self {
        self.with(key, Presence::Default(default.into()), kind)
    }

    /// Merge `other` into this schema, its options replace ones with the same key
    pub fn extend(mut self, other: Schema) -> Self {
        for option in other.options {
            self = self.with(option.key, option.presence, option.kind);
        }
        self
    }

    fn with(mut self, key: &'static str, presence: Presence, kind: FieldKind) -> Self {
        let option = ConfigOption {
            key,
            presence,
            kind,
        };
        match self.options.iter_mut().find(|o| o.key == key) {
            Some(existing) => *existing = option,
            None => self.options.push(option),
        }
        self
    }

    pub fn option(&self, key: &str) -> Option<&ConfigOption> {
        self.options.iter().find(|o| o.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.options.iter().map(|o| o.key)
    }

    /// Check every key independently, collecting all field errors
    pub fn validate(
        &self,
        raw: &toml::Table,
        ctx: &Context<'_>,
    ) -> Result<ConfigRecord, ConfigError> {
        let mut errors = Vec::new();
        let mut values = BTreeMap::new();

        for option in &self.options {
            let given = raw.get(option.key);
            let candidate = match (given, &option.presence) {
                (Some(value), _) => value,
                (None, Presence::Default(default)) => default,
                (None, Presence::Required) => {
                    errors.push(FieldError::new(option.key, "required key not provided"));
                    continue;
                }
                (None, Presence::Optional) => continue,
            };
            match option.kind.validate(candidate, ctx) {
                Ok(value) => {
                    values.insert(option.key, value);
                }
                Err(message) => errors.push(FieldError::new(option.key, message)),
            }
        }

        for key in raw.keys() {
            if self.option(key).is_none() {
                errors.push(FieldError::new(key.as_str(), "extra keys not allowed"));
            }
        }

        if errors.is_empty() {
            log::debug!("{} keys passed field validation", values.len());
            Ok(ConfigRecord { values })
        } else {
            Err(ConfigError::Fields(errors))
        }
    }
}

/// Validated configuration, keyed by option name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigRecord {
    values: BTreeMap<&'static str, Value>,
}

impl ConfigRecord {
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn model(&self) -> Option<PanelModel> {
        match self.get(CONF_MODEL) {
            Some(Value::Model(model)) => Some(*model),
            _ => None,
        }
    }

    pub fn pin(&self, key: &str) -> Option<PinDescriptor> {
        match self.get(key) {
            Some(Value::Pin(pin)) => Some(*pin),
            _ => None,
        }
    }

    pub fn int(&self, key: &str) -> Option<u64> {
        match self.get(key) {
            Some(Value::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn duration(&self, key: &str) -> Option<Duration> {
        match self.get(key) {
            Some(Value::Duration(d)) => Some(*d),
            _ => None,
        }
    }

    pub fn interval(&self, key: &str) -> Option<Option<Duration>> {
        match self.get(key) {
            Some(Value::Interval(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn frequency(&self, key: &str) -> Option<u32> {
        match self.get(key) {
            Some(Value::Frequency(hz)) => Some(*hz),
            _ => None,
        }
    }

    pub fn string(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(Value::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn boolean(&self, key: &str) -> Option<bool> {
        match self.get(key) {
            Some(Value::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn rotation(&self) -> Option<Rotation> {
        match self.get(CONF_ROTATION) {
            Some(Value::Rotation(r)) => Some(*r),
            _ => None,
        }
    }

    pub fn pages(&self) -> Option<&[PageConfig]> {
        match self.get(CONF_PAGES) {
            Some(Value::Pages(pages)) => Some(pages),
            _ => None,
        }
    }
}

/// `update_interval` with the given default
pub fn polling_component_schema(default_interval: &str) -> Schema {
    Schema::new().optional_default(
        CONF_UPDATE_INTERVAL,
        default_interval,
        FieldKind::UpdateInterval,
    )
}

/// Bus selection and chip select wiring for an SPI peripheral
pub fn spi_device_schema(cs_pin_required: bool, default_data_rate: &str) -> Schema {
    let schema = Schema::new()
        .optional(CONF_SPI_ID, FieldKind::Id)
        .optional_default(CONF_DATA_RATE, default_data_rate, FieldKind::Frequency)
        .optional_default(CONF_SPI_MODE, 0i64, FieldKind::IntRange { min: 0, max: 3 });
    if cs_pin_required {
        schema.required(CONF_CS_PIN, FieldKind::OutputPin)
    } else {
        schema.optional(CONF_CS_PIN, FieldKind::OutputPin)
    }
}

/// Generic display options: identity, rotation and what to draw
pub fn full_display_schema() -> Schema {
    Schema::new()
        .optional(CONF_ID, FieldKind::Id)
        .optional_default(CONF_ROTATION, 0i64, FieldKind::Rotation)
        .optional(CONF_LAMBDA, FieldKind::Lambda)
        .optional(CONF_PAGES, FieldKind::Pages)
        .optional_default(CONF_AUTO_CLEAR_ENABLED, true, FieldKind::Bool)
        .optional(CONF_SHOW_TEST_CARD, FieldKind::Bool)
}
