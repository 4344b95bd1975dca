//! Cross-field rules and the complete panel configuration pipeline
//!
//! Field checks only see one key at a time. The rules here look at combinations
//! (the model together with another key) and therefore run after every field is
//! known to be valid, in a fixed order.

use std::time::Duration;

use crate::weact_epaper::error::ConfigError;
use crate::weact_epaper::model::{Family, PanelCatalog};
use crate::weact_epaper::schema::{
    full_display_schema, polling_component_schema, spi_device_schema, ConfigRecord, Context,
    FieldKind, Schema, CONF_BUSY_PIN, CONF_DC_PIN, CONF_FULL_UPDATE_EVERY, CONF_LAMBDA,
    CONF_MODEL, CONF_PAGES, CONF_RESET_DURATION, CONF_RESET_PIN,
};

/// Longest reset pulse the panels tolerate
pub const MAX_RESET_DURATION: Duration = Duration::from_millis(500);

/// Default polling period
pub const DEFAULT_UPDATE_INTERVAL: &str = "1s";

/// SPI clock used by the panels
pub const DEFAULT_DATA_RATE: &str = "2MHz";

/// A check over the combination of several keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// `full_update_every` is only meaningful for family A models
    FullUpdateEveryOnlyFamilyA,
    /// Some models cannot be driven without a reset line
    ResetPinRequired,
    /// Mutually exclusive keys
    AtMostOneOf(&'static [&'static str]),
}

impl Rule {
    /// Return the record unchanged or reject it
    pub fn apply(
        &self,
        config: ConfigRecord,
        catalog: &PanelCatalog,
    ) -> Result<ConfigRecord, ConfigError> {
        match self {
            Rule::FullUpdateEveryOnlyFamilyA => {
                if !config.contains(CONF_FULL_UPDATE_EVERY) {
                    return Ok(config);
                }
                let Some(model) = config.model() else {
                    return Ok(config);
                };
                if model.family() != Family::A {
                    return Err(ConfigError::UnsupportedOption {
                        key: CONF_FULL_UPDATE_EVERY,
                        model: model.key.to_string(),
                        supported: catalog.keys_in_family(Family::A),
                    });
                }
                Ok(config)
            }
            Rule::ResetPinRequired => {
                if let Some(model) = config.model() {
                    if catalog.requires_reset_pin(&model) && !config.contains(CONF_RESET_PIN) {
                        return Err(ConfigError::MissingPin {
                            key: CONF_RESET_PIN,
                            model: model.key.to_string(),
                        });
                    }
                }
                Ok(config)
            }
            Rule::AtMostOneOf(keys) => {
                let present: Vec<_> = keys.iter().filter(|k| config.contains(k)).collect();
                if present.len() > 1 {
                    return Err(ConfigError::ConflictingKeys {
                        keys: keys.to_vec(),
                    });
                }
                Ok(config)
            }
        }
    }
}

/// A schema followed by its cross-field rules
#[derive(Debug, Clone)]
pub struct ConfigPipeline {
    pub schema: Schema,
    pub rules: Vec<Rule>,
}

impl ConfigPipeline {
    pub fn validate(
        &self,
        raw: &toml::Table,
        ctx: &Context<'_>,
    ) -> Result<ConfigRecord, ConfigError> {
        let mut config = self.schema.validate(raw, ctx)?;
        for rule in &self.rules {
            config = rule.apply(config, ctx.catalog)?;
        }
        Ok(config)
    }
}

/// Keys specific to the WeAct panels
pub fn panel_schema() -> Schema {
    Schema::new()
        .required(CONF_DC_PIN, FieldKind::OutputPin)
        .required(CONF_MODEL, FieldKind::Model)
        .optional(CONF_RESET_PIN, FieldKind::OutputPin)
        .optional(CONF_BUSY_PIN, FieldKind::InputPin)
        .optional(
            CONF_FULL_UPDATE_EVERY,
            FieldKind::IntRange {
                min: 1,
                max: u32::MAX as i64,
            },
        )
        .optional(
            CONF_RESET_DURATION,
            FieldKind::TimePeriodMs {
                max: Some(MAX_RESET_DURATION),
            },
        )
}

/// Full validation pipeline for a `weact_epaper` display entry
pub fn config_schema() -> ConfigPipeline {
    let schema = full_display_schema()
        .extend(panel_schema())
        .extend(polling_component_schema(DEFAULT_UPDATE_INTERVAL))
        .extend(spi_device_schema(false, DEFAULT_DATA_RATE));
    ConfigPipeline {
        schema,
        rules: vec![
            Rule::FullUpdateEveryOnlyFamilyA,
            Rule::ResetPinRequired,
            Rule::AtMostOneOf(&[CONF_PAGES, CONF_LAMBDA]),
        ],
    }
}
