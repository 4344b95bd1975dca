//! Turns a validated configuration record into a configured driver

use crate::weact_epaper::driver::WeactEPaperTypeA;
use crate::weact_epaper::error::{ConfigError, FieldError};
use crate::weact_epaper::model::{NativeModel, PanelModel};
use crate::weact_epaper::register::{DisplayRegistrar, SpiRegistrar};
use crate::weact_epaper::schema::{
    ConfigRecord, Context, CONF_BUSY_PIN, CONF_DC_PIN, CONF_FULL_UPDATE_EVERY, CONF_ID,
    CONF_LAMBDA, CONF_MODEL, CONF_RESET_DURATION, CONF_RESET_PIN,
};
use crate::weact_epaper::validate::config_schema;

/// Id given to a panel that does not declare one
pub const DEFAULT_ID: &str = "weact_epaper";

/// Build the driver for `model`'s family
pub fn construct(id: &str, model: PanelModel) -> Result<WeactEPaperTypeA, ConfigError> {
    match model.native {
        NativeModel::TypeA(native) => Ok(WeactEPaperTypeA::new(id, native)),
        NativeModel::TypeB(_) => Err(ConfigError::NotImplemented {
            family: model.family().tag(),
            model: model.key.to_string(),
        }),
    }
}

fn missing(key: &'static str) -> ConfigError {
    ConfigError::Fields(vec![FieldError::new(key, "required key not provided")])
}

/// Create the driver and apply every present key exactly once
///
/// Registration comes first so collaborators see the handle before any pin is
/// set. The writer is compiled before the SPI device is claimed, so a bad
/// `lambda` leaves the bus untouched. Keys absent from `config` keep the driver
/// defaults.
pub fn instantiate(
    config: &ConfigRecord,
    display: &mut impl DisplayRegistrar,
    spi: &mut impl SpiRegistrar,
) -> Result<WeactEPaperTypeA, ConfigError> {
    let model = config.model().ok_or_else(|| missing(CONF_MODEL))?;
    let id = config.string(CONF_ID).unwrap_or(DEFAULT_ID);
    let mut var = construct(id, model)?;

    display.register_display(&mut var, config)?;

    let dc = config.pin(CONF_DC_PIN).ok_or_else(|| missing(CONF_DC_PIN))?;
    let writer = config
        .string(CONF_LAMBDA)
        .map(|lambda| display.process_lambda(lambda))
        .transpose()?;
    let full_update_every = config
        .int(CONF_FULL_UPDATE_EVERY)
        .map(|every| {
            u32::try_from(every).map_err(|_| {
                ConfigError::Fields(vec![FieldError::new(
                    CONF_FULL_UPDATE_EVERY,
                    format!("Value {} is out of range", every),
                )])
            })
        })
        .transpose()?;

    spi.register_spi_device(&mut var, config)?;

    var.set_dc_pin(dc);
    if let Some(writer) = writer {
        var.set_writer(writer);
    }
    if let Some(reset) = config.pin(CONF_RESET_PIN) {
        var.set_reset_pin(reset);
    }
    if let Some(busy) = config.pin(CONF_BUSY_PIN) {
        var.set_busy_pin(busy);
    }
    if let Some(every) = full_update_every {
        var.set_full_update_every(every);
    }
    if let Some(duration) = config.duration(CONF_RESET_DURATION) {
        var.set_reset_duration(duration);
    }

    log::info!("Configured {} as '{}'", model, var.id());
    Ok(var)
}

/// Validate a raw `weact_epaper` table and instantiate it
pub fn process(
    raw: &toml::Table,
    ctx: &Context<'_>,
    display: &mut impl DisplayRegistrar,
    spi: &mut impl SpiRegistrar,
) -> Result<WeactEPaperTypeA, ConfigError> {
    let config = config_schema().validate(raw, ctx)?;
    instantiate(&config, display, spi)
}
