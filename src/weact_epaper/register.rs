//! Collaborators the instantiation step hands the new driver to
//!
//! [`Renderers`] plays the display side: it applies the generic display options
//! and turns `lambda` names into writers. [`SpiBuses`] plays the bus side: it
//! picks the bus a panel sits on and checks the chip select wiring.

use std::collections::BTreeMap;
use std::rc::Rc;

use embedded_graphics::pixelcolor::BinaryColor;

use crate::weact_epaper::driver::{Page, SpiBinding, WeactEPaperTypeA, Writer};
use crate::weact_epaper::error::ConfigError;
use crate::weact_epaper::graphics::{draw_test_card, DisplayBuffer};
use crate::weact_epaper::pins::PinDescriptor;
use crate::weact_epaper::schema::{
    ConfigRecord, CONF_AUTO_CLEAR_ENABLED, CONF_CS_PIN, CONF_DATA_RATE, CONF_LAMBDA, CONF_PAGES,
    CONF_SHOW_TEST_CARD, CONF_SPI_ID, CONF_SPI_MODE, CONF_UPDATE_INTERVAL,
};

/// Data rate assumed when the record carries none
pub const DEFAULT_DATA_RATE_HZ: u32 = 2_000_000;

/// Applies generic display options and compiles render callbacks
pub trait DisplayRegistrar {
    fn register_display(
        &mut self,
        display: &mut WeactEPaperTypeA,
        config: &ConfigRecord,
    ) -> Result<(), ConfigError>;

    /// Resolve a `lambda` value into a writer
    fn process_lambda(&self, lambda: &str) -> Result<Writer, ConfigError>;
}

/// Attaches a driver to an SPI bus
pub trait SpiRegistrar {
    fn register_spi_device(
        &mut self,
        display: &mut WeactEPaperTypeA,
        config: &ConfigRecord,
    ) -> Result<(), ConfigError>;
}

type RenderFn = Rc<dyn Fn(&mut DisplayBuffer)>;

/// Named render functions a configuration can refer to
#[derive(Default)]
pub struct Renderers {
    functions: BTreeMap<String, RenderFn>,
}

impl Renderers {
    pub fn new() -> Self {
        Self::default()
    }

    /// `fill_black`, `fill_white` and `test_card`
    pub fn with_builtins() -> Self {
        let mut renderers = Self::new();
        renderers.register("fill_black", |it: &mut DisplayBuffer| it.fill(BinaryColor::On));
        renderers.register("fill_white", |it: &mut DisplayBuffer| it.fill(BinaryColor::Off));
        renderers.register("test_card", draw_test_card);
        renderers
    }

    /// Add or replace a render function
    pub fn register<F>(&mut self, name: impl Into<String>, render: F)
    where
        F: Fn(&mut DisplayBuffer) + 'static,
    {
        self.functions.insert(name.into(), Rc::new(render));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    fn compile(&self, key: &'static str, name: &str) -> Result<Writer, ConfigError> {
        let render = self.functions.get(name).cloned().ok_or_else(|| {
            ConfigError::Registration {
                key,
                message: format!(
                    "Unknown render function '{}', registered: {}",
                    name,
                    self.names().collect::<Vec<_>>().join(", ")
                ),
            }
        })?;
        Ok(Box::new(move |buffer: &mut DisplayBuffer| render(buffer)))
    }
}

impl DisplayRegistrar for Renderers {
    fn register_display(
        &mut self,
        display: &mut WeactEPaperTypeA,
        config: &ConfigRecord,
    ) -> Result<(), ConfigError> {
        if let Some(rotation) = config.rotation() {
            display.set_rotation(rotation);
        }
        if let Some(interval) = config.interval(CONF_UPDATE_INTERVAL) {
            display.set_update_interval(interval);
        }
        if let Some(enabled) = config.boolean(CONF_AUTO_CLEAR_ENABLED) {
            display.set_auto_clear(enabled);
        }
        if let Some(show) = config.boolean(CONF_SHOW_TEST_CARD) {
            display.set_show_test_card(show);
        }
        if let Some(pages) = config.pages() {
            let compiled = pages
                .iter()
                .map(|page| {
                    Ok(Page {
                        id: page.id.clone(),
                        writer: self.compile(CONF_PAGES, &page.lambda)?,
                    })
                })
                .collect::<Result<Vec<_>, ConfigError>>()?;
            display.set_pages(compiled);
        }
        log::debug!("Registered display '{}'", display.id());
        Ok(())
    }

    fn process_lambda(&self, lambda: &str) -> Result<Writer, ConfigError> {
        self.compile(CONF_LAMBDA, lambda)
    }
}

/// A declared SPI bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpiBus {
    pub id: String,
    pub clk_pin: PinDescriptor,
    pub mosi_pin: PinDescriptor,
    pub miso_pin: Option<PinDescriptor>,
}

impl SpiBus {
    fn uses_pin(&self, number: u8) -> bool {
        self.clk_pin.number == number
            || self.mosi_pin.number == number
            || self.miso_pin.is_some_and(|p| p.number == number)
    }
}

/// Every bus of a configuration and the chip selects already taken
#[derive(Debug, Default)]
pub struct SpiBuses {
    buses: Vec<SpiBus>,
    chip_selects: Vec<(String, u8)>,
}

impl SpiBuses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a bus, ids must be unique
    pub fn add(&mut self, bus: SpiBus) -> Result<(), ConfigError> {
        if self.buses.iter().any(|b| b.id == bus.id) {
            return Err(ConfigError::Registration {
                key: CONF_SPI_ID,
                message: format!("SPI bus '{}' is declared twice", bus.id),
            });
        }
        self.buses.push(bus);
        Ok(())
    }

    pub fn buses(&self) -> &[SpiBus] {
        &self.buses
    }

    fn select(&self, spi_id: Option<&str>) -> Result<&SpiBus, ConfigError> {
        match spi_id {
            Some(id) => self.buses.iter().find(|b| b.id == id).ok_or_else(|| {
                ConfigError::Registration {
                    key: CONF_SPI_ID,
                    message: format!("Couldn't find SPI bus with ID '{}'", id),
                }
            }),
            None => match self.buses.as_slice() {
                [bus] => Ok(bus),
                [] => Err(ConfigError::Registration {
                    key: CONF_SPI_ID,
                    message: "no SPI bus is declared".to_string(),
                }),
                _ => Err(ConfigError::Registration {
                    key: CONF_SPI_ID,
                    message: "several SPI buses are declared, set 'spi_id'".to_string(),
                }),
            },
        }
    }
}

impl SpiRegistrar for SpiBuses {
    fn register_spi_device(
        &mut self,
        display: &mut WeactEPaperTypeA,
        config: &ConfigRecord,
    ) -> Result<(), ConfigError> {
        let bus = self.select(config.string(CONF_SPI_ID))?;
        let cs_pin = config.pin(CONF_CS_PIN);

        if let Some(cs) = cs_pin {
            if bus.uses_pin(cs.number) {
                return Err(ConfigError::Registration {
                    key: CONF_CS_PIN,
                    message: format!("{} is already used by SPI bus '{}'", cs, bus.id),
                });
            }
            if self
                .chip_selects
                .iter()
                .any(|(id, number)| *id == bus.id && *number == cs.number)
            {
                return Err(ConfigError::Registration {
                    key: CONF_CS_PIN,
                    message: format!("{} already selects another device on '{}'", cs, bus.id),
                });
            }
        }

        let binding = SpiBinding {
            bus_id: bus.id.clone(),
            cs_pin,
            data_rate: config
                .frequency(CONF_DATA_RATE)
                .unwrap_or(DEFAULT_DATA_RATE_HZ),
            mode: config.int(CONF_SPI_MODE).unwrap_or(0) as u8,
        };
        if let Some(cs) = cs_pin {
            self.chip_selects.push((binding.bus_id.clone(), cs.number));
        }
        log::debug!(
            "Attached '{}' to SPI bus '{}'",
            display.id(),
            binding.bus_id
        );
        display.set_spi(binding);
        Ok(())
    }
}
