//! TOML configuration files
//!
//! ```toml
//! [[spi]]
//! id = "spi_bus"
//! clk_pin = 18
//! mosi_pin = 23
//!
//! [[display]]
//! platform = "weact_epaper"
//! model = "2.13inv2"
//! dc_pin = 17
//! reset_pin = 16
//! busy_pin = 4
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::weact_epaper::driver::WeactEPaperTypeA;
use crate::weact_epaper::error::{ConfigError, FieldError};
use crate::weact_epaper::instantiate::{process, DEFAULT_ID};
use crate::weact_epaper::pins::{PinDescriptor, PinRole, PinValidator};
use crate::weact_epaper::register::{DisplayRegistrar, SpiBus, SpiBuses};
use crate::weact_epaper::schema::{
    Context, CONF_BUSY_PIN, CONF_CS_PIN, CONF_DC_PIN, CONF_ID, CONF_RESET_PIN,
};

/// Platform name handled by this crate
pub const PLATFORM: &str = "weact_epaper";

const CONF_PLATFORM: &str = "platform";

/// An `[[spi]]` table before its pins are checked
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpiBusConfig {
    pub id: String,
    pub clk_pin: toml::Value,
    pub mosi_pin: toml::Value,
    pub miso_pin: Option<toml::Value>,
}

impl SpiBusConfig {
    fn resolve(&self, index: usize, pins: &dyn PinValidator) -> Result<SpiBus, Vec<FieldError>> {
        let mut errors = Vec::new();
        let mut check = |key: &str, role: PinRole, raw: &toml::Value| {
            pins.validate(role, raw)
                .map_err(|e| errors.push(FieldError::new(format!("spi[{}].{}", index, key), e)))
                .ok()
        };
        let clk_pin = check("clk_pin", PinRole::Output, &self.clk_pin);
        let mosi_pin = check("mosi_pin", PinRole::Output, &self.mosi_pin);
        let miso_pin = match &self.miso_pin {
            Some(raw) => check("miso_pin", PinRole::Input, raw).map(Some),
            None => Some(None),
        };
        match (clk_pin, mosi_pin, miso_pin) {
            (Some(clk_pin), Some(mosi_pin), Some(miso_pin)) => Ok(SpiBus {
                id: self.id.clone(),
                clk_pin,
                mosi_pin,
                miso_pin,
            }),
            _ => Err(errors),
        }
    }
}

/// Whole configuration document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub spi: Vec<SpiBusConfig>,
    #[serde(default)]
    pub display: Vec<toml::Table>,
}

impl ConfigFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        log::debug!("Reading configuration from {}", path.display());
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Check bus pins and collect the buses
    pub fn spi_buses(&self, pins: &dyn PinValidator) -> Result<SpiBuses, ConfigError> {
        let mut buses = SpiBuses::new();
        let mut errors = Vec::new();
        for (index, bus) in self.spi.iter().enumerate() {
            match bus.resolve(index, pins) {
                Ok(bus) => buses.add(bus)?,
                Err(mut bus_errors) => errors.append(&mut bus_errors),
            }
        }
        if errors.is_empty() {
            Ok(buses)
        } else {
            Err(ConfigError::Fields(errors))
        }
    }

    /// `[[display]]` entries of this platform with the `platform` key removed
    pub fn weact_displays(&self) -> Result<Vec<toml::Table>, ConfigError> {
        let mut displays = Vec::new();
        for (index, entry) in self.display.iter().enumerate() {
            match entry.get(CONF_PLATFORM).and_then(toml::Value::as_str) {
                Some(PLATFORM) => {
                    let mut table = entry.clone();
                    table.remove(CONF_PLATFORM);
                    displays.push(table);
                }
                Some(other) => log::warn!("Skipping display {} with platform '{}'", index, other),
                None => {
                    return Err(ConfigError::Fields(vec![FieldError::new(
                        format!("display[{}].{}", index, CONF_PLATFORM),
                        "required key not provided",
                    )]))
                }
            }
        }
        Ok(displays)
    }

    /// Validate and instantiate every panel, stopping at the first failure
    ///
    /// Panels without an `id` get a generated one. Ids must be unique and no
    /// GPIO may be used twice across buses and panels.
    pub fn instantiate_all(
        &self,
        ctx: &Context<'_>,
        display: &mut impl DisplayRegistrar,
    ) -> Result<Vec<WeactEPaperTypeA>, ConfigError> {
        let mut spi = self.spi_buses(ctx.pins)?;
        let mut displays = self.weact_displays()?;
        assign_ids(&mut displays)?;

        let mut pins = PinUsage::default();
        for bus in spi.buses() {
            pins.claim("clk_pin", Some(bus.clk_pin), &bus.id)?;
            pins.claim("mosi_pin", Some(bus.mosi_pin), &bus.id)?;
            pins.claim("miso_pin", bus.miso_pin, &bus.id)?;
        }

        let mut panels = Vec::with_capacity(displays.len());
        for raw in &displays {
            let panel = process(raw, ctx, display, &mut spi)?;
            pins.claim(CONF_DC_PIN, panel.dc_pin(), panel.id())?;
            pins.claim(CONF_RESET_PIN, panel.reset_pin(), panel.id())?;
            pins.claim(CONF_BUSY_PIN, panel.busy_pin(), panel.id())?;
            pins.claim(CONF_CS_PIN, panel.spi().and_then(|s| s.cs_pin), panel.id())?;
            panels.push(panel);
        }
        Ok(panels)
    }
}

/// Reject repeated ids, then give every panel without one the first free
/// `weact_epaper_<n>`
fn assign_ids(displays: &mut [toml::Table]) -> Result<(), ConfigError> {
    let mut taken = BTreeSet::new();
    for id in displays
        .iter()
        .filter_map(|table| table.get(CONF_ID).and_then(toml::Value::as_str))
    {
        if !taken.insert(id.to_string()) {
            return Err(ConfigError::Registration {
                key: CONF_ID,
                message: format!("ID '{}' redefined", id),
            });
        }
    }

    let mut counter = 0usize;
    for table in displays.iter_mut().filter(|t| !t.contains_key(CONF_ID)) {
        let id = loop {
            let candidate = format!("{}_{}", DEFAULT_ID, counter);
            counter += 1;
            if !taken.contains(&candidate) {
                break candidate;
            }
        };
        log::debug!("Generated id '{}'", id);
        taken.insert(id.clone());
        table.insert(CONF_ID.to_string(), toml::Value::String(id));
    }
    Ok(())
}

/// Which bus or panel owns each GPIO
#[derive(Default)]
struct PinUsage {
    owners: BTreeMap<u8, String>,
}

impl PinUsage {
    fn claim(
        &mut self,
        key: &'static str,
        pin: Option<PinDescriptor>,
        owner: &str,
    ) -> Result<(), ConfigError> {
        let Some(pin) = pin else {
            return Ok(());
        };
        let user = format!("{}.{}", owner, key);
        if let Some(previous) = self.owners.get(&pin.number) {
            return Err(ConfigError::Registration {
                key,
                message: format!(
                    "Pin GPIO{} is used in multiple places ({} and {})",
                    pin.number, previous, user
                ),
            });
        }
        self.owners.insert(pin.number, user);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::weact_epaper::model::{PanelCatalog, TypeAModel};
    use crate::weact_epaper::pins::Esp32Pins;
    use crate::weact_epaper::register::Renderers;

    const EXAMPLE: &str = r#"
[[spi]]
id = "spi_bus"
clk_pin = 18
mosi_pin = "GPIO23"

[[display]]
platform = "weact_epaper"
id = "kitchen"
model = "2.13inv2"
dc_pin = 17
reset_pin = 16
busy_pin = { number = 4, mode = "pullup" }
cs_pin = 5
lambda = "test_card"

[[display]]
platform = "ssd1306_spi"
model = "128x64"
"#;

    fn instantiate(file: &ConfigFile) -> Result<Vec<WeactEPaperTypeA>, ConfigError> {
        let catalog = PanelCatalog::default();
        let ctx = Context {
            pins: &Esp32Pins,
            catalog: &catalog,
        };
        file.instantiate_all(&ctx, &mut Renderers::with_builtins())
    }

    #[test]
    fn test_load_from_disk() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(EXAMPLE.as_bytes()).unwrap();
        let file = ConfigFile::load(tmp.path()).unwrap();
        assert_eq!(file.spi.len(), 1);
        assert_eq!(file.display.len(), 2);

        let panels = instantiate(&file).unwrap();
        assert_eq!(panels.len(), 1);
        assert_eq!(panels[0].id(), "kitchen");
        assert_eq!(panels[0].model(), TypeAModel::WeactEpaper2in13V2);
        let spi = panels[0].spi().unwrap();
        assert_eq!(spi.bus_id, "spi_bus");
        assert_eq!(spi.cs_pin.map(|p| p.number), Some(5));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigFile::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_platform_is_required() {
        let file = ConfigFile::parse("[[display]]\nmodel = \"1.54in\"").unwrap();
        let err = file.weact_displays().unwrap_err();
        assert_eq!(err.keys(), vec!["display[0].platform"]);
    }

    #[test]
    fn test_bad_bus_pins_are_reported_together() {
        let file = ConfigFile::parse(
            "[[spi]]\nid = \"spi_bus\"\nclk_pin = 6\nmosi_pin = 23\nmiso_pin = 40",
        )
        .unwrap();
        let err = file.spi_buses(&Esp32Pins).unwrap_err();
        assert_eq!(err.keys(), vec!["spi[0].clk_pin", "spi[0].miso_pin"]);
    }

    #[test]
    fn test_unknown_top_level_table() {
        let err = ConfigFile::parse("[wifi]\nssid = \"home\"").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_first_failing_display_stops() {
        let file = ConfigFile::parse(
            r#"
[[spi]]
id = "spi_bus"
clk_pin = 18
mosi_pin = 23

[[display]]
platform = "weact_epaper"
model = "2.13inv2"
dc_pin = 17
"#,
        )
        .unwrap();
        let err = instantiate(&file).unwrap_err();
        assert_eq!(err.to_string(), "'reset_pin' is required for model 2.13inv2");
    }

    const BUS: &str = "[[spi]]\nid = \"spi_bus\"\nclk_pin = 18\nmosi_pin = 23\n";

    fn with_bus(displays: &str) -> ConfigFile {
        ConfigFile::parse(&format!("{}{}", BUS, displays)).unwrap()
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let file = with_bus(
            r#"
[[display]]
platform = "weact_epaper"
model = "1.54in"
dc_pin = 17

[[display]]
platform = "weact_epaper"
id = "weact_epaper_0"
model = "2.90in"
dc_pin = 22

[[display]]
platform = "weact_epaper"
model = "4.20in"
dc_pin = 21
"#,
        );
        let ids: Vec<_> = instantiate(&file)
            .unwrap()
            .iter()
            .map(|p| p.id().to_string())
            .collect();
        assert_eq!(ids, vec!["weact_epaper_1", "weact_epaper_0", "weact_epaper_2"]);
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let file = with_bus(
            r#"
[[display]]
platform = "weact_epaper"
id = "hall"
model = "1.54in"
dc_pin = 17

[[display]]
platform = "weact_epaper"
id = "hall"
model = "4.20in"
dc_pin = 21
"#,
        );
        let err = instantiate(&file).unwrap_err();
        assert_eq!(err.keys(), vec!["id"]);
        assert_eq!(err.to_string(), "[id] ID 'hall' redefined");
    }

    #[test]
    fn test_pin_shared_between_panels_is_rejected() {
        let file = with_bus(
            r#"
[[display]]
platform = "weact_epaper"
model = "1.54in"
dc_pin = 17

[[display]]
platform = "weact_epaper"
model = "4.20in"
dc_pin = 17
"#,
        );
        let err = instantiate(&file).unwrap_err();
        assert_eq!(err.keys(), vec!["dc_pin"]);
        assert!(err
            .to_string()
            .contains("GPIO17 is used in multiple places (weact_epaper_0.dc_pin and weact_epaper_1.dc_pin)"));
    }

    #[test]
    fn test_pin_reused_within_panel_or_bus_is_rejected() {
        let file = with_bus(
            "[[display]]\nplatform = \"weact_epaper\"\nmodel = \"1.54in\"\ndc_pin = 17\nreset_pin = 17",
        );
        assert_eq!(instantiate(&file).unwrap_err().keys(), vec!["reset_pin"]);

        let file = with_bus(
            "[[display]]\nplatform = \"weact_epaper\"\nmodel = \"1.54in\"\ndc_pin = 18",
        );
        let err = instantiate(&file).unwrap_err();
        assert!(err.to_string().contains("spi_bus.clk_pin and weact_epaper_0.dc_pin"));
    }
}
