//! WeAct e-paper driver handle
//!
//! The handle carries everything the configuration decided about one panel: its
//! model, the control pins, refresh cadence and reset timing, the SPI binding and
//! what to draw. Fields start at the driver's built-in defaults and are changed
//! only through the setters, which the instantiation step calls once per
//! configured key.
//!
//! ## Defaults
//!
//! - reset pulse: 200 ms
//! - full update every 30 updates
//! - no reset or busy line
//!
//! ## Deep sleep
//!
//! With a reset line configured, the 1.54" and 4.2" panels go to deep sleep between
//! updates, as recommended by the vendor. They are woken with a hardware reset.

use core::fmt;
use core::time::Duration;

use display_interface::DisplayError;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::weact_epaper::graphics::{draw_test_card, DisplayBuffer};
use crate::weact_epaper::interface::ControlLines;
use crate::weact_epaper::model::TypeAModel;
use crate::weact_epaper::pins::PinDescriptor;
use crate::weact_epaper::schema::Rotation;
use crate::weact_epaper::units::format_period;

/// Render callback, called with the frame buffer on every update
pub type Writer = Box<dyn FnMut(&mut DisplayBuffer)>;

/// Reset pulse length used when none is configured
pub const DEFAULT_RESET_DURATION: Duration = Duration::from_millis(200);

/// Full refresh cadence used when none is configured
pub const DEFAULT_FULL_UPDATE_EVERY: u32 = 30;

/// A page with its own writer
pub struct Page {
    pub id: Option<String>,
    pub writer: Writer,
}

/// Where the panel sits on the SPI bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpiBinding {
    pub bus_id: String,
    pub cs_pin: Option<PinDescriptor>,
    pub data_rate: u32,
    pub mode: u8,
}

/// Driver handle for the family A panels
pub struct WeactEPaperTypeA {
    id: String,
    model: TypeAModel,
    dc_pin: Option<PinDescriptor>,
    reset_pin: Option<PinDescriptor>,
    busy_pin: Option<PinDescriptor>,
    reset_duration: Duration,
    full_update_every: u32,
    writer: Option<Writer>,
    pages: Vec<Page>,
    rotation: Rotation,
    update_interval: Option<Duration>,
    auto_clear_enabled: bool,
    show_test_card: bool,
    spi: Option<SpiBinding>,
}

impl WeactEPaperTypeA {
    pub fn new(id: impl Into<String>, model: TypeAModel) -> Self {
        Self {
            id: id.into(),
            model,
            dc_pin: None,
            reset_pin: None,
            busy_pin: None,
            reset_duration: DEFAULT_RESET_DURATION,
            full_update_every: DEFAULT_FULL_UPDATE_EVERY,
            writer: None,
            pages: Vec::new(),
            rotation: Rotation::Rotate0,
            update_interval: Some(Duration::from_secs(1)),
            auto_clear_enabled: true,
            show_test_card: false,
            spi: None,
        }
    }

    pub fn set_dc_pin(&mut self, pin: PinDescriptor) {
        self.dc_pin = Some(pin);
    }

    pub fn set_reset_pin(&mut self, pin: PinDescriptor) {
        self.reset_pin = Some(pin);
    }

    pub fn set_busy_pin(&mut self, pin: PinDescriptor) {
        self.busy_pin = Some(pin);
    }

    pub fn set_writer(&mut self, writer: Writer) {
        self.writer = Some(writer);
    }

    pub fn set_full_update_every(&mut self, full_update_every: u32) {
        self.full_update_every = full_update_every;
    }

    pub fn set_reset_duration(&mut self, reset_duration: Duration) {
        self.reset_duration = reset_duration;
    }

    pub fn set_pages(&mut self, pages: Vec<Page>) {
        self.pages = pages;
    }

    pub fn set_rotation(&mut self, rotation: Rotation) {
        self.rotation = rotation;
    }

    pub fn set_update_interval(&mut self, update_interval: Option<Duration>) {
        self.update_interval = update_interval;
    }

    pub fn set_auto_clear(&mut self, enabled: bool) {
        self.auto_clear_enabled = enabled;
    }

    pub fn set_show_test_card(&mut self, show: bool) {
        self.show_test_card = show;
    }

    pub fn set_spi(&mut self, binding: SpiBinding) {
        self.spi = Some(binding);
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn model(&self) -> TypeAModel {
        self.model
    }

    pub fn dc_pin(&self) -> Option<PinDescriptor> {
        self.dc_pin
    }

    pub fn reset_pin(&self) -> Option<PinDescriptor> {
        self.reset_pin
    }

    pub fn busy_pin(&self) -> Option<PinDescriptor> {
        self.busy_pin
    }

    pub fn reset_duration(&self) -> Duration {
        self.reset_duration
    }

    pub fn full_update_every(&self) -> u32 {
        self.full_update_every
    }

    pub fn has_writer(&self) -> bool {
        self.writer.is_some()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn update_interval(&self) -> Option<Duration> {
        self.update_interval
    }

    pub fn spi(&self) -> Option<&SpiBinding> {
        self.spi.as_ref()
    }

    /// Whether the panel is put to deep sleep after each update
    pub fn deep_sleep_between_updates(&self) -> bool {
        self.reset_pin.is_some() && self.model.sleeps_between_updates()
    }

    /// Draw the next frame: clear, then the test card, the first page or the writer
    pub fn render(&mut self) -> DisplayBuffer {
        let mut buffer = DisplayBuffer::new(self.model, self.rotation);
        if self.auto_clear_enabled {
            buffer.fill(BinaryColor::Off);
        }
        if self.show_test_card {
            draw_test_card(&mut buffer);
        } else if let Some(page) = self.pages.first_mut() {
            (page.writer)(&mut buffer);
        } else if let Some(writer) = self.writer.as_mut() {
            writer(&mut buffer);
        }
        buffer
    }

    /// Hardware reset with the configured pulse length
    pub fn reset<DC, RST, BSY>(
        &self,
        lines: &mut ControlLines<DC, RST, BSY>,
        delay: &mut impl DelayNs,
    ) -> Result<(), DisplayError>
    where
        DC: OutputPin,
        RST: OutputPin,
        BSY: InputPin,
    {
        lines.reset(delay, self.reset_duration)
    }

    /// Wait for BUSY using this model's idle timeout
    pub fn wait_until_idle<DC, RST, BSY>(
        &self,
        lines: &mut ControlLines<DC, RST, BSY>,
        delay: &mut impl DelayNs,
    ) -> bool
    where
        DC: OutputPin,
        RST: OutputPin,
        BSY: InputPin,
    {
        lines.wait_until_idle(delay, self.model.idle_timeout_ms())
    }

    /// Log the configuration of this panel
    pub fn dump_config(&self) {
        log::info!("Weact E-Paper '{}'", self.id);
        log::info!("  Rotation: {}°", self.rotation.degrees());
        log::info!(
            "  Dimensions: {}px x {}px",
            self.model.width(),
            self.model.height()
        );
        log::info!("  Model: {}", self.model.label());
        log::info!("  Full Update Every: {}", self.full_update_every);
        log::info!("  Reset Pin: {}", describe_pin(self.reset_pin));
        log::info!("  DC Pin: {}", describe_pin(self.dc_pin));
        log::info!("  Busy Pin: {}", describe_pin(self.busy_pin));
        log::info!("  Reset Duration: {}", format_period(self.reset_duration));
        match self.update_interval {
            Some(interval) => log::info!("  Update Interval: {}", format_period(interval)),
            None => log::info!("  Update Interval: never"),
        }
        if let Some(spi) = &self.spi {
            log::info!(
                "  SPI: bus '{}', CS {}, {} Hz, mode {}",
                spi.bus_id,
                describe_pin(spi.cs_pin),
                spi.data_rate,
                spi.mode
            );
        }
        if self.deep_sleep_between_updates() {
            log::info!("  Deep sleep between updates");
        }
    }
}

fn describe_pin(pin: Option<PinDescriptor>) -> String {
    pin.map_or_else(|| "None".to_string(), |p| p.to_string())
}

impl fmt::Debug for WeactEPaperTypeA {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeactEPaperTypeA")
            .field("id", &self.id)
            .field("model", &self.model)
            .field("dc_pin", &self.dc_pin)
            .field("reset_pin", &self.reset_pin)
            .field("busy_pin", &self.busy_pin)
            .field("reset_duration", &self.reset_duration)
            .field("full_update_every", &self.full_update_every)
            .field("writer", &self.writer.is_some())
            .field("pages", &self.pages.len())
            .field("rotation", &self.rotation)
            .field("update_interval", &self.update_interval)
            .field("spi", &self.spi)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weact_epaper::interface::mock::{Delay, Log, Pin};
    use crate::weact_epaper::pins::PinMode;

    fn pin(number: u8) -> PinDescriptor {
        PinDescriptor {
            number,
            mode: PinMode::Output,
            inverted: false,
        }
    }

    #[test]
    fn test_defaults() {
        let driver = WeactEPaperTypeA::new("epd", TypeAModel::WeactEpaper1in54);
        assert_eq!(driver.reset_duration(), Duration::from_millis(200));
        assert_eq!(driver.full_update_every(), 30);
        assert!(driver.reset_pin().is_none());
        assert!(driver.busy_pin().is_none());
        assert!(!driver.has_writer());
        assert!(!driver.deep_sleep_between_updates());
    }

    #[test]
    fn test_deep_sleep_needs_reset_pin_and_eligible_model() {
        let mut driver = WeactEPaperTypeA::new("epd", TypeAModel::WeactEpaper4in2);
        driver.set_reset_pin(pin(16));
        assert!(driver.deep_sleep_between_updates());

        let mut driver = WeactEPaperTypeA::new("epd", TypeAModel::WeactEpaper2in13V2);
        driver.set_reset_pin(pin(16));
        assert!(!driver.deep_sleep_between_updates());
    }

    #[test]
    fn test_render_prefers_pages_over_writer() {
        let mut driver = WeactEPaperTypeA::new("epd", TypeAModel::WeactEpaper1in54);
        driver.set_writer(Box::new(|it: &mut DisplayBuffer| it.fill(BinaryColor::On)));
        assert!(driver.render().buffer().iter().all(|b| *b == 0x00));

        driver.set_pages(vec![Page {
            id: Some("blank".to_string()),
            writer: Box::new(|_: &mut DisplayBuffer| {}),
        }]);
        assert!(driver.render().buffer().iter().all(|b| *b == 0xFF));
    }

    #[test]
    fn test_render_without_auto_clear() {
        let mut driver = WeactEPaperTypeA::new("epd", TypeAModel::WeactEpaper2in9);
        driver.set_auto_clear(false);
        let frame = driver.render();
        assert_eq!(frame.buffer().len(), TypeAModel::WeactEpaper2in9.buffer_length());
    }

    #[test]
    fn test_reset_uses_configured_duration() {
        let log = Log::default();
        let mut delay = Delay { log: log.clone() };
        let mut lines = ControlLines::new(
            Pin::new("dc", &log),
            Some(Pin::new("rst", &log)),
            None::<Pin>,
        );
        let mut driver = WeactEPaperTypeA::new("epd", TypeAModel::WeactEpaper2in13V2);
        driver.set_reset_duration(Duration::from_millis(50));
        driver.reset(&mut lines, &mut delay).unwrap();
        assert_eq!(log.borrow()[1], "delay 50ms");
        assert!(driver.wait_until_idle(&mut lines, &mut delay));
    }
}
