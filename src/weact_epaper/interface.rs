//! Control lines shared by every WeAct panel
//!
//! The SPI data path lives elsewhere; this only drives DC and RST and watches BUSY.
//! Reset and busy lines are optional, matching the configuration.
use core::time::Duration;

use display_interface::DisplayError;
use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};

/// Time the controller needs after RST is released
const RESET_SETTLE_MS: u32 = 20;

/// DC, RST and BUSY of one panel
pub struct ControlLines<DC, RST, BSY> {
    /// Data/Command Control Pin (High for data, Low for command)
    dc: DC,
    /// Pin for Reseting
    rst: Option<RST>,
    /// High while the panel is refreshing
    busy: Option<BSY>,
}

impl<DC, RST, BSY> ControlLines<DC, RST, BSY> {
    pub fn new(dc: DC, rst: Option<RST>, busy: Option<BSY>) -> Self {
        ControlLines { dc, rst, busy }
    }
}

impl<DC, RST, BSY> ControlLines<DC, RST, BSY>
where
    DC: OutputPin,
    RST: OutputPin,
    BSY: InputPin,
{
    /// Idle levels after power up: command mode, reset released
    pub fn setup(&mut self) -> Result<(), DisplayError> {
        self.dc.set_low().map_err(|_| DisplayError::DCError)?;
        if let Some(rst) = self.rst.as_mut() {
            rst.set_high().map_err(|_| DisplayError::RSError)?;
        }
        Ok(())
    }

    /// Pulse RST low for `duration`; a no-op without a reset line
    pub fn reset(
        &mut self,
        delay: &mut impl DelayNs,
        duration: Duration,
    ) -> Result<(), DisplayError> {
        let Some(rst) = self.rst.as_mut() else {
            log::debug!("No reset pin configured, skipping hardware reset");
            return Ok(());
        };
        rst.set_low().map_err(|_| DisplayError::RSError)?;
        delay.delay_ms(u32::try_from(duration.as_millis()).unwrap_or(u32::MAX));
        rst.set_high().map_err(|_| DisplayError::RSError)?;
        delay.delay_ms(RESET_SETTLE_MS);
        Ok(())
    }

    /// Wait for BUSY to go low, polling every millisecond
    ///
    /// Returns `false` when `timeout_ms` passes first. Without a busy line the
    /// panel is assumed idle.
    pub fn wait_until_idle(&mut self, delay: &mut impl DelayNs, timeout_ms: u32) -> bool {
        let Some(busy) = self.busy.as_mut() else {
            return true;
        };
        let mut waited = 0u32;
        loop {
            match busy.is_high() {
                Ok(false) => return true,
                Ok(true) => {}
                Err(_) => {
                    log::error!("Error reading BUSY pin state");
                    return false;
                }
            }
            if waited > timeout_ms {
                log::error!("Timeout while displaying image!");
                return false;
            }
            delay.delay_ms(1);
            waited += 1;
        }
    }
}
