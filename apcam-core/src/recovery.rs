//! Line-level recovery for a wedged sensor: two-wire bus unsticking and
//! power-down/reset pulsing, over `embedded-hal` pins.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{Error as _, ErrorKind, InputPin, OutputPin};

/// Half clock period for the bit-banged recovery, roughly 100 kHz.
const HALF_PERIOD_US: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusRecovery {
    /// SCL pulses issued before SDA went high.
    pub pulses: u8,
    /// SDA read high once the sequence ended.
    pub released: bool,
}

/// Clocks SCL until a peripheral holding SDA low lets go (at most
/// `max_pulses` times), then issues a STOP condition.
///
/// `sda` must be configured open-drain so it can be both read and driven.
pub fn recover_bus<C, D, T>(
    scl: &mut C,
    sda: &mut D,
    delay: &mut T,
    max_pulses: u8,
) -> Result<BusRecovery, ErrorKind>
where
    C: OutputPin,
    D: InputPin + OutputPin,
    T: DelayNs + ?Sized,
{
    sda.set_high().map_err(|e| e.kind())?;
    scl.set_high().map_err(|e| e.kind())?;
    delay.delay_us(HALF_PERIOD_US);

    let mut pulses = 0;
    while pulses < max_pulses && sda.is_low().map_err(|e| e.kind())? {
        scl.set_low().map_err(|e| e.kind())?;
        delay.delay_us(HALF_PERIOD_US);
        scl.set_high().map_err(|e| e.kind())?;
        delay.delay_us(HALF_PERIOD_US);
        pulses += 1;
    }
    let released = sda.is_high().map_err(|e| e.kind())?;

    // STOP: SDA rises while SCL is high
    scl.set_low().map_err(|e| e.kind())?;
    sda.set_low().map_err(|e| e.kind())?;
    delay.delay_us(HALF_PERIOD_US);
    scl.set_high().map_err(|e| e.kind())?;
    delay.delay_us(HALF_PERIOD_US);
    sda.set_high().map_err(|e| e.kind())?;
    delay.delay_us(HALF_PERIOD_US);

    Ok(BusRecovery { pulses, released })
}

/// Which level puts a control line into its active state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// PWDN style: high powers the sensor down.
    ActiveHigh,
    /// RESET style: low holds the sensor in reset.
    ActiveLow,
}

/// Drives `pin` into its active state for `hold_ms`, back to inactive, then
/// waits `settle_ms` for the sensor to come up.
pub fn pulse_line<P, T>(
    pin: &mut P,
    polarity: Polarity,
    delay: &mut T,
    hold_ms: u32,
    settle_ms: u32,
) -> Result<(), ErrorKind>
where
    P: OutputPin,
    T: DelayNs + ?Sized,
{
    let set = |pin: &mut P, active: bool| {
        let result = if active == (polarity == Polarity::ActiveHigh) {
            pin.set_high()
        } else {
            pin.set_low()
        };
        result.map_err(|e| e.kind())
    };

    set(&mut *pin, true)?;
    delay.delay_ms(hold_ms);
    set(&mut *pin, false)?;
    delay.delay_ms(settle_ms);
    Ok(())
}
