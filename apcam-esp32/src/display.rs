use anyhow::{anyhow, Result};
use display_interface_spi::SPIInterface;
use embedded_graphics::mono_font::{ascii::FONT_10X20, MonoTextStyle};
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Alignment, Text};
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{AnyIOPin, AnyOutputPin, Output, PinDriver};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::spi::{config, SpiAnyPins, SpiDeviceDriver, SpiDriver};
use esp_idf_hal::units::FromValueType;
use log::info;
use mipidsi::{models::ST7789, options::ColorInversion, Builder};

use crate::config::pin;
use crate::Config;

type Spi = SpiDeviceDriver<'static, SpiDriver<'static>>;
type Line = PinDriver<'static, AnyOutputPin, Output>;
type Panel = mipidsi::Display<SPIInterface<Spi, Line>, ST7789, Line>;

const WIDTH: u16 = 240;
const HEIGHT: u16 = 240;
const LINE_HEIGHT: i32 = 30;

/// 240x240 ST7789 panel showing a few lines of boot status.
pub struct StatusDisplay {
    panel: Panel,
    _backlight: Option<Line>,
}

fn output(number: i32) -> Result<Line> {
    // SAFETY: display lines come from cfg.toml and are not claimed elsewhere
    let pin = unsafe { AnyOutputPin::new(number) };
    Ok(PinDriver::output(pin)?)
}

impl StatusDisplay {
    /// `None` when cfg.toml leaves the clock, data, DC or reset line unset.
    pub fn new<SPI: SpiAnyPins>(
        spi: impl Peripheral<P = SPI> + 'static,
        cfg: &Config,
    ) -> Result<Option<Self>> {
        let (Some(sclk), Some(mosi), Some(dc), Some(rst)) = (
            pin(cfg.display_sclk),
            pin(cfg.display_mosi),
            pin(cfg.display_dc),
            pin(cfg.display_rst),
        ) else {
            info!("No display pins configured");
            return Ok(None);
        };

        let driver = SpiDriver::new(
            spi,
            unsafe { AnyOutputPin::new(sclk) },
            unsafe { AnyOutputPin::new(mosi) },
            None::<AnyIOPin>,
            &config::DriverConfig::new(),
        )?;
        let cs = pin(cfg.display_cs).map(|n| unsafe { AnyOutputPin::new(n) });
        let spi = SpiDeviceDriver::new(driver, cs, &config::Config::new().baudrate(40.MHz().into()))?;

        let di = SPIInterface::new(spi, output(dc)?);
        let panel = Builder::new(ST7789, di)
            .reset_pin(output(rst)?)
            .display_size(WIDTH, HEIGHT)
            .invert_colors(ColorInversion::Inverted)
            .init(&mut FreeRtos)
            .map_err(|e| anyhow!("display init failed: {:?}", e))?;

        let backlight = match pin(cfg.display_backlight) {
            Some(n) => {
                let mut line = output(n)?;
                line.set_high()?;
                Some(line)
            }
            None => None,
        };

        info!("ST7789 display ready");
        Ok(Some(Self {
            panel,
            _backlight: backlight,
        }))
    }

    /// Clears the screen and draws `lines` centered, top to bottom.
    pub fn show(&mut self, lines: &[&str]) -> Result<()> {
        self.panel
            .clear(Rgb565::BLACK)
            .map_err(|e| anyhow!("display clear failed: {:?}", e))?;

        let style = MonoTextStyle::new(&FONT_10X20, Rgb565::WHITE);
        let x = WIDTH as i32 / 2;
        let mut y = LINE_HEIGHT * 2;
        for line in lines {
            Text::with_alignment(line, Point::new(x, y), style, Alignment::Center)
                .draw(&mut self.panel)
                .map_err(|e| anyhow!("display draw failed: {:?}", e))?;
            y += LINE_HEIGHT;
        }
        Ok(())
    }
}
