//! TM1637 4-digit 7-segment display.
//!
//! The bus protocol comes from the `tm1637-embedded-hal` driver. This module decides
//! what reaches it: the chip has eight brightness steps, and the display task only
//! sends a frame or a brightness step when it differs from what is already shown.

use crate::alarm_time::Brightness;
use crate::segments::Frame;

/// Chip brightness step (`0..=7`) for a clock brightness (`0..=15`); two clock levels
/// share each step.
#[must_use]
pub const fn hardware_level(brightness: Brightness) -> u8 {
    match brightness.level() {
        0 | 1 => 0,
        2 | 3 => 1,
        4 | 5 => 2,
        6 | 7 => 3,
        8 | 9 => 4,
        10 | 11 => 5,
        12 | 13 => 6,
        _ => 7,
    }
}

/// What the display currently shows, as far as successful writes tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayState {
    frame: Option<Frame>,
    level: Option<u8>,
}

/// Writes needed to bring the display to a requested frame and brightness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisplayChanges {
    /// Segment bytes to send, if the frame differs.
    pub frame: Option<Frame>,
    /// Hardware step to send, if it differs.
    pub level: Option<u8>,
}

impl DisplayChanges {
    /// Nothing to send.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.frame.is_none() && self.level.is_none()
    }
}

impl DisplayState {
    /// Nothing shown yet, so the first request writes everything.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            frame: None,
            level: None,
        }
    }

    /// Compare a request with what is shown.
    #[must_use]
    pub fn changes(&self, frame: Frame, brightness: Brightness) -> DisplayChanges {
        let level = hardware_level(brightness);
        DisplayChanges {
            frame: (self.frame != Some(frame)).then_some(frame),
            level: (self.level != Some(level)).then_some(level),
        }
    }

    /// Record a frame the chip accepted.
    pub const fn frame_written(&mut self, frame: Frame) {
        self.frame = Some(frame);
    }

    /// Record a brightness step the chip accepted.
    pub const fn level_written(&mut self, level: u8) {
        self.level = Some(level);
    }
}

// ============================================================================
// Display device
// ============================================================================

#[cfg(any(feature = "pico1", feature = "pico2"))]
mod device {
    #![allow(clippy::future_not_send, reason = "single-threaded")]

    use core::convert::Infallible;

    use embassy_executor::Spawner;
    use embassy_rp::gpio::{Output, OutputOpenDrain};
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_sync::signal::Signal;
    use embassy_time::Delay;
    use tm1637_embedded_hal::{Brightness as ChipBrightness, TM1637Builder};

    use super::{DisplayState, hardware_level};
    use crate::alarm_time::Brightness;
    use crate::fmt::{info, warn};
    use crate::segments::{CELL_COUNT, Frame};
    use crate::{Error, Result};

    /// Half bit period of the two-wire bus.
    const BIT_DELAY_US: u32 = 100;

    /// Notifier carrying the latest frame and brightness to the display task.
    pub type Tm1637DisplayNotifier = Signal<CriticalSectionRawMutex, (Frame, Brightness)>;

    /// A TM1637 display refreshed by its own task.
    ///
    /// ```ignore
    /// static NOTIFIER: Tm1637DisplayNotifier = Tm1637Display::notifier();
    /// let display = Tm1637Display::new(
    ///     Output::new(p.PIN_2, Level::High),
    ///     OutputOpenDrain::new(p.PIN_3, Level::High),
    ///     &NOTIFIER,
    ///     spawner,
    /// )?;
    /// display.write(Frame::from_text("COnn"), Brightness::DEFAULT);
    /// ```
    pub struct Tm1637Display(&'static Tm1637DisplayNotifier);

    impl Tm1637Display {
        #[must_use]
        pub const fn notifier() -> Tm1637DisplayNotifier {
            Signal::new()
        }

        /// Spawn the display task.
        ///
        /// # Errors
        ///
        /// [`crate::Error::TaskSpawn`] if the task is already running.
        pub fn new(
            clk: Output<'static>,
            dio: OutputOpenDrain<'static>,
            notifier: &'static Tm1637DisplayNotifier,
            spawner: Spawner,
        ) -> Result<Self> {
            let token = tm1637_device_loop(clk, dio, notifier)?;
            spawner.spawn(token);
            Ok(Self(notifier))
        }

        /// Show `frame` at `brightness`. Only changes reach the bus.
        pub fn write(&self, frame: Frame, brightness: Brightness) {
            self.0.signal((frame, brightness));
        }
    }

    const fn chip_brightness(level: u8) -> ChipBrightness {
        match level {
            0 => ChipBrightness::L0,
            1 => ChipBrightness::L1,
            2 => ChipBrightness::L2,
            3 => ChipBrightness::L3,
            4 => ChipBrightness::L4,
            5 => ChipBrightness::L5,
            6 => ChipBrightness::L6,
            _ => ChipBrightness::L7,
        }
    }

    #[embassy_executor::task]
    async fn tm1637_device_loop(
        clk: Output<'static>,
        dio: OutputOpenDrain<'static>,
        notifier: &'static Tm1637DisplayNotifier,
    ) -> ! {
        let err = inner_tm1637_device_loop(clk, dio, notifier)
            .await
            .unwrap_err();
        core::panic!("{err}");
    }

    async fn inner_tm1637_device_loop(
        clk: Output<'static>,
        dio: OutputOpenDrain<'static>,
        notifier: &'static Tm1637DisplayNotifier,
    ) -> Result<Infallible> {
        let initial = hardware_level(Brightness::DEFAULT);
        let mut driver = TM1637Builder::new(clk, dio, Delay)
            .brightness(chip_brightness(initial))
            .delay_us(BIT_DELAY_US)
            .build_blocking::<CELL_COUNT>();
        driver.init().map_err(|_| Error::DisplayWrite)?;
        info!("TM1637 display task started");

        let mut shown = DisplayState::new();
        shown.level_written(initial);
        loop {
            let (frame, brightness) = notifier.wait().await;
            let changes = shown.changes(frame, brightness);
            if changes.is_empty() {
                continue;
            }

            if let Some(frame) = changes.frame {
                #[cfg(feature = "display-trace")]
                info!("Display frame {:?}", frame);
                match driver
                    .display_slice(0, &frame.0)
                    .map_err(|_| Error::DisplayWrite)
                {
                    Ok(()) => shown.frame_written(frame),
                    Err(err) => warn!("{}", err),
                }
            }
            if let Some(level) = changes.level {
                info!("Display brightness {} (step {})", brightness.level(), level);
                match driver
                    .set_brightness(chip_brightness(level))
                    .map_err(|_| Error::DisplayWrite)
                {
                    Ok(()) => shown.level_written(level),
                    Err(err) => warn!("{}", err),
                }
            }
        }
    }
}

#[cfg(any(feature = "pico1", feature = "pico2"))]
pub use device::{Tm1637Display, Tm1637DisplayNotifier};
