//! Single push button: press, held-repeat and release events.
//!
//! The event types and timing constants are plain data and build everywhere; the
//! GPIO task that produces them needs an RP board feature.

use embassy_time::Duration;

/// Debounce settle time after each edge.
pub const BUTTON_DEBOUNCE_DELAY: Duration = Duration::from_millis(10);
/// Holding at least this long makes a press long, and starts held repeats.
pub const LONG_PRESS_DURATION: Duration = Duration::from_millis(1000);
/// Interval between held repeats after the first one.
pub const HOLD_REPEAT_INTERVAL: Duration = Duration::from_millis(250);
/// Holding at least this long in normal mode selects brightness setting.
pub const BRIGHTNESS_PRESS_DURATION: Duration = Duration::from_millis(3000);

/// What the button did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonEvent {
    /// The button went down (after debouncing).
    Pressed,
    /// Still down; sent at [`LONG_PRESS_DURATION`] and every [`HOLD_REPEAT_INTERVAL`] after.
    /// `repeat_count` starts at 1.
    Held {
        duration: Duration,
        repeat_count: u16,
    },
    /// The button came back up after being down for `duration`.
    Released { duration: Duration },
}

// Instead of describing a short vs a long press with a `bool`, an `enum` says what
// each state means. It compiles to the same byte.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PressDuration {
    #[default]
    Short,
    Long,
}

// `PressDuration` alone owns the threshold between a short and a long press.
impl From<Duration> for PressDuration {
    fn from(duration: Duration) -> Self {
        if duration >= LONG_PRESS_DURATION {
            Self::Long
        } else {
            Self::Short
        }
    }
}

/// When the `repeat_count`-th held event fires, measured from the press.
#[must_use]
pub fn held_offset(repeat_count: u16) -> Duration {
    HOLD_REPEAT_INTERVAL
        .checked_mul(u32::from(repeat_count.saturating_sub(1)))
        .and_then(|repeats| LONG_PRESS_DURATION.checked_add(repeats))
        .unwrap_or(Duration::MAX)
}

// ============================================================================
// Button device
// ============================================================================

#[cfg(any(feature = "pico1", feature = "pico2"))]
mod device {
    #![allow(clippy::future_not_send, reason = "single-threaded")]

    use core::convert::Infallible;

    use embassy_executor::Spawner;
    use embassy_futures::select::{Either, select};
    use embassy_rp::gpio::Input;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_sync::channel::Channel;
    use embassy_time::{Instant, Timer};
    use static_cell::StaticCell;

    use super::{BUTTON_DEBOUNCE_DELAY, ButtonEvent, held_offset};
    use crate::Result;
    use crate::fmt::{debug, info};

    /// Queued events; deep enough that a slow consumer loses no press or release.
    pub type ButtonEvents = Channel<CriticalSectionRawMutex, ButtonEvent, 8>;

    /// Static resources for [`Button`].
    pub struct ButtonStatic {
        events: ButtonEvents,
        button_cell: StaticCell<Button>,
    }

    /// A debounced, active-high push button running in its own task.
    ///
    /// ```ignore
    /// static BUTTON_STATIC: ButtonStatic = Button::new_static();
    /// let button = Button::new(&BUTTON_STATIC, Input::new(p.PIN_13, Pull::Down), spawner)?;
    /// loop {
    ///     let event = button.wait().await;
    /// }
    /// ```
    pub struct Button {
        events: &'static ButtonEvents,
    }

    impl Button {
        #[must_use]
        pub const fn new_static() -> ButtonStatic {
            ButtonStatic {
                events: Channel::new(),
                button_cell: StaticCell::new(),
            }
        }

        /// Spawn the button task on `input` (pulled down, high while pressed).
        ///
        /// # Errors
        ///
        /// [`crate::Error::TaskSpawn`] if the task is already running.
        pub fn new(
            button_static: &'static ButtonStatic,
            input: Input<'static>,
            spawner: Spawner,
        ) -> Result<&'static Self> {
            let token = button_device_loop(input, &button_static.events)?;
            spawner.spawn(token);
            Ok(button_static.button_cell.init(Self {
                events: &button_static.events,
            }))
        }

        /// Wait for the next event.
        pub async fn wait(&self) -> ButtonEvent {
            self.events.receive().await
        }
    }

    #[embassy_executor::task]
    async fn button_device_loop(input: Input<'static>, events: &'static ButtonEvents) -> ! {
        let err = inner_button_device_loop(input, events).await.unwrap_err();
        core::panic!("{err}");
    }

    async fn inner_button_device_loop(
        mut input: Input<'static>,
        events: &'static ButtonEvents,
    ) -> Result<Infallible> {
        info!("Button task started");
        loop {
            // Contacts bounce on the way down and up; ignore the pin while they settle.
            input.wait_for_high().await;
            Timer::after(BUTTON_DEBOUNCE_DELAY).await;
            if input.is_low() {
                continue;
            }

            let pressed_at = Instant::now();
            events.send(ButtonEvent::Pressed).await;

            let mut repeat_count: u16 = 1;
            loop {
                let next_held = pressed_at
                    .checked_add(held_offset(repeat_count))
                    .unwrap_or(Instant::MAX);
                match select(input.wait_for_low(), Timer::at(next_held)).await {
                    Either::First(()) => break,
                    Either::Second(()) => {
                        let held = ButtonEvent::Held {
                            duration: pressed_at.elapsed(),
                            repeat_count,
                        };
                        // A full queue drops repeats, never presses or releases.
                        if events.try_send(held).is_err() {
                            debug!("Held event {} dropped", repeat_count);
                        }
                        repeat_count = repeat_count.saturating_add(1);
                    }
                }
            }

            let duration = pressed_at.elapsed();
            events.send(ButtonEvent::Released { duration }).await;
            info!("Button released after {} ms", duration.as_millis());
            Timer::after(BUTTON_DEBOUNCE_DELAY).await;
        }
    }
}

#[cfg(any(feature = "pico1", feature = "pico2"))]
pub use device::{Button, ButtonEvents, ButtonStatic};
