//! A Wi-Fi synchronized alarm clock for the Raspberry Pi Pico W: TM1637 display,
//! passive buzzer and a single button.
//!
//! The clock logic ([`AlarmClock`]), the time source policy ([`time_source`]), the
//! wire codecs, persistence and the provisioning portal's protocol handling are
//! hardware independent and tested on the host.
//! Device tasks (display, button, beeper, Wi-Fi, time sync) need the `pico1` or
//! `pico2` feature, and the network ones also need `wifi`.
#![no_std]

mod fmt;

pub mod alarm_clock;
pub mod alarm_time;
pub mod button;
pub mod buzzer;
pub mod config;
pub mod credential_store;
pub mod eeprom;
mod error;
pub mod melody;
pub mod ntp;
pub mod segments;
pub mod settings;
pub mod time_source;
pub mod timezonedb;
pub mod tm1637;
pub mod unix_seconds;
pub mod wall_clock;
pub mod wifi_auto;

#[cfg(all(feature = "wifi", any(feature = "pico1", feature = "pico2")))]
pub mod time_sync;
#[cfg(all(feature = "wifi", any(feature = "pico1", feature = "pico2")))]
pub mod wifi;

// Re-export commonly used items
pub use alarm_clock::{AlarmClock, AlarmSettingSubMode, ClockMode, Effect, Event};
pub use alarm_time::{AlarmTime, Brightness};
pub use button::{ButtonEvent, PressDuration};
pub use config::AlarmClockConfig;
pub use error::{Error, Result};
pub use segments::{Frame, Message};
pub use settings::{ByteStore, RamStore, Settings};
pub use time_source::{TimeError, TimeSample, TimeTransport, acquire_time};
pub use unix_seconds::UnixSeconds;
