//! Compile-time configuration: credentials and zone from the build environment, timing constants.

use embassy_time::Duration;

pub use crate::button::{BRIGHTNESS_PRESS_DURATION, HOLD_REPEAT_INTERVAL, LONG_PRESS_DURATION};
pub use crate::time_source::{MAX_ATTEMPTS_FOR_TIME, NTP_SERVER, NTP_TIMEOUT};
use crate::time_source::TimeSourceConfig;

/// Interval between time syncs.
pub const SYNC_TIME: Duration = Duration::from_secs(180);
/// A setting mode with no button activity for longer than this returns to normal.
pub const WATCH_DOG_MAX_TIME: Duration = Duration::from_secs(10);
/// The alarm stops by itself after ringing this long.
pub const MAX_ALARM_TIME: Duration = Duration::from_secs(600);
/// How long a status word such as `GOOd` or `Err` stays up.
pub const MESSAGE_DURATION: Duration = Duration::from_secs(2);
/// Half period of the edit-field blink.
pub const BLINK_INTERVAL: Duration = Duration::from_millis(500);
/// How long `dAtE` shows before the date itself.
pub const DATE_INTRO_DURATION: Duration = Duration::from_secs(1);
/// How long the date shows.
pub const DATE_DURATION: Duration = Duration::from_secs(2);
/// How long `brIt` shows on entering brightness setting.
pub const BRIGHTNESS_INTRO_DURATION: Duration = Duration::from_secs(1);
/// Control loop tick.
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);
/// Zone offset used until a time source reports one: India Standard Time.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;
/// Westernmost accepted offset, UTC-12:00.
pub const MIN_UTC_OFFSET_MINUTES: i32 = -720;
/// Easternmost accepted offset, UTC+14:00.
pub const MAX_UTC_OFFSET_MINUTES: i32 = 840;

/// Settings baked in at build time from `WIFI_SSID`, `WIFI_PASS`, `UTC_OFFSET_MINUTES`,
/// `TIMEZONEDB_KEY` and `TIMEZONE` (see `build.rs`).
///
/// The Wi-Fi pair only seeds the first boot; credentials entered in the provisioning
/// portal are kept in flash and take precedence.
#[derive(Debug, Clone, Copy)]
pub struct AlarmClockConfig {
    pub wifi_ssid: &'static str,
    pub wifi_pass: &'static str,
    pub utc_offset_minutes: i32,
    pub timezonedb_key: &'static str,
    pub timezone: &'static str,
}

impl AlarmClockConfig {
    /// Read the values `build.rs` exported.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            wifi_ssid: env!("WIFI_SSID"),
            wifi_pass: env!("WIFI_PASS"),
            utc_offset_minutes: parse_offset_minutes(env!("UTC_OFFSET_MINUTES")),
            timezonedb_key: env!("TIMEZONEDB_KEY"),
            timezone: env!("TIMEZONE"),
        }
    }

    /// Time source settings for this configuration.
    #[must_use]
    pub const fn time_source(&self) -> TimeSourceConfig<'static> {
        TimeSourceConfig::new(self.timezonedb_key, self.timezone)
    }
}

/// Parse a signed minute offset, falling back to [`DEFAULT_UTC_OFFSET_MINUTES`]
/// for anything outside UTC-12:00..=UTC+14:00.
#[must_use]
pub fn parse_offset_minutes(text: &str) -> i32 {
    text.trim()
        .parse::<i32>()
        .ok()
        .filter(|minutes| (MIN_UTC_OFFSET_MINUTES..=MAX_UTC_OFFSET_MINUTES).contains(minutes))
        .unwrap_or(DEFAULT_UTC_OFFSET_MINUTES)
}
