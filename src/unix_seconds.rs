//! Unix timestamp type shared by the time source and the wall clock.

use time::{OffsetDateTime, UtcOffset};

/// Seconds between the NTP epoch (1900-01-01) and the Unix epoch (1970-01-01).
pub const NTP_TO_UNIX_SECONDS: i64 = 2_208_988_800;
/// Unix time of the start of NTP era 1 (2036-02-07 06:28:16 UTC), where the 32-bit
/// seconds field wraps to zero.
pub const NTP_ERA_1_UNIX_SECONDS: i64 = 2_085_978_496;

/// Units-safe wrapper for Unix timestamps (seconds since 1970-01-01 00:00:00 UTC)
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UnixSeconds(pub i64);

impl UnixSeconds {
    /// Get the underlying i64 value
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }

    /// Convert an NTP seconds field to Unix seconds.
    ///
    /// Values at or past the 1970 offset are era 0 (1970 to 2036). Smaller values
    /// cannot be a current time in era 0, so they are read as era 1, which starts on
    /// 2036-02-07. Zero is what an unsynchronized server sends and gives `None`, as
    /// does the 1970 epoch itself.
    ///
    /// ```
    /// use alarm_kit::UnixSeconds;
    ///
    /// assert_eq!(UnixSeconds::from_ntp_seconds(2_208_988_801), Some(UnixSeconds(1)));
    /// assert_eq!(UnixSeconds::from_ntp_seconds(1), Some(UnixSeconds(2_085_978_497)));
    /// assert_eq!(UnixSeconds::from_ntp_seconds(0), None);
    /// ```
    #[must_use]
    pub fn from_ntp_seconds(ntp: u32) -> Option<Self> {
        if ntp == 0 {
            return None;
        }
        let ntp = i64::from(ntp);
        let unix = if ntp >= NTP_TO_UNIX_SECONDS {
            ntp.checked_sub(NTP_TO_UNIX_SECONDS)?
        } else {
            ntp.checked_add(NTP_ERA_1_UNIX_SECONDS)?
        };
        (unix > 0).then_some(Self(unix))
    }

    /// Move the timestamp forward by whole seconds, saturating at `i64::MAX`.
    #[must_use]
    pub const fn saturating_add_secs(self, seconds: i64) -> Self {
        Self(self.0.saturating_add(seconds))
    }

    /// Local seconds after applying a UTC offset in minutes.
    #[must_use]
    pub fn local_seconds(self, utc_offset_minutes: i32) -> i64 {
        self.0
            .saturating_add(i64::from(utc_offset_minutes).saturating_mul(60))
    }

    /// Index of the local minute since the epoch; equal for all seconds of one wall-clock minute.
    #[must_use]
    pub fn local_minute_index(self, utc_offset_minutes: i32) -> i64 {
        self.local_seconds(utc_offset_minutes).div_euclid(60)
    }

    /// Convert to `OffsetDateTime` in the given offset.
    #[must_use]
    pub fn to_offset_datetime(self, offset: UtcOffset) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp(self.as_i64())
            .ok()
            .map(|dt| dt.to_offset(offset))
    }
}
