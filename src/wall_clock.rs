//! Local wall-clock time derived from the last time sync plus the monotonic clock.
//!
//! Between syncs the clock runs from [`Instant`], so the displayed time keeps
//! advancing after a failed sync.

use embassy_time::Instant;
use time::UtcOffset;

use crate::unix_seconds::UnixSeconds;

/// Broken-down local time used for display and alarm matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LocalTime {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub day: u8,
    pub month: u8,
    /// Local minutes since the epoch; identifies one wall-clock minute.
    pub minute_index: i64,
}

/// Time of day anchored to a sync point.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    anchor: Option<(UnixSeconds, Instant)>,
    utc_offset_minutes: i32,
}

impl WallClock {
    /// A clock with no time yet, using the given zone offset.
    #[must_use]
    pub const fn new(utc_offset_minutes: i32) -> Self {
        Self {
            anchor: None,
            utc_offset_minutes,
        }
    }

    /// Record that it was `unix_seconds` UTC at monotonic instant `at`.
    pub const fn set(&mut self, unix_seconds: UnixSeconds, at: Instant) {
        self.anchor = Some((unix_seconds, at));
    }

    pub const fn set_utc_offset_minutes(&mut self, utc_offset_minutes: i32) {
        self.utc_offset_minutes = utc_offset_minutes;
    }

    /// UTC time at `now`, or `None` before the first sync.
    #[must_use]
    pub fn unix_seconds(&self, now: Instant) -> Option<UnixSeconds> {
        let (anchor_seconds, anchor_instant) = self.anchor?;
        let elapsed = now.saturating_duration_since(anchor_instant).as_secs();
        Some(anchor_seconds.saturating_add_secs(i64::try_from(elapsed).unwrap_or(i64::MAX)))
    }

    /// Local time at `now`, or `None` before the first sync.
    #[must_use]
    pub fn local_time(&self, now: Instant) -> Option<LocalTime> {
        let unix_seconds = self.unix_seconds(now)?;
        let offset = UtcOffset::from_whole_seconds(self.utc_offset_minutes.saturating_mul(60))
            .unwrap_or(UtcOffset::UTC);
        let datetime = unix_seconds.to_offset_datetime(offset)?;
        Some(LocalTime {
            hour: datetime.hour(),
            minute: datetime.minute(),
            second: datetime.second(),
            day: datetime.day(),
            month: u8::from(datetime.month()),
            minute_index: unix_seconds.local_minute_index(self.utc_offset_minutes),
        })
    }
}
