//! Alarm time and display brightness values, with their wrap and clamp rules.

/// Minutes in an hour; minute adjustments wrap at this modulus.
const MINUTES_PER_HOUR: u8 = 60;
/// Hours in a day; hour adjustments wrap at this modulus.
const HOURS_PER_DAY: u8 = 24;

/// Hour and minute at which the alarm rings, local time.
///
/// Always holds `hours < 24` and `minutes < 60`. Persisted and displayed as a
/// single `HHMM` integer (e.g. `730` for 07:30).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmTime {
    hours: u8,
    minutes: u8,
}

impl AlarmTime {
    /// 22:00, used when nothing valid is stored.
    pub const DEFAULT: Self = Self {
        hours: 22,
        minutes: 0,
    };

    /// Build from hours and minutes, rejecting out-of-range values.
    #[must_use]
    pub const fn new(hours: u8, minutes: u8) -> Option<Self> {
        if hours < HOURS_PER_DAY && minutes < MINUTES_PER_HOUR {
            Some(Self { hours, minutes })
        } else {
            None
        }
    }

    /// Unpack an `HHMM` integer.
    ///
    /// ```
    /// use alarm_kit::AlarmTime;
    ///
    /// let alarm = AlarmTime::from_hhmm(730).unwrap();
    /// assert_eq!((alarm.hours(), alarm.minutes()), (7, 30));
    /// assert!(AlarmTime::from_hhmm(2360).is_none());
    /// ```
    #[must_use]
    #[expect(
        clippy::integer_division_remainder_used,
        reason = "splits decimal digit pairs"
    )]
    pub fn from_hhmm(hhmm: u16) -> Option<Self> {
        let hours = u8::try_from(hhmm / 100).ok()?;
        let minutes = u8::try_from(hhmm % 100).ok()?;
        Self::new(hours, minutes)
    }

    /// Pack into an `HHMM` integer.
    #[must_use]
    #[expect(
        clippy::arithmetic_side_effects,
        reason = "hours < 24 and minutes < 60 keep the result below 2400"
    )]
    pub fn to_hhmm(self) -> u16 {
        u16::from(self.hours) * 100 + u16::from(self.minutes)
    }

    #[must_use]
    pub const fn hours(self) -> u8 {
        self.hours
    }

    #[must_use]
    pub const fn minutes(self) -> u8 {
        self.minutes
    }

    /// Advance the minutes by one, wrapping 59 to 0 without touching the hours.
    #[must_use]
    pub const fn increment_minute(self) -> Self {
        Self {
            hours: self.hours,
            minutes: wrapping_next(self.minutes, MINUTES_PER_HOUR),
        }
    }

    /// Advance the hours by one, wrapping 23 to 0 without touching the minutes.
    #[must_use]
    pub const fn increment_hour(self) -> Self {
        Self {
            hours: wrapping_next(self.hours, HOURS_PER_DAY),
            minutes: self.minutes,
        }
    }

    /// Whether the alarm falls in the daytime window 06:00..18:00.
    #[must_use]
    pub const fn is_daytime(self) -> bool {
        self.hours >= 6 && self.hours < 18
    }
}

/// `value + 1`, back to 0 on reaching `modulus`.
const fn wrapping_next(value: u8, modulus: u8) -> u8 {
    let next = value.saturating_add(1);
    if next >= modulus { 0 } else { next }
}

impl Default for AlarmTime {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ============================================================================
// Brightness
// ============================================================================

/// Which way a held button moves the brightness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BrightnessDirection {
    #[default]
    Up,
    Down,
}

/// Display brightness in `0..=15`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Brightness(u8);

impl Brightness {
    /// Dimmest level.
    pub const MIN: Self = Self(0);
    /// Brightest level.
    pub const MAX: Self = Self(15);
    /// Level used when nothing valid is stored.
    pub const DEFAULT: Self = Self(0xA);

    /// Build from a raw level, clamping into `0..=15`.
    #[must_use]
    pub const fn new(level: u8) -> Self {
        if level > Self::MAX.0 {
            Self::MAX
        } else {
            Self(level)
        }
    }

    /// Build from a raw level, rejecting values above 15.
    #[must_use]
    pub const fn checked(level: u8) -> Option<Self> {
        if level > Self::MAX.0 {
            None
        } else {
            Some(Self(level))
        }
    }

    #[must_use]
    pub const fn level(self) -> u8 {
        self.0
    }

    /// One step in `direction`, saturating at both ends.
    #[must_use]
    pub const fn step(self, direction: BrightnessDirection) -> Self {
        match direction {
            BrightnessDirection::Up => Self::new(self.0.saturating_add(1)),
            BrightnessDirection::Down => Self(self.0.saturating_sub(1)),
        }
    }

    /// Direction to use for a new hold, given the direction of the previous one.
    ///
    /// At either end the only useful direction is away from it.
    #[must_use]
    pub const fn direction_for_hold(self, previous: BrightnessDirection) -> BrightnessDirection {
        if self.0 == Self::MAX.0 {
            BrightnessDirection::Down
        } else if self.0 == Self::MIN.0 {
            BrightnessDirection::Up
        } else {
            previous
        }
    }
}

impl Default for Brightness {
    fn default() -> Self {
        Self::DEFAULT
    }
}
