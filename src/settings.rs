//! Persisted alarm and display settings, one byte each at fixed offsets.

use crate::alarm_time::{AlarmTime, Brightness};
use crate::fmt::{info, warn};
use crate::{Error, Result};

/// Byte offset of the alarm hour.
pub const ALARM_HOURS_ADDR: usize = 0;
/// Byte offset of the alarm minute.
pub const ALARM_MINUTES_ADDR: usize = 1;
/// Byte offset of the display brightness.
pub const BRIGHTNESS_ADDR: usize = 2;
/// Byte offset of the alarm enabled flag (0 or 1).
pub const ALARM_ENABLED_ADDR: usize = 3;
/// Bytes used by [`Settings`].
pub const SETTINGS_LEN: usize = 4;

/// Value of a never-written byte.
const ERASED: u8 = 0xFF;

// ============================================================================
// Byte store
// ============================================================================

/// Byte-addressed non-volatile storage with an explicit commit.
pub trait ByteStore {
    /// Read the byte at `addr`.
    ///
    /// # Errors
    ///
    /// [`Error::AddressOutOfRange`] if `addr` is past the end of the store.
    fn read(&mut self, addr: usize) -> Result<u8>;

    /// Stage a write of `value` at `addr`. Takes effect for reads immediately and
    /// survives power loss after [`ByteStore::commit`].
    ///
    /// # Errors
    ///
    /// [`Error::AddressOutOfRange`] if `addr` is past the end of the store.
    fn write(&mut self, addr: usize, value: u8) -> Result<()>;

    /// Make staged writes durable.
    ///
    /// # Errors
    ///
    /// Backend-specific failures, such as [`Error::Flash`](crate::Error).
    fn commit(&mut self) -> Result<()>;
}

/// In-memory store, erased to `0xFF`; counts commits so tests can observe them.
#[derive(Debug, Clone)]
pub struct RamStore<const N: usize> {
    bytes: [u8; N],
    writes: usize,
    commits: usize,
}

impl<const N: usize> RamStore<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bytes: [ERASED; N],
            writes: 0,
            commits: 0,
        }
    }

    #[must_use]
    pub const fn bytes(&self) -> &[u8; N] {
        &self.bytes
    }

    /// Number of byte writes since creation.
    #[must_use]
    pub const fn writes(&self) -> usize {
        self.writes
    }

    /// Number of commits since creation.
    #[must_use]
    pub const fn commits(&self) -> usize {
        self.commits
    }
}

impl<const N: usize> Default for RamStore<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ByteStore for RamStore<N> {
    fn read(&mut self, addr: usize) -> Result<u8> {
        self.bytes
            .get(addr)
            .copied()
            .ok_or(Error::AddressOutOfRange(addr))
    }

    fn write(&mut self, addr: usize, value: u8) -> Result<()> {
        let byte = self
            .bytes
            .get_mut(addr)
            .ok_or(Error::AddressOutOfRange(addr))?;
        *byte = value;
        self.writes = self.writes.saturating_add(1);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.commits = self.commits.saturating_add(1);
        Ok(())
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Everything the clock remembers across power cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Settings {
    pub alarm_time: AlarmTime,
    pub alarm_enabled: bool,
    pub brightness: Brightness,
}

impl Settings {
    /// Read settings, replacing each invalid or erased field with its default.
    ///
    /// ```
    /// use alarm_kit::settings::{RamStore, Settings};
    ///
    /// let mut store = RamStore::<16>::new();
    /// let settings = Settings::load(&mut store).unwrap();
    /// assert_eq!(settings, Settings::default());
    /// ```
    ///
    /// # Errors
    ///
    /// Propagates read failures from the store.
    pub fn load<S: ByteStore + ?Sized>(store: &mut S) -> Result<Self> {
        let hours = store.read(ALARM_HOURS_ADDR)?;
        let minutes = store.read(ALARM_MINUTES_ADDR)?;
        let brightness = store.read(BRIGHTNESS_ADDR)?;
        let enabled = store.read(ALARM_ENABLED_ADDR)?;

        let alarm_time = AlarmTime::new(hours, minutes).unwrap_or_else(|| {
            warn!("Stored alarm {}:{} invalid; using default", hours, minutes);
            AlarmTime::DEFAULT
        });
        let brightness = Brightness::checked(brightness).unwrap_or_else(|| {
            warn!("Stored brightness {} invalid; using default", brightness);
            Brightness::DEFAULT
        });
        let alarm_enabled = enabled == 1;

        let settings = Self {
            alarm_time,
            alarm_enabled,
            brightness,
        };
        info!("Loaded settings {:?}", settings);
        Ok(settings)
    }

    /// Write the fields that differ from what is stored, then commit once.
    ///
    /// Returns whether anything was written.
    ///
    /// # Errors
    ///
    /// Propagates read, write and commit failures from the store.
    pub fn save<S: ByteStore + ?Sized>(&self, store: &mut S) -> Result<bool> {
        let image = self.to_bytes();
        let mut changed = false;
        for (addr, value) in image.into_iter().enumerate() {
            if store.read(addr)? != value {
                store.write(addr, value)?;
                changed = true;
            }
        }
        if changed {
            store.commit()?;
            info!("Saved settings {:?}", self);
        }
        Ok(changed)
    }

    /// Byte image in storage order.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; SETTINGS_LEN] {
        let mut bytes = [0_u8; SETTINGS_LEN];
        for (addr, value) in [
            (ALARM_HOURS_ADDR, self.alarm_time.hours()),
            (ALARM_MINUTES_ADDR, self.alarm_time.minutes()),
            (BRIGHTNESS_ADDR, self.brightness.level()),
            (ALARM_ENABLED_ADDR, u8::from(self.alarm_enabled)),
        ] {
            if let Some(byte) = bytes.get_mut(addr) {
                *byte = value;
            }
        }
        bytes
    }
}
