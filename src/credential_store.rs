//! Wi-Fi credentials and the start mode, kept in their own flash sector.
//!
//! Record layout (little-endian):
//!
//! | bytes          | field                              |
//! |----------------|------------------------------------|
//! | 0..4           | magic `'WIFI'`                     |
//! | 4..6           | payload length `n`                 |
//! | 6..6+n         | postcard-encoded [`WifiRecord`]    |
//! | 6+n..10+n      | CRC-32 of bytes 0..6+n             |
//!
//! An erased sector or a foreign magic reads as "nothing stored".

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Longest SSID the radio accepts.
pub const SSID_CAPACITY: usize = 32;
/// Longest WPA2 passphrase.
pub const PASSWORD_CAPACITY: usize = 64;
/// Largest encoded [`WifiRecord`].
pub const MAX_PAYLOAD_LEN: usize = 128;
/// Bytes of the largest record image.
pub const RECORD_CAPACITY: usize = PAYLOAD_OFFSET + MAX_PAYLOAD_LEN + CRC_LEN;

const MAGIC: u32 = 0x5749_4649; // 'WIFI'
const LEN_OFFSET: usize = 4;
const PAYLOAD_OFFSET: usize = 6;
const CRC_LEN: usize = 4;

/// Network name and passphrase. An empty passphrase joins an open network.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WifiCredentials {
    pub ssid: heapless::String<SSID_CAPACITY>,
    pub password: heapless::String<PASSWORD_CAPACITY>,
}

impl WifiCredentials {
    /// Copy `ssid` and `password`, or `None` if either is too long or the SSID is empty.
    ///
    /// ```
    /// use alarm_kit::credential_store::WifiCredentials;
    ///
    /// let credentials = WifiCredentials::new("home", "hunter22").unwrap();
    /// assert_eq!(credentials.ssid.as_str(), "home");
    /// assert!(WifiCredentials::new("", "hunter22").is_none());
    /// ```
    #[must_use]
    pub fn new(ssid: &str, password: &str) -> Option<Self> {
        if ssid.is_empty() {
            return None;
        }
        Some(Self {
            ssid: heapless::String::try_from(ssid).ok()?,
            password: heapless::String::try_from(password).ok()?,
        })
    }
}

/// How the radio starts on the next boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WifiStartMode {
    /// Join the stored (or built-in) network.
    #[default]
    Client,
    /// Open the provisioning access point.
    AccessPoint,
}

/// Everything the credential sector holds.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WifiRecord {
    pub credentials: Option<WifiCredentials>,
    pub start_mode: WifiStartMode,
}

/// Serialize `record` into a record image.
///
/// # Errors
///
/// [`Error::CredentialsTooLarge`] if the encoded record exceeds [`MAX_PAYLOAD_LEN`].
pub fn encode_record(record: &WifiRecord) -> Result<heapless::Vec<u8, RECORD_CAPACITY>> {
    let mut payload_buffer = [0_u8; MAX_PAYLOAD_LEN];
    let payload =
        postcard::to_slice(record, &mut payload_buffer).map_err(|_| Error::CredentialsTooLarge)?;
    let payload_len = u16::try_from(payload.len()).map_err(|_| Error::CredentialsTooLarge)?;

    let magic = MAGIC.to_le_bytes();
    let len = payload_len.to_le_bytes();
    let mut image = heapless::Vec::new();
    for part in [magic.as_slice(), len.as_slice(), payload] {
        image
            .extend_from_slice(part)
            .map_err(|_| Error::CredentialsTooLarge)?;
    }
    let checksum = compute_crc(&image);
    image
        .extend_from_slice(&checksum.to_le_bytes())
        .map_err(|_| Error::CredentialsTooLarge)?;
    Ok(image)
}

/// Read a record image back.
///
/// Returns `Ok(None)` for an erased sector or a foreign magic.
///
/// # Errors
///
/// [`Error::StorageCorrupted`] if the magic is ours but the length, checksum or payload
/// does not hold up.
pub fn decode_record(image: &[u8]) -> Result<Option<WifiRecord>> {
    if read_u32(image, 0) != Some(MAGIC) {
        return Ok(None);
    }
    let payload_len = image
        .get(LEN_OFFSET..PAYLOAD_OFFSET)
        .and_then(|bytes| <[u8; 2]>::try_from(bytes).ok())
        .map(|bytes| usize::from(u16::from_le_bytes(bytes)))
        .filter(|len| *len <= MAX_PAYLOAD_LEN)
        .ok_or(Error::StorageCorrupted)?;

    let crc_offset = PAYLOAD_OFFSET
        .checked_add(payload_len)
        .ok_or(Error::StorageCorrupted)?;
    let stored_crc = read_u32(image, crc_offset).ok_or(Error::StorageCorrupted)?;
    let covered = image.get(..crc_offset).ok_or(Error::StorageCorrupted)?;
    if compute_crc(covered) != stored_crc {
        return Err(Error::StorageCorrupted);
    }

    let payload = image
        .get(PAYLOAD_OFFSET..crc_offset)
        .ok_or(Error::StorageCorrupted)?;
    postcard::from_bytes(payload)
        .map(Some)
        .map_err(|_| Error::StorageCorrupted)
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    bytes
        .get(offset..offset.checked_add(4)?)
        .and_then(|slice| <[u8; 4]>::try_from(slice).ok())
        .map(u32::from_le_bytes)
}

fn compute_crc(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

// ============================================================================
// Flash-backed store
// ============================================================================

#[cfg(any(feature = "pico1", feature = "pico2"))]
mod flash_impl {
    use super::{
        RECORD_CAPACITY, WifiCredentials, WifiRecord, WifiStartMode, decode_record, encode_record,
    };
    use crate::Result;
    use crate::eeprom::{FlashSector, SharedFlash};
    use crate::fmt::{info, warn};

    /// The [`WifiRecord`] in the [`FlashSector::WifiCredentials`] sector.
    pub struct CredentialStore {
        flash: &'static SharedFlash,
    }

    impl CredentialStore {
        #[must_use]
        pub const fn new(flash: &'static SharedFlash) -> Self {
            Self { flash }
        }

        /// The stored record; an empty or unreadable sector gives the default record.
        #[must_use]
        pub fn load(&self) -> WifiRecord {
            let mut image = [0_u8; RECORD_CAPACITY];
            let loaded = self
                .flash
                .read(FlashSector::WifiCredentials, &mut image)
                .and_then(|()| decode_record(&image));
            match loaded {
                Ok(Some(record)) => {
                    info!("Wi-Fi record loaded");
                    record
                }
                Ok(None) => {
                    info!("Wi-Fi record empty");
                    WifiRecord::default()
                }
                Err(err) => {
                    warn!("Wi-Fi record ignored: {}", err);
                    WifiRecord::default()
                }
            }
        }

        /// Replace the stored record.
        ///
        /// # Errors
        ///
        /// [`crate::Error::CredentialsTooLarge`] or [`crate::Error::Flash`].
        pub fn save(&self, record: &WifiRecord) -> Result<()> {
            let image = encode_record(record)?;
            self.flash.write(FlashSector::WifiCredentials, &image)?;
            info!("Wi-Fi record saved");
            Ok(())
        }

        /// Keep `credentials` and start in client mode next boot.
        ///
        /// # Errors
        ///
        /// As for [`CredentialStore::save`].
        pub fn save_credentials(&self, credentials: WifiCredentials) -> Result<()> {
            self.save(&WifiRecord {
                credentials: Some(credentials),
                start_mode: WifiStartMode::Client,
            })
        }

        /// Keep whatever credentials are stored and choose the start mode for next boot.
        ///
        /// # Errors
        ///
        /// As for [`CredentialStore::save`].
        pub fn set_start_mode(&self, start_mode: WifiStartMode) -> Result<()> {
            let record = WifiRecord {
                start_mode,
                ..self.load()
            };
            self.save(&record)
        }
    }
}

#[cfg(any(feature = "pico1", feature = "pico2"))]
pub use flash_impl::CredentialStore;
