//! EEPROM-style byte storage emulated in one flash sector.
//!
//! Page layout (little-endian):
//!
//! | bytes  | field                                 |
//! |--------|---------------------------------------|
//! | 0..4   | magic `'ALRM'`                        |
//! | 4..6   | layout version                        |
//! | 6..8   | reserved, zero                        |
//! | 8..24  | data bytes                            |
//! | 24..28 | CRC-32 of bytes 4..24                 |

use crc32fast::Hasher;

use crate::{Error, Result};

/// Data bytes an [`EEPROM page`](encode_page) carries.
pub const DATA_LEN: usize = 16;
/// Bytes of a page image.
pub const PAGE_LEN: usize = CRC_OFFSET + 4;

const MAGIC: u32 = 0x414C_524D; // 'ALRM'
const VERSION: u16 = 1;
const VERSION_OFFSET: usize = 4;
const RESERVED_OFFSET: usize = 6;
const DATA_OFFSET: usize = 8;
const CRC_OFFSET: usize = DATA_OFFSET + DATA_LEN;

/// Serialize `data` into a page image.
#[must_use]
pub fn encode_page(data: &[u8; DATA_LEN]) -> [u8; PAGE_LEN] {
    let mut page = [0_u8; PAGE_LEN];
    put(&mut page, 0, &MAGIC.to_le_bytes());
    put(&mut page, VERSION_OFFSET, &VERSION.to_le_bytes());
    put(&mut page, RESERVED_OFFSET, &[0, 0]);
    put(&mut page, DATA_OFFSET, data);

    let checksum = compute_crc(&page_body(&page));
    put(&mut page, CRC_OFFSET, &checksum.to_le_bytes());
    page
}

fn put(page: &mut [u8; PAGE_LEN], offset: usize, bytes: &[u8]) {
    if let Some(target) = page.get_mut(offset..offset.saturating_add(bytes.len())) {
        target.copy_from_slice(bytes);
    }
}

/// Read the data bytes back out of a page image.
///
/// Returns `Ok(None)` for an erased page, a foreign magic or another layout version.
///
/// # Errors
///
/// [`Error::StorageCorrupted`] if the header is ours but the checksum does not match.
pub fn decode_page(page: &[u8]) -> Result<Option<[u8; DATA_LEN]>> {
    let Some(page) = page.get(..PAGE_LEN) else {
        return Ok(None);
    };
    if read_u32(page, 0) != Some(MAGIC) {
        return Ok(None);
    }
    let version = page
        .get(VERSION_OFFSET..RESERVED_OFFSET)
        .and_then(|bytes| <[u8; 2]>::try_from(bytes).ok())
        .map(u16::from_le_bytes);
    if version != Some(VERSION) {
        return Ok(None);
    }

    let stored_crc = read_u32(page, CRC_OFFSET).ok_or(Error::StorageCorrupted)?;
    let body = page
        .get(VERSION_OFFSET..CRC_OFFSET)
        .ok_or(Error::StorageCorrupted)?;
    if compute_crc(body) != stored_crc {
        return Err(Error::StorageCorrupted);
    }

    page.get(DATA_OFFSET..CRC_OFFSET)
        .and_then(|bytes| <[u8; DATA_LEN]>::try_from(bytes).ok())
        .map(Some)
        .ok_or(Error::StorageCorrupted)
}

fn page_body(page: &[u8; PAGE_LEN]) -> [u8; CRC_OFFSET - VERSION_OFFSET] {
    let mut body = [0_u8; CRC_OFFSET - VERSION_OFFSET];
    if let Some(bytes) = page.get(VERSION_OFFSET..CRC_OFFSET) {
        body.copy_from_slice(bytes);
    }
    body
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
    use core::cell::RefCell;

    use embassy_rp::Peri;
    use embassy_rp::flash::{Blocking, ERASE_SIZE, Flash};
    use embassy_rp::peripherals::FLASH;
    use embassy_sync::blocking_mutex::Mutex;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use static_cell::StaticCell;

    use super::{DATA_LEN, PAGE_LEN, decode_page, encode_page};
    use crate::fmt::{info, warn};
    use crate::settings::ByteStore;
    use crate::{Error, Result};

    /// Internal flash size of the board.
    #[cfg(feature = "pico2")]
    pub const INTERNAL_FLASH_SIZE: usize = 4 * 1024 * 1024;
    /// Internal flash size of the board.
    #[cfg(not(feature = "pico2"))]
    pub const INTERNAL_FLASH_SIZE: usize = 2 * 1024 * 1024;

    type EmbassyFlash = Flash<'static, FLASH, Blocking, INTERNAL_FLASH_SIZE>;

    /// Erase sectors reserved for storage, counted back from the end of flash.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum FlashSector {
        /// The emulated EEPROM page.
        Settings,
        /// The Wi-Fi credential record.
        WifiCredentials,
    }

    #[expect(clippy::cast_possible_truncation, reason = "flash sizes are a few MiB")]
    const SETTINGS_OFFSET: u32 = (INTERNAL_FLASH_SIZE - ERASE_SIZE) as u32;
    #[expect(clippy::cast_possible_truncation, reason = "flash sizes are a few MiB")]
    const WIFI_CREDENTIALS_OFFSET: u32 = (INTERNAL_FLASH_SIZE - 2 * ERASE_SIZE) as u32;
    #[expect(clippy::cast_possible_truncation, reason = "sector size is 4 KiB")]
    const SECTOR_SIZE: u32 = ERASE_SIZE as u32;

    impl FlashSector {
        const fn offset(self) -> u32 {
            match self {
                Self::Settings => SETTINGS_OFFSET,
                Self::WifiCredentials => WIFI_CREDENTIALS_OFFSET,
            }
        }
    }

    /// Static resources for [`SharedFlash`].
    pub struct SharedFlashStatic {
        flash_cell: StaticCell<SharedFlash>,
    }

    /// The flash peripheral, shared by every store that keeps a sector in it.
    pub struct SharedFlash {
        flash: Mutex<CriticalSectionRawMutex, RefCell<EmbassyFlash>>,
    }

    impl SharedFlash {
        #[must_use]
        pub const fn new_static() -> SharedFlashStatic {
            SharedFlashStatic {
                flash_cell: StaticCell::new(),
            }
        }

        /// Take the flash peripheral.
        pub fn new(
            flash_static: &'static SharedFlashStatic,
            peripheral: Peri<'static, FLASH>,
        ) -> &'static Self {
            flash_static.flash_cell.init(Self {
                flash: Mutex::new(RefCell::new(EmbassyFlash::new_blocking(peripheral))),
            })
        }

        fn with_flash<R>(&self, f: impl FnOnce(&mut EmbassyFlash) -> Result<R>) -> Result<R> {
            self.flash.lock(|flash| {
                let mut flash_ref = flash.borrow_mut();
                f(&mut *flash_ref)
            })
        }

        /// Read the start of `sector` into `buffer`.
        ///
        /// # Errors
        ///
        /// [`Error::Flash`] if the read fails.
        pub fn read(&self, sector: FlashSector, buffer: &mut [u8]) -> Result<()> {
            self.with_flash(|flash| {
                flash
                    .blocking_read(sector.offset(), buffer)
                    .map_err(Error::Flash)
            })
        }

        /// Erase `sector` and write `image` at its start; the rest stays erased.
        ///
        /// # Errors
        ///
        /// [`Error::Flash`] if the erase or the write fails.
        pub fn write(&self, sector: FlashSector, image: &[u8]) -> Result<()> {
            let mut buffer = [0xFF_u8; ERASE_SIZE];
            if let Some(head) = buffer.get_mut(..image.len()) {
                head.copy_from_slice(image);
            }
            let offset = sector.offset();
            self.with_flash(|flash| {
                flash
                    .blocking_erase(offset, offset.saturating_add(SECTOR_SIZE))
                    .map_err(Error::Flash)?;
                flash.blocking_write(offset, &buffer).map_err(Error::Flash)
            })
        }
    }

    /// [`ByteStore`] kept in the [`FlashSector::Settings`] sector.
    ///
    /// Writes go to a RAM copy; [`ByteStore::commit`] erases and rewrites the
    /// sector only when something changed.
    pub struct FlashEeprom {
        flash: &'static SharedFlash,
        data: [u8; DATA_LEN],
        dirty: bool,
    }

    impl FlashEeprom {
        /// Load the stored page.
        ///
        /// A missing or corrupted page starts the store erased (`0xFF`).
        ///
        /// # Errors
        ///
        /// [`Error::Flash`] if the sector cannot be read.
        pub fn new(flash: &'static SharedFlash) -> Result<Self> {
            let mut page = [0_u8; PAGE_LEN];
            flash.read(FlashSector::Settings, &mut page)?;

            let data = match decode_page(&page) {
                Ok(Some(data)) => {
                    info!("EEPROM page loaded");
                    data
                }
                Ok(None) => {
                    info!("EEPROM page empty");
                    [0xFF; DATA_LEN]
                }
                Err(err) => {
                    warn!("EEPROM page ignored: {}", err);
                    [0xFF; DATA_LEN]
                }
            };
            Ok(Self {
                flash,
                data,
                dirty: false,
            })
        }
    }

    impl ByteStore for FlashEeprom {
        fn read(&mut self, addr: usize) -> Result<u8> {
            self.data
                .get(addr)
                .copied()
                .ok_or(Error::AddressOutOfRange(addr))
        }

        fn write(&mut self, addr: usize, value: u8) -> Result<()> {
            let byte = self
                .data
                .get_mut(addr)
                .ok_or(Error::AddressOutOfRange(addr))?;
            if *byte != value {
                *byte = value;
                self.dirty = true;
            }
            Ok(())
        }

        fn commit(&mut self) -> Result<()> {
            if !self.dirty {
                return Ok(());
            }
            self.flash
                .write(FlashSector::Settings, &encode_page(&self.data))?;
            self.dirty = false;
            info!("EEPROM page committed");
            Ok(())
        }
    }
}

#[cfg(any(feature = "pico1", feature = "pico2"))]
pub use flash_impl::{FlashEeprom, FlashSector, INTERNAL_FLASH_SIZE, SharedFlash, SharedFlashStatic};
