//! Host-level tests for the Wi-Fi credential record.

use alarm_kit::Error;
use alarm_kit::credential_store::{
    MAX_PAYLOAD_LEN, RECORD_CAPACITY, WifiCredentials, WifiRecord, WifiStartMode, decode_record,
    encode_record,
};

fn record(ssid: &str, password: &str, start_mode: WifiStartMode) -> WifiRecord {
    WifiRecord {
        credentials: WifiCredentials::new(ssid, password),
        start_mode,
    }
}

/// The record image as it sits in an erased sector.
fn sector_with(image: &[u8]) -> [u8; RECORD_CAPACITY] {
    let mut sector = [0xFF_u8; RECORD_CAPACITY];
    sector[..image.len()].copy_from_slice(image);
    sector
}

#[test]
fn stored_record_reads_back_from_the_sector() {
    let stored = record("home", "correct horse", WifiStartMode::Client);
    let sector = sector_with(&encode_record(&stored).unwrap());
    assert_eq!(decode_record(&sector).unwrap(), Some(stored));
}

#[test]
fn portal_start_mode_survives_with_the_credentials() {
    let stored = record("cafe", "", WifiStartMode::AccessPoint);
    let sector = sector_with(&encode_record(&stored).unwrap());
    let loaded = decode_record(&sector).unwrap().unwrap();
    assert_eq!(loaded.start_mode, WifiStartMode::AccessPoint);
    assert_eq!(loaded.credentials.unwrap().ssid.as_str(), "cafe");
}

#[test]
fn longest_credentials_fit_the_record() {
    let ssid = "s".repeat(32);
    let password = "p".repeat(64);
    let stored = record(&ssid, &password, WifiStartMode::AccessPoint);
    let image = encode_record(&stored).unwrap();
    assert!(image.len() <= RECORD_CAPACITY);
    assert_eq!(decode_record(&image).unwrap(), Some(stored));
}

#[test]
fn erased_sector_holds_nothing() {
    assert_eq!(decode_record(&[0xFF; RECORD_CAPACITY]).unwrap(), None);
    assert_eq!(decode_record(&[0x00; RECORD_CAPACITY]).unwrap(), None);
    assert_eq!(decode_record(&[]).unwrap(), None);
}

#[test]
fn flipped_payload_bit_is_reported() {
    let stored = record("home", "secret", WifiStartMode::Client);
    let mut sector = sector_with(&encode_record(&stored).unwrap());
    sector[8] ^= 0x01;
    assert!(matches!(decode_record(&sector), Err(Error::StorageCorrupted)));
}

#[test]
fn length_past_the_payload_limit_is_reported() {
    let stored = record("home", "secret", WifiStartMode::Client);
    let mut sector = sector_with(&encode_record(&stored).unwrap());
    let too_long = u16::try_from(MAX_PAYLOAD_LEN + 1).unwrap();
    sector[4..6].copy_from_slice(&too_long.to_le_bytes());
    assert!(matches!(decode_record(&sector), Err(Error::StorageCorrupted)));
}

#[test]
fn truncated_image_is_reported() {
    let stored = record("home", "secret", WifiStartMode::Client);
    let image = encode_record(&stored).unwrap();
    let truncated = &image[..image.len() - 2];
    assert!(matches!(decode_record(truncated), Err(Error::StorageCorrupted)));
}

#[test]
fn credentials_reject_empty_and_oversized_values() {
    assert!(WifiCredentials::new("", "secret").is_none());
    assert!(WifiCredentials::new(&"s".repeat(33), "secret").is_none());
    assert!(WifiCredentials::new("home", &"p".repeat(65)).is_none());
    let open = WifiCredentials::new("library", "").unwrap();
    assert!(open.password.is_empty());
}

#[test]
fn default_record_starts_in_client_mode_without_credentials() {
    let record = WifiRecord::default();
    assert_eq!(record.start_mode, WifiStartMode::Client);
    assert!(record.credentials.is_none());
}
