//! SNTP request encoding and reply decoding (48-byte exchange on UDP port 123).

use crate::time_source::TimeError;
use crate::unix_seconds::UnixSeconds;

/// Size of an SNTP request and of the fixed part of a reply.
pub const NTP_PACKET_SIZE: usize = 48;
/// Well-known SNTP port.
pub const NTP_PORT: u16 = 123;

/// Bytes of the transmit-timestamp seconds in a reply.
const TRANSMIT_SECONDS: core::ops::Range<usize> = 40..44;
/// Mode value of a server reply.
const MODE_SERVER: u8 = 4;
/// Mode value of a broadcast reply.
const MODE_BROADCAST: u8 = 5;

/// Build a client request: LI=3 (unsynchronized), VN=4, mode 3, poll 6, precision 0xEC,
/// reference id `1N14`.
#[must_use]
pub fn request() -> [u8; NTP_PACKET_SIZE] {
    let mut packet = [0_u8; NTP_PACKET_SIZE];
    let header: [u8; 16] = [
        0b_1110_0011,
        0,    // stratum
        6,    // poll interval
        0xEC, // peer clock precision
        0, 0, 0, 0, // root delay
        0, 0, 0, 0, // root dispersion
        49, 0x4E, 49, 52,
    ];
    for (byte, value) in packet.iter_mut().zip(header) {
        *byte = value;
    }
    packet
}

/// Extract Unix seconds from a reply.
///
/// # Errors
///
/// [`TimeError::ShortResponse`] if fewer than 48 bytes arrived,
/// [`TimeError::InvalidResponse`] if the packet is not a server or broadcast reply,
/// and [`TimeError::InvalidTimestamp`] if the transmit time is zero.
pub fn parse_reply(reply: &[u8]) -> Result<UnixSeconds, TimeError> {
    if reply.len() < NTP_PACKET_SIZE {
        return Err(TimeError::ShortResponse);
    }
    let [first, ..] = reply else {
        return Err(TimeError::ShortResponse);
    };
    let mode = first & 0b_0000_0111;
    if mode != MODE_SERVER && mode != MODE_BROADCAST {
        return Err(TimeError::InvalidResponse);
    }

    let seconds_bytes = reply
        .get(TRANSMIT_SECONDS)
        .and_then(|bytes| <[u8; 4]>::try_from(bytes).ok())
        .ok_or(TimeError::ShortResponse)?;
    let ntp_seconds = u32::from_be_bytes(seconds_bytes);

    UnixSeconds::from_ntp_seconds(ntp_seconds).ok_or(TimeError::InvalidTimestamp)
}
