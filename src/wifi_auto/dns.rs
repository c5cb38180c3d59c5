//! Captive-portal DNS: every query is answered with the access point's address.

use core::net::Ipv4Addr;

/// Port the server listens on.
pub const DNS_SERVER_PORT: u16 = 53;
/// TTL of every answer, in seconds.
pub const ANSWER_TTL_SECONDS: u32 = 60;
/// Largest datagram handled.
pub const MAX_MESSAGE_LEN: usize = 512;

const HEADER_LEN: usize = 12;
/// Fixed part of a question after its name: type and class.
const QUESTION_TAIL_LEN: usize = 4;

/// Build the reply to `query` in `response`: the header and first question echoed back,
/// followed by one `A` record for `address`.
///
/// Returns the reply length, or `None` for a datagram that is not a query or does not fit.
#[must_use]
pub fn answer(query: &[u8], address: Ipv4Addr, response: &mut [u8]) -> Option<usize> {
    let question_end = question_end(query)?;
    let echoed = query.get(..question_end)?;
    let header = query.get(..HEADER_LEN)?;
    // QR clear: this is a query.
    if header.get(2).is_none_or(|flags| flags & 0x80 != 0) {
        return None;
    }

    let ttl = ANSWER_TTL_SECONDS.to_be_bytes();
    let octets = address.octets();
    let record: [&[u8]; 5] = [
        &[0xC0, 0x0C], // name: pointer to the question
        &[0x00, 0x01, 0x00, 0x01], // type A, class IN
        &ttl,
        &[0x00, 0x04],
        &octets,
    ];

    let mut len = 0_usize;
    for part in core::iter::once(echoed).chain(record) {
        let end = len.checked_add(part.len())?;
        response.get_mut(len..end)?.copy_from_slice(part);
        len = end;
    }

    // Response, authoritative, no error; one question, one answer, nothing else.
    response.get_mut(2..4)?.copy_from_slice(&[0x84, 0x00]);
    response
        .get_mut(4..HEADER_LEN)?
        .copy_from_slice(&[0, 1, 0, 1, 0, 0, 0, 0]);
    Some(len)
}

/// End of the first question: its labels, the terminating zero, then type and class.
fn question_end(query: &[u8]) -> Option<usize> {
    let mut at = HEADER_LEN;
    loop {
        let label_len = usize::from(*query.get(at)?);
        at = at.checked_add(1)?;
        if label_len == 0 {
            break;
        }
        // Compression pointers never appear in a question name.
        if label_len > 63 {
            return None;
        }
        at = at.checked_add(label_len)?;
    }
    let end = at.checked_add(QUESTION_TAIL_LEN)?;
    (end <= query.len()).then_some(end)
}

// ============================================================================
// Server task
// ============================================================================

#[cfg(all(feature = "wifi", any(feature = "pico1", feature = "pico2")))]
mod device {
    #![allow(clippy::future_not_send, reason = "single-threaded")]

    use core::net::Ipv4Addr;

    use embassy_net::Stack;
    use embassy_net::udp::{PacketMetadata, UdpSocket};

    use super::{DNS_SERVER_PORT, MAX_MESSAGE_LEN, answer};
    use crate::fmt::{debug, error, info, warn};

    /// Answer every DNS query on the access point with `address`.
    #[embassy_executor::task]
    pub async fn dns_server_task(stack: Stack<'static>, address: Ipv4Addr) -> ! {
        let mut rx_meta = [PacketMetadata::EMPTY; 4];
        let mut rx_buffer = [0_u8; MAX_MESSAGE_LEN];
        let mut tx_meta = [PacketMetadata::EMPTY; 4];
        let mut tx_buffer = [0_u8; MAX_MESSAGE_LEN];
        let mut socket = UdpSocket::new(
            stack,
            &mut rx_meta,
            &mut rx_buffer,
            &mut tx_meta,
            &mut tx_buffer,
        );

        if let Err(err) = socket.bind(DNS_SERVER_PORT) {
            error!("DNS server failed to bind: {:?}", err);
            core::panic!("Unable to bind DNS port");
        }
        info!("DNS server answering with {}", address.octets());

        let mut query = [0_u8; MAX_MESSAGE_LEN];
        let mut response = [0_u8; MAX_MESSAGE_LEN];
        loop {
            let Ok((len, remote)) = socket.recv_from(&mut query).await else {
                continue;
            };
            let Some(response_len) = query
                .get(..len)
                .and_then(|query| answer(query, address, &mut response))
            else {
                continue;
            };
            let Some(reply) = response.get(..response_len) else {
                continue;
            };
            match socket.send_to(reply, remote).await {
                Ok(()) => debug!("DNS query answered"),
                Err(err) => warn!("DNS send error: {:?}", err),
            }
        }
    }
}

#[cfg(all(feature = "wifi", any(feature = "pico1", feature = "pico2")))]
pub use device::dns_server_task;
