//! A small DHCP server for the provisioning access point.
//!
//! Leases are short so phones come back to the portal quickly, and only
//! [`MAX_LEASES`] clients are remembered at once.

use core::net::Ipv4Addr;

use embassy_time::{Duration, Instant};

/// Port the server listens on.
pub const DHCP_SERVER_PORT: u16 = 67;
/// Port replies go to.
pub const DHCP_CLIENT_PORT: u16 = 68;
/// Lease length, in seconds.
pub const LEASE_SECONDS: u32 = 30;
/// Clients remembered at once.
pub const MAX_LEASES: usize = 8;
/// Largest datagram handled.
pub const MAX_MESSAGE_LEN: usize = 768;

/// BOOTP messages shorter than this are padded.
const MIN_REPLY_LEN: usize = 300;
const OPTIONS_OFFSET: usize = 240;
const MAGIC_COOKIE: [u8; 4] = [99, 130, 83, 99];
#[expect(clippy::integer_division_remainder_used, reason = "T1 is half the lease")]
const RENEWAL_SECONDS: u32 = LEASE_SECONDS / 2;
#[expect(clippy::integer_division_remainder_used, reason = "T2 is 7/8 of the lease")]
const REBINDING_SECONDS: u32 = LEASE_SECONDS * 7 / 8;

const OPTION_PAD: u8 = 0;
const OPTION_SUBNET_MASK: u8 = 1;
const OPTION_ROUTER: u8 = 3;
const OPTION_DNS: u8 = 6;
const OPTION_BROADCAST: u8 = 28;
const OPTION_REQUESTED_IP: u8 = 50;
const OPTION_LEASE_TIME: u8 = 51;
const OPTION_MESSAGE_TYPE: u8 = 53;
const OPTION_SERVER_ID: u8 = 54;
const OPTION_RENEWAL_TIME: u8 = 58;
const OPTION_REBINDING_TIME: u8 = 59;
const OPTION_END: u8 = 255;

/// DHCP message types a client sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageType {
    Discover,
    Request,
    Decline,
    Release,
    Inform,
    Other(u8),
}

impl From<u8> for MessageType {
    fn from(code: u8) -> Self {
        match code {
            1 => Self::Discover,
            3 => Self::Request,
            4 => Self::Decline,
            7 => Self::Release,
            8 => Self::Inform,
            other => Self::Other(other),
        }
    }
}

/// Message types the server sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReplyKind {
    Offer,
    Ack,
}

impl ReplyKind {
    const fn code(self) -> u8 {
        match self {
            Self::Offer => 2,
            Self::Ack => 5,
        }
    }
}

/// The parts of a client message the server uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DhcpMessage {
    pub message_type: MessageType,
    pub transaction_id: u32,
    pub flags: u16,
    pub client_mac: [u8; 6],
    /// `ciaddr`, if the client already has an address.
    pub client_ip: Option<Ipv4Addr>,
    /// Option 50.
    pub requested_ip: Option<Ipv4Addr>,
    /// Option 54, the server the client chose.
    pub server_id: Option<Ipv4Addr>,
}

/// Decode a BOOTREQUEST from an Ethernet client. Anything else gives `None`.
#[must_use]
pub fn parse_message(frame: &[u8]) -> Option<DhcpMessage> {
    let [op, htype, hlen] = field::<3>(frame, 0)?;
    if op != 1 || htype != 1 || hlen != 6 || field::<4>(frame, 236)? != MAGIC_COOKIE {
        return None;
    }

    let mut message_type = None;
    let mut requested_ip = None;
    let mut server_id = None;
    let mut options = frame.get(OPTIONS_OFFSET..)?;
    while let Some((&code, rest)) = options.split_first() {
        if code == OPTION_PAD {
            options = rest;
            continue;
        }
        if code == OPTION_END {
            break;
        }
        let Some((&len, rest)) = rest.split_first() else {
            break;
        };
        let Some((data, rest)) = rest.split_at_checked(usize::from(len)) else {
            break;
        };
        match (code, data) {
            (OPTION_MESSAGE_TYPE, &[kind]) => message_type = Some(MessageType::from(kind)),
            (OPTION_REQUESTED_IP, &[a, b, c, d]) => requested_ip = Some(Ipv4Addr::new(a, b, c, d)),
            (OPTION_SERVER_ID, &[a, b, c, d]) => server_id = Some(Ipv4Addr::new(a, b, c, d)),
            _ => {}
        }
        options = rest;
    }

    let client_ip = Ipv4Addr::from(field::<4>(frame, 12)?);
    Some(DhcpMessage {
        message_type: message_type?,
        transaction_id: u32::from_be_bytes(field(frame, 4)?),
        flags: u16::from_be_bytes(field(frame, 10)?),
        client_mac: field(frame, 28)?,
        client_ip: (!client_ip.is_unspecified()).then_some(client_ip),
        requested_ip,
        server_id,
    })
}

fn field<const N: usize>(frame: &[u8], offset: usize) -> Option<[u8; N]> {
    frame
        .get(offset..offset.checked_add(N)?)
        .and_then(|bytes| <[u8; N]>::try_from(bytes).ok())
}

// ============================================================================
// Address pool and leases
// ============================================================================

/// The server's own address and the block of addresses it hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressPool {
    pub server: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub first: Ipv4Addr,
    pub size: u8,
}

impl AddressPool {
    /// `192.168.4.2..=192.168.4.254` behind the access point at `192.168.4.1/24`.
    pub const ACCESS_POINT: Self = Self {
        server: Ipv4Addr::new(192, 168, 4, 1),
        netmask: Ipv4Addr::new(255, 255, 255, 0),
        first: Ipv4Addr::new(192, 168, 4, 2),
        size: 253,
    };

    /// Subnet broadcast address.
    #[must_use]
    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.server) | !u32::from(self.netmask))
    }

    /// The `index`th pool address.
    #[must_use]
    pub fn nth(&self, index: u8) -> Option<Ipv4Addr> {
        (index < self.size)
            .then(|| u32::from(self.first).checked_add(u32::from(index)))
            .flatten()
            .map(Ipv4Addr::from)
    }

    #[must_use]
    pub fn contains(&self, address: Ipv4Addr) -> bool {
        u32::from(address)
            .checked_sub(u32::from(self.first))
            .is_some_and(|offset| offset < u32::from(self.size))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Lease {
    mac: [u8; 6],
    address: Ipv4Addr,
    expires_at: Instant,
}

/// Addresses currently leased, by client MAC.
#[derive(Debug, Default)]
pub struct LeaseTable {
    leases: heapless::Vec<Lease, MAX_LEASES>,
}

impl LeaseTable {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            leases: heapless::Vec::new(),
        }
    }

    /// Lease an address to `mac` until [`LEASE_SECONDS`] after `now`.
    ///
    /// A client keeps its address; a requested address is honored when it is in the
    /// pool and free. Returns `None` when the table or the pool is full.
    pub fn assign(
        &mut self,
        pool: &AddressPool,
        mac: [u8; 6],
        requested: Option<Ipv4Addr>,
        now: Instant,
    ) -> Option<Ipv4Addr> {
        self.leases.retain(|lease| lease.expires_at > now);
        let expires_at = now
            .checked_add(Duration::from_secs(u64::from(LEASE_SECONDS)))
            .unwrap_or(Instant::MAX);

        let wanted = requested
            .filter(|address| pool.contains(*address))
            .filter(|address| self.holder(*address).is_none_or(|holder| holder == mac));

        if let Some(existing) = self.leases.iter_mut().find(|lease| lease.mac == mac) {
            if let Some(address) = wanted {
                existing.address = address;
            }
            existing.expires_at = expires_at;
            return Some(existing.address);
        }

        let address = wanted.or_else(|| {
            (0..pool.size)
                .filter_map(|index| pool.nth(index))
                .find(|candidate| self.holder(*candidate).is_none())
        })?;
        self.leases
            .push(Lease {
                mac,
                address,
                expires_at,
            })
            .ok()?;
        Some(address)
    }

    /// Forget the lease of `mac`.
    pub fn release(&mut self, mac: [u8; 6]) {
        self.leases.retain(|lease| lease.mac != mac);
    }

    /// Client MAC holding `address`, if any.
    #[must_use]
    pub fn holder(&self, address: Ipv4Addr) -> Option<[u8; 6]> {
        self.leases
            .iter()
            .find(|lease| lease.address == address)
            .map(|lease| lease.mac)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.leases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leases.is_empty()
    }
}

/// Decide the answer to `message`: an offer or ack with its address, or nothing.
///
/// Requests meant for another server, informs and unknown types get no answer;
/// declines and releases drop the client's lease.
pub fn respond(
    leases: &mut LeaseTable,
    pool: &AddressPool,
    message: &DhcpMessage,
    now: Instant,
) -> Option<(ReplyKind, Ipv4Addr)> {
    let kind = match message.message_type {
        MessageType::Discover => ReplyKind::Offer,
        MessageType::Request => {
            if message.server_id.is_some_and(|server| server != pool.server) {
                return None;
            }
            ReplyKind::Ack
        }
        MessageType::Decline | MessageType::Release => {
            leases.release(message.client_mac);
            return None;
        }
        MessageType::Inform | MessageType::Other(_) => return None,
    };
    let address = leases.assign(
        pool,
        message.client_mac,
        message.requested_ip.or(message.client_ip),
        now,
    )?;
    Some((kind, address))
}

// ============================================================================
// Replies
// ============================================================================

/// Appends to a zeroed buffer, failing instead of overrunning it.
struct ReplyWriter<'a> {
    buffer: &'a mut [u8],
    len: usize,
}

impl ReplyWriter<'_> {
    fn put(&mut self, offset: usize, bytes: &[u8]) -> Option<()> {
        self.buffer
            .get_mut(offset..offset.checked_add(bytes.len())?)?
            .copy_from_slice(bytes);
        Some(())
    }

    fn append(&mut self, bytes: &[u8]) -> Option<()> {
        self.put(self.len, bytes)?;
        self.len = self.len.checked_add(bytes.len())?;
        Some(())
    }

    fn option(&mut self, code: u8, payload: &[u8]) -> Option<()> {
        self.append(&[code, u8::try_from(payload.len()).ok()?])?;
        self.append(payload)
    }
}

/// Encode a BOOTREPLY for `request` into `buffer`, giving the client `address`.
///
/// Returns the reply length (at least 300 bytes), or `None` if `buffer` is too small.
#[must_use]
pub fn build_reply(
    buffer: &mut [u8],
    request: &DhcpMessage,
    kind: ReplyKind,
    address: Ipv4Addr,
    pool: &AddressPool,
) -> Option<usize> {
    if buffer.len() < MIN_REPLY_LEN {
        return None;
    }
    buffer.fill(0);
    let server = pool.server.octets();
    let mut reply = ReplyWriter { buffer, len: 0 };

    // BOOTREPLY, Ethernet, 6-byte MAC, no hops.
    reply.put(0, &[2, 1, 6, 0])?;
    reply.put(4, &request.transaction_id.to_be_bytes())?;
    reply.put(10, &request.flags.to_be_bytes())?;
    reply.put(16, &address.octets())?;
    reply.put(20, &server)?;
    reply.put(28, &request.client_mac)?;
    reply.put(236, &MAGIC_COOKIE)?;

    reply.len = OPTIONS_OFFSET;
    reply.option(OPTION_MESSAGE_TYPE, &[kind.code()])?;
    reply.option(OPTION_SERVER_ID, &server)?;
    reply.option(OPTION_LEASE_TIME, &LEASE_SECONDS.to_be_bytes())?;
    reply.option(OPTION_RENEWAL_TIME, &RENEWAL_SECONDS.to_be_bytes())?;
    reply.option(OPTION_REBINDING_TIME, &REBINDING_SECONDS.to_be_bytes())?;
    reply.option(OPTION_SUBNET_MASK, &pool.netmask.octets())?;
    reply.option(OPTION_ROUTER, &server)?;
    reply.option(OPTION_DNS, &server)?;
    reply.option(OPTION_BROADCAST, &pool.broadcast().octets())?;
    reply.append(&[OPTION_END])?;

    Some(reply.len.max(MIN_REPLY_LEN))
}

// ============================================================================
// Server task
// ============================================================================

#[cfg(all(feature = "wifi", any(feature = "pico1", feature = "pico2")))]
mod device {
    #![allow(clippy::future_not_send, reason = "single-threaded")]

    use embassy_net::Stack;
    use embassy_net::udp::{PacketMetadata, UdpSocket};
    use embassy_time::Instant;

    use super::{
        AddressPool, DHCP_CLIENT_PORT, DHCP_SERVER_PORT, LeaseTable, MAX_MESSAGE_LEN, build_reply,
        parse_message, respond,
    };
    use crate::fmt::{debug, error, info, warn};

    /// Hand out addresses from `pool` to access point clients.
    #[embassy_executor::task]
    pub async fn dhcp_server_task(stack: Stack<'static>, pool: AddressPool) -> ! {
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

        if let Err(err) = socket.bind(DHCP_SERVER_PORT) {
            error!("DHCP server failed to bind: {:?}", err);
            core::panic!("Unable to bind DHCP port");
        }
        info!("DHCP server listening on {}", pool.server.octets());

        let mut leases = LeaseTable::new();
        let mut frame = [0_u8; MAX_MESSAGE_LEN];
        let mut response = [0_u8; MAX_MESSAGE_LEN];
        loop {
            let len = match socket.recv_from(&mut frame).await {
                Ok((len, _remote)) => len,
                Err(err) => {
                    warn!("DHCP recv error: {:?}", err);
                    continue;
                }
            };
            let Some(message) = frame.get(..len).and_then(parse_message) else {
                continue;
            };
            debug!("DHCP {:?} from {}", message.message_type, message.client_mac);

            let Some((kind, address)) = respond(&mut leases, &pool, &message, Instant::now())
            else {
                continue;
            };
            let Some(reply) = build_reply(&mut response, &message, kind, address, &pool)
                .and_then(|reply_len| response.get(..reply_len))
            else {
                warn!("Failed to build DHCP reply");
                continue;
            };
            match socket
                .send_to(reply, (pool.broadcast(), DHCP_CLIENT_PORT))
                .await
            {
                Ok(()) => debug!("DHCP {:?} of {}", kind, address.octets()),
                Err(err) => warn!("DHCP send error: {:?}", err),
            }
        }
    }
}

#[cfg(all(feature = "wifi", any(feature = "pico1", feature = "pico2")))]
pub use device::dhcp_server_task;
