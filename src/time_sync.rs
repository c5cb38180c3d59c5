//! A device that keeps the clock's time fresh over Wi-Fi.
//!
//! Runs [`acquire_time`] once the network is up and then every [`SYNC_TIME`],
//! reporting each start and outcome as a [`TimeSyncEvent`]. Only one request is
//! ever in flight, and it always runs to completion.

#![allow(clippy::future_not_send, reason = "single-threaded")]

use core::convert::Infallible;

use embassy_executor::Spawner;
use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::TcpSocket;
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{IpAddress, Stack};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer, with_timeout};
use embedded_io_async::Write as _;
use static_cell::StaticCell;

use crate::Result;
use crate::config::SYNC_TIME;
use crate::fmt::{info, warn};
use crate::time_source::{TimeError, TimeSample, TimeSourceConfig, TimeTransport, acquire_time};
use crate::timezonedb::HttpResponse;
use crate::wifi::Wifi;

/// Socket timeout for the HTTP fallback.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Types
// ============================================================================

/// Events emitted by [`TimeSync`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeSyncEvent {
    /// A request has started.
    Started,
    Success(TimeSample),
    Failed(TimeError),
}

/// Signal type used by [`TimeSync`] to publish events.
pub type TimeSyncEvents = Signal<CriticalSectionRawMutex, TimeSyncEvent>;

/// Resources needed to construct a [`TimeSync`].
pub struct TimeSyncStatic {
    events: TimeSyncEvents,
    time_sync_cell: StaticCell<TimeSync>,
}

// ============================================================================
// TimeSync device
// ============================================================================

/// Periodic time synchronization over an existing Wi-Fi connection.
///
/// ```ignore
/// static TIME_SYNC_STATIC: TimeSyncStatic = TimeSync::new_static();
/// let time_sync = TimeSync::new(&TIME_SYNC_STATIC, wifi, config.time_source(), spawner)?;
/// match time_sync.wait().await {
///     TimeSyncEvent::Success(sample) => { /* set the clock */ }
///     TimeSyncEvent::Started | TimeSyncEvent::Failed(_) => {}
/// }
/// ```
pub struct TimeSync {
    events: &'static TimeSyncEvents,
}

impl TimeSync {
    #[must_use]
    pub const fn new_static() -> TimeSyncStatic {
        TimeSyncStatic {
            events: Signal::new(),
            time_sync_cell: StaticCell::new(),
        }
    }

    /// Spawn the sync task. It waits for `wifi` to connect before the first request.
    ///
    /// # Errors
    ///
    /// [`crate::Error::TaskSpawn`] if the task is already running.
    pub fn new(
        time_sync_static: &'static TimeSyncStatic,
        wifi: &'static Wifi,
        config: TimeSourceConfig<'static>,
        spawner: Spawner,
    ) -> Result<&'static Self> {
        let token = time_sync_device_loop(wifi, config, &time_sync_static.events)?;
        spawner.spawn(token);
        Ok(time_sync_static.time_sync_cell.init(Self {
            events: &time_sync_static.events,
        }))
    }

    /// Wait for and return the next event.
    pub async fn wait(&self) -> TimeSyncEvent {
        self.events.wait().await
    }
}

#[embassy_executor::task]
async fn time_sync_device_loop(
    wifi: &'static Wifi,
    config: TimeSourceConfig<'static>,
    events: &'static TimeSyncEvents,
) -> ! {
    let err = inner_time_sync_device_loop(wifi, config, events)
        .await
        .unwrap_err();
    core::panic!("{err}");
}

async fn inner_time_sync_device_loop(
    wifi: &'static Wifi,
    config: TimeSourceConfig<'static>,
    events: &'static TimeSyncEvents,
) -> Result<Infallible> {
    let stack = wifi.stack().await;
    info!("TimeSync received network stack");
    let mut transport = NetTransport::new(stack);

    loop {
        stack.wait_config_up().await;
        events.signal(TimeSyncEvent::Started);
        match acquire_time(&mut transport, &config).await {
            Ok(sample) => {
                info!("Time sync successful: unix_seconds={}", sample.unix_seconds.as_i64());
                events.signal(TimeSyncEvent::Success(sample));
            }
            Err(err) => {
                warn!("Time sync failed: {}", err);
                events.signal(TimeSyncEvent::Failed(err));
            }
        }
        Timer::after(SYNC_TIME).await;
    }
}

// ============================================================================
// Network transport
// ============================================================================

/// [`TimeTransport`] over an `embassy-net` stack: DNS, UDP for SNTP, TCP for HTTP.
pub struct NetTransport {
    stack: Stack<'static>,
}

impl NetTransport {
    #[must_use]
    pub const fn new(stack: Stack<'static>) -> Self {
        Self { stack }
    }

    async fn resolve(&self, host: &str) -> core::result::Result<IpAddress, TimeError> {
        let addresses = self
            .stack
            .dns_query(host, DnsQueryType::A)
            .await
            .map_err(|err| {
                warn!("DNS lookup of {} failed: {:?}", host, err);
                TimeError::Dns
            })?;
        addresses.first().copied().ok_or(TimeError::Dns)
    }
}

impl TimeTransport for NetTransport {
    async fn exchange_datagram(
        &mut self,
        host: &str,
        port: u16,
        request: &[u8],
        reply: &mut [u8],
        timeout: Duration,
    ) -> core::result::Result<usize, TimeError> {
        let address = self.resolve(host).await?;

        let mut rx_meta = [PacketMetadata::EMPTY; 1];
        let mut rx_buffer = [0_u8; 128];
        let mut tx_meta = [PacketMetadata::EMPTY; 1];
        let mut tx_buffer = [0_u8; 128];
        let mut socket = UdpSocket::new(
            self.stack,
            &mut rx_meta,
            &mut rx_buffer,
            &mut tx_meta,
            &mut tx_buffer,
        );
        socket.bind(0).map_err(|_| TimeError::Socket)?;

        socket
            .send_to(request, (address, port))
            .await
            .map_err(|_| TimeError::Socket)?;
        let (len, _from) = with_timeout(timeout, socket.recv_from(reply))
            .await
            .map_err(|_| TimeError::Timeout)?
            .map_err(|_| TimeError::Socket)?;
        Ok(len)
    }

    async fn http_get(
        &mut self,
        host: &str,
        port: u16,
        request: &[u8],
        response: &mut HttpResponse,
    ) -> core::result::Result<(), TimeError> {
        let address = self.resolve(host).await?;

        let mut rx_buffer = [0_u8; 1024];
        let mut tx_buffer = [0_u8; 512];
        let mut socket = TcpSocket::new(self.stack, &mut rx_buffer, &mut tx_buffer);
        socket.set_timeout(Some(HTTP_TIMEOUT));
        socket
            .connect((address, port))
            .await
            .map_err(|_| TimeError::Socket)?;
        socket
            .write_all(request)
            .await
            .map_err(|_| TimeError::Socket)?;

        let mut chunk = [0_u8; 256];
        loop {
            let read = socket.read(&mut chunk).await.map_err(|_| TimeError::Socket)?;
            let Some(bytes) = chunk.get(..read).filter(|bytes| !bytes.is_empty()) else {
                break;
            };
            if let Err(err) = response.feed(bytes) {
                socket.abort();
                return Err(err);
            }
        }
        socket.close();
        Ok(())
    }
}
