//! Wall-clock acquisition: SNTP first, then a single TimeZoneDB lookup.
//!
//! The policy is written against [`TimeTransport`] so it runs unchanged on the
//! device (see `time_sync`) and against mock transports in host tests.

#![allow(clippy::future_not_send, reason = "single-threaded")]

use derive_more::derive::{Display, Error};
use embassy_time::Duration;

use crate::fmt::{error, info, warn};
use crate::timezonedb::HttpResponse;
use crate::unix_seconds::UnixSeconds;
use crate::{ntp, timezonedb};

/// SNTP attempts before falling back to HTTP.
pub const MAX_ATTEMPTS_FOR_TIME: u8 = 5;
/// How long each SNTP attempt waits for a reply.
pub const NTP_TIMEOUT: Duration = Duration::from_secs(5);
/// Default SNTP server.
pub const NTP_SERVER: &str = "time.nist.gov";

// ============================================================================
// Types
// ============================================================================

/// Ways a time acquisition can fail.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeError {
    #[display("DNS lookup failed")]
    Dns,
    #[display("socket error")]
    Socket,
    #[display("no reply before timeout")]
    Timeout,
    #[display("reply too short")]
    ShortResponse,
    #[display("reply is not from a server")]
    InvalidResponse,
    #[display("timestamp is zero or before 1970")]
    InvalidTimestamp,
    #[display("HTTP status {_0}")]
    Http(#[error(not(source))] u16),
    #[display("HTTP body larger than the content limit")]
    ResponseTooLarge,
    #[display("HTTP request does not fit its buffer")]
    RequestTooLong,
    #[display("JSON body rejected")]
    Json,
    #[display("no time source answered")]
    Unavailable,
}

/// A successful time reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeSample {
    /// Current UTC time.
    pub unix_seconds: UnixSeconds,
    /// Zone offset reported by the source, if it reports one (TimeZoneDB does, SNTP does not).
    pub utc_offset_minutes: Option<i32>,
}

/// Where to ask for the time.
#[derive(Debug, Clone, Copy)]
pub struct TimeSourceConfig<'a> {
    pub ntp_server: &'a str,
    pub ntp_timeout: Duration,
    pub max_attempts: u8,
    pub timezonedb_key: &'a str,
    pub timezone: &'a str,
}

impl<'a> TimeSourceConfig<'a> {
    /// Default server, timeout and attempt count with the given TimeZoneDB credentials.
    #[must_use]
    pub const fn new(timezonedb_key: &'a str, timezone: &'a str) -> Self {
        Self {
            ntp_server: NTP_SERVER,
            ntp_timeout: NTP_TIMEOUT,
            max_attempts: MAX_ATTEMPTS_FOR_TIME,
            timezonedb_key,
            timezone,
        }
    }
}

/// Network operations the time source needs.
#[allow(async_fn_in_trait, reason = "single-threaded embassy executor")]
pub trait TimeTransport {
    /// Send `request` to `host:port` over UDP and wait up to `timeout` for a reply.
    /// Returns the number of bytes written into `reply`.
    async fn exchange_datagram(
        &mut self,
        host: &str,
        port: u16,
        request: &[u8],
        reply: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TimeError>;

    /// Open a TCP connection to `host:port`, write `request`, and hand every chunk read
    /// to [`HttpResponse::feed`] until the peer closes. Headers of any length pass
    /// through; only a body over the content limit fails, with the error `feed` returns.
    async fn http_get(
        &mut self,
        host: &str,
        port: u16,
        request: &[u8],
        response: &mut HttpResponse,
    ) -> Result<(), TimeError>;
}

// ============================================================================
// Acquisition policy
// ============================================================================

/// Get the current time, trying SNTP up to `max_attempts` times and then TimeZoneDB once.
///
/// # Errors
///
/// [`TimeError::Unavailable`] when every SNTP attempt and the fallback fail.
pub async fn acquire_time<T: TimeTransport>(
    transport: &mut T,
    config: &TimeSourceConfig<'_>,
) -> Result<TimeSample, TimeError> {
    for attempt in 1..=config.max_attempts {
        match ntp_attempt(transport, config).await {
            Ok(unix_seconds) => {
                info!("SNTP time {} on attempt {}", unix_seconds.as_i64(), attempt);
                return Ok(TimeSample {
                    unix_seconds,
                    utc_offset_minutes: None,
                });
            }
            Err(err) => warn!("SNTP attempt {} failed: {}", attempt, err),
        }
    }

    match timezonedb_lookup(transport, config).await {
        Ok(sample) => {
            info!("TimeZoneDB time {}", sample.unix_seconds.as_i64());
            Ok(sample)
        }
        Err(err) => {
            error!("TimeZoneDB fallback failed: {}", err);
            Err(TimeError::Unavailable)
        }
    }
}

async fn ntp_attempt<T: TimeTransport>(
    transport: &mut T,
    config: &TimeSourceConfig<'_>,
) -> Result<UnixSeconds, TimeError> {
    let request = ntp::request();
    let mut reply = [0_u8; ntp::NTP_PACKET_SIZE];
    let len = transport
        .exchange_datagram(
            config.ntp_server,
            ntp::NTP_PORT,
            &request,
            &mut reply,
            config.ntp_timeout,
        )
        .await?;
    ntp::parse_reply(reply.get(..len).ok_or(TimeError::ShortResponse)?)
}

async fn timezonedb_lookup<T: TimeTransport>(
    transport: &mut T,
    config: &TimeSourceConfig<'_>,
) -> Result<TimeSample, TimeError> {
    let request = timezonedb::request(config.timezonedb_key, config.timezone)?;
    let mut response = HttpResponse::new();
    transport
        .http_get(
            timezonedb::TIMEZONEDB_HOST,
            timezonedb::HTTP_PORT,
            request.as_bytes(),
            &mut response,
        )
        .await?;
    timezonedb::parse_response(&response)
}
