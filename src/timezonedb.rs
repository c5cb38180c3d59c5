//! TimeZoneDB fallback: one HTTP/1.0 GET returning the zone's local time as JSON.

use core::fmt::Write as _;

use serde::Deserialize;

use crate::time_source::{TimeError, TimeSample};
use crate::unix_seconds::UnixSeconds;

/// Host of the TimeZoneDB API.
pub const TIMEZONEDB_HOST: &str = "api.timezonedb.com";
/// Plain HTTP port.
pub const HTTP_PORT: u16 = 80;
/// Largest accepted response body, in bytes.
pub const MAX_CONTENT_SIZE: usize = 512;
/// Capacity of the encoded request.
pub const REQUEST_CAPACITY: usize = 256;

/// Bytes of the status line kept by [`HttpResponse`]; the rest of a longer line is dropped.
pub const STATUS_LINE_CAPACITY: usize = 64;

/// Encode the GET request for `zone` using API `key`.
///
/// # Errors
///
/// [`TimeError::RequestTooLong`] if the key and zone do not fit the request buffer.
pub fn request(key: &str, zone: &str) -> Result<heapless::String<REQUEST_CAPACITY>, TimeError> {
    let mut request = heapless::String::new();
    write!(
        request,
        "GET /v2/get-time-zone?key={key}&by=zone&zone={zone}&format=json HTTP/1.0\r\n\
         Host: {TIMEZONEDB_HOST}\r\n\
         Connection: close\r\n\r\n"
    )
    .map_err(|_| TimeError::RequestTooLong)?;
    Ok(request)
}

#[derive(Deserialize)]
struct ZoneReply<'a> {
    status: &'a str,
    #[serde(default)]
    timestamp: i64,
    #[serde(rename = "gmtOffset", default)]
    gmt_offset: i32,
}

/// Where an [`HttpResponse`] is in the byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    StatusLine,
    /// Counts how much of the `\r\n\r\n` terminator has been seen.
    Headers(u8),
    Body,
}

/// An HTTP response assembled from the chunks a socket hands over.
///
/// The status line is kept, header lines are skipped as they stream past, and only the
/// body is buffered, so [`MAX_CONTENT_SIZE`] bounds the body alone however long the
/// headers are. Chunks may split the header terminator anywhere.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status_line: heapless::Vec<u8, STATUS_LINE_CAPACITY>,
    body: heapless::Vec<u8, MAX_CONTENT_SIZE>,
    section: Section,
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpResponse {
    /// An empty response waiting for its status line.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            status_line: heapless::Vec::new(),
            body: heapless::Vec::new(),
            section: Section::StatusLine,
        }
    }

    /// Take the next chunk read from the connection.
    ///
    /// # Errors
    ///
    /// [`TimeError::ResponseTooLarge`] once the body grows past [`MAX_CONTENT_SIZE`].
    pub fn feed(&mut self, chunk: &[u8]) -> Result<(), TimeError> {
        for &byte in chunk {
            match self.section {
                Section::StatusLine => match byte {
                    // The status line's own CRLF starts the terminator.
                    b'\n' => self.section = Section::Headers(2),
                    b'\r' => {}
                    // Anything past the capacity is the reason phrase.
                    _ => self.status_line.push(byte).unwrap_or_default(),
                },
                Section::Headers(seen) => {
                    self.section = match (seen, byte) {
                        (0 | 2, b'\r') => Section::Headers(seen.saturating_add(1)),
                        (1, b'\n') => Section::Headers(2),
                        (3, b'\n') => Section::Body,
                        (_, b'\r') => Section::Headers(1),
                        _ => Section::Headers(0),
                    };
                }
                Section::Body => self
                    .body
                    .push(byte)
                    .map_err(|_| TimeError::ResponseTooLarge)?,
            }
        }
        Ok(())
    }

    /// The buffered body, empty until the headers have ended.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Whether the blank line ending the headers has arrived.
    #[must_use]
    pub fn headers_complete(&self) -> bool {
        self.section == Section::Body
    }

    /// Status code from the status line.
    ///
    /// # Errors
    ///
    /// [`TimeError::Http`] with code 0 when the line is not `HTTP/x.y <code> ...`.
    pub fn status_code(&self) -> Result<u16, TimeError> {
        let line = core::str::from_utf8(&self.status_line).map_err(|_| TimeError::Http(0))?;
        let mut parts = line.split_ascii_whitespace();
        match (parts.next(), parts.next()) {
            (Some(version), Some(code)) if version.starts_with("HTTP/") => {
                code.parse().map_err(|_| TimeError::Http(0))
            }
            _ => Err(TimeError::Http(0)),
        }
    }
}

/// Turn a finished HTTP response into a time sample.
///
/// The reply's `timestamp` is local seconds for the zone; UTC is `timestamp - gmtOffset`.
///
/// # Errors
///
/// [`TimeError::Http`] for a malformed response or a status other than 200,
/// [`TimeError::Json`] for an unparsable body or a `status` other than `"OK"`,
/// and [`TimeError::InvalidTimestamp`] for a non-positive UTC time.
pub fn parse_response(response: &HttpResponse) -> Result<TimeSample, TimeError> {
    if !response.headers_complete() {
        return Err(TimeError::Http(0));
    }
    let status = response.status_code()?;
    if status != 200 {
        return Err(TimeError::Http(status));
    }

    let (reply, _) = serde_json_core::from_slice::<ZoneReply<'_>>(response.body())
        .map_err(|_| TimeError::Json)?;
    if reply.status != "OK" {
        return Err(TimeError::Json);
    }

    let utc = reply
        .timestamp
        .checked_sub(i64::from(reply.gmt_offset))
        .filter(|seconds| *seconds > 0)
        .ok_or(TimeError::InvalidTimestamp)?;

    Ok(TimeSample {
        unix_seconds: UnixSeconds(utc),
        utc_offset_minutes: Some(offset_minutes(reply.gmt_offset)),
    })
}

#[expect(
    clippy::integer_division_remainder_used,
    reason = "offsets are whole minutes"
)]
const fn offset_minutes(gmt_offset_seconds: i32) -> i32 {
    gmt_offset_seconds / 60
}
