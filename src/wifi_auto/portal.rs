//! The provisioning web page: a form for the network name and passphrase.

use core::fmt::Write as _;

use crate::credential_store::{PASSWORD_CAPACITY, SSID_CAPACITY, WifiCredentials};

/// Port the portal listens on.
pub const PORTAL_PORT: u16 = 80;
/// Largest request read from a browser.
pub const REQUEST_CAPACITY: usize = 1024;
/// Capacity of a rendered page, headers included.
pub const PAGE_CAPACITY: usize = 2048;

/// A rendered HTTP response.
pub type PageBuffer = heapless::String<PAGE_CAPACITY>;

const PAGE_HEAD: &str = "<!DOCTYPE html><html><head>\
    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
    <link rel=\"icon\" href=\"data:,\">\
    <style>body { font-family: Arial, sans-serif; max-width: 500px; margin: 50px auto; padding: 20px; }\
    input { width: 100%; padding: 10px; margin: 10px 0; box-sizing: border-box; }\
    button { width: 100%; padding: 12px; background-color: #4CAF50; color: white; border: none; }</style>";

/// Sent after credentials were accepted.
pub const SAVED_PAGE: &str = "HTTP/1.1 200 OK\r\n\
    Content-Type: text/html\r\n\
    Connection: close\r\n\
    \r\n\
    <!DOCTYPE html><html><head>\
    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
    <title>Saved</title></head><body>\
    <h1>Saved</h1>\
    <p>The clock will restart and join your network.</p>\
    </body></html>";

/// Sent for a malformed form or an unsupported request.
pub const REJECTED_PAGE: &str = "HTTP/1.1 400 Bad Request\r\n\
    Content-Type: text/html\r\n\
    Connection: close\r\n\
    \r\n\
    <!DOCTYPE html><html><head>\
    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
    <title>Error</title></head><body>\
    <h1>Error</h1>\
    <p>The network name is missing or too long.</p>\
    <p><a href=\"/\">Try again</a></p>\
    </body></html>";

/// The portal's answer to one request.
#[expect(
    clippy::large_enum_variant,
    reason = "built once per request and written straight out"
)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortalResponse {
    /// The form, prefilled when possible.
    Form(PageBuffer),
    /// Credentials were submitted; store them and restart.
    Saved(WifiCredentials),
    /// Anything else.
    Rejected,
}

impl PortalResponse {
    /// The HTTP response to write back.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Form(page) => page.as_bytes(),
            Self::Saved(_) => SAVED_PAGE.as_bytes(),
            Self::Rejected => REJECTED_PAGE.as_bytes(),
        }
    }
}

/// Answer a raw HTTP request. Any `GET` shows the form so phones' captive-portal
/// checks land on it; a `POST` submits it.
#[must_use]
pub fn handle_request(request: &[u8], prefill: Option<&WifiCredentials>) -> PortalResponse {
    let request = core::str::from_utf8(request).unwrap_or_default();
    let method = request.split_ascii_whitespace().next().unwrap_or_default();
    match method {
        "GET" => PortalResponse::Form(form_page(prefill)),
        "POST" => parse_form(request).map_or(PortalResponse::Rejected, PortalResponse::Saved),
        _ => PortalResponse::Rejected,
    }
}

/// Read `ssid` and `password` from the urlencoded body of a `POST`.
#[must_use]
pub fn parse_form(request: &str) -> Option<WifiCredentials> {
    let (_head, body) = request.split_once("\r\n\r\n")?;
    let mut ssid = None;
    let mut password = None;
    for pair in body.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match key {
            "ssid" => ssid = Some(url_decode::<SSID_CAPACITY>(value)?),
            "password" => password = Some(url_decode::<PASSWORD_CAPACITY>(value)?),
            _ => {}
        }
    }
    WifiCredentials::new(&ssid?, password.as_deref().unwrap_or_default())
}

/// Decode `application/x-www-form-urlencoded` text. `None` for a bad escape, invalid
/// UTF-8, or a result longer than `N` bytes.
#[must_use]
pub fn url_decode<const N: usize>(text: &str) -> Option<heapless::String<N>> {
    let mut decoded = heapless::Vec::<u8, N>::new();
    let mut bytes = text.bytes();
    while let Some(byte) = bytes.next() {
        let value = match byte {
            b'+' => b' ',
            b'%' => {
                let pair = [bytes.next()?, bytes.next()?];
                if !pair.iter().all(u8::is_ascii_hexdigit) {
                    return None;
                }
                u8::from_str_radix(core::str::from_utf8(&pair).ok()?, 16).ok()?
            }
            other => other,
        };
        decoded.push(value).ok()?;
    }
    heapless::String::from_utf8(decoded).ok()
}

/// Escape text for an HTML attribute; output past `N` bytes is dropped.
#[must_use]
pub fn escape_html<const N: usize>(text: &str) -> heapless::String<N> {
    let mut escaped = heapless::String::new();
    for ch in text.chars() {
        let pushed = match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        };
        if pushed.is_err() {
            break;
        }
    }
    escaped
}

/// The provisioning form, with the SSID of `prefill` filled in.
#[must_use]
pub fn form_page(prefill: Option<&WifiCredentials>) -> PageBuffer {
    let ssid = prefill.map_or_else(heapless::String::<192>::new, |credentials| {
        escape_html(&credentials.ssid)
    });
    let mut page = PageBuffer::new();
    // The template fits PAGE_CAPACITY even with the longest escaped SSID.
    let _ = write!(
        page,
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/html\r\n\
         Connection: close\r\n\
         \r\n\
         {PAGE_HEAD}<title>Alarm Clock Wi-Fi</title></head><body>\
         <h1>Alarm Clock Wi-Fi</h1>\
         <form method=\"POST\" action=\"/\">\
         <label for=\"ssid\">Network name (SSID)</label>\
         <input type=\"text\" id=\"ssid\" name=\"ssid\" maxlength=\"{SSID_CAPACITY}\" value=\"{ssid}\" required>\
         <label for=\"password\">Password (empty for an open network)</label>\
         <input type=\"password\" id=\"password\" name=\"password\" maxlength=\"{PASSWORD_CAPACITY}\">\
         <button type=\"submit\">Save</button>\
         </form></body></html>"
    );
    page
}

// ============================================================================
// Server task
// ============================================================================

#[cfg(all(feature = "wifi", any(feature = "pico1", feature = "pico2")))]
mod device {
    #![allow(clippy::future_not_send, reason = "single-threaded")]

    use embassy_net::Stack;
    use embassy_net::tcp::TcpSocket;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_sync::channel::Channel;
    use embassy_time::{Duration, Timer};
    use embedded_io_async::Write as _;

    use super::{PORTAL_PORT, PortalResponse, REQUEST_CAPACITY, handle_request};
    use crate::credential_store::WifiCredentials;
    use crate::fmt::{info, warn};

    /// How long a browser connection may stay idle.
    const SOCKET_TIMEOUT: Duration = Duration::from_secs(30);

    /// Credentials submitted through the portal.
    pub type PortalSubmissions = Channel<CriticalSectionRawMutex, WifiCredentials, 1>;

    /// Serve the provisioning form and pass each accepted submission to `submissions`.
    #[embassy_executor::task]
    pub async fn http_server_task(
        stack: Stack<'static>,
        prefill: Option<WifiCredentials>,
        submissions: &'static PortalSubmissions,
    ) -> ! {
        info!("Provisioning portal listening on port {}", PORTAL_PORT);
        let mut rx_buffer = [0_u8; 1024];
        let mut tx_buffer = [0_u8; 2048];
        let mut request = [0_u8; REQUEST_CAPACITY];

        loop {
            let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
            socket.set_timeout(Some(SOCKET_TIMEOUT));
            if let Err(err) = socket.accept(PORTAL_PORT).await {
                warn!("Portal accept error: {:?}", err);
                Timer::after_millis(500).await;
                continue;
            }

            let request_len = match socket.read(&mut request).await {
                Ok(0) => {
                    socket.close();
                    continue;
                }
                Ok(len) => len,
                Err(err) => {
                    warn!("Portal read error: {:?}", err);
                    socket.close();
                    continue;
                }
            };

            let response = handle_request(
                request.get(..request_len).unwrap_or_default(),
                prefill.as_ref(),
            );
            if let Err(err) = socket.write_all(response.as_bytes()).await {
                warn!("Portal write error: {:?}", err);
            }
            let _ = socket.flush().await;
            socket.close();

            if let PortalResponse::Saved(credentials) = response {
                info!("Portal received credentials for {}", credentials.ssid.as_str());
                submissions.send(credentials).await;
            }
            Timer::after_millis(100).await;
        }
    }
}

#[cfg(all(feature = "wifi", any(feature = "pico1", feature = "pico2")))]
pub use device::{PortalSubmissions, http_server_task};
