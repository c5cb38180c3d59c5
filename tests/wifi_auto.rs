//! Host-level tests for Wi-Fi provisioning: the plan, the portal form, DNS and DHCP.

use core::net::Ipv4Addr;

use alarm_kit::credential_store::{WifiCredentials, WifiRecord, WifiStartMode};
use alarm_kit::wifi_auto::dhcp::{
    AddressPool, DhcpMessage, LEASE_SECONDS, LeaseTable, MAX_LEASES, MessageType, ReplyKind,
    build_reply, parse_message, respond,
};
use alarm_kit::wifi_auto::portal::{
    PortalResponse, REJECTED_PAGE, SAVED_PAGE, escape_html, form_page, handle_request,
    parse_form, url_decode,
};
use alarm_kit::wifi_auto::{AP_ADDRESS, JoinAttempts, MAX_CONNECTION_ATTEMPTS, WifiPlan, dns};
use embassy_time::Instant;

fn credentials(ssid: &str, password: &str) -> WifiCredentials {
    WifiCredentials::new(ssid, password).unwrap()
}

// ============================================================================
// Plan
// ============================================================================

#[test]
fn stored_credentials_win_over_built_in_ones() {
    let record = WifiRecord {
        credentials: Some(credentials("stored", "one")),
        start_mode: WifiStartMode::Client,
    };
    let plan = WifiPlan::choose(record, Some(credentials("built-in", "two")), false);
    assert_eq!(plan, WifiPlan::Join(credentials("stored", "one")));
}

#[test]
fn nothing_known_opens_the_portal_empty() {
    let plan = WifiPlan::choose(WifiRecord::default(), None, false);
    assert_eq!(plan, WifiPlan::Portal { prefill: None });
}

#[test]
fn access_point_start_mode_opens_the_portal_prefilled() {
    let record = WifiRecord {
        credentials: Some(credentials("home", "old")),
        start_mode: WifiStartMode::AccessPoint,
    };
    let plan = WifiPlan::choose(record, None, false);
    assert_eq!(
        plan,
        WifiPlan::Portal {
            prefill: Some(credentials("home", "old"))
        }
    );
}

#[test]
fn held_button_opens_the_portal_even_with_credentials() {
    let plan = WifiPlan::choose(WifiRecord::default(), Some(credentials("home", "pw")), true);
    assert_eq!(
        plan,
        WifiPlan::Portal {
            prefill: Some(credentials("home", "pw"))
        }
    );
}

#[test]
fn join_attempts_give_up_at_the_limit() {
    let mut attempts = JoinAttempts::new();
    for _ in 1..MAX_CONNECTION_ATTEMPTS {
        assert!(!attempts.failed());
    }
    assert_eq!(attempts.count(), MAX_CONNECTION_ATTEMPTS - 1);
    assert!(attempts.failed());
}

#[test]
fn successful_join_resets_the_count() {
    let mut attempts = JoinAttempts::new();
    for _ in 1..MAX_CONNECTION_ATTEMPTS {
        attempts.failed();
    }
    attempts.joined();
    assert_eq!(attempts.count(), 0);
    assert!(!attempts.failed());
}

// ============================================================================
// Portal
// ============================================================================

#[test]
fn url_decode_handles_plus_and_escapes() {
    assert_eq!(
        url_decode::<32>("My+Home%20Net%21").unwrap().as_str(),
        "My Home Net!"
    );
    assert_eq!(url_decode::<32>("caf%C3%A9").unwrap().as_str(), "café");
}

#[test]
fn url_decode_rejects_bad_input() {
    assert!(url_decode::<32>("%4").is_none());
    assert!(url_decode::<32>("%zz").is_none());
    assert!(url_decode::<32>("%FF").is_none());
    assert!(url_decode::<4>("toolong").is_none());
}

#[test]
fn escape_html_neutralizes_markup() {
    assert_eq!(
        escape_html::<64>("<a href=\"x\">&'").as_str(),
        "&lt;a href=&quot;x&quot;&gt;&amp;&#39;"
    );
    assert_eq!(escape_html::<4>("a<b").as_str(), "a");
}

#[test]
fn form_body_gives_credentials() {
    let request = "POST / HTTP/1.1\r\nHost: 192.168.4.1\r\n\r\nssid=My+Net&password=p%40ss";
    assert_eq!(parse_form(request), Some(credentials("My Net", "p@ss")));
}

#[test]
fn form_without_password_is_an_open_network() {
    let request = "POST / HTTP/1.1\r\n\r\nssid=library";
    assert_eq!(parse_form(request), Some(credentials("library", "")));
}

#[test]
fn form_without_ssid_is_rejected() {
    assert_eq!(parse_form("POST / HTTP/1.1\r\n\r\nssid=&password=x"), None);
    assert_eq!(parse_form("POST / HTTP/1.1\r\n\r\npassword=x"), None);
    assert_eq!(parse_form("POST / HTTP/1.1\r\nssid=x"), None);
}

#[test]
fn get_shows_the_form_with_the_escaped_ssid() {
    let prefill = credentials("<Home>", "secret");
    let PortalResponse::Form(page) = handle_request(b"GET / HTTP/1.1\r\n\r\n", Some(&prefill))
    else {
        panic!("expected the form");
    };
    assert!(page.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(page.contains("value=\"&lt;Home&gt;\""));
    assert!(!page.contains("secret"));
}

#[test]
fn any_get_path_shows_the_form() {
    let response = handle_request(b"GET /generate_204 HTTP/1.1\r\n\r\n", None);
    assert_eq!(response, PortalResponse::Form(form_page(None)));
}

#[test]
fn post_saves_or_rejects() {
    let saved = handle_request(b"POST / HTTP/1.1\r\n\r\nssid=home&password=pw", None);
    assert_eq!(saved, PortalResponse::Saved(credentials("home", "pw")));
    assert_eq!(saved.as_bytes(), SAVED_PAGE.as_bytes());

    let rejected = handle_request(b"POST / HTTP/1.1\r\n\r\nssid=", None);
    assert_eq!(rejected, PortalResponse::Rejected);
    assert!(rejected.as_bytes().starts_with(b"HTTP/1.1 400 Bad Request\r\n"));
}

#[test]
fn other_methods_and_garbage_are_rejected() {
    assert_eq!(
        handle_request(b"DELETE / HTTP/1.1\r\n\r\n", None),
        PortalResponse::Rejected
    );
    assert_eq!(
        handle_request(&[0xFF, 0xFE, 0x00], None).as_bytes(),
        REJECTED_PAGE.as_bytes()
    );
}

// ============================================================================
// DNS
// ============================================================================

/// A standard query for `example.com`, type A, with recursion desired.
fn example_query() -> Vec<u8> {
    let mut query = vec![0x12, 0x34, 0x01, 0x00, 0, 1, 0, 0, 0, 0, 0, 0];
    query.extend_from_slice(b"\x07example\x03com\x00");
    query.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);
    query
}

#[test]
fn every_name_resolves_to_the_access_point() {
    let query = example_query();
    let mut response = [0_u8; dns::MAX_MESSAGE_LEN];
    let len = dns::answer(&query, AP_ADDRESS, &mut response).unwrap();
    assert_eq!(len, query.len() + 16);

    let reply = &response[..len];
    assert_eq!(&reply[..2], &[0x12, 0x34]);
    assert_eq!(&reply[2..4], &[0x84, 0x00]);
    assert_eq!(&reply[4..12], &[0, 1, 0, 1, 0, 0, 0, 0]);
    assert_eq!(&reply[12..query.len()], &query[12..]);
    assert_eq!(
        &reply[query.len()..],
        &[0xC0, 0x0C, 0, 1, 0, 1, 0, 0, 0, 60, 0, 4, 192, 168, 4, 1]
    );
}

#[test]
fn dns_responses_and_truncated_queries_are_ignored() {
    let mut response = [0_u8; dns::MAX_MESSAGE_LEN];

    let mut reply = example_query();
    reply[2] |= 0x80;
    assert_eq!(dns::answer(&reply, AP_ADDRESS, &mut response), None);

    let query = example_query();
    let truncated = &query[..query.len() - 2];
    assert_eq!(dns::answer(truncated, AP_ADDRESS, &mut response), None);
    assert_eq!(dns::answer(&query[..8], AP_ADDRESS, &mut response), None);
}

#[test]
fn dns_answer_that_does_not_fit_is_dropped() {
    let query = example_query();
    let mut response = [0_u8; 20];
    assert_eq!(dns::answer(&query, AP_ADDRESS, &mut response), None);
}

// ============================================================================
// DHCP
// ============================================================================

const CLIENT_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0xAA, 0xBB, 0xCC];
const OTHER_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x11, 0x22, 0x33];

/// A BOOTREQUEST from `mac` with the given options (code, payload) after the message type.
fn dhcp_frame(mac: [u8; 6], message_type: u8, options: &[(u8, &[u8])]) -> Vec<u8> {
    let mut frame = vec![0_u8; 240];
    frame[..4].copy_from_slice(&[1, 1, 6, 0]);
    frame[4..8].copy_from_slice(&0xDEAD_BEEF_u32.to_be_bytes());
    frame[10..12].copy_from_slice(&0x8000_u16.to_be_bytes());
    frame[28..34].copy_from_slice(&mac);
    frame[236..240].copy_from_slice(&[99, 130, 83, 99]);
    frame.extend_from_slice(&[53, 1, message_type]);
    for (code, payload) in options {
        frame.push(*code);
        frame.push(u8::try_from(payload.len()).unwrap());
        frame.extend_from_slice(payload);
    }
    frame.push(255);
    frame
}

fn at(seconds: u64) -> Instant {
    Instant::from_secs(seconds)
}

#[test]
fn discover_is_parsed() {
    let frame = dhcp_frame(CLIENT_MAC, 1, &[(0, &[]), (12, b"phone")]);
    let message = parse_message(&frame).unwrap();
    assert_eq!(
        message,
        DhcpMessage {
            message_type: MessageType::Discover,
            transaction_id: 0xDEAD_BEEF,
            flags: 0x8000,
            client_mac: CLIENT_MAC,
            client_ip: None,
            requested_ip: None,
            server_id: None,
        }
    );
}

#[test]
fn request_options_are_parsed() {
    let frame = dhcp_frame(CLIENT_MAC, 3, &[(50, &[192, 168, 4, 9]), (54, &[192, 168, 4, 1])]);
    let message = parse_message(&frame).unwrap();
    assert_eq!(message.message_type, MessageType::Request);
    assert_eq!(message.requested_ip, Some(Ipv4Addr::new(192, 168, 4, 9)));
    assert_eq!(message.server_id, Some(AP_ADDRESS));
}

#[test]
fn non_dhcp_frames_are_ignored() {
    let mut reply = dhcp_frame(CLIENT_MAC, 1, &[]);
    reply[0] = 2;
    assert_eq!(parse_message(&reply), None);

    let mut no_cookie = dhcp_frame(CLIENT_MAC, 1, &[]);
    no_cookie[236] = 0;
    assert_eq!(parse_message(&no_cookie), None);

    let no_type = {
        let mut frame = dhcp_frame(CLIENT_MAC, 1, &[]);
        frame.truncate(240);
        frame.push(255);
        frame
    };
    assert_eq!(parse_message(&no_type), None);
    assert_eq!(parse_message(&[1, 1, 6]), None);
}

#[test]
fn discover_then_request_leases_the_first_address() {
    let pool = AddressPool::ACCESS_POINT;
    let mut leases = LeaseTable::new();

    let discover = parse_message(&dhcp_frame(CLIENT_MAC, 1, &[])).unwrap();
    let offer = respond(&mut leases, &pool, &discover, at(0));
    assert_eq!(offer, Some((ReplyKind::Offer, Ipv4Addr::new(192, 168, 4, 2))));

    let request = parse_message(&dhcp_frame(
        CLIENT_MAC,
        3,
        &[(50, &[192, 168, 4, 2]), (54, &[192, 168, 4, 1])],
    ))
    .unwrap();
    let ack = respond(&mut leases, &pool, &request, at(1));
    assert_eq!(ack, Some((ReplyKind::Ack, Ipv4Addr::new(192, 168, 4, 2))));
    assert_eq!(leases.len(), 1);
}

#[test]
fn second_client_gets_the_next_address() {
    let pool = AddressPool::ACCESS_POINT;
    let mut leases = LeaseTable::new();
    let first = leases.assign(&pool, CLIENT_MAC, None, at(0));
    let second = leases.assign(&pool, OTHER_MAC, Some(Ipv4Addr::new(192, 168, 4, 2)), at(0));
    assert_eq!(first, Some(Ipv4Addr::new(192, 168, 4, 2)));
    assert_eq!(second, Some(Ipv4Addr::new(192, 168, 4, 3)));
    assert_eq!(leases.holder(Ipv4Addr::new(192, 168, 4, 3)), Some(OTHER_MAC));
}

#[test]
fn request_for_another_server_is_ignored() {
    let pool = AddressPool::ACCESS_POINT;
    let mut leases = LeaseTable::new();
    let request =
        parse_message(&dhcp_frame(CLIENT_MAC, 3, &[(54, &[10, 0, 0, 1])])).unwrap();
    assert_eq!(respond(&mut leases, &pool, &request, at(0)), None);
    assert!(leases.is_empty());
}

#[test]
fn release_frees_the_address() {
    let pool = AddressPool::ACCESS_POINT;
    let mut leases = LeaseTable::new();
    leases.assign(&pool, CLIENT_MAC, None, at(0));
    let release = parse_message(&dhcp_frame(CLIENT_MAC, 7, &[])).unwrap();
    assert_eq!(respond(&mut leases, &pool, &release, at(1)), None);
    assert!(leases.is_empty());
}

#[test]
fn expired_leases_are_reused() {
    let pool = AddressPool::ACCESS_POINT;
    let mut leases = LeaseTable::new();
    for index in 0..MAX_LEASES {
        let mac = [2, 0, 0, 0, 0, u8::try_from(index).unwrap()];
        assert!(leases.assign(&pool, mac, None, at(0)).is_some());
    }
    assert_eq!(leases.assign(&pool, CLIENT_MAC, None, at(1)), None);

    let later = at(u64::from(LEASE_SECONDS) + 1);
    assert_eq!(
        leases.assign(&pool, CLIENT_MAC, None, later),
        Some(Ipv4Addr::new(192, 168, 4, 2))
    );
    assert_eq!(leases.len(), 1);
}

#[test]
fn pool_bounds_and_broadcast() {
    let pool = AddressPool::ACCESS_POINT;
    assert_eq!(pool.broadcast(), Ipv4Addr::new(192, 168, 4, 255));
    assert_eq!(pool.nth(252), Some(Ipv4Addr::new(192, 168, 4, 254)));
    assert_eq!(pool.nth(253), None);
    assert!(pool.contains(Ipv4Addr::new(192, 168, 4, 2)));
    assert!(!pool.contains(AP_ADDRESS));
    assert!(!pool.contains(Ipv4Addr::new(192, 168, 4, 255)));
}

#[test]
fn offer_carries_the_network_settings() {
    let pool = AddressPool::ACCESS_POINT;
    let request = parse_message(&dhcp_frame(CLIENT_MAC, 1, &[])).unwrap();
    let mut buffer = [0_u8; 576];
    let address = Ipv4Addr::new(192, 168, 4, 2);
    let len = build_reply(&mut buffer, &request, ReplyKind::Offer, address, &pool).unwrap();
    assert_eq!(len, 300);

    let reply = &buffer[..len];
    assert_eq!(&reply[..4], &[2, 1, 6, 0]);
    assert_eq!(&reply[4..8], &0xDEAD_BEEF_u32.to_be_bytes());
    assert_eq!(&reply[10..12], &[0x80, 0x00]);
    assert_eq!(&reply[16..20], &[192, 168, 4, 2]);
    assert_eq!(&reply[20..24], &[192, 168, 4, 1]);
    assert_eq!(&reply[28..34], &CLIENT_MAC);
    assert_eq!(&reply[236..240], &[99, 130, 83, 99]);
    assert_eq!(&reply[240..243], &[53, 1, 2]);
    assert_eq!(&reply[243..249], &[54, 4, 192, 168, 4, 1]);
    assert_eq!(&reply[249..255], &[51, 4, 0, 0, 0, 30]);

    let options = &reply[240..];
    assert!(options.windows(6).any(|w| w == [1, 4, 255, 255, 255, 0]));
    assert!(options.windows(6).any(|w| w == [6, 4, 192, 168, 4, 1]));
    assert!(options.windows(6).any(|w| w == [28, 4, 192, 168, 4, 255]));
}

#[test]
fn reply_needs_room_for_a_bootp_message() {
    let pool = AddressPool::ACCESS_POINT;
    let request = parse_message(&dhcp_frame(CLIENT_MAC, 3, &[])).unwrap();
    let mut buffer = [0_u8; 299];
    assert_eq!(
        build_reply(&mut buffer, &request, ReplyKind::Ack, AP_ADDRESS, &pool),
        None
    );
}
