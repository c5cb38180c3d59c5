//! Wi-Fi provisioning: pick between joining a network and opening a captive portal.
//!
//! The clock joins the network stored in flash (or the one baked in at build time).
//! When there is none, when the button is held at power-up, or when
//! [`MAX_CONNECTION_ATTEMPTS`] joins in a row fail, it opens the open access point
//! [`AP_SSID`] instead. The access point answers DHCP ([`dhcp`]) and every DNS query
//! ([`dns`]) with its own address, and serves a form ([`portal`]) whose submission is
//! stored before the clock restarts in client mode.

use core::net::Ipv4Addr;

use crate::credential_store::{WifiCredentials, WifiRecord, WifiStartMode};

pub mod dhcp;
pub mod dns;
pub mod portal;

/// Name of the provisioning access point.
pub const AP_SSID: &str = "AlarmClock";
/// Radio channel of the access point.
pub const AP_CHANNEL: u8 = 1;
/// Address of the clock on its own access point.
pub const AP_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);
/// Prefix length of the access point network.
pub const AP_PREFIX_LEN: u8 = 24;
/// Failed joins in a row before the clock falls back to the portal.
pub const MAX_CONNECTION_ATTEMPTS: u8 = 30;

/// What the radio does after power-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WifiPlan {
    /// Join this network.
    Join(WifiCredentials),
    /// Run the provisioning portal, offering these credentials in the form.
    Portal { prefill: Option<WifiCredentials> },
}

impl WifiPlan {
    /// Decide from the stored record, the build-time credentials and whether the
    /// user asked for the portal.
    ///
    /// Stored credentials win over built-in ones.
    ///
    /// ```
    /// use alarm_kit::credential_store::{WifiCredentials, WifiRecord};
    /// use alarm_kit::wifi_auto::WifiPlan;
    ///
    /// let built_in = WifiCredentials::new("home", "secret");
    /// let plan = WifiPlan::choose(WifiRecord::default(), built_in.clone(), false);
    /// assert_eq!(plan, WifiPlan::Join(built_in.unwrap()));
    /// ```
    #[must_use]
    pub fn choose(
        record: WifiRecord,
        built_in: Option<WifiCredentials>,
        portal_requested: bool,
    ) -> Self {
        let known = record.credentials.or(built_in);
        match (known, record.start_mode, portal_requested) {
            (Some(credentials), WifiStartMode::Client, false) => Self::Join(credentials),
            (prefill, _, _) => Self::Portal { prefill },
        }
    }
}

/// Counts failed joins and says when to give up on the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JoinAttempts(u8);

impl JoinAttempts {
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Record one failed join. Returns `true` once [`MAX_CONNECTION_ATTEMPTS`] have failed.
    pub const fn failed(&mut self) -> bool {
        self.0 = self.0.saturating_add(1);
        self.0 >= MAX_CONNECTION_ATTEMPTS
    }

    /// A join worked; start counting again.
    pub const fn joined(&mut self) {
        self.0 = 0;
    }

    /// Failures so far.
    #[must_use]
    pub const fn count(self) -> u8 {
        self.0
    }
}
