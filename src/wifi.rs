//! Wi-Fi for the Pico W's CYW43 radio, in client or provisioning mode.
//!
//! In client mode the device joins the chosen network, brings up DHCP and hands
//! out the `embassy-net` stack. Failed joins are retried every second; after
//! [`MAX_CONNECTION_ATTEMPTS`] in a row the next boot is switched to the portal and
//! the board restarts. A dropped link is rejoined.
//!
//! In portal mode the device opens the access point [`AP_SSID`], serves DHCP, DNS and
//! the provisioning form, stores the submitted credentials and restarts.
//! Progress is reported as [`WifiEvent`]s.

#![allow(clippy::future_not_send, reason = "single-threaded")]
#![allow(
    unsafe_code,
    reason = "bind_interrupts! defines the PIO interrupt handler"
)]

use core::convert::Infallible;

use cortex_m::peripheral::SCB;
use cyw43::JoinOptions;
use cyw43_pio::{DEFAULT_CLOCK_DIVIDER, PioSpi};
use embassy_executor::Spawner;
use embassy_net::{Config, DhcpConfig, Ipv4Cidr, Stack, StackResources, StaticConfigV4};
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::{DMA_CH0, PIN_23, PIN_24, PIN_25, PIN_29, PIO0};
use embassy_rp::pio::{InterruptHandler, Pio};
use embassy_rp::{Peri, bind_interrupts};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::once_lock::OnceLock;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use static_cell::StaticCell;

use crate::Result;
use crate::credential_store::{CredentialStore, WifiCredentials, WifiRecord, WifiStartMode};
use crate::fmt::{error, info, warn};
use crate::wifi_auto::dhcp::{AddressPool, dhcp_server_task};
use crate::wifi_auto::dns::dns_server_task;
use crate::wifi_auto::portal::{PortalSubmissions, http_server_task};
use crate::wifi_auto::{
    AP_ADDRESS, AP_CHANNEL, AP_PREFIX_LEN, AP_SSID, JoinAttempts, MAX_CONNECTION_ATTEMPTS,
    WifiPlan,
};

/// Delay between join attempts.
const JOIN_RETRY: Duration = Duration::from_secs(1);
/// How often a connected link is checked.
const LINK_CHECK_INTERVAL: Duration = Duration::from_secs(5);
/// Pause before restarting into the portal, so the log drains.
const PORTAL_RESTART_DELAY: Duration = Duration::from_millis(500);
/// Pause before restarting with new credentials, so the browser gets its page.
const CREDENTIALS_RESTART_DELAY: Duration = Duration::from_millis(750);

// ============================================================================
// Types
// ============================================================================

/// Events emitted by [`Wifi`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WifiEvent {
    /// Joining (or rejoining) the network.
    Connecting,
    /// Joined and DHCP configured; [`Wifi::stack`] is ready.
    Connected,
    /// A join attempt failed; another follows shortly.
    JoinFailed,
    /// The provisioning access point is up and waiting for a browser.
    PortalReady,
}

/// Signal type for [`WifiEvent`]s.
pub type WifiEvents = Signal<CriticalSectionRawMutex, WifiEvent>;

/// The CYW43 peripherals of a Pico W / Pico 2 W.
pub struct WifiPins {
    pub pin_23: Peri<'static, PIN_23>,
    pub pin_25: Peri<'static, PIN_25>,
    pub pio0: Peri<'static, PIO0>,
    pub pin_24: Peri<'static, PIN_24>,
    pub pin_29: Peri<'static, PIN_29>,
    pub dma_ch0: Peri<'static, DMA_CH0>,
}

/// Static resources for [`Wifi`].
pub struct WifiStatic {
    events: WifiEvents,
    stack: OnceLock<Stack<'static>>,
    submissions: PortalSubmissions,
    wifi_cell: StaticCell<Wifi>,
}

// ============================================================================
// Wifi device
// ============================================================================

/// Wi-Fi device.
///
/// ```ignore
/// static WIFI_STATIC: WifiStatic = Wifi::new_static();
/// let plan = WifiPlan::choose(store.load(), built_in, button_held);
/// let wifi = Wifi::new(&WIFI_STATIC, pins, plan, store, spawner)?;
/// loop {
///     if wifi.wait().await == WifiEvent::Connected {
///         break;
///     }
/// }
/// let stack = wifi.stack().await;
/// ```
pub struct Wifi {
    events: &'static WifiEvents,
    stack: &'static OnceLock<Stack<'static>>,
}

impl Wifi {
    #[must_use]
    pub const fn new_static() -> WifiStatic {
        WifiStatic {
            events: Signal::new(),
            stack: OnceLock::new(),
            submissions: PortalSubmissions::new(),
            wifi_cell: StaticCell::new(),
        }
    }

    /// Spawn the Wi-Fi task for `plan`.
    ///
    /// # Errors
    ///
    /// [`crate::Error::TaskSpawn`] if the task is already running.
    pub fn new(
        wifi_static: &'static WifiStatic,
        pins: WifiPins,
        plan: WifiPlan,
        store: CredentialStore,
        spawner: Spawner,
    ) -> Result<&'static Self> {
        let token = wifi_device_loop(pins, plan, store, wifi_static, spawner)?;
        spawner.spawn(token);
        Ok(wifi_static.wifi_cell.init(Self {
            events: &wifi_static.events,
            stack: &wifi_static.stack,
        }))
    }

    /// Wait for the next event.
    pub async fn wait(&self) -> WifiEvent {
        self.events.wait().await
    }

    /// Wait until the first client connection and return the network stack.
    ///
    /// Never returns in portal mode.
    pub async fn stack(&self) -> Stack<'static> {
        *self.stack.get().await
    }
}

bind_interrupts!(struct Irqs {
    PIO0_IRQ_0 => InterruptHandler<PIO0>;
});

#[embassy_executor::task]
async fn wifi_device_loop(
    pins: WifiPins,
    plan: WifiPlan,
    store: CredentialStore,
    wifi_static: &'static WifiStatic,
    spawner: Spawner,
) -> ! {
    let err = inner_wifi_device_loop(pins, plan, store, wifi_static, spawner)
        .await
        .unwrap_err();
    core::panic!("{err}");
}

async fn inner_wifi_device_loop(
    pins: WifiPins,
    plan: WifiPlan,
    store: CredentialStore,
    wifi_static: &'static WifiStatic,
    spawner: Spawner,
) -> Result<Infallible> {
    let (net_device, control) = start_radio(pins, spawner).await?;
    match plan {
        WifiPlan::Join(credentials) => {
            run_client(net_device, control, credentials, &store, wifi_static, spawner).await
        }
        WifiPlan::Portal { prefill } => {
            run_portal(net_device, control, prefill, &store, wifi_static, spawner).await
        }
    }
}

/// Power up the CYW43, load its firmware and spawn its runner.
async fn start_radio(
    pins: WifiPins,
    spawner: Spawner,
) -> Result<(cyw43::NetDriver<'static>, cyw43::Control<'static>)> {
    let fw = cyw43_firmware::CYW43_43439A0;
    let clm = cyw43_firmware::CYW43_43439A0_CLM;

    let WifiPins {
        pin_23,
        pin_25,
        pio0,
        pin_24,
        pin_29,
        dma_ch0,
    } = pins;
    let pwr = Output::new(pin_23, Level::Low);
    let cs = Output::new(pin_25, Level::High);
    let mut pio = Pio::new(pio0, Irqs);
    let spi = PioSpi::new(
        &mut pio.common,
        pio.sm0,
        DEFAULT_CLOCK_DIVIDER,
        pio.irq0,
        cs,
        pin_24,
        pin_29,
        dma_ch0,
    );

    static STATE: StaticCell<cyw43::State> = StaticCell::new();
    let state = STATE.init(cyw43::State::new());
    let (net_device, mut control, runner) = cyw43::new(state, pwr, spi, fw).await;
    let wifi_token = cyw43_task(runner)?;
    spawner.spawn(wifi_token);

    control.init(clm).await;
    control
        .set_power_management(cyw43::PowerManagementMode::PowerSave)
        .await;
    Ok((net_device, control))
}

/// Bring up `embassy-net` over the radio with `config` and spawn its runner.
fn start_stack(
    net_device: cyw43::NetDriver<'static>,
    config: Config,
    spawner: Spawner,
) -> Result<Stack<'static>> {
    let seed = 0x5a3c_91e7_0d42_b86f;

    static RESOURCES: StaticCell<StackResources<6>> = StaticCell::new();
    let (stack, runner) = embassy_net::new(
        net_device,
        config,
        RESOURCES.init(StackResources::<6>::new()),
        seed,
    );
    let net_token = net_task(runner)?;
    spawner.spawn(net_token);
    Ok(stack)
}

// ============================================================================
// Client mode
// ============================================================================

async fn run_client(
    net_device: cyw43::NetDriver<'static>,
    mut control: cyw43::Control<'static>,
    credentials: WifiCredentials,
    store: &CredentialStore,
    wifi_static: &'static WifiStatic,
    spawner: Spawner,
) -> Result<Infallible> {
    info!("WiFi device initializing in client mode");
    let events = &wifi_static.events;
    let stack = start_stack(net_device, Config::dhcpv4(DhcpConfig::default()), spawner)?;
    let mut attempts = JoinAttempts::new();

    loop {
        info!("Connecting to WiFi: {}", credentials.ssid.as_str());
        events.signal(WifiEvent::Connecting);
        loop {
            let options = if credentials.password.is_empty() {
                JoinOptions::new_open()
            } else {
                JoinOptions::new(credentials.password.as_bytes())
            };
            match control.join(&credentials.ssid, options).await {
                Ok(()) => break,
                Err(err) => {
                    warn!(
                        "Join failed: {} (attempt {}/{})",
                        err.status,
                        attempts.count().saturating_add(1),
                        MAX_CONNECTION_ATTEMPTS
                    );
                    events.signal(WifiEvent::JoinFailed);
                    if attempts.failed() {
                        restart_into_portal(store, &credentials).await;
                    }
                    Timer::after(JOIN_RETRY).await;
                }
            }
        }
        attempts.joined();

        info!("WiFi joined; waiting for DHCP");
        stack.wait_config_up().await;
        if let Some(config) = stack.config_v4() {
            info!("IP Address: {}", config.address);
        }
        let _ = wifi_static.stack.init(stack);
        events.signal(WifiEvent::Connected);

        while stack.is_link_up() {
            Timer::after(LINK_CHECK_INTERVAL).await;
        }
        warn!("WiFi link lost; rejoining");
    }
}

/// Remember `credentials`, mark the next boot for the portal and restart.
async fn restart_into_portal(store: &CredentialStore, credentials: &WifiCredentials) -> ! {
    warn!(
        "Giving up after {} failed joins; restarting into the portal",
        MAX_CONNECTION_ATTEMPTS
    );
    let record = WifiRecord {
        credentials: Some(credentials.clone()),
        start_mode: WifiStartMode::AccessPoint,
    };
    if let Err(err) = store.save(&record) {
        error!("Saving the portal start mode failed: {}", err);
    }
    Timer::after(PORTAL_RESTART_DELAY).await;
    SCB::sys_reset()
}

// ============================================================================
// Portal mode
// ============================================================================

async fn run_portal(
    net_device: cyw43::NetDriver<'static>,
    mut control: cyw43::Control<'static>,
    prefill: Option<WifiCredentials>,
    store: &CredentialStore,
    wifi_static: &'static WifiStatic,
    spawner: Spawner,
) -> Result<Infallible> {
    info!("WiFi device initializing in portal mode");
    let config = Config::ipv4_static(StaticConfigV4 {
        address: Ipv4Cidr::new(AP_ADDRESS, AP_PREFIX_LEN),
        gateway: Some(AP_ADDRESS),
        dns_servers: heapless::Vec::from_slice(&[AP_ADDRESS]).unwrap_or_default(),
    });
    let stack = start_stack(net_device, config, spawner)?;

    control.start_ap_open(AP_SSID, AP_CHANNEL).await;
    info!("Access point started: {}", AP_SSID);
    stack.wait_config_up().await;

    spawner.spawn(dhcp_server_task(stack, AddressPool::ACCESS_POINT)?);
    spawner.spawn(dns_server_task(stack, AP_ADDRESS)?);
    spawner.spawn(http_server_task(
        stack,
        prefill,
        &wifi_static.submissions,
    )?);
    info!("Portal ready - connect to '{}'", AP_SSID);
    wifi_static.events.signal(WifiEvent::PortalReady);

    loop {
        let credentials = wifi_static.submissions.receive().await;
        match store.save_credentials(credentials) {
            Ok(()) => {
                Timer::after(CREDENTIALS_RESTART_DELAY).await;
                SCB::sys_reset();
            }
            // The form stays up; the next submission tries again.
            Err(err) => error!("Saving Wi-Fi credentials failed: {}", err),
        }
    }
}

// ============================================================================
// Radio and network runners
// ============================================================================

#[embassy_executor::task]
async fn cyw43_task(
    runner: cyw43::Runner<'static, Output<'static>, PioSpi<'static, PIO0, 0, DMA_CH0>>,
) -> ! {
    runner.run().await
}

#[embassy_executor::task]
async fn net_task(mut runner: embassy_net::Runner<'static, cyw43::NetDriver<'static>>) -> ! {
    runner.run().await
}
