//! Wi-Fi synchronized alarm clock firmware.
//!
//! Wiring: TM1637 CLK on GP2 and DIO on GP3, push button from GP13 to 3V3,
//! passive buzzer on GP6. A long press (1 s) sets the alarm; a very long press (3 s)
//! sets the brightness; a short press shows the date. Holding the button at power-up
//! opens the Wi-Fi provisioning portal.

#![no_std]
#![no_main]
#![allow(clippy::future_not_send, reason = "single-threaded")]

use core::convert::Infallible;

use alarm_kit::button::{Button, ButtonStatic};
use alarm_kit::buzzer::{Beeper, BeeperNotifier};
use alarm_kit::config::TICK_INTERVAL;
use alarm_kit::credential_store::{CredentialStore, WifiCredentials};
use alarm_kit::eeprom::{FlashEeprom, SharedFlash, SharedFlashStatic};
use alarm_kit::time_sync::{TimeSync, TimeSyncEvent, TimeSyncStatic};
use alarm_kit::tm1637::{Tm1637Display, Tm1637DisplayNotifier};
use alarm_kit::wifi::{Wifi, WifiEvent, WifiPins, WifiStatic};
use alarm_kit::wifi_auto::WifiPlan;
use alarm_kit::{AlarmClock, AlarmClockConfig, Effect, Event, Result, Settings};
use defmt::{error, info};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_futures::select::{Either4, select4};
use embassy_rp::gpio::{Input, Level, Output, OutputOpenDrain, Pull};
use embassy_rp::pwm::{Config as PwmConfig, Pwm};
use embassy_time::{Instant, Ticker};
use panic_probe as _;

// ============================================================================
// Main
// ============================================================================

#[embassy_executor::main]
pub async fn main(spawner: Spawner) -> ! {
    let err = inner_main(spawner).await.unwrap_err();
    core::panic!("{err}");
}

async fn inner_main(spawner: Spawner) -> Result<Infallible> {
    info!("Starting alarm clock");
    let config = AlarmClockConfig::from_env();
    let p = embassy_rp::init(embassy_rp::config::Config::default());

    static FLASH_STATIC: SharedFlashStatic = SharedFlash::new_static();
    let flash = SharedFlash::new(&FLASH_STATIC, p.FLASH);
    let mut eeprom = FlashEeprom::new(flash)?;
    let settings = Settings::load(&mut eeprom)?;

    static DISPLAY_NOTIFIER: Tm1637DisplayNotifier = Tm1637Display::notifier();
    let display = Tm1637Display::new(
        Output::new(p.PIN_2, Level::High),
        OutputOpenDrain::new(p.PIN_3, Level::High),
        &DISPLAY_NOTIFIER,
        spawner,
    )?;

    let button_pin = Input::new(p.PIN_13, Pull::Down);
    let portal_requested = button_pin.is_high();
    static BUTTON_STATIC: ButtonStatic = Button::new_static();
    let button = Button::new(&BUTTON_STATIC, button_pin, spawner)?;

    static BEEPER_NOTIFIER: BeeperNotifier = Beeper::notifier();
    let beeper = Beeper::new(
        Pwm::new_output_a(p.PWM_SLICE3, p.PIN_6, PwmConfig::default()),
        &BEEPER_NOTIFIER,
        spawner,
    )?;

    let credential_store = CredentialStore::new(flash);
    let plan = WifiPlan::choose(
        credential_store.load(),
        WifiCredentials::new(config.wifi_ssid, config.wifi_pass),
        portal_requested,
    );
    if portal_requested {
        info!("Button held at power-up; opening the Wi-Fi portal");
    }
    static WIFI_STATIC: WifiStatic = Wifi::new_static();
    let wifi = Wifi::new(
        &WIFI_STATIC,
        WifiPins {
            pin_23: p.PIN_23,
            pin_25: p.PIN_25,
            pio0: p.PIO0,
            pin_24: p.PIN_24,
            pin_29: p.PIN_29,
            dma_ch0: p.DMA_CH0,
        },
        plan,
        credential_store,
        spawner,
    )?;

    static TIME_SYNC_STATIC: TimeSyncStatic = TimeSync::new_static();
    let time_sync = TimeSync::new(&TIME_SYNC_STATIC, wifi, config.time_source(), spawner)?;

    let mut clock = AlarmClock::new(settings, config.utc_offset_minutes);
    let mut brightness = settings.brightness;
    display.write(clock.render(Instant::now()), brightness);
    info!("Devices started");

    let mut ticker = Ticker::every(TICK_INTERVAL);
    loop {
        let event = match select4(button.wait(), time_sync.wait(), wifi.wait(), ticker.next()).await
        {
            Either4::First(button_event) => Event::Button(button_event),
            Either4::Second(TimeSyncEvent::Started) => Event::SyncStarted,
            Either4::Second(TimeSyncEvent::Success(sample)) => Event::TimeSynced(sample),
            Either4::Second(TimeSyncEvent::Failed(_)) => Event::TimeSyncFailed,
            Either4::Third(WifiEvent::Connecting) => Event::WifiConnecting,
            Either4::Third(WifiEvent::Connected) => Event::WifiConnected,
            Either4::Third(WifiEvent::JoinFailed) => Event::WifiJoinFailed,
            Either4::Third(WifiEvent::PortalReady) => Event::WifiPortalReady,
            Either4::Fourth(()) => Event::Tick,
        };

        let now = Instant::now();
        for effect in clock.handle(event, now) {
            match effect {
                Effect::SaveSettings(saved) => {
                    brightness = saved.brightness;
                    // A failed write leaves the clock running on the in-memory settings.
                    if let Err(err) = saved.save(&mut eeprom) {
                        error!("Saving settings failed: {}", err);
                    }
                }
                Effect::SetBrightness(level) => brightness = level,
                Effect::StartAlarm => beeper.play_alarm(),
                Effect::StopAlarm => beeper.stop(),
                Effect::Beep(pattern) => beeper.beep(pattern),
            }
        }
        display.write(clock.render(now), brightness);
    }
}
