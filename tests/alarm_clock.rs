//! Host-level tests for the clock's mode and alarm state machine.

use alarm_kit::alarm_clock::Effects;
use alarm_kit::config::{MAX_ALARM_TIME, WATCH_DOG_MAX_TIME};
use alarm_kit::melody::BeepPattern;
use alarm_kit::{
    AlarmClock, AlarmSettingSubMode, AlarmTime, Brightness, ButtonEvent, ClockMode, Effect, Event,
    Frame, Message, Settings, TimeSample, UnixSeconds,
};
use embassy_time::{Duration, Instant};

/// 2024-01-01 07:29:00 UTC.
const JAN_1_0729: i64 = 1_704_094_140;
/// 2024-03-05 12:34:56 UTC.
const MAR_5_123456: i64 = 1_709_642_096;

fn at(millis: u64) -> Instant {
    Instant::from_millis(millis)
}

fn synced(unix_seconds: i64) -> Event {
    Event::TimeSynced(TimeSample {
        unix_seconds: UnixSeconds(unix_seconds),
        utc_offset_minutes: Some(0),
    })
}

fn pressed() -> Event {
    Event::Button(ButtonEvent::Pressed)
}

fn held(millis: u64, repeat_count: u16) -> Event {
    Event::Button(ButtonEvent::Held {
        duration: Duration::from_millis(millis),
        repeat_count,
    })
}

fn released(millis: u64) -> Event {
    Event::Button(ButtonEvent::Released {
        duration: Duration::from_millis(millis),
    })
}

fn alarm_at(hours: u8, minutes: u8) -> Settings {
    Settings {
        alarm_time: AlarmTime::new(hours, minutes).unwrap(),
        alarm_enabled: true,
        brightness: Brightness::DEFAULT,
    }
}

/// A short press starting at `start` milliseconds.
fn short_press(clock: &mut AlarmClock, start: u64) -> Effects {
    assert!(clock.handle(pressed(), at(start)).is_empty());
    clock.handle(released(100), at(start + 100))
}

/// A press held for `duration` milliseconds starting at `start`, with all its held repeats.
fn long_press(clock: &mut AlarmClock, start: u64, duration: u64) -> Effects {
    let mut effects = clock.handle(pressed(), at(start));
    let mut repeat_count = 1_u16;
    let mut offset = 1000;
    while offset <= duration {
        effects.extend(clock.handle(held(offset, repeat_count), at(start + offset)));
        repeat_count += 1;
        offset += 250;
    }
    effects.extend(clock.handle(released(duration), at(start + duration)));
    effects
}

fn time_frame(hours: u8, minutes: u8) -> Frame {
    Frame::from_pairs(hours, minutes).with_colon()
}

// ============================================================================
// Alarm
// ============================================================================

#[test]
fn alarm_rings_at_its_minute_and_stops_after_the_limit() {
    let mut clock = AlarmClock::new(alarm_at(7, 30), 0);
    clock.handle(synced(JAN_1_0729), at(0));

    assert!(clock.handle(Event::Tick, at(30_000)).is_empty());
    assert_eq!(
        clock.handle(Event::Tick, at(60_000)).as_slice(),
        &[Effect::StartAlarm]
    );
    assert!(clock.is_ringing());
    assert!(clock.handle(Event::Tick, at(60_100)).is_empty());

    let limit = 60_000 + MAX_ALARM_TIME.as_millis();
    assert!(clock.handle(Event::Tick, at(limit - 100)).is_empty());
    assert_eq!(
        clock.handle(Event::Tick, at(limit)).as_slice(),
        &[Effect::StopAlarm]
    );
    assert!(!clock.is_ringing());
}

#[test]
fn alarm_rings_once_per_minute() {
    let mut clock = AlarmClock::new(alarm_at(7, 30), 0);
    clock.handle(synced(JAN_1_0729), at(0));
    assert_eq!(
        clock.handle(Event::Tick, at(60_000)).as_slice(),
        &[Effect::StartAlarm]
    );

    assert_eq!(
        clock.handle(pressed(), at(65_000)).as_slice(),
        &[Effect::StopAlarm]
    );
    assert!(clock.handle(released(200), at(65_200)).is_empty());

    for millis in (65_300..120_000).step_by(100) {
        assert!(clock.handle(Event::Tick, at(millis)).is_empty());
    }
    assert!(!clock.is_ringing());
}

#[test]
fn dismissing_press_does_nothing_else() {
    let mut clock = AlarmClock::new(alarm_at(7, 30), 0);
    clock.handle(synced(JAN_1_0729), at(0));
    clock.handle(Event::Tick, at(60_000));

    let effects = long_press(&mut clock, 61_000, 3_500);
    assert_eq!(effects.as_slice(), &[Effect::StopAlarm]);
    assert_eq!(clock.mode(), ClockMode::Normal);
    // 07:30:04
    assert_eq!(clock.render(at(64_600)), time_frame(7, 30));
}

#[test]
fn press_held_when_the_alarm_starts_is_ignored() {
    let mut clock = AlarmClock::new(alarm_at(7, 30), 0);
    clock.handle(synced(JAN_1_0729), at(0));

    clock.handle(pressed(), at(59_000));
    clock.handle(held(1000, 1), at(60_000));
    assert_eq!(clock.render(at(60_000)), Message::Alarm.into());
    assert_eq!(
        clock.handle(Event::Tick, at(60_000)).as_slice(),
        &[Effect::StartAlarm]
    );
    assert_eq!(clock.render(at(61_000)), Frame::from_pairs(7, 30));

    // Neither the remaining repeats nor the long release open alarm setting.
    assert!(clock.handle(held(1250, 2), at(60_250)).is_empty());
    assert!(clock.handle(released(1400), at(60_400)).is_empty());
    assert_eq!(clock.mode(), ClockMode::Normal);
    assert!(clock.is_ringing());

    // The next press dismisses it as usual.
    assert_eq!(
        clock.handle(pressed(), at(70_000)).as_slice(),
        &[Effect::StopAlarm]
    );
}

#[test]
fn short_press_held_when_the_alarm_starts_shows_no_date() {
    let mut clock = AlarmClock::new(alarm_at(7, 30), 0);
    clock.handle(synced(JAN_1_0729), at(0));

    clock.handle(pressed(), at(59_900));
    clock.handle(Event::Tick, at(60_000));
    assert!(clock.handle(released(200), at(60_100)).is_empty());
    assert!(clock.is_ringing());
    assert_ne!(clock.render(at(61_000)), Message::Date.into());
}

#[test]
fn disabled_alarm_never_rings() {
    let mut settings = alarm_at(7, 30);
    settings.alarm_enabled = false;
    let mut clock = AlarmClock::new(settings, 0);
    clock.handle(synced(JAN_1_0729), at(0));
    assert!(clock.handle(Event::Tick, at(60_000)).is_empty());
}

#[test]
fn alarm_uses_the_configured_offset_when_the_source_has_none() {
    let mut clock = AlarmClock::new(alarm_at(7, 30), 330);
    // 02:00 UTC is 07:30 at UTC+05:30.
    clock.handle(
        Event::TimeSynced(TimeSample {
            unix_seconds: UnixSeconds(1_704_074_400),
            utc_offset_minutes: None,
        }),
        at(0),
    );
    assert_eq!(
        clock.handle(Event::Tick, at(100)).as_slice(),
        &[Effect::StartAlarm]
    );
}

#[test]
fn display_blinks_while_ringing() {
    let mut clock = AlarmClock::new(alarm_at(7, 30), 0);
    clock.handle(synced(JAN_1_0729), at(0));
    clock.handle(Event::Tick, at(60_000));

    assert_eq!(clock.render(at(60_500)), Frame::BLANK);
    assert_eq!(clock.render(at(61_000)), Frame::from_pairs(7, 30));
    assert_eq!(clock.render(at(62_000)), time_frame(7, 30));
}

// ============================================================================
// Alarm setting
// ============================================================================

#[test]
fn alarm_setting_flow_commits_and_announces() {
    let mut clock = AlarmClock::new(Settings::default(), 0);

    clock.handle(pressed(), at(0));
    clock.handle(held(1000, 1), at(1000));
    assert_eq!(clock.render(at(1000)), Message::Alarm.into());
    assert!(clock.handle(released(1100), at(1100)).is_empty());
    assert_eq!(
        clock.mode(),
        ClockMode::AlarmSetting(AlarmSettingSubMode::NoSetting)
    );
    assert_eq!(clock.render(at(1200)), Message::Alarm.into());

    short_press(&mut clock, 2000);
    assert_eq!(
        clock.mode(),
        ClockMode::AlarmSetting(AlarmSettingSubMode::MinuteSetting)
    );
    // Five held repeats: 22:00 -> 22:05.
    clock.handle(pressed(), at(3000));
    for repeat_count in 1..=5 {
        let offset = 1000 + 250 * u64::from(repeat_count - 1);
        clock.handle(held(offset, repeat_count), at(3000 + offset));
    }
    clock.handle(released(2100), at(5100));
    assert_eq!(clock.alarm_time().to_hhmm(), 2205);
    assert_eq!(clock.render(at(5100)), time_frame(22, 5));
    assert_eq!(clock.render(at(5600)), time_frame(22, 5).without_right());

    short_press(&mut clock, 6000);
    assert_eq!(
        clock.mode(),
        ClockMode::AlarmSetting(AlarmSettingSubMode::HourSetting)
    );
    // Four held repeats step the hour on the odd ones: 22 -> 23 -> 00.
    clock.handle(pressed(), at(7000));
    for repeat_count in 1..=4 {
        let offset = 1000 + 250 * u64::from(repeat_count - 1);
        clock.handle(held(offset, repeat_count), at(7000 + offset));
    }
    clock.handle(released(1800), at(8800));
    assert_eq!(clock.alarm_time().to_hhmm(), 5);
    assert_eq!(clock.render(at(9300)), time_frame(0, 5).without_left());

    short_press(&mut clock, 10_000);
    assert_eq!(
        clock.mode(),
        ClockMode::AlarmSetting(AlarmSettingSubMode::StateOn)
    );
    assert_eq!(clock.render(at(10_100)), Message::Off.into());
    short_press(&mut clock, 11_000);
    assert!(clock.alarm_enabled());
    assert_eq!(clock.render(at(11_100)), Message::On.into());

    let effects = long_press(&mut clock, 12_000, 1500);
    let committed = Settings {
        alarm_time: AlarmTime::new(0, 5).unwrap(),
        alarm_enabled: true,
        brightness: Brightness::DEFAULT,
    };
    assert_eq!(
        effects.as_slice(),
        &[
            Effect::SaveSettings(committed),
            Effect::Beep(BeepPattern::CONFIRM)
        ]
    );
    assert_eq!(clock.mode(), ClockMode::Normal);
    assert_eq!(clock.settings(), committed);
    assert_eq!(clock.render(at(13_600)), Message::Night.into());
}

#[test]
fn daytime_and_disabled_commits_show_their_words() {
    let mut clock = AlarmClock::new(alarm_at(7, 30), 0);
    long_press(&mut clock, 0, 1100);
    short_press(&mut clock, 2000);
    short_press(&mut clock, 3000);
    short_press(&mut clock, 4000);
    long_press(&mut clock, 5000, 1200);
    assert_eq!(clock.render(at(6300)), Message::Day.into());

    long_press(&mut clock, 10_000, 1100);
    short_press(&mut clock, 12_000);
    short_press(&mut clock, 13_000);
    short_press(&mut clock, 14_000);
    short_press(&mut clock, 15_000);
    let effects = long_press(&mut clock, 16_000, 1200);
    assert!(!clock.settings().alarm_enabled);
    assert!(matches!(effects.first(), Some(Effect::SaveSettings(_))));
    assert_eq!(clock.render(at(17_300)), Message::Off.into());
}

#[test]
fn short_presses_stop_at_the_enable_step() {
    let mut clock = AlarmClock::new(Settings::default(), 0);
    long_press(&mut clock, 0, 1100);
    for start in [2000, 3000, 4000] {
        short_press(&mut clock, start);
    }
    assert_eq!(
        clock.mode(),
        ClockMode::AlarmSetting(AlarmSettingSubMode::StateOn)
    );
    short_press(&mut clock, 5000);
    assert_eq!(
        clock.mode(),
        ClockMode::AlarmSetting(AlarmSettingSubMode::StateOn)
    );
}

#[test]
fn watchdog_returns_every_alarm_step_to_normal_and_discards_edits() {
    for presses in 0..4_u64 {
        let mut clock = AlarmClock::new(Settings::default(), 0);
        long_press(&mut clock, 0, 1100);
        let mut last = 1100;
        for press in 0..presses {
            let start = 2000 + press * 1000;
            short_press(&mut clock, start);
            last = start + 100;
        }
        // Start editing whatever the current step edits, and never let go.
        clock.handle(pressed(), at(last + 500));
        clock.handle(held(1000, 1), at(last + 1500));
        last += 1500;
        assert_ne!(clock.mode(), ClockMode::Normal);

        let limit = last + WATCH_DOG_MAX_TIME.as_millis();
        clock.handle(Event::Tick, at(limit));
        assert_ne!(clock.mode(), ClockMode::Normal);
        clock.handle(Event::Tick, at(limit + 100));
        assert_eq!(clock.mode(), ClockMode::Normal);
        assert!(clock.handle(released(20_000), at(limit + 200)).is_empty());
        assert_eq!(clock.alarm_time(), AlarmTime::DEFAULT);
        assert!(!clock.alarm_enabled());
        assert_eq!(clock.settings(), Settings::default());
    }
}

#[test]
fn watchdog_ignores_the_rest_of_an_outlived_press() {
    let mut clock = AlarmClock::new(Settings::default(), 0);
    long_press(&mut clock, 0, 1100);
    short_press(&mut clock, 2000);

    clock.handle(pressed(), at(3000));
    clock.handle(Event::Tick, at(14_000));
    assert_eq!(clock.mode(), ClockMode::Normal);
    assert!(clock.handle(released(11_000), at(14_000)).is_empty());
    assert_eq!(clock.mode(), ClockMode::Normal);
}

// ============================================================================
// Brightness setting
// ============================================================================

#[test]
fn brightness_setting_previews_steps_and_commits() {
    let mut clock = AlarmClock::new(Settings::default(), 0);

    clock.handle(pressed(), at(0));
    clock.handle(held(3000, 9), at(3000));
    assert_eq!(clock.render(at(3000)), Message::Brightness.into());
    clock.handle(released(3100), at(3100));
    assert_eq!(clock.mode(), ClockMode::BrightnessSetting);
    assert_eq!(clock.render(at(3500)), Message::Brightness.into());
    assert_eq!(clock.render(at(4200)), Frame::brightness(10));

    clock.handle(pressed(), at(5000));
    assert_eq!(
        clock.handle(held(1000, 1), at(6000)).as_slice(),
        &[Effect::SetBrightness(Brightness::new(11))]
    );
    assert_eq!(
        clock.handle(held(1250, 2), at(6250)).as_slice(),
        &[Effect::SetBrightness(Brightness::new(12))]
    );
    assert!(clock.handle(released(1300), at(6300)).is_empty());
    assert_eq!(clock.brightness(), Brightness::new(12));
    assert_eq!(clock.settings().brightness, Brightness::DEFAULT);

    let effects = short_press(&mut clock, 7000);
    let committed = Settings {
        brightness: Brightness::new(12),
        ..Settings::default()
    };
    assert_eq!(
        effects.as_slice(),
        &[
            Effect::SaveSettings(committed),
            Effect::Beep(BeepPattern::CONFIRM)
        ]
    );
    assert_eq!(clock.mode(), ClockMode::Normal);
    assert_eq!(clock.brightness(), Brightness::new(12));
}

#[test]
fn brightness_hold_turns_around_at_the_top() {
    let settings = Settings {
        brightness: Brightness::MAX,
        ..Settings::default()
    };
    let mut clock = AlarmClock::new(settings, 0);
    long_press(&mut clock, 0, 3100);
    assert_eq!(clock.mode(), ClockMode::BrightnessSetting);

    clock.handle(pressed(), at(4000));
    assert_eq!(
        clock.handle(held(1000, 1), at(5000)).as_slice(),
        &[Effect::SetBrightness(Brightness::new(14))]
    );
}

#[test]
fn watchdog_restores_previewed_brightness() {
    let mut clock = AlarmClock::new(Settings::default(), 0);
    long_press(&mut clock, 0, 3100);
    clock.handle(pressed(), at(4000));
    clock.handle(held(1000, 1), at(5000));
    clock.handle(released(1100), at(5100));
    assert_eq!(clock.brightness(), Brightness::new(11));

    let effects = clock.handle(Event::Tick, at(16_000));
    assert_eq!(
        effects.as_slice(),
        &[Effect::SetBrightness(Brightness::DEFAULT)]
    );
    assert_eq!(clock.mode(), ClockMode::Normal);
    assert_eq!(clock.brightness(), Brightness::DEFAULT);
}

// ============================================================================
// Display
// ============================================================================

#[test]
fn short_press_shows_the_date() {
    let mut clock = AlarmClock::new(Settings::default(), 0);
    clock.handle(synced(MAR_5_123456), at(0));

    short_press(&mut clock, 3000);
    assert_eq!(clock.render(at(3700)), Message::Date.into());
    assert_eq!(clock.render(at(4700)), time_frame(5, 3));
    assert_eq!(clock.render(at(6300)), time_frame(12, 35));
}

#[test]
fn short_press_without_time_keeps_the_status() {
    let mut clock = AlarmClock::new(Settings::default(), 0);
    short_press(&mut clock, 0);
    assert_eq!(clock.render(at(200)), Message::Connecting.into());
}

#[test]
fn colon_follows_even_seconds() {
    let mut clock = AlarmClock::new(Settings::default(), 0);
    clock.handle(synced(MAR_5_123456), at(0));
    // 12:34:58 and 12:34:59
    assert_eq!(clock.render(at(2000)), time_frame(12, 34));
    assert_eq!(clock.render(at(3000)), Frame::from_pairs(12, 34));
}

#[test]
fn sync_status_messages() {
    let mut clock = AlarmClock::new(Settings::default(), 0);
    assert_eq!(clock.render(at(0)), Message::Connecting.into());

    clock.handle(Event::WifiConnected, at(100));
    assert_eq!(clock.render(at(100)), Message::Sync.into());
    clock.handle(Event::SyncStarted, at(200));
    assert_eq!(clock.render(at(300)), Message::Sync.into());

    clock.handle(synced(MAR_5_123456), at(1000));
    assert_eq!(clock.render(at(1500)), Message::Good.into());
    assert_eq!(clock.render(at(3000)), time_frame(12, 34));

    // Routine resyncs stay quiet.
    clock.handle(Event::SyncStarted, at(180_500));
    assert_eq!(clock.render(at(181_000)), time_frame(12, 37));
    clock.handle(synced(MAR_5_123456 + 180), at(181_000));
    assert_eq!(clock.render(at(181_000)), time_frame(12, 37));

    // A failure is always reported, and the next attempt is announced again.
    clock.handle(Event::SyncStarted, at(360_000));
    clock.handle(Event::TimeSyncFailed, at(370_000));
    assert_eq!(clock.render(at(371_000)), Message::Err.into());
    assert_eq!(clock.render(at(373_000)), time_frame(12, 41));
    clock.handle(Event::SyncStarted, at(540_000));
    assert_eq!(clock.render(at(540_000)), Message::Sync.into());
    clock.handle(synced(MAR_5_123456 + 540), at(541_000));
    assert_eq!(clock.render(at(541_000)), Message::Good.into());
}

#[test]
fn wifi_join_failure_shows_err() {
    let mut clock = AlarmClock::new(Settings::default(), 0);
    clock.handle(Event::WifiJoinFailed, at(0));
    assert_eq!(clock.render(at(100)), Message::Err.into());
    assert_eq!(clock.render(at(5000)), Message::Err.into());
    clock.handle(Event::WifiConnecting, at(6000));
    assert_eq!(clock.render(at(9000)), Message::Connecting.into());
}

#[test]
fn provisioning_portal_shows_ap_until_reset() {
    let mut clock = AlarmClock::new(Settings::default(), 0);
    clock.handle(Event::WifiPortalReady, at(0));
    assert_eq!(clock.render(at(100)), Message::AccessPoint.into());
    assert_eq!(clock.render(at(60_000)), Message::AccessPoint.into());

    // Settings still work while the portal waits.
    long_press(&mut clock, 61_000, 1100);
    assert_eq!(
        clock.mode(),
        ClockMode::AlarmSetting(AlarmSettingSubMode::NoSetting)
    );
}
