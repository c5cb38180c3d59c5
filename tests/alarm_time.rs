//! Host-level tests for alarm time and brightness values.

use alarm_kit::alarm_time::BrightnessDirection;
use alarm_kit::{AlarmTime, Brightness};

#[test]
fn hhmm_round_trips_every_valid_time() {
    for hours in 0..24_u8 {
        for minutes in 0..60_u8 {
            let alarm = AlarmTime::new(hours, minutes).expect("valid time");
            let hhmm = alarm.to_hhmm();
            assert_eq!(hhmm, u16::from(hours) * 100 + u16::from(minutes));
            assert_eq!(AlarmTime::from_hhmm(hhmm), Some(alarm));
        }
    }
}

#[test]
fn out_of_range_values_are_rejected() {
    assert_eq!(AlarmTime::new(24, 0), None);
    assert_eq!(AlarmTime::new(0, 60), None);
    assert_eq!(AlarmTime::from_hhmm(2400), None);
    assert_eq!(AlarmTime::from_hhmm(1260), None);
    assert_eq!(AlarmTime::from_hhmm(u16::MAX), None);
}

#[test]
fn default_is_ten_at_night() {
    assert_eq!(AlarmTime::default().to_hhmm(), 2200);
    assert_eq!(AlarmTime::DEFAULT, AlarmTime::new(22, 0).unwrap());
}

#[test]
fn minute_wraps_without_touching_hours() {
    let alarm = AlarmTime::new(7, 59).unwrap().increment_minute();
    assert_eq!((alarm.hours(), alarm.minutes()), (7, 0));

    let alarm = AlarmTime::new(7, 30).unwrap().increment_minute();
    assert_eq!(alarm.to_hhmm(), 731);
}

#[test]
fn hour_wraps_without_touching_minutes() {
    let alarm = AlarmTime::new(23, 45).unwrap().increment_hour();
    assert_eq!((alarm.hours(), alarm.minutes()), (0, 45));
}

#[test]
fn sixty_minute_steps_return_to_start() {
    let start = AlarmTime::new(5, 17).unwrap();
    let end = (0..60).fold(start, |alarm, _| alarm.increment_minute());
    assert_eq!(end, start);
}

#[test]
fn daytime_window_is_six_to_eighteen() {
    assert!(!AlarmTime::new(5, 59).unwrap().is_daytime());
    assert!(AlarmTime::new(6, 0).unwrap().is_daytime());
    assert!(AlarmTime::new(17, 59).unwrap().is_daytime());
    assert!(!AlarmTime::new(18, 0).unwrap().is_daytime());
    assert!(!AlarmTime::DEFAULT.is_daytime());
}

#[test]
fn brightness_clamps_and_checks() {
    assert_eq!(Brightness::new(200), Brightness::MAX);
    assert_eq!(Brightness::new(7).level(), 7);
    assert_eq!(Brightness::checked(16), None);
    assert_eq!(Brightness::checked(15), Some(Brightness::MAX));
    assert_eq!(Brightness::default().level(), 0xA);
}

#[test]
fn brightness_steps_saturate() {
    assert_eq!(Brightness::MAX.step(BrightnessDirection::Up), Brightness::MAX);
    assert_eq!(Brightness::MIN.step(BrightnessDirection::Down), Brightness::MIN);
    assert_eq!(Brightness::new(4).step(BrightnessDirection::Up).level(), 5);
    assert_eq!(Brightness::new(4).step(BrightnessDirection::Down).level(), 3);
}

#[test]
fn hold_direction_turns_at_the_ends() {
    assert_eq!(
        Brightness::MAX.direction_for_hold(BrightnessDirection::Up),
        BrightnessDirection::Down
    );
    assert_eq!(
        Brightness::MIN.direction_for_hold(BrightnessDirection::Down),
        BrightnessDirection::Up
    );
    assert_eq!(
        Brightness::new(8).direction_for_hold(BrightnessDirection::Down),
        BrightnessDirection::Down
    );
}

#[test]
fn press_duration_threshold_and_held_offsets() {
    use alarm_kit::button::{
        HOLD_REPEAT_INTERVAL, LONG_PRESS_DURATION, PressDuration, held_offset,
    };
    use embassy_time::Duration;

    assert_eq!(PressDuration::from(Duration::from_millis(999)), PressDuration::Short);
    assert_eq!(PressDuration::from(LONG_PRESS_DURATION), PressDuration::Long);
    assert_eq!(held_offset(1), LONG_PRESS_DURATION);
    assert_eq!(held_offset(3), LONG_PRESS_DURATION + HOLD_REPEAT_INTERVAL * 2);
    assert_eq!(held_offset(0), LONG_PRESS_DURATION);
}
