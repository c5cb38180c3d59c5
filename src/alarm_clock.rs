//! Mode and alarm state machine of the clock.
//!
//! [`AlarmClock`] is a plain value owned by the control loop. Every input arrives as an
//! [`Event`] together with the current [`Instant`]; the machine updates itself and returns
//! the [`Effect`]s the loop must carry out. [`AlarmClock::render`] gives the frame to show.
//! Nothing here touches hardware, so the whole machine runs in host tests.

use embassy_time::{Duration, Instant};
use heapless::Vec;

use crate::alarm_time::{AlarmTime, Brightness, BrightnessDirection};
use crate::button::{BRIGHTNESS_PRESS_DURATION, ButtonEvent, LONG_PRESS_DURATION, PressDuration};
use crate::config::{
    BLINK_INTERVAL, BRIGHTNESS_INTRO_DURATION, DATE_DURATION, DATE_INTRO_DURATION,
    MAX_ALARM_TIME, MESSAGE_DURATION, WATCH_DOG_MAX_TIME,
};
use crate::fmt::info;
use crate::melody::BeepPattern;
use crate::segments::{Frame, Message};
use crate::settings::Settings;
use crate::time_source::TimeSample;
use crate::wall_clock::WallClock;

/// Most effects a single event can produce.
pub const MAX_EFFECTS: usize = 4;

/// Effects returned by [`AlarmClock::handle`], in the order to apply them.
pub type Effects = Vec<Effect, MAX_EFFECTS>;

// ============================================================================
// Types
// ============================================================================

/// Top-level mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockMode {
    #[default]
    Normal,
    AlarmSetting(AlarmSettingSubMode),
    BrightnessSetting,
}

/// Step of the alarm setting sequence; short presses advance it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmSettingSubMode {
    #[default]
    NoSetting,
    MinuteSetting,
    HourSetting,
    StateOn,
}

impl AlarmSettingSubMode {
    const fn next(self) -> Self {
        match self {
            Self::NoSetting => Self::MinuteSetting,
            Self::MinuteSetting => Self::HourSetting,
            Self::HourSetting | Self::StateOn => Self::StateOn,
        }
    }
}

/// Network link state, shown while the time is still unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    #[default]
    Connecting,
    Connected,
    Failed,
    /// Serving the provisioning portal; no time will arrive until it is used.
    Portal,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    Button(ButtonEvent),
    /// Periodic check of the watchdog, the alarm and the ringing limit.
    Tick,
    WifiConnecting,
    WifiConnected,
    WifiJoinFailed,
    /// The provisioning access point is up.
    WifiPortalReady,
    /// A time request has started.
    SyncStarted,
    TimeSynced(TimeSample),
    TimeSyncFailed,
}

/// Work the control loop performs on behalf of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Effect {
    /// Persist these settings.
    SaveSettings(Settings),
    /// Drive the display at this brightness.
    SetBrightness(Brightness),
    /// Start the looping alarm melody.
    StartAlarm,
    /// Silence the alarm melody.
    StopAlarm,
    /// Play a short beep pattern.
    Beep(BeepPattern),
}

/// What a release in normal mode would select, shown while the button is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Preview {
    Alarm,
    Brightness,
}

#[derive(Debug, Clone, Copy)]
struct Press {
    /// Set when the press dismissed the alarm or outlived a setting mode; the rest of it is ignored.
    consumed: bool,
    preview: Option<Preview>,
}

#[derive(Debug, Clone, Copy)]
struct Overlay {
    frame: Frame,
    until: Instant,
    then: Option<(Frame, Duration)>,
}

impl Overlay {
    fn frame_at(&self, now: Instant) -> Option<Frame> {
        if now < self.until {
            return Some(self.frame);
        }
        let (next, duration) = self.then?;
        (now < later(self.until, duration)).then_some(next)
    }
}

// ============================================================================
// State machine
// ============================================================================

/// The clock's whole mutable state.
#[derive(Debug, Clone)]
pub struct AlarmClock {
    mode: ClockMode,
    settings: Settings,
    draft_alarm: AlarmTime,
    draft_enabled: bool,
    draft_brightness: Brightness,
    brightness_direction: BrightnessDirection,
    watchdog_started: Instant,
    press: Option<Press>,
    overlay: Option<Overlay>,
    wall_clock: WallClock,
    link: LinkState,
    syncing: bool,
    announce_sync: bool,
    last_alarm_minute: Option<i64>,
    ringing_since: Option<Instant>,
}

impl AlarmClock {
    /// Start in normal mode with the loaded settings and no time yet.
    #[must_use]
    pub fn new(settings: Settings, utc_offset_minutes: i32) -> Self {
        Self {
            mode: ClockMode::Normal,
            settings,
            draft_alarm: settings.alarm_time,
            draft_enabled: settings.alarm_enabled,
            draft_brightness: settings.brightness,
            brightness_direction: BrightnessDirection::default(),
            watchdog_started: Instant::from_ticks(0),
            press: None,
            overlay: None,
            wall_clock: WallClock::new(utc_offset_minutes),
            link: LinkState::default(),
            syncing: false,
            announce_sync: true,
            last_alarm_minute: None,
            ringing_since: None,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> ClockMode {
        self.mode
    }

    /// Committed settings.
    #[must_use]
    pub const fn settings(&self) -> Settings {
        self.settings
    }

    /// Alarm time as currently shown; the draft while editing.
    #[must_use]
    pub const fn alarm_time(&self) -> AlarmTime {
        match self.mode {
            ClockMode::AlarmSetting(_) => self.draft_alarm,
            _ => self.settings.alarm_time,
        }
    }

    /// Alarm enabled flag as currently shown; the draft while editing.
    #[must_use]
    pub const fn alarm_enabled(&self) -> bool {
        match self.mode {
            ClockMode::AlarmSetting(_) => self.draft_enabled,
            _ => self.settings.alarm_enabled,
        }
    }

    /// Brightness the display should use now; the draft while editing.
    #[must_use]
    pub const fn brightness(&self) -> Brightness {
        match self.mode {
            ClockMode::BrightnessSetting => self.draft_brightness,
            _ => self.settings.brightness,
        }
    }

    #[must_use]
    pub const fn is_ringing(&self) -> bool {
        self.ringing_since.is_some()
    }

    /// Apply `event` at `now` and return the effects to carry out.
    pub fn handle(&mut self, event: Event, now: Instant) -> Effects {
        let mut effects = Effects::new();
        self.check_watchdog(now, &mut effects);
        match event {
            Event::Button(button_event) => self.on_button(button_event, now, &mut effects),
            Event::Tick => self.on_tick(now, &mut effects),
            Event::WifiConnecting => self.link = LinkState::Connecting,
            Event::WifiConnected => self.link = LinkState::Connected,
            Event::WifiJoinFailed => {
                self.link = LinkState::Failed;
                self.show(Message::Err, now);
            }
            Event::WifiPortalReady => {
                info!("Provisioning portal ready");
                self.link = LinkState::Portal;
            }
            Event::SyncStarted => self.syncing = true,
            Event::TimeSynced(sample) => {
                if let Some(offset) = sample.utc_offset_minutes {
                    self.wall_clock.set_utc_offset_minutes(offset);
                }
                self.wall_clock.set(sample.unix_seconds, now);
                self.syncing = false;
                if self.announce_sync {
                    self.show(Message::Good, now);
                }
                self.announce_sync = false;
            }
            Event::TimeSyncFailed => {
                self.syncing = false;
                self.announce_sync = true;
                self.show(Message::Err, now);
            }
        }
        effects
    }

    // ------------------------------------------------------------------------
    // Button
    // ------------------------------------------------------------------------

    fn on_button(&mut self, event: ButtonEvent, now: Instant, effects: &mut Effects) {
        if self.mode != ClockMode::Normal {
            self.watchdog_started = now;
        }
        match event {
            ButtonEvent::Pressed => self.on_pressed(effects),
            ButtonEvent::Held {
                duration,
                repeat_count,
            } => self.on_held(duration, repeat_count, effects),
            ButtonEvent::Released { duration } => self.on_released(duration, now, effects),
        }
    }

    fn on_pressed(&mut self, effects: &mut Effects) {
        let mut press = Press {
            consumed: false,
            preview: None,
        };
        if self.ringing_since.take().is_some() {
            info!("Alarm dismissed");
            push(effects, Effect::StopAlarm);
            press.consumed = true;
        }
        if self.mode == ClockMode::BrightnessSetting {
            self.brightness_direction = self
                .draft_brightness
                .direction_for_hold(self.brightness_direction);
        }
        self.press = Some(press);
    }

    fn on_held(&mut self, duration: Duration, repeat_count: u16, effects: &mut Effects) {
        let Some(press) = self.press.as_mut() else {
            return;
        };
        if press.consumed {
            return;
        }
        match self.mode {
            ClockMode::Normal => {
                press.preview = if duration >= BRIGHTNESS_PRESS_DURATION {
                    Some(Preview::Brightness)
                } else if duration >= LONG_PRESS_DURATION {
                    Some(Preview::Alarm)
                } else {
                    None
                };
            }
            ClockMode::AlarmSetting(AlarmSettingSubMode::MinuteSetting) => {
                self.draft_alarm = self.draft_alarm.increment_minute();
            }
            ClockMode::AlarmSetting(AlarmSettingSubMode::HourSetting) => {
                // Hours move on every other repeat.
                if !repeat_count.is_multiple_of(2) {
                    self.draft_alarm = self.draft_alarm.increment_hour();
                }
            }
            ClockMode::AlarmSetting(
                AlarmSettingSubMode::NoSetting | AlarmSettingSubMode::StateOn,
            ) => {}
            ClockMode::BrightnessSetting => {
                let stepped = self.draft_brightness.step(self.brightness_direction);
                if stepped != self.draft_brightness {
                    self.draft_brightness = stepped;
                    push(effects, Effect::SetBrightness(stepped));
                }
            }
        }
    }

    fn on_released(&mut self, duration: Duration, now: Instant, effects: &mut Effects) {
        let Some(press) = self.press.take() else {
            return;
        };
        if press.consumed {
            return;
        }
        let press_duration = PressDuration::from(duration);
        match (self.mode, press_duration) {
            (ClockMode::Normal, PressDuration::Long) => {
                if duration >= BRIGHTNESS_PRESS_DURATION {
                    self.enter_brightness_setting(now);
                } else {
                    self.enter_alarm_setting(now);
                }
            }
            (ClockMode::Normal, PressDuration::Short) => self.show_date(now),
            (ClockMode::AlarmSetting(AlarmSettingSubMode::StateOn), PressDuration::Short) => {
                self.draft_enabled = !self.draft_enabled;
            }
            (ClockMode::AlarmSetting(AlarmSettingSubMode::StateOn), PressDuration::Long) => {
                self.commit_alarm(now, effects);
            }
            (ClockMode::AlarmSetting(sub_mode), PressDuration::Short) => {
                self.mode = ClockMode::AlarmSetting(sub_mode.next());
            }
            (ClockMode::BrightnessSetting, PressDuration::Short) => {
                self.commit_brightness(effects);
            }
            // A long release in the other setting steps only ends a run of held adjustments.
            (ClockMode::AlarmSetting(_) | ClockMode::BrightnessSetting, PressDuration::Long) => {}
        }
    }

    fn enter_alarm_setting(&mut self, now: Instant) {
        info!("Entering alarm setting");
        self.mode = ClockMode::AlarmSetting(AlarmSettingSubMode::NoSetting);
        self.draft_alarm = self.settings.alarm_time;
        self.draft_enabled = self.settings.alarm_enabled;
        self.watchdog_started = now;
        self.overlay = None;
    }

    fn enter_brightness_setting(&mut self, now: Instant) {
        info!("Entering brightness setting");
        self.mode = ClockMode::BrightnessSetting;
        self.draft_brightness = self.settings.brightness;
        self.watchdog_started = now;
        self.overlay = Some(Overlay {
            frame: Message::Brightness.into(),
            until: later(now, BRIGHTNESS_INTRO_DURATION),
            then: None,
        });
    }

    fn commit_alarm(&mut self, now: Instant, effects: &mut Effects) {
        self.settings.alarm_time = self.draft_alarm;
        self.settings.alarm_enabled = self.draft_enabled;
        self.mode = ClockMode::Normal;
        self.watchdog_started = now;
        info!(
            "Alarm committed: {} enabled={}",
            self.settings.alarm_time.to_hhmm(),
            self.settings.alarm_enabled
        );
        push(effects, Effect::SaveSettings(self.settings));
        push(effects, Effect::Beep(BeepPattern::CONFIRM));

        let message = if !self.settings.alarm_enabled {
            Message::Off
        } else if self.settings.alarm_time.is_daytime() {
            Message::Day
        } else {
            Message::Night
        };
        self.show(message, now);
    }

    fn commit_brightness(&mut self, effects: &mut Effects) {
        self.settings.brightness = self.draft_brightness;
        self.mode = ClockMode::Normal;
        self.overlay = None;
        info!("Brightness committed: {}", self.settings.brightness.level());
        push(effects, Effect::SaveSettings(self.settings));
        push(effects, Effect::Beep(BeepPattern::CONFIRM));
    }

    // ------------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------------

    /// Leave a setting mode that has been idle for longer than [`WATCH_DOG_MAX_TIME`],
    /// discarding its drafts.
    fn check_watchdog(&mut self, now: Instant, effects: &mut Effects) {
        if self.mode == ClockMode::Normal
            || now.saturating_duration_since(self.watchdog_started) <= WATCH_DOG_MAX_TIME
        {
            return;
        }
        info!("Watchdog expired in {:?}; edits discarded", self.mode);
        if self.mode == ClockMode::BrightnessSetting && self.draft_brightness != self.settings.brightness
        {
            push(effects, Effect::SetBrightness(self.settings.brightness));
        }
        self.mode = ClockMode::Normal;
        self.draft_alarm = self.settings.alarm_time;
        self.draft_enabled = self.settings.alarm_enabled;
        self.draft_brightness = self.settings.brightness;
        self.overlay = None;
        if let Some(press) = self.press.as_mut() {
            press.consumed = true;
        }
    }

    fn on_tick(&mut self, now: Instant, effects: &mut Effects) {
        if let Some(since) = self.ringing_since {
            if now.saturating_duration_since(since) >= MAX_ALARM_TIME {
                info!("Alarm timed out");
                self.ringing_since = None;
                push(effects, Effect::StopAlarm);
            }
            return;
        }

        if self.mode != ClockMode::Normal || !self.settings.alarm_enabled {
            return;
        }
        let Some(local) = self.wall_clock.local_time(now) else {
            return;
        };
        let alarm = self.settings.alarm_time;
        if local.hour == alarm.hours()
            && local.minute == alarm.minutes()
            && self.last_alarm_minute != Some(local.minute_index)
        {
            info!("Alarm {} ringing", alarm.to_hhmm());
            self.last_alarm_minute = Some(local.minute_index);
            self.ringing_since = Some(now);
            // A press already down when the alarm starts must not also act on release.
            if let Some(press) = self.press.as_mut() {
                press.consumed = true;
                press.preview = None;
            }
            push(effects, Effect::StartAlarm);
        }
    }

    // ------------------------------------------------------------------------
    // Display
    // ------------------------------------------------------------------------

    /// Status words only appear in normal mode; setting modes keep their own display.
    fn show(&mut self, message: Message, now: Instant) {
        if self.mode != ClockMode::Normal {
            return;
        }
        self.overlay = Some(Overlay {
            frame: message.into(),
            until: later(now, MESSAGE_DURATION),
            then: None,
        });
    }

    fn show_date(&mut self, now: Instant) {
        let Some(local) = self.wall_clock.local_time(now) else {
            return;
        };
        let date = Frame::from_pairs(local.day, local.month).with_colon();
        self.overlay = Some(Overlay {
            frame: Message::Date.into(),
            until: later(now, DATE_INTRO_DURATION),
            then: Some((date, DATE_DURATION)),
        });
    }

    /// Whether an edited field is visible at `now`; toggles every [`BLINK_INTERVAL`]
    /// starting visible at the last button event.
    fn blink_on(&self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.watchdog_started);
        even_half_period(elapsed.as_ticks())
    }

    /// The frame to show at `now`.
    #[must_use]
    pub fn render(&self, now: Instant) -> Frame {
        match self.mode {
            ClockMode::Normal => self.render_normal(now),
            ClockMode::AlarmSetting(AlarmSettingSubMode::NoSetting) => Message::Alarm.into(),
            ClockMode::AlarmSetting(AlarmSettingSubMode::MinuteSetting) => {
                let frame = alarm_frame(self.draft_alarm);
                if self.blink_on(now) {
                    frame
                } else {
                    frame.without_right()
                }
            }
            ClockMode::AlarmSetting(AlarmSettingSubMode::HourSetting) => {
                let frame = alarm_frame(self.draft_alarm);
                if self.blink_on(now) {
                    frame
                } else {
                    frame.without_left()
                }
            }
            ClockMode::AlarmSetting(AlarmSettingSubMode::StateOn) => {
                if self.draft_enabled {
                    Message::On.into()
                } else {
                    Message::Off.into()
                }
            }
            ClockMode::BrightnessSetting => self
                .overlay
                .and_then(|overlay| overlay.frame_at(now))
                .unwrap_or_else(|| Frame::brightness(self.draft_brightness.level())),
        }
    }

    fn render_normal(&self, now: Instant) -> Frame {
        if let Some(preview) = self.press.and_then(|press| press.preview) {
            return match preview {
                Preview::Alarm => Message::Alarm.into(),
                Preview::Brightness => Message::Brightness.into(),
            };
        }
        if let Some(frame) = self.overlay.and_then(|overlay| overlay.frame_at(now)) {
            return frame;
        }
        if self.syncing && self.announce_sync {
            return Message::Sync.into();
        }
        let Some(local) = self.wall_clock.local_time(now) else {
            return match self.link {
                LinkState::Connecting => Message::Connecting.into(),
                LinkState::Connected => Message::Sync.into(),
                LinkState::Failed => Message::Err.into(),
                LinkState::Portal => Message::AccessPoint.into(),
            };
        };
        let time = Frame::from_pairs(local.hour, local.minute);
        if self.ringing_since.is_some() && !even_half_period(now.as_ticks()) {
            return Frame::BLANK;
        }
        if local.second.is_multiple_of(2) {
            time.with_colon()
        } else {
            time
        }
    }
}

fn alarm_frame(alarm: AlarmTime) -> Frame {
    Frame::from_pairs(alarm.hours(), alarm.minutes()).with_colon()
}

/// Whether `ticks` falls in an even [`BLINK_INTERVAL`]; used for every blink.
#[expect(
    clippy::arithmetic_side_effects,
    clippy::integer_division_remainder_used,
    reason = "BLINK_INTERVAL is non-zero"
)]
const fn even_half_period(ticks: u64) -> bool {
    (ticks / BLINK_INTERVAL.as_ticks()) % 2 == 0
}

/// `at + duration`, pinned at the end of time instead of overflowing.
fn later(at: Instant, duration: Duration) -> Instant {
    at.checked_add(duration).unwrap_or(Instant::MAX)
}

/// Effects never exceed [`MAX_EFFECTS`] per event; a full list drops the extra.
fn push(effects: &mut Effects, effect: Effect) {
    let _ = effects.push(effect);
}
