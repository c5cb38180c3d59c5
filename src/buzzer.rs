//! Passive buzzer on a hardware PWM output: square-wave tones, the alarm melody and beeps.

/// Divider and wrap value giving a square wave at the requested frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TonePwm {
    /// Integer clock divider, `1..=255`.
    pub divider: u8,
    /// Counter wrap value; the period is `top + 1` ticks.
    pub top: u16,
    /// Compare value for 50 % duty.
    pub compare: u16,
}

/// PWM settings for `frequency_hz` from a `clk_hz` system clock.
///
/// Picks the smallest divider whose period fits the 16-bit counter, for the finest
/// frequency resolution. Returns `None` for 0 Hz or a frequency out of reach.
///
/// ```
/// use alarm_kit::buzzer::tone_pwm;
///
/// let pwm = tone_pwm(125_000_000, 440).unwrap();
/// assert_eq!(pwm.divider, 5);
/// assert_eq!(pwm.compare, (pwm.top + 1) / 2);
/// ```
#[must_use]
#[expect(
    clippy::integer_division_remainder_used,
    reason = "half the period for 50 % duty"
)]
pub fn tone_pwm(clk_hz: u32, frequency_hz: u16) -> Option<TonePwm> {
    if frequency_hz == 0 {
        return None;
    }
    (1..=u8::MAX).find_map(|divider| {
        let ticks_per_cycle = u32::from(divider).checked_mul(u32::from(frequency_hz))?;
        let period = clk_hz.checked_div(ticks_per_cycle)?;
        let top = u16::try_from(period.checked_sub(1)?).ok()?;
        (top > 0).then(|| TonePwm {
            divider,
            top,
            compare: (top / 2).saturating_add(1),
        })
    })
}

// ============================================================================
// Beeper device
// ============================================================================

#[cfg(any(feature = "pico1", feature = "pico2"))]
mod device {
    #![allow(clippy::future_not_send, reason = "single-threaded")]

    use core::convert::Infallible;

    use embassy_executor::Spawner;
    use embassy_futures::select::{Either, select};
    use embassy_rp::clocks::clk_sys_freq;
    use embassy_rp::pwm::{Config, Pwm};
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_sync::signal::Signal;
    use embassy_time::Timer;

    use super::tone_pwm;
    use crate::Result;
    use crate::fmt::{info, warn};
    use crate::melody::{BeepPattern, Step, melody_steps};

    /// What the beeper should do next; a new command interrupts the current one.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum BuzzerCommand {
        /// Loop the alarm melody until told otherwise.
        PlayAlarm,
        /// Play a pattern once.
        Beep(BeepPattern),
        /// Go quiet.
        Stop,
    }

    /// Notifier carrying commands to the beeper task.
    pub type BeeperNotifier = Signal<CriticalSectionRawMutex, BuzzerCommand>;

    /// Buzzer driven from its own task.
    ///
    /// ```ignore
    /// static BEEPER_NOTIFIER: BeeperNotifier = Beeper::notifier();
    /// let pwm = Pwm::new_output_a(p.PWM_SLICE3, p.PIN_6, Config::default());
    /// let beeper = Beeper::new(pwm, &BEEPER_NOTIFIER, spawner)?;
    /// beeper.play_alarm();
    /// ```
    pub struct Beeper(&'static BeeperNotifier);

    impl Beeper {
        #[must_use]
        pub const fn notifier() -> BeeperNotifier {
            Signal::new()
        }

        /// Spawn the beeper task on a PWM channel-A output.
        ///
        /// # Errors
        ///
        /// [`crate::Error::TaskSpawn`] if the task is already running.
        pub fn new(
            pwm: Pwm<'static>,
            notifier: &'static BeeperNotifier,
            spawner: Spawner,
        ) -> Result<Self> {
            let token = beeper_device_loop(Tone::new(pwm), notifier)?;
            spawner.spawn(token);
            Ok(Self(notifier))
        }

        pub fn play_alarm(&self) {
            self.0.signal(BuzzerCommand::PlayAlarm);
        }

        pub fn beep(&self, pattern: BeepPattern) {
            self.0.signal(BuzzerCommand::Beep(pattern));
        }

        pub fn stop(&self) {
            self.0.signal(BuzzerCommand::Stop);
        }
    }

    /// One PWM slice producing square waves.
    struct Tone {
        pwm: Pwm<'static>,
        // Kept so a frequency change does not reset the divider.
        cfg: Config,
    }

    impl Tone {
        fn new(mut pwm: Pwm<'static>) -> Self {
            let mut cfg = Config::default();
            cfg.enable = false;
            pwm.set_config(&cfg);
            Self { pwm, cfg }
        }

        fn play(&mut self, frequency_hz: u16) {
            let Some(settings) = tone_pwm(clk_sys_freq(), frequency_hz) else {
                warn!("Tone {} Hz out of range", frequency_hz);
                self.silence();
                return;
            };
            self.cfg.divider = settings.divider.into();
            self.cfg.top = settings.top;
            self.cfg.compare_a = settings.compare;
            self.cfg.phase_correct = false;
            self.cfg.enable = true;
            self.pwm.set_config(&self.cfg);
        }

        fn silence(&mut self) {
            self.cfg.compare_a = 0;
            self.cfg.enable = false;
            self.pwm.set_config(&self.cfg);
        }

        /// Output `step` for its duration, or until a new command arrives.
        async fn step(&mut self, step: Step, notifier: &'static BeeperNotifier) -> Option<BuzzerCommand> {
            match step {
                Step::Tone { frequency_hz, .. } => self.play(frequency_hz),
                Step::Silence(_) => self.silence(),
            }
            match select(Timer::after(step.duration()), notifier.wait()).await {
                Either::First(()) => None,
                Either::Second(command) => Some(command),
            }
        }
    }

    #[embassy_executor::task]
    async fn beeper_device_loop(tone: Tone, notifier: &'static BeeperNotifier) -> ! {
        let err = inner_beeper_device_loop(tone, notifier).await.unwrap_err();
        core::panic!("{err}");
    }

    async fn inner_beeper_device_loop(
        mut tone: Tone,
        notifier: &'static BeeperNotifier,
    ) -> Result<Infallible> {
        info!("Beeper task started");
        let mut command = notifier.wait().await;
        loop {
            info!("Beeper command {:?}", command);
            command = match command {
                BuzzerCommand::Stop => {
                    tone.silence();
                    notifier.wait().await
                }
                BuzzerCommand::PlayAlarm => 'melody: loop {
                    for step in melody_steps() {
                        if let Some(next) = tone.step(step, notifier).await {
                            break 'melody next;
                        }
                    }
                },
                BuzzerCommand::Beep(pattern) => {
                    let mut interrupted = None;
                    for step in pattern.steps() {
                        interrupted = tone.step(step, notifier).await;
                        if interrupted.is_some() {
                            break;
                        }
                    }
                    if let Some(next) = interrupted {
                        next
                    } else {
                        tone.silence();
                        notifier.wait().await
                    }
                }
            };
        }
    }
}

#[cfg(any(feature = "pico1", feature = "pico2"))]
pub use device::{Beeper, BeeperNotifier, BuzzerCommand};
