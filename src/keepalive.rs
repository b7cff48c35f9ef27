//! The presence-gated keep-alive loop.
//!
//! ```text
//! AwaitPresence -> Waking -> Booting -> Pinging -+
//!       ^                                 ^      |
//!       |                                 +------+  (present)
//!       +---- backoff on failure or absence -----+
//! ```

use std::{thread, time::Duration};

use chrono::{Local, TimeDelta};
use log::{debug, info, warn};

use crate::{
    command::CommandFrame,
    config::Configuration,
    headset::PresenceDetector,
    lighthouse::Transport,
};

const BACKOFF: Duration = Duration::from_secs(5);
/// Time the station needs after a wake-up before it accepts refreshes.
const BOOT_SETTLE: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    AwaitPresence,
    Waking,
    Booting,
    Pinging,
}

/// Why the loop is sleeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Delay {
    Backoff,
    BootSettle,
    PingCadence,
}

pub trait Sleeper {
    fn sleep(&mut self, delay: Delay, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, delay: Delay, duration: Duration) {
        debug!("sleeping {duration:?} ({delay:?})");
        thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub backoff: Duration,
    pub boot_settle: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self { backoff: BACKOFF, boot_settle: BOOT_SETTLE }
    }
}

/// Interval between two refreshes. Half the timeout, so the station never times out in between.
pub fn ping_cadence(timeout_secs: u16) -> Duration {
    Duration::from_secs(u64::from(timeout_secs)) / 2
}

pub struct KeepAlive<'a, P, T, S> {
    config: &'a Configuration,
    presence: P,
    transport: T,
    sleeper: S,
    timing: Timing,
    phase: Phase,
}

impl<'a, P, T, S> KeepAlive<'a, P, T, S>
where
    P: PresenceDetector,
    T: Transport,
    S: Sleeper,
{
    pub fn new(config: &'a Configuration, presence: P, transport: T, sleeper: S) -> Self {
        Self {
            config,
            presence,
            transport,
            sleeper,
            timing: Timing::default(),
            phase: Phase::AwaitPresence,
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn run(&mut self) -> ! {
        loop {
            self.step();
        }
    }

    /// Runs the current phase to completion, including any sleep it ends with,
    /// and returns the phase that comes next.
    pub fn step(&mut self) -> Phase {
        let next = match self.phase {
            Phase::AwaitPresence => self.await_presence(),
            Phase::Waking => self.wake(),
            Phase::Booting => self.boot(),
            Phase::Pinging => self.ping(),
        };

        if next != self.phase {
            debug!("{:?} -> {next:?}", self.phase);
        }
        self.phase = next;

        next
    }

    fn await_presence(&mut self) -> Phase {
        if self.presence.is_headset_present() {
            info!("Step 1 : headset is present");
            Phase::Waking
        } else {
            self.restart()
        }
    }

    fn wake(&mut self) -> Phase {
        match self.send(CommandFrame::wake_up()) {
            Ok(()) => {
                info!(
                    "Step 2 : base station is waking up, waiting {:?}",
                    self.timing.boot_settle
                );
                Phase::Booting
            }
            Err(()) => self.restart(),
        }
    }

    fn boot(&mut self) -> Phase {
        self.sleeper.sleep(Delay::BootSettle, self.timing.boot_settle);

        if self.presence.is_headset_present() {
            info!("Step 3 : entering ping loop");
            Phase::Pinging
        } else {
            self.restart()
        }
    }

    fn ping(&mut self) -> Phase {
        let timeout = self.config.timeout_secs;

        if self.send(CommandFrame::refresh(timeout, self.config.station_id)).is_err() {
            return self.restart();
        }

        let expiry = Local::now() + TimeDelta::seconds(i64::from(timeout));
        info!("timeout refreshed, station stays awake until {}", expiry.format("%H:%M:%S"));

        self.sleeper.sleep(Delay::PingCadence, ping_cadence(timeout));

        if self.presence.is_headset_present() {
            Phase::Pinging
        } else {
            self.restart()
        }
    }

    fn send(&mut self, frame: CommandFrame) -> Result<(), ()> {
        debug!("CMD {:?} : {frame}", self.phase);

        self.transport
            .send_command(&self.config.address, &frame)
            .map_err(|err| warn!("sending to {} failed during {:?}: {err}", self.config.address, self.phase))
    }

    fn restart(&mut self) -> Phase {
        self.sleeper.sleep(Delay::Backoff, self.timing.backoff);
        Phase::AwaitPresence
    }
}
