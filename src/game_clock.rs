//! The accelerated in-game clock.
//!
//! A full in-game day passes every sixty real minutes. The clock is derived
//! from the local wall clock plus a signed offset the player sets to line
//! the game up with a reference clock. Only the offset is ever persisted.

use std::{
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
    time::Duration as StdDuration,
};

use chrono::{Duration, Local, NaiveDateTime, Timelike};
use log::{debug, info, trace};
use once_cell::sync::Lazy;
use tokio::{
    select,
    sync::{watch, Notify},
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};

pub use crate::time_of_day::{classify_time_of_day, TimeOfDay, TimePeriod, SECONDS_PER_DAY};

/// In-game seconds per real second.
pub const TIME_SCALE: i64 = 24;
pub const REAL_SECONDS_PER_GAME_DAY: i64 = SECONDS_PER_DAY / TIME_SCALE;
const REAL_MILLIS_PER_GAME_DAY: i64 = REAL_SECONDS_PER_GAME_DAY * 1000;

pub static GAME_DAY: Lazy<Duration> = Lazy::new(|| Duration::seconds(REAL_SECONDS_PER_GAME_DAY));

const TICK: StdDuration = StdDuration::from_secs(1);

/// Source of local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

fn base_game_seconds(now: NaiveDateTime) -> i64 {
    now.time().num_seconds_from_midnight() as i64 * TIME_SCALE
}

pub fn compute_game_time(now: NaiveDateTime, offset_seconds: i64) -> TimeOfDay {
    // reduce the offset first so arbitrary offsets cannot overflow
    TimeOfDay::from_seconds(base_game_seconds(now) + offset_seconds.rem_euclid(SECONDS_PER_DAY))
}

/// Offset that makes the clock read `target` at `now`.
///
/// The result is not wrapped; [`compute_game_time`] wraps it when reading.
pub fn adjust_to_target_time(target: TimeOfDay, now: NaiveDateTime) -> i64 {
    target.seconds_from_midnight() - base_game_seconds(now)
}

/// Real instant of the most recent in-game midnight.
///
/// Truncated to whole milliseconds, so one game second maps to 41 ms.
pub fn start_of_current_game_day(
    current_game_time: TimeOfDay,
    now: NaiveDateTime,
) -> NaiveDateTime {
    let millis_into_day =
        current_game_time.seconds_from_midnight() * REAL_MILLIS_PER_GAME_DAY / SECONDS_PER_DAY;
    now - Duration::milliseconds(millis_into_day)
}

/// Whether the game day wrapped between two readings.
///
/// An offset change between the readings is an adjustment, not a new day.
fn day_rolled_over(previous: (TimeOfDay, i64), next: (TimeOfDay, i64)) -> bool {
    previous.1 == next.1 && next.0 < previous.0
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Game clock is already running")]
    AlreadyRunning,

    #[error("Failed to run tick task")]
    TickTask(#[source] tokio::task::JoinError),
}

#[derive(Debug)]
struct Running {
    cancel: Arc<Notify>,
    task: JoinHandle<()>,
}

/// Owned clock service.
///
/// Publishes the current game time once per second while started. Consumers
/// read the latest value through [`GameClock::subscribe`] or
/// [`GameClock::current`], and the start of each new in-game day through
/// [`GameClock::subscribe_day_start`].
#[derive(Debug)]
pub struct GameClock<C = SystemClock> {
    clock: Arc<C>,
    offset: Arc<AtomicI64>,
    current: Arc<watch::Sender<TimeOfDay>>,
    day_start: Arc<watch::Sender<NaiveDateTime>>,
    running: Option<Running>,
}

impl GameClock<SystemClock> {
    pub fn system(offset_seconds: i64) -> Self {
        Self::new(SystemClock, offset_seconds)
    }
}

impl<C: Clock + 'static> GameClock<C> {
    pub fn new(clock: C, offset_seconds: i64) -> Self {
        let now = clock.now();
        let time = compute_game_time(now, offset_seconds);
        let (current, _) = watch::channel(time);
        let (day_start, _) = watch::channel(start_of_current_game_day(time, now));

        Self {
            clock: Arc::new(clock),
            offset: Arc::new(AtomicI64::new(offset_seconds)),
            current: Arc::new(current),
            day_start: Arc::new(day_start),
            running: None,
        }
    }

    pub fn offset(&self) -> i64 {
        self.offset.load(Ordering::Relaxed)
    }

    /// Replaces the offset and republishes. Persisting it is up to the caller.
    pub fn set_offset(&self, offset_seconds: i64) {
        debug!("Setting game clock offset to {offset_seconds}s");
        self.offset.store(offset_seconds, Ordering::Relaxed);

        let now = self.clock.now();
        let time = compute_game_time(now, offset_seconds);
        self.current.send_replace(time);
        self.day_start.send_if_modified(|start| {
            *start = start_of_current_game_day(time, now);
            false
        });
    }

    /// Sets the offset so the clock reads `target` now and returns it.
    pub fn adjust_to(&self, target: TimeOfDay) -> i64 {
        let offset = adjust_to_target_time(target, self.clock.now());
        info!("Adjusting game clock to {target} (offset {offset}s)");
        self.set_offset(offset);
        offset
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub fn current(&self) -> TimeOfDay {
        *self.current.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<TimeOfDay> {
        self.current.subscribe()
    }

    /// Real start of the in-game day. Subscribers are notified only when the
    /// ticker sees the day roll over; offset changes update the value silently.
    pub fn subscribe_day_start(&self) -> watch::Receiver<NaiveDateTime> {
        self.day_start.subscribe()
    }

    pub fn start_of_current_day(&self) -> NaiveDateTime {
        let now = self.clock.now();
        start_of_current_game_day(compute_game_time(now, self.offset()), now)
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Spawns the tick task. It runs until `cancel` is notified.
    pub fn start(&mut self, cancel: Arc<Notify>) -> Result<(), Error> {
        if self.running.is_some() {
            return Err(Error::AlreadyRunning);
        }

        info!("Starting game clock");
        let task = tokio::spawn(tick(
            self.clock.clone(),
            self.offset.clone(),
            self.current.clone(),
            self.day_start.clone(),
            cancel.clone(),
        ));
        self.running = Some(Running { cancel, task });

        Ok(())
    }

    /// Cancels the tick task and waits for it to finish.
    pub async fn stop(&mut self) -> Result<(), Error> {
        if let Some(running) = &self.running {
            running.cancel.notify_one();
        }
        self.stopped().await
    }

    /// Waits for the tick task to finish after its cancellation was notified.
    pub async fn stopped(&mut self) -> Result<(), Error> {
        if let Some(running) = self.running.take() {
            running.task.await.map_err(Error::TickTask)?;
            info!("Game clock stopped");
        }
        Ok(())
    }
}

async fn tick<C: Clock>(
    clock: Arc<C>,
    offset: Arc<AtomicI64>,
    current: Arc<watch::Sender<TimeOfDay>>,
    day_start: Arc<watch::Sender<NaiveDateTime>>,
    cancel: Arc<Notify>,
) {
    let mut ticks = interval(TICK);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut last = None;
    loop {
        select! {
            _ = ticks.tick() => {
                let now = clock.now();
                let offset_seconds = offset.load(Ordering::Relaxed);
                let time = compute_game_time(now, offset_seconds);
                trace!("Game time is {time}");
                current.send_replace(time);

                let reading = (time, offset_seconds);
                if matches!(last, Some(last) if day_rolled_over(last, reading)) {
                    let start = start_of_current_game_day(time, now);
                    debug!("New in-game day started at {start}");
                    day_start.send_replace(start);
                }
                last = Some(reading);
            }
            _ = cancel.notified() => {
                debug!("Received quitting clock task");
                break;
            }
        }
    }
}
