#![forbid(unsafe_code)]

use std::{io::BufRead, sync::Arc};

use chrono::NaiveDateTime;
use dotenvy::dotenv;
use eyre::{Result, WrapErr};
use fishing_log::{
    config::Config,
    database::{self, SqliteRepository},
    game_clock::{Clock, SystemClock, GAME_DAY},
    models::RankedEntry,
    preferences::Preferences,
    CatchRepository, Command, GameClock, Leaderboard, Reply, TimeOfDay,
};
use futures_lite::stream::StreamExt;
use log::{debug, error, info, warn};
use signal_hook::consts::signal::{SIGINT, SIGQUIT, SIGTERM};
use signal_hook_tokio::Signals;
use tokio::{
    select,
    sync::{mpsc, watch, Notify},
};

const COMMAND_BUFFER: usize = 16;

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init_timed();
    dotenv().ok();

    run().await.wrap_err("failed to run fishing log")
}

async fn run() -> Result<()> {
    let config = Config::from_env().wrap_err("Could not load config")?;

    let signals =
        Signals::new(&[SIGTERM, SIGINT, SIGQUIT]).wrap_err("Could not register signals")?;
    let quit = Arc::new(Notify::new());

    let pool = database::connect(&config.database_url).await?;

    info!("Running Migrations");
    database::migrate(&pool).await?;

    let preferences = Preferences::new(pool.clone());
    let mut clock = GameClock::system(preferences.load_offset().await?);

    if let Some(target) = config.sync_game_time {
        let offset = clock.adjust_to(target);
        preferences.store_offset(offset).await?;
    }

    let leaderboard = Leaderboard::new(
        SqliteRepository::new(pool.clone()),
        config.leaderboard_limit,
    );

    let handle = signals.handle();
    let signals_task = tokio::spawn(handle_signals(signals, quit.clone()));

    clock.start(Arc::new(Notify::new()))?;
    let watch_task = tokio::spawn(watch_game_time(
        clock.subscribe(),
        clock.subscribe_day_start(),
        leaderboard.clone(),
    ));

    // blocking reader, detached from the runtime
    let (tx, mut rx) = mpsc::channel(COMMAND_BUFFER);
    std::thread::spawn(move || read_commands(tx));

    let mut reading = true;
    loop {
        select! {
            line = rx.recv(), if reading => match line {
                Some(line) => {
                    handle_line(&line, &leaderboard, &clock, &preferences).await;
                }
                None => {
                    debug!("Command input closed");
                    reading = false;
                }
            },
            _ = quit.notified() => break,
        }
    }

    clock.stop().await?;

    info!("Saving game clock offset");
    preferences.store_offset(clock.offset()).await?;

    // closing the clock ends the watcher
    drop(clock);
    watch_task.await?;

    // Terminate the signal stream.
    handle.close();
    signals_task.await?;

    pool.close().await;

    Ok(())
}

async fn handle_signals(mut signals: Signals, quit_signal: Arc<Notify>) {
    info!("Starting signal handler");
    while let Some(signal) = signals.next().await {
        match signal {
            SIGTERM | SIGINT | SIGQUIT => {
                // Shutdown the system
                quit_signal.notify_one();
                break;
            }
            _ => unreachable!(),
        }
    }
}

fn read_commands(tx: mpsc::Sender<String>) {
    for line in std::io::stdin().lock().lines() {
        match line {
            Ok(line) if line.trim().is_empty() => {}
            Ok(line) => {
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
            Err(err) => {
                error!("Could not read command: {err}");
                break;
            }
        }
    }
}

async fn handle_line<R, C>(
    line: &str,
    leaderboard: &Leaderboard<R>,
    clock: &GameClock<C>,
    preferences: &Preferences,
) where
    R: CatchRepository,
    C: Clock + 'static,
{
    let command: Command = match line.parse() {
        Ok(command) => command,
        Err(err) => {
            warn!("Ignoring {line:?}: {err}");
            return;
        }
    };

    match command.execute(leaderboard, clock).await {
        Ok(Reply::Recorded) => info!("Catch recorded"),
        Ok(Reply::Voted) => info!("Vote counted"),
        Ok(Reply::Synced { offset }) => {
            info!("Game time is now {}", clock.current());
            if let Err(err) = preferences.store_offset(offset).await {
                error!("Could not save game clock offset: {err}");
            }
        }
        Ok(Reply::Leaderboard { period, snapshot }) => {
            info!("Leaderboard for {period:?} since {}", snapshot.since);
            info!("Top anglers: {}", format_entries(&snapshot.anglers));
            info!("Top spots: {}", format_entries(&snapshot.locations));
            info!("Top species: {}", format_entries(&snapshot.species));
        }
        Err(err) => error!("{:#}", eyre::Report::new(err)),
    }
}

async fn watch_game_time<R: CatchRepository>(
    mut game_time: watch::Receiver<TimeOfDay>,
    mut day_start: watch::Receiver<NaiveDateTime>,
    leaderboard: Leaderboard<R>,
) {
    let mut last = *game_time.borrow_and_update();
    info!("Game time is {last}, it is {}", last.period());
    let start = *day_start.borrow_and_update();
    log_today(&leaderboard, start).await;

    loop {
        select! {
            changed = game_time.changed() => {
                if changed.is_err() {
                    break;
                }
                let time = *game_time.borrow_and_update();
                if time.period() != last.period() {
                    info!("It is now {} in game ({time})", time.period());
                }
                last = time;
            }
            changed = day_start.changed() => {
                if changed.is_err() {
                    break;
                }
                info!("A new in-game day has started");
                let start = *day_start.borrow_and_update();
                log_today(&leaderboard, start).await;
            }
        }
    }

    debug!("Game clock closed");
}

async fn log_today<R: CatchRepository>(leaderboard: &Leaderboard<R>, day_start: NaiveDateTime) {
    let now = SystemClock.now();
    if let Ok(remaining) = (day_start + *GAME_DAY - now).to_std() {
        info!(
            "Next in-game midnight in {}",
            humantime::format_duration(remaining)
        );
    }

    match leaderboard.snapshot(day_start).await {
        Ok(snapshot) => {
            info!("Top anglers today: {}", format_entries(&snapshot.anglers));
            info!("Top spots today: {}", format_entries(&snapshot.locations));
            info!("Top species today: {}", format_entries(&snapshot.species));
        }
        Err(err) => {
            error!("Error querying leaderboard: {err}");
        }
    }
}

fn format_entries(entries: &[RankedEntry]) -> String {
    if entries.is_empty() {
        return "no catches yet".to_string();
    }

    entries
        .iter()
        .enumerate()
        .map(|(position, entry)| format!("{}. {} - {}", position + 1, entry.label, entry.count))
        .collect::<Vec<_>>()
        .join(" · ")
}
