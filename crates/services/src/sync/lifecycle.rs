use std::sync::{Arc, Mutex};

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ReplaySchedule;
use crate::sync::dispatcher::{ReplayReport, SyncDispatcher};

/// Host-controlled online/offline signal.
#[derive(Clone)]
pub struct Connectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (tx, _) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    pub fn set_online(&self, online: bool) {
        self.tx.send_replace(online);
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Startup,
    Reconnected,
    Interval,
}

struct Running {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Owns the background replay loop.
///
/// While started, pending requests are replayed after the startup delay,
/// whenever connectivity comes back, and on every interval tick while online.
pub struct SyncQueue {
    dispatcher: SyncDispatcher,
    connectivity: Connectivity,
    schedule: ReplaySchedule,
    running: Mutex<Option<Running>>,
}

impl SyncQueue {
    #[must_use]
    pub fn new(dispatcher: SyncDispatcher, connectivity: Connectivity, schedule: ReplaySchedule) -> Self {
        Self {
            dispatcher,
            connectivity,
            schedule,
            running: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Spawn the replay loop on the current tokio runtime. No-op if already running.
    pub fn start(&self) {
        let Ok(mut guard) = self.running.lock() else {
            warn!("sync queue state poisoned; not starting");
            return;
        };
        if guard.is_some() {
            return;
        }

        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run_loop(
            self.dispatcher.clone(),
            self.connectivity.subscribe(),
            self.schedule,
            shutdown_rx,
        ));
        *guard = Some(Running { shutdown, handle });
        info!("sync queue started");
    }

    /// Stop the replay loop, waiting for an in-flight pass to finish.
    pub async fn stop(&self) {
        let running = self.running.lock().ok().and_then(|mut guard| guard.take());
        let Some(running) = running else {
            return;
        };
        let _ = running.shutdown.send(());
        if let Err(err) = running.handle.await {
            warn!(error = %err, "sync queue task ended abnormally");
        }
        info!("sync queue stopped");
    }

    /// Run one replay pass now, independent of the background loop.
    pub async fn replay_now(&self) -> ReplayReport {
        self.dispatcher.replay_pending().await
    }
}

async fn run_loop(
    dispatcher: SyncDispatcher,
    mut online: watch::Receiver<bool>,
    schedule: ReplaySchedule,
    mut shutdown: oneshot::Receiver<()>,
) {
    let startup = tokio::time::sleep(schedule.startup_delay);
    tokio::pin!(startup);
    let mut startup_pending = true;

    let mut ticker = tokio::time::interval_at(Instant::now() + schedule.interval, schedule.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut was_online = *online.borrow_and_update();
    let mut watching = true;

    loop {
        let trigger = tokio::select! {
            _ = &mut shutdown => break,
            () = &mut startup, if startup_pending => {
                startup_pending = false;
                Trigger::Startup
            }
            changed = online.changed(), if watching => {
                if changed.is_err() {
                    watching = false;
                    continue;
                }
                let now_online = *online.borrow_and_update();
                let reconnected = now_online && !was_online;
                was_online = now_online;
                if !reconnected {
                    continue;
                }
                Trigger::Reconnected
            }
            _ = ticker.tick() => Trigger::Interval,
        };

        if !*online.borrow() {
            debug!(?trigger, "offline; skipping replay");
            continue;
        }
        let report = dispatcher.replay_pending().await;
        debug!(?trigger, ?report, "replay triggered");
    }
}
