//! Periodic callbacks that keep the timer live: a ticker and a snapshot
//! writer. Both go through the shared plugin lock, one call at a time.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use crate::plugin::PomodoroPlugin;
use crate::session::SessionStore;

pub type SharedPlugin<S> = Arc<Mutex<PomodoroPlugin<S>>>;

pub fn spawn_ticker<S>(plugin: SharedPlugin<S>, every: Duration) -> JoinHandle<()>
where
    S: SessionStore + 'static,
{
    tokio::spawn(async move {
        let mut interval = time::interval(every);
        // A suspended process should not replay a burst of ticks on wake.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            plugin.lock().await.timer_mut().tick();
        }
    })
}

pub fn spawn_snapshotter<S>(plugin: SharedPlugin<S>, every: Duration) -> JoinHandle<()>
where
    S: SessionStore + 'static,
{
    tokio::spawn(async move {
        let mut interval = time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it so startup is not
        // racing recovery with a write.
        interval.tick().await;
        loop {
            interval.tick().await;
            plugin.lock().await.save_snapshot();
            debug!("timer snapshot written");
        }
    })
}
