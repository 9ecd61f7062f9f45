use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// How a ticker schedules the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickMode {
    /// Next tick at `previous_tick + period`; missed ticks are skipped,
    /// not replayed.
    Stable,
    /// Next tick at `now + period`, measured after the receiver has
    /// consumed the previous tick. A slow consumer stretches the period.
    Drifting,
}

/// Spawn a background task that sends `()` into `tick` every `period`.
///
/// The task exits when the receiver is dropped; awaiting the returned
/// handle is the stop-and-join. Consumers receive at most one pending
/// tick (channel capacity 1), so re-entry is impossible.
pub fn spawn_ticker(
    name: &str,
    period: Duration,
    mode: TickMode,
    tick: mpsc::Sender<()>,
) -> JoinHandle<()> {
    let name = name.to_string();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(match mode {
            TickMode::Stable => MissedTickBehavior::Skip,
            TickMode::Drifting => MissedTickBehavior::Delay,
        });

        loop {
            interval.tick().await;
            tracing::trace!(ticker = %name, "tick");
            if tick.send(()).await.is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ticker_fires_at_intervals() {
        let (tx, mut rx) = mpsc::channel(1);
        let _handle = spawn_ticker("t", Duration::from_secs(10), TickMode::Stable, tx);

        // Ensure the spawned task is polled once so it registers its timer.
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_secs(9)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());

        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_ok());

        tokio::time::advance(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_stops_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        let handle = spawn_ticker("t", Duration::from_millis(10), TickMode::Drifting, tx);
        drop(rx);

        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(20)).await;
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_consumer_never_sees_tick_pileup() {
        let (tx, mut rx) = mpsc::channel(1);
        let _handle = spawn_ticker("t", Duration::from_millis(10), TickMode::Drifting, tx);

        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(100)).await;
        tokio::task::yield_now().await;

        // Capacity 1: however long the consumer lagged, one tick waits.
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
