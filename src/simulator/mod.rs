//! Game status simulator and recorder
//!
//! Stand-ins for the two ends of the relay when no game is running:
//! - [`spawn_ticker`] broadcasts a simulated session every [`TICK_INTERVAL`]
//!   on a registry served by the normal [`RelayServer`](crate::server::RelayServer)
//! - [`StatRecorder`] sits on an upstream client and writes what it sees as
//!   JSON lines

pub mod record;
pub mod recorder;
pub mod session;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::registry::{BroadcastRegistry, DuplicatePolicy, RegistryConfig};

pub use record::{PlayerStatus, StatusRecord};
pub use recorder::StatRecorder;
pub use session::GameSession;

/// Interval between status records
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Registry settings for a simulated game socket
pub fn simulator_registry() -> Arc<BroadcastRegistry> {
    Arc::new(BroadcastRegistry::with_config(
        RegistryConfig::default().duplicates(DuplicatePolicy::Reject),
    ))
}

/// Broadcast one record from `session` per tick until the task is aborted
pub fn spawn_ticker(registry: Arc<BroadcastRegistry>, mut session: GameSession) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let now = ticker.tick().await;
            let record = session.tick(now.into_std());

            if let Some(message) = record.to_message() {
                let outcome = registry.broadcast(&message).await;
                if outcome.dropped > 0 {
                    tracing::debug!(dropped = outcome.dropped, "Dropped simulator subscribers");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ChannelSubscriber, Subscriber};

    #[tokio::test(start_paused = true)]
    async fn test_ticker_broadcasts_idle_then_song() {
        let registry = simulator_registry();
        let (subscriber, mut rx) = ChannelSubscriber::new();
        let subscriber: Arc<dyn Subscriber> = Arc::new(subscriber);
        registry.register(Arc::clone(&subscriber)).await.unwrap();

        let start = tokio::time::Instant::now().into_std();
        let session = GameSession::seeded(start + Duration::from_millis(250), 5);
        let ticker = spawn_ticker(Arc::clone(&registry), session);

        let mut records = Vec::new();
        for _ in 0..5 {
            let message = rx.recv().await.unwrap();
            let record: StatusRecord = serde_json::from_str(message.as_text().unwrap()).unwrap();
            records.push(record);
        }
        ticker.abort();

        // Ticks at 0, 100 and 200 ms are idle; 300 and 400 ms are in the song
        assert!(records[..3].iter().all(|r| !r.in_song));
        assert!(records[3..].iter().all(|r| r.in_song));
    }

    #[tokio::test]
    async fn test_simulator_registry_rejects_duplicates() {
        let registry = simulator_registry();
        let (subscriber, _rx) = ChannelSubscriber::new();
        let subscriber: Arc<dyn Subscriber> = Arc::new(subscriber);

        registry.register(Arc::clone(&subscriber)).await.unwrap();
        assert!(registry.register(Arc::clone(&subscriber)).await.is_err());
        assert_eq!(registry.subscriber_count().await, 1);
    }
}
