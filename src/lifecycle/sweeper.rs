//! Background eviction of idle identifiers.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::gate::SecurityGate;

/// Periodically sweep the gate's shared maps until shutdown.
pub fn spawn_sweeper(
    gate: Arc<SecurityGate>,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let evicted = gate.sweep();
                    if evicted > 0 {
                        let (buckets, records) = gate.tracked();
                        tracing::debug!(evicted, buckets, records, "Swept idle identifiers");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Sweeper stopping");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::config::GateConfig;
    use crate::gate::EndpointLimit;
    use crate::lifecycle::Shutdown;

    #[tokio::test]
    async fn test_sweeper_evicts_and_stops() {
        let mut config = GateConfig::default();
        config.eviction.enabled = true;
        config.eviction.idle_ttl_secs = Some(1);

        let clock = Arc::new(MockClock::new());
        let gate = Arc::new(SecurityGate::with_clock(&config, clock.clone()));
        gate.admit("compress", "1.2.3.4", EndpointLimit { limit: 3, window_ms: 60_000 })
            .unwrap();
        assert_eq!(gate.tracked(), (1, 1));

        clock.advance(Duration::from_secs(5));

        let shutdown = Shutdown::new();
        let handle = spawn_sweeper(gate.clone(), Duration::from_millis(10), shutdown.subscribe());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(gate.tracked(), (0, 0));

        shutdown.trigger();
        handle.await.unwrap();
    }
}
