// src/blockchain/connection.rs
//! Supervised ledger connection.
//!
//! The supervisor owns a background task that re-establishes the ledger
//! link after a drop is reported. State is published on a `watch` channel:
//! in-flight ledger waits subscribe to it and give up with
//! [`LedgerError::Disconnected`] on the first transition instead of
//! retrying on their own.

use crate::blockchain::ledger_client::LedgerClient;
use crate::config::LedgerSettings;
use crate::error::LedgerError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
    /// Reconnect attempt in progress, counted from 1
    Reconnecting { attempt: u32 },
    /// Terminal, set by [`ConnectionSupervisor::shutdown`]
    Closed,
}

struct Shared {
    state: watch::Sender<ConnectionState>,
    wake: Notify,
    shutdown: Notify,
}

impl Shared {
    /// Moves to `next` unless the connection is already closed.
    fn transition(&self, next: ConnectionState) -> bool {
        self.state.send_if_modified(|current| {
            if *current == ConnectionState::Closed || *current == next {
                return false;
            }
            *current = next;
            true
        })
    }
}

/// Cheap, clonable view of the supervised connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    shared: Arc<Shared>,
}

impl ConnectionHandle {
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Receiver that wakes on every state change.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Marks the link as dropped and wakes the reconnect task.
    pub fn report_disconnect(&self) {
        if self.shared.transition(ConnectionState::Disconnected) {
            log::warn!("ledger connection lost");
            self.shared.wake.notify_one();
        }
    }
}

/// Owns the reconnect task for one ledger client.
///
/// Dropping the supervisor without [`ConnectionSupervisor::shutdown`] closes
/// the connection state and aborts the task.
pub struct ConnectionSupervisor {
    handle: ConnectionHandle,
    task: Option<JoinHandle<()>>,
}

impl ConnectionSupervisor {
    /// Connects `client` and starts supervising it.
    ///
    /// # Arguments
    /// * `client` - Ledger client to connect and reconnect
    /// * `settings` - Reconnect attempt limit and backoff
    ///
    /// # Returns
    /// The running supervisor. The initial connection is not retried; a
    /// failure is returned as is.
    pub async fn start(client: Arc<dyn LedgerClient>, settings: &LedgerSettings) -> Result<Self, LedgerError> {
        client.connect().await?;
        log::info!("ledger connected");

        let (state, _) = watch::channel(ConnectionState::Connected);
        let shared = Arc::new(Shared {
            state,
            wake: Notify::new(),
            shutdown: Notify::new(),
        });
        let task = tokio::spawn(supervise(
            client,
            Arc::clone(&shared),
            settings.reconnect_max_attempts,
            settings.reconnect_backoff(),
        ));

        Ok(ConnectionSupervisor {
            handle: ConnectionHandle { shared },
            task: Some(task),
        })
    }

    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    /// Closes the connection and waits for the reconnect task to exit.
    pub async fn shutdown(mut self) {
        self.handle.shared.state.send_replace(ConnectionState::Closed);
        self.handle.shared.shutdown.notify_one();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                log::warn!("connection supervisor task ended abnormally: {}", e);
            }
        }
        log::info!("ledger connection closed");
    }
}

impl Drop for ConnectionSupervisor {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            self.handle.shared.state.send_replace(ConnectionState::Closed);
            task.abort();
            log::debug!("connection supervisor dropped without shutdown");
        }
    }
}

async fn supervise(client: Arc<dyn LedgerClient>, shared: Arc<Shared>, max_attempts: u32, backoff: Duration) {
    loop {
        tokio::select! {
            _ = shared.shutdown.notified() => return,
            _ = shared.wake.notified() => {}
        }
        if *shared.state.borrow() != ConnectionState::Disconnected {
            continue;
        }
        if !reconnect(client.as_ref(), &shared, max_attempts, backoff).await {
            return;
        }
    }
}

/// Returns false when shutdown interrupted the attempts.
async fn reconnect(client: &dyn LedgerClient, shared: &Shared, max_attempts: u32, backoff: Duration) -> bool {
    for attempt in 1..=max_attempts {
        if !shared.transition(ConnectionState::Reconnecting { attempt }) {
            return false;
        }
        tokio::select! {
            _ = shared.shutdown.notified() => return false,
            _ = tokio::time::sleep(backoff * attempt) => {}
        }
        match client.connect().await {
            Ok(()) => {
                log::info!("ledger reconnected after {} attempt(s)", attempt);
                return shared.transition(ConnectionState::Connected);
            }
            Err(e) => log::warn!("reconnect attempt {}/{} failed: {}", attempt, max_attempts, e),
        }
    }
    log::error!("giving up on ledger connection after {} attempts", max_attempts);
    shared.transition(ConnectionState::Disconnected);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::memory_ledger::MemoryLedger;

    fn fast_settings() -> LedgerSettings {
        LedgerSettings {
            reconnect_max_attempts: 2,
            reconnect_backoff_ms: 1,
            ..LedgerSettings::default()
        }
    }

    async fn wait_for(handle: &ConnectionHandle, wanted: ConnectionState) {
        let mut updates = handle.subscribe();
        tokio::time::timeout(Duration::from_secs(2), async {
            while *updates.borrow_and_update() != wanted {
                updates.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_start_connects() {
        let ledger = Arc::new(MemoryLedger::new());
        let supervisor = ConnectionSupervisor::start(ledger, &fast_settings()).await.unwrap();

        assert!(supervisor.handle().is_connected());
        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_fails_when_ledger_refuses() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.refuse_connections(true);

        let result = ConnectionSupervisor::start(ledger, &fast_settings()).await;
        assert!(matches!(result, Err(LedgerError::Transport(_))));
    }

    #[tokio::test]
    async fn test_reported_drop_is_reconnected() {
        let ledger = Arc::new(MemoryLedger::new());
        let supervisor = ConnectionSupervisor::start(ledger.clone(), &fast_settings()).await.unwrap();
        let handle = supervisor.handle();

        ledger.drop_connection();
        handle.report_disconnect();
        assert_ne!(handle.state(), ConnectionState::Connected);

        wait_for(&handle, ConnectionState::Connected).await;
        assert!(ledger.fee().await.is_ok());
        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let ledger = Arc::new(MemoryLedger::new());
        let settings = LedgerSettings {
            reconnect_backoff_ms: 20,
            ..fast_settings()
        };
        let supervisor = ConnectionSupervisor::start(ledger.clone(), &settings).await.unwrap();
        let handle = supervisor.handle();
        let mut updates = handle.subscribe();

        ledger.refuse_connections(true);
        handle.report_disconnect();

        let mut seen = Vec::new();
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                updates.changed().await.unwrap();
                let state = *updates.borrow_and_update();
                seen.push(state);
                if state == (ConnectionState::Reconnecting { attempt: 2 }) {
                    break;
                }
            }
        })
        .await
        .unwrap();
        wait_for(&handle, ConnectionState::Disconnected).await;

        assert!(seen.contains(&ConnectionState::Reconnecting { attempt: 2 }));
        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn test_drop_without_shutdown_stops_task() {
        let ledger = Arc::new(MemoryLedger::new());
        let supervisor = ConnectionSupervisor::start(ledger.clone(), &fast_settings()).await.unwrap();
        let handle = supervisor.handle();
        assert_eq!(Arc::strong_count(&ledger), 2);

        drop(supervisor);

        assert_eq!(handle.state(), ConnectionState::Closed);
        // The aborted task releases its client once the runtime drops it.
        tokio::time::timeout(Duration::from_secs(2), async {
            while Arc::strong_count(&ledger) > 1 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_closed_is_terminal() {
        let ledger = Arc::new(MemoryLedger::new());
        let supervisor = ConnectionSupervisor::start(ledger, &fast_settings()).await.unwrap();
        let handle = supervisor.handle();

        supervisor.shutdown().await;
        handle.report_disconnect();

        assert_eq!(handle.state(), ConnectionState::Closed);
    }
}
