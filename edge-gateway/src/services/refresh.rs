//! Single-flight refresh coordination.
//!
//! When several in-flight requests all discover an expired access token at
//! once, exactly one refresh call may go out; everyone else parks on the
//! shared outcome. `RefreshCoordinator` implements that collapse for one
//! credential, `RefreshRegistry` scopes coordinators per refresh credential
//! so unrelated sessions never share a flight.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::oneshot;

/// Refresh failures are terminal for the session: callers must send the
/// client back through login rather than retry.
#[derive(Debug, Clone, Error)]
pub enum RefreshError {
    #[error("session expired, re-authentication required")]
    Reauthenticate,

    #[error("refresh transport failed: {0}")]
    Transport(String),
}

struct FlightState<T> {
    in_flight: bool,
    waiters: Vec<oneshot::Sender<Result<T, RefreshError>>>,
}

/// Collapses concurrent refresh attempts into one underlying call.
///
/// The first caller to observe no flight becomes the leader and runs the
/// supplied refresh future; callers that arrive while the flight is open
/// enqueue a continuation and receive the leader's outcome. The check and
/// the flag set happen under one lock acquisition, so two callers can never
/// both become leader, and the flag is only cleared after the waiter queue
/// has been drained.
pub struct RefreshCoordinator<T> {
    state: Mutex<FlightState<T>>,
}

impl<T: Clone> Default for RefreshCoordinator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> RefreshCoordinator<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FlightState {
                in_flight: false,
                waiters: Vec::new(),
            }),
        }
    }

    /// Run `refresh` unless a flight is already open, in which case wait for
    /// that flight's outcome instead. Every caller gets exactly one
    /// resolution; an abandoned waiter's continuation is simply dropped.
    pub async fn run<F, Fut>(&self, refresh: F) -> Result<T, RefreshError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RefreshError>>,
    {
        let waiter = {
            let mut state = self.lock();
            if state.in_flight {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                Some(rx)
            } else {
                state.in_flight = true;
                None
            }
        };

        match waiter {
            Some(rx) => match rx.await {
                Ok(outcome) => outcome,
                // The leader's guard rejects waiters on cancellation, so a
                // closed channel without a value means the process is tearing
                // down; treat it as a dead session.
                Err(_) => Err(RefreshError::Reauthenticate),
            },
            None => {
                let guard = FlightGuard { coordinator: self, armed: true };
                let outcome = refresh().await;
                guard.finish(outcome)
            }
        }
    }

    /// Deliver the outcome to every waiter and close the flight. Draining
    /// and clearing happen under the same lock acquisition.
    fn settle(&self, outcome: &Result<T, RefreshError>) {
        let mut state = self.lock();
        for tx in state.waiters.drain(..) {
            // A send error means that waiter was cancelled; nobody else is
            // affected.
            let _ = tx.send(outcome.clone());
        }
        state.in_flight = false;
    }

    fn is_idle(&self) -> bool {
        let state = self.lock();
        !state.in_flight && state.waiters.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, FlightState<T>> {
        self.state.lock().expect("refresh flight state lock poisoned")
    }
}

/// Settles the flight even if the leader future is dropped mid-refresh, so
/// queued waiters never park forever.
struct FlightGuard<'a, T: Clone> {
    coordinator: &'a RefreshCoordinator<T>,
    armed: bool,
}

impl<'a, T: Clone> FlightGuard<'a, T> {
    fn finish(mut self, outcome: Result<T, RefreshError>) -> Result<T, RefreshError> {
        self.armed = false;
        self.coordinator.settle(&outcome);
        outcome
    }
}

impl<'a, T: Clone> Drop for FlightGuard<'a, T> {
    fn drop(&mut self) {
        if self.armed {
            self.coordinator.settle(&Err(RefreshError::Reauthenticate));
        }
    }
}

/// Coordinators keyed by refresh credential.
///
/// Keys are digests of the refresh token, so the token itself never sits in
/// a long-lived map. Entries are evicted once their flight settles; a
/// successful refresh rotates the credential anyway, so a settled key will
/// not be seen again.
pub struct RefreshRegistry<T> {
    flights: DashMap<String, Arc<RefreshCoordinator<T>>>,
}

impl<T: Clone> Default for RefreshRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Derive a registry key from a refresh credential. The digest keeps the
/// token itself out of the long-lived map.
pub fn credential_key(refresh_token: &str) -> String {
    hex::encode(Sha256::digest(refresh_token.as_bytes()))
}

impl<T: Clone> RefreshRegistry<T> {
    pub fn new() -> Self {
        Self {
            flights: DashMap::new(),
        }
    }

    pub async fn run<F, Fut>(&self, key: &str, refresh: F) -> Result<T, RefreshError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RefreshError>>,
    {
        let coordinator = self
            .flights
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(RefreshCoordinator::new()))
            .clone();

        let outcome = coordinator.run(refresh).await;

        self.flights
            .remove_if(key, |_, c| Arc::ptr_eq(c, &coordinator) && c.is_idle());

        outcome
    }

    pub fn open_flights(&self) -> usize {
        self.flights.len()
    }
}
