//! Single-owner session store.
//!
//! Holds the one current [`Session`] and publishes whole snapshots through a
//! `watch` channel, so readers never observe a partially applied update.
//!
//! ## Generations
//!
//! Every write bumps a generation counter. Long-running operations (bootstrap,
//! credential renewal) take a [`Generation`] ticket before they start and
//! commit with it; if anything else wrote in the meantime (typically a
//! logout) the ticket is stale and the result is dropped.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::debug;

use agriops_auth::{Identity, Session};

/// Ticket identifying the store state an in-flight operation started from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Generation(u64);

/// Lifecycle of the active provider as seen by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    Uninitialized,
    Bootstrapping,
    Unauthenticated,
    Authenticated,
}

#[derive(Debug)]
pub struct SessionStore {
    tx: watch::Sender<Session>,
    generation: AtomicU64,
    bootstrap_started: AtomicBool,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Session::loading());
        Self {
            tx,
            generation: AtomicU64::new(0),
            bootstrap_started: AtomicBool::new(false),
        }
    }

    /// Current session (a complete snapshot).
    pub fn snapshot(&self) -> Session {
        self.tx.borrow().clone()
    }

    pub fn current_user(&self) -> Option<Identity> {
        self.tx.borrow().identity().cloned()
    }

    /// Receiver notified on every session change.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> ProviderState {
        let session = self.tx.borrow();
        if session.is_loading() {
            if self.bootstrap_started.load(Ordering::Acquire) {
                ProviderState::Bootstrapping
            } else {
                ProviderState::Uninitialized
            }
        } else if session.is_authenticated() {
            ProviderState::Authenticated
        } else {
            ProviderState::Unauthenticated
        }
    }

    pub fn generation(&self) -> Generation {
        Generation(self.generation.load(Ordering::Acquire))
    }

    /// Start of an in-flight operation whose result may be superseded.
    pub(crate) fn begin(&self) -> Generation {
        self.generation()
    }

    /// Mark the provider as bootstrapping and take a ticket for the restore.
    pub(crate) fn begin_bootstrap(&self) -> Generation {
        self.bootstrap_started.store(true, Ordering::Release);
        self.begin()
    }

    pub(crate) fn is_current(&self, ticket: Generation) -> bool {
        self.generation() == ticket
    }

    /// Apply the result of an in-flight operation unless it has been superseded.
    pub(crate) fn commit(&self, ticket: Generation, session: Session) -> bool {
        let applied = self
            .generation
            .compare_exchange(ticket.0, ticket.0 + 1, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();

        if applied {
            self.tx.send_replace(session);
        } else {
            debug!(?ticket, current = ?self.generation(), "discarding stale session update");
        }
        applied
    }

    /// Authoritative write (login completion, logout). Supersedes any ticket.
    pub(crate) fn replace(&self, session: Session) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.tx.send_replace(session);
    }
}
