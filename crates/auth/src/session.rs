use std::sync::Arc;

use crate::Identity;

/// Snapshot of the client's current session.
///
/// `is_authenticated` is derived from the presence of an identity, so the two
/// can never disagree. Snapshots are cheap to clone (the identity is shared).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    identity: Option<Arc<Identity>>,
    is_loading: bool,
}

impl Session {
    /// Session restore in progress; nothing is trusted yet.
    pub fn loading() -> Self {
        Self {
            identity: None,
            is_loading: true,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            identity: None,
            is_loading: false,
        }
    }

    pub fn authenticated(identity: Identity) -> Self {
        Self {
            identity: Some(Arc::new(identity)),
            is_loading: false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_deref()
    }

    /// Identity usable for authorization decisions (none while loading).
    pub fn trusted_identity(&self) -> Option<&Identity> {
        if self.is_loading {
            return None;
        }
        self.identity()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::loading()
    }
}
