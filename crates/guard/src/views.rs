//! Views the guard renders in place of the protected content.

use crate::guard::Denial;

/// Default forbidden view. Hosts convert it into their own view type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDenied {
    pub denial: Denial,
}

impl AccessDenied {
    pub fn title(&self) -> &'static str {
        "Access denied"
    }

    pub fn message(&self) -> String {
        format!("You do not have access to this page: {}.", self.denial)
    }
}

/// Caller-supplied views for the non-`Allowed` states.
#[derive(Debug, Clone)]
pub struct GuardViews<V> {
    fallback: V,
    forbidden: Option<V>,
}

impl<V: Clone + From<AccessDenied>> GuardViews<V> {
    /// `fallback` is shown while checking and while redirecting to login.
    pub fn new(fallback: V) -> Self {
        Self {
            fallback,
            forbidden: None,
        }
    }

    /// Replace the default [`AccessDenied`] view.
    pub fn with_forbidden(mut self, view: V) -> Self {
        self.forbidden = Some(view);
        self
    }

    pub fn fallback(&self) -> V {
        self.fallback.clone()
    }

    pub fn forbidden(&self, denial: &Denial) -> V {
        match &self.forbidden {
            Some(view) => view.clone(),
            None => V::from(AccessDenied {
                denial: denial.clone(),
            }),
        }
    }
}
