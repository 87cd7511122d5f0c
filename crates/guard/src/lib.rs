//! `agriops-guard`: route guard for console pages.
//!
//! Converts the current session plus a page's access requirements into one of
//! four render outcomes. Rendering is side-effect free; the login redirect is
//! recorded as an [`Effect`] and run by [`RouteGuard::commit`].

pub mod guard;
pub mod views;

pub use guard::{Denial, Effect, GuardState, RouteGuard};
pub use views::{AccessDenied, GuardViews};
