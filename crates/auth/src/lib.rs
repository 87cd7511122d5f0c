//! `agriops-auth`: pure authentication/authorization boundary.
//!
//! Identity model, role templates, the mock credential codec and the
//! permission evaluator. This crate is intentionally decoupled from HTTP,
//! storage and async runtimes.

pub mod authorize;
pub mod claims;
pub mod identity;
pub mod permissions;
pub mod persona;
pub mod roles;
pub mod session;
pub mod token;

pub use authorize::{
    AuthorizationExplanation, AuthzError, DenialKind, authorize, authorize_factory, explain,
    has_all, has_any, has_permission,
};
pub use claims::{IdentityClaims, TokenClaims, TokenValidationError, validate_claims};
pub use identity::{Identity, IdentityBuilder};
pub use permissions::{Permission, permission_template, permissions_for_role};
pub use persona::{Persona, PersonaCatalog};
pub use roles::Role;
pub use session::Session;
pub use token::{
    Credential, DEFAULT_TTL_SECS, INSECURE_DEV_SECRET, MOCK_AUDIENCE, MOCK_ISSUER, TokenCodec,
    TokenError, VerifiedCredential,
};
