//! # Authentication Module
//!
//! Credential handling for Drive API access.
//!
//! ## Overview
//!
//! - [`TokenGuard`] holds the bearer credential and refreshes it before it
//!   expires, serializing concurrent renewals
//! - [`AuthenticatedExecutor`] attaches the token to requests and recovers
//!   from a single `401` with one refresh and one reissue
//! - [`OAuthRefresher`] renews tokens through the OAuth 2.0 refresh grant
//!
//! Hosts with their own sign-in flow implement [`TokenRefresher`] instead.

pub mod error;
pub mod executor;
pub mod guard;
pub mod oauth;
pub mod types;

pub use error::{AuthError, Result};
pub use executor::AuthenticatedExecutor;
pub use guard::{TokenGuard, TOKEN_REFRESH_MARGIN};
pub use oauth::{OAuthClientConfig, OAuthRefresher, TokenRefresher};
pub use types::{Credential, RefreshedToken};
