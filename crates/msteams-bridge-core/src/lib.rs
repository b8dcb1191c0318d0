//! # MS Teams Bridge Core
//!
//! Core business logic for the Microsoft Teams bridge: the webhook that lets a
//! Teams bot card resolve, ignore, or assign issues, and the account-linking
//! flow for Teams users who have not yet connected an identity.
//!
//! ## Architecture
//!
//! The core follows clean architecture principles:
//! - Business logic depends only on trait abstractions
//! - Persistence and the Bot Framework REST API are injected at runtime
//! - Every lookup that may legitimately come back empty is modelled as an
//!   explicit outcome enum rather than an error
//!
//! The request pipeline is:
//!
//! ```text
//! SignatureVerifier -> IdentityResolver -> LinkingFlow | ActionDispatcher
//! ```
//!
//! orchestrated by [`webhook::ActionWebhookProcessor`].
//!
//! ## Usage
//!
//! ```rust
//! use msteams_bridge_core::{GroupId, UserId};
//!
//! let group_id: GroupId = "42".parse().unwrap();
//! assert_eq!(group_id.as_u64(), 42);
//! assert_eq!(UserId::new(7).to_string(), "7");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod actions;
pub mod adapters;
pub mod identity;
pub mod linking;
pub mod messaging;
pub mod models;
pub mod store;
pub mod webhook;

/// Provider tag shared by Teams integrations and Teams identity providers.
pub const MSTEAMS_PROVIDER: &str = "msteams";

// ============================================================================
// Domain Identifier Types
// ============================================================================

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Create a new identifier from its numeric value
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            /// Get numeric value
            pub fn as_u64(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let id = s.trim().parse::<u64>().map_err(|_| ParseError::InvalidFormat {
                    expected: "positive integer".to_string(),
                    actual: s.to_string(),
                })?;
                Ok(Self::new(id))
            }
        }
    };
}

numeric_id!(
    /// Identifier of an installed Teams integration
    IntegrationId
);
numeric_id!(
    /// Identifier of an organization
    OrganizationId
);
numeric_id!(
    /// Identifier of an internal user account
    UserId
);
numeric_id!(
    /// Identifier of a team inside an organization
    TeamId
);
numeric_id!(
    /// Identifier of a project
    ProjectId
);
numeric_id!(
    /// Identifier of an issue group
    GroupId
);
numeric_id!(
    /// Identifier of a linked platform identity
    IdentityId
);
numeric_id!(
    /// Identifier of an identity provider namespace
    IdentityProviderId
);

// ============================================================================
// Error Types
// ============================================================================

/// Input validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    Required { field: String },

    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },
}

/// Parsing failures for identifier and string-encoded values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid format: expected {expected}, got {actual}")]
    InvalidFormat { expected: String, actual: String },
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
