//! # crmcp_core
//!
//! Core domain logic for crmcp.
//!
//! Holds everything the protocol layer calls into: bearer-token claim
//! decoding, identity resolution, the three expiring credential relations used
//! by the OAuth bridge and the legacy SSE transport, the tenant/user credential
//! store, and the tenant-scoped CRM collaborator.

pub mod auth;
pub mod credentials;
pub mod crm;
pub mod ephemeral;
pub mod migrate;
pub mod uuid;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
