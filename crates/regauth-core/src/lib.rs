// Suppress pedantic doc-formatting lints crate-wide. Wire field names such as
// clusterID and accountID appear throughout the docs and read worse wrapped
// in backticks.
#![allow(clippy::doc_markdown)]

//! regauth-core - Cluster Registration Authority
//!
//! A test-double registration authority. Clusters present a bearer token and
//! a cluster ID; the authority either rejects the request or answers with a
//! stable account ID derived from the cluster ID. Registrations are recorded
//! exactly once per (token, cluster ID) pair and every later request for the
//! same pair is answered from the stored record.
//!
//! # Modules
//!
//! - [`authority`]: the registration state machine and its error taxonomy
//! - [`config`]: TOML configuration and tokens-file loading
//!
//! The HTTP transport lives in the `regauth-daemon` crate; this crate only
//! knows about request payloads and status codes.

pub mod authority;
pub mod config;

pub use authority::{
    AccountIdDeriver, ClusterRegistration, Fnv1aDeriver, RegistrationAuthority,
    RegistrationError, RegistrationKey, RegistrationOutcome, RegistrationRequest,
};
pub use config::{AuthorityConfig, ConfigError};
