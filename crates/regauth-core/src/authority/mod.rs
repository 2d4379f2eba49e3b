//! Registration authority.
//!
//! This module provides the [`RegistrationAuthority`] which handles:
//! - Cluster ID and token validation
//! - Account ID derivation
//! - Exactly-once recording of registrations per (token, cluster ID)
//!
//! # Thread Safety
//!
//! The authority is shared across request handlers behind an `Arc`. All
//! state sits behind a single `Mutex`, and the whole decision (decode,
//! validate, derive, look up, insert) runs inside one critical section. Two
//! racing requests for the same key therefore cannot both insert: the loser
//! waits for the lock and then takes the replay path.
//!
//! # Invariants
//!
//! - At most one [`ClusterRegistration`] is stored per [`RegistrationKey`],
//!   and its account ID never changes once stored.
//! - The accepted token set is fixed at construction.
//! - Account IDs depend on the cluster ID alone.

pub mod account_id;
pub mod error;
pub mod response;

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub use account_id::{AccountIdDeriver, AccountIdError, Fnv1aDeriver};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
pub use error::{ErrorBody, RegistrationError};
pub use response::{APPLICATION_JSON, json_response};
use serde::{Deserialize, Serialize};

/// A decoded registration request.
///
/// Absent fields decode as empty strings so that a missing cluster ID is
/// reported as such rather than as a malformed body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    /// Bearer token presented by the cluster.
    #[serde(rename = "authorizationToken", default)]
    pub authorization_token: String,
    /// Identifier of the cluster being registered.
    #[serde(rename = "clusterID", default)]
    pub cluster_id: String,
}

impl RegistrationRequest {
    /// Creates a request from a token and cluster ID.
    #[must_use]
    pub fn new(authorization_token: impl Into<String>, cluster_id: impl Into<String>) -> Self {
        Self {
            authorization_token: authorization_token.into(),
            cluster_id: cluster_id.into(),
        }
    }

    /// Returns the key this request registers under.
    #[must_use]
    pub fn key(&self) -> RegistrationKey {
        RegistrationKey {
            token: self.authorization_token.clone(),
            cluster_id: self.cluster_id.clone(),
        }
    }
}

/// Identity of a registration: the (token, cluster ID) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistrationKey {
    /// The authorization token.
    pub token: String,
    /// The cluster ID.
    pub cluster_id: String,
}

/// A recorded registration, returned verbatim on every replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRegistration {
    /// Account ID derived from the cluster ID.
    #[serde(rename = "accountID")]
    pub account_id: String,
    /// The token the cluster registered with.
    #[serde(rename = "authorizationToken")]
    pub authorization_token: String,
    /// The registered cluster ID.
    #[serde(rename = "clusterID")]
    pub cluster_id: String,
}

/// Result of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// First registration for the key; the record was just stored.
    Created(ClusterRegistration),
    /// The key was already registered; the stored record is returned.
    Replayed(ClusterRegistration),
}

impl RegistrationOutcome {
    /// Returns 201 Created for a new registration, 200 OK for a replay.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Created(_) => StatusCode::CREATED,
            Self::Replayed(_) => StatusCode::OK,
        }
    }

    /// Returns the registration record.
    #[must_use]
    pub const fn registration(&self) -> &ClusterRegistration {
        match self {
            Self::Created(registration) | Self::Replayed(registration) => registration,
        }
    }

    /// Splits the outcome into the record and its status code.
    #[must_use]
    pub fn into_parts(self) -> (ClusterRegistration, StatusCode) {
        let status = self.status_code();
        match self {
            Self::Created(registration) | Self::Replayed(registration) => (registration, status),
        }
    }
}

impl IntoResponse for RegistrationOutcome {
    fn into_response(self) -> Response {
        let (registration, status) = self.into_parts();
        json_response(status, &registration)
    }
}

/// State guarded by the authority lock.
struct AuthorityState {
    accepted_tokens: HashSet<String>,
    // Append-only.
    registrations: HashMap<RegistrationKey, ClusterRegistration>,
}

/// Decides registration requests and remembers what it granted.
///
/// # Example
///
/// ```rust
/// use regauth_core::{RegistrationAuthority, RegistrationOutcome, RegistrationRequest};
///
/// let authority = RegistrationAuthority::new(["abc"]);
///
/// let first = authority
///     .register(RegistrationRequest::new("abc", "cluster-1"))
///     .unwrap();
/// assert!(matches!(first, RegistrationOutcome::Created(_)));
///
/// let again = authority
///     .register(RegistrationRequest::new("abc", "cluster-1"))
///     .unwrap();
/// assert!(matches!(again, RegistrationOutcome::Replayed(_)));
/// assert_eq!(first.registration(), again.registration());
/// ```
pub struct RegistrationAuthority {
    state: Mutex<AuthorityState>,
    deriver: Arc<dyn AccountIdDeriver>,
}

impl RegistrationAuthority {
    /// Creates an authority accepting `tokens`, deriving account IDs with
    /// [`Fnv1aDeriver`].
    #[must_use]
    pub fn new<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::with_deriver(tokens, Arc::new(Fnv1aDeriver))
    }

    /// Creates an authority with a custom account ID deriver.
    #[must_use]
    pub fn with_deriver<I, T>(tokens: I, deriver: Arc<dyn AccountIdDeriver>) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            state: Mutex::new(AuthorityState {
                accepted_tokens: tokens.into_iter().map(Into::into).collect(),
                registrations: HashMap::new(),
            }),
            deriver,
        }
    }

    /// Decodes a JSON payload and registers it.
    ///
    /// Decoding happens under the authority lock together with the rest of
    /// the decision. Only the first JSON value is read; anything after it is
    /// ignored.
    ///
    /// # Errors
    ///
    /// - `RegistrationError::InvalidBody` if the payload is not a valid
    ///   registration request
    /// - any error [`register`](Self::register) returns
    pub fn register_payload(
        &self,
        payload: &[u8],
    ) -> Result<RegistrationOutcome, RegistrationError> {
        let mut state = self.lock_state();
        let request = decode_first_request(payload).map_err(|detail| {
            tracing::warn!(error = %detail, "rejecting registration: malformed body");
            RegistrationError::InvalidBody(detail)
        })?;
        self.decide(&mut state, request)
    }

    /// Registers a decoded request.
    ///
    /// Checks run in order and the first failure wins: empty cluster ID,
    /// unknown token, account ID derivation. A request whose key is already
    /// registered gets the stored record back as
    /// [`RegistrationOutcome::Replayed`].
    ///
    /// # Errors
    ///
    /// - `RegistrationError::MissingClusterId` if the cluster ID is empty
    /// - `RegistrationError::NotAuthorized` if the token is not accepted
    /// - `RegistrationError::HashingFailed` if the account ID cannot be
    ///   derived
    pub fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        let mut state = self.lock_state();
        self.decide(&mut state, request)
    }

    /// Returns the stored registration for `key`, if any.
    #[must_use]
    pub fn lookup(&self, key: &RegistrationKey) -> Option<ClusterRegistration> {
        self.lock_state().registrations.get(key).cloned()
    }

    /// Returns the number of stored registrations.
    #[must_use]
    pub fn registration_count(&self) -> usize {
        self.lock_state().registrations.len()
    }

    /// Returns the number of accepted tokens.
    #[must_use]
    pub fn accepted_token_count(&self) -> usize {
        self.lock_state().accepted_tokens.len()
    }

    fn decide(
        &self,
        state: &mut AuthorityState,
        request: RegistrationRequest,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        if request.cluster_id.is_empty() {
            tracing::warn!("rejecting registration: no cluster ID provided");
            return Err(RegistrationError::MissingClusterId);
        }

        if !state.accepted_tokens.contains(&request.authorization_token) {
            tracing::warn!(
                cluster_id = %request.cluster_id,
                "rejecting registration: token not recognized"
            );
            return Err(RegistrationError::NotAuthorized);
        }

        let account_id = self.deriver.derive(&request.cluster_id).map_err(|e| {
            tracing::error!(
                cluster_id = %request.cluster_id,
                error = %e,
                "hashing cluster ID failed"
            );
            RegistrationError::HashingFailed(e)
        })?;

        match state.registrations.entry(request.key()) {
            Entry::Occupied(entry) => {
                let registration = entry.get().clone();
                tracing::debug!(
                    cluster_id = %registration.cluster_id,
                    account_id = %registration.account_id,
                    "cluster already registered, replaying stored registration"
                );
                Ok(RegistrationOutcome::Replayed(registration))
            },
            Entry::Vacant(entry) => {
                let registration = ClusterRegistration {
                    account_id,
                    authorization_token: request.authorization_token,
                    cluster_id: request.cluster_id,
                };
                entry.insert(registration.clone());
                tracing::info!(
                    cluster_id = %registration.cluster_id,
                    account_id = %registration.account_id,
                    "cluster registered"
                );
                Ok(RegistrationOutcome::Created(registration))
            },
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, AuthorityState> {
        // Entries are inserted whole, so a poisoned map is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Decodes the first JSON value in `payload` as a request.
fn decode_first_request(payload: &[u8]) -> Result<RegistrationRequest, String> {
    match serde_json::Deserializer::from_slice(payload)
        .into_iter::<RegistrationRequest>()
        .next()
    {
        Some(Ok(request)) => Ok(request),
        Some(Err(e)) => Err(e.to_string()),
        None => Err("EOF".to_string()),
    }
}

impl fmt::Debug for RegistrationAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();
        f.debug_struct("RegistrationAuthority")
            .field("accepted_tokens", &state.accepted_tokens.len())
            .field("registrations", &state.registrations.len())
            .finish_non_exhaustive()
    }
}
