//! Authentication context of a write request.
//!
//! The identity is supplied by the caller (the auth layer in front of the
//! store) and is read-only for the duration of an evaluation.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::FieldValue;

/// An authenticated identity: the user id plus arbitrary token claims.
///
/// In JSON the claims sit next to `uid`:
/// `{"uid": "alice", "email_verified": true}`. A token may carry claims
/// without a `uid`; such a request is authenticated but owns nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Authenticated user ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    /// Token claims other than `uid`.
    #[serde(flatten)]
    pub token: IndexMap<String, FieldValue>,
}

/// The (possibly absent) identity behind a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthContext {
    identity: Option<Identity>,
}

impl AuthContext {
    /// A request with no signed-in user.
    #[must_use]
    pub fn unauthenticated() -> Self {
        Self { identity: None }
    }

    /// A request signed in as `uid` with no extra claims.
    #[must_use]
    pub fn authenticated(uid: impl Into<String>) -> Self {
        Self {
            identity: Some(Identity {
                uid: Some(uid.into()),
                token: IndexMap::new(),
            }),
        }
    }

    /// Add a token claim. Has no effect on an unauthenticated context.
    #[must_use]
    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        if let Some(identity) = self.identity.as_mut() {
            identity.token.insert(name.into(), value.into());
        }
        self
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        self.identity.as_ref().and_then(|i| i.uid.as_deref())
    }

    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&FieldValue> {
        self.identity.as_ref().and_then(|i| i.token.get(name))
    }
}
