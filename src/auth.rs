//! Credential lookup for request authentication.
//!
//! The coordinator never reaches into ambient storage. It queries an
//! injected [`CredentialSource`]; the provided [`SlotCredentials`] reads a
//! prioritized list of named slots from a read-only [`TokenStore`], first
//! non-empty slot wins.

use std::collections::HashMap;
use std::sync::Mutex;

/// Read-only lookup of a bearer credential.
///
/// Absence of a credential yields no Authorization header; it is not an
/// error.
pub trait CredentialSource: Send + Sync {
    /// Returns the bearer token to attach, if any.
    fn bearer_token(&self) -> Option<String>;
}

/// Read-only key-value capability over named token storage slots.
pub trait TokenStore: Send + Sync {
    /// Returns the value stored under the slot, if any.
    fn get(&self, slot: &str) -> Option<String>;
}

/// Credential source reading a prioritized list of storage slots.
///
/// Slots are consulted in order; the first slot holding a non-empty value
/// wins.
pub struct SlotCredentials<S> {
    store: S,
    slots: Vec<String>,
}

impl<S: TokenStore> SlotCredentials<S> {
    /// Create a credential source over the given store and slot priority.
    pub fn new<I, T>(store: S, slots: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            store,
            slots: slots.into_iter().map(Into::into).collect(),
        }
    }
}

impl<S: TokenStore> CredentialSource for SlotCredentials<S> {
    fn bearer_token(&self) -> Option<String> {
        self.slots
            .iter()
            .filter_map(|slot| self.store.get(slot))
            .find(|token| !token.is_empty())
    }
}

/// In-memory token store.
///
/// Suitable for composition roots that receive tokens from elsewhere, and
/// for substituting storage in tests.
#[derive(Default)]
pub struct MemoryTokenStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a token under the named slot.
    pub fn set(&self, slot: impl Into<String>, token: impl Into<String>) {
        let mut slots = self.slots.lock().unwrap();
        slots.insert(slot.into(), token.into());
    }

    /// Remove the named slot.
    pub fn unset(&self, slot: &str) {
        let mut slots = self.slots.lock().unwrap();
        slots.remove(slot);
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, slot: &str) -> Option<String> {
        let slots = self.slots.lock().unwrap();
        slots.get(slot).cloned()
    }
}

impl<S: TokenStore> TokenStore for std::sync::Arc<S> {
    fn get(&self, slot: &str) -> Option<String> {
        self.as_ref().get(slot)
    }
}
