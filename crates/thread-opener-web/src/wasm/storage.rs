#![forbid(unsafe_code)]

//! `sessionStorage` as the handoff store.

use thread_opener_core::HostError;
use thread_opener_core::handoff::EphemeralStore;
use web_sys::{Storage, Window};

/// Tab-scoped storage shared by the chat page and its same-origin panels.
#[derive(Debug, Clone)]
pub(crate) struct SessionStore {
    storage: Option<Storage>,
}

impl SessionStore {
    pub(crate) fn new(window: &Window) -> Self {
        Self {
            storage: window.session_storage().ok().flatten(),
        }
    }
}

impl EphemeralStore for SessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.storage.as_ref()?.get_item(key).ok().flatten()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), HostError> {
        let storage = self.storage.as_ref().ok_or_else(|| {
            HostError::StorageUnavailable("sessionStorage is not available".to_owned())
        })?;
        storage
            .set_item(key, value)
            .map_err(|err| HostError::StorageUnavailable(format!("{err:?}")))
    }

    fn remove(&mut self, key: &str) {
        if let Some(storage) = &self.storage {
            let _ = storage.remove_item(key);
        }
    }
}
