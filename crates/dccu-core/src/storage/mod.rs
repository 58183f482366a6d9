//! Key-value persistence port.
//!
//! The local consoles keep their whole state under a handful of fixed keys
//! and rewrite the full document after every change. Anything that can load
//! and save bytes by key can back them.

mod memory;
mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CoreResult;

/// Byte-oriented key-value store.
pub trait KvStore: Send + Sync {
    /// Load the value stored under `key`.
    fn load(&self, key: &str) -> CoreResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    fn save(&self, key: &str, value: &[u8]) -> CoreResult<()>;

    /// Remove the value under `key`. Returns whether a value was present.
    fn remove(&self, key: &str) -> CoreResult<bool>;
}

/// Load a JSON document, falling back to the default on absence or corruption.
pub fn load_json<T>(store: &dyn KvStore, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let bytes = match store.load(key) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return T::default(),
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to load local state, using defaults");
            return T::default();
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, error = %e, "corrupt local state, using defaults");
            T::default()
        }
    }
}

/// Serialize a value as JSON and store it.
pub fn save_json<T: Serialize + ?Sized>(store: &dyn KvStore, key: &str, value: &T) -> CoreResult<()> {
    let bytes = serde_json::to_vec(value)?;
    store.save(key, &bytes)
}

/// Generate a short random base-36 identifier.
pub fn generate_id() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..11)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
