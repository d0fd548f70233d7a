//! Carrier backed by environment variables.
//!
//! Environment variable names allow a narrower character set than carrier
//! keys do, so keys are transcoded before being stored under a fixed name
//! prefix. The environment itself sits behind the [`EnvStore`] trait: the
//! real process environment is one backing, an in-memory map usable for
//! hermetic tests or for assembling a child process environment is another.

use opentelemetry::{
    global,
    propagation::{Extractor, Injector, PropagationError},
};
use thiserror::Error;

/// Prefix attached to carrier key names to store them in an environment.
///
/// Exactly one `_` separates the prefix from the encoded key.
pub const ENV_CARRIER_PREFIX: &str = "OTELTEXTMAP_";

/// A carrier key contains a character that the key encoding cannot represent
/// in an environment variable name.
///
/// This is a configuration bug at the call site, not a runtime transient.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot encode character {ch:?} of carrier key {key:?} for the environment")]
pub struct EnvKeyError {
    key: String,
    ch: char,
}

/// How carrier keys map to environment variable names under the prefix.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum KeyEncoding {
    /// ASCII letters pass through uppercased and `-` maps to `_` (both ways,
    /// bijectively); any other character is an [`EnvKeyError`].
    #[default]
    Strict,
    /// The key is used verbatim as the name suffix, with no character-set
    /// guarantees. Trades format safety for simplicity.
    Verbatim,
}

impl KeyEncoding {
    /// Encode a carrier key into an environment variable name suffix.
    pub fn encode(&self, key: &str) -> Result<String, EnvKeyError> {
        match self {
            KeyEncoding::Strict => transcode(key, '-', '_'),
            KeyEncoding::Verbatim => Ok(key.to_owned()),
        }
    }

    /// Decode an environment variable name suffix back into a carrier key.
    pub fn decode(&self, suffix: &str) -> Result<String, EnvKeyError> {
        match self {
            KeyEncoding::Strict => transcode(suffix, '_', '-'),
            KeyEncoding::Verbatim => Ok(suffix.to_owned()),
        }
    }
}

fn transcode(s: &str, special_in: char, special_out: char) -> Result<String, EnvKeyError> {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if ch == special_in {
            out.push(special_out);
        } else if ch.is_ascii_alphabetic() {
            out.push(ch.to_ascii_uppercase());
        } else {
            return Err(EnvKeyError {
                key: s.to_owned(),
                ch,
            });
        }
    }
    Ok(out)
}

/// A named string store with environment-variable semantics.
pub trait EnvStore {
    /// Look up a variable by its full name.
    fn get(&self, name: &str) -> Option<String>;

    /// Create or overwrite a variable.
    fn set(&mut self, name: &str, value: String);

    /// All variables currently present.
    fn entries(&self) -> Vec<(String, String)>;
}

/// The process-wide environment. Mutations are visible to the whole process
/// and to children spawned afterwards.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl EnvStore for ProcessEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn set(&mut self, name: &str, value: String) {
        std::env::set_var(name, value);
    }

    fn entries(&self) -> Vec<(String, String)> {
        std::env::vars().collect()
    }
}

/// An in-memory environment, used for hermetic tests and for assembling the
/// environment of a child process without touching the parent's.
#[derive(Clone, Debug, Default)]
pub struct MapEnv {
    vars: Vec<(String, String)>,
}

impl MapEnv {
    /// Create an empty environment.
    pub fn new() -> Self {
        MapEnv::default()
    }

    /// Render the contents as `NAME=value` lines, suitable for handing to a
    /// child process spawner.
    pub fn environ(&self) -> Vec<String> {
        self.vars
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect()
    }
}

impl EnvStore for MapEnv {
    fn get(&self, name: &str) -> Option<String> {
        self.vars
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn set(&mut self, name: &str, value: String) {
        match self.vars.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value,
            None => self.vars.push((name.to_owned(), value)),
        }
    }

    fn entries(&self) -> Vec<(String, String)> {
        self.vars.clone()
    }
}

/// Carrier that stores context under [`ENV_CARRIER_PREFIX`]-prefixed names in
/// an [`EnvStore`].
///
/// The carrier snapshots the store when constructed; it represents one
/// environment at one point in time. `get` and `keys` read the snapshot,
/// `set` writes through to the store and updates the snapshot, so a `set`
/// followed by a `get` of the same key observes the written value.
///
/// Key lookups are normalized through the encoding: under
/// [`KeyEncoding::Strict`], `get("uber-trace-id")` and `get("UBER-TRACE-ID")`
/// address the same variable.
#[derive(Debug)]
pub struct EnvCarrier<S = ProcessEnv> {
    store: S,
    encoding: KeyEncoding,
    entries: Vec<(String, String)>,
}

impl EnvCarrier<ProcessEnv> {
    /// Carrier over the process environment with strict key encoding.
    pub fn from_process_env() -> Self {
        EnvCarrier::with_store(ProcessEnv, KeyEncoding::Strict)
    }
}

impl<S: EnvStore> EnvCarrier<S> {
    /// Carrier over `store`, snapshotting its current contents.
    ///
    /// Prefixed names that fail to reverse-transcode are skipped: they cannot
    /// have been written through `set`, so they carry no context.
    pub fn with_store(store: S, encoding: KeyEncoding) -> Self {
        let mut entries = Vec::new();
        for (name, value) in store.entries() {
            let suffix = match name.strip_prefix(ENV_CARRIER_PREFIX) {
                Some(suffix) if !suffix.is_empty() => suffix,
                _ => continue,
            };
            if let Ok(key) = encoding.decode(suffix) {
                entries.push((key, value));
            }
        }
        EnvCarrier {
            store,
            encoding,
            entries,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consume the carrier and return the store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// The normalized form a key takes after an encode/decode round trip.
    fn canonical_key(&self, key: &str) -> Result<String, EnvKeyError> {
        let encoded = self.encoding.encode(key)?;
        self.encoding.decode(&encoded)
    }

    /// Fallible lookup, reporting unencodable keys as the configuration
    /// errors they are.
    pub fn try_get(&self, key: &str) -> Result<Option<&str>, EnvKeyError> {
        let canonical = self.canonical_key(key)?;
        Ok(self
            .entries
            .iter()
            .find(|(k, _)| *k == canonical)
            .map(|(_, v)| v.as_str()))
    }

    /// Fallible write-through, reporting unencodable keys. On error no
    /// variable is written.
    pub fn try_set(&mut self, key: &str, value: String) -> Result<(), EnvKeyError> {
        let encoded = self.encoding.encode(key)?;
        let canonical = self.encoding.decode(&encoded)?;
        let name = format!("{ENV_CARRIER_PREFIX}{encoded}");
        self.store.set(&name, value.clone());
        match self.entries.iter_mut().find(|(k, _)| *k == canonical) {
            Some((_, v)) => *v = value,
            None => self.entries.push((canonical, value)),
        }
        Ok(())
    }
}

impl<S: EnvStore> Extractor for EnvCarrier<S> {
    fn get(&self, key: &str) -> Option<&str> {
        match self.try_get(key) {
            Ok(value) => value,
            Err(_) => {
                global::handle_error(global::Error::Propagation(PropagationError::extract(
                    "carrier key is not encodable as an environment variable",
                    "EnvCarrier",
                )));
                None
            }
        }
    }

    fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|(k, _)| k.as_str()).collect()
    }
}

impl<S: EnvStore> Injector for EnvCarrier<S> {
    fn set(&mut self, key: &str, value: String) {
        if self.try_set(key, value).is_err() {
            global::handle_error(global::Error::Propagation(PropagationError::inject(
                "carrier key is not encodable as an environment variable",
                "EnvCarrier",
            )));
        }
    }
}
