//! Session-scoped cache of accepted identity proofs.
//!
//! One entry per `(contract, account)` pair, stored under
//! `mint-{contract}-{account}` as `{merkle_root, nullifier_hash, proof_bytes}`
//! JSON. Persistence goes through the [`SessionStore`] port; when the store
//! fails the cache keeps working from memory for the rest of the process.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use ethers_core::types::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{FlowError, Result};
use crate::proof::IdentityProof;
use crate::types::{Address, U256};

const PROOF_TREE: &str = "proofs";

/// Byte-level key/value persistence for cached proofs.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;
}

impl<T: SessionStore + ?Sized> SessionStore for Box<T> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        (**self).set(key, value)
    }
}

impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        (**self).set(key, value)
    }
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| FlowError::Store("memory store poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| FlowError::Store("memory store poisoned".into()))?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// sled-backed store living in a session directory.
#[derive(Clone)]
pub struct SledStore {
    _db: sled::Db,
    tree: sled::Tree,
}

impl SledStore {
    /// Open (or create) the session database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_db(sled::open(path.as_ref())?)
    }

    /// A store that is deleted when dropped.
    pub fn temporary() -> Result<Self> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: sled::Db) -> Result<Self> {
        let tree = db.open_tree(PROOF_TREE)?;
        Ok(Self { _db: db, tree })
    }
}

impl SessionStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.tree.get(key.as_bytes())?.map(|value| value.to_vec()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.tree.insert(key.as_bytes(), value)?;
        self.tree.flush()?;
        Ok(())
    }
}

/// Persisted layout of a cached proof.
#[derive(Debug, Serialize, Deserialize)]
struct StoredProof {
    merkle_root: U256,
    nullifier_hash: U256,
    proof_bytes: Bytes,
}

impl From<&IdentityProof> for StoredProof {
    fn from(proof: &IdentityProof) -> Self {
        Self {
            merkle_root: proof.merkle_root(),
            nullifier_hash: proof.nullifier_hash(),
            proof_bytes: proof.proof_bytes().clone(),
        }
    }
}

impl TryFrom<StoredProof> for IdentityProof {
    type Error = FlowError;

    fn try_from(stored: StoredProof) -> Result<Self> {
        IdentityProof::new(stored.merkle_root, stored.nullifier_hash, stored.proof_bytes)
    }
}

/// Cache key for a `(contract, account)` pair.
pub fn cache_key(contract: Address, account: Address) -> String {
    format!("mint-{contract:?}-{account:?}")
}

/// The proof cache. Exclusively owns proof storage for a flow.
pub struct ProofCache<S> {
    store: S,
    /// Proofs accepted by this process; survives store failures.
    session: HashMap<String, IdentityProof>,
    degraded: bool,
}

impl<S: SessionStore> ProofCache<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            session: HashMap::new(),
            degraded: false,
        }
    }

    /// Look up the proof for `account`. Entries that no longer decode are
    /// treated as absent.
    pub fn get(&self, contract: Address, account: Address) -> Option<IdentityProof> {
        let key = cache_key(contract, account);
        if let Some(proof) = self.session.get(&key) {
            return Some(proof.clone());
        }

        let bytes = match self.store.get(&key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(err) => {
                warn!(%key, error = %err, "session store read failed");
                return None;
            }
        };

        match serde_json::from_slice::<StoredProof>(&bytes)
            .map_err(FlowError::from)
            .and_then(IdentityProof::try_from)
        {
            Ok(proof) => Some(proof),
            Err(err) => {
                warn!(%key, error = %err, "ignoring undecodable cached proof");
                None
            }
        }
    }

    /// Store `proof` for `account`, replacing any previous entry.
    pub fn set(&mut self, contract: Address, account: Address, proof: IdentityProof) {
        let key = cache_key(contract, account);
        let persisted = serde_json::to_vec(&StoredProof::from(&proof))
            .map_err(FlowError::from)
            .and_then(|bytes| self.store.set(&key, &bytes));

        match persisted {
            Ok(()) => debug!(%key, "cached identity proof"),
            Err(err) => {
                if !self.degraded {
                    warn!(%key, error = %err, "session store unavailable, keeping proofs in memory");
                }
                self.degraded = true;
            }
        }
        self.session.insert(key, proof);
    }

    /// Whether a store write has failed during this session.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::encode_proof;

    struct BrokenStore;

    impl SessionStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Err(FlowError::Store("storage disabled".into()))
        }

        fn set(&self, _key: &str, _value: &[u8]) -> Result<()> {
            Err(FlowError::Store("storage disabled".into()))
        }
    }

    fn contract() -> Address {
        Address::from_low_u64_be(0xc0ffee)
    }

    fn proof(seed: u64) -> IdentityProof {
        let words = [U256::from(seed); 8];
        IdentityProof::new(U256::from(seed + 1), U256::from(seed + 2), encode_proof(&words)).unwrap()
    }

    #[test]
    fn key_is_scoped_to_contract_and_account() {
        let key = cache_key(Address::from_low_u64_be(1), Address::from_low_u64_be(2));
        assert_eq!(
            key,
            "mint-0x0000000000000000000000000000000000000001-0x0000000000000000000000000000000000000002"
        );
    }

    #[test]
    fn proof_for_one_account_is_not_returned_for_another() {
        let mut cache = ProofCache::new(MemoryStore::new());
        let alice = Address::from_low_u64_be(1);
        let bob = Address::from_low_u64_be(2);

        cache.set(contract(), alice, proof(7));

        assert_eq!(cache.get(contract(), alice), Some(proof(7)));
        assert_eq!(cache.get(contract(), bob), None);
        assert_eq!(cache.get(Address::from_low_u64_be(9), alice), None);
    }

    #[test]
    fn new_verification_overwrites_previous_proof() {
        let mut cache = ProofCache::new(MemoryStore::new());
        let alice = Address::from_low_u64_be(1);

        cache.set(contract(), alice, proof(7));
        cache.set(contract(), alice, proof(8));

        assert_eq!(cache.get(contract(), alice), Some(proof(8)));
    }

    #[test]
    fn proofs_survive_a_new_cache_over_the_same_store() {
        let store = Arc::new(MemoryStore::new());
        let alice = Address::from_low_u64_be(1);

        let mut first = ProofCache::new(Arc::clone(&store));
        first.set(contract(), alice, proof(3));
        drop(first);

        let second = ProofCache::new(store);
        assert_eq!(second.get(contract(), alice), Some(proof(3)));
    }

    #[test]
    fn undecodable_entry_reads_as_absent() {
        let store = MemoryStore::new();
        let alice = Address::from_low_u64_be(1);
        let stored = serde_json::json!({
            "merkle_root": "0x1",
            "nullifier_hash": "0x2",
            "proof_bytes": "0xdeadbeef",
        });
        store
            .set(&cache_key(contract(), alice), stored.to_string().as_bytes())
            .unwrap();

        let cache = ProofCache::new(store);
        assert_eq!(cache.get(contract(), alice), None);
    }

    #[test]
    fn degrades_to_memory_when_store_fails() {
        let mut cache = ProofCache::new(BrokenStore);
        let alice = Address::from_low_u64_be(1);

        assert_eq!(cache.get(contract(), alice), None);
        cache.set(contract(), alice, proof(5));

        assert!(cache.is_degraded());
        assert_eq!(cache.get(contract(), alice), Some(proof(5)));
    }

    #[test]
    fn sled_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session");
        let alice = Address::from_low_u64_be(1);

        {
            let mut cache = ProofCache::new(SledStore::open(&path).unwrap());
            cache.set(contract(), alice, proof(11));
        }

        let cache = ProofCache::new(SledStore::open(&path).unwrap());
        assert_eq!(cache.get(contract(), alice), Some(proof(11)));
    }
}
