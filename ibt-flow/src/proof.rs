//! Identity proofs handed back by the external verifier.
//!
//! The verifier returns the proof as opaque bytes. Before the proof can be
//! passed to `mint`/`reclaim` it must ABI-decode as `uint256[8]`; a proof that
//! does not decode is rejected here and never reaches the cache or a write.

use ethers_core::abi::{self, ParamType, Token};
use ethers_core::types::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};
use crate::types::U256;

/// Number of words in a packed Semaphore proof.
pub const PROOF_WORDS: usize = 8;

/// ABI-encoded length of `uint256[8]` (static array, encoded inline).
pub const PROOF_BYTES: usize = PROOF_WORDS * 32;

/// Verification result as delivered by the verifier callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResponse {
    /// Root of the identity-commitment set the proof was generated against
    pub merkle_root: String,
    /// Per-action nullifier; one token per nullifier
    pub nullifier_hash: String,
    /// ABI-encoded `uint256[8]`, hex
    pub proof: String,
}

/// Arguments shared by the `mint` and `reclaim` writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofCall {
    pub merkle_root: U256,
    pub nullifier_hash: U256,
    pub proof: [U256; PROOF_WORDS],
}

/// An accepted identity proof. Immutable once built; always decodable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityProof {
    merkle_root: U256,
    nullifier_hash: U256,
    proof_bytes: Bytes,
    unpacked: [U256; PROOF_WORDS],
}

impl IdentityProof {
    pub fn new(merkle_root: U256, nullifier_hash: U256, proof_bytes: Bytes) -> Result<Self> {
        let unpacked = decode_proof(&proof_bytes)?;
        Ok(Self {
            merkle_root,
            nullifier_hash,
            proof_bytes,
            unpacked,
        })
    }

    /// Parse a verifier response. Hex (`0x`-prefixed) and decimal integers are accepted.
    pub fn from_response(response: &VerificationResponse) -> Result<Self> {
        let merkle_root = parse_uint("merkle_root", &response.merkle_root)?;
        let nullifier_hash = parse_uint("nullifier_hash", &response.nullifier_hash)?;
        let proof_hex = response.proof.trim();
        let proof_hex = proof_hex.strip_prefix("0x").unwrap_or(proof_hex);
        let proof_bytes = hex::decode(proof_hex)
            .map_err(|e| FlowError::ProofDecode(format!("proof is not hex: {e}")))?;
        Self::new(merkle_root, nullifier_hash, proof_bytes.into())
    }

    pub fn merkle_root(&self) -> U256 {
        self.merkle_root
    }

    pub fn nullifier_hash(&self) -> U256 {
        self.nullifier_hash
    }

    pub fn proof_bytes(&self) -> &Bytes {
        &self.proof_bytes
    }

    pub fn unpacked(&self) -> &[U256; PROOF_WORDS] {
        &self.unpacked
    }

    pub fn call(&self) -> ProofCall {
        ProofCall {
            merkle_root: self.merkle_root,
            nullifier_hash: self.nullifier_hash,
            proof: self.unpacked,
        }
    }
}

/// Decode proof bytes as `uint256[8]`.
pub fn decode_proof(bytes: &[u8]) -> Result<[U256; PROOF_WORDS]> {
    if bytes.len() != PROOF_BYTES {
        return Err(FlowError::ProofDecode(format!(
            "expected {} bytes, got {}",
            PROOF_BYTES,
            bytes.len()
        )));
    }

    let param = ParamType::FixedArray(Box::new(ParamType::Uint(256)), PROOF_WORDS);
    let mut tokens = abi::decode(&[param], bytes)
        .map_err(|e| FlowError::ProofDecode(e.to_string()))?;

    let words = match tokens.pop() {
        Some(Token::FixedArray(words)) if words.len() == PROOF_WORDS => words,
        other => {
            return Err(FlowError::ProofDecode(format!(
                "unexpected decoded shape: {other:?}"
            )))
        }
    };

    let mut unpacked = [U256::zero(); PROOF_WORDS];
    for (slot, word) in unpacked.iter_mut().zip(words) {
        *slot = word
            .into_uint()
            .ok_or_else(|| FlowError::ProofDecode("proof word is not a uint".into()))?;
    }
    Ok(unpacked)
}

/// Encode proof words the way the verifier packs them.
pub fn encode_proof(words: &[U256; PROOF_WORDS]) -> Bytes {
    let array = Token::FixedArray(words.iter().copied().map(Token::Uint).collect());
    abi::encode(&[array]).into()
}

fn parse_uint(field: &'static str, value: &str) -> Result<U256> {
    let value = value.trim();
    let parsed = match value.strip_prefix("0x") {
        Some(digits) => U256::from_str_radix(digits, 16).map_err(|e| e.to_string()),
        None => U256::from_dec_str(value).map_err(|e| e.to_string()),
    };
    parsed.map_err(|e| FlowError::ProofDecode(format!("{field}: {e}")))
}
