//! Header digest items and block author hints
//!
//! Digest logs arrive from `chain_getBlock` as SCALE-encoded `DigestItem`
//! hex strings:
//! - First byte: variant discriminant (0x06 = PreRuntime, 0x05 = Seal, ...)
//! - Engine-tagged variants: 4-byte engine id, then a compact-length payload
//!
//! Example AURA pre-runtime entry: "0x066175726120778c911100000000"

use super::scale::{bytes_to_hex, hex_to_bytes, ScaleReader};
use super::DecodeError;

pub type EngineId = [u8; 4];

pub const AURA_ENGINE_ID: EngineId = *b"aura";
pub const BABE_ENGINE_ID: EngineId = *b"BABE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestItem {
    Other(Vec<u8>),
    /// Legacy variant, payload kept undecoded
    AuthoritiesChange(Vec<u8>),
    /// Legacy variant, payload kept undecoded
    ChangesTrieRoot(Vec<u8>),
    /// Legacy variant, payload kept undecoded
    SealV0(Vec<u8>),
    Consensus(EngineId, Vec<u8>),
    Seal(EngineId, Vec<u8>),
    PreRuntime(EngineId, Vec<u8>),
    /// Legacy variant, payload kept undecoded
    ChangesTrieSignal(Vec<u8>),
    RuntimeEnvironmentUpdated,
    /// Discriminant this decoder does not know about, with the raw entry bytes
    Unknown(Vec<u8>),
}

impl DigestItem {
    pub fn from_hex(log: &str) -> Result<Self, DecodeError> {
        Self::decode(&hex_to_bytes(log)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = ScaleReader::new(bytes);
        let item = match reader.read_u8()? {
            0 => DigestItem::Other(reader.read_bytes()?.to_vec()),
            1 => DigestItem::AuthoritiesChange(reader.rest().to_vec()),
            2 => DigestItem::ChangesTrieRoot(reader.rest().to_vec()),
            3 => DigestItem::SealV0(reader.rest().to_vec()),
            4 => {
                let engine = reader.read_array::<4>()?;
                DigestItem::Consensus(engine, reader.read_bytes()?.to_vec())
            }
            5 => {
                let engine = reader.read_array::<4>()?;
                DigestItem::Seal(engine, reader.read_bytes()?.to_vec())
            }
            6 => {
                let engine = reader.read_array::<4>()?;
                DigestItem::PreRuntime(engine, reader.read_bytes()?.to_vec())
            }
            7 => DigestItem::ChangesTrieSignal(reader.rest().to_vec()),
            8 => DigestItem::RuntimeEnvironmentUpdated,
            _ => DigestItem::Unknown(bytes.to_vec()),
        };
        Ok(item)
    }

    /// Variant name as stored in the `logs.log_type` column
    pub fn type_name(&self) -> &'static str {
        match self {
            DigestItem::Other(_) => "Other",
            DigestItem::AuthoritiesChange(_) => "AuthoritiesChange",
            DigestItem::ChangesTrieRoot(_) => "ChangesTrieRoot",
            DigestItem::SealV0(_) => "SealV0",
            DigestItem::Consensus(..) => "Consensus",
            DigestItem::Seal(..) => "Seal",
            DigestItem::PreRuntime(..) => "PreRuntime",
            DigestItem::ChangesTrieSignal(_) => "ChangesTrieSignal",
            DigestItem::RuntimeEnvironmentUpdated => "RuntimeEnvironmentUpdated",
            DigestItem::Unknown(_) => "Unknown",
        }
    }

    pub fn engine(&self) -> Option<&EngineId> {
        match self {
            DigestItem::Consensus(engine, _)
            | DigestItem::Seal(engine, _)
            | DigestItem::PreRuntime(engine, _) => Some(engine),
            _ => None,
        }
    }

    pub fn payload(&self) -> &[u8] {
        match self {
            DigestItem::Other(data)
            | DigestItem::AuthoritiesChange(data)
            | DigestItem::ChangesTrieRoot(data)
            | DigestItem::SealV0(data)
            | DigestItem::ChangesTrieSignal(data)
            | DigestItem::Unknown(data)
            | DigestItem::Consensus(_, data)
            | DigestItem::Seal(_, data)
            | DigestItem::PreRuntime(_, data) => data,
            DigestItem::RuntimeEnvironmentUpdated => &[],
        }
    }
}

/// Render an engine id as ASCII when printable ("BABE", "aura", "FRNK"), hex otherwise
pub fn engine_to_string(engine: &EngineId) -> String {
    if engine.iter().all(|b| b.is_ascii_graphic()) {
        engine.iter().map(|&b| b as char).collect()
    } else {
        bytes_to_hex(engine)
    }
}

/// What a pre-runtime digest tells us about the block author
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorHint {
    /// AURA: author is `validators[slot % validators.len()]`
    Slot(u64),
    /// BABE: the digest names the authority index directly
    AuthorityIndex(u32),
}

/// Find the first pre-runtime entry that identifies the block author
pub fn extract_author_hint(items: &[DigestItem]) -> Option<AuthorHint> {
    items.iter().find_map(|item| match item {
        DigestItem::PreRuntime(engine, data) if *engine == AURA_ENGINE_ID => {
            ScaleReader::new(data).read_u64().ok().map(AuthorHint::Slot)
        }
        DigestItem::PreRuntime(engine, data) if *engine == BABE_ENGINE_ID => {
            // BABE PreDigest: variant byte (1 primary, 2 secondary plain,
            // 3 secondary VRF), authority_index u32, slot u64, ...
            let mut reader = ScaleReader::new(data);
            match reader.read_u8().ok()? {
                1..=3 => reader.read_u32().ok().map(AuthorHint::AuthorityIndex),
                _ => None,
            }
        }
        _ => None,
    })
}

/// Resolve the block author against the session's ordered validator set
pub fn resolve_author(items: &[DigestItem], validators: &[String]) -> Option<String> {
    if validators.is_empty() {
        return None;
    }

    let index = match extract_author_hint(items)? {
        AuthorHint::Slot(slot) => (slot % validators.len() as u64) as usize,
        AuthorHint::AuthorityIndex(index) => index as usize,
    };
    validators.get(index).cloned()
}
