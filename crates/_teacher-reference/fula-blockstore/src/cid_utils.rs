//! CID (Content Identifier) utilities
//!
//! Creates content-addressed identifiers using BLAKE3

use cid::{Cid, Version};
use multihash_codetable::{Code, MultihashDigest};

/// Supported IPLD codecs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CidCodec {
    /// Raw binary data (0x55)
    Raw,
    /// DAG-CBOR (0x71)
    DagCbor,
    /// DAG-PB/Protobuf (0x70)
    DagPb,
    /// DAG-JSON (0x0129)
    DagJson,
}

impl CidCodec {
    /// Get the multicodec code
    pub fn code(&self) -> u64 {
        match self {
            CidCodec::Raw => 0x55,
            CidCodec::DagCbor => 0x71,
            CidCodec::DagPb => 0x70,
            CidCodec::DagJson => 0x0129,
        }
    }

    /// Parse from multicodec code
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0x55 => Some(CidCodec::Raw),
            0x71 => Some(CidCodec::DagCbor),
            0x70 => Some(CidCodec::DagPb),
            0x0129 => Some(CidCodec::DagJson),
            _ => None,
        }
    }

    /// Get a human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            CidCodec::Raw => "raw",
            CidCodec::DagCbor => "dag-cbor",
            CidCodec::DagPb => "dag-pb",
            CidCodec::DagJson => "dag-json",
        }
    }
}

impl Default for CidCodec {
    fn default() -> Self {
        CidCodec::Raw
    }
}

/// Create a CID from data using BLAKE3 hash
pub fn create_cid(data: &[u8], codec: CidCodec) -> Cid {
    // Use BLAKE3 for hashing
    let hash = blake3::hash(data);
    
    // Create multihash using blake3 code (0x1e)
    // Note: multihash crate may use different code, we use SHA2-256 for compatibility
    let multihash = Code::Sha2_256.digest(hash.as_bytes());
    
    Cid::new(Version::V1, codec.code(), multihash).expect("valid CID construction")
}

/// Create a CID with explicit hash (for when hash is pre-computed)
pub fn create_cid_from_hash(hash: &[u8; 32], codec: CidCodec) -> Cid {
    let multihash = Code::Sha2_256.digest(hash);
    Cid::new(Version::V1, codec.code(), multihash).expect("valid CID construction")
}

/// Verify that data matches a CID
pub fn verify_cid(data: &[u8], cid: &Cid) -> bool {
    let expected = create_cid(data, CidCodec::from_code(cid.codec()).unwrap_or_default());
    expected == *cid
}

/// Parse a CID from a string
pub fn parse_cid(s: &str) -> Result<Cid, crate::BlockStoreError> {
    s.parse()
        .map_err(|e: cid::Error| crate::BlockStoreError::InvalidCid(e.to_string()))
}

/// Convert a CID to a base32 string (for file names, URLs)
pub fn cid_to_base32(cid: &Cid) -> String {
    // Use the default string representation which is base32 for CIDv1
    cid.to_string()
}

/// Get the codec of a CID
pub fn get_codec(cid: &Cid) -> Option<CidCodec> {
    CidCodec::from_code(cid.codec())
}

/// Get the hash bytes from a CID
pub fn get_hash_bytes(cid: &Cid) -> Vec<u8> {
    cid.hash().digest().to_vec()
}
