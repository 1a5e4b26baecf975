//! Cryptographic primitives: digests, keys, signatures and addresses

pub mod address;
pub mod hash;
pub mod keys;
pub mod signatures;

pub use address::{fingerprint, from_address_text, to_address_text};
pub use hash::{Hash160, Hash256, Hashable};
pub use keys::{KeyPair, PrivateKey, PublicKey};
pub use signatures::Signature;
