pub mod constants;
pub mod errors;
pub mod private_key;
pub mod public_key;
pub mod signature;
pub mod traits;

#[cfg(feature = "supranational")]
pub mod supranational;

pub use private_key::PrivateKey;
pub use public_key::PublicKey;
pub use signature::BLSSignature;
