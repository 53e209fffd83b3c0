use crate::{PublicKey, signature::BLSSignature};

pub trait Aggregatable<T> {
    type Error;

    /// Combines `items` into a single value. For signatures the inputs must all be over the same
    /// message for the result to verify.
    fn aggregate(items: &[&T]) -> Result<T, Self::Error>;
}

pub trait Signable {
    type Error;

    fn public_key(&self) -> Result<PublicKey, Self::Error>;

    fn sign(&self, message: &[u8]) -> Result<BLSSignature, Self::Error>;
}

pub trait Verifiable {
    type Error;

    /// Verifies a BLS signature against a public key and message.
    ///
    /// # Returns
    /// * `Ok(true)` if the signature is valid, `Ok(false)` if verification fails, or `Err` if
    ///   the signature or public key bytes do not decode
    fn verify(&self, public_key: &PublicKey, message: &[u8]) -> Result<bool, Self::Error>;

    /// Verifies the signature against a message using an aggregate of multiple public keys.
    fn fast_aggregate_verify<'a, P>(
        &self,
        public_keys: P,
        message: &[u8],
    ) -> Result<bool, Self::Error>
    where
        P: AsRef<[&'a PublicKey]>;
}
