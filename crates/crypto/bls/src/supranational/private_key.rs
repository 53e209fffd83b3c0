use blst::min_pk::SecretKey as BlstSecretKey;
use ssz_types::FixedVector;

use crate::{
    PrivateKey, PublicKey, constants::DST, errors::BLSError, signature::BLSSignature,
    traits::Signable,
};

impl PrivateKey {
    pub fn to_blst_secret_key(&self) -> Result<BlstSecretKey, BLSError> {
        BlstSecretKey::from_bytes(self.inner.as_slice()).map_err(|_| BLSError::InvalidPrivateKey)
    }
}

impl Signable for PrivateKey {
    type Error = BLSError;

    fn public_key(&self) -> Result<PublicKey, Self::Error> {
        PublicKey::try_from(self.to_blst_secret_key()?.sk_to_pk())
    }

    fn sign(&self, message: &[u8]) -> Result<BLSSignature, Self::Error> {
        let signature = self.to_blst_secret_key()?.sign(message, DST, &[]);
        Ok(BLSSignature {
            inner: FixedVector::new(signature.to_bytes().to_vec())
                .map_err(|_| BLSError::InvalidSignature)?,
        })
    }
}
