use thiserror::Error;

#[derive(Debug, Error)]
pub enum AttestationPoolError {
    #[error(
        "Attestation target epoch {target_epoch} is older than the lowest permissible epoch {lowest_permissible_epoch}"
    )]
    StaleAttestation {
        target_epoch: u64,
        lowest_permissible_epoch: u64,
    },
    #[error(transparent)]
    Aggregation(#[from] anyhow::Error),
}
