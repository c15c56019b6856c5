use std::collections::HashSet;

use crate::{
    common::{ProvisionError, Wallet},
    primitives::CryptoProvider,
};

pub mod filesystem;
pub mod random;

/// A source of wallets for a generation run.
pub trait Provisioner {
    /// Produce exactly `count` wallets with pairwise distinct keys and addresses.
    /// Any failure fails the whole set.
    fn provision(
        &mut self,
        crypto: &dyn CryptoProvider,
        count: usize,
    ) -> Result<Vec<Wallet>, ProvisionError>;
}

/// Fails on the first wallet whose key or address was already seen.
pub(crate) fn ensure_distinct(wallets: &[Wallet]) -> Result<(), ProvisionError> {
    let mut keys = HashSet::with_capacity(wallets.len());
    let mut addresses = HashSet::with_capacity(wallets.len());

    for wallet in wallets {
        if !keys.insert(&wallet.private_key) || !addresses.insert(&wallet.address) {
            return Err(ProvisionError::Duplicate(wallet.address.clone()))
        }
    }

    Ok(())
}
