use rand::{rngs::StdRng, SeedableRng};
use tracing::debug;

use super::{ensure_distinct, Provisioner};
use crate::{
    common::{ProvisionError, Wallet},
    primitives::CryptoProvider,
};

/// Generates fresh wallets through the crypto collaborator.
///
/// With a seed, the same sequence of wallets comes out on every run.
#[derive(Debug)]
pub struct RandomProvisioner {
    rng: StdRng,
}

impl RandomProvisioner {
    /// Create a provisioner seeded from OS entropy, or from `seed` when given.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self { rng }
    }
}

impl Provisioner for RandomProvisioner {
    fn provision(
        &mut self,
        crypto: &dyn CryptoProvider,
        count: usize,
    ) -> Result<Vec<Wallet>, ProvisionError> {
        let wallets = (0..count)
            .map(|_| crypto.generate_wallet(&mut self.rng))
            .collect::<Result<Vec<_>, _>>()?;

        ensure_distinct(&wallets)?;
        debug!(count, "Generated wallets");

        Ok(wallets)
    }
}
