use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use tracing::debug;

use super::{ensure_distinct, Provisioner};
use crate::{
    common::{Address, PrivateKey, ProvisionError, Wallet},
    primitives::CryptoProvider,
};

/// A wallet set read from the filesystem.
///
/// The file is a CSV with the columns `index,address,private_key`, as written by
/// [`write_wallets`]. Blank lines and lines starting with `#` are skipped.
#[derive(Debug, Clone)]
pub struct FilesystemProvisioner {
    /// The path to the wallet file.
    pub path: PathBuf,
    /// The wallets loaded from the file, in file order.
    pub wallets: Vec<Wallet>,
}

impl FilesystemProvisioner {
    /// Load the wallets from the given path.
    pub fn read_from_file(path: PathBuf) -> Result<Self, ProvisionError> {
        let file = BufReader::new(File::open(&path)?);

        let mut wallets = Vec::new();
        for (number, line) in file.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let malformed = |reason: &str| ProvisionError::Malformed {
                line: number + 1,
                reason: reason.to_owned(),
            };

            let parts: Vec<&str> = line.split(',').map(str::trim).collect();
            let [index, address, private_key] = parts.as_slice() else {
                return Err(malformed("expected 3 columns"))
            };

            index.parse::<usize>().map_err(|_| malformed("index is not a number"))?;
            let address = address.parse::<Address>()?;
            let private_key = private_key.parse::<PrivateKey>()?;

            wallets.push(Wallet { address, private_key });
        }

        Ok(Self { path, wallets })
    }
}

impl Provisioner for FilesystemProvisioner {
    fn provision(
        &mut self,
        crypto: &dyn CryptoProvider,
        count: usize,
    ) -> Result<Vec<Wallet>, ProvisionError> {
        if self.wallets.len() < count {
            return Err(ProvisionError::NotEnoughWallets {
                available: self.wallets.len(),
                needed: count,
            })
        }

        let wallets = self.wallets[..count].to_vec();
        for (line, wallet) in wallets.iter().enumerate() {
            let derived = crypto.address_from_private_key(&wallet.private_key)?;
            if derived != wallet.address {
                return Err(ProvisionError::AddressMismatch {
                    line: line + 1,
                    listed: wallet.address.clone(),
                    derived,
                })
            }
        }

        ensure_distinct(&wallets)?;
        debug!(count, path = %self.path.display(), "Loaded wallets from file");

        Ok(wallets)
    }
}

/// Write wallets as `index,address,private_key` lines.
pub fn write_wallets(path: impl AsRef<Path>, wallets: &[Wallet]) -> std::io::Result<()> {
    let mut f = BufWriter::new(File::create(path)?);

    for (i, wallet) in wallets.iter().enumerate() {
        writeln!(f, "{i},{},{}", wallet.address, wallet.private_key.expose())?;
    }

    f.into_inner().map_err(|e| e.into_error())?.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{primitives::bls::BlsCrypto, provisioner::random::RandomProvisioner};

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.csv");

        let generated = RandomProvisioner::new(Some(3)).provision(&BlsCrypto, 4).unwrap();
        write_wallets(&path, &generated).unwrap();

        let mut provisioner = FilesystemProvisioner::read_from_file(path).unwrap();
        assert_eq!(provisioner.wallets, generated);

        let first_two = provisioner.provision(&BlsCrypto, 2).unwrap();
        assert_eq!(first_two, generated[..2]);

        assert!(matches!(
            provisioner.provision(&BlsCrypto, 5),
            Err(ProvisionError::NotEnoughWallets { available: 4, needed: 5 })
        ));
    }

    #[test]
    fn test_rejects_mismatched_address() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.csv");

        let mut generated = RandomProvisioner::new(Some(3)).provision(&BlsCrypto, 2).unwrap();
        generated[1].address = generated[0].address.clone();
        write_wallets(&path, &generated).unwrap();

        let mut provisioner = FilesystemProvisioner::read_from_file(path).unwrap();
        assert!(matches!(
            provisioner.provision(&BlsCrypto, 2),
            Err(ProvisionError::AddressMismatch { line: 2, .. })
        ));
    }

    #[test]
    fn test_rejects_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallets.csv");
        std::fs::write(&path, "# index,address,private_key\n\n0,CHabc\n").unwrap();

        assert!(matches!(
            FilesystemProvisioner::read_from_file(path),
            Err(ProvisionError::Malformed { line: 3, .. })
        ));
    }
}
