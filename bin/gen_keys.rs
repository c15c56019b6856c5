use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use chx_workload::{
    bls::BlsCrypto, write_wallets, CryptoProvider, PrivateKey, Provisioner, RandomProvisioner,
};

/// Write fresh wallets to a CSV file usable with `--wallets-file`.
#[derive(Debug, Parser)]
struct CliOpts {
    /// Output file.
    #[clap(long, default_value = "wallets.csv")]
    pub out: PathBuf,
    /// Number of wallets to generate.
    #[clap(long, default_value = "100")]
    pub count: usize,
    /// Seed for reproducible wallets.
    #[clap(long)]
    pub seed: Option<u64>,
    /// Print the address of this private key instead of generating wallets.
    #[clap(long, conflicts_with_all = ["out", "count", "seed"])]
    pub address_of: Option<PrivateKey>,
}

fn main() -> eyre::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();
    let opts = CliOpts::parse();

    if let Some(key) = opts.address_of {
        println!("{}", BlsCrypto.address_from_private_key(&key)?);
        return Ok(())
    }

    let wallets = RandomProvisioner::new(opts.seed).provision(&BlsCrypto, opts.count)?;
    write_wallets(&opts.out, &wallets)?;
    info!(count = wallets.len(), out = %opts.out.display(), "Wrote wallets");

    Ok(())
}
