use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use chx_workload::{bls::BlsCrypto, Generator, PartialConfig, Preset, WorkloadConfig};

/// Generate signed CHX test transactions as executable `curl` scripts.
#[derive(Debug, Parser)]
#[command(name = "chx-workload")]
struct CliOpts {
    /// Built-in parameter set to start from.
    #[clap(long, env = "CHX_PRESET", value_enum, default_value = "dev")]
    pub preset: Preset,
    /// TOML file overriding the preset. Flags override the file.
    #[clap(long, env = "CHX_CONFIG")]
    pub config: Option<PathBuf>,
    /// Validate the configuration and exit without writing anything.
    #[clap(long)]
    pub check: bool,
    #[clap(flatten)]
    pub overrides: PartialConfig,
}

fn main() -> eyre::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();
    let opts = CliOpts::parse();

    let config = WorkloadConfig::load(opts.preset, opts.config.as_deref(), opts.overrides)?;
    let mut generator = Generator::from_config(config, BlsCrypto)?;

    if opts.check {
        info!(
            genesis_address = %generator.genesis_address(),
            config = ?generator.config(),
            "Configuration is valid"
        );
        return Ok(())
    }

    let report = generator.run()?;
    for file in &report.files {
        println!("{}", file.display());
    }

    Ok(())
}
