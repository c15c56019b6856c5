//! Workload configuration.
//!
//! A run is configured in three layers, each overriding the previous one:
//! a named [`Preset`], an optional TOML file and command line flags. The file and
//! the flags share one type, [`PartialConfig`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    common::{Address, Amount, PrivateKey, Profile},
    render::{CommandFormat, CommandStyle, PortRotation},
};

/// Built-in parameter sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// Devnet: 4 validators, 100 wallets transferring among themselves.
    #[default]
    Dev,
    /// Perfnet: one run script per node, every wallet paying the genesis address.
    Perf,
    /// The pre-network-code protocol, inline request bodies.
    Legacy,
}

/// How the generated commands are split into files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
    /// One script: genesis, optional pause, then all transfers round by round.
    #[default]
    SingleScript,
    /// A preparation script with the genesis command, plus one run script per wallet.
    PerNode,
}

/// Who receives the transfers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RecipientMode {
    /// The other generated wallets.
    #[default]
    SharedPool,
    /// The genesis address.
    Genesis,
}

/// A fully resolved workload configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadConfig {
    /// Network code signatures are bound to.
    pub network: Option<String>,
    /// Private key of the genesis sender.
    pub genesis_key: PrivateKey,
    /// Validators receiving stake in the genesis transaction.
    pub validators: Vec<Address>,
    /// Number of wallets to provision.
    pub wallet_count: usize,
    /// Number of transfers per wallet.
    pub rounds_per_wallet: u64,
    /// Number of actions per transfer transaction.
    pub actions_per_tx: usize,
    /// Fee of every transaction.
    pub fee: Amount,
    /// Stake delegated to each validator.
    pub validator_stake: Amount,
    /// Deposit transferred to each validator. Zero disables the deposit action.
    pub validator_deposit: Amount,
    /// Initial balance of each wallet.
    pub initial_balance: Amount,
    /// Total amount moved by each transfer transaction.
    pub transfer_amount: Amount,
    /// Protocol profile.
    pub profile: Profile,
    /// Output layout.
    pub layout: Layout,
    /// Transfer recipients.
    pub recipients: RecipientMode,
    /// How request bodies are passed to `curl`.
    pub style: CommandStyle,
    /// Whether `curl` runs silently.
    pub silent: bool,
    /// Host of the target nodes.
    pub host: String,
    /// First node port.
    pub base_port: u16,
    /// Number of node ports to rotate over.
    pub port_pool: u16,
    /// Whether to pause after the genesis command (single script layout).
    pub pause: bool,
    /// Directory the scripts are written to. Created if missing.
    pub output_dir: PathBuf,
    /// Single script name, or preparation script name for the per-node layout.
    pub output_file: String,
    /// Base name of the per-node run scripts.
    pub run_file: String,
    /// Seed for wallet generation.
    pub seed: Option<u64>,
    /// Load wallets from this file instead of generating them.
    pub wallets_file: Option<PathBuf>,
}

fn addresses(list: &[&str]) -> Vec<Address> {
    list.iter().map(|a| Address::new(*a)).collect()
}

fn chx(n: u64) -> Amount {
    Amount::from_units(n * crate::common::UNITS_PER_CHX)
}

/// 0.001 CHX
const DEFAULT_FEE: Amount = Amount::from_units(10_000);

impl WorkloadConfig {
    /// The parameters of a built-in preset.
    pub fn preset(preset: Preset) -> Self {
        match preset {
            Preset::Dev => Self {
                network: Some("OWN_PUBLIC_BLOCKCHAIN_DEVNET".to_owned()),
                genesis_key: PrivateKey::new("ZXXkM41yHhkzb2k5KjeWuGCzYj7AXAfJdMXqKM4TGKq"),
                validators: addresses(&[
                    "CHMf4inrS8hnPNEgJVZPRHFhsDPCHSw42Q2",
                    "CHXr1u8DvLmRrnBpVmPcEH43qBhjez6dc4N",
                    "CHN5FmdEhjKHynhdbzXxsNB35oxL559gRLH",
                    "CHStDQ5ZFeFW9rbMhw83f7FXg19okxVVScM",
                ]),
                wallet_count: 100,
                rounds_per_wallet: 10,
                actions_per_tx: 1,
                fee: DEFAULT_FEE,
                validator_stake: chx(500_000),
                validator_deposit: chx(5_000),
                initial_balance: chx(10_000),
                transfer_amount: chx(1),
                profile: Profile::Current,
                layout: Layout::SingleScript,
                recipients: RecipientMode::SharedPool,
                style: CommandStyle::Heredoc,
                silent: true,
                host: "localhost".to_owned(),
                base_port: 10701,
                port_pool: 4,
                pause: true,
                output_dir: PathBuf::from("./Output"),
                output_file: "dev_test_run.sh".to_owned(),
                run_file: "dev_test_run.sh".to_owned(),
                seed: None,
                wallets_file: None,
            },
            Preset::Perf => Self {
                network: Some("OWN_PUBLIC_BLOCKCHAIN_PERFNET".to_owned()),
                genesis_key: PrivateKey::new("5TYZaZhabnWPhqe7Tfy7ziY61JZZQH24nbf6cRhYDL6W"),
                validators: Vec::new(),
                wallet_count: 4,
                rounds_per_wallet: 1000,
                validator_deposit: Amount::ZERO,
                recipients: RecipientMode::Genesis,
                layout: Layout::PerNode,
                silent: false,
                base_port: 10717,
                port_pool: 1,
                pause: false,
                output_file: "perfnet_test_prepare.sh".to_owned(),
                run_file: "perfnet_test_run.sh".to_owned(),
                ..Self::preset(Preset::Dev)
            },
            Preset::Legacy => Self {
                network: None,
                genesis_key: PrivateKey::new("1EQKWYpFtKZ1rMTqAH8CSLVjE5TN1nPpofzWF68io1HPV"),
                validators: addresses(&[
                    "CHMf4inrS8hnPNEgJVZPRHFhsDPCHSHZfAJ",
                    "CHXr1u8DvLmRrnBpVmPcEH43qBhjezuRRtq",
                    "CHN5FmdEhjKHynhdbzXxsNB35oxL5195XE5",
                    "CHStDQ5ZFeFW9rbMhw83f7FXg19okxQD9E7",
                ]),
                validator_deposit: Amount::ZERO,
                profile: Profile::Legacy,
                recipients: RecipientMode::Genesis,
                style: CommandStyle::Inline,
                silent: false,
                output_file: "run_test.sh".to_owned(),
                run_file: "run_test.sh".to_owned(),
                ..Self::preset(Preset::Dev)
            },
        }
    }

    /// Resolve a configuration from a preset, an optional TOML file and overrides.
    pub fn load(
        preset: Preset,
        file: Option<&Path>,
        overrides: PartialConfig,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::preset(preset);
        if let Some(path) = file {
            config.apply(PartialConfig::from_toml_file(path)?);
        }
        config.apply(overrides);

        Ok(config)
    }

    /// Overwrite every field that is set in `partial`.
    pub fn apply(&mut self, partial: PartialConfig) {
        macro_rules! merge {
            ($target:expr, $source:ident; $($field:ident),* $(,)?) => {
                $(if let Some(value) = $source.$field { $target.$field = value; })*
            };
        }
        macro_rules! merge_optional {
            ($target:expr, $source:ident; $($field:ident),* $(,)?) => {
                $(if let Some(value) = $source.$field { $target.$field = Some(value); })*
            };
        }

        merge!(
            self, partial;
            genesis_key,
            validators,
            wallet_count,
            rounds_per_wallet,
            actions_per_tx,
            fee,
            validator_stake,
            validator_deposit,
            initial_balance,
            transfer_amount,
            profile,
            layout,
            recipients,
            style,
            silent,
            host,
            base_port,
            port_pool,
            pause,
            output_dir,
            output_file,
            run_file,
        );
        merge_optional!(self, partial; network, seed, wallets_file);
    }

    /// Reject configurations that cannot produce a valid workload. Runs before any I/O.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wallet_count == 0 {
            return Err(ConfigError::Zero("walletCount"))
        }
        if self.rounds_per_wallet == 0 {
            return Err(ConfigError::Zero("roundsPerWallet"))
        }
        if self.actions_per_tx == 0 {
            return Err(ConfigError::Zero("actionsPerTx"))
        }
        if self.transfer_amount.is_zero() {
            return Err(ConfigError::Zero("transferAmount"))
        }
        let Ok(shares) = self.transfer_amount.split(self.actions_per_tx) else {
            return Err(ConfigError::AmountTooSmall {
                amount: self.transfer_amount,
                actions: self.actions_per_tx,
            })
        };
        let amounts = [
            ("fee", self.fee),
            ("validatorStake", self.validator_stake),
            ("validatorDeposit", self.validator_deposit),
            ("initialBalance", self.initial_balance),
            ("transferAmount", self.transfer_amount),
        ];
        let shares = shares.into_iter().map(|share| ("transferAmount", share));
        if let Some((field, amount)) =
            amounts.into_iter().chain(shares).find(|(_, amount)| !amount.is_json_exact())
        {
            return Err(ConfigError::Inexact { field, amount })
        }
        if self.genesis_key.expose().trim().is_empty() {
            return Err(ConfigError::Missing("genesisKey"))
        }
        if self.profile.binds_network() && self.network.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::Missing("network"))
        }
        if self.recipients == RecipientMode::SharedPool && self.wallet_count < 2 {
            return Err(ConfigError::PoolTooSmall(self.wallet_count))
        }
        if PortRotation::new(self.base_port, self.port_pool).is_none() {
            return Err(ConfigError::InvalidPorts { base: self.base_port, pool: self.port_pool })
        }
        if self.host.is_empty() || crate::render::endpoint(&self.host, self.base_port).is_err() {
            return Err(ConfigError::InvalidHost(self.host.clone()))
        }
        if self.output_file.is_empty() {
            return Err(ConfigError::Missing("outputFile"))
        }
        if self.layout == Layout::PerNode && self.run_file.is_empty() {
            return Err(ConfigError::Missing("runFile"))
        }
        self.genesis_total().ok_or(ConfigError::Overflow)?;

        Ok(())
    }

    /// Total amount moved by the genesis transaction, or `None` on overflow.
    pub fn genesis_total(&self) -> Option<Amount> {
        let validators = self.validators.len() as u64;
        let per_validator = self.validator_stake.checked_add(self.validator_deposit)?;

        per_validator
            .checked_mul(validators)?
            .checked_add(self.initial_balance.checked_mul(self.wallet_count as u64)?)
    }

    /// The deposit action amount, if deposits are enabled.
    pub fn deposit(&self) -> Option<Amount> {
        (!self.validator_deposit.is_zero()).then_some(self.validator_deposit)
    }

    /// The command shape for this configuration.
    pub fn command_format(&self) -> CommandFormat {
        CommandFormat { style: self.style, silent: self.silent }
    }

    /// The network code passed to the signer.
    pub fn network_code(&self) -> Option<&str> {
        self.network.as_deref()
    }
}

/// A partial configuration, read from a TOML file or from command line flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, clap::Args)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct PartialConfig {
    /// Network code signatures are bound to.
    #[arg(long, env = "CHX_NETWORK")]
    pub network: Option<String>,
    /// Private key of the genesis sender (base58).
    #[arg(long, env = "CHX_GENESIS_KEY", hide_env_values = true)]
    pub genesis_key: Option<PrivateKey>,
    /// Comma separated validator addresses.
    #[arg(long, env = "CHX_VALIDATORS", value_delimiter = ',')]
    pub validators: Option<Vec<Address>>,
    /// Number of wallets to provision.
    #[arg(long, env = "CHX_WALLET_COUNT")]
    pub wallet_count: Option<usize>,
    /// Number of transfers per wallet.
    #[arg(long, env = "CHX_ROUNDS_PER_WALLET")]
    pub rounds_per_wallet: Option<u64>,
    /// Number of actions per transfer transaction.
    #[arg(long, env = "CHX_ACTIONS_PER_TX")]
    pub actions_per_tx: Option<usize>,
    /// Fee of every transaction.
    #[arg(long, env = "CHX_FEE")]
    pub fee: Option<Amount>,
    /// Stake delegated to each validator.
    #[arg(long)]
    pub validator_stake: Option<Amount>,
    /// Deposit transferred to each validator, 0 to disable.
    #[arg(long)]
    pub validator_deposit: Option<Amount>,
    /// Initial balance of each wallet.
    #[arg(long)]
    pub initial_balance: Option<Amount>,
    /// Total amount moved by each transfer transaction.
    #[arg(long)]
    pub transfer_amount: Option<Amount>,
    /// Protocol profile.
    #[arg(long, value_enum)]
    pub profile: Option<Profile>,
    /// Output layout.
    #[arg(long, value_enum)]
    pub layout: Option<Layout>,
    /// Transfer recipients.
    #[arg(long, value_enum)]
    pub recipients: Option<RecipientMode>,
    /// How request bodies are passed to curl.
    #[arg(long, value_enum)]
    pub style: Option<CommandStyle>,
    /// Run curl with -s.
    #[arg(long, action = clap::ArgAction::Set)]
    pub silent: Option<bool>,
    /// Host of the target nodes.
    #[arg(long, env = "CHX_HOST")]
    pub host: Option<String>,
    /// First node port.
    #[arg(long, env = "CHX_BASE_PORT")]
    pub base_port: Option<u16>,
    /// Number of node ports to rotate over.
    #[arg(long, env = "CHX_PORT_POOL")]
    pub port_pool: Option<u16>,
    /// Pause after the genesis command.
    #[arg(long, action = clap::ArgAction::Set)]
    pub pause: Option<bool>,
    /// Output directory.
    #[arg(long, env = "CHX_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,
    /// Script file name.
    #[arg(long)]
    pub output_file: Option<String>,
    /// Per-node run script base name.
    #[arg(long)]
    pub run_file: Option<String>,
    /// Seed for wallet generation.
    #[arg(long, env = "CHX_SEED")]
    pub seed: Option<u64>,
    /// Load wallets from a CSV file written by `gen_keys`.
    #[arg(long, env = "CHX_WALLETS_FILE")]
    pub wallets_file: Option<PathBuf>,
}

impl PartialConfig {
    /// Parse a TOML configuration file.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_owned(), source })?;

        toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// An invalid or unreadable configuration.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("Failed to parse config file: {0}")]
    Parse(String),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("Transfer amount {amount} cannot be split into {actions} non-zero actions")]
    AmountTooSmall { amount: Amount, actions: usize },
    #[error("Shared-pool transfers need at least 2 wallets, got {0}")]
    PoolTooSmall(usize),
    #[error("Invalid port range: base {base}, pool {pool}")]
    InvalidPorts { base: u16, pool: u16 },
    #[error("Invalid host {0:?}")]
    InvalidHost(String),
    #[error("Genesis amounts overflow")]
    Overflow,
    #[error("{field} {amount} has more precision than a JSON number can carry")]
    Inexact { field: &'static str, amount: Amount },
}
