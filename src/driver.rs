use std::{
    fmt,
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::{
    common::{
        Address, ComposeError, CryptoError, ProvisionError, SignError, SignedEnvelope, Wallet,
    },
    composer::{compose_genesis, compose_transfer, GenesisParams, Recipients, TransferParams},
    config::{ConfigError, Layout, RecipientMode, WorkloadConfig},
    primitives::CryptoProvider,
    provisioner::{filesystem::FilesystemProvisioner, random::RandomProvisioner, Provisioner},
    render::{endpoint, render_command, PortRotation, PAUSE_MARKER},
    signer::Signer,
};

/// An error that aborts a generation run.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum GenerateError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("Provisioning error: {0}")]
    Provision(#[from] ProvisionError),
    #[error("Compose error: {0}")]
    Compose(#[from] ComposeError),
    #[error("Signing error: {0}")]
    Sign(#[from] SignError),
    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Address of the genesis sender.
    pub genesis_address: Address,
    /// Number of wallets provisioned.
    pub wallets: usize,
    /// Number of transactions signed, genesis included.
    pub transactions: usize,
    /// Scripts written, in creation order.
    pub files: Vec<PathBuf>,
}

/// An executable script being written.
struct Script {
    path: PathBuf,
    out: BufWriter<File>,
}

impl Script {
    /// Create (or truncate) the script and mark it executable.
    fn create(path: PathBuf) -> std::io::Result<Self> {
        let file = File::create(&path)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o777))?;
        }

        Ok(Self { path, out: BufWriter::new(file) })
    }

    fn append(&mut self, text: &str) -> std::io::Result<()> {
        self.out.write_all(text.as_bytes())
    }

    fn finish(mut self) -> std::io::Result<PathBuf> {
        self.out.flush()?;
        Ok(self.path)
    }
}

/// Generates a workload: provisions wallets, composes and signs the transactions
/// and writes them out as `curl` scripts.
///
/// Everything runs sequentially on the calling thread. Command order, and with it
/// the port rotation, follows nonce order exactly.
pub struct Generator<C> {
    config: WorkloadConfig,
    crypto: C,
    provisioner: Box<dyn Provisioner>,
    genesis_address: Address,
}

impl<C: fmt::Debug> fmt::Debug for Generator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("config", &self.config)
            .field("crypto", &self.crypto)
            .field("genesis_address", &self.genesis_address)
            .finish_non_exhaustive()
    }
}

impl<C: CryptoProvider> Generator<C> {
    /// Create a generator with an explicit wallet source. Fails if the config is invalid
    /// or the genesis key does not yield an address.
    pub fn new(
        config: WorkloadConfig,
        crypto: C,
        provisioner: Box<dyn Provisioner>,
    ) -> Result<Self, GenerateError> {
        config.validate()?;
        let genesis_address = crypto.address_from_private_key(&config.genesis_key)?;

        Ok(Self { config, crypto, provisioner, genesis_address })
    }

    /// Create a generator whose wallet source follows the config: the wallet file
    /// if one is set, seeded or OS randomness otherwise.
    pub fn from_config(config: WorkloadConfig, crypto: C) -> Result<Self, GenerateError> {
        config.validate()?;

        let provisioner: Box<dyn Provisioner> = match &config.wallets_file {
            Some(path) => Box::new(FilesystemProvisioner::read_from_file(path.clone())?),
            None => Box::new(RandomProvisioner::new(config.seed)),
        };

        Self::new(config, crypto, provisioner)
    }

    /// The configuration this generator runs with.
    pub fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    /// The address the genesis transaction is sent from.
    pub fn genesis_address(&self) -> &Address {
        &self.genesis_address
    }

    /// Run the whole batch. Files written before a failure are left in place.
    #[instrument(skip(self), fields(profile = ?self.config.profile, layout = ?self.config.layout))]
    pub fn run(&mut self) -> Result<Report, GenerateError> {
        let config = &self.config;
        let genesis_address = &self.genesis_address;

        fs::create_dir_all(&config.output_dir)?;

        let wallets = self.provisioner.provision(&self.crypto, config.wallet_count)?;
        info!(count = wallets.len(), "Provisioned wallets");

        let signer = Signer::new(&self.crypto, config.profile, config.network_code());
        let mut ports = PortRotation::new(config.base_port, config.port_pool)
            .ok_or(ConfigError::InvalidPorts { base: config.base_port, pool: config.port_pool })?;

        let addresses: Vec<Address> = wallets.iter().map(|w| w.address.clone()).collect();
        let genesis_tx = compose_genesis(
            genesis_address,
            &config.validators,
            &addresses,
            &GenesisParams {
                validator_stake: config.validator_stake,
                validator_deposit: config.deposit(),
                initial_balance: config.initial_balance,
                fee: config.fee,
            },
        );
        let genesis = signer.sign(&config.genesis_key, &genesis_tx)?;
        info!(%genesis_address, actions = genesis_tx.actions.len(), "Signed genesis transaction");

        let genesis_slice = std::slice::from_ref(genesis_address);
        let recipients = match config.recipients {
            RecipientMode::SharedPool => Recipients::SharedPool(&addresses),
            RecipientMode::Genesis => Recipients::Fixed(genesis_slice),
        };
        let transfer = TransferParams {
            amount: config.transfer_amount,
            actions: config.actions_per_tx,
            fee: config.fee,
        };

        let mut writer = BatchWriter { config, signer: &signer, ports: &mut ports, signed: 1 };
        let files = match config.layout {
            Layout::SingleScript => {
                writer.single_script(&genesis, &wallets, &recipients, &transfer)?
            }
            Layout::PerNode => writer.per_node(&genesis, &wallets, &recipients, &transfer)?,
        };

        let report = Report {
            genesis_address: genesis_address.clone(),
            wallets: wallets.len(),
            transactions: writer.signed,
            files,
        };
        info!(
            transactions = report.transactions,
            files = report.files.len(),
            commands = ports.invocations(),
            "Workload generated"
        );

        Ok(report)
    }
}

/// Signs transfers and appends their commands, in order.
struct BatchWriter<'a, C: ?Sized> {
    config: &'a WorkloadConfig,
    signer: &'a Signer<'a, C>,
    ports: &'a mut PortRotation,
    signed: usize,
}

impl<C: CryptoProvider + ?Sized> BatchWriter<'_, C> {
    fn command(&mut self, envelope: &SignedEnvelope) -> Result<String, GenerateError> {
        let port = self.ports.next_port();
        let url = endpoint(&self.config.host, port)?;

        Ok(render_command(&envelope.to_json()?, &url, self.config.command_format()))
    }

    fn transfer_command(
        &mut self,
        wallet: &Wallet,
        nonce: u64,
        recipients: &Recipients<'_>,
        params: &TransferParams,
    ) -> Result<String, GenerateError> {
        let tx = compose_transfer(&wallet.address, nonce, recipients, params)?;
        let envelope = self.signer.sign(&wallet.private_key, &tx)?;
        self.signed += 1;
        debug!(sender = %wallet.address, nonce, "Composed transfer");

        self.command(&envelope)
    }

    fn path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.config.output_dir.join(name)
    }

    /// Genesis, pause marker, then round by round, wallet by wallet.
    fn single_script(
        &mut self,
        genesis: &SignedEnvelope,
        wallets: &[Wallet],
        recipients: &Recipients<'_>,
        params: &TransferParams,
    ) -> Result<Vec<PathBuf>, GenerateError> {
        let mut script = Script::create(self.path(&self.config.output_file))?;
        let genesis_command = self.command(genesis)?;
        script.append(&genesis_command)?;
        if self.config.pause {
            script.append(PAUSE_MARKER)?;
        }

        for round in 0..self.config.rounds_per_wallet {
            for wallet in wallets {
                let command = self.transfer_command(wallet, round + 1, recipients, params)?;
                script.append(&command)?;
            }
            info!(round = round + 1, of = self.config.rounds_per_wallet, "Round written");
        }

        Ok(vec![script.finish()?])
    }

    /// A preparation script with the genesis command, then one run script per wallet.
    fn per_node(
        &mut self,
        genesis: &SignedEnvelope,
        wallets: &[Wallet],
        recipients: &Recipients<'_>,
        params: &TransferParams,
    ) -> Result<Vec<PathBuf>, GenerateError> {
        let mut files = Vec::with_capacity(wallets.len() + 1);

        let mut prepare = Script::create(self.path(&self.config.output_file))?;
        let genesis_command = self.command(genesis)?;
        prepare.append(&genesis_command)?;
        files.push(prepare.finish()?);

        for (i, wallet) in wallets.iter().enumerate() {
            let node = i + 1;
            let name = format!("{}.{node:03}", self.config.run_file);
            let mut script = Script::create(self.path(name))?;
            script.append(&format!("# Node: {node} / Sender: {}\n", wallet.address))?;

            for nonce in 1..=self.config.rounds_per_wallet {
                let command = self.transfer_command(wallet, nonce, recipients, params)?;
                script.append(&command)?;
            }

            files.push(script.finish()?);
            info!(node, sender = %wallet.address, "Node script written");
        }

        Ok(files)
    }
}
