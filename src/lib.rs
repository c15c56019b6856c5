#![doc = include_str!("../README.md")]
#![warn(missing_debug_implementations, missing_docs, rustdoc::all)]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod common;
pub use common::{
    Action, Address, Amount, AmountParseError, ComposeError, CryptoError, PrivateKey, Profile,
    ProvisionError, SignError, SignedEnvelope, Transaction, Wallet, CHX_DECIMALS, UNITS_PER_CHX,
};

mod primitives;
pub use primitives::{bls, encode64, utf8_to_hex, CryptoProvider};

pub mod composer;

mod signer;
pub use signer::Signer;

pub mod render;

mod provisioner;
pub use provisioner::{
    filesystem::{write_wallets, FilesystemProvisioner},
    random::RandomProvisioner,
    Provisioner,
};

pub mod config;
pub use config::{ConfigError, Layout, PartialConfig, Preset, RecipientMode, WorkloadConfig};

mod driver;
pub use driver::{GenerateError, Generator, Report};
