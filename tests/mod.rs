use std::collections::HashMap;

use tracing::info;

mod utils;
use utils::{read_commands, small_config};

use chx_workload::{
    bls::BlsCrypto, utf8_to_hex, write_wallets, Action, Address, Amount, ConfigError,
    CryptoError, CryptoProvider, GenerateError, Generator, Layout, Preset, PrivateKey, Profile,
    ProvisionError, Provisioner, RandomProvisioner, RecipientMode, WorkloadConfig,
};

#[test]
fn test_two_wallets_one_round() -> eyre::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();
    let dir = tempfile::tempdir()?;

    let config = small_config(Preset::Dev, dir.path());
    let report = Generator::from_config(config, BlsCrypto)?.run()?;
    info!(?report, "Generated workload");

    assert_eq!(report.wallets, 2);
    assert_eq!(report.transactions, 3);
    assert_eq!(report.files, vec![dir.path().join("dev_test_run.sh")]);

    let script = std::fs::read_to_string(&report.files[0])?;
    assert_eq!(script.matches("curl ").count(), 3);
    assert_eq!(script.matches("read -p \"Press any key...\"").count(), 1);

    let commands = read_commands(&report.files[0])?;
    assert_eq!(commands.len(), 3);

    let genesis = commands[0].tx()?;
    assert_eq!(genesis.sender_address, report.genesis_address);
    assert_eq!(genesis.nonce, 1);
    assert!(commands[0].tx_json()?.contains("\"ActionFee\":0.001"));

    // 4 validators with stake and deposit, then 2 funded wallets.
    assert_eq!(genesis.actions.len(), 10);
    assert!(genesis.actions[..8].iter().step_by(2).all(|a| matches!(a, Action::DelegateStake { .. })));
    let funded: Vec<Address> = genesis.actions[8..]
        .iter()
        .map(|a| match a {
            Action::TransferChx { recipient_address, amount } => {
                assert_eq!(amount.to_string(), "10000");
                recipient_address.clone()
            }
            other => panic!("unexpected action {other:?}"),
        })
        .collect();

    for (command, wallet) in commands[1..].iter().zip(&funded) {
        let tx = command.tx()?;
        assert_eq!(&tx.sender_address, wallet);
        assert_eq!(tx.nonce, 1);
        assert_eq!(tx.actions.len(), 1);

        let Action::TransferChx { recipient_address, amount } = &tx.actions[0] else {
            eyre::bail!("expected a transfer")
        };
        assert_ne!(recipient_address, wallet);
        assert!(funded.contains(recipient_address));
        assert_eq!(*amount, Amount::from_chx(1).unwrap());
    }

    Ok(())
}

#[test]
fn test_port_rotation_follows_command_order() -> eyre::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = WorkloadConfig { rounds_per_wallet: 3, ..small_config(Preset::Dev, dir.path()) };

    let report = Generator::from_config(config, BlsCrypto)?.run()?;
    let ports: Vec<u16> = read_commands(&report.files[0])?.iter().map(|c| c.port).collect();

    assert_eq!(ports, [10702, 10703, 10704, 10701, 10702, 10703, 10704]);

    Ok(())
}

#[test]
fn test_nonces_are_gap_free_per_sender() -> eyre::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = WorkloadConfig {
        wallet_count: 4,
        rounds_per_wallet: 5,
        actions_per_tx: 3,
        ..small_config(Preset::Dev, dir.path())
    };

    let report = Generator::from_config(config, BlsCrypto)?.run()?;
    let commands = read_commands(&report.files[0])?;
    assert_eq!(commands.len(), 1 + 4 * 5);

    let mut nonces: HashMap<Address, Vec<u64>> = HashMap::new();
    for command in &commands[1..] {
        let tx = command.tx()?;
        assert_eq!(tx.total_amount(), Some(Amount::from_chx(1).unwrap()));
        for action in &tx.actions {
            let Action::TransferChx { recipient_address, .. } = action else {
                eyre::bail!("expected a transfer")
            };
            assert_ne!(recipient_address, &tx.sender_address);
        }
        nonces.entry(tx.sender_address).or_default().push(tx.nonce);
    }

    assert_eq!(nonces.len(), 4);
    for series in nonces.values() {
        assert_eq!(series, &[1, 2, 3, 4, 5]);
    }

    Ok(())
}

#[test]
fn test_same_seed_same_bytes() -> eyre::Result<()> {
    let first = tempfile::tempdir()?;
    let second = tempfile::tempdir()?;
    let third = tempfile::tempdir()?;

    let a = Generator::from_config(small_config(Preset::Dev, first.path()), BlsCrypto)?.run()?;
    let b = Generator::from_config(small_config(Preset::Dev, second.path()), BlsCrypto)?.run()?;
    let other_seed = WorkloadConfig { seed: Some(2), ..small_config(Preset::Dev, third.path()) };
    let c = Generator::from_config(other_seed, BlsCrypto)?.run()?;

    let a = std::fs::read(&a.files[0])?;
    assert_eq!(a, std::fs::read(&b.files[0])?);
    assert_ne!(a, std::fs::read(&c.files[0])?);

    Ok(())
}

#[test]
fn test_per_node_layout() -> eyre::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = WorkloadConfig {
        rounds_per_wallet: 3,
        actions_per_tx: 2,
        ..small_config(Preset::Perf, dir.path())
    };
    assert_eq!(config.layout, Layout::PerNode);

    let report = Generator::from_config(config, BlsCrypto)?.run()?;
    let genesis_address = report.genesis_address.clone();

    assert_eq!(
        report.files,
        vec![
            dir.path().join("perfnet_test_prepare.sh"),
            dir.path().join("perfnet_test_run.sh.001"),
            dir.path().join("perfnet_test_run.sh.002"),
        ]
    );

    let prepare = read_commands(&report.files[0])?;
    assert_eq!(prepare.len(), 1);
    let genesis = prepare[0].tx()?;
    assert!(genesis.actions.iter().all(|a| matches!(a, Action::TransferChx { .. })));
    assert_eq!(genesis.actions.len(), 2);

    for (i, path) in report.files[1..].iter().enumerate() {
        let text = std::fs::read_to_string(path)?;
        let header = text.lines().next().unwrap_or_default();
        assert!(header.starts_with(&format!("# Node: {} / Sender: CH", i + 1)));
        assert!(!text.contains("-s -H"));

        let commands = read_commands(path)?;
        assert_eq!(commands.len(), 3);
        for (nonce, command) in (1..).zip(&commands) {
            assert_eq!(command.port, 10717);
            let tx = command.tx()?;
            assert_eq!(tx.nonce, nonce);
            assert_eq!(tx.actions.len(), 2);
            assert_eq!(
                tx.actions[0],
                Action::transfer(genesis_address.clone(), Amount::from_units(5_000_000))
            );
        }
    }

    Ok(())
}

#[test]
fn test_legacy_profile() -> eyre::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = small_config(Preset::Legacy, dir.path());
    assert_eq!(config.profile, Profile::Legacy);
    assert_eq!(config.recipients, RecipientMode::Genesis);

    let report = Generator::from_config(config, BlsCrypto)?.run()?;
    let script = std::fs::read_to_string(&report.files[0])?;
    assert!(!script.contains("<< JSON"));

    let commands = read_commands(&report.files[0])?;
    assert_eq!(commands.len(), 3);

    let genesis_json = commands[0].tx_json()?;
    assert!(genesis_json.contains("\"Fee\":0.001"));
    assert!(!genesis_json.contains("ActionFee"));

    // Stake only, no deposits.
    let genesis = commands[0].tx()?;
    assert_eq!(genesis.actions.len(), 4 + 2);

    Ok(())
}

#[test]
fn test_wallets_file_signatures_verify() -> eyre::Result<()> {
    let dir = tempfile::tempdir()?;
    let wallets_path = dir.path().join("wallets.csv");
    let wallets = RandomProvisioner::new(Some(9)).provision(&BlsCrypto, 3)?;
    write_wallets(&wallets_path, &wallets)?;

    let config = WorkloadConfig {
        wallet_count: 3,
        rounds_per_wallet: 2,
        seed: None,
        wallets_file: Some(wallets_path),
        ..small_config(Preset::Dev, &dir.path().join("out"))
    };
    let network = config.network.clone();

    let report = Generator::from_config(config, BlsCrypto)?.run()?;
    let commands = read_commands(&report.files[0])?;

    let keys: HashMap<&Address, _> = wallets.iter().map(|w| (&w.address, &w.private_key)).collect();
    for command in &commands[1..] {
        let tx = command.tx()?;
        let key = keys.get(&tx.sender_address).ok_or_else(|| eyre::eyre!("unknown sender"))?;
        let raw = utf8_to_hex(&command.tx_json()?);

        assert!(BlsCrypto.verify_message(
            network.as_deref(),
            key,
            raw.as_bytes(),
            &command.envelope.signature
        )?);
        assert_eq!(BlsCrypto.address_from_private_key(key)?, tx.sender_address);
    }

    Ok(())
}

#[test]
fn test_invalid_config_writes_nothing() -> eyre::Result<()> {
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("out");
    let config = WorkloadConfig { wallet_count: 0, ..small_config(Preset::Dev, &out) };

    let err = Generator::from_config(config, BlsCrypto).unwrap_err();
    assert!(matches!(err, GenerateError::Config(ConfigError::Zero("walletCount"))));
    assert!(!out.exists());

    Ok(())
}

#[test]
fn test_bad_genesis_key_fails_before_io() -> eyre::Result<()> {
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("out");

    let config = WorkloadConfig {
        genesis_key: PrivateKey::new("0OIl"),
        ..small_config(Preset::Dev, &out)
    };
    let err = Generator::from_config(config, BlsCrypto).unwrap_err();
    assert!(matches!(err, GenerateError::Crypto(CryptoError::InvalidPrivateKey(_))));

    let config = WorkloadConfig {
        genesis_key: PrivateKey::new("abc"),
        ..small_config(Preset::Dev, &out)
    };
    let err = Generator::from_config(config, BlsCrypto).unwrap_err();
    assert!(matches!(err, GenerateError::Crypto(CryptoError::InvalidKeyLength(_))));

    assert!(!out.exists());

    Ok(())
}

#[test]
fn test_output_dir_is_a_file() -> eyre::Result<()> {
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("out");
    std::fs::write(&out, "not a directory")?;

    let mut generator = Generator::from_config(small_config(Preset::Dev, &out), BlsCrypto)?;
    let err = generator.run().unwrap_err();
    assert!(matches!(err, GenerateError::Io(_)));
    assert_eq!(std::fs::read_to_string(&out)?, "not a directory");

    Ok(())
}

#[test]
fn test_failed_run_keeps_written_scripts() -> eyre::Result<()> {
    let dir = tempfile::tempdir()?;
    // The second node script cannot be created over a directory.
    std::fs::create_dir(dir.path().join("perfnet_test_run.sh.002"))?;

    let mut generator = Generator::from_config(small_config(Preset::Perf, dir.path()), BlsCrypto)?;
    let err = generator.run().unwrap_err();
    assert!(matches!(err, GenerateError::Io(_)));

    let prepare = read_commands(&dir.path().join("perfnet_test_prepare.sh"))?;
    assert_eq!(prepare.len(), 1);
    assert_eq!(prepare[0].tx()?.sender_address, *generator.genesis_address());

    let first_node = read_commands(&dir.path().join("perfnet_test_run.sh.001"))?;
    assert_eq!(first_node.len(), 1);
    assert_eq!(first_node[0].tx()?.nonce, 1);

    Ok(())
}

#[test]
fn test_wallets_file_with_duplicate_rows() -> eyre::Result<()> {
    let dir = tempfile::tempdir()?;
    let wallets_path = dir.path().join("wallets.csv");
    let wallets = RandomProvisioner::new(Some(5)).provision(&BlsCrypto, 2)?;
    write_wallets(&wallets_path, &[wallets[0].clone(), wallets[1].clone(), wallets[0].clone()])?;

    let out = dir.path().join("out");
    let config = WorkloadConfig {
        wallet_count: 3,
        seed: None,
        wallets_file: Some(wallets_path),
        ..small_config(Preset::Dev, &out)
    };

    let err = Generator::from_config(config, BlsCrypto)?.run().unwrap_err();
    let GenerateError::Provision(ProvisionError::Duplicate(address)) = &err else {
        eyre::bail!("expected a duplicate wallet error, got {err:?}")
    };
    assert_eq!(address, &wallets[0].address);
    assert!(!out.join("dev_test_run.sh").exists());

    Ok(())
}
