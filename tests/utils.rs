use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use eyre::{bail, eyre};
use url::Url;

use chx_workload::{Preset, SignedEnvelope, Transaction, WorkloadConfig};

/// A command parsed back out of a generated script.
#[derive(Debug, Clone)]
pub struct ParsedCommand {
    pub port: u16,
    pub envelope: SignedEnvelope,
}

impl ParsedCommand {
    /// The transaction JSON carried by the envelope.
    pub fn tx_json(&self) -> eyre::Result<String> {
        let raw = STANDARD.decode(&self.envelope.tx)?;
        Ok(String::from_utf8(hex::decode(raw)?)?)
    }

    pub fn tx(&self) -> eyre::Result<Transaction> {
        Ok(serde_json::from_str(&self.tx_json()?)?)
    }
}

/// A small seeded configuration writing into `dir`.
pub fn small_config(preset: Preset, dir: &Path) -> WorkloadConfig {
    WorkloadConfig {
        wallet_count: 2,
        rounds_per_wallet: 1,
        actions_per_tx: 1,
        fee: "0.001".parse().expect("valid amount"),
        seed: Some(1),
        output_dir: dir.to_path_buf(),
        ..WorkloadConfig::preset(preset)
    }
}

/// Parse every `curl` command of a script, heredoc or inline.
pub fn read_commands(path: &Path) -> eyre::Result<Vec<ParsedCommand>> {
    let text = std::fs::read_to_string(path)?;
    let mut lines = text.lines();
    let mut commands = Vec::new();

    while let Some(line) = lines.next() {
        if !line.starts_with("curl ") {
            continue;
        }

        let url = line
            .split_whitespace()
            .find(|token| token.starts_with("http://"))
            .ok_or_else(|| eyre!("no url in {line:?}"))?;
        let port = Url::parse(url)?.port().ok_or_else(|| eyre!("no port in {url}"))?;

        let body = if line.ends_with("<< JSON") {
            let body = lines.next().ok_or_else(|| eyre!("missing heredoc body"))?;
            if lines.next() != Some("JSON") {
                bail!("unterminated heredoc")
            }
            body.to_owned()
        } else {
            let start = line.find("-d ").ok_or_else(|| eyre!("no body in {line:?}"))? + 3;
            let end = line.rfind(" http://").ok_or_else(|| eyre!("no url in {line:?}"))?;
            serde_json::from_str::<String>(&line[start..end])?
        };

        commands.push(ParsedCommand { port, envelope: serde_json::from_str(&body)? });
    }

    Ok(commands)
}
