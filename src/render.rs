//! Rendering signed envelopes as `curl` commands.

use serde::{Deserialize, Serialize};
use url::Url;

/// Path of the node's transaction submission endpoint.
pub const TX_PATH: &str = "tx";

/// Shell line that waits for a key press, placed after the genesis command.
pub const PAUSE_MARKER: &str = "read -p \"Press any key...\"\n";

/// How the request body is passed to `curl`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum CommandStyle {
    /// Body read from stdin via a heredoc.
    #[default]
    Heredoc,
    /// Body passed inline as a quoted JSON string.
    Inline,
}

/// Shape of a rendered command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandFormat {
    /// How the body is passed.
    pub style: CommandStyle,
    /// Whether `curl` runs with `-s`.
    pub silent: bool,
}

/// Round-robin port selection over `pool` consecutive ports starting at `base`.
///
/// The counter is incremented before each selection, so the first port handed
/// out is `base + 1 % pool`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRotation {
    base: u16,
    pool: u16,
    invocation: u64,
}

impl PortRotation {
    /// Returns `None` if the pool is empty or runs past the last port.
    pub fn new(base: u16, pool: u16) -> Option<Self> {
        if pool == 0 || base.checked_add(pool - 1).is_none() {
            return None
        }

        Some(Self { base, pool, invocation: 0 })
    }

    /// Always hands out the same port.
    pub fn fixed(port: u16) -> Self {
        Self { base: port, pool: 1, invocation: 0 }
    }

    /// Select the port for the next command.
    pub fn next_port(&mut self) -> u16 {
        self.invocation += 1;
        self.base + (self.invocation % u64::from(self.pool)) as u16
    }

    /// Number of ports handed out so far.
    pub fn invocations(&self) -> u64 {
        self.invocation
    }
}

/// `http://<host>:<port>/tx`
pub fn endpoint(host: &str, port: u16) -> Result<Url, url::ParseError> {
    Url::parse(&format!("http://{host}:{port}/"))?.join(TX_PATH)
}

/// Render one command that POSTs `envelope_json` to `endpoint`.
pub fn render_command(envelope_json: &str, endpoint: &Url, format: CommandFormat) -> String {
    let flags = if format.silent { "-s " } else { "" };

    match format.style {
        CommandStyle::Heredoc => format!(
            "curl {flags}-H \"Content-Type: application/json\" -d @- {endpoint} << JSON\n{envelope_json}\nJSON\n"
        ),
        CommandStyle::Inline => {
            let quoted = serde_json::Value::String(envelope_json.to_owned());
            format!("curl {flags}-H \"Content-Type: application/json\" -d {quoted} {endpoint}\n")
        }
    }
}
