use std::{fmt, str::FromStr};

use serde::{
    de::{self, Visitor},
    ser::{self, SerializeStruct},
    Deserialize, Deserializer, Serialize, Serializer,
};
use thiserror::Error;

/// Number of decimal places of a CHX amount.
pub const CHX_DECIMALS: u32 = 7;

/// Number of micro-units in one CHX.
pub const UNITS_PER_CHX: u64 = 10u64.pow(CHX_DECIMALS);

/// A fixed-point CHX amount, stored as an integer number of micro-units.
///
/// Amounts serialize as plain JSON numbers in their shortest exact decimal form
/// (`10000`, `0.001`), which is what the node expects inside a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u64);

impl Amount {
    /// The zero amount.
    pub const ZERO: Amount = Amount(0);

    /// Creates an amount from a raw number of micro-units.
    pub const fn from_units(units: u64) -> Self {
        Amount(units)
    }

    /// Creates an amount from a whole number of CHX. Returns `None` on overflow.
    pub fn from_chx(chx: u64) -> Option<Self> {
        chx.checked_mul(UNITS_PER_CHX).map(Amount)
    }

    /// Returns the raw number of micro-units.
    pub fn units(&self) -> u64 {
        self.0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Checked multiplication by a scalar.
    pub fn checked_mul(self, factor: u64) -> Option<Amount> {
        self.0.checked_mul(factor).map(Amount)
    }

    /// Splits the amount into `parts` amounts that sum exactly to `self`.
    ///
    /// Every part gets `self / parts`; the remainder is added to the first part.
    /// Fails if `parts` is zero or if a part would be zero.
    pub fn split(self, parts: usize) -> Result<Vec<Amount>, ComposeError> {
        if parts == 0 {
            return Err(ComposeError::NoActions)
        }

        let per_part = self.0 / parts as u64;
        let remainder = self.0 % parts as u64;
        if per_part == 0 {
            return Err(ComposeError::AmountTooSmall { amount: self, parts })
        }

        let mut amounts = vec![Amount(per_part); parts];
        amounts[0] = Amount(per_part + remainder);

        Ok(amounts)
    }

    /// Returns true if the JSON form of the amount decodes back to the same amount.
    ///
    /// Whole amounts are written as integers and are always exact. Fractional amounts
    /// are written as `f64`, which holds all 7 decimals only up to about 10^8 CHX.
    pub fn is_json_exact(&self) -> bool {
        self.0 % UNITS_PER_CHX == 0 || parse_decimal(&self.as_f64().to_string()) == Ok(*self)
    }

    fn as_f64(&self) -> f64 {
        self.0 as f64 / UNITS_PER_CHX as f64
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / UNITS_PER_CHX;
        let frac = self.0 % UNITS_PER_CHX;
        if frac == 0 {
            return write!(f, "{whole}")
        }

        let digits = format!("{frac:0width$}", width = CHX_DECIMALS as usize);
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

impl FromStr for Amount {
    type Err = AmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount = parse_decimal(s)?;
        if !amount.is_json_exact() {
            return Err(AmountParseError::Inexact(s.trim().to_owned()))
        }

        Ok(amount)
    }
}

/// Parses decimal CHX text into micro-units, without the JSON precision check.
fn parse_decimal(s: &str) -> Result<Amount, AmountParseError> {
    let s = s.trim();
    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));

    if whole.is_empty() && frac.is_empty() {
        return Err(AmountParseError::Invalid(s.to_owned()))
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(AmountParseError::Invalid(s.to_owned()))
    }
    if frac.len() > CHX_DECIMALS as usize {
        return Err(AmountParseError::TooPrecise(s.to_owned()))
    }

    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| AmountParseError::Overflow(s.to_owned()))?
    };
    let frac_units: u64 = if frac.is_empty() {
        0
    } else {
        let scale = 10u64.pow(CHX_DECIMALS - frac.len() as u32);
        frac.parse::<u64>().map_err(|_| AmountParseError::Invalid(s.to_owned()))? * scale
    };

    whole
        .checked_mul(UNITS_PER_CHX)
        .and_then(|units| units.checked_add(frac_units))
        .map(Amount)
        .ok_or_else(|| AmountParseError::Overflow(s.to_owned()))
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if self.0 % UNITS_PER_CHX == 0 {
            return serializer.serialize_u64(self.0 / UNITS_PER_CHX)
        }
        if !self.is_json_exact() {
            return Err(ser::Error::custom(AmountParseError::Inexact(self.to_string())))
        }

        // Shortest round-trip formatting of the nearest f64 reproduces the decimal text.
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct AmountVisitor;

        impl Visitor<'_> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a non-negative CHX amount with at most 7 decimals")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                Amount::from_chx(v).ok_or_else(|| E::custom(AmountParseError::Overflow(v.to_string())))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
                let v = u64::try_from(v).map_err(|_| E::custom("negative amount"))?;
                self.visit_u64(v)
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
                if !v.is_finite() || v < 0.0 {
                    return Err(E::custom("negative or non-finite amount"))
                }
                self.visit_str(&v.to_string())
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

/// An error that can occur when parsing an [`Amount`] from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum AmountParseError {
    #[error("Invalid amount: {0:?}")]
    Invalid(String),
    #[error("Amount {0:?} has more than 7 decimal places")]
    TooPrecise(String),
    #[error("Amount {0:?} is too large")]
    Overflow(String),
    #[error("Amount {0:?} cannot be written as an exact JSON number")]
    Inexact(String),
}

/// A blockchain address, e.g. `CHMf4inrS8hnPNEgJVZPRHFhsDPCHSHZfAJ`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Wraps an address string without validation.
    pub fn new(address: impl Into<String>) -> Self {
        Address(address.into())
    }

    /// Returns the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.contains(|c: char| c.is_whitespace() || c == ',') {
            return Err(CryptoError::InvalidAddress(s.to_owned()))
        }

        Ok(Address(s.to_owned()))
    }
}

/// A private signing key in its base58 text form.
///
/// The `Debug` implementation redacts the key so it never ends up in logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrivateKey(String);

impl PrivateKey {
    /// Wraps a private key string without validation.
    pub fn new(key: impl Into<String>) -> Self {
        PrivateKey(key.into())
    }

    /// Returns the key text.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

impl FromStr for PrivateKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CryptoError::InvalidPrivateKey("empty key".to_owned()))
        }

        Ok(PrivateKey(s.to_owned()))
    }
}

/// A wallet: an address and the private key controlling it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wallet {
    /// The wallet address.
    pub address: Address,
    /// The private key the address was derived from.
    pub private_key: PrivateKey,
}

/// One state-changing instruction inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "ActionType", content = "ActionData")]
pub enum Action {
    /// Transfer CHX to a recipient.
    #[serde(rename_all = "PascalCase")]
    TransferChx {
        /// The receiving address.
        recipient_address: Address,
        /// The amount to transfer.
        amount: Amount,
    },
    /// Delegate stake to a validator.
    #[serde(rename_all = "PascalCase")]
    DelegateStake {
        /// The validator receiving the stake.
        validator_address: Address,
        /// The amount to stake.
        amount: Amount,
    },
}

impl Action {
    /// Creates a `TransferChx` action.
    pub fn transfer(recipient_address: Address, amount: Amount) -> Self {
        Action::TransferChx { recipient_address, amount }
    }

    /// Creates a `DelegateStake` action.
    pub fn delegate_stake(validator_address: Address, amount: Amount) -> Self {
        Action::DelegateStake { validator_address, amount }
    }

    /// Returns the amount carried by the action.
    pub fn amount(&self) -> Amount {
        match self {
            Action::TransferChx { amount, .. } | Action::DelegateStake { amount, .. } => *amount,
        }
    }
}

/// The protocol version a workload targets.
///
/// The two versions differ in the name of the fee field and in whether the
/// signature is bound to a network code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    /// `Fee` field, signatures not bound to a network.
    Legacy,
    /// `ActionFee` field, signatures bound to the network code.
    #[default]
    Current,
}

impl Profile {
    /// The JSON key carrying the fee in a serialized transaction.
    pub fn fee_key(&self) -> &'static str {
        match self {
            Profile::Legacy => "Fee",
            Profile::Current => "ActionFee",
        }
    }

    /// Whether signatures include the network code.
    pub fn binds_network(&self) -> bool {
        matches!(self, Profile::Current)
    }
}

/// An unsigned transaction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Transaction {
    /// The address paying the fee and sending the actions.
    pub sender_address: Address,
    /// Per-sender sequence number, starting at 1.
    pub nonce: u64,
    /// The fee paid per action.
    #[serde(rename = "ActionFee", alias = "Fee")]
    pub fee: Amount,
    /// The actions, applied in order.
    pub actions: Vec<Action>,
}

impl Transaction {
    /// Returns the sum of all action amounts, or `None` on overflow.
    pub fn total_amount(&self) -> Option<Amount> {
        self.actions.iter().try_fold(Amount::ZERO, |acc, action| acc.checked_add(action.amount()))
    }

    /// Serializes the transaction to compact JSON with a fixed key order:
    /// `SenderAddress`, `Nonce`, the profile's fee key, `Actions`.
    pub fn canonical_json(&self, profile: Profile) -> Result<String, serde_json::Error> {
        serde_json::to_string(&Canonical { tx: self, profile })
    }
}

struct Canonical<'a> {
    tx: &'a Transaction,
    profile: Profile,
}

impl Serialize for Canonical<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Transaction", 4)?;
        state.serialize_field("SenderAddress", &self.tx.sender_address)?;
        state.serialize_field("Nonce", &self.tx.nonce)?;
        state.serialize_field(self.profile.fee_key(), &self.tx.fee)?;
        state.serialize_field("Actions", &self.tx.actions)?;
        state.end()
    }
}

/// A signed, encoded transaction ready for submission to a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    /// `base64(hex(utf8(json(tx))))`
    pub tx: String,
    /// Signature over the hex-encoded transaction.
    pub signature: String,
}

impl SignedEnvelope {
    /// Serializes the envelope to compact JSON, `tx` first.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// An error raised by the cryptography collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum CryptoError {
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),
    #[error("Invalid private key length: expected 32 to 64 bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("Invalid address: {0:?}")]
    InvalidAddress(String),
    #[error("Key generation failed: {0}")]
    KeyGen(String),
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
}

/// An error that can occur when composing a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum ComposeError {
    #[error("No eligible recipients for sender {sender}")]
    NoEligibleRecipients { sender: Address },
    #[error("A transaction needs at least one action")]
    NoActions,
    #[error("Amount {amount} cannot be split into {parts} non-zero actions")]
    AmountTooSmall { amount: Amount, parts: usize },
    #[error("Nonces start at 1")]
    ZeroNonce,
}

/// An error that can occur when signing a transaction.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum SignError {
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// An error that can occur when provisioning wallets.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ProvisionError {
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Duplicate wallet {0}")]
    Duplicate(Address),
    #[error("Wallet file has {available} wallets, {needed} needed")]
    NotEnoughWallets { available: usize, needed: usize },
    #[error("Malformed wallet file line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("Address {listed} on line {line} does not match its key (derived {derived})")]
    AddressMismatch { line: usize, listed: Address, derived: Address },
}
