//! Transaction composition: the genesis transaction and per-wallet transfers.

use crate::common::{Action, Address, Amount, ComposeError, Transaction};

/// The genesis transaction is always the genesis sender's first.
pub const GENESIS_NONCE: u64 = 1;

/// Amounts used by the genesis transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenesisParams {
    /// Stake delegated to every validator.
    pub validator_stake: Amount,
    /// Deposit transferred to every validator, if any.
    pub validator_deposit: Option<Amount>,
    /// Initial balance transferred to every recipient.
    pub initial_balance: Amount,
    /// Fee of the transaction.
    pub fee: Amount,
}

/// Compose the genesis transaction.
///
/// For each validator, in order: a `DelegateStake`, followed by a deposit
/// `TransferChx` when configured. Then one funding `TransferChx` per recipient, in order.
pub fn compose_genesis(
    sender: &Address,
    validators: &[Address],
    recipients: &[Address],
    params: &GenesisParams,
) -> Transaction {
    let per_validator = if params.validator_deposit.is_some() { 2 } else { 1 };
    let mut actions = Vec::with_capacity(validators.len() * per_validator + recipients.len());

    for validator in validators {
        actions.push(Action::delegate_stake(validator.clone(), params.validator_stake));
        if let Some(deposit) = params.validator_deposit {
            actions.push(Action::transfer(validator.clone(), deposit));
        }
    }

    actions.extend(
        recipients.iter().map(|r| Action::transfer(r.clone(), params.initial_balance)),
    );

    Transaction { sender_address: sender.clone(), nonce: GENESIS_NONCE, fee: params.fee, actions }
}

/// Where transfer recipients are drawn from.
#[derive(Debug, Clone, Copy)]
pub enum Recipients<'a> {
    /// Cycle over a fixed list, e.g. the genesis address.
    Fixed(&'a [Address]),
    /// Cycle over a pool shared with the sender; the sender is never chosen.
    SharedPool(&'a [Address]),
}

impl<'a> Recipients<'a> {
    /// The recipients eligible for `sender`, in pool order. Never empty.
    pub fn eligible(&self, sender: &Address) -> Result<Vec<&'a Address>, ComposeError> {
        let eligible: Vec<&'a Address> = match *self {
            Recipients::Fixed(list) => list.iter().collect(),
            Recipients::SharedPool(pool) => pool.iter().filter(|a| *a != sender).collect(),
        };

        if eligible.is_empty() {
            return Err(ComposeError::NoEligibleRecipients { sender: sender.clone() })
        }

        Ok(eligible)
    }
}

/// Parameters of a transfer transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferParams {
    /// Total amount moved by the transaction.
    pub amount: Amount,
    /// Number of `TransferChx` actions the amount is split across.
    pub actions: usize,
    /// Fee of the transaction.
    pub fee: Amount,
}

/// Compose a transfer transaction from `sender` at `nonce`.
///
/// Action `i` pays `eligible[i % eligible.len()]`. The amounts sum exactly to
/// `params.amount`, the first action absorbing any remainder.
pub fn compose_transfer(
    sender: &Address,
    nonce: u64,
    recipients: &Recipients<'_>,
    params: &TransferParams,
) -> Result<Transaction, ComposeError> {
    if nonce == 0 {
        return Err(ComposeError::ZeroNonce)
    }

    let eligible = recipients.eligible(sender)?;
    let amounts = params.amount.split(params.actions)?;

    let actions = amounts
        .into_iter()
        .enumerate()
        .map(|(i, amount)| Action::transfer(eligible[i % eligible.len()].clone(), amount))
        .collect();

    Ok(Transaction { sender_address: sender.clone(), nonce, fee: params.fee, actions })
}
