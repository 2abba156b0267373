// World state and message-call execution for the stand-in chain

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{keccak256, Address, B256, U256};
use std::collections::HashMap;
use tracing::debug;

use super::aggregator::MockV3Aggregator;
use super::link_token::LinkToken;
use super::lottery::Lottery;
use super::vrf_coordinator::VrfCoordinatorMock;
use crate::contracts::{ContractKind, Interface};
use crate::ledger::values::Args;
use crate::ledger::{EventLog, LedgerError};

/// A contract test double implemented natively on the stand-in chain
pub trait NativeContract: Sized {
    const FUNCTIONS: &'static [&'static str];
    const EVENTS: &'static [&'static str];
    /// Functions that accept a non-zero call value
    const PAYABLE: &'static [&'static str] = &[];

    fn construct(ctx: &mut CallContext<'_>, args: &Args<'_>) -> Result<Self, LedgerError>;

    fn execute(
        &mut self,
        ctx: &mut CallContext<'_>,
        method: &str,
        args: &Args<'_>,
    ) -> Result<Vec<DynSolValue>, LedgerError>;
}

/// Fail the current call with `reason` unless `condition` holds
pub fn require(condition: bool, reason: &str) -> Result<(), LedgerError> {
    if condition {
        Ok(())
    } else {
        Err(LedgerError::revert(reason))
    }
}

#[derive(Debug, Clone)]
pub enum DevContract {
    Aggregator(MockV3Aggregator),
    Link(LinkToken),
    Coordinator(VrfCoordinatorMock),
    Lottery(Lottery),
}

impl DevContract {
    pub fn kind(&self) -> ContractKind {
        match self {
            DevContract::Aggregator(_) => ContractKind::MockV3Aggregator,
            DevContract::Link(_) => ContractKind::LinkToken,
            DevContract::Coordinator(_) => ContractKind::VrfCoordinatorMock,
            DevContract::Lottery(_) => ContractKind::Lottery,
        }
    }

    pub fn interface(kind: ContractKind) -> Interface {
        fn build<C: NativeContract>(kind: ContractKind) -> Interface {
            Interface::new(
                kind.contract_name(),
                C::FUNCTIONS.iter().copied(),
                C::EVENTS.iter().copied(),
            )
        }

        match kind {
            ContractKind::MockV3Aggregator => build::<MockV3Aggregator>(kind),
            ContractKind::LinkToken => build::<LinkToken>(kind),
            ContractKind::VrfCoordinatorMock => build::<VrfCoordinatorMock>(kind),
            ContractKind::Lottery => build::<Lottery>(kind),
        }
    }

    fn construct(
        kind: ContractKind,
        ctx: &mut CallContext<'_>,
        args: &Args<'_>,
    ) -> Result<Self, LedgerError> {
        Ok(match kind {
            ContractKind::MockV3Aggregator => DevContract::Aggregator(MockV3Aggregator::construct(ctx, args)?),
            ContractKind::LinkToken => DevContract::Link(LinkToken::construct(ctx, args)?),
            ContractKind::VrfCoordinatorMock => DevContract::Coordinator(VrfCoordinatorMock::construct(ctx, args)?),
            ContractKind::Lottery => DevContract::Lottery(Lottery::construct(ctx, args)?),
        })
    }

    fn execute(
        &mut self,
        ctx: &mut CallContext<'_>,
        method: &str,
        args: &Args<'_>,
    ) -> Result<Vec<DynSolValue>, LedgerError> {
        fn dispatch<C: NativeContract>(
            contract: &mut C,
            kind: ContractKind,
            ctx: &mut CallContext<'_>,
            method: &str,
            args: &Args<'_>,
        ) -> Result<Vec<DynSolValue>, LedgerError> {
            if !C::FUNCTIONS.contains(&method) {
                return Err(LedgerError::UnknownMethod {
                    contract: kind.contract_name().to_string(),
                    method: method.to_string(),
                });
            }
            if !C::PAYABLE.contains(&method) && !ctx.value.is_zero() {
                return Err(LedgerError::revert(format!("{} is not payable", method)));
            }
            contract.execute(ctx, method, args)
        }

        let kind = self.kind();
        match self {
            DevContract::Aggregator(c) => dispatch(c, kind, ctx, method, args),
            DevContract::Link(c) => dispatch(c, kind, ctx, method, args),
            DevContract::Coordinator(c) => dispatch(c, kind, ctx, method, args),
            DevContract::Lottery(c) => dispatch(c, kind, ctx, method, args),
        }
    }
}

/// Balances, nonces, contracts and pending logs of the chain
#[derive(Debug, Clone)]
pub struct WorldState {
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, u64>,
    contracts: HashMap<Address, DevContract>,
    logs: Vec<EventLog>,
    block_number: u64,
    timestamp: u64,
}

impl WorldState {
    pub fn new(funded: &[Address], initial_balance: U256, genesis_timestamp: u64) -> Self {
        Self {
            balances: funded.iter().map(|a| (*a, initial_balance)).collect(),
            nonces: HashMap::new(),
            contracts: HashMap::new(),
            logs: Vec::new(),
            block_number: 0,
            timestamp: genesis_timestamp,
        }
    }

    pub fn balance(&self, address: Address) -> U256 {
        self.balances.get(&address).copied().unwrap_or_default()
    }

    pub fn nonce(&self, address: Address) -> u64 {
        self.nonces.get(&address).copied().unwrap_or_default()
    }

    pub fn has_code(&self, address: Address) -> bool {
        self.contracts.contains_key(&address)
    }

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    fn move_value(&mut self, from: Address, to: Address, amount: U256) -> Result<(), LedgerError> {
        if amount.is_zero() {
            return Ok(());
        }
        let available = self.balance(from);
        require(available >= amount, "insufficient balance for transfer")?;
        self.balances.insert(from, available - amount);
        let credited = self.balance(to).saturating_add(amount);
        self.balances.insert(to, credited);
        Ok(())
    }

    /// Run `method` on the contract at `to`
    ///
    /// The callee is taken out of the contract map while it executes, so it
    /// can call other contracts but not itself.
    pub fn message_call(
        &mut self,
        sender: Address,
        to: Address,
        value: U256,
        method: &str,
        args: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>, LedgerError> {
        let mut contract = self
            .contracts
            .remove(&to)
            .ok_or(LedgerError::UnknownContract(to))?;

        let result = self.move_value(sender, to, value).and_then(|_| {
            let mut ctx = CallContext { state: self, this: to, sender, value };
            contract.execute(&mut ctx, method, &Args::new(method, args))
        });

        self.contracts.insert(to, contract);
        result
    }

    /// Deploy a contract at the CREATE address of `sender`'s current nonce
    pub fn create(
        &mut self,
        sender: Address,
        kind: ContractKind,
        value: U256,
        args: &[DynSolValue],
    ) -> Result<Address, LedgerError> {
        let address = sender.create(self.nonce(sender));
        self.move_value(sender, address, value)?;

        let contract = {
            let mut ctx = CallContext { state: self, this: address, sender, value };
            DevContract::construct(kind, &mut ctx, &Args::new("constructor", args))?
        };
        self.contracts.insert(address, contract);
        Ok(address)
    }

    pub fn take_logs(&mut self) -> Vec<EventLog> {
        std::mem::take(&mut self.logs)
    }

    /// Seal a block containing one transaction from `sender`
    pub fn mine(&mut self, sender: Address) -> (u64, B256) {
        let nonce = self.nonce(sender);
        self.nonces.insert(sender, nonce + 1);
        self.mine_empty();

        let mut preimage = Vec::with_capacity(36);
        preimage.extend_from_slice(sender.as_slice());
        preimage.extend_from_slice(&nonce.to_be_bytes());
        preimage.extend_from_slice(&self.block_number.to_be_bytes());
        (self.block_number, keccak256(preimage))
    }

    pub fn mine_empty(&mut self) {
        self.block_number += 1;
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        self.timestamp = now.max(self.timestamp + 1);
    }
}

/// Execution frame of a single message call
pub struct CallContext<'a> {
    state: &'a mut WorldState,
    pub this: Address,
    pub sender: Address,
    pub value: U256,
}

impl<'a> CallContext<'a> {
    /// Call another contract with this contract as the sender
    pub fn call(
        &mut self,
        to: Address,
        method: &str,
        args: Vec<DynSolValue>,
    ) -> Result<Vec<DynSolValue>, LedgerError> {
        self.state.message_call(self.this, to, U256::ZERO, method, &args)
    }

    /// Low-level call: a failure in the callee is rolled back and reported as `false`
    pub fn try_call(&mut self, to: Address, method: &str, args: Vec<DynSolValue>) -> bool {
        let snapshot = self.state.clone();
        match self.state.message_call(self.this, to, U256::ZERO, method, &args) {
            Ok(_) => true,
            Err(e) => {
                debug!("Call to {}.{} failed: {}", to, method, e);
                *self.state = snapshot;
                false
            }
        }
    }

    /// Send ether held by this contract
    pub fn transfer(&mut self, to: Address, amount: U256) -> Result<(), LedgerError> {
        self.state.move_value(self.this, to, amount)
    }

    pub fn self_balance(&self) -> U256 {
        self.state.balance(self.this)
    }

    pub fn is_contract(&self, address: Address) -> bool {
        self.state.has_code(address)
    }

    pub fn block_timestamp(&self) -> U256 {
        U256::from(self.state.timestamp())
    }

    pub fn emit(&mut self, name: &str, fields: Vec<(&str, DynSolValue)>) {
        self.state.logs.push(EventLog {
            address: self.this,
            name: name.to_string(),
            fields: fields
                .into_iter()
                .map(|(field, value)| (field.to_string(), value))
                .collect(),
        });
    }
}
