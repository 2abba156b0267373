// ERC-677 token standing in for LINK

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, U256};
use std::collections::HashMap;

use super::state::{require, CallContext, NativeContract};
use crate::ledger::values::{address, boolean, uint, Args};
use crate::ledger::LedgerError;

#[derive(Debug, Clone)]
pub struct LinkToken {
    total_supply: U256,
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
}

impl LinkToken {
    pub const NAME: &'static str = "ChainLink Token";
    pub const SYMBOL: &'static str = "LINK";
    pub const DECIMALS: u8 = 18;

    /// 10^27, the full supply minted to the deployer
    pub fn initial_supply() -> U256 {
        U256::from(10u64).pow(U256::from(27))
    }

    fn balance_of(&self, owner: Address) -> U256 {
        self.balances.get(&owner).copied().unwrap_or_default()
    }

    fn valid_recipient(ctx: &CallContext<'_>, to: Address) -> Result<(), LedgerError> {
        require(to != Address::ZERO && to != ctx.this, "invalid recipient")
    }

    fn move_tokens(
        &mut self,
        ctx: &mut CallContext<'_>,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<(), LedgerError> {
        let available = self.balance_of(from);
        require(available >= value, "insufficient token balance")?;
        self.balances.insert(from, available - value);
        let credited = self.balance_of(to).saturating_add(value);
        self.balances.insert(to, credited);

        ctx.emit(
            "Transfer",
            vec![("from", address(from)), ("to", address(to)), ("value", uint(value))],
        );
        Ok(())
    }
}

impl NativeContract for LinkToken {
    const FUNCTIONS: &'static [&'static str] = &[
        "name",
        "symbol",
        "decimals",
        "totalSupply",
        "balanceOf",
        "transfer",
        "transferFrom",
        "approve",
        "allowance",
        "transferAndCall",
    ];
    const EVENTS: &'static [&'static str] = &["Transfer", "Approval"];

    fn construct(ctx: &mut CallContext<'_>, args: &Args<'_>) -> Result<Self, LedgerError> {
        args.expect_len(0)?;
        let total_supply = Self::initial_supply();
        Ok(Self {
            total_supply,
            balances: HashMap::from([(ctx.sender, total_supply)]),
            allowances: HashMap::new(),
        })
    }

    fn execute(
        &mut self,
        ctx: &mut CallContext<'_>,
        method: &str,
        args: &Args<'_>,
    ) -> Result<Vec<DynSolValue>, LedgerError> {
        match method {
            "name" => Ok(vec![DynSolValue::String(Self::NAME.to_string())]),
            "symbol" => Ok(vec![DynSolValue::String(Self::SYMBOL.to_string())]),
            "decimals" => Ok(vec![DynSolValue::Uint(U256::from(Self::DECIMALS), 8)]),
            "totalSupply" => Ok(vec![uint(self.total_supply)]),
            "balanceOf" => Ok(vec![uint(self.balance_of(args.address(0)?))]),
            "allowance" => {
                let key = (args.address(0)?, args.address(1)?);
                Ok(vec![uint(self.allowances.get(&key).copied().unwrap_or_default())])
            }
            "approve" => {
                let spender = args.address(0)?;
                let value = args.uint(1)?;
                self.allowances.insert((ctx.sender, spender), value);
                ctx.emit(
                    "Approval",
                    vec![("owner", address(ctx.sender)), ("spender", address(spender)), ("value", uint(value))],
                );
                Ok(vec![boolean(true)])
            }
            "transfer" => {
                args.expect_len(2)?;
                let to = args.address(0)?;
                Self::valid_recipient(ctx, to)?;
                let sender = ctx.sender;
                self.move_tokens(ctx, sender, to, args.uint(1)?)?;
                Ok(vec![boolean(true)])
            }
            "transferFrom" => {
                args.expect_len(3)?;
                let from = args.address(0)?;
                let to = args.address(1)?;
                let value = args.uint(2)?;
                Self::valid_recipient(ctx, to)?;

                let key = (from, ctx.sender);
                let allowed = self.allowances.get(&key).copied().unwrap_or_default();
                require(allowed >= value, "insufficient allowance")?;
                self.allowances.insert(key, allowed - value);
                self.move_tokens(ctx, from, to, value)?;
                Ok(vec![boolean(true)])
            }
            "transferAndCall" => {
                args.expect_len(3)?;
                let to = args.address(0)?;
                let value = args.uint(1)?;
                let data = args.bytes(2)?;
                Self::valid_recipient(ctx, to)?;

                let sender = ctx.sender;
                self.move_tokens(ctx, sender, to, value)?;
                if ctx.is_contract(to) {
                    ctx.call(
                        to,
                        "onTokenTransfer",
                        vec![address(sender), uint(value), DynSolValue::Bytes(data)],
                    )?;
                }
                Ok(vec![boolean(true)])
            }
            _ => Ok(vec![]),
        }
    }
}
