// Test double of the compiled Lottery contract for the stand-in chain

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{keccak256, Address, B256, U256};
use std::collections::HashMap;

use super::state::{require, CallContext, NativeContract};
use crate::ledger::values::{address, as_int, uint, word, Args};
use crate::ledger::LedgerError;
use crate::lottery::LotteryState;

/// The price feed reports 8 decimals; scale to 18
const PRICE_SCALE: u64 = 10_000_000_000;

#[derive(Debug, Clone)]
pub struct Lottery {
    owner: Address,
    price_feed: Address,
    vrf_coordinator: Address,
    link: Address,
    fee: U256,
    keyhash: B256,
    usd_entry_fee: U256,
    players: Vec<Address>,
    recent_winner: Address,
    randomness: U256,
    state: LotteryState,
    request_nonces: HashMap<B256, U256>,
}

fn ether(amount: u64) -> U256 {
    U256::from(amount) * U256::from(10u64).pow(U256::from(18))
}

impl Lottery {
    fn only_owner(&self, ctx: &CallContext<'_>) -> Result<(), LedgerError> {
        require(ctx.sender == self.owner, "Ownable: caller is not the owner")
    }

    fn entrance_fee(&self, ctx: &mut CallContext<'_>) -> Result<U256, LedgerError> {
        let round = ctx.call(self.price_feed, "latestRoundData", vec![])?;
        let price = round
            .get(1)
            .ok_or_else(|| LedgerError::revert("price feed returned no answer"))?;
        // uint256(price) reinterprets the two's complement bits
        let adjusted_price = as_int(price)?
            .into_raw()
            .checked_mul(U256::from(PRICE_SCALE))
            .ok_or_else(|| LedgerError::revert("multiplication overflow"))?;

        self.usd_entry_fee
            .checked_mul(ether(1))
            .ok_or_else(|| LedgerError::revert("multiplication overflow"))?
            .checked_div(adjusted_price)
            .ok_or_else(|| LedgerError::revert("division by zero"))
    }

    /// Pay the coordinator and derive the request id it will answer to
    fn request_randomness(&mut self, ctx: &mut CallContext<'_>) -> Result<B256, LedgerError> {
        let user_seed = U256::ZERO;
        let request = DynSolValue::Tuple(vec![word(self.keyhash), uint(user_seed)]).abi_encode_params();
        ctx.call(
            self.link,
            "transferAndCall",
            vec![address(self.vrf_coordinator), uint(self.fee), DynSolValue::Bytes(request)],
        )?;

        let nonce = self.request_nonces.get(&self.keyhash).copied().unwrap_or_default();
        let vrf_seed = keccak256(
            DynSolValue::Tuple(vec![word(self.keyhash), uint(user_seed), address(ctx.this), uint(nonce)])
                .abi_encode_params(),
        );
        self.request_nonces.insert(self.keyhash, nonce + U256::from(1));

        let mut packed = [0u8; 64];
        packed[..32].copy_from_slice(self.keyhash.as_slice());
        packed[32..].copy_from_slice(vrf_seed.as_slice());
        Ok(keccak256(packed))
    }

    fn fulfill_randomness(&mut self, ctx: &mut CallContext<'_>, randomness: U256) -> Result<(), LedgerError> {
        require(self.state == LotteryState::CalculatingWinner, "You aren't there yet!")?;
        require(!randomness.is_zero(), "random-not-found")?;

        let count = U256::from(self.players.len());
        let index = randomness
            .checked_rem(count)
            .ok_or_else(|| LedgerError::revert("no players"))?;
        let index = usize::try_from(index).map_err(|_| LedgerError::revert("winner index out of range"))?;
        let winner = self.players[index];

        self.recent_winner = winner;
        let prize = ctx.self_balance();
        ctx.transfer(winner, prize)?;
        self.players.clear();
        self.state = LotteryState::Closed;
        self.randomness = randomness;
        Ok(())
    }
}

impl NativeContract for Lottery {
    const FUNCTIONS: &'static [&'static str] = &[
        "enter",
        "getEntranceFee",
        "startLottery",
        "endLottery",
        "rawFulfillRandomness",
        "players",
        "recentWinner",
        "lottery_state",
        "randomness",
        "fee",
        "keyhash",
        "usdEntryFee",
        "owner",
    ];
    const EVENTS: &'static [&'static str] = &["RequestedRandomness"];
    const PAYABLE: &'static [&'static str] = &["enter"];

    fn construct(ctx: &mut CallContext<'_>, args: &Args<'_>) -> Result<Self, LedgerError> {
        args.expect_len(5)?;
        Ok(Self {
            owner: ctx.sender,
            price_feed: args.address(0)?,
            vrf_coordinator: args.address(1)?,
            link: args.address(2)?,
            fee: args.uint(3)?,
            keyhash: args.word(4)?,
            usd_entry_fee: ether(50),
            players: Vec::new(),
            recent_winner: Address::ZERO,
            randomness: U256::ZERO,
            state: LotteryState::Closed,
            request_nonces: HashMap::new(),
        })
    }

    fn execute(
        &mut self,
        ctx: &mut CallContext<'_>,
        method: &str,
        args: &Args<'_>,
    ) -> Result<Vec<DynSolValue>, LedgerError> {
        match method {
            "enter" => {
                require(self.state == LotteryState::Open, "Lottery is not open")?;
                let fee = self.entrance_fee(ctx)?;
                require(ctx.value >= fee, "Not enough ETH!")?;
                self.players.push(ctx.sender);
                Ok(vec![])
            }
            "getEntranceFee" => Ok(vec![uint(self.entrance_fee(ctx)?)]),
            "startLottery" => {
                self.only_owner(ctx)?;
                require(self.state == LotteryState::Closed, "Can't start a new lottery yet!")?;
                self.state = LotteryState::Open;
                Ok(vec![])
            }
            "endLottery" => {
                self.only_owner(ctx)?;
                self.state = LotteryState::CalculatingWinner;
                let request_id = self.request_randomness(ctx)?;
                ctx.emit("RequestedRandomness", vec![("requestId", word(request_id))]);
                Ok(vec![])
            }
            "rawFulfillRandomness" => {
                require(ctx.sender == self.vrf_coordinator, "Only VRFCoordinator can fulfill")?;
                args.expect_len(2)?;
                self.fulfill_randomness(ctx, args.uint(1)?)?;
                Ok(vec![])
            }
            "players" => {
                let index = usize::try_from(args.uint(0)?).ok();
                let player = index
                    .and_then(|i| self.players.get(i))
                    .ok_or_else(|| LedgerError::revert("player index out of bounds"))?;
                Ok(vec![address(*player)])
            }
            "recentWinner" => Ok(vec![address(self.recent_winner)]),
            "lottery_state" => Ok(vec![DynSolValue::Uint(U256::from(self.state.code()), 8)]),
            "randomness" => Ok(vec![uint(self.randomness)]),
            "fee" => Ok(vec![uint(self.fee)]),
            "keyhash" => Ok(vec![word(self.keyhash)]),
            "usdEntryFee" => Ok(vec![uint(self.usd_entry_fee)]),
            "owner" => Ok(vec![address(self.owner)]),
            _ => Ok(vec![]),
        }
    }
}
