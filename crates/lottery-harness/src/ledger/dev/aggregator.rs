// Price feed mock with a settable answer

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{I256, U256};
use std::collections::HashMap;

use super::state::{CallContext, NativeContract};
use crate::ledger::values::{int, uint, Args};
use crate::ledger::LedgerError;

#[derive(Debug, Clone)]
pub struct MockV3Aggregator {
    decimals: u8,
    latest_answer: I256,
    latest_timestamp: U256,
    latest_round: U256,
    answers: HashMap<U256, I256>,
    timestamps: HashMap<U256, U256>,
    started_at: HashMap<U256, U256>,
}

fn round_id(value: U256) -> DynSolValue {
    DynSolValue::Uint(value, 80)
}

impl MockV3Aggregator {
    pub const VERSION: u64 = 0;
    pub const DESCRIPTION: &'static str = "v0.6/tests/MockV3Aggregator.sol";

    fn update_answer(&mut self, ctx: &CallContext<'_>, answer: I256) {
        let now = ctx.block_timestamp();
        self.latest_answer = answer;
        self.latest_timestamp = now;
        self.latest_round += U256::from(1);
        self.answers.insert(self.latest_round, answer);
        self.timestamps.insert(self.latest_round, now);
        self.started_at.insert(self.latest_round, now);
    }

    fn round_data(&self, round: U256) -> Vec<DynSolValue> {
        vec![
            round_id(round),
            int(self.answers.get(&round).copied().unwrap_or_default()),
            uint(self.started_at.get(&round).copied().unwrap_or_default()),
            uint(self.timestamps.get(&round).copied().unwrap_or_default()),
            round_id(round),
        ]
    }
}

impl NativeContract for MockV3Aggregator {
    const FUNCTIONS: &'static [&'static str] = &[
        "decimals",
        "description",
        "version",
        "latestAnswer",
        "latestTimestamp",
        "latestRound",
        "getAnswer",
        "getTimestamp",
        "getRoundData",
        "latestRoundData",
        "updateAnswer",
        "updateRoundData",
    ];
    const EVENTS: &'static [&'static str] = &[];

    fn construct(ctx: &mut CallContext<'_>, args: &Args<'_>) -> Result<Self, LedgerError> {
        args.expect_len(2)?;
        let decimals = u8::try_from(args.uint(0)?)
            .map_err(|_| LedgerError::InvalidArguments("decimals must fit in uint8".to_string()))?;

        let mut feed = Self {
            decimals,
            latest_answer: I256::ZERO,
            latest_timestamp: U256::ZERO,
            latest_round: U256::ZERO,
            answers: HashMap::new(),
            timestamps: HashMap::new(),
            started_at: HashMap::new(),
        };
        feed.update_answer(ctx, args.int(1)?);
        Ok(feed)
    }

    fn execute(
        &mut self,
        ctx: &mut CallContext<'_>,
        method: &str,
        args: &Args<'_>,
    ) -> Result<Vec<DynSolValue>, LedgerError> {
        match method {
            "decimals" => Ok(vec![DynSolValue::Uint(U256::from(self.decimals), 8)]),
            "description" => Ok(vec![DynSolValue::String(Self::DESCRIPTION.to_string())]),
            "version" => Ok(vec![uint(U256::from(Self::VERSION))]),
            "latestAnswer" => Ok(vec![int(self.latest_answer)]),
            "latestTimestamp" => Ok(vec![uint(self.latest_timestamp)]),
            "latestRound" => Ok(vec![uint(self.latest_round)]),
            "getAnswer" => {
                let round = args.uint(0)?;
                Ok(vec![int(self.answers.get(&round).copied().unwrap_or_default())])
            }
            "getTimestamp" => {
                let round = args.uint(0)?;
                Ok(vec![uint(self.timestamps.get(&round).copied().unwrap_or_default())])
            }
            "getRoundData" => Ok(self.round_data(args.uint(0)?)),
            "latestRoundData" => Ok(self.round_data(self.latest_round)),
            "updateAnswer" => {
                args.expect_len(1)?;
                self.update_answer(ctx, args.int(0)?);
                Ok(vec![])
            }
            "updateRoundData" => {
                args.expect_len(4)?;
                let round = args.uint(0)?;
                let answer = args.int(1)?;
                let timestamp = args.uint(2)?;
                let started_at = args.uint(3)?;

                self.latest_round = round;
                self.latest_answer = answer;
                self.latest_timestamp = timestamp;
                self.answers.insert(round, answer);
                self.timestamps.insert(round, timestamp);
                self.started_at.insert(round, started_at);
                Ok(vec![])
            }
            _ => Ok(vec![]),
        }
    }
}
