// Randomness coordinator mock
// Accepts LINK-paid requests and lets the caller deliver the random value

use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::primitives::Address;

use super::state::{require, CallContext, NativeContract};
use crate::ledger::values::{address, as_uint, as_word, uint, word, Args};
use crate::ledger::LedgerError;

#[derive(Debug, Clone)]
pub struct VrfCoordinatorMock {
    link: Address,
}

impl NativeContract for VrfCoordinatorMock {
    const FUNCTIONS: &'static [&'static str] = &["LINK", "onTokenTransfer", "callBackWithRandomness"];
    const EVENTS: &'static [&'static str] = &["RandomnessRequest"];

    fn construct(_ctx: &mut CallContext<'_>, args: &Args<'_>) -> Result<Self, LedgerError> {
        args.expect_len(1)?;
        Ok(Self { link: args.address(0)? })
    }

    fn execute(
        &mut self,
        ctx: &mut CallContext<'_>,
        method: &str,
        args: &Args<'_>,
    ) -> Result<Vec<DynSolValue>, LedgerError> {
        match method {
            "LINK" => Ok(vec![address(self.link)]),
            "onTokenTransfer" => {
                require(ctx.sender == self.link, "Must use LINK token")?;
                args.expect_len(3)?;
                let requester = args.address(0)?;
                let data = args.bytes(2)?;

                let request = DynSolType::Tuple(vec![DynSolType::FixedBytes(32), DynSolType::Uint(256)])
                    .abi_decode_params(&data)
                    .map_err(|e| LedgerError::revert(format!("malformed randomness request: {}", e)))?;
                let (key_hash, seed) = match &request {
                    DynSolValue::Tuple(fields) if fields.len() == 2 => {
                        (as_word(&fields[0])?, as_uint(&fields[1])?)
                    }
                    _ => return Err(LedgerError::revert("malformed randomness request")),
                };

                ctx.emit(
                    "RandomnessRequest",
                    vec![("sender", address(requester)), ("keyHash", word(key_hash)), ("seed", uint(seed))],
                );
                Ok(vec![])
            }
            "callBackWithRandomness" => {
                args.expect_len(3)?;
                let request_id = args.word(0)?;
                let randomness = args.uint(1)?;
                let consumer = args.address(2)?;

                // Unchecked low-level call: the consumer's failure does not revert the callback
                ctx.try_call(consumer, "rawFulfillRandomness", vec![word(request_id), uint(randomness)]);
                Ok(vec![])
            }
            _ => Ok(vec![]),
        }
    }
}
