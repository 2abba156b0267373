// Helpers for building and reading ABI values

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, B256, I256, U256};

use super::LedgerError;

pub fn uint(value: U256) -> DynSolValue {
    DynSolValue::Uint(value, 256)
}

pub fn int(value: I256) -> DynSolValue {
    DynSolValue::Int(value, 256)
}

pub fn address(value: Address) -> DynSolValue {
    DynSolValue::Address(value)
}

pub fn word(value: B256) -> DynSolValue {
    DynSolValue::FixedBytes(value, 32)
}

pub fn boolean(value: bool) -> DynSolValue {
    DynSolValue::Bool(value)
}

fn mismatch(expected: &str, value: &DynSolValue) -> LedgerError {
    LedgerError::InvalidArguments(format!("expected {}, got {:?}", expected, value))
}

pub fn as_uint(value: &DynSolValue) -> Result<U256, LedgerError> {
    match value {
        DynSolValue::Uint(v, _) => Ok(*v),
        other => Err(mismatch("uint", other)),
    }
}

pub fn as_int(value: &DynSolValue) -> Result<I256, LedgerError> {
    match value {
        DynSolValue::Int(v, _) => Ok(*v),
        other => Err(mismatch("int", other)),
    }
}

pub fn as_address(value: &DynSolValue) -> Result<Address, LedgerError> {
    match value {
        DynSolValue::Address(v) => Ok(*v),
        other => Err(mismatch("address", other)),
    }
}

pub fn as_word(value: &DynSolValue) -> Result<B256, LedgerError> {
    match value {
        DynSolValue::FixedBytes(v, 32) => Ok(*v),
        DynSolValue::Uint(v, _) => Ok(B256::from(*v)),
        other => Err(mismatch("bytes32", other)),
    }
}

pub fn as_bool(value: &DynSolValue) -> Result<bool, LedgerError> {
    match value {
        DynSolValue::Bool(v) => Ok(*v),
        other => Err(mismatch("bool", other)),
    }
}

pub fn as_bytes(value: &DynSolValue) -> Result<Vec<u8>, LedgerError> {
    match value {
        DynSolValue::Bytes(v) => Ok(v.clone()),
        other => Err(mismatch("bytes", other)),
    }
}

/// Positional argument accessor used by contract dispatch and return decoding
pub struct Args<'a> {
    method: &'a str,
    values: &'a [DynSolValue],
}

impl<'a> Args<'a> {
    pub fn new(method: &'a str, values: &'a [DynSolValue]) -> Self {
        Self { method, values }
    }

    /// Fails unless exactly `count` arguments were supplied
    pub fn expect_len(&self, count: usize) -> Result<(), LedgerError> {
        if self.values.len() != count {
            return Err(LedgerError::InvalidArguments(format!(
                "{} takes {} argument(s), got {}",
                self.method,
                count,
                self.values.len()
            )));
        }
        Ok(())
    }

    pub fn get(&self, index: usize) -> Result<&'a DynSolValue, LedgerError> {
        self.values.get(index).ok_or_else(|| {
            LedgerError::InvalidArguments(format!("{} is missing argument {}", self.method, index))
        })
    }

    pub fn uint(&self, index: usize) -> Result<U256, LedgerError> {
        as_uint(self.get(index)?)
    }

    pub fn int(&self, index: usize) -> Result<I256, LedgerError> {
        as_int(self.get(index)?)
    }

    pub fn address(&self, index: usize) -> Result<Address, LedgerError> {
        as_address(self.get(index)?)
    }

    pub fn word(&self, index: usize) -> Result<B256, LedgerError> {
        as_word(self.get(index)?)
    }

    pub fn bool(&self, index: usize) -> Result<bool, LedgerError> {
        as_bool(self.get(index)?)
    }

    pub fn bytes(&self, index: usize) -> Result<Vec<u8>, LedgerError> {
        as_bytes(self.get(index)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_accessors() {
        let values = vec![uint(U256::from(5)), address(Address::repeat_byte(1))];
        let args = Args::new("transfer", &values);

        assert!(args.expect_len(2).is_ok());
        assert_eq!(args.uint(0).unwrap(), U256::from(5));
        assert_eq!(args.address(1).unwrap(), Address::repeat_byte(1));
        assert!(args.address(0).is_err());
        assert!(args.get(2).is_err());
        assert!(args.expect_len(3).is_err());
    }

    #[test]
    fn test_word_accepts_uint() {
        assert_eq!(as_word(&uint(U256::from(1))).unwrap(), B256::from(U256::from(1)));
    }
}
