use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Number, Value};
use std::str::FromStr;

/// Command received from a client, or replayed from the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Deposit { amount: Decimal },
    Withdraw { amount: Decimal },
    Balance,
    /// Any other `cmd` value; carries no balance effect
    Unknown(String),
}

/// Reasons a balance-affecting command could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("{cmd} requires an amount")]
    MissingAmount { cmd: &'static str },

    #[error("{cmd} amount is not a number: {found}")]
    InvalidAmount { cmd: &'static str, found: String },

    #[error("{cmd} amount is out of range: {found}")]
    AmountOutOfRange { cmd: &'static str, found: String },
}

impl Command {
    /// Decode a structured message.
    ///
    /// Anything without a string `cmd` field decodes to `Unknown`, so only
    /// malformed deposits and withdrawals are errors.
    pub fn decode(value: &Value) -> Result<Self, DecodeError> {
        let Some(cmd) = value.get("cmd").and_then(Value::as_str) else {
            return Ok(Self::Unknown(String::new()));
        };

        match cmd {
            "deposit" => Ok(Self::Deposit {
                amount: decode_amount("deposit", value.get("amount"))?,
            }),
            "withdraw" => Ok(Self::Withdraw {
                amount: decode_amount("withdraw", value.get("amount"))?,
            }),
            "balance" => Ok(Self::Balance),
            other => Ok(Self::Unknown(other.to_owned())),
        }
    }

    /// JSON form of the command, as received on the wire and stored in the log
    pub fn to_json(&self) -> Value {
        match self {
            Self::Deposit { amount } => json!({ "cmd": "deposit", "amount": amount_to_json(*amount) }),
            Self::Withdraw { amount } => json!({ "cmd": "withdraw", "amount": amount_to_json(*amount) }),
            Self::Balance => json!({ "cmd": "balance" }),
            Self::Unknown(cmd) => json!({ "cmd": cmd }),
        }
    }

    /// Deterministic byte encoding used as hash input.
    ///
    /// Object keys come out sorted because serde_json's map is ordered.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        self.to_json().to_string().into_bytes()
    }

    /// Signed effect of this command on the balance
    pub fn balance_delta(&self) -> Option<Decimal> {
        match self {
            Self::Deposit { amount } => Some(*amount),
            Self::Withdraw { amount } => Some(-*amount),
            Self::Balance | Self::Unknown(_) => None,
        }
    }
}

impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Command {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::decode(&value).map_err(de::Error::custom)
    }
}

fn decode_amount(cmd: &'static str, raw: Option<&Value>) -> Result<Decimal, DecodeError> {
    let number = match raw {
        None | Some(Value::Null) => return Err(DecodeError::MissingAmount { cmd }),
        Some(Value::Number(number)) => number,
        Some(other) => {
            return Err(DecodeError::InvalidAmount {
                cmd,
                found: other.to_string(),
            })
        }
    };

    amount_from_number(number).ok_or_else(|| DecodeError::AmountOutOfRange {
        cmd,
        found: number.to_string(),
    })
}

/// Exact decimal from a JSON number, going through its text rather than `f64` math
pub fn amount_from_number(number: &Number) -> Option<Decimal> {
    if let Some(i) = number.as_i64() {
        return Some(Decimal::from(i));
    }
    if let Some(u) = number.as_u64() {
        return Some(Decimal::from(u));
    }

    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
        .map(|amount| amount.normalize())
}

/// JSON number for an amount: an integer when integral, otherwise the number
/// parsed from the decimal's own text.
///
/// Parsing the text rounds correctly, so any amount that was decoded from a
/// JSON number encodes back to that same number.
pub fn amount_to_json(amount: Decimal) -> Value {
    let amount = amount.normalize();

    if amount.fract().is_zero() {
        if let Some(i) = amount.to_i64() {
            return Value::from(i);
        }
        if let Some(u) = amount.to_u64() {
            return Value::from(u);
        }
    }

    f64::from_str(&amount.to_string())
        .ok()
        .and_then(Number::from_f64)
        .map_or(Value::Null, Value::Number)
}

/// Frames sent back to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Command refused by validation
    Rejected,
    /// Command accepted by validation but could not be made durable
    Unavailable,
    Balance(Decimal),
}

impl Response {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Rejected => json!({ "err": "nope" }),
            Self::Unavailable => json!({ "err": "unavailable" }),
            Self::Balance(balance) => json!({ "cmd": "balance", "balance": amount_to_json(*balance) }),
        }
    }
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
