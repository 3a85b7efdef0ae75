//! JSON messages exchanged with clients over HTTP and WebSocket.
//!
//! Amounts are integers in the minor units of the table's currency (see `GET /tables`).

use colorpot_execution::{normalize_amount, EngineError};
use colorpot_types::api::{ResolutionView, SnapshotView};
use colorpot_types::Stake;
use serde::{Deserialize, Serialize};
use serde_json::Number;

/// Requests accepted on `/ws`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    Join {
        request_id: String,
        currency: String,
        user_id: String,
    },
    Bet {
        request_id: String,
        currency: String,
        user_id: String,
        amount: Number,
        color_label: Option<String>,
    },
}

/// Direct reply to one WebSocket request.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundResponse {
    Ack {
        request_id: String,
        balance: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        stake: Option<Stake>,
    },
    Error {
        request_id: String,
        code: String,
        message: String,
    },
}

impl OutboundResponse {
    pub fn error(request_id: String, err: &EngineError) -> Self {
        Self::Error {
            request_id,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// A view tagged with the currency of the table it came from.
#[derive(Clone, Debug, Serialize)]
pub struct Scoped<T> {
    pub currency: String,
    #[serde(flatten)]
    pub view: T,
}

impl<T> Scoped<T> {
    pub fn new(currency: &str, view: T) -> Self {
        Self {
            currency: currency.to_string(),
            view,
        }
    }
}

/// Broadcast to every connected client.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    State(Scoped<SnapshotView>),
    Result(Scoped<ResolutionView>),
}

#[derive(Debug, Deserialize)]
pub struct BetRequest {
    pub user_id: String,
    pub amount: Number,
    pub color_label: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    pub user_id: String,
    pub amount: Number,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl From<&EngineError> for ErrorBody {
    fn from(err: &EngineError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Minor-unit amount from a JSON number. Integers pass through; floats must be whole.
pub fn parse_amount(amount: &Number, min: u64) -> Result<u64, EngineError> {
    if let Some(amount) = amount.as_u64() {
        return Ok(amount);
    }
    let raw = amount
        .as_f64()
        .ok_or(EngineError::InvalidAmount { min })?;
    normalize_amount(raw, min)
}
