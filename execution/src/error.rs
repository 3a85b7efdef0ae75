use colorpot_types::RoundPhase;
use thiserror::Error;

/// Errors returned by table, round, pool and wallet operations.
///
/// Every variant is recoverable and every failing call leaves state untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid stake amount (minimum {min})")]
    InvalidAmount { min: u64 },
    #[error("insufficient funds (balance={balance}, required={required})")]
    InsufficientFunds { balance: u64, required: u64 },
    #[error("round is not open for bets (phase={phase})")]
    RoundNotOpen { phase: RoundPhase },
    #[error("cannot {action} a round in phase {phase}")]
    InvalidState {
        phase: RoundPhase,
        action: &'static str,
    },
    #[error("round has no participants")]
    NoParticipants,
    #[error("draw {draw} outside [0, {bank})")]
    DrawOutOfRange { draw: u64, bank: u64 },
    #[error("balance overflow")]
    BalanceOverflow,
    #[error("unknown round {0}")]
    UnknownRound(u64),
    #[error("invalid user id")]
    InvalidUserId,
    #[error("invalid color label")]
    InvalidColorLabel,
    #[error("unknown currency {0}")]
    UnknownCurrency(String),
}

impl EngineError {
    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAmount { .. } => "INVALID_AMOUNT",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::RoundNotOpen { .. } => "ROUND_NOT_OPEN",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::NoParticipants => "NO_PARTICIPANTS",
            Self::DrawOutOfRange { .. } => "DRAW_OUT_OF_RANGE",
            Self::BalanceOverflow => "BALANCE_OVERFLOW",
            Self::UnknownRound(_) => "UNKNOWN_ROUND",
            Self::InvalidUserId => "INVALID_USER_ID",
            Self::InvalidColorLabel => "INVALID_COLOR_LABEL",
            Self::UnknownCurrency(_) => "UNKNOWN_CURRENCY",
        }
    }
}
