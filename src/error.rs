// src/error.rs

use thiserror::Error;

use crate::types::U256;

/// Arithmetic failures. The curve never wraps silently: any would-be
/// underflow or overflow aborts the whole operation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    #[error("subtraction would underflow")]
    Underflow,

    #[error("multiplication would overflow")]
    Overflow,

    #[error("division by zero")]
    DivisionByZero,
}

/// Failure reported by an external collaborator (vault, token, hook).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{collaborator} call failed: {reason}")]
pub struct CallError {
    pub collaborator: &'static str,
    pub reason: String,
}

impl CallError {
    pub fn new(collaborator: &'static str, reason: impl Into<String>) -> Self {
        Self {
            collaborator,
            reason: reason.into(),
        }
    }
}

/// Broad failure categories, for callers that route on class rather than
/// cause (re-quote vs. fix-your-call vs. wait vs. broken).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Input,
    Config,
    Authorization,
    State,
    Slippage,
    Arithmetic,
    Balance,
    External,
}

/// Engine operation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("funding goal must be positive")]
    InvalidFundingGoal,

    #[error("average price below sqrt(0.75)")]
    AveragePriceTooLow,

    #[error("average price must be below 1.0")]
    AveragePriceTooHigh,

    #[error("withdrawal fee {0} exceeds 10000 basis points")]
    FeeOutOfRange(u16),

    #[error("caller is not the owner")]
    NotOwner,

    #[error("contract is locked")]
    Locked,

    #[error("goals have not been configured")]
    NotConfigured,

    #[error("goals already active, trading has begun")]
    GoalsAlreadyActive,

    #[error("vault approval not initialized")]
    VaultNotInitialized,

    #[error("reentrant call rejected")]
    Reentrancy,

    #[error("slippage: output {actual} below minimum {min}")]
    Slippage { min: U256, actual: U256 },

    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: U256, need: U256 },

    #[error("insufficient allowance: have {have}, need {need}")]
    InsufficientAllowance { have: U256, need: U256 },

    #[error(transparent)]
    Math(#[from] MathError),

    #[error(transparent)]
    External(#[from] CallError),
}

impl EngineError {
    /// Category of this error per the engine's taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::ZeroAmount => ErrorKind::Input,
            EngineError::InvalidFundingGoal
            | EngineError::AveragePriceTooLow
            | EngineError::AveragePriceTooHigh
            | EngineError::FeeOutOfRange(_) => ErrorKind::Config,
            EngineError::NotOwner => ErrorKind::Authorization,
            EngineError::Locked
            | EngineError::NotConfigured
            | EngineError::GoalsAlreadyActive
            | EngineError::VaultNotInitialized
            | EngineError::Reentrancy => ErrorKind::State,
            EngineError::Slippage { .. } => ErrorKind::Slippage,
            EngineError::InsufficientBalance { .. } => ErrorKind::Balance,
            EngineError::InsufficientAllowance { .. } => ErrorKind::Balance,
            EngineError::Math(_) => ErrorKind::Arithmetic,
            EngineError::External(_) => ErrorKind::External,
        }
    }
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
