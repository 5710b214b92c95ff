// src/events.rs

use serde::{Deserialize, Serialize};

use crate::types::{Address, U256};

/// Notifications emitted by the engine. Every state change produces exactly
/// the records listed here; indexers treat them as the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// Collateral added, bonding tokens minted.
    LiquidityAdded {
        caller: Address,
        input_amount: U256,
        bonding_out: U256,
    },

    /// Bonding tokens burned, collateral released.
    LiquidityRemoved {
        caller: Address,
        bonding_amount: U256,
        input_out: U256,
    },

    /// Withdrawal fee haircut applied during a remove. The fee only reduces
    /// the payout; it is never transferred anywhere.
    FeeCollected {
        caller: Address,
        bonding_amount: U256,
        fee_amount: U256,
    },

    /// Withdrawal fee setting changed.
    WithdrawalFeeUpdated { old_bps: u16, new_bps: u16 },

    /// Trading paused.
    ContractLocked { caller: Address },

    /// Trading resumed.
    ContractUnlocked { caller: Address },

    /// Custodian reference swapped; vault approval must be re-initialized.
    VaultChanged { caller: Address },
}

impl Event {
    /// Stable name for log lines and indexing.
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::LiquidityAdded { .. } => "liquidity_added",
            Event::LiquidityRemoved { .. } => "liquidity_removed",
            Event::FeeCollected { .. } => "fee_collected",
            Event::WithdrawalFeeUpdated { .. } => "withdrawal_fee_updated",
            Event::ContractLocked { .. } => "contract_locked",
            Event::ContractUnlocked { .. } => "contract_unlocked",
            Event::VaultChanged { .. } => "vault_changed",
        }
    }
}

/// Event sink interface. Implement this to index engine events.
pub trait EventSink {
    fn record(&mut self, event: Event);
}

/// In-memory sink, used in tests and small deployments.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventSink {
    events: Vec<Event>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn latest(&self) -> Option<&Event> {
        self.events.last()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for InMemoryEventSink {
    fn record(&mut self, event: Event) {
        self.events.push(event);
    }
}
