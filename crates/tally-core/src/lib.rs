//! Tally Core Library
//!
//! Shared functionality for the Tally receipt settlement service:
//! - Vision model gateway with ordered candidate failover and mock fallback
//! - Cent-exact allocation engine for splitting items across participants
//! - Settlement snapshot store with per-participant history queries
//! - Session and participant directory glue for the API layer

pub mod ai;
pub mod allocation;
pub mod db;
pub mod error;
pub mod models;
pub mod money;

pub use ai::{
    AttemptOutcome, GatewayConfig, LineItem, ModelGateway, ModelHintCache, ParseAttempt,
    ParseResult, ParseSource, ParsedSummary, ProviderError, VisionProvider, UNKNOWN_CURRENCY,
};
pub use allocation::finalize;
pub use db::Database;
pub use error::{Error, Result};
pub use models::{
    Allocation, ItemKind, ItemTotal, ParticipantInfo, ParticipantSettlement, ParticipantTotal,
    Session, SettlementItem, SettlementResult, SettlementSnapshot, SettlementTotals, SplitKind,
};
pub use money::round2;
