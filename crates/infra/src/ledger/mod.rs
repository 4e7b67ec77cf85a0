//! Ledger capability consumed by the scheduler, the snapshot job and the batch operations.
//!
//! The ledger itself (consensus, signing, gas) is external. This module only names the
//! operations the rest of the system needs, so a fake can stand in for the real thing:
//!
//! - `InMemoryLedger`: fault-injectable ledger for tests/dev
//! - `CommandLedger`: shells out to an external task runner, one task per operation

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use arena_core::{Address, Wei};

pub mod command;
pub mod in_memory;

pub use command::CommandLedger;
pub use in_memory::InMemoryLedger;

/// Ledger errors.
///
/// All variants are transient from the caller's point of view: they are logged, counted
/// and possibly retried, never fatal to the process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The ledger refused the write (bad nonce, not allowed, insufficient funds).
    #[error("ledger rejected write: {0}")]
    Rejected(String),

    /// The ledger could not be reached or did not answer.
    #[error("ledger transport error: {0}")]
    Transport(String),

    /// The external task runner exited unsuccessfully.
    #[error("ledger command `{command}` failed: {stderr}")]
    Command { command: String, stderr: String },

    /// The ledger answered with something we could not interpret.
    #[error("malformed ledger response: {0}")]
    Malformed(String),
}

/// A single ledger-mutating operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerWrite {
    /// Add one address to the participant allow-list.
    Register { address: Address },
    /// Add many addresses to the allow-list in one transaction.
    RegisterMany { addresses: Vec<Address> },
    /// Send native currency from the operator account.
    Transfer { to: Address, amount: Wei },
}

impl LedgerWrite {
    /// Addresses touched by this write.
    pub fn addresses(&self) -> Vec<&Address> {
        match self {
            LedgerWrite::Register { address } => vec![address],
            LedgerWrite::RegisterMany { addresses } => addresses.iter().collect(),
            LedgerWrite::Transfer { to, .. } => vec![to],
        }
    }
}

/// Per-submission options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Validate the write without executing it.
    pub dry_run: bool,
}

impl SubmitOptions {
    pub fn dry_run() -> Self {
        Self { dry_run: true }
    }
}

/// Confirmation of a settled write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub nonce: Option<u64>,
    /// Ledger-side reference (transaction hash) when the ledger reports one.
    pub tx_ref: Option<String>,
    pub dry_run: bool,
}

/// Operations the core needs from the ledger.
///
/// `resume_event`/`pause_event` must be idempotent on the ledger side: the scheduler may
/// call them again after a restart.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn resume_event(&self) -> Result<(), LedgerError>;

    async fn pause_event(&self) -> Result<(), LedgerError>;

    /// Raw standings as newline-delimited `address, score, txCount` text.
    ///
    /// Records are passed through untouched; malformed lines are the caller's concern.
    async fn fetch_standings(&self) -> Result<String, LedgerError>;

    /// Next unused sequence number of the operator account.
    async fn next_nonce(&self) -> Result<u64, LedgerError>;

    async fn is_registered(&self, address: &Address) -> Result<bool, LedgerError>;

    /// Submit one write and wait for its confirmation.
    ///
    /// `nonce: None` lets the ledger pick the next sequence number.
    async fn submit(
        &self,
        write: &LedgerWrite,
        nonce: Option<u64>,
        options: SubmitOptions,
    ) -> Result<Receipt, LedgerError>;
}

/// Pick the ledger adapter for a configured command prefix.
///
/// A missing or blank prefix selects the in-memory ledger (development only).
pub fn connect(command: Option<&str>) -> Arc<dyn LedgerClient> {
    match command.and_then(CommandLedger::from_command_line) {
        Some(ledger) => {
            info!(command = command.unwrap_or_default(), "using command-line ledger");
            Arc::new(ledger)
        }
        None => {
            warn!("LEDGER_COMMAND not set; using in-memory ledger (nothing reaches a real ledger)");
            Arc::new(InMemoryLedger::new())
        }
    }
}
