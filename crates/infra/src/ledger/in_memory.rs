use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use arena_core::{Address, Wei};

use super::{LedgerClient, LedgerError, LedgerWrite, Receipt, SubmitOptions};

#[derive(Debug)]
struct State {
    paused: bool,
    resume_calls: u32,
    pause_calls: u32,
    fail_control: bool,

    registered: BTreeSet<Address>,
    balances: HashMap<Address, Wei>,

    used_nonces: BTreeSet<u64>,
    submissions: Vec<(LedgerWrite, Option<u64>)>,
    fail_addresses: HashSet<Address>,
    fail_next_submits: u32,
    submit_delay: Option<Duration>,
    in_flight: usize,
    max_in_flight: usize,

    standings: Option<String>,
    standings_calls: u32,
    standings_delay: Option<Duration>,
    standings_in_flight: usize,
    max_standings_in_flight: usize,
}

impl Default for State {
    fn default() -> Self {
        Self {
            paused: true,
            resume_calls: 0,
            pause_calls: 0,
            fail_control: false,
            registered: BTreeSet::new(),
            balances: HashMap::new(),
            used_nonces: BTreeSet::new(),
            submissions: Vec::new(),
            fail_addresses: HashSet::new(),
            fail_next_submits: 0,
            submit_delay: None,
            in_flight: 0,
            max_in_flight: 0,
            standings: Some(String::new()),
            standings_calls: 0,
            standings_delay: None,
            standings_in_flight: 0,
            max_standings_in_flight: 0,
        }
    }
}

impl State {
    fn lowest_free_nonce(&self) -> u64 {
        let mut n = 0;
        while self.used_nonces.contains(&n) {
            n += 1;
        }
        n
    }
}

/// In-memory ledger.
///
/// Intended for tests/dev. Models the parts of a real ledger the batch logic depends on:
/// a sequence number can be consumed once, writes to "bad" addresses are rejected, and
/// calls can be made to fail on demand.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: Mutex<State>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the standings returned by `fetch_standings`. `None` makes the fetch fail.
    pub fn set_standings(&self, raw: Option<&str>) {
        self.state.lock().unwrap().standings = raw.map(str::to_string);
    }

    /// Reject every write touching `address`.
    pub fn fail_address(&self, address: Address) {
        self.state.lock().unwrap().fail_addresses.insert(address);
    }

    /// Fail the next `n` submissions with a transport error.
    pub fn fail_next_submits(&self, n: u32) {
        self.state.lock().unwrap().fail_next_submits = n;
    }

    /// Make `resume_event`/`pause_event` fail (after counting the call).
    pub fn fail_control_calls(&self, fail: bool) {
        self.state.lock().unwrap().fail_control = fail;
    }

    /// Delay every submission, so concurrent submissions overlap.
    pub fn set_submit_delay(&self, delay: Duration) {
        self.state.lock().unwrap().submit_delay = Some(delay);
    }

    /// Delay every standings fetch, so a forced run can overlap a tick.
    pub fn set_standings_delay(&self, delay: Duration) {
        self.state.lock().unwrap().standings_delay = Some(delay);
    }

    /// Mark `address` registered without a submission.
    pub fn preregister(&self, address: Address) {
        self.state.lock().unwrap().registered.insert(address);
    }

    /// Consume a nonce out of band (another writer using the operator account).
    pub fn consume_nonce(&self, nonce: u64) {
        self.state.lock().unwrap().used_nonces.insert(nonce);
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().unwrap().paused
    }

    pub fn resume_calls(&self) -> u32 {
        self.state.lock().unwrap().resume_calls
    }

    pub fn pause_calls(&self) -> u32 {
        self.state.lock().unwrap().pause_calls
    }

    pub fn standings_calls(&self) -> u32 {
        self.state.lock().unwrap().standings_calls
    }

    pub fn registered(&self) -> Vec<Address> {
        self.state.lock().unwrap().registered.iter().cloned().collect()
    }

    pub fn balance_of(&self, address: &Address) -> Wei {
        self.state
            .lock()
            .unwrap()
            .balances
            .get(address)
            .copied()
            .unwrap_or(Wei::ZERO)
    }

    /// Every accepted non-dry-run submission, in acceptance order.
    pub fn submissions(&self) -> Vec<(LedgerWrite, Option<u64>)> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn used_nonces(&self) -> Vec<u64> {
        self.state.lock().unwrap().used_nonces.iter().copied().collect()
    }

    /// Highest number of standings fetches observed in flight at once.
    pub fn max_standings_in_flight(&self) -> usize {
        self.state.lock().unwrap().max_standings_in_flight
    }

    /// Highest number of submissions observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.state.lock().unwrap().max_in_flight
    }

    fn control_call(&self, resume: bool) -> Result<(), LedgerError> {
        let mut s = self.state.lock().unwrap();
        if resume {
            s.resume_calls += 1;
        } else {
            s.pause_calls += 1;
        }
        if s.fail_control {
            return Err(LedgerError::Transport("control call failed".to_string()));
        }
        s.paused = !resume;
        Ok(())
    }

    fn settle(
        &self,
        write: &LedgerWrite,
        nonce: Option<u64>,
        options: SubmitOptions,
    ) -> Result<Receipt, LedgerError> {
        let mut s = self.state.lock().unwrap();

        if s.fail_next_submits > 0 {
            s.fail_next_submits -= 1;
            return Err(LedgerError::Transport("connection reset".to_string()));
        }

        if let Some(bad) = write.addresses().into_iter().find(|a| s.fail_addresses.contains(*a)) {
            return Err(LedgerError::Rejected(format!("write to {bad} reverted")));
        }

        let nonce = match nonce {
            Some(n) if s.used_nonces.contains(&n) => {
                return Err(LedgerError::Rejected(format!("nonce {n} already used")));
            }
            Some(n) => n,
            None => s.lowest_free_nonce(),
        };

        if options.dry_run {
            return Ok(Receipt {
                nonce: Some(nonce),
                tx_ref: None,
                dry_run: true,
            });
        }

        s.used_nonces.insert(nonce);
        match write {
            LedgerWrite::Register { address } => {
                s.registered.insert(address.clone());
            }
            LedgerWrite::RegisterMany { addresses } => {
                s.registered.extend(addresses.iter().cloned());
            }
            LedgerWrite::Transfer { to, amount } => {
                let balance = s.balances.entry(to.clone()).or_insert(Wei::ZERO);
                *balance = balance
                    .checked_add(*amount)
                    .ok_or_else(|| LedgerError::Rejected("balance overflow".to_string()))?;
            }
        }
        s.submissions.push((write.clone(), Some(nonce)));

        Ok(Receipt {
            nonce: Some(nonce),
            tx_ref: Some(format!("0x{:064x}", s.submissions.len())),
            dry_run: false,
        })
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn resume_event(&self) -> Result<(), LedgerError> {
        self.control_call(true)
    }

    async fn pause_event(&self) -> Result<(), LedgerError> {
        self.control_call(false)
    }

    async fn fetch_standings(&self) -> Result<String, LedgerError> {
        let delay = {
            let mut s = self.state.lock().unwrap();
            s.standings_calls += 1;
            s.standings_in_flight += 1;
            s.max_standings_in_flight = s.max_standings_in_flight.max(s.standings_in_flight);
            s.standings_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut s = self.state.lock().unwrap();
        s.standings_in_flight -= 1;
        s.standings
            .clone()
            .ok_or_else(|| LedgerError::Transport("standings unavailable".to_string()))
    }

    async fn next_nonce(&self) -> Result<u64, LedgerError> {
        Ok(self.state.lock().unwrap().lowest_free_nonce())
    }

    async fn is_registered(&self, address: &Address) -> Result<bool, LedgerError> {
        Ok(self.state.lock().unwrap().registered.contains(address))
    }

    async fn submit(
        &self,
        write: &LedgerWrite,
        nonce: Option<u64>,
        options: SubmitOptions,
    ) -> Result<Receipt, LedgerError> {
        let delay = {
            let mut s = self.state.lock().unwrap();
            s.in_flight += 1;
            s.max_in_flight = s.max_in_flight.max(s.in_flight);
            s.submit_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = self.settle(write, nonce, options);
        self.state.lock().unwrap().in_flight -= 1;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::parse(&format!("0x{:040x}", n)).unwrap()
    }

    #[tokio::test]
    async fn nonce_cannot_be_reused() {
        let ledger = InMemoryLedger::new();
        let write = LedgerWrite::Register { address: addr(1) };

        ledger.submit(&write, Some(0), SubmitOptions::default()).await.unwrap();
        let err = ledger
            .submit(&write, Some(0), SubmitOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::Rejected(_)));
        assert_eq!(ledger.next_nonce().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn next_nonce_stops_at_first_gap() {
        let ledger = InMemoryLedger::new();
        ledger.consume_nonce(0);
        ledger.consume_nonce(2);
        assert_eq!(ledger.next_nonce().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn dry_run_leaves_state_untouched() {
        let ledger = InMemoryLedger::new();
        let write = LedgerWrite::Transfer {
            to: addr(2),
            amount: Wei::new(5),
        };

        let receipt = ledger.submit(&write, None, SubmitOptions::dry_run()).await.unwrap();

        assert!(receipt.dry_run);
        assert_eq!(ledger.balance_of(&addr(2)), Wei::ZERO);
        assert!(ledger.submissions().is_empty());
        assert!(ledger.used_nonces().is_empty());
    }

    #[tokio::test]
    async fn failed_write_does_not_consume_nonce() {
        let ledger = InMemoryLedger::new();
        ledger.fail_address(addr(3));

        let err = ledger
            .submit(&LedgerWrite::Register { address: addr(3) }, Some(0), SubmitOptions::default())
            .await;

        assert!(err.is_err());
        assert_eq!(ledger.next_nonce().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn control_calls_toggle_pause_and_count() {
        let ledger = InMemoryLedger::new();
        assert!(ledger.is_paused());

        ledger.resume_event().await.unwrap();
        ledger.resume_event().await.unwrap();
        assert!(!ledger.is_paused());
        assert_eq!(ledger.resume_calls(), 2);

        ledger.fail_control_calls(true);
        assert!(ledger.pause_event().await.is_err());
        assert!(!ledger.is_paused());
        assert_eq!(ledger.pause_calls(), 1);
    }
}
