//! Reclaim gate: has the connected account ever held the token?
//!
//! `addressHasBeenUsed` never flips back to false, so a `true` answer is
//! remembered for the rest of the session and never re-queried or downgraded.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::error::Result;
use crate::ownership::ReadTicket;
use crate::ports::IbtContract;
use crate::types::{Address, Resolution};

/// `addressHasBeenUsed(account)`
pub async fn has_account_ever_owned<C>(contract: &C, account: Address) -> Result<bool>
where
    C: IbtContract + ?Sized,
{
    contract.address_has_been_used(account).await
}

#[derive(Debug, Default)]
pub struct ReclaimEligibility {
    generation: u64,
    account: Option<Address>,
    resolution: Resolution<bool>,
    used: HashSet<Address>,
}

impl ReclaimEligibility {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a read for `account`, or `None` if the account is already known
    /// to be used.
    pub fn begin(&mut self, account: Address) -> Option<ReadTicket<Address>> {
        if self.account != Some(account) {
            self.account = Some(account);
            self.resolution = Resolution::Pending;
        }
        self.generation += 1;

        if self.used.contains(&account) {
            self.resolution = Resolution::Resolved(true);
            return None;
        }
        Some(ReadTicket::new(self.generation, account))
    }

    /// Apply a finished read; stale tickets and failed reads are ignored.
    pub fn complete(&mut self, ticket: ReadTicket<Address>, result: Result<bool>) -> bool {
        let account = ticket.key();
        if ticket.generation() != self.generation || self.account != Some(account) {
            debug!(?account, "discarding superseded eligibility read");
            return false;
        }

        match result {
            Ok(true) => {
                if self.used.insert(account) {
                    info!(?account, "account has held the IBT before, reclaim blocked");
                }
                self.resolution = Resolution::Resolved(true);
                true
            }
            Ok(false) => {
                let used = self.used.contains(&account);
                self.resolution = Resolution::Resolved(used);
                true
            }
            Err(err) => {
                debug!(?account, error = %err, "eligibility read failed, will retry");
                false
            }
        }
    }

    /// Force a fresh read for the current account.
    pub fn invalidate(&mut self) {
        self.generation += 1;
        if let Some(account) = self.account {
            self.resolution = if self.used.contains(&account) {
                Resolution::Resolved(true)
            } else {
                Resolution::Pending
            };
        }
    }

    /// Drop the current account; known-used accounts are kept.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.account = None;
        self.resolution = Resolution::Pending;
    }

    pub fn resolution(&self) -> Resolution<bool> {
        self.resolution
    }

    pub fn is_known_used(&self, account: Address) -> bool {
        self.used.contains(&account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowError;

    fn account(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    #[test]
    fn resolves_for_current_account() {
        let mut gate = ReclaimEligibility::new();
        let ticket = gate.begin(account(1)).unwrap();
        assert!(gate.resolution().is_pending());

        assert!(gate.complete(ticket, Ok(false)));
        assert_eq!(gate.resolution(), Resolution::Resolved(false));
    }

    #[test]
    fn read_for_previous_account_is_discarded() {
        let mut gate = ReclaimEligibility::new();
        let old = gate.begin(account(1)).unwrap();
        gate.reset();
        let _current = gate.begin(account(2)).unwrap();

        assert!(!gate.complete(old, Ok(true)));
        assert!(gate.resolution().is_pending());
        assert!(!gate.is_known_used(account(1)));
    }

    #[test]
    fn used_is_terminal_for_the_session() {
        let mut gate = ReclaimEligibility::new();
        let ticket = gate.begin(account(1)).unwrap();
        gate.complete(ticket, Ok(true));

        gate.reset();
        gate.begin(account(2));
        gate.reset();

        assert!(gate.begin(account(1)).is_none());
        assert_eq!(gate.resolution(), Resolution::Resolved(true));

        gate.invalidate();
        assert_eq!(gate.resolution(), Resolution::Resolved(true));
    }

    #[test]
    fn late_false_never_downgrades_a_used_account() {
        let mut gate = ReclaimEligibility::new();
        let first = gate.begin(account(1)).unwrap();
        gate.complete(first, Ok(true));

        gate.used.remove(&account(1));
        let second = gate.begin(account(1)).unwrap();
        gate.used.insert(account(1));
        gate.complete(second, Ok(false));

        assert_eq!(gate.resolution(), Resolution::Resolved(true));
    }

    #[test]
    fn failed_read_stays_pending() {
        let mut gate = ReclaimEligibility::new();
        let ticket = gate.begin(account(1)).unwrap();
        assert!(!gate.complete(ticket, Err(FlowError::Rpc("503".into()))));
        assert!(gate.resolution().is_pending());
    }
}
