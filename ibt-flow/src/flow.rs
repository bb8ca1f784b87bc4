//! Pure derivation of the flow state from a snapshot of its inputs.
//!
//! Priority, first match wins:
//!
//! ```text
//! Disconnected > WrongNetwork > NeedsProof > TxPending > TxSucceeded > TxFailed >
//!   reclaiming (and not the owner) ? [Resolving > ReclaimBlocked > ReclaimOffer]
//!                                   : [Resolving > Unminted > MintedOwned | MintedNotOwned]
//! ```

use crate::ownership::Ownership;
use crate::transaction::{PendingTransaction, TxStatus};
use crate::types::{Address, ChainId, Resolution, TokenId, TxKind, H256};

/// Everything `derive_state` looks at. Built fresh for every recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowSnapshot {
    pub account: Option<Address>,
    pub chain_id: Option<ChainId>,
    pub required_chain: ChainId,
    /// A decodable proof is cached for `(contract, account)`.
    pub has_proof: bool,
    pub transaction: Option<PendingTransaction>,
    pub ownership: Resolution<Ownership>,
    pub reclaim_used: Resolution<bool>,
    pub reclaim_requested: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Disconnected,
    WrongNetwork {
        current: ChainId,
        required: ChainId,
    },
    NeedsProof {
        account: Address,
    },
    TxPending {
        kind: TxKind,
        hash: H256,
    },
    TxSucceeded {
        kind: TxKind,
        hash: H256,
        account: Address,
    },
    TxFailed {
        kind: TxKind,
        hash: H256,
    },
    /// A read needed to choose the next state has not resolved yet.
    Resolving,
    ReclaimBlocked {
        account: Address,
    },
    ReclaimOffer {
        account: Address,
        owner: Option<Address>,
    },
    Unminted,
    MintedOwned {
        token_id: TokenId,
    },
    MintedNotOwned {
        token_id: TokenId,
        owner: Option<Address>,
    },
}

/// The single user action a state permits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ConnectWallet,
    SwitchNetwork(ChainId),
    Verify,
    SubmitMint,
    SubmitReclaim,
    StartReclaim,
    Dismiss,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ConnectWallet => "connect wallet",
            Self::SwitchNetwork(_) => "switch network",
            Self::Verify => "verify identity",
            Self::SubmitMint => "mint",
            Self::SubmitReclaim => "reclaim",
            Self::StartReclaim => "start reclaim",
            Self::Dismiss => "dismiss",
        }
    }
}

impl FlowState {
    pub fn action(&self) -> Option<Action> {
        match self {
            Self::Disconnected => Some(Action::ConnectWallet),
            Self::WrongNetwork { required, .. } => Some(Action::SwitchNetwork(*required)),
            Self::NeedsProof { .. } => Some(Action::Verify),
            Self::TxFailed { .. } => Some(Action::Dismiss),
            Self::ReclaimOffer { .. } => Some(Action::SubmitReclaim),
            Self::Unminted => Some(Action::SubmitMint),
            Self::MintedOwned { .. } | Self::MintedNotOwned { .. } => Some(Action::StartReclaim),
            Self::TxPending { .. }
            | Self::TxSucceeded { .. }
            | Self::Resolving
            | Self::ReclaimBlocked { .. } => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::WrongNetwork { .. } => "wrong-network",
            Self::NeedsProof { .. } => "needs-proof",
            Self::TxPending { .. } => "tx-pending",
            Self::TxSucceeded { .. } => "tx-succeeded",
            Self::TxFailed { .. } => "tx-failed",
            Self::Resolving => "resolving",
            Self::ReclaimBlocked { .. } => "reclaim-blocked",
            Self::ReclaimOffer { .. } => "reclaim-offer",
            Self::Unminted => "unminted",
            Self::MintedOwned { .. } => "minted-owned",
            Self::MintedNotOwned { .. } => "minted-not-owned",
        }
    }
}

pub fn derive_state(snapshot: &FlowSnapshot) -> FlowState {
    let Some(account) = snapshot.account else {
        return FlowState::Disconnected;
    };

    if let Some(current) = snapshot.chain_id {
        if current != snapshot.required_chain {
            return FlowState::WrongNetwork {
                current,
                required: snapshot.required_chain,
            };
        }
    }

    if !snapshot.has_proof {
        return FlowState::NeedsProof { account };
    }

    if let Some(tx) = snapshot.transaction.filter(|tx| tx.account == account) {
        let PendingTransaction { hash, kind, .. } = tx;
        return match tx.status {
            TxStatus::Submitted => FlowState::TxPending { kind, hash },
            TxStatus::Confirmed => FlowState::TxSucceeded {
                kind,
                hash,
                account,
            },
            TxStatus::Failed => FlowState::TxFailed { kind, hash },
        };
    }

    let Resolution::Resolved(ownership) = snapshot.ownership else {
        return FlowState::Resolving;
    };

    match ownership {
        Ownership::Unminted => FlowState::Unminted,
        Ownership::Minted { token_id, owner } => {
            let owned = owner == Some(account);
            if snapshot.reclaim_requested && !owned {
                return match snapshot.reclaim_used {
                    Resolution::Pending => FlowState::Resolving,
                    Resolution::Resolved(true) => FlowState::ReclaimBlocked { account },
                    Resolution::Resolved(false) => FlowState::ReclaimOffer { account, owner },
                };
            }
            if owned {
                FlowState::MintedOwned { token_id }
            } else {
                FlowState::MintedNotOwned { token_id, owner }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{POLYGON_CHAIN_ID, U256};

    fn alice() -> Address {
        Address::from_low_u64_be(0xa11ce)
    }

    fn bob() -> Address {
        Address::from_low_u64_be(0xb0b)
    }

    fn base() -> FlowSnapshot {
        FlowSnapshot {
            account: Some(alice()),
            chain_id: Some(POLYGON_CHAIN_ID),
            required_chain: POLYGON_CHAIN_ID,
            has_proof: true,
            transaction: None,
            ownership: Resolution::Resolved(Ownership::Unminted),
            reclaim_used: Resolution::Pending,
            reclaim_requested: false,
        }
    }

    fn minted_by(owner: Address) -> Resolution<Ownership> {
        Resolution::Resolved(Ownership::Minted {
            token_id: U256::from(7),
            owner: Some(owner),
        })
    }

    fn tx(status: TxStatus, kind: TxKind, account: Address) -> Option<PendingTransaction> {
        Some(PendingTransaction {
            hash: H256::from_low_u64_be(1),
            kind,
            status,
            account,
        })
    }

    #[test]
    fn disconnected_wins_over_everything() {
        let snapshot = FlowSnapshot {
            account: None,
            chain_id: Some(1),
            transaction: tx(TxStatus::Submitted, TxKind::Mint, alice()),
            ..base()
        };
        assert_eq!(derive_state(&snapshot), FlowState::Disconnected);
        assert_eq!(derive_state(&snapshot).action(), Some(Action::ConnectWallet));
    }

    #[test]
    fn wrong_network_wins_over_proof_and_token_status() {
        let snapshot = FlowSnapshot {
            chain_id: Some(1),
            has_proof: false,
            ownership: minted_by(alice()),
            ..base()
        };
        let state = derive_state(&snapshot);
        assert_eq!(
            state,
            FlowState::WrongNetwork {
                current: 1,
                required: POLYGON_CHAIN_ID
            }
        );
        assert_eq!(state.action(), Some(Action::SwitchNetwork(POLYGON_CHAIN_ID)));
    }

    #[test]
    fn unknown_chain_does_not_block_the_flow() {
        let snapshot = FlowSnapshot {
            chain_id: None,
            ..base()
        };
        assert_eq!(derive_state(&snapshot), FlowState::Unminted);
    }

    #[test]
    fn missing_proof_needs_verification() {
        let snapshot = FlowSnapshot {
            has_proof: false,
            transaction: tx(TxStatus::Submitted, TxKind::Mint, alice()),
            ..base()
        };
        assert_eq!(derive_state(&snapshot), FlowState::NeedsProof { account: alice() });
        assert_eq!(derive_state(&snapshot).action(), Some(Action::Verify));
    }

    #[test]
    fn pending_transaction_offers_no_action() {
        let snapshot = FlowSnapshot {
            transaction: tx(TxStatus::Submitted, TxKind::Reclaim, alice()),
            reclaim_requested: true,
            ..base()
        };
        let state = derive_state(&snapshot);
        assert_eq!(
            state,
            FlowState::TxPending {
                kind: TxKind::Reclaim,
                hash: H256::from_low_u64_be(1)
            }
        );
        assert_eq!(state.action(), None);
    }

    #[test]
    fn confirmed_and_failed_are_distinct() {
        let confirmed = FlowSnapshot {
            transaction: tx(TxStatus::Confirmed, TxKind::Mint, alice()),
            ..base()
        };
        let failed = FlowSnapshot {
            transaction: tx(TxStatus::Failed, TxKind::Mint, alice()),
            ..base()
        };
        assert!(matches!(
            derive_state(&confirmed),
            FlowState::TxSucceeded { kind: TxKind::Mint, .. }
        ));
        assert_eq!(derive_state(&confirmed).action(), None);
        assert!(matches!(derive_state(&failed), FlowState::TxFailed { kind: TxKind::Mint, .. }));
        assert_eq!(derive_state(&failed).action(), Some(Action::Dismiss));
    }

    #[test]
    fn transaction_of_another_account_is_not_displayed() {
        let snapshot = FlowSnapshot {
            transaction: tx(TxStatus::Submitted, TxKind::Mint, bob()),
            ..base()
        };
        assert_eq!(derive_state(&snapshot), FlowState::Unminted);
    }

    #[test]
    fn unresolved_ownership_offers_no_write() {
        let snapshot = FlowSnapshot {
            ownership: Resolution::Pending,
            ..base()
        };
        assert_eq!(derive_state(&snapshot), FlowState::Resolving);
        assert_eq!(derive_state(&snapshot).action(), None);
    }

    #[test]
    fn unminted_offers_mint() {
        assert_eq!(derive_state(&base()).action(), Some(Action::SubmitMint));
    }

    #[test]
    fn minted_states_offer_reclaim_toggle() {
        let owned = FlowSnapshot {
            ownership: minted_by(alice()),
            ..base()
        };
        let not_owned = FlowSnapshot {
            ownership: minted_by(bob()),
            ..base()
        };
        assert_eq!(
            derive_state(&owned),
            FlowState::MintedOwned {
                token_id: U256::from(7)
            }
        );
        assert_eq!(
            derive_state(&not_owned),
            FlowState::MintedNotOwned {
                token_id: U256::from(7),
                owner: Some(bob())
            }
        );
        assert_eq!(derive_state(&owned).action(), Some(Action::StartReclaim));
        assert_eq!(derive_state(&not_owned).action(), Some(Action::StartReclaim));
    }

    #[test]
    fn reclaim_waits_for_eligibility() {
        let snapshot = FlowSnapshot {
            ownership: minted_by(bob()),
            reclaim_requested: true,
            ..base()
        };
        assert_eq!(derive_state(&snapshot), FlowState::Resolving);
    }

    #[test]
    fn used_account_is_blocked() {
        let snapshot = FlowSnapshot {
            ownership: minted_by(bob()),
            reclaim_requested: true,
            reclaim_used: Resolution::Resolved(true),
            ..base()
        };
        let state = derive_state(&snapshot);
        assert_eq!(state, FlowState::ReclaimBlocked { account: alice() });
        assert_eq!(state.action(), None);
    }

    #[test]
    fn fresh_account_is_offered_reclaim() {
        let snapshot = FlowSnapshot {
            ownership: minted_by(bob()),
            reclaim_requested: true,
            reclaim_used: Resolution::Resolved(false),
            ..base()
        };
        let state = derive_state(&snapshot);
        assert_eq!(
            state,
            FlowState::ReclaimOffer {
                account: alice(),
                owner: Some(bob())
            }
        );
        assert_eq!(state.action(), Some(Action::SubmitReclaim));
    }

    #[test]
    fn owner_requesting_reclaim_stays_minted_owned() {
        let snapshot = FlowSnapshot {
            ownership: minted_by(alice()),
            reclaim_requested: true,
            reclaim_used: Resolution::Resolved(true),
            ..base()
        };
        assert!(matches!(derive_state(&snapshot), FlowState::MintedOwned { .. }));
    }
}
