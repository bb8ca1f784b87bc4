//! Human-readable rendering of [`FlowState`].

use ibt_flow::{chain_info, Address, ChainInfo, FlowState, TxKind, H256};

/// `0x1234…abcd`
pub fn short_address(address: Address) -> String {
    let full = format!("{address:?}");
    format!("{}…{}", &full[..6], &full[full.len() - 4..])
}

fn maybe_address(address: Option<Address>) -> String {
    address.map(short_address).unwrap_or_else(|| "nobody".into())
}

fn explorer_link(chain: Option<&ChainInfo>, hash: H256) -> String {
    match chain {
        Some(chain) => format!("Check on {}: {}", chain.explorer_name, chain.tx_url(hash)),
        None => format!("Transaction {hash:?}"),
    }
}

/// Message shown for `state`. `chain` is the required chain, used for
/// explorer links.
pub fn describe(state: &FlowState, chain: Option<&ChainInfo>) -> String {
    match *state {
        FlowState::Disconnected => {
            "Connect to check membership (set IBT_PRIVATE_KEY).".into()
        }
        FlowState::WrongNetwork { current, required } => {
            let name = chain_info(required)
                .map(|info| info.display_name.to_string())
                .unwrap_or_else(|| format!("chain {required}"));
            format!(
                "Connected to chain {current}. Please switch to {name} network! (ibt switch-network)"
            )
        }
        FlowState::NeedsProof { account } => format!(
            "Please prove your identity for {}, then run `ibt verify --response <file>`.",
            short_address(account)
        ),
        FlowState::TxPending { kind, hash } => {
            let action = match kind {
                TxKind::Mint => "Minting your IBT…",
                TxKind::Reclaim => "Moving your IBT…",
            };
            format!("{action} {}", explorer_link(chain, hash))
        }
        FlowState::TxSucceeded {
            kind: TxKind::Mint, ..
        } => "Congratulations! Your soul is now linked to your IBT.".into(),
        FlowState::TxSucceeded {
            kind: TxKind::Reclaim,
            account,
            ..
        } => format!("Success! {} now owns your IBT.", short_address(account)),
        FlowState::TxFailed { kind, hash } => {
            format!("The {kind} transaction failed. {}", explorer_link(chain, hash))
        }
        FlowState::Resolving => "Checking your IBT…".into(),
        FlowState::ReclaimBlocked { .. } => "You cannot claim your IBT with this address, \
             since it has owned the IBT before.\n\
             Please switch to a different account in your wallet to continue."
            .into(),
        FlowState::ReclaimOffer { account, owner } => format!(
            "You're about to claim your IBT with {}.\n\
             Please remember, {} will lose access to this IBT FOREVER.",
            short_address(account),
            maybe_address(owner)
        ),
        FlowState::Unminted => "Mint your membership IBT now (ibt mint).".into(),
        FlowState::MintedOwned { token_id } => {
            format!("Congratulations! Your soul is linked to IBT #{token_id}!")
        }
        FlowState::MintedNotOwned { token_id, owner } => format!(
            "Congratulations! Your soul is linked to IBT #{token_id}.\n\
             Your IBT is owned by {}.\n\
             Do you want to claim your IBT with a different address? (ibt reclaim)",
            maybe_address(owner)
        ),
    }
}
