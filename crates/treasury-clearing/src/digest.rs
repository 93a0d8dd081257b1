//! Pass digest for audit comparison.
//!
//! Two auditors netting the same obligation set must arrive at the same
//! transfers. The digest covers the ordered net transfers only, so it is
//! independent of pass ids, transfer ids and timestamps.

use sha2::{Digest, Sha256};
use treasury_types::constants::PASS_DIGEST_DOMAIN;

use crate::netting::NetTransfer;

/// SHA-256 over the ordered transfers of a pass.
///
/// Amounts are hashed in normalized form so `20` and `20.00` agree.
#[must_use]
pub fn compute_pass_digest(transfers: &[NetTransfer]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(PASS_DIGEST_DOMAIN);
    hasher.update((transfers.len() as u64).to_le_bytes());

    for transfer in transfers {
        hasher.update(transfer.debtor.as_bytes());
        hasher.update(transfer.creditor.as_bytes());
        hasher.update(transfer.amount.normalize().to_string().as_bytes());
        hasher.update([0u8]);
    }

    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    digest
}
