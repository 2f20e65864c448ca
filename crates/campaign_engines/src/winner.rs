#![forbid(unsafe_code)]

use campaign_kernel_contracts::submission::SubmissionRecord;
use campaign_storage::repo::SubmissionLedgerRepo;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

/// Draws one submission uniformly over the ids present right now.
/// Draws are independent; nothing is marked as having won.
pub fn pick_winner<R, G>(repo: &R, rng: &mut G) -> Option<SubmissionRecord>
where
    R: SubmissionLedgerRepo,
    G: Rng + ?Sized,
{
    let ids = repo.submission_ids();
    let id = ids.choose(rng)?;
    let record = repo.submission_row(*id).cloned();
    if let Some(winner) = &record {
        info!(submission_id = winner.id.0, pool = ids.len(), "winner drawn");
    }
    record
}
