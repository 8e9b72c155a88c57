use crate::index::MediaIndex;
use crate::structs::{MediaRecord, MediaUpdate, RenameTarget, UpdateOutcome};
use tracing::{error, info, warn};

/// Issues exactly one index update for `target`. The outcome is returned as a value.
pub async fn apply_rename(
    index: &dyn MediaIndex,
    record: &MediaRecord,
    target: &RenameTarget,
) -> UpdateOutcome {
    let outcome = index.update(record.id, &MediaUpdate::from(target)).await;
    match &outcome {
        UpdateOutcome::Updated(0) => {
            warn!(media_id = %record.id, name = %target.display_name, "Rename updated no rows");
        }
        UpdateOutcome::Updated(rows) => info!(
            media_id = %record.id,
            from = %record.display_name,
            to = %target.display_name,
            location = ?target.relative_path,
            rows,
            "Renamed photo"
        ),
        UpdateOutcome::NeedsConsent(handle) => {
            info!(media_id = %record.id, consent = %handle, "Rename needs user consent");
        }
        UpdateOutcome::Failed(reason) => {
            error!(media_id = %record.id, %reason, "Rename failed");
        }
    }
    outcome
}
