//! Advisory removal of temporary files.

use std::path::Path;
use tracing::debug;

use crate::types::ItemId;

/// Remove a temporary file, ignoring any failure
///
/// Unlike close and rename, removal has no error channel: a leftover file is
/// never reported as a failed item.
pub(crate) async fn discard_temp(item_id: ItemId, path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(item_id = item_id.0, ?path, "removed temporary file"),
        Err(e) => debug!(item_id = item_id.0, ?path, error = %e, "could not remove temporary file"),
    }
}
