// Decides, per reference, which side of the sync wins.
use crate::model::{CheckboxState, LocalReference, RemoteTask, StatusTable};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Why a reference was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoOpReason {
    /// Both sides already agree on the bucket.
    InSync,
    /// The link is not on a checkbox line; checkboxes are never inserted.
    NoCheckbox,
    /// The checkbox holds a glyph outside the known set.
    UnknownGlyph,
    /// The remote status is in no bucket.
    UnmappedStatus,
    /// The local glyph is `[-]` but the board has no cancelled status.
    CancelUnsupported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Write this status to the remote task.
    Push(String),
    /// Rewrite the local glyph.
    Pull(CheckboxState),
    NoOp(NoOpReason),
}

/// Compares one reference against its remote snapshot.
///
/// The local side wins only when the document was modified strictly after
/// the remote task. Equal timestamps, and documents without a known
/// modification time, go to the remote side.
pub fn reconcile(
    reference: &LocalReference,
    document_modified: Option<DateTime<Utc>>,
    task: &RemoteTask,
    table: &StatusTable,
) -> Decision {
    let local_is_newer = document_modified.is_some_and(|modified| modified > task.last_edited);
    if local_is_newer {
        decide_push(reference, task, table)
    } else {
        decide_pull(reference, task, table)
    }
}

fn decide_push(reference: &LocalReference, task: &RemoteTask, table: &StatusTable) -> Decision {
    let Some(glyph) = reference.glyph else {
        return Decision::NoOp(NoOpReason::NoCheckbox);
    };
    let Some(local) = CheckboxState::from_glyph(glyph) else {
        return Decision::NoOp(NoOpReason::UnknownGlyph);
    };
    if table.to_glyph(&task.status) == Some(local) {
        return Decision::NoOp(NoOpReason::InSync);
    }
    match table.canonical(local) {
        Some(status) => Decision::Push(status.to_string()),
        None => Decision::NoOp(NoOpReason::CancelUnsupported),
    }
}

fn decide_pull(reference: &LocalReference, task: &RemoteTask, table: &StatusTable) -> Decision {
    if reference.glyph.is_none() {
        return Decision::NoOp(NoOpReason::NoCheckbox);
    }
    let Some(target) = table.to_glyph(&task.status) else {
        return Decision::NoOp(NoOpReason::UnmappedStatus);
    };
    if reference.checkbox() == Some(target) {
        Decision::NoOp(NoOpReason::InSync)
    } else {
        Decision::Pull(target)
    }
}
