// File: ./src/sync.rs
//! The sync pass.
//!
//! A pass walks the recently open documents in order. For each document it
//! reads the text once, resolves every referenced task through the per-pass
//! cache, pushes local changes that are newer than the remote task, and then
//! rewrites the document once for every remote change that is newer than the
//! document. Errors on one reference never stop the others.
use crate::cache::TaskCache;
use crate::client::{NotionClient, TaskService};
use crate::config::Config;
use crate::error::{ConfigError, ServiceError, SyncError};
use crate::model::{CheckboxState, LocalReference, RemoteTask, Scanner, StatusTable};
use crate::notifier::Notifier;
use crate::reconcile::{Decision, NoOpReason, reconcile};
use crate::vault::{DocumentHandle, DocumentStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Failures listed by name in the end-of-pass notification.
const MAX_LISTED_FAILURES: usize = 3;

/// Why a reference was skipped for this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoCheckbox,
    UnknownGlyph,
    UnmappedStatus,
    CancelUnsupported,
    /// The task no longer exists remotely.
    NotFound,
    /// An earlier line of the same document already pushed another status.
    ConflictingPush,
    /// The line changed between the scan and the rewrite.
    LineChanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Pushed { status: String },
    Pulled { state: CheckboxState },
    Unchanged,
    Skipped { reason: SkipReason },
    Failed { error: String },
}

impl From<NoOpReason> for Outcome {
    fn from(reason: NoOpReason) -> Self {
        let reason = match reason {
            NoOpReason::InSync => return Outcome::Unchanged,
            NoOpReason::NoCheckbox => SkipReason::NoCheckbox,
            NoOpReason::UnknownGlyph => SkipReason::UnknownGlyph,
            NoOpReason::UnmappedStatus => SkipReason::UnmappedStatus,
            NoOpReason::CancelUnsupported => SkipReason::CancelUnsupported,
        };
        Outcome::Skipped { reason }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceOutcome {
    pub document: String,
    pub line_index: usize,
    pub identifier: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentError {
    pub document: String,
    pub error: String,
}

/// Everything a pass did, per reference.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub documents: usize,
    pub references: Vec<ReferenceOutcome>,
    pub document_errors: Vec<DocumentError>,
    /// Remote fetches issued during the pass.
    pub fetches: usize,
}

impl SyncReport {
    fn count(&self, f: impl Fn(&Outcome) -> bool) -> usize {
        self.references.iter().filter(|r| f(&r.outcome)).count()
    }

    pub fn pushed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Pushed { .. }))
    }

    pub fn pulled(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Pulled { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Unchanged))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed { .. }))
    }

    /// Outcomes recorded for one identifier, in pass order.
    pub fn outcomes_for(&self, identifier: &str) -> Vec<&Outcome> {
        self.references
            .iter()
            .filter(|r| r.identifier == identifier)
            .map(|r| &r.outcome)
            .collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} documents | Pushed {} | Pulled {} | Unchanged {} | Skipped {} | Failed {}",
            self.documents,
            self.pushed(),
            self.pulled(),
            self.unchanged(),
            self.skipped(),
            self.failed() + self.document_errors.len()
        )
    }

    fn record(&mut self, document: &DocumentHandle, line_index: usize, identifier: &str, outcome: Outcome) {
        self.references.push(ReferenceOutcome {
            document: document.to_string(),
            line_index,
            identifier: identifier.to_string(),
            outcome,
        });
    }
}

/// Validated, per-run settings: the link scanner and the bucket table.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub scanner: Scanner,
    pub statuses: StatusTable,
}

impl SyncSettings {
    pub fn new(link_pattern: &str, statuses: StatusTable) -> Result<Self, ConfigError> {
        statuses.validate()?;
        Ok(Self {
            scanner: Scanner::new(link_pattern)?,
            statuses,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Self::new(&config.link_pattern, config.statuses.clone())
    }
}

/// A failure the user should hear about at the end of the pass.
struct Failure {
    label: String,
    error: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.error)
    }
}

/// A pull applied during the rewrite. `slot` indexes the pending reference
/// it satisfied.
struct AppliedPull {
    slot: usize,
    state: CheckboxState,
    task: Arc<RemoteTask>,
}

pub struct SyncEngine<'a, D, S, N: ?Sized> {
    store: &'a D,
    service: &'a S,
    notifier: &'a N,
    settings: &'a SyncSettings,
}

impl<'a, D, S, N> SyncEngine<'a, D, S, N>
where
    D: DocumentStore,
    S: TaskService,
    N: Notifier + ?Sized,
{
    pub fn new(store: &'a D, service: &'a S, notifier: &'a N, settings: &'a SyncSettings) -> Self {
        Self {
            store,
            service,
            notifier,
            settings,
        }
    }

    /// Runs one pass. Only listing the documents can fail the whole pass,
    /// and it happens before anything is written.
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let documents = self
            .store
            .list_recent_documents()
            .map_err(SyncError::Documents)?;
        log::info!("Syncing {} recent documents", documents.len());

        let cache = TaskCache::new(self.service);
        let mut report = SyncReport::default();
        let mut failures = Vec::new();

        for handle in &documents {
            report.documents += 1;
            self.sync_document(handle, &cache, &mut report, &mut failures)
                .await;
        }
        report.fetches = cache.fetch_count();

        self.notify_failures(&failures);
        log::info!("Sync finished: {}", report.summary());
        Ok(report)
    }

    async fn sync_document(
        &self,
        handle: &DocumentHandle,
        cache: &TaskCache<'_, S>,
        report: &mut SyncReport,
        failures: &mut Vec<Failure>,
    ) {
        let text = match self.store.read_text(handle) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("Skipping {}: {:#}", handle, e);
                report.document_errors.push(DocumentError {
                    document: handle.to_string(),
                    error: format!("{:#}", e),
                });
                failures.push(Failure {
                    label: handle.to_string(),
                    error: "could not be read".to_string(),
                });
                return;
            }
        };
        let modified = self.store.modification_time(handle);
        let references = self.settings.scanner.scan_document(&text);
        if references.is_empty() {
            return;
        }
        log::debug!("{}: {} task references", handle, references.len());

        cache
            .get_many(references.iter().map(|r| r.identifier.as_str()))
            .await;

        let mut pending_pulls = Vec::new();
        self.push_phase(handle, modified, &references, cache, report, failures, &mut pending_pulls)
            .await;

        if !pending_pulls.is_empty() {
            self.pull_phase(handle, modified, &pending_pulls, cache, report, failures);
        }
    }

    /// Decides every reference against the snapshot and sends the pushes.
    /// References that need a pull are handed back for the rewrite.
    #[allow(clippy::too_many_arguments)]
    async fn push_phase<'r>(
        &self,
        handle: &DocumentHandle,
        modified: Option<DateTime<Utc>>,
        references: &'r [LocalReference],
        cache: &TaskCache<'_, S>,
        report: &mut SyncReport,
        failures: &mut Vec<Failure>,
        pending_pulls: &mut Vec<&'r LocalReference>,
    ) {
        let mut pushed: HashMap<&str, String> = HashMap::new();

        for reference in references {
            let id = reference.identifier.as_str();
            let task = match cache.get(id).await {
                Ok(task) => task,
                Err(e) => {
                    report.record(handle, reference.line_index, id, fetch_outcome(&e));
                    if e.is_user_visible() {
                        failures.push(Failure {
                            label: id.to_string(),
                            error: e.to_string(),
                        });
                    }
                    continue;
                }
            };

            let decision = reconcile(reference, modified, &task, &self.settings.statuses);
            log::debug!(
                "{}:{} {} -> {:?}",
                handle,
                reference.line_index + 1,
                task.display_label(),
                decision
            );

            let outcome = match decision {
                Decision::NoOp(reason) => reason.into(),
                Decision::Pull(_) => {
                    pending_pulls.push(reference);
                    continue;
                }
                Decision::Push(status) => match pushed.get(id) {
                    Some(previous) if *previous == status => Outcome::Unchanged,
                    Some(_) => Outcome::Skipped {
                        reason: SkipReason::ConflictingPush,
                    },
                    None => {
                        pushed.insert(id, status.clone());
                        self.push(&task, status, failures).await
                    }
                },
            };
            report.record(handle, reference.line_index, id, outcome);
        }
    }

    async fn push(&self, task: &RemoteTask, status: String, failures: &mut Vec<Failure>) -> Outcome {
        match self.service.update_task_status(&task.id, &status).await {
            Ok(()) => {
                log::info!("Pushed {} as '{}'", task.display_label(), status);
                self.notifier.notify(&format!(
                    "Synced To-Do {} as {}",
                    task.display_label(),
                    status
                ));
                Outcome::Pushed { status }
            }
            Err(e) => {
                log::warn!("Updating {} to '{}' failed: {}", task.display_label(), status, e);
                failures.push(Failure {
                    label: task.display_label().to_string(),
                    error: e.to_string(),
                });
                Outcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Rewrites the document once. Decisions are derived again from the
    /// current content and the cached snapshots; nothing is fetched here.
    ///
    /// Current lines are matched to `pending` by identifier in occurrence
    /// order, so lines shifted by an outside edit still land on their own
    /// reference and every pending reference gets exactly one outcome.
    fn pull_phase(
        &self,
        handle: &DocumentHandle,
        modified: Option<DateTime<Utc>>,
        pending: &[&LocalReference],
        cache: &TaskCache<'_, S>,
        report: &mut SyncReport,
        failures: &mut Vec<Failure>,
    ) {
        let scanner = &self.settings.scanner;
        let statuses = &self.settings.statuses;
        let mut applied: Vec<AppliedPull> = Vec::new();
        let mut claimed = vec![false; pending.len()];

        let result = self.store.replace_text(handle, |current| {
            let lines: Vec<String> = current
                .split('\n')
                .enumerate()
                .map(|(idx, line)| {
                    let Some(reference) = scanner.scan_line(idx, line) else {
                        return line.to_string();
                    };
                    let Some(slot) = (0..pending.len())
                        .find(|&i| !claimed[i] && pending[i].identifier == reference.identifier)
                    else {
                        return line.to_string();
                    };
                    claimed[slot] = true;
                    let Some(Ok(task)) = cache.peek(&reference.identifier) else {
                        return line.to_string();
                    };
                    let Decision::Pull(state) = reconcile(&reference, modified, &task, statuses)
                    else {
                        return line.to_string();
                    };
                    match scanner.rewrite_glyph(line, state) {
                        Some(rewritten) => {
                            applied.push(AppliedPull { slot, state, task });
                            rewritten
                        }
                        None => line.to_string(),
                    }
                })
                .collect();
            lines.join("\n")
        });

        if let Err(e) = result {
            log::warn!("Rewriting {} failed: {:#}", handle, e);
            for reference in pending {
                report.record(
                    handle,
                    reference.line_index,
                    &reference.identifier,
                    Outcome::Failed {
                        error: format!("{:#}", e),
                    },
                );
            }
            failures.push(Failure {
                label: handle.to_string(),
                error: "could not be rewritten".to_string(),
            });
            return;
        }

        let mut outcomes: Vec<Option<Outcome>> = vec![None; pending.len()];
        for pull in &applied {
            let reference = pending[pull.slot];
            let status = &pull.task.status;
            log::info!("{}:{} pulled {} ({})", handle, reference.line_index + 1, pull.task.display_label(), status);
            self.notifier.notify(&format!(
                "Marked To-Do {} as {}",
                pull.task.display_label(),
                status
            ));
            outcomes[pull.slot] = Some(Outcome::Pulled { state: pull.state });
        }

        for (reference, outcome) in pending.iter().zip(outcomes) {
            let outcome = outcome.unwrap_or(Outcome::Skipped {
                reason: SkipReason::LineChanged,
            });
            report.record(handle, reference.line_index, &reference.identifier, outcome);
        }
    }

    fn notify_failures(&self, failures: &[Failure]) {
        if failures.is_empty() {
            return;
        }
        let listed: Vec<String> = failures
            .iter()
            .take(MAX_LISTED_FAILURES)
            .map(|f| f.to_string())
            .collect();
        let mut message = format!(
            "Sync finished with {} failure(s): {}",
            failures.len(),
            listed.join("; ")
        );
        if failures.len() > MAX_LISTED_FAILURES {
            message.push_str(&format!(" and {} more", failures.len() - MAX_LISTED_FAILURES));
        }
        self.notifier.notify(&message);
    }
}

fn fetch_outcome(error: &ServiceError) -> Outcome {
    match error {
        ServiceError::NotFound(_) => Outcome::Skipped {
            reason: SkipReason::NotFound,
        },
        other => Outcome::Failed {
            error: other.to_string(),
        },
    }
}

/// Runs one pass against an already configured service.
pub async fn run_sync<D, S, N>(
    store: &D,
    service: &S,
    notifier: &N,
    settings: &SyncSettings,
) -> Result<SyncReport, SyncError>
where
    D: DocumentStore,
    S: TaskService,
    N: Notifier + ?Sized,
{
    SyncEngine::new(store, service, notifier, settings).run().await
}

/// Runs one pass against Notion using `config`. Configuration problems are
/// reported before any document or task is touched.
pub async fn sync<D, N>(config: &Config, store: &D, notifier: &N) -> Result<SyncReport, SyncError>
where
    D: DocumentStore,
    N: Notifier + ?Sized,
{
    let credentials = config.credentials()?;
    let settings = SyncSettings::from_config(config)?;
    let client = NotionClient::new(&credentials, config.notion_options()).map_err(SyncError::Client)?;
    run_sync(store, &client, notifier, &settings).await
}
