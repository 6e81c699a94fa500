//! Enrichment driver: walks the selected rows one at a time, looks each one up,
//! resolves the candidates and persists the result before moving on.
//!
//! Each row moves through `Pending -> Queried -> {Accepted, Failed}`, or from
//! `Pending` straight to `Skipped` when its outputs are already filled. An
//! accepted row only fills blank output cells unless overwrite is on, and an
//! empty candidate value never replaces a filled cell. A failed row only gets
//! its status column set to the sentinel; its output fields are left as they
//! were. Store errors and structural lookup errors abort the batch;
//! everything else is recorded against the row and the batch continues.

use std::collections::HashSet;

use crate::config::{AmbiguityPolicy, EnrichSettings};
use crate::lookup::{LookupClient, LookupError};
use crate::matching::MatchResolver;
use crate::models::{
    Candidate, CandidateField, EnrichReport, InputColumns, MatchResult, Query, Row, RowFailure,
    RowOutcome, RowState,
};
use crate::store::{RecordStore, StoreError};
use crate::utils::{row_number, ProgressReporter, RowSelection};

/// Errors that stop a batch
#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Lookup error: {0}")]
    Lookup(LookupError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input column '{0}' not found in dataset")]
    MissingColumn(String),

    #[error("Column '{0}' is used for more than one purpose")]
    ColumnConflict(String),
}

/// Drives one enrichment batch over a record store
#[derive(Debug)]
pub struct EnrichmentDriver<S: RecordStore> {
    store: S,
    client: LookupClient,
    resolver: MatchResolver,
    settings: EnrichSettings,
    input: InputColumns,
    outputs: Vec<(CandidateField, String)>,
    progress: Option<ProgressReporter>,
}

impl<S: RecordStore> EnrichmentDriver<S> {
    pub fn new(
        store: S,
        client: LookupClient,
        resolver: MatchResolver,
        settings: EnrichSettings,
    ) -> Self {
        Self {
            input: settings.input_columns(),
            outputs: settings.output_columns(),
            store,
            client,
            resolver,
            settings,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Enrich the selected rows
    ///
    /// Selected row numbers beyond the end of the dataset are logged and listed
    /// in the report; they do not fail the batch.
    pub async fn run(&mut self, selection: &RowSelection) -> Result<EnrichReport, EnrichError> {
        self.prepare()?;

        let resolved = selection.resolve(self.store.len());
        let mut report = EnrichReport {
            out_of_range: resolved.out_of_range.clone(),
            ..EnrichReport::default()
        };
        if !resolved.out_of_range.is_empty() {
            tracing::warn!(
                "Skipping {} selected rows outside the dataset ({} rows): {:?}",
                resolved.out_of_range.len(),
                self.store.len(),
                resolved.out_of_range
            );
        }

        tracing::info!(
            "Enriching {} rows with {}",
            resolved.indexes.len(),
            self.client.backend().name()
        );

        for index in resolved.indexes {
            if let Some(progress) = &self.progress {
                progress.set_message(format!("row {}", row_number(index)));
            }

            let outcome = self.process_row(index).await?;
            debug_assert!(outcome.state.is_terminal(), "row left in {}", outcome.state);
            report.record(outcome);

            if let Some(progress) = &self.progress {
                progress.inc();
            }
        }

        if let Some(progress) = &self.progress {
            progress.finish();
        }
        tracing::info!(
            "Done: {} accepted, {} skipped, {} failed",
            report.accepted,
            report.skipped,
            report.failed
        );
        Ok(report)
    }

    /// Validate the column layout and add missing output columns
    fn prepare(&mut self) -> Result<(), EnrichError> {
        if self.outputs.is_empty() {
            return Err(EnrichError::Config("no output fields configured".to_string()));
        }
        if self.settings.status_column.trim().is_empty() {
            return Err(EnrichError::Config("status column name is empty".to_string()));
        }

        let title = &self.input.title;
        if !self.store.has_column(title) {
            return Err(EnrichError::MissingColumn(title.clone()));
        }
        for optional in [&self.input.authors, &self.input.year, &self.input.doi]
            .into_iter()
            .flatten()
        {
            if !self.store.has_column(optional) {
                tracing::debug!("Optional input column '{}' not in dataset", optional);
            }
        }

        let mut seen = HashSet::new();
        for column in self.managed_columns() {
            if column == *title || !seen.insert(column.clone()) {
                return Err(EnrichError::ColumnConflict(column));
            }
        }

        let added = self.store.ensure_columns(&self.managed_columns())?;
        if !added.is_empty() {
            tracing::info!("Added output columns: {}", added.join(", "));
        }
        Ok(())
    }

    /// Output columns followed by the status column
    fn managed_columns(&self) -> Vec<String> {
        self.outputs
            .iter()
            .map(|(_, column)| column.clone())
            .chain(std::iter::once(self.settings.status_column.clone()))
            .collect()
    }

    /// A row counts as done when it was matched before or every output is filled
    fn is_filled(&self, row: &Row) -> bool {
        let matched = row
            .get(&self.settings.status_column)
            .is_some_and(|s| s.trim() == self.settings.matched_marker);
        matched || self.outputs.iter().all(|(_, column)| !row.is_blank(column))
    }

    async fn process_row(&mut self, index: usize) -> Result<RowOutcome, EnrichError> {
        let row = self.store.row(index)?;
        let state = RowState::Pending;

        if !self.settings.overwrite && self.is_filled(&row) {
            advance(row.number(), state, RowState::Skipped);
            tracing::debug!("Row {}: already enriched, skipping", row.number());
            return Ok(RowOutcome::skipped(index));
        }

        let query = Query::from_row(&row, &self.input);
        if query.is_empty() {
            return self.fail(&row, state, RowFailure::MissingInput);
        }

        let state = advance(row.number(), state, RowState::Queried);
        tracing::info!("Row {}: looking up \"{}\"", row.number(), query.search_text());

        let candidates = match self.client.search(&query).await {
            Ok(candidates) => candidates,
            Err(e) if e.is_fatal() => {
                tracing::error!("Row {}: {}", row.number(), e);
                return Err(EnrichError::Lookup(e));
            }
            Err(LookupError::Unavailable {
                attempts,
                last_error,
            }) => {
                tracing::warn!(
                    "Row {}: lookup unavailable after {} attempts: {}",
                    row.number(),
                    attempts,
                    last_error
                );
                let failure = RowFailure::LookupUnavailable {
                    attempts,
                    message: last_error,
                };
                return self.fail(&row, state, failure);
            }
            Err(e) => {
                let failure = RowFailure::LookupFailed {
                    message: e.to_string(),
                };
                return self.fail(&row, state, failure);
            }
        };

        match self.resolver.resolve(&query, &candidates) {
            MatchResult::Accepted { candidate, score } => {
                self.accept(&row, state, &candidate, score)
            }
            MatchResult::Ambiguous { contenders } => {
                let best = contenders
                    .first()
                    .and_then(|(id, score)| {
                        candidates
                            .iter()
                            .find(|c| &c.external_id == id)
                            .map(|c| (c, *score))
                    })
                    .filter(|_| self.resolver.settings().ambiguity == AmbiguityPolicy::TakeBest);

                match best {
                    Some((candidate, score)) => {
                        tracing::warn!(
                            "Row {}: {} candidates within the tie margin, taking the best",
                            row.number(),
                            contenders.len()
                        );
                        let candidate = candidate.clone();
                        self.accept(&row, state, &candidate, score)
                    }
                    None => self.fail(
                        &row,
                        state,
                        RowFailure::AmbiguousMatch {
                            contenders: contenders.len(),
                        },
                    ),
                }
            }
            MatchResult::Rejected { best_score } => {
                self.fail(&row, state, RowFailure::NoMatch { best_score })
            }
        }
    }

    /// Write the output fields and the matched marker in one store write
    fn accept(
        &mut self,
        row: &Row,
        state: RowState,
        candidate: &Candidate,
        score: f64,
    ) -> Result<RowOutcome, EnrichError> {
        let mut values = self.output_values(row, candidate);
        values.push((
            self.settings.status_column.clone(),
            self.settings.matched_marker.clone(),
        ));

        self.store.write(row.index, &values)?;
        advance(row.number(), state, RowState::Accepted);
        tracing::info!(
            "Row {}: matched {} (score {:.3})",
            row.number(),
            candidate.external_id,
            score
        );
        Ok(RowOutcome::accepted(
            row.index,
            candidate.external_id.clone(),
            score,
        ))
    }

    /// Output cells to write for an accepted candidate
    ///
    /// Filled cells are kept unless overwrite is on, and an empty candidate
    /// value never replaces a filled cell.
    fn output_values(&self, row: &Row, candidate: &Candidate) -> Vec<(String, String)> {
        self.outputs
            .iter()
            .filter_map(|(field, column)| {
                let value = candidate.field_value(*field);
                let filled = !row.is_blank(column);
                if filled && (!self.settings.overwrite || value.trim().is_empty()) {
                    tracing::debug!("Row {}: keeping existing '{}'", row.number(), column);
                    return None;
                }
                Some((column.clone(), value))
            })
            .collect()
    }

    /// Write only the sentinel into the status column
    fn fail(
        &mut self,
        row: &Row,
        state: RowState,
        failure: RowFailure,
    ) -> Result<RowOutcome, EnrichError> {
        let sentinel = failure.sentinel(&self.settings.sentinel);
        self.store.write(
            row.index,
            &[(self.settings.status_column.clone(), sentinel.clone())],
        )?;
        advance(row.number(), state, RowState::Failed);
        tracing::warn!("Row {}: {}", row.number(), sentinel);
        Ok(RowOutcome::failed(row.index, failure))
    }
}

fn advance(row_number: usize, from: RowState, to: RowState) -> RowState {
    debug_assert!(
        from.can_transition_to(to),
        "illegal row transition {} -> {}",
        from,
        to
    );
    tracing::trace!("Row {}: {} -> {}", row_number, from, to);
    to
}
