//! Filing orchestrator that ties ingestion, computation and reports together

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::filing::jobs::{JobId, JobRecord, JobRegistry};
use crate::filing::normalizer::{InvoiceNormalizer, RawInvoiceRecord, RejectedRecord};
use crate::reconciliation::{ReconciliationEngine, ReconciliationRun};
use crate::reports::{build_gstr1, build_gstr3b, Gstr1Report, Gstr3bReport};
use crate::tax::gst::{round_money, GstCalculator, TaxAggregate};
use crate::tax::jurisdiction::Gstin;
use crate::traits::*;
use crate::types::*;

/// Everything computed for one filing key in one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilingSnapshot {
    pub key: FilingKey,
    /// Increases by one with every persisted run
    pub revision: u32,
    pub computed_at: DateTime<Utc>,
    pub aggregate: TaxAggregate,
    pub reconciliation: ReconciliationRun,
    pub gstr1: Gstr1Report,
    pub gstr3b: Gstr3bReport,
}

/// Result of committing an upload batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Invoices committed for the requested period
    pub committed: usize,
    /// Invoices committed under the period of their own date
    pub committed_elsewhere: Vec<(String, FilingPeriod)>,
    /// Records that failed normalization
    pub rejected: Vec<RejectedRecord>,
    /// Valid invoices that were already committed
    pub duplicates: Vec<SkippedRecord>,
}

/// Net payable of a period next to the period before it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodComparison {
    pub period: FilingPeriod,
    pub net_payable: BigDecimal,
    pub previous_period: FilingPeriod,
    /// `None` when the previous period was never calculated
    pub previous_net_payable: Option<BigDecimal>,
    /// Change relative to the size of the previous figure, in percent
    pub change_percent: Option<BigDecimal>,
}

impl PeriodComparison {
    pub fn new(
        period: FilingPeriod,
        net_payable: BigDecimal,
        previous_net_payable: Option<BigDecimal>,
    ) -> Self {
        let zero = BigDecimal::from(0);
        let change_percent = previous_net_payable
            .as_ref()
            .filter(|previous| **previous != zero)
            .map(|previous| {
                round_money(&((&net_payable - previous) * BigDecimal::from(100) / previous.abs()))
            });

        Self {
            period,
            net_payable,
            previous_period: period.previous(),
            previous_net_payable,
            change_percent,
        }
    }
}

/// Drop originals that a later amendment supersedes. Credit and debit notes
/// adjust their original and never replace it.
pub fn effective_invoices(invoices: &[Invoice]) -> Vec<Invoice> {
    let party = |invoice: &Invoice| match invoice.direction {
        Direction::Sales => None,
        Direction::Purchase => invoice.party_gstin.clone(),
    };

    let superseded: HashSet<(Direction, Option<Gstin>, String)> = invoices
        .iter()
        .filter_map(|invoice| {
            invoice
                .supersedes()
                .filter(|original| *original != invoice.number_key())
                .map(|original| (invoice.direction, party(invoice), original))
        })
        .collect();

    invoices
        .iter()
        .filter(|invoice| {
            !superseded.contains(&(invoice.direction, party(invoice), invoice.number_key()))
        })
        .cloned()
        .collect()
}

type LockTable = Arc<Mutex<HashMap<FilingKey, Arc<tokio::sync::Mutex<()>>>>>;

/// Exclusive hold on one filing key. The key's table entry is removed once
/// nobody holds or waits for it.
struct KeyLease {
    table: LockTable,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyLease {
    fn drop(&mut self) {
        drop(self.guard.take());
        if let Ok(mut locks) = self.table.lock() {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
    }
}

/// Filing service over a storage backend and a vendor statement feed
pub struct FilingService<S: FilingStorage> {
    storage: S,
    feed: Arc<dyn VendorStatementFeed>,
    config: EngineConfig,
    validator: Arc<dyn InvoiceValidator>,
    locks: LockTable,
    jobs: JobRegistry,
}

impl<S: FilingStorage + Clone> Clone for FilingService<S> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            feed: Arc::clone(&self.feed),
            config: self.config.clone(),
            validator: Arc::clone(&self.validator),
            locks: Arc::clone(&self.locks),
            jobs: self.jobs.clone(),
        }
    }
}

impl<S: FilingStorage + Clone + 'static> FilingService<S> {
    /// Create a new filing service
    pub fn new(storage: S, feed: Arc<dyn VendorStatementFeed>, config: EngineConfig) -> Self {
        let jobs = JobRegistry::with_retention(config.job_retention());
        Self {
            storage,
            feed,
            config,
            validator: Arc::new(DefaultInvoiceValidator),
            locks: Arc::new(Mutex::new(HashMap::new())),
            jobs,
        }
    }

    /// Apply extra rules to every uploaded invoice
    pub fn with_validator(mut self, validator: Arc<dyn InvoiceValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Normalize an upload and commit every valid invoice.
    ///
    /// Invoices dated in another month are committed under their own
    /// period. Documents committed earlier are listed as duplicates.
    pub async fn ingest(
        &self,
        organization_id: &str,
        gstin: &Gstin,
        records: &[RawInvoiceRecord],
        period: FilingPeriod,
    ) -> GstResult<IngestReport> {
        let normalizer = InvoiceNormalizer::with_validator(
            gstin.clone(),
            &self.config,
            Arc::clone(&self.validator),
        );
        let outcome = normalizer.normalize_batch(records, period);

        let mut report = IngestReport {
            rejected: outcome.rejected.clone(),
            ..Default::default()
        };

        for invoice in outcome.valid_invoices() {
            match self.storage.save_invoice(organization_id, gstin, invoice).await {
                Ok(()) if invoice.period == period => report.committed += 1,
                Ok(()) => report
                    .committed_elsewhere
                    .push((invoice.invoice_number.clone(), invoice.period)),
                Err(reason @ GstError::DuplicateInvoice(_)) => {
                    report.duplicates.push(SkippedRecord {
                        reference: invoice.invoice_number.clone(),
                        reason,
                    })
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            organization = organization_id,
            %gstin,
            %period,
            committed = report.committed,
            elsewhere = report.committed_elsewhere.len(),
            rejected = report.rejected.len(),
            duplicates = report.duplicates.len(),
            "ingested upload"
        );
        Ok(report)
    }

    /// Wait for exclusive use of a filing key
    async fn acquire(&self, key: &FilingKey) -> GstResult<KeyLease> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|_| GstError::Storage("filing lock table poisoned".to_string()))?;
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        let guard = lock.lock_owned().await;
        debug!(%key, "filing key acquired");
        Ok(KeyLease {
            table: Arc::clone(&self.locks),
            guard: Some(guard),
        })
    }

    /// Number of filing keys currently held or waited on
    pub(crate) fn lock_count(&self) -> usize {
        self.locks.lock().map_or(0, |locks| locks.len())
    }

    /// Compute a snapshot without persisting it
    async fn compute(&self, key: &FilingKey) -> GstResult<FilingSnapshot> {
        let invoices = effective_invoices(&self.storage.list_invoices(key).await?);

        let aggregate =
            GstCalculator::new(key.gstin.clone()).aggregate(&invoices, key.period)?;
        let previous = self.storage.get_snapshot(key).await?;

        let engine = ReconciliationEngine::new(key.gstin.clone(), self.config.clone());
        let fresh = match self.feed.fetch_statement(&key.gstin, key.period).await {
            Ok(statement) => engine.reconcile(&invoices, &statement),
            Err(err) => {
                let reason = match err {
                    GstError::ReconciliationDataUnavailable(_) => err,
                    other => GstError::ReconciliationDataUnavailable(other.to_string()),
                };
                engine.reconcile_unavailable(&invoices, &reason)
            }
        };
        let reconciliation = match &previous {
            Some(previous) => {
                engine.merge_with_previous(&previous.reconciliation.claims, fresh)
            }
            None => fresh,
        };

        let gstr1 = build_gstr1(&aggregate, &invoices)?;
        let gstr3b = build_gstr3b(&aggregate, &reconciliation.claims)?;

        Ok(FilingSnapshot {
            key: key.clone(),
            revision: previous.map_or(1, |p| p.revision + 1),
            computed_at: Utc::now(),
            aggregate,
            reconciliation,
            gstr1,
            gstr3b,
        })
    }

    async fn persist(&self, snapshot: &FilingSnapshot) -> GstResult<()> {
        self.storage.save_snapshot(snapshot).await?;
        info!(
            key = %snapshot.key,
            revision = snapshot.revision,
            net_payable = %snapshot.aggregate.net_payable,
            cash_payable = %snapshot.gstr3b.cash_payable(),
            eligible_itc = %snapshot.reconciliation.summary.eligible.total(),
            "filing snapshot saved"
        );
        Ok(())
    }

    /// Recompute and persist the snapshot for a filing key.
    ///
    /// Runs for the same key are serialized; a run that fails persists
    /// nothing.
    pub async fn recalculate(&self, key: &FilingKey) -> GstResult<FilingSnapshot> {
        let _lease = self.acquire(key).await?;

        let snapshot = self.compute(key).await.inspect_err(|err| {
            warn!(%key, error = %err, "recalculation failed");
        })?;
        self.persist(&snapshot).await?;
        Ok(snapshot)
    }

    /// Run `recalculate` as a background job on the current tokio runtime
    pub fn submit_recalculation(&self, key: FilingKey) -> GstResult<JobId> {
        let id = self.jobs.register(key.clone())?;
        let service = self.clone();

        let handle = tokio::spawn(async move {
            let jobs = service.jobs.clone();
            let outcome = service.run_job(id, &key).await;
            if let Err(err) = jobs.finish(id, outcome) {
                warn!(job = %id, error = %err, "could not record job outcome");
            }
        });
        self.jobs.attach(id, handle.abort_handle())?;

        Ok(id)
    }

    async fn run_job(&self, id: JobId, key: &FilingKey) -> GstResult<()> {
        let _lease = self.acquire(key).await?;
        self.jobs.mark_running(id)?;

        let snapshot = self.compute(key).await?;
        if !self.jobs.begin_commit(id)? {
            return Ok(());
        }
        self.persist(&snapshot).await
    }

    /// Poll a background job
    pub fn job_status(&self, id: JobId) -> GstResult<JobRecord> {
        self.jobs.status(id)
    }

    /// Cancel a background job
    pub fn cancel_job(&self, id: JobId) -> GstResult<JobRecord> {
        self.jobs.cancel(id)
    }

    /// Latest persisted snapshot
    pub async fn snapshot(&self, key: &FilingKey) -> GstResult<Option<FilingSnapshot>> {
        self.storage.get_snapshot(key).await
    }

    /// Compare a period's net payable with the period before it. `None`
    /// when the period itself has no snapshot yet.
    pub async fn compare_with_previous(
        &self,
        key: &FilingKey,
    ) -> GstResult<Option<PeriodComparison>> {
        let Some(current) = self.storage.get_snapshot(key).await? else {
            return Ok(None);
        };
        let previous_key = FilingKey {
            period: key.period.previous(),
            ..key.clone()
        };
        let previous = self.storage.get_snapshot(&previous_key).await?;

        Ok(Some(PeriodComparison::new(
            key.period,
            current.aggregate.net_payable,
            previous.map(|p| p.aggregate.net_payable),
        )))
    }

    /// Committed invoices of a filing key after amendments are applied
    pub async fn invoices(&self, key: &FilingKey) -> GstResult<Vec<Invoice>> {
        Ok(effective_invoices(&self.storage.list_invoices(key).await?))
    }
}
