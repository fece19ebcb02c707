//! In-memory storage and statement feed for testing

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::filing::FilingSnapshot;
use crate::reconciliation::{StatementSource, VendorCreditStatement};
use crate::tax::jurisdiction::Gstin;
use crate::traits::*;
use crate::types::*;

fn poisoned<T>(_: PoisonError<T>) -> GstError {
    GstError::Storage("memory storage lock poisoned".to_string())
}

/// Uniqueness key of a committed document
type DocumentKey = (String, Gstin, Direction, Option<Gstin>, String);

fn document_key(
    organization_id: &str,
    gstin: &Gstin,
    direction: Direction,
    supplier: Option<&Gstin>,
    invoice_number: &str,
) -> DocumentKey {
    // Sales numbers are unique on their own; purchases per supplier
    let supplier = match direction {
        Direction::Sales => None,
        Direction::Purchase => supplier.cloned(),
    };
    (
        organization_id.to_string(),
        gstin.clone(),
        direction,
        supplier,
        invoice_number_key(invoice_number),
    )
}

/// In-memory storage implementation for testing and development
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    /// Committed invoices per organization and GSTIN, in commit order
    invoices: Arc<RwLock<HashMap<(String, Gstin), Vec<Invoice>>>>,
    committed: Arc<RwLock<HashSet<DocumentKey>>>,
    snapshots: Arc<RwLock<HashMap<FilingKey, FilingSnapshot>>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of snapshots saved so far
    pub fn snapshot_count(&self) -> GstResult<usize> {
        Ok(self.snapshots.read().map_err(poisoned)?.len())
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) -> GstResult<()> {
        self.invoices.write().map_err(poisoned)?.clear();
        self.committed.write().map_err(poisoned)?.clear();
        self.snapshots.write().map_err(poisoned)?.clear();
        Ok(())
    }
}

#[async_trait]
impl FilingStorage for MemoryStorage {
    async fn save_invoice(
        &self,
        organization_id: &str,
        gstin: &Gstin,
        invoice: &Invoice,
    ) -> GstResult<()> {
        let key = document_key(
            organization_id,
            gstin,
            invoice.direction,
            invoice.party_gstin.as_ref(),
            &invoice.invoice_number,
        );

        let mut committed = self.committed.write().map_err(poisoned)?;
        if !committed.insert(key) {
            return Err(GstError::DuplicateInvoice(format!(
                "{:?} invoice {} is already committed for {}",
                invoice.direction, invoice.invoice_number, gstin
            )));
        }

        self.invoices
            .write()
            .map_err(poisoned)?
            .entry((organization_id.to_string(), gstin.clone()))
            .or_default()
            .push(invoice.clone());
        Ok(())
    }

    async fn list_invoices(&self, key: &FilingKey) -> GstResult<Vec<Invoice>> {
        let invoices = self.invoices.read().map_err(poisoned)?;
        Ok(invoices
            .get(&(key.organization_id.clone(), key.gstin.clone()))
            .map(|list| {
                list.iter()
                    .filter(|invoice| invoice.period == key.period)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn save_snapshot(&self, snapshot: &FilingSnapshot) -> GstResult<()> {
        self.snapshots
            .write()
            .map_err(poisoned)?
            .insert(snapshot.key.clone(), snapshot.clone());
        Ok(())
    }

    async fn get_snapshot(&self, key: &FilingKey) -> GstResult<Option<FilingSnapshot>> {
        Ok(self.snapshots.read().map_err(poisoned)?.get(key).cloned())
    }
}

/// Vendor statement feed backed by statements held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStatementFeed {
    statements: Arc<RwLock<HashMap<(Gstin, FilingPeriod), VendorCreditStatement>>>,
    unavailable: Arc<RwLock<bool>>,
    delay: Option<Duration>,
}

impl MemoryStatementFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait this long before answering each fetch
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Publish or replace the statement for its recipient and period
    pub fn publish(&self, statement: VendorCreditStatement) -> GstResult<()> {
        self.statements
            .write()
            .map_err(poisoned)?
            .insert((statement.recipient_gstin.clone(), statement.period), statement);
        Ok(())
    }

    /// Make every fetch fail until switched back
    pub fn set_unavailable(&self, unavailable: bool) -> GstResult<()> {
        *self.unavailable.write().map_err(poisoned)? = unavailable;
        Ok(())
    }
}

#[async_trait]
impl VendorStatementFeed for MemoryStatementFeed {
    async fn fetch_statement(
        &self,
        gstin: &Gstin,
        period: FilingPeriod,
    ) -> GstResult<VendorCreditStatement> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if *self.unavailable.read().map_err(poisoned)? {
            return Err(GstError::ReconciliationDataUnavailable(format!(
                "no connection to the statement source for {gstin} {period}"
            )));
        }

        let statements = self.statements.read().map_err(poisoned)?;
        Ok(statements
            .get(&(gstin.clone(), period))
            .cloned()
            .unwrap_or_else(|| {
                VendorCreditStatement::new(
                    gstin.clone(),
                    period,
                    StatementSource::Gstr2b,
                )
            }))
    }
}
