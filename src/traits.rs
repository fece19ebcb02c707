//! Traits for storage abstraction and extensibility

use async_trait::async_trait;

use crate::filing::FilingSnapshot;
use crate::reconciliation::VendorCreditStatement;
use crate::tax::jurisdiction::Gstin;
use crate::types::*;

/// Storage abstraction for committed invoices and filing snapshots
///
/// This trait allows the engine to work with any storage backend
/// (PostgreSQL, SQLite, in-memory, etc.) by implementing these methods.
/// Methods take `&self` so one store can be shared by concurrent runs.
#[async_trait]
pub trait FilingStorage: Send + Sync {
    /// Commit an invoice. Committed invoices are immutable: a second
    /// commit of the same document fails with `DuplicateInvoice`.
    async fn save_invoice(
        &self,
        organization_id: &str,
        gstin: &Gstin,
        invoice: &Invoice,
    ) -> GstResult<()>;

    /// All invoices committed for a filing key's period, in commit order
    async fn list_invoices(&self, key: &FilingKey) -> GstResult<Vec<Invoice>>;

    /// Replace the snapshot for the snapshot's key
    async fn save_snapshot(&self, snapshot: &FilingSnapshot) -> GstResult<()>;

    /// Latest snapshot for a filing key
    async fn get_snapshot(&self, key: &FilingKey) -> GstResult<Option<FilingSnapshot>>;
}

/// Source of vendor-reported credit (GSTR-2A/2B style data)
#[async_trait]
pub trait VendorStatementFeed: Send + Sync {
    /// Fetch the statement for a recipient GSTIN and period.
    ///
    /// Failures should be reported as `ReconciliationDataUnavailable`.
    async fn fetch_statement(
        &self,
        gstin: &Gstin,
        period: FilingPeriod,
    ) -> GstResult<VendorCreditStatement>;
}

/// Trait for implementing custom invoice validation rules, applied after
/// normalization and before an invoice is accepted
pub trait InvoiceValidator: Send + Sync {
    fn validate_invoice(&self, invoice: &Invoice) -> GstResult<()>;
}

/// Default invoice validator with the basic party rules
pub struct DefaultInvoiceValidator;

impl InvoiceValidator for DefaultInvoiceValidator {
    fn validate_invoice(&self, invoice: &Invoice) -> GstResult<()> {
        if invoice.direction == Direction::Purchase && invoice.party_gstin.is_none() {
            // Imports arrive on a bill of entry without a supplier GSTIN
            if invoice.supply_nature != SupplyNature::Import {
                return Err(GstError::InvalidGstin(format!(
                    "purchase {} has no supplier GSTIN",
                    invoice.invoice_number
                )));
            }
        }

        if invoice.direction == Direction::Sales && invoice.supply_nature == SupplyNature::Import {
            return Err(GstError::InvalidDocument(format!(
                "sales invoice {} cannot be an import",
                invoice.invoice_number
            )));
        }

        Ok(())
    }
}
