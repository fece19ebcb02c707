//! Vendor-reported credit, as pulled from GSTR-2A/2B

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::tax::jurisdiction::Gstin;
use crate::types::*;

/// Which auto-drafted statement the data came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementSource {
    /// Dynamic statement, changes as suppliers file
    Gstr2a,
    /// Static statement, frozen for the period
    Gstr2b,
}

/// One document as reported by the supplier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorCreditEntry {
    /// `None` for import bills of entry
    pub supplier_gstin: Option<Gstin>,
    pub invoice_number: String,
    pub invoice_date: Option<NaiveDate>,
    #[serde(default = "default_document_type")]
    pub document_type: DocumentType,
    pub taxable_value: Option<BigDecimal>,
    /// Tax as reported, unsigned
    pub tax: TaxComponents,
}

fn default_document_type() -> DocumentType {
    DocumentType::Invoice
}

impl VendorCreditEntry {
    pub fn new(
        supplier_gstin: Option<Gstin>,
        invoice_number: impl Into<String>,
        tax: TaxComponents,
    ) -> Self {
        Self {
            supplier_gstin,
            invoice_number: invoice_number.into(),
            invoice_date: None,
            document_type: DocumentType::Invoice,
            taxable_value: None,
            tax,
        }
    }

    /// Reported tax with the document-type sign applied
    pub fn signed_tax(&self) -> TaxComponents {
        self.tax.signed(self.document_type.sign())
    }
}

/// Lookup key shared by claims and statement entries
pub(crate) type MatchKey = (Option<Gstin>, String);

pub(crate) fn match_key(supplier: Option<&Gstin>, invoice_number: &str) -> MatchKey {
    (supplier.cloned(), invoice_number_key(invoice_number))
}

/// Credit statement for one recipient and period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorCreditStatement {
    pub recipient_gstin: Gstin,
    pub period: FilingPeriod,
    pub source: StatementSource,
    pub entries: Vec<VendorCreditEntry>,
}

impl VendorCreditStatement {
    pub fn new(recipient_gstin: Gstin, period: FilingPeriod, source: StatementSource) -> Self {
        Self {
            recipient_gstin,
            period,
            source,
            entries: Vec::new(),
        }
    }

    /// Add an entry
    pub fn push(&mut self, entry: VendorCreditEntry) {
        self.entries.push(entry);
    }

    /// Index entries by supplier and invoice number; the first entry for a
    /// key wins
    pub(crate) fn index(&self) -> HashMap<MatchKey, &VendorCreditEntry> {
        let mut index = HashMap::with_capacity(self.entries.len());
        for entry in &self.entries {
            let key = match_key(entry.supplier_gstin.as_ref(), &entry.invoice_number);
            if index.contains_key(&key) {
                warn!(
                    invoice = %entry.invoice_number,
                    "duplicate vendor statement entry ignored"
                );
                continue;
            }
            index.insert(key, entry);
        }
        index
    }
}
