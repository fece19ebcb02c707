//! Turns raw upload records into validated invoices

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::tax::jurisdiction::{Gstin, StateCode};
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::*;

/// Invoice fields as extracted from an upload, before validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawInvoiceRecord {
    pub invoice_number: String,
    /// `sales`/`outward` or `purchase`/`inward`
    pub direction: String,
    pub party_gstin: String,
    pub party_name: String,
    pub taxable_value: String,
    pub rate: String,
    pub place_of_supply: String,
    pub invoice_date: String,
    /// `invoice`, `credit note` or `debit note`; blank means invoice
    pub document_type: Option<String>,
    /// `domestic`, `export` or `import`; blank means domestic
    pub supply_type: Option<String>,
    pub reverse_charge: Option<String>,
    pub category: Option<String>,
    /// Number of the invoice this record amends
    pub amends: Option<String>,
}

/// A raw record that failed normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRecord {
    /// Zero-based position in the uploaded batch
    pub row: usize,
    /// Invoice number, when one could be read
    pub reference: Option<String>,
    pub reason: GstError,
}

/// Result of normalizing a batch against a requested period
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizationOutcome {
    /// Valid invoices dated inside the requested period
    pub accepted: Vec<Invoice>,
    /// Valid invoices tagged with a different period of their own
    pub out_of_period: Vec<Invoice>,
    pub rejected: Vec<RejectedRecord>,
}

impl NormalizationOutcome {
    /// Every valid invoice regardless of period
    pub fn valid_invoices(&self) -> impl Iterator<Item = &Invoice> {
        self.accepted.iter().chain(self.out_of_period.iter())
    }
}

/// Validates raw records for one registered taxpayer
pub struct InvoiceNormalizer {
    own_gstin: Gstin,
    enforce_checksum: bool,
    validator: Arc<dyn InvoiceValidator>,
}

impl InvoiceNormalizer {
    /// Create a normalizer for the taxpayer holding `own_gstin`
    pub fn new(own_gstin: Gstin, config: &EngineConfig) -> Self {
        Self {
            own_gstin,
            enforce_checksum: config.enforce_gstin_checksum,
            validator: Arc::new(DefaultInvoiceValidator),
        }
    }

    /// Create a normalizer with a custom validator
    pub fn with_validator(
        own_gstin: Gstin,
        config: &EngineConfig,
        validator: Arc<dyn InvoiceValidator>,
    ) -> Self {
        Self {
            own_gstin,
            enforce_checksum: config.enforce_gstin_checksum,
            validator,
        }
    }

    fn parse_gstin(&self, raw: &str) -> GstResult<Gstin> {
        if self.enforce_checksum {
            Gstin::parse_strict(raw)
        } else {
            Gstin::parse(raw)
        }
    }

    /// Validate and canonicalize one record. Pure: the same record always
    /// yields the same invoice or the same error.
    pub fn normalize(&self, raw: &RawInvoiceRecord) -> GstResult<Invoice> {
        let invoice_number = require_field(&raw.invoice_number, "invoice_number")?.to_string();
        let direction = parse_direction(&raw.direction)?;
        let document_type = parse_document_type(raw.document_type.as_deref())?;

        let party_gstin = match raw.party_gstin.trim() {
            "" => None,
            text => Some(self.parse_gstin(text)?),
        };

        let taxable_value = parse_amount(&raw.taxable_value)?;
        let rate = parse_rate(&raw.rate)?;
        let invoice_date = parse_date(&raw.invoice_date)?;
        let mut supply_nature = parse_supply_nature(raw.supply_type.as_deref())?;

        let place_of_supply = match raw.place_of_supply.trim() {
            "" => self.default_place_of_supply(direction, party_gstin.as_ref()),
            text => match StateCode::resolve(text) {
                Some(state) => state.to_string(),
                // Kept verbatim; tax computation reports it as unresolved
                None => text.to_string(),
            },
        };

        if direction == Direction::Sales
            && StateCode::resolve(&place_of_supply).is_some_and(|s| s.is_foreign())
        {
            supply_nature = SupplyNature::Export;
        }

        let optional_text = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };

        let invoice = Invoice {
            invoice_number,
            direction,
            document_type,
            party_gstin,
            party_name: raw.party_name.trim().to_string(),
            taxable_value,
            rate,
            place_of_supply,
            invoice_date,
            period: FilingPeriod::from_date(invoice_date),
            supply_nature,
            reverse_charge: parse_flag(raw.reverse_charge.as_deref()),
            supply_category: optional_text(&raw.category),
            amends: optional_text(&raw.amends),
        };

        self.validator.validate_invoice(&invoice)?;
        Ok(invoice)
    }

    /// The recipient's state: own state for purchases, the buyer's state
    /// for sales (own state when the buyer is unregistered)
    fn default_place_of_supply(&self, direction: Direction, party: Option<&Gstin>) -> String {
        let state = match (direction, party) {
            (Direction::Sales, Some(party)) => party.state_code(),
            _ => self.own_gstin.state_code(),
        };
        state.to_string()
    }

    /// Normalize a batch for a requested period.
    ///
    /// Every record lands in exactly one of the outcome lists. Invoices dated
    /// in another month keep their own period. A repeated document within
    /// the batch is rejected as a duplicate.
    pub fn normalize_batch(
        &self,
        records: &[RawInvoiceRecord],
        requested_period: FilingPeriod,
    ) -> NormalizationOutcome {
        let mut outcome = NormalizationOutcome::default();
        let mut seen = HashSet::new();

        for (row, raw) in records.iter().enumerate() {
            let reference = Some(raw.invoice_number.trim())
                .filter(|s| !s.is_empty())
                .map(String::from);

            let invoice = match self.normalize(raw) {
                Ok(invoice) => invoice,
                Err(reason) => {
                    debug!(row, reference = ?reference, error = %reason, "rejected upload record");
                    outcome.rejected.push(RejectedRecord {
                        row,
                        reference,
                        reason,
                    });
                    continue;
                }
            };

            let key = (
                invoice.direction,
                invoice.party_gstin.clone().filter(|_| invoice.direction == Direction::Purchase),
                invoice.number_key(),
            );
            if !seen.insert(key) {
                outcome.rejected.push(RejectedRecord {
                    row,
                    reference,
                    reason: GstError::DuplicateInvoice(format!(
                        "{} appears more than once in the upload",
                        invoice.invoice_number
                    )),
                });
                continue;
            }

            if invoice.period == requested_period {
                outcome.accepted.push(invoice);
            } else {
                outcome.out_of_period.push(invoice);
            }
        }

        info!(
            gstin = %self.own_gstin,
            period = %requested_period,
            accepted = outcome.accepted.len(),
            out_of_period = outcome.out_of_period.len(),
            rejected = outcome.rejected.len(),
            "normalized upload batch"
        );

        outcome
    }
}

fn parse_direction(raw: &str) -> GstResult<Direction> {
    let text = require_field(raw, "direction")?.to_ascii_lowercase();
    match text.as_str() {
        "sales" | "sale" | "outward" => Ok(Direction::Sales),
        "purchase" | "purchases" | "inward" => Ok(Direction::Purchase),
        other => Err(GstError::InvalidDocument(format!(
            "unknown direction '{other}'"
        ))),
    }
}

fn parse_document_type(raw: Option<&str>) -> GstResult<DocumentType> {
    let text = raw.map(|s| s.trim().to_ascii_lowercase()).unwrap_or_default();
    match text.replace(['_', '-'], " ").as_str() {
        "" | "invoice" | "tax invoice" | "inv" => Ok(DocumentType::Invoice),
        "credit note" | "cn" => Ok(DocumentType::CreditNote),
        "debit note" | "dn" => Ok(DocumentType::DebitNote),
        other => Err(GstError::InvalidDocument(format!(
            "unknown document type '{other}'"
        ))),
    }
}

fn parse_supply_nature(raw: Option<&str>) -> GstResult<SupplyNature> {
    let text = raw.map(|s| s.trim().to_ascii_lowercase()).unwrap_or_default();
    match text.as_str() {
        "" | "domestic" | "regular" => Ok(SupplyNature::Domestic),
        "export" | "exp" => Ok(SupplyNature::Export),
        "import" | "imp" => Ok(SupplyNature::Import),
        other => Err(GstError::InvalidDocument(format!(
            "unknown supply type '{other}'"
        ))),
    }
}
