//! Matching of inward invoices against vendor-reported credit

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::reconciliation::statement::*;
use crate::tax::gst::GstCalculator;
use crate::tax::jurisdiction::Gstin;
use crate::types::*;

/// Outcome of matching one claim against the vendor statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Found with the same amounts
    Matched,
    /// Found, same total, different head composition
    Partial,
    /// Found with a different total or a conflicting document type
    Mismatch,
    /// Not reported by the supplier yet
    Pending,
}

impl MatchStatus {
    /// Whether the claimed credit may be availed
    pub fn is_eligible(&self) -> bool {
        matches!(self, MatchStatus::Matched | MatchStatus::Partial)
    }
}

/// GSTR-3B table 4(A) classification of a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItcType {
    ImportOfGoods,
    ReverseCharge,
    AllOther,
}

impl ItcType {
    fn of(invoice: &Invoice) -> Self {
        if invoice.supply_nature == SupplyNature::Import {
            ItcType::ImportOfGoods
        } else if invoice.reverse_charge {
            ItcType::ReverseCharge
        } else {
            ItcType::AllOther
        }
    }
}

/// Credit claimed on one inward document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItcClaim {
    pub invoice_number: String,
    pub supplier_gstin: Option<Gstin>,
    pub supplier_name: String,
    pub invoice_date: NaiveDate,
    pub document_type: DocumentType,
    pub itc_type: ItcType,
    /// Claimed tax, negative for credit notes
    pub claimed: TaxComponents,
    /// Tax the supplier reported, when found
    pub reported: Option<TaxComponents>,
    pub status: MatchStatus,
    /// Credit is blocked regardless of match status
    pub blocked: bool,
    /// Block-list entry that blocked the credit
    pub block_reason: Option<String>,
    /// 100 for matched, 0 for pending; no score is derived for the rest
    pub match_score: Option<u8>,
    /// Why a claim is not matched
    pub note: Option<String>,
}

impl ItcClaim {
    /// Whether the claimed credit counts towards eligible ITC
    pub fn is_eligible(&self) -> bool {
        self.status.is_eligible() && !self.blocked
    }

    pub(crate) fn key(&self) -> MatchKey {
        match_key(self.supplier_gstin.as_ref(), &self.invoice_number)
    }

    fn set_status(
        &mut self,
        status: MatchStatus,
        reported: Option<TaxComponents>,
        note: Option<String>,
    ) {
        self.match_score = match status {
            MatchStatus::Matched => Some(100),
            MatchStatus::Pending => Some(0),
            MatchStatus::Partial | MatchStatus::Mismatch => None,
        };
        self.status = status;
        self.reported = reported;
        self.note = note;
    }
}

/// Credit totals over a set of claims
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItcSummary {
    pub total_claimed: TaxComponents,
    /// Matched or partial, not blocked
    pub eligible: TaxComponents,
    pub eligible_imports: TaxComponents,
    pub eligible_reverse_charge: TaxComponents,
    pub eligible_all_other: TaxComponents,
    /// Blocked claims, whatever their status
    pub blocked: TaxComponents,
    /// Not yet reported, not blocked
    pub pending: TaxComponents,
    /// Reported differently, not blocked
    pub mismatched: TaxComponents,
}

impl ItcSummary {
    pub fn from_claims(claims: &[ItcClaim]) -> Self {
        let mut summary = Self::default();
        for claim in claims {
            summary.total_claimed += &claim.claimed;

            if claim.blocked {
                summary.blocked += &claim.claimed;
                continue;
            }

            match claim.status {
                MatchStatus::Matched | MatchStatus::Partial => {
                    summary.eligible += &claim.claimed;
                    match claim.itc_type {
                        ItcType::ImportOfGoods => summary.eligible_imports += &claim.claimed,
                        ItcType::ReverseCharge => summary.eligible_reverse_charge += &claim.claimed,
                        ItcType::AllOther => summary.eligible_all_other += &claim.claimed,
                    }
                }
                MatchStatus::Pending => summary.pending += &claim.claimed,
                MatchStatus::Mismatch => summary.mismatched += &claim.claimed,
            }
        }
        summary
    }
}

/// Credit claimed from one supplier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorItcRow {
    /// `None` groups import bills of entry
    pub supplier_gstin: Option<Gstin>,
    pub supplier_name: String,
    pub invoices: usize,
    pub itc_claimed: BigDecimal,
    /// Matched when every claim matched, pending when none was reported,
    /// mismatch when any claim mismatched, partial otherwise
    pub status: MatchStatus,
    /// Percentage of the supplier's claims that matched
    pub match_score: u8,
}

impl VendorItcRow {
    fn from_group(supplier_gstin: Option<Gstin>, group: &[&ItcClaim]) -> Self {
        let count = |status: MatchStatus| group.iter().filter(|c| c.status == status).count();
        let matched = count(MatchStatus::Matched);

        let status = if count(MatchStatus::Mismatch) > 0 {
            MatchStatus::Mismatch
        } else if matched == group.len() {
            MatchStatus::Matched
        } else if count(MatchStatus::Pending) == group.len() {
            MatchStatus::Pending
        } else {
            MatchStatus::Partial
        };

        Self {
            supplier_gstin,
            supplier_name: group
                .first()
                .map(|c| c.supplier_name.clone())
                .unwrap_or_default(),
            invoices: group.len(),
            itc_claimed: group.iter().map(|c| c.claimed.total()).sum(),
            status,
            match_score: (matched * 100 / group.len().max(1)) as u8,
        }
    }
}

impl ItcSummary {
    /// Claims rolled up per supplier, in order of first appearance
    pub fn by_vendor(claims: &[ItcClaim]) -> Vec<VendorItcRow> {
        let mut order = Vec::new();
        let mut groups: HashMap<Option<Gstin>, Vec<&ItcClaim>> = HashMap::new();
        for claim in claims {
            groups
                .entry(claim.supplier_gstin.clone())
                .or_insert_with(|| {
                    order.push(claim.supplier_gstin.clone());
                    Vec::new()
                })
                .push(claim);
        }

        order
            .into_iter()
            .filter_map(|gstin| {
                let group = groups.remove(&gstin)?;
                Some(VendorItcRow::from_group(gstin, &group))
            })
            .collect()
    }
}

/// Claims produced by one reconciliation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationRun {
    /// One claim per inward invoice, in invoice order
    pub claims: Vec<ItcClaim>,
    pub summary: ItcSummary,
    pub vendors: Vec<VendorItcRow>,
    /// Statement the claims were matched against; `None` when unavailable
    pub source: Option<StatementSource>,
    /// The vendor statement could not be obtained
    pub data_unavailable: bool,
    /// Inward invoices whose tax could not be computed
    pub skipped: Vec<SkippedRecord>,
}

impl ReconciliationRun {
    fn new(
        claims: Vec<ItcClaim>,
        source: Option<StatementSource>,
        skipped: Vec<SkippedRecord>,
    ) -> Self {
        let summary = ItcSummary::from_claims(&claims);
        let vendors = ItcSummary::by_vendor(&claims);
        Self {
            claims,
            summary,
            vendors,
            source,
            data_unavailable: source.is_none(),
            skipped,
        }
    }

    /// Number of claims in a given status
    pub fn count(&self, status: MatchStatus) -> usize {
        self.claims.iter().filter(|c| c.status == status).count()
    }
}

/// ITC reconciliation engine
#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    calculator: GstCalculator,
    config: EngineConfig,
}

impl ReconciliationEngine {
    /// Create an engine for the recipient holding `own_gstin`
    pub fn new(own_gstin: Gstin, config: EngineConfig) -> Self {
        Self {
            calculator: GstCalculator::new(own_gstin),
            config,
        }
    }

    /// Build unmatched claims for the inward invoices
    fn claims_for(&self, inward: &[Invoice]) -> (Vec<ItcClaim>, Vec<SkippedRecord>) {
        let mut claims = Vec::new();
        let mut skipped = Vec::new();

        for invoice in inward.iter().filter(|i| i.direction == Direction::Purchase) {
            let calculation = match self.calculator.compute_invoice_tax(invoice) {
                Ok(calculation) => calculation,
                Err(reason) => {
                    skipped.push(SkippedRecord {
                        reference: invoice.invoice_number.clone(),
                        reason,
                    });
                    continue;
                }
            };

            let block_reason = invoice
                .supply_category
                .as_deref()
                .and_then(|category| self.config.blocked_by(category))
                .map(String::from);

            claims.push(ItcClaim {
                invoice_number: invoice.invoice_number.clone(),
                supplier_gstin: invoice.party_gstin.clone(),
                supplier_name: invoice.party_name.clone(),
                invoice_date: invoice.invoice_date,
                document_type: invoice.document_type,
                itc_type: ItcType::of(invoice),
                claimed: calculation
                    .components()
                    .signed(invoice.document_type.sign()),
                reported: None,
                status: MatchStatus::Pending,
                blocked: block_reason.is_some(),
                block_reason,
                match_score: Some(0),
                note: None,
            });
        }

        (claims, skipped)
    }

    fn classify(
        &self,
        claim: &ItcClaim,
        entry: &VendorCreditEntry,
    ) -> (MatchStatus, Option<String>) {
        let tolerance = &self.config.matching_tolerance;

        if entry.document_type != claim.document_type {
            return (
                MatchStatus::Mismatch,
                Some(format!(
                    "claimed as {:?}, reported as {:?}",
                    claim.document_type, entry.document_type
                )),
            );
        }

        let reported = entry.signed_tax();
        let difference = (claim.claimed.total() - reported.total()).abs();

        if difference > *tolerance {
            (
                MatchStatus::Mismatch,
                Some(format!(
                    "claimed {}, supplier reported {}",
                    claim.claimed.total(),
                    reported.total()
                )),
            )
        } else if claim.claimed.within(&reported, tolerance) {
            (MatchStatus::Matched, None)
        } else {
            (
                MatchStatus::Partial,
                Some("total agrees but IGST/CGST/SGST split differs".to_string()),
            )
        }
    }

    /// Match inward invoices against a vendor statement.
    ///
    /// Deterministic: the same invoices and statement always give the same
    /// claims, in invoice order.
    pub fn reconcile(
        &self,
        inward: &[Invoice],
        statement: &VendorCreditStatement,
    ) -> ReconciliationRun {
        let (mut claims, skipped) = self.claims_for(inward);
        let index = statement.index();

        for claim in claims.iter_mut() {
            match index.get(&claim.key()) {
                Some(entry) => {
                    let (status, note) = self.classify(claim, entry);
                    claim.set_status(status, Some(entry.signed_tax()), note);
                }
                None => claim.set_status(MatchStatus::Pending, None, None),
            }
        }

        let run = ReconciliationRun::new(claims, Some(statement.source), skipped);
        info!(
            gstin = %self.calculator.own_gstin(),
            period = %statement.period,
            source = ?statement.source,
            matched = run.count(MatchStatus::Matched),
            partial = run.count(MatchStatus::Partial),
            mismatch = run.count(MatchStatus::Mismatch),
            pending = run.count(MatchStatus::Pending),
            eligible = %run.summary.eligible.total(),
            "reconciled input tax credit"
        );
        run
    }

    /// Degraded run used when the vendor statement could not be fetched:
    /// every claim is pending
    pub fn reconcile_unavailable(
        &self,
        inward: &[Invoice],
        reason: &GstError,
    ) -> ReconciliationRun {
        warn!(error = %reason, "vendor statement unavailable, all claims pending");
        let (claims, skipped) = self.claims_for(inward);
        ReconciliationRun::new(claims, None, skipped)
    }

    /// Fold a previous run's outcome into a fresh one.
    ///
    /// When the fresh run had no vendor data, earlier statuses are kept. When
    /// it had data, the fresh status stands; a matched claim that lost its
    /// match is logged.
    pub fn merge_with_previous(
        &self,
        previous: &[ItcClaim],
        fresh: ReconciliationRun,
    ) -> ReconciliationRun {
        let previous: HashMap<MatchKey, &ItcClaim> =
            previous.iter().map(|claim| (claim.key(), claim)).collect();

        let mut claims = fresh.claims;
        for claim in claims.iter_mut() {
            let Some(prior) = previous.get(&claim.key()) else {
                continue;
            };

            if fresh.data_unavailable {
                if prior.status != MatchStatus::Pending {
                    debug!(
                        invoice = %claim.invoice_number,
                        status = ?prior.status,
                        "keeping previous status"
                    );
                    claim.set_status(prior.status, prior.reported.clone(), prior.note.clone());
                }
            } else if prior.status == MatchStatus::Matched && claim.status != MatchStatus::Matched {
                warn!(
                    invoice = %claim.invoice_number,
                    supplier = ?claim.supplier_gstin.as_ref().map(Gstin::as_str),
                    from = ?prior.status,
                    to = ?claim.status,
                    "previously matched claim changed after new vendor data"
                );
            }
        }

        ReconciliationRun::new(claims, fresh.source, fresh.skipped)
    }
}

/// Sum of the total claimed tax over eligible claims
pub fn eligible_itc_total(claims: &[ItcClaim]) -> BigDecimal {
    claims
        .iter()
        .filter(|claim| claim.is_eligible())
        .map(|claim| claim.claimed.total())
        .sum()
}
