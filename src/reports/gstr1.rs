//! GSTR-1: statement of outward supplies

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::tax::gst::{is_export, GstCalculator, SupplyTotals, TaxAggregate};
use crate::tax::jurisdiction::Gstin;
use crate::types::*;

/// One document line in a GSTR-1 table; notes carry negative amounts
/// when they are credit notes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gstr1Line {
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    pub document_type: DocumentType,
    pub party_gstin: Option<Gstin>,
    pub party_name: String,
    pub place_of_supply: String,
    pub rate: GstRateSlab,
    pub taxable_value: BigDecimal,
    pub tax: TaxComponents,
}

/// B2B invoices to one recipient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct B2bGroup {
    pub recipient_gstin: Gstin,
    pub recipient_name: String,
    pub invoices: Vec<Gstr1Line>,
    pub subtotal: SupplyTotals,
}

/// B2C supplies at one rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct B2cGroup {
    pub rate: GstRateSlab,
    pub subtotal: SupplyTotals,
}

/// Credit and debit notes for one recipient; unregistered recipients are
/// grouped under `None`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdnrGroup {
    pub recipient_gstin: Option<Gstin>,
    pub notes: Vec<Gstr1Line>,
    pub subtotal: SupplyTotals,
}

/// Export invoices
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportGroup {
    pub invoices: Vec<Gstr1Line>,
    pub subtotal: SupplyTotals,
}

/// GSTR-1 for one GSTIN and period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gstr1Report {
    pub gstin: Gstin,
    pub period: FilingPeriod,
    /// Ordered by recipient GSTIN
    pub b2b: Vec<B2bGroup>,
    /// Ordered by ascending rate
    pub b2c: Vec<B2cGroup>,
    pub cdnr: Vec<CdnrGroup>,
    pub exports: ExportGroup,
    /// Sum of every group subtotal
    pub grand_total: SupplyTotals,
}

impl Gstr1Report {
    /// Number of documents across all tables
    pub fn document_count(&self) -> usize {
        self.grand_total.invoice_count
    }
}

/// Build GSTR-1 from the period aggregate and the invoices behind it.
///
/// Only outward invoices the aggregate included are reported. The grand
/// total must agree with the aggregate's outward taxable value and output
/// tax.
pub fn build_gstr1(aggregate: &TaxAggregate, invoices: &[Invoice]) -> GstResult<Gstr1Report> {
    let calculator = GstCalculator::new(aggregate.gstin.clone());

    let mut b2b: BTreeMap<Gstin, B2bGroup> = BTreeMap::new();
    let mut b2c: BTreeMap<GstRateSlab, SupplyTotals> = BTreeMap::new();
    let mut cdnr: BTreeMap<Option<Gstin>, CdnrGroup> = BTreeMap::new();
    let mut exports = ExportGroup::default();

    let outward = invoices
        .iter()
        .filter(|i| i.direction == Direction::Sales && i.period == aggregate.period);

    for invoice in outward {
        // Same exclusions as the aggregate
        let Ok(calculation) = calculator.compute_invoice_tax(invoice) else {
            continue;
        };

        let sign = invoice.document_type.sign();
        let line = Gstr1Line {
            invoice_number: invoice.invoice_number.clone(),
            invoice_date: invoice.invoice_date,
            document_type: invoice.document_type,
            party_gstin: invoice.party_gstin.clone(),
            party_name: invoice.party_name.clone(),
            place_of_supply: invoice.place_of_supply.clone(),
            rate: invoice.rate,
            taxable_value: invoice.signed(&calculation.base_amount),
            tax: calculation.components().signed(sign),
        };

        if invoice.document_type.is_note() {
            let group = cdnr
                .entry(invoice.party_gstin.clone())
                .or_insert_with(|| CdnrGroup {
                    recipient_gstin: invoice.party_gstin.clone(),
                    notes: Vec::new(),
                    subtotal: SupplyTotals::default(),
                });
            group.subtotal.add(invoice, &calculation);
            group.notes.push(line);
        } else if is_export(invoice) {
            exports.subtotal.add(invoice, &calculation);
            exports.invoices.push(line);
        } else if let Some(gstin) = &invoice.party_gstin {
            let group = b2b.entry(gstin.clone()).or_insert_with(|| B2bGroup {
                recipient_gstin: gstin.clone(),
                recipient_name: invoice.party_name.clone(),
                invoices: Vec::new(),
                subtotal: SupplyTotals::default(),
            });
            group.subtotal.add(invoice, &calculation);
            group.invoices.push(line);
        } else {
            b2c.entry(invoice.rate).or_default().add(invoice, &calculation);
        }
    }

    let b2b: Vec<B2bGroup> = b2b.into_values().collect();
    let b2c: Vec<B2cGroup> = b2c
        .into_iter()
        .map(|(rate, subtotal)| B2cGroup { rate, subtotal })
        .collect();
    let cdnr: Vec<CdnrGroup> = cdnr.into_values().collect();

    let mut grand_total = SupplyTotals::default();
    b2b.iter().for_each(|g| grand_total.merge(&g.subtotal));
    b2c.iter().for_each(|g| grand_total.merge(&g.subtotal));
    cdnr.iter().for_each(|g| grand_total.merge(&g.subtotal));
    grand_total.merge(&exports.subtotal);

    if grand_total.taxable_value != aggregate.total.outward_taxable_value
        || grand_total.tax != aggregate.total.output_tax
    {
        return Err(GstError::AggregateInconsistency(format!(
            "GSTR-1 totals (value {}, tax {}) differ from the period aggregate (value {}, tax {})",
            grand_total.taxable_value,
            grand_total.tax.total(),
            aggregate.total.outward_taxable_value,
            aggregate.total.output_tax_total()
        )));
    }

    debug!(
        gstin = %aggregate.gstin,
        period = %aggregate.period,
        b2b = b2b.len(),
        b2c = b2c.len(),
        cdnr = cdnr.len(),
        exports = exports.invoices.len(),
        "built GSTR-1"
    );

    Ok(Gstr1Report {
        gstin: aggregate.gstin.clone(),
        period: aggregate.period,
        b2b,
        b2c,
        cdnr,
        exports,
        grand_total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn own() -> Gstin {
        Gstin::parse("27AABCU9603R1ZM").unwrap()
    }

    fn sale(
        number: &str,
        party: Option<&str>,
        value: i64,
        rate: GstRateSlab,
        pos: &str,
    ) -> Invoice {
        let date = NaiveDate::from_ymd_opt(2026, 1, 20).unwrap();
        Invoice {
            invoice_number: number.to_string(),
            direction: Direction::Sales,
            document_type: DocumentType::Invoice,
            party_gstin: party.map(|g| Gstin::parse(g).unwrap()),
            party_name: "Customer".to_string(),
            taxable_value: BigDecimal::from(value).with_scale(2),
            rate,
            place_of_supply: pos.to_string(),
            invoice_date: date,
            period: FilingPeriod::from_date(date),
            supply_nature: SupplyNature::Domestic,
            reverse_charge: false,
            supply_category: None,
            amends: None,
        }
    }

    fn period() -> FilingPeriod {
        FilingPeriod::new(2026, 1).unwrap()
    }

    fn report(invoices: &[Invoice]) -> Gstr1Report {
        let aggregate = GstCalculator::new(own()).aggregate(invoices, period()).unwrap();
        build_gstr1(&aggregate, invoices).unwrap()
    }

    #[test]
    fn test_sections() {
        let mut note = sale("CN-1", Some("29AABCB5678R1ZM"), 1000, GstRateSlab::Eighteen, "29");
        note.document_type = DocumentType::CreditNote;
        note.amends = Some("INV-1".to_string());

        let mut export = sale("EXP-1", None, 50000, GstRateSlab::Eighteen, "96");
        export.supply_nature = SupplyNature::Export;

        let invoices = vec![
            sale("INV-1", Some("29AABCB5678R1ZM"), 100000, GstRateSlab::Eighteen, "29"),
            sale("INV-2", Some("29AABCB5678R1ZM"), 20000, GstRateSlab::Twelve, "29"),
            sale("INV-3", Some("27AAACR1234Q1Z5"), 10000, GstRateSlab::Five, "27"),
            sale("INV-4", None, 125000, GstRateSlab::Five, "27"),
            sale("INV-5", None, 350000, GstRateSlab::Eighteen, "27"),
            note,
            export,
        ];
        let report = report(&invoices);

        assert_eq!(report.b2b.len(), 2);
        assert_eq!(report.b2b[0].recipient_gstin.as_str(), "27AAACR1234Q1Z5");
        assert_eq!(report.b2b[1].invoices.len(), 2);
        assert_eq!(report.b2b[1].subtotal.taxable_value, BigDecimal::from(120000));

        assert_eq!(report.b2c.len(), 2);
        assert_eq!(report.b2c[0].rate, GstRateSlab::Five);
        assert_eq!(report.b2c[0].subtotal.tax.cgst, BigDecimal::from(3125));
        assert_eq!(report.b2c[1].subtotal.tax.sgst, BigDecimal::from(31500));

        assert_eq!(report.cdnr.len(), 1);
        assert_eq!(report.cdnr[0].notes[0].taxable_value, BigDecimal::from(-1000));
        assert_eq!(report.cdnr[0].subtotal.tax.igst, BigDecimal::from(-180));

        assert_eq!(report.exports.invoices.len(), 1);
        assert_eq!(report.exports.subtotal.tax.igst, BigDecimal::from(9000));

        assert_eq!(report.document_count(), 7);
        assert_eq!(
            report.grand_total.taxable_value,
            BigDecimal::from(100000 + 20000 + 10000 + 125000 + 350000 - 1000 + 50000)
        );
    }

    #[test]
    fn test_skipped_invoices_left_out() {
        let invoices = vec![
            sale("INV-1", None, 1000, GstRateSlab::Eighteen, "27"),
            sale("INV-2", None, 1000, GstRateSlab::Eighteen, "Atlantis"),
        ];
        let report = report(&invoices);
        assert_eq!(report.document_count(), 1);
    }

    #[test]
    fn test_purchases_not_reported() {
        let mut purchase = sale("P-1", Some("29AABCB5678R1ZM"), 1000, GstRateSlab::Eighteen, "27");
        purchase.direction = Direction::Purchase;
        let report = report(&[purchase]);
        assert_eq!(report.document_count(), 0);
        assert!(report.b2b.is_empty());
    }

    #[test]
    fn test_inconsistent_aggregate_rejected() {
        let invoices = vec![sale("INV-1", None, 1000, GstRateSlab::Eighteen, "27")];
        let mut aggregate = GstCalculator::new(own()).aggregate(&invoices, period()).unwrap();
        aggregate.total.outward_taxable_value += BigDecimal::from(1);

        assert!(matches!(
            build_gstr1(&aggregate, &invoices),
            Err(GstError::AggregateInconsistency(_))
        ));
    }
}
