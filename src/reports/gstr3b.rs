//! GSTR-3B: monthly summary return and tax payment

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::reconciliation::{ItcClaim, ItcSummary};
use crate::tax::gst::{SupplyTotals, TaxAggregate};
use crate::tax::jurisdiction::Gstin;
use crate::tax::setoff::set_off;
use crate::types::*;

/// Table 3.1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutwardSupplies {
    /// 3.1(a)
    pub taxable: SupplyTotals,
    /// 3.1(b)
    pub zero_rated: SupplyTotals,
    /// 3.1(c)
    pub nil_rated: SupplyTotals,
    /// 3.1(d)
    pub inward_reverse_charge: SupplyTotals,
}

/// Table 4
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibleItc {
    /// 4(A)(1)
    pub import_of_goods: TaxComponents,
    /// 4(A)(3)
    pub reverse_charge: TaxComponents,
    /// 4(A)(5)
    pub all_other: TaxComponents,
    /// 4(C), sum of the 4(A) rows
    pub net_itc: TaxComponents,
    /// 4(D), blocked credit
    pub ineligible: TaxComponents,
}

/// Table 6.1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxPayment {
    /// Output tax plus reverse-charge tax; never negative
    pub tax_payable: TaxComponents,
    pub paid_through_itc: TaxComponents,
    /// Never negative; includes all reverse-charge tax
    pub paid_in_cash: TaxComponents,
    /// Credit left after set-off
    pub carry_forward: TaxComponents,
    /// Output tax pushed below zero by credit notes, carried to the next
    /// period instead of being reported as a negative payable
    pub credit_note_excess: TaxComponents,
}

/// GSTR-3B for one GSTIN and period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gstr3bReport {
    pub gstin: Gstin,
    pub period: FilingPeriod,
    pub outward: OutwardSupplies,
    pub itc: EligibleItc,
    pub payment: TaxPayment,
}

impl Gstr3bReport {
    /// Total cash to be paid
    pub fn cash_payable(&self) -> BigDecimal {
        self.payment.paid_in_cash.total()
    }

    /// Credit used against output tax
    pub fn itc_utilized(&self) -> BigDecimal {
        self.payment.paid_through_itc.total()
    }

    /// Credit left over for the next period
    pub fn itc_balance(&self) -> BigDecimal {
        self.payment.carry_forward.total()
    }
}

fn clamp_negative(components: &TaxComponents) -> TaxComponents {
    let zero = BigDecimal::from(0);
    let clamp = |v: &BigDecimal| if *v < zero { zero.clone() } else { v.clone() };
    TaxComponents::new(
        clamp(&components.igst),
        clamp(&components.cgst),
        clamp(&components.sgst),
    )
}

/// Build GSTR-3B from the period aggregate and the reconciled ITC claims.
///
/// Output tax is set off against net ITC; reverse-charge tax can only be
/// paid in cash and is added to the cash column. A head whose output tax
/// went negative pays nothing and reports the excess separately.
pub fn build_gstr3b(aggregate: &TaxAggregate, claims: &[ItcClaim]) -> GstResult<Gstr3bReport> {
    aggregate.verify()?;

    let summary = ItcSummary::from_claims(claims);
    let itc = EligibleItc {
        import_of_goods: summary.eligible_imports.clone(),
        reverse_charge: summary.eligible_reverse_charge.clone(),
        all_other: summary.eligible_all_other.clone(),
        net_itc: summary.eligible.clone(),
        ineligible: summary.blocked.clone(),
    };

    let breakdown = &aggregate.breakdown;
    let output_tax = &aggregate.total.output_tax;
    let liability = clamp_negative(output_tax);
    let reverse_charge_tax = clamp_negative(&breakdown.inward_reverse_charge.tax);

    let settlement = set_off(&liability, &itc.net_itc);
    let payment = TaxPayment {
        tax_payable: &liability + &reverse_charge_tax,
        paid_through_itc: settlement.paid_through_itc.clone(),
        paid_in_cash: &settlement.cash_payable + &reverse_charge_tax,
        carry_forward: settlement.carry_forward.clone(),
        credit_note_excess: &liability - output_tax,
    };

    debug!(
        gstin = %aggregate.gstin,
        period = %aggregate.period,
        itc_utilized = %settlement.itc_utilized(),
        cash = %payment.paid_in_cash.total(),
        "built GSTR-3B"
    );

    Ok(Gstr3bReport {
        gstin: aggregate.gstin.clone(),
        period: aggregate.period,
        outward: OutwardSupplies {
            taxable: breakdown.outward_taxable.clone(),
            zero_rated: breakdown.zero_rated.clone(),
            nil_rated: breakdown.nil_rated.clone(),
            inward_reverse_charge: breakdown.inward_reverse_charge.clone(),
        },
        itc,
        payment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::reconciliation::*;
    use crate::tax::gst::GstCalculator;
    use chrono::NaiveDate;

    fn own() -> Gstin {
        Gstin::parse("27AABCU9603R1ZM").unwrap()
    }

    fn interstate_supplier() -> Gstin {
        Gstin::parse("29AABCB5678R1ZM").unwrap()
    }

    fn local_supplier() -> Gstin {
        Gstin::parse("27AAACR1234Q1Z5").unwrap()
    }

    fn invoice(
        number: &str,
        direction: Direction,
        party: Option<Gstin>,
        value: i64,
        pos: &str,
    ) -> Invoice {
        let date = NaiveDate::from_ymd_opt(2026, 1, 12).unwrap();
        Invoice {
            invoice_number: number.to_string(),
            direction,
            document_type: DocumentType::Invoice,
            party_gstin: party,
            party_name: "Party".to_string(),
            taxable_value: BigDecimal::from(value).with_scale(2),
            rate: GstRateSlab::Eighteen,
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

    /// Reconcile with a statement that reports every purchase exactly
    fn fully_matched(invoices: &[Invoice]) -> Vec<ItcClaim> {
        let engine = ReconciliationEngine::new(own(), EngineConfig::default());
        let empty = VendorCreditStatement::new(own(), period(), StatementSource::Gstr2b);
        let pending = engine.reconcile(invoices, &empty);
        let mut statement = VendorCreditStatement::new(own(), period(), StatementSource::Gstr2b);
        for claim in &pending.claims {
            statement.push(VendorCreditEntry::new(
                claim.supplier_gstin.clone(),
                claim.invoice_number.clone(),
                claim.claimed.clone(),
            ));
        }
        engine.reconcile(invoices, &statement).claims
    }

    #[test]
    fn test_payment_after_set_off() {
        let invoices = vec![
            invoice("S-1", Direction::Sales, None, 465000, "29"),
            invoice("S-2", Direction::Sales, None, 485000, "27"),
            invoice("P-1", Direction::Purchase, Some(interstate_supplier()), 285000, "27"),
            invoice("P-2", Direction::Purchase, Some(local_supplier()), 450000, "27"),
        ];
        let aggregate = GstCalculator::new(own()).aggregate(&invoices, period()).unwrap();
        let claims = fully_matched(&invoices);

        let report = build_gstr3b(&aggregate, &claims).unwrap();

        assert_eq!(report.outward.taxable.taxable_value, BigDecimal::from(950000));
        assert_eq!(report.itc.net_itc.igst, BigDecimal::from(51300));
        assert_eq!(report.itc.net_itc.cgst, BigDecimal::from(40500));
        assert_eq!(report.payment.tax_payable.total(), BigDecimal::from(171000));
        assert_eq!(report.payment.paid_in_cash.igst, BigDecimal::from(32400));
        assert_eq!(report.payment.paid_in_cash.cgst, BigDecimal::from(3150));
        assert_eq!(report.payment.paid_in_cash.sgst, BigDecimal::from(3150));
        assert_eq!(report.cash_payable(), BigDecimal::from(38700));
        assert_eq!(report.itc_utilized(), BigDecimal::from(132300));
        assert_eq!(report.itc_balance(), BigDecimal::from(0));
        assert_eq!(report.payment.credit_note_excess.total(), BigDecimal::from(0));
    }

    #[test]
    fn test_reverse_charge_paid_in_cash() {
        let mut legal =
            invoice("P-RCM", Direction::Purchase, Some(local_supplier()), 10000, "27");
        legal.reverse_charge = true;
        let invoices = vec![invoice("S-1", Direction::Sales, None, 100000, "27"), legal];

        let aggregate = GstCalculator::new(own()).aggregate(&invoices, period()).unwrap();
        let claims = fully_matched(&invoices);
        let report = build_gstr3b(&aggregate, &claims).unwrap();

        assert_eq!(report.outward.inward_reverse_charge.invoice_count, 1);
        assert_eq!(report.itc.reverse_charge.total(), BigDecimal::from(1800));
        // 18000 output less 1800 credit, plus 1800 reverse-charge tax in cash
        assert_eq!(report.payment.paid_through_itc.total(), BigDecimal::from(1800));
        assert_eq!(report.cash_payable(), BigDecimal::from(18000));
    }

    #[test]
    fn test_blocked_credit_is_ineligible() {
        let mut meals = invoice("P-1", Direction::Purchase, Some(local_supplier()), 10000, "27");
        meals.supply_category = Some("Food and beverages".to_string());
        let invoices = vec![invoice("S-1", Direction::Sales, None, 10000, "27"), meals];

        let aggregate = GstCalculator::new(own()).aggregate(&invoices, period()).unwrap();
        let report = build_gstr3b(&aggregate, &fully_matched(&invoices)).unwrap();

        assert_eq!(report.itc.ineligible.total(), BigDecimal::from(1800));
        assert_eq!(report.itc.net_itc.total(), BigDecimal::from(0));
        assert_eq!(report.cash_payable(), BigDecimal::from(1800));
    }

    #[test]
    fn test_excess_credit_carried_forward() {
        let invoices = vec![
            invoice("S-1", Direction::Sales, None, 1000, "27"),
            invoice("P-1", Direction::Purchase, Some(interstate_supplier()), 5000, "27"),
        ];
        let aggregate = GstCalculator::new(own()).aggregate(&invoices, period()).unwrap();
        let report = build_gstr3b(&aggregate, &fully_matched(&invoices)).unwrap();

        assert_eq!(report.cash_payable(), BigDecimal::from(0));
        assert_eq!(report.payment.carry_forward.igst, BigDecimal::from(720));
    }

    #[test]
    fn test_credit_notes_beyond_output_are_not_negative_payable() {
        let mut note = invoice("CN-1", Direction::Sales, None, 2000, "29");
        note.document_type = DocumentType::CreditNote;
        note.amends = Some("S-1".to_string());
        let invoices = vec![invoice("S-1", Direction::Sales, None, 1000, "29"), note];

        let aggregate = GstCalculator::new(own()).aggregate(&invoices, period()).unwrap();
        assert_eq!(aggregate.total.output_tax.igst, BigDecimal::from(-180));

        let report = build_gstr3b(&aggregate, &[]).unwrap();
        assert_eq!(report.payment.tax_payable.igst, BigDecimal::from(0));
        assert_eq!(report.payment.paid_in_cash.igst, BigDecimal::from(0));
        assert_eq!(report.payment.credit_note_excess.igst, BigDecimal::from(180));
        assert_eq!(report.payment.credit_note_excess.cgst, BigDecimal::from(0));
        assert_eq!(report.cash_payable(), BigDecimal::from(0));
    }

    #[test]
    fn test_balance_is_unused_credit() {
        let invoices = vec![
            invoice("S-1", Direction::Sales, None, 1000, "27"),
            invoice("P-1", Direction::Purchase, Some(interstate_supplier()), 5000, "27"),
        ];
        let aggregate = GstCalculator::new(own()).aggregate(&invoices, period()).unwrap();
        let report = build_gstr3b(&aggregate, &fully_matched(&invoices)).unwrap();

        assert_eq!(report.itc_utilized(), BigDecimal::from(180));
        assert_eq!(report.itc_balance(), BigDecimal::from(720));
        assert_eq!(
            report.itc_utilized() + report.itc_balance(),
            report.itc.net_itc.total()
        );
    }
}
