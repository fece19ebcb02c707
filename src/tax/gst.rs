//! GST (Goods and Services Tax) calculation engine for Indian tax compliance

use bigdecimal::{BigDecimal, RoundingMode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::tax::jurisdiction::{Gstin, StateCode};
use crate::types::*;

/// Round to the nearest paisa, halves away from zero
pub fn round_money(amount: &BigDecimal) -> BigDecimal {
    amount.with_scale_round(2, RoundingMode::HalfUp)
}

/// Whether a supply stays within one state or crosses state lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplyType {
    /// Supplier and place of supply in the same state - CGST + SGST
    IntraState,
    /// Different states, exports and imports - IGST
    InterState,
}

/// Detailed GST calculation breakdown for one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GstCalculation {
    /// Base amount (before GST)
    pub base_amount: BigDecimal,
    /// Slab used for calculation
    pub rate: GstRateSlab,
    pub supply_type: SupplyType,
    /// Calculated CGST amount
    pub cgst_amount: BigDecimal,
    /// Calculated SGST amount
    pub sgst_amount: BigDecimal,
    /// Calculated IGST amount
    pub igst_amount: BigDecimal,
    /// Total GST amount (CGST + SGST + IGST)
    pub total_gst_amount: BigDecimal,
    /// Total amount including GST
    pub total_amount: BigDecimal,
}

impl GstCalculation {
    /// Calculate GST amounts from base amount, slab and supply type.
    ///
    /// Each head is rounded on its own. Intra-state CGST and SGST are both
    /// levied at half the rate, so they are always equal; the total is the
    /// sum of the rounded heads.
    pub fn calculate(base_amount: BigDecimal, rate: GstRateSlab, supply_type: SupplyType) -> Self {
        let zero = round_money(&BigDecimal::from(0));

        let (cgst_amount, sgst_amount, igst_amount) = match supply_type {
            SupplyType::IntraState => {
                let half = round_money(&(&base_amount * rate.rate() / BigDecimal::from(200)));
                (half.clone(), half, zero)
            }
            SupplyType::InterState => {
                let igst = round_money(&(&base_amount * rate.rate() / BigDecimal::from(100)));
                (zero.clone(), zero, igst)
            }
        };

        let total_gst_amount = &cgst_amount + &sgst_amount + &igst_amount;
        let total_amount = &base_amount + &total_gst_amount;

        Self {
            base_amount,
            rate,
            supply_type,
            cgst_amount,
            sgst_amount,
            igst_amount,
            total_gst_amount,
            total_amount,
        }
    }

    /// The three heads as a single value
    pub fn components(&self) -> TaxComponents {
        TaxComponents::new(
            self.igst_amount.clone(),
            self.cgst_amount.clone(),
            self.sgst_amount.clone(),
        )
    }
}

/// Computes tax for invoices of one registered taxpayer
#[derive(Debug, Clone)]
pub struct GstCalculator {
    own_gstin: Gstin,
}

impl GstCalculator {
    /// Create a calculator for the taxpayer holding `own_gstin`
    pub fn new(own_gstin: Gstin) -> Self {
        Self { own_gstin }
    }

    pub fn own_gstin(&self) -> &Gstin {
        &self.own_gstin
    }

    /// Decide intra- vs inter-state treatment for an invoice.
    ///
    /// The supplier is the taxpayer for sales and the party for purchases.
    pub fn supply_type(&self, invoice: &Invoice) -> GstResult<SupplyType> {
        let place_of_supply = StateCode::resolve(&invoice.place_of_supply).ok_or_else(|| {
            GstError::UnresolvedJurisdiction(format!(
                "invoice {}: place of supply '{}' is not a known state",
                invoice.invoice_number, invoice.place_of_supply
            ))
        })?;

        if place_of_supply.is_foreign() || invoice.supply_nature != SupplyNature::Domestic {
            return Ok(SupplyType::InterState);
        }

        let supplier_state = match invoice.direction {
            Direction::Sales => self.own_gstin.state_code(),
            Direction::Purchase => invoice
                .party_gstin
                .as_ref()
                .map(Gstin::state_code)
                .unwrap_or_else(|| self.own_gstin.state_code()),
        };

        Ok(if supplier_state == place_of_supply {
            SupplyType::IntraState
        } else {
            SupplyType::InterState
        })
    }

    /// Calculate CGST/SGST/IGST for a single invoice
    pub fn compute_invoice_tax(&self, invoice: &Invoice) -> GstResult<GstCalculation> {
        let supply_type = self.supply_type(invoice)?;
        Ok(GstCalculation::calculate(
            invoice.taxable_value.clone(),
            invoice.rate,
            supply_type,
        ))
    }

    /// Aggregate a period's invoices by rate slab.
    ///
    /// Invoices whose tax cannot be computed, or that belong to another
    /// period, are left out and listed in `skipped`. A failed consistency
    /// check is fatal.
    pub fn aggregate(&self, invoices: &[Invoice], period: FilingPeriod) -> GstResult<TaxAggregate> {
        let mut rows: Vec<SlabRow> = Vec::new();
        let mut breakdown = SupplyBreakdown::default();
        let mut skipped = Vec::new();
        let mut included_taxable = BigDecimal::from(0);

        for invoice in invoices {
            if invoice.period != period {
                debug!(
                    invoice = %invoice.invoice_number,
                    invoice_period = %invoice.period,
                    %period,
                    "skipping invoice from another period"
                );
                skipped.push(SkippedRecord {
                    reference: invoice.invoice_number.clone(),
                    reason: GstError::OutOfPeriod(format!(
                        "invoice {} belongs to {}, not {}",
                        invoice.invoice_number, invoice.period, period
                    )),
                });
                continue;
            }

            let calculation = match self.compute_invoice_tax(invoice) {
                Ok(calculation) => calculation,
                Err(err) => {
                    debug!(invoice = %invoice.invoice_number, error = %err, "skipping invoice");
                    skipped.push(SkippedRecord {
                        reference: invoice.invoice_number.clone(),
                        reason: err,
                    });
                    continue;
                }
            };

            included_taxable += invoice.signed(&invoice.taxable_value);
            breakdown.record(invoice, &calculation);

            let position = match rows.iter().position(|row| row.rate == invoice.rate) {
                Some(position) => position,
                None => {
                    rows.push(SlabRow::new(invoice.rate));
                    rows.len() - 1
                }
            };
            rows[position].totals.record(invoice, &calculation);
        }

        rows.sort_by_key(|row| row.rate);

        let mut total = SlabTotals::default();
        for row in rows.iter_mut() {
            row.totals.finalize();
            total.merge(&row.totals);
        }
        total.finalize();

        let aggregate = TaxAggregate {
            gstin: self.own_gstin.clone(),
            period,
            net_payable: total.net_tax.clone(),
            slabs: rows,
            total,
            breakdown,
            skipped,
        };

        aggregate.verify()?;
        if aggregate.total.taxable_value() != included_taxable {
            return Err(GstError::AggregateInconsistency(format!(
                "total taxable value {} differs from the sum of included invoices {}",
                aggregate.total.taxable_value(),
                included_taxable
            )));
        }

        info!(
            gstin = %aggregate.gstin,
            %period,
            invoices = aggregate.total.invoice_count,
            skipped = aggregate.skipped.len(),
            net_payable = %aggregate.net_payable,
            "aggregated filing period"
        );

        Ok(aggregate)
    }
}

/// Accumulated values for one slab, or for the whole period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlabTotals {
    pub invoice_count: usize,
    pub outward_taxable_value: BigDecimal,
    pub inward_taxable_value: BigDecimal,
    /// Tax on sales
    pub output_tax: TaxComponents,
    /// Tax on purchases
    pub input_tax: TaxComponents,
    /// Output tax minus input tax
    pub net_tax: BigDecimal,
}

impl Default for SlabTotals {
    fn default() -> Self {
        Self {
            invoice_count: 0,
            outward_taxable_value: BigDecimal::from(0),
            inward_taxable_value: BigDecimal::from(0),
            output_tax: TaxComponents::zero(),
            input_tax: TaxComponents::zero(),
            net_tax: BigDecimal::from(0),
        }
    }
}

impl SlabTotals {
    /// Outward plus inward taxable value
    pub fn taxable_value(&self) -> BigDecimal {
        &self.outward_taxable_value + &self.inward_taxable_value
    }

    pub fn output_tax_total(&self) -> BigDecimal {
        self.output_tax.total()
    }

    pub fn input_tax_total(&self) -> BigDecimal {
        self.input_tax.total()
    }

    fn record(&mut self, invoice: &Invoice, calculation: &GstCalculation) {
        let sign = invoice.document_type.sign();
        let tax = calculation.components().signed(sign);
        let value = invoice.signed(&calculation.base_amount);

        self.invoice_count += 1;
        match invoice.direction {
            Direction::Sales => {
                self.outward_taxable_value += value;
                self.output_tax += &tax;
            }
            Direction::Purchase => {
                self.inward_taxable_value += value;
                self.input_tax += &tax;
            }
        }
    }

    fn merge(&mut self, other: &SlabTotals) {
        self.invoice_count += other.invoice_count;
        self.outward_taxable_value += &other.outward_taxable_value;
        self.inward_taxable_value += &other.inward_taxable_value;
        self.output_tax += &other.output_tax;
        self.input_tax += &other.input_tax;
    }

    fn finalize(&mut self) {
        self.net_tax = self.output_tax_total() - self.input_tax_total();
    }
}

/// One rate slab's row in the aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlabRow {
    pub rate: GstRateSlab,
    #[serde(flatten)]
    pub totals: SlabTotals,
}

impl SlabRow {
    fn new(rate: GstRateSlab) -> Self {
        Self {
            rate,
            totals: SlabTotals::default(),
        }
    }
}

/// Value and tax of one class of supply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyTotals {
    pub invoice_count: usize,
    pub taxable_value: BigDecimal,
    pub tax: TaxComponents,
}

impl Default for SupplyTotals {
    fn default() -> Self {
        Self {
            invoice_count: 0,
            taxable_value: BigDecimal::from(0),
            tax: TaxComponents::zero(),
        }
    }
}

impl SupplyTotals {
    pub(crate) fn add(&mut self, invoice: &Invoice, calculation: &GstCalculation) {
        self.invoice_count += 1;
        self.taxable_value += invoice.signed(&calculation.base_amount);
        self.tax += &calculation.components().signed(invoice.document_type.sign());
    }

    pub(crate) fn merge(&mut self, other: &SupplyTotals) {
        self.invoice_count += other.invoice_count;
        self.taxable_value += &other.taxable_value;
        self.tax += &other.tax;
    }
}

/// Period supplies split the way GSTR-3B table 3.1 needs them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplyBreakdown {
    /// Outward taxable supplies other than zero-rated and nil-rated
    pub outward_taxable: SupplyTotals,
    /// Exports
    pub zero_rated: SupplyTotals,
    /// Domestic outward supplies at 0%
    pub nil_rated: SupplyTotals,
    /// Inward supplies on which the recipient pays tax
    pub inward_reverse_charge: SupplyTotals,
}

impl SupplyBreakdown {
    fn record(&mut self, invoice: &Invoice, calculation: &GstCalculation) {
        match invoice.direction {
            Direction::Sales if is_export(invoice) => self.zero_rated.add(invoice, calculation),
            Direction::Sales if invoice.rate == GstRateSlab::Nil => {
                self.nil_rated.add(invoice, calculation)
            }
            Direction::Sales => self.outward_taxable.add(invoice, calculation),
            Direction::Purchase if invoice.reverse_charge => {
                self.inward_reverse_charge.add(invoice, calculation)
            }
            Direction::Purchase => {}
        }
    }
}

/// Whether an outward invoice is an export
pub fn is_export(invoice: &Invoice) -> bool {
    invoice.supply_nature == SupplyNature::Export
        || StateCode::resolve(&invoice.place_of_supply).is_some_and(|s| s.is_foreign())
}

/// Period totals for one GSTIN
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxAggregate {
    pub gstin: Gstin,
    pub period: FilingPeriod,
    /// Rows for slabs that carry at least one invoice, in ascending rate
    pub slabs: Vec<SlabRow>,
    /// Grand total row
    pub total: SlabTotals,
    /// Output tax minus input tax; negative means credit carried forward
    pub net_payable: BigDecimal,
    pub breakdown: SupplyBreakdown,
    /// Invoices left out of the aggregate, with reasons
    pub skipped: Vec<SkippedRecord>,
}

impl TaxAggregate {
    /// Row for a slab, if any invoice used it
    pub fn slab(&self, rate: GstRateSlab) -> Option<&SlabTotals> {
        self.slabs
            .iter()
            .find(|row| row.rate == rate)
            .map(|row| &row.totals)
    }

    /// Check that slab rows reconcile with the total row
    pub fn verify(&self) -> GstResult<()> {
        let mut sum = SlabTotals::default();
        for row in &self.slabs {
            if row.totals.net_tax != row.totals.output_tax_total() - row.totals.input_tax_total() {
                return Err(GstError::AggregateInconsistency(format!(
                    "slab {} net tax does not equal output minus input",
                    row.rate
                )));
            }
            sum.merge(&row.totals);
        }
        sum.finalize();

        if sum != self.total {
            return Err(GstError::AggregateInconsistency(format!(
                "slab rows sum to net {} but total row reports {}",
                sum.net_tax, self.total.net_tax
            )));
        }

        if self.net_payable != self.total.net_tax {
            return Err(GstError::AggregateInconsistency(format!(
                "net payable {} differs from total net tax {}",
                self.net_payable, self.total.net_tax
            )));
        }

        Ok(())
    }
}
