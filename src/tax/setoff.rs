//! Utilisation of input tax credit against output liability

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::cmp::min;

use crate::types::TaxComponents;

const IGST: usize = 0;
const CGST: usize = 1;
const SGST: usize = 2;

/// Credit heads in the order they are consumed, each with the liability
/// heads it may discharge in order. CGST and SGST credit never cross.
const SET_OFF_ORDER: [(usize, &[usize]); 3] = [
    (IGST, &[IGST, CGST, SGST]),
    (CGST, &[CGST, IGST]),
    (SGST, &[SGST, IGST]),
];

/// Outcome of setting credit off against liability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetOffResult {
    pub liability: TaxComponents,
    pub credit: TaxComponents,
    /// Liability discharged through credit, per liability head
    pub paid_through_itc: TaxComponents,
    /// Liability left for cash payment, per head; never negative
    pub cash_payable: TaxComponents,
    /// Credit left unused, per credit head
    pub carry_forward: TaxComponents,
}

impl SetOffResult {
    /// Total credit consumed
    pub fn itc_utilized(&self) -> BigDecimal {
        self.paid_through_itc.total()
    }
}

fn to_heads(components: &TaxComponents) -> [BigDecimal; 3] {
    let zero = BigDecimal::from(0);
    let clamp = |v: &BigDecimal| if *v < zero { zero.clone() } else { v.clone() };
    [
        clamp(&components.igst),
        clamp(&components.cgst),
        clamp(&components.sgst),
    ]
}

fn from_heads(heads: [BigDecimal; 3]) -> TaxComponents {
    let [igst, cgst, sgst] = heads;
    TaxComponents::new(igst, cgst, sgst)
}

/// Set `credit` off against `liability`.
///
/// IGST credit is used first (IGST, then CGST, then SGST liability),
/// then CGST credit (CGST, then IGST), then SGST credit (SGST, then IGST).
/// Negative heads on either side count as zero.
pub fn set_off(liability: &TaxComponents, credit: &TaxComponents) -> SetOffResult {
    let mut owed = to_heads(liability);
    let mut available = to_heads(credit);
    let mut paid = [BigDecimal::from(0), BigDecimal::from(0), BigDecimal::from(0)];

    for (source, targets) in SET_OFF_ORDER {
        for &target in targets {
            let amount = min(available[source].clone(), owed[target].clone());
            available[source] -= &amount;
            owed[target] -= &amount;
            paid[target] += &amount;
        }
    }

    SetOffResult {
        liability: liability.clone(),
        credit: credit.clone(),
        paid_through_itc: from_heads(paid),
        cash_payable: from_heads(owed),
        carry_forward: from_heads(available),
    }
}
