//! Return due dates and filing compliance

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::*;

/// Monthly returns tracked for compliance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnType {
    Gstr1,
    Gstr3b,
}

impl ReturnType {
    pub const ALL: [ReturnType; 2] = [ReturnType::Gstr1, ReturnType::Gstr3b];

    pub fn due_date(&self, period: FilingPeriod) -> GstResult<NaiveDate> {
        match self {
            ReturnType::Gstr1 => period.gstr1_due_date(),
            ReturnType::Gstr3b => period.gstr3b_due_date(),
        }
    }
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnType::Gstr1 => write!(f, "GSTR-1"),
            ReturnType::Gstr3b => write!(f, "GSTR-3B"),
        }
    }
}

/// Where a return stands on a given day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceState {
    Filed,
    /// Period closed, not filed, due date not passed
    Pending,
    Overdue,
    /// Period still open
    Upcoming,
}

/// One return for one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceItem {
    pub return_type: ReturnType,
    pub period: FilingPeriod,
    pub due_date: NaiveDate,
    pub status: ComplianceState,
}

impl ComplianceItem {
    pub fn evaluate(
        return_type: ReturnType,
        period: FilingPeriod,
        filed: bool,
        today: NaiveDate,
    ) -> GstResult<Self> {
        let due_date = return_type.due_date(period)?;
        let status = if filed {
            ComplianceState::Filed
        } else if today < period.next().first_day()? {
            ComplianceState::Upcoming
        } else if today > due_date {
            ComplianceState::Overdue
        } else {
            ComplianceState::Pending
        };

        Ok(Self {
            return_type,
            period,
            due_date,
            status,
        })
    }

    /// Label such as `GSTR-1 (2026-01)`
    pub fn label(&self) -> String {
        format!("{} ({})", self.return_type, self.period)
    }
}

/// Status of both returns for each period, in period order
pub fn compliance_status(
    periods: &[FilingPeriod],
    filed: &[(ReturnType, FilingPeriod)],
    today: NaiveDate,
) -> GstResult<Vec<ComplianceItem>> {
    let mut periods = periods.to_vec();
    periods.sort();
    periods.dedup();

    let mut items = Vec::with_capacity(periods.len() * ReturnType::ALL.len());
    for period in periods {
        for return_type in ReturnType::ALL {
            let is_filed = filed.contains(&(return_type, period));
            items.push(ComplianceItem::evaluate(return_type, period, is_filed, today)?);
        }
    }
    Ok(items)
}
