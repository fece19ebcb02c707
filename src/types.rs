//! Core types and data structures for the GST engine

use bigdecimal::BigDecimal;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;

use crate::tax::jurisdiction::Gstin;

/// Whether an invoice is a sale or a purchase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Outward supply - tax collected on sales
    Sales,
    /// Inward supply - tax paid on purchases, claimable as ITC
    Purchase,
}

/// Kind of tax document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Invoice,
    /// Reduces the value and tax of an earlier invoice
    CreditNote,
    /// Increases the value and tax of an earlier invoice
    DebitNote,
}

impl DocumentType {
    /// Sign applied to amounts when accumulating
    pub fn sign(&self) -> i32 {
        match self {
            DocumentType::CreditNote => -1,
            DocumentType::Invoice | DocumentType::DebitNote => 1,
        }
    }

    pub fn is_note(&self) -> bool {
        !matches!(self, DocumentType::Invoice)
    }
}

/// Cross-border character of a supply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupplyNature {
    Domestic,
    /// Zero-rated outward supply to a place outside India
    Export,
    /// Inward supply of goods from outside India
    Import,
}

/// Statutory GST rate slabs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum GstRateSlab {
    /// Nil rated - 0%
    Nil,
    /// 5%
    Five,
    /// 12%
    Twelve,
    /// 18%
    Eighteen,
    /// 28%
    TwentyEight,
}

impl GstRateSlab {
    pub const ALL: [GstRateSlab; 5] = [
        GstRateSlab::Nil,
        GstRateSlab::Five,
        GstRateSlab::Twelve,
        GstRateSlab::Eighteen,
        GstRateSlab::TwentyEight,
    ];

    /// Rate as a whole percentage
    pub fn percent(&self) -> u8 {
        match self {
            GstRateSlab::Nil => 0,
            GstRateSlab::Five => 5,
            GstRateSlab::Twelve => 12,
            GstRateSlab::Eighteen => 18,
            GstRateSlab::TwentyEight => 28,
        }
    }

    /// Rate as a decimal percentage
    pub fn rate(&self) -> BigDecimal {
        BigDecimal::from(self.percent())
    }

    /// Map a percentage onto a slab
    pub fn from_percent(percent: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|slab| slab.percent() == percent)
    }
}

impl TryFrom<u8> for GstRateSlab {
    type Error = GstError;

    fn try_from(percent: u8) -> GstResult<Self> {
        Self::from_percent(percent)
            .ok_or_else(|| GstError::InvalidRate(format!("{percent}% is not a GST slab")))
    }
}

impl From<GstRateSlab> for u8 {
    fn from(slab: GstRateSlab) -> Self {
        slab.percent()
    }
}

impl fmt::Display for GstRateSlab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.percent())
    }
}

/// A monthly return period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FilingPeriod {
    pub year: i32,
    /// 1-based calendar month
    pub month: u32,
}

impl FilingPeriod {
    /// Create a filing period, validating the month
    pub fn new(year: i32, month: u32) -> GstResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(GstError::InvalidDate(format!(
                "month {month} is outside 1..=12"
            )));
        }
        Ok(Self { year, month })
    }

    /// The period a date falls into
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Whether a date falls inside this period
    pub fn contains(&self, date: NaiveDate) -> bool {
        Self::from_date(date) == *self
    }

    /// Return period in the portal's `MMYYYY` form
    pub fn return_period(&self) -> String {
        format!("{:02}{:04}", self.month, self.year)
    }

    pub fn next(&self) -> Self {
        if self.month >= 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn previous(&self) -> Self {
        if self.month <= 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// First day of the period
    pub fn first_day(&self) -> GstResult<NaiveDate> {
        self.day(1)
    }

    /// GSTR-1 is due on the 11th of the following month
    pub fn gstr1_due_date(&self) -> GstResult<NaiveDate> {
        self.next().day(GSTR1_DUE_DAY)
    }

    /// GSTR-3B is due on the 20th of the following month
    pub fn gstr3b_due_date(&self) -> GstResult<NaiveDate> {
        self.next().day(GSTR3B_DUE_DAY)
    }

    fn day(&self, day: u32) -> GstResult<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, day)
            .ok_or_else(|| GstError::InvalidDate(format!("{self} has no day {day}")))
    }
}

const GSTR1_DUE_DAY: u32 = 11;
const GSTR3B_DUE_DAY: u32 = 20;

impl FromStr for FilingPeriod {
    type Err = GstError;

    /// Parses `YYYY-MM` or `MMYYYY`
    fn from_str(s: &str) -> GstResult<Self> {
        let s = s.trim();
        let invalid = || GstError::InvalidDate(format!("'{s}' is not a filing period"));

        if let Some((year, month)) = s.split_once('-') {
            let year = year.parse().map_err(|_| invalid())?;
            let month = month.parse().map_err(|_| invalid())?;
            return Self::new(year, month);
        }

        if s.len() == 6 && s.chars().all(|c| c.is_ascii_digit()) {
            let month = s[0..2].parse().map_err(|_| invalid())?;
            let year = s[2..6].parse().map_err(|_| invalid())?;
            return Self::new(year, month);
        }

        Err(invalid())
    }
}

impl fmt::Display for FilingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// IGST/CGST/SGST amounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxComponents {
    pub igst: BigDecimal,
    pub cgst: BigDecimal,
    pub sgst: BigDecimal,
}

impl TaxComponents {
    pub fn zero() -> Self {
        Self::new(BigDecimal::from(0), BigDecimal::from(0), BigDecimal::from(0))
    }

    pub fn new(igst: BigDecimal, cgst: BigDecimal, sgst: BigDecimal) -> Self {
        Self { igst, cgst, sgst }
    }

    /// Sum of all three heads
    pub fn total(&self) -> BigDecimal {
        &self.igst + &self.cgst + &self.sgst
    }

    /// Multiply every head by a sign (+1/-1)
    pub fn signed(&self, sign: i32) -> Self {
        let sign = BigDecimal::from(sign);
        Self {
            igst: &self.igst * &sign,
            cgst: &self.cgst * &sign,
            sgst: &self.sgst * &sign,
        }
    }

    /// Whether every head is within `tolerance` of `other`
    pub fn within(&self, other: &TaxComponents, tolerance: &BigDecimal) -> bool {
        (&self.igst - &other.igst).abs() <= *tolerance
            && (&self.cgst - &other.cgst).abs() <= *tolerance
            && (&self.sgst - &other.sgst).abs() <= *tolerance
    }
}

impl Default for TaxComponents {
    fn default() -> Self {
        Self::zero()
    }
}

impl Add for &TaxComponents {
    type Output = TaxComponents;

    fn add(self, rhs: &TaxComponents) -> TaxComponents {
        TaxComponents {
            igst: &self.igst + &rhs.igst,
            cgst: &self.cgst + &rhs.cgst,
            sgst: &self.sgst + &rhs.sgst,
        }
    }
}

impl Sub for &TaxComponents {
    type Output = TaxComponents;

    fn sub(self, rhs: &TaxComponents) -> TaxComponents {
        TaxComponents {
            igst: &self.igst - &rhs.igst,
            cgst: &self.cgst - &rhs.cgst,
            sgst: &self.sgst - &rhs.sgst,
        }
    }
}

impl AddAssign<&TaxComponents> for TaxComponents {
    fn add_assign(&mut self, rhs: &TaxComponents) {
        self.igst += &rhs.igst;
        self.cgst += &rhs.cgst;
        self.sgst += &rhs.sgst;
    }
}

/// A validated outward or inward tax document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Invoice number, unique per organization, GSTIN and direction
    pub invoice_number: String,
    pub direction: Direction,
    pub document_type: DocumentType,
    /// Counterparty GSTIN; `None` for unregistered parties
    pub party_gstin: Option<Gstin>,
    pub party_name: String,
    /// Value before tax, always carried at scale 2
    pub taxable_value: BigDecimal,
    pub rate: GstRateSlab,
    /// Two-digit state code when resolvable, otherwise the text as received
    pub place_of_supply: String,
    pub invoice_date: NaiveDate,
    /// Period derived from the invoice date
    pub period: FilingPeriod,
    pub supply_nature: SupplyNature,
    /// Tax is payable by the recipient
    pub reverse_charge: bool,
    /// Goods/service category, matched against the ITC block-list
    pub supply_category: Option<String>,
    /// Original invoice number. An invoice carrying it supersedes the
    /// original; a note carrying it only adjusts it.
    pub amends: Option<String>,
}

impl Invoice {
    /// Whether the counterparty is GST-registered
    pub fn is_registered_party(&self) -> bool {
        self.party_gstin.is_some()
    }

    /// Apply the document-type sign to an amount
    pub fn signed(&self, amount: &BigDecimal) -> BigDecimal {
        amount * BigDecimal::from(self.document_type.sign())
    }

    /// Normalized lookup key for the invoice number
    pub fn number_key(&self) -> String {
        invoice_number_key(&self.invoice_number)
    }

    /// Number key of the original this invoice replaces, if it is an
    /// amendment
    pub fn supersedes(&self) -> Option<String> {
        match self.document_type {
            DocumentType::Invoice => self.amends.as_deref().map(invoice_number_key),
            DocumentType::CreditNote | DocumentType::DebitNote => None,
        }
    }
}

/// Case- and whitespace-insensitive form of an invoice number
pub fn invoice_number_key(number: &str) -> String {
    number
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Identifies one return: organization, registered GSTIN and period
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilingKey {
    pub organization_id: String,
    pub gstin: Gstin,
    pub period: FilingPeriod,
}

impl FilingKey {
    pub fn new(organization_id: impl Into<String>, gstin: Gstin, period: FilingPeriod) -> Self {
        Self {
            organization_id: organization_id.into(),
            gstin,
            period,
        }
    }
}

impl fmt::Display for FilingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.organization_id, self.gstin, self.period)
    }
}

/// A record that was left out of a computation, and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRecord {
    /// Invoice number, or the row position when no number was readable
    pub reference: String,
    pub reason: GstError,
}

/// Errors that can occur in the GST engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum GstError {
    #[error("Invalid GSTIN: {0}")]
    InvalidGstin(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid rate: {0}")]
    InvalidRate(String),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Missing field: {0}")]
    MissingField(String),
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    #[error("Unresolved jurisdiction: {0}")]
    UnresolvedJurisdiction(String),
    #[error("Invoice outside filing period: {0}")]
    OutOfPeriod(String),
    #[error("Reconciliation data unavailable: {0}")]
    ReconciliationDataUnavailable(String),
    #[error("Aggregate inconsistency: {0}")]
    AggregateInconsistency(String),
    #[error("Duplicate invoice: {0}")]
    DuplicateInvoice(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Job not found: {0}")]
    JobNotFound(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for GST operations
pub type GstResult<T> = Result<T, GstError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filing_period_parsing() {
        let period: FilingPeriod = "2026-01".parse().unwrap();
        assert_eq!(period, FilingPeriod { year: 2026, month: 1 });
        assert_eq!(period.to_string(), "2026-01");
        assert_eq!(period.return_period(), "012026");
        assert_eq!("012026".parse::<FilingPeriod>().unwrap(), period);
        assert!("2026-13".parse::<FilingPeriod>().is_err());
        assert!("January".parse::<FilingPeriod>().is_err());
    }

    #[test]
    fn test_filing_period_contains() {
        let period = FilingPeriod::new(2025, 12).unwrap();
        assert!(period.contains(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()));
        assert!(!period.contains(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()));
    }

    #[test]
    fn test_filing_period_due_dates() {
        let december = FilingPeriod::new(2025, 12).unwrap();
        assert_eq!(december.next(), FilingPeriod::new(2026, 1).unwrap());
        assert_eq!(december.next().previous(), december);
        assert_eq!(
            december.gstr1_due_date().unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 11).unwrap()
        );
        assert_eq!(
            december.gstr3b_due_date().unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 20).unwrap()
        );

        let bogus = FilingPeriod { year: 2026, month: 13 };
        assert!(matches!(bogus.first_day(), Err(GstError::InvalidDate(_))));
    }

    #[test]
    fn test_rate_slab_from_percent() {
        assert_eq!(GstRateSlab::from_percent(18), Some(GstRateSlab::Eighteen));
        assert_eq!(GstRateSlab::from_percent(3), None);
        assert!(matches!(
            GstRateSlab::try_from(40),
            Err(GstError::InvalidRate(_))
        ));
    }

    #[test]
    fn test_tax_components_arithmetic() {
        let a = TaxComponents::new(BigDecimal::from(100), BigDecimal::from(0), BigDecimal::from(0));
        let b = TaxComponents::new(BigDecimal::from(0), BigDecimal::from(45), BigDecimal::from(45));
        let sum = &a + &b;
        assert_eq!(sum.total(), BigDecimal::from(190));
        assert_eq!((&sum - &a), b);
        assert_eq!(b.signed(-1).total(), BigDecimal::from(-90));
    }

    #[test]
    fn test_invoice_number_key() {
        assert_eq!(invoice_number_key(" inv - 2026/001 "), "INV-2026/001");
    }
}
