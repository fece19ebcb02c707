//! Validation utilities for raw, OCR-extracted invoice fields

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::str::FromStr;

use crate::traits::*;
use crate::types::*;

/// Date layouts seen in uploaded invoices
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d-%b-%Y", "%d %b %Y"];

/// Parse a taxable value.
///
/// Strips a rupee prefix and grouping commas, then requires a plain
/// non-negative decimal with at most two fraction digits. The result is
/// carried at scale 2.
pub fn parse_amount(raw: &str) -> GstResult<BigDecimal> {
    let mut text = raw.trim();
    for prefix in ["₹", "Rs.", "Rs", "INR"] {
        if let Some(rest) = text.strip_prefix(prefix) {
            text = rest.trim_start();
            break;
        }
    }
    let text: String = text.chars().filter(|c| *c != ',').collect();

    if text.is_empty() {
        return Err(GstError::InvalidAmount("amount is empty".to_string()));
    }

    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (text.as_str(), None),
    };

    let digits_only = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if !digits_only(whole) {
        return Err(GstError::InvalidAmount(format!(
            "'{}' is not a non-negative decimal",
            raw.trim()
        )));
    }
    if let Some(fraction) = fraction {
        if !digits_only(fraction) || fraction.len() > 2 {
            return Err(GstError::InvalidAmount(format!(
                "'{}' must have at most two decimal places",
                raw.trim()
            )));
        }
    }

    BigDecimal::from_str(&text)
        .map(|value| value.with_scale(2))
        .map_err(|e| GstError::InvalidAmount(format!("'{}': {e}", raw.trim())))
}

/// Parse a rate such as `18`, `18%` or `18.00` onto a slab
pub fn parse_rate(raw: &str) -> GstResult<GstRateSlab> {
    let text = raw.trim().trim_end_matches('%').trim();
    let invalid = || {
        GstError::InvalidRate(format!("'{}' is not one of 0, 5, 12, 18, 28", raw.trim()))
    };

    let value = BigDecimal::from_str(text).map_err(|_| invalid())?;
    GstRateSlab::ALL
        .into_iter()
        .find(|slab| slab.rate() == value)
        .ok_or_else(invalid)
}

/// Parse an invoice date in any of the supported layouts
pub fn parse_date(raw: &str) -> GstResult<NaiveDate> {
    let text = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .ok_or_else(|| GstError::InvalidDate(format!("'{text}' is not a recognised date")))
}

/// Parse a yes/no style flag; blank is `false`
pub fn parse_flag(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|s| s.trim().to_ascii_lowercase()).as_deref(),
        Some("y" | "yes" | "true" | "1")
    )
}

/// Require a non-blank text field
pub fn require_field<'a>(value: &'a str, field: &str) -> GstResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(GstError::MissingField(field.to_string()))
    } else {
        Ok(trimmed)
    }
}

/// Validate an invoice number
pub fn validate_invoice_number(number: &str) -> GstResult<()> {
    // GST rules cap document numbers at 16 characters
    if number.chars().count() > 16 {
        return Err(GstError::InvalidDocument(format!(
            "invoice number '{number}' exceeds 16 characters"
        )));
    }

    if !number
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '/')
    {
        return Err(GstError::InvalidDocument(format!(
            "invoice number '{number}' may only contain letters, digits, '-' and '/'"
        )));
    }

    Ok(())
}

/// Stricter invoice validator applying document-number and party rules
pub struct EnhancedInvoiceValidator;

impl InvoiceValidator for EnhancedInvoiceValidator {
    fn validate_invoice(&self, invoice: &Invoice) -> GstResult<()> {
        DefaultInvoiceValidator.validate_invoice(invoice)?;
        validate_invoice_number(&invoice.invoice_number)?;

        if invoice.document_type.is_note() && invoice.amends.is_none() {
            return Err(GstError::InvalidDocument(format!(
                "note {} must reference the original invoice",
                invoice.invoice_number
            )));
        }

        Ok(())
    }
}
