//! End-to-end filing for one period: upload, recalculate, read the returns

use bigdecimal::BigDecimal;
use gst_core::{
    utils::{MemoryStatementFeed, MemoryStorage},
    compliance_status, EngineConfig, FilingKey, FilingPeriod, FilingService, Gstin, JobStatus,
    RawInvoiceRecord, ReturnType, StatementSource, TaxComponents, VendorCreditEntry,
    VendorCreditStatement,
};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

fn record(number: &str, direction: &str, party: &str, value: &str, pos: &str) -> RawInvoiceRecord {
    RawInvoiceRecord {
        invoice_number: number.to_string(),
        direction: direction.to_string(),
        party_gstin: party.to_string(),
        party_name: "Party".to_string(),
        taxable_value: value.to_string(),
        rate: "18".to_string(),
        place_of_supply: pos.to_string(),
        invoice_date: "15-Jan-2026".to_string(),
        ..Default::default()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = EngineConfig::from_env()?;
    let own = Gstin::parse("27AABCU9603R1ZM")?;
    let supplier = Gstin::parse("29AABCB5678R1ZM")?;
    let period = FilingPeriod::new(2026, 1)?;
    let key = FilingKey::new("acme", own.clone(), period);

    let feed = MemoryStatementFeed::new();
    let mut statement = VendorCreditStatement::new(own.clone(), period, StatementSource::Gstr2b);
    statement.push(VendorCreditEntry::new(
        Some(supplier),
        "B-101",
        TaxComponents::new(BigDecimal::from(51300), BigDecimal::from(0), BigDecimal::from(0)),
    ));
    feed.publish(statement)?;

    let service = FilingService::new(MemoryStorage::new(), Arc::new(feed), config);

    let upload = vec![
        record("INV-001", "sales", "29AABCB5678R1ZM", "465000", "29"),
        record("INV-002", "sales", "", "485000", "Maharashtra"),
        record("B-101", "purchase", "29AABCB5678R1ZM", "285000", "27"),
        record("B-102", "purchase", "27AAACR1234Q1Z5", "450000", "27"),
        record("BAD-1", "sales", "", "12.345", "27"),
    ];
    let ingest = service.ingest("acme", &own, &upload, period).await?;
    println!("📥 Committed {} invoices, rejected {}", ingest.committed, ingest.rejected.len());
    for rejected in &ingest.rejected {
        println!("   row {}: {}", rejected.row, rejected.reason);
    }

    let job = service.submit_recalculation(key.clone())?;
    loop {
        let record = service.job_status(job)?;
        match record.status {
            JobStatus::Completed => break,
            JobStatus::Failed(err) => return Err(err.into()),
            JobStatus::Cancelled => return Ok(()),
            JobStatus::Queued | JobStatus::Running => {
                tokio::time::sleep(Duration::from_millis(10)).await
            }
        }
    }

    let Some(snapshot) = service.snapshot(&key).await? else {
        return Ok(());
    };

    println!("\n📊 Period {} (revision {})", snapshot.key.period, snapshot.revision);
    for row in &snapshot.aggregate.slabs {
        println!(
            "  {:>4}  output ₹{}  input ₹{}  net ₹{}",
            row.rate.to_string(),
            row.totals.output_tax_total(),
            row.totals.input_tax_total(),
            row.totals.net_tax
        );
    }

    println!("\n🔍 ITC claims:");
    for claim in &snapshot.reconciliation.claims {
        println!(
            "  {:<8} {:?} ₹{}{}",
            claim.invoice_number,
            claim.status,
            claim.claimed.total(),
            claim.note.as_deref().map(|n| format!(" ({n})")).unwrap_or_default()
        );
    }

    println!("\n🏢 Vendor-wise ITC:");
    for vendor in &snapshot.reconciliation.vendors {
        println!(
            "  {:<16} {} invoice(s) ₹{} {:?} score {}",
            vendor.supplier_name,
            vendor.invoices,
            vendor.itc_claimed,
            vendor.status,
            vendor.match_score
        );
    }

    let gstr3b = &snapshot.gstr3b;
    println!("\n🧾 GSTR-3B:");
    println!("  Tax payable:      ₹{}", gstr3b.payment.tax_payable.total());
    println!("  Net ITC:          ₹{}", gstr3b.itc.net_itc.total());
    println!("  Paid through ITC: ₹{}", gstr3b.payment.paid_through_itc.total());
    println!("  Cash payable:     ₹{}", gstr3b.cash_payable());

    println!("\n{}", serde_json::to_string_pretty(&snapshot.gstr1.b2c)?);

    let today = NaiveDate::from_ymd_opt(2026, 2, 15).ok_or("invalid date")?;
    let calendar = compliance_status(
        &[period.previous(), period],
        &[(ReturnType::Gstr1, period.previous()), (ReturnType::Gstr3b, period.previous())],
        today,
    )?;
    println!("\n📅 Compliance as of {today}:");
    for item in &calendar {
        println!("  {:<18} due {}  {:?}", item.label(), item.due_date, item.status);
    }
    Ok(())
}
