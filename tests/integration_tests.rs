//! Integration tests for gst-core

use bigdecimal::BigDecimal;
use gst_core::{
    utils::{EnhancedInvoiceValidator, MemoryStatementFeed, MemoryStorage},
    EngineConfig, FilingKey, FilingPeriod, FilingService, FilingStorage, GstError, Gstin,
    JobStatus, MatchStatus, RawInvoiceRecord, StatementSource, TaxComponents, VendorCreditEntry,
    VendorCreditStatement,
};
use std::sync::Arc;
use std::time::Duration;

fn own_gstin() -> Gstin {
    Gstin::parse("27AABCU9603R1ZM").unwrap()
}

fn supplier_gstin() -> Gstin {
    Gstin::parse("29AABCB5678R1ZM").unwrap()
}

fn period() -> FilingPeriod {
    FilingPeriod::new(2026, 1).unwrap()
}

fn key() -> FilingKey {
    FilingKey::new("acme", own_gstin(), period())
}

fn record(
    number: &str,
    direction: &str,
    party: &str,
    value: &str,
    pos: &str,
    date: &str,
) -> RawInvoiceRecord {
    RawInvoiceRecord {
        invoice_number: number.to_string(),
        direction: direction.to_string(),
        party_gstin: party.to_string(),
        party_name: "Party".to_string(),
        taxable_value: value.to_string(),
        rate: "18%".to_string(),
        place_of_supply: pos.to_string(),
        invoice_date: date.to_string(),
        ..Default::default()
    }
}

fn upload() -> Vec<RawInvoiceRecord> {
    vec![
        record("INV-001", "sales", "29AABCB5678R1ZM", "4,65,000", "29", "2026-01-05"),
        record("INV-002", "sales", "", "485000", "Maharashtra", "06/01/2026"),
        record("B-101", "purchase", "29AABCB5678R1ZM", "285000", "27", "2026-01-08"),
        record("B-102", "purchase", "27AAACR1234Q1Z5", "450000", "27", "2026-01-09"),
        // Rejected: unknown rate slab
        RawInvoiceRecord {
            rate: "15".to_string(),
            ..record("INV-003", "sales", "", "1000", "27", "2026-01-10")
        },
        // Dated in February, committed under its own period
        record("INV-004", "sales", "", "1000", "27", "2026-02-02"),
    ]
}

fn statement() -> VendorCreditStatement {
    let mut statement =
        VendorCreditStatement::new(own_gstin(), period(), StatementSource::Gstr2b);
    statement.push(VendorCreditEntry::new(
        Some(supplier_gstin()),
        "B-101",
        TaxComponents::new(BigDecimal::from(51300), BigDecimal::from(0), BigDecimal::from(0)),
    ));
    statement.push(VendorCreditEntry::new(
        Some(Gstin::parse("27AAACR1234Q1Z5").unwrap()),
        "b-102",
        TaxComponents::new(
            BigDecimal::from(0),
            BigDecimal::from(40500),
            BigDecimal::from(40500),
        ),
    ));
    statement
}

fn service(storage: MemoryStorage, feed: MemoryStatementFeed) -> FilingService<MemoryStorage> {
    FilingService::new(storage, Arc::new(feed), EngineConfig::default())
}

#[tokio::test]
async fn test_complete_filing_workflow() {
    let storage = MemoryStorage::new();
    let feed = MemoryStatementFeed::new();
    feed.publish(statement()).unwrap();
    let service = service(storage.clone(), feed);

    let report = service
        .ingest("acme", &own_gstin(), &upload(), period())
        .await
        .unwrap();
    assert_eq!(report.committed, 4);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].row, 4);
    assert!(matches!(report.rejected[0].reason, GstError::InvalidRate(_)));
    assert_eq!(report.committed_elsewhere.len(), 1);

    let snapshot = service.recalculate(&key()).await.unwrap();
    assert_eq!(snapshot.revision, 1);

    // 465000 inter-state and 485000 intra-state at 18%
    assert_eq!(snapshot.aggregate.total.output_tax_total(), BigDecimal::from(171000));
    assert_eq!(snapshot.aggregate.total.input_tax_total(), BigDecimal::from(132300));
    assert_eq!(snapshot.aggregate.net_payable, BigDecimal::from(38700));

    assert_eq!(snapshot.reconciliation.count(MatchStatus::Matched), 2);
    assert_eq!(snapshot.gstr3b.cash_payable(), BigDecimal::from(38700));
    assert_eq!(snapshot.gstr1.b2b.len(), 1);
    assert_eq!(snapshot.gstr1.b2c.len(), 1);

    let stored = service.snapshot(&key()).await.unwrap().unwrap();
    assert_eq!(stored, snapshot);

    // February invoice lives in its own period
    let february = FilingKey::new("acme", own_gstin(), FilingPeriod::new(2026, 2).unwrap());
    assert_eq!(storage.list_invoices(&february).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_reupload_reports_duplicates() {
    let service = service(MemoryStorage::new(), MemoryStatementFeed::new());

    service
        .ingest("acme", &own_gstin(), &upload(), period())
        .await
        .unwrap();
    let again = service
        .ingest("acme", &own_gstin(), &upload(), period())
        .await
        .unwrap();

    assert_eq!(again.committed, 0);
    assert_eq!(again.duplicates.len(), 5);
    assert!(again
        .duplicates
        .iter()
        .all(|d| matches!(d.reason, GstError::DuplicateInvoice(_))));
}

#[tokio::test]
async fn test_feed_outage_keeps_previous_matches() {
    let feed = MemoryStatementFeed::new();
    feed.publish(statement()).unwrap();
    let service = service(MemoryStorage::new(), feed.clone());

    service
        .ingest("acme", &own_gstin(), &upload(), period())
        .await
        .unwrap();
    let first = service.recalculate(&key()).await.unwrap();
    assert_eq!(first.reconciliation.count(MatchStatus::Matched), 2);

    feed.set_unavailable(true).unwrap();
    let second = service.recalculate(&key()).await.unwrap();
    assert!(second.reconciliation.data_unavailable);
    assert_eq!(second.revision, 2);
    assert_eq!(second.reconciliation.count(MatchStatus::Matched), 2);
    assert_eq!(second.gstr3b.cash_payable(), first.gstr3b.cash_payable());
}

#[tokio::test]
async fn test_feed_outage_without_history_is_pending() {
    let feed = MemoryStatementFeed::new();
    feed.set_unavailable(true).unwrap();
    let service = service(MemoryStorage::new(), feed);

    service
        .ingest("acme", &own_gstin(), &upload(), period())
        .await
        .unwrap();
    let snapshot = service.recalculate(&key()).await.unwrap();

    assert_eq!(snapshot.reconciliation.count(MatchStatus::Pending), 2);
    assert_eq!(snapshot.gstr3b.itc.net_itc.total(), BigDecimal::from(0));
    assert_eq!(snapshot.gstr3b.cash_payable(), BigDecimal::from(171000));
}

#[tokio::test]
async fn test_background_job_completes() {
    let feed = MemoryStatementFeed::new();
    feed.publish(statement()).unwrap();
    let storage = MemoryStorage::new();
    let service = service(storage.clone(), feed);

    service
        .ingest("acme", &own_gstin(), &upload(), period())
        .await
        .unwrap();
    let job = service.submit_recalculation(key()).unwrap();

    let mut status = service.job_status(job).unwrap().status;
    for _ in 0..100 {
        if status.is_finished() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        status = service.job_status(job).unwrap().status;
    }

    assert_eq!(status, JobStatus::Completed);
    assert_eq!(storage.snapshot_count().unwrap(), 1);
}

#[tokio::test]
async fn test_cancelled_job_persists_nothing() {
    let feed = MemoryStatementFeed::new().with_delay(Duration::from_millis(500));
    let storage = MemoryStorage::new();
    let service = service(storage.clone(), feed);

    service
        .ingest("acme", &own_gstin(), &upload(), period())
        .await
        .unwrap();
    let job = service.submit_recalculation(key()).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let record = service.cancel_job(job).unwrap();
    assert_eq!(record.status, JobStatus::Cancelled);

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(service.job_status(job).unwrap().status, JobStatus::Cancelled);
    assert_eq!(storage.snapshot_count().unwrap(), 0);
    assert!(service.snapshot(&key()).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_recalculations_serialize() {
    let feed = MemoryStatementFeed::new().with_delay(Duration::from_millis(20));
    feed.publish(statement()).unwrap();
    let service = service(MemoryStorage::new(), feed);

    service
        .ingest("acme", &own_gstin(), &upload(), period())
        .await
        .unwrap();

    let runs: Vec<_> = (0..4)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.recalculate(&key()).await })
        })
        .collect();

    let mut revisions = Vec::new();
    for run in runs {
        revisions.push(run.await.unwrap().unwrap().revision);
    }
    revisions.sort();

    // Each run saw the previous run's snapshot
    assert_eq!(revisions, vec![1, 2, 3, 4]);
    assert_eq!(service.snapshot(&key()).await.unwrap().unwrap().revision, 4);
}

#[tokio::test]
async fn test_unknown_job() {
    let service = service(MemoryStorage::new(), MemoryStatementFeed::new());
    let unknown = gst_core::JobId::new();
    assert!(matches!(service.job_status(unknown), Err(GstError::JobNotFound(_))));
    assert!(matches!(service.cancel_job(unknown), Err(GstError::JobNotFound(_))));
}

#[tokio::test]
async fn test_amendment_replaces_original_in_returns() {
    let storage = MemoryStorage::new();
    let service = service(storage.clone(), MemoryStatementFeed::new());
    let upload = vec![
        record("INV-001", "sales", "29AABCB5678R1ZM", "465000", "29", "2026-01-05"),
        RawInvoiceRecord {
            amends: Some("INV-001".to_string()),
            ..record("INV-001A", "sales", "29AABCB5678R1ZM", "400000", "29", "2026-01-20")
        },
    ];
    let report = service
        .ingest("acme", &own_gstin(), &upload, period())
        .await
        .unwrap();
    assert_eq!(report.committed, 2);

    let snapshot = service.recalculate(&key()).await.unwrap();
    assert_eq!(snapshot.aggregate.total.invoice_count, 1);
    assert_eq!(
        snapshot.aggregate.total.outward_taxable_value,
        BigDecimal::from(400000)
    );
    assert_eq!(snapshot.gstr1.b2b.len(), 1);
    let numbers: Vec<&str> = snapshot.gstr1.b2b[0]
        .invoices
        .iter()
        .map(|line| line.invoice_number.as_str())
        .collect();
    assert_eq!(numbers, vec!["INV-001A"]);

    // The original stays committed but is no longer effective
    assert_eq!(storage.list_invoices(&key()).await.unwrap().len(), 2);
    assert_eq!(service.invoices(&key()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_service_applies_custom_validator() {
    let service = service(MemoryStorage::new(), MemoryStatementFeed::new())
        .with_validator(Arc::new(EnhancedInvoiceValidator));
    let upload = vec![
        record("INV-001", "sales", "", "1000", "27", "2026-01-05"),
        record("INV 002", "sales", "", "1000", "27", "2026-01-05"),
        RawInvoiceRecord {
            document_type: Some("credit note".to_string()),
            ..record("CN-001", "sales", "", "100", "27", "2026-01-06")
        },
    ];

    let report = service
        .ingest("acme", &own_gstin(), &upload, period())
        .await
        .unwrap();

    assert_eq!(report.committed, 1);
    let rows: Vec<usize> = report.rejected.iter().map(|r| r.row).collect();
    assert_eq!(rows, vec![1, 2]);
    assert!(report
        .rejected
        .iter()
        .all(|r| matches!(r.reason, GstError::InvalidDocument(_))));
}

#[tokio::test]
async fn test_month_over_month_comparison() {
    let service = service(MemoryStorage::new(), MemoryStatementFeed::new());
    let december = FilingPeriod::new(2025, 12).unwrap();
    let december_key = FilingKey::new("acme", own_gstin(), december);

    service
        .ingest(
            "acme",
            &own_gstin(),
            &[record("INV-900", "sales", "", "100000", "27", "2025-12-10")],
            december,
        )
        .await
        .unwrap();
    service
        .ingest(
            "acme",
            &own_gstin(),
            &[record("INV-001", "sales", "", "110000", "27", "2026-01-10")],
            period(),
        )
        .await
        .unwrap();

    assert!(service.compare_with_previous(&key()).await.unwrap().is_none());

    service.recalculate(&key()).await.unwrap();
    let alone = service.compare_with_previous(&key()).await.unwrap().unwrap();
    assert_eq!(alone.previous_net_payable, None);

    service.recalculate(&december_key).await.unwrap();
    let comparison = service.compare_with_previous(&key()).await.unwrap().unwrap();
    assert_eq!(comparison.net_payable, BigDecimal::from(19800));
    assert_eq!(comparison.previous_net_payable, Some(BigDecimal::from(18000)));
    assert_eq!(comparison.change_percent, Some(BigDecimal::from(10)));
}

#[tokio::test]
async fn test_vendor_breakdown_in_snapshot() {
    let feed = MemoryStatementFeed::new();
    feed.publish(statement()).unwrap();
    let service = service(MemoryStorage::new(), feed);

    service
        .ingest("acme", &own_gstin(), &upload(), period())
        .await
        .unwrap();
    let snapshot = service.recalculate(&key()).await.unwrap();

    let vendors = &snapshot.reconciliation.vendors;
    assert_eq!(vendors.len(), 2);
    assert_eq!(vendors[0].supplier_gstin, Some(supplier_gstin()));
    assert_eq!(vendors[0].itc_claimed, BigDecimal::from(51300));
    assert_eq!(vendors[0].status, MatchStatus::Matched);
    assert_eq!(vendors[0].match_score, 100);
    assert_eq!(snapshot.reconciliation.source, Some(StatementSource::Gstr2b));
    assert_eq!(snapshot.gstr3b.itc_utilized(), BigDecimal::from(132300));
    assert_eq!(snapshot.gstr3b.itc_balance(), BigDecimal::from(0));
}
