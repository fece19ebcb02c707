//! GST calculation examples

use bigdecimal::BigDecimal;
use gst_core::{set_off, GstCalculation, GstRateSlab, Gstin, StateCode, SupplyType, TaxComponents};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🧾 GST Core - Calculation Examples\n");

    // 1. Slabs
    println!("📊 GST Rate Slabs:");
    for slab in GstRateSlab::ALL {
        println!("  {slab}");
    }
    println!();

    // 2. Intra-state vs Inter-state calculations
    let base_amount = BigDecimal::from(100000);

    println!("🏢 Intra-state Transaction (CGST + SGST):");
    let intra = GstCalculation::calculate(
        base_amount.clone(),
        GstRateSlab::Eighteen,
        SupplyType::IntraState,
    );
    println!("  Base Amount: ₹{}", intra.base_amount);
    println!("  CGST (9%):   ₹{}", intra.cgst_amount);
    println!("  SGST (9%):   ₹{}", intra.sgst_amount);
    println!("  IGST:        ₹{}", intra.igst_amount);
    println!("  Total GST:   ₹{}", intra.total_gst_amount);
    println!("  Final Total: ₹{}", intra.total_amount);
    println!();

    println!("🌍 Inter-state Transaction (IGST only):");
    let inter =
        GstCalculation::calculate(base_amount, GstRateSlab::Eighteen, SupplyType::InterState);
    println!("  CGST:        ₹{}", inter.cgst_amount);
    println!("  SGST:        ₹{}", inter.sgst_amount);
    println!("  IGST (18%):  ₹{}", inter.igst_amount);
    println!();

    // 3. Per-head rounding
    println!("🪙 Rounding:");
    let odd =
        GstCalculation::calculate("10.20".parse()?, GstRateSlab::Five, SupplyType::IntraState);
    println!(
        "  Tax on ₹10.20 at 5%: total ₹{}, CGST ₹{}, SGST ₹{}",
        odd.total_gst_amount, odd.cgst_amount, odd.sgst_amount
    );
    println!();

    // 4. GSTIN and state lookup
    println!("🪪 GSTIN:");
    let gstin = Gstin::parse("27aabcu9603r1zm")?;
    println!("  Canonical: {gstin}");
    println!("  State:     {} ({})", gstin.state_code(), gstin.state_code().name());
    println!("  PAN:       {}", gstin.pan());
    println!("  Checksum:  {}", if gstin.has_valid_checksum() { "valid" } else { "invalid" });
    if let Some(state) = StateCode::resolve("Tamil Nadu") {
        println!("  Tamil Nadu resolves to {state}");
    }
    println!();

    // 5. Credit set-off
    println!("⚖️  ITC Set-off:");
    let liability = TaxComponents::new(
        BigDecimal::from(83700),
        BigDecimal::from(43650),
        BigDecimal::from(43650),
    );
    let credit = TaxComponents::new(
        BigDecimal::from(51300),
        BigDecimal::from(40500),
        BigDecimal::from(40500),
    );
    let result = set_off(&liability, &credit);
    println!("  Liability:        ₹{}", liability.total());
    println!("  Paid through ITC: ₹{}", result.itc_utilized());
    println!(
        "  Cash payable:     ₹{} (IGST {}, CGST {}, SGST {})",
        result.cash_payable.total(),
        result.cash_payable.igst,
        result.cash_payable.cgst,
        result.cash_payable.sgst
    );
    println!("  Carry forward:    ₹{}", result.carry_forward.total());

    Ok(())
}
