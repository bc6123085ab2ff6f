/// a full collection day: officer drafts, manager approves, cashier posts
use chrono::{TimeZone, Utc};
use microloan_rs::{
    AmortizationCalculator, CollectionSheet, EligibilityPolicy, EventStore, Loan, LoanPolicy,
    MemoryStore, Money, PostingPipeline, SafeTimeProvider, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap(),
    ));
    let mut store = MemoryStore::new();
    let mut events = EventStore::new();

    let calculator = AmortizationCalculator::new(LoanPolicy::default());
    let eligibility = EligibilityPolicy::default();
    let officer = "officer-7".to_string();
    let manager = "manager-2".to_string();
    let cashier = "cashier-3".to_string();

    // two clients with active loans
    let mut loans = Vec::new();
    for client in ["client-1001", "client-1002"] {
        let mut loan = Loan::apply(
            &mut store,
            &calculator,
            &eligibility,
            client.to_string(),
            Money::from_major(10_000),
            17,
            officer.clone(),
            &time,
            &mut events,
        )?;
        loan.approve(&manager, &time, &mut events)?;
        loan.disburse(&cashier, &time, &mut events)?;
        let loan = store.update_loan(loan)?;
        loans.push(loan);
    }

    // the officer drafts today's sheet
    let mut sheet = CollectionSheet::create_or_get_draft(
        &mut store,
        officer.clone(),
        time.now().date_naive(),
        &time,
        &mut events,
    )?;
    sheet.add_item(&officer, &loans[0], &eligibility, Money::from_major(500), None, &time, &mut events)?;
    sheet.add_item(&officer, &loans[1], &eligibility, Money::from_major(300), None, &time, &mut events)?;

    // submit and approve
    sheet.submit(&officer, &time, &mut events)?;
    sheet.approve(&manager, &time, &mut events)?;
    let sheet = store.update_sheet(sheet)?;

    // cashier posts the approved sheet
    let pipeline = PostingPipeline::new(eligibility);
    let receipt = pipeline.post(&mut store, sheet.id, &cashier, &time, &mut events)?;

    println!(
        "posted sheet {}: {} payments, {} total",
        receipt.sheet_id,
        receipt.payment_ids.len(),
        receipt.total_posted
    );
    for loan in &loans {
        let current = store.loan(&loan.id)?;
        println!("loan {} balance: {}", current.id, current.balance);
    }

    println!("\nevents:");
    for event in events.take_events() {
        println!("  {:?}", event);
    }

    Ok(())
}
