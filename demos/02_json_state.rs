/// serialize the full ledger state to json and load it back
use chrono::{TimeZone, Utc};
use microloan_rs::{
    AmortizationCalculator, EligibilityPolicy, EventStore, Loan, LoanPolicy, MemoryStore, Money,
    SafeTimeProvider, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap(),
    ));
    let mut store = MemoryStore::new();
    let mut events = EventStore::new();

    let calculator = AmortizationCalculator::new(LoanPolicy::default());
    let eligibility = EligibilityPolicy::default();

    let loan = Loan::apply(
        &mut store,
        &calculator,
        &eligibility,
        "client-1001".to_string(),
        Money::from_major(5_000),
        13,
        "officer-7".to_string(),
        &time,
        &mut events,
    )?;

    // snapshot the whole store
    let json = serde_json::to_string_pretty(&store)?;
    println!("{}", json);

    // and restore it
    let restored: MemoryStore = serde_json::from_str(&json)?;
    assert_eq!(restored.loan(&loan.id)?, loan);
    println!("\nrestored {} from snapshot", loan.id);

    Ok(())
}
