/// quick start - apply, approve, disburse, print the schedule
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

    // a 10,000 loan over 17 weeks
    let mut loan = Loan::apply(
        &mut store,
        &calculator,
        &eligibility,
        "client-1001".to_string(),
        Money::from_major(10_000),
        17,
        "officer-7".to_string(),
        &time,
        &mut events,
    )?;

    loan.approve(&"manager-2".to_string(), &time, &mut events)?;
    loan.disburse(&"cashier-3".to_string(), &time, &mut events)?;
    store.update_loan(loan.clone())?;

    println!(
        "loan {}: total {} over {} weeks, {} per week",
        loan.id, loan.total_loan_amount, loan.term_weeks, loan.weekly_payment
    );

    for entry in loan.schedule().unwrap() {
        println!(
            "  week {:2}  due {}  pay {:>8}  balance {:>9}",
            entry.week, entry.due_date, entry.expected_payment, entry.running_balance
        );
    }

    Ok(())
}
