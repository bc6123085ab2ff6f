use chrono::{DateTime, NaiveDate, Utc};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::errors::{CoreError, Result};
use crate::events::{Event, EventStore};
use crate::policy::EligibilityPolicy;
use crate::schedule::{AmortizationCalculator, LoanQuote, ScheduleEntry};
use crate::store::MemoryStore;
use crate::types::{ActorId, ClientId, LoanId, LoanStatus};

/// a single loan: frozen terms plus lifecycle state
///
/// terms (`total_interest`, `total_loan_amount`, `weekly_payment`) are
/// computed once at application time and never recomputed, even if policy
/// constants change later. the schedule is derived on demand from these
/// frozen fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub client_id: ClientId,

    // frozen terms
    pub principal: Money,
    pub term_weeks: u32,
    pub monthly_rate: Rate,
    pub flat_interest_months: u32,
    pub total_interest: Money,
    pub insurance_fee: Money,
    pub total_loan_amount: Money,
    pub weekly_payment: Money,

    // running balances
    pub balance: Money,
    pub repaid: Money,

    // lifecycle
    pub status: LoanStatus,
    pub application_date: DateTime<Utc>,
    pub approval_date: Option<DateTime<Utc>>,
    pub disbursement_date: Option<DateTime<Utc>>,
    pub completion_date: Option<DateTime<Utc>>,
    pub created_by: ActorId,
    pub approved_by: Option<ActorId>,

    // optimistic concurrency, bumped by the store on update
    pub version: u64,
}

impl Loan {
    /// open a new application from a quote
    pub fn open(
        quote: &LoanQuote,
        client_id: ClientId,
        created_by: ActorId,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Self {
        let id = Uuid::new_v4();
        let now = time_provider.now();

        events.emit(Event::LoanApplied {
            loan_id: id,
            client_id: client_id.clone(),
            principal: quote.principal,
            term_weeks: quote.term_weeks,
            total_loan_amount: quote.total_loan_amount,
            actor_id: created_by.clone(),
            timestamp: now,
        });

        Self {
            id,
            client_id,
            principal: quote.principal,
            term_weeks: quote.term_weeks,
            monthly_rate: quote.monthly_rate,
            flat_interest_months: quote.flat_interest_months,
            total_interest: quote.total_interest,
            insurance_fee: quote.insurance_fee,
            total_loan_amount: quote.total_loan_amount,
            weekly_payment: quote.weekly_payment,
            balance: quote.total_loan_amount,
            repaid: Money::ZERO,
            status: LoanStatus::Application,
            application_date: now,
            approval_date: None,
            disbursement_date: None,
            completion_date: None,
            created_by,
            approved_by: None,
            version: 0,
        }
    }

    /// run eligibility, quote the terms, and persist a new application
    pub fn apply(
        store: &mut MemoryStore,
        calculator: &AmortizationCalculator,
        eligibility: &EligibilityPolicy,
        client_id: ClientId,
        principal: Money,
        term_weeks: u32,
        created_by: ActorId,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<Loan> {
        let mut buffered = EventStore::new();

        let loan = store.transaction(|tx| {
            let existing: Vec<LoanStatus> = tx
                .client_loans(&client_id)
                .iter()
                .map(|l| l.status)
                .collect();
            if !eligibility.can_apply(&existing) {
                return Err(CoreError::IneligibleClient {
                    client_id: client_id.clone(),
                });
            }

            let quote = calculator.quote(principal, term_weeks)?;
            let loan = Loan::open(
                &quote,
                client_id.clone(),
                created_by.clone(),
                time_provider,
                &mut buffered,
            );
            tx.insert_loan(loan.clone())?;
            Ok(loan)
        })?;

        events.extend(buffered.take_events());
        Ok(loan)
    }

    fn guard(&self, expected: LoanStatus) -> Result<()> {
        if self.status != expected {
            return Err(CoreError::InvalidTransition {
                entity: "loan",
                id: self.id,
                current: self.status.to_string(),
                expected: expected.name(),
            });
        }
        Ok(())
    }

    fn change_status(
        &mut self,
        to: LoanStatus,
        actor_id: &ActorId,
        now: DateTime<Utc>,
        events: &mut EventStore,
    ) {
        let from = self.status;
        self.status = to;
        events.emit(Event::LoanStatusChanged {
            loan_id: self.id,
            from,
            to,
            actor_id: actor_id.clone(),
            timestamp: now,
        });
    }

    /// approve the application; does not move funds
    pub fn approve(
        &mut self,
        approver_id: &ActorId,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<()> {
        self.guard(LoanStatus::Application)?;

        let now = time_provider.now();
        self.approval_date = Some(now);
        self.approved_by = Some(approver_id.clone());
        self.change_status(LoanStatus::Approved, approver_id, now, events);
        Ok(())
    }

    /// release funds; anchors the schedule's due dates
    pub fn disburse(
        &mut self,
        actor_id: &ActorId,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<()> {
        self.guard(LoanStatus::Approved)?;

        let now = time_provider.now();
        self.disbursement_date = Some(now);
        self.balance = self.total_loan_amount;
        self.change_status(LoanStatus::Active, actor_id, now, events);
        events.emit(Event::LoanDisbursed {
            loan_id: self.id,
            amount: self.principal,
            disbursed_on: now.date_naive(),
            timestamp: now,
        });
        Ok(())
    }

    /// withdraw an application
    pub fn cancel(
        &mut self,
        actor_id: &ActorId,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<()> {
        self.guard(LoanStatus::Application)?;
        self.change_status(LoanStatus::Cancelled, actor_id, time_provider.now(), events);
        Ok(())
    }

    /// bring a cancelled application back; approved or active loans stay put
    pub fn restore(
        &mut self,
        actor_id: &ActorId,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<()> {
        self.guard(LoanStatus::Cancelled)?;
        self.change_status(LoanStatus::Application, actor_id, time_provider.now(), events);
        Ok(())
    }

    /// flag a seriously delinquent loan
    ///
    /// intended to be driven by an external scheduler re-evaluating the
    /// overdue query; the core stores no overdue state of its own.
    pub fn mark_defaulted(
        &mut self,
        actor_id: &ActorId,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<()> {
        self.guard(LoanStatus::Active)?;
        self.change_status(LoanStatus::Defaulted, actor_id, time_provider.now(), events);
        Ok(())
    }

    /// apply a collected amount to the running balance
    ///
    /// invoked by the posting pipeline, never directly by a controller.
    /// a partial payment never changes status; a payment clearing the
    /// balance completes the loan. an amount beyond the balance floors it at
    /// zero: the collected cash is the fact of record.
    pub fn record_payment(
        &mut self,
        amount: Money,
        recorded_by: &ActorId,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<()> {
        if !matches!(self.status, LoanStatus::Active | LoanStatus::Defaulted) {
            return Err(CoreError::InvalidTransition {
                entity: "loan",
                id: self.id,
                current: self.status.to_string(),
                expected: "active or defaulted",
            });
        }
        if !amount.is_positive() {
            return Err(CoreError::InvalidAmount { amount });
        }

        let now = time_provider.now();
        self.repaid += amount;
        self.balance = (self.balance - amount).max(Money::ZERO);

        events.emit(Event::PaymentRecorded {
            loan_id: self.id,
            amount,
            balance_after: self.balance,
            timestamp: now,
        });

        if self.balance.is_zero() {
            self.completion_date = Some(now);
            self.change_status(LoanStatus::Completed, recorded_by, now, events);
        }

        Ok(())
    }

    /// frozen terms as a quote, for schedule regeneration
    pub fn quote(&self) -> LoanQuote {
        LoanQuote {
            principal: self.principal,
            term_weeks: self.term_weeks,
            monthly_rate: self.monthly_rate,
            flat_interest_months: self.flat_interest_months,
            total_interest: self.total_interest,
            insurance_fee: self.insurance_fee,
            total_loan_amount: self.total_loan_amount,
            weekly_payment: self.weekly_payment,
        }
    }

    /// repayment schedule anchored at the disbursement date
    pub fn schedule(&self) -> Option<Vec<ScheduleEntry>> {
        self.disbursement_date
            .map(|d| self.quote().schedule_from(d.date_naive()))
    }

    /// earliest schedule entry not yet covered by cumulative repayments
    pub fn next_unpaid(&self) -> Option<ScheduleEntry> {
        let schedule = self.schedule()?;
        let mut cumulative = Money::ZERO;
        for entry in schedule {
            cumulative += entry.expected_payment;
            if self.repaid < cumulative {
                return Some(entry);
            }
        }
        None
    }

    /// derived read-side flag: active with a past-due unpaid installment.
    /// not a stored status
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == LoanStatus::Active
            && self
                .next_unpaid()
                .map(|e| e.due_date < today)
                .unwrap_or(false)
    }
}
