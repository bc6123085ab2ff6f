use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{ActorId, ClientId, ItemId, LoanId, LoanStatus, PaymentId, SheetId, SheetStatus};

/// all events emitted by the core workflows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // loan lifecycle events
    LoanApplied {
        loan_id: LoanId,
        client_id: ClientId,
        principal: Money,
        term_weeks: u32,
        total_loan_amount: Money,
        actor_id: ActorId,
        timestamp: DateTime<Utc>,
    },
    LoanStatusChanged {
        loan_id: LoanId,
        from: LoanStatus,
        to: LoanStatus,
        actor_id: ActorId,
        timestamp: DateTime<Utc>,
    },
    LoanDisbursed {
        loan_id: LoanId,
        amount: Money,
        disbursed_on: NaiveDate,
        timestamp: DateTime<Utc>,
    },
    PaymentRecorded {
        loan_id: LoanId,
        amount: Money,
        balance_after: Money,
        timestamp: DateTime<Utc>,
    },

    // collection sheet events
    SheetOpened {
        sheet_id: SheetId,
        officer_id: ActorId,
        sheet_date: NaiveDate,
        timestamp: DateTime<Utc>,
    },
    ItemAdded {
        sheet_id: SheetId,
        item_id: ItemId,
        loan_id: LoanId,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    SheetStatusChanged {
        sheet_id: SheetId,
        from: SheetStatus,
        to: SheetStatus,
        actor_id: ActorId,
        timestamp: DateTime<Utc>,
    },
    SheetRejected {
        sheet_id: SheetId,
        reason: String,
        actor_id: ActorId,
        timestamp: DateTime<Utc>,
    },

    // posting events
    ItemSkipped {
        sheet_id: SheetId,
        item_id: ItemId,
        existing_payment: PaymentId,
        timestamp: DateTime<Utc>,
    },
    SheetPosted {
        sheet_id: SheetId,
        payment_count: u32,
        total_posted: Money,
        actor_id: ActorId,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// absorb events buffered by a committed transaction
    pub fn extend(&mut self, events: Vec<Event>) {
        self.events.extend(events);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
