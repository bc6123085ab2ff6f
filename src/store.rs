use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::errors::Result;
use crate::loan::Loan;
use crate::posting::Payment;
use crate::sheet::CollectionSheet;
use crate::types::{ActorId, ClientId, ItemId, LoanId, PaymentId, SheetId, SheetStatus};

/// storage-layer failures, surfaced to callers as `PersistenceFailure`
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("loan {0} not found")]
    LoanNotFound(LoanId),

    #[error("sheet {0} not found")]
    SheetNotFound(SheetId),

    #[error("stale write: {entity} {id} at version {given}, store has {current}")]
    VersionConflict {
        entity: &'static str,
        id: Uuid,
        given: u64,
        current: u64,
    },

    #[error("officer {officer_id} already has a draft sheet for {sheet_date}")]
    DuplicateDraft {
        officer_id: ActorId,
        sheet_date: NaiveDate,
    },

    #[error("item {0} already has a payment")]
    DuplicateSourceItem(ItemId),
}

/// transactional in-memory store
///
/// models the guarantees the core expects from its relational backing (§
/// transactions, optimistic version checks, uniqueness constraints) so the
/// workflows and their failure semantics are fully exercisable in-process.
/// entities are handed out as clones; writes go through `update_*`, which
/// checks the entity's version against the stored one and bumps it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    loans: BTreeMap<LoanId, Loan>,
    sheets: BTreeMap<SheetId, CollectionSheet>,
    payments: BTreeMap<PaymentId, Payment>,
    payment_by_source: BTreeMap<ItemId, PaymentId>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// run `f` atomically: on error every write made inside is discarded
    pub fn transaction<T>(&mut self, f: impl FnOnce(&mut MemoryStore) -> Result<T>) -> Result<T> {
        let snapshot = self.clone();
        match f(self) {
            Ok(value) => Ok(value),
            Err(e) => {
                *self = snapshot;
                Err(e)
            }
        }
    }

    // loans

    pub fn insert_loan(&mut self, loan: Loan) -> std::result::Result<(), StoreError> {
        self.loans.insert(loan.id, loan);
        Ok(())
    }

    pub fn loan(&self, id: &LoanId) -> std::result::Result<Loan, StoreError> {
        self.loans.get(id).cloned().ok_or(StoreError::LoanNotFound(*id))
    }

    /// write back a loan; fails on a stale version, bumps on success
    pub fn update_loan(&mut self, mut loan: Loan) -> std::result::Result<Loan, StoreError> {
        let stored = self
            .loans
            .get(&loan.id)
            .ok_or(StoreError::LoanNotFound(loan.id))?;
        if stored.version != loan.version {
            return Err(StoreError::VersionConflict {
                entity: "loan",
                id: loan.id,
                given: loan.version,
                current: stored.version,
            });
        }
        loan.version += 1;
        self.loans.insert(loan.id, loan.clone());
        Ok(loan)
    }

    pub fn client_loans(&self, client_id: &ClientId) -> Vec<Loan> {
        self.loans
            .values()
            .filter(|l| l.client_id == *client_id)
            .cloned()
            .collect()
    }

    // sheets

    pub fn insert_sheet(&mut self, sheet: CollectionSheet) -> std::result::Result<(), StoreError> {
        if sheet.status == SheetStatus::Draft {
            self.check_draft_slot(&sheet)?;
        }
        self.sheets.insert(sheet.id, sheet);
        Ok(())
    }

    pub fn sheet(&self, id: &SheetId) -> std::result::Result<CollectionSheet, StoreError> {
        self.sheets.get(id).cloned().ok_or(StoreError::SheetNotFound(*id))
    }

    /// write back a sheet; fails on a stale version, bumps on success
    pub fn update_sheet(
        &mut self,
        mut sheet: CollectionSheet,
    ) -> std::result::Result<CollectionSheet, StoreError> {
        let stored = self
            .sheets
            .get(&sheet.id)
            .ok_or(StoreError::SheetNotFound(sheet.id))?;
        if stored.version != sheet.version {
            return Err(StoreError::VersionConflict {
                entity: "sheet",
                id: sheet.id,
                given: sheet.version,
                current: stored.version,
            });
        }
        if sheet.status == SheetStatus::Draft {
            self.check_draft_slot(&sheet)?;
        }
        sheet.version += 1;
        self.sheets.insert(sheet.id, sheet.clone());
        Ok(sheet)
    }

    /// at most one draft per officer per sheet date
    fn check_draft_slot(&self, candidate: &CollectionSheet) -> std::result::Result<(), StoreError> {
        let occupied = self.sheets.values().any(|s| {
            s.id != candidate.id
                && s.status == SheetStatus::Draft
                && s.officer_id == candidate.officer_id
                && s.sheet_date == candidate.sheet_date
        });
        if occupied {
            return Err(StoreError::DuplicateDraft {
                officer_id: candidate.officer_id.clone(),
                sheet_date: candidate.sheet_date,
            });
        }
        Ok(())
    }

    pub fn draft_for(&self, officer_id: &ActorId, sheet_date: NaiveDate) -> Option<CollectionSheet> {
        self.sheets
            .values()
            .find(|s| {
                s.status == SheetStatus::Draft
                    && s.officer_id == *officer_id
                    && s.sheet_date == sheet_date
            })
            .cloned()
    }

    // payments

    /// insert a payment; one payment per source collection item, ever
    pub fn insert_payment(&mut self, payment: Payment) -> std::result::Result<(), StoreError> {
        if let Some(source) = payment.source_item_id {
            if self.payment_by_source.contains_key(&source) {
                return Err(StoreError::DuplicateSourceItem(source));
            }
            self.payment_by_source.insert(source, payment.id);
        }
        self.payments.insert(payment.id, payment);
        Ok(())
    }

    pub fn payment_for_item(&self, item_id: &ItemId) -> Option<Payment> {
        self.payment_by_source
            .get(item_id)
            .and_then(|pid| self.payments.get(pid))
            .cloned()
    }

    pub fn payments_for_loan(&self, loan_id: &LoanId) -> Vec<Payment> {
        self.payments
            .values()
            .filter(|p| p.loan_id == *loan_id)
            .cloned()
            .collect()
    }

    pub fn payment_count(&self) -> usize {
        self.payments.len()
    }
}
