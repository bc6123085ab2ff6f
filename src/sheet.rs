use chrono::{DateTime, NaiveDate, Utc};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{CoreError, Result};
use crate::events::{Event, EventStore};
use crate::loan::Loan;
use crate::policy::EligibilityPolicy;
use crate::store::MemoryStore;
use crate::types::{ActorId, ClientId, ItemId, ItemStatus, LoanId, SheetId, SheetStatus};

/// one officer-entered collection against one loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionItem {
    pub id: ItemId,
    pub sheet_id: SheetId,
    pub client_id: ClientId,
    pub loan_id: LoanId,
    pub amount: Money,
    pub notes: Option<String>,
    pub status: ItemStatus,
}

/// one officer's collection items for one date
///
/// the sheet owns its own state machine: draft -> submitted ->
/// {approved, back to draft on rejection}; approved -> posted. items are
/// editable only while the sheet is draft, and only by the owning officer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSheet {
    pub id: SheetId,
    pub officer_id: ActorId,
    pub sheet_date: NaiveDate,
    pub status: SheetStatus,
    pub items: Vec<CollectionItem>,
    pub total_amount: Money,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<ActorId>,
    pub rejection_reason: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,

    // optimistic concurrency, bumped by the store on update
    pub version: u64,
}

impl CollectionSheet {
    /// open a fresh draft
    pub fn new(
        officer_id: ActorId,
        sheet_date: NaiveDate,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Self {
        let id = Uuid::new_v4();

        events.emit(Event::SheetOpened {
            sheet_id: id,
            officer_id: officer_id.clone(),
            sheet_date,
            timestamp: time_provider.now(),
        });

        Self {
            id,
            officer_id,
            sheet_date,
            status: SheetStatus::Draft,
            items: Vec::new(),
            total_amount: Money::ZERO,
            submitted_at: None,
            approved_at: None,
            approved_by: None,
            rejection_reason: None,
            posted_at: None,
            version: 0,
        }
    }

    /// return the officer's existing draft for the date, or open one
    ///
    /// idempotent: backed by the store's one-draft-per-officer-per-date
    /// index, so repeated calls converge on the same sheet.
    pub fn create_or_get_draft(
        store: &mut MemoryStore,
        officer_id: ActorId,
        sheet_date: NaiveDate,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<CollectionSheet> {
        if let Some(existing) = store.draft_for(&officer_id, sheet_date) {
            return Ok(existing);
        }

        let mut buffered = EventStore::new();
        let sheet = CollectionSheet::new(officer_id, sheet_date, time_provider, &mut buffered);
        store.insert_sheet(sheet.clone())?;
        events.extend(buffered.take_events());
        Ok(sheet)
    }

    fn guard(&self, expected: SheetStatus) -> Result<()> {
        if self.status != expected {
            return Err(CoreError::InvalidTransition {
                entity: "sheet",
                id: self.id,
                current: self.status.to_string(),
                expected: expected.name(),
            });
        }
        Ok(())
    }

    fn ensure_editable(&self) -> Result<()> {
        if self.status != SheetStatus::Draft {
            return Err(CoreError::SheetNotEditable {
                sheet_id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }

    fn ensure_owner(&self, actor_id: &ActorId, action: &'static str) -> Result<()> {
        if *actor_id != self.officer_id {
            return Err(CoreError::UnauthorizedActor {
                actor_id: actor_id.clone(),
                action,
            });
        }
        Ok(())
    }

    fn item_mut(&mut self, item_id: ItemId) -> Result<&mut CollectionItem> {
        let sheet_id = self.id;
        self.items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or(CoreError::ItemNotFound { sheet_id, item_id })
    }

    fn recompute_total(&mut self) {
        self.total_amount = self
            .items
            .iter()
            .filter(|i| i.status != ItemStatus::Voided)
            .map(|i| i.amount)
            .sum();
    }

    /// collectible items in stable item-id order
    pub fn postable_items(&self) -> Vec<&CollectionItem> {
        let mut items: Vec<&CollectionItem> = self
            .items
            .iter()
            .filter(|i| i.status != ItemStatus::Voided)
            .collect();
        items.sort_by_key(|i| i.id);
        items
    }

    /// add a collection against a loan; draft only, owner only
    pub fn add_item(
        &mut self,
        actor_id: &ActorId,
        loan: &Loan,
        eligibility: &EligibilityPolicy,
        amount: Money,
        notes: Option<String>,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<ItemId> {
        self.ensure_owner(actor_id, "edit this sheet")?;
        self.ensure_editable()?;

        if !amount.is_positive() {
            return Err(CoreError::InvalidAmount { amount });
        }
        if !eligibility.can_add_item(loan.status) {
            return Err(CoreError::LoanNotActive {
                loan_id: loan.id,
                status: loan.status,
            });
        }

        let item = CollectionItem {
            id: Uuid::new_v4(),
            sheet_id: self.id,
            client_id: loan.client_id.clone(),
            loan_id: loan.id,
            amount,
            notes,
            status: ItemStatus::Pending,
        };
        let item_id = item.id;

        events.emit(Event::ItemAdded {
            sheet_id: self.id,
            item_id,
            loan_id: loan.id,
            amount,
            timestamp: time_provider.now(),
        });

        self.items.push(item);
        self.recompute_total();
        Ok(item_id)
    }

    /// correct an item's amount or notes; draft only, owner only
    pub fn amend_item(
        &mut self,
        actor_id: &ActorId,
        item_id: ItemId,
        amount: Money,
        notes: Option<String>,
    ) -> Result<()> {
        self.ensure_owner(actor_id, "edit this sheet")?;
        self.ensure_editable()?;

        if !amount.is_positive() {
            return Err(CoreError::InvalidAmount { amount });
        }

        let item = self.item_mut(item_id)?;
        item.amount = amount;
        item.notes = notes;
        self.recompute_total();
        Ok(())
    }

    /// strike an item without deleting it; draft only, owner only
    pub fn void_item(&mut self, actor_id: &ActorId, item_id: ItemId) -> Result<()> {
        self.ensure_owner(actor_id, "edit this sheet")?;
        self.ensure_editable()?;

        self.item_mut(item_id)?.status = ItemStatus::Voided;
        self.recompute_total();
        Ok(())
    }

    /// delete an item outright; draft only, owner only
    pub fn remove_item(&mut self, actor_id: &ActorId, item_id: ItemId) -> Result<()> {
        self.ensure_owner(actor_id, "edit this sheet")?;
        self.ensure_editable()?;

        self.item_mut(item_id)?;
        self.items.retain(|i| i.id != item_id);
        self.recompute_total();
        Ok(())
    }

    fn change_status(
        &mut self,
        to: SheetStatus,
        actor_id: &ActorId,
        now: DateTime<Utc>,
        events: &mut EventStore,
    ) {
        let from = self.status;
        self.status = to;
        events.emit(Event::SheetStatusChanged {
            sheet_id: self.id,
            from,
            to,
            actor_id: actor_id.clone(),
            timestamp: now,
        });
    }

    /// hand the draft off for approval; items become read-only
    pub fn submit(
        &mut self,
        actor_id: &ActorId,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<()> {
        self.ensure_owner(actor_id, "submit this sheet")?;
        self.guard(SheetStatus::Draft)?;

        if self.postable_items().is_empty() {
            return Err(CoreError::EmptySheet { sheet_id: self.id });
        }

        let now = time_provider.now();
        self.submitted_at = Some(now);
        self.rejection_reason = None;
        self.change_status(SheetStatus::Submitted, actor_id, now, events);
        Ok(())
    }

    /// clear the sheet for posting; the drafting officer may not self-approve
    pub fn approve(
        &mut self,
        approver_id: &ActorId,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<()> {
        self.guard(SheetStatus::Submitted)?;
        if *approver_id == self.officer_id {
            return Err(CoreError::UnauthorizedActor {
                actor_id: approver_id.clone(),
                action: "approve their own sheet",
            });
        }

        let now = time_provider.now();
        self.approved_at = Some(now);
        self.approved_by = Some(approver_id.clone());
        self.change_status(SheetStatus::Approved, approver_id, now, events);
        Ok(())
    }

    /// send the sheet back to the officer for correction
    ///
    /// the sheet returns to draft with its items intact, so the officer can
    /// correct and resubmit; nothing is deleted.
    pub fn reject(
        &mut self,
        approver_id: &ActorId,
        reason: &str,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<()> {
        self.guard(SheetStatus::Submitted)?;
        if *approver_id == self.officer_id {
            return Err(CoreError::UnauthorizedActor {
                actor_id: approver_id.clone(),
                action: "review their own sheet",
            });
        }
        if reason.trim().is_empty() {
            return Err(CoreError::EmptyRejectionReason { sheet_id: self.id });
        }

        let now = time_provider.now();
        self.submitted_at = None;
        self.rejection_reason = Some(reason.to_string());
        self.change_status(SheetStatus::Draft, approver_id, now, events);
        events.emit(Event::SheetRejected {
            sheet_id: self.id,
            reason: reason.to_string(),
            actor_id: approver_id.clone(),
            timestamp: now,
        });
        Ok(())
    }

    /// final transition, invoked by the posting pipeline once every item has
    /// been converted
    pub fn mark_posted(
        &mut self,
        actor_id: &ActorId,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<()> {
        self.guard(SheetStatus::Approved)?;

        let now = time_provider.now();
        self.posted_at = Some(now);
        self.change_status(SheetStatus::Posted, actor_id, now, events);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::LoanPolicy;
    use crate::schedule::AmortizationCalculator;
    use chrono::TimeZone;
    use hourglass_rs::TimeSource;

    fn frozen_time() -> SafeTimeProvider {
        SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap(),
        ))
    }

    fn sheet_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    fn officer() -> ActorId {
        "officer-1".to_string()
    }

    fn active_loan(client: &str, events: &mut EventStore) -> Loan {
        let time = frozen_time();
        let calc = AmortizationCalculator::new(LoanPolicy::default());
        let quote = calc.quote(Money::from_major(10_000), 17).unwrap();
        let mut loan = Loan::open(&quote, client.to_string(), officer(), &time, events);
        loan.approve(&"manager-1".to_string(), &time, events).unwrap();
        loan.disburse(&"cashier-1".to_string(), &time, events).unwrap();
        loan
    }

    fn draft_with_item(events: &mut EventStore) -> (CollectionSheet, Loan) {
        let time = frozen_time();
        let loan = active_loan("client-1", events);
        let mut sheet = CollectionSheet::new(officer(), sheet_date(), &time, events);
        sheet
            .add_item(
                &officer(),
                &loan,
                &EligibilityPolicy::default(),
                Money::from_major(500),
                None,
                &time,
                events,
            )
            .unwrap();
        (sheet, loan)
    }

    #[test]
    fn test_add_item_updates_total() {
        let time = frozen_time();
        let mut events = EventStore::new();
        let (mut sheet, _loan) = draft_with_item(&mut events);
        let other = active_loan("client-2", &mut events);

        sheet
            .add_item(
                &officer(),
                &other,
                &EligibilityPolicy::default(),
                Money::from_major(300),
                Some("week 3".to_string()),
                &time,
                &mut events,
            )
            .unwrap();

        assert_eq!(sheet.items.len(), 2);
        assert_eq!(sheet.total_amount, Money::from_major(800));
    }

    #[test]
    fn test_item_client_comes_from_loan() {
        let mut events = EventStore::new();
        let (sheet, loan) = draft_with_item(&mut events);
        assert_eq!(sheet.items[0].client_id, loan.client_id);
    }

    #[test]
    fn test_add_item_rejects_non_draft() {
        let time = frozen_time();
        let mut events = EventStore::new();
        let (mut sheet, loan) = draft_with_item(&mut events);
        sheet.submit(&officer(), &time, &mut events).unwrap();

        assert!(matches!(
            sheet.add_item(
                &officer(),
                &loan,
                &EligibilityPolicy::default(),
                Money::from_major(100),
                None,
                &time,
                &mut events,
            ),
            Err(CoreError::SheetNotEditable { .. })
        ));
    }

    #[test]
    fn test_add_item_rejects_inactive_loan() {
        let time = frozen_time();
        let mut events = EventStore::new();
        let mut sheet = CollectionSheet::new(officer(), sheet_date(), &time, &mut events);

        let calc = AmortizationCalculator::new(LoanPolicy::default());
        let quote = calc.quote(Money::from_major(5_000), 13).unwrap();
        let pending = Loan::open(&quote, "client-9".to_string(), officer(), &time, &mut events);

        assert!(matches!(
            sheet.add_item(
                &officer(),
                &pending,
                &EligibilityPolicy::default(),
                Money::from_major(100),
                None,
                &time,
                &mut events,
            ),
            Err(CoreError::LoanNotActive { .. })
        ));
    }

    #[test]
    fn test_add_item_rejects_bad_amount() {
        let time = frozen_time();
        let mut events = EventStore::new();
        let (mut sheet, loan) = draft_with_item(&mut events);

        assert!(matches!(
            sheet.add_item(
                &officer(),
                &loan,
                &EligibilityPolicy::default(),
                Money::ZERO,
                None,
                &time,
                &mut events,
            ),
            Err(CoreError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_only_owner_edits_and_submits() {
        let time = frozen_time();
        let mut events = EventStore::new();
        let (mut sheet, loan) = draft_with_item(&mut events);
        let stranger = "officer-2".to_string();

        assert!(matches!(
            sheet.add_item(
                &stranger,
                &loan,
                &EligibilityPolicy::default(),
                Money::from_major(100),
                None,
                &time,
                &mut events,
            ),
            Err(CoreError::UnauthorizedActor { .. })
        ));
        assert!(matches!(
            sheet.submit(&stranger, &time, &mut events),
            Err(CoreError::UnauthorizedActor { .. })
        ));
    }

    #[test]
    fn test_amend_void_remove() {
        let time = frozen_time();
        let mut events = EventStore::new();
        let (mut sheet, _loan) = draft_with_item(&mut events);
        let other = active_loan("client-2", &mut events);
        let second = sheet
            .add_item(
                &officer(),
                &other,
                &EligibilityPolicy::default(),
                Money::from_major(300),
                None,
                &time,
                &mut events,
            )
            .unwrap();
        let first = sheet.items[0].id;

        sheet
            .amend_item(&officer(), first, Money::from_major(450), Some("corrected".to_string()))
            .unwrap();
        assert_eq!(sheet.total_amount, Money::from_major(750));

        sheet.void_item(&officer(), second).unwrap();
        assert_eq!(sheet.total_amount, Money::from_major(450));
        assert_eq!(sheet.postable_items().len(), 1);

        sheet.remove_item(&officer(), second).unwrap();
        assert_eq!(sheet.items.len(), 1);

        assert!(matches!(
            sheet.amend_item(&officer(), second, Money::from_major(1), None),
            Err(CoreError::ItemNotFound { .. })
        ));
    }

    #[test]
    fn test_submit_requires_items() {
        let time = frozen_time();
        let mut events = EventStore::new();
        let mut sheet = CollectionSheet::new(officer(), sheet_date(), &time, &mut events);

        assert!(matches!(
            sheet.submit(&officer(), &time, &mut events),
            Err(CoreError::EmptySheet { .. })
        ));

        // a sheet whose only item is voided is empty for submission purposes
        let (mut sheet, _loan) = draft_with_item(&mut events);
        let item = sheet.items[0].id;
        sheet.void_item(&officer(), item).unwrap();
        assert!(matches!(
            sheet.submit(&officer(), &time, &mut events),
            Err(CoreError::EmptySheet { .. })
        ));
    }

    #[test]
    fn test_approve_from_draft_fails_unchanged() {
        let time = frozen_time();
        let mut events = EventStore::new();
        let (mut sheet, _loan) = draft_with_item(&mut events);

        let before = sheet.clone();
        assert!(matches!(
            sheet.approve(&"manager-1".to_string(), &time, &mut events),
            Err(CoreError::InvalidTransition { .. })
        ));
        assert_eq!(sheet, before);
    }

    #[test]
    fn test_submit_approve_flow() {
        let time = frozen_time();
        let mut events = EventStore::new();
        let (mut sheet, _loan) = draft_with_item(&mut events);

        sheet.submit(&officer(), &time, &mut events).unwrap();
        assert_eq!(sheet.status, SheetStatus::Submitted);
        assert!(sheet.submitted_at.is_some());

        sheet.approve(&"manager-1".to_string(), &time, &mut events).unwrap();
        assert_eq!(sheet.status, SheetStatus::Approved);
        assert_eq!(sheet.approved_by.as_deref(), Some("manager-1"));
    }

    #[test]
    fn test_self_approval_blocked() {
        let time = frozen_time();
        let mut events = EventStore::new();
        let (mut sheet, _loan) = draft_with_item(&mut events);
        sheet.submit(&officer(), &time, &mut events).unwrap();

        assert!(matches!(
            sheet.approve(&officer(), &time, &mut events),
            Err(CoreError::UnauthorizedActor { .. })
        ));
    }

    #[test]
    fn test_reject_requires_reason() {
        let time = frozen_time();
        let mut events = EventStore::new();
        let (mut sheet, _loan) = draft_with_item(&mut events);
        sheet.submit(&officer(), &time, &mut events).unwrap();

        assert!(matches!(
            sheet.reject(&"manager-1".to_string(), "  ", &time, &mut events),
            Err(CoreError::EmptyRejectionReason { .. })
        ));
    }

    #[test]
    fn test_reject_round_trip() {
        let time = frozen_time();
        let mut events = EventStore::new();
        let (mut sheet, _loan) = draft_with_item(&mut events);
        let items_before = sheet.items.clone();

        sheet.submit(&officer(), &time, &mut events).unwrap();
        sheet
            .reject(&"manager-1".to_string(), "amount mismatch", &time, &mut events)
            .unwrap();

        // back to an editable draft with the items intact
        assert_eq!(sheet.status, SheetStatus::Draft);
        assert_eq!(sheet.items, items_before);
        assert_eq!(sheet.rejection_reason.as_deref(), Some("amount mismatch"));
        assert!(sheet.submitted_at.is_none());

        sheet
            .amend_item(&officer(), items_before[0].id, Money::from_major(450), None)
            .unwrap();
        sheet.submit(&officer(), &time, &mut events).unwrap();
        assert_eq!(sheet.status, SheetStatus::Submitted);
        assert!(sheet.rejection_reason.is_none());
    }

    #[test]
    fn test_mark_posted_requires_approved() {
        let time = frozen_time();
        let mut events = EventStore::new();
        let (mut sheet, _loan) = draft_with_item(&mut events);

        assert!(matches!(
            sheet.mark_posted(&"cashier-1".to_string(), &time, &mut events),
            Err(CoreError::InvalidTransition { .. })
        ));

        sheet.submit(&officer(), &time, &mut events).unwrap();
        sheet.approve(&"manager-1".to_string(), &time, &mut events).unwrap();
        sheet.mark_posted(&"cashier-1".to_string(), &time, &mut events).unwrap();
        assert_eq!(sheet.status, SheetStatus::Posted);
        assert!(sheet.posted_at.is_some());
    }
}
