use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{CoreError, Result};
use crate::events::{Event, EventStore};
use crate::policy::EligibilityPolicy;
use crate::sheet::{CollectionItem, CollectionSheet};
use crate::store::MemoryStore;
use crate::types::{ActorId, ItemId, ItemStatus, LoanId, PaymentId, SheetId, SheetStatus};

/// an authoritative payment record
///
/// `source_item_id` is set when the payment was produced by the posting
/// pipeline and is the idempotency key: one collection item yields at most
/// one payment, ever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub loan_id: LoanId,
    pub amount: Money,
    pub payment_date: DateTime<Utc>,
    pub recorded_by: ActorId,
    pub notes: Option<String>,
    pub source_item_id: Option<ItemId>,
}

/// outcome of a successful posting run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostingReceipt {
    pub sheet_id: SheetId,
    pub payment_ids: Vec<PaymentId>,
    pub skipped_items: Vec<ItemId>,
    pub total_posted: Money,
}

/// converts an approved collection sheet into payment records and
/// loan-balance changes, atomically and idempotently
///
/// the batch is all-or-nothing: partial posting would leave the sheet's
/// total inconsistent with the money actually applied, so any item-level
/// failure rolls the whole run back and leaves the sheet approved for a
/// retry.
#[derive(Debug, Clone, Default)]
pub struct PostingPipeline {
    eligibility: EligibilityPolicy,
}

impl PostingPipeline {
    pub fn new(eligibility: EligibilityPolicy) -> Self {
        Self { eligibility }
    }

    /// post an approved sheet
    pub fn post(
        &self,
        store: &mut MemoryStore,
        sheet_id: SheetId,
        actor_id: &ActorId,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<PostingReceipt> {
        let mut buffered = EventStore::new();

        let receipt = store.transaction(|tx| {
            // re-read under the transaction: a concurrent post or reversal
            // must be seen here
            let mut sheet = tx.sheet(&sheet_id)?;
            if sheet.status != SheetStatus::Approved {
                return Err(CoreError::PostingConflict {
                    sheet_id,
                    item_id: None,
                    loan_id: None,
                    message: format!("sheet is {}, not approved", sheet.status),
                });
            }

            let now = time_provider.now();
            let items: Vec<CollectionItem> =
                sheet.postable_items().into_iter().cloned().collect();

            let mut payment_ids = Vec::new();
            let mut skipped_items = Vec::new();
            let mut total_posted = Money::ZERO;

            for item in items {
                // retry safety: an item that already produced a payment is
                // skipped, not failed
                if let Some(existing) = tx.payment_for_item(&item.id) {
                    buffered.emit(Event::ItemSkipped {
                        sheet_id,
                        item_id: item.id,
                        existing_payment: existing.id,
                        timestamp: now,
                    });
                    skipped_items.push(item.id);
                    Self::flip_item(&mut sheet, item.id);
                    continue;
                }

                let mut loan = tx.loan(&item.loan_id)?;
                if !self.eligibility.can_post_item(loan.status) {
                    // abort the whole batch; the transaction discards every
                    // payment already staged in this run
                    return Err(CoreError::PostingConflict {
                        sheet_id,
                        item_id: Some(item.id),
                        loan_id: Some(loan.id),
                        message: format!("loan is {}", loan.status),
                    });
                }

                loan.record_payment(item.amount, actor_id, time_provider, &mut buffered)?;
                tx.update_loan(loan)?;

                let payment = Payment {
                    id: Uuid::new_v4(),
                    loan_id: item.loan_id,
                    amount: item.amount,
                    payment_date: now,
                    recorded_by: actor_id.clone(),
                    notes: item.notes.clone(),
                    source_item_id: Some(item.id),
                };
                payment_ids.push(payment.id);
                total_posted += payment.amount;
                tx.insert_payment(payment)?;

                Self::flip_item(&mut sheet, item.id);
            }

            sheet.mark_posted(actor_id, time_provider, &mut buffered)?;
            tx.update_sheet(sheet)?;

            buffered.emit(Event::SheetPosted {
                sheet_id,
                payment_count: payment_ids.len() as u32,
                total_posted,
                actor_id: actor_id.clone(),
                timestamp: now,
            });

            Ok(PostingReceipt {
                sheet_id,
                payment_ids,
                skipped_items,
                total_posted,
            })
        })?;

        events.extend(buffered.take_events());
        Ok(receipt)
    }

    fn flip_item(sheet: &mut CollectionSheet, item_id: ItemId) {
        if let Some(item) = sheet.items.iter_mut().find(|i| i.id == item_id) {
            item.status = ItemStatus::Posted;
        }
    }
}
