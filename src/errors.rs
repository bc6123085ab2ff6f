use thiserror::Error;
use uuid::Uuid;

use crate::decimal::Money;
use crate::store::StoreError;
use crate::types::{ActorId, ClientId, ItemId, LoanId, LoanStatus, SheetId, SheetStatus};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid loan terms: principal {principal}, term {term_weeks} weeks")]
    InvalidLoanTerms {
        principal: Money,
        term_weeks: u32,
    },

    #[error("client {client_id} is not eligible for a new loan")]
    IneligibleClient {
        client_id: ClientId,
    },

    #[error("invalid transition: {entity} {id} is {current}, expected {expected}")]
    InvalidTransition {
        entity: &'static str,
        id: Uuid,
        current: String,
        expected: &'static str,
    },

    #[error("sheet {sheet_id} is not editable: current status is {status}")]
    SheetNotEditable {
        sheet_id: SheetId,
        status: SheetStatus,
    },

    #[error("loan {loan_id} cannot receive collections: current status is {status}")]
    LoanNotActive {
        loan_id: LoanId,
        status: LoanStatus,
    },

    #[error("sheet {sheet_id} has no collectible items")]
    EmptySheet {
        sheet_id: SheetId,
    },

    #[error("rejecting sheet {sheet_id} requires a reason")]
    EmptyRejectionReason {
        sheet_id: SheetId,
    },

    #[error("invalid collection amount: {amount}")]
    InvalidAmount {
        amount: Money,
    },

    #[error("item {item_id} not found on sheet {sheet_id}")]
    ItemNotFound {
        sheet_id: SheetId,
        item_id: ItemId,
    },

    #[error("actor {actor_id} may not {action}")]
    UnauthorizedActor {
        actor_id: ActorId,
        action: &'static str,
    },

    #[error("posting conflict on sheet {sheet_id}: {message}")]
    PostingConflict {
        sheet_id: SheetId,
        item_id: Option<ItemId>,
        loan_id: Option<LoanId>,
        message: String,
    },

    #[error(transparent)]
    PersistenceFailure(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
