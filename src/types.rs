use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// unique identifier for a loan
pub type LoanId = Uuid;

/// unique identifier for a collection sheet
pub type SheetId = Uuid;

/// unique identifier for a collection item
pub type ItemId = Uuid;

/// unique identifier for a payment
pub type PaymentId = Uuid;

/// externally assigned client identifier
pub type ClientId = String;

/// externally assigned actor identifier (officer, cashier, manager)
pub type ActorId = String;

/// loan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    /// loan requested, terms frozen, awaiting approval
    Application,
    /// approved but funds not yet released
    Approved,
    /// funds disbursed, repayment schedule anchored
    Active,
    /// balance repaid in full
    Completed,
    /// seriously delinquent, flagged through the lifecycle api
    Defaulted,
    /// withdrawn application, restorable
    Cancelled,
}

impl LoanStatus {
    pub fn name(&self) -> &'static str {
        match self {
            LoanStatus::Application => "application",
            LoanStatus::Approved => "approved",
            LoanStatus::Active => "active",
            LoanStatus::Completed => "completed",
            LoanStatus::Defaulted => "defaulted",
            LoanStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// collection sheet status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SheetStatus {
    /// owned and editable by the originating officer
    Draft,
    /// handed off for approval, items read-only
    Submitted,
    /// cleared for posting
    Approved,
    /// converted into payment records
    Posted,
}

impl SheetStatus {
    pub fn name(&self) -> &'static str {
        match self {
            SheetStatus::Draft => "draft",
            SheetStatus::Submitted => "submitted",
            SheetStatus::Approved => "approved",
            SheetStatus::Posted => "posted",
        }
    }
}

impl fmt::Display for SheetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// collection item status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemStatus {
    /// awaiting posting
    Pending,
    /// converted into a payment record
    Posted,
    /// struck from the sheet, excluded from totals and posting
    Voided,
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Posted => "posted",
            ItemStatus::Voided => "voided",
        };
        write!(f, "{}", s)
    }
}
