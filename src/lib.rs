pub mod decimal;
pub mod errors;
pub mod events;
pub mod loan;
pub mod policy;
pub mod posting;
pub mod schedule;
pub mod sheet;
pub mod store;
pub mod types;

// re-export key types
pub use decimal::{Money, Rate};
pub use errors::{CoreError, Result};
pub use events::{Event, EventStore};
pub use loan::Loan;
pub use policy::{EligibilityPolicy, InsuranceTier, LoanPolicy};
pub use posting::{Payment, PostingPipeline, PostingReceipt};
pub use schedule::{AmortizationCalculator, LoanQuote, ScheduleEntry};
pub use sheet::{CollectionItem, CollectionSheet};
pub use store::{MemoryStore, StoreError};
pub use types::{
    ActorId, ClientId, ItemId, ItemStatus, LoanId, LoanStatus, PaymentId, SheetId, SheetStatus,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
