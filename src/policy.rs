use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{CoreError, Result};
use crate::types::LoanStatus;

/// product policy for loan terms
///
/// interest is a flat fee: the monthly rate applied over a fixed
/// month-equivalent window, independent of the chosen term length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanPolicy {
    pub monthly_interest_rate: Rate,
    pub flat_interest_months: u32,
    pub min_term_weeks: u32,
    pub max_term_weeks: u32,
    pub max_principal: Option<Money>,
    pub insurance_tiers: Vec<InsuranceTier>,
}

/// insurance fee bracket keyed by term length
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsuranceTier {
    pub up_to_weeks: u32,
    pub fee: Money,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            monthly_interest_rate: Rate::from_decimal(dec!(0.05)),
            flat_interest_months: 4,
            min_term_weeks: 4,
            max_term_weeks: 52,
            max_principal: None,
            insurance_tiers: vec![
                InsuranceTier { up_to_weeks: 17, fee: Money::from_major(100) },
                InsuranceTier { up_to_weeks: 34, fee: Money::from_major(200) },
                InsuranceTier { up_to_weeks: 52, fee: Money::from_major(300) },
            ],
        }
    }
}

impl LoanPolicy {
    /// check principal and term against policy bounds
    pub fn validate_terms(&self, principal: Money, term_weeks: u32) -> Result<()> {
        if !principal.is_positive() {
            return Err(CoreError::InvalidLoanTerms { principal, term_weeks });
        }
        if let Some(cap) = self.max_principal {
            if principal > cap {
                return Err(CoreError::InvalidLoanTerms { principal, term_weeks });
            }
        }
        if term_weeks < self.min_term_weeks || term_weeks > self.max_term_weeks {
            return Err(CoreError::InvalidLoanTerms { principal, term_weeks });
        }
        Ok(())
    }

    /// insurance fee for a term; terms past the last tier pay the top fee
    pub fn insurance_fee(&self, term_weeks: u32) -> Money {
        self.insurance_tiers
            .iter()
            .find(|tier| term_weeks <= tier.up_to_weeks)
            .or_else(|| self.insurance_tiers.last())
            .map(|tier| tier.fee)
            .unwrap_or(Money::ZERO)
    }
}

/// eligibility decision table consumed by the lifecycle and sheet workflows
///
/// rules are plain status lists so products can change them without touching
/// state-machine code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityPolicy {
    /// statuses that count as an outstanding loan and block a new application
    pub blocking_statuses: Vec<LoanStatus>,
    /// statuses a collection item may be drafted against
    pub collectible_on_add: Vec<LoanStatus>,
    /// statuses a posting run may settle against
    pub collectible_on_post: Vec<LoanStatus>,
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self {
            blocking_statuses: vec![
                LoanStatus::Application,
                LoanStatus::Approved,
                LoanStatus::Active,
                LoanStatus::Defaulted,
            ],
            collectible_on_add: vec![LoanStatus::Active],
            // a loan that defaults after sheet approval still owes the money;
            // posting against it must not abort the batch
            collectible_on_post: vec![LoanStatus::Active, LoanStatus::Defaulted],
        }
    }
}

impl EligibilityPolicy {
    /// may this client open a new loan application
    pub fn can_apply(&self, existing: &[LoanStatus]) -> bool {
        !existing.iter().any(|s| self.blocking_statuses.contains(s))
    }

    /// may a collection item be drafted against a loan in this status
    pub fn can_add_item(&self, status: LoanStatus) -> bool {
        self.collectible_on_add.contains(&status)
    }

    /// may a posting run settle a collection item against a loan in this status
    pub fn can_post_item(&self, status: LoanStatus) -> bool {
        self.collectible_on_post.contains(&status)
    }
}
