use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::Result;
use crate::policy::LoanPolicy;

/// scheduled installment in a repayment schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub week: u32,
    pub due_date: NaiveDate,
    pub expected_payment: Money,
    pub principal_payment: Money,
    pub interest_payment: Money,
    pub insurance_payment: Money,
    pub running_balance: Money,
}

/// computed loan terms, frozen onto a loan when the application is opened
///
/// a quote is a preview: generating one has no side effects and it can be
/// recomputed freely until an application commits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanQuote {
    pub principal: Money,
    pub term_weeks: u32,
    pub monthly_rate: Rate,
    pub flat_interest_months: u32,
    pub total_interest: Money,
    pub insurance_fee: Money,
    pub total_loan_amount: Money,
    pub weekly_payment: Money,
}

impl LoanQuote {
    /// generate the dated schedule with due dates anchored at `anchor`
    ///
    /// the final week absorbs all rounding remainders: each column sums to
    /// its loan-level total and the running balance lands exactly on zero.
    pub fn schedule_from(&self, anchor: NaiveDate) -> Vec<ScheduleEntry> {
        let (weekly_principal, last_principal) = self.principal.split_even(self.term_weeks);
        let (weekly_interest, last_interest) = self.total_interest.split_even(self.term_weeks);
        let (weekly_expected, last_expected) = self.total_loan_amount.split_even(self.term_weeks);

        let mut entries = Vec::with_capacity(self.term_weeks as usize);
        let mut balance = self.total_loan_amount;

        for week in 1..=self.term_weeks {
            let is_last = week == self.term_weeks;

            let expected = if is_last { last_expected } else { weekly_expected };
            let principal = if is_last { last_principal } else { weekly_principal };
            let interest = if is_last { last_interest } else { weekly_interest };
            // insurance takes the row remainder so every row sums to its
            // expected payment while each column still sums to its total
            let insurance = expected - principal - interest;

            balance -= expected;

            entries.push(ScheduleEntry {
                week,
                due_date: anchor + Duration::weeks((week - 1) as i64),
                expected_payment: expected,
                principal_payment: principal,
                interest_payment: interest,
                insurance_payment: insurance,
                running_balance: balance,
            });
        }

        entries
    }
}

/// amortization calculator
///
/// pure function from (principal, term) to frozen loan terms. interest is a
/// flat fee over the policy's fixed month-equivalent window, not a
/// declining-balance accrual.
#[derive(Debug, Clone)]
pub struct AmortizationCalculator {
    policy: LoanPolicy,
}

impl AmortizationCalculator {
    pub fn new(policy: LoanPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &LoanPolicy {
        &self.policy
    }

    /// compute frozen terms for a principal/term pair
    pub fn quote(&self, principal: Money, term_weeks: u32) -> Result<LoanQuote> {
        self.policy.validate_terms(principal, term_weeks)?;

        let total_interest = principal
            * self.policy.monthly_interest_rate.as_decimal()
            * Decimal::from(self.policy.flat_interest_months);
        let insurance_fee = self.policy.insurance_fee(term_weeks);
        let total_loan_amount = principal + total_interest + insurance_fee;
        let (weekly_payment, _) = total_loan_amount.split_even(term_weeks);

        Ok(LoanQuote {
            principal,
            term_weeks,
            monthly_rate: self.policy.monthly_interest_rate,
            flat_interest_months: self.policy.flat_interest_months,
            total_interest,
            insurance_fee,
            total_loan_amount,
            weekly_payment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CoreError;

    fn calculator() -> AmortizationCalculator {
        AmortizationCalculator::new(LoanPolicy::default())
    }

    fn anchor() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    #[test]
    fn test_standard_quote() {
        // principal 10000 over 17 weeks: 5%/month over the 4-month window
        let quote = calculator().quote(Money::from_major(10_000), 17).unwrap();

        assert_eq!(quote.total_interest, Money::from_major(2_000));
        assert_eq!(quote.insurance_fee, Money::from_major(100));
        assert_eq!(quote.total_loan_amount, Money::from_major(12_100));
        assert_eq!(quote.weekly_payment, Money::from_str_exact("711.76").unwrap());
    }

    #[test]
    fn test_flat_interest_ignores_term() {
        let calc = calculator();
        let short = calc.quote(Money::from_major(10_000), 17).unwrap();
        let long = calc.quote(Money::from_major(10_000), 52).unwrap();

        // flat-fee rule: same principal accrues the same interest
        // regardless of term length
        assert_eq!(short.total_interest, long.total_interest);
        assert_ne!(short.insurance_fee, long.insurance_fee);
    }

    #[test]
    fn test_out_of_policy_terms() {
        let calc = calculator();

        assert!(matches!(
            calc.quote(Money::from_major(10_000), 3),
            Err(CoreError::InvalidLoanTerms { .. })
        ));
        assert!(matches!(
            calc.quote(Money::from_major(10_000), 60),
            Err(CoreError::InvalidLoanTerms { .. })
        ));
        assert!(matches!(
            calc.quote(Money::ZERO, 17),
            Err(CoreError::InvalidLoanTerms { .. })
        ));
    }

    #[test]
    fn test_schedule_length_and_dates() {
        let quote = calculator().quote(Money::from_major(10_000), 17).unwrap();
        let schedule = quote.schedule_from(anchor());

        assert_eq!(schedule.len(), 17);
        assert_eq!(schedule[0].week, 1);
        assert_eq!(schedule[0].due_date, anchor());
        assert_eq!(schedule[1].due_date, anchor() + Duration::weeks(1));
        assert_eq!(schedule[16].due_date, anchor() + Duration::weeks(16));
    }

    #[test]
    fn test_schedule_sums_exactly() {
        let calc = calculator();

        // include pairs with awkward division remainders
        let cases = [
            (Money::from_major(10_000), 17),
            (Money::from_major(5_000), 13),
            (Money::from_str_exact("9999.99").unwrap(), 23),
            (Money::from_major(1), 4),
            (Money::from_major(77_777), 52),
        ];

        for (principal, term) in cases {
            let quote = calc.quote(principal, term).unwrap();
            let schedule = quote.schedule_from(anchor());

            let expected: Money = schedule.iter().map(|e| e.expected_payment).sum();
            let principal_sum: Money = schedule.iter().map(|e| e.principal_payment).sum();
            let interest_sum: Money = schedule.iter().map(|e| e.interest_payment).sum();
            let insurance_sum: Money = schedule.iter().map(|e| e.insurance_payment).sum();

            assert_eq!(expected, quote.total_loan_amount, "term {}", term);
            assert_eq!(principal_sum, quote.principal);
            assert_eq!(interest_sum, quote.total_interest);
            assert_eq!(insurance_sum, quote.insurance_fee);
            assert_eq!(schedule.last().unwrap().running_balance, Money::ZERO);
        }
    }

    #[test]
    fn test_running_balance_monotone() {
        let quote = calculator().quote(Money::from_major(12_345), 29).unwrap();
        let schedule = quote.schedule_from(anchor());

        let mut previous = quote.total_loan_amount;
        for entry in &schedule {
            assert!(entry.running_balance < previous);
            previous = entry.running_balance;
        }
        assert_eq!(previous, Money::ZERO);
    }

    #[test]
    fn test_rows_sum_internally() {
        let quote = calculator().quote(Money::from_major(10_000), 17).unwrap();
        for entry in quote.schedule_from(anchor()) {
            assert_eq!(
                entry.principal_payment + entry.interest_payment + entry.insurance_payment,
                entry.expected_payment
            );
        }
    }

    #[test]
    fn test_last_week_absorbs_remainder() {
        let quote = calculator().quote(Money::from_major(10_000), 17).unwrap();
        let schedule = quote.schedule_from(anchor());

        for entry in &schedule[..16] {
            assert_eq!(entry.expected_payment, quote.weekly_payment);
        }
        assert_eq!(
            schedule[16].expected_payment,
            Money::from_str_exact("711.84").unwrap()
        );
    }

    #[test]
    fn test_quote_is_repeatable() {
        let calc = calculator();
        let a = calc.quote(Money::from_major(10_000), 17).unwrap();
        let b = calc.quote(Money::from_major(10_000), 17).unwrap();
        assert_eq!(a, b);
    }
}
