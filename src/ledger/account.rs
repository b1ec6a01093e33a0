//! Accounts, budget accounts, groups, and monthly snapshots

use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::ledger::transaction::TransactionLine;
use crate::types::AccountCategory;

/// Grouping for posting accounts, tagged with a balance-sheet category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountGroup {
    number: i32,
    name: String,
    category: AccountCategory,
}

impl AccountGroup {
    pub fn new(number: i32, name: impl Into<String>, category: AccountCategory) -> Self {
        Self {
            number,
            name: name.into(),
            category,
        }
    }

    pub fn number(&self) -> i32 {
        self.number
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> AccountCategory {
        self.category
    }
}

/// Grouping for budget accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetAccountGroup {
    number: i32,
    name: String,
}

impl BudgetAccountGroup {
    pub fn new(number: i32, name: impl Into<String>) -> Self {
        Self {
            number,
            name: name.into(),
        }
    }

    pub fn number(&self) -> i32 {
        self.number
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Per-month credit limit, plus the balance the engine derived for that
/// month on the last calculation. The derived value is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditSnapshot {
    year: i32,
    month: u32,
    credit: BigDecimal,
    balance_as_of: BigDecimal,
}

impl CreditSnapshot {
    pub fn new(year: i32, month: u32, credit: BigDecimal) -> Self {
        debug_assert!((1..=12).contains(&month));
        Self {
            year,
            month,
            credit,
            balance_as_of: BigDecimal::from(0),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn credit(&self) -> &BigDecimal {
        &self.credit
    }

    pub fn balance_as_of(&self) -> &BigDecimal {
        &self.balance_as_of
    }

    pub(crate) fn set_balance_as_of(&mut self, balance: BigDecimal) {
        self.balance_as_of = balance;
    }

    pub fn matches(&self, date: NaiveDate) -> bool {
        self.year == date.year() && self.month == date.month()
    }
}

/// Per-month planned income and expense, plus the posted-to-date amount
/// the engine derived for that month on the last calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetSnapshot {
    year: i32,
    month: u32,
    income: BigDecimal,
    expense: BigDecimal,
    posted_as_of: BigDecimal,
}

impl BudgetSnapshot {
    pub fn new(year: i32, month: u32, income: BigDecimal, expense: BigDecimal) -> Self {
        debug_assert!((1..=12).contains(&month));
        Self {
            year,
            month,
            income,
            expense,
            posted_as_of: BigDecimal::from(0),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn income(&self) -> &BigDecimal {
        &self.income
    }

    pub fn expense(&self) -> &BigDecimal {
        &self.expense
    }

    /// Planned figure for the month: income minus expense.
    pub fn budget(&self) -> BigDecimal {
        &self.income - &self.expense
    }

    pub fn posted_as_of(&self) -> &BigDecimal {
        &self.posted_as_of
    }

    pub(crate) fn set_posted_as_of(&mut self, posted: BigDecimal) {
        self.posted_as_of = posted;
    }

    pub fn matches(&self, date: NaiveDate) -> bool {
        self.year == date.year() && self.month == date.month()
    }
}

/// Fields shared by posting and budget accounts: identity within the
/// owning ledger, display texts, and the attached transaction lines.
///
/// The owning ledger is a back-reference by number, never a pointer; the
/// owning direction is always ledger to account. Account numbers and
/// names are normalized to uppercase, matching the legacy store.
#[derive(Debug)]
pub(crate) struct AccountBase {
    pub(crate) ledger_number: i32,
    pub(crate) number: String,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) note: Option<String>,
    pub(crate) lines: Vec<Arc<TransactionLine>>,
}

impl AccountBase {
    fn new(ledger_number: i32, number: &str, name: &str) -> Self {
        Self {
            ledger_number,
            number: number.to_uppercase(),
            name: name.to_uppercase(),
            description: None,
            note: None,
            lines: Vec::new(),
        }
    }
}

macro_rules! delegate_base {
    () => {
        pub fn ledger_number(&self) -> i32 {
            self.base.ledger_number
        }

        /// Account number, immutable and unique within the ledger.
        pub fn number(&self) -> &str {
            &self.base.number
        }

        pub fn name(&self) -> &str {
            &self.base.name
        }

        /// Names are case-normalized to uppercase on write.
        pub fn set_name(&mut self, name: &str) {
            self.base.name = name.to_uppercase();
        }

        pub fn description(&self) -> Option<&str> {
            self.base.description.as_deref()
        }

        pub fn set_description(&mut self, description: impl Into<String>) {
            self.base.description = Some(description.into());
        }

        pub fn note(&self) -> Option<&str> {
            self.base.note.as_deref()
        }

        pub fn set_note(&mut self, note: impl Into<String>) {
            self.base.note = Some(note.into());
        }

        /// Lines in load order: ascending (date, sequence), as delivered
        /// by the bounded key scan.
        pub fn lines(&self) -> &[Arc<TransactionLine>] {
            &self.base.lines
        }

        /// Lines in display order: descending (date, sequence).
        pub fn lines_for_display(&self) -> Vec<&Arc<TransactionLine>> {
            let mut lines: Vec<_> = self.base.lines.iter().collect();
            lines.sort_by(|a, b| {
                b.date()
                    .cmp(&a.date())
                    .then_with(|| b.sequence().cmp(&a.sequence()))
            });
            lines
        }

        pub fn push_line(&mut self, line: Arc<TransactionLine>) {
            self.base.lines.push(line);
        }
    };
}

/// A posting account: group reference, credit snapshots, and the balances
/// derived by the last [`calculate`](Account::calculate) call.
#[derive(Debug)]
pub struct Account {
    pub(crate) base: AccountBase,
    group: Arc<AccountGroup>,
    pub(crate) credit_snapshots: Vec<CreditSnapshot>,
    pub(crate) credit_as_of: BigDecimal,
    pub(crate) balance_as_of: BigDecimal,
    pub(crate) available_as_of: BigDecimal,
}

impl Account {
    pub fn new(ledger_number: i32, number: &str, name: &str, group: Arc<AccountGroup>) -> Self {
        Self {
            base: AccountBase::new(ledger_number, number, name),
            group,
            credit_snapshots: Vec::new(),
            credit_as_of: BigDecimal::from(0),
            balance_as_of: BigDecimal::from(0),
            available_as_of: BigDecimal::from(0),
        }
    }

    delegate_base!();

    pub fn group(&self) -> &Arc<AccountGroup> {
        &self.group
    }

    pub fn credit_snapshots(&self) -> &[CreditSnapshot] {
        &self.credit_snapshots
    }

    pub fn push_credit_snapshot(&mut self, snapshot: CreditSnapshot) {
        self.credit_snapshots.push(snapshot);
    }

    /// Credit limit in force at the last calculated date; zero when no
    /// snapshot covers that month.
    pub fn credit_as_of(&self) -> &BigDecimal {
        &self.credit_as_of
    }

    pub fn balance_as_of(&self) -> &BigDecimal {
        &self.balance_as_of
    }

    /// Credit plus balance, both signed; negative means over-limit.
    pub fn available_as_of(&self) -> &BigDecimal {
        &self.available_as_of
    }
}

/// A budget account: group reference, budget snapshots, and the figures
/// derived by the last [`calculate`](BudgetAccount::calculate) call.
#[derive(Debug)]
pub struct BudgetAccount {
    pub(crate) base: AccountBase,
    group: Arc<BudgetAccountGroup>,
    pub(crate) budget_snapshots: Vec<BudgetSnapshot>,
    pub(crate) budget_as_of: BigDecimal,
    pub(crate) posted_as_of: BigDecimal,
    pub(crate) available_as_of: BigDecimal,
}

impl BudgetAccount {
    pub fn new(
        ledger_number: i32,
        number: &str,
        name: &str,
        group: Arc<BudgetAccountGroup>,
    ) -> Self {
        Self {
            base: AccountBase::new(ledger_number, number, name),
            group,
            budget_snapshots: Vec::new(),
            budget_as_of: BigDecimal::from(0),
            posted_as_of: BigDecimal::from(0),
            available_as_of: BigDecimal::from(0),
        }
    }

    delegate_base!();

    pub fn group(&self) -> &Arc<BudgetAccountGroup> {
        &self.group
    }

    pub fn budget_snapshots(&self) -> &[BudgetSnapshot] {
        &self.budget_snapshots
    }

    pub fn push_budget_snapshot(&mut self, snapshot: BudgetSnapshot) {
        self.budget_snapshots.push(snapshot);
    }

    pub fn budget_as_of(&self) -> &BigDecimal {
        &self.budget_as_of
    }

    pub fn posted_as_of(&self) -> &BigDecimal {
        &self.posted_as_of
    }

    pub fn available_as_of(&self) -> &BigDecimal {
        &self.available_as_of
    }
}
