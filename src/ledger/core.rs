//! The ledger aggregate: a numbered book owning its accounts

use serde::{Deserialize, Serialize};

use crate::ledger::account::{Account, BudgetAccount};

/// Display letterhead attached to a ledger, supplied by the letterhead
/// collaborator and cached as reference data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Letterhead {
    pub number: i32,
    pub name: String,
    pub lines: Vec<String>,
}

/// One entry in a ledger's mixed, account-number-ordered collection.
#[derive(Debug)]
pub enum LedgerEntry {
    Account(Account),
    Budget(BudgetAccount),
}

impl LedgerEntry {
    pub fn number(&self) -> &str {
        match self {
            LedgerEntry::Account(account) => account.number(),
            LedgerEntry::Budget(budget) => budget.number(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            LedgerEntry::Account(account) => account.name(),
            LedgerEntry::Budget(budget) => budget.name(),
        }
    }
}

/// A named accounting book identified by number.
///
/// The number is immutable identity; the name is mutable display text.
/// Accounts are owned by the ledger and unique by account number; the
/// bounded key scan delivers them in ascending number order and
/// [`push_entry`](Ledger::push_entry) preserves that order.
#[derive(Debug)]
pub struct Ledger {
    number: i32,
    name: String,
    letterhead: Option<Letterhead>,
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    pub fn new(number: i32, name: impl Into<String>) -> Self {
        Self {
            number,
            name: name.into(),
            letterhead: None,
            entries: Vec::new(),
        }
    }

    pub fn number(&self) -> i32 {
        self.number
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn letterhead(&self) -> Option<&Letterhead> {
        self.letterhead.as_ref()
    }

    pub fn set_letterhead(&mut self, letterhead: Letterhead) {
        self.letterhead = Some(letterhead);
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [LedgerEntry] {
        &mut self.entries
    }

    pub fn push_entry(&mut self, entry: LedgerEntry) {
        debug_assert!(
            self.entries
                .last()
                .map(|last| last.number() < entry.number())
                .unwrap_or(true),
            "entries must arrive in ascending account number order"
        );
        self.entries.push(entry);
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.entries.iter().filter_map(|entry| match entry {
            LedgerEntry::Account(account) => Some(account),
            LedgerEntry::Budget(_) => None,
        })
    }

    pub fn budget_accounts(&self) -> impl Iterator<Item = &BudgetAccount> {
        self.entries.iter().filter_map(|entry| match entry {
            LedgerEntry::Budget(budget) => Some(budget),
            LedgerEntry::Account(_) => None,
        })
    }

    pub fn account(&self, number: &str) -> Option<&Account> {
        let number = number.to_uppercase();
        self.accounts().find(|account| account.number() == number)
    }

    pub fn account_mut(&mut self, number: &str) -> Option<&mut Account> {
        let number = number.to_uppercase();
        self.entries.iter_mut().find_map(|entry| match entry {
            LedgerEntry::Account(account) if account.number() == number => Some(account),
            _ => None,
        })
    }

    pub fn budget_account(&self, number: &str) -> Option<&BudgetAccount> {
        let number = number.to_uppercase();
        self.budget_accounts()
            .find(|budget| budget.number() == number)
    }

    pub fn budget_account_mut(&mut self, number: &str) -> Option<&mut BudgetAccount> {
        let number = number.to_uppercase();
        self.entries.iter_mut().find_map(|entry| match entry {
            LedgerEntry::Budget(budget) if budget.number() == number => Some(budget),
            _ => None,
        })
    }
}
