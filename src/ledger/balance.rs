//! Point-in-time balance calculation
//!
//! Balances are derived, never persisted: callers pick a status date and a
//! sequence bound and the engine recomputes every as-of figure from the
//! attached transaction lines and snapshots. The sequence bound makes the
//! result reproducible as "immediately after line N was posted" even when
//! later lines share the same date.

use std::cmp::Ordering;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{Datelike, NaiveDate};

use crate::ledger::account::{Account, BudgetAccount};
use crate::ledger::core::{Ledger, LedgerEntry};
use crate::ledger::transaction::TransactionLine;

/// Sequence bound meaning "every line", used by the date-only entry
/// points.
pub const SEQUENCE_UNBOUNDED: i32 = i32::MAX;

fn zero() -> BigDecimal {
    BigDecimal::from(0)
}

/// A line counts toward a balance when its sequence and date both fall
/// within the bounds; the two conditions filter independently.
fn in_scope(line: &TransactionLine, as_of: NaiveDate, as_of_sequence: i32) -> bool {
    line.sequence() <= as_of_sequence && line.date() <= as_of
}

fn month_of(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}

fn sum_net<'a>(lines: impl Iterator<Item = &'a Arc<TransactionLine>>) -> BigDecimal {
    lines.map(|line| line.net()).sum()
}

/// Available budget: meaningful only when planned or posted is negative
/// (an expense month); otherwise zero.
fn budget_available(budget: &BigDecimal, posted: &BigDecimal) -> BigDecimal {
    if *budget < zero() || *posted < zero() {
        let remaining = budget.abs() - posted.abs();
        if remaining > zero() {
            remaining
        } else {
            zero()
        }
    } else {
        zero()
    }
}

impl Account {
    /// Derive `credit_as_of`, `balance_as_of`, and `available_as_of` at
    /// `as_of`, counting only lines with a sequence number up to
    /// `as_of_sequence`. No matching snapshot and no lines are both the
    /// zero case, not errors.
    pub fn calculate(&mut self, as_of: NaiveDate, as_of_sequence: i32) {
        let credit = self
            .credit_snapshots
            .iter()
            .find(|snapshot| snapshot.matches(as_of))
            .map(|snapshot| snapshot.credit().clone())
            .unwrap_or_else(zero);

        let balance = sum_net(
            self.base
                .lines
                .iter()
                .filter(|line| in_scope(line, as_of, as_of_sequence)),
        );

        if let Some(snapshot) = self
            .credit_snapshots
            .iter_mut()
            .find(|snapshot| snapshot.matches(as_of))
        {
            snapshot.set_balance_as_of(balance.clone());
        }

        self.available_as_of = &credit + &balance;
        self.credit_as_of = credit;
        self.balance_as_of = balance;
    }

    /// Calculate with no sequence bound.
    pub fn calculate_at(&mut self, as_of: NaiveDate) {
        self.calculate(as_of, SEQUENCE_UNBOUNDED);
    }
}

impl BudgetAccount {
    /// Derive `budget_as_of`, `posted_as_of`, and `available_as_of` at
    /// `as_of`, refreshing every snapshot's posted-to-date figure on the
    /// way: future months carry no postings yet, the matching month is cut
    /// off at `as_of` and `as_of_sequence`, and earlier months count in
    /// full.
    pub fn calculate(&mut self, as_of: NaiveDate, as_of_sequence: i32) {
        let as_of_month = month_of(as_of);
        let lines = &self.base.lines;

        for snapshot in &mut self.budget_snapshots {
            let snapshot_month = (snapshot.year(), snapshot.month());
            let posted = match snapshot_month.cmp(&as_of_month) {
                Ordering::Greater => zero(),
                Ordering::Equal => sum_net(
                    lines
                        .iter()
                        .filter(|line| month_of(line.date()) == snapshot_month)
                        .filter(|line| in_scope(line, as_of, as_of_sequence)),
                ),
                Ordering::Less => sum_net(
                    lines
                        .iter()
                        .filter(|line| month_of(line.date()) == snapshot_month),
                ),
            };
            snapshot.set_posted_as_of(posted);
        }

        match self
            .budget_snapshots
            .iter()
            .find(|snapshot| snapshot.matches(as_of))
        {
            Some(snapshot) => {
                self.budget_as_of = snapshot.budget();
                self.posted_as_of = snapshot.posted_as_of().clone();
            }
            None => {
                self.budget_as_of = zero();
                self.posted_as_of = sum_net(
                    self.base
                        .lines
                        .iter()
                        .filter(|line| month_of(line.date()) == as_of_month)
                        .filter(|line| in_scope(line, as_of, as_of_sequence)),
                );
            }
        }

        self.available_as_of = budget_available(&self.budget_as_of, &self.posted_as_of);
    }

    /// Calculate with no sequence bound.
    pub fn calculate_at(&mut self, as_of: NaiveDate) {
        self.calculate(as_of, SEQUENCE_UNBOUNDED);
    }
}

impl Ledger {
    /// Run the balance calculation over every entry, in account number
    /// order.
    pub fn calculate(&mut self, as_of: NaiveDate, as_of_sequence: i32) {
        for entry in self.entries_mut() {
            match entry {
                LedgerEntry::Account(account) => account.calculate(as_of, as_of_sequence),
                LedgerEntry::Budget(budget) => budget.calculate(as_of, as_of_sequence),
            }
        }
    }

    /// Calculate with no sequence bound.
    pub fn calculate_at(&mut self, as_of: NaiveDate) {
        self.calculate(as_of, SEQUENCE_UNBOUNDED);
    }
}
