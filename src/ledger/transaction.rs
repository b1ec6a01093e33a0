//! Transaction lines and their lazily resolved cross-domain references

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::traits::AddressResolver;
use crate::types::{RepositoryError, RepositoryResult};

/// Cross-domain address record, owned by the address book module and
/// consumed here by opaque number only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub number: i32,
    pub name: String,
}

/// A transaction line's back-reference into the address book.
///
/// The target is resolved through an [`AddressResolver`] on first access
/// and cached for the lifetime of the line; until then only the opaque
/// number is held. A number that resolves to nothing stays `None` - an
/// address reference is optional on a line.
#[derive(Debug)]
pub struct LazyAddress {
    number: i32,
    resolved: OnceCell<Option<Address>>,
}

impl LazyAddress {
    pub fn new(number: i32) -> Self {
        Self {
            number,
            resolved: OnceCell::new(),
        }
    }

    pub fn number(&self) -> i32 {
        self.number
    }

    /// Resolve the address, looking it up at most once.
    pub fn resolve(
        &self,
        resolver: &dyn AddressResolver,
    ) -> RepositoryResult<Option<&Address>> {
        self.resolved
            .get_or_try_init(|| resolver.address(self.number))
            .map(Option::as_ref)
    }
}

/// An immutable posted entry: sequence number, date, voucher, text, and a
/// debit/credit amount pair. The sequence number is assigned monotonically
/// by the legacy store and is the tie-break between lines posted on the
/// same date.
#[derive(Debug)]
pub struct TransactionLine {
    sequence: i32,
    date: NaiveDate,
    voucher: Option<String>,
    text: String,
    debit: BigDecimal,
    credit: BigDecimal,
    account_number: String,
    budget_account_number: Option<String>,
    address: Option<LazyAddress>,
}

impl TransactionLine {
    /// Create a line owned by `account_number`. Debit and credit must both
    /// be non-negative; the net amount is their signed difference.
    pub fn new(
        sequence: i32,
        date: NaiveDate,
        account_number: impl Into<String>,
        text: impl Into<String>,
        debit: BigDecimal,
        credit: BigDecimal,
    ) -> RepositoryResult<Self> {
        let zero = BigDecimal::from(0);
        if debit < zero {
            return Err(RepositoryError::Decode {
                field: "Debit".to_string(),
                detail: format!("amount must be non-negative, got {debit}"),
            });
        }
        if credit < zero {
            return Err(RepositoryError::Decode {
                field: "Credit".to_string(),
                detail: format!("amount must be non-negative, got {credit}"),
            });
        }
        Ok(Self {
            sequence,
            date,
            voucher: None,
            text: text.into(),
            debit,
            credit,
            account_number: account_number.into().to_uppercase(),
            budget_account_number: None,
            address: None,
        })
    }

    pub fn with_voucher(mut self, voucher: impl Into<String>) -> Self {
        self.voucher = Some(voucher.into());
        self
    }

    pub fn with_budget_account(mut self, number: impl Into<String>) -> Self {
        self.budget_account_number = Some(number.into().to_uppercase());
        self
    }

    pub fn with_address(mut self, address: LazyAddress) -> Self {
        self.address = Some(address);
        self
    }

    pub fn sequence(&self) -> i32 {
        self.sequence
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn voucher(&self) -> Option<&str> {
        self.voucher.as_deref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn debit(&self) -> &BigDecimal {
        &self.debit
    }

    pub fn credit(&self) -> &BigDecimal {
        &self.credit
    }

    /// Signed amount: debit minus credit.
    pub fn net(&self) -> BigDecimal {
        &self.debit - &self.credit
    }

    /// Owning account, as a number lookup rather than a pointer.
    pub fn account_number(&self) -> &str {
        &self.account_number
    }

    pub fn budget_account_number(&self) -> Option<&str> {
        self.budget_account_number.as_deref()
    }

    pub fn address(&self) -> Option<&LazyAddress> {
        self.address.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingResolver {
        addresses: HashMap<i32, Address>,
        lookups: AtomicUsize,
    }

    impl AddressResolver for CountingResolver {
        fn address(&self, number: i32) -> RepositoryResult<Option<Address>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.addresses.get(&number).cloned())
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn net_is_debit_minus_credit() {
        let line = TransactionLine::new(
            1,
            date(2011, 3, 1),
            "1000",
            "Opening",
            BigDecimal::from(1000),
            BigDecimal::from(200),
        )
        .unwrap();
        assert_eq!(line.net(), BigDecimal::from(800));
    }

    #[test]
    fn negative_amounts_are_rejected() {
        let result = TransactionLine::new(
            1,
            date(2011, 3, 1),
            "1000",
            "Bad",
            BigDecimal::from(-1),
            BigDecimal::from(0),
        );
        assert!(matches!(result, Err(RepositoryError::Decode { .. })));
    }

    #[test]
    fn account_references_are_uppercased() {
        let line = TransactionLine::new(
            1,
            date(2011, 3, 1),
            "cash",
            "x",
            BigDecimal::from(1),
            BigDecimal::from(0),
        )
        .unwrap()
        .with_budget_account("food");
        assert_eq!(line.account_number(), "CASH");
        assert_eq!(line.budget_account_number(), Some("FOOD"));
    }

    #[test]
    fn lazy_address_resolves_once() {
        let resolver = CountingResolver {
            addresses: HashMap::from([(
                7,
                Address {
                    number: 7,
                    name: "Main Street Grocer".to_string(),
                },
            )]),
            lookups: AtomicUsize::new(0),
        };
        let lazy = LazyAddress::new(7);

        let first = lazy.resolve(&resolver).unwrap().cloned();
        let second = lazy.resolve(&resolver).unwrap().cloned();
        assert_eq!(first, second);
        assert_eq!(first.unwrap().name, "Main Street Grocer");
        assert_eq!(resolver.lookups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lazy_address_missing_target_stays_none() {
        let resolver = CountingResolver {
            addresses: HashMap::new(),
            lookups: AtomicUsize::new(0),
        };
        let lazy = LazyAddress::new(99);
        assert!(lazy.resolve(&resolver).unwrap().is_none());
        assert!(lazy.resolve(&resolver).unwrap().is_none());
        assert_eq!(resolver.lookups.load(Ordering::SeqCst), 1);
    }
}
