//! Integration tests for bookkeeping-core

use std::sync::Arc;

use bigdecimal::BigDecimal;
use bookkeeping_core::utils::{
    FixtureBuilder, LineRow, MemoryIsamEngine, StaticAddresses, StaticLetterheads,
};
use bookkeeping_core::{
    Address, CalculationMode, EngineError, LedgerRepository, Letterhead, LoadOptions, Login,
    RepositoryConfig, RepositoryError,
};
use chrono::NaiveDate;
use tempfile::TempDir;

const LETTERHEAD_FILE: &str = "LETTERHD";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn eager(as_of: NaiveDate) -> LoadOptions {
    LoadOptions {
        calculation: CalculationMode::Eager { as_of },
    }
}

struct TestContext {
    repository: LedgerRepository,
    engine: Arc<MemoryIsamEngine>,
    letterheads: Arc<StaticLetterheads>,
    addresses: Arc<StaticAddresses>,
    _data_dir: TempDir,
}

fn context(engine: MemoryIsamEngine) -> TestContext {
    context_with_config(engine, |dir| RepositoryConfig::new(dir, "clerk", "secret"))
}

fn context_with_config(
    engine: MemoryIsamEngine,
    config: impl FnOnce(&std::path::Path) -> RepositoryConfig,
) -> TestContext {
    let data_dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(engine);
    let letterheads = Arc::new(StaticLetterheads::new(
        LETTERHEAD_FILE,
        vec![Letterhead {
            number: 1,
            name: "Household".to_string(),
            lines: vec!["Smith family".to_string(), "1 Main Street".to_string()],
        }],
    ));
    let addresses = Arc::new(StaticAddresses::new(vec![Address {
        number: 7,
        name: "Main Street Grocer".to_string(),
    }]));
    let repository = LedgerRepository::new(
        config(data_dir.path()),
        engine.clone(),
        addresses.clone(),
        letterheads.clone(),
    )
    .unwrap();
    TestContext {
        repository,
        engine,
        letterheads,
        addresses,
        _data_dir: data_dir,
    }
}

/// Ledger 1 with one posting account, one loan account, one budget
/// account, snapshots for March 2011, and three transaction lines.
fn standard_fixture() -> FixtureBuilder {
    FixtureBuilder::new()
        .account_group(1, "Current assets", 1)
        .account_group(2, "Loans", 2)
        .budget_account_group(1, "Household")
        .ledger(1, "Household books", 1)
        .account(1, "1000", "Cash", 1)
        .account(1, "2400", "Car loan", 2)
        .budget_account(1, "8000", "Groceries", 1)
        .account_texts(1, "1000", "Cash in hand", "Counted monthly")
        .credit_snapshot(1, "1000", 2011, 3, 5000)
        .budget_snapshot(1, "8000", 2011, 3, 0, 2000)
        .line(LineRow::new(
            1,
            "1000",
            1,
            date(2011, 3, 1),
            "Opening balance",
            1000,
            0,
        ))
        .line(
            LineRow::new(1, "1000", 2, date(2011, 3, 15), "Groceries", 0, 200)
                .voucher("A-17")
                .budget_account("8000")
                .address(7),
        )
        .line(LineRow::new(
            1,
            "2400",
            3,
            date(2011, 3, 10),
            "Loan repayment",
            0,
            300,
        ))
}

#[test]
fn full_load_with_eager_balances_matches_the_march_2011_scenario() {
    let ctx = context(standard_fixture().build());
    let ledger = ctx
        .repository
        .load_ledger(1, &eager(date(2011, 3, 20)))
        .unwrap();

    assert_eq!(ledger.number(), 1);
    assert_eq!(ledger.name(), "Household books");
    assert_eq!(ledger.letterhead().unwrap().number, 1);

    let cash = ledger.account("1000").unwrap();
    assert_eq!(cash.name(), "CASH");
    assert_eq!(cash.description(), Some("Cash in hand"));
    assert_eq!(cash.note(), Some("Counted monthly"));
    assert_eq!(cash.credit_as_of(), &BigDecimal::from(5000));
    assert_eq!(cash.balance_as_of(), &BigDecimal::from(800));
    assert_eq!(cash.available_as_of(), &BigDecimal::from(5800));

    // Handles and cursors are all back with the engine.
    assert_eq!(ctx.engine.open_database_count(), 0);
    assert_eq!(ctx.engine.open_search_count(), 0);
}

#[test]
fn load_attaches_lines_to_their_own_accounts_only() {
    let ctx = context(standard_fixture().build());
    let ledger = ctx
        .repository
        .load_ledger(1, &LoadOptions::default())
        .unwrap();

    assert_eq!(ledger.entries().len(), 3);

    let cash = ledger.account("1000").unwrap();
    assert_eq!(cash.lines().len(), 2);
    assert!(cash.lines().iter().all(|l| l.account_number() == "1000"));

    let loan = ledger.account("2400").unwrap();
    assert_eq!(loan.lines().len(), 1);
    assert_eq!(loan.lines()[0].text(), "Loan repayment");

    // The budget account carries the one line that posts against it.
    let groceries = ledger.budget_account("8000").unwrap();
    assert_eq!(groceries.lines().len(), 1);
    assert_eq!(groceries.lines()[0].sequence(), 2);
    assert_eq!(groceries.lines()[0].voucher(), Some("A-17"));
}

#[test]
fn budget_figures_follow_the_referenced_lines() {
    let ctx = context(standard_fixture().build());
    let mut ledger = ctx
        .repository
        .load_ledger(1, &LoadOptions::default())
        .unwrap();
    ledger.calculate_at(date(2011, 3, 20));

    let groceries = ledger.budget_account("8000").unwrap();
    assert_eq!(groceries.budget_as_of(), &BigDecimal::from(-2000));
    assert_eq!(groceries.posted_as_of(), &BigDecimal::from(-200));
    assert_eq!(groceries.available_as_of(), &BigDecimal::from(1800));
}

#[test]
fn sequence_bound_reproduces_intra_day_states() {
    let engine = FixtureBuilder::new()
        .account_group(1, "Assets", 1)
        .ledger(1, "Books", 0)
        .account(1, "1000", "Cash", 1)
        .line(LineRow::new(1, "1000", 10, date(2011, 3, 10), "First", 100, 0))
        .line(LineRow::new(1, "1000", 20, date(2011, 3, 10), "Second", 50, 0))
        .build();
    let ctx = context(engine);
    let mut ledger = ctx
        .repository
        .load_ledger(1, &LoadOptions::default())
        .unwrap();

    for (bound, expected) in [(10, 100), (15, 100), (20, 150)] {
        ledger.calculate(date(2011, 3, 10), bound);
        assert_eq!(
            ledger.account("1000").unwrap().balance_as_of(),
            &BigDecimal::from(expected),
            "sequence bound {bound}"
        );
    }
}

#[test]
fn eager_and_deferred_calculation_agree() {
    let as_of = date(2011, 3, 20);
    let eager_ledger = context(standard_fixture().build())
        .repository
        .load_ledger(1, &eager(as_of))
        .unwrap();

    let ctx = context(standard_fixture().build());
    let mut deferred_ledger = ctx
        .repository
        .load_ledger(1, &LoadOptions::default())
        .unwrap();
    // Deferred loads leave derived figures at zero until the caller asks.
    assert_eq!(
        deferred_ledger.account("1000").unwrap().balance_as_of(),
        &BigDecimal::from(0)
    );
    deferred_ledger.calculate_at(as_of);

    for entry in eager_ledger.entries() {
        let number = entry.number();
        match entry {
            bookkeeping_core::LedgerEntry::Account(account) => {
                let other = deferred_ledger.account(number).unwrap();
                assert_eq!(account.balance_as_of(), other.balance_as_of());
                assert_eq!(account.credit_as_of(), other.credit_as_of());
                assert_eq!(account.available_as_of(), other.available_as_of());
            }
            bookkeeping_core::LedgerEntry::Budget(budget) => {
                let other = deferred_ledger.budget_account(number).unwrap();
                assert_eq!(budget.budget_as_of(), other.budget_as_of());
                assert_eq!(budget.posted_as_of(), other.posted_as_of());
                assert_eq!(budget.available_as_of(), other.available_as_of());
            }
        }
    }
}

#[test]
fn unresolved_account_group_aborts_the_load() {
    let engine = FixtureBuilder::new()
        .account_group(1, "Assets", 1)
        .ledger(1, "Books", 0)
        .account(1, "1000", "Cash", 99)
        .build();
    let ctx = context(engine);

    let err = ctx
        .repository
        .load_ledger(1, &LoadOptions::default())
        .unwrap_err();
    match err {
        RepositoryError::UnresolvedReference { entity, id, .. } => {
            assert_eq!(entity, "account group");
            assert_eq!(id, "99");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(ctx.engine.open_database_count(), 0);
    assert_eq!(ctx.engine.open_search_count(), 0);
}

#[test]
fn unresolved_budget_reference_aborts_the_load() {
    let engine = FixtureBuilder::new()
        .account_group(1, "Assets", 1)
        .ledger(1, "Books", 0)
        .account(1, "1000", "Cash", 1)
        .line(
            LineRow::new(1, "1000", 1, date(2011, 3, 1), "Stray", 0, 100)
                .budget_account("9999"),
        )
        .build();
    let ctx = context(engine);

    let err = ctx
        .repository
        .load_ledger(1, &LoadOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        RepositoryError::UnresolvedReference {
            entity: "budget account",
            ..
        }
    ));
    assert_eq!(ctx.engine.open_database_count(), 0);
    assert_eq!(ctx.engine.open_search_count(), 0);
}

#[test]
fn unknown_account_kind_code_aborts_the_load() {
    let engine = FixtureBuilder::new()
        .account_group(1, "Assets", 1)
        .ledger(1, "Books", 0)
        .account_row(1, "1000", "Cash", 9, 1)
        .build();
    let ctx = context(engine);

    let err = ctx
        .repository
        .load_ledger(1, &LoadOptions::default())
        .unwrap_err();
    assert!(matches!(err, RepositoryError::UnhandledCode { code: 9, .. }));
    assert_eq!(ctx.engine.open_database_count(), 0);
    assert_eq!(ctx.engine.open_search_count(), 0);
}

#[test]
fn unknown_group_category_code_aborts_the_load() {
    let engine = FixtureBuilder::new()
        .account_group(1, "Mystery", 3)
        .ledger(1, "Books", 0)
        .build();
    let ctx = context(engine);

    let err = ctx
        .repository
        .load_ledger(1, &LoadOptions::default())
        .unwrap_err();
    assert!(matches!(err, RepositoryError::UnhandledCode { code: 3, .. }));
}

#[test]
fn missing_line_date_aborts_the_load() {
    let engine = FixtureBuilder::new()
        .account_group(1, "Assets", 1)
        .ledger(1, "Books", 0)
        .account(1, "1000", "Cash", 1)
        .line(LineRow::undated(1, "1000", 1, "No date", 100, 0))
        .build();
    let ctx = context(engine);

    let err = ctx
        .repository
        .load_ledger(1, &LoadOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        RepositoryError::MissingField { field: "Date", .. }
    ));
    assert_eq!(ctx.engine.open_database_count(), 0);
    assert_eq!(ctx.engine.open_search_count(), 0);
}

#[test]
fn missing_ledger_is_an_unresolved_reference() {
    let ctx = context(standard_fixture().build());
    let err = ctx
        .repository
        .load_ledger(42, &LoadOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        RepositoryError::UnresolvedReference {
            entity: "ledger",
            ..
        }
    ));
}

#[test]
fn unresolved_letterhead_aborts_the_load() {
    let engine = FixtureBuilder::new().ledger(1, "Books", 5).build();
    let ctx = context(engine);
    let err = ctx
        .repository
        .load_ledger(1, &LoadOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        RepositoryError::UnresolvedReference {
            entity: "letterhead",
            ..
        }
    ));
}

#[test]
fn ledger_listing_returns_headers_without_accounts() {
    let engine = standard_fixture().ledger(2, "Second set", 0).build();
    let ctx = context(engine);

    let ledgers = ctx.repository.ledgers().unwrap();
    assert_eq!(ledgers.len(), 2);
    assert_eq!(ledgers[0].number(), 1);
    assert!(ledgers[0].letterhead().is_some());
    assert_eq!(ledgers[1].number(), 2);
    assert!(ledgers[1].letterhead().is_none());
    assert!(ledgers.iter().all(|l| l.entries().is_empty()));
}

#[test]
fn reference_caches_serve_repeat_reads() {
    let ctx = context(standard_fixture().build());

    let first = ctx.repository.account_groups().unwrap();
    let second = ctx.repository.account_groups().unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    ctx.repository.letterheads().unwrap();
    ctx.repository.letterheads().unwrap();
    assert_eq!(ctx.letterheads.load_count(), 1);
}

#[test]
fn cache_invalidation_is_scoped_by_file_name() {
    let ctx = context(standard_fixture().build());
    ctx.repository.letterheads().unwrap();
    ctx.repository.account_groups().unwrap();

    // A change in the master file leaves the letterhead cache alone.
    ctx.repository.on_store_changed("FINMAST");
    ctx.repository.letterheads().unwrap();
    assert_eq!(ctx.letterheads.load_count(), 1);

    ctx.repository.on_store_changed(LETTERHEAD_FILE);
    ctx.repository.letterheads().unwrap();
    assert_eq!(ctx.letterheads.load_count(), 2);

    // Unrelated names clear nothing.
    ctx.repository.on_store_changed("ADDRBOOK");
    ctx.repository.letterheads().unwrap();
    assert_eq!(ctx.letterheads.load_count(), 2);
}

#[test]
fn group_rename_writes_through_and_invalidates_the_cache() {
    let ctx = context(standard_fixture().build());

    let before = ctx.repository.account_groups().unwrap();
    assert_eq!(before[0].name(), "Current assets");

    ctx.repository
        .rename_account_group(1, "Liquid assets")
        .unwrap();

    let after = ctx.repository.account_groups().unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(after[0].name(), "Liquid assets");
    assert_eq!(ctx.engine.open_database_count(), 0);
    assert_eq!(ctx.engine.open_search_count(), 0);
}

#[test]
fn renaming_a_missing_group_fails() {
    let ctx = context(standard_fixture().build());
    let err = ctx
        .repository
        .rename_account_group(77, "Ghost")
        .unwrap_err();
    assert!(matches!(
        err,
        RepositoryError::UnresolvedReference {
            entity: "account group",
            ..
        }
    ));
    assert_eq!(ctx.engine.open_database_count(), 0);
    assert_eq!(ctx.engine.open_search_count(), 0);
}

#[test]
fn line_addresses_resolve_lazily_through_the_repository() {
    let ctx = context(standard_fixture().build());
    let ledger = ctx
        .repository
        .load_ledger(1, &LoadOptions::default())
        .unwrap();

    // Nothing resolved during the load.
    assert_eq!(ctx.addresses.lookup_count(), 0);

    let cash = ledger.account("1000").unwrap();
    let with_address = &cash.lines()[1];
    let resolved = ctx.repository.resolve_address(with_address).unwrap();
    assert_eq!(resolved.unwrap().name, "Main Street Grocer");

    ctx.repository.resolve_address(with_address).unwrap();
    assert_eq!(ctx.addresses.lookup_count(), 1);

    let without_address = &cash.lines()[0];
    assert!(ctx
        .repository
        .resolve_address(without_address)
        .unwrap()
        .is_none());
}

#[test]
fn rejected_login_surfaces_as_an_engine_error() {
    let engine = standard_fixture()
        .expect_login(Login {
            username: "clerk".to_string(),
            password: "secret".to_string(),
        })
        .build();
    let ctx = context_with_config(engine, |dir| {
        RepositoryConfig::new(dir, "clerk", "wrong")
    });

    let err = ctx
        .repository
        .load_ledger(1, &LoadOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        RepositoryError::Engine(EngineError::LoginRejected(_))
    ));
}

#[test]
fn invalid_configuration_fails_before_any_load() {
    let engine = Arc::new(standard_fixture().build());
    let letterheads = Arc::new(StaticLetterheads::new(LETTERHEAD_FILE, Vec::new()));
    let addresses = Arc::new(StaticAddresses::new(Vec::new()));

    let missing_dir = RepositoryConfig::new("/definitely/not/here", "clerk", "secret");
    let err = LedgerRepository::new(missing_dir, engine, addresses, letterheads).unwrap_err();
    assert!(matches!(err, RepositoryError::Configuration(_)));
}

#[test]
fn display_order_is_newest_first() {
    let ctx = context(standard_fixture().build());
    let ledger = ctx
        .repository
        .load_ledger(1, &LoadOptions::default())
        .unwrap();

    let cash = ledger.account("1000").unwrap();
    let display: Vec<_> = cash
        .lines_for_display()
        .iter()
        .map(|l| l.sequence())
        .collect();
    assert_eq!(display, vec![2, 1]);

    // Load order stays ascending for the balance engine.
    let load_order: Vec<_> = cash.lines().iter().map(|l| l.sequence()).collect();
    assert_eq!(load_order, vec![1, 2]);
}
