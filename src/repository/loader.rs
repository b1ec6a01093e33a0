//! Cascading ledger loads over the legacy store
//!
//! Every scan is bounded by an exact composite-key prefix interval, so I/O
//! stays proportional to the requested ledger rather than the whole file,
//! and rows arrive in ascending key order. Loads either return a fully
//! populated graph or fail with the first fatal error; cursors and file
//! handles are released on every path before the result surfaces.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::cache::ReferenceCache;
use crate::config::RepositoryConfig;
use crate::engine::{Database, FieldRef, RowReader, RowWriter};
use crate::keys::KeyBuilder;
use crate::ledger::{
    Account, AccountGroup, Address, BudgetAccount, BudgetAccountGroup, BudgetSnapshot,
    CreditSnapshot, LazyAddress, Ledger, LedgerEntry, Letterhead, TransactionLine,
};
use crate::repository::tables::*;
use crate::traits::{AddressResolver, IsamEngine, LetterheadProvider};
use crate::types::{AccountKind, RepositoryError, RepositoryResult};

/// Whether a load runs the balance engine before returning.
///
/// The choice is an explicit per-call option, never ambient state; both
/// modes produce identical figures once `calculate` has run.
#[derive(Debug, Clone, Copy, Default)]
pub enum CalculationMode {
    /// Derived fields stay zero until the caller calculates.
    #[default]
    Deferred,
    /// The loader calculates at `as_of` (no sequence bound) before
    /// returning.
    Eager { as_of: NaiveDate },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    pub calculation: CalculationMode,
}

struct MasterFields {
    table: FieldRef,
    ledger: FieldRef,
    number: FieldRef,
    account: FieldRef,
    kind: FieldRef,
    name: FieldRef,
    category: FieldRef,
    group: FieldRef,
    description: FieldRef,
    note: FieldRef,
    letterhead: FieldRef,
}

impl MasterFields {
    fn resolve(db: &Database<'_>) -> RepositoryResult<Self> {
        Ok(Self {
            table: FieldRef::resolve(db, F_TABLE)?,
            ledger: FieldRef::resolve(db, F_LEDGER)?,
            number: FieldRef::resolve(db, F_NUMBER)?,
            account: FieldRef::resolve(db, F_ACCOUNT)?,
            kind: FieldRef::resolve(db, F_KIND)?,
            name: FieldRef::resolve(db, F_NAME)?,
            category: FieldRef::resolve(db, F_CATEGORY)?,
            group: FieldRef::resolve(db, F_GROUP)?,
            description: FieldRef::resolve(db, F_DESCRIPTION)?,
            note: FieldRef::resolve(db, F_NOTE)?,
            letterhead: FieldRef::resolve(db, F_LETTERHEAD)?,
        })
    }

    fn table_prefix(&self, table_id: i32) -> String {
        KeyBuilder::new()
            .append_numeric(i64::from(table_id), self.table.length())
            .build()
    }

    fn numbered_prefix(&self, table_id: i32, number: i32) -> String {
        KeyBuilder::new()
            .append_numeric(i64::from(table_id), self.table.length())
            .append_numeric(i64::from(number), self.number.length())
            .build()
    }

    fn ledger_prefix(&self, table_id: i32, ledger: i32) -> String {
        KeyBuilder::new()
            .append_numeric(i64::from(table_id), self.table.length())
            .append_numeric(i64::from(ledger), self.ledger.length())
            .build()
    }
}

struct DetailFields {
    table: FieldRef,
    ledger: FieldRef,
    account: FieldRef,
    year: FieldRef,
    month: FieldRef,
    credit_limit: FieldRef,
    income: FieldRef,
    expense: FieldRef,
    date: FieldRef,
    seq: FieldRef,
    voucher: FieldRef,
    text: FieldRef,
    debit: FieldRef,
    credit: FieldRef,
    budget_account: FieldRef,
    address: FieldRef,
}

impl DetailFields {
    fn resolve(db: &Database<'_>) -> RepositoryResult<Self> {
        Ok(Self {
            table: FieldRef::resolve(db, F_TABLE)?,
            ledger: FieldRef::resolve(db, F_LEDGER)?,
            account: FieldRef::resolve(db, F_ACCOUNT)?,
            year: FieldRef::resolve(db, F_YEAR)?,
            month: FieldRef::resolve(db, F_MONTH)?,
            credit_limit: FieldRef::resolve(db, F_CREDIT_LIMIT)?,
            income: FieldRef::resolve(db, F_INCOME)?,
            expense: FieldRef::resolve(db, F_EXPENSE)?,
            date: FieldRef::resolve(db, F_DATE)?,
            seq: FieldRef::resolve(db, F_SEQ)?,
            voucher: FieldRef::resolve(db, F_VOUCHER)?,
            text: FieldRef::resolve(db, F_TEXT)?,
            debit: FieldRef::resolve(db, F_DEBIT)?,
            credit: FieldRef::resolve(db, F_CREDIT)?,
            budget_account: FieldRef::resolve(db, F_BUDGET_ACCOUNT)?,
            address: FieldRef::resolve(db, F_ADDRESS)?,
        })
    }

    fn account_prefix(&self, table_id: i32, ledger: i32, account: &str) -> String {
        KeyBuilder::new()
            .append_numeric(i64::from(table_id), self.table.length())
            .append_numeric(i64::from(ledger), self.ledger.length())
            .append_text(account, self.account.length())
            .build()
    }
}

fn month_from(value: i32, record: &str) -> RepositoryResult<u32> {
    if (1..=12).contains(&value) {
        Ok(value as u32)
    } else {
        Err(RepositoryError::Decode {
            field: F_MONTH.to_string(),
            detail: format!("month {value} out of range on {record}"),
        })
    }
}

/// Repository reconstructing ledgers from the legacy store and serving
/// cached reference collections.
///
/// Each load owns its own cursors and object graph; the caches are the
/// only shared state and are serialized by their own locks, so a
/// repository can be shared across threads.
pub struct LedgerRepository {
    config: RepositoryConfig,
    engine: Arc<dyn IsamEngine>,
    addresses: Arc<dyn AddressResolver>,
    letterheads: Arc<dyn LetterheadProvider>,
    account_groups: ReferenceCache<Arc<AccountGroup>>,
    budget_groups: ReferenceCache<Arc<BudgetAccountGroup>>,
    letterhead_rows: ReferenceCache<Letterhead>,
}

impl std::fmt::Debug for LedgerRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerRepository")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LedgerRepository {
    /// Validate the configuration and build the repository. Configuration
    /// failures surface here, before any load is attempted.
    pub fn new(
        config: RepositoryConfig,
        engine: Arc<dyn IsamEngine>,
        addresses: Arc<dyn AddressResolver>,
        letterheads: Arc<dyn LetterheadProvider>,
    ) -> RepositoryResult<Self> {
        config.validate()?;
        let letterhead_rows = ReferenceCache::new(letterheads.source_file());
        Ok(Self {
            config,
            engine,
            addresses,
            letterheads,
            account_groups: ReferenceCache::new(MASTER_FILE),
            budget_groups: ReferenceCache::new(MASTER_FILE),
            letterhead_rows,
        })
    }

    /// All account groups, cached after the first load.
    pub fn account_groups(&self) -> RepositoryResult<Arc<Vec<Arc<AccountGroup>>>> {
        self.account_groups.get_or_load(|| self.scan_account_groups())
    }

    /// All budget account groups, cached after the first load.
    pub fn budget_account_groups(&self) -> RepositoryResult<Arc<Vec<Arc<BudgetAccountGroup>>>> {
        self.budget_groups.get_or_load(|| self.scan_budget_groups())
    }

    /// All letterheads from the letterhead collaborator, cached after the
    /// first load.
    pub fn letterheads(&self) -> RepositoryResult<Arc<Vec<Letterhead>>> {
        self.letterhead_rows
            .get_or_load(|| self.letterheads.letterheads())
    }

    /// Change notification from the legacy store, keyed by file name.
    /// Unrelated file names clear nothing.
    pub fn on_store_changed(&self, file_name: &str) {
        self.account_groups.invalidate(file_name);
        self.budget_groups.invalidate(file_name);
        self.letterhead_rows.invalidate(file_name);
    }

    /// Resolve a line's address back-reference through the address
    /// collaborator (cached on the line after the first call).
    pub fn resolve_address<'l>(
        &self,
        line: &'l TransactionLine,
    ) -> RepositoryResult<Option<&'l Address>> {
        match line.address() {
            Some(lazy) => lazy.resolve(&*self.addresses),
            None => Ok(None),
        }
    }

    /// Ledger headers (number, name, letterhead), without accounts.
    pub fn ledgers(&self) -> RepositoryResult<Vec<Ledger>> {
        let letterheads = self.letterheads()?;
        let login = self.config.login();
        let master = Database::open(&*self.engine, MASTER_FILE, &login, true)?;
        let fields = MasterFields::resolve(&master)?;

        let mut out = Vec::new();
        let mut search = master.search()?;
        if !search.set_active_key(PRIMARY_KEY) {
            return Ok(out);
        }
        let prefix = fields.table_prefix(TABLE_LEDGERS);
        if !search.set_key_interval(&prefix, &prefix) {
            return Ok(out);
        }
        let mut found = search.first();
        while found {
            let reader = RowReader::new(&search);
            out.push(read_ledger_header(&reader, &fields, &letterheads)?);
            found = search.next();
        }
        Ok(out)
    }

    /// Load one ledger as a fully populated object graph.
    ///
    /// Load order is fixed: group dictionaries, then the ledger header,
    /// then the account scan bounded to this ledger, then per-account
    /// snapshot and line sub-scans bounded to each account. References
    /// are resolved against what the earlier steps produced; any miss
    /// aborts the load.
    pub fn load_ledger(&self, number: i32, options: &LoadOptions) -> RepositoryResult<Ledger> {
        debug!(ledger = number, "loading ledger");

        let account_groups = self.account_groups()?;
        let budget_groups = self.budget_account_groups()?;
        let letterheads = self.letterheads()?;
        let group_map: HashMap<i32, Arc<AccountGroup>> = account_groups
            .iter()
            .map(|group| (group.number(), Arc::clone(group)))
            .collect();
        let budget_group_map: HashMap<i32, Arc<BudgetAccountGroup>> = budget_groups
            .iter()
            .map(|group| (group.number(), Arc::clone(group)))
            .collect();

        let login = self.config.login();
        let master = Database::open(&*self.engine, MASTER_FILE, &login, true)?;
        let master_fields = MasterFields::resolve(&master)?;

        let mut ledger = {
            let mut search = master.search()?;
            let prefix = master_fields.numbered_prefix(TABLE_LEDGERS, number);
            if !search.set_active_key(PRIMARY_KEY)
                || !search.set_key_interval(&prefix, &prefix)
                || !search.first()
            {
                return Err(RepositoryError::unresolved("ledger", number, MASTER_FILE));
            }
            let reader = RowReader::new(&search);
            read_ledger_header(&reader, &master_fields, &letterheads)?
        };

        // Account scan, bounded to this ledger.
        {
            let mut search = master.search()?;
            let prefix = master_fields.ledger_prefix(TABLE_ACCOUNTS, number);
            if search.set_active_key(PRIMARY_KEY) && search.set_key_interval(&prefix, &prefix) {
                let mut found = search.first();
                while found {
                    let reader = RowReader::new(&search);
                    let account_no = reader.get_string(&master_fields.account)?;
                    if account_no.is_empty() {
                        return Err(RepositoryError::MissingField {
                            field: "AccountNo",
                            record: format!("account row in ledger {number}"),
                        });
                    }
                    let kind = AccountKind::from_code(reader.get_i32(&master_fields.kind)?)?;
                    let name = reader.get_string(&master_fields.name)?;
                    let group_no = reader.get_i32(&master_fields.group)?;
                    let description = reader.get_string(&master_fields.description)?;
                    let note = reader.get_string(&master_fields.note)?;

                    let entry = match kind {
                        AccountKind::Account => {
                            let group = group_map.get(&group_no).ok_or_else(|| {
                                RepositoryError::unresolved(
                                    "account group",
                                    group_no,
                                    format!("account {account_no} in ledger {number}"),
                                )
                            })?;
                            let mut account =
                                Account::new(number, &account_no, &name, Arc::clone(group));
                            if !description.is_empty() {
                                account.set_description(description);
                            }
                            if !note.is_empty() {
                                account.set_note(note);
                            }
                            LedgerEntry::Account(account)
                        }
                        AccountKind::BudgetAccount => {
                            let group = budget_group_map.get(&group_no).ok_or_else(|| {
                                RepositoryError::unresolved(
                                    "budget account group",
                                    group_no,
                                    format!("budget account {account_no} in ledger {number}"),
                                )
                            })?;
                            let mut budget =
                                BudgetAccount::new(number, &account_no, &name, Arc::clone(group));
                            if !description.is_empty() {
                                budget.set_description(description);
                            }
                            if !note.is_empty() {
                                budget.set_note(note);
                            }
                            LedgerEntry::Budget(budget)
                        }
                    };
                    ledger.push_entry(entry);
                    found = search.next();
                }
            }
        }

        // Per-account sub-scans over the detail file. Opened after the
        // master file and dropped before it.
        let detail = Database::open(&*self.engine, DETAIL_FILE, &login, true)?;
        let detail_fields = DetailFields::resolve(&detail)?;

        let entry_kinds: Vec<(String, AccountKind)> = ledger
            .entries()
            .iter()
            .map(|entry| match entry {
                LedgerEntry::Account(account) => {
                    (account.number().to_string(), AccountKind::Account)
                }
                LedgerEntry::Budget(budget) => {
                    (budget.number().to_string(), AccountKind::BudgetAccount)
                }
            })
            .collect();
        let budget_numbers: HashSet<String> = ledger
            .budget_accounts()
            .map(|budget| budget.number().to_string())
            .collect();

        let mut line_total = 0usize;
        for (account_no, kind) in &entry_kinds {
            match kind {
                AccountKind::Account => {
                    let snapshots =
                        self.scan_credit_snapshots(&detail, &detail_fields, number, account_no)?;
                    let lines = self.scan_lines(
                        &detail,
                        &detail_fields,
                        number,
                        account_no,
                        &budget_numbers,
                    )?;
                    line_total += lines.len();

                    let account = ledger.account_mut(account_no).ok_or_else(|| {
                        RepositoryError::unresolved("account", account_no, MASTER_FILE)
                    })?;
                    for snapshot in snapshots {
                        account.push_credit_snapshot(snapshot);
                    }
                    for line in &lines {
                        account.push_line(Arc::clone(line));
                    }
                    // Mirror each line onto the budget account it posts
                    // against; existence was validated during the scan.
                    for line in &lines {
                        if let Some(reference) = line.budget_account_number() {
                            let reference = reference.to_string();
                            let budget =
                                ledger.budget_account_mut(&reference).ok_or_else(|| {
                                    RepositoryError::unresolved(
                                        "budget account",
                                        &reference,
                                        format!("line on account {account_no}"),
                                    )
                                })?;
                            budget.push_line(Arc::clone(line));
                        }
                    }
                }
                AccountKind::BudgetAccount => {
                    let snapshots =
                        self.scan_budget_snapshots(&detail, &detail_fields, number, account_no)?;
                    let budget = ledger.budget_account_mut(account_no).ok_or_else(|| {
                        RepositoryError::unresolved("budget account", account_no, MASTER_FILE)
                    })?;
                    for snapshot in snapshots {
                        budget.push_budget_snapshot(snapshot);
                    }
                }
            }
        }

        if let CalculationMode::Eager { as_of } = options.calculation {
            ledger.calculate_at(as_of);
        }

        info!(
            ledger = number,
            entries = ledger.entries().len(),
            lines = line_total,
            "ledger loaded"
        );
        Ok(ledger)
    }

    /// Rename an account group in place and invalidate the cached
    /// dictionary before returning.
    pub fn rename_account_group(&self, number: i32, name: &str) -> RepositoryResult<()> {
        let login = self.config.login();
        {
            let master = Database::open(&*self.engine, MASTER_FILE, &login, false)?;
            let fields = MasterFields::resolve(&master)?;
            let mut search = master.search()?;
            let prefix = fields.numbered_prefix(TABLE_ACCOUNT_GROUPS, number);
            if !search.set_active_key(PRIMARY_KEY)
                || !search.set_key_interval(&prefix, &prefix)
                || !search.first()
            {
                return Err(RepositoryError::unresolved(
                    "account group",
                    number,
                    MASTER_FILE,
                ));
            }
            let writer = RowWriter::new(&search);
            writer.set_string(&fields.name, name)?;
            writer.commit()?;
        }
        self.account_groups.clear();
        debug!(group = number, "account group renamed");
        Ok(())
    }

    fn scan_account_groups(&self) -> RepositoryResult<Vec<Arc<AccountGroup>>> {
        let login = self.config.login();
        let master = Database::open(&*self.engine, MASTER_FILE, &login, true)?;
        let fields = MasterFields::resolve(&master)?;

        let mut groups = Vec::new();
        let mut search = master.search()?;
        if !search.set_active_key(PRIMARY_KEY) {
            return Ok(groups);
        }
        let prefix = fields.table_prefix(TABLE_ACCOUNT_GROUPS);
        if !search.set_key_interval(&prefix, &prefix) {
            return Ok(groups);
        }
        let mut found = search.first();
        while found {
            let reader = RowReader::new(&search);
            let number = reader.get_i32(&fields.number)?;
            let name = reader.get_string(&fields.name)?;
            let category = crate::types::AccountCategory::from_code(
                reader.get_i32(&fields.category)?,
            )?;
            groups.push(Arc::new(AccountGroup::new(number, name, category)));
            found = search.next();
        }
        debug!(groups = groups.len(), "account groups loaded");
        Ok(groups)
    }

    fn scan_budget_groups(&self) -> RepositoryResult<Vec<Arc<BudgetAccountGroup>>> {
        let login = self.config.login();
        let master = Database::open(&*self.engine, MASTER_FILE, &login, true)?;
        let fields = MasterFields::resolve(&master)?;

        let mut groups = Vec::new();
        let mut search = master.search()?;
        if !search.set_active_key(PRIMARY_KEY) {
            return Ok(groups);
        }
        let prefix = fields.table_prefix(TABLE_BUDGET_GROUPS);
        if !search.set_key_interval(&prefix, &prefix) {
            return Ok(groups);
        }
        let mut found = search.first();
        while found {
            let reader = RowReader::new(&search);
            let number = reader.get_i32(&fields.number)?;
            let name = reader.get_string(&fields.name)?;
            groups.push(Arc::new(BudgetAccountGroup::new(number, name)));
            found = search.next();
        }
        debug!(groups = groups.len(), "budget account groups loaded");
        Ok(groups)
    }

    fn scan_credit_snapshots(
        &self,
        detail: &Database<'_>,
        fields: &DetailFields,
        ledger: i32,
        account: &str,
    ) -> RepositoryResult<Vec<CreditSnapshot>> {
        let mut out = Vec::new();
        let mut search = detail.search()?;
        if !search.set_active_key(PRIMARY_KEY) {
            return Ok(out);
        }
        let prefix = fields.account_prefix(TABLE_CREDIT_SNAPSHOTS, ledger, account);
        if !search.set_key_interval(&prefix, &prefix) {
            return Ok(out);
        }
        let mut found = search.first();
        while found {
            let reader = RowReader::new(&search);
            let year = reader.get_i32(&fields.year)?;
            let month = month_from(
                reader.get_i32(&fields.month)?,
                &format!("credit snapshot for account {account}"),
            )?;
            let credit = reader.get_decimal(&fields.credit_limit)?;
            out.push(CreditSnapshot::new(year, month, credit));
            found = search.next();
        }
        Ok(out)
    }

    fn scan_budget_snapshots(
        &self,
        detail: &Database<'_>,
        fields: &DetailFields,
        ledger: i32,
        account: &str,
    ) -> RepositoryResult<Vec<BudgetSnapshot>> {
        let mut out = Vec::new();
        let mut search = detail.search()?;
        if !search.set_active_key(PRIMARY_KEY) {
            return Ok(out);
        }
        let prefix = fields.account_prefix(TABLE_BUDGET_SNAPSHOTS, ledger, account);
        if !search.set_key_interval(&prefix, &prefix) {
            return Ok(out);
        }
        let mut found = search.first();
        while found {
            let reader = RowReader::new(&search);
            let year = reader.get_i32(&fields.year)?;
            let month = month_from(
                reader.get_i32(&fields.month)?,
                &format!("budget snapshot for account {account}"),
            )?;
            let income = reader.get_decimal(&fields.income)?;
            let expense = reader.get_decimal(&fields.expense)?;
            out.push(BudgetSnapshot::new(year, month, income, expense));
            found = search.next();
        }
        Ok(out)
    }

    fn scan_lines(
        &self,
        detail: &Database<'_>,
        fields: &DetailFields,
        ledger: i32,
        account: &str,
        budget_numbers: &HashSet<String>,
    ) -> RepositoryResult<Vec<Arc<TransactionLine>>> {
        let mut out = Vec::new();
        let mut search = detail.search()?;
        if !search.set_active_key(PRIMARY_KEY) {
            return Ok(out);
        }
        let prefix = fields.account_prefix(TABLE_LINES, ledger, account);
        if !search.set_key_interval(&prefix, &prefix) {
            return Ok(out);
        }
        let mut found = search.first();
        while found {
            let reader = RowReader::new(&search);
            let sequence = reader.get_i32(&fields.seq)?;
            let record = || format!("transaction line {sequence} on account {account}");

            let date = reader
                .get_date_opt(&fields.date)?
                .ok_or_else(|| RepositoryError::MissingField {
                    field: "Date",
                    record: record(),
                })?;
            let text = reader.get_string(&fields.text)?;
            if text.is_empty() {
                return Err(RepositoryError::MissingField {
                    field: "Text",
                    record: record(),
                });
            }
            let voucher = reader.get_string(&fields.voucher)?;
            let debit = reader.get_decimal(&fields.debit)?;
            let credit = reader.get_decimal(&fields.credit)?;
            let budget_reference = reader.get_string(&fields.budget_account)?;
            let address_no = reader.get_i32_opt(&fields.address)?.filter(|no| *no != 0);

            let mut line = TransactionLine::new(sequence, date, account, text, debit, credit)?;
            if !voucher.is_empty() {
                line = line.with_voucher(voucher);
            }
            if !budget_reference.is_empty() {
                let reference = budget_reference.to_uppercase();
                if !budget_numbers.contains(&reference) {
                    return Err(RepositoryError::unresolved(
                        "budget account",
                        reference,
                        record(),
                    ));
                }
                line = line.with_budget_account(reference);
            }
            if let Some(no) = address_no {
                line = line.with_address(LazyAddress::new(no));
            }
            out.push(Arc::new(line));
            found = search.next();
        }
        Ok(out)
    }
}

fn read_ledger_header(
    reader: &RowReader<'_, '_>,
    fields: &MasterFields,
    letterheads: &[Letterhead],
) -> RepositoryResult<Ledger> {
    let number = reader.get_i32(&fields.number)?;
    let name = reader.get_string(&fields.name)?;
    let mut ledger = Ledger::new(number, name);
    if let Some(letterhead_no) = reader.get_i32_opt(&fields.letterhead)?.filter(|no| *no != 0) {
        let letterhead = letterheads
            .iter()
            .find(|candidate| candidate.number == letterhead_no)
            .ok_or_else(|| {
                RepositoryError::unresolved("letterhead", letterhead_no, format!("ledger {number}"))
            })?;
        ledger.set_letterhead(letterhead.clone());
    }
    Ok(ledger)
}
