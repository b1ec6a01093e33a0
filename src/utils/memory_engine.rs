//! In-memory ISAM engine implementation for testing and development
//!
//! Faithful to the legacy engine's observable behavior: handle-based
//! open/close, per-scan cursors, and key-interval range search in
//! ascending key order with the upper bound compared over its own length.
//! Open handles are counted so tests can assert full release.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use bigdecimal::BigDecimal;
use chrono::{Datelike, NaiveDate};

use crate::keys::KeyBuilder;
use crate::ledger::{Address, Letterhead};
use crate::repository::tables::*;
use crate::traits::{AddressResolver, IsamEngine, LetterheadProvider, Login};
use crate::types::{
    Cell, DbHandle, EngineError, EngineResult, RepositoryResult, SearchHandle,
};

#[derive(Debug, Clone)]
struct FieldDef {
    name: &'static str,
    length: usize,
}

type Row = HashMap<&'static str, Cell>;

struct TableFile {
    key_name: &'static str,
    schema: Vec<FieldDef>,
    rows: BTreeMap<String, Row>,
}

struct OpenDatabase {
    file: String,
    read_only: bool,
}

struct OpenSearch {
    file: String,
    read_only: bool,
    active_key: bool,
    interval: Option<(String, String)>,
    position: Option<String>,
    staged: HashMap<usize, Cell>,
}

struct EngineState {
    files: HashMap<String, TableFile>,
    expected_login: Option<Login>,
    databases: HashMap<u32, OpenDatabase>,
    searches: HashMap<u32, OpenSearch>,
    next_handle: u32,
}

/// A key is inside the interval when it is at or above the lower bound
/// and its truncation to the upper bound's length is at or below the
/// upper bound; equal bounds therefore select an exact key prefix.
fn within(key: &str, interval: &Option<(String, String)>) -> bool {
    match interval {
        None => true,
        Some((low, high)) => {
            let truncated = if key.len() > high.len() {
                &key[..high.len()]
            } else {
                key
            };
            key >= low.as_str() && truncated <= high.as_str()
        }
    }
}

/// In-memory stand-in for the legacy ISAM engine.
pub struct MemoryIsamEngine {
    state: Mutex<EngineState>,
}

impl MemoryIsamEngine {
    /// Open table files currently held; zero once every [`DbHandle`] has
    /// been released.
    pub fn open_database_count(&self) -> usize {
        self.state.lock().unwrap().databases.len()
    }

    /// Search cursors currently held; zero once every cursor has been
    /// released.
    pub fn open_search_count(&self) -> usize {
        self.state.lock().unwrap().searches.len()
    }
}

impl IsamEngine for MemoryIsamEngine {
    fn open_database(
        &self,
        file_name: &str,
        login: &Login,
        read_only: bool,
    ) -> EngineResult<DbHandle> {
        let mut state = self.state.lock().unwrap();
        if !state.files.contains_key(file_name) {
            return Err(EngineError::OpenFailed(file_name.to_string()));
        }
        if let Some(expected) = &state.expected_login {
            if expected != login {
                return Err(EngineError::LoginRejected(file_name.to_string()));
            }
        }
        let handle = state.next_handle;
        state.next_handle += 1;
        state.databases.insert(
            handle,
            OpenDatabase {
                file: file_name.to_string(),
                read_only,
            },
        );
        Ok(DbHandle(handle))
    }

    fn close_database(&self, handle: DbHandle) {
        self.state.lock().unwrap().databases.remove(&handle.0);
    }

    fn create_search(&self, handle: DbHandle) -> EngineResult<SearchHandle> {
        let mut state = self.state.lock().unwrap();
        let database = state
            .databases
            .get(&handle.0)
            .ok_or(EngineError::InvalidHandle)?;
        let search = OpenSearch {
            file: database.file.clone(),
            read_only: database.read_only,
            active_key: false,
            interval: None,
            position: None,
            staged: HashMap::new(),
        };
        let cursor = state.next_handle;
        state.next_handle += 1;
        state.searches.insert(cursor, search);
        Ok(SearchHandle(cursor))
    }

    fn delete_search(&self, cursor: SearchHandle) {
        self.state.lock().unwrap().searches.remove(&cursor.0);
    }

    fn set_active_key(&self, cursor: SearchHandle, key_name: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        let EngineState {
            files, searches, ..
        } = &mut *state;
        let Some(search) = searches.get_mut(&cursor.0) else {
            return false;
        };
        let Some(file) = files.get(&search.file) else {
            return false;
        };
        search.active_key = file.key_name == key_name;
        search.active_key
    }

    fn set_key_interval(&self, cursor: SearchHandle, low: &str, high: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        let Some(search) = state.searches.get_mut(&cursor.0) else {
            return false;
        };
        if low > high {
            return false;
        }
        search.interval = Some((low.to_string(), high.to_string()));
        true
    }

    fn clear_key_interval(&self, cursor: SearchHandle) {
        if let Some(search) = self.state.lock().unwrap().searches.get_mut(&cursor.0) {
            search.interval = None;
        }
    }

    fn search_first(&self, cursor: SearchHandle) -> bool {
        let mut state = self.state.lock().unwrap();
        let EngineState {
            files, searches, ..
        } = &mut *state;
        let Some(search) = searches.get_mut(&cursor.0) else {
            return false;
        };
        if !search.active_key {
            return false;
        }
        let Some(file) = files.get(&search.file) else {
            return false;
        };
        search.position = file
            .rows
            .keys()
            .find(|key| within(key, &search.interval))
            .cloned();
        search.position.is_some()
    }

    fn search_next(&self, cursor: SearchHandle) -> bool {
        let mut state = self.state.lock().unwrap();
        let EngineState {
            files, searches, ..
        } = &mut *state;
        let Some(search) = searches.get_mut(&cursor.0) else {
            return false;
        };
        let Some(current) = search.position.clone() else {
            return false;
        };
        let Some(file) = files.get(&search.file) else {
            return false;
        };
        let next = file
            .rows
            .range::<String, _>((
                std::ops::Bound::Excluded(current),
                std::ops::Bound::Unbounded,
            ))
            .map(|(key, _)| key)
            .find(|key| within(key, &search.interval))
            .cloned();
        match next {
            Some(key) => {
                search.position = Some(key);
                true
            }
            None => false,
        }
    }

    fn field_number(&self, handle: DbHandle, field_name: &str) -> EngineResult<usize> {
        let state = self.state.lock().unwrap();
        let database = state
            .databases
            .get(&handle.0)
            .ok_or(EngineError::InvalidHandle)?;
        let file = state
            .files
            .get(&database.file)
            .ok_or(EngineError::InvalidHandle)?;
        file.schema
            .iter()
            .position(|field| field.name == field_name)
            .ok_or_else(|| EngineError::UnknownField(field_name.to_string()))
    }

    fn field_length(&self, handle: DbHandle, field_no: usize) -> EngineResult<usize> {
        let state = self.state.lock().unwrap();
        let database = state
            .databases
            .get(&handle.0)
            .ok_or(EngineError::InvalidHandle)?;
        let file = state
            .files
            .get(&database.file)
            .ok_or(EngineError::InvalidHandle)?;
        file.schema
            .get(field_no)
            .map(|field| field.length)
            .ok_or_else(|| EngineError::UnknownField(format!("#{field_no}")))
    }

    fn get_cell(&self, cursor: SearchHandle, field_no: usize) -> EngineResult<Option<Cell>> {
        let state = self.state.lock().unwrap();
        let search = state
            .searches
            .get(&cursor.0)
            .ok_or(EngineError::InvalidHandle)?;
        let position = search.position.as_ref().ok_or(EngineError::NotPositioned)?;
        let file = state
            .files
            .get(&search.file)
            .ok_or(EngineError::InvalidHandle)?;
        let field = file
            .schema
            .get(field_no)
            .ok_or_else(|| EngineError::UnknownField(format!("#{field_no}")))?;
        let row = file.rows.get(position).ok_or(EngineError::NotPositioned)?;
        Ok(row.get(field.name).cloned())
    }

    fn put_cell(&self, cursor: SearchHandle, field_no: usize, cell: Cell) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        let search = state
            .searches
            .get_mut(&cursor.0)
            .ok_or(EngineError::InvalidHandle)?;
        if search.read_only {
            return Err(EngineError::ReadOnly(search.file.clone()));
        }
        if search.position.is_none() {
            return Err(EngineError::NotPositioned);
        }
        search.staged.insert(field_no, cell);
        Ok(())
    }

    fn commit_row(&self, cursor: SearchHandle) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        let EngineState {
            files, searches, ..
        } = &mut *state;
        let search = searches
            .get_mut(&cursor.0)
            .ok_or(EngineError::InvalidHandle)?;
        let position = search.position.clone().ok_or(EngineError::NotPositioned)?;
        let file = files
            .get_mut(&search.file)
            .ok_or(EngineError::InvalidHandle)?;
        let row = file
            .rows
            .get_mut(&position)
            .ok_or(EngineError::NotPositioned)?;
        for (field_no, cell) in search.staged.drain() {
            let field = file
                .schema
                .get(field_no)
                .ok_or_else(|| EngineError::UnknownField(format!("#{field_no}")))?;
            row.insert(field.name, cell);
        }
        Ok(())
    }
}

fn master_schema() -> Vec<FieldDef> {
    [
        (F_TABLE, 3),
        (F_LEDGER, 3),
        (F_NUMBER, 3),
        (F_ACCOUNT, 10),
        (F_KIND, 1),
        (F_NAME, 40),
        (F_CATEGORY, 1),
        (F_GROUP, 3),
        (F_DESCRIPTION, 60),
        (F_NOTE, 60),
        (F_LETTERHEAD, 3),
    ]
    .into_iter()
    .map(|(name, length)| FieldDef { name, length })
    .collect()
}

fn detail_schema() -> Vec<FieldDef> {
    [
        (F_TABLE, 3),
        (F_LEDGER, 3),
        (F_ACCOUNT, 10),
        (F_YEAR, 4),
        (F_MONTH, 2),
        (F_CREDIT_LIMIT, 15),
        (F_INCOME, 15),
        (F_EXPENSE, 15),
        (F_DATE, 8),
        (F_SEQ, 9),
        (F_VOUCHER, 10),
        (F_TEXT, 40),
        (F_DEBIT, 15),
        (F_CREDIT, 15),
        (F_BUDGET_ACCOUNT, 10),
        (F_ADDRESS, 5),
    ]
    .into_iter()
    .map(|(name, length)| FieldDef { name, length })
    .collect()
}

fn width(schema: &[FieldDef], name: &str) -> usize {
    schema
        .iter()
        .find(|field| field.name == name)
        .map(|field| field.length)
        .unwrap_or_else(|| panic!("fixture schema has no field '{name}'"))
}

/// Parameters for seeding one transaction line row.
#[derive(Debug, Clone)]
pub struct LineRow {
    pub ledger: i32,
    pub account: String,
    pub sequence: i32,
    pub date: Option<NaiveDate>,
    pub voucher: Option<String>,
    pub text: String,
    pub debit: i64,
    pub credit: i64,
    pub budget_account: Option<String>,
    pub address: Option<i32>,
}

impl LineRow {
    pub fn new(
        ledger: i32,
        account: &str,
        sequence: i32,
        date: NaiveDate,
        text: &str,
        debit: i64,
        credit: i64,
    ) -> Self {
        Self {
            ledger,
            account: account.to_string(),
            sequence,
            date: Some(date),
            voucher: None,
            text: text.to_string(),
            debit,
            credit,
            budget_account: None,
            address: None,
        }
    }

    /// A row with no date cell; loading it must fail.
    pub fn undated(
        ledger: i32,
        account: &str,
        sequence: i32,
        text: &str,
        debit: i64,
        credit: i64,
    ) -> Self {
        Self {
            date: None,
            ..Self::new(
                ledger,
                account,
                sequence,
                NaiveDate::from_ymd_opt(1970, 1, 1).unwrap(),
                text,
                debit,
                credit,
            )
        }
    }

    pub fn voucher(mut self, voucher: &str) -> Self {
        self.voucher = Some(voucher.to_string());
        self
    }

    pub fn budget_account(mut self, number: &str) -> Self {
        self.budget_account = Some(number.to_string());
        self
    }

    pub fn address(mut self, number: i32) -> Self {
        self.address = Some(number);
        self
    }
}

/// Seeds a [`MemoryIsamEngine`] with the standard two-file layout.
///
/// Row keys are encoded through [`KeyBuilder`] at the widths the fixture
/// schema declares, so the seeded file sorts exactly as the production
/// key codec expects.
pub struct FixtureBuilder {
    master: BTreeMap<String, Row>,
    detail: BTreeMap<String, Row>,
    expected_login: Option<Login>,
}

impl FixtureBuilder {
    pub fn new() -> Self {
        Self {
            master: BTreeMap::new(),
            detail: BTreeMap::new(),
            expected_login: None,
        }
    }

    /// Reject opens that do not present exactly this login.
    pub fn expect_login(mut self, login: Login) -> Self {
        self.expected_login = Some(login);
        self
    }

    fn master_key_numbered(table: i32, number: i32) -> String {
        let schema = master_schema();
        KeyBuilder::new()
            .append_numeric(i64::from(table), width(&schema, F_TABLE))
            .append_numeric(i64::from(number), width(&schema, F_NUMBER))
            .build()
    }

    fn master_key_account(table: i32, ledger: i32, account: &str) -> String {
        let schema = master_schema();
        KeyBuilder::new()
            .append_numeric(i64::from(table), width(&schema, F_TABLE))
            .append_numeric(i64::from(ledger), width(&schema, F_LEDGER))
            .append_text(account, width(&schema, F_ACCOUNT))
            .build()
    }

    fn detail_key(
        table: i32,
        ledger: i32,
        account: &str,
        suffix: impl FnOnce(KeyBuilder, &[FieldDef]) -> KeyBuilder,
    ) -> String {
        let schema = detail_schema();
        let builder = KeyBuilder::new()
            .append_numeric(i64::from(table), width(&schema, F_TABLE))
            .append_numeric(i64::from(ledger), width(&schema, F_LEDGER))
            .append_text(account, width(&schema, F_ACCOUNT));
        suffix(builder, &schema).build()
    }

    pub fn account_group(mut self, number: i32, name: &str, category_code: i32) -> Self {
        let key = Self::master_key_numbered(TABLE_ACCOUNT_GROUPS, number);
        let row = Row::from([
            (F_TABLE, Cell::Int(i64::from(TABLE_ACCOUNT_GROUPS))),
            (F_NUMBER, Cell::Int(i64::from(number))),
            (F_NAME, Cell::Text(name.to_string())),
            (F_CATEGORY, Cell::Int(i64::from(category_code))),
        ]);
        self.master.insert(key, row);
        self
    }

    pub fn budget_account_group(mut self, number: i32, name: &str) -> Self {
        let key = Self::master_key_numbered(TABLE_BUDGET_GROUPS, number);
        let row = Row::from([
            (F_TABLE, Cell::Int(i64::from(TABLE_BUDGET_GROUPS))),
            (F_NUMBER, Cell::Int(i64::from(number))),
            (F_NAME, Cell::Text(name.to_string())),
        ]);
        self.master.insert(key, row);
        self
    }

    /// A ledger header row; `letterhead` 0 means none.
    pub fn ledger(mut self, number: i32, name: &str, letterhead: i32) -> Self {
        let key = Self::master_key_numbered(TABLE_LEDGERS, number);
        let mut row = Row::from([
            (F_TABLE, Cell::Int(i64::from(TABLE_LEDGERS))),
            (F_NUMBER, Cell::Int(i64::from(number))),
            (F_NAME, Cell::Text(name.to_string())),
        ]);
        if letterhead != 0 {
            row.insert(F_LETTERHEAD, Cell::Int(i64::from(letterhead)));
        }
        self.master.insert(key, row);
        self
    }

    pub fn account(self, ledger: i32, number: &str, name: &str, group: i32) -> Self {
        self.account_row(ledger, number, name, 1, group)
    }

    pub fn budget_account(self, ledger: i32, number: &str, name: &str, group: i32) -> Self {
        self.account_row(ledger, number, name, 2, group)
    }

    /// Raw account row with an explicit kind code, for bad-code cases.
    pub fn account_row(
        mut self,
        ledger: i32,
        number: &str,
        name: &str,
        kind_code: i32,
        group: i32,
    ) -> Self {
        let key = Self::master_key_account(TABLE_ACCOUNTS, ledger, number);
        let row = Row::from([
            (F_TABLE, Cell::Int(i64::from(TABLE_ACCOUNTS))),
            (F_LEDGER, Cell::Int(i64::from(ledger))),
            (F_ACCOUNT, Cell::Text(number.to_string())),
            (F_KIND, Cell::Int(i64::from(kind_code))),
            (F_NAME, Cell::Text(name.to_string())),
            (F_GROUP, Cell::Int(i64::from(group))),
        ]);
        self.master.insert(key, row);
        self
    }

    /// Attach description and note texts to an already seeded account row.
    pub fn account_texts(
        mut self,
        ledger: i32,
        number: &str,
        description: &str,
        note: &str,
    ) -> Self {
        let key = Self::master_key_account(TABLE_ACCOUNTS, ledger, number);
        let row = self
            .master
            .get_mut(&key)
            .unwrap_or_else(|| panic!("account {number} not seeded in ledger {ledger}"));
        row.insert(F_DESCRIPTION, Cell::Text(description.to_string()));
        row.insert(F_NOTE, Cell::Text(note.to_string()));
        self
    }

    pub fn credit_snapshot(
        mut self,
        ledger: i32,
        account: &str,
        year: i32,
        month: i32,
        credit: i64,
    ) -> Self {
        let key = Self::detail_key(TABLE_CREDIT_SNAPSHOTS, ledger, account, |builder, schema| {
            builder
                .append_numeric(i64::from(year), width(schema, F_YEAR))
                .append_numeric(i64::from(month), width(schema, F_MONTH))
        });
        let row = Row::from([
            (F_TABLE, Cell::Int(i64::from(TABLE_CREDIT_SNAPSHOTS))),
            (F_LEDGER, Cell::Int(i64::from(ledger))),
            (F_ACCOUNT, Cell::Text(account.to_string())),
            (F_YEAR, Cell::Int(i64::from(year))),
            (F_MONTH, Cell::Int(i64::from(month))),
            (F_CREDIT_LIMIT, Cell::Decimal(BigDecimal::from(credit))),
        ]);
        self.detail.insert(key, row);
        self
    }

    pub fn budget_snapshot(
        mut self,
        ledger: i32,
        account: &str,
        year: i32,
        month: i32,
        income: i64,
        expense: i64,
    ) -> Self {
        let key = Self::detail_key(TABLE_BUDGET_SNAPSHOTS, ledger, account, |builder, schema| {
            builder
                .append_numeric(i64::from(year), width(schema, F_YEAR))
                .append_numeric(i64::from(month), width(schema, F_MONTH))
        });
        let row = Row::from([
            (F_TABLE, Cell::Int(i64::from(TABLE_BUDGET_SNAPSHOTS))),
            (F_LEDGER, Cell::Int(i64::from(ledger))),
            (F_ACCOUNT, Cell::Text(account.to_string())),
            (F_YEAR, Cell::Int(i64::from(year))),
            (F_MONTH, Cell::Int(i64::from(month))),
            (F_INCOME, Cell::Decimal(BigDecimal::from(income))),
            (F_EXPENSE, Cell::Decimal(BigDecimal::from(expense))),
        ]);
        self.detail.insert(key, row);
        self
    }

    pub fn line(mut self, line: LineRow) -> Self {
        let (key_year, key_month, key_day) = match line.date {
            Some(date) => (
                i64::from(date.year()),
                i64::from(date.month()),
                i64::from(date.day()),
            ),
            None => (0, 0, 0),
        };
        let key = Self::detail_key(TABLE_LINES, line.ledger, &line.account, |builder, schema| {
            builder
                .append_numeric(key_year, 4)
                .append_numeric(key_month, 2)
                .append_numeric(key_day, 2)
                .append_numeric(i64::from(line.sequence), width(schema, F_SEQ))
        });
        let mut row = Row::from([
            (F_TABLE, Cell::Int(i64::from(TABLE_LINES))),
            (F_LEDGER, Cell::Int(i64::from(line.ledger))),
            (F_ACCOUNT, Cell::Text(line.account.clone())),
            (F_SEQ, Cell::Int(i64::from(line.sequence))),
            (F_TEXT, Cell::Text(line.text.clone())),
            (F_DEBIT, Cell::Decimal(BigDecimal::from(line.debit))),
            (F_CREDIT, Cell::Decimal(BigDecimal::from(line.credit))),
        ]);
        if let Some(date) = line.date {
            row.insert(F_DATE, Cell::Date(date));
        }
        if let Some(voucher) = &line.voucher {
            row.insert(F_VOUCHER, Cell::Text(voucher.clone()));
        }
        if let Some(budget) = &line.budget_account {
            row.insert(F_BUDGET_ACCOUNT, Cell::Text(budget.clone()));
        }
        if let Some(address) = line.address {
            row.insert(F_ADDRESS, Cell::Int(i64::from(address)));
        }
        self.detail.insert(key, row);
        self
    }

    pub fn build(self) -> MemoryIsamEngine {
        let mut files = HashMap::new();
        files.insert(
            MASTER_FILE.to_string(),
            TableFile {
                key_name: PRIMARY_KEY,
                schema: master_schema(),
                rows: self.master,
            },
        );
        files.insert(
            DETAIL_FILE.to_string(),
            TableFile {
                key_name: PRIMARY_KEY,
                schema: detail_schema(),
                rows: self.detail,
            },
        );
        MemoryIsamEngine {
            state: Mutex::new(EngineState {
                files,
                expected_login: self.expected_login,
                databases: HashMap::new(),
                searches: HashMap::new(),
                next_handle: 1,
            }),
        }
    }
}

impl Default for FixtureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Letterhead collaborator backed by a fixed list; counts loads so tests
/// can observe cache behavior.
pub struct StaticLetterheads {
    source_file: String,
    rows: Vec<Letterhead>,
    loads: AtomicUsize,
}

impl StaticLetterheads {
    pub fn new(source_file: &str, rows: Vec<Letterhead>) -> Self {
        Self {
            source_file: source_file.to_string(),
            rows,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl LetterheadProvider for StaticLetterheads {
    fn source_file(&self) -> &str {
        &self.source_file
    }

    fn letterheads(&self) -> RepositoryResult<Vec<Letterhead>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.clone())
    }
}

/// Address collaborator backed by a fixed map; counts lookups so tests
/// can observe lazy resolution.
pub struct StaticAddresses {
    rows: HashMap<i32, Address>,
    lookups: AtomicUsize,
}

impl StaticAddresses {
    pub fn new(rows: Vec<Address>) -> Self {
        Self {
            rows: rows.into_iter().map(|a| (a.number, a)).collect(),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl AddressResolver for StaticAddresses {
    fn address(&self, number: i32) -> RepositoryResult<Option<Address>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.get(&number).cloned())
    }
}
