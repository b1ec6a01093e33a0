//! Typed field access over a positioned cursor row

use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::engine::cursor::{Database, Search};
use crate::types::{Cell, EngineResult, RepositoryError, RepositoryResult};

/// A schema-resolved field: name, number, and declared width.
///
/// Resolved once per opened table file; the declared width is what sizes
/// key encodings for this field.
#[derive(Debug, Clone)]
pub struct FieldRef {
    name: String,
    number: usize,
    length: usize,
}

impl FieldRef {
    pub fn resolve(db: &Database<'_>, name: &str) -> EngineResult<Self> {
        let number = db.engine().field_number(db.handle(), name)?;
        let length = db.engine().field_length(db.handle(), number)?;
        Ok(Self {
            name: name.to_string(),
            number,
            length,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

fn decode_error(field: &FieldRef, cell: &Cell, wanted: &str) -> RepositoryError {
    RepositoryError::Decode {
        field: field.name.clone(),
        detail: format!("expected {wanted}, found {} cell", cell.type_name()),
    }
}

fn missing_error(field: &FieldRef, wanted: &str) -> RepositoryError {
    RepositoryError::Decode {
        field: field.name.clone(),
        detail: format!("expected {wanted}, found no cell"),
    }
}

/// Typed getters over the row the search cursor is positioned on.
///
/// Getters fail with a decode error when a cell cannot be coerced to the
/// requested type. Nullable targets (strings, optional numbers, optional
/// dates) read a missing cell as their empty value; whether emptiness is
/// significant is the caller's decision.
pub struct RowReader<'s, 'd> {
    search: &'s Search<'d>,
}

impl<'s, 'd> RowReader<'s, 'd> {
    pub fn new(search: &'s Search<'d>) -> Self {
        Self { search }
    }

    fn cell(&self, field: &FieldRef) -> RepositoryResult<Option<Cell>> {
        Ok(self
            .search
            .engine()
            .get_cell(self.search.cursor(), field.number)?)
    }

    pub fn get_i32(&self, field: &FieldRef) -> RepositoryResult<i32> {
        match self.cell(field)? {
            Some(Cell::Int(value)) => i32::try_from(value).map_err(|_| RepositoryError::Decode {
                field: field.name.clone(),
                detail: format!("value {value} does not fit in 32 bits"),
            }),
            Some(other) => Err(decode_error(field, &other, "int")),
            None => Err(missing_error(field, "int")),
        }
    }

    pub fn get_i32_opt(&self, field: &FieldRef) -> RepositoryResult<Option<i32>> {
        match self.cell(field)? {
            None => Ok(None),
            Some(_) => self.get_i32(field).map(Some),
        }
    }

    /// Blank numeric cells read as zero; legacy rows leave untouched
    /// amounts empty.
    pub fn get_decimal(&self, field: &FieldRef) -> RepositoryResult<BigDecimal> {
        match self.cell(field)? {
            Some(Cell::Decimal(value)) => Ok(value),
            Some(Cell::Int(value)) => Ok(BigDecimal::from(value)),
            Some(other) => Err(decode_error(field, &other, "decimal")),
            None => Ok(BigDecimal::from(0)),
        }
    }

    pub fn get_string(&self, field: &FieldRef) -> RepositoryResult<String> {
        match self.cell(field)? {
            Some(Cell::Text(value)) => Ok(value.trim().to_string()),
            Some(other) => Err(decode_error(field, &other, "text")),
            None => Ok(String::new()),
        }
    }

    pub fn get_date_opt(&self, field: &FieldRef) -> RepositoryResult<Option<NaiveDate>> {
        match self.cell(field)? {
            Some(Cell::Date(value)) => Ok(Some(value)),
            Some(other) => Err(decode_error(field, &other, "date")),
            None => Ok(None),
        }
    }
}

/// Typed setters staging cells into the positioned row; used by write
/// paths only.
pub struct RowWriter<'s, 'd> {
    search: &'s Search<'d>,
}

impl<'s, 'd> RowWriter<'s, 'd> {
    pub fn new(search: &'s Search<'d>) -> Self {
        Self { search }
    }

    fn put(&self, field: &FieldRef, cell: Cell) -> RepositoryResult<()> {
        Ok(self
            .search
            .engine()
            .put_cell(self.search.cursor(), field.number, cell)?)
    }

    pub fn set_i32(&self, field: &FieldRef, value: i32) -> RepositoryResult<()> {
        self.put(field, Cell::Int(i64::from(value)))
    }

    pub fn set_string(&self, field: &FieldRef, value: &str) -> RepositoryResult<()> {
        self.put(field, Cell::Text(value.to_string()))
    }

    pub fn set_decimal(&self, field: &FieldRef, value: BigDecimal) -> RepositoryResult<()> {
        self.put(field, Cell::Decimal(value))
    }

    pub fn set_date(&self, field: &FieldRef, value: NaiveDate) -> RepositoryResult<()> {
        self.put(field, Cell::Date(value))
    }

    /// Apply all staged cells to the row.
    pub fn commit(&self) -> RepositoryResult<()> {
        Ok(self.search.engine().commit_row(self.search.cursor())?)
    }
}
