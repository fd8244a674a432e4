use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use spendscan_core::{Category, DateRange, Expense, ExpenseId, Money, Source, ValidatedExpense};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, QueryBuilder, Sqlite};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Corrupt expense row {id}: {reason}")]
    Corrupt { id: i64, reason: String },
}

/// Restricts a listing to any of the given categories and any of the given
/// sources. An empty list means "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpenseFilter {
    pub categories: Vec<Category>,
    pub sources: Vec<Source>,
    /// Inclusive date bounds.
    pub range: Option<DateRange>,
}

impl ExpenseFilter {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.sources.is_empty() && self.range.is_none()
    }
}

type ExpenseRow = (i64, String, i64, String, String, String, String);

const EXPENSE_COLUMNS: &str =
    "SELECT id, description, amount_cents, category, date, source, created_at FROM expenses";

pub async fn create_db(path: &Path) -> Result<DbPool, StorageError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;
    info!("Opened expense database at {}", path.display());

    Ok(pool)
}

/// A private in-memory database; lives as long as the returned pool.
pub async fn create_memory_db() -> Result<DbPool, StorageError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS expenses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            description TEXT NOT NULL,
            amount_cents INTEGER NOT NULL,
            category TEXT NOT NULL,
            date TEXT NOT NULL,
            source TEXT NOT NULL DEFAULT 'manual',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_expenses_date ON expenses (date)")
        .execute(pool)
        .await?;

    Ok(())
}

const INSERT_EXPENSE: &str =
    "INSERT INTO expenses (description, amount_cents, category, date, source) VALUES (?, ?, ?, ?, ?) RETURNING id";

pub async fn insert_expense(pool: &DbPool, expense: &ValidatedExpense) -> Result<ExpenseId, StorageError> {
    let id = sqlx::query_scalar::<_, i64>(INSERT_EXPENSE)
        .bind(&expense.description)
        .bind(expense.amount_cents())
        .bind(expense.category.to_string())
        .bind(expense.date.to_string())
        .bind(expense.source.to_string())
        .fetch_one(pool)
        .await?;
    debug!(id, source = %expense.source, "expense stored");
    Ok(ExpenseId(id))
}

/// Store a batch atomically: either every expense is saved or none is.
pub async fn insert_expenses(
    pool: &DbPool,
    expenses: &[ValidatedExpense],
) -> Result<Vec<ExpenseId>, StorageError> {
    let mut tx = pool.begin().await?;
    let mut ids = Vec::with_capacity(expenses.len());
    for expense in expenses {
        let id = sqlx::query_scalar::<_, i64>(INSERT_EXPENSE)
            .bind(&expense.description)
            .bind(expense.amount_cents())
            .bind(expense.category.to_string())
            .bind(expense.date.to_string())
            .bind(expense.source.to_string())
            .fetch_one(&mut *tx)
            .await?;
        ids.push(ExpenseId(id));
    }
    tx.commit().await?;
    info!("Stored {} expenses", ids.len());
    Ok(ids)
}

/// Returns whether a row was actually removed.
pub async fn delete_expense(pool: &DbPool, id: ExpenseId) -> Result<bool, StorageError> {
    let result = sqlx::query("DELETE FROM expenses WHERE id = ?")
        .bind(id.0)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn get_expense_by_id(pool: &DbPool, id: ExpenseId) -> Result<Option<Expense>, StorageError> {
    let row = sqlx::query_as::<_, ExpenseRow>(&format!("{EXPENSE_COLUMNS} WHERE id = ?"))
        .bind(id.0)
        .fetch_optional(pool)
        .await?;
    row.map(row_to_expense).transpose()
}

/// Newest first; same-day expenses in reverse insertion order.
pub async fn get_expenses(pool: &DbPool, filter: &ExpenseFilter) -> Result<Vec<Expense>, StorageError> {
    let mut qb = QueryBuilder::<Sqlite>::new(EXPENSE_COLUMNS);
    let mut conjunction = " WHERE ";

    if !filter.categories.is_empty() {
        qb.push(conjunction).push("category IN (");
        let mut values = qb.separated(", ");
        for category in &filter.categories {
            values.push_bind(category.to_string());
        }
        qb.push(")");
        conjunction = " AND ";
    }
    if !filter.sources.is_empty() {
        qb.push(conjunction).push("source IN (");
        let mut values = qb.separated(", ");
        for source in &filter.sources {
            values.push_bind(source.to_string());
        }
        qb.push(")");
        conjunction = " AND ";
    }
    if let Some(range) = filter.range {
        qb.push(conjunction)
            .push("date BETWEEN ")
            .push_bind(range.start.to_string())
            .push(" AND ")
            .push_bind(range.end.to_string());
    }
    qb.push(" ORDER BY date DESC, id DESC");

    let rows = qb.build_query_as::<ExpenseRow>().fetch_all(pool).await?;
    rows.into_iter().map(row_to_expense).collect()
}

pub async fn count_expenses(pool: &DbPool) -> Result<i64, StorageError> {
    let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM expenses")
        .fetch_one(pool)
        .await?;
    Ok(n)
}

fn row_to_expense(r: ExpenseRow) -> Result<Expense, StorageError> {
    let (id, description, amount_cents, category, date, source, created_at) = r;
    let corrupt = |reason: String| StorageError::Corrupt { id, reason };

    let category = Category::from_str(&category).map_err(corrupt)?;
    let source = Source::from_str(&source).map_err(corrupt)?;
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|e| corrupt(format!("bad date '{date}': {e}")))?;

    Ok(Expense {
        id: ExpenseId(id),
        description,
        amount: Money::from_cents(amount_cents),
        category,
        date,
        source,
        created_at: parse_sqlite_timestamp(&created_at),
    })
}

fn parse_sqlite_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
