use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpenseId(pub i64);

impl fmt::Display for ExpenseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Food,
    Transport,
    Utilities,
    Entertainment,
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Food,
        Category::Transport,
        Category::Utilities,
        Category::Entertainment,
        Category::Other,
    ];
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Food => write!(f, "food"),
            Category::Transport => write!(f, "transport"),
            Category::Utilities => write!(f, "utilities"),
            Category::Entertainment => write!(f, "entertainment"),
            Category::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "food" => Ok(Category::Food),
            "transport" => Ok(Category::Transport),
            "utilities" => Ok(Category::Utilities),
            "entertainment" => Ok(Category::Entertainment),
            "other" => Ok(Category::Other),
            other => Err(format!("Unknown category: '{other}'")),
        }
    }
}

/// Provenance tag: typed in by hand, or accepted from a parsed receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Manual,
    Ocr,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Manual => write!(f, "manual"),
            Source::Ocr => write!(f, "ocr"),
        }
    }
}

impl std::str::FromStr for Source {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "manual" => Ok(Source::Manual),
            "ocr" => Ok(Source::Ocr),
            other => Err(format!("Unknown source: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpenseError {
    #[error("Enter description")]
    EmptyDescription,
    #[error("Enter valid amount")]
    NonPositiveAmount(Money),
    #[error("Amount {0} is too large to store")]
    AmountOutOfRange(Money),
    #[error("Select category")]
    MissingCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExpense {
    pub description: String,
    pub amount: Money,
    pub category: Option<Category>,
    pub date: NaiveDate,
    pub source: Source,
}

/// An expense that passed entry validation and is ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatedExpense {
    pub description: String,
    pub amount: Money,
    pub category: Category,
    pub date: NaiveDate,
    pub source: Source,
    amount_cents: i64,
}

impl ValidatedExpense {
    pub fn validate(expense: NewExpense) -> Result<ValidatedExpense, ExpenseError> {
        let description = expense.description.trim();
        if description.is_empty() {
            return Err(ExpenseError::EmptyDescription);
        }
        if !expense.amount.is_positive() {
            return Err(ExpenseError::NonPositiveAmount(expense.amount));
        }
        let amount_cents = expense
            .amount
            .to_cents()
            .ok_or(ExpenseError::AmountOutOfRange(expense.amount))?;
        let category = expense.category.ok_or(ExpenseError::MissingCategory)?;

        Ok(ValidatedExpense {
            description: description.to_string(),
            amount: expense.amount,
            category,
            date: expense.date,
            source: expense.source,
            amount_cents,
        })
    }

    pub fn amount_cents(&self) -> i64 {
        self.amount_cents
    }
}

/// A stored expense record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub description: String,
    pub amount: Money,
    pub category: Category,
    pub date: NaiveDate,
    pub source: Source,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}
