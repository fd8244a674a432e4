use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use spendscan_core::{Category, ExpenseError, Money, NewExpense, Source, ValidatedExpense};
use thiserror::Error;

use crate::extract::MAX_DESCRIPTION_CHARS;

/// One recognized `(description, amount)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub amount: Money,
}

impl LineItem {
    /// Builds an item, cutting the description down to
    /// [`MAX_DESCRIPTION_CHARS`] characters.
    pub fn new(description: &str, amount: Money) -> Self {
        let description: String = description.chars().take(MAX_DESCRIPTION_CHARS).collect();
        Self { description: description.trim_end().to_string(), amount }
    }
}

/// Which item strategy produced [`ParseResult::items`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStrategy {
    /// Description line followed by a price line.
    Paired,
    /// Per-line regex fallback.
    SingleLine,
    /// Neither strategy found anything.
    Nothing,
}

impl std::fmt::Display for ItemStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemStrategy::Paired => write!(f, "paired"),
            ItemStrategy::SingleLine => write!(f, "single_line"),
            ItemStrategy::Nothing => write!(f, "nothing"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseResult {
    pub items: Vec<LineItem>,
    /// Detected grand total; zero when no total line was found.
    pub total: Money,
    pub strategy: ItemStrategy,
}

impl ParseResult {
    pub fn empty() -> Self {
        Self { items: vec![], total: Money::zero(), strategy: ItemStrategy::Nothing }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items_sum(&self) -> Money {
        self.items.iter().map(|i| i.amount).sum()
    }

    /// Turn every item into an editable review row, included by default.
    pub fn review(&self, default_category: Category) -> Vec<ReviewItem> {
        self.items
            .iter()
            .map(|item| ReviewItem {
                description: item.description.clone(),
                amount: item.amount,
                category: default_category,
                include: true,
            })
            .collect()
    }
}

/// A parsed item as the user reviews it before saving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub description: String,
    pub amount: Money,
    pub category: Category,
    pub include: bool,
}

impl ReviewItem {
    pub fn into_new_expense(self, date: NaiveDate) -> NewExpense {
        NewExpense {
            description: self.description,
            amount: self.amount,
            category: Some(self.category),
            date,
            source: Source::Ocr,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Item {}: {}", .index + 1, .source)]
pub struct ReviewError {
    /// Zero-based position of the offending row.
    pub index: usize,
    #[source]
    pub source: ExpenseError,
}

/// Validate the included rows, tagging them as receipt-derived and dated `date`.
pub fn accepted_expenses(
    rows: Vec<ReviewItem>,
    date: NaiveDate,
) -> Result<Vec<ValidatedExpense>, ReviewError> {
    rows.into_iter()
        .enumerate()
        .filter(|(_, row)| row.include)
        .map(|(index, row)| {
            ValidatedExpense::validate(row.into_new_expense(date))
                .map_err(|source| ReviewError { index, source })
        })
        .collect()
}
