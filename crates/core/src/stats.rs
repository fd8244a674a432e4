use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::expense::{Category, Expense, Source};
use crate::money::Money;
use crate::period::Month;

/// Headline spending figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpenseStats {
    pub total: Money,
    /// Spent in the calendar month containing `today`.
    pub month: Money,
    /// `total` divided by the number of distinct days that have expenses.
    pub avg_daily: Money,
    pub count: usize,
}

impl ExpenseStats {
    pub fn compute(expenses: &[Expense], today: NaiveDate) -> Self {
        let current = Month::of(today);
        let total: Money = expenses.iter().map(|e| e.amount).sum();
        let month: Money = expenses
            .iter()
            .filter(|e| current.contains(e.date))
            .map(|e| e.amount)
            .sum();
        let days: BTreeSet<NaiveDate> = expenses.iter().map(|e| e.date).collect();

        ExpenseStats {
            total,
            month,
            avg_daily: total / days.len(),
            count: expenses.len(),
        }
    }
}

/// Summed amounts per category, in category order, omitting empty ones.
pub fn breakdown_by_category(expenses: &[Expense]) -> Vec<(Category, Money)> {
    group_sum(expenses, |e| e.category)
}

/// Summed amounts per provenance tag.
pub fn breakdown_by_source(expenses: &[Expense]) -> Vec<(Source, Money)> {
    group_sum(expenses, |e| e.source)
}

fn group_sum<K: Ord>(expenses: &[Expense], key: impl Fn(&Expense) -> K) -> Vec<(K, Money)> {
    let mut groups: BTreeMap<K, Money> = BTreeMap::new();
    for e in expenses {
        let slot = groups.entry(key(e)).or_default();
        *slot = *slot + e.amount;
    }
    groups.into_iter().collect()
}
