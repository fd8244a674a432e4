pub mod expense;
pub mod money;
pub mod period;
pub mod stats;

pub use expense::{Category, Expense, ExpenseError, ExpenseId, NewExpense, Source, ValidatedExpense};
pub use money::Money;
pub use period::{DateRange, Month};
pub use stats::{breakdown_by_category, breakdown_by_source, ExpenseStats};
