pub mod db;

pub use db::{
    count_expenses, create_db, create_memory_db, delete_expense, get_expense_by_id, get_expenses,
    insert_expense, insert_expenses, DbPool, ExpenseFilter, StorageError,
};
