//! Fluent statement builders.
//!
//! Builders accumulate captured specifications and compile them lazily:
//! text and parameters are produced by [`SqlStatement::build`], never
//! mutated in place. Builders are single-threaded by design (captured
//! graphs are shared through `Rc`) and are meant to be built and consumed
//! on one task.

pub(crate) mod table;
pub(crate) mod where_clause;

mod delete;
mod insert;
mod select;
mod traits;
mod update;

pub use delete::DeleteStatement;
pub use insert::InsertStatement;
pub use select::SelectQuery;
pub use table::{JoinKind, TableEntry};
pub use traits::SqlStatement;
pub use update::UpdateStatement;

/// Start a SELECT against the default (ANSI) dialect.
pub fn select() -> SelectQuery {
    SelectQuery::new()
}

/// Start an INSERT into `table` (`"owner.table"` accepted).
pub fn insert(table: &str) -> InsertStatement {
    InsertStatement::new(table)
}

/// Start an UPDATE of `table`.
pub fn update(table: &str) -> UpdateStatement {
    UpdateStatement::new(table)
}

/// Start a DELETE from `table`.
pub fn delete(table: &str) -> DeleteStatement {
    DeleteStatement::new(table)
}
