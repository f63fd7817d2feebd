//! Fluent, dialect-aware SQL construction from captured expression graphs.
//!
//! Query shapes are described with closures over placeholder handles. Each
//! operation on a handle is recorded into an operation graph; builders keep
//! those graphs and compile them on demand into parameterized SQL for a
//! chosen dialect. Constants never reach the text: they become opaque
//! tokens backed by a parameter bag, substituted with real driver markers
//! at bind time.
//!
//! ```
//! use sqlweave::prelude::*;
//!
//! let q = select()
//!     .with_dialect(Dialect::postgres())
//!     .from(|t| t.member("public").member("users").as_alias("u"))?
//!     .select(|t| t.member("u").col("email"))
//!     .and_where(|t| t.member("u").col("active").eq(true));
//!
//! assert_eq!(
//!     q.command_text()?,
//!     "SELECT u.\"email\" FROM \"public\".\"users\" AS u WHERE (u.\"active\" = @p0)"
//! );
//!
//! let bound = q.bind()?;
//! assert_eq!(
//!     bound.sql,
//!     "SELECT u.\"email\" FROM \"public\".\"users\" AS u WHERE (u.\"active\" = $1)"
//! );
//! # Ok::<(), sqlweave::SqlError>(())
//! ```
//!
//! Builders are single-threaded: captured graphs are shared through `Rc`,
//! so a builder is built, compiled, and executed on one task.

pub mod builder;
pub mod capture;
mod compile;
pub mod dialect;
pub mod error;
#[cfg(feature = "postgres")]
pub mod exec;
pub mod graph;
pub mod param;
pub mod prelude;
pub mod schema;
pub mod value;

pub use builder::{
    delete, insert, select, update, DeleteStatement, InsertStatement, JoinKind, SelectQuery,
    SqlStatement, TableEntry, UpdateStatement,
};
pub use capture::{Capture, Captured, Expr, IntoCaptured, IntoOperand};
pub use dialect::{Capabilities, Dialect, ParamMarker};
pub use error::{SqlError, SqlResult};
#[cfg(feature = "postgres")]
pub use exec::{ExecuteStatement, GenericClient};
pub use param::{bind, BoundStatement, ParamBag, Parameter};
pub use schema::{ColumnInfo, SchemaProvider, SchemaRegistry, TableSchema};
pub use value::{DbType, Value};
