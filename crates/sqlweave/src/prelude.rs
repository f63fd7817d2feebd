//! Convenience re-exports for the common call sites.

pub use crate::builder::{delete, insert, select, update, SqlStatement};
pub use crate::capture::{Capture, IntoOperand};
pub use crate::dialect::Dialect;
pub use crate::error::{SqlError, SqlResult};
#[cfg(feature = "postgres")]
pub use crate::exec::{ExecuteStatement, GenericClient};
pub use crate::value::Value;
