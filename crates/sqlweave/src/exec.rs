//! Execution collaborator: bind a built statement and run it against
//! `tokio-postgres`.
//!
//! Builders hold `Rc`-shared capture graphs, so statement futures are not
//! `Send`; build and execute on one task. The [`GenericClient`] trait
//! unifies clients and transactions so the same code runs inside or
//! outside a transaction.

use bytes::BytesMut;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use tokio_postgres::Row;

use crate::builder::SqlStatement;
use crate::error::{SqlError, SqlResult};
use crate::value::Value;

fn exec_err(command: &str, source: tokio_postgres::Error) -> SqlError {
    SqlError::Execution {
        command: command.to_string(),
        source,
    }
}

/// A trait that unifies database clients and transactions.
pub trait GenericClient {
    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = SqlResult<Vec<Row>>>;

    /// Execute a query and return the first row, if any.
    fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = SqlResult<Option<Row>>>;

    /// Execute a statement and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = SqlResult<u64>>;

    /// Execute a query and require one row.
    fn query_one(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> impl std::future::Future<Output = SqlResult<Row>> {
        async move {
            self.query_opt(sql, params).await?.ok_or_else(|| {
                SqlError::validation(format!("query returned no rows: `{sql}`"))
            })
        }
    }
}

impl GenericClient for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> SqlResult<Vec<Row>> {
        tokio_postgres::Client::query(self, sql, params)
            .await
            .map_err(|e| exec_err(sql, e))
    }

    async fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> SqlResult<Option<Row>> {
        tokio_postgres::Client::query_opt(self, sql, params)
            .await
            .map_err(|e| exec_err(sql, e))
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> SqlResult<u64> {
        tokio_postgres::Client::execute(self, sql, params)
            .await
            .map_err(|e| exec_err(sql, e))
    }
}

impl GenericClient for tokio_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> SqlResult<Vec<Row>> {
        tokio_postgres::Transaction::query(self, sql, params)
            .await
            .map_err(|e| exec_err(sql, e))
    }

    async fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> SqlResult<Option<Row>> {
        tokio_postgres::Transaction::query_opt(self, sql, params)
            .await
            .map_err(|e| exec_err(sql, e))
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> SqlResult<u64> {
        tokio_postgres::Transaction::execute(self, sql, params)
            .await
            .map_err(|e| exec_err(sql, e))
    }
}

impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => b.to_sql(ty, out),
            // Integers narrow to the column's wire type.
            Value::Int(i) => {
                if *ty == Type::INT2 {
                    (*i as i16).to_sql(ty, out)
                } else if *ty == Type::INT4 {
                    (*i as i32).to_sql(ty, out)
                } else {
                    i.to_sql(ty, out)
                }
            }
            Value::Float(f) => {
                if *ty == Type::FLOAT4 {
                    (*f as f32).to_sql(ty, out)
                } else {
                    f.to_sql(ty, out)
                }
            }
            Value::Text(s) => s.to_sql(ty, out),
            Value::Bytes(b) => (&b[..]).to_sql(ty, out),
            Value::Uuid(u) => u.to_sql(ty, out),
            Value::Timestamp(t) => t.to_sql(ty, out),
            Value::Json(j) => j.to_sql(ty, out),
            Value::Array(items) => items.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // Mismatches surface as conversion errors at bind time.
        true
    }

    to_sql_checked!();
}

fn param_refs(values: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    values.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

/// Bind-and-run extension for every statement builder.
pub trait ExecuteStatement: SqlStatement {
    /// Bind and fetch all rows.
    fn fetch(
        &self,
        client: &impl GenericClient,
    ) -> impl std::future::Future<Output = SqlResult<Vec<Row>>> {
        async move {
            let bound = self.bind()?;
            let params = param_refs(&bound.values);
            client.query(&bound.sql, &params).await
        }
    }

    /// Bind and fetch the first row, if any.
    fn fetch_opt(
        &self,
        client: &impl GenericClient,
    ) -> impl std::future::Future<Output = SqlResult<Option<Row>>> {
        async move {
            let bound = self.bind()?;
            let params = param_refs(&bound.values);
            client.query_opt(&bound.sql, &params).await
        }
    }

    /// Bind and fetch exactly one row.
    fn fetch_one(
        &self,
        client: &impl GenericClient,
    ) -> impl std::future::Future<Output = SqlResult<Row>> {
        async move {
            let bound = self.bind()?;
            let params = param_refs(&bound.values);
            client.query_one(&bound.sql, &params).await
        }
    }

    /// Bind and execute, returning the affected row count.
    fn run(
        &self,
        client: &impl GenericClient,
    ) -> impl std::future::Future<Output = SqlResult<u64>> {
        async move {
            let bound = self.bind()?;
            let params = param_refs(&bound.values);
            client.execute(&bound.sql, &params).await
        }
    }
}

impl<T: SqlStatement> ExecuteStatement for T {}
