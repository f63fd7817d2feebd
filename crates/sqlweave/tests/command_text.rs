//! End-to-end text generation checks across builders and dialects.

use sqlweave::prelude::*;
use sqlweave::schema::{ColumnInfo, SchemaRegistry, TableSchema};
use sqlweave::value::DbType;

fn customer_schemas() -> std::sync::Arc<SchemaRegistry> {
    SchemaRegistry::new()
        .with(
            TableSchema::new("Customer")
                .owner("crm")
                .column("Id", ColumnInfo::new(DbType::BigInt).key())
                .column("Name", ColumnInfo::new(DbType::Text))
                .column("Balance", ColumnInfo::new(DbType::Double)),
        )
        .shared()
}

#[test]
fn from_renders_owner_table_and_alias() {
    let q = select()
        .from(|t| t.member("crm").member("Customer").as_alias("c"))
        .unwrap();
    assert_eq!(
        q.command_text().unwrap(),
        "SELECT * FROM \"crm\".\"Customer\" AS c"
    );
}

#[test]
fn single_condition_yields_single_parameter() {
    let q = select()
        .with_schemas(customer_schemas())
        .from(|t| t.member("crm").member("Customer").as_alias("c"))
        .unwrap()
        .and_where(|t| t.member("c").col("Name").eq("Ada"));
    let (text, params) = (q.command_text().unwrap(), q.parameters().unwrap());
    assert_eq!(
        text,
        "SELECT * FROM \"crm\".\"Customer\" AS c WHERE (c.\"Name\" = @p0)"
    );
    assert_eq!(params.len(), 1);
    assert_eq!(params.get("p0").unwrap().db_type, DbType::Text);
}

#[test]
fn n_conditions_produce_n_minus_one_connectives() {
    let mut q = select().from_table("t").unwrap();
    for i in 0..5 {
        q = q.and_where(move |t| t.col("c").eq(i as i64));
    }
    let text = q.command_text().unwrap();
    assert_eq!(text.matches(" AND ").count(), 4);
    assert_eq!(text.matches('(').count(), text.matches(')').count());
}

#[test]
fn or_where_switches_connective() {
    let q = select()
        .from_table("t")
        .unwrap()
        .and_where(|t| t.col("a").eq(1i64))
        .or_where(|t| t.col("b").eq(2i64));
    let text = q.command_text().unwrap();
    assert!(text.contains(" OR "));
    assert!(!text.contains(" AND "));
}

#[test]
fn join_on_may_reference_a_later_alias() {
    // Aliases are registered when joins are declared; ON conditions are
    // compiled only at build time, so the first ON can mention the second
    // join's alias.
    let q = select()
        .from(|t| t.member("users").as_alias("u"))
        .unwrap()
        .join(|t| {
            t.member("orders").as_alias("o").inner().on(
                t.member("o")
                    .col("user_id")
                    .eq(t.member("u").col("id"))
                    .and(t.member("o").col("region_id").eq(t.member("r").col("id"))),
            )
        })
        .unwrap()
        .join(|t| {
            t.member("regions")
                .as_alias("r")
                .left()
                .on(t.member("r").col("active").eq(true))
        })
        .unwrap();
    let text = q.command_text().unwrap();
    assert!(text.contains("INNER JOIN \"orders\" AS o ON"));
    assert!(text.contains("LEFT JOIN \"regions\" AS r ON"));
    assert!(text.contains("r.\"id\""));
}

#[test]
fn command_text_is_byte_identical_across_calls() {
    let q = select()
        .with_dialect(Dialect::postgres())
        .from(|t| t.member("crm").member("Customer").as_alias("c"))
        .unwrap()
        .select(|t| t.member("c").col("Name"))
        .and_where(|t| t.member("c").col("Balance").gt(0.0f64))
        .and_where(|t| t.member("c").col("Name").like("A%"))
        .order_by(|t| t.member("c").col("Name").asc());
    let first = q.command_text().unwrap();
    for _ in 0..3 {
        assert_eq!(q.command_text().unwrap(), first);
    }
    // Parameters do not accumulate across rebuilds either.
    assert_eq!(q.parameters().unwrap().len(), 2);
    assert_eq!(q.parameters().unwrap().len(), 2);
}

#[test]
fn between_forms_are_equivalent() {
    let two_arg = select()
        .from_table("t")
        .unwrap()
        .and_where(|t| t.col("n").between(1i64, 9i64))
        .command_text()
        .unwrap();
    let array_form = select()
        .from_table("t")
        .unwrap()
        .and_where(|t| t.col("n").between_array(Value::array([1i64, 9i64])))
        .command_text()
        .unwrap();
    assert_eq!(two_arg, array_form);
}

#[test]
fn in_forms_are_equivalent() {
    let list = select()
        .from_table("t")
        .unwrap()
        .and_where(|t| t.col("n").in_list(vec![1i64, 2i64, 3i64]))
        .command_text()
        .unwrap();
    let array_form = select()
        .from_table("t")
        .unwrap()
        .and_where(|t| t.col("n").in_list(vec![Value::array([1i64, 2i64, 3i64])]))
        .command_text()
        .unwrap();
    assert_eq!(list, array_form);
    assert!(list.contains("\"n\" IN(@p0, @p1, @p2)"));
}

#[test]
fn row_limit_unsupported_is_a_clean_failure() {
    let q = select()
        .with_dialect(Dialect::bare())
        .from_table("t")
        .unwrap();
    let before = q.command_text().unwrap();
    let err = q.clone().limit(10).unwrap_err();
    assert!(err.is_not_supported());
    // The original builder still produces the same statement.
    assert_eq!(q.command_text().unwrap(), before);
}

#[test]
fn dialect_prefix_and_suffix_limits() {
    let pg = select()
        .with_dialect(Dialect::postgres())
        .from_table("t")
        .unwrap()
        .limit(10)
        .unwrap()
        .offset(5)
        .unwrap()
        .command_text()
        .unwrap();
    assert!(pg.ends_with("LIMIT 10 OFFSET 5"));

    let fb = select()
        .with_dialect(Dialect::firebird())
        .from_table("t")
        .unwrap()
        .limit(10)
        .unwrap()
        .offset(5)
        .unwrap()
        .command_text()
        .unwrap();
    assert!(fb.starts_with("SELECT FIRST 10 SKIP 5 "));

    let ms = select()
        .with_dialect(Dialect::sql_server())
        .from_table("t")
        .unwrap()
        .top(10)
        .unwrap()
        .command_text()
        .unwrap();
    assert!(ms.starts_with("SELECT TOP 10 "));
}

#[test]
fn bind_markers_follow_discovery_order() {
    let q = select()
        .with_dialect(Dialect::postgres())
        .from_table("t")
        .unwrap()
        .and_where(|t| t.col("a").eq("x"))
        .and_where(|t| t.col("b").eq("y"));
    let bound = q.bind().unwrap();
    assert!(bound.sql.contains("$1"));
    assert!(bound.sql.contains("$2"));
    assert_eq!(
        bound.values,
        vec![Value::from("x"), Value::from("y")]
    );
}

#[test]
fn repeated_named_parameter_binds_once_for_numbered_markers() {
    let q = select()
        .with_dialect(Dialect::postgres())
        .from_table("t")
        .unwrap()
        .param("needle", "x")
        .and_where(|_| "a = @needle")
        .and_where(|_| "b = @needle");
    let bound = q.bind().unwrap();
    assert_eq!(bound.sql.matches("$1").count(), 2);
    assert_eq!(bound.values.len(), 1);
}

#[test]
fn named_parameter_cannot_shadow_opaque_tokens() {
    // A well-known parameter named like an allocator token would capture
    // the opaque token's bind site and drop the captured constant.
    let q = select()
        .with_dialect(Dialect::postgres())
        .from_table("t")
        .unwrap()
        .param("p0", 999i64)
        .and_where(|t| t.col("a").eq("opaque-value"))
        .and_where(|_| "b = @p0");
    assert!(matches!(q.bind().unwrap_err(), SqlError::Argument(_)));

    // The same statement with a non-reserved name binds both values.
    let q = select()
        .with_dialect(Dialect::postgres())
        .from_table("t")
        .unwrap()
        .param("cutoff", 999i64)
        .and_where(|t| t.col("a").eq("opaque-value"))
        .and_where(|_| "b = @cutoff");
    let bound = q.bind().unwrap();
    assert_eq!(
        bound.sql,
        "SELECT * FROM \"t\" WHERE (\"a\" = $1) AND b = $2"
    );
    assert_eq!(
        bound.values,
        vec![Value::from("opaque-value"), Value::from(999i64)]
    );
}

#[test]
fn full_statement_family_round_trip() {
    let schemas = customer_schemas();

    let ins = insert("crm.Customer")
        .with_schemas(schemas.clone())
        .value("Name", "Ada")
        .value("Balance", 10.5f64);
    assert_eq!(
        ins.command_text().unwrap(),
        "INSERT INTO \"crm\".\"Customer\" (\"Name\", \"Balance\") VALUES (@p0, @p1)"
    );

    let upd = update("crm.Customer")
        .with_schemas(schemas.clone())
        .update("Id", 7i64)
        .update("Name", "Grace");
    assert_eq!(
        upd.command_text().unwrap(),
        "UPDATE \"crm\".\"Customer\" SET \"Name\" = @p0 WHERE (\"Id\" = @p1)"
    );

    let del = delete("crm.Customer")
        .with_schemas(schemas)
        .and_where(|t| t.col("Id").eq(7i64));
    assert_eq!(
        del.command_text().unwrap(),
        "DELETE FROM \"crm\".\"Customer\" WHERE (\"Id\" = @p0)"
    );
}

#[test]
fn null_comparisons_fold_to_is_null() {
    let q = select()
        .from_table("t")
        .unwrap()
        .and_where(|t| t.col("deleted_at").eq(Value::Null))
        .and_where(|t| t.col("email").ne(Value::Null));
    assert_eq!(
        q.command_text().unwrap(),
        "SELECT * FROM \"t\" WHERE (\"deleted_at\" IS NULL) AND (\"email\" IS NOT NULL)"
    );
    assert!(q.parameters().unwrap().is_empty());
}

#[test]
fn subquery_tokens_continue_parent_numbering() {
    let inner = select()
        .from_table("orders")
        .unwrap()
        .select(|t| t.col("user_id"))
        .and_where(|t| t.col("total").gt(100i64));
    let q = select()
        .from_table("users")
        .unwrap()
        .and_where(|t| t.col("active").eq(true))
        .and_where(move |t| t.col("id").in_query(inner));
    let (text, params) = (q.command_text().unwrap(), q.parameters().unwrap());
    assert!(text.contains("@p0"));
    assert!(text.contains("@p1"));
    assert_eq!(params.len(), 2);
}

#[test]
fn explicit_groups_balance() {
    let q = select()
        .from_table("t")
        .unwrap()
        .and_where(|t| t.col("a").eq(1i64))
        .where_group_start()
        .and_where(|t| t.col("b").eq(2i64))
        .or_where(|t| t.col("c").eq(3i64))
        .where_group_end()
        .unwrap();
    let text = q.command_text().unwrap();
    assert!(text.contains("AND ((\"b\" = @p1) OR (\"c\" = @p2))"));
    assert_eq!(text.matches('(').count(), text.matches(')').count());
}
