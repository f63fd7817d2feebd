//! Parameter bag and opaque-token substitution.
//!
//! The compiler never writes driver placeholder syntax directly. It
//! allocates an opaque token (`@p0`, `@p1`, ... or `@name` for well-known
//! parameters) in a [`ParamBag`] and embeds the token in the generated text.
//! [`bind`] later substitutes every token with the real driver marker,
//! assigning ordinals in token-discovery order.

use crate::dialect::{Dialect, ParamMarker};
use crate::error::{SqlError, SqlResult};
use crate::value::{DbType, Value};

/// One named parameter owned by a builder.
#[derive(Debug, Clone)]
pub struct Parameter {
    /// Opaque (`p0`) or well-known (caller-chosen) name, without the `@`.
    pub name: String,
    pub value: Value,
    pub db_type: DbType,
    /// Assigned only once bound to a concrete command.
    pub ordinal: Option<usize>,
    /// True when the surrounding builder composes a template rather than a
    /// bindable statement.
    pub is_virtual: bool,
    pub well_known: bool,
}

/// Ordered token → parameter map accumulated during one build.
#[derive(Debug, Clone, Default)]
pub struct ParamBag {
    params: Vec<Parameter>,
    next: usize,
    virtual_mode: bool,
}

impl ParamBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bag whose parameters are all flagged virtual (template mode).
    pub fn template() -> Self {
        Self {
            virtual_mode: true,
            ..Self::default()
        }
    }

    pub fn is_virtual(&self) -> bool {
        self.virtual_mode
    }

    /// Allocate an opaque parameter, returning its token text.
    pub fn add(&mut self, value: Value, db_type: DbType) -> String {
        let name = format!("p{}", self.next);
        self.next += 1;
        self.params.push(Parameter {
            name: name.clone(),
            value,
            db_type,
            ordinal: None,
            is_virtual: self.virtual_mode,
            well_known: false,
        });
        format!("@{name}")
    }

    /// Register a well-known (caller-named) parameter, returning its token.
    ///
    /// Names of the form `pN` are reserved for the opaque allocator; a
    /// well-known parameter shadowing one would make [`bind`] silently
    /// resolve the opaque token's site to the wrong value.
    pub fn add_named(&mut self, name: &str, value: Value) -> SqlResult<String> {
        if name.is_empty() || !name.chars().all(|c| c == '_' || c.is_ascii_alphanumeric()) {
            return Err(SqlError::argument(format!("invalid parameter name '{name}'")));
        }
        if is_opaque_name(name) {
            return Err(SqlError::argument(format!(
                "parameter name '{name}' collides with the opaque token namespace"
            )));
        }
        let db_type = value.db_type();
        self.params.push(Parameter {
            name: name.to_string(),
            value,
            db_type,
            ordinal: None,
            is_virtual: self.virtual_mode,
            well_known: true,
        });
        Ok(format!("@{name}"))
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// True for names the opaque allocator produces (`p0`, `p1`, ...).
fn is_opaque_name(name: &str) -> bool {
    let Some(rest) = name.strip_prefix('p') else {
        return false;
    };
    !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit())
}

/// A statement ready for the driver: marker syntax plus values in
/// discovery order.
#[derive(Debug, Clone)]
pub struct BoundStatement {
    pub sql: String,
    pub values: Vec<Value>,
}

/// Substitute every opaque token in `text` with the dialect's marker.
///
/// Ordinals are assigned in token-discovery order. For numbered markers
/// (`$n`, `@pn`) a token seen twice reuses its first ordinal; for positional
/// `?` markers the value is repeated per occurrence.
pub fn bind(text: &str, bag: &mut ParamBag, dialect: &Dialect) -> SqlResult<BoundStatement> {
    let mut sql = String::with_capacity(text.len());
    let mut values: Vec<Value> = Vec::with_capacity(bag.len());
    let mut chars = text.char_indices().peekable();

    while let Some((_, ch)) = chars.next() {
        if ch != '@' {
            sql.push(ch);
            continue;
        }
        let mut name = String::new();
        while let Some(&(_, next)) = chars.peek() {
            if next == '_' || next.is_ascii_alphanumeric() {
                name.push(next);
                chars.next();
            } else {
                break;
            }
        }
        if name.is_empty() {
            sql.push('@');
            continue;
        }
        let param = bag
            .params
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| SqlError::validation(format!("unknown parameter token '@{name}'")))?;
        match dialect.marker {
            ParamMarker::Question => {
                values.push(param.value.clone());
                param.ordinal.get_or_insert(values.len());
                sql.push('?');
            }
            _ => {
                let ordinal = match param.ordinal {
                    Some(n) => n,
                    None => {
                        values.push(param.value.clone());
                        let n = values.len();
                        param.ordinal = Some(n);
                        n
                    }
                };
                sql.push_str(&dialect.param_marker(ordinal));
            }
        }
    }

    tracing::debug!(sql = %sql, params = values.len(), "bound statement");
    Ok(BoundStatement { sql, values })
}
