//! Dialect capability flags and identifier decoration.

/// How the driver expects bound parameters to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamMarker {
    /// `$1`, `$2`, ... (PostgreSQL)
    Dollar,
    /// `?` positional (generic/ODBC)
    Question,
    /// `@p1`, `@p2`, ... (SQL Server)
    At,
}

/// Capability flags of a backend dialect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub limit_offset: bool,
    pub top: bool,
    pub first_skip: bool,
    pub lock_hints: bool,
    pub introspection: bool,
}

impl Capabilities {
    /// True when any row-limiting syntax is available.
    pub fn supports_row_limit(&self) -> bool {
        self.limit_offset || self.top || self.first_skip
    }
}

/// A backend dialect: capability flags plus identifier/quote conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub name: &'static str,
    pub caps: Capabilities,
    pub marker: ParamMarker,
    pub null_literal: &'static str,
}

impl Default for Dialect {
    fn default() -> Self {
        Self::ansi()
    }
}

impl Dialect {
    /// Generic ANSI dialect: double-quoted identifiers, LIMIT/OFFSET.
    pub fn ansi() -> Self {
        Self {
            name: "ansi",
            caps: Capabilities {
                limit_offset: true,
                ..Capabilities::default()
            },
            marker: ParamMarker::Question,
            null_literal: "NULL",
        }
    }

    pub fn postgres() -> Self {
        Self {
            name: "postgres",
            caps: Capabilities {
                limit_offset: true,
                lock_hints: true,
                introspection: true,
                ..Capabilities::default()
            },
            marker: ParamMarker::Dollar,
            null_literal: "NULL",
        }
    }

    /// SQL Server: prefix `TOP n`, `@pN` markers.
    pub fn sql_server() -> Self {
        Self {
            name: "sqlserver",
            caps: Capabilities {
                top: true,
                lock_hints: true,
                introspection: true,
                ..Capabilities::default()
            },
            marker: ParamMarker::At,
            null_literal: "NULL",
        }
    }

    /// Firebird: prefix `FIRST n SKIP m`.
    pub fn firebird() -> Self {
        Self {
            name: "firebird",
            caps: Capabilities {
                first_skip: true,
                ..Capabilities::default()
            },
            marker: ParamMarker::Question,
            null_literal: "NULL",
        }
    }

    /// A dialect with no row-limiting capability at all. Used in tests and
    /// for backends that paginate at the cursor level.
    pub fn bare() -> Self {
        Self {
            name: "bare",
            caps: Capabilities::default(),
            marker: ParamMarker::Question,
            null_literal: "NULL",
        }
    }

    /// Decorate an identifier with the dialect's quoting.
    ///
    /// `*` and already-decorated names pass through unchanged.
    pub fn decorate(&self, name: &str) -> String {
        if name == "*" || (name.starts_with('"') && name.ends_with('"')) {
            return name.to_string();
        }
        let mut out = String::with_capacity(name.len() + 2);
        out.push('"');
        for ch in name.chars() {
            if ch == '"' {
                out.push('"');
            }
            out.push(ch);
        }
        out.push('"');
        out
    }

    /// Inverse of [`Dialect::decorate`].
    pub fn strip(&self, name: &str) -> String {
        if name.len() >= 2 && name.starts_with('"') && name.ends_with('"') {
            name[1..name.len() - 1].replace("\"\"", "\"")
        } else {
            name.to_string()
        }
    }

    /// Render the driver marker for the parameter at `ordinal` (1-based).
    pub fn param_marker(&self, ordinal: usize) -> String {
        match self.marker {
            ParamMarker::Dollar => format!("${ordinal}"),
            ParamMarker::Question => "?".to_string(),
            ParamMarker::At => format!("@p{ordinal}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decorate_wraps_in_double_quotes() {
        let d = Dialect::ansi();
        assert_eq!(d.decorate("users"), "\"users\"");
        assert_eq!(d.decorate("*"), "*");
        assert_eq!(d.decorate("\"already\""), "\"already\"");
    }

    #[test]
    fn decorate_escapes_embedded_quotes() {
        let d = Dialect::ansi();
        assert_eq!(d.decorate("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(d.strip("\"we\"\"ird\""), "we\"ird");
    }

    #[test]
    fn strip_is_inverse_of_decorate() {
        let d = Dialect::postgres();
        for name in ["users", "CamelCase", "a\"b"] {
            assert_eq!(d.strip(&d.decorate(name)), name);
        }
    }

    #[test]
    fn capability_flags() {
        assert!(Dialect::postgres().caps.supports_row_limit());
        assert!(Dialect::sql_server().caps.top);
        assert!(Dialect::firebird().caps.first_skip);
        assert!(!Dialect::bare().caps.supports_row_limit());
    }

    #[test]
    fn param_markers() {
        assert_eq!(Dialect::postgres().param_marker(3), "$3");
        assert_eq!(Dialect::ansi().param_marker(3), "?");
        assert_eq!(Dialect::sql_server().param_marker(3), "@p3");
    }
}
