//! The common surface of all statement builders.

use crate::dialect::Dialect;
use crate::error::SqlResult;
use crate::param::{self, BoundStatement, ParamBag};

/// A builder that can compile itself into SQL text plus parameters.
///
/// Builders hold immutable captured specifications; every call recompiles
/// from scratch into a fresh [`ParamBag`], so repeated calls yield
/// byte-identical text and never duplicate parameters.
pub trait SqlStatement {
    /// Compile into text with opaque parameter tokens, plus the bag that
    /// owns the parameter values.
    fn build(&self) -> SqlResult<(String, ParamBag)>;

    /// The dialect this statement targets.
    fn dialect(&self) -> &Dialect;

    /// The SQL text with opaque tokens (`@p0`, `@name`).
    fn command_text(&self) -> SqlResult<String> {
        Ok(self.build()?.0)
    }

    /// The parameters the statement would carry.
    fn parameters(&self) -> SqlResult<ParamBag> {
        Ok(self.build()?.1)
    }

    /// Substitute opaque tokens with the dialect's driver markers and
    /// collect values in discovery order.
    fn bind(&self) -> SqlResult<BoundStatement> {
        let (text, mut bag) = self.build()?;
        param::bind(&text, &mut bag, self.dialect())
    }
}
