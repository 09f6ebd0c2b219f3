use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    static ref DATA_TYPE_RX: Regex = Regex::new(r"^(\d+x)?([bCuviIsSlLnNd])$").unwrap();
}

/// The keyword data type marking a level that is itself a composite
/// described by a nested `struct`.
pub const PACKED: &str = "packed";

/// A parsed data-type token: an optional `Nx` repeat prefix followed by a
/// single type-code letter, e.g. `b`, `I`, `4xI`, `16xC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DataTypeSpec {
    pub repeat: Option<u32>,
    pub code:   char,
}

impl DataTypeSpec {
    /// Parses a data-type token, returning `None` when the token does not
    /// match the grammar. The `packed` keyword is not part of this grammar
    /// and must be handled by the caller first.
    pub fn parse(text: &str) -> Option<DataTypeSpec> {
        let caps = DATA_TYPE_RX.captures(text)?;
        let repeat = match caps.get(1) {
            Some(m) => Some(m.as_str().trim_end_matches('x').parse::<u32>().ok()?),
            None => None,
        };
        let code = caps.get(2)?.as_str().chars().next()?;
        Some(DataTypeSpec { repeat, code })
    }

    /// True when the token carried an `Nx` array prefix.
    pub fn is_array(&self) -> bool {
        self.repeat.is_some()
    }

    /// True for the character/string type code.
    pub fn is_string(&self) -> bool {
        self.code == 'C'
    }
}
