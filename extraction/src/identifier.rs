//! Derives short canonical identifiers ("fig3", "table2") from caption and heading text.

use lazy_regex::{regex_find, regex_replace_all};
use strum_macros::{Display, EnumString};

/// Family of keywords that introduce an identifier.
#[derive(Clone, Copy, Debug, Display, EnumString, Eq, PartialEq)]
#[strum(serialize_all = "lowercase")]
pub enum Keyword {
    /// "fig" or "figure".
    Figure,
    /// "table".
    Table,
}

/// Extracts the identifier introduced by `keyword` from `text`.
///
/// Whitespace, periods and hyphens are removed before searching, so "Fig. 3" and "Table-12" are
/// recognised. The first match is returned lower-cased.
pub fn extract_identifier(text: Option<&str>, keyword: Keyword) -> Option<String> {
    let text = text?;
    let normalized = regex_replace_all!(r"[\s.\-]+", text, "");
    let found = match keyword {
        Keyword::Figure => regex_find!(r"(?i)(?:figure|fig)\d+", &normalized),
        Keyword::Table => regex_find!(r"(?i)table\d+", &normalized),
    };
    found.map(str::to_lowercase)
}
