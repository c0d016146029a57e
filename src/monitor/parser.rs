//! Raw daemon status output parsing.
//!
//! Output is free-form text in two sections split at a fixed marker line:
//! a header of `Label: value` lines, then the recently-synchronized items,
//! one quoted path per line.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

/// Literal marker separating the header block from the items block.
pub const ITEMS_MARKER: &str = "Last synchronized items:";

/// Header label carrying the raw status.
pub const LABEL_STATUS: &str = "Synchronization core status";
/// Header label carrying the sync progress.
pub const LABEL_PROGRESS: &str = "Sync progress";
/// Header label carrying the total disk space.
pub const LABEL_TOTAL: &str = "Total";
/// Header label carrying the used space.
pub const LABEL_USED: &str = "Used";
/// Header label carrying the available space.
pub const LABEL_FREE: &str = "Available";
/// Header label carrying the trash size.
pub const LABEL_TRASH: &str = "Trash size";

static ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^.*: '(.*)'$").expect("item pattern is valid"));

/// Parsed view of one status query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedOutput {
    /// Header fields keyed by label, later duplicates winning.
    pub fields: HashMap<String, String>,
    /// Synchronized item paths, most recent first, daemon order preserved.
    pub items: Vec<String>,
}

impl ParsedOutput {
    /// Header field by label, empty string when absent.
    #[must_use]
    pub fn field(&self, label: &str) -> &str {
        self.fields.get(label).map_or("", String::as_str)
    }
}

/// Split raw output at [`ITEMS_MARKER`] and parse both sections.
///
/// Header lines without a colon are skipped. An absent marker means an empty
/// items list, not an error — a stopped daemon produces no output at all and
/// an errored one may produce only a message line.
#[must_use]
pub fn parse_output(raw: &str) -> ParsedOutput {
    let (header, items_block) = raw
        .split_once(ITEMS_MARKER)
        .map_or((raw, ""), |(head, tail)| (head, tail));

    let mut fields = HashMap::new();
    for line in header.lines() {
        if let Some((label, value)) = line.split_once(':') {
            fields.insert(label.trim().to_string(), value.trim().to_string());
        }
    }

    let items = ITEM_RE
        .captures_iter(items_block)
        .map(|caps| caps[1].to_string())
        .collect();

    ParsedOutput { fields, items }
}
