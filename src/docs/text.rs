//! Name transforms used to build Doxygen section ids.

use regex::Regex;
use std::sync::LazyLock;

static CAMEL_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(.)([A-Z][a-z]+)").unwrap());
static CAMEL_TAIL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([a-z0-9])([A-Z])").unwrap());

/// `ChangeLog` -> `change_log`, `Known Issues` -> `known__issues`.
///
/// Spaces become underscores before the word split, so an already
/// separated capitalized word gains a second underscore. Existing section
/// ids depend on that, keep it.
pub fn camel_to_snake(name: &str) -> String {
    let name = name.trim().replace(' ', "_");
    let name = CAMEL_WORD.replace_all(&name, "${1}_${2}");
    CAMEL_TAIL.replace_all(&name, "${1}_${2}").to_lowercase()
}

/// Reproduce the anchor GitHub generates for a heading.
pub fn github_slugify(name: &str) -> String {
    name.trim()
        .to_lowercase()
        // dashes would otherwise vanish with the rest of the punctuation
        .replace('-', " ")
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect::<String>()
        .replace("  ", " ")
        .replace("  ", " ")
        .replace(' ', "-")
}
