//! Cache key derivation.
//!
//! Keys have the layout `<class>:<account>:<folder>:<k1=v1&k2=v2...>`.
//! Parameters are sorted by name before encoding, so the same logical query
//! always maps to the same key whatever order its arguments were supplied
//! in. `account` and `folder` are lifted into fixed segments so that
//! invalidation globs can target them.

use std::collections::BTreeMap;
use std::fmt;

/// Parameter lifted into the account segment.
pub const ACCOUNT_PARAM: &str = "account";
/// Parameter lifted into the folder segment.
pub const FOLDER_PARAM: &str = "folder";

// == Resource Class ==
/// The independently TTL'd cache domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    /// A page of a folder listing
    EmailList,
    /// A page of search results
    SearchResults,
    /// One message
    Email,
    /// The account's folder tree
    FolderList,
}

impl ResourceClass {
    pub const ALL: [ResourceClass; 4] = [
        ResourceClass::EmailList,
        ResourceClass::SearchResults,
        ResourceClass::Email,
        ResourceClass::FolderList,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceClass::EmailList => "emails",
            ResourceClass::SearchResults => "search",
            ResourceClass::Email => "email",
            ResourceClass::FolderList => "folders",
        }
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Key Derivation ==
/// Derives the cache key for a resource class and parameter set.
///
/// Values are percent-escaped so that no value can forge a segment
/// separator or a glob wildcard.
pub fn derive_key<I, K, V>(class: ResourceClass, params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let mut sorted: BTreeMap<String, String> = params
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();

    let account = sorted.remove(ACCOUNT_PARAM).unwrap_or_default();
    let folder = sorted.remove(FOLDER_PARAM).unwrap_or_default();

    let rest = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", escape(k), escape(v)))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}:{}:{}:{}", class, escape(&account), escape(&folder), rest)
}

// == Invalidation Patterns ==
/// Every entry of `class` in `folder` of `account`.
pub fn folder_pattern(class: ResourceClass, account: &str, folder: &str) -> String {
    format!("{}:{}:{}:*", class, escape(account), escape(folder))
}

/// Every entry of `class` belonging to `account`.
pub fn account_pattern(class: ResourceClass, account: &str) -> String {
    format!("{}:{}:*", class, escape(account))
}

/// Percent-escapes characters that are structural in keys or globs.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '%' => out.push_str("%25"),
            ':' => out.push_str("%3A"),
            '&' => out.push_str("%26"),
            '=' => out.push_str("%3D"),
            '*' => out.push_str("%2A"),
            '?' => out.push_str("%3F"),
            '[' => out.push_str("%5B"),
            ']' => out.push_str("%5D"),
            '\\' => out.push_str("%5C"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let key = derive_key(
            ResourceClass::EmailList,
            [
                ("account", "alice"),
                ("folder", "INBOX"),
                ("limit", "10"),
                ("offset", "0"),
                ("sort", "desc"),
            ],
        );
        assert_eq!(key, "emails:alice:INBOX:limit=10&offset=0&sort=desc");
    }

    #[test]
    fn test_argument_order_does_not_matter() {
        let a = derive_key(
            ResourceClass::Email,
            [("uid", "5"), ("folder", "INBOX"), ("account", "a")],
        );
        let b = derive_key(
            ResourceClass::Email,
            [("account", "a"), ("uid", "5"), ("folder", "INBOX")],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_folder_list_key_has_empty_segments() {
        let key = derive_key(ResourceClass::FolderList, [("account", "a")]);
        assert_eq!(key, "folders:a::");
    }

    #[test]
    fn test_values_cannot_forge_segments() {
        let sneaky = derive_key(
            ResourceClass::EmailList,
            [("account", "a"), ("folder", "INBOX:x"), ("q", "*")],
        );
        assert_eq!(sneaky, "emails:a:INBOX%3Ax:q=%2A");

        let plain = derive_key(ResourceClass::EmailList, [("account", "a"), ("folder", "INBOX")]);
        assert_ne!(sneaky, plain);
    }

    #[test]
    fn test_patterns() {
        assert_eq!(
            folder_pattern(ResourceClass::SearchResults, "a", "Work/Projects"),
            "search:a:Work/Projects:*"
        );
        assert_eq!(account_pattern(ResourceClass::FolderList, "a:b"), "folders:a%3Ab:*");
    }

    #[test]
    fn test_escape_round_trips_plain_text() {
        assert_eq!(escape("INBOX"), "INBOX");
        assert_eq!(escape("50%"), "50%25");
    }
}
