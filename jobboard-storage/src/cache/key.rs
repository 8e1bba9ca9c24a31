//! Memoization keys for cached reads.
//!
//! A `CacheKey` names one call of one read operation: the operation name
//! followed by its call-time arguments. Arguments are length-prefixed, so
//! `menu("a", "bc")` and `menu("ab", "c")` never share an entry. Composite
//! keys go through [`CacheKey::key`], which keeps every component's own
//! length prefix; their `Display` form is for logs only.

use std::fmt;

use jobboard_core::{encode_tag_key, TagKey};

/// Separator between the operation name and its arguments.
///
/// 0xFF never occurs in UTF-8, so it also separates a tag from a key in the
/// LMDB tag index without ambiguity.
pub const SEPARATOR: u8 = 0xFF;

/// Key of a memoized read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    /// Private inner data; build through [`CacheKey::new`] and [`CacheKey::arg`].
    inner: CacheKeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct CacheKeyInner {
    operation: &'static str,
    args: Vec<String>,
}

impl CacheKey {
    pub fn new(operation: &'static str) -> Self {
        Self {
            inner: CacheKeyInner {
                operation,
                args: Vec::new(),
            },
        }
    }

    /// Append a call-time argument.
    pub fn arg(mut self, value: impl fmt::Display) -> Self {
        self.inner.args.push(value.to_string());
        self
    }

    /// Append a key argument in its tag encoding, one length prefix per
    /// component.
    pub fn key(mut self, key: &impl TagKey) -> Self {
        self.inner.args.push(encode_tag_key(key));
        self
    }

    /// Append an optional argument; `None` and `Some("")` stay distinct.
    pub fn opt_arg<T: fmt::Display>(mut self, value: Option<T>) -> Self {
        match value {
            Some(value) => self.inner.args.push(format!("+{}", value)),
            None => self.inner.args.push("-".to_string()),
        }
        self
    }

    pub fn operation(&self) -> &'static str {
        self.inner.operation
    }

    /// Encode for byte-keyed stores.
    ///
    /// Format: `operation 0xFF (len: u32 BE, bytes)*`
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(
            self.inner.operation.len()
                + 1
                + self.inner.args.iter().map(|a| a.len() + 4).sum::<usize>(),
        );
        bytes.extend_from_slice(self.inner.operation.as_bytes());
        bytes.push(SEPARATOR);
        for arg in &self.inner.args {
            bytes.extend_from_slice(&(arg.len() as u32).to_be_bytes());
            bytes.extend_from_slice(arg.as_bytes());
        }
        bytes
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.inner.operation)?;
        for (i, arg) in self.inner.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{:?}", arg)?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobboard_core::{OrganizationId, OrganizationUserKey, UserId};

    #[test]
    fn test_argument_boundaries_are_preserved() {
        let a = CacheKey::new("menu").arg("a").arg("bc");
        let b = CacheKey::new("menu").arg("ab").arg("c");
        assert_ne!(a.encode(), b.encode());
    }

    #[test]
    fn test_optional_arguments_are_distinct() {
        let none = CacheKey::new("board").opt_arg(None::<&str>);
        let empty = CacheKey::new("board").opt_arg(Some(""));
        assert_ne!(none.encode(), empty.encode());
    }

    #[test]
    fn test_operations_are_distinct() {
        let a = CacheKey::new("user").arg("1");
        let b = CacheKey::new("organization").arg("1");
        assert_ne!(a, b);
        assert_ne!(a.encode(), b.encode());
    }

    #[test]
    fn test_composite_key_components_keep_their_boundaries() {
        let a = OrganizationUserKey::new(UserId::new("a, b"), OrganizationId::new("c"));
        let b = OrganizationUserKey::new(UserId::new("a"), OrganizationId::new("b, c"));
        assert_eq!(a.to_string(), b.to_string());
        assert_ne!(
            CacheKey::new("org_user_settings_get").key(&a).encode(),
            CacheKey::new("org_user_settings_get").key(&b).encode()
        );
    }

    #[test]
    fn test_display_is_readable() {
        let key = CacheKey::new("application").arg("L").arg("U");
        assert_eq!(key.to_string(), "application(\"L\", \"U\")");
    }
}
