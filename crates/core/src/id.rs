// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prefixed-id newtypes.
//!
//! Every kernel-generated identity is `{prefix}{nanoid}` where the prefix
//! is a 4-character type tag. Client-supplied correlation ids stay plain
//! strings; these types cover only ids the kernel mints itself.

/// Length of the random suffix in generated ids.
pub const ID_SUFFIX_LEN: usize = 16;

/// Define a newtype id with a fixed type prefix.
///
/// Generates `generate()` for minting, `from_string()` for parsing,
/// `as_str()`, `Display`, `From<&str>/<String>`, `AsRef<str>`,
/// `Borrow<str>`, and `PartialEq<&str>`.
///
/// ```ignore
/// define_id! {
///     /// Workflow execution identity.
///     pub struct ExecutionId("wfx-");
/// }
/// ```
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident($prefix:literal);
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Mint a fresh random id with the type prefix.
            pub fn generate() -> Self {
                Self(format!(
                    "{}{}",
                    Self::PREFIX,
                    nanoid::format(nanoid::rngs::default, &nanoid::alphabet::SAFE, $crate::id::ID_SUFFIX_LEN)
                ))
            }

            /// Wrap an existing string (parsing, row hydration).
            pub fn from_string(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Random suffix without the type prefix.
            pub fn suffix(&self) -> &str {
                self.0.strip_prefix(Self::PREFIX).unwrap_or(&self.0)
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

define_id! {
    /// Workflow execution identity.
    pub struct ExecutionId("wfx-");
}

define_id! {
    /// Correlation id for kernel-originated worker commands.
    pub struct CommandId("cmd-");
}

define_id! {
    /// Advisor suggestion identity.
    pub struct SuggestionId("sug-");
}

define_id! {
    /// Draft artifact identity.
    pub struct DraftId("drf-");
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
