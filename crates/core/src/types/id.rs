//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types. IDs are opaque strings
//! issued by the commerce data service (e.g. `cus_01HV...`), so the wrappers
//! are string-backed and carry the prefix used when minting new ones.

/// Macro to define a type-safe, string-backed ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `generate()`, `as_str()`, `into_inner()`
/// - `From<String>`, `From<&str>` and `Into<String>` implementations
/// - `sqlx` `Type`, `Encode`, and `Decode` implementations (with `postgres` feature)
///
/// # Example
///
/// ```rust
/// # use avara_core::define_id;
/// define_id!(CartId, "cart");
/// define_id!(PaymentId, "pay");
///
/// let cart_id = CartId::generate();
/// assert!(cart_id.as_str().starts_with("cart_"));
///
/// // These are different types, so this won't compile:
/// // let _: PaymentId = cart_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Prefix used when minting new IDs of this type.
            pub const PREFIX: &'static str = $prefix;

            /// Wrap an existing ID value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Mint a fresh, prefixed ID.
            #[must_use]
            pub fn generate() -> Self {
                Self(format!("{}_{}", $prefix, ::uuid::Uuid::new_v4().simple()))
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }

            /// Whether the ID is the empty string.
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <String as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <String as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let id = <String as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(Self(id))
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::std::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <String as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

define_id!(CustomerId, "cus");
define_id!(AuthIdentityId, "authid");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_uses_prefix() {
        let id = CustomerId::generate();
        assert!(id.as_str().starts_with("cus_"));
        assert_eq!(id.as_str().len(), "cus_".len() + 32);

        let id = AuthIdentityId::generate();
        assert!(id.as_str().starts_with("authid_"));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(CustomerId::generate(), CustomerId::generate());
    }

    #[test]
    fn test_is_empty_treats_whitespace_as_empty() {
        assert!(CustomerId::new("").is_empty());
        assert!(CustomerId::new("   ").is_empty());
        assert!(!CustomerId::new("cus_1").is_empty());
    }

    #[test]
    fn test_serde_is_transparent() {
        let id = AuthIdentityId::new("authid_abc");
        let json = serde_json::to_string(&id).unwrap_or_default();
        assert_eq!(json, "\"authid_abc\"");
    }
}
