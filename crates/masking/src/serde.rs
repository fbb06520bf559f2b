//! Serde-related.

pub use serde::{de, Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::{Secret, Strategy};

/// Marker trait for secret types which can be [`Serialize`]-d by [`serde`].
///
/// When types are marked with this trait, they receive a [`Serialize`]
/// impl for `Secret<T>`. (NOTE: all types which impl `DeserializeOwned`
/// receive a [`Deserialize`] impl.)
///
/// This is done deliberately to prevent accidental exfiltration of secrets
/// via `serde` serialization.
pub trait SerializableSecret: Serialize {}

impl SerializableSecret for Value {}
impl SerializableSecret for String {}
impl SerializableSecret for u8 {}
impl SerializableSecret for u16 {}
impl<'a> SerializableSecret for &'a str {}

impl<'de, T, I> Deserialize<'de> for Secret<T, I>
where
    T: Clone + de::DeserializeOwned + Sized,
    I: Strategy<T>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Self::new)
    }
}

impl<T, I> Serialize for Secret<T, I>
where
    T: SerializableSecret + Serialize + Sized,
    I: Strategy<T>,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use crate::PeekInterface;

        self.peek().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use crate::Secret;

    #[derive(serde::Serialize, serde::Deserialize)]
    struct Composite {
        secret_number: Secret<u16>,
        not_secret: String,
    }

    #[test]
    fn serialize_exposes_inner() {
        let value = Composite {
            secret_number: Secret::new(42),
            not_secret: "plain".to_string(),
        };
        let json = serde_json::to_string(&value).expect("serialize");
        assert_eq!(json, r#"{"secret_number":42,"not_secret":"plain"}"#);
    }

    #[test]
    fn deserialize_wraps_inner() {
        let value: Composite =
            serde_json::from_str(r#"{"secret_number":7,"not_secret":"x"}"#).expect("deserialize");
        use crate::PeekInterface;
        assert_eq!(*value.secret_number.peek(), 7);
    }
}
