//! Structure describing secret.

use std::{fmt, marker::PhantomData};

use crate::{strategy::Strategy, ExposeInterface, PeekInterface};

/// Secret thing.
///
/// To get access to the value use method `expose()` of trait
/// [`crate::ExposeInterface`], or `peek()` of [`crate::PeekInterface`]
/// to borrow it.
///
/// ## Masking
/// Use the [`crate::strategy::Strategy`] trait to implement a masking
/// strategy on a zero-variant enum and pass this enum as a second generic
/// parameter to [`Secret`] while defining it. [`Secret`] will take care of
/// applying the masking strategy on the inner secret when being displayed.
pub struct Secret<SecretValue, MaskingStrategy = crate::WithType>
where
    MaskingStrategy: Strategy<SecretValue>,
{
    pub(crate) inner_secret: SecretValue,
    pub(crate) masking_strategy: PhantomData<MaskingStrategy>,
}

impl<SecretValue, MaskingStrategy> Secret<SecretValue, MaskingStrategy>
where
    MaskingStrategy: Strategy<SecretValue>,
{
    /// Take ownership of a secret value
    pub fn new(secret: SecretValue) -> Self {
        Self {
            inner_secret: secret,
            masking_strategy: PhantomData,
        }
    }

    /// Consume self and modify the inner value
    pub fn map<OtherSecretValue>(
        self,
        f: impl FnOnce(SecretValue) -> OtherSecretValue,
    ) -> Secret<OtherSecretValue, MaskingStrategy>
    where
        MaskingStrategy: Strategy<OtherSecretValue>,
    {
        Secret::new(f(self.inner_secret))
    }

    /// Convert to a secret with a reference to the inner value
    pub fn as_ref(&self) -> Secret<&SecretValue, MaskingStrategy>
    where
        MaskingStrategy: for<'a> Strategy<&'a SecretValue>,
    {
        Secret::new(self.peek())
    }
}

impl<SecretValue, MaskingStrategy> PeekInterface<SecretValue>
    for Secret<SecretValue, MaskingStrategy>
where
    MaskingStrategy: Strategy<SecretValue>,
{
    fn peek(&self) -> &SecretValue {
        &self.inner_secret
    }

    fn peek_mut(&mut self) -> &mut SecretValue {
        &mut self.inner_secret
    }
}

impl<SecretValue, MaskingStrategy> ExposeInterface<SecretValue>
    for Secret<SecretValue, MaskingStrategy>
where
    MaskingStrategy: Strategy<SecretValue>,
{
    fn expose(self) -> SecretValue {
        self.inner_secret
    }
}

impl<SecretValue, MaskingStrategy> From<SecretValue> for Secret<SecretValue, MaskingStrategy>
where
    MaskingStrategy: Strategy<SecretValue>,
{
    fn from(secret: SecretValue) -> Self {
        Self::new(secret)
    }
}

impl<SecretValue, MaskingStrategy> Clone for Secret<SecretValue, MaskingStrategy>
where
    SecretValue: Clone,
    MaskingStrategy: Strategy<SecretValue>,
{
    fn clone(&self) -> Self {
        Self {
            inner_secret: self.inner_secret.clone(),
            masking_strategy: PhantomData,
        }
    }
}

impl<SecretValue, MaskingStrategy> PartialEq for Secret<SecretValue, MaskingStrategy>
where
    SecretValue: PartialEq,
    MaskingStrategy: Strategy<SecretValue>,
{
    fn eq(&self, other: &Self) -> bool {
        self.peek().eq(other.peek())
    }
}

impl<SecretValue, MaskingStrategy> Eq for Secret<SecretValue, MaskingStrategy>
where
    SecretValue: Eq,
    MaskingStrategy: Strategy<SecretValue>,
{
}

impl<SecretValue, MaskingStrategy> fmt::Debug for Secret<SecretValue, MaskingStrategy>
where
    MaskingStrategy: Strategy<SecretValue>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        MaskingStrategy::fmt(&self.inner_secret, f)
    }
}

impl<SecretValue, MaskingStrategy> Default for Secret<SecretValue, MaskingStrategy>
where
    SecretValue: Default,
    MaskingStrategy: Strategy<SecretValue>,
{
    fn default() -> Self {
        SecretValue::default().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_is_masked() {
        let secret: Secret<String> = Secret::new("0123456789".to_string());
        assert_eq!(
            "*** alloc::string::String ***",
            format!("{secret:?}")
        );

        let secret: Secret<String, crate::WithoutType> =
            Secret::new("0123456789".to_string());
        assert_eq!("*** ***", format!("{secret:?}"));
    }

    #[test]
    fn peek_and_expose() {
        let secret: Secret<String> = Secret::new("hunter2".to_string());
        assert_eq!("hunter2", secret.peek());
        assert_eq!("hunter2", secret.expose());
    }
}
