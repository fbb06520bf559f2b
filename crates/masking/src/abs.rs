//! Abstract data types.

/// Interface to expose a reference to an inner secret
pub trait PeekInterface<S> {
    /// Only method providing access to the secret value
    fn peek(&self) -> &S;

    /// Provide a mutable reference to the secret value
    fn peek_mut(&mut self) -> &mut S;
}

/// Interface that consumes the wrapper and returns the inner secret
pub trait ExposeInterface<S> {
    /// Consume the secret and return the inner value
    fn expose(self) -> S;
}

/// Interface that consumes an optional wrapper and returns the inner value
pub trait ExposeOptionInterface<S> {
    /// Expose the optional secret, falling back to the type's default
    fn expose_option(self) -> S;
}

impl<S> ExposeOptionInterface<Option<S>> for Option<crate::Secret<S>>
where
    S: Clone,
{
    fn expose_option(self) -> Option<S> {
        self.map(ExposeInterface::expose)
    }
}
