use std::fmt;

/// Debug with type
pub enum WithType {}

/// Debug without type
pub enum WithoutType {}

/// Masking strategy to be used while printing the wrapped secret
pub trait Strategy<T> {
    /// Format the value before printing it
    fn fmt(value: &T, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<T> Strategy<T> for WithType {
    fn fmt(_: &T, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("*** ")?;
        f.write_str(std::any::type_name::<T>())?;
        f.write_str(" ***")
    }
}

impl<T> Strategy<T> for WithoutType {
    fn fmt(_: &T, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("*** ***")
    }
}
