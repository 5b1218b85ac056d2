//! The retryable operation capability

/// An operation that can be attempted repeatedly
///
/// Implemented for any `FnMut() -> Result<T, E>`, so a closure is usually all
/// a call site needs. Implement it on a type when the operation carries state
/// worth naming.
///
/// # Example
///
/// ```rust
/// use wheelretry_core::retry::Retryable;
///
/// struct Countdown {
///     failures_left: u32,
/// }
///
/// impl Retryable for Countdown {
///     type Output = &'static str;
///     type Error = String;
///
///     fn attempt(&mut self) -> Result<Self::Output, Self::Error> {
///         if self.failures_left == 0 {
///             return Ok("done");
///         }
///         self.failures_left -= 1;
///         Err(format!("{} failures left", self.failures_left))
///     }
/// }
///
/// let mut countdown = Countdown { failures_left: 1 };
/// assert!(countdown.attempt().is_err());
/// assert_eq!(countdown.attempt(), Ok("done"));
/// ```
pub trait Retryable {
    /// Value produced by a successful attempt
    type Output;

    /// Error produced by a failed attempt
    type Error;

    /// Attempt the operation once
    fn attempt(&mut self) -> Result<Self::Output, Self::Error>;
}

impl<F, T, E> Retryable for F
where
    F: FnMut() -> Result<T, E>,
{
    type Output = T;
    type Error = E;

    fn attempt(&mut self) -> Result<T, E> {
        self()
    }
}
