/// Errors raised when constructing a wait queue from an invalid
/// configuration.
///
/// This is the only error surface in the crate: timing out and shutdown are
/// ordinary `None` outcomes of a wait, not errors.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{field} must be positive")]
    NotPositive { field: &'static str },
}
