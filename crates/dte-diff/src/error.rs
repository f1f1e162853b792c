//! Error types for the diff crate.

/// Reasons a diff engine cannot produce entries.
///
/// These are reported by [`DiffEngine::validation_errors`](crate::DiffEngine::validation_errors);
/// the engine itself never fails and yields an empty entry list instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiffError {
    /// No base tree was supplied.
    #[error("base tree is missing")]
    MissingBase,

    /// No overlay tree was supplied.
    #[error("overlay tree is missing")]
    MissingOverlay,
}
