use std::error::Error;
use std::fmt;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Unique constraints enforced by every storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueConstraint {
    /// Session invite codes are globally unique.
    InviteCode,
    /// At most one score per (participant, whiskey) pair.
    ScorePair,
    /// Participant bearer tokens are globally unique.
    ParticipantToken,
}

impl fmt::Display for UniqueConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UniqueConstraint::InviteCode => "invite_code",
            UniqueConstraint::ScorePair => "participant_id,whiskey_id",
            UniqueConstraint::ParticipantToken => "participant_token",
        };
        f.write_str(name)
    }
}

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// An insert violated a unique constraint. This is the authoritative
    /// guard behind the application-level pre-checks; callers translate it
    /// into the same conflict error the pre-check would have produced.
    #[error("unique constraint violated: {constraint}")]
    Duplicate { constraint: UniqueConstraint },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a duplicate error for the given constraint.
    pub fn duplicate(constraint: UniqueConstraint) -> Self {
        StorageError::Duplicate { constraint }
    }
}
