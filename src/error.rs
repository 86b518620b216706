use std::path::PathBuf;

use thiserror::Error;

use crate::lexer::Position;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The lexer found text that starts no token.
    #[error("lexical error at {position}: unexpected input {found:?}")]
    Lexical { position: Position, found: String },

    /// The token stream does not follow the Rex grammar.
    #[error("syntax error at {position}: {message}")]
    Syntax { position: Position, message: String },

    /// A group reference has no target once the whole tree is built.
    #[error("cannot resolve group reference <{reference}>: {reason}")]
    Reference { reference: String, reason: String },

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn argument(message: impl Into<String>) -> Self {
        Error::Argument(message.into())
    }

    pub(crate) fn syntax(position: Position, message: impl Into<String>) -> Self {
        Error::Syntax {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn reference(reference: impl ToString, reason: impl Into<String>) -> Self {
        Error::Reference {
            reference: reference.to_string(),
            reason: reason.into(),
        }
    }

    /// Source position of lexical and syntax errors.
    pub fn position(&self) -> Option<Position> {
        match self {
            Error::Lexical { position, .. } | Error::Syntax { position, .. } => Some(*position),
            _ => None,
        }
    }
}
