//! User-facing notices printed to stderr.

use std::fmt;

use camino::Utf8PathBuf;

use crate::errors::AppError;

/// One line of feedback for the person running the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Notice {
    FileNotFound(Utf8PathBuf),
    Reachable(String),
    Error(String),
}

impl Notice {
    pub(crate) fn from_error(error: &AppError) -> Self {
        match error {
            AppError::FileNotFound { path } => Self::FileNotFound(path.clone()),
            other => Self::Error(other.to_string()),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileNotFound(path) => write!(f, "file not found: {path}"),
            Self::Reachable(server) => write!(
                f,
                "connection lost; {server} is accepting connections again, please retry"
            ),
            Self::Error(cause) => write!(f, "error: {cause}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Notice::FileNotFound("photos/cat.jpg".into()), "file not found: photos/cat.jpg")]
    #[case(
        Notice::Reachable("tcp://10.0.0.5:12345".to_owned()),
        "connection lost; tcp://10.0.0.5:12345 is accepting connections again, please retry"
    )]
    #[case(Notice::Error("boom".to_owned()), "error: boom")]
    fn notices_render_for_humans(#[case] notice: Notice, #[case] expected: &str) {
        assert_eq!(notice.to_string(), expected);
    }

    #[test]
    fn missing_files_become_file_notices() {
        let error = AppError::FileNotFound {
            path: "missing.png".into(),
        };
        assert_eq!(
            Notice::from_error(&error),
            Notice::FileNotFound("missing.png".into())
        );
    }
}
