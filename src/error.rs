// Top-level error taxonomy and process exit codes

use std::fmt;

/// A fatal, startup-time (or SIGPIPE-time) condition, each tagged with the
/// exit code the process reports on the way out.
#[derive(Debug)]
pub enum AppError {
    CannotEnterProc,
    CannotOpenProc(String),
    RegexCompile(String),
    ConfigUnreadable(String),
    BadArgument(String),
    BadNumericArgument(i32, String),
    Sigpipe,
}

impl AppError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::CannotEnterProc => 4,
            Self::CannotOpenProc(_) => 5,
            Self::RegexCompile(_) => 6,
            Self::ConfigUnreadable(_) => 7,
            Self::BadArgument(_) => 13,
            Self::BadNumericArgument(code, _) => *code,
            Self::Sigpipe => 99,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CannotEnterProc => write!(f, "cannot enter /proc"),
            Self::CannotOpenProc(msg) => write!(f, "cannot open /proc: {msg}"),
            Self::RegexCompile(msg) => write!(f, "regex compile failure: {msg}"),
            Self::ConfigUnreadable(msg) => write!(f, "cannot open config file: {msg}"),
            Self::BadArgument(msg) => write!(f, "bad argument: {msg}"),
            Self::BadNumericArgument(_, msg) => write!(f, "bad numeric argument: {msg}"),
            Self::Sigpipe => write!(f, "broken pipe on output stream"),
        }
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(AppError::CannotEnterProc.exit_code(), 4);
        assert_eq!(AppError::CannotOpenProc(String::new()).exit_code(), 5);
        assert_eq!(AppError::RegexCompile(String::new()).exit_code(), 6);
        assert_eq!(AppError::ConfigUnreadable(String::new()).exit_code(), 7);
        assert_eq!(AppError::BadArgument(String::new()).exit_code(), 13);
        assert_eq!(AppError::BadNumericArgument(16, String::new()).exit_code(), 16);
        assert_eq!(AppError::Sigpipe.exit_code(), 99);
    }
}
