// assert_condition! turns a failed condition into a recoverable AssertionError stamped with the
// call site. fatal_check! reports the call site on stderr and aborts; the checker only uses this one.

use std::fmt;
use std::io::Write;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssertionError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("out of range: {0}")]
    OutOfRange(String),
}

impl AssertionError {
    pub fn message(&self) -> &str {
        match self {
            AssertionError::InvalidArgument(msg)
            | AssertionError::InvalidState(msg)
            | AssertionError::OutOfRange(msg) => msg,
        }
    }
}

// `kind` takes the formatted message, usually a tuple variant like AssertionError::InvalidArgument.
#[macro_export]
macro_rules! assert_condition {
    ($expr:expr, $kind:expr, $($arg:tt)+) => {
        if !($expr) {
            return ::core::result::Result::Err(
                ($kind)(::std::format!(
                    "{}:{}: {}",
                    ::core::file!(),
                    ::core::line!(),
                    ::core::format_args!($($arg)+)
                ))
                .into(),
            );
        }
    };
}

#[macro_export]
macro_rules! fatal_check {
    ($expr:expr $(,)?) => {
        if !($expr) {
            $crate::assertion::fatal(
                ::core::file!(),
                ::core::line!(),
                ::core::format_args!("{}", ::core::stringify!($expr)),
            );
        }
    };
    ($expr:expr, $($arg:tt)+) => {
        if !($expr) {
            $crate::assertion::fatal(::core::file!(), ::core::line!(), ::core::format_args!($($arg)+));
        }
    };
}

#[cold]
#[inline(never)]
pub fn fatal(file: &str, line: u32, detail: fmt::Arguments<'_>) -> ! {
    tracing::error!(file, line, %detail, "integrity violation");

    // Nothing left to report to if stderr is gone.
    let _ = writeln!(std::io::stderr().lock(), "PANIC: {file}:{line}: {detail}");
    std::process::abort()
}
