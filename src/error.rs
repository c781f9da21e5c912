use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds {
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The variants fall into two tiers that callers handle very differently:
///
/// ## Decode faults
/// - [`Error::Malformed`] - Corrupted or invalid blob structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond the end of the data
/// - [`Error::Empty`] - Empty input provided where data was required
/// - [`Error::RecursionLimit`] - Maximum nesting depth exceeded
///
/// These are produced while decoding untrusted metadata. The public
/// [`crate::metadata::security::DeclSecurityReader`] entry points never surface them, a faulty
/// blob simply decodes to an empty attribute list.
///
/// ## Lock contract violations
/// - [`Error::LockRecursion`] - The current thread tried to acquire a lock it already holds
/// - [`Error::LockUsage`] - A lock was released without a matching acquisition
/// - [`Error::LockError`] - The internal lock state was poisoned
///
/// These indicate a bug in the caller's threading discipline and are always returned.
///
/// # Examples
///
/// ```rust
/// use declsec::{Error, Parser};
///
/// let mut parser = Parser::new(&[0x80]);
/// match parser.read_compressed_uint() {
///     Err(Error::OutOfBounds { .. }) => {}
///     other => panic!("unexpected {:?}", other),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The data is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected
    /// for debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the data.
    ///
    /// This is the safety check that prevents buffer overruns on truncated or
    /// crafted length fields.
    #[error("Out of Bound read would have occurred! - {file}:{line}")]
    OutOfBounds {
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// Recursion limit reached.
    ///
    /// Nested type names and nested custom attribute values are depth limited to
    /// keep crafted input from exhausting the stack. The associated value shows the
    /// limit that was reached.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// The current thread attempted to acquire a lock it already holds.
    ///
    /// Neither nested nor upgradeable acquisitions are supported.
    #[error("Recursive locks aren't supported")]
    LockRecursion,

    /// A lock was released while not held, in the wrong mode, or by a thread
    /// that does not own it.
    #[error("Too many exit lock method calls")]
    LockUsage,

    /// Failed to lock target.
    ///
    /// The internal state of a lock was poisoned by a panicking thread.
    #[error("Failed to lock target")]
    LockError,
}

impl Error {
    /// Returns `true` for errors caused by violating the lock contract.
    ///
    /// These are programming errors in the calling code rather than properties of the
    /// decoded data, and are never converted into an empty decode result.
    #[must_use]
    pub fn is_lock_violation(&self) -> bool {
        matches!(
            self,
            Error::LockRecursion | Error::LockUsage | Error::LockError
        )
    }
}
