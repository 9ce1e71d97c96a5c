use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};
use std::ops::Deref;

#[cfg(feature = "backtrace")]
use std::backtrace::Backtrace;

pub type CorticaResult<T> = Result<T, CorticaError>;

/// Stable machine-readable classification of an error, independent of the
/// human-readable message attached to it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidConfig,
    InvalidGenome,
    InvariantViolated,
    ScapeNotRegistered,
    ScapeMismatch,
    Cancelled,
    Evaluation,
    Storage,
    TunerSkip,
    RunNotActive,
    Context,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrString(Cow<'static, str>);

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<T: Into<Cow<'static, str>>> From<T> for ErrString {
    fn from(v: T) -> Self {
        Self(v.into())
    }
}

#[derive(Debug)]
pub enum CorticaError {
    InvalidConfig {
        message: ErrString,
    },
    InvalidGenome {
        message: ErrString,
    },
    InvariantViolated {
        message: ErrString,
    },
    ScapeNotRegistered {
        message: ErrString,
    },
    ScapeMismatch {
        message: ErrString,
    },
    Cancelled {
        message: ErrString,
    },
    Evaluation {
        message: ErrString,
    },
    Storage {
        message: ErrString,
    },
    TunerSkip {
        message: ErrString,
    },
    RunNotActive {
        message: ErrString,
    },
    Context {
        context: ErrorContext,
        source: Box<CorticaError>,
        #[cfg(feature = "backtrace")]
        backtrace: Backtrace,
    },
}

impl CorticaError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidConfig { .. } => ErrorCode::InvalidConfig,
            Self::InvalidGenome { .. } => ErrorCode::InvalidGenome,
            Self::InvariantViolated { .. } => ErrorCode::InvariantViolated,
            Self::ScapeNotRegistered { .. } => ErrorCode::ScapeNotRegistered,
            Self::ScapeMismatch { .. } => ErrorCode::ScapeMismatch,
            Self::Cancelled { .. } => ErrorCode::Cancelled,
            Self::Evaluation { .. } => ErrorCode::Evaluation,
            Self::Storage { .. } => ErrorCode::Storage,
            Self::TunerSkip { .. } => ErrorCode::TunerSkip,
            Self::RunNotActive { .. } => ErrorCode::RunNotActive,
            Self::Context { .. } => ErrorCode::Context,
        }
    }

    /// The code of the innermost non-context error. Context frames only add
    /// narrative; callers matching on behavior want the root cause.
    pub fn root_code(&self) -> ErrorCode {
        match self {
            Self::Context { source, .. } => source.root_code(),
            other => other.code(),
        }
    }

    pub fn with_context(self, msg: impl Into<String>) -> Self {
        CorticaError::Context {
            context: ErrorContext::new(msg),
            source: Box::new(self),
            #[cfg(feature = "backtrace")]
            backtrace: Backtrace::capture(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.root_code() == ErrorCode::Cancelled
    }
}

impl Display for CorticaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { message } => write!(f, "Invalid configuration: {}", message),
            Self::InvalidGenome { message } => write!(f, "Invalid genome: {}", message),
            Self::InvariantViolated { message } => write!(f, "Invariant violated: {}", message),
            Self::ScapeNotRegistered { message } => write!(f, "Scape not registered: {}", message),
            Self::ScapeMismatch { message } => write!(f, "Scape mismatch: {}", message),
            Self::Cancelled { message } => write!(f, "Cancelled: {}", message),
            Self::Evaluation { message } => write!(f, "Evaluation error: {}", message),
            Self::Storage { message } => write!(f, "Storage error: {}", message),
            Self::TunerSkip { message } => write!(f, "Tuner skip: {}", message),
            Self::RunNotActive { message } => write!(f, "Run not active: {}", message),
            Self::Context {
                context, source, ..
            } => write!(f, "{}\nCaused by: {}", context, source),
        }
    }
}

impl std::error::Error for CorticaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Context { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct ErrorContext {
    message: String,
}

impl ErrorContext {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl Display for ErrorContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ErrorContext {}

// Ergonomic Result extensions (context)
pub trait ResultExt<T> {
    fn context(self, msg: impl Into<String>) -> CorticaResult<T>;
    fn with_context<F: FnOnce() -> String>(self, f: F) -> CorticaResult<T>;
}

impl<T, E: Into<CorticaError>> ResultExt<T> for Result<T, E> {
    fn context(self, msg: impl Into<String>) -> CorticaResult<T> {
        self.map_err(|e| e.into().with_context(msg))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> CorticaResult<T> {
        self.map_err(|e| e.into().with_context(f()))
    }
}

#[doc(hidden)]
pub mod __private {
    #[inline(always)]
    #[must_use]
    pub fn must_use(error: crate::CorticaError) -> crate::CorticaError {
        error
    }
}

#[macro_export]
macro_rules! cortica_err {
    (InvalidConfig: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::CorticaError::InvalidConfig { message: format!($fmt, $($arg),*).into() })
    };
    (InvalidGenome: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::CorticaError::InvalidGenome { message: format!($fmt, $($arg),*).into() })
    };
    (InvariantViolated: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::CorticaError::InvariantViolated { message: format!($fmt, $($arg),*).into() })
    };
    (ScapeNotRegistered: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::CorticaError::ScapeNotRegistered { message: format!($fmt, $($arg),*).into() })
    };
    (ScapeMismatch: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::CorticaError::ScapeMismatch { message: format!($fmt, $($arg),*).into() })
    };
    (Cancelled: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::CorticaError::Cancelled { message: format!($fmt, $($arg),*).into() })
    };
    (Evaluation: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::CorticaError::Evaluation { message: format!($fmt, $($arg),*).into() })
    };
    (Storage: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::CorticaError::Storage { message: format!($fmt, $($arg),*).into() })
    };
    (TunerSkip: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::CorticaError::TunerSkip { message: format!($fmt, $($arg),*).into() })
    };
    (RunNotActive: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::__private::must_use($crate::CorticaError::RunNotActive { message: format!($fmt, $($arg),*).into() })
    };
}

#[macro_export]
macro_rules! cortica_bail {
    ($($tt:tt)+) => { return Err($crate::cortica_err!($($tt)+)) };
}

#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($tt:tt)+) => {
        if !$cond { $crate::cortica_bail!($($tt)+); }
    };
}
