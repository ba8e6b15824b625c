// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Error types used across the crate.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::fmt::{Debug, Display, Formatter};

/// Result that is a wrapper of `Result<T, iceberg_commit::Error>`
pub type Result<T> = std::result::Result<T, Error>;

/// ErrorKind is all kinds of Error of iceberg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Iceberg don't know what happened here, and no actions other than
    /// just returning it back. For example, iceberg returns an internal
    /// service error.
    Unexpected,
    /// Iceberg data is invalid.
    ///
    /// This error is returned when we try to read a table from iceberg but
    /// failed to parse its metadata or data file correctly, or when a
    /// record batch handed to a writer doesn't match the table schema.
    DataInvalid,
    /// Iceberg feature is not supported.
    ///
    /// This error is returned when given iceberg feature is not supported,
    /// including writer properties that are recognized but not honored.
    FeatureUnsupported,
    /// A table property carries a value that can't be accepted.
    InvalidProperty,
    /// A schema change would narrow a type or is ambiguous.
    IncompatibleSchemaChange,
    /// Catalog commit failed due to outdated metadata.
    CatalogCommitConflicts,
    /// A precondition of an action did not hold.
    PreconditionFailed,
    /// Iceberg namespace already exists at creation.
    NamespaceAlreadyExists,
    /// Iceberg table already exists at creation.
    TableAlreadyExists,
    /// Iceberg namespace does not exist.
    NamespaceNotFound,
    /// Iceberg table does not exist.
    TableNotFound,
}

impl ErrorKind {
    /// Convert self into static str.
    pub fn into_static(self) -> &'static str {
        self.into()
    }
}

impl From<ErrorKind> for &'static str {
    fn from(v: ErrorKind) -> &'static str {
        match v {
            ErrorKind::Unexpected => "Unexpected",
            ErrorKind::DataInvalid => "DataInvalid",
            ErrorKind::FeatureUnsupported => "FeatureUnsupported",
            ErrorKind::InvalidProperty => "InvalidProperty",
            ErrorKind::IncompatibleSchemaChange => "IncompatibleSchemaChange",
            ErrorKind::CatalogCommitConflicts => "CatalogCommitConflicts",
            ErrorKind::PreconditionFailed => "PreconditionFailed",
            ErrorKind::NamespaceAlreadyExists => "NamespaceAlreadyExists",
            ErrorKind::TableAlreadyExists => "TableAlreadyExists",
            ErrorKind::NamespaceNotFound => "NamespaceNotFound",
            ErrorKind::TableNotFound => "TableNotFound",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.into_static())
    }
}

/// Error is the error struct returned by all iceberg functions.
///
/// ## Display
///
/// Error will be displayed in the following format:
///
/// ```text
/// CatalogCommitConflicts, context: { ref: main } => Requirement failed: branch main has changed
/// ```
///
/// ## Debug
///
/// The debug output additionally carries the source error and a backtrace
/// when one was captured.
pub struct Error {
    kind: ErrorKind,
    message: String,

    context: Vec<(&'static str, String)>,

    source: Option<anyhow::Error>,
    backtrace: Backtrace,

    retryable: bool,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        if !self.context.is_empty() {
            write!(f, ", context: {{ ")?;
            write!(
                f,
                "{}",
                self.context
                    .iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            )?;
            write!(f, " }}")?;
        }

        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }

        if let Some(source) = &self.source {
            write!(f, ", source: {source}")?;
        }

        Ok(())
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // If alternate has been specified, we will print like Debug.
        if f.alternate() {
            let mut de = f.debug_struct("Error");
            de.field("kind", &self.kind);
            de.field("message", &self.message);
            de.field("context", &self.context);
            de.field("source", &self.source);
            de.field("retryable", &self.retryable);
            de.field("backtrace", &self.backtrace);
            return de.finish();
        }

        write!(f, "{}", self.kind)?;
        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }
        writeln!(f)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            writeln!(f, "Context:")?;
            for (k, v) in self.context.iter() {
                writeln!(f, "   {k}: {v}")?;
            }
        }

        if let Some(source) = &self.source {
            writeln!(f)?;
            writeln!(f, "Source: {source:#}")?;
        }

        if self.backtrace.status() == BacktraceStatus::Captured {
            writeln!(f)?;
            writeln!(f, "Backtrace:")?;
            writeln!(f, "{}", self.backtrace)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|v| v.as_ref())
    }
}

impl Error {
    /// Create a new Error with error kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: Vec::default(),

            source: None,
            // `Backtrace::capture()` will check if backtrace has been enabled
            // internally. It's zero cost if backtrace is disabled.
            backtrace: Backtrace::capture(),

            retryable: false,
        }
    }

    /// Add more context in error.
    pub fn with_context(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.push((key, value.into()));
        self
    }

    /// Set source for error.
    ///
    /// # Notes
    ///
    /// If the source has been set, we will raise a panic here.
    pub fn with_source(mut self, src: impl Into<anyhow::Error>) -> Self {
        debug_assert!(self.source.is_none(), "the source error has been set");

        self.source = Some(src.into());
        self
    }

    /// Mark whether the caller may retry the operation that produced this error.
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Return error's kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Return error's message.
    #[inline]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Whether the failed operation may succeed if attempted again.
    pub fn retryable(&self) -> bool {
        self.retryable
    }

    /// Return error's backtrace.
    ///
    /// Note: the standard way of exposing backtrace is the unstable feature [`error_generic_member_access`](https://github.com/rust-lang/rust/issues/99301).
    /// We don't provide it as it requires nightly rust.
    #[inline]
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

macro_rules! define_from_err {
    ($source: path, $error_kind: path, $msg: expr) => {
        impl std::convert::From<$source> for crate::error::Error {
            fn from(v: $source) -> Self {
                Self::new($error_kind, $msg).with_source(v)
            }
        }
    };
}

define_from_err!(
    std::str::Utf8Error,
    ErrorKind::Unexpected,
    "handling invalid utf-8 characters"
);

define_from_err!(
    std::num::ParseIntError,
    ErrorKind::Unexpected,
    "Failed to parse int"
);

define_from_err!(
    serde_json::Error,
    ErrorKind::DataInvalid,
    "Failed to parse json string"
);

define_from_err!(
    arrow_schema::ArrowError,
    ErrorKind::Unexpected,
    "arrow operation failed"
);

define_from_err!(
    parquet::errors::ParquetError,
    ErrorKind::Unexpected,
    "Failed to read/write parquet file"
);

define_from_err!(opendal::Error, ErrorKind::Unexpected, "Failure in doing io operation");

define_from_err!(url::ParseError, ErrorKind::DataInvalid, "Failed to parse url");

define_from_err!(uuid::Error, ErrorKind::DataInvalid, "Failed to convert between uuid and iceberg value");

define_from_err!(
    std::io::Error,
    ErrorKind::Unexpected,
    "IO Operation failed"
);

/// Helper macro to check arguments.
///
/// Example:
///
/// Following example check `a > 0`, otherwise returns an error.
/// ```ignore
/// use iceberg_commit::ensure_data_valid;
/// ensure_data_valid!(a > 0, "{} is not positive.", a);
/// ```
#[macro_export]
macro_rules! ensure_data_valid {
    ($cond: expr, $fmt: literal, $($arg:tt)*) => {
        if !$cond {
            return Err($crate::error::Error::new($crate::error::ErrorKind::DataInvalid, format!($fmt, $($arg)*)))
        }
    };
}

#[cfg(test)]
mod tests {
    use std::fmt::Write as _;

    use anyhow::anyhow;

    use super::*;

    fn generate_error_with_backtrace_disabled() -> Error {
        let mut error = Error::new(
            ErrorKind::CatalogCommitConflicts,
            "Requirement failed: branch main has changed",
        )
        .with_context("ref", "main")
        .with_source(anyhow!("stale base"));
        error.backtrace = Backtrace::disabled();
        error
    }

    #[test]
    fn test_error_display_without_backtrace() {
        let s = format!("{}", generate_error_with_backtrace_disabled());
        assert_eq!(
            s,
            r#"CatalogCommitConflicts, context: { ref: main } => Requirement failed: branch main has changed, source: stale base"#
        )
    }

    #[test]
    fn test_error_debug_without_backtrace() {
        let mut s = String::new();
        let _ = write!(s, "{:?}", generate_error_with_backtrace_disabled());
        assert_eq!(
            s,
            r#"CatalogCommitConflicts => Requirement failed: branch main has changed

Context:
   ref: main

Source: stale base
"#
        )
    }

    #[test]
    fn test_retryable_defaults_to_false() {
        let err = Error::new(ErrorKind::DataInvalid, "bad batch");
        assert!(!err.retryable());
        assert!(err.with_retryable(true).retryable());
    }
}
