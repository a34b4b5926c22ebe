// SPDX-License-Identifier: Apache-2.0

//! Canonical status kind and carrier used across every fallible operation in
//! the packet-streaming client, independent of the transport that produced
//! it.

use std::fmt;

/// The canonical set of error kinds. Any RPC status code the transport layer
/// produces is mapped one-to-one onto one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusKind::Ok => "OK",
            StatusKind::Cancelled => "CANCELLED",
            StatusKind::Unknown => "UNKNOWN",
            StatusKind::InvalidArgument => "INVALID_ARGUMENT",
            StatusKind::DeadlineExceeded => "DEADLINE_EXCEEDED",
            StatusKind::NotFound => "NOT_FOUND",
            StatusKind::AlreadyExists => "ALREADY_EXISTS",
            StatusKind::PermissionDenied => "PERMISSION_DENIED",
            StatusKind::ResourceExhausted => "RESOURCE_EXHAUSTED",
            StatusKind::FailedPrecondition => "FAILED_PRECONDITION",
            StatusKind::Aborted => "ABORTED",
            StatusKind::OutOfRange => "OUT_OF_RANGE",
            StatusKind::Unimplemented => "UNIMPLEMENTED",
            StatusKind::Internal => "INTERNAL",
            StatusKind::Unavailable => "UNAVAILABLE",
            StatusKind::DataLoss => "DATA_LOSS",
            StatusKind::Unauthenticated => "UNAUTHENTICATED",
        };
        f.write_str(s)
    }
}

/// A status: a [`StatusKind`] plus a human-readable message. This is the
/// error type threaded through every fallible operation in both crates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    kind: StatusKind,
    message: String,
}

impl Status {
    pub fn new(kind: StatusKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusKind::Ok, "")
    }

    pub fn kind(&self) -> StatusKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_ok(&self) -> bool {
        self.kind == StatusKind::Ok
    }
}

macro_rules! ctor {
    ($name:ident, $kind:ident) => {
        impl Status {
            #[doc = concat!("Construct a `", stringify!($kind), "` status.")]
            pub fn $name(message: impl Into<String>) -> Self {
                Self::new(StatusKind::$kind, message)
            }
        }
    };
}

ctor!(cancelled, Cancelled);
ctor!(unknown, Unknown);
ctor!(invalid_argument, InvalidArgument);
ctor!(deadline_exceeded, DeadlineExceeded);
ctor!(not_found, NotFound);
ctor!(already_exists, AlreadyExists);
ctor!(permission_denied, PermissionDenied);
ctor!(resource_exhausted, ResourceExhausted);
ctor!(failed_precondition, FailedPrecondition);
ctor!(aborted, Aborted);
ctor!(out_of_range, OutOfRange);
ctor!(unimplemented, Unimplemented);
ctor!(internal, Internal);
ctor!(unavailable, Unavailable);
ctor!(data_loss, DataLoss);
ctor!(unauthenticated, Unauthenticated);

impl Default for Status {
    fn default() -> Self {
        Self::ok()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for Status {}
