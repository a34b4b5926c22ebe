// SPDX-License-Identifier: Apache-2.0

//! One-to-one conversions between [`streams_common::Status`] and the
//! transport-level error types: `tonic::Code`/`tonic::Status` and
//! `tonic::transport::Error`.

use streams_common::{Status, StatusKind};

/// Maps a gRPC status code onto its canonical kind. One-to-one: every
/// `tonic::Code` variant has exactly one `StatusKind` counterpart and vice
/// versa, so this round-trips through `code_for_kind`.
pub fn kind_for_code(code: tonic::Code) -> StatusKind {
    match code {
        tonic::Code::Ok => StatusKind::Ok,
        tonic::Code::Cancelled => StatusKind::Cancelled,
        tonic::Code::Unknown => StatusKind::Unknown,
        tonic::Code::InvalidArgument => StatusKind::InvalidArgument,
        tonic::Code::DeadlineExceeded => StatusKind::DeadlineExceeded,
        tonic::Code::NotFound => StatusKind::NotFound,
        tonic::Code::AlreadyExists => StatusKind::AlreadyExists,
        tonic::Code::PermissionDenied => StatusKind::PermissionDenied,
        tonic::Code::ResourceExhausted => StatusKind::ResourceExhausted,
        tonic::Code::FailedPrecondition => StatusKind::FailedPrecondition,
        tonic::Code::Aborted => StatusKind::Aborted,
        tonic::Code::OutOfRange => StatusKind::OutOfRange,
        tonic::Code::Unimplemented => StatusKind::Unimplemented,
        tonic::Code::Internal => StatusKind::Internal,
        tonic::Code::Unavailable => StatusKind::Unavailable,
        tonic::Code::DataLoss => StatusKind::DataLoss,
        tonic::Code::Unauthenticated => StatusKind::Unauthenticated,
    }
}

pub fn code_for_kind(kind: StatusKind) -> tonic::Code {
    match kind {
        StatusKind::Ok => tonic::Code::Ok,
        StatusKind::Cancelled => tonic::Code::Cancelled,
        StatusKind::Unknown => tonic::Code::Unknown,
        StatusKind::InvalidArgument => tonic::Code::InvalidArgument,
        StatusKind::DeadlineExceeded => tonic::Code::DeadlineExceeded,
        StatusKind::NotFound => tonic::Code::NotFound,
        StatusKind::AlreadyExists => tonic::Code::AlreadyExists,
        StatusKind::PermissionDenied => tonic::Code::PermissionDenied,
        StatusKind::ResourceExhausted => tonic::Code::ResourceExhausted,
        StatusKind::FailedPrecondition => tonic::Code::FailedPrecondition,
        StatusKind::Aborted => tonic::Code::Aborted,
        StatusKind::OutOfRange => tonic::Code::OutOfRange,
        StatusKind::Unimplemented => tonic::Code::Unimplemented,
        StatusKind::Internal => tonic::Code::Internal,
        StatusKind::Unavailable => tonic::Code::Unavailable,
        StatusKind::DataLoss => tonic::Code::DataLoss,
        StatusKind::Unauthenticated => tonic::Code::Unauthenticated,
    }
}

pub trait StatusExt {
    fn into_tonic(self) -> tonic::Status;
}

impl StatusExt for Status {
    fn into_tonic(self) -> tonic::Status {
        tonic::Status::new(code_for_kind(self.kind()), self.message().to_string())
    }
}

impl From<tonic::Status> for Status {
    fn from(value: tonic::Status) -> Self {
        Status::new(kind_for_code(value.code()), value.message().to_string())
    }
}

impl From<Status> for tonic::Status {
    fn from(value: Status) -> Self {
        value.into_tonic()
    }
}

impl From<tonic::transport::Error> for Status {
    fn from(value: tonic::transport::Error) -> Self {
        Status::unavailable(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_kind_roundtrip() {
        let codes = [
            tonic::Code::Ok,
            tonic::Code::Cancelled,
            tonic::Code::Unknown,
            tonic::Code::InvalidArgument,
            tonic::Code::DeadlineExceeded,
            tonic::Code::NotFound,
            tonic::Code::AlreadyExists,
            tonic::Code::PermissionDenied,
            tonic::Code::ResourceExhausted,
            tonic::Code::FailedPrecondition,
            tonic::Code::Aborted,
            tonic::Code::OutOfRange,
            tonic::Code::Unimplemented,
            tonic::Code::Internal,
            tonic::Code::Unavailable,
            tonic::Code::DataLoss,
            tonic::Code::Unauthenticated,
        ];
        for code in codes {
            assert_eq!(code_for_kind(kind_for_code(code)), code);
        }
    }

    #[test]
    fn tonic_status_roundtrips_message() {
        let status = Status::not_found("no such stream");
        let tonic_status: tonic::Status = status.clone().into();
        let back: Status = tonic_status.into();
        assert_eq!(back, status);
    }
}
