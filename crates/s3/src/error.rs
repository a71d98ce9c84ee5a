//! Classification of SDK failures into backend error kinds

use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use bfs_core::{BackendError, BackendErrorKind};

/// Decide the kind of a failed request from its service error code, HTTP
/// status and whether the SDK gave up waiting
///
/// A missing bucket is a misconfiguration rather than a missing key, so a
/// `NoSuchBucket` code is never reported as `NotFound` even though S3 answers
/// it with a 404. That code only arrives with a response body. HEAD responses
/// have none, so a HEAD against a missing bucket is indistinguishable from a
/// missing key and classifies as `NotFound`: `exists` returns `false` and
/// `stat` fails with `NotFound` until a GET or LIST surfaces the bucket error.
pub fn classify_failure(
    code: Option<&str>,
    status: Option<u16>,
    timed_out: bool,
) -> BackendErrorKind {
    if timed_out {
        return BackendErrorKind::Timeout;
    }

    match code {
        Some("NoSuchKey" | "NotFound") => return BackendErrorKind::NotFound,
        Some("NoSuchBucket") => return BackendErrorKind::Other,
        Some(
            "AccessDenied" | "Forbidden" | "InvalidAccessKeyId" | "SignatureDoesNotMatch"
            | "ExpiredToken",
        ) => return BackendErrorKind::AccessDenied,
        Some("RequestTimeout") => return BackendErrorKind::Timeout,
        _ => {}
    }

    match status {
        Some(404) => BackendErrorKind::NotFound,
        Some(401 | 403) => BackendErrorKind::AccessDenied,
        Some(408) => BackendErrorKind::Timeout,
        _ => BackendErrorKind::Other,
    }
}

/// Convert an SDK error into a [`BackendError`]
pub(crate) fn from_sdk_error<E>(err: SdkError<E, HttpResponse>) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let timed_out = match &err {
        SdkError::TimeoutError(_) => true,
        SdkError::DispatchFailure(failure) => failure.is_timeout(),
        _ => false,
    };
    let status = err.raw_response().map(|r| r.status().as_u16());
    let kind = classify_failure(err.code(), status, timed_out);
    BackendError::new(kind, DisplayErrorContext(&err).to_string())
}
