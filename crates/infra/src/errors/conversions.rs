//! Conversions from external infrastructure errors into domain errors.

use propdesk_domain::PropDeskError;
use reqwest::Error as HttpError;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Error as JsonError;
use url::ParseError as UrlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub PropDeskError);

impl From<InfraError> for PropDeskError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<PropDeskError> for InfraError {
    fn from(value: PropDeskError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoPropDeskError {
    fn into_propdesk(self) -> PropDeskError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → PropDeskError */
/* -------------------------------------------------------------------------- */

impl IntoPropDeskError for HttpError {
    fn into_propdesk(self) -> PropDeskError {
        if self.is_timeout() {
            return PropDeskError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return PropDeskError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            return status_error(status, None);
        }

        if self.is_decode() {
            return PropDeskError::Internal(format!("malformed HTTP response body: {self}"));
        }

        PropDeskError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_propdesk())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json / url → PropDeskError */
/* -------------------------------------------------------------------------- */

impl From<JsonError> for InfraError {
    fn from(value: JsonError) -> Self {
        InfraError(PropDeskError::Internal(format!("unexpected JSON payload: {value}")))
    }
}

impl From<UrlError> for InfraError {
    fn from(value: UrlError) -> Self {
        InfraError(PropDeskError::Config(format!("invalid backend URL: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* HTTP status → PropDeskError */
/* -------------------------------------------------------------------------- */

/// Error body shapes returned by the identity and data endpoints.
#[derive(Debug, Default, Deserialize)]
struct BackendErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl BackendErrorBody {
    fn into_detail(self) -> Option<String> {
        self.error_description.or(self.msg).or(self.message).or(self.error)
    }
}

/// Map a non-success status (and optional response body) to a domain error.
pub(crate) fn status_error(status: StatusCode, body: Option<&str>) -> PropDeskError {
    let code = status.as_u16();
    let mut message =
        format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

    if let Some(detail) = body
        .and_then(|raw| serde_json::from_str::<BackendErrorBody>(raw).ok())
        .and_then(BackendErrorBody::into_detail)
    {
        message.push_str(": ");
        message.push_str(&detail);
    }

    match code {
        401 | 403 => PropDeskError::Auth(message),
        404 => PropDeskError::NotFound(message),
        429 => PropDeskError::Network(message),
        400..=499 => PropDeskError::InvalidInput(message),
        _ => PropDeskError::Network(message),
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
