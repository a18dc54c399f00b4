use crate::error::{NefError, Resource};
use crate::model::ProblemDetails;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};

/// How a PFD partial-failure report is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportShape {
    /// One `PfdReport` object (single application operations)
    Single,
    /// Array of `PfdReport` (transaction operations)
    List,
}

/// Northbound error response
#[derive(Debug)]
pub struct ApiError {
    error: NefError,
    shape: ReportShape,
}

impl ApiError {
    /// Error of an operation on one application of a PFD transaction
    pub fn single_app(error: NefError) -> Self {
        Self {
            error,
            shape: ReportShape::Single,
        }
    }

    /// Unknown resource addressed by a malformed path ID
    pub fn not_found(resource: Resource) -> Self {
        NefError::NotFound(resource).into()
    }
}

impl From<NefError> for ApiError {
    fn from(error: NefError) -> Self {
        Self {
            error,
            shape: ReportShape::List,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let problem = match self.error {
            NefError::AllApplicationsFailed(reports) => {
                let mut reports = reports.to_reports();
                return match self.shape {
                    ReportShape::Single if reports.len() == 1 => {
                        (status, Json(reports.remove(0))).into_response()
                    }
                    _ => (status, Json(reports)).into_response(),
                };
            }
            NefError::Southbound {
                problem: Some(problem),
                ..
            } => problem,
            NefError::Southbound { message, .. } => {
                let mut problem = ProblemDetails::new(status.as_u16(), "Southbound failure");
                problem.detail = Some(message);
                problem
            }
            NefError::Validation(msg) => ProblemDetails::new(status.as_u16(), msg),
            NefError::NotFound(resource) => {
                ProblemDetails::new(status.as_u16(), resource.not_found_title())
            }
            NefError::CapacityExceeded(capacity) => {
                ProblemDetails::new(status.as_u16(), capacity.to_string())
            }
        };

        (
            status,
            [(header::CONTENT_TYPE, "application/problem+json")],
            Json(problem),
        )
            .into_response()
    }
}
