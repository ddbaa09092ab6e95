use utoipa::OpenApi;

pub const HEALTH_TAG: &str = "Health";
pub const JOB_TAG: &str = "Jobs";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "telebackup",
        description = "Diagnostics API for the telebackup scheduler",
    ),
    components(
        schemas(
            crate::api::dto::ErrorResponse,
        )
    ),
    tags(
        (name = HEALTH_TAG, description = "Health check endpoints"),
        (name = JOB_TAG, description = "Manual runs, due-job diagnostics and execution logs"),
    )
)]
pub struct ApiDoc;
