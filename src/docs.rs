use utoipa::OpenApi;

use crate::common::response::ResponseStatus;
use crate::modules::status::dto::{HealthResponse, ProfileResponse};
use crate::state::StatsSnapshot;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::status::handler::health,
        crate::modules::status::handler::list_profiles,
    ),
    components(schemas(HealthResponse, ProfileResponse, StatsSnapshot, ResponseStatus)),
    tags(
        (name = "Status", description = "Service health and rendition profiles")
    )
)]
pub struct ApiDoc;
