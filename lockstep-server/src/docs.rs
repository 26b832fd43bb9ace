use axum::{response::IntoResponse, Json};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{schemas, serialized, sse, stations};

#[derive(OpenApi)]
#[openapi(
    paths(
        stations::list_stations,
        stations::create_station,
        stations::station,
        stations::remove_station,
        stations::current_time,
        stations::join_station,
        stations::leave_station,
        stations::add_to_queue,
        stations::remove_from_queue,
        stations::reposition_in_queue,
        stations::perform_action,
        stations::toggle_lock,
        stations::update_party_mode,
        stations::select_private_playlist,
        sse::event_stream,
    ),
    components(schemas(
        schemas::StationTypeSchema,
        schemas::PrivacySchema,
        schemas::NewStationSchema,
        schemas::ConnectionSchema,
        schemas::QueueSongSchema,
        schemas::RepositionSchema,
        schemas::PartyModeSchema,
        schemas::PrivatePlaylistSchema,
        schemas::StationActionSchema,
        serialized::Station,
        serialized::CurrentSong,
        serialized::QueuedSong,
        serialized::CurrentTime,
        serialized::JoinedStation,
        serialized::VoteOutcome,
        serialized::LockState,
        sse::ServerEvent,
    )),
    modifiers(&Security),
    info(
        title = "lockstep",
        description = "lockstep-server exposes endpoints to listen to and control synchronized stations"
    )
)]
pub struct ApiDoc;

struct Security;

impl Modify for Security {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let scheme = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("Bearer <token>")
                .build();

            components.add_security_scheme("BearerAuth", SecurityScheme::Http(scheme))
        }
    }
}

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
