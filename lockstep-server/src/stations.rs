use axum::{
    extract::{Path, Query},
    routing::{delete, get, post, put},
    Json,
};
use lockstep_collab::ConnectionId;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{
        ConnectionSchema, ListStationsQuery, NewStationSchema, PartyModeSchema,
        PrivatePlaylistSchema, QueueSongSchema, RepositionSchema, StationActionSchema,
        ValidatedJson,
    },
    serialized::{
        CurrentTime, JoinedStation, LockState, QueuedSong, Station, ToSerialized, VoteOutcome,
    },
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/stations",
    tag = "stations",
    params(ListStationsQuery),
    security(
        (),
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<Station>)
    )
)]
async fn list_stations(
    Session(actor): Session,
    context: ServerContext,
    Query(query): Query<ListStationsQuery>,
) -> ServerResult<Json<Vec<Station>>> {
    let stations = context
        .collab
        .stations
        .list_for_home(&actor, query.hide_unlisted)
        .await?;

    Ok(Json(stations.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/stations",
    tag = "stations",
    request_body = NewStationSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Station),
        (status = 409, description = "A station with that name already exists")
    )
)]
async fn create_station(
    Session(actor): Session,
    context: ServerContext,
    ValidatedJson(body): ValidatedJson<NewStationSchema>,
) -> ServerResult<Json<Station>> {
    let station = context
        .collab
        .stations
        .create(&actor, body.into())
        .await?;

    Ok(Json(station.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/stations/{id}",
    tag = "stations",
    security(
        (),
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Station)
    )
)]
async fn station(
    Session(actor): Session,
    context: ServerContext,
    Path(station_id): Path<String>,
) -> ServerResult<Json<Station>> {
    let station = context.collab.stations.station(&actor, &station_id).await?;

    Ok(Json(station.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/stations/{id}",
    tag = "stations",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The station was removed")
    )
)]
async fn remove_station(
    Session(actor): Session,
    context: ServerContext,
    Path(station_id): Path<String>,
) -> ServerResult<()> {
    context.collab.stations.remove(&actor, &station_id).await?;

    Ok(())
}

#[utoipa::path(
    get,
    path = "/v1/stations/{id}/time",
    tag = "stations",
    security(
        (),
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = CurrentTime)
    )
)]
async fn current_time(
    Session(actor): Session,
    context: ServerContext,
    Path(station_id): Path<String>,
) -> ServerResult<Json<CurrentTime>> {
    let time = context
        .collab
        .stations
        .current_time(&actor, &station_id)
        .await?;

    Ok(Json(time.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/stations/{id}/join",
    tag = "stations",
    request_body = ConnectionSchema,
    security(
        (),
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = JoinedStation)
    )
)]
async fn join_station(
    Session(actor): Session,
    context: ServerContext,
    Path(station_id): Path<String>,
    ValidatedJson(body): ValidatedJson<ConnectionSchema>,
) -> ServerResult<Json<JoinedStation>> {
    let joined = context
        .collab
        .stations
        .join(
            &actor,
            ConnectionId::from_value(body.connection_id),
            &station_id,
        )
        .await?;

    Ok(Json(joined.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/stations/{id}/leave",
    tag = "stations",
    request_body = ConnectionSchema,
    security(
        (),
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The connection left the station")
    )
)]
async fn leave_station(
    Session(actor): Session,
    context: ServerContext,
    Path(station_id): Path<String>,
    ValidatedJson(body): ValidatedJson<ConnectionSchema>,
) -> ServerResult<()> {
    context
        .collab
        .stations
        .leave(
            &actor,
            ConnectionId::from_value(body.connection_id),
            &station_id,
        )
        .await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/stations/{id}/queue",
    tag = "stations",
    request_body = QueueSongSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = QueuedSong),
        (status = 400, description = "The song was not admitted, with the reason as the body")
    )
)]
async fn add_to_queue(
    Session(actor): Session,
    context: ServerContext,
    Path(station_id): Path<String>,
    ValidatedJson(body): ValidatedJson<QueueSongSchema>,
) -> ServerResult<Json<QueuedSong>> {
    let queued = context
        .collab
        .stations
        .add_to_queue(&actor, &station_id, &body.media_source_id)
        .await?;

    Ok(Json(queued.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/stations/{id}/queue/{media_source_id}",
    tag = "stations",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The song was removed from the queue")
    )
)]
async fn remove_from_queue(
    Session(actor): Session,
    context: ServerContext,
    Path((station_id, media_source_id)): Path<(String, String)>,
) -> ServerResult<()> {
    context
        .collab
        .stations
        .remove_from_queue(&actor, &station_id, &media_source_id)
        .await?;

    Ok(())
}

#[utoipa::path(
    put,
    path = "/v1/stations/{id}/queue/{media_source_id}/position",
    tag = "stations",
    request_body = RepositionSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The song was moved")
    )
)]
async fn reposition_in_queue(
    Session(actor): Session,
    context: ServerContext,
    Path((station_id, media_source_id)): Path<(String, String)>,
    ValidatedJson(body): ValidatedJson<RepositionSchema>,
) -> ServerResult<()> {
    context
        .collab
        .stations
        .reposition_in_queue(&actor, &station_id, &media_source_id, body.new_index)
        .await?;

    Ok(())
}

#[utoipa::path(
    post,
    path = "/v1/stations/{id}/actions",
    tag = "stations",
    request_body = StationActionSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The action was performed", body = Option<VoteOutcome>)
    )
)]
async fn perform_action(
    Session(actor): Session,
    context: ServerContext,
    Path(station_id): Path<String>,
    Json(body): Json<StationActionSchema>,
) -> ServerResult<Json<Option<VoteOutcome>>> {
    let stations = &context.collab.stations;

    let outcome = match body {
        StationActionSchema::Pause => stations.pause(&actor, &station_id).await.map(|_| None),
        StationActionSchema::Resume => stations.resume(&actor, &station_id).await.map(|_| None),
        StationActionSchema::ForceSkip => {
            stations.force_skip(&actor, &station_id).await.map(|_| None)
        }
        StationActionSchema::VoteSkip => stations
            .vote_skip(&actor, &station_id)
            .await
            .map(|o| Some(o.to_serialized())),
    }?;

    Ok(Json(outcome))
}

#[utoipa::path(
    post,
    path = "/v1/stations/{id}/lock",
    tag = "stations",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = LockState)
    )
)]
async fn toggle_lock(
    Session(actor): Session,
    context: ServerContext,
    Path(station_id): Path<String>,
) -> ServerResult<Json<LockState>> {
    let locked = context
        .collab
        .stations
        .toggle_lock(&actor, &station_id)
        .await?;

    Ok(Json(LockState { locked }))
}

#[utoipa::path(
    put,
    path = "/v1/stations/{id}/party-mode",
    tag = "stations",
    request_body = PartyModeSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Party mode was updated")
    )
)]
async fn update_party_mode(
    Session(actor): Session,
    context: ServerContext,
    Path(station_id): Path<String>,
    ValidatedJson(body): ValidatedJson<PartyModeSchema>,
) -> ServerResult<()> {
    context
        .collab
        .stations
        .update_party_mode(&actor, &station_id, body.party_mode)
        .await?;

    Ok(())
}

#[utoipa::path(
    put,
    path = "/v1/stations/{id}/playlist",
    tag = "stations",
    request_body = PrivatePlaylistSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The playlist was selected")
    )
)]
async fn select_private_playlist(
    Session(actor): Session,
    context: ServerContext,
    Path(station_id): Path<String>,
    ValidatedJson(body): ValidatedJson<PrivatePlaylistSchema>,
) -> ServerResult<()> {
    context
        .collab
        .stations
        .select_private_playlist(&actor, &station_id, body.playlist_id)
        .await?;

    Ok(())
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_stations).post(create_station))
        .route("/:id", get(station).delete(remove_station))
        .route("/:id/time", get(current_time))
        .route("/:id/join", post(join_station))
        .route("/:id/leave", post(leave_station))
        .route("/:id/queue", post(add_to_queue))
        .route("/:id/queue/:media_source_id", delete(remove_from_queue))
        .route(
            "/:id/queue/:media_source_id/position",
            put(reposition_in_queue),
        )
        .route("/:id/actions", post(perform_action))
        .route("/:id/lock", post(toggle_lock))
        .route("/:id/party-mode", put(update_party_mode))
        .route("/:id/playlist", put(select_private_playlist))
}
