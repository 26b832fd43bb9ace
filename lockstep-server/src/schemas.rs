use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    Json,
};
use lockstep_core::{NewStation, Privacy, StationType};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StationTypeSchema {
    Official,
    Community,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PrivacySchema {
    Public,
    Unlisted,
    Private,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewStationSchema {
    #[serde(rename = "type")]
    pub kind: StationTypeSchema,
    pub privacy: PrivacySchema,
    #[validate(length(min = 2, max = 16))]
    pub name: String,
    #[validate(length(min = 2, max = 32))]
    pub display_name: String,
    #[validate(length(max = 200))]
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConnectionSchema {
    /// The id received in the `connected` event
    pub connection_id: u64,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QueueSongSchema {
    #[validate(length(min = 1, max = 64))]
    pub media_source_id: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RepositionSchema {
    pub new_index: usize,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PartyModeSchema {
    pub party_mode: bool,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PrivatePlaylistSchema {
    #[validate(length(min = 1, max = 64))]
    pub playlist_id: String,
}

#[derive(Debug, ToSchema, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum StationActionSchema {
    Pause,
    Resume,
    /// Skips the current song without a vote
    ForceSkip,
    VoteSkip,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListStationsQuery {
    /// Leaves unlisted stations out, even for administrators
    #[serde(default)]
    pub hide_unlisted: bool,
}

impl From<NewStationSchema> for NewStation {
    fn from(value: NewStationSchema) -> Self {
        NewStation {
            kind: value.kind.into(),
            privacy: value.privacy.into(),
            name: value.name,
            display_name: value.display_name,
            description: value.description,
        }
    }
}

impl From<StationTypeSchema> for StationType {
    fn from(value: StationTypeSchema) -> Self {
        match value {
            StationTypeSchema::Official => StationType::Official,
            StationTypeSchema::Community => StationType::Community,
        }
    }
}

impl From<StationType> for StationTypeSchema {
    fn from(value: StationType) -> Self {
        match value {
            StationType::Official => StationTypeSchema::Official,
            StationType::Community => StationTypeSchema::Community,
        }
    }
}

impl From<PrivacySchema> for Privacy {
    fn from(value: PrivacySchema) -> Self {
        match value {
            PrivacySchema::Public => Privacy::Public,
            PrivacySchema::Unlisted => Privacy::Unlisted,
            PrivacySchema::Private => Privacy::Private,
        }
    }
}

impl From<Privacy> for PrivacySchema {
    fn from(value: Privacy) -> Self {
        match value {
            Privacy::Public => PrivacySchema::Public,
            Privacy::Unlisted => PrivacySchema::Unlisted,
            Privacy::Private => PrivacySchema::Private,
        }
    }
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "JSON parse failed"))?;

        extracted_json
            .0
            .validate()
            .map_err(|_| (StatusCode::BAD_REQUEST, "Request body is invalid"))?;

        Ok(Self(extracted_json.0))
    }
}
