use std::sync::LazyLock;

use regex::Regex;
use reqwest::{Client, RequestBuilder, Response, StatusCode, header::AUTHORIZATION};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{
    common::{
        Result,
        types::{GuildId, SessionId},
    },
    protocol::{LoadResult, PlayerInfo, PlayerUpdate, SessionInfo, SessionUpdate},
};

/// Search engine token prepended to free-text queries.
pub const DEFAULT_SEARCH_PREFIX: &str = "ytsearch";

static ABSOLUTE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://\S+$").expect("static regex")
});

/// Turns a user query into a `loadtracks` identifier: absolute URLs are sent
/// as-is, anything else becomes `<prefix>:<query>`.
pub fn search_identifier(query: &str, prefix: &str) -> String {
    let query = query.trim();
    if ABSOLUTE_URL.is_match(query) {
        query.to_string()
    } else {
        format!("{}:{}", prefix, query)
    }
}

/// REST control plane of a single node.
///
/// Every request carries the node credential as `Authorization`. A non-200
/// answer is logged and reported as `None`, never as an error; only
/// transport and decode failures surface as `Err`.
#[derive(Clone)]
pub struct RestClient {
    http: Client,
    base: String,
    password: String,
    identifier: String,
}

impl RestClient {
    pub fn new(http: Client, base: String, password: String, identifier: String) -> Self {
        Self {
            http,
            base,
            password,
            identifier,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        Ok(request
            .header(AUTHORIZATION, &self.password)
            .send()
            .await?)
    }

    async fn json_or_none<T: DeserializeOwned>(
        &self,
        response: Response,
        what: &str,
    ) -> Result<Option<T>> {
        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            warn!(
                "[{}] {} answered {}: {}",
                self.identifier, what, status, body
            );
            return Ok(None);
        }

        let text = response.text().await?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// `GET /v4/loadtracks?identifier=...`
    pub async fn load_tracks(&self, identifier: &str) -> Result<Option<LoadResult>> {
        let url = format!(
            "{}/loadtracks?identifier={}",
            self.base,
            urlencoding::encode(identifier)
        );
        debug!("[{}] Loading tracks for '{}'", self.identifier, identifier);

        let response = self.send(self.http.get(url)).await?;
        self.json_or_none(response, "loadtracks").await
    }

    /// `PATCH /v4/sessions/{sessionId}/players/{guildId}`
    pub async fn update_player(
        &self,
        session_id: &SessionId,
        guild_id: &GuildId,
        update: &PlayerUpdate,
    ) -> Result<Option<PlayerInfo>> {
        let url = format!(
            "{}/sessions/{}/players/{}?noReplace={}",
            self.base, session_id, guild_id, update.no_replace
        );

        let response = self.send(self.http.patch(url).json(update)).await?;
        self.json_or_none(response, "player update").await
    }

    /// `DELETE /v4/sessions/{sessionId}/players/{guildId}`. A player the
    /// node no longer knows counts as deleted.
    pub async fn destroy_player(&self, session_id: &SessionId, guild_id: &GuildId) -> Result<()> {
        let url = format!("{}/sessions/{}/players/{}", self.base, session_id, guild_id);

        let response = self
            .send(self.http.delete(url).json(&serde_json::json!({})))
            .await?;
        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            warn!(
                "[{}/{}] Player delete answered {}",
                self.identifier, guild_id, status
            );
        }
        Ok(())
    }

    /// `PATCH /v4/sessions/{sessionId}`
    pub async fn update_session(
        &self,
        session_id: &SessionId,
        update: &SessionUpdate,
    ) -> Result<Option<SessionInfo>> {
        let url = format!("{}/sessions/{}", self.base, session_id);

        let response = self.send(self.http.patch(url).json(update)).await?;
        self.json_or_none(response, "session update").await
    }
}
