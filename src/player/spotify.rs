//! Spotify Web API player adapter.
//!
//! Needs a user access token with `user-read-playback-state` and
//! `user-modify-playback-state`; obtaining and refreshing it happens elsewhere.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;

use crate::config::PlayerConfig;
use crate::player::{ControlError, PlaybackControl, PlaybackStatus};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Deserialize, Debug)]
struct CurrentPlayback {
    #[serde(default)]
    is_playing: bool,
    progress_ms: Option<u64>,
    currently_playing_type: Option<String>,
    device: Option<Device>,
    item: Option<Item>,
}

#[derive(Deserialize, Debug)]
struct Device {
    id: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Item {
    name: Option<String>,
    duration_ms: Option<u64>,
    show: Option<Show>,
}

#[derive(Deserialize, Debug)]
struct Show {
    name: Option<String>,
}

/// Map the `/me/player` body onto [`PlaybackStatus`].
pub fn parse_status(body: &str) -> Result<PlaybackStatus, ControlError> {
    let pb: CurrentPlayback =
        serde_json::from_str(body).map_err(|e| ControlError::Parse(e.to_string()))?;

    let is_podcast = pb.currently_playing_type.as_deref() == Some("episode");
    let item = pb.item;

    Ok(PlaybackStatus {
        is_playing: pb.is_playing,
        is_podcast,
        episode: item.as_ref().and_then(|i| i.name.clone()),
        show: item
            .as_ref()
            .and_then(|i| i.show.as_ref())
            .and_then(|s| s.name.clone()),
        position_ms: pb.progress_ms,
        duration_ms: item.as_ref().and_then(|i| i.duration_ms),
        device_id: pb.device.and_then(|d| d.id),
    })
}

// ---------------------------------------------------------------------------
// SpotifyPlayer
// ---------------------------------------------------------------------------

pub struct SpotifyPlayer {
    client: reqwest::Client,
    config: PlayerConfig,
}

impl SpotifyPlayer {
    pub fn from_config(config: &PlayerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn request(&self, method: Method, path: &str) -> Result<reqwest::Response, ControlError> {
        let token = self
            .config
            .access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ControlError::NotConfigured("no Spotify access token".into()))?;

        let mut req = self.client.request(method.clone(), self.url(path)).bearer_auth(token);
        if method == Method::PUT {
            // Spotify rejects body-less PUTs without a length.
            req = req.header(reqwest::header::CONTENT_LENGTH, 0);
        }
        Ok(req.send().await?)
    }

    async fn expect_success(response: reqwest::Response) -> Result<(), ControlError> {
        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::FORBIDDEN => Err(ControlError::Forbidden),
            s => Err(ControlError::Api {
                status: s.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

#[async_trait]
impl PlaybackControl for SpotifyPlayer {
    async fn status(&self) -> Result<PlaybackStatus, ControlError> {
        let response = self
            .request(Method::GET, "/me/player?additional_types=episode")
            .await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(PlaybackStatus::idle());
        }
        let status = response.status();
        if !status.is_success() {
            return Err(ControlError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(PlaybackStatus::idle());
        }
        parse_status(&body)
    }

    async fn pause(&self) -> Result<(), ControlError> {
        let response = self.request(Method::PUT, "/me/player/pause").await?;
        Self::expect_success(response).await
    }

    async fn resume(&self, device_id: Option<&str>) -> Result<bool, ControlError> {
        let path = match device_id.filter(|d| !d.is_empty()) {
            Some(id) => format!("/me/player/play?device_id={id}"),
            None => "/me/player/play".to_string(),
        };
        let response = self.request(Method::PUT, &path).await?;

        if response.status() == StatusCode::NOT_FOUND {
            log::warn!("player: no active device to resume on");
            return Ok(false);
        }
        Self::expect_success(response).await.map(|()| true)
    }

    async fn seek(&self, position_ms: u64) -> Result<(), ControlError> {
        let path = format!("/me/player/seek?position_ms={position_ms}");
        let response = self.request(Method::PUT, &path).await?;
        Self::expect_success(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_episode_status() {
        let body = r#"{
            "is_playing": true,
            "progress_ms": 13486000,
            "currently_playing_type": "episode",
            "device": { "id": "dev-1", "name": "Laptop" },
            "item": {
                "name": "Nvidia Part III",
                "duration_ms": 14400000,
                "show": { "name": "Acquired" }
            }
        }"#;
        let s = parse_status(body).unwrap();
        assert!(s.is_playing);
        assert!(s.is_podcast);
        assert_eq!(s.episode.as_deref(), Some("Nvidia Part III"));
        assert_eq!(s.show.as_deref(), Some("Acquired"));
        assert_eq!(s.position_ms, Some(13_486_000));
        assert_eq!(s.duration_ms, Some(14_400_000));
        assert_eq!(s.device_id.as_deref(), Some("dev-1"));
    }

    #[test]
    fn music_track_is_not_a_podcast() {
        let body = r#"{
            "is_playing": true,
            "progress_ms": 1000,
            "currently_playing_type": "track",
            "item": { "name": "Song", "duration_ms": 200000 }
        }"#;
        let s = parse_status(body).unwrap();
        assert!(!s.is_podcast);
        assert!(s.show.is_none());
        assert!(s.device_id.is_none());
    }

    #[test]
    fn garbage_body_is_parse_error() {
        assert!(matches!(parse_status("nope"), Err(ControlError::Parse(_))));
    }

    #[tokio::test]
    async fn missing_token_is_not_configured() {
        let player = SpotifyPlayer::from_config(&PlayerConfig::default());
        assert!(matches!(
            player.pause().await,
            Err(ControlError::NotConfigured(_))
        ));
    }
}
