//! Minimal Mojang API client: username lookup and name history.

use std::time::Duration;

use serde::Deserialize;
use tally_core::config::MojangConfig;
use tracing::debug;

use crate::error::{DiscordError, Result};

/// UUIDs are 32 hex chars (36 with dashes); usernames are at most 16.
const UUID_MIN_LEN: usize = 32;

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
}

/// One entry of a player's name history.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NameEntry {
    pub name: String,
    /// Milliseconds since the epoch; absent for the original name.
    #[serde(rename = "changedToAt", default)]
    pub changed_to_at: Option<i64>,
}

pub struct MojangClient {
    http: reqwest::Client,
    api_base: String,
    session_base: String,
}

impl MojangClient {
    pub fn new(config: &MojangConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            session_base: config.session_base.trim_end_matches('/').to_string(),
        })
    }

    /// Resolve a username or UUID to a UUID. `None` if the player does not
    /// exist or the input cannot name one.
    pub async fn resolve(&self, input: &str) -> Result<Option<String>> {
        let input = input.trim();
        if input.len() >= UUID_MIN_LEN {
            return Ok(normalize_uuid(input));
        }
        if !is_valid_username(input) {
            debug!(input, "not a minecraft username, skipping lookup");
            return Ok(None);
        }
        let url = format!("{}/users/profiles/minecraft/{}", self.api_base, input);
        debug!(%url, "mojang username lookup");
        let resp = self.http.get(&url).send().await?;
        if matches!(
            resp.status(),
            reqwest::StatusCode::NO_CONTENT | reqwest::StatusCode::NOT_FOUND
        ) {
            return Ok(None);
        }
        let profile: Profile = resp.error_for_status()?.json().await?;
        Ok(Some(profile.id))
    }

    /// Current profile of `uuid`, used to validate UUID input.
    pub async fn profile(&self, uuid: &str) -> Result<Option<Profile>> {
        let url = format!("{}/session/minecraft/profile/{}", self.session_base, uuid);
        let resp = self.http.get(&url).send().await?;
        if matches!(
            resp.status(),
            reqwest::StatusCode::NO_CONTENT | reqwest::StatusCode::NOT_FOUND
        ) {
            return Ok(None);
        }
        Ok(Some(resp.error_for_status()?.json().await?))
    }

    /// Name history, newest first.
    pub async fn name_history(&self, uuid: &str) -> Result<Vec<NameEntry>> {
        let url = format!("{}/user/profiles/{}/names", self.api_base, uuid);
        debug!(%url, "mojang name history");
        let resp = self.http.get(&url).send().await?;
        if matches!(
            resp.status(),
            reqwest::StatusCode::NO_CONTENT | reqwest::StatusCode::NOT_FOUND
        ) {
            return Err(DiscordError::Lookup(format!("no such player: {uuid}")));
        }
        let body = resp.error_for_status()?.text().await?;
        newest_first(&body)
    }
}

/// Minecraft usernames: 1 to 16 of `[A-Za-z0-9_]`.
pub fn is_valid_username(name: &str) -> bool {
    (1..=16).contains(&name.len())
        && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Undashed lowercase UUID, or `None` unless `input` is 32 hex digits.
fn normalize_uuid(input: &str) -> Option<String> {
    let uuid: String = input.chars().filter(|c| *c != '-').collect();
    (uuid.len() == 32 && uuid.bytes().all(|b| b.is_ascii_hexdigit()))
        .then(|| uuid.to_ascii_lowercase())
}

/// Parse the oldest-first history payload and reverse it.
pub fn newest_first(body: &str) -> Result<Vec<NameEntry>> {
    let mut entries: Vec<NameEntry> =
        serde_json::from_str(body).map_err(|e| DiscordError::Lookup(e.to_string()))?;
    entries.reverse();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_reversed() {
        let body = r#"[{"name":"first"},{"name":"second","changedToAt":1414059749000}]"#;
        let entries = newest_first(body).unwrap();
        assert_eq!(entries[0].name, "second");
        assert_eq!(entries[0].changed_to_at, Some(1_414_059_749_000));
        assert_eq!(entries[1].changed_to_at, None);
    }

    #[test]
    fn garbage_is_a_lookup_error() {
        assert!(matches!(newest_first("{}"), Err(DiscordError::Lookup(_))));
    }

    #[tokio::test]
    async fn uuid_input_skips_the_lookup() {
        let client = MojangClient::new(&MojangConfig::default()).unwrap();
        let uuid = client
            .resolve("069a79f4-44e9-4726-a5be-fca90e38aaf5")
            .await
            .unwrap();
        assert_eq!(uuid.as_deref(), Some("069a79f444e94726a5befca90e38aaf5"));
    }

    #[test]
    fn usernames_are_checked_before_use() {
        assert!(is_valid_username("Notch"));
        assert!(is_valid_username("jeb_"));
        assert!(is_valid_username("a"));
        assert!(!is_valid_username(""));
        assert!(!is_valid_username("seventeen_chars__"));
        assert!(!is_valid_username("../../names"));
        assert!(!is_valid_username("a b"));
        assert!(!is_valid_username("n\u{f6}tch"));
    }

    #[test]
    fn uuids_must_be_hex() {
        assert_eq!(
            normalize_uuid("069A79F4-44E9-4726-A5BE-FCA90E38AAF5").as_deref(),
            Some("069a79f444e94726a5befca90e38aaf5")
        );
        assert_eq!(normalize_uuid("zz9a79f444e94726a5befca90e38aaf5"), None);
        assert_eq!(normalize_uuid("069a79f444e94726a5befca90e38aaf5/names?x"), None);
    }

    #[tokio::test]
    async fn malformed_input_never_reaches_the_api() {
        let config = MojangConfig {
            api_base: "http://127.0.0.1:9".to_string(),
            ..MojangConfig::default()
        };
        let client = MojangClient::new(&config).unwrap();
        assert_eq!(client.resolve("../user/profiles").await.unwrap(), None);
        assert_eq!(client.resolve("no spaces").await.unwrap(), None);
    }
}
