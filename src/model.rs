use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de::IgnoredAny, Deserialize, Deserializer, Serialize};

pub type ServerId = u64;

/// Entry of the remote server catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub id: ServerId,
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub image: Option<String>,
    /// Value passed to the client as `-devserver`
    pub devserver: String,
    #[serde(default)]
    pub players: u64,
    #[serde(default)]
    pub votes: u64,
    #[serde(default, alias = "createdAt", deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Server {
    /// Fuzzy match of `query` against the server name, in `0.0..=1.0`
    pub fn score(&self, query: &str) -> f64 {
        let name = self.name.to_lowercase();
        let query = query.to_lowercase();

        let mut score = strsim::jaro_winkler(&name, &query);

        // substring hits rank above lookalikes
        if name.contains(&query) {
            score = (score + 1.0) / 2.0 + 0.25;
        }

        score.min(1.0)
    }

    /// Image reference with a scheme, or `None` when the catalog has none
    pub fn image_url(&self) -> Option<String> {
        normalize_image(self.image.as_deref())
    }
}

/// Site-relative paths have no host to resolve against and are dropped
pub fn normalize_image(image: Option<&str>) -> Option<String> {
    match image.map(str::trim) {
        Some(img) if img.starts_with("http") => Some(img.to_owned()),
        Some(img) if img.starts_with('/') => None,
        Some(img) if !img.is_empty() => Some(format!("https://{img}")),
        _ => None,
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Epoch(i64),
    Text(String),
    Other(IgnoredAny),
}

/// Catalog dates are informational, so an unreadable one becomes `None`
/// instead of rejecting the whole list
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let parsed = match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Epoch(secs) => DateTime::from_timestamp(secs, 0),
        RawTimestamp::Text(text) => parse_timestamp(text.trim()),
        RawTimestamp::Other(_) => None,
    };

    Ok(parsed)
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .map_err(|err| log::debug!("unreadable catalog date {text:?}: {err}"))
        .ok()
}

#[cfg(test)]
pub(crate) fn server(id: ServerId, name: &str, players: u64, votes: u64) -> Server {
    Server {
        id,
        name: name.to_owned(),
        url: format!("https://{}.example", name.to_lowercase()),
        image: None,
        devserver: format!("{}.example", name.to_lowercase()),
        players,
        votes,
        created_at: None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_deserialize_catalog_entry() {
        let json = r#"{
            "id": 7,
            "name": "Akatsuki",
            "url": "https://akatsuki.gg",
            "image": "a.ppy.sh/7",
            "devserver": "akatsuki.gg",
            "players": 1234,
            "votes": 56,
            "created_at": "2021-03-04T05:06:07Z",
            "description": "ignored"
        }"#;

        let server: Server = serde_json::from_str(json).unwrap();

        assert_eq!(server.id, 7);
        assert_eq!(server.devserver, "akatsuki.gg");
        assert_eq!(server.players, 1234);
        assert!(server.created_at.is_some());
        assert_eq!(server.image_url().as_deref(), Some("https://a.ppy.sh/7"));
    }

    #[test]
    fn test_missing_counters_default_to_zero() {
        let json = r#"{"id": 1, "name": "Bancho", "devserver": "ppy.sh"}"#;
        let server: Server = serde_json::from_str(json).unwrap();

        assert_eq!(server.players, 0);
        assert_eq!(server.votes, 0);
        assert_eq!(server.image_url(), None);
    }

    #[test]
    fn test_normalize_image() {
        assert_eq!(
            normalize_image(Some("http://x/y.png")).as_deref(),
            Some("http://x/y.png")
        );
        assert_eq!(
            normalize_image(Some("x/y.png")).as_deref(),
            Some("https://x/y.png")
        );
        assert_eq!(normalize_image(Some("/logo.png")), None);
        assert_eq!(normalize_image(Some("  ")), None);
        assert_eq!(normalize_image(None), None);
    }

    #[test]
    fn test_unreadable_date_keeps_entry() {
        let json = r#"[
            {"id": 1, "name": "Akatsuki", "devserver": "akatsuki.gg", "created_at": "last tuesday"},
            {"id": 2, "name": "Ripple", "devserver": "ripple.moe", "createdAt": "2019-01-02 03:04:05"},
            {"id": 3, "name": "Gatari", "devserver": "gatari.pw", "created_at": 1546398245},
            {"id": 4, "name": "Kurikku", "devserver": "kurikku.pw", "created_at": null},
            {"id": 5, "name": "Bancho", "devserver": "ppy.sh", "created_at": {"seconds": 1}}
        ]"#;

        let servers: Vec<Server> = serde_json::from_str(json).unwrap();
        assert_eq!(servers.len(), 5);

        let expected = "2019-01-02T03:04:05Z".parse::<DateTime<Utc>>().unwrap();

        assert_eq!(servers[0].created_at, None);
        assert_eq!(servers[1].created_at, Some(expected));
        assert_eq!(servers[2].created_at, Some(expected));
        assert_eq!(servers[3].created_at, None);
        assert_eq!(servers[4].created_at, None);
    }

    #[test]
    fn test_score_prefers_substring() {
        let exact = server(1, "Akatsuki", 0, 0);
        let other = server(2, "Ripple", 0, 0);

        assert!(exact.score("akat") > other.score("akat"));
        assert!(exact.score("AKATSUKI") > 0.99);
    }
}
