//! Raw HTTP access to the v2 `tweets` endpoints.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::warn;

use super::{ApiClient, MetadataSource};
use crate::error::{Error, Result};
use crate::twitter_post::{MediaItem, PostMetadata, Variant};

const TWEETS_PATH: &str = "2/tweets";

const EXPANSIONS: &str = "attachments.media_keys,author_id";
const MEDIA_FIELDS: &str = "type,url,variants";
const TWEET_FIELDS: &str = "created_at";
const USER_FIELDS: &str = "username";

#[derive(Deserialize, Debug)]
struct TweetsResponse<T> {
    data: Option<T>,
    #[serde(default)]
    includes: Includes,
    #[serde(default)]
    errors: Vec<Problem>,
}

#[derive(Deserialize, Debug)]
struct Tweet {
    id: String,
    #[serde(deserialize_with = "deserialize_datetime")]
    created_at: OffsetDateTime,
    author_id: String,
    attachments: Option<Attachments>,
}

#[derive(Deserialize, Debug)]
struct Attachments {
    #[serde(default)]
    media_keys: Vec<String>,
}

#[derive(Deserialize, Debug, Default)]
struct Includes {
    #[serde(default)]
    media: Vec<Media>,
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Deserialize, Debug)]
struct Media {
    media_key: String,
    #[serde(rename = "type")]
    kind: String,
    url: Option<String>,
    #[serde(default)]
    variants: Vec<V2Variant>,
}

#[derive(Deserialize, Debug)]
struct V2Variant {
    bit_rate: Option<u64>,
    url: String,
}

#[derive(Deserialize, Debug)]
struct User {
    id: String,
    username: String,
}

/// Per-tweet error reported alongside (or instead of) `data`.
#[derive(Deserialize, Debug)]
struct Problem {
    resource_id: Option<String>,
    title: Option<String>,
    detail: Option<String>,
}

fn deserialize_datetime<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    OffsetDateTime::parse(&s, &Rfc3339).map_err(serde::de::Error::custom)
}

impl<T> TweetsResponse<T> {
    fn log_problems(&self) {
        for p in &self.errors {
            warn!(
                "Tweet {}: {}",
                p.resource_id.as_deref().unwrap_or("?"),
                p.detail
                    .as_deref()
                    .or(p.title.as_deref())
                    .unwrap_or("unknown error")
            );
        }
    }
}

/// Join tweets with their expanded authors and media.
fn assemble(tweets: Vec<Tweet>, includes: Includes) -> Result<Vec<PostMetadata>> {
    let users: HashMap<&str, &str> = includes
        .users
        .iter()
        .map(|u| (u.id.as_str(), u.username.as_str()))
        .collect();
    let media: HashMap<&str, &Media> = includes
        .media
        .iter()
        .map(|m| (m.media_key.as_str(), m))
        .collect();

    tweets
        .into_iter()
        .map(|tweet| {
            let author = users.get(tweet.author_id.as_str()).ok_or_else(|| {
                Error::MalformedResponse(format!(
                    "author {} of tweet {} missing from includes",
                    tweet.author_id, tweet.id
                ))
            })?;

            let keys = tweet.attachments.map(|a| a.media_keys).unwrap_or_default();
            let items = keys
                .iter()
                .map(|key| {
                    let m = media.get(key.as_str()).ok_or_else(|| {
                        Error::MalformedResponse(format!(
                            "media {} of tweet {} missing from includes",
                            key, tweet.id
                        ))
                    })?;
                    let variants = m
                        .variants
                        .iter()
                        .map(|v| Variant {
                            url: v.url.clone(),
                            bitrate: v.bit_rate,
                        })
                        .collect();
                    MediaItem::from_parts(&m.kind, m.url.clone(), variants)
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(PostMetadata {
                id: tweet.id,
                author: author.to_string(),
                created_at: tweet.created_at,
                media: items,
            })
        })
        .collect()
}

pub struct V2Source {
    api: ApiClient,
}

impl V2Source {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    fn params() -> [(&'static str, &'static str); 4] {
        [
            ("expansions", EXPANSIONS),
            ("media.fields", MEDIA_FIELDS),
            ("tweet.fields", TWEET_FIELDS),
            ("user.fields", USER_FIELDS),
        ]
    }
}

#[async_trait]
impl MetadataSource for V2Source {
    async fn fetch_one(&self, id: &str) -> Result<PostMetadata> {
        let resp: TweetsResponse<Tweet> = self
            .api
            .get_json(&format!("{}/{}", TWEETS_PATH, id), &Self::params())
            .await?;
        resp.log_problems();

        let tweet = resp.data.ok_or(Error::NoPostsResolved)?;
        assemble(vec![tweet], resp.includes)?
            .pop()
            .ok_or(Error::NoPostsResolved)
    }

    async fn fetch_many(&self, ids: &[String]) -> Result<Vec<PostMetadata>> {
        let ids = ids.join(",");
        let mut query: Vec<(&str, &str)> = Self::params().to_vec();
        query.push(("ids", &ids));

        let resp: TweetsResponse<Vec<Tweet>> = self.api.get_json(TWEETS_PATH, &query).await?;
        resp.log_problems();

        assemble(resp.data.unwrap_or_default(), resp.includes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn assembles_authors_and_media_by_key() {
        let json = r#"{
            "data": [
                {"id": "1", "created_at": "2023-07-01T12:00:00.000Z", "author_id": "10",
                 "attachments": {"media_keys": ["3_b", "7_a"]}},
                {"id": "2", "created_at": "2023-07-02T08:30:00.000Z", "author_id": "11"}
            ],
            "includes": {
                "media": [
                    {"media_key": "7_a", "type": "video", "variants": [
                        {"bit_rate": 256000, "content_type": "video/mp4", "url": "https://video.twimg.com/lo.mp4"},
                        {"content_type": "application/x-mpegURL", "url": "https://video.twimg.com/pl.m3u8"}
                    ]},
                    {"media_key": "3_b", "type": "photo", "url": "https://pbs.twimg.com/media/b.jpg"}
                ],
                "users": [
                    {"id": "11", "username": "bob", "name": "Bob"},
                    {"id": "10", "username": "alice", "name": "Alice"}
                ]
            }
        }"#;
        let resp: TweetsResponse<Vec<Tweet>> = serde_json::from_str(json).unwrap();
        let posts = assemble(resp.data.unwrap(), resp.includes).unwrap();

        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].author, "alice");
        assert_eq!(posts[0].created_at, datetime!(2023-07-01 12:00:00 UTC));
        assert_eq!(posts[0].media[0].kind(), "photo");
        assert_eq!(posts[0].media[1].kind(), "video");
        assert_eq!(posts[1].author, "bob");
        assert!(posts[1].media.is_empty());
    }

    #[test]
    fn missing_author_is_malformed() {
        let json = r#"{
            "data": {"id": "1", "created_at": "2023-07-01T12:00:00.000Z", "author_id": "10"},
            "includes": {"users": []}
        }"#;
        let resp: TweetsResponse<Tweet> = serde_json::from_str(json).unwrap();
        let res = assemble(vec![resp.data.unwrap()], resp.includes);
        assert!(matches!(res, Err(Error::MalformedResponse(_))));
    }

    #[test]
    fn errors_only_response_parses() {
        let json = r#"{"errors": [{"value": "9", "detail": "Could not find tweet with ids: [9].",
                       "title": "Not Found Error", "resource_id": "9"}]}"#;
        let resp: TweetsResponse<Tweet> = serde_json::from_str(json).unwrap();
        assert!(resp.data.is_none());
        assert_eq!(resp.errors.len(), 1);
    }
}
