//! Raw HTTP access to the v1.1 `statuses` endpoints.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

use super::{ApiClient, MetadataSource};
use crate::error::Result;
use crate::twitter_post::{MediaItem, PostMetadata, Variant};

const SHOW_PATH: &str = "1.1/statuses/show.json";
const LOOKUP_PATH: &str = "1.1/statuses/lookup.json";

#[derive(Deserialize, Debug)]
struct Status {
    id_str: String,
    #[serde(deserialize_with = "deserialize_datetime")]
    created_at: OffsetDateTime,
    user: User,
    extended_entities: Option<ExtendedEntities>,
}

#[derive(Deserialize, Debug)]
struct User {
    screen_name: String,
}

#[derive(Deserialize, Debug)]
struct ExtendedEntities {
    #[serde(default)]
    media: Vec<Medium>,
}

#[derive(Deserialize, Debug)]
struct Medium {
    #[serde(rename = "type")]
    kind: String,
    media_url_https: Option<String>,
    video_info: Option<VideoInfo>,
}

#[derive(Deserialize, Debug)]
struct VideoInfo {
    #[serde(default)]
    variants: Vec<V1Variant>,
}

#[derive(Deserialize, Debug)]
struct V1Variant {
    bitrate: Option<u64>,
    url: String,
}

fn deserialize_datetime<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    // e.g. "Sat Jul 01 12:00:00 +0000 2023"
    const FORMAT: &[FormatItem<'static>] = format_description!(
        "[weekday repr:short] [month repr:short] [day] [hour]:[minute]:[second] [offset_hour sign:mandatory][offset_minute] [year]"
    );
    let s = String::deserialize(deserializer)?;
    OffsetDateTime::parse(&s, FORMAT).map_err(serde::de::Error::custom)
}

impl Status {
    fn into_metadata(self) -> Result<PostMetadata> {
        let media = self
            .extended_entities
            .map(|e| e.media)
            .unwrap_or_default()
            .into_iter()
            .map(|m| {
                let variants = m
                    .video_info
                    .map(|v| v.variants)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|v| Variant {
                        url: v.url,
                        bitrate: v.bitrate,
                    })
                    .collect();
                MediaItem::from_parts(&m.kind, m.media_url_https, variants)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(PostMetadata {
            id: self.id_str,
            author: self.user.screen_name,
            created_at: self.created_at,
            media,
        })
    }
}

pub struct V1Source {
    api: ApiClient,
}

impl V1Source {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl MetadataSource for V1Source {
    async fn fetch_one(&self, id: &str) -> Result<PostMetadata> {
        let status: Status = self
            .api
            .get_json(SHOW_PATH, &[("id", id), ("tweet_mode", "extended")])
            .await?;
        status.into_metadata()
    }

    async fn fetch_many(&self, ids: &[String]) -> Result<Vec<PostMetadata>> {
        let ids = ids.join(",");
        let statuses: Vec<Status> = self
            .api
            .get_json(LOOKUP_PATH, &[("id", &ids), ("tweet_mode", "extended")])
            .await?;
        statuses.into_iter().map(Status::into_metadata).collect()
    }
}
