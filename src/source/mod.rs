//! Tweet metadata lookup over the different API flavours.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::{ApiVersion, Credentials};
use crate::error::{Error, Result};
use crate::post_ref;
use crate::twitter_post::PostMetadata;

pub mod v1;
pub mod v2;

/// A backend able to turn normalized tweet IDs into post metadata.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Metadata for a single tweet.
    async fn fetch_one(&self, id: &str) -> Result<PostMetadata>;

    /// Metadata for several tweets in one request. Tweets the API could not
    /// return are left out.
    async fn fetch_many(&self, ids: &[String]) -> Result<Vec<PostMetadata>>;
}

/// Normalize `references` and fetch their metadata through `source`, in
/// request order.
pub async fn resolve<S: AsRef<str>>(
    source: &dyn MetadataSource,
    references: &[S],
) -> Result<Vec<PostMetadata>> {
    let ids = post_ref::normalize_all(references)?;
    let posts = match ids.as_slice() {
        [] => Vec::new(),
        [id] => vec![source.fetch_one(id).await?],
        _ => source.fetch_many(&ids).await?,
    };

    let posts = order_by_request(&ids, posts);
    if posts.is_empty() {
        return Err(Error::NoPostsResolved);
    }
    Ok(posts)
}

/// Build the source for `version`.
pub fn for_version(
    version: ApiVersion,
    client: Client,
    base_url: &str,
    credentials: Credentials,
) -> Box<dyn MetadataSource> {
    let api = ApiClient::new(client, base_url, credentials);
    match version {
        ApiVersion::V1 => Box::new(v1::V1Source::new(api)),
        ApiVersion::V2 => Box::new(v2::V2Source::new(api)),
    }
}

fn order_by_request(ids: &[String], mut posts: Vec<PostMetadata>) -> Vec<PostMetadata> {
    let mut ordered = Vec::with_capacity(posts.len());
    for id in ids {
        match posts.iter().position(|p| &p.id == id) {
            Some(i) => ordered.push(posts.swap_remove(i)),
            None => warn!("Tweet {} was not returned by the API", id),
        }
    }
    ordered.extend(posts);
    ordered
}

/// Authenticated access to the metadata API shared by every source.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

impl ApiClient {
    pub fn new(client: Client, base_url: &str, credentials: Credentials) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// GET `path` relative to the API base and decode the JSON body into `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        debug!("GET {}", url);
        let resp = self
            .client
            .get(&url)
            .query(query)
            .header(
                AUTHORIZATION,
                format!("Bearer {}", self.credentials.bearer_token()),
            )
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::MalformedResponse(e.to_string()))
    }
}
