use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::{Client, Response, Url};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;
use tracing_indicatif::style::ProgressStyle;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::source::{self, MetadataSource};
use crate::twitter_post::{DownloadTask, PostMetadata};

/// How many media items ended up in each state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    Downloaded(u64),
    AlreadyExists,
}

pub struct Downloader {
    client: Client,
    output_dir: PathBuf,
    overwrite: bool,
}

impl Downloader {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            output_dir: config.output_dir.clone(),
            overwrite: config.overwrite,
        }
    }

    /// Save `task` under the output directory unless it is already there.
    pub async fn save(&self, task: &DownloadTask) -> Result<SaveOutcome> {
        let path = self.output_dir.join(task.file_name());

        // Check if output location exists
        if !self.overwrite && path.exists() {
            info!("{} already exists, skipping", path.display());
            return Ok(SaveOutcome::AlreadyExists);
        }

        let len = self.download(&task.url, &path).await?;
        info!("Downloaded {} ({} bytes)", path.display(), len);
        Ok(SaveOutcome::Downloaded(len))
    }

    /// Stream `url` into `path`. Nothing is written when the server answers
    /// with an error status, and `path` only appears once the whole body has
    /// been written.
    pub async fn download(&self, url: &Url, path: impl AsRef<Path>) -> Result<u64> {
        debug!("GET {}", url);
        let resp = self.client.get(url.clone()).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::DownloadFailure {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let path = path.as_ref();
        let part = partial_path(path);
        match write_body(resp, &part).await {
            Ok(written) => {
                fs::rename(&part, path).await?;
                Ok(written)
            }
            Err(e) => {
                if let Err(rm) = fs::remove_file(&part).await {
                    debug!("Could not remove {}: {}", part.display(), rm);
                }
                Err(e)
            }
        }
    }
}

/// `<name>.part` next to `path`.
fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

async fn write_body(resp: Response, path: &Path) -> Result<u64> {
    let mut file = fs::File::create(path).await?;
    let mut stream = resp.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

/// Resolve `references` through `source` and download every media item of
/// every tweet into the configured output directory.
pub async fn run<S: AsRef<str>>(
    config: &Config,
    source: &dyn MetadataSource,
    client: &Client,
    references: &[S],
) -> Result<RunSummary> {
    let posts = source::resolve(source, references).await?;
    fs::create_dir_all(&config.output_dir).await?;

    let total: usize = posts.iter().map(|p| p.media.len()).sum();
    info!("Found {} media item(s) in {} tweet(s)", total, posts.len());

    let span = info_span!("download");
    if let Ok(style) = ProgressStyle::with_template("{wide_bar} {pos}/{len}") {
        span.pb_set_style(&style);
    }
    span.pb_set_length(total as u64);

    let downloader = Downloader::new(client.clone(), config);
    let summary = download_posts(&downloader, &posts).instrument(span).await?;

    info!(
        "Finished: {} downloaded, {} skipped, {} failed",
        summary.downloaded, summary.skipped, summary.failed
    );
    Ok(summary)
}

async fn download_posts(downloader: &Downloader, posts: &[PostMetadata]) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    for post in posts {
        if post.media.is_empty() {
            info!("Tweet {} has no media", post.id);
            continue;
        }

        for (item, (index, task)) in post.media.iter().zip(post.tasks()) {
            let outcome = match task {
                Ok(task) => downloader.save(&task).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(SaveOutcome::Downloaded(_)) => summary.downloaded += 1,
                Ok(SaveOutcome::AlreadyExists) => summary.skipped += 1,
                Err(
                    e @ (Error::UnknownMediaType(_)
                    | Error::EmptyVariantList
                    | Error::InvalidMediaUrl(_)),
                ) => {
                    warn!(
                        "Skipping {} {} of tweet {}: {}",
                        item.kind(),
                        index,
                        post.id,
                        e
                    );
                    summary.skipped += 1;
                }
                Err(e @ (Error::DownloadFailure { .. } | Error::Io(_) | Error::Http(_))) => {
                    error!("Media {} of tweet {} failed: {}", index, post.id, e);
                    summary.failed += 1;
                }
                Err(e) => return Err(e),
            }
            Span::current().pb_inc(1);
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiVersion;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves a response that promises 1000 bytes but hangs up after 7.
    async fn truncating_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = sock.read(&mut buf).await;
                let _ = sock
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\r\nPARTIAL")
                    .await;
                let _ = sock.shutdown().await;
            }
        });
        format!("http://{}/media/x.jpg", addr)
    }

    fn downloader_in(dir: &Path) -> Downloader {
        let config = Config {
            api_version: ApiVersion::V2,
            api_base: String::new(),
            output_dir: dir.to_path_buf(),
            overwrite: false,
        };
        Downloader::new(Client::new(), &config)
    }

    #[tokio::test]
    async fn truncated_body_leaves_no_file_behind() {
        let url = truncating_server().await;
        let dir = tempfile::tempdir().unwrap();
        let downloader = downloader_in(dir.path());
        let task = DownloadTask {
            file_stem: "alice-2023-07-01_12-00-00_1".into(),
            url: Url::parse(&url).unwrap(),
            extension: "jpg".into(),
        };

        assert!(downloader.save(&task).await.is_err());
        let path = dir.path().join(task.file_name());
        assert!(!path.exists());
        assert!(!partial_path(&path).exists());

        // A later run must try again instead of keeping a truncated file.
        let second = downloader.save(&task).await;
        assert!(!matches!(second, Ok(SaveOutcome::AlreadyExists)));
        assert!(!path.exists());
    }

    #[test]
    fn partial_path_is_a_sibling() {
        let path = Path::new("out/alice-2023-07-01_12-00-00_1.mp4");
        assert_eq!(
            partial_path(path),
            Path::new("out/alice-2023-07-01_12-00-00_1.mp4.part")
        );
    }
}
