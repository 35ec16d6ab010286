//! Download the photos, videos and GIFs attached to tweets.

pub mod config;
pub mod download;
pub mod error;
pub mod post_ref;
pub mod source;
pub mod twitter_post;

pub use config::{ApiVersion, Config, CredentialStore, Credentials};
pub use download::{run, Downloader, RunSummary};
pub use error::{Error, Result};
pub use source::{resolve, MetadataSource};
pub use twitter_post::{filename, select, MediaItem, PostMetadata, Variant};
