use reqwest::Url;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

use crate::error::{Error, Result};

const FILENAME_TIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
const VIDEO_EXTENSION: &str = "mp4";
const DEFAULT_PHOTO_EXTENSION: &str = "jpg";

/// Everything needed to download the media of one tweet.
#[derive(Clone, Debug, PartialEq)]
pub struct PostMetadata {
    pub id: String,
    pub author: String,
    pub created_at: OffsetDateTime,
    pub media: Vec<MediaItem>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MediaItem {
    Photo { url: String },
    Video { variants: Vec<Variant> },
    AnimatedGif { variants: Vec<Variant> },
    Unknown { kind: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Variant {
    pub url: String,
    pub bitrate: Option<u64>,
}

/// The chosen representation of a media item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub url: Url,
    pub extension: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadTask {
    pub file_stem: String,
    pub url: Url,
    pub extension: String,
}

impl DownloadTask {
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.file_stem, self.extension)
    }
}

impl MediaItem {
    pub fn kind(&self) -> &str {
        match self {
            Self::Photo { .. } => "photo",
            Self::Video { .. } => "video",
            Self::AnimatedGif { .. } => "animated_gif",
            Self::Unknown { kind } => kind,
        }
    }

    /// Build a media item from an API type tag. Kinds without variants get an
    /// empty list, which `select` later reports.
    pub(crate) fn from_parts(kind: &str, url: Option<String>, variants: Vec<Variant>) -> Result<Self> {
        Ok(match kind {
            "photo" => Self::Photo {
                url: url.ok_or_else(|| {
                    Error::MalformedResponse("photo media item has no url".into())
                })?,
            },
            "video" => Self::Video { variants },
            "animated_gif" => Self::AnimatedGif { variants },
            other => Self::Unknown {
                kind: other.to_string(),
            },
        })
    }
}

/// Pick the best representation of `item`.
pub fn select(item: &MediaItem) -> Result<Selection> {
    match item {
        MediaItem::Photo { url } => select_photo(url),
        MediaItem::Video { variants } | MediaItem::AnimatedGif { variants } => {
            let best = highest_bitrate(variants).ok_or(Error::EmptyVariantList)?;
            let url = Url::parse(&best.url).map_err(|_| Error::InvalidMediaUrl(best.url.clone()))?;
            Ok(Selection {
                url,
                extension: VIDEO_EXTENSION.to_string(),
            })
        }
        MediaItem::Unknown { kind } => Err(Error::UnknownMediaType(kind.clone())),
    }
}

fn select_photo(url: &str) -> Result<Selection> {
    let last_segment_start = url.rfind('/').map_or(0, |i| i + 1);
    let (bare, extension) = match url[last_segment_start..].rfind('.') {
        Some(dot) => {
            let dot = last_segment_start + dot;
            (&url[..dot], &url[dot + 1..])
        }
        None => (url, DEFAULT_PHOTO_EXTENSION),
    };

    let url = Url::parse_with_params(bare, &[("format", extension), ("name", "orig")])
        .map_err(|_| Error::InvalidMediaUrl(url.to_string()))?;
    Ok(Selection {
        url,
        extension: extension.to_string(),
    })
}

/// First variant with the maximum bitrate, missing bitrates counting as zero.
fn highest_bitrate(variants: &[Variant]) -> Option<&Variant> {
    variants.iter().reduce(|best, v| {
        if v.bitrate.unwrap_or(0) > best.bitrate.unwrap_or(0) {
            v
        } else {
            best
        }
    })
}

/// `{author}-{YYYY-MM-DD_HH-MM-SS}_{index}`, without extension.
pub fn filename(author: &str, created_at: OffsetDateTime, index: usize) -> Result<String> {
    let date = created_at.format(FILENAME_TIME_FORMAT)?;
    Ok(format!("{}-{}_{}", author, date, index))
}

impl PostMetadata {
    /// One download task per media item, in order. Items that cannot be
    /// downloaded keep their index so names stay stable across runs.
    pub fn tasks(&self) -> Vec<(usize, Result<DownloadTask>)> {
        self.media
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let index = i + 1;
                let task = select(item).and_then(|s| {
                    Ok(DownloadTask {
                        file_stem: filename(&self.author, self.created_at, index)?,
                        url: s.url,
                        extension: s.extension,
                    })
                });
                (index, task)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn variants(bitrates: &[Option<u64>]) -> Vec<Variant> {
        bitrates
            .iter()
            .enumerate()
            .map(|(i, b)| Variant {
                url: format!("https://video.twimg.com/v/{i}.mp4"),
                bitrate: *b,
            })
            .collect()
    }

    #[test]
    fn video_picks_highest_bitrate() {
        let item = MediaItem::Video {
            variants: variants(&[Some(100), Some(500), Some(300)]),
        };
        let s = select(&item).unwrap();
        assert_eq!(s.url.as_str(), "https://video.twimg.com/v/1.mp4");
        assert_eq!(s.extension, "mp4");
    }

    #[test]
    fn ties_go_to_first_variant() {
        let item = MediaItem::Video {
            variants: variants(&[Some(500), Some(500)]),
        };
        assert_eq!(
            select(&item).unwrap().url.as_str(),
            "https://video.twimg.com/v/0.mp4"
        );
    }

    #[test]
    fn missing_bitrate_counts_as_zero() {
        let item = MediaItem::AnimatedGif {
            variants: variants(&[None, Some(0), None]),
        };
        assert_eq!(
            select(&item).unwrap().url.as_str(),
            "https://video.twimg.com/v/0.mp4"
        );

        let item = MediaItem::Video {
            variants: variants(&[None, Some(1)]),
        };
        assert_eq!(
            select(&item).unwrap().url.as_str(),
            "https://video.twimg.com/v/1.mp4"
        );
    }

    #[test]
    fn empty_variants_are_an_error() {
        let item = MediaItem::Video { variants: vec![] };
        assert!(matches!(select(&item), Err(Error::EmptyVariantList)));
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let item = MediaItem::Unknown {
            kind: "hologram".into(),
        };
        assert!(matches!(select(&item), Err(Error::UnknownMediaType(k)) if k == "hologram"));
    }

    #[test]
    fn photo_requests_original_quality() {
        let item = MediaItem::Photo {
            url: "https://pbs.twimg.com/media/FzAbC.png".into(),
        };
        let s = select(&item).unwrap();
        assert_eq!(
            s.url.as_str(),
            "https://pbs.twimg.com/media/FzAbC?format=png&name=orig"
        );
        assert_eq!(s.extension, "png");
    }

    #[test]
    fn photo_without_extension_defaults_to_jpg() {
        let item = MediaItem::Photo {
            url: "https://pbs.twimg.com/media/FzAbC".into(),
        };
        let s = select(&item).unwrap();
        assert_eq!(
            s.url.as_str(),
            "https://pbs.twimg.com/media/FzAbC?format=jpg&name=orig"
        );
        assert_eq!(s.extension, "jpg");
    }

    #[test]
    fn filename_format() {
        let name = filename("alice", datetime!(2023-07-01 12:00:00 UTC), 2).unwrap();
        assert_eq!(name, "alice-2023-07-01_12-00-00_2");
    }

    #[test]
    fn tasks_keep_item_positions() {
        let post = PostMetadata {
            id: "1".into(),
            author: "bob".into(),
            created_at: datetime!(2021-01-02 03:04:05 UTC),
            media: vec![
                MediaItem::Unknown { kind: "poll".into() },
                MediaItem::Photo {
                    url: "https://pbs.twimg.com/media/x.jpg".into(),
                },
            ],
        };
        let tasks = post.tasks();
        assert_eq!(tasks.len(), 2);
        assert!(tasks[0].1.is_err());
        let (index, task) = &tasks[1];
        assert_eq!(*index, 2);
        assert_eq!(
            task.as_ref().unwrap().file_name(),
            "bob-2021-01-02_03-04-05_2.jpg"
        );
    }
}
