// auxbot-worker/src/media/search.rs

use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, error};

use auxbot_common::Error;

pub const DEFAULT_PAGE_SIZE: u32 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub url: String,
    pub uploader: String,
    pub duration_secs: i32,
    pub thumbnail: String,
    pub view_count: i64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchPage {
    pub results: Vec<SearchHit>,
    pub has_more: bool,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaSearcher: Send + Sync {
    async fn search(&self, query: &str, page: u32, limit: u32) -> Result<SearchPage, Error>;
}

/// One line of `yt-dlp --dump-json` output. Flat-playlist entries leave most
/// fields out, hence all the options.
#[derive(Debug, Deserialize)]
struct YtDlpEntry {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    uploader: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    view_count: Option<i64>,
}

impl From<YtDlpEntry> for SearchHit {
    fn from(e: YtDlpEntry) -> Self {
        SearchHit {
            url: e.webpage_url.or(e.url).unwrap_or_default(),
            id: e.id,
            title: e.title.unwrap_or_default(),
            uploader: e.uploader.unwrap_or_default(),
            duration_secs: e.duration.map(|d| d.round() as i32).unwrap_or(0),
            thumbnail: e.thumbnail.unwrap_or_default(),
            view_count: e.view_count.unwrap_or(0),
        }
    }
}

/// Parses newline-delimited JSON, skipping lines that don't parse.
pub fn parse_search_output(stdout: &str) -> Vec<SearchHit> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<YtDlpEntry>(line) {
            Ok(entry) => Some(entry.into()),
            Err(e) => {
                error!("Failed to parse yt-dlp output: {}", e);
                None
            }
        })
        .collect()
}

/// Slices `[page*limit, page*limit+limit)` out of `hits`.
pub fn paginate(hits: Vec<SearchHit>, page: u32, limit: u32) -> SearchPage {
    let offset = (page as usize) * (limit as usize);
    let end = offset + limit as usize;
    let has_more = hits.len() > end;
    let results = hits.into_iter().skip(offset).take(limit as usize).collect();
    SearchPage { results, has_more }
}

#[derive(Debug, Clone)]
pub struct YtDlpSearcher {
    program: String,
}

impl YtDlpSearcher {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }
}

#[async_trait]
impl MediaSearcher for YtDlpSearcher {
    async fn search(&self, query: &str, page: u32, limit: u32) -> Result<SearchPage, Error> {
        let limit = if limit == 0 { DEFAULT_PAGE_SIZE } else { limit };
        // Ask for one extra so `has_more` is accurate on the last page.
        let wanted = (page + 1) * limit + 1;
        let search_query = format!("ytsearch{}:{}", wanted, query);
        debug!("Searching with {}", search_query);

        let output = Command::new(&self.program)
            .args(["--flat-playlist", "--dump-json", "--quiet", "--no-warnings"])
            .arg(&search_query)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::Fetch(format!("Failed to spawn yt-dlp: {}", e)))?;

        if !output.status.success() {
            return Err(Error::Fetch(format!(
                "yt-dlp exited with code {}",
                output.status.code().unwrap_or(-1)
            )));
        }

        let hits = parse_search_output(&String::from_utf8_lossy(&output.stdout));
        Ok(paginate(hits, page, limit))
    }
}
