pub mod fetcher;
pub mod search;

pub use fetcher::{remove_media_file, MediaFetcher, YtDlpFetcher};
pub use search::{MediaSearcher, SearchHit, SearchPage, YtDlpSearcher};
