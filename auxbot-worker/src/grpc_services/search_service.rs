use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::{debug, error};

use auxbot_proto::auxbot::search::search_server::Search;
use auxbot_proto::auxbot::search::{SearchResult, SearchYoutubeRequest, SearchYoutubeResponse};

use crate::media::{MediaSearcher, SearchHit};

pub struct SearchServiceImpl {
    searcher: Arc<dyn MediaSearcher>,
}

impl SearchServiceImpl {
    pub fn new(searcher: Arc<dyn MediaSearcher>) -> Self {
        Self { searcher }
    }
}

impl From<SearchHit> for SearchResult {
    fn from(hit: SearchHit) -> Self {
        SearchResult {
            id: hit.id,
            title: hit.title,
            url: hit.url,
            uploader: hit.uploader,
            duration: hit.duration_secs,
            thumbnail: hit.thumbnail,
            view_count: hit.view_count,
        }
    }
}

#[tonic::async_trait]
impl Search for SearchServiceImpl {
    async fn search_youtube(
        &self,
        request: Request<SearchYoutubeRequest>,
    ) -> Result<Response<SearchYoutubeResponse>, Status> {
        let req = request.into_inner();
        if req.query.trim().is_empty() {
            return Err(Status::invalid_argument("Query cannot be empty"));
        }
        let page = u32::try_from(req.page).unwrap_or(0);
        let limit = u32::try_from(req.limit).unwrap_or(0);
        debug!("SearchYoutube query={} page={} limit={}", req.query, page, limit);

        let found = self.searcher.search(&req.query, page, limit).await.map_err(|e| {
            error!("Error searching YouTube: {}", e);
            Status::internal(format!("Failed to search YouTube: {}", e))
        })?;

        Ok(Response::new(SearchYoutubeResponse {
            results: found.results.into_iter().map(Into::into).collect(),
            has_more: found.has_more,
        }))
    }
}
