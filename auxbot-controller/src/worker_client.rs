//! Controller side of the Player and Search RPCs, addressed by tenant.
//!
//! Every call opens a channel to the tenant's network endpoint with a bounded
//! deadline. Failures are reported with the tenant's tags and then returned
//! unchanged; the caller decides what the user sees.

use std::sync::Arc;
use std::time::Duration;

use tonic::transport::{Channel, Endpoint};
use tracing::debug;

use auxbot_common::traits::{ErrorReporter, ErrorTags};
use auxbot_common::Error;
use auxbot_proto::auxbot::player::player_client::PlayerClient;
use auxbot_proto::auxbot::player::*;
use auxbot_proto::auxbot::search::search_client::SearchClient;
use auxbot_proto::auxbot::search::{SearchYoutubeRequest, SearchYoutubeResponse};

use crate::provisioner::{service_address, service_name};

/// Maps a tenant to the gRPC address of its worker.
pub type AddressResolver = Arc<dyn Fn(&str) -> String + Send + Sync>;

#[derive(Clone)]
pub struct WorkerClient {
    resolve: AddressResolver,
    deadline: Duration,
    reporter: Arc<dyn ErrorReporter>,
}

impl WorkerClient {
    /// Resolves tenants through cluster DNS.
    pub fn for_namespace(
        namespace: impl Into<String>,
        port: u16,
        deadline: Duration,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        let namespace = namespace.into();
        let resolve: AddressResolver =
            Arc::new(move |guild_id: &str| service_address(&service_name(guild_id), &namespace, port));
        Self::with_resolver(resolve, deadline, reporter)
    }

    pub fn with_resolver(resolve: AddressResolver, deadline: Duration, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            resolve,
            deadline,
            reporter,
        }
    }

    pub fn address(&self, guild_id: &str) -> String {
        (self.resolve)(guild_id)
    }

    async fn channel(&self, guild_id: &str) -> Result<Channel, Error> {
        let address = self.address(guild_id);
        debug!("Connecting to worker for guild {} at {}", guild_id, address);
        let channel = Endpoint::from_shared(address)?
            .connect_timeout(self.deadline)
            .timeout(self.deadline)
            .connect()
            .await?;
        Ok(channel)
    }

    async fn player(&self, guild_id: &str) -> Result<PlayerClient<Channel>, Error> {
        Ok(PlayerClient::new(self.channel(guild_id).await?))
    }

    fn reported<T>(&self, result: Result<T, Error>, tags: ErrorTags) -> Result<T, Error> {
        if let Err(e) = &result {
            self.reporter.report(e, &tags);
        }
        result
    }

    fn tags(operation: &'static str, guild_id: &str) -> ErrorTags {
        ErrorTags::new("worker-client", operation).tenant(guild_id.to_string())
    }

    pub async fn add_song(&self, guild_id: &str, url: &str, requester_id: &str) -> Result<AddSongResponse, Error> {
        let result: Result<_, Error> = async {
            let resp = self
                .player(guild_id)
                .await?
                .add_song(AddSongRequest {
                    url: url.to_string(),
                    requester_id: requester_id.to_string(),
                })
                .await?;
            Ok(resp.into_inner())
        }
        .await;
        self.reported(
            result,
            Self::tags("addSong", guild_id)
                .with("url", url)
                .with("requesterId", requester_id),
        )
    }

    pub async fn skip_song(&self, guild_id: &str) -> Result<SkipResponse, Error> {
        let result: Result<_, Error> = async {
            Ok(self
                .player(guild_id)
                .await?
                .skip_song(SkipRequest {})
                .await?
                .into_inner())
        }
        .await;
        self.reported(result, Self::tags("skipSong", guild_id))
    }

    pub async fn clear_queue(&self, guild_id: &str) -> Result<ClearQueueResponse, Error> {
        let result: Result<_, Error> = async {
            Ok(self
                .player(guild_id)
                .await?
                .clear_queue(ClearQueueRequest {})
                .await?
                .into_inner())
        }
        .await;
        self.reported(result, Self::tags("clearQueue", guild_id))
    }

    pub async fn get_queue_status(&self, guild_id: &str) -> Result<QueueStatusResponse, Error> {
        let result: Result<_, Error> = async {
            Ok(self
                .player(guild_id)
                .await?
                .get_queue_status(QueueStatusRequest {})
                .await?
                .into_inner())
        }
        .await;
        self.reported(result, Self::tags("getQueueStatus", guild_id))
    }

    pub async fn pause_playback(&self, guild_id: &str) -> Result<PauseResponse, Error> {
        let result: Result<_, Error> = async {
            Ok(self
                .player(guild_id)
                .await?
                .pause_playback(PauseRequest {})
                .await?
                .into_inner())
        }
        .await;
        self.reported(result, Self::tags("pausePlayback", guild_id))
    }

    pub async fn resume_playback(&self, guild_id: &str) -> Result<ResumeResponse, Error> {
        let result: Result<_, Error> = async {
            Ok(self
                .player(guild_id)
                .await?
                .resume_playback(ResumeRequest {})
                .await?
                .into_inner())
        }
        .await;
        self.reported(result, Self::tags("resumePlayback", guild_id))
    }

    pub async fn get_player_status(&self, guild_id: &str) -> Result<PlayerStatusResponse, Error> {
        let result: Result<_, Error> = async {
            Ok(self
                .player(guild_id)
                .await?
                .get_player_status(PlayerStatusRequest {})
                .await?
                .into_inner())
        }
        .await;
        self.reported(result, Self::tags("getPlayerStatus", guild_id))
    }

    pub async fn search_youtube(
        &self,
        guild_id: &str,
        query: &str,
        page: i32,
        limit: i32,
    ) -> Result<SearchYoutubeResponse, Error> {
        let result: Result<_, Error> = async {
            let mut client = SearchClient::new(self.channel(guild_id).await?);
            let resp = client
                .search_youtube(SearchYoutubeRequest {
                    query: query.to_string(),
                    page,
                    limit,
                })
                .await?;
            Ok(resp.into_inner())
        }
        .await;
        self.reported(result, Self::tags("searchYoutube", guild_id).with("query", query))
    }
}
