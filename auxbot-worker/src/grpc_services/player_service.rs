use tonic::{Request, Response, Status};
use tracing::{debug, info};

use auxbot_proto::auxbot::player::player_server::Player;
use auxbot_proto::auxbot::player::*;

use crate::playback::PlaybackEngine;

pub struct PlayerServiceImpl {
    engine: PlaybackEngine,
}

impl PlayerServiceImpl {
    pub fn new(engine: PlaybackEngine) -> Self {
        Self { engine }
    }
}

#[tonic::async_trait]
impl Player for PlayerServiceImpl {
    async fn add_song(&self, request: Request<AddSongRequest>) -> Result<Response<AddSongResponse>, Status> {
        let req = request.into_inner();
        info!("AddSong url={} requester={}", req.url, req.requester_id);

        let outcome = self.engine.add_song(&req.url, &req.requester_id);
        Ok(Response::new(AddSongResponse {
            success: true,
            message: "Song added to queue".to_string(),
            is_playing: outcome.started,
            position: i32::try_from(outcome.position).unwrap_or(i32::MAX),
        }))
    }

    async fn skip_song(&self, _request: Request<SkipRequest>) -> Result<Response<SkipResponse>, Status> {
        let outcome = self.engine.skip();
        Ok(Response::new(SkipResponse {
            success: outcome.success,
            message: outcome.message,
        }))
    }

    async fn clear_queue(&self, _request: Request<ClearQueueRequest>) -> Result<Response<ClearQueueResponse>, Status> {
        self.engine.clear_queue();
        Ok(Response::new(ClearQueueResponse {
            success: true,
            message: "Queue cleared successfully".to_string(),
        }))
    }

    async fn get_queue_status(&self, _request: Request<QueueStatusRequest>) -> Result<Response<QueueStatusResponse>, Status> {
        let snap = self.engine.snapshot();
        debug!("GetQueueStatus status={} queued={}", snap.status, snap.queue.len());

        let (now_playing_url, now_playing_requester) = snap
            .current
            .clone()
            .map(|item| (item.media_ref, item.requester_id))
            .unwrap_or_default();

        Ok(Response::new(QueueStatusResponse {
            is_playing: snap.is_playing(),
            items: snap.queue.into_iter().map(Into::into).collect(),
            now_playing_url,
            now_playing_requester,
        }))
    }

    async fn pause_playback(&self, _request: Request<PauseRequest>) -> Result<Response<PauseResponse>, Status> {
        let success = self.engine.pause();
        Ok(Response::new(PauseResponse {
            success,
            message: if success {
                "Playback paused".to_string()
            } else {
                "Cannot pause: No active playback".to_string()
            },
        }))
    }

    async fn resume_playback(&self, _request: Request<ResumeRequest>) -> Result<Response<ResumeResponse>, Status> {
        let success = self.engine.resume();
        Ok(Response::new(ResumeResponse {
            success,
            message: if success {
                "Playback resumed".to_string()
            } else {
                "Cannot resume: Player is not paused".to_string()
            },
        }))
    }

    async fn get_player_status(&self, _request: Request<PlayerStatusRequest>) -> Result<Response<PlayerStatusResponse>, Status> {
        let snap = self.engine.snapshot();
        let (current_url, requester_id) = snap
            .current
            .map(|item| (item.media_ref, item.requester_id))
            .unwrap_or_default();

        Ok(Response::new(PlayerStatusResponse {
            status: PlayerStatus::from(snap.status) as i32,
            current_url,
            requester_id,
            has_queue: !snap.queue.is_empty(),
            queue_length: i32::try_from(snap.queue.len()).unwrap_or(i32::MAX),
        }))
    }
}
