//! Minimal gateway session used only to get into a voice channel.
//!
//! The worker never reads chat. It identifies, asks Discord to move it into
//! the target channel, collects the session id and voice server details,
//! then keeps the shard alive in the background so the voice session stays
//! valid.

use std::num::NonZeroU64;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use twilight_gateway::{CloseFrame, Event, EventTypeFlags, Intents, MessageSender, Shard, ShardId, StreamExt};
use twilight_model::gateway::payload::outgoing::UpdateVoiceState;
use twilight_model::id::marker::{ChannelMarker, GuildMarker};
use twilight_model::id::Id;

use auxbot_common::Error;

/// Everything the voice driver needs to open its own connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceCredentials {
    pub guild_id: NonZeroU64,
    pub channel_id: NonZeroU64,
    pub user_id: NonZeroU64,
    pub session_id: String,
    pub endpoint: String,
    pub token: String,
}

/// Accumulates the three gateway events that make up a voice handshake.
/// They can arrive in any order.
#[derive(Debug, Default)]
pub struct Handshake {
    guild_id: Option<NonZeroU64>,
    channel_id: Option<NonZeroU64>,
    user_id: Option<NonZeroU64>,
    session_id: Option<String>,
    endpoint: Option<String>,
    token: Option<String>,
}

impl Handshake {
    pub fn new(guild_id: NonZeroU64, channel_id: NonZeroU64) -> Self {
        Self {
            guild_id: Some(guild_id),
            channel_id: Some(channel_id),
            ..Default::default()
        }
    }

    pub fn on_ready(&mut self, user_id: NonZeroU64) {
        self.user_id = Some(user_id);
    }

    /// Voice state updates for other members or other guilds are ignored.
    pub fn on_voice_state(&mut self, guild_id: Option<NonZeroU64>, user_id: NonZeroU64, session_id: &str) {
        if guild_id != self.guild_id || Some(user_id) != self.user_id {
            return;
        }
        self.session_id = Some(session_id.to_string());
    }

    /// A missing endpoint means the voice server is being reallocated; wait
    /// for the next update.
    pub fn on_voice_server(&mut self, guild_id: NonZeroU64, endpoint: Option<&str>, token: &str) {
        if Some(guild_id) != self.guild_id {
            return;
        }
        let Some(endpoint) = endpoint else {
            debug!("Voice server update without endpoint, waiting for another");
            return;
        };
        self.endpoint = Some(endpoint.to_string());
        self.token = Some(token.to_string());
    }

    pub fn complete(&self) -> Option<VoiceCredentials> {
        Some(VoiceCredentials {
            guild_id: self.guild_id?,
            channel_id: self.channel_id?,
            user_id: self.user_id?,
            session_id: self.session_id.clone()?,
            endpoint: self.endpoint.clone()?,
            token: self.token.clone()?,
        })
    }
}

/// Keeps the gateway shard running after the handshake.
pub struct GatewayHandle {
    sender: MessageSender,
    guild_id: Id<GuildMarker>,
    task: JoinHandle<()>,
}

impl GatewayHandle {
    /// Leave the voice channel and close the shard.
    pub async fn leave(self) -> Result<(), Error> {
        let leave = UpdateVoiceState::new(self.guild_id, None::<Id<ChannelMarker>>, false, false);
        if let Err(e) = self.sender.command(&leave) {
            warn!("Failed to send voice leave command: {e}");
        }
        if let Err(e) = self.sender.close(CloseFrame::NORMAL) {
            warn!("Failed to close gateway shard: {e}");
        }
        match tokio::time::timeout(Duration::from_secs(5), self.task).await {
            Ok(_) => Ok(()),
            Err(e) => Err(Error::Voice(format!("gateway shard did not close: {e}"))),
        }
    }
}

fn parse_id(raw: &str, what: &str) -> Result<NonZeroU64, Error> {
    raw.parse::<u64>()
        .ok()
        .and_then(NonZeroU64::new)
        .ok_or_else(|| Error::Config(format!("Invalid {what}: {raw}")))
}

/// Identify, join `channel_id` and wait until the voice handshake completes.
pub async fn join_voice_channel(
    token: &str,
    guild_id: &str,
    channel_id: &str,
    connect_timeout: Duration,
) -> Result<(VoiceCredentials, GatewayHandle), Error> {
    let guild = parse_id(guild_id, "guild id")?;
    let channel = parse_id(channel_id, "channel id")?;
    let guild_marker = Id::<GuildMarker>::from(guild);
    let channel_marker = Id::<ChannelMarker>::from(channel);

    let mut shard = Shard::new(
        ShardId::ONE,
        token.to_string(),
        Intents::GUILDS | Intents::GUILD_VOICE_STATES,
    );
    let sender = shard.sender();
    let wanted = EventTypeFlags::READY | EventTypeFlags::VOICE_STATE_UPDATE | EventTypeFlags::VOICE_SERVER_UPDATE;

    let mut handshake = Handshake::new(guild, channel);
    let handshake_fut = async {
        while let Some(item) = shard.next_event(wanted).await {
            match item {
                Ok(Event::Ready(ready)) => {
                    info!("Gateway READY as {} (ID={})", ready.user.name, ready.user.id);
                    handshake.on_ready(ready.user.id.into_nonzero());
                    let join = UpdateVoiceState::new(guild_marker, Some(channel_marker), true, false);
                    sender
                        .command(&join)
                        .map_err(|e| Error::Voice(format!("Failed to request voice join: {e}")))?;
                }
                Ok(Event::VoiceStateUpdate(update)) => {
                    handshake.on_voice_state(
                        update.0.guild_id.map(Id::into_nonzero),
                        update.0.user_id.into_nonzero(),
                        &update.0.session_id,
                    );
                }
                Ok(Event::VoiceServerUpdate(update)) => {
                    handshake.on_voice_server(update.guild_id.into_nonzero(), update.endpoint.as_deref(), &update.token);
                }
                Ok(other) => trace!("Ignoring gateway event {:?}", other.kind()),
                Err(e) => error!("Gateway receive error: {e:?}"),
            }
            if let Some(credentials) = handshake.complete() {
                return Ok(credentials);
            }
        }
        Err(Error::Voice("Gateway closed before voice handshake completed".into()))
    };

    let credentials = tokio::time::timeout(connect_timeout, handshake_fut)
        .await
        .map_err(|_| Error::Voice(format!("Voice handshake timed out after {:?}", connect_timeout)))??;
    info!("Voice handshake complete for guild {}", credentials.guild_id);

    let task = tokio::spawn(async move {
        while let Some(item) = shard.next_event(EventTypeFlags::empty()).await {
            if let Err(e) = item {
                warn!("Gateway receive error: {e:?}");
            }
        }
        debug!("Gateway shard loop ended");
    });

    Ok((
        credentials,
        GatewayHandle {
            sender,
            guild_id: guild_marker,
            task,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> NonZeroU64 {
        NonZeroU64::new(n).unwrap()
    }

    #[test]
    fn completes_in_any_order() {
        let mut h = Handshake::new(id(1), id(2));
        h.on_voice_server(id(1), Some("voice.example:443"), "vtok");
        assert!(h.complete().is_none());
        h.on_ready(id(99));
        h.on_voice_state(Some(id(1)), id(99), "sess");

        let creds = h.complete().unwrap();
        assert_eq!(creds.user_id, id(99));
        assert_eq!(creds.session_id, "sess");
        assert_eq!(creds.endpoint, "voice.example:443");
        assert_eq!(creds.token, "vtok");
        assert_eq!(creds.channel_id, id(2));
    }

    #[test]
    fn ignores_other_users_and_guilds() {
        let mut h = Handshake::new(id(1), id(2));
        h.on_ready(id(99));
        h.on_voice_state(Some(id(1)), id(50), "someone-else");
        h.on_voice_state(Some(id(7)), id(99), "other-guild");
        h.on_voice_server(id(7), Some("elsewhere"), "t");
        h.on_voice_server(id(1), None, "t");
        assert!(h.complete().is_none());
    }

    #[test]
    fn voice_state_before_ready_is_dropped() {
        let mut h = Handshake::new(id(1), id(2));
        h.on_voice_state(Some(id(1)), id(99), "early");
        h.on_ready(id(99));
        h.on_voice_server(id(1), Some("e"), "t");
        assert!(h.complete().is_none());
    }

    #[test]
    fn rejects_bad_ids() {
        assert!(matches!(parse_id("0", "guild id"), Err(Error::Config(_))));
        assert!(matches!(parse_id("abc", "guild id"), Err(Error::Config(_))));
        assert_eq!(parse_id("42", "guild id").unwrap(), id(42));
    }
}
