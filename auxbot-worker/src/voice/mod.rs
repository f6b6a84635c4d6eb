pub mod gateway;
pub mod songbird;

pub use gateway::{join_voice_channel, GatewayHandle, Handshake, VoiceCredentials};
pub use self::songbird::SongbirdVoice;
