pub mod db;
pub mod player;
#[cfg(feature = "cpal-playback")]
pub mod speaker;
pub mod surface;
pub mod tts;

pub use db::DbAdapter;
pub use player::CommandPlayer;
#[cfg(feature = "cpal-playback")]
pub use speaker::CpalPlayer;
pub use surface::TerminalSurface;
pub use tts::{MutedSpeechAdapter, OpenAiTtsAdapter};
