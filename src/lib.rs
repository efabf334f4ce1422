//! vistream - stream resolution and playback session core for
//! multi-instance video clients
//!
//! Streams are aggregated from several Invidious/Piped instances, filtered
//! through quality profiles and attached to a host-provided [`player::Renderer`].
//! A playback queue hydrates metadata lazily, and known segments are skipped
//! as playback reaches them.

pub mod backend;
pub mod cache;
pub mod media;
pub mod player;
pub mod queue;
pub mod segments;
pub mod stream;
pub mod utils;

pub use media::Video;
pub use player::{PlayerEvent, PlayerModel, PlayerModelBuilder};
pub use stream::{QualityProfile, Stream};
pub use utils::{Config, Result, VistreamError};
