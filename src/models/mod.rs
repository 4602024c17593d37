mod playlist;
mod video;

pub use playlist::{playlist_url, Playlist};
pub use video::{CandidateVideo, PlaylistVideo};
