mod fetcher;
mod video_id;

pub use fetcher::{FeedFetcher, PostSource, SortMode};
