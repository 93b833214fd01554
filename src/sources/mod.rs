//! Playlist sources: fetching raw text from URLs or local files

pub mod loader;

pub use loader::{DefaultFetcher, LoadedSource, SourceFetcher, SourceLoad, SourceLoader};
