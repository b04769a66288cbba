pub mod canned;
pub mod client;
pub mod error;
pub mod fetcher;
pub mod inference;
pub mod metrics;
pub mod resources;

pub use canned::CannedEndpoint;
pub use client::{GithubApiError, GithubEndpoint, RemoteEndpoint, RemotePage};
pub use error::FetchError;
pub use fetcher::{
    CacheOrchestrator, CachingEndpoint, FetchOptions, FetchOrchestrator, PullRequestFetcher,
    PullRequestRef,
};
pub use inference::WriteAccessInferencer;
pub use resources::Resource;
