mod fetch;
mod pipeline;
mod reverse_domain;
mod store;

pub use fetch::{FetchedObject, Fetcher, HttpFetcher};
pub use pipeline::MediaPipeline;
pub use reverse_domain::{relocate_objects, reverse_domain_key};
pub use store::{FsMediaStore, MediaStore, storage_key};
