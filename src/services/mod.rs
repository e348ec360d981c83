pub mod aggregator;
pub mod cache;
pub mod custom_data;
pub mod fetcher;
pub mod headers;
pub mod persistence;
pub mod transport;

pub use aggregator::{aggregate, snapshot_of};
pub use cache::PayloadCache;
pub use custom_data::{load_custom_protocols, merge_protocols};
pub use fetcher::{LlamaFetcher, MinInterval};
pub use headers::BrowserIdentity;
pub use persistence::OutputStore;
pub use transport::{ImpersonatedTransport, PlainTransport, Transport, TransportResponse};
