mod aggregate;
mod feed;
mod output;
mod protocol;
mod snapshot;
mod state;

pub use aggregate::{
    AggregatedProtocol, AggregationResult, CategoryBreakdown, ChainBreakdown, ChangeMetrics,
    RankedProtocol,
};
pub use feed::OracleFeed;
pub use output::{ChartPoint, FullOutput, ProtocolTvlEntry, ProtocolTvlOutput, SummaryOutput};
pub use protocol::{ProtocolDetail, RawProtocol, TvlPoint};
pub use snapshot::{Snapshot, SnapshotHistory};
pub use state::PersistentState;
