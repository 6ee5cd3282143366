//! Gyrus Client - HTTP boundary to the remote services
//!
//! Talks to two backends: the scan conversion service that turns patient
//! volumes into GLB models, and the description service that names the
//! anatomical region around a marked point. Also fetches finished models
//! into the local asset cache.

pub mod asset;
pub mod convert;
pub mod describe;

pub use asset::{resolve_result_url, AssetLoadError, ModelFetcher};
pub use convert::{
    CancelFlag, ConversionClient, JobStatus, JobStatusResponse, PollOutcome, RemoteRequestError,
    POLL_INTERVAL,
};
pub use describe::{build_prompt, AnalysisError, Describer, DEFAULT_DESCRIBE_ENDPOINT};
