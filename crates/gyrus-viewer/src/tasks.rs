//! Background tasks bridged into the ECS
//!
//! Network work runs on a tokio runtime held as a resource. Tasks push
//! completions into shared queues that Update systems drain with `try_lock`,
//! so a slow backend never stalls a frame.

use bevy::prelude::*;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use gyrus_client::{
    resolve_result_url, CancelFlag, ConversionClient, Describer, JobStatus, ModelFetcher,
    PollOutcome,
};
use gyrus_core::AssetCache;
use tokio::runtime::Runtime;
use tracing::{error, info, warn};

use crate::config::Config;

/// Tokio runtime shared by all background tasks
#[derive(Resource)]
pub struct TokioRuntime(pub Runtime);

/// Progress events from the conversion pipeline
#[derive(Debug, Clone)]
pub enum ConversionEvent {
    Submitted { job_id: String },
    StatusChanged(JobStatus),
    Downloading,
    ModelReady(PathBuf),
    Failed(String),
}

/// Queue of conversion events plus the cancel handle for the active job
#[derive(Resource, Default)]
pub struct ConversionFlow {
    pub events: Arc<Mutex<Vec<ConversionEvent>>>,
    pub cancel: Option<CancelFlag>,
}

/// One description answer, tagged with the request generation so stale
/// replies can be dropped after the marker has moved on.
#[derive(Debug, Clone)]
pub struct DescribeResult {
    pub generation: u64,
    /// The answer text, or the readout message for a failed request
    pub outcome: Result<String, String>,
}

#[derive(Resource, Default)]
pub struct DescribeFlow {
    pub results: Arc<Mutex<Vec<DescribeResult>>>,
}

/// Kicks off submit -> poll -> download for one patient scan.
///
/// A conversion already in flight is cancelled first; only one job is
/// polled at a time.
pub fn start_conversion(
    runtime: &Runtime,
    flow: &mut ConversionFlow,
    config: &Config,
    patient_id: String,
) {
    if let Some(cancel) = flow.cancel.take() {
        cancel.cancel();
    }
    let cancel = CancelFlag::new();
    flow.cancel = Some(cancel.clone());

    let events = flow.events.clone();
    let backend_url = config.backend.base_url.clone();
    let cache_dir = PathBuf::from(&config.viewer.cache_dir);

    runtime.spawn(async move {
        if let Err(err) = run_conversion(&backend_url, cache_dir, &patient_id, &cancel, &events).await
        {
            error!("Conversion pipeline failed: {err:#}");
            push(&events, ConversionEvent::Failed(format!("Error: {err}")));
        }
    });
}

async fn run_conversion(
    backend_url: &str,
    cache_dir: PathBuf,
    patient_id: &str,
    cancel: &CancelFlag,
    events: &Arc<Mutex<Vec<ConversionEvent>>>,
) -> anyhow::Result<()> {
    let client = ConversionClient::new(backend_url)?;
    let job_id = client.submit(patient_id).await?;
    push(
        events,
        ConversionEvent::Submitted {
            job_id: job_id.clone(),
        },
    );

    let outcome = client
        .poll_until_terminal(&job_id, cancel, |snapshot| {
            push(events, ConversionEvent::StatusChanged(snapshot.status));
        })
        .await?;

    match outcome {
        PollOutcome::Done {
            result_path: Some(result_path),
        } => {
            push(events, ConversionEvent::Downloading);
            let url = resolve_result_url(backend_url, &result_path);
            let mut cache = AssetCache::new(cache_dir)?;
            let fetcher = ModelFetcher::new()?;
            let local_path = fetcher.fetch_to_cache(&mut cache, &url).await?;
            push(events, ConversionEvent::ModelReady(local_path));
        }
        PollOutcome::Done { result_path: None } | PollOutcome::Failed => {
            push(
                events,
                ConversionEvent::Failed("Conversion failed".to_string()),
            );
        }
        PollOutcome::Cancelled => {
            info!(job_id = %job_id, "Conversion superseded");
        }
    }

    Ok(())
}

/// Requests a description for a marked point. The reply lands in the
/// [`DescribeFlow`] queue tagged with `generation`.
pub fn start_describe(
    runtime: &Runtime,
    flow: &DescribeFlow,
    describer: Arc<Describer>,
    generation: u64,
    point: Vec3,
    region_hint: Option<String>,
) {
    let results = flow.results.clone();
    runtime.spawn(async move {
        let outcome = describer
            .describe(point.x, point.y, point.z, region_hint.as_deref())
            .await
            .map_err(|err| {
                warn!("Description request failed: {err}");
                err.user_text().to_string()
            });
        results.lock().unwrap().push(DescribeResult {
            generation,
            outcome,
        });
    });
}

fn push(events: &Arc<Mutex<Vec<ConversionEvent>>>, event: ConversionEvent) {
    events.lock().unwrap().push(event);
}
