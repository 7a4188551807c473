use geolens::features::result_codec::share_url;
use geolens::upload::{
    CancelSignal, MemoryCredentialStore, ProgressReporter, SessionEvent, Transport,
    TransportError, TransportResponse, UploadRequest,
};
use geolens::{CandidateFile, ResultMetrics, Uploader};
use std::sync::Arc;
use std::time::Duration;

/// Pretends to stream the file to a server that found GPS tags in it.
struct SimulatedEndpoint;

impl Transport for SimulatedEndpoint {
    async fn send(
        &self,
        request: UploadRequest,
        progress: ProgressReporter,
        cancel: CancelSignal,
    ) -> Result<TransportResponse, TransportError> {
        let mut sent = 0;
        for chunk in request.contents.chunks(128 * 1024) {
            if cancel.is_cancelled() {
                return Err(TransportError::Interrupted("cancelled".to_string()));
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            sent += chunk.len() as u64;
            progress.report(sent);
        }
        let body = r#"{"type":"EXIF","lat":48.8584,"lng":2.2945,"accuracy":5,"source":"EXIF"}"#;
        Ok(TransportResponse::new(200, body))
    }
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let _ = tracing_subscriber::fmt::try_init();

    let uploader = Uploader::builder()
        .transport(Arc::new(SimulatedEndpoint))
        .credentials(Arc::new(MemoryCredentialStore::with_token("demo-token")))
        .build();

    let photo = CandidateFile::new("tower.jpg", "image/jpeg", vec![0u8; 2 * 1024 * 1024]);
    let mut session = uploader.start(photo)?;
    let mut events = session.events().expect("fresh session");

    while let Some(event) = events.next().await {
        match event {
            SessionEvent::Progress(p) => println!(
                "{:>3}% ({} / {} bytes)",
                p.percentage(),
                p.bytes_sent(),
                p.bytes_total()
            ),
            SessionEvent::Completed(result) => {
                println!("{}", serde_json::to_string_pretty(&ResultMetrics::of(&result))?);
                println!("Share: {}", share_url("http://localhost:3000", &result));
            }
            SessionEvent::Failed(failure) => println!("Upload failed: {failure}"),
        }
    }

    Ok(())
}
