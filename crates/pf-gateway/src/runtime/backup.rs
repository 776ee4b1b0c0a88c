//! Backup Scheduler (spec §4.G): periodic sqlite snapshot uploaded to
//! an object sink. A no-op when no bucket is configured.

use std::time::Duration;

use pf_domain::config::BackupConfig;
use pf_domain::trace::TraceEvent;
use pf_store::SessionStore;

/// Spawns the periodic snapshot task and returns a handle the caller
/// can use to trigger one final snapshot on graceful shutdown.
pub struct BackupScheduler {
    store: SessionStore,
    bucket: Option<String>,
}

impl BackupScheduler {
    pub fn new(store: SessionStore, config: &BackupConfig) -> Self {
        if config.backup_bucket.is_none() {
            tracing::info!("backup scheduler: no bucket configured, running as a no-op");
        }
        Self {
            store,
            bucket: config.backup_bucket.clone(),
        }
    }

    /// Runs forever, snapshotting every `interval_minutes`. Intended to
    /// be spawned as a background task; exits only if the caller aborts it.
    pub async fn run(&self, interval_minutes: u64) {
        let Some(bucket) = self.bucket.as_ref() else {
            return;
        };
        let interval = Duration::from_secs(interval_minutes.max(1) * 60);
        loop {
            tokio::time::sleep(interval).await;
            self.snapshot_once(bucket).await;
        }
    }

    /// A final snapshot taken on graceful shutdown. No-op if unconfigured.
    pub async fn final_snapshot(&self) {
        if let Some(bucket) = self.bucket.as_ref() {
            self.snapshot_once(bucket).await;
        }
    }

    async fn snapshot_once(&self, bucket: &str) {
        let started = std::time::Instant::now();
        let dest = std::env::temp_dir().join(format!("phaseforge-backup-{}.sqlite3", uuid::Uuid::new_v4()));

        let bytes = match self.store.snapshot_to(&dest).await {
            Ok(bytes) => bytes,
            Err(e) => {
                TraceEvent::BackupFailure { reason: e.to_string() }.emit();
                return;
            }
        };

        let upload_result = self.upload(bucket, &dest).await;
        let _ = tokio::fs::remove_file(&dest).await;

        match upload_result {
            Ok(()) => {
                TraceEvent::BackupSnapshot {
                    bytes,
                    duration_ms: started.elapsed().as_millis() as u64,
                }
                .emit();
            }
            Err(reason) => {
                TraceEvent::BackupFailure { reason }.emit();
            }
        }
    }

    async fn upload(&self, bucket: &str, path: &std::path::Path) -> Result<(), String> {
        let data = tokio::fs::read(path).await.map_err(|e| e.to_string())?;
        let sdk_config = aws_config::load_from_env().await;
        let client = aws_sdk_s3::Client::new(&sdk_config);
        let key = format!("phaseforge/{}.sqlite3", chrono::Utc::now().format("%Y%m%dT%H%M%SZ"));

        client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(aws_sdk_s3::primitives::ByteStream::from(data))
            .send()
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}
