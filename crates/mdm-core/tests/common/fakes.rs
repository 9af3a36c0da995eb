//! In-process stand-ins for the transfer engine and the catalog.
//!
//! `RecordingEngine` never transfers anything: it records every command so
//! tests can assert on dispatch order, then tests feed events back by hand.
//! `StaticCatalog` serves descriptors from a map keyed by mod id.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use mdm_core::catalog::{CatalogRef, MetadataProvider, ModDescriptor, ModFile};
use mdm_core::config::MdmConfig;
use mdm_core::engine::{ExtractRequest, TransferEngine, TransferRequest};
use mdm_core::job::JobKey;
use mdm_core::orchestrator::Orchestrator;
use mdm_core::recovery_db::RecoveryDb;

#[derive(Default)]
pub struct RecordingEngine {
    pub started: Mutex<Vec<TransferRequest>>,
    pub cancelled: Mutex<Vec<JobKey>>,
    pub extracts: Mutex<Vec<ExtractRequest>>,
    pub refuse: AtomicBool,
}

impl RecordingEngine {
    /// Keys of notifying (non-preview) transfers, in dispatch order.
    pub fn started_keys(&self) -> Vec<JobKey> {
        self.started
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.notify)
            .map(|r| r.key.clone())
            .collect()
    }

    pub fn requests(&self) -> Vec<TransferRequest> {
        self.started.lock().unwrap().clone()
    }

    pub fn extract_requests(&self) -> Vec<ExtractRequest> {
        self.extracts.lock().unwrap().clone()
    }

    pub fn cancelled_keys(&self) -> Vec<JobKey> {
        self.cancelled.lock().unwrap().clone()
    }
}

impl TransferEngine for RecordingEngine {
    fn start_transfer(&self, request: TransferRequest) -> Result<()> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(anyhow!("engine offline"));
        }
        self.started.lock().unwrap().push(request);
        Ok(())
    }

    fn extract_archive(&self, request: ExtractRequest) -> Result<()> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(anyhow!("engine offline"));
        }
        self.extracts.lock().unwrap().push(request);
        Ok(())
    }

    fn cancel_transfer(&self, key: &JobKey) {
        self.cancelled.lock().unwrap().push(key.clone());
    }
}

#[derive(Default)]
pub struct StaticCatalog {
    mods: HashMap<String, ModDescriptor>,
}

impl StaticCatalog {
    pub fn with(mut self, mod_id: &str, descriptor: ModDescriptor) -> Self {
        self.mods.insert(mod_id.to_string(), descriptor);
        self
    }
}

#[async_trait]
impl MetadataProvider for StaticCatalog {
    async fn fetch_mod(&self, reference: &CatalogRef) -> Result<ModDescriptor> {
        self.mods
            .get(&reference.mod_id)
            .cloned()
            .ok_or_else(|| anyhow!("mod {} not found", reference.mod_id))
    }
}

/// Descriptor with one file `<file_id>` named `<file_id>.zip`.
pub fn descriptor(name: &str, category: &str, file_id: &str) -> ModDescriptor {
    ModDescriptor {
        name: name.to_string(),
        profile_url: format!("https://gamebanana.com/mods/{file_id}"),
        category: Some(category.to_string()),
        super_category: None,
        files: vec![ModFile {
            id: file_id.to_string(),
            download_url: format!("https://files.gamebanana.com/mods/{file_id}.zip"),
            file_name: format!("{file_id}.zip"),
        }],
        preview_images: vec![format!("https://images.gamebanana.com/{file_id}.png")],
    }
}

/// Catalog URL for the GI title (game id 8552).
pub fn gi_url(mod_id: &str, file_id: &str) -> String {
    format!("https://gamebanana.com/game/8552/mods/{mod_id}/dl/{file_id}")
}

/// Temp dirs plus everything needed to build an orchestrator against them.
pub struct Harness {
    pub root: tempfile::TempDir,
    pub staging: tempfile::TempDir,
    pub state: tempfile::TempDir,
    pub engine: Arc<RecordingEngine>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
            staging: tempfile::tempdir().unwrap(),
            state: tempfile::tempdir().unwrap(),
            engine: Arc::new(RecordingEngine::default()),
        }
    }

    /// Config with GI pointed at the temp install root.
    pub fn config(&self, limit: u32) -> MdmConfig {
        let mut cfg = MdmConfig::default();
        cfg.concurrency_limit = limit;
        cfg.save_preview = false;
        cfg.destination_roots
            .insert("GI".to_string(), self.root.path().to_path_buf());
        cfg
    }

    pub fn db_path(&self) -> PathBuf {
        self.state.path().join("recovery.db")
    }

    pub async fn db(&self) -> RecoveryDb {
        RecoveryDb::open_at(self.db_path()).await.unwrap()
    }

    pub async fn orchestrator(&self, cfg: MdmConfig, catalog: StaticCatalog) -> Orchestrator {
        Orchestrator::new(
            cfg,
            self.engine.clone(),
            Arc::new(catalog),
            self.db().await,
            self.staging.path().to_path_buf(),
        )
    }

    /// Pretend the engine extracted `files` for `key`.
    pub fn stage(&self, key: &JobKey, files: &[&str]) {
        stage_into(self.staging.path(), key, files);
    }
}

pub fn stage_into(staging: &Path, key: &JobKey, files: &[&str]) {
    for f in files {
        let p = staging.join(key.as_str()).join(f);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(&p, f.as_bytes()).unwrap();
    }
}
