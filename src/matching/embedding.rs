//! Embedding provider.
//!
//! [`EmbeddingService`] owns the process-lifetime embedding model. The model is
//! loaded lazily on first use: a previously persisted [`ModelArtifact`] is
//! preferred, otherwise the configured default model is constructed and the
//! artifact is written so later processes load the same model. Initialization
//! runs at most once per service, even under concurrent first use.

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::DEFAULT_MODEL;
use crate::config::ModelSection;
use crate::error::{Error, Result};

/// One embedding vector per skill label.
pub type Embedding = Vec<f32>;

/// Embeddings of a skill list, one row per label, in input order.
pub type EmbeddingMatrix = Vec<Embedding>;

/// File name of the persisted model artifact inside the artifact directory.
pub const ARTIFACT_FILE: &str = "skill_match_model.json";

/// Current artifact layout version.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Models this service can construct, with their output dimension.
const SUPPORTED_MODELS: [(&str, usize); 4] = [
    ("all-MiniLM-L6-v2", 384),
    ("all-MiniLM-L12-v2", 384),
    ("bge-small-en-v1.5", 384),
    ("bge-base-en-v1.5", 768),
];

/// Whether `name` is a model [`FastEmbedLoader`] can construct.
pub fn is_supported_model(name: &str) -> bool {
    model_dimension(name).is_some()
}

/// Names of all constructible models.
pub fn supported_models() -> Vec<&'static str> {
    SUPPORTED_MODELS.iter().map(|(name, _)| *name).collect()
}

/// Output dimension of a supported model.
pub fn model_dimension(name: &str) -> Option<usize> {
    SUPPORTED_MODELS
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, dimension)| *dimension)
}

fn fastembed_model(name: &str) -> Option<EmbeddingModel> {
    match name {
        "all-MiniLM-L6-v2" => Some(EmbeddingModel::AllMiniLML6V2),
        "all-MiniLM-L12-v2" => Some(EmbeddingModel::AllMiniLML12V2),
        "bge-small-en-v1.5" => Some(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Some(EmbeddingModel::BGEBaseENV15),
        _ => None,
    }
}

/// Encodes skill labels into embeddings.
///
/// Implementations must be deterministic for a fixed model and input, and
/// thread-safe so one instance can serve concurrent match calls.
pub trait SkillEncoder: Send + Sync {
    /// Encode a non-empty list of labels, one row per label in input order.
    fn encode(&self, labels: &[String]) -> Result<EmbeddingMatrix>;

    /// Encode a single label.
    fn encode_one(&self, label: &str) -> Result<Embedding> {
        self.encode(&[label.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::ModelUnavailable("model returned no embedding".to_string()))
    }

    /// Name of the model producing the embeddings.
    fn model_name(&self) -> &str;
}

/// A loaded embedding model.
pub trait TextModel: Send + Sync {
    fn embed(&self, labels: &[String], batch_size: Option<usize>) -> Result<EmbeddingMatrix>;

    fn dimension(&self) -> usize;
}

/// Builds [`TextModel`]s. Split out so the lazy-load path can be exercised
/// without downloading weights.
pub trait ModelLoader: Send + Sync {
    /// Load or construct `model`, caching any fetched weights in `artifact_dir`.
    fn load(&self, model: &str, artifact_dir: &Path) -> Result<Box<dyn TextModel>>;
}

/// Record of the model persisted for reuse across processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub model: String,
    pub dimension: usize,
}

impl ModelArtifact {
    pub fn new(model: impl Into<String>, dimension: usize) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            model: model.into(),
            dimension,
        }
    }

    /// Read and check an artifact. Unknown versions or models count as corrupt.
    pub fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path)?;
        let artifact: ModelArtifact = serde_json::from_slice(&raw)?;

        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(Error::ModelUnavailable(format!(
                "artifact format version {} is not supported",
                artifact.format_version
            )));
        }
        if model_dimension(&artifact.model) != Some(artifact.dimension) {
            return Err(Error::ModelUnavailable(format!(
                "artifact names unknown model '{}' ({} dimensions)",
                artifact.model, artifact.dimension
            )));
        }

        Ok(artifact)
    }

    /// Write the artifact through a temporary file so readers never see a
    /// partial write.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Configuration for [`EmbeddingService`].
#[derive(Debug, Clone)]
pub struct EmbeddingServiceConfig {
    /// Model constructed when no usable artifact exists.
    pub default_model: String,
    pub artifact_dir: PathBuf,
    pub batch_size: Option<usize>,
    pub show_download_progress: bool,
}

impl Default for EmbeddingServiceConfig {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_string(),
            artifact_dir: PathBuf::from("models"),
            batch_size: None,
            show_download_progress: false,
        }
    }
}

impl From<&ModelSection> for EmbeddingServiceConfig {
    fn from(section: &ModelSection) -> Self {
        Self {
            default_model: section.name.clone(),
            artifact_dir: section.artifact_dir.clone(),
            batch_size: section.batch_size,
            show_download_progress: section.show_download_progress,
        }
    }
}

impl EmbeddingServiceConfig {
    pub fn artifact_path(&self) -> PathBuf {
        self.artifact_dir.join(ARTIFACT_FILE)
    }
}

/// How the active model was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelOrigin {
    /// Loaded from a persisted artifact.
    Artifact,
    /// Constructed from the default model.
    Default,
}

struct LoadedModel {
    name: String,
    origin: ModelOrigin,
    model: Box<dyn TextModel>,
}

/// Process-lifetime embedding service, shared by reference across requests.
pub struct EmbeddingService {
    config: EmbeddingServiceConfig,
    loader: Box<dyn ModelLoader>,
    model: OnceCell<LoadedModel>,
}

impl EmbeddingService {
    /// Service backed by FastEmbed. Nothing is loaded until first use.
    pub fn new(config: EmbeddingServiceConfig) -> Self {
        let loader = FastEmbedLoader::new(config.show_download_progress);
        Self::with_loader(config, loader)
    }

    pub fn with_loader(config: EmbeddingServiceConfig, loader: impl ModelLoader + 'static) -> Self {
        Self {
            config,
            loader: Box::new(loader),
            model: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &EmbeddingServiceConfig {
        &self.config
    }

    /// Whether the model has been initialized.
    pub fn is_loaded(&self) -> bool {
        self.model.get().is_some()
    }

    /// Origin of the active model, if loaded.
    pub fn origin(&self) -> Option<ModelOrigin> {
        self.model.get().map(|loaded| loaded.origin)
    }

    /// Force initialization, e.g. at startup.
    pub fn warm_up(&self) -> Result<()> {
        self.loaded().map(|_| ())
    }

    fn loaded(&self) -> Result<&LoadedModel> {
        self.model.get_or_try_init(|| self.initialize())
    }

    fn initialize(&self) -> Result<LoadedModel> {
        let artifact_path = self.config.artifact_path();

        match ModelArtifact::read(&artifact_path) {
            Ok(artifact) => match self.loader.load(&artifact.model, &self.config.artifact_dir) {
                Ok(model) => {
                    info!(
                        model = %artifact.model,
                        path = %artifact_path.display(),
                        "Loaded embedding model from artifact"
                    );
                    return Ok(LoadedModel {
                        name: artifact.model,
                        origin: ModelOrigin::Artifact,
                        model,
                    });
                }
                Err(e) => warn!(
                    model = %artifact.model,
                    error = %e,
                    "Failed to load model named by artifact; using default model"
                ),
            },
            Err(Error::Io(ref e)) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    path = %artifact_path.display(),
                    "Model artifact not found; using default pretrained model"
                );
            }
            Err(e) => warn!(
                path = %artifact_path.display(),
                error = %e,
                "Model artifact unreadable; using default pretrained model"
            ),
        }

        let name = self.config.default_model.clone();
        let model = self
            .loader
            .load(&name, &self.config.artifact_dir)
            .map_err(|e| match e {
                Error::ModelUnavailable(_) => e,
                other => Error::ModelUnavailable(other.to_string()),
            })?;

        let artifact = ModelArtifact::new(name.clone(), model.dimension());
        match artifact.write(&artifact_path) {
            Ok(()) => info!(
                model = %name,
                path = %artifact_path.display(),
                "Persisted default model artifact"
            ),
            // The model is usable either way; only reuse across restarts is lost.
            Err(e) => warn!(
                path = %artifact_path.display(),
                error = %e,
                "Failed to persist model artifact"
            ),
        }

        Ok(LoadedModel {
            name,
            origin: ModelOrigin::Default,
            model,
        })
    }
}

impl SkillEncoder for EmbeddingService {
    fn encode(&self, labels: &[String]) -> Result<EmbeddingMatrix> {
        if labels.is_empty() {
            return Err(Error::InvalidQuery(
                "cannot encode an empty skill list".to_string(),
            ));
        }

        let loaded = self.loaded()?;
        let matrix = loaded.model.embed(labels, self.config.batch_size)?;

        if matrix.len() != labels.len() {
            return Err(Error::ModelUnavailable(format!(
                "model returned {} embeddings for {} labels",
                matrix.len(),
                labels.len()
            )));
        }

        debug!(labels = labels.len(), model = %loaded.name, "Encoded skill labels");
        Ok(matrix)
    }

    fn model_name(&self) -> &str {
        self.model
            .get()
            .map(|loaded| loaded.name.as_str())
            .unwrap_or(&self.config.default_model)
    }
}

/// [`ModelLoader`] backed by FastEmbed's ONNX models. Weights are downloaded
/// into the artifact directory on first construction and reused afterwards.
#[derive(Debug, Clone, Default)]
pub struct FastEmbedLoader {
    show_download_progress: bool,
}

impl FastEmbedLoader {
    pub fn new(show_download_progress: bool) -> Self {
        Self {
            show_download_progress,
        }
    }
}

impl ModelLoader for FastEmbedLoader {
    fn load(&self, model: &str, artifact_dir: &Path) -> Result<Box<dyn TextModel>> {
        let (variant, dimension) = fastembed_model(model)
            .zip(model_dimension(model))
            .ok_or_else(|| Error::ModelUnavailable(format!("unsupported model '{}'", model)))?;

        let options = InitOptions::new(variant)
            .with_cache_dir(artifact_dir.to_path_buf())
            .with_show_download_progress(self.show_download_progress);

        let inner = TextEmbedding::try_new(options).map_err(|e| {
            Error::ModelUnavailable(format!("failed to initialize '{}': {}", model, e))
        })?;

        Ok(Box::new(FastEmbedModel { inner, dimension }))
    }
}

struct FastEmbedModel {
    inner: TextEmbedding,
    dimension: usize,
}

impl TextModel for FastEmbedModel {
    fn embed(&self, labels: &[String], batch_size: Option<usize>) -> Result<EmbeddingMatrix> {
        self.inner
            .embed(labels.iter().collect::<Vec<_>>(), batch_size)
            .map_err(|e| Error::ModelUnavailable(format!("embedding inference failed: {}", e)))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier, Mutex};

    const DIM: usize = 8;

    /// Deterministic model: byte histogram folded into `DIM` buckets.
    struct HistogramModel;

    impl TextModel for HistogramModel {
        fn embed(&self, labels: &[String], _batch_size: Option<usize>) -> Result<EmbeddingMatrix> {
            Ok(labels
                .iter()
                .map(|label| {
                    let mut v = vec![0.0f32; DIM];
                    for b in label.bytes() {
                        v[b as usize % DIM] += 1.0;
                    }
                    v
                })
                .collect())
        }

        fn dimension(&self) -> usize {
            DIM
        }
    }

    #[derive(Clone, Default)]
    struct RecordingLoader {
        calls: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl RecordingLoader {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ModelLoader for RecordingLoader {
        fn load(&self, model: &str, _artifact_dir: &Path) -> Result<Box<dyn TextModel>> {
            self.calls.lock().unwrap().push(model.to_string());
            if self.fail {
                return Err(Error::ModelUnavailable("no network".to_string()));
            }
            Ok(Box::new(HistogramModel))
        }
    }

    fn config_in(dir: &Path) -> EmbeddingServiceConfig {
        EmbeddingServiceConfig {
            artifact_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn test_lazy_until_first_encode() {
        let dir = tempfile::tempdir().unwrap();
        let loader = RecordingLoader::default();
        let service = EmbeddingService::with_loader(config_in(dir.path()), loader.clone());

        assert!(!service.is_loaded());
        assert!(loader.calls().is_empty());

        service.encode(&["cooking".to_string()]).unwrap();
        assert!(service.is_loaded());
    }

    #[test]
    fn test_missing_artifact_constructs_default_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let loader = RecordingLoader::default();
        let service = EmbeddingService::with_loader(config_in(dir.path()), loader.clone());

        service.warm_up().unwrap();

        assert_eq!(loader.calls(), vec![DEFAULT_MODEL.to_string()]);
        assert_eq!(service.origin(), Some(ModelOrigin::Default));

        let artifact = ModelArtifact::read(&dir.path().join(ARTIFACT_FILE));
        // The stub model reports 8 dimensions, which no real model has.
        assert!(artifact.is_err());
        let raw: ModelArtifact =
            serde_json::from_slice(&std::fs::read(dir.path().join(ARTIFACT_FILE)).unwrap())
                .unwrap();
        assert_eq!(raw.model, DEFAULT_MODEL);
        assert_eq!(raw.dimension, DIM);
    }

    #[test]
    fn test_existing_artifact_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        ModelArtifact::new("all-MiniLM-L12-v2", 384)
            .write(&dir.path().join(ARTIFACT_FILE))
            .unwrap();

        let loader = RecordingLoader::default();
        let service = EmbeddingService::with_loader(config_in(dir.path()), loader.clone());
        service.warm_up().unwrap();

        assert_eq!(loader.calls(), vec!["all-MiniLM-L12-v2".to_string()]);
        assert_eq!(service.origin(), Some(ModelOrigin::Artifact));
        assert_eq!(service.model_name(), "all-MiniLM-L12-v2");
    }

    #[test]
    fn test_corrupt_artifact_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(ARTIFACT_FILE);
        std::fs::write(&path, b"{ not json").unwrap();

        let loader = RecordingLoader::default();
        let service = EmbeddingService::with_loader(config_in(dir.path()), loader.clone());
        service.warm_up().unwrap();

        assert_eq!(loader.calls(), vec![DEFAULT_MODEL.to_string()]);
        assert_eq!(service.origin(), Some(ModelOrigin::Default));
        let rewritten: ModelArtifact = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(rewritten.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_default_construction_failure_is_model_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let service =
            EmbeddingService::with_loader(config_in(dir.path()), RecordingLoader::failing());

        let err = service.encode(&["cooking".to_string()]).unwrap_err();

        assert!(matches!(err, Error::ModelUnavailable(_)));
        assert!(!service.is_loaded());
        assert!(!dir.path().join(ARTIFACT_FILE).exists());
    }

    #[test]
    fn test_concurrent_first_use_initializes_once() {
        let dir = tempfile::tempdir().unwrap();
        let loader = RecordingLoader::default();
        let service = Arc::new(EmbeddingService::with_loader(
            config_in(dir.path()),
            loader.clone(),
        ));
        let barrier = Arc::new(Barrier::new(10));
        let successes = Arc::new(AtomicUsize::new(0));

        std::thread::scope(|scope| {
            for i in 0..10 {
                let service = Arc::clone(&service);
                let barrier = Arc::clone(&barrier);
                let successes = Arc::clone(&successes);
                scope.spawn(move || {
                    barrier.wait();
                    if service.encode(&[format!("skill {i}")]).is_ok() {
                        successes.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(successes.load(Ordering::SeqCst), 10);
        assert_eq!(loader.calls().len(), 1);
        assert!(dir.path().join(ARTIFACT_FILE).exists());
        assert!(!dir.path().join("skill_match_model.json.tmp").exists());
    }

    #[test]
    fn test_encode_preserves_order_and_count() {
        let dir = tempfile::tempdir().unwrap();
        let service =
            EmbeddingService::with_loader(config_in(dir.path()), RecordingLoader::default());
        let labels = vec!["a".to_string(), "bb".to_string(), "a".to_string()];

        let matrix = service.encode(&labels).unwrap();

        assert_eq!(matrix.len(), 3);
        assert_eq!(matrix[0], matrix[2]);
        assert_ne!(matrix[0], matrix[1]);
        assert_eq!(service.encode_one("bb").unwrap(), matrix[1]);
    }

    #[test]
    fn test_encode_empty_is_rejected_without_loading() {
        let dir = tempfile::tempdir().unwrap();
        let loader = RecordingLoader::default();
        let service = EmbeddingService::with_loader(config_in(dir.path()), loader.clone());

        let err = service.encode(&[]).unwrap_err();

        assert!(matches!(err, Error::InvalidQuery(_)));
        assert!(loader.calls().is_empty());
    }

    #[test]
    fn test_artifact_rejects_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(ARTIFACT_FILE);
        let mut artifact = ModelArtifact::new(DEFAULT_MODEL, 384);
        artifact.format_version = 99;
        artifact.write(&path).unwrap();

        assert!(matches!(
            ModelArtifact::read(&path),
            Err(Error::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_supported_models() {
        assert!(is_supported_model(DEFAULT_MODEL));
        assert_eq!(model_dimension(DEFAULT_MODEL), Some(crate::matching::EMBEDDING_DIM));
        assert!(!is_supported_model("gpt-4"));
        assert!(supported_models().contains(&"bge-base-en-v1.5"));
    }

    #[test]
    #[ignore = "downloads the all-MiniLM-L6-v2 weights"]
    fn test_fastembed_default_model_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let service = EmbeddingService::new(config_in(dir.path()));

        let matrix = service
            .encode(&["cooking".to_string(), "baking".to_string()])
            .unwrap();

        assert_eq!(matrix.len(), 2);
        assert_eq!(matrix[0].len(), crate::matching::EMBEDDING_DIM);
        assert!(ModelArtifact::read(&dir.path().join(ARTIFACT_FILE)).is_ok());
    }
}
