//! In-process inference backend.
//!
//! The model is an owned resource: it is loaded once at startup through an
//! [`EngineLoader`], wrapped in a [`LocalModel`], and shared read-only via
//! `Arc`. Weight formats and kernels live behind [`InferenceEngine`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::prompts::{Prompt, PromptEncoding, ASSISTANT_MARKER, END_OF_TURN};
use super::{LlmError, ModelBackend};

pub const MAX_NEW_TOKENS: usize = 500;
pub const LOCAL_TEMPERATURE: f32 = 0.8;

/// Numeric precision the engine runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// 4-bit quantized weights, used on accelerators.
    Quantized4Bit,
    Full,
}

pub fn select_precision(accelerator_available: bool) -> Precision {
    if accelerator_available {
        Precision::Quantized4Bit
    } else {
        Precision::Full
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DevicePreference {
    Auto,
    Cpu,
    Gpu,
}

impl DevicePreference {
    pub fn accelerator_available(&self) -> bool {
        match self {
            DevicePreference::Auto => detect_accelerator(),
            DevicePreference::Cpu => false,
            DevicePreference::Gpu => true,
        }
    }
}

impl std::str::FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(DevicePreference::Auto),
            "cpu" => Ok(DevicePreference::Cpu),
            "gpu" | "cuda" => Ok(DevicePreference::Gpu),
            other => Err(format!("unknown device '{other}' (expected auto, cpu or gpu)")),
        }
    }
}

fn detect_accelerator() -> bool {
    let visible = std::env::var("CUDA_VISIBLE_DEVICES")
        .map(|v| !v.trim().is_empty() && v.trim() != "-1")
        .unwrap_or(false);
    visible || Path::new("/dev/nvidia0").exists()
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplingParams {
    pub max_new_tokens: usize,
    pub do_sample: bool,
    pub temperature: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_new_tokens: MAX_NEW_TOKENS,
            do_sample: true,
            temperature: LOCAL_TEMPERATURE,
        }
    }
}

/// A loaded text-generation engine.
///
/// `generate` returns the full decoded sequence, prompt included; the backend
/// cuts out the assistant turn.
pub trait InferenceEngine: Send + Sync {
    fn generate(&self, prompt: &str, params: &SamplingParams) -> anyhow::Result<String>;
}

/// Builds an engine from a weights reference at a given precision.
pub trait EngineLoader {
    fn load(&self, weights: &Path, precision: Precision)
        -> anyhow::Result<Box<dyn InferenceEngine>>;
}

/// Process-wide model state. Read-only after construction.
pub struct LocalModel {
    engine: Arc<dyn InferenceEngine>,
    precision: Precision,
    weights: PathBuf,
    // One generation at a time per model. Held by the blocking task itself,
    // so it stays locked until the engine returns.
    gate: Arc<Mutex<()>>,
}

impl LocalModel {
    pub fn load(
        loader: &dyn EngineLoader,
        weights: &Path,
        device: DevicePreference,
    ) -> Result<Self, LlmError> {
        let precision = select_precision(device.accelerator_available());
        info!(
            "Loading local model from {} ({:?})",
            weights.display(),
            precision
        );

        let engine = loader.load(weights, precision).map_err(|e| {
            LlmError::Unavailable(format!(
                "failed to load local model from {}: {e:#}",
                weights.display()
            ))
        })?;

        Ok(Self {
            engine: Arc::from(engine),
            precision,
            weights: weights.to_path_buf(),
            gate: Arc::new(Mutex::new(())),
        })
    }

    pub fn from_engine(engine: Arc<dyn InferenceEngine>, precision: Precision) -> Self {
        Self {
            engine,
            precision,
            weights: PathBuf::new(),
            gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn weights(&self) -> &Path {
        &self.weights
    }
}

pub struct LocalInferenceBackend {
    model: Option<Arc<LocalModel>>,
    params: SamplingParams,
}

impl LocalInferenceBackend {
    pub fn new(model: Arc<LocalModel>) -> Self {
        Self {
            model: Some(model),
            params: SamplingParams::default(),
        }
    }

    /// A backend whose model never loaded. Every call is `Unavailable`.
    pub fn uninitialized() -> Self {
        Self {
            model: None,
            params: SamplingParams::default(),
        }
    }
}

#[async_trait]
impl ModelBackend for LocalInferenceBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn encoding(&self) -> PromptEncoding {
        PromptEncoding::Instruct
    }

    async fn invoke(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| LlmError::Unavailable("local model is not loaded".to_string()))?;

        let Prompt::Instruct(text) = prompt else {
            return Err(LlmError::UnsupportedPrompt(prompt.encoding()));
        };

        let guard = Arc::clone(&model.gate).lock_owned().await;

        let engine = Arc::clone(&model.engine);
        let text = text.clone();
        let params = self.params.clone();
        let output = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            engine.generate(&text, &params)
        })
            .await
            .map_err(|e| LlmError::Inference(format!("generation task failed: {e}")))?
            .map_err(|e| LlmError::Inference(format!("{e:#}")))?;

        let completion = assistant_completion(&output);
        debug!("Local generation returned {} chars", completion.len());
        Ok(completion.to_string())
    }
}

/// Text after the last assistant header, with a trailing end-of-turn removed.
fn assistant_completion(output: &str) -> &str {
    let tail = output
        .rsplit_once(ASSISTANT_MARKER)
        .map(|(_, tail)| tail)
        .unwrap_or(output)
        .trim();
    tail.strip_suffix(END_OF_TURN).unwrap_or(tail).trim_end()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::llm_client::prompts::PromptBuilder;

    /// Echoes the prompt followed by a fixed completion, like a decoder would.
    struct EchoEngine {
        completion: String,
        seen: std::sync::Mutex<Option<SamplingParams>>,
    }

    impl InferenceEngine for EchoEngine {
        fn generate(&self, prompt: &str, params: &SamplingParams) -> anyhow::Result<String> {
            *self.seen.lock().unwrap() = Some(params.clone());
            Ok(format!("{prompt}{}", self.completion))
        }
    }

    struct FailingLoader;

    impl EngineLoader for FailingLoader {
        fn load(&self, _: &Path, _: Precision) -> anyhow::Result<Box<dyn InferenceEngine>> {
            anyhow::bail!("weights file is truncated")
        }
    }

    struct RecordingLoader;

    impl EngineLoader for RecordingLoader {
        fn load(
            &self,
            _: &Path,
            precision: Precision,
        ) -> anyhow::Result<Box<dyn InferenceEngine>> {
            Ok(Box::new(EchoEngine {
                completion: format!("{precision:?}"),
                seen: Default::default(),
            }))
        }
    }

    fn instruct_prompt() -> Prompt {
        PromptBuilder::new(PromptEncoding::Instruct)
            .build("Data analyst fluent in SQL, dashboards and stakeholder wrangling.")
    }

    #[test]
    fn test_precision_follows_accelerator() {
        assert_eq!(select_precision(true), Precision::Quantized4Bit);
        assert_eq!(select_precision(false), Precision::Full);
    }

    #[test]
    fn test_load_selects_precision_from_device() {
        let model = LocalModel::load(&RecordingLoader, Path::new("w.gguf"), DevicePreference::Cpu)
            .unwrap();
        assert_eq!(model.precision(), Precision::Full);

        let model = LocalModel::load(&RecordingLoader, Path::new("w.gguf"), DevicePreference::Gpu)
            .unwrap();
        assert_eq!(model.precision(), Precision::Quantized4Bit);
        assert_eq!(model.weights(), Path::new("w.gguf"));
    }

    #[test]
    fn test_load_failure_is_unavailable() {
        let err = match LocalModel::load(&FailingLoader, Path::new("w.gguf"), DevicePreference::Cpu)
        {
            Err(e) => e,
            Ok(_) => panic!("expected load failure"),
        };
        assert!(err.is_unavailable());
        assert!(err.to_string().contains("weights file is truncated"));
    }

    #[test]
    fn test_assistant_completion_strips_prompt_and_eot() {
        let output = "<|begin_of_text|>...<|start_header_id|>assistant<|end_header_id|>\n\n{\"rating\": 3}<|eot_id|>";
        assert_eq!(assistant_completion(output), "{\"rating\": 3}");
    }

    #[test]
    fn test_assistant_completion_without_marker_returns_trimmed_text() {
        assert_eq!(assistant_completion("  {\"rating\": 3}\n"), "{\"rating\": 3}");
    }

    #[tokio::test]
    async fn test_invoke_returns_only_generated_portion() {
        let engine = Arc::new(EchoEngine {
            completion: "{\"roast_critique\": \"Meh.\"}".to_string(),
            seen: Default::default(),
        });
        let model = LocalModel::from_engine(engine.clone(), Precision::Full);
        let backend = LocalInferenceBackend::new(Arc::new(model));

        let raw = backend.invoke(&instruct_prompt()).await.unwrap();
        assert_eq!(raw, "{\"roast_critique\": \"Meh.\"}");

        let params = engine.seen.lock().unwrap().clone().unwrap();
        assert_eq!(params.max_new_tokens, 500);
        assert!(params.do_sample);
        assert!((params.temperature - 0.8).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_uninitialized_backend_is_unavailable() {
        let backend = LocalInferenceBackend::uninitialized();
        let err = backend.invoke(&instruct_prompt()).await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_engine_failure_is_inference_error() {
        struct Broken;
        impl InferenceEngine for Broken {
            fn generate(&self, _: &str, _: &SamplingParams) -> anyhow::Result<String> {
                anyhow::bail!("out of memory")
            }
        }
        let model = LocalModel::from_engine(Arc::new(Broken), Precision::Full);
        let backend = LocalInferenceBackend::new(Arc::new(model));

        let err = backend.invoke(&instruct_prompt()).await.unwrap_err();
        assert!(matches!(err, LlmError::Inference(ref m) if m.contains("out of memory")));
        assert!(!err.is_unavailable());
    }

    #[tokio::test]
    async fn test_generations_are_serialized() {
        struct Slow {
            active: AtomicUsize,
            peak: AtomicUsize,
        }
        impl InferenceEngine for Slow {
            fn generate(&self, _: &str, _: &SamplingParams) -> anyhow::Result<String> {
                let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(20));
                self.active.fetch_sub(1, Ordering::SeqCst);
                Ok("{}".to_string())
            }
        }

        let engine = Arc::new(Slow {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let model = Arc::new(LocalModel::from_engine(engine.clone(), Precision::Full));
        let backend = Arc::new(LocalInferenceBackend::new(model));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let backend = Arc::clone(&backend);
                tokio::spawn(async move { backend.invoke(&instruct_prompt()).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(engine.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abandoned_call_keeps_model_locked_until_generation_ends() {
        struct Slow {
            active: AtomicUsize,
            peak: AtomicUsize,
            calls: AtomicUsize,
        }
        impl InferenceEngine for Slow {
            fn generate(&self, _: &str, _: &SamplingParams) -> anyhow::Result<String> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(150));
                self.active.fetch_sub(1, Ordering::SeqCst);
                Ok("{}".to_string())
            }
        }

        let engine = Arc::new(Slow {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        });
        let model = Arc::new(LocalModel::from_engine(engine.clone(), Precision::Full));
        let backend = LocalInferenceBackend::new(model);

        let abandoned =
            tokio::time::timeout(Duration::from_millis(30), backend.invoke(&instruct_prompt()))
                .await;
        assert!(abandoned.is_err());

        backend.invoke(&instruct_prompt()).await.unwrap();

        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
        assert_eq!(engine.peak.load(Ordering::SeqCst), 1);
    }
}
