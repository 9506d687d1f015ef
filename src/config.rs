//! Configuration types for PDF cleaning.
//!
//! All cleaning behaviour is controlled through [`CleaningConfig`], built via
//! its [`CleaningConfigBuilder`] or loaded from a TOML file with
//! [`CleaningConfig::from_toml_file`]. The struct is split into sections that
//! mirror the pipeline stages (`ocr`, `detection`, `images`, `text`,
//! `preview`, `output`, `safety`) so a config file reads top to bottom in the
//! order the stages run.
//!
//! Every field has a default, so a config file only needs the keys it
//! changes:
//!
//! ```toml
//! input_dir = "context"
//!
//! [detection]
//! detection_threshold = 0.9
//! algorithms = ["fuzzy_matching", "text_repetition"]
//!
//! [language_per_file]
//! "AAOIFI_EN.pdf" = "eng"
//! ```

use crate::error::CleanError;
use crate::pipeline::detect::DetectionAlgorithm;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Tesseract language used when a file has no entry in `language_per_file`.
pub const DEFAULT_LANGUAGE: &str = "ara+eng";

/// Placeholder substituted for Quranic-font noise.
pub const DEFAULT_QURANIC_PLACEHOLDER: &str = "[نص قرآني]";

/// Configuration for a cleaning run.
///
/// # Example
/// ```rust
/// use pdf_cleaner::CleaningConfig;
///
/// let config = CleaningConfig::builder()
///     .detection_threshold(0.9)
///     .sample_pages(20)
///     .preview_only(true)
///     .build()
///     .unwrap();
/// assert!(config.preview.preview_only);
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Directory scanned for `*.pdf` in batch mode. Default: `context`.
    pub input_dir: PathBuf,

    /// Directory receiving PDF versions, text and chunk files. Default: `output`.
    pub output_dir: PathBuf,

    /// Directory receiving preview and combined JSON reports. Default: `report`.
    pub report_dir: PathBuf,

    /// OCR language per input file name, e.g. `"report.pdf" = "eng"`.
    /// Files not listed use [`OcrSettings::default_language`].
    pub language_per_file: BTreeMap<String, String>,

    pub ocr: OcrSettings,
    pub detection: DetectionSettings,
    pub images: ImageSettings,
    pub text: TextSettings,
    pub preview: PreviewSettings,
    pub output: OutputSettings,
    pub safety: SafetySettings,

    /// Optional progress callback for batch, document and step events.
    #[serde(skip)]
    pub progress_callback: Option<ProgressCallback>,
}

/// OCR normalisation pass (ocrmypdf) settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Run ocrmypdf before analysis. Default: true.
    pub enabled: bool,
    /// Language for files absent from `language_per_file`. Default: `ara+eng`.
    pub default_language: String,
    /// Documents with more pages are OCR'd in sequential chunks of this
    /// size to bound peak memory. Default: 200.
    pub chunk_size: usize,
    pub deskew: bool,
    pub remove_background: bool,
    pub rotate_pages: bool,
    /// ocrmypdf `--output-type`. Default: `pdfa`.
    pub output_type: Option<String>,
    /// Per-invocation timeout in seconds. Default: 3600.
    pub timeout_secs: u64,
    /// ocrmypdf executable. Default: `ocrmypdf`.
    pub command: String,
    /// tesseract executable used for image OCR. Default: `tesseract`.
    pub tesseract_command: String,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            default_language: DEFAULT_LANGUAGE.to_string(),
            chunk_size: 200,
            deskew: true,
            remove_background: true,
            rotate_pages: true,
            output_type: Some("pdfa".to_string()),
            timeout_secs: 3600,
            command: "ocrmypdf".to_string(),
            tesseract_command: "tesseract".to_string(),
        }
    }
}

/// Header/footer detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Minimum fraction of sampled pages a pattern must occur on. Range 0–1. Default: 0.85.
    pub detection_threshold: f64,
    /// Pages sampled from each end of the document. Default: 50.
    pub sample_pages: usize,
    /// Algorithms to run, in tie-break order. Default: all three.
    pub algorithms: Vec<DetectionAlgorithm>,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            detection_threshold: 0.85,
            sample_pages: 50,
            algorithms: DetectionAlgorithm::ALL.to_vec(),
        }
    }
}

/// Image classification settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    /// Images smaller than this page fraction with no text are decorative. Default: 0.05.
    pub area_threshold: f64,
    /// OCR line count at which an image is always a table. Default: 3.
    pub min_lines_for_table: usize,
    /// Tables are always protected; `false` is accepted but has no effect.
    pub keep_tables: bool,
    /// Overlay decorative images during final cleaning. Default: true.
    pub remove_decorative: bool,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            area_threshold: 0.05,
            min_lines_for_table: 3,
            keep_tables: true,
            remove_decorative: true,
        }
    }
}

/// Text extraction and Markdown settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextSettings {
    pub auto_detect_direction: bool,
    pub normalization: Normalization,
    /// Write `{stem}_structured.md` with font-size headings. Default: true.
    pub enable_markdown: bool,
    /// Lines at or above this size become `# `. Default: 16.
    pub h1_font_size: f32,
    /// Lines at or above this size become `## `. Default: 14.
    pub h2_font_size: f32,
    pub remove_quranic_noise: bool,
    pub quranic_placeholder: String,
}

impl Default for TextSettings {
    fn default() -> Self {
        Self {
            auto_detect_direction: true,
            normalization: Normalization::default(),
            enable_markdown: true,
            h1_font_size: 16.0,
            h2_font_size: 14.0,
            remove_quranic_noise: true,
            quranic_placeholder: DEFAULT_QURANIC_PLACEHOLDER.to_string(),
        }
    }
}

/// Preview report settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewSettings {
    /// Force preview mode regardless of the CLI flag. Default: false.
    pub preview_only: bool,
    /// Pages spread across the document for before/after samples. Default: 4.
    pub sample_pages: usize,
    pub generate_comparisons: bool,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            preview_only: false,
            sample_pages: 4,
            generate_comparisons: true,
        }
    }
}

/// Output artefact settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub generate_chunk_simulation: bool,
    /// Character budget per simulated retrieval chunk. Default: 2000.
    pub simulation_chunk_size: usize,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            generate_chunk_simulation: true,
            simulation_chunk_size: 2000,
        }
    }
}

/// Safety settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetySettings {
    /// Copy each input to `{stem}_raw.pdf` before touching it. Default: true.
    pub create_backups: bool,
}

impl Default for SafetySettings {
    fn default() -> Self {
        Self {
            create_backups: true,
        }
    }
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("context"),
            output_dir: PathBuf::from("output"),
            report_dir: PathBuf::from("report"),
            language_per_file: BTreeMap::new(),
            ocr: OcrSettings::default(),
            detection: DetectionSettings::default(),
            images: ImageSettings::default(),
            text: TextSettings::default(),
            preview: PreviewSettings::default(),
            output: OutputSettings::default(),
            safety: SafetySettings::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for CleaningConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleaningConfig")
            .field("input_dir", &self.input_dir)
            .field("output_dir", &self.output_dir)
            .field("report_dir", &self.report_dir)
            .field("language_per_file", &self.language_per_file)
            .field("ocr", &self.ocr)
            .field("detection", &self.detection)
            .field("images", &self.images)
            .field("text", &self.text)
            .field("preview", &self.preview)
            .field("output", &self.output)
            .field("safety", &self.safety)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn CleaningProgressCallback>"),
            )
            .finish()
    }
}

impl CleaningConfig {
    /// Create a new builder for `CleaningConfig`.
    pub fn builder() -> CleaningConfigBuilder {
        CleaningConfigBuilder {
            config: Self::default(),
        }
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, CleanError> {
        let config: CleaningConfig =
            toml::from_str(s).map_err(|e| CleanError::ConfigLoadFailed {
                path: PathBuf::from("<inline>"),
                detail: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, CleanError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| CleanError::ConfigLoadFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        let config: CleaningConfig =
            toml::from_str(&raw).map_err(|e| CleanError::ConfigLoadFailed {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// OCR language for a file name, falling back to the default language.
    pub fn language_for(&self, file_name: &str) -> &str {
        self.language_per_file
            .get(file_name)
            .map(String::as_str)
            .unwrap_or(&self.ocr.default_language)
    }

    /// Check value ranges. Called by [`CleaningConfigBuilder::build`] and the
    /// TOML loaders.
    pub fn validate(&self) -> Result<(), CleanError> {
        let t = self.detection.detection_threshold;
        if !(0.0..=1.0).contains(&t) {
            return Err(CleanError::InvalidConfig(format!(
                "detection_threshold must be 0–1, got {t}"
            )));
        }
        let a = self.images.area_threshold;
        if !(0.0..=1.0).contains(&a) {
            return Err(CleanError::InvalidConfig(format!(
                "area_threshold must be 0–1, got {a}"
            )));
        }
        if self.detection.sample_pages == 0 {
            return Err(CleanError::InvalidConfig("sample_pages must be ≥ 1".into()));
        }
        if self.detection.algorithms.is_empty() {
            return Err(CleanError::InvalidConfig(
                "at least one detection algorithm must be configured".into(),
            ));
        }
        if self.images.min_lines_for_table == 0 {
            return Err(CleanError::InvalidConfig(
                "min_lines_for_table must be ≥ 1".into(),
            ));
        }
        if self.ocr.chunk_size == 0 {
            return Err(CleanError::InvalidConfig("ocr.chunk_size must be ≥ 1".into()));
        }
        if self.output.simulation_chunk_size == 0 {
            return Err(CleanError::InvalidConfig(
                "simulation_chunk_size must be ≥ 1".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`CleaningConfig`].
#[derive(Debug)]
pub struct CleaningConfigBuilder {
    config: CleaningConfig,
}

impl CleaningConfigBuilder {
    pub fn input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.input_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.report_dir = dir.into();
        self
    }

    pub fn language_for(mut self, file_name: impl Into<String>, lang: impl Into<String>) -> Self {
        self.config
            .language_per_file
            .insert(file_name.into(), lang.into());
        self
    }

    pub fn default_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr.default_language = lang.into();
        self
    }

    pub fn ocr_enabled(mut self, v: bool) -> Self {
        self.config.ocr.enabled = v;
        self
    }

    pub fn ocr_chunk_size(mut self, pages: usize) -> Self {
        self.config.ocr.chunk_size = pages.max(1);
        self
    }

    pub fn detection_threshold(mut self, t: f64) -> Self {
        self.config.detection.detection_threshold = t.clamp(0.0, 1.0);
        self
    }

    pub fn sample_pages(mut self, n: usize) -> Self {
        self.config.detection.sample_pages = n.max(1);
        self
    }

    pub fn algorithms(mut self, algorithms: Vec<DetectionAlgorithm>) -> Self {
        self.config.detection.algorithms = algorithms;
        self
    }

    pub fn area_threshold(mut self, a: f64) -> Self {
        self.config.images.area_threshold = a.clamp(0.0, 1.0);
        self
    }

    pub fn min_lines_for_table(mut self, n: usize) -> Self {
        self.config.images.min_lines_for_table = n.max(1);
        self
    }

    pub fn keep_tables(mut self, v: bool) -> Self {
        self.config.images.keep_tables = v;
        self
    }

    pub fn remove_decorative(mut self, v: bool) -> Self {
        self.config.images.remove_decorative = v;
        self
    }

    pub fn enable_markdown(mut self, v: bool) -> Self {
        self.config.text.enable_markdown = v;
        self
    }

    pub fn remove_quranic_noise(mut self, v: bool) -> Self {
        self.config.text.remove_quranic_noise = v;
        self
    }

    pub fn preview_only(mut self, v: bool) -> Self {
        self.config.preview.preview_only = v;
        self
    }

    pub fn create_backups(mut self, v: bool) -> Self {
        self.config.safety.create_backups = v;
        self
    }

    pub fn simulation_chunk_size(mut self, n: usize) -> Self {
        self.config.output.simulation_chunk_size = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<CleaningConfig, CleanError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Unicode normalisation form applied to extracted text.
///
/// NFC is the default: it gives Arabic combining marks a single canonical
/// encoding without folding compatibility characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Normalization {
    #[default]
    #[serde(rename = "NFC")]
    Nfc,
    #[serde(rename = "NFD")]
    Nfd,
    #[serde(rename = "NFKC")]
    Nfkc,
    #[serde(rename = "NFKD")]
    Nfkd,
    #[serde(rename = "none")]
    None,
}
