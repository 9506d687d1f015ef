//! Header/footer detection.
//!
//! Three independent algorithms look at the same page sample and each
//! proposes header and footer patterns together with a consistency score.
//! The proposal with the highest score wins; ties go to the algorithm listed
//! first in [`DetectionSettings::algorithms`].
//!
//! ```text
//! sample_indices ──▶ PageSample ──┬─▶ ExactRepetition ─┐
//!  (first n + last n)             ├─▶ BBoxMatching    ─┼─▶ select ──▶ DetectionResult
//!                                 └─▶ FuzzyMatching   ─┘
//! ```
//!
//! A page whose blocks cannot be read is treated as a page with no blocks:
//! it still counts toward the sample size, so it can only lower scores. An
//! algorithm that fails is left out of selection. If every algorithm fails
//! the result is empty with score 0 and status `failed`.

use crate::config::DetectionSettings;
use crate::error::PageError;
use crate::pipeline::pattern::normalize_digits;
use crate::pipeline::similarity::ratio;
use crate::pipeline::source::{BlockSource, PageBlock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use tracing::{debug, info, warn};

/// Upper edge of the header band, as a fraction of page height.
pub const HEADER_BAND: f32 = 0.10;
/// Lower edge of the footer band, as a fraction of page height.
pub const FOOTER_BAND: f32 = 0.90;
/// Position bucket size for [`DetectionAlgorithm::BBoxMatching`], in points.
pub const POSITION_TOLERANCE: f32 = 10.0;
/// Similarity at which a line joins an existing fuzzy group.
pub const GROUP_SIMILARITY: f64 = 0.85;

// ── Algorithms ───────────────────────────────────────────────────────────

/// The three detection strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectionAlgorithm {
    /// Identical text among the top/bottom two blocks of each page.
    #[serde(rename = "text_repetition")]
    ExactRepetition,
    /// Text recurring at the same rounded position in the header/footer band.
    #[serde(rename = "bbox_matching")]
    BBoxMatching,
    /// Digit-normalised text clustered by similarity; emits `#` patterns.
    #[serde(rename = "fuzzy_matching")]
    FuzzyMatching,
}

impl DetectionAlgorithm {
    pub const ALL: [DetectionAlgorithm; 3] = [
        DetectionAlgorithm::ExactRepetition,
        DetectionAlgorithm::BBoxMatching,
        DetectionAlgorithm::FuzzyMatching,
    ];

    /// Name used in config files and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionAlgorithm::ExactRepetition => "text_repetition",
            DetectionAlgorithm::BBoxMatching => "bbox_matching",
            DetectionAlgorithm::FuzzyMatching => "fuzzy_matching",
        }
    }

    /// Run this algorithm over a sample.
    pub fn run(&self, sample: &PageSample, threshold: f64) -> Result<AlgorithmResult, PageError> {
        match self {
            DetectionAlgorithm::ExactRepetition => Ok(exact_repetition(sample, threshold)),
            DetectionAlgorithm::BBoxMatching => bbox_matching(sample, threshold),
            DetectionAlgorithm::FuzzyMatching => fuzzy_matching(sample, threshold),
        }
    }
}

impl fmt::Display for DetectionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Sampling ─────────────────────────────────────────────────────────────

/// The first `n` and last `n` page indices, deduplicated and ascending.
pub fn sample_indices(total_pages: usize, n: usize) -> Vec<usize> {
    let k = n.min(total_pages);
    let mut indices: Vec<usize> = (0..k).chain(total_pages - k..total_pages).collect();
    indices.sort_unstable();
    indices.dedup();
    indices
}

/// One sampled page: its height and text blocks.
#[derive(Debug, Clone)]
pub struct SampledPage {
    pub index: usize,
    pub height: f32,
    pub blocks: Vec<PageBlock>,
}

/// Blocks read once and shared by every algorithm.
#[derive(Debug, Clone, Default)]
pub struct PageSample {
    pub pages: Vec<SampledPage>,
    /// Number of sampled page indices, including unreadable pages.
    pub total_sampled: usize,
}

impl PageSample {
    pub fn collect(source: &dyn BlockSource, sample_pages: usize) -> Self {
        let indices = sample_indices(source.page_count(), sample_pages);
        let total_sampled = indices.len();
        let pages = indices
            .into_iter()
            .filter_map(|index| {
                let read = source
                    .page_size(index)
                    .and_then(|size| Ok((size, source.page_blocks(index)?)));
                match read {
                    Ok((size, blocks)) => Some(SampledPage {
                        index,
                        height: size.height,
                        blocks,
                    }),
                    Err(e) => {
                        warn!("Skipping page in detection sample: {}", e);
                        None
                    }
                }
            })
            .collect();
        Self {
            pages,
            total_sampled,
        }
    }

    fn fraction(&self, count: usize) -> f64 {
        if self.total_sampled == 0 {
            0.0
        } else {
            count as f64 / self.total_sampled as f64
        }
    }

    /// `(header_max / total + footer_max / total) / 2`; 0 when neither side
    /// has any candidate.
    fn consistency(&self, header_max: Option<usize>, footer_max: Option<usize>) -> f64 {
        if header_max.is_none() && footer_max.is_none() {
            return 0.0;
        }
        (self.fraction(header_max.unwrap_or(0)) + self.fraction(footer_max.unwrap_or(0))) / 2.0
    }
}

// ── Results ──────────────────────────────────────────────────────────────

/// Algorithm-specific preview data surfaced in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetectionPreview {
    Samples {
        header_samples: Vec<(String, usize)>,
        footer_samples: Vec<(String, usize)>,
    },
    Positions {
        header_positions_found: usize,
        footer_positions_found: usize,
    },
    Groups {
        header_groups: usize,
        footer_groups: usize,
    },
    Empty,
}

/// Output of one algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmResult {
    pub headers: Vec<String>,
    pub footers: Vec<String>,
    pub consistency_score: f64,
    pub preview: DetectionPreview,
}

/// Score (or failure) of each algorithm that was run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmScore {
    pub algorithm: DetectionAlgorithm,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistency_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionStatus {
    Completed,
    Failed,
}

/// The selected proposal plus audit data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub headers: Vec<String>,
    pub footers: Vec<String>,
    pub algorithm_used: Option<DetectionAlgorithm>,
    pub consistency_score: f64,
    pub preview: DetectionPreview,
    pub sampled_pages: usize,
    pub evaluated: Vec<AlgorithmScore>,
    pub status: DetectionStatus,
}

impl DetectionResult {
    fn failed(sampled_pages: usize, evaluated: Vec<AlgorithmScore>) -> Self {
        Self {
            headers: Vec::new(),
            footers: Vec::new(),
            algorithm_used: None,
            consistency_score: 0.0,
            preview: DetectionPreview::Empty,
            sampled_pages,
            evaluated,
            status: DetectionStatus::Failed,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == DetectionStatus::Failed
    }

    /// Joined error messages of the algorithms that failed.
    pub fn errors(&self) -> Vec<String> {
        self.evaluated.iter().filter_map(|s| s.error.clone()).collect()
    }
}

// ── Driver ───────────────────────────────────────────────────────────────

/// Sample the document, run every configured algorithm and select one.
pub fn detect(source: &dyn BlockSource, settings: &DetectionSettings) -> DetectionResult {
    let sample = PageSample::collect(source, settings.sample_pages);
    info!(
        "Sampling {} pages from total {}",
        sample.total_sampled,
        source.page_count()
    );

    // Repeated entries would only re-run the same algorithm.
    let mut algorithms: Vec<DetectionAlgorithm> = Vec::new();
    for a in &settings.algorithms {
        if !algorithms.contains(a) {
            algorithms.push(*a);
        }
    }

    let outcomes: Vec<(DetectionAlgorithm, Result<AlgorithmResult, PageError>)> = algorithms
        .into_iter()
        .map(|algorithm| {
            debug!("Running algorithm: {}", algorithm);
            (algorithm, algorithm.run(&sample, settings.detection_threshold))
        })
        .collect();

    select(outcomes, sample.total_sampled)
}

/// Pick the successful outcome with the highest score; the first one wins
/// a tie.
pub fn select(
    outcomes: Vec<(DetectionAlgorithm, Result<AlgorithmResult, PageError>)>,
    sampled_pages: usize,
) -> DetectionResult {
    let evaluated: Vec<AlgorithmScore> = outcomes
        .iter()
        .map(|(algorithm, outcome)| match outcome {
            Ok(r) => AlgorithmScore {
                algorithm: *algorithm,
                consistency_score: Some(r.consistency_score),
                error: None,
            },
            Err(e) => {
                warn!("{}", e);
                AlgorithmScore {
                    algorithm: *algorithm,
                    consistency_score: None,
                    error: Some(e.to_string()),
                }
            }
        })
        .collect();

    let best = outcomes
        .into_iter()
        .filter_map(|(algorithm, outcome)| outcome.ok().map(|r| (algorithm, r)))
        .fold(None::<(DetectionAlgorithm, AlgorithmResult)>, |best, candidate| match best {
            Some(b) if b.1.consistency_score >= candidate.1.consistency_score => Some(b),
            _ => Some(candidate),
        });

    match best {
        Some((algorithm, result)) => {
            info!(
                "Best algorithm: {} with score {:.2}",
                algorithm, result.consistency_score
            );
            DetectionResult {
                headers: result.headers,
                footers: result.footers,
                algorithm_used: Some(algorithm),
                consistency_score: result.consistency_score,
                preview: result.preview,
                sampled_pages,
                evaluated,
                status: DetectionStatus::Completed,
            }
        }
        None => {
            warn!("Every detection algorithm failed; no headers or footers will be removed");
            DetectionResult::failed(sampled_pages, evaluated)
        }
    }
}

// ── Insertion-ordered counting ───────────────────────────────────────────

/// Counter that remembers first-insertion order, so ties resolve to the
/// earliest key.
#[derive(Debug, Clone)]
struct Tally<K> {
    order: Vec<(K, usize)>,
    index: HashMap<K, usize>,
}

impl<K> Default for Tally<K> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K: Clone + Eq + Hash> Tally<K> {
    fn add(&mut self, key: K) {
        match self.index.get(&key) {
            Some(&i) => self.order[i].1 += 1,
            None => {
                self.index.insert(key.clone(), self.order.len());
                self.order.push((key, 1));
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn max_count(&self) -> Option<usize> {
        self.order.iter().map(|(_, c)| *c).max()
    }

    /// Up to `n` entries by descending count, insertion order within ties.
    fn most_common(&self, n: usize) -> Vec<(K, usize)> {
        let mut sorted = self.order.clone();
        sorted.sort_by(|a, b| b.1.cmp(&a.1));
        sorted.truncate(n);
        sorted
    }
}

/// Keys with their texts, in first-seen key order.
#[derive(Debug, Default)]
struct PositionMap {
    order: Vec<((i64, i64), Vec<String>)>,
    index: HashMap<(i64, i64), usize>,
}

impl PositionMap {
    fn push(&mut self, key: (i64, i64), text: String) {
        match self.index.get(&key) {
            Some(&i) => self.order[i].1.push(text),
            None => {
                self.index.insert(key, self.order.len());
                self.order.push((key, vec![text]));
            }
        }
    }

    fn max_len(&self) -> Option<usize> {
        self.order.iter().map(|(_, texts)| texts.len()).max()
    }

    /// Most common text of every position that passes the threshold,
    /// deduplicated in first-seen order.
    fn recurring(&self, sample: &PageSample, threshold: f64) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for (_, texts) in &self.order {
            let mut tally = Tally::default();
            for t in texts {
                tally.add(t.as_str());
            }
            if let Some((text, count)) = tally.most_common(1).into_iter().next() {
                if sample.fraction(count) >= threshold && !out.iter().any(|o| o == text) {
                    out.push(text.to_string());
                }
            }
        }
        out
    }
}

fn sorted_by_top(blocks: &[PageBlock]) -> Vec<&PageBlock> {
    let mut sorted: Vec<&PageBlock> = blocks.iter().collect();
    sorted.sort_by(|a, b| a.rect.y0.total_cmp(&b.rect.y0));
    sorted
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Band {
    Header,
    Footer,
}

fn band_of(y0: f32, height: f32) -> Option<Band> {
    if y0 < height * HEADER_BAND {
        Some(Band::Header)
    } else if y0 > height * FOOTER_BAND {
        Some(Band::Footer)
    } else {
        None
    }
}

fn check_height(
    algorithm: DetectionAlgorithm,
    page: &SampledPage,
) -> Result<(), PageError> {
    if page.height.is_finite() && page.height > 0.0 {
        Ok(())
    } else {
        Err(PageError::DetectionFailed {
            algorithm: algorithm.as_str().to_string(),
            detail: format!("page {} has unusable height {}", page.index, page.height),
        })
    }
}

// ── Algorithm 1: exact repetition ────────────────────────────────────────

fn exact_repetition(sample: &PageSample, threshold: f64) -> AlgorithmResult {
    let mut headers: Tally<String> = Tally::default();
    let mut footers: Tally<String> = Tally::default();

    for page in &sample.pages {
        let sorted = sorted_by_top(&page.blocks);
        for block in sorted.iter().take(2) {
            let text = block.text.trim();
            if text.chars().count() > 3 {
                headers.add(text.to_string());
            }
        }
        for block in &sorted[sorted.len().saturating_sub(2)..] {
            let text = block.text.trim();
            if text.chars().count() > 3 {
                footers.add(text.to_string());
            }
        }
    }

    let passing = |tally: &Tally<String>| -> Vec<String> {
        tally
            .order
            .iter()
            .filter(|(_, count)| sample.fraction(*count) >= threshold)
            .map(|(text, _)| text.clone())
            .collect()
    };

    AlgorithmResult {
        headers: passing(&headers),
        footers: passing(&footers),
        consistency_score: sample.consistency(headers.max_count(), footers.max_count()),
        preview: DetectionPreview::Samples {
            header_samples: headers.most_common(3),
            footer_samples: footers.most_common(3),
        },
    }
}

// ── Algorithm 2: bounding-box matching ───────────────────────────────────

fn position_key(x0: f32, y0: f32) -> (i64, i64) {
    let bucket = |v: f32| ((v / POSITION_TOLERANCE).round_ties_even() * POSITION_TOLERANCE) as i64;
    (bucket(x0), bucket(y0))
}

fn bbox_matching(sample: &PageSample, threshold: f64) -> Result<AlgorithmResult, PageError> {
    let mut header_positions = PositionMap::default();
    let mut footer_positions = PositionMap::default();

    for page in &sample.pages {
        if page.blocks.is_empty() {
            continue;
        }
        check_height(DetectionAlgorithm::BBoxMatching, page)?;
        for block in &page.blocks {
            let text = block.text.trim();
            if text.chars().count() < 3 {
                continue;
            }
            let key = position_key(block.rect.x0, block.rect.y0);
            match band_of(block.rect.y0, page.height) {
                Some(Band::Header) => header_positions.push(key, text.to_string()),
                Some(Band::Footer) => footer_positions.push(key, text.to_string()),
                None => {}
            }
        }
    }

    Ok(AlgorithmResult {
        headers: header_positions.recurring(sample, threshold),
        footers: footer_positions.recurring(sample, threshold),
        consistency_score: sample.consistency(header_positions.max_len(), footer_positions.max_len()),
        preview: DetectionPreview::Positions {
            header_positions_found: header_positions.order.len(),
            footer_positions_found: footer_positions.order.len(),
        },
    })
}

// ── Algorithm 3: fuzzy matching ──────────────────────────────────────────

#[derive(Debug, Clone)]
struct FuzzyGroup {
    pattern: String,
    examples: Vec<String>,
}

fn add_to_group(groups: &mut Vec<FuzzyGroup>, pattern: String, example: String) {
    match groups
        .iter_mut()
        .find(|g| ratio(&g.pattern, &pattern) >= GROUP_SIMILARITY)
    {
        Some(group) => group.examples.push(example),
        None => groups.push(FuzzyGroup {
            pattern,
            examples: vec![example],
        }),
    }
}

fn fuzzy_matching(sample: &PageSample, threshold: f64) -> Result<AlgorithmResult, PageError> {
    let mut header_groups: Vec<FuzzyGroup> = Vec::new();
    let mut footer_groups: Vec<FuzzyGroup> = Vec::new();

    for page in &sample.pages {
        if page.blocks.is_empty() {
            continue;
        }
        check_height(DetectionAlgorithm::FuzzyMatching, page)?;
        for block in sorted_by_top(&page.blocks) {
            let text = block.text.trim();
            if text.chars().count() < 3 {
                continue;
            }
            let groups = match band_of(block.rect.y0, page.height) {
                Some(Band::Header) => &mut header_groups,
                Some(Band::Footer) => &mut footer_groups,
                None => continue,
            };
            add_to_group(groups, normalize_digits(text), text.to_string());
        }
    }

    let passing = |groups: &[FuzzyGroup]| -> Vec<String> {
        groups
            .iter()
            .filter(|g| sample.fraction(g.examples.len()) >= threshold)
            .map(|g| g.pattern.clone())
            .collect()
    };
    let largest = |groups: &[FuzzyGroup]| groups.iter().map(|g| g.examples.len()).max();

    Ok(AlgorithmResult {
        headers: passing(&header_groups),
        footers: passing(&footer_groups),
        consistency_score: sample.consistency(largest(&header_groups), largest(&footer_groups)),
        preview: DetectionPreview::Groups {
            header_groups: header_groups.len(),
            footer_groups: footer_groups.len(),
        },
    })
}
