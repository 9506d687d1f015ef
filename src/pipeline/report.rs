//! Preview report: what cleaning would remove, before anything is removed.
//!
//! Built from the detection result, the image analysis and a handful of
//! sample pages. Serialised to `{stem}_preview.json` and summarised on the
//! console by [`render_summary`].

use crate::config::PreviewSettings;
use crate::pipeline::classify::{ImageAnalysis, ImageRecord};
use crate::pipeline::detect::{DetectionPreview, DetectionResult};
use crate::pipeline::extract::strip_pattern_lines;
use crate::pipeline::pattern::PatternSet;
use crate::pipeline::source::BlockSource;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use tracing::warn;

/// Characters of page text kept per sample.
pub const TEXT_SAMPLE_CHARS: usize = 500;
/// Image records listed per category.
pub const IMAGE_SAMPLES: usize = 5;

pub const LOW_CONFIDENCE: f64 = 0.70;
pub const HIGH_CONFIDENCE: f64 = 0.90;

// ── Report types ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternCount {
    pub headers: usize,
    pub footers: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderFooterPreview {
    Detected {
        algorithm_used: String,
        consistency_score: f64,
        headers_detected: Vec<String>,
        footers_detected: Vec<String>,
        preview_samples: DetectionPreview,
        count: PatternCount,
    },
    NotDetected {
        status: String,
        errors: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationSummary {
    pub decorative: usize,
    pub tables: usize,
    pub important: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSample {
    /// 0-based page index.
    pub page: usize,
    /// Percent of the page, two decimals.
    pub area_percentage: f64,
    pub ocr_lines: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_sample: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImagePreviewSection {
    Analyzed {
        total_images: usize,
        classification_summary: ClassificationSummary,
        images_to_remove: usize,
        images_to_keep: usize,
        sample_decorative: Vec<ImageSample>,
        sample_tables: Vec<ImageSample>,
    },
    NotAnalyzed {
        status: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageComparison {
    /// 1-based page number.
    pub page_number: usize,
    pub original_text_sample: String,
    pub processed_text_sample: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_change_percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewReport {
    pub header_footer_detection: HeaderFooterPreview,
    pub image_analysis: ImagePreviewSection,
    pub sample_pages: Vec<PageComparison>,
    pub recommendations: Vec<String>,
}

// ── Building ─────────────────────────────────────────────────────────────

fn round_to(value: f64, decimals: i32) -> f64 {
    let f = 10f64.powi(decimals);
    (value * f).round() / f
}

/// Assemble the preview report.
pub fn build(
    source: &dyn BlockSource,
    detection: &DetectionResult,
    images: Option<&ImageAnalysis>,
    settings: &PreviewSettings,
) -> PreviewReport {
    let patterns = PatternSet::new(&detection.headers, &detection.footers);
    let sample_pages = if settings.generate_comparisons {
        page_comparisons(source, &patterns, settings.sample_pages)
    } else {
        Vec::new()
    };
    PreviewReport {
        header_footer_detection: header_footer_section(detection),
        image_analysis: image_section(images),
        sample_pages,
        recommendations: recommendations(detection, images),
    }
}

fn header_footer_section(detection: &DetectionResult) -> HeaderFooterPreview {
    match detection.algorithm_used {
        Some(algorithm) if !detection.is_failed() => HeaderFooterPreview::Detected {
            algorithm_used: algorithm.as_str().to_string(),
            consistency_score: round_to(detection.consistency_score, 3),
            headers_detected: detection.headers.clone(),
            footers_detected: detection.footers.clone(),
            preview_samples: detection.preview.clone(),
            count: PatternCount {
                headers: detection.headers.len(),
                footers: detection.footers.len(),
            },
        },
        _ => HeaderFooterPreview::NotDetected {
            status: "not_detected".to_string(),
            errors: detection.errors(),
        },
    }
}

fn image_section(images: Option<&ImageAnalysis>) -> ImagePreviewSection {
    let Some(images) = images else {
        return ImagePreviewSection::NotAnalyzed {
            status: "not_analyzed".to_string(),
        };
    };
    let sample = |with_text: bool| {
        move |r: &ImageRecord| ImageSample {
            page: r.page,
            area_percentage: round_to(r.area_percentage * 100.0, 2),
            ocr_lines: r.ocr_lines,
            text_sample: with_text.then(|| r.ocr_text_sample.clone()),
        }
    };
    ImagePreviewSection::Analyzed {
        total_images: images.total_images,
        classification_summary: ClassificationSummary {
            decorative: images.decorative_images.len(),
            tables: images.table_images.len(),
            important: images.important_images.len(),
        },
        images_to_remove: images.decorative_images.len(),
        images_to_keep: images.kept_count(),
        sample_decorative: images
            .decorative_images
            .iter()
            .take(IMAGE_SAMPLES)
            .map(sample(false))
            .collect(),
        sample_tables: images
            .table_images
            .iter()
            .take(IMAGE_SAMPLES)
            .map(sample(true))
            .collect(),
    }
}

/// Pages spread evenly across the document: all of them when there are at
/// most `n`, otherwise every `total / n`-th page.
pub fn comparison_pages(total: usize, n: usize) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    if total <= n {
        (0..total).collect()
    } else {
        let step = total / n;
        (0..n).map(|i| i * step).collect()
    }
}

fn page_comparisons(
    source: &dyn BlockSource,
    patterns: &PatternSet,
    n: usize,
) -> Vec<PageComparison> {
    comparison_pages(source.page_count(), n)
        .into_iter()
        .map(|page| {
            let original = source.page_text(page).unwrap_or_else(|e| {
                warn!("Preview sample: {}", e);
                String::new()
            });
            let processed = strip_pattern_lines(&original, patterns);
            let original: String = original.chars().take(TEXT_SAMPLE_CHARS).collect();
            let processed: String = processed.chars().take(TEXT_SAMPLE_CHARS).collect();

            let (o, p) = (original.chars().count(), processed.chars().count());
            let text_change_percentage =
                (o > 0).then(|| round_to((o as f64 - p as f64) / o as f64 * 100.0, 2));

            PageComparison {
                page_number: page + 1,
                original_text_sample: original,
                processed_text_sample: processed,
                text_change_percentage,
            }
        })
        .collect()
}

/// Human-readable advice derived from detection confidence and image counts.
pub fn recommendations(detection: &DetectionResult, images: Option<&ImageAnalysis>) -> Vec<String> {
    let mut out = Vec::new();

    let score = detection.consistency_score;
    if detection.is_failed() {
        out.push("Header/footer detection failed. No headers or footers will be removed.".into());
    } else if score < LOW_CONFIDENCE {
        out.push(format!(
            "Header/footer detection confidence is low ({score:.2}). \
             Review samples carefully before proceeding."
        ));
    } else if score >= HIGH_CONFIDENCE {
        out.push(format!(
            "Header/footer detection confidence is high ({score:.2}). Safe to proceed."
        ));
    }

    if let Some(images) = images {
        let tables = images.table_images.len();
        let decorative = images.decorative_images.len();
        if tables > 0 {
            out.push(format!("Protected {tables} table(s) from deletion."));
        }
        if decorative > 0 {
            out.push(format!(
                "{decorative} decorative image(s) will be removed. Review samples to confirm."
            ));
        }
        if decorative == 0 && images.total_images > 0 {
            out.push("All images contain important content. Nothing will be removed.".into());
        }
    }

    if out.is_empty() {
        out.push("No significant changes detected.".into());
    }
    out
}

// ── Console summary ──────────────────────────────────────────────────────

/// Multi-line summary for the terminal.
pub fn render_summary(report: &PreviewReport) -> String {
    let rule = "=".repeat(60);
    let mut s = String::new();
    let _ = writeln!(s, "\n{rule}\nPREVIEW REPORT - REVIEW BEFORE PROCEEDING\n{rule}");

    if let HeaderFooterPreview::Detected {
        algorithm_used,
        consistency_score,
        headers_detected,
        footers_detected,
        count,
        ..
    } = &report.header_footer_detection
    {
        let _ = writeln!(s, "\nHEADER/FOOTER DETECTION:");
        let _ = writeln!(s, "   Algorithm: {algorithm_used}");
        let _ = writeln!(s, "   Confidence: {:.2}%", consistency_score * 100.0);
        let _ = writeln!(s, "   Headers found: {}", count.headers);
        let _ = writeln!(s, "   Footers found: {}", count.footers);
        for (title, items) in [("Headers", headers_detected), ("Footers", footers_detected)] {
            if !items.is_empty() {
                let _ = writeln!(s, "\n   {title} to remove:");
                for item in items.iter().take(3) {
                    let _ = writeln!(s, "      - {item}");
                }
            }
        }
    }

    if let ImagePreviewSection::Analyzed {
        total_images,
        classification_summary,
        ..
    } = &report.image_analysis
    {
        let _ = writeln!(s, "\nIMAGE ANALYSIS:");
        let _ = writeln!(s, "   Total images: {total_images}");
        let _ = writeln!(s, "   Tables (protected): {}", classification_summary.tables);
        let _ = writeln!(s, "   Important: {}", classification_summary.important);
        let _ = writeln!(s, "   Decorative (to remove): {}", classification_summary.decorative);
    }

    let _ = writeln!(s, "\nRECOMMENDATIONS:");
    for r in &report.recommendations {
        let _ = writeln!(s, "   {r}");
    }

    if !report.sample_pages.is_empty() {
        let _ = writeln!(
            s,
            "\nSAMPLE PAGE COMPARISONS ({} pages):",
            report.sample_pages.len()
        );
        for sample in report.sample_pages.iter().take(3) {
            let _ = writeln!(s, "\n   Page {}:", sample.page_number);
            if let Some(change) = sample.text_change_percentage {
                let _ = writeln!(s, "      Text change: {change:.1}%");
            }
        }
    }

    let _ = writeln!(
        s,
        "\n{rule}\nReview the above summary and the detailed JSON report.\n{rule}"
    );
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::detect::{DetectionAlgorithm, DetectionStatus};
    use crate::pipeline::source::{MemoryDocument, MemoryPage};

    fn detection(score: f64, status: DetectionStatus) -> DetectionResult {
        DetectionResult {
            headers: vec!["ANNUAL REPORT".into()],
            footers: vec!["Page #".into()],
            algorithm_used: Some(DetectionAlgorithm::FuzzyMatching),
            consistency_score: score,
            preview: DetectionPreview::Groups {
                header_groups: 1,
                footer_groups: 1,
            },
            sampled_pages: 4,
            evaluated: vec![],
            status,
        }
    }

    #[test]
    fn comparison_page_spread() {
        assert_eq!(comparison_pages(3, 4), vec![0, 1, 2]);
        assert_eq!(comparison_pages(10, 4), vec![0, 2, 4, 6]);
        assert!(comparison_pages(10, 0).is_empty());
    }

    #[test]
    fn recommendation_thresholds() {
        let low = recommendations(&detection(0.5, DetectionStatus::Completed), None);
        assert!(low[0].contains("low (0.50)"));
        let high = recommendations(&detection(0.95, DetectionStatus::Completed), None);
        assert!(high[0].contains("high (0.95)"));
        let mid = recommendations(&detection(0.8, DetectionStatus::Completed), None);
        assert_eq!(mid, vec!["No significant changes detected."]);
        let failed = recommendations(&detection(0.0, DetectionStatus::Failed), None);
        assert!(failed[0].contains("failed"));
    }

    #[test]
    fn image_recommendations() {
        let none_removed = ImageAnalysis {
            total_images: 2,
            ..ImageAnalysis::default()
        };
        let recs = recommendations(&detection(0.8, DetectionStatus::Completed), Some(&none_removed));
        assert_eq!(
            recs,
            vec!["All images contain important content. Nothing will be removed."]
        );
    }

    #[test]
    fn sample_pages_show_removed_lines() {
        let doc = MemoryDocument::new(vec![MemoryPage::new(600.0, 800.0)
            .block(50.0, 20.0, 300.0, 32.0, "ANNUAL REPORT")
            .block(50.0, 400.0, 300.0, 412.0, "Body")
            .block(280.0, 770.0, 320.0, 782.0, "Page 1")]);
        let report = build(
            &doc,
            &detection(0.95, DetectionStatus::Completed),
            None,
            &PreviewSettings::default(),
        );
        let page = &report.sample_pages[0];
        assert_eq!(page.page_number, 1);
        assert_eq!(page.processed_text_sample, "Body");
        // 25 chars before, 4 after.
        assert_eq!(page.text_change_percentage, Some(84.0));
        assert!(matches!(
            report.image_analysis,
            ImagePreviewSection::NotAnalyzed { .. }
        ));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["header_footer_detection"]["algorithm_used"], "fuzzy_matching");
        assert_eq!(json["header_footer_detection"]["count"]["footers"], 1);
        assert_eq!(json["image_analysis"]["status"], "not_analyzed");

        let summary = render_summary(&report);
        assert!(summary.contains("Algorithm: fuzzy_matching"));
        assert!(summary.contains("- Page #"));
    }

    #[test]
    fn failed_detection_is_not_detected() {
        let mut d = detection(0.0, DetectionStatus::Failed);
        d.algorithm_used = None;
        let section = header_footer_section(&d);
        assert!(matches!(section, HeaderFooterPreview::NotDetected { .. }));
    }
}
