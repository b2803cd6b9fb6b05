use std::sync::LazyLock;

use prometheus::*;

use crate::encoder::ModelVariant;

static METRIC_SEARCH_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!("picsearch_search_count", "count of the image to search", &["model"])
        .unwrap()
});

static METRIC_SEARCH_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "picsearch_search_duration",
        "duration of the per-image search in seconds",
        &["model"]
    )
    .unwrap()
});

static METRIC_SEARCH_MAX_SCORE: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "picsearch_search_max_score",
        "max score of the per-image search",
        &["model"],
        (1..=20).map(|x| x as f64 * 0.05).collect()
    )
    .unwrap()
});

static METRIC_BUILD_IMAGES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!("picsearch_build_images", "count of the indexed images", &["model"])
        .unwrap()
});

/// 记录一次搜索
pub fn observe_search(variant: ModelVariant, duration: f32, max_score: Option<f32>) {
    let labels = [variant.name()];
    METRIC_SEARCH_COUNT.with_label_values(&labels).inc();
    METRIC_SEARCH_DURATION.with_label_values(&labels).observe(duration as f64);
    if let Some(score) = max_score {
        METRIC_SEARCH_MAX_SCORE.with_label_values(&labels).observe(score as f64);
    }
}

/// 记录一次建库
pub fn observe_build(variant: ModelVariant, images: usize) {
    METRIC_BUILD_IMAGES.with_label_values(&[variant.name()]).inc_by(images as u64);
}

/// 以 prometheus 文本格式导出所有指标
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    encoder.encode_to_string(&prometheus::gather()).unwrap_or_default()
}
