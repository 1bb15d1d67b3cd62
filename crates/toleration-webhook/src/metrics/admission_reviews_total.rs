use lazy_static::lazy_static;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

lazy_static! {
    static ref ADMISSION_REVIEWS_TOTAL: Family<AdmissionReviewLabels, Counter> =
        Family::default();
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct AdmissionReviewLabels {
    allowed: String,
    mutated: String,
}

pub(super) fn register(registry: &mut Registry) {
    registry.register(
        "admission_reviews",
        "Number of AdmissionReviews answered, by decision",
        ADMISSION_REVIEWS_TOTAL.clone(),
    );
}

pub fn add_admission_review(allowed: bool, mutated: bool) {
    ADMISSION_REVIEWS_TOTAL
        .get_or_create(&AdmissionReviewLabels {
            allowed: allowed.to_string(),
            mutated: mutated.to_string(),
        })
        .inc();
}
