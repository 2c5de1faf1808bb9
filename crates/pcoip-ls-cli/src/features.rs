use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::client::LicenseClient;
use crate::transport::Transport;

/// The two feature classes the summary reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Standard,
    Graphics,
}

/// Known feature names and the bucket each folds into. Adding a
/// feature class is a row here, not new code.
const FEATURE_BUCKETS: &[(&str, Bucket)] = &[
    ("Agent-Session", Bucket::Standard),
    ("Agent-Graphics", Bucket::Graphics),
];

fn bucket_for(feature_name: &str) -> Option<Bucket> {
    FEATURE_BUCKETS
        .iter()
        .find(|(name, _)| *name == feature_name)
        .map(|(_, bucket)| *bucket)
}

/// One entry of the service's feature list. The service may report
/// several entries per feature name, one per license pool; extra
/// fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureRecord {
    #[serde(rename = "featureName")]
    pub feature_name: String,
    #[serde(rename = "featureCount")]
    pub feature_count: u64,
    pub used: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BucketUsage {
    pub count: u64,
    pub used: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageSummary {
    pub standard: BucketUsage,
    pub graphics: BucketUsage,
}

/// Sums matching records into the two buckets. Order-independent;
/// names outside the bucket table never contribute. An empty list
/// yields all-zero buckets.
pub fn fold_features(records: &[FeatureRecord]) -> UsageSummary {
    let mut summary = UsageSummary::default();
    for record in records {
        let Some(bucket) = bucket_for(&record.feature_name) else {
            continue;
        };
        let slot = match bucket {
            Bucket::Standard => &mut summary.standard,
            Bucket::Graphics => &mut summary.graphics,
        };
        slot.count += record.feature_count;
        slot.used += record.used;
    }
    summary
}

impl<T: Transport> LicenseClient<T> {
    /// Fetches the feature list and folds it into the two-bucket
    /// summary. A non-2xx reply (after the 401 policy has run) is an
    /// error naming the status; a malformed body is a fatal decode
    /// error.
    pub fn get_used_features(&mut self) -> Result<UsageSummary> {
        let url = self.endpoint().features_url();
        let reply = self.get_authenticated(&url, &[])?;
        if !reply.is_success() {
            bail!("features request failed with status {}", reply.status);
        }
        let records: Vec<FeatureRecord> =
            serde_json::from_str(&reply.body).context("failed to decode feature list")?;
        Ok(fold_features(&records))
    }
}
