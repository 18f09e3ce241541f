use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use shopper_dna::config::{parse_buckets, RfmSettings};
use shopper_dna::error::AppError;
use shopper_dna::workflows::rfm::{AsOf, RfmConfig, RuleTable};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Engine defaults shared by every analysis request.
#[derive(Debug, Clone)]
pub(crate) struct AnalysisDefaults {
    pub(crate) buckets: u8,
    pub(crate) as_of: AsOf,
    pub(crate) rules: Option<RuleTable>,
}

impl AnalysisDefaults {
    pub(crate) fn from_settings(settings: &RfmSettings) -> Result<Self, AppError> {
        let RfmConfig {
            buckets,
            as_of,
            rules,
        } = settings.engine_config()?;
        Ok(Self {
            buckets,
            as_of,
            rules,
        })
    }

    /// The configured rule table only applies at its own scale; other bucket
    /// counts fall back to the standard table.
    pub(crate) fn engine_config(&self, buckets: Option<u8>, as_of: Option<AsOf>) -> RfmConfig {
        let buckets = buckets.unwrap_or(self.buckets);
        let rules = if buckets == self.buckets {
            self.rules.clone()
        } else {
            None
        };

        RfmConfig {
            buckets,
            as_of: as_of.unwrap_or(self.as_of),
            rules,
        }
    }
}

impl Default for AnalysisDefaults {
    fn default() -> Self {
        let RfmConfig {
            buckets,
            as_of,
            rules,
        } = RfmConfig::default();
        Self {
            buckets,
            as_of,
            rules,
        }
    }
}

pub(crate) fn parse_as_of(raw: &str) -> Result<AsOf, String> {
    raw.parse()
}

pub(crate) fn parse_bucket_count(raw: &str) -> Result<u8, String> {
    parse_buckets(raw).map_err(|err| err.to_string())
}

pub(crate) fn deserialize_optional_as_of<'de, D>(deserializer: D) -> Result<Option<AsOf>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    opt.map(|value| parse_as_of(&value).map_err(serde::de::Error::custom))
        .transpose()
}
