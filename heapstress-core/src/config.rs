// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict schema validation.
//!
//! Every field is optional; omitted fields take the stock workload values.
//! Any invalid field results in a ValidationError that prevents the run.

use std::path::Path;
use std::time::Duration;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{BenchError, BenchResult, ValidationError};
use crate::pressure::{PressureController, DEFAULT_RELIEF_THRESHOLD};
use crate::types::HeapLimit;
use crate::workload::{SizePolicy, WorkloadSpec};

/// Largest single block a workload may allocate: 1 GiB.
const MAX_BLOCK_BYTES: u64 = 1024 * 1024 * 1024;

/// Raw heap limit as written in YAML: a MiB count or a keyword.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawHeapLimit {
    Megabytes(u64),
    Keyword(String),
}

/// Raw fixed-size workload settings.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawFixedWorkload {
    iterations: Option<u64>,
    block_bytes: Option<u64>,
    report_every: Option<u64>,
}

/// Raw mixed workload settings.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawMixedWorkload {
    iterations: Option<u64>,
    small_block_bytes: Option<u64>,
    large_block_bytes: Option<u64>,
    small_probability: Option<f64>,
    report_every: Option<u64>,
}

/// Raw root configuration file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    heap_limit: Option<RawHeapLimit>,
    #[serde(default = "default_relief_threshold")]
    relief_threshold: f64,
    #[serde(default = "default_settle_ms")]
    settle_ms: u64,
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default)]
    small: RawFixedWorkload,
    #[serde(default)]
    large: RawFixedWorkload,
    #[serde(default)]
    mixed: RawMixedWorkload,
}

fn default_relief_threshold() -> f64 {
    DEFAULT_RELIEF_THRESHOLD
}

fn default_settle_ms() -> u64 {
    1000 // Give the allocator a second between phases
}

/// Validated benchmark configuration.
#[derive(Debug, Clone, Serialize)]
pub struct BenchConfig {
    pub heap_limit: HeapLimit,
    pub relief_threshold: f64,
    #[serde(rename = "settle_ms", serialize_with = "serialize_millis")]
    pub settle: Duration,
    pub seed: Option<u64>,
    pub small: WorkloadSpec,
    pub large: WorkloadSpec,
    pub mixed: WorkloadSpec,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl BenchConfig {
    /// The three workloads in run order.
    pub fn workloads(&self) -> [WorkloadSpec; 3] {
        [self.small.clone(), self.large.clone(), self.mixed.clone()]
    }

    pub fn pressure(&self) -> PressureController {
        PressureController::new(self.relief_threshold)
    }

    /// Random source for the mixed workload: seeded if configured, from OS
    /// entropy otherwise.
    pub fn rng(&self) -> Box<dyn RngCore> {
        match self.seed {
            Some(seed) => Box::new(ChaCha8Rng::seed_from_u64(seed)),
            None => Box::new(ChaCha8Rng::from_entropy()),
        }
    }

    /// Override the settle pause between phases.
    pub fn with_settle_ms(mut self, settle_ms: u64) -> Self {
        self.settle = Duration::from_millis(settle_ms);
        self
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            heap_limit: HeapLimit::Auto,
            relief_threshold: DEFAULT_RELIEF_THRESHOLD,
            settle: Duration::from_millis(default_settle_ms()),
            seed: None,
            small: WorkloadSpec::small_objects(),
            large: WorkloadSpec::large_objects(),
            mixed: WorkloadSpec::mixed(),
        }
    }
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> BenchResult<BenchConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BenchError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| BenchError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> BenchResult<BenchConfig> {
        // An empty document means "all defaults".
        if content.trim().is_empty() {
            return Ok(BenchConfig::default());
        }

        let raw: RawConfig =
            serde_yaml::from_str(content).map_err(|e| BenchError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?;

        Ok(Self::validate(raw)?)
    }

    fn validate(raw: RawConfig) -> Result<BenchConfig, ValidationError> {
        let heap_limit = match raw.heap_limit {
            None => HeapLimit::Auto,
            Some(limit) => Self::validate_heap_limit(limit)?,
        };

        if !(raw.relief_threshold > 0.0 && raw.relief_threshold <= 1.0) {
            return Err(ValidationError::InvalidFieldValue {
                field: "relief_threshold",
                value: raw.relief_threshold.to_string(),
                reason: "Must be greater than 0 and at most 1".to_string(),
            });
        }

        if raw.settle_ms > 60_000 {
            return Err(ValidationError::InvalidFieldValue {
                field: "settle_ms",
                value: raw.settle_ms.to_string(),
                reason: "Settle pause must not exceed 60000ms".to_string(),
            });
        }

        let small = Self::validate_fixed(raw.small, WorkloadSpec::small_objects(), "small")?;
        let large = Self::validate_fixed(raw.large, WorkloadSpec::large_objects(), "large")?;
        let mixed = Self::validate_mixed(raw.mixed)?;

        Ok(BenchConfig {
            heap_limit,
            relief_threshold: raw.relief_threshold,
            settle: Duration::from_millis(raw.settle_ms),
            seed: raw.seed,
            small,
            large,
            mixed,
        })
    }

    fn validate_heap_limit(raw: RawHeapLimit) -> Result<HeapLimit, ValidationError> {
        match raw {
            RawHeapLimit::Megabytes(mb) => HeapLimit::from_mb(mb),
            RawHeapLimit::Keyword(word) => match word.to_ascii_lowercase().as_str() {
                "auto" => Ok(HeapLimit::Auto),
                "unbounded" => Ok(HeapLimit::Unbounded),
                _ => Err(ValidationError::InvalidFieldValue {
                    field: "heap_limit",
                    value: word,
                    reason: "Expected 'auto', 'unbounded' or a size in MiB".to_string(),
                }),
            },
        }
    }

    fn validate_fixed(
        raw: RawFixedWorkload,
        defaults: WorkloadSpec,
        section: &'static str,
    ) -> Result<WorkloadSpec, ValidationError> {
        let mut spec = defaults;

        if let Some(iterations) = raw.iterations {
            spec.iterations = Self::validate_count("iterations", section, iterations)?;
        }
        if let Some(report_every) = raw.report_every {
            spec.report_every = Self::validate_count("report_every", section, report_every)?;
        }
        if let Some(bytes) = raw.block_bytes {
            spec.sizes = SizePolicy::Fixed {
                bytes: Self::validate_block("block_bytes", section, bytes)?,
            };
        }

        Ok(spec)
    }

    fn validate_mixed(raw: RawMixedWorkload) -> Result<WorkloadSpec, ValidationError> {
        let mut spec = WorkloadSpec::mixed();

        if let Some(iterations) = raw.iterations {
            spec.iterations = Self::validate_count("iterations", "mixed", iterations)?;
        }
        if let Some(report_every) = raw.report_every {
            spec.report_every = Self::validate_count("report_every", "mixed", report_every)?;
        }

        if let SizePolicy::Bimodal {
            ref mut small,
            ref mut large,
            ref mut small_probability,
        } = spec.sizes
        {
            if let Some(bytes) = raw.small_block_bytes {
                *small = Self::validate_block("small_block_bytes", "mixed", bytes)?;
            }
            if let Some(bytes) = raw.large_block_bytes {
                *large = Self::validate_block("large_block_bytes", "mixed", bytes)?;
            }
            if let Some(p) = raw.small_probability {
                if !(0.0..=1.0).contains(&p) {
                    return Err(ValidationError::InvalidFieldValue {
                        field: "small_probability",
                        value: p.to_string(),
                        reason: "Probability must be between 0 and 1".to_string(),
                    });
                }
                *small_probability = p;
            }
        }

        Ok(spec)
    }

    fn validate_count(
        field: &'static str,
        section: &'static str,
        value: u64,
    ) -> Result<u64, ValidationError> {
        if value == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field,
                value: format!("0 in {}", section),
                reason: "Must be greater than 0".to_string(),
            });
        }
        Ok(value)
    }

    fn validate_block(
        field: &'static str,
        section: &'static str,
        value: u64,
    ) -> Result<usize, ValidationError> {
        if value == 0 || value > MAX_BLOCK_BYTES {
            return Err(ValidationError::InvalidFieldValue {
                field,
                value: format!("{} in {}", value, section),
                reason: format!("Must be between 1 and {} bytes", MAX_BLOCK_BYTES),
            });
        }
        Ok(value as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MIB;
    use crate::workload::Retention;

    const FULL_CONFIG: &str = r#"
heap_limit: 512
relief_threshold: 0.8
settle_ms: 250
seed: 42
small:
  iterations: 1000
  block_bytes: 2048
  report_every: 100
large:
  iterations: 3
mixed:
  iterations: 400
  small_block_bytes: 256
  large_block_bytes: 65536
  small_probability: 0.75
"#;

    #[test]
    fn test_full_config() {
        let config = ConfigLoader::load_string(FULL_CONFIG).unwrap();
        assert_eq!(config.heap_limit, HeapLimit::Bytes(512 * MIB));
        assert_eq!(config.relief_threshold, 0.8);
        assert_eq!(config.settle, Duration::from_millis(250));
        assert_eq!(config.seed, Some(42));

        assert_eq!(config.small.iterations, 1000);
        assert_eq!(config.small.report_every, 100);
        assert_eq!(config.small.sizes, SizePolicy::Fixed { bytes: 2048 });

        assert_eq!(config.large.iterations, 3);
        assert_eq!(config.large.report_every, 1);
        assert_eq!(config.large.retention, Retention::DropOldestEveryOther);

        assert_eq!(config.mixed.iterations, 400);
        assert_eq!(
            config.mixed.sizes,
            SizePolicy::Bimodal {
                small: 256,
                large: 65536,
                small_probability: 0.75,
            }
        );
    }

    #[test]
    fn test_defaults_applied() {
        let config = ConfigLoader::load_string("seed: 1\n").unwrap();
        assert_eq!(config.heap_limit, HeapLimit::Auto);
        assert_eq!(config.relief_threshold, 0.70);
        assert_eq!(config.settle, Duration::from_secs(1));
        assert_eq!(config.small, WorkloadSpec::small_objects());
        assert_eq!(config.large, WorkloadSpec::large_objects());
        assert_eq!(config.mixed, WorkloadSpec::mixed());
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = ConfigLoader::load_string("   \n").unwrap();
        assert_eq!(config.small.iterations, 500_000);
        assert_eq!(config.mixed.iterations, 250_000);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn test_heap_limit_keywords() {
        let config = ConfigLoader::load_string("heap_limit: unbounded\n").unwrap();
        assert_eq!(config.heap_limit, HeapLimit::Unbounded);

        let config = ConfigLoader::load_string("heap_limit: AUTO\n").unwrap();
        assert_eq!(config.heap_limit, HeapLimit::Auto);

        let config = ConfigLoader::load_string("heap_limit: 0\n").unwrap();
        assert_eq!(config.heap_limit, HeapLimit::Unbounded);

        assert!(ConfigLoader::load_string("heap_limit: lots\n").is_err());
        assert!(ConfigLoader::load_string("heap_limit: 4\n").is_err());
    }

    #[test]
    fn test_threshold_out_of_range() {
        assert!(ConfigLoader::load_string("relief_threshold: 0\n").is_err());
        assert!(ConfigLoader::load_string("relief_threshold: 1.5\n").is_err());
        assert!(ConfigLoader::load_string("relief_threshold: 1.0\n").is_ok());
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let yaml = r#"
small:
  iterations: 0
"#;
        let err = ConfigLoader::load_string(yaml).unwrap_err();
        assert!(matches!(err, BenchError::Validation(_)));
    }

    #[test]
    fn test_zero_cadence_rejected() {
        let yaml = r#"
mixed:
  report_every: 0
"#;
        assert!(ConfigLoader::load_string(yaml).is_err());
    }

    #[test]
    fn test_block_size_bounds() {
        assert!(ConfigLoader::load_string("large:\n  block_bytes: 0\n").is_err());
        assert!(ConfigLoader::load_string("large:\n  block_bytes: 2147483648\n").is_err());
    }

    #[test]
    fn test_probability_out_of_range() {
        assert!(ConfigLoader::load_string("mixed:\n  small_probability: 1.2\n").is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = ConfigLoader::load_string("warmup: 10\n").unwrap_err();
        assert!(matches!(err, BenchError::ConfigParse { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::load_file("/nonexistent/heapstress.yaml").unwrap_err();
        assert!(matches!(err, BenchError::ConfigNotFound { .. }));
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let config = ConfigLoader::load_string("seed: 99\n").unwrap();
        let mut a = config.rng();
        let mut b = config.rng();
        assert_eq!(a.next_u64(), b.next_u64());
    }
}
