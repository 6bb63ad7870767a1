//! Random log documents for load-testing a collection

use chrono::{SecondsFormat, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use solrfeed_domain::{GeneratorConfig, Record};
use uuid::Uuid;

/// Upper bound (exclusive) for numeric fields
const NUMERIC_FIELD_MAX: u32 = 3000;

pub struct RecordGenerator {
    config: GeneratorConfig,
    rng: StdRng,
}

impl RecordGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config, rng: StdRng::from_entropy() }
    }

    /// Reproducible field values (ids and timestamps still vary)
    pub fn seeded(config: GeneratorConfig, seed: u64) -> Self {
        Self { config, rng: StdRng::seed_from_u64(seed) }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn next_record(&mut self) -> Record {
        let cfg = &self.config;
        let rng = &mut self.rng;

        let mut record = Record::new()
            .with("id", Uuid::new_v4().to_string())
            .with(
                &cfg.cluster_field,
                format!("cluster{}", rng.gen_range(0..cfg.cluster_count.max(1))),
            )
            .with(
                &cfg.filterable_field,
                format!("random-name-{}", rng.gen_range(0..cfg.filterable_count.max(1))),
            )
            .with(&cfg.date_field, Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true));

        if let Some(level) = cfg.levels.choose(rng) {
            record.insert(&cfg.level_field, level.as_str());
        }
        if let Some(kind) = cfg.types.choose(rng) {
            record.insert(&cfg.type_field, kind.as_str());
        }
        for field in &cfg.message_fields {
            record.insert(field, format!("Random message: {}", Uuid::new_v4()));
        }
        for field in &cfg.numeric_fields {
            record.insert(field, rng.gen_range(0..NUMERIC_FIELD_MAX));
        }

        record
    }
}

impl Iterator for RecordGenerator {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        Some(self.next_record())
    }
}
