//! Config-driven format detection.
//!
//! The registry configuration is YAML: an ordered `parsers` mapping of
//! parser name → trigger list, plus a `default_parser`. Detection walks
//! parsers in file order and, within a parser, triggers in list order. The
//! first trigger that matches selects its parser, so a record matching two
//! parsers resolves to whichever is listed first.
//!
//! ```yaml
//! parsers:
//!   syslog:
//!     triggers:
//!       - type: text
//!         contains: ["sshd", "CRON"]
//!   windows:
//!     triggers:
//!       - type: dict_keys
//!         keys: [EventID]
//! default_parser: network
//! ```

use std::path::Path;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use driftlog_core::RawRecord;

use crate::error::{IngestError, Result};

use super::{
    CloudTrailParser, NetworkParser, ParsedFields, Parser, SyslogParser, WindowsParser,
};

/// Configuration shipped with the crate, used when no file is configured.
pub const EMBEDDED_CONFIG: &str = include_str!("../../config/parsers.yml");

fn default_parser_name() -> String {
    "syslog".to_string()
}

// ── Configuration ───────────────────────────────────────────────────

/// One detection rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerRule {
    /// Text records containing any of the substrings.
    Text {
        #[serde(default)]
        contains: Vec<String>,
    },
    /// Text records where the pattern matches anywhere.
    Regex { pattern: String },
    /// Mapping records holding every listed key.
    DictKeys {
        #[serde(default)]
        keys: Vec<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParserRules {
    #[serde(default)]
    pub triggers: Vec<TriggerRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Parser name → rules, in evaluation order.
    #[serde(default)]
    pub parsers: IndexMap<String, ParserRules>,
    #[serde(default = "default_parser_name")]
    pub default_parser: String,
}

impl RegistryConfig {
    pub fn new(default_parser: &str) -> Self {
        Self {
            parsers: IndexMap::new(),
            default_parser: default_parser.to_string(),
        }
    }

    /// Append a parser with its triggers after the ones already configured.
    pub fn with_parser(mut self, name: &str, triggers: Vec<TriggerRule>) -> Self {
        self.parsers.insert(name.to_string(), ParserRules { triggers });
        self
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    pub fn embedded() -> Result<Self> {
        Self::from_yaml_str(EMBEDDED_CONFIG)
    }
}

// ── Registry ────────────────────────────────────────────────────────

enum Trigger {
    Text(Vec<String>),
    Regex(Regex),
    DictKeys(Vec<String>),
}

impl Trigger {
    fn matches(&self, record: &RawRecord) -> bool {
        match (self, record) {
            (Trigger::Text(needles), RawRecord::Text(line)) => {
                needles.iter().any(|n| line.contains(n.as_str()))
            }
            (Trigger::Regex(re), RawRecord::Text(line)) => re.is_match(line),
            (Trigger::DictKeys(keys), RawRecord::Mapping(map)) => {
                keys.iter().all(|k| map.contains_key(k))
            }
            _ => false,
        }
    }
}

/// The built-in parsers, keyed by name.
pub fn builtin_parsers() -> IndexMap<String, Box<dyn Parser>> {
    let parsers: Vec<Box<dyn Parser>> = vec![
        Box::new(SyslogParser),
        Box::new(WindowsParser),
        Box::new(CloudTrailParser),
        Box::new(NetworkParser),
    ];
    parsers
        .into_iter()
        .map(|p| (p.name().to_string(), p))
        .collect()
}

/// Detects a record's format and dispatches to the matching parser.
pub struct ParserRegistry {
    rules: Vec<(String, Vec<Trigger>)>,
    default_parser: String,
    parsers: IndexMap<String, Box<dyn Parser>>,
}

impl ParserRegistry {
    /// Build a registry over the built-in parsers.
    pub fn new(config: RegistryConfig) -> Result<Self> {
        Self::with_parsers(config, builtin_parsers())
    }

    /// Build a registry over a custom name → parser table. Every parser the
    /// config names, including the default, must be present in the table.
    pub fn with_parsers(
        config: RegistryConfig,
        parsers: IndexMap<String, Box<dyn Parser>>,
    ) -> Result<Self> {
        if !parsers.contains_key(&config.default_parser) {
            return Err(IngestError::UnknownParser(config.default_parser));
        }

        let mut rules = Vec::with_capacity(config.parsers.len());
        for (name, entry) in config.parsers {
            if !parsers.contains_key(&name) {
                return Err(IngestError::UnknownParser(name));
            }
            let mut triggers = Vec::with_capacity(entry.triggers.len());
            for rule in entry.triggers {
                triggers.push(match rule {
                    TriggerRule::Text { contains } => Trigger::Text(contains),
                    TriggerRule::Regex { pattern } => {
                        let re = Regex::new(&pattern).map_err(|source| IngestError::Pattern {
                            parser: name.clone(),
                            source,
                        })?;
                        Trigger::Regex(re)
                    }
                    TriggerRule::DictKeys { keys } => Trigger::DictKeys(keys),
                });
            }
            rules.push((name, triggers));
        }

        info!(
            parsers = rules.len(),
            default = %config.default_parser,
            "parser registry loaded"
        );

        Ok(Self {
            rules,
            default_parser: config.default_parser,
            parsers,
        })
    }

    /// Registry from the embedded default configuration.
    pub fn embedded() -> Result<Self> {
        Self::new(RegistryConfig::embedded()?)
    }

    /// Name of the parser for `record`: the first matching trigger wins,
    /// otherwise the configured default.
    pub fn detect_type(&self, record: &RawRecord) -> &str {
        self.rules
            .iter()
            .find(|(_, triggers)| triggers.iter().any(|t| t.matches(record)))
            .map(|(name, _)| name.as_str())
            .unwrap_or(&self.default_parser)
    }

    pub fn get_parser(&self, name: &str) -> Option<&dyn Parser> {
        self.parsers.get(name).map(|p| p.as_ref())
    }

    /// Detect, parse and project one record. The raw payload and the parser
    /// name are attached to the result.
    pub fn parse(&self, record: &RawRecord) -> ParsedFields {
        let name = self.detect_type(record);
        let mut fields = match self.get_parser(name) {
            Some(parser) => parser.parse(record).project(),
            None => ParsedFields::default(),
        };
        debug!(parser = name, "record parsed");
        fields.source = Some(name.to_string());
        fields.raw = record.to_value();
        fields
    }
}
