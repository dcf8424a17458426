use crate::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_MAX_ITERATIONS: usize = 3000;
pub const DEFAULT_SPLIT_MARKER: &str = "[拆]";
pub const DEFAULT_CLASSMATE_PATTERN: &str = r"(?:與|和|跟|同)\s*([^\s,，。、]+?)\s*同組";
pub const DEFAULT_SYNTHETIC_ID_BASE: u64 = 900_000;

/// How the per-leader target load is derived from a bucket's population.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AverageFormula {
    /// `floor((total + waiting) / leaders)`.
    #[default]
    Grouped,
    /// `total + floor(waiting / leaders)`, the historical precedence.
    Literal,
}

impl AverageFormula {
    pub fn compute(self, total: usize, waiting: usize, leaders: usize) -> usize {
        if leaders == 0 {
            return 0;
        }
        match self {
            AverageFormula::Grouped => (total + waiting) / leaders,
            AverageFormula::Literal => total + waiting / leaders,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Safety valve for the balancing loop.
    pub max_iterations: usize,
    pub average: AverageFormula,
    /// Fixed capacity target per leader; replaces the computed average when set.
    pub target_load: Option<usize>,
    pub split_marker: String,
    /// Remark pattern for "put me with <name>" requests. Capture group 1 is the peer name.
    pub classmate_pattern: String,
    /// First id handed to newcomers that arrive without one.
    pub synthetic_id_base: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            average: AverageFormula::default(),
            target_load: None,
            split_marker: DEFAULT_SPLIT_MARKER.to_string(),
            classmate_pattern: DEFAULT_CLASSMATE_PATTERN.to_string(),
            synthetic_id_base: DEFAULT_SYNTHETIC_ID_BASE,
        }
    }
}

impl DispatchConfig {
    /// Builds a config from a (possibly partial) JSON object merged onto the defaults.
    pub fn from_value(value: &Value) -> Result<Self> {
        let mut base = Self::default().to_value()?;
        deep_merge_value(&mut base, value);
        Self::from_merged(base)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| Error::InvalidConfig {
            message: e.to_string(),
        })?;
        Self::from_value(&value)
    }

    /// Applies a single `a.b.c = value` override.
    pub fn with_override(self, dotted_path: &str, value: Value) -> Result<Self> {
        let mut root = self.to_value()?;
        set_value(&mut root, dotted_path, value);
        Self::from_merged(root)
    }

    pub fn classmate_regex(&self) -> Result<Regex> {
        Ok(Regex::new(&self.classmate_pattern)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(Error::InvalidConfig {
                message: "max_iterations must be positive".to_string(),
            });
        }
        if self.target_load == Some(0) {
            return Err(Error::InvalidConfig {
                message: "target_load must be positive when set".to_string(),
            });
        }
        let re = self.classmate_regex()?;
        if re.captures_len() < 2 {
            return Err(Error::InvalidConfig {
                message: "classmate_pattern needs a capture group for the peer name".to_string(),
            });
        }
        Ok(())
    }

    fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| Error::InvalidConfig {
            message: e.to_string(),
        })
    }

    fn from_merged(value: Value) -> Result<Self> {
        let cfg: Self = serde_json::from_value(value).map_err(|e| Error::InvalidConfig {
            message: e.to_string(),
        })?;
        cfg.validate()?;
        tracing::debug!(?cfg, "dispatch config loaded");
        Ok(cfg)
    }
}

fn set_value(root: &mut Value, dotted_path: &str, value: Value) {
    if !root.is_object() {
        *root = Value::Object(Map::new());
    }
    let Value::Object(map) = root else {
        return;
    };
    let mut cur: &mut Map<String, Value> = map;
    let mut segments = dotted_path.split('.').peekable();
    while let Some(seg) = segments.next() {
        if segments.peek().is_none() {
            cur.insert(seg.to_string(), value);
            return;
        }
        let slot = cur.entry(seg).or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Some(next) = slot.as_object_mut() else {
            return;
        };
        cur = next;
    }
}

fn deep_merge_value(base: &mut Value, incoming: &Value) {
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(in_map)) => {
            for (key, in_value) in in_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge_value(base_value, in_value),
                    None => {
                        base_map.insert(key.clone(), in_value.clone());
                    }
                }
            }
        }
        (base_slot, in_value) => {
            *base_slot = in_value.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_object_keeps_defaults() {
        let cfg = DispatchConfig::from_value(&json!({ "target_load": 12 })).unwrap();
        assert_eq!(cfg.target_load, Some(12));
        assert_eq!(cfg.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert_eq!(cfg.split_marker, DEFAULT_SPLIT_MARKER);
    }

    #[test]
    fn override_by_dotted_path() {
        let cfg = DispatchConfig::default()
            .with_override("average", json!("literal"))
            .unwrap();
        assert_eq!(cfg.average, AverageFormula::Literal);
    }

    #[test]
    fn rejects_pattern_without_capture_group() {
        let err =
            DispatchConfig::from_value(&json!({ "classmate_pattern": "同組" })).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn rejects_broken_pattern() {
        let err =
            DispatchConfig::from_value(&json!({ "classmate_pattern": "(" })).unwrap_err();
        assert!(matches!(err, Error::InvalidPattern(_)));
    }

    #[test]
    fn average_formulas_differ_in_precedence() {
        assert_eq!(AverageFormula::Grouped.compute(30, 3, 3), 11);
        assert_eq!(AverageFormula::Literal.compute(30, 3, 3), 31);
        assert_eq!(AverageFormula::Grouped.compute(5, 0, 0), 0);
    }

    #[test]
    fn default_pattern_captures_peer_name() {
        let re = DispatchConfig::default().classmate_regex().unwrap();
        let caps = re.captures("希望與陳小明同組").unwrap();
        assert_eq!(&caps[1], "陳小明");
    }
}
