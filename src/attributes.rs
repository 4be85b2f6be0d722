//! Attribute store - hierarchical node configuration
//!
//! Attributes live in three precedence layers (default < normal < override).
//! A dotted path such as `coupa.dns.id` resolves against the highest layer
//! that defines it: scalars replace, maps merge key by key.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

/// Nested attribute map
pub type AttrMap = BTreeMap<String, AttrValue>;

/// A single attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Integer(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Map(AttrMap),
}

impl AttrValue {
    /// Scalar value rendered as a string; maps have no string form
    pub fn as_string(&self) -> Option<String> {
        match self {
            Self::Integer(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Str(s) => Some(s.clone()),
            Self::Map(_) => None,
        }
    }

    pub fn as_map(&self) -> Option<&AttrMap> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_string() {
            Some(s) => write!(f, "{}", s),
            None => write!(f, "{{...}}"),
        }
    }
}

/// Precedence layer for writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precedence {
    Default = 0,
    Normal = 1,
    Override = 2,
}

/// Layered attribute store
#[derive(Debug, Clone, Default)]
pub struct AttributeStore {
    layers: [AttrMap; 3],
}

impl AttributeStore {
    /// Empty store with no defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the bootstrap defaults
    pub fn with_defaults() -> Result<Self> {
        let mut store = Self::new();
        let hostname = crate::identity::system_hostname();

        let defaults: &[(&str, AttrValue)] = &[
            ("coupa.deployment", "".into()),
            ("coupa.role", "coupa_base".into()),
            ("coupa.serverdomain", "coupadev.com".into()),
            ("coupa.nodename", hostname.clone().into()),
            // EBS volume settings
            ("coupa.vol.stripe_count", "0".into()),
            ("coupa.vol.iops", "0".into()),
            ("coupa.vol.size", "50".into()),
            // DNS registration
            ("coupa.dns.update", "none".into()),
            ("coupa.dns.id", "000000".into()),
            ("coupa.dns.provider", "DNSMadeEasy".into()),
            ("coupa.stack_release", "es4.4".into()),
            ("chef.server.db_pool_size", 50.into()),
            // Agent client
            ("chef.client.version", "12.5.1".into()),
            ("chef.client.config_dir", "/etc/chef".into()),
            ("chef.client.server_url", "".into()),
            ("chef.client.validation_name", "".into()),
            ("chef.client.validator_pem", "".into()),
            ("chef.client.node_name", hostname.into()),
            ("chef.client.log_level", "info".into()),
            (
                "chef.client.log_location",
                "/var/log/chef-client.log".into(),
            ),
            ("chef.client.environment", "".into()),
            ("chef.client.runlist_override", "".into()),
            ("chef.client.roles", "".into()),
            ("chef.client.company", "".into()),
            ("chef.client.data_bag_secret", "".into()),
            ("chef.client.strace", "false".into()),
            ("chef.client.run_timeout", 86_400.into()),
            (
                "chef.client.install_script_url",
                "https://omnitruck.chef.io/install.sh".into(),
            ),
            ("chef.client.api_client_gem.name", "right_api_client".into()),
            ("chef.client.api_client_gem.version", "1.5.26".into()),
        ];

        for (path, value) in defaults {
            store.set_at(Precedence::Default, path, value.clone())?;
        }
        Ok(store)
    }

    /// Write a value at `path` in the given layer
    pub fn set_at(
        &mut self,
        precedence: Precedence,
        path: &str,
        value: impl Into<AttrValue>,
    ) -> Result<()> {
        let segments = split_path(path)?;
        let layer = &mut self.layers[precedence as usize];
        insert_path(layer, &segments, value.into());
        Ok(())
    }

    /// Write a default-level value
    pub fn set_default(&mut self, path: &str, value: impl Into<AttrValue>) -> Result<()> {
        self.set_at(Precedence::Default, path, value)
    }

    /// Write a normal-level value (what the node itself records)
    pub fn set(&mut self, path: &str, value: impl Into<AttrValue>) -> Result<()> {
        self.set_at(Precedence::Normal, path, value)
    }

    /// Write an override-level value; wins over everything else
    pub fn override_value(&mut self, path: &str, value: impl Into<AttrValue>) -> Result<()> {
        self.set_at(Precedence::Override, path, value)
    }

    /// Resolve a path across all layers
    pub fn get(&self, path: &str) -> Option<AttrValue> {
        let segments = split_path(path).ok()?;
        self.layers
            .iter()
            .filter_map(|layer| lookup(layer, &segments))
            .fold(None, |acc, value| match (acc, value) {
                (Some(AttrValue::Map(mut base)), AttrValue::Map(top)) => {
                    deep_merge(&mut base, top);
                    Some(AttrValue::Map(base))
                }
                (_, value) => Some(value.clone()),
            })
    }

    /// Resolve a scalar as a string; `None` if unset or a map
    pub fn get_str(&self, path: &str) -> Option<String> {
        self.get(path).and_then(|v| v.as_string())
    }

    /// Resolve a scalar as a string, treating unset as empty
    pub fn str_or_empty(&self, path: &str) -> String {
        self.get_str(path).unwrap_or_default()
    }

    /// Resolve a non-negative integer (numeric strings accepted)
    pub fn get_u64(&self, path: &str) -> Result<Option<u64>> {
        match self.get(path) {
            None => Ok(None),
            Some(AttrValue::Integer(i)) => u64::try_from(i)
                .map(Some)
                .with_context(|| format!("{} must not be negative", path)),
            Some(AttrValue::Str(s)) => s
                .trim()
                .parse::<u64>()
                .map(Some)
                .with_context(|| format!("{} is not an integer: {:?}", path, s)),
            Some(other) => bail!("{} is not an integer: {}", path, other),
        }
    }

    /// Merged view of a subtree (empty if unset or scalar)
    pub fn subtree(&self, path: &str) -> AttrMap {
        match self.get(path) {
            Some(AttrValue::Map(m)) => m,
            _ => AttrMap::new(),
        }
    }

    /// Merged view of every layer
    pub fn merged(&self) -> AttrMap {
        let mut merged = AttrMap::new();
        for layer in &self.layers {
            deep_merge(&mut merged, layer);
        }
        merged
    }

    /// Merge a TOML attribute file into the normal layer
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read attribute file: {}", path.display()))?;
        let map: AttrMap = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in attribute file: {}", path.display()))?;
        deep_merge(&mut self.layers[Precedence::Normal as usize], &map);
        log::debug!("Loaded attributes from {}", path.display());
        Ok(())
    }

    /// Apply a `dotted.path=value` assignment at override level
    pub fn apply_assignment(&mut self, assignment: &str) -> Result<()> {
        let (path, value) = assignment
            .split_once('=')
            .with_context(|| format!("Expected KEY=VALUE, got {:?}", assignment))?;
        self.override_value(path.trim(), value.to_string())
    }
}

fn split_path(path: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        bail!("Invalid attribute path: {:?}", path);
    }
    Ok(segments)
}

fn lookup<'m>(map: &'m AttrMap, segments: &[&str]) -> Option<&'m AttrValue> {
    let (first, rest) = segments.split_first()?;
    let value = map.get(*first)?;
    if rest.is_empty() {
        Some(value)
    } else {
        lookup(value.as_map()?, rest)
    }
}

fn insert_path(map: &mut AttrMap, segments: &[&str], value: AttrValue) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        map.insert((*first).to_string(), value);
        return;
    }
    let entry = map
        .entry((*first).to_string())
        .or_insert_with(|| AttrValue::Map(AttrMap::new()));
    if !matches!(entry, AttrValue::Map(_)) {
        *entry = AttrValue::Map(AttrMap::new());
    }
    if let AttrValue::Map(child) = entry {
        insert_path(child, rest, value);
    }
}

fn deep_merge(base: &mut AttrMap, top: &AttrMap) {
    for (key, value) in top {
        match (base.get_mut(key), value) {
            (Some(AttrValue::Map(base_child)), AttrValue::Map(top_child)) => {
                deep_merge(base_child, top_child);
            }
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_present() {
        let store = AttributeStore::with_defaults().unwrap();
        assert_eq!(store.get_str("coupa.stack_release").unwrap(), "es4.4");
        assert_eq!(store.get_str("coupa.dns.provider").unwrap(), "DNSMadeEasy");
        assert_eq!(store.get_u64("chef.server.db_pool_size").unwrap(), Some(50));
        assert_eq!(store.get_u64("chef.client.run_timeout").unwrap(), Some(86_400));
        assert!(store.get("chef.client.ca_file").is_none());
    }

    #[test]
    fn test_later_layer_replaces_scalar() {
        let mut store = AttributeStore::new();
        store.set_default("coupa.role", "coupa_base").unwrap();
        store.set("coupa.role", "web").unwrap();
        assert_eq!(store.get_str("coupa.role").unwrap(), "web");

        store.override_value("coupa.role", "web,db").unwrap();
        assert_eq!(store.get_str("coupa.role").unwrap(), "web,db");

        // A lower layer write never beats a higher one
        store.set("coupa.role", "ignored").unwrap();
        assert_eq!(store.get_str("coupa.role").unwrap(), "web,db");
    }

    #[test]
    fn test_maps_merge_key_by_key() {
        let mut store = AttributeStore::new();
        store.set_default("coupa.dns.id", "000000").unwrap();
        store.set_default("coupa.dns.provider", "DNSMadeEasy").unwrap();
        store.override_value("coupa.dns.id", "123456").unwrap();

        let dns = store.subtree("coupa.dns");
        assert_eq!(dns.get("id"), Some(&AttrValue::from("123456")));
        assert_eq!(dns.get("provider"), Some(&AttrValue::from("DNSMadeEasy")));
    }

    #[test]
    fn test_scalar_over_map_replaces() {
        let mut store = AttributeStore::new();
        store.set_default("coupa.vol.size", "50").unwrap();
        store.override_value("coupa.vol", "none").unwrap();
        assert_eq!(store.get_str("coupa.vol").unwrap(), "none");
        assert!(store.get("coupa.vol.size").is_some(), "default layer still holds it");
    }

    #[test]
    fn test_get_str_on_map_is_none() {
        let store = AttributeStore::with_defaults().unwrap();
        assert!(store.get_str("coupa.dns").is_none());
        assert_eq!(store.str_or_empty("chef.client.ca_file"), "");
    }

    #[test]
    fn test_invalid_paths() {
        let mut store = AttributeStore::new();
        assert!(store.set("coupa..role", "x").is_err());
        assert!(store.set("", "x").is_err());
        assert!(store.get("a..b").is_none());
    }

    #[test]
    fn test_apply_assignment() {
        let mut store = AttributeStore::with_defaults().unwrap();
        store
            .apply_assignment("chef.client.environment=prod")
            .unwrap();
        store
            .apply_assignment("chef.client.roles = web, db")
            .unwrap();
        assert_eq!(store.get_str("chef.client.environment").unwrap(), "prod");
        assert_eq!(store.get_str("chef.client.roles").unwrap(), " web, db");
        assert!(store.apply_assignment("no-equals-sign").is_err());
    }

    #[test]
    fn test_get_u64_parses_strings() {
        let mut store = AttributeStore::new();
        store.set("chef.client.run_timeout", "3600").unwrap();
        assert_eq!(store.get_u64("chef.client.run_timeout").unwrap(), Some(3600));

        store.set("chef.client.run_timeout", "soon").unwrap();
        assert!(store.get_u64("chef.client.run_timeout").is_err());

        store.set("chef.client.run_timeout", -5).unwrap();
        assert!(store.get_u64("chef.client.run_timeout").is_err());
    }

    #[test]
    fn test_load_file_into_normal_layer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("node.toml");
        fs::write(
            &path,
            r#"
[chef.client]
version = "12.19.36"
roles = "base, web"
run_timeout = 600

[coupa.dns]
id = "424242"
"#,
        )
        .unwrap();

        let mut store = AttributeStore::with_defaults().unwrap();
        store.load_file(&path).unwrap();

        assert_eq!(store.get_str("chef.client.version").unwrap(), "12.19.36");
        assert_eq!(store.get_u64("chef.client.run_timeout").unwrap(), Some(600));
        assert_eq!(store.get_str("coupa.dns.id").unwrap(), "424242");
        assert_eq!(store.get_str("coupa.dns.provider").unwrap(), "DNSMadeEasy");
    }

    #[test]
    fn test_load_file_rejects_bad_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "chef = [").unwrap();

        let mut store = AttributeStore::new();
        assert!(store.load_file(&path).is_err());
    }

    #[test]
    fn test_merged_serializes_to_json() {
        let store = AttributeStore::with_defaults().unwrap();
        let json = serde_json::to_value(store.merged()).unwrap();
        assert_eq!(json["coupa"]["vol"]["size"], "50");
        assert_eq!(json["chef"]["server"]["db_pool_size"], 50);
    }
}
