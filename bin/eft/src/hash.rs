//! The `hash` subcommand: content hashes of filled fixtures.

use crate::{json_files, read_json, HashArgs, TestExecutor};
use alloy_primitives::B256;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// The fixture metadata key excluded from hashes.
const INFO_KEY: &str = "_info";

/// Hashes every fixture of a fixture file, in fixture id order.
///
/// Each fixture is hashed over its compact JSON with sorted keys and without its `_info`
/// metadata, so that refilling with another tool version keeps the hash stable.
pub fn hash_fixtures(file: &Value) -> Result<Vec<B256>> {
    let fixtures = file.as_object().ok_or_else(|| anyhow!("fixture file is not a JSON object"))?;
    let mut ids = fixtures.keys().collect::<Vec<_>>();
    ids.sort();
    ids.into_iter()
        .map(|id| {
            let mut fixture = fixtures[id].clone();
            if let Some(fixture) = fixture.as_object_mut() {
                fixture.remove(INFO_KEY);
            }
            let canonical = serde_json::to_vec(&fixture)?;
            Ok(B256::from_slice(&Sha256::digest(canonical)))
        })
        .collect()
}

/// Hashes the fixture hashes of every file, in path order.
pub fn cumulative_hash(hash_map: &BTreeMap<String, Vec<B256>>) -> B256 {
    let mut hasher = Sha256::new();
    for hash in hash_map.values().flatten() {
        hasher.update(hash);
    }
    B256::from_slice(&hasher.finalize())
}

/// The [HashRunner] hashes a directory of fixture files.
#[derive(Debug)]
pub struct HashRunner {
    args: HashArgs,
}

impl HashRunner {
    /// Create a new [HashRunner] instance.
    pub const fn new(args: HashArgs) -> Self {
        Self { args }
    }
}

#[async_trait]
impl TestExecutor for HashRunner {
    type Case = Value;
    type Output = Vec<B256>;

    async fn exec(&self) -> Result<()> {
        let mut hash_map = BTreeMap::new();
        for (path, file) in self.get_selected_cases().await? {
            let hashes = self.exec_single(path.clone(), file).await?;
            hash_map.insert(path, hashes);
        }

        let cumulative = cumulative_hash(&hash_map);
        info!(target: "cli", files = hash_map.len(), %cumulative, "Hashed fixtures");
        let report = json!({ "cumulative_hash": cumulative, "hash_map": hash_map });
        let report = serde_json::to_string_pretty(&report)?;
        match &self.args.output {
            Some(path) => tokio::fs::write(path, report)
                .await
                .with_context(|| format!("writing {}", path.display()))?,
            None => println!("{report}"),
        }
        Ok(())
    }

    async fn exec_single(&self, name: String, case: Self::Case) -> Result<Self::Output> {
        let hashes = hash_fixtures(&case).with_context(|| format!("hashing {name}"))?;
        debug!(target: "cli", name, fixtures = hashes.len(), "Hashed fixture file");
        Ok(hashes)
    }

    async fn get_selected_cases(&self) -> Result<Vec<(String, Self::Case)>> {
        let mut cases = Vec::new();
        for input in json_files(&self.args.input).await? {
            let value = read_json(&input.path).await?;
            cases.push((input.relative.display().to_string(), value));
        }
        Ok(cases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_is_ignored() {
        let a = json!({ "t": { "_info": { "filling-tool": "eft 0.1.0" }, "network": "Cancun" } });
        let b = json!({ "t": { "_info": { "filling-tool": "eft 0.2.0" }, "network": "Cancun" } });
        let c = json!({ "t": { "network": "Prague" } });
        assert_eq!(hash_fixtures(&a).unwrap(), hash_fixtures(&b).unwrap());
        assert_ne!(hash_fixtures(&a).unwrap(), hash_fixtures(&c).unwrap());
    }

    #[test]
    fn test_key_order_is_canonical() {
        let a: Value = serde_json::from_str(r#"{"t":{"a":1,"b":2}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"t":{"b":2,"a":1}}"#).unwrap();
        assert_eq!(hash_fixtures(&a).unwrap(), hash_fixtures(&b).unwrap());
        assert_eq!(
            hash_fixtures(&json!({ "t": {} })).unwrap(),
            vec![B256::from_slice(&Sha256::digest(b"{}"))]
        );
    }

    #[test]
    fn test_cumulative_hash() {
        let one = BTreeMap::from([("a.json".to_string(), vec![B256::repeat_byte(1)])]);
        let two = BTreeMap::from([
            ("a.json".to_string(), vec![B256::repeat_byte(1)]),
            ("b.json".to_string(), vec![B256::repeat_byte(2)]),
        ]);
        assert_ne!(cumulative_hash(&one), cumulative_hash(&two));
        assert_eq!(cumulative_hash(&BTreeMap::new()), B256::from_slice(&Sha256::digest(b"")));
    }

    #[test]
    fn test_not_an_object() {
        assert!(hash_fixtures(&json!([1, 2])).is_err());
    }
}
