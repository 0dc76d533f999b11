//! The `fill` subcommand: turns test descriptions into fixture files.

use crate::{json_files, read_json, FillArgs, TestExecutor};
use anyhow::{ensure, Context, Result};
use async_trait::async_trait;
use eft_filler::{BlockchainFiller, BlockchainTest, FillerConfig};
use eft_t8n::{TransitionTool, TreeKeyResolver};
use futures::{stream, StreamExt};
use serde_json::Value;
use std::{collections::BTreeMap, path::PathBuf, sync::Arc};
use tracing::{debug, error, info, warn};

/// The output subdirectory of replay fixtures.
pub const BLOCKCHAIN_TESTS_DIR: &str = "blockchain_tests";

/// The output subdirectory of engine fixtures.
pub const ENGINE_TESTS_DIR: &str = "blockchain_tests_engine";

/// A test description and the input file it was read from.
#[derive(Debug, Clone)]
pub struct FillCase {
    /// The input file, relative to the input root.
    pub file: PathBuf,
    /// The test description.
    pub test: BlockchainTest,
}

/// The fixtures generated for one test.
#[derive(Debug, Clone, Default)]
pub struct FilledCase {
    /// The input file, relative to the input root.
    pub file: PathBuf,
    /// The replay fixture, keyed by its fixture id.
    pub blockchain: Option<(String, Value)>,
    /// The engine fixture, keyed by its fixture id.
    pub engine: Option<(String, Value)>,
}

/// Fixture files keyed by output path, each mapping fixture ids to fixtures.
type FixtureFiles = BTreeMap<PathBuf, BTreeMap<String, Value>>;

/// The [FillRunner] fills test descriptions concurrently against one transition tool.
#[derive(Debug)]
pub struct FillRunner<T>
where
    T: TransitionTool + TreeKeyResolver,
{
    args: FillArgs,
    filler: BlockchainFiller<T>,
}

impl<T> FillRunner<T>
where
    T: TransitionTool + TreeKeyResolver,
{
    /// Create a new [FillRunner] instance.
    pub fn new(args: FillArgs, tool: Arc<T>) -> Self {
        let config = FillerConfig {
            chain_id: args.chain_id,
            eips: args.eips.clone(),
            debug_dir: args.debug_dir.clone(),
            ..Default::default()
        };
        let filler = BlockchainFiller::new(tool, args.fork, config);
        Self { args, filler }
    }

    /// Returns the fixture id of the test `name` in `format`.
    pub fn fixture_id(&self, name: &str, format: &str) -> String {
        format!("{name}[fork_{}-{format}]", self.filler.network())
    }

    /// Returns `true` if the genesis fork of the schedule has an engine API.
    fn engine_supported(&self) -> bool {
        self.filler.schedule().engine_new_payload_version(0, 0).is_some()
    }

    async fn write(&self, files: FixtureFiles) -> Result<()> {
        for (path, fixtures) in files {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let json = serde_json::to_string_pretty(&fixtures)?;
            tokio::fs::write(&path, json)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!(target: "cli", path = %path.display(), fixtures = fixtures.len(), "Wrote fixtures");
        }
        Ok(())
    }
}

#[async_trait]
impl<T> TestExecutor for FillRunner<T>
where
    T: TransitionTool + TreeKeyResolver,
{
    type Case = FillCase;
    type Output = FilledCase;

    async fn exec(&self) -> Result<()> {
        let cases = self.get_selected_cases().await?;
        let total = cases.len();
        info!(target: "cli", tests = total, jobs = self.args.jobs, network = %self.filler.network(), "Filling tests");

        let results = stream::iter(cases)
            .map(|(name, case)| async move {
                let result = self.exec_single(name.clone(), case).await;
                (name, result)
            })
            .buffer_unordered(self.args.jobs.max(1))
            .collect::<Vec<_>>()
            .await;

        let mut files = FixtureFiles::new();
        let mut failed = 0;
        for (name, result) in results {
            let filled = match result {
                Ok(filled) => filled,
                Err(e) => {
                    error!(target: "cli", name, "Failed to fill test: {e:#}");
                    failed += 1;
                    continue;
                }
            };
            if let Some((id, fixture)) = filled.blockchain {
                let path = self.args.output.join(BLOCKCHAIN_TESTS_DIR).join(&filled.file);
                files.entry(path).or_default().insert(id, fixture);
            }
            if let Some((id, fixture)) = filled.engine {
                let path = self.args.output.join(ENGINE_TESTS_DIR).join(&filled.file);
                files.entry(path).or_default().insert(id, fixture);
            }
        }

        self.write(files).await?;
        ensure!(failed == 0, "{failed} of {total} tests failed");
        info!(target: "cli", tests = total, "Filled all tests");
        Ok(())
    }

    async fn exec_single(&self, name: String, case: Self::Case) -> Result<Self::Output> {
        info!(target: "cli", "Filling test: {}", name);
        let mut filled = FilledCase { file: case.file, ..Default::default() };

        if self.args.format.blockchain() {
            let fixture = self
                .filler
                .fill_blockchain(&name, &case.test)
                .await
                .with_context(|| format!("filling blockchain test {name}"))?;
            filled.blockchain =
                Some((self.fixture_id(&name, "blockchain_test"), serde_json::to_value(fixture)?));
        }

        if self.args.format.engine() {
            if self.engine_supported() {
                let fixture = self
                    .filler
                    .fill_engine(&name, &case.test)
                    .await
                    .with_context(|| format!("filling engine test {name}"))?;
                filled.engine = Some((
                    self.fixture_id(&name, "blockchain_test_engine"),
                    serde_json::to_value(fixture)?,
                ));
            } else {
                warn!(target: "cli", name, "Skipping engine fixture of a pre-merge fork");
            }
        }

        debug!(target: "cli", "Filled test: {}", name);
        Ok(filled)
    }

    async fn get_selected_cases(&self) -> Result<Vec<(String, Self::Case)>> {
        let mut cases = Vec::new();
        for input in json_files(&self.args.input).await? {
            let tests: BTreeMap<String, BlockchainTest> = read_json(&input.path).await?;
            for (name, test) in tests {
                if self.args.test.as_ref().is_some_and(|selected| *selected != name) {
                    continue;
                }
                cases.push((name, FillCase { file: input.relative.clone(), test }));
            }
        }

        if let Some(test) = &self.args.test {
            ensure!(!cases.is_empty(), "Test not found: {test}");
        }
        debug!(target: "cli", "Selected tests: {:?}", cases.iter().map(|(n, _)| n).collect::<Vec<_>>());
        Ok(cases)
    }
}
