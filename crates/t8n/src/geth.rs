//! A transition tool backed by a geth style `evm` binary.

use crate::{
    debug::DebugDump,
    types::T8nInput,
    T8nError, T8nOutput, T8nRequest, T8nResult, TransitionTool, TreeKeyResolver,
};
use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use eft_primitives::{Alloc, TreeKey, VerkleTree};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    process::{Output, Stdio},
    str::FromStr,
};
use tokio::{
    io::AsyncWriteExt,
    process::{ChildStdin, Command},
};
use tracing::{debug, error, trace};

/// The number of characters of unparseable tool output kept in errors.
const MAX_OUTPUT_EXCERPT: usize = 1024;

/// Runs the `evm t8n` subcommand of a geth style binary, and its `verkle` helpers.
#[derive(Debug, Clone)]
pub struct GethTransitionTool {
    binary: PathBuf,
    trace: bool,
}

impl GethTransitionTool {
    /// Creates a tool running `binary`.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into(), trace: false }
    }

    /// Enables per-transaction execution traces.
    pub const fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Returns the tool binary.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn t8n_args(&self, request: &T8nRequest, basedir: Option<&Path>) -> Vec<String> {
        let mut args = vec![
            "t8n".to_string(),
            "--input.alloc=stdin".to_string(),
            "--input.txs=stdin".to_string(),
            "--input.env=stdin".to_string(),
            "--output.result=stdout".to_string(),
            "--output.alloc=stdout".to_string(),
            format!("--state.fork={}", request.fork),
            format!("--state.chainid={}", request.chain_id),
            format!("--state.reward={}", request.reward),
        ];
        if request.vkt.is_some() {
            args.push("--input.vkt=stdin".to_string());
            args.push("--output.vkt=stdout".to_string());
        }
        if self.trace {
            args.push("--trace".to_string());
        }
        if let Some(basedir) = basedir {
            args.push(format!("--output.basedir={}", basedir.display()));
        }
        args
    }

    async fn run(&self, args: &[String], stdin: Option<Vec<u8>>) -> T8nResult<Output> {
        trace!(target: "t8n", "Running {} {}", self.binary.display(), args.join(" "));
        let mut child = Command::new(&self.binary)
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| T8nError::Spawn { path: self.binary.clone(), source })?;

        // The input is fed while the output is drained, so that neither pipe fills up.
        let pipe = child.stdin.take();
        let (written, output) = tokio::join!(feed(pipe, stdin), child.wait_with_output());
        let output = output?;
        if let Err(e) = written {
            // A tool exiting early closes its end. Its exit status tells the rest.
            if output.status.success() || e.kind() != ErrorKind::BrokenPipe {
                return Err(e.into());
            }
            debug!(target: "t8n", "Transition tool closed its input early: {e}");
        }
        Ok(output)
    }

    async fn run_checked(&self, args: &[String]) -> T8nResult<String> {
        let output = self.run(args, None).await?;
        if !output.status.success() {
            return Err(T8nError::Process {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn run_with_alloc(&self, subcommand: &str, alloc: &Alloc) -> T8nResult<String> {
        let scratch = tempfile::tempdir()?;
        let path = scratch.path().join("alloc.json");
        tokio::fs::write(&path, serde_json::to_vec(alloc)?).await?;
        self.run_checked(&[
            "verkle".to_string(),
            subcommand.to_string(),
            format!("--input.alloc={}", path.display()),
        ])
        .await
    }
}

/// Writes `input` to the standard input of a child process, then closes it.
async fn feed(pipe: Option<ChildStdin>, input: Option<Vec<u8>>) -> std::io::Result<()> {
    if let (Some(mut pipe), Some(input)) = (pipe, input) {
        pipe.write_all(&input).await?;
        pipe.shutdown().await?;
    }
    Ok(())
}

/// Returns the leading [MAX_OUTPUT_EXCERPT] characters of a process output.
fn excerpt(output: &[u8]) -> String {
    let output = String::from_utf8_lossy(output);
    match output.char_indices().nth(MAX_OUTPUT_EXCERPT) {
        Some((end, _)) => format!("{}... ({} bytes)", &output[..end], output.len()),
        None => output.into_owned(),
    }
}

fn parse_key(output: &str) -> T8nResult<B256> {
    let key = output.lines().last().unwrap_or_default().trim();
    B256::from_str(key).map_err(|_| T8nError::UnexpectedOutput(output.to_string()))
}

#[async_trait]
impl TransitionTool for GethTransitionTool {
    async fn evaluate(&self, request: T8nRequest) -> T8nResult<T8nOutput> {
        let dump = match &request.debug_dir {
            Some(dir) => Some(DebugDump::create(dir).await?),
            None => None,
        };
        let scratch = if self.trace && dump.is_none() { Some(tempfile::tempdir()?) } else { None };
        let basedir = dump
            .as_ref()
            .map(|d| d.path().join("output"))
            .or_else(|| scratch.as_ref().map(|s| s.path().to_path_buf()));

        let args = self.t8n_args(&request, basedir.as_deref());
        let input = T8nInput {
            alloc: &request.alloc,
            env: &request.env,
            txs_rlp: alloy_rlp::encode(&request.txs).into(),
            vkt: request.vkt.as_ref(),
        };
        let stdin = serde_json::to_vec(&input)?;

        if let Some(dump) = &dump {
            dump.write_json("input/alloc.json", input.alloc).await?;
            dump.write_json("input/env.json", input.env).await?;
            dump.write_json("input/txs.rlp", &input.txs_rlp).await?;
            dump.write("args.txt", args.join(" ")).await?;
            dump.write("t8n.sh", dump.replay_script(&self.binary, &args)).await?;
        }

        debug!(
            target: "t8n",
            "Evaluating block {} ({} transactions) with fork {}",
            request.env.number,
            request.txs.len(),
            request.fork
        );
        let output = self.run(&args, Some(stdin)).await?;

        if let Some(dump) = &dump {
            dump.write("stderr.txt", &output.stderr).await?;
            dump.write("returncode.txt", output.status.code().unwrap_or(-1).to_string()).await?;
            dump.write("stdout.txt", &output.stdout).await?;
        }

        if !output.status.success() {
            return Err(T8nError::Process {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let mut parsed: T8nOutput = match serde_json::from_slice(&output.stdout) {
            Ok(parsed) => parsed,
            Err(source) => {
                let stdout = excerpt(&output.stdout);
                error!(target: "t8n", "Failed to parse transition tool output: {source}\n{stdout}");
                return Err(T8nError::MalformedOutput { source, stdout });
            }
        };
        if let Some(dump) = &dump {
            dump.write_json("output/alloc.json", &parsed.alloc).await?;
            dump.write_json("output/result.json", &parsed.result).await?;
        }
        if self.trace {
            if let Some(dir) = &basedir {
                parsed.traces = read_traces(dir).await?;
            }
        }
        Ok(parsed)
    }
}

/// Reads the `trace-*.jsonl` files written by the tool, in file name order.
async fn read_traces(dir: &Path) -> T8nResult<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("trace-") && name.ends_with(".jsonl") {
            paths.push(entry.path());
        }
    }
    paths.sort();

    let mut traces = Vec::with_capacity(paths.len());
    for path in paths {
        traces.push(tokio::fs::read_to_string(path).await?);
    }
    Ok(traces)
}

#[async_trait]
impl TreeKeyResolver for GethTransitionTool {
    async fn single_key(&self, address: Address, slot: Option<U256>) -> T8nResult<TreeKey> {
        let mut args = vec!["verkle".to_string(), "single-key".to_string(), address.to_string()];
        if let Some(slot) = slot {
            args.push(format!("{slot:#x}"));
        }
        parse_key(&self.run_checked(&args).await?)
    }

    async fn code_chunk_key(&self, address: Address, chunk: u64) -> T8nResult<TreeKey> {
        let args = [
            "verkle".to_string(),
            "code-chunk-key".to_string(),
            address.to_string(),
            chunk.to_string(),
        ];
        parse_key(&self.run_checked(&args).await?)
    }

    async fn state_root(&self, alloc: &Alloc) -> T8nResult<B256> {
        parse_key(&self.run_with_alloc("state-root", alloc).await?)
    }

    async fn mpt_to_vkt(&self, alloc: &Alloc) -> T8nResult<VerkleTree> {
        Ok(serde_json::from_str(&self.run_with_alloc("tree-keys", alloc).await?)?)
    }
}
