//! Debug artefacts of transition tool calls.

use crate::T8nResult;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::trace;

/// The scratch directory of one transition tool call.
#[derive(Debug, Clone)]
pub(crate) struct DebugDump {
    dir: PathBuf,
}

impl DebugDump {
    /// Creates the directory layout of a call.
    pub(crate) async fn create(dir: &Path) -> T8nResult<Self> {
        tokio::fs::create_dir_all(dir.join("input")).await?;
        tokio::fs::create_dir_all(dir.join("output")).await?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.dir
    }

    /// Writes a file relative to the call directory.
    pub(crate) async fn write(&self, name: &str, contents: impl AsRef<[u8]>) -> T8nResult<()> {
        let path = self.dir.join(name);
        trace!(target: "t8n", "Writing debug artefact {}", path.display());
        tokio::fs::write(path, contents).await?;
        Ok(())
    }

    /// Writes a pretty printed JSON file relative to the call directory.
    pub(crate) async fn write_json<T: Serialize + ?Sized>(
        &self,
        name: &str,
        value: &T,
    ) -> T8nResult<()> {
        self.write(name, serde_json::to_vec_pretty(value)?).await
    }

    /// Returns a shell script that replays the call from the dumped inputs.
    pub(crate) fn replay_script(&self, binary: &Path, args: &[String]) -> String {
        let dir = self.dir.display();
        let args = args
            .iter()
            .map(|arg| match arg.split_once('=') {
                Some(("--input.alloc", "stdin")) => format!("--input.alloc={dir}/input/alloc.json"),
                Some(("--input.env", "stdin")) => format!("--input.env={dir}/input/env.json"),
                Some(("--input.txs", "stdin")) => format!("--input.txs={dir}/input/txs.rlp"),
                Some(("--output.basedir", _)) => format!("--output.basedir={dir}/replay"),
                Some((flag, "stdout")) => {
                    let name = flag.trim_start_matches("--output.");
                    format!("{flag}={name}.json")
                }
                _ => arg.clone(),
            })
            .collect::<Vec<_>>();
        let has_basedir = args.iter().any(|arg| arg.starts_with("--output.basedir="));
        let basedir =
            if has_basedir { String::new() } else { format!(" --output.basedir={dir}/replay") };
        format!(
            "#!/bin/bash\nrm -rf {dir}/replay && mkdir -p {dir}/replay\n{} {}{basedir}\n",
            binary.display(),
            args.join(" ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dump_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let dump = DebugDump::create(&tmp.path().join("test").join("0")).await.unwrap();
        dump.write("args.txt", "t8n").await.unwrap();
        dump.write_json("input/env.json", &serde_json::json!({"currentNumber": "0x1"}))
            .await
            .unwrap();
        assert!(dump.path().join("output").is_dir());
        assert_eq!(std::fs::read_to_string(dump.path().join("args.txt")).unwrap(), "t8n");
        assert!(dump.path().join("input/env.json").is_file());
    }

    #[test]
    fn test_replay_script() {
        let dump = DebugDump { dir: PathBuf::from("/tmp/eft/test/0") };
        let args = ["t8n", "--input.alloc=stdin", "--output.result=stdout", "--state.fork=Cancun"]
            .map(String::from);
        let script = dump.replay_script(Path::new("evm"), &args);
        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains("--input.alloc=/tmp/eft/test/0/input/alloc.json"));
        assert!(script.contains("--output.result=result.json"));
        assert!(script.contains("--state.fork=Cancun"));
        assert!(script.contains("--output.basedir=/tmp/eft/test/0/replay"));
    }
}
