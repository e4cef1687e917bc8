//! Write a finished run's outputs to a directory.

use std::path::{Path, PathBuf};

use anyhow::Context;
use defibuilder_pipeline::PipelineRun;

/// Writes `<Name>.sol`, `abi.json`, `bytecode.txt`, `audit.json`, and
/// `run.json`, skipping whichever the run did not produce. Returns the paths
/// written.
pub fn write_artifacts(run: &PipelineRun, dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let mut written = Vec::new();

    let mut write = |name: &str, contents: &[u8]| -> anyhow::Result<()> {
        let path = dir.join(name);
        std::fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;
        written.push(path);
        Ok(())
    };

    if let Some(code) = run.code() {
        let name = code.contract_name().unwrap_or("Contract");
        write(&format!("{name}.sol"), code.as_str().as_bytes())?;
    }
    if let Some(artifact) = run.artifact() {
        write("abi.json", &serde_json::to_vec_pretty(&artifact.abi)?)?;
        write("bytecode.txt", artifact.bytecode.as_bytes())?;
    }
    if let Some(findings) = run.findings() {
        write("audit.json", &serde_json::to_vec_pretty(findings)?)?;
    }
    write("run.json", &serde_json::to_vec_pretty(run)?)?;

    Ok(written)
}
