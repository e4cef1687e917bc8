//! Human-readable rendering of runs, progress events, and prompt listings.

use std::fmt::Write;

use defibuilder_core::{AbiParam, PromptTemplate};
use defibuilder_pipeline::{AuditOutcome, PipelineRun, ResolveOutcome, RunEvent, Stage, StageStatus};

const MAX_CODE_LINES: usize = 40;

pub fn render_templates(prompts: &[PromptTemplate]) -> String {
    let mut out = String::new();
    if prompts.is_empty() {
        out.push_str("No prompt templates.\n");
        return out;
    }
    let width = prompts
        .iter()
        .map(|p| p.template.as_str().len())
        .max()
        .unwrap_or(0);
    for p in prompts {
        let _ = writeln!(out, "  {:<width$}  {}", p.template.as_str(), p.text);
    }
    out
}

pub fn render_event(event: &RunEvent) -> String {
    match event {
        RunEvent::StageEntered { stage } => format!("» {}", stage_label(*stage)),
        RunEvent::CompileFailed {
            attempt,
            message,
            remaining_retries,
        } => format!(
            "  compile attempt {attempt} failed ({remaining_retries} retries left): {}",
            first_line(message)
        ),
        RunEvent::ResolveFailed {
            error,
            remaining_retries,
        } => format!("  resolve failed ({remaining_retries} retries left): {error}"),
        RunEvent::Finished { terminal } => format!("» finished: {terminal}"),
    }
}

pub fn render_run(run: &PipelineRun) -> String {
    let mut out = String::new();
    let status = run.terminal.as_ref().map_or("unfinished", |t| t.as_str());

    section(&mut out, "Run");
    field(&mut out, "id", &run.id.to_string());
    field(&mut out, "contract type", run.request.contract_type.as_str());
    if !run.request.customization.is_empty() {
        field(&mut out, "customization", &run.request.customization);
    }
    field(&mut out, "status", status);
    if let Some(e) = run.error() {
        field(&mut out, "error", &e.to_string());
    }
    if let Some(finished) = run.finished_at {
        let ms = (finished - run.started_at).num_milliseconds();
        field(&mut out, "elapsed", &format!("{:.1}s", ms as f64 / 1000.0));
    }

    section(&mut out, "Stages");
    field(&mut out, "generation", status_label(run.progress.generation));
    field(&mut out, "compilation", status_label(run.progress.compilation));
    field(&mut out, "audit", status_label(run.progress.audit));
    field(
        &mut out,
        "attempts",
        &format!("{} of {}", run.attempts.len(), run.max_retries + 1),
    );

    if !run.resolutions.is_empty() {
        section(&mut out, "Resolutions");
        for (i, r) in run.resolutions.iter().enumerate() {
            let outcome = match &r.outcome {
                ResolveOutcome::Patched(_) => "patched".to_string(),
                ResolveOutcome::Failed(e) => format!("failed: {e}"),
            };
            let _ = writeln!(out, "  {}. {} ← {}", i + 1, outcome, first_line(&r.diagnostic));
        }
    }

    if let Some(artifact) = run.artifact() {
        section(&mut out, "Artifact");
        field(&mut out, "bytecode", &format!("{} bytes", hex_len(&artifact.bytecode)));
        match artifact.constructor_inputs() {
            Ok(inputs) => field(&mut out, "constructor", &format!("({})", params(&inputs))),
            Err(e) => field(&mut out, "constructor", &format!("unreadable ABI: {e}")),
        }
        if let Ok(entries) = artifact.interface() {
            for entry in entries.iter().filter(|e| e.name().is_some()) {
                let _ = writeln!(out, "  {}", entry.signature());
            }
        }
    }

    section(&mut out, "Audit");
    match &run.audit {
        AuditOutcome::NotRun => out.push_str("  not run\n"),
        AuditOutcome::Unavailable(e) => {
            let _ = writeln!(out, "  unavailable: {e}");
        }
        AuditOutcome::Findings(findings) if findings.is_empty() => {
            out.push_str("  no findings\n");
        }
        AuditOutcome::Findings(findings) => {
            for f in findings {
                let _ = writeln!(out, "  [{}] {}", f.severity, f.title);
                let _ = writeln!(out, "      {}", f.description);
            }
        }
    }

    if let Some(code) = run.code() {
        section(&mut out, "Source");
        let lines: Vec<&str> = code.as_str().lines().collect();
        for line in lines.iter().take(MAX_CODE_LINES) {
            let _ = writeln!(out, "  {line}");
        }
        if lines.len() > MAX_CODE_LINES {
            let _ = writeln!(out, "  ... ({} more lines)", lines.len() - MAX_CODE_LINES);
        }
    }

    out
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n── {title} ──");
}

fn field(out: &mut String, label: &str, value: &str) {
    let _ = writeln!(out, "  {label:<14} {value}");
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Idle => "idle",
        Stage::Generating => "generating",
        Stage::Compiling => "compiling",
        Stage::Resolving => "resolving",
        Stage::Auditing => "auditing",
        Stage::Completed => "completed",
        Stage::Failed => "failed",
        Stage::Cancelled => "cancelled",
    }
}

fn status_label(status: StageStatus) -> &'static str {
    match status {
        StageStatus::NotStarted => "not started",
        StageStatus::InProgress => "in progress",
        StageStatus::Succeeded => "succeeded",
        StageStatus::Failed => "failed",
    }
}

fn params(inputs: &[AbiParam]) -> String {
    inputs
        .iter()
        .map(|p| {
            if p.name.is_empty() {
                p.canonical_type()
            } else {
                format!("{} {}", p.canonical_type(), p.name)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn hex_len(bytecode: &str) -> usize {
    bytecode.trim_start_matches("0x").len() / 2
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use defibuilder_core::{ContractType, PipelineError};
    use defibuilder_pipeline::Terminal;

    #[test]
    fn templates_are_aligned() {
        let prompts = vec![
            PromptTemplate {
                template: ContractType::Nft,
                text: "Add royalties".into(),
            },
            PromptTemplate {
                template: ContractType::Marketplace,
                text: "Add listing fees".into(),
            },
        ];
        let out = render_templates(&prompts);
        assert!(out.contains("  NFT          Add royalties\n"));
        assert!(out.contains("  Marketplace  Add listing fees\n"));
    }

    #[test]
    fn empty_template_listing() {
        assert_eq!(render_templates(&[]), "No prompt templates.\n");
    }

    #[test]
    fn compile_failure_event_shows_remaining_retries() {
        let line = render_event(&RunEvent::CompileFailed {
            attempt: 2,
            message: "ParserError: Expected '}'\n --> contract.sol:5:1".into(),
            remaining_retries: 1,
        });
        assert_eq!(
            line,
            "  compile attempt 2 failed (1 retries left): ParserError: Expected '}'"
        );
    }

    #[test]
    fn finished_event_names_terminal() {
        let line = render_event(&RunEvent::Finished {
            terminal: Terminal::FailedCompilation(PipelineError::RetryBudgetExhausted {
                attempts: 4,
                last_message: "x".into(),
            }),
        });
        assert_eq!(line, "» finished: failed-compilation");
    }

    #[test]
    fn constructor_params_render_with_names() {
        let inputs: Vec<AbiParam> = serde_json::from_value(serde_json::json!([
            {"name": "name_", "type": "string"},
            {"name": "", "type": "uint256"}
        ]))
        .unwrap();
        assert_eq!(params(&inputs), "string name_, uint256");
    }

    #[test]
    fn constructor_tuple_params_show_components() {
        let inputs: Vec<AbiParam> = serde_json::from_value(serde_json::json!([
            {"name": "fees", "type": "tuple", "components": [
                {"name": "bps", "type": "uint16"},
                {"name": "recipient", "type": "address"}
            ]}
        ]))
        .unwrap();
        assert_eq!(params(&inputs), "(uint16,address) fees");
    }

    #[test]
    fn bytecode_length_in_bytes() {
        assert_eq!(hex_len("0x60806040"), 4);
        assert_eq!(hex_len(""), 0);
    }
}
