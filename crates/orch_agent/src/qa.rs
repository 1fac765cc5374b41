//! QA Engine (C6): project-kind detection, per-stack default commands, and
//! fail-fast sequential execution through the sandbox policy.

use std::time::Duration;

use orch_core::QaResult;
use orch_sandbox::Policy;

use crate::error::{ControllerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectKind {
    Node,
    Python,
    Flutter,
    DotNet,
    Quarkus,
    Phoenix,
    Unknown,
}

/// A manifest-ish view of the project root: the small set of files the
/// detector needs to look at, with content for the ones whose kind
/// depends on what's inside (`pom.xml`, `mix.exs`).
pub struct ProjectManifest {
    pub has_package_json: bool,
    pub has_pyproject_or_requirements: bool,
    pub has_pubspec_yaml: bool,
    pub has_csproj_or_sln: bool,
    pub pom_xml: Option<String>,
    pub mix_exs: Option<String>,
}

/// Detects project kind in the fixed priority order: Node, Python, Flutter,
/// .NET, Quarkus (via `pom.xml` containing `io.quarkus`), Phoenix (via
/// `mix.exs` containing `:phoenix`).
pub fn detect_project_kind(manifest: &ProjectManifest) -> ProjectKind {
    if manifest.has_package_json {
        return ProjectKind::Node;
    }
    if manifest.has_pyproject_or_requirements {
        return ProjectKind::Python;
    }
    if manifest.has_pubspec_yaml {
        return ProjectKind::Flutter;
    }
    if manifest.has_csproj_or_sln {
        return ProjectKind::DotNet;
    }
    if let Some(pom) = &manifest.pom_xml {
        if pom.contains("io.quarkus") {
            return ProjectKind::Quarkus;
        }
    }
    if let Some(mix) = &manifest.mix_exs {
        if mix.contains(":phoenix") {
            return ProjectKind::Phoenix;
        }
    }
    ProjectKind::Unknown
}

impl ProjectKind {
    /// Stable string form, used to carry the detected kind across
    /// checkpointed controller nodes (`ControllerState::project_kind`).
    pub fn tag(self) -> &'static str {
        match self {
            ProjectKind::Node => "node",
            ProjectKind::Python => "python",
            ProjectKind::Flutter => "flutter",
            ProjectKind::DotNet => "dotnet",
            ProjectKind::Quarkus => "quarkus",
            ProjectKind::Phoenix => "phoenix",
            ProjectKind::Unknown => "unknown",
        }
    }
}

/// Stack-specific dependency-install hint, keyed by `ProjectKind::tag`.
pub fn heal_hint_for_tag(tag: Option<&str>) -> &'static str {
    match tag {
        Some("node") => "run `npm install`",
        Some("python") => "run `pip install -r requirements.txt`",
        Some("flutter") => "run `flutter pub get`",
        Some("dotnet") => "run `dotnet restore`",
        Some("quarkus") => "run `./mvnw install`",
        Some("phoenix") => "run `mix deps.get`",
        _ => "install the project's dependencies",
    }
}

/// Default QA command sequence for a project kind, in fail-fast order.
pub fn default_commands_for(kind: ProjectKind, run_tests: bool) -> Vec<String> {
    match kind {
        ProjectKind::Node => {
            let mut cmds = vec!["npm run -s lint".to_string(), "npm run -s typecheck".to_string()];
            if run_tests {
                cmds.push("npm run -s test".to_string());
            }
            cmds.push("npm run -s build".to_string());
            cmds
        }
        ProjectKind::Python => {
            let mut cmds = vec!["ruff check .".to_string()];
            if run_tests {
                cmds.push("pytest".to_string());
            }
            cmds
        }
        ProjectKind::Flutter => {
            let mut cmds = vec!["flutter analyze".to_string()];
            if run_tests {
                cmds.push("flutter test".to_string());
            }
            cmds
        }
        ProjectKind::DotNet => vec!["dotnet build".to_string()],
        ProjectKind::Quarkus => vec!["./mvnw -q verify".to_string()],
        ProjectKind::Phoenix => {
            let mut cmds = vec!["mix compile --warnings-as-errors".to_string()];
            if run_tests {
                cmds.push("mix test".to_string());
            }
            cmds
        }
        ProjectKind::Unknown => Vec::new(),
    }
}

/// Selects the commands to run: an explicit comma-separated env override
/// wins outright; otherwise the per-stack default sequence.
pub fn select_commands(kind: ProjectKind, env_override: Option<&str>, run_tests: bool) -> Vec<String> {
    if let Some(raw) = env_override {
        let cmds: Vec<String> = raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if !cmds.is_empty() {
            return cmds;
        }
    }
    default_commands_for(kind, run_tests)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Transient or infrastructure-side: missing network access, OOM,
    /// disk full — retrying the same edit won't help.
    Environmental,
    /// The agent's own change broke the build/lint/tests; self-heal can
    /// plausibly fix it.
    Fixable,
}

const ENVIRONMENTAL_PATTERNS: &[&str] = &[
    "ENOSPC",
    "no space left on device",
    "out of memory",
    "OOMKilled",
    "connection refused",
    "network is unreachable",
    "ETIMEDOUT",
    "could not resolve host",
    "EAI_AGAIN",
    "command not found",
    "mvnw: not found",
    "flutter: not found",
    "no module named",
    "cannot find module",
    "permission denied",
];

pub fn classify_failure(output: &str) -> FailureClass {
    let lower = output.to_lowercase();
    if ENVIRONMENTAL_PATTERNS
        .iter()
        .any(|p| lower.contains(&p.to_lowercase()))
    {
        FailureClass::Environmental
    } else {
        FailureClass::Fixable
    }
}

pub struct QaOutcome {
    pub results: Vec<QaResult>,
    pub passed: bool,
    pub classification: Option<FailureClass>,
}

/// Runs `commands` sequentially through `policy`, stopping at the first
/// non-zero exit. Each command runs as `cd /app && <cmd>` with `timeout`
/// and output truncated to `max_output_chars`.
pub async fn run_qa(policy: &Policy, commands: &[String], timeout: Duration, max_output_chars: usize) -> Result<QaOutcome> {
    let mut results = Vec::with_capacity(commands.len());

    for command in commands {
        let shell_command = format!("cd /app && {command}");
        let exec = tokio::time::timeout(timeout, policy.execute_checked(&shell_command))
            .await
            .map_err(|_| ControllerError::Qa(format!("'{command}' timed out after {:?}", timeout)))?
            .map_err(ControllerError::Sandbox)?;

        let (output, exit_code) = match exec {
            Ok(resp) => (format!("{}{}", resp.stdout, resp.stderr), resp.exit_code),
            Err(denied) => (denied.output, denied.exit_code),
        };

        let truncated = output.len() > max_output_chars;
        let output = if truncated {
            output.chars().take(max_output_chars).collect()
        } else {
            output
        };

        let failed = exit_code != 0;
        let classification = if failed {
            Some(classify_failure(&output))
        } else {
            None
        };

        results.push(QaResult {
            command: command.clone(),
            exit_code,
            output,
            truncated,
        });

        if failed {
            return Ok(QaOutcome {
                results,
                passed: false,
                classification,
            });
        }
    }

    Ok(QaOutcome {
        results,
        passed: true,
        classification: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_manifest() -> ProjectManifest {
        ProjectManifest {
            has_package_json: false,
            has_pyproject_or_requirements: false,
            has_pubspec_yaml: false,
            has_csproj_or_sln: false,
            pom_xml: None,
            mix_exs: None,
        }
    }

    #[test]
    fn detects_node_before_python() {
        let manifest = ProjectManifest {
            has_package_json: true,
            has_pyproject_or_requirements: true,
            ..empty_manifest()
        };
        assert_eq!(detect_project_kind(&manifest), ProjectKind::Node);
    }

    #[test]
    fn detects_quarkus_from_pom_contents() {
        let manifest = ProjectManifest {
            pom_xml: Some("<dependency><groupId>io.quarkus</groupId></dependency>".to_string()),
            ..empty_manifest()
        };
        assert_eq!(detect_project_kind(&manifest), ProjectKind::Quarkus);
    }

    #[test]
    fn detects_phoenix_from_mix_exs_contents() {
        let manifest = ProjectManifest {
            mix_exs: Some("defp deps do [{:phoenix, \"~> 1.7\"}] end".to_string()),
            ..empty_manifest()
        };
        assert_eq!(detect_project_kind(&manifest), ProjectKind::Phoenix);
    }

    #[test]
    fn plain_pom_without_quarkus_is_unknown() {
        let manifest = ProjectManifest {
            pom_xml: Some("<project></project>".to_string()),
            ..empty_manifest()
        };
        assert_eq!(detect_project_kind(&manifest), ProjectKind::Unknown);
    }

    #[test]
    fn env_override_wins_over_defaults() {
        let cmds = select_commands(ProjectKind::Node, Some("echo hi, echo bye"), true);
        assert_eq!(cmds, vec!["echo hi".to_string(), "echo bye".to_string()]);
    }

    #[test]
    fn node_defaults_skip_tests_when_disabled() {
        let cmds = default_commands_for(ProjectKind::Node, false);
        assert!(!cmds.iter().any(|c| c.contains("test")));
    }

    #[test]
    fn classifies_disk_full_as_environmental() {
        assert_eq!(classify_failure("Error: ENOSPC: no space left on device"), FailureClass::Environmental);
    }

    #[test]
    fn classifies_type_error_as_fixable() {
        assert_eq!(classify_failure("error TS2304: Cannot find name 'foo'"), FailureClass::Fixable);
    }
}
