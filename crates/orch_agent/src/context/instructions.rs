//! Layered workspace instructions: `/AGENTS.md`, `/.deepagents/AGENTS.md`,
//! and `/memories/agent.local.md`, merged on top of the base system prompt
//! with recursive `@path` imports (cycle-safe, depth-capped).

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use orch_sandbox::Policy;

/// Default layering order, precedence lowest to highest: repo-wide rules,
/// then the sandbox runtime's own overrides, then the user's local notes.
pub const DEFAULT_SOURCES: &[&str] = &["/AGENTS.md", "/.deepagents/AGENTS.md", "/memories/agent.local.md"];

static IMPORT_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*@(?P<path>\S+)\s*$").expect("import-line pattern must compile"));
static CODE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*```").expect("code-fence pattern must compile"));
static BLANK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("blank-run pattern must compile"));

pub struct ComposedInstructions {
    pub prompt: String,
    pub included_paths: Vec<String>,
    pub missing_paths: Vec<String>,
    pub truncated: bool,
}

fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let kept: Vec<&str> = unified.split('\n').map(str::trim_end).filter(|l| !CODE_FENCE.is_match(l)).collect();
    let joined = kept.join("\n");
    BLANK_RUN.replace_all(&joined, "\n\n").trim().to_string()
}

/// Resolves an `@path` import relative to the file it appears in. Absolute
/// imports (leading `/`) are normalized as-is; relative ones join against
/// the importing file's directory.
fn resolve_import(import_path: &str, current_path: &str) -> String {
    if let Some(stripped) = import_path.strip_prefix('/') {
        return normalize_posix_path(&format!("/{stripped}"));
    }
    let base_dir = current_path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
    let joined = if base_dir.is_empty() { import_path.to_string() } else { format!("{base_dir}/{import_path}") };
    let normalized = normalize_posix_path(&joined);
    if normalized.starts_with('/') { normalized } else { format!("/{normalized}") }
}

fn normalize_posix_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

struct Expander<'a> {
    policy: &'a Policy,
    max_depth: u32,
    included_paths: Vec<String>,
    missing_paths: Vec<String>,
    visiting: HashSet<String>,
    cache: HashMap<String, Vec<String>>,
}

impl<'a> Expander<'a> {
    fn new(policy: &'a Policy, max_depth: u32) -> Self {
        Self { policy, max_depth, included_paths: Vec::new(), missing_paths: Vec::new(), visiting: HashSet::new(), cache: HashMap::new() }
    }

    /// Reads `path`, replacing each `@import` line with the expansion of
    /// the imported file, recursively. Returns the file's lines with
    /// imports inlined; empty if the file is missing, cyclic, or past
    /// `max_depth`.
    fn expand<'b>(&'b mut self, path: String, depth: u32) -> std::pin::Pin<Box<dyn std::future::Future<Output = Vec<String>> + Send + 'b>> {
        Box::pin(async move {
            if depth > self.max_depth {
                self.missing_paths.push(format!("{path} (max_depth)"));
                return Vec::new();
            }
            if self.visiting.contains(&path) {
                self.missing_paths.push(format!("{path} (cycle)"));
                return Vec::new();
            }
            if let Some(cached) = self.cache.get(&path) {
                return cached.clone();
            }

            self.visiting.insert(path.clone());

            let raw = match self.policy.read(&path).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(_) => {
                    self.missing_paths.push(path.clone());
                    self.visiting.remove(&path);
                    self.cache.insert(path, Vec::new());
                    return Vec::new();
                }
            };

            if !self.included_paths.contains(&path) {
                self.included_paths.push(path.clone());
            }

            let mut out_lines = Vec::new();
            for line in raw.lines() {
                let Some(captures) = IMPORT_LINE.captures(line) else {
                    out_lines.push(line.to_string());
                    continue;
                };
                let import_path = &captures["path"];
                let resolved = resolve_import(import_path, &path);
                let nested = self.expand(resolved.clone(), depth + 1).await;
                if !nested.is_empty() {
                    out_lines.push(format!("# imported: {resolved}"));
                    out_lines.extend(nested);
                }
            }

            self.visiting.remove(&path);
            self.cache.insert(path, out_lines.clone());
            out_lines
        })
    }
}

/// Merges `base_prompt` with the layered workspace instructions found at
/// `sources`, in order. Each source's `@path` imports are expanded
/// recursively (cycle-safe, capped at `max_depth`); the merged result is
/// truncated to `max_chars` if it would otherwise exceed it.
pub async fn compose_instructions(policy: &Policy, base_prompt: &str, sources: &[&str], max_chars: usize, max_depth: u32) -> ComposedInstructions {
    let mut expander = Expander::new(policy, max_depth);
    let mut sections = vec![normalize(base_prompt)];

    for source in sources {
        if source.is_empty() {
            continue;
        }
        let expanded = expander.expand(source.to_string(), 1).await;
        if expanded.is_empty() {
            continue;
        }
        let body = normalize(&expanded.join("\n"));
        if body.is_empty() {
            continue;
        }
        sections.push(format!("Workspace instructions ({source}):\n{body}"));
    }

    let merged = normalize(&sections.iter().filter(|s| !s.trim().is_empty()).cloned().collect::<Vec<_>>().join("\n\n"));

    let truncated = merged.chars().count() > max_chars;
    let prompt = if truncated {
        let head: String = merged.chars().take(max_chars).collect();
        format!("{}\n\n[...instructions truncated...]", head.trim_end())
    } else {
        merged
    };

    ComposedInstructions { prompt, included_paths: expander.included_paths, missing_paths: expander.missing_paths, truncated }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_import_handles_absolute_and_relative() {
        assert_eq!(resolve_import("/shared.md", "/AGENTS.md"), "/shared.md");
        assert_eq!(resolve_import("shared.md", "/docs/AGENTS.md"), "/docs/shared.md");
        assert_eq!(resolve_import("../shared.md", "/docs/nested/AGENTS.md"), "/docs/shared.md");
    }

    #[test]
    fn normalize_strips_code_fences_and_collapses_blank_runs() {
        let text = "```md\nKeep me\n```\n\n\n\nEnd";
        let normalized = normalize(text);
        assert!(!normalized.contains("```"));
        assert!(normalized.contains("Keep me"));
        assert!(!normalized.contains("\n\n\n"));
    }
}
