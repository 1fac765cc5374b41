//! File path extraction from recent turns, for the session-context blurb.

use std::path::Path;

use orch_core::{ContentBlock, Turn};

/// Extract recently mentioned files from the last few turns.
pub(crate) fn extract_recent_files(messages: &[Turn]) -> Vec<String> {
    let mut files = Vec::new();
    let file_keywords = ["file_path", "path", "file:"];

    for turn in messages.iter().rev().take(5) {
        for block in &turn.blocks {
            if let ContentBlock::Text { text } = block {
                for line in text.lines() {
                    for keyword in &file_keywords {
                        if line.contains(keyword) {
                            if let Some(path) = extract_path_from_line(line) {
                                if !files.contains(&path) {
                                    files.push(path);
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    files.truncate(5);
    files
}

fn extract_path_from_line(line: &str) -> Option<String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    for part in parts {
        if part.contains('/') && !part.starts_with(|c: char| c.is_ascii_punctuation()) {
            let cleaned = part.trim_matches(|c| c == '"' || c == '\'' || c == ',');
            if Path::new(cleaned).extension().is_some() || cleaned.contains('/') {
                return Some(cleaned.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_core::Role;

    #[test]
    fn extracts_path_from_mentioned_file() {
        let messages = vec![Turn::new(Role::Assistant).with_block(ContentBlock::text("editing file: src/app.tsx now"))];
        let files = extract_recent_files(&messages);
        assert_eq!(files, vec!["src/app.tsx".to_string()]);
    }

    #[test]
    fn ignores_turns_older_than_five() {
        let mut messages = Vec::new();
        for i in 0..10 {
            messages.push(Turn::new(Role::Assistant).with_block(ContentBlock::text(format!("path = /old/{i}.ts"))));
        }
        let files = extract_recent_files(&messages);
        assert!(!files.iter().any(|f| f.contains("/old/0.ts")));
    }
}
