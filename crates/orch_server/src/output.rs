//! Terminal output helpers — dual-mode: styled text for operators, structured JSON for machines.

use std::sync::atomic::{AtomicBool, Ordering};

use console::style;
use serde::Serialize;

use crate::cli::OutputFormat;

static JSON_MODE: AtomicBool = AtomicBool::new(false);

pub fn init(format: OutputFormat) {
    if matches!(format, OutputFormat::Json) {
        JSON_MODE.store(true, Ordering::Relaxed);
    }
}

fn is_json() -> bool {
    JSON_MODE.load(Ordering::Relaxed)
}

#[derive(Serialize)]
struct Msg<'a> {
    level: &'a str,
    message: &'a str,
}

fn emit_json(level: &str, message: &str) {
    let msg = Msg { level, message };
    let json = serde_json::to_string(&msg).unwrap_or_else(|_| format!("{{\"level\":\"{level}\",\"message\":\"{message}\"}}"));
    println!("{json}");
}

pub fn header(text: &str) {
    if is_json() {
        emit_json("info", text);
    } else {
        println!("{}", style(text).bold().cyan());
    }
}

pub fn success(text: &str) {
    if is_json() {
        emit_json("success", text);
    } else {
        println!("{} {}", style("✓").green(), style(text).bright());
    }
}

pub fn error(text: &str) {
    if is_json() {
        emit_json("error", text);
    } else {
        eprintln!("{} {}", style("✗").red(), style(text).bright());
    }
}

pub fn warning(text: &str) {
    if is_json() {
        emit_json("warning", text);
    } else {
        println!("{} {}", style("!").yellow(), style(text).bright());
    }
}

/// Print a key-value pair with a styled key.
pub fn kv(key: &str, value: &str) {
    if is_json() {
        println!("{}", serde_json::json!({ "level": "info", "key": key, "value": value }));
    } else {
        println!("  {} {}", style(key).cyan().bold(), value);
    }
}
