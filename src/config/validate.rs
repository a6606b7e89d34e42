//! Raw config file checks with unknown field detection.
//!
//! `serde(default)` silently ignores misspelled keys, so `kubepilot config
//! --check` runs these diagnostics over the raw JSON before deserializing.

use serde_json::Value;

/// Known top-level sections and their known keys.
const KNOWN_SECTIONS: &[(&str, &[&str])] = &[
    (
        "agent",
        &[
            "model",
            "max_tokens",
            "temperature",
            "max_iterations",
            "parallel_tools",
            "generation_timeout_secs",
            "tool_timeout_secs",
        ],
    ),
    ("providers", &["gemini"]),
    ("mcp", &["name", "url", "timeout_secs"]),
    ("gateway", &["host", "port", "allowed_origins"]),
    ("logging", &["format", "file", "level"]),
];

/// A validation diagnostic.
#[derive(Debug)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub path: String,
    pub message: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Ok,
    Warn,
    Error,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.level {
            DiagnosticLevel::Ok => "[OK]",
            DiagnosticLevel::Warn => "[WARN]",
            DiagnosticLevel::Error => "[ERROR]",
        };
        if self.path.is_empty() {
            write!(f, "{} {}", prefix, self.message)
        } else {
            write!(f, "{} {}: {}", prefix, self.path, self.message)
        }
    }
}

/// Edit distance between two strings, for "did you mean?" suggestions.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut row = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != *cb);
            row[j + 1] = substitution.min(prev[j + 1] + 1).min(row[j] + 1);
        }
        prev = row;
    }
    prev[b.len()]
}

/// Suggest the closest known field name (if distance <= 3).
pub fn suggest_field(unknown: &str, known: &[&str]) -> Option<String> {
    known
        .iter()
        .map(|k| (k, levenshtein(unknown, k)))
        .filter(|(_, d)| *d <= 3)
        .min_by_key(|(_, d)| *d)
        .map(|(k, _)| format!("did you mean '{}'?", k))
}

fn unknown_field(path: String, key: &str, known: &[&str]) -> Diagnostic {
    let message = match suggest_field(key, known) {
        Some(hint) => format!("Unknown field '{}', {}", key, hint),
        None => format!("Unknown field '{}'", key),
    };
    Diagnostic {
        level: DiagnosticLevel::Error,
        path,
        message,
    }
}

/// Validate a raw JSON config value against known field names.
pub fn validate_config(raw: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let Some(obj) = raw.as_object() else {
        diagnostics.push(Diagnostic {
            level: DiagnosticLevel::Error,
            path: String::new(),
            message: "Config must be a JSON object".to_string(),
        });
        return diagnostics;
    };

    diagnostics.push(Diagnostic {
        level: DiagnosticLevel::Ok,
        path: String::new(),
        message: "Valid JSON".to_string(),
    });

    let section_names: Vec<&str> = KNOWN_SECTIONS.iter().map(|(name, _)| *name).collect();
    let mut has_unknown = false;

    for (key, value) in obj {
        let Some((_, fields)) = KNOWN_SECTIONS.iter().find(|(name, _)| name == key) else {
            has_unknown = true;
            diagnostics.push(unknown_field(key.clone(), key, &section_names));
            continue;
        };
        if let Some(section) = value.as_object() {
            for field in section.keys() {
                if !fields.contains(&field.as_str()) {
                    has_unknown = true;
                    diagnostics.push(unknown_field(format!("{}.{}", key, field), field, fields));
                }
            }
        }
    }

    if !has_unknown {
        diagnostics.push(Diagnostic {
            level: DiagnosticLevel::Ok,
            path: String::new(),
            message: "All fields recognized".to_string(),
        });
    }

    // An API key committed to the config file is worth flagging.
    if obj
        .get("providers")
        .and_then(|p| p.get("gemini"))
        .and_then(|g| g.get("api_key"))
        .and_then(Value::as_str)
        .is_some_and(|k| !k.is_empty())
    {
        diagnostics.push(Diagnostic {
            level: DiagnosticLevel::Warn,
            path: "providers.gemini.api_key".to_string(),
            message: "Stored in plain text; prefer GOOGLE_API_KEY".to_string(),
        });
    }

    diagnostics
}
