use log::{debug, warn};
use regex::Regex;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::v2board::error::ApiError;
use crate::v2board::models::DetectRule;

/// Id given to every rule read from the local file
pub const LOCAL_RULE_ID: i32 = -1;

const PANEL_RULE_PREFIX: &str = "regexp:";

fn compile(pattern: &str, id: i32) -> Result<DetectRule, ApiError> {
    let pattern_re = Regex::new(pattern).map_err(|source| ApiError::InvalidRule {
        pattern: pattern.to_string(),
        source,
    })?;
    Ok(DetectRule { id, pattern: pattern_re })
}

/// Loads one regex per line. A missing path or a file that cannot be opened
/// yields no rules; a failure while reading is an error.
pub fn load_local_rules(path: Option<&Path>) -> Result<Vec<DetectRule>, ApiError> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };

    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            warn!("Error when opening rule list {}: {}", path.display(), e);
            return Ok(Vec::new());
        }
    };

    let mut rules = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| ApiError::RuleList {
            path: path.to_path_buf(),
            source,
        })?;
        let pattern = line.trim_end_matches('\r');
        if pattern.is_empty() {
            continue;
        }
        rules.push(compile(pattern, LOCAL_RULE_ID)?);
    }

    debug!("Loaded {} local rules from {}", rules.len(), path.display());
    Ok(rules)
}

/// Domain rules from a cached V2ray node config: the first routing rule that
/// carries a `domain` list. Entries lose their `regexp:` prefix and are
/// numbered by their position in the list; non-string entries are skipped.
pub fn panel_rules(config_tree: &Value) -> Result<Vec<DetectRule>, ApiError> {
    let domains = config_tree
        .pointer("/routing/rules")
        .and_then(Value::as_array)
        .and_then(|rules| rules.iter().find_map(|rule| rule.get("domain")?.as_array()));

    let Some(domains) = domains else {
        return Ok(Vec::new());
    };

    let mut rules = Vec::with_capacity(domains.len());
    for (i, entry) in domains.iter().enumerate() {
        let Some(rule) = entry.as_str() else {
            warn!("Skip non-string panel rule #{}: {}", i, entry);
            continue;
        };
        let pattern = rule.strip_prefix(PANEL_RULE_PREFIX).unwrap_or(rule);
        rules.push(compile(pattern, i as i32)?);
    }
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn temp_rule_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("panel-sync-{}-{}", std::process::id(), name));
        std::fs::write(&path, content).expect("cannot write rule file");
        path
    }

    #[test]
    fn test_local_rules_from_file() {
        let path = temp_rule_file("rules.txt", "foo.*\nbar\n");
        let rules = load_local_rules(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(rules.len(), 2);
        assert!(rules.iter().all(|r| r.id == LOCAL_RULE_ID));
        assert_eq!(rules[0].pattern.as_str(), "foo.*");
        assert_eq!(rules[1].pattern.as_str(), "bar");
        assert!(rules[0].pattern.is_match("foobar.com"));
    }

    #[test]
    fn test_local_rules_skip_blank_lines_and_crlf() {
        let path = temp_rule_file("crlf.txt", "a\\.com\r\n\r\n\nb\\.com\r\n");
        let rules = load_local_rules(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        let patterns: Vec<_> = rules.iter().map(|r| r.pattern.as_str()).collect();
        assert_eq!(patterns, vec!["a\\.com", "b\\.com"]);
    }

    #[test]
    fn test_local_rules_without_path() {
        assert!(load_local_rules(None).unwrap().is_empty());
    }

    #[test]
    fn test_local_rules_missing_file_is_not_fatal() {
        let path = std::env::temp_dir().join("panel-sync-does-not-exist.txt");
        assert!(load_local_rules(Some(&path)).unwrap().is_empty());
    }

    #[test]
    fn test_local_rules_invalid_pattern() {
        let path = temp_rule_file("invalid.txt", "ok\n(unclosed\n");
        let err = load_local_rules(Some(&path)).unwrap_err();
        std::fs::remove_file(&path).ok();

        assert!(matches!(err, ApiError::InvalidRule { ref pattern, .. } if pattern == "(unclosed"));
    }

    #[test]
    fn test_local_rules_read_error() {
        // Not valid UTF-8, so the line reader fails mid-scan.
        let path = std::env::temp_dir().join(format!("panel-sync-{}-binary.txt", std::process::id()));
        std::fs::write(&path, [b'a', b'\n', 0xff, 0xfe, b'\n']).unwrap();
        let err = load_local_rules(Some(&path)).unwrap_err();
        std::fs::remove_file(&path).ok();

        assert!(matches!(err, ApiError::RuleList { .. }));
    }

    #[test]
    fn test_panel_rules_strip_prefix() {
        let tree = json!({
            "routing": {
                "rules": [
                    {"type": "field", "inboundTag": ["api"], "outboundTag": "api"},
                    {"type": "field", "domain": ["regexp:abc", "regexp:def", "plain"], "outboundTag": "block"}
                ]
            }
        });
        let rules = panel_rules(&tree).unwrap();
        let got: Vec<_> = rules.iter().map(|r| (r.id, r.pattern.as_str())).collect();
        assert_eq!(got, vec![(0, "abc"), (1, "def"), (2, "plain")]);
    }

    #[test]
    fn test_panel_rules_keep_position_ids() {
        let tree = json!({"routing": {"rules": [{"domain": ["regexp:abc", 5, null, "regexp:def"]}]}});
        let rules = panel_rules(&tree).unwrap();
        let got: Vec<_> = rules.iter().map(|r| (r.id, r.pattern.as_str())).collect();
        assert_eq!(got, vec![(0, "abc"), (3, "def")]);
    }

    #[test]
    fn test_panel_rules_absent() {
        assert!(panel_rules(&json!({"inbound": {}})).unwrap().is_empty());
        assert!(panel_rules(&json!({"routing": {"rules": []}})).unwrap().is_empty());
    }

    #[test]
    fn test_panel_rules_invalid_pattern() {
        let tree = json!({"routing": {"rules": [{"domain": ["regexp:[z-a]"]}]}});
        assert!(matches!(panel_rules(&tree), Err(ApiError::InvalidRule { .. })));
    }
}
