use extrato_core::{CategoryId, MatcherKind, Rule, RuleId, TransactionType};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("invalid regex pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },
    #[error("rule pattern must not be empty")]
    EmptyPattern,
    #[error("failed to parse rule file: {0}")]
    File(#[from] toml::de::Error),
}

/// Compile-check a pattern the moment a rule is authored or activated.
/// A malformed regex is a rule-authoring error; it must never surface as
/// a silent non-match during classification.
pub fn compile_pattern(
    matcher: MatcherKind,
    pattern: &str,
) -> Result<Option<regex::Regex>, RuleError> {
    if pattern.trim().is_empty() {
        return Err(RuleError::EmptyPattern);
    }
    match matcher {
        MatcherKind::Contains => Ok(None),
        MatcherKind::Regex => regex::Regex::new(pattern)
            .map(Some)
            .map_err(|e| RuleError::InvalidPattern {
                pattern: pattern.to_string(),
                source: Box::new(e),
            }),
    }
}

/// The outcome of a successful rule evaluation: everything a transaction
/// needs to record why it was classified the way it was.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    pub rule_id: RuleId,
    pub rule_version: i64,
    pub category_id: CategoryId,
    pub transaction_type: TransactionType,
    pub rationale: String,
}

struct CompiledRule {
    rule: Rule,
    /// Uppercased pattern for case-insensitive CONTAINS tests against
    /// the already-uppercased normalized document.
    pattern_upper: String,
    compiled_regex: Option<regex::Regex>,
}

/// Evaluates active rules in one fixed total order: ascending
/// `(created_at, id)`, so the oldest rule wins ties. First match ends
/// evaluation; a document matches at most one rule per pass.
pub struct RuleEngine {
    rules: Vec<CompiledRule>,
}

impl RuleEngine {
    /// Only active rules with persisted ids participate.
    pub fn new(rules: Vec<Rule>) -> Result<Self, RuleError> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            if !rule.active || rule.id.is_none() {
                continue;
            }
            let compiled_regex = compile_pattern(rule.matcher, &rule.pattern)?;
            compiled.push(CompiledRule {
                pattern_upper: rule.pattern.to_uppercase(),
                compiled_regex,
                rule,
            });
        }
        compiled.sort_by(|a, b| {
            (a.rule.created_at, a.rule.id.map(|i| i.0))
                .cmp(&(b.rule.created_at, b.rule.id.map(|i| i.0)))
        });
        Ok(Self { rules: compiled })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate against a normalized document. Returns `None` when no
    /// rule applies; that is an unclassified outcome, not an error.
    pub fn first_match(&self, document: &str) -> Option<RuleMatch> {
        let document_upper = document.to_uppercase();
        self.rules.iter().find_map(|cr| {
            let hit = match cr.rule.matcher {
                MatcherKind::Contains => document_upper.contains(&cr.pattern_upper),
                MatcherKind::Regex => cr
                    .compiled_regex
                    .as_ref()
                    .is_some_and(|re| re.is_match(document)),
            };
            if !hit {
                return None;
            }
            let rule = &cr.rule;
            let id = rule.id.expect("inactive/unsaved rules filtered in new()");
            Some(RuleMatch {
                rule_id: id,
                rule_version: rule.version,
                category_id: rule.category_id,
                transaction_type: rule.transaction_type,
                rationale: format!(
                    "matched rule {} v{} ({} \"{}\")",
                    id, rule.version, rule.matcher, rule.pattern
                ),
            })
        })
    }
}

/// One rule as written in a TOML rule file. Categories are referenced by
/// name and resolved against the store when the file is loaded.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleSpec {
    pub matcher: MatcherKind,
    pub pattern: String,
    pub category: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    rule: Vec<RuleSpec>,
}

/// Parse a `[[rule]]` TOML file. Pattern validity is checked per entry so
/// a broken rule is reported by its pattern, not by a downstream failure.
pub fn rules_from_toml(content: &str) -> Result<Vec<RuleSpec>, RuleError> {
    let file: RuleFile = toml::from_str(content)?;
    for spec in &file.rule {
        compile_pattern(spec.matcher, &spec.pattern)?;
    }
    Ok(file.rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use extrato_core::UserId;

    fn rule(
        id: i64,
        matcher: MatcherKind,
        pattern: &str,
        category: i64,
        created_secs: i64,
    ) -> Rule {
        Rule {
            id: Some(RuleId(id)),
            version: 1,
            matcher,
            pattern: pattern.to_string(),
            category_id: CategoryId(category),
            transaction_type: TransactionType::Despesa,
            active: true,
            created_by: UserId(1),
            created_at: Utc.timestamp_opt(created_secs, 0).unwrap(),
        }
    }

    #[test]
    fn contains_is_case_insensitive() {
        let engine =
            RuleEngine::new(vec![rule(1, MatcherKind::Contains, "padaria", 10, 100)]).unwrap();
        let m = engine.first_match("TRANSF PADARIA CENTRAL").unwrap();
        assert_eq!(m.category_id, CategoryId(10));
    }

    #[test]
    fn contains_no_match_leaves_none() {
        let engine =
            RuleEngine::new(vec![rule(1, MatcherKind::Contains, "PADARIA", 10, 100)]).unwrap();
        assert!(engine.first_match("POSTO DE GASOLINA").is_none());
    }

    #[test]
    fn regex_matches_normalized_document() {
        let engine =
            RuleEngine::new(vec![rule(1, MatcherKind::Regex, r"^PIX\b", 10, 100)]).unwrap();
        assert!(engine.first_match("PIX PADARIA").is_some());
        assert!(engine.first_match("ESTORNO PIX").is_none());
    }

    #[test]
    fn oldest_rule_wins_when_both_match() {
        let engine = RuleEngine::new(vec![
            rule(2, MatcherKind::Contains, "PADARIA", 20, 200),
            rule(1, MatcherKind::Contains, "PADARIA CENTRAL", 10, 100),
        ])
        .unwrap();
        let m = engine.first_match("TRANSF PADARIA CENTRAL").unwrap();
        assert_eq!(m.rule_id, RuleId(1));
        assert_eq!(m.category_id, CategoryId(10));
    }

    #[test]
    fn id_breaks_created_at_ties() {
        let engine = RuleEngine::new(vec![
            rule(5, MatcherKind::Contains, "PIX", 50, 100),
            rule(3, MatcherKind::Contains, "PIX", 30, 100),
        ])
        .unwrap();
        assert_eq!(engine.first_match("PIX LOJA").unwrap().rule_id, RuleId(3));
    }

    #[test]
    fn inactive_rules_are_skipped() {
        let mut inactive = rule(1, MatcherKind::Contains, "PIX", 10, 100);
        inactive.active = false;
        let engine = RuleEngine::new(vec![inactive]).unwrap();
        assert!(engine.first_match("PIX LOJA").is_none());
        assert!(engine.is_empty());
    }

    #[test]
    fn rationale_names_rule_and_pattern() {
        let engine =
            RuleEngine::new(vec![rule(7, MatcherKind::Contains, "PADARIA", 10, 100)]).unwrap();
        let m = engine.first_match("PADARIA DO ZÉ").unwrap();
        assert_eq!(m.rationale, "matched rule 7 v1 (CONTAINS \"PADARIA\")");
        assert_eq!(m.rule_version, 1);
    }

    #[test]
    fn malformed_regex_rejected_at_construction() {
        let result = RuleEngine::new(vec![rule(1, MatcherKind::Regex, "[unclosed", 10, 100)]);
        assert!(matches!(result, Err(RuleError::InvalidPattern { .. })));
    }

    #[test]
    fn empty_pattern_rejected() {
        assert!(matches!(
            compile_pattern(MatcherKind::Contains, "  "),
            Err(RuleError::EmptyPattern)
        ));
    }

    #[test]
    fn toml_rule_file_parses() {
        let content = r#"
            [[rule]]
            matcher = "CONTAINS"
            pattern = "PADARIA"
            category = "Alimentação"
            type = "DESPESA"

            [[rule]]
            matcher = "REGEX"
            pattern = "^TED SAL[AÁ]RIO"
            category = "Salário"
            type = "RECEITA"
        "#;
        let specs = rules_from_toml(content).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].matcher, MatcherKind::Contains);
        assert_eq!(specs[1].category, "Salário");
    }

    #[test]
    fn toml_matcher_spelling_matches_stored_form() {
        // Same spelling as the database and CLI; nothing else parses.
        let content = r#"
            [[rule]]
            matcher = "Contains"
            pattern = "PADARIA"
            category = "Alimentação"
            type = "DESPESA"
        "#;
        assert!(rules_from_toml(content).is_err());
    }

    #[test]
    fn toml_rule_file_rejects_bad_pattern() {
        let content = r#"
            [[rule]]
            matcher = "REGEX"
            pattern = "[oops"
            category = "Lazer"
            type = "DESPESA"
        "#;
        assert!(matches!(
            rules_from_toml(content),
            Err(RuleError::InvalidPattern { .. })
        ));
    }
}
