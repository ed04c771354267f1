//! Structured data coverage and JSON-LD validation

use crate::checks::{
    ratio, AuditContext, Category, CategoryScore, Checker, CheckerReport, Effort, Evidence,
    Finding, Severity, NO_HTML_PAGES,
};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;
use url::Url;

/// Types Google no longer shows rich results for
const DEPRECATED_TYPES: &[&str] = &[
    "howto",
    "specialannouncement",
    "courseinfo",
    "estimatedsalary",
    "learningvideo",
    "claimreview",
    "vehiclelisting",
    "practiceproblem",
    "dataset",
];

/// Types eligible for rich results on authority sites only
const RESTRICTED_TYPES: &[&str] = &["faqpage"];

const URL_FIELDS: &[&str] = &[
    "url",
    "logo",
    "image",
    "@id",
    "sameas",
    "contenturl",
    "embedurl",
    "thumbnailurl",
];

const DATE_FIELDS: &[&str] = &[
    "datepublished",
    "datemodified",
    "datecreated",
    "uploaddate",
    "startdate",
    "enddate",
];

const REQUIRED_FIELDS: &[(&str, &[&str])] = &[
    ("organization", &["name", "url"]),
    ("localbusiness", &["name", "address"]),
    ("softwareapplication", &["name", "applicationCategory"]),
    ("webapplication", &["name", "applicationCategory"]),
    ("article", &["headline", "author", "datePublished"]),
    ("blogposting", &["headline", "author", "datePublished"]),
    ("newsarticle", &["headline", "datePublished"]),
    ("product", &["name", "offers"]),
    ("service", &["name"]),
    ("faqpage", &["mainEntity"]),
    ("breadcrumblist", &["itemListElement"]),
    ("website", &["name", "url"]),
    ("webpage", &["name"]),
    ("person", &["name"]),
];

/// Penalty per invalid JSON-LD block, and its cap
const INVALID_BLOCK_PENALTY: f64 = 5.0;
const MAX_INVALID_PENALTY: f64 = 25.0;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\[[^\]]+\]|<[^>]+>|__\w+__|\bTBD\b|\bTODO\b)")
        .expect("Failed to compile placeholder regex")
});

static ISO_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}([Tt ][0-9:\-+.Zz]+)?$").expect("Failed to compile date regex")
});

/// One problem found in a JSON-LD block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaIssue {
    InvalidJson(String),
    MissingType,
    ContextNotSchemaOrg { schema_type: String },
    DeprecatedType(String),
    RestrictedType(String),
    MissingProperty { schema_type: String, property: &'static str },
    Placeholder { schema_type: String },
    RelativeUrl { field: String, value: String },
    NonIsoDate { field: String, value: String },
}

impl SchemaIssue {
    /// Whether the issue makes its block invalid
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidJson(_)
                | Self::MissingType
                | Self::DeprecatedType(_)
                | Self::MissingProperty { .. }
        )
    }

    fn title(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "Invalid JSON-LD",
            Self::MissingType => "Schema nodes without @type",
            Self::ContextNotSchemaOrg { .. } => "Schema @context is not schema.org",
            Self::DeprecatedType(_) => "Deprecated schema types",
            Self::RestrictedType(_) => "Restricted schema types",
            Self::MissingProperty { .. } => "Schema missing required properties",
            Self::Placeholder { .. } => "Placeholder values in schema",
            Self::RelativeUrl { .. } => "Relative URLs in schema",
            Self::NonIsoDate { .. } => "Non-ISO dates in schema",
        }
    }

    fn severity(&self) -> Severity {
        match self {
            Self::InvalidJson(_) => Severity::High,
            Self::MissingType
            | Self::DeprecatedType(_)
            | Self::MissingProperty { .. }
            | Self::Placeholder { .. } => Severity::Medium,
            Self::ContextNotSchemaOrg { .. }
            | Self::RestrictedType(_)
            | Self::RelativeUrl { .. }
            | Self::NonIsoDate { .. } => Severity::Low,
        }
    }

    fn recommendation(&self) -> &'static str {
        match self {
            Self::InvalidJson(_) => "Fix the JSON syntax and validate blocks with the Rich Results Test.",
            Self::MissingType => "Give every schema node an explicit @type.",
            Self::ContextNotSchemaOrg { .. } => "Set @context to https://schema.org.",
            Self::DeprecatedType(_) => "Remove deprecated types or replace them with supported ones.",
            Self::RestrictedType(_) => "Only use FAQPage on government or health authority sites.",
            Self::MissingProperty { .. } => "Add the required properties for each declared type.",
            Self::Placeholder { .. } => "Replace template placeholders with real, verifiable values.",
            Self::RelativeUrl { .. } => "Use absolute https URLs in URL-valued properties.",
            Self::NonIsoDate { .. } => "Write dates in ISO-8601 format (YYYY-MM-DD).",
        }
    }
}

impl fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson(e) => write!(f, "invalid JSON: {}", e),
            Self::MissingType => write!(f, "missing or invalid @type"),
            Self::ContextNotSchemaOrg { schema_type } => {
                write!(f, "{}: @context should be https://schema.org", schema_type)
            }
            Self::DeprecatedType(t) => write!(f, "{} is deprecated for rich results", t),
            Self::RestrictedType(t) => write!(f, "{} is restricted to authority sites", t),
            Self::MissingProperty {
                schema_type,
                property,
            } => write!(f, "{} missing {}", schema_type, property),
            Self::Placeholder { schema_type } => write!(f, "{} contains placeholder values", schema_type),
            Self::RelativeUrl { field, value } => write!(f, "{} is not absolute: {}", field, value),
            Self::NonIsoDate { field, value } => write!(f, "{} is not ISO-8601: {}", field, value),
        }
    }
}

/// Validates one raw JSON-LD payload
///
/// `host` decides whether restricted types are eligible. Nested typed nodes
/// (including `@graph` members) are validated individually and inherit the
/// nearest `@context`.
pub fn validate_json_ld(payload: &str, host: &str) -> Vec<SchemaIssue> {
    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => return vec![SchemaIssue::InvalidJson(e.to_string())],
    };

    let mut nodes = Vec::new();
    collect_nodes(&value, None, &mut nodes);
    if nodes.is_empty() {
        return vec![SchemaIssue::MissingType];
    }

    let mut issues = Vec::new();
    for (node, context) in nodes {
        for issue in validate_node(node, context, host) {
            if !issues.contains(&issue) {
                issues.push(issue);
            }
        }
    }
    issues
}

/// Typed objects with the `@context` in effect for each
fn collect_nodes<'a>(
    value: &'a Value,
    inherited: Option<&'a Value>,
    out: &mut Vec<(&'a Map<String, Value>, Option<&'a Value>)>,
) {
    match value {
        Value::Object(map) => {
            let context = map.get("@context").or(inherited);
            if map.contains_key("@type") {
                out.push((map, context));
            }
            for child in map.values() {
                collect_nodes(child, context, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_nodes(item, inherited, out);
            }
        }
        _ => {}
    }
}

fn validate_node(node: &Map<String, Value>, context: Option<&Value>, host: &str) -> Vec<SchemaIssue> {
    let types = node.get("@type").map(type_list).unwrap_or_default();
    if types.is_empty() {
        return vec![SchemaIssue::MissingType];
    }

    let mut issues = Vec::new();
    for schema_type in types {
        if !context.map(context_valid).unwrap_or(false) {
            issues.push(SchemaIssue::ContextNotSchemaOrg {
                schema_type: schema_type.clone(),
            });
        }
        if DEPRECATED_TYPES.contains(&schema_type.as_str()) {
            issues.push(SchemaIssue::DeprecatedType(schema_type.clone()));
        }
        if RESTRICTED_TYPES.contains(&schema_type.as_str()) && !is_authority_domain(host) {
            issues.push(SchemaIssue::RestrictedType(schema_type.clone()));
        }

        if let Some((_, required)) = REQUIRED_FIELDS.iter().find(|(t, _)| *t == schema_type) {
            for &property in required.iter() {
                if get_field(node, property).map(is_empty_value).unwrap_or(true) {
                    issues.push(SchemaIssue::MissingProperty {
                        schema_type: schema_type.clone(),
                        property,
                    });
                }
            }
        }

        let mut strings = Vec::new();
        node.values().for_each(|v| collect_strings(v, &mut strings));
        if strings.iter().any(|s| PLACEHOLDER_RE.is_match(s)) {
            issues.push(SchemaIssue::Placeholder {
                schema_type: schema_type.clone(),
            });
        }

        for field in URL_FIELDS {
            for value in values_for_key(node, field) {
                let items: Vec<&Value> = match value {
                    Value::Array(items) => items.iter().collect(),
                    other => vec![other],
                };
                for item in items {
                    if let Value::String(s) = item {
                        if !s.trim().is_empty() && !is_absolute_url(s) {
                            issues.push(SchemaIssue::RelativeUrl {
                                field: field.to_string(),
                                value: s.clone(),
                            });
                        }
                    }
                }
            }
        }

        for field in DATE_FIELDS {
            for value in values_for_key(node, field) {
                if let Value::String(s) = value {
                    if !s.trim().is_empty() && !ISO_DATE_RE.is_match(s.trim()) {
                        issues.push(SchemaIssue::NonIsoDate {
                            field: field.to_string(),
                            value: s.clone(),
                        });
                    }
                }
            }
        }
    }
    issues
}

/// Last path or fragment segment of a type, lowercased
fn normalize_type(raw: &str) -> String {
    let cleaned = raw.trim().trim_end_matches('/');
    let cleaned = cleaned.rsplit('#').next().unwrap_or(cleaned);
    let cleaned = cleaned.rsplit('/').next().unwrap_or(cleaned);
    cleaned.trim().to_lowercase()
}

fn type_list(raw: &Value) -> Vec<String> {
    let names: Vec<&str> = match raw {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };
    names
        .into_iter()
        .map(normalize_type)
        .filter(|t| !t.is_empty())
        .collect()
}

/// schema.org over https, or http for older markup
fn context_valid(context: &Value) -> bool {
    match context {
        Value::String(s) => {
            let value = s.trim().trim_end_matches('/').to_lowercase();
            value == "https://schema.org" || value == "http://schema.org"
        }
        Value::Array(items) => items.iter().any(context_valid),
        _ => false,
    }
}

fn is_authority_domain(host: &str) -> bool {
    const MARKERS: &[&str] = &["health", "hospital", "clinic", "medical", "nhs", "cdc", "nih", "who.int"];
    host.ends_with(".gov") || MARKERS.iter().any(|m| host.contains(m))
}

fn get_field<'a>(node: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    node.get(key).or_else(|| {
        node.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn collect_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) => out.push(s),
        Value::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_strings(v, out)),
        _ => {}
    }
}

/// Values of every key matching `key` case-insensitively, at any depth
fn values_for_key<'a>(node: &'a Map<String, Value>, key: &str) -> Vec<&'a Value> {
    fn walk<'a>(value: &'a Value, key: &str, out: &mut Vec<&'a Value>) {
        match value {
            Value::Object(map) => {
                for (k, child) in map {
                    if k.eq_ignore_ascii_case(key) {
                        out.push(child);
                    }
                    walk(child, key, out);
                }
            }
            Value::Array(items) => items.iter().for_each(|v| walk(v, key, out)),
            _ => {}
        }
    }

    let mut out = Vec::new();
    for (k, child) in node {
        if k.eq_ignore_ascii_case(key) {
            out.push(child);
        }
        walk(child, key, &mut out);
    }
    out
}

fn is_absolute_url(value: &str) -> bool {
    Url::parse(value.trim())
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

pub struct SchemaChecker;

#[async_trait]
impl Checker for SchemaChecker {
    fn name(&self) -> &'static str {
        "schema"
    }

    fn category(&self) -> Category {
        Category::Schema
    }

    async fn evaluate(&self, ctx: &AuditContext) -> CheckerReport {
        let total = ctx.html_count();
        if total == 0 {
            return CheckerReport::scored(self, CategoryScore::not_measured(NO_HTML_PAGES), Vec::new());
        }

        let host = ctx.scope.canonical_domain();
        let mut covered = 0;
        let mut invalid_blocks = 0;
        // Issue title -> (severity, recommendation, evidence, occurrence count)
        let mut grouped: BTreeMap<&'static str, (Severity, &'static str, Vec<Evidence>, usize)> =
            BTreeMap::new();

        for (page, signals) in ctx.html_pages() {
            if !signals.structured_data.is_empty() {
                covered += 1;
            }
            for payload in &signals.structured_data.json_ld {
                let issues = validate_json_ld(payload, host);
                if issues.iter().any(SchemaIssue::is_failure) {
                    invalid_blocks += 1;
                }
                for issue in issues {
                    let entry = grouped
                        .entry(issue.title())
                        .or_insert_with(|| (issue.severity(), issue.recommendation(), Vec::new(), 0));
                    entry.2.push(Evidence::new(page.url.clone(), issue.to_string()));
                    entry.3 += 1;
                }
            }
        }

        let coverage = ratio(covered, total);
        let penalty = (invalid_blocks as f64 * INVALID_BLOCK_PENALTY).min(MAX_INVALID_PENALTY);
        let score = 50.0 + 50.0 * coverage - penalty;

        let mut findings = Vec::new();

        if covered < total {
            let severity = if covered == 0 {
                Severity::Medium
            } else {
                Severity::Low
            };
            findings.push(
                Finding::new(
                    Category::Schema,
                    severity,
                    "Pages without structured data",
                    format!("{}/{} HTML pages carry no structured data.", total - covered, total),
                )
                .impact("Pages are ineligible for rich results and harder for AI systems to interpret.")
                .recommendation("Add JSON-LD for the organization, website and primary page types.")
                .evidence(ctx.sample("no JSON-LD, Microdata or RDFa", |s| s.structured_data.is_empty()))
                .effort(Effort::Medium),
            );
        }

        for (title, (severity, recommendation, evidence, count)) in grouped {
            findings.push(
                Finding::new(
                    Category::Schema,
                    severity,
                    title,
                    format!("{} occurrences across crawled JSON-LD blocks.", count),
                )
                .impact("Invalid or ineligible markup is ignored for rich results.")
                .recommendation(recommendation)
                .evidence(evidence)
                .effort(Effort::Low),
            );
        }

        CheckerReport::scored(self, CategoryScore::measured(score), findings)
    }
}
