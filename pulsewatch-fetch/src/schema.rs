//! Schema index: which parts of a response are billable.
//!
//! The Pulse API bills per datapoint object returned, not per request. The
//! index is compiled once from the API description: for every GET route it
//! walks the success-response shape and records the field paths that lead
//! to instances of a billable type. At request time the usage counter only
//! has to follow those paths through the decoded payload.
//!
//! ```ignore
//! let index = SchemaIndex::bundled()?;
//! let rule = index.rule_for("/all-devices").unwrap();
//! assert_eq!(rule.pointers()[0].to_string(), "deviceViewDtos[*].mostRecentDataPoint");
//! ```

use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, trace};

use crate::error::SchemaError;

/// Response types that count against the daily quota.
pub const BILLABLE_TYPES: &[&str] = &[
    "DataPointDto",
    "UniversalDataPointDto",
    "PublicApiDataPoint",
    "HubDataPointDto",
];

/// The API description shipped with the crate.
const BUNDLED_DOCUMENT: &str = include_str!("../resources/pulse-openapi.json");

/// Reference prefixes for OpenAPI 3 and Swagger 2 documents.
const REF_PREFIXES: &[&str] = &["#/components/schemas/", "#/definitions/"];

/// Keywords whose sub-shapes are unioned together.
const COMPOSITE_KEYS: &[&str] = &["allOf", "oneOf", "anyOf"];

// ============================================================================
// Field Paths
// ============================================================================

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Descend into an object key.
    Key(String),
    /// Iterate an array.
    Each,
}

/// Where, inside a decoded response, billable objects live.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldPath(Vec<Segment>);

impl FieldPath {
    /// Creates a path from segments.
    pub fn new(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    /// Parses the display form, e.g. `deviceViewDtos[*].lastHourData[*]`.
    pub fn parse(text: &str) -> Self {
        let mut segments = Vec::new();
        for part in text.split('.').filter(|p| !p.is_empty()) {
            let mut key = part;
            let mut wildcards = 0;
            while let Some(stripped) = key.strip_suffix("[*]") {
                key = stripped;
                wildcards += 1;
            }
            if !key.is_empty() {
                segments.push(Segment::Key(key.to_string()));
            }
            segments.extend(std::iter::repeat_n(Segment::Each, wildcards));
        }
        Self(segments)
    }

    /// The segments of this path.
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Returns true for the path that points at the payload itself.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Counts the billable objects this path reaches in `payload`.
    ///
    /// Missing keys, `null`s and non-arrays under a wildcard all count 0.
    /// A path that ends on an array counts its elements.
    pub fn count_in(&self, payload: &Value) -> u64 {
        count_at(payload, &self.0)
    }
}

fn count_at(node: &Value, path: &[Segment]) -> u64 {
    match path.split_first() {
        None => match node {
            Value::Array(items) => items.len() as u64,
            Value::Null => 0,
            _ => 1,
        },
        Some((Segment::Each, rest)) => match node {
            Value::Array(items) => items.iter().map(|child| count_at(child, rest)).sum(),
            _ => 0,
        },
        Some((Segment::Key(key), rest)) => node
            .as_object()
            .and_then(|obj| obj.get(key))
            .map_or(0, |child| count_at(child, rest)),
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "$");
        }
        let mut first = true;
        for segment in &self.0 {
            match segment {
                Segment::Key(key) => {
                    if !first {
                        write!(f, ".")?;
                    }
                    write!(f, "{key}")?;
                }
                Segment::Each => write!(f, "[*]")?,
            }
            first = false;
        }
        Ok(())
    }
}

// ============================================================================
// Route Rules
// ============================================================================

/// Billable field paths for one GET route.
#[derive(Debug, Clone)]
pub struct RouteRule {
    template: String,
    pattern: Regex,
    pointers: Vec<FieldPath>,
}

impl RouteRule {
    /// Compiles a rule for a route template such as `/devices/{id}/data-range`.
    pub fn new(template: &str, pointers: Vec<FieldPath>) -> Result<Self, SchemaError> {
        Ok(Self {
            template: template.to_string(),
            pattern: compile_template(template)?,
            pointers,
        })
    }

    /// The route template as written in the API description.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Billable field paths, in discovery order.
    pub fn pointers(&self) -> &[FieldPath] {
        &self.pointers
    }

    /// Returns true if `path` (without query string) matches this route.
    pub fn matches(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }

    /// Sums the billable objects across all pointers. May be 0.
    pub fn count(&self, payload: &Value) -> u64 {
        self.pointers.iter().map(|p| p.count_in(payload)).sum()
    }
}

/// Turns `{param}` placeholders into single-segment wildcards, anchored at
/// both ends. Everything else must match literally.
fn compile_template(template: &str) -> Result<Regex, regex::Error> {
    let mut pattern = String::from("^");
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        pattern.push_str(&regex::escape(&rest[..open]));
        pattern.push_str("[^/]+");
        rest = &rest[open + close + 1..];
    }
    pattern.push_str(&regex::escape(rest));
    pattern.push('$');

    Regex::new(&pattern)
}

/// Drops any query string from a request route.
pub fn strip_query(route: &str) -> &str {
    route.split_once('?').map_or(route, |(path, _)| path)
}

// ============================================================================
// Schema Index
// ============================================================================

/// Immutable lookup table from route to billable field paths.
///
/// Rules are kept in the order the document declares its paths and the
/// first match wins.
#[derive(Debug, Clone, Default)]
pub struct SchemaIndex {
    rules: Vec<RouteRule>,
}

impl SchemaIndex {
    /// An index with no rules. Every call falls back to a charge of one.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compiles the API description shipped with the crate.
    pub fn bundled() -> Result<Self, SchemaError> {
        Self::from_json_str(BUNDLED_DOCUMENT)
    }

    /// Loads and compiles a document from disk.
    ///
    /// `.yaml` and `.yml` files are parsed as YAML, anything else as JSON.
    pub fn from_path(path: &Path) -> Result<Self, SchemaError> {
        info!(path = %path.display(), "Loading API description");
        let text = std::fs::read_to_string(path)?;
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

        if is_yaml {
            Self::from_yaml_str(&text)
        } else {
            Self::from_json_str(&text)
        }
    }

    /// Compiles a JSON document.
    pub fn from_json_str(text: &str) -> Result<Self, SchemaError> {
        let document: Value = serde_json::from_str(text)?;
        Self::from_document(&document)
    }

    /// Compiles a YAML document.
    pub fn from_yaml_str(text: &str) -> Result<Self, SchemaError> {
        let document: Value = serde_yaml::from_str(text)?;
        Self::from_document(&document)
    }

    /// Compiles a parsed document using [`BILLABLE_TYPES`].
    pub fn from_document(document: &Value) -> Result<Self, SchemaError> {
        Self::build(document, BILLABLE_TYPES)
    }

    /// Compiles a parsed document with a custom billable-type allowlist.
    pub fn build(document: &Value, billable: &[&str]) -> Result<Self, SchemaError> {
        let paths = document
            .get("paths")
            .and_then(Value::as_object)
            .ok_or_else(|| SchemaError::Invalid("missing `paths` object".to_string()))?;

        let empty = Map::new();
        let components = document
            .pointer("/components/schemas")
            .or_else(|| document.get("definitions"))
            .and_then(Value::as_object)
            .unwrap_or(&empty);

        let walker = Walker {
            components,
            billable,
        };

        let mut rules = Vec::new();
        for (template, methods) in paths {
            let Some(shape) = success_shape(methods) else {
                trace!(route = %template, "No GET success schema");
                continue;
            };

            let mut pointers = Vec::new();
            walker.walk(shape, &mut Vec::new(), &mut Vec::new(), &mut pointers);
            if pointers.is_empty() {
                continue;
            }

            debug!(
                route = %template,
                pointers = %pointers.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "),
                "Billable route"
            );
            rules.push(RouteRule::new(template, pointers)?);
        }

        info!(routes = rules.len(), "Schema index built");
        Ok(Self { rules })
    }

    /// All rules in evaluation order.
    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Number of billable routes.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if no route is billable by content.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule matching `route`, ignoring any query string.
    pub fn rule_for(&self, route: &str) -> Option<&RouteRule> {
        let path = strip_query(route);
        self.rules.iter().find(|rule| rule.matches(path))
    }
}

/// Picks the 200-response schema of a path item's GET operation.
fn success_shape(methods: &Value) -> Option<&Value> {
    let response = methods.get("get")?.get("responses")?.get("200")?;

    let shape = match response.get("content").and_then(Value::as_object) {
        Some(content) => content.values().next()?.get("schema")?,
        None => response.get("schema")?,
    };

    match shape {
        Value::Object(obj) if !obj.is_empty() => Some(shape),
        _ => None,
    }
}

fn ref_name(reference: &str) -> Option<&str> {
    REF_PREFIXES
        .iter()
        .find_map(|prefix| reference.strip_prefix(prefix))
}

// ============================================================================
// Traversal
// ============================================================================

/// Depth-first walk over response shapes.
struct Walker<'a> {
    components: &'a Map<String, Value>,
    billable: &'a [&'a str],
}

impl Walker<'_> {
    /// Records into `out` every path from the response root to a billable
    /// reference.
    ///
    /// `stack` holds the type names being expanded on the current descent
    /// only, so a type may appear on several branches but never inside its
    /// own expansion.
    fn walk(
        &self,
        node: &Value,
        prefix: &mut Vec<Segment>,
        stack: &mut Vec<String>,
        out: &mut Vec<FieldPath>,
    ) {
        let Some(obj) = node.as_object() else {
            return;
        };

        for key in COMPOSITE_KEYS {
            if let Some(Value::Array(alternatives)) = obj.get(*key) {
                for alternative in alternatives {
                    self.walk(alternative, prefix, stack, out);
                }
            }
        }

        if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
            self.walk_ref(reference, prefix, stack, out);
            return;
        }

        if let Some(properties) = obj.get("properties").and_then(Value::as_object) {
            for (name, child) in properties {
                prefix.push(Segment::Key(name.clone()));
                self.walk(child, prefix, stack, out);
                prefix.pop();
            }
        }

        let is_array = obj.get("type").and_then(Value::as_str) == Some("array");
        if let Some(items) = obj.get("items").filter(|_| is_array || !obj.contains_key("type")) {
            prefix.push(Segment::Each);
            self.walk(items, prefix, stack, out);
            prefix.pop();
        }
    }

    fn walk_ref(
        &self,
        reference: &str,
        prefix: &mut Vec<Segment>,
        stack: &mut Vec<String>,
        out: &mut Vec<FieldPath>,
    ) {
        let Some(name) = ref_name(reference) else {
            trace!(reference, "Skipping external reference");
            return;
        };

        if stack.iter().any(|seen| seen == name) {
            trace!(type_name = name, "Reference cycle, not descending");
            return;
        }

        if self.billable.contains(&name) {
            let path = FieldPath::new(prefix.clone());
            if !out.contains(&path) {
                out.push(path);
            }
        }

        if let Some(resolved) = self.components.get(name) {
            stack.push(name.to_string());
            self.walk(resolved, prefix, stack, out);
            stack.pop();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
