//! Pluggable shape recognizers for schema-aware salvage.
//!
//! When no stage of the text pipeline yields JSON, a recognizer that matches
//! the caller's schema may reconstruct a best-effort object from the free
//! text. Recognizers are registered on the client by the caller; the core
//! pipeline knows nothing about concrete field names. The built-ins here
//! cover the three shapes the original callers need (a two-point path, a
//! point list, a classification label) and take their field names as
//! constructor arguments.
//!
//! Recognizers also own normalization: lightly reshaping an already-parsed
//! value toward the schema (lifting a flat object into a one-element list,
//! echoing the user prompt into an expected field). Normalization never
//! invents data the model did not provide.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};

/// A caller-supplied salvage plugin keyed on schema shape.
pub trait ShapeRecognizer: Send + Sync {
    /// Recognizer name, used in diagnostics.
    fn name(&self) -> &str;

    /// Whether this recognizer applies to the given schema.
    fn matches(&self, schema: &Value) -> bool;

    /// Best-effort reconstruction of a schema-shaped object from free text.
    fn salvage(&self, schema: &Value, text: &str) -> Option<Value>;

    /// Reshape an already-parsed value toward the schema.
    fn normalize(&self, _schema: &Value, value: Value, _prompt: Option<&str>) -> Value {
        value
    }
}

/// The schema's declared object properties, if any.
pub fn schema_properties(schema: &Value) -> Option<&Map<String, Value>> {
    schema.get("properties")?.as_object()
}

fn schema_has_property(schema: &Value, name: &str) -> bool {
    schema_properties(schema).is_some_and(|p| p.contains_key(name))
}

static COORD_NAMED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)x\s*=\s*(-?\d+(?:\.\d+)?)\s*,\s*y\s*=\s*(-?\d+(?:\.\d+)?)").unwrap()
});
static COORD_PAREN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(\s*(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)\s*\)").unwrap());

/// Extract coordinate pairs from free text.
///
/// Two pattern families are recognized: `x=<n>, y=<n>` and `(<n>, <n>)`.
/// Matches from both families are merged in text order and deduplicated
/// while preserving first-seen order.
pub fn scan_coordinates(text: &str) -> Vec<(f64, f64)> {
    let mut matches: Vec<(usize, f64, f64)> = Vec::new();
    for re in [&*COORD_NAMED, &*COORD_PAREN] {
        for captures in re.captures_iter(text) {
            let pos = captures.get(0).map(|m| m.start()).unwrap_or(0);
            let x = captures.get(1).and_then(|m| m.as_str().parse::<f64>().ok());
            let y = captures.get(2).and_then(|m| m.as_str().parse::<f64>().ok());
            if let (Some(x), Some(y)) = (x, y) {
                matches.push((pos, x, y));
            }
        }
    }
    matches.sort_by_key(|(pos, _, _)| *pos);

    let mut seen = HashSet::new();
    let mut coords = Vec::new();
    for (_, x, y) in matches {
        if seen.insert((x.to_bits(), y.to_bits())) {
            coords.push((x, y));
        }
    }
    coords
}

/// Render a coordinate as an integer JSON number when it has no fraction.
fn num(v: f64) -> Value {
    if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        json!(v as i64)
    } else {
        json!(v)
    }
}

fn point(x: f64, y: f64) -> Value {
    json!({"x": num(x), "y": num(y)})
}

/// Echo the user prompt into `field` when the schema expects it and the
/// object does not already carry it.
fn inject_prompt_echo(schema: &Value, value: &mut Value, field: &str, prompt: Option<&str>) {
    let Some(prompt) = prompt else { return };
    if !schema_has_property(schema, field) {
        return;
    }
    if let Value::Object(map) = value {
        if !map.contains_key(field) {
            map.insert(field.to_string(), json!(prompt));
        }
    }
}

/// Recognizer for a drag path: a list with one `{start, end}` element.
pub struct PathShape {
    field: String,
    prompt_echo: String,
}

impl PathShape {
    pub fn new(field: impl Into<String>, prompt_echo: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            prompt_echo: prompt_echo.into(),
        }
    }
}

impl Default for PathShape {
    fn default() -> Self {
        Self::new("paths", "prompt")
    }
}

impl ShapeRecognizer for PathShape {
    fn name(&self) -> &str {
        "path"
    }

    fn matches(&self, schema: &Value) -> bool {
        schema_has_property(schema, &self.field)
    }

    fn salvage(&self, _schema: &Value, text: &str) -> Option<Value> {
        let coords = scan_coordinates(text);
        if coords.len() < 2 {
            return None;
        }
        let (sx, sy) = coords[0];
        let (ex, ey) = coords[coords.len() - 1];
        Some(json!({
            self.field.clone(): [{"start": point(sx, sy), "end": point(ex, ey)}]
        }))
    }

    fn normalize(&self, schema: &Value, mut value: Value, prompt: Option<&str>) -> Value {
        // Lift a flat {start, end} object into the expected one-element list.
        let flat = value
            .as_object()
            .is_some_and(|m| m.contains_key("start") && m.contains_key("end"));
        if flat {
            value = json!({ self.field.clone(): [value] });
        }
        inject_prompt_echo(schema, &mut value, &self.prompt_echo, prompt);
        value
    }
}

/// Recognizer for a list of click points.
pub struct PointListShape {
    field: String,
    prompt_echo: String,
}

impl PointListShape {
    pub fn new(field: impl Into<String>, prompt_echo: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            prompt_echo: prompt_echo.into(),
        }
    }
}

impl Default for PointListShape {
    fn default() -> Self {
        Self::new("points", "prompt")
    }
}

impl ShapeRecognizer for PointListShape {
    fn name(&self) -> &str {
        "point_list"
    }

    fn matches(&self, schema: &Value) -> bool {
        schema_has_property(schema, &self.field)
    }

    fn salvage(&self, _schema: &Value, text: &str) -> Option<Value> {
        let coords = scan_coordinates(text);
        if coords.is_empty() {
            return None;
        }
        let points: Vec<Value> = coords.into_iter().map(|(x, y)| point(x, y)).collect();
        Some(json!({ self.field.clone(): points }))
    }

    fn normalize(&self, schema: &Value, mut value: Value, prompt: Option<&str>) -> Value {
        // Lift a flat {x, y} object into the expected one-element list.
        let flat = value
            .as_object()
            .is_some_and(|m| m.contains_key("x") && m.contains_key("y") && !m.contains_key(&self.field));
        if flat {
            value = json!({ self.field.clone(): [value] });
        }
        inject_prompt_echo(schema, &mut value, &self.prompt_echo, prompt);
        value
    }
}

/// Recognizer for a single classification label.
///
/// Applies only when the schema declares an `enum` for the label field; the
/// earliest enum variant appearing in the text (case-insensitive) wins. With
/// no declared variants there is nothing to recognize without inventing data.
pub struct LabelShape {
    field: String,
    prompt_echo: String,
}

impl LabelShape {
    pub fn new(field: impl Into<String>, prompt_echo: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            prompt_echo: prompt_echo.into(),
        }
    }

    fn variants<'a>(&self, schema: &'a Value) -> Option<&'a Vec<Value>> {
        schema_properties(schema)?
            .get(&self.field)?
            .get("enum")?
            .as_array()
    }
}

impl Default for LabelShape {
    fn default() -> Self {
        Self::new("label", "prompt")
    }
}

impl ShapeRecognizer for LabelShape {
    fn name(&self) -> &str {
        "label"
    }

    fn matches(&self, schema: &Value) -> bool {
        self.variants(schema).is_some_and(|v| !v.is_empty())
    }

    fn salvage(&self, schema: &Value, text: &str) -> Option<Value> {
        let lowered = text.to_lowercase();
        let mut best: Option<(usize, &str)> = None;
        for variant in self.variants(schema)? {
            let Some(label) = variant.as_str() else { continue };
            if let Some(pos) = lowered.find(&label.to_lowercase()) {
                if best.map_or(true, |(p, _)| pos < p) {
                    best = Some((pos, label));
                }
            }
        }
        best.map(|(_, label)| json!({ self.field.clone(): label }))
    }

    fn normalize(&self, schema: &Value, mut value: Value, prompt: Option<&str>) -> Value {
        if let Value::String(label) = &value {
            value = json!({ self.field.clone(): label });
        }
        inject_prompt_echo(schema, &mut value, &self.prompt_echo, prompt);
        value
    }
}
