use crate::domain::{FieldValue, Fields};
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt::Display;
use std::sync::LazyLock;
use tracing::{debug, trace};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Temperature,
    Meter,
    VoltageCurrent,
    Status,
    Relay,
}

impl Category {
    pub fn tag(&self) -> &'static str {
        match self {
            Category::Temperature => "temp",
            Category::Meter => "meter",
            Category::VoltageCurrent => "vc",
            Category::Status => "status",
            Category::Relay => "relay",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

type Extractor = fn(Option<&Value>) -> FieldValue;

/// Maps a sensor key naming convention to the key holding its value.
///
/// A sensor key like `T101` announces temperature sensor 1; its reading lives
/// under `TempValue01`.
#[derive(Clone, Debug)]
pub struct Rule {
    pattern: Regex,
    category: Category,
    value_key: &'static str,
    extract: Extractor,
}

impl Rule {
    fn new(pattern: &str, category: Category, value_key: &'static str, extract: Extractor) -> Self {
        Rule {
            // Literal patterns, covered by tests
            pattern: Regex::new(pattern).unwrap(),
            category,
            value_key,
            extract,
        }
    }
}

pub static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::new(r"^T1(\d{1,2})$", Category::Temperature, "TempValue", temperature),
        Rule::new(r"^M1(\d{1,2})$", Category::Meter, "MeterValue", pass_through),
        Rule::new(r"^VCLabel(\d{1,2})$", Category::VoltageCurrent, "VCValue", pass_through),
        Rule::new(r"^S1(\d{1,2})$", Category::Status, "StatusIndicator", pass_through),
        Rule::new(r"^R2(\d{1,2})$", Category::Relay, "RelayIndicator", pass_through),
    ]
});

pub fn decode(values: &Map<String, Value>) -> Fields {
    decode_with(&RULES, values)
}

pub fn decode_with(rules: &[Rule], values: &Map<String, Value>) -> Fields {
    let mut fields = Fields::new();

    for key in values.keys() {
        for rule in rules {
            let Some(captures) = rule.pattern.captures(key) else {
                continue;
            };
            let Some(index) = captures.get(1).and_then(|m| m.as_str().parse::<u32>().ok()) else {
                debug!(key = %key, "⚠️ Skipping sensor key, index is not a number");
                continue;
            };

            let value_key = format!("{}{:02}", rule.value_key, index);
            let value = (rule.extract)(values.get(&value_key));
            if value.is_absent() {
                trace!(key = %key, value_key = %value_key, "Sensor '{}' has no value", key);
            }

            fields.insert(format!("{}_{}", rule.category, index), value);
        }
    }

    fields
}

fn pass_through(value: Option<&Value>) -> FieldValue {
    value.map_or(FieldValue::Absent, FieldValue::from)
}

fn temperature(value: Option<&Value>) -> FieldValue {
    match value {
        None | Some(Value::Null) => FieldValue::Absent,
        Some(Value::String(text)) => {
            let degrees = text.strip_suffix(" *F").unwrap_or(text);
            FieldValue::Integer(degrees.parse::<i64>().unwrap_or_else(|_| {
                debug!(value = %text, "⚠️ Unparseable temperature, using 0");
                0
            }))
        }
        Some(Value::Number(n)) => {
            FieldValue::Integer(n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or_default())
        }
        Some(other) => {
            debug!(value = %other, "⚠️ Unexpected temperature type, using 0");
            FieldValue::Integer(0)
        }
    }
}
