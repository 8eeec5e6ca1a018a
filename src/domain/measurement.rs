use crate::domain::FieldValue;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

pub type Fields = HashMap<String, FieldValue>;

pub const MEASUREMENT_NAME: &str = "broadcasttools";

/// All fields decoded from one device in one poll cycle, reported together.
#[derive(Clone, Debug, PartialEq)]
pub struct Measurement {
    pub name: &'static str,
    pub tags: HashMap<String, String>,
    pub fields: Fields,
    pub timestamp: DateTime<Utc>,
}

impl Measurement {
    pub fn new(server: &str, fields: Fields) -> Self {
        Measurement {
            name: MEASUREMENT_NAME,
            tags: HashMap::from([("server".to_string(), server.to_string())]),
            fields,
            timestamp: Utc::now(),
        }
    }

    pub fn server(&self) -> Option<&str> {
        self.tags.get("server").map(String::as_str)
    }

    /// Renders the measurement as InfluxDB line protocol, sorted by key.
    /// Absent fields are left out; `None` when no field is left to write.
    pub fn to_line(&self) -> Option<String> {
        let mut tags = self.tags.iter().collect::<Vec<_>>();
        tags.sort();
        let mut fields = self.fields.iter().filter(|(_, value)| !value.is_absent()).collect::<Vec<_>>();
        if fields.is_empty() {
            return None;
        }
        fields.sort_by(|a, b| a.0.cmp(b.0));

        let tags = tags
            .into_iter()
            .map(|(key, value)| format!(",{}={}", escape(key), escape(value)))
            .collect::<String>();
        let fields = fields
            .into_iter()
            .map(|(key, value)| format!("{}={}", escape(key), line_value(value)))
            .collect::<Vec<_>>()
            .join(",");

        Some(format!(
            "{}{} {} {}",
            self.name,
            tags,
            fields,
            self.timestamp.timestamp_nanos_opt().unwrap_or_default()
        ))
    }
}

fn escape(s: &str) -> String {
    s.replace(',', "\\,").replace('=', "\\=").replace(' ', "\\ ")
}

fn line_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Integer(n) => format!("{}i", n),
        FieldValue::Float(n) => n.to_string(),
        FieldValue::Boolean(b) => b.to_string(),
        FieldValue::Text(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        FieldValue::Absent => String::new(),
    }
}
