//! Tolerant JSON extraction from model replies.
//!
//! Completion models wrap JSON in markdown fences, prepend chatter, or
//! return a bare object where a list was asked for. These helpers locate
//! the payload and parse it without trusting the reply's framing.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use leadsense_shared::{CompanyData, LeadsenseError, Provenance, Result};

/// Locate the JSON payload inside a model reply.
///
/// Preference order: the body of the first ``` fence (an optional language
/// tag on the opening line is skipped), then the first complete JSON value
/// that starts at a `[` or `{`. Parsing stops at the end of that value, so
/// commentary after it is ignored. Bracketed text that is not JSON (`[Answer]`)
/// or a list of bare scalars (a `[2]` footnote) is passed over in favour of a
/// later object or list of objects, and only used when nothing better follows.
pub fn extract_json_payload(reply: &str) -> Option<&str> {
    let trimmed = reply.trim();

    if let Some(start) = trimmed.find("```") {
        let after_fence = start + 3;
        let body_start = trimmed[after_fence..]
            .find('\n')
            .map(|i| after_fence + i + 1)
            .unwrap_or(after_fence);
        if let Some(end) = trimmed[body_start..].find("```") {
            let body = trimmed[body_start..body_start + end].trim();
            if !body.is_empty() {
                return Some(body);
            }
        }
    }

    let mut scalar_list = None;
    for (start, _) in trimmed.match_indices(['[', '{']) {
        let Some((value, end)) = first_value(&trimmed[start..]) else {
            continue;
        };
        let payload = &trimmed[start..start + end];
        if holds_structure(&value) {
            return Some(payload);
        }
        scalar_list.get_or_insert(payload);
    }
    scalar_list
}

/// Parse one JSON value from the front of `text`, returning it with the
/// byte length it occupied.
fn first_value(text: &str) -> Option<(Value, usize)> {
    let mut stream = serde_json::Deserializer::from_str(text).into_iter::<Value>();
    match stream.next() {
        Some(Ok(value)) => Some((value, stream.byte_offset())),
        _ => None,
    }
}

/// Objects, empty lists, and lists with at least one nested object or list.
fn holds_structure(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::Array(items) => {
            items.is_empty() || items.iter().any(|v| v.is_object() || v.is_array())
        }
        _ => false,
    }
}

/// Parse a reply into `T`, using [`extract_json_payload`] to find the JSON.
pub fn parse_json_reply<T: DeserializeOwned>(reply: &str) -> Result<T> {
    let payload = extract_json_payload(reply)
        .ok_or_else(|| LeadsenseError::parse("no JSON found in model reply"))?;
    serde_json::from_str(payload)
        .map_err(|e| LeadsenseError::parse(format!("invalid JSON in model reply: {e}")))
}

// ---------------------------------------------------------------------------
// Company objects
// ---------------------------------------------------------------------------

/// A company object as the model returned it, before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCompany {
    pub company_name: Option<String>,
    pub website_url: Option<String>,
    pub address: Option<String>,
    pub contact_email: Option<String>,
    pub phone_number: Option<String>,
    pub description: Option<String>,
    pub automation_proposal: Option<String>,
}

impl RawCompany {
    fn from_object(obj: &Map<String, Value>) -> Self {
        Self {
            company_name: field(obj, "company_name"),
            website_url: field(obj, "website_url"),
            address: field(obj, "address"),
            contact_email: field(obj, "contact_email"),
            phone_number: field(obj, "phone_number"),
            description: field(obj, "description"),
            automation_proposal: field(obj, "automation_proposal"),
        }
    }

    /// Promote to a [`CompanyData`]. `None` when the name is missing.
    pub fn into_company(self, source_url: &str, provenance: Provenance) -> Option<CompanyData> {
        let name = self.company_name?;
        let mut company = CompanyData::new(name, source_url, provenance);
        company.website_url = self.website_url;
        company.address = self.address;
        company.contact_email = self.contact_email;
        company.phone_number = self.phone_number;
        company.description = self.description;
        company.automation_proposal = self.automation_proposal;
        Some(company)
    }
}

/// Read a string-ish field. Blank strings and nulls become `None`; numbers
/// (phone numbers are often emitted unquoted) are stringified.
fn field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    let value = match obj.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!value.is_empty()).then_some(value)
}

/// Parse a reply expected to hold a list of company objects.
///
/// A single object is accepted as a one-element list. Non-object list
/// entries are skipped. Anything else is a parse error.
pub fn parse_company_objects(reply: &str) -> Result<Vec<RawCompany>> {
    let value: Value = parse_json_reply(reply)?;
    match value {
        Value::Array(items) => {
            let total = items.len();
            let objects: Vec<RawCompany> = items
                .iter()
                .filter_map(Value::as_object)
                .map(RawCompany::from_object)
                .collect();
            if objects.len() < total {
                debug!(total, kept = objects.len(), "skipped non-object list entries");
            }
            Ok(objects)
        }
        Value::Object(obj) => Ok(vec![RawCompany::from_object(&obj)]),
        other => Err(LeadsenseError::parse(format!(
            "expected a list of company objects, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
