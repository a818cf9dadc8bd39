//! # Invocation Result
//!
//! The value a synchronous handler resolves to, validated before it is
//! turned into an HTTP response.

use serde_json::{Map, Number, Value};

use super::errors::{FunctionError, FunctionResult};

/// A validated handler result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationResult {
    /// `None` means the handler left it unset
    pub status_code: Option<u16>,
    pub body: String,
    /// Singular headers in the order the handler produced them
    pub headers: Vec<(String, String)>,
    /// Multi-value headers in the order the handler produced them
    pub multi_value_headers: Vec<(String, Vec<String>)>,
    pub is_base64_encoded: bool,
}

impl InvocationResult {
    /// Create a result with a body and everything else unset
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_multi_value_header<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.multi_value_headers
            .push((name.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    /// Mark the body as base64 encoded binary
    pub fn base64(mut self) -> Self {
        self.is_base64_encoded = true;
        self
    }

    /// Status to send, defaulting to 200
    pub fn status(&self) -> u16 {
        self.status_code.unwrap_or(200)
    }

    /// Validate a handler's resolved value.
    ///
    /// A missing value or a body that is not a string is an invalid result.
    pub fn from_value(value: Option<Value>) -> FunctionResult<Self> {
        let Some(Value::Object(mut object)) = value else {
            return Err(FunctionError::InvalidResult);
        };
        let body = match object.remove("body") {
            Some(Value::String(body)) => body,
            _ => return Err(FunctionError::InvalidResult),
        };

        let status_code = match object.get("statusCode") {
            None | Some(Value::Null) => None,
            Some(Value::Number(number)) => parse_status(number)?,
            Some(other) => return Err(FunctionError::InvalidStatusCode(other.to_string())),
        };

        let headers = match object.get("headers") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(name, value)| Ok((name.clone(), header_value(name, value)?)))
                .collect::<FunctionResult<Vec<_>>>()?,
            Some(other) => return Err(FunctionError::InvalidHeader(other.to_string())),
        };

        let multi_value_headers = match object.get("multiValueHeaders") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(name, values)| Ok((name.clone(), header_values(name, values)?)))
                .collect::<FunctionResult<Vec<_>>>()?,
            Some(other) => return Err(FunctionError::InvalidHeader(other.to_string())),
        };

        let is_base64_encoded = object
            .get("isBase64Encoded")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(Self {
            status_code,
            body,
            headers,
            multi_value_headers,
            is_base64_encoded,
        })
    }

    /// Wire form, as a handler would return it
    pub fn into_value(self) -> Value {
        let mut object = Map::new();
        if let Some(status_code) = self.status_code {
            object.insert("statusCode".to_string(), Value::from(status_code));
        }
        object.insert("body".to_string(), Value::String(self.body));
        if !self.headers.is_empty() {
            let headers = self
                .headers
                .into_iter()
                .map(|(name, value)| (name, Value::String(value)))
                .collect();
            object.insert("headers".to_string(), Value::Object(headers));
        }
        if !self.multi_value_headers.is_empty() {
            let headers = self
                .multi_value_headers
                .into_iter()
                .map(|(name, values)| {
                    (
                        name,
                        Value::Array(values.into_iter().map(Value::String).collect()),
                    )
                })
                .collect();
            object.insert("multiValueHeaders".to_string(), Value::Object(headers));
        }
        if self.is_base64_encoded {
            object.insert("isBase64Encoded".to_string(), Value::Bool(true));
        }
        Value::Object(object)
    }
}

impl From<InvocationResult> for Value {
    fn from(result: InvocationResult) -> Self {
        result.into_value()
    }
}

/// Zero counts as unset. Integral floats such as `201.0` are accepted.
fn parse_status(number: &Number) -> FunctionResult<Option<u16>> {
    let code = number.as_u64().or_else(|| {
        number
            .as_f64()
            .filter(|code| code.fract() == 0.0 && *code >= 0.0 && *code <= u16::MAX as f64)
            .map(|code| code as u64)
    });
    match code {
        Some(0) => Ok(None),
        Some(code) if (100..=999).contains(&code) => Ok(Some(code as u16)),
        _ => Err(FunctionError::InvalidStatusCode(number.to_string())),
    }
}

/// Strings pass through, numbers and booleans are stringified
fn header_value(name: &str, value: &Value) -> FunctionResult<String> {
    match value {
        Value::String(value) => Ok(value.clone()),
        Value::Number(value) => Ok(value.to_string()),
        Value::Bool(value) => Ok(value.to_string()),
        other => Err(FunctionError::InvalidHeader(format!("{}: {}", name, other))),
    }
}

fn header_values(name: &str, values: &Value) -> FunctionResult<Vec<String>> {
    match values {
        Value::Array(values) => values.iter().map(|value| header_value(name, value)).collect(),
        other => Err(FunctionError::InvalidHeader(format!("{}: {}", name, other))),
    }
}
