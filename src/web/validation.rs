use crate::erx::{amp, ResultE};
use crate::web::define::HttpMethod;
use crate::web::url::parse_query;
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::marker::PhantomData;

/// 验证错误
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub code: Option<String>,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into(), code: None }
    }

    pub fn with_code(field: impl Into<String>, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into(), code: Some(code.into()) }
    }
}

/// 验证结果
/// empty means every rule passed
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn invalid(errors: Vec<ValidationError>) -> Self {
        Self { errors }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        self.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
    }

    pub fn has_field_error(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    pub fn get_field_errors(&self, field: &str) -> Vec<&ValidationError> {
        self.errors.iter().filter(|e| e.field == field).collect()
    }
}

impl From<validator::ValidationErrors> for ValidationResult {
    fn from(value: validator::ValidationErrors) -> Self {
        let mut errors: Vec<ValidationError> = value
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                let field = field.to_string();
                errs.iter()
                    .map(|e| {
                        let message = e.message.as_ref().map(|m| m.to_string()).unwrap_or_else(|| format!("{} is invalid", field));
                        ValidationError::with_code(field.clone(), message, e.code.to_string())
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        // field_errors is a HashMap
        errors.sort_by(|a, b| a.field.cmp(&b.field));
        Self { errors }
    }
}

/// flattened request input: query pairs overlaid by a form or JSON object body
#[derive(Clone, Debug, Default)]
pub struct Input {
    values: Map<String, Value>,
    malformed: Option<String>,
}

impl Input {
    pub fn from_query(query: &str) -> Self {
        let values = parse_query(query).into_iter().map(|(k, v)| (k, Value::String(v))).collect();
        Self { values, malformed: None }
    }

    pub fn from_parts(parts: &Parts, body: &[u8]) -> Self {
        let mut input = Self::from_query(parts.uri.query().unwrap_or_default());
        if body.is_empty() || !HttpMethod::has_body(parts.method.as_str()) {
            return input;
        }

        let content_type = parts.headers.get(axum::http::header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or_default();

        // media types compare case-insensitively, parameters such as charset are ignored
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        if essence.eq_ignore_ascii_case("application/json") {
            input.merge_json(body);
        } else if essence.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
            input.merge_form(body);
        }

        input
    }

    pub fn merge_form(&mut self, body: &[u8]) {
        let form = String::from_utf8_lossy(body);
        for (k, v) in parse_query(&form) {
            self.values.insert(k, Value::String(v));
        }
    }

    pub fn merge_json(&mut self, body: &[u8]) {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) => self.values.extend(map),
            Ok(_) => self.malformed = Some(crate::s!("json body must be an object")),
            Err(e) => self.malformed = Some(format!("json body invalid: {}", e)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// strings as is, numbers and booleans rendered, null and containers are None
    pub fn get_str(&self, field: &str) -> Option<String> {
        match self.values.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn malformed(&self) -> Option<&str> {
        self.malformed.as_deref()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

/// 验证规则
pub trait ValidationRule: Send + Sync {
    fn validate(&self, input: &Input) -> ValidationResult;
}

/// field must be present and not blank
pub struct Required(pub String);

impl Required {
    pub fn new(field: impl Into<String>) -> Self {
        Self(field.into())
    }
}

impl ValidationRule for Required {
    fn validate(&self, input: &Input) -> ValidationResult {
        let present = match input.get(&self.0) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        };

        if present {
            return ValidationResult::valid();
        }

        ValidationResult::invalid(vec![ValidationError::with_code(&self.0, format!("{} is required", self.0), "required")])
    }
}

/// field, when present, must match the pattern
pub struct Matches {
    field: String,
    pattern: regex::Regex,
    message: String,
}

impl Matches {
    pub fn new(field: impl Into<String>, pattern: &str) -> ResultE<Self> {
        let field = field.into();
        let pattern = regex::Regex::new(pattern).map_err(amp("invalid pattern"))?;
        let message = format!("{} has an invalid format", field);
        Ok(Self { field, pattern, message })
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl ValidationRule for Matches {
    fn validate(&self, input: &Input) -> ValidationResult {
        match input.get_str(&self.field) {
            Some(v) if !self.pattern.is_match(&v) => {
                ValidationResult::invalid(vec![ValidationError::with_code(&self.field, &self.message, "pattern")])
            },
            _ => ValidationResult::valid(),
        }
    }
}

/// character count of a present field within min..=max
pub struct Length {
    pub field: String,
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Length {
    pub fn new(field: impl Into<String>, min: Option<usize>, max: Option<usize>) -> Self {
        Self { field: field.into(), min, max }
    }
}

impl ValidationRule for Length {
    fn validate(&self, input: &Input) -> ValidationResult {
        let Some(v) = input.get_str(&self.field) else {
            return ValidationResult::valid();
        };

        let count = v.chars().count();
        let short = self.min.is_some_and(|min| count < min);
        let long = self.max.is_some_and(|max| count > max);
        if !short && !long {
            return ValidationResult::valid();
        }

        let message = match (self.min, self.max) {
            (Some(min), Some(max)) => format!("{} must be between {} and {} characters", self.field, min, max),
            (Some(min), None) => format!("{} must be at least {} characters", self.field, min),
            (None, Some(max)) => format!("{} must be at most {} characters", self.field, max),
            (None, None) => format!("{} has an invalid length", self.field),
        };
        ValidationResult::invalid(vec![ValidationError::with_code(&self.field, message, "length")])
    }
}

/// deserialize the whole input into `T` and run its `validator` rules
pub struct Typed<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Typed<T> {
    pub fn new() -> Self {
        Self { _marker: PhantomData }
    }
}

impl<T> Default for Typed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ValidationRule for Typed<T>
where
    T: validator::Validate + DeserializeOwned,
{
    fn validate(&self, input: &Input) -> ValidationResult {
        match serde_json::from_value::<T>(input.to_value()) {
            Ok(typed) => match typed.validate() {
                Ok(()) => ValidationResult::valid(),
                Err(errors) => errors.into(),
            },
            Err(e) => ValidationResult::invalid(vec![ValidationError::with_code("input", e.to_string(), "deserialize")]),
        }
    }
}

/// ordered rule set
#[derive(Default)]
pub struct Rules {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, rule: impl ValidationRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn required(self, field: impl Into<String>) -> Self {
        self.add(Required::new(field))
    }

    pub fn length(self, field: impl Into<String>, min: Option<usize>, max: Option<usize>) -> Self {
        self.add(Length::new(field, min, max))
    }

    pub fn matches(self, field: impl Into<String>, pattern: &str) -> ResultE<Self> {
        Ok(self.add(Matches::new(field, pattern)?))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// run every rule, errors accumulate in rule order
    pub fn check(&self, input: &Input) -> ValidationResult {
        let mut result = ValidationResult::valid();
        if let Some(malformed) = input.malformed() {
            result.add_error(ValidationError::with_code("body", malformed, "malformed"));
        }

        for rule in &self.rules {
            result.merge(rule.validate(input));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use validator::Validate;

    fn parts(method: &str, uri: &str, content_type: Option<&str>) -> Parts {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(ct) = content_type {
            builder = builder.header("content-type", ct);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_result_merge() {
        let mut r = ValidationResult::valid();
        assert!(r.is_empty());
        r.merge(ValidationResult::valid());
        assert!(r.is_valid());

        r.add_error(ValidationError::new("email", "bad"));
        r.merge(ValidationResult::invalid(vec![ValidationError::new("password", "short"), ValidationError::new("email", "worse")]));
        assert_eq!(r.len(), 3);
        assert!(!r.is_empty());
        assert!(r.has_field_error("password"));
        assert_eq!(r.get_field_errors("email").len(), 2);
        assert!(!r.has_field_error("name"));
    }

    #[test]
    fn test_input_sources() {
        let p = parts("POST", "/login?email=q%40x.io&from=query", Some("application/x-www-form-urlencoded"));
        let input = Input::from_parts(&p, b"email=form%40x.io&password=secret");
        assert_eq!(input.get_str("email").unwrap(), "form@x.io");
        assert_eq!(input.get_str("from").unwrap(), "query");
        assert_eq!(input.get_str("password").unwrap(), "secret");

        let p = parts("POST", "/login", Some("application/json; charset=utf-8"));
        let input = Input::from_parts(&p, br#"{"age": 7, "ok": true, "none": null}"#);
        assert_eq!(input.get_str("age").unwrap(), "7");
        assert_eq!(input.get_str("ok").unwrap(), "true");
        assert!(input.get_str("none").is_none());

        let input = Input::from_parts(&p, b"[1,2]");
        assert!(input.malformed().is_some());

        // GET bodies are ignored
        let p = parts("GET", "/auth?x=1", Some("application/json"));
        let input = Input::from_parts(&p, b"not json");
        assert!(input.malformed().is_none());
        assert_eq!(input.get_str("x").unwrap(), "1");
    }

    #[test]
    fn test_content_type_case_insensitive() {
        let p = parts("POST", "/login", Some("Application/JSON ; Charset=UTF-8"));
        let input = Input::from_parts(&p, br#"{"email": "a@b.io"}"#);
        assert_eq!(input.get_str("email").unwrap(), "a@b.io");

        let p = parts("POST", "/login", Some("APPLICATION/X-WWW-FORM-URLENCODED"));
        let input = Input::from_parts(&p, b"email=a%40b.io");
        assert_eq!(input.get_str("email").unwrap(), "a@b.io");

        let p = parts("POST", "/login", Some("text/plain"));
        let input = Input::from_parts(&p, b"email=a%40b.io");
        assert!(input.get("email").is_none());
    }

    #[test]
    fn test_rules() {
        let rules = Rules::new()
            .required("email")
            .matches("email", r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
            .unwrap()
            .required("password")
            .length("password", Some(8), Some(64));
        assert_eq!(rules.len(), 4);

        let ok = rules.check(&Input::from_query("email=a%40b.io&password=12345678"));
        assert!(ok.is_empty());

        let bad = rules.check(&Input::from_query("email=nope&password=123"));
        assert_eq!(bad.len(), 2);
        assert_eq!(bad.errors()[0].code.as_deref(), Some("pattern"));
        assert_eq!(bad.errors()[1].code.as_deref(), Some("length"));

        let missing = rules.check(&Input::from_query("password=%20%20"));
        assert!(missing.has_field_error("email"));
        assert!(missing.has_field_error("password"));

        assert!(Rules::new().matches("x", "(").is_err());
    }

    #[derive(Deserialize, Validate)]
    struct Login {
        #[validate(email)]
        email: String,
        #[validate(length(min = 8, message = "password too short"))]
        password: String,
    }

    #[test]
    fn test_typed() {
        let rule: Typed<Login> = Typed::new();
        assert!(rule.validate(&Input::from_query("email=a%40b.io&password=12345678")).is_empty());

        let r = rule.validate(&Input::from_query("email=nope&password=1"));
        assert_eq!(r.len(), 2);
        assert_eq!(r.errors()[0].field, "email");
        assert_eq!(r.errors()[1].message, "password too short");

        let r = rule.validate(&Input::from_query("email=a%40b.io"));
        assert!(r.has_field_error("input"));
    }
}
