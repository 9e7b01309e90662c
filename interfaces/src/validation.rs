use std::fmt;

use url::Url;

/// A single rejected field of a value object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every field error found while building one value object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub entity: &'static str,
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.field.as_str()).collect()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}", self.entity)?;
        for (i, error) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{}{} {}", sep, error.field, error.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Collects field errors so a constructor can report all of them at once.
pub struct Validator {
    entity: &'static str,
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new(entity: &'static str) -> Self {
        Self {
            entity,
            errors: Vec::new(),
        }
    }

    pub fn reject(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn check(&mut self, field: &str, condition: bool, message: &str) {
        if !condition {
            self.reject(field, message);
        }
    }

    pub fn text(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.reject(field, "must not be blank");
        }
    }

    /// Records a missing required value and passes the value through.
    pub fn required<T>(&mut self, field: &str, value: Option<T>) -> Option<T> {
        if value.is_none() {
            self.reject(field, "is required");
        }
        value
    }

    pub fn url(&mut self, field: &str, value: &str) {
        match Url::parse(value) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => self.reject(field, format!("unsupported scheme '{}'", url.scheme())),
            Err(e) => self.reject(field, format!("is not a valid URL ({})", e)),
        }
    }

    pub fn optional_url(&mut self, field: &str, value: Option<&str>) {
        if let Some(value) = value {
            self.url(field, value);
        }
    }

    /// Folds the errors of a nested value object under `prefix`.
    pub fn nested<T>(&mut self, prefix: &str, result: Result<T, ValidationError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(nested) => {
                for error in nested.errors {
                    self.errors.push(FieldError {
                        field: format!("{}.{}", prefix, error.field),
                        message: error.message,
                    });
                }
                None
            }
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Fails with every collected error, or builds the value from the
    /// fields pulled out through [`Validator::required`].
    pub fn finish<T>(self, build: impl FnOnce() -> Option<T>) -> Result<T, ValidationError> {
        if self.errors.is_empty() {
            if let Some(value) = build() {
                return Ok(value);
            }
        }
        Err(ValidationError {
            entity: self.entity,
            errors: self.errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_every_error_before_failing() {
        let mut v = Validator::new("party");
        v.text("name", "  ");
        v.url("image_url", "ftp://example.org/logo.png");
        let acronym: Option<&str> = v.required("acronym", None);

        let err = v.finish(|| acronym).unwrap_err();
        assert_eq!(err.entity, "party");
        assert_eq!(err.fields(), vec!["name", "image_url", "acronym"]);
    }

    #[test]
    fn builds_when_clean() {
        let mut v = Validator::new("party");
        v.text("name", "Partido");
        let acronym = v.required("acronym", Some("PT"));
        assert_eq!(v.finish(|| acronym).unwrap(), "PT");
    }

    #[test]
    fn nested_errors_are_prefixed() {
        let mut inner = Validator::new("agenda item");
        inner.text("title", "");
        let inner_result: Result<(), _> = inner.finish(|| Some(()));

        let mut outer = Validator::new("event");
        assert!(outer.nested("agenda[1]", inner_result).is_none());
        let err = outer.finish(|| Some(())).unwrap_err();
        assert!(err.has_field("agenda[1].title"));
        assert_eq!(err.to_string(), "invalid event: agenda[1].title must not be blank");
    }
}
