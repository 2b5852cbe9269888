//! Resource ceilings applied to payloads before binding.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Payload size ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ExecutionLimits {
    /// Maximum number of top-level fields.
    pub max_fields: usize,
    /// Maximum length in bytes of any string value or object key.
    pub max_string_len: usize,
    /// Maximum nesting depth of arrays and objects.
    pub max_depth: usize,
    /// Maximum element count of any single array or object.
    pub max_collection_len: usize,
    /// Maximum number of values across the whole payload.
    pub max_total_elements: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_fields: 256,
            max_string_len: 1024 * 1024,
            max_depth: 32,
            max_collection_len: 10_000,
            max_total_elements: 100_000,
        }
    }
}

/// A payload exceeded one of the [`ExecutionLimits`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitViolation {
    /// Too many top-level fields.
    #[error("input has {count} fields, limit is {limit}")]
    TooManyFields {
        /// Observed count.
        count: usize,
        /// Configured limit.
        limit: usize,
    },
    /// A string or key is too long.
    #[error("string of {len} bytes exceeds limit of {limit}")]
    StringTooLong {
        /// Observed length.
        len: usize,
        /// Configured limit.
        limit: usize,
    },
    /// Nesting is too deep.
    #[error("input nesting exceeds depth limit of {limit}")]
    TooDeep {
        /// Configured limit.
        limit: usize,
    },
    /// A single collection is too large.
    #[error("collection of {len} elements exceeds limit of {limit}")]
    CollectionTooLarge {
        /// Observed element count.
        len: usize,
        /// Configured limit.
        limit: usize,
    },
    /// The payload holds too many values overall.
    #[error("input exceeds total element limit of {limit}")]
    TooManyElements {
        /// Configured limit.
        limit: usize,
    },
}

impl ExecutionLimits {
    /// Checks a payload object against the limits.
    ///
    /// # Errors
    ///
    /// Returns the first [`LimitViolation`] found.
    pub fn check(&self, object: &Map<String, Value>) -> Result<(), LimitViolation> {
        if object.len() > self.max_fields {
            return Err(LimitViolation::TooManyFields {
                count: object.len(),
                limit: self.max_fields,
            });
        }
        let mut walk = Walk {
            limits: self,
            seen: 0,
        };
        walk.object(object, 1)
    }
}

struct Walk<'a> {
    limits: &'a ExecutionLimits,
    seen: usize,
}

impl Walk<'_> {
    fn enter(&mut self, len: usize, depth: usize) -> Result<(), LimitViolation> {
        if depth > self.limits.max_depth {
            return Err(LimitViolation::TooDeep {
                limit: self.limits.max_depth,
            });
        }
        if len > self.limits.max_collection_len {
            return Err(LimitViolation::CollectionTooLarge {
                len,
                limit: self.limits.max_collection_len,
            });
        }
        self.count(len)
    }

    fn count(&mut self, additional: usize) -> Result<(), LimitViolation> {
        self.seen = self.seen.saturating_add(additional);
        if self.seen > self.limits.max_total_elements {
            return Err(LimitViolation::TooManyElements {
                limit: self.limits.max_total_elements,
            });
        }
        Ok(())
    }

    fn text(&self, text: &str) -> Result<(), LimitViolation> {
        if text.len() > self.limits.max_string_len {
            return Err(LimitViolation::StringTooLong {
                len: text.len(),
                limit: self.limits.max_string_len,
            });
        }
        Ok(())
    }

    fn object(&mut self, object: &Map<String, Value>, depth: usize) -> Result<(), LimitViolation> {
        self.enter(object.len(), depth)?;
        for (key, value) in object {
            self.text(key)?;
            self.value(value, depth)?;
        }
        Ok(())
    }

    fn value(&mut self, value: &Value, depth: usize) -> Result<(), LimitViolation> {
        match value {
            Value::String(text) => self.text(text),
            Value::Array(items) => {
                self.enter(items.len(), depth + 1)?;
                items.iter().try_for_each(|item| self.value(item, depth + 1))
            }
            Value::Object(object) => self.object(object, depth + 1),
            Value::Null | Value::Bool(_) | Value::Number(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(limits: ExecutionLimits, value: &Value) -> Result<(), LimitViolation> {
        limits.check(value.as_object().unwrap())
    }

    fn nested(depth: usize) -> Value {
        (0..depth).fold(json!(1), |inner, _| json!({ "n": inner }))
    }

    #[test]
    fn accepts_ordinary_payloads() {
        let payload = json!({"message": "hi", "items": [1, 2, 3], "nested": {"a": true}});
        assert_eq!(check(ExecutionLimits::default(), &payload), Ok(()));
    }

    #[test]
    fn rejects_too_many_fields() {
        let limits = ExecutionLimits {
            max_fields: 1,
            ..ExecutionLimits::default()
        };
        let err = check(limits, &json!({"a": 1, "b": 2})).unwrap_err();
        assert_eq!(err, LimitViolation::TooManyFields { count: 2, limit: 1 });
    }

    #[test]
    fn rejects_long_strings_and_keys() {
        let limits = ExecutionLimits {
            max_string_len: 4,
            ..ExecutionLimits::default()
        };
        assert!(check(limits, &json!({"a": "12345"})).is_err());
        assert!(check(limits, &json!({"longkey": 1})).is_err());
        assert!(check(limits, &json!({"a": "1234"})).is_ok());
    }

    #[test]
    fn rejects_deep_nesting() {
        let limits = ExecutionLimits {
            max_depth: 3,
            ..ExecutionLimits::default()
        };
        assert!(check(limits, &nested(3)).is_ok());
        assert_eq!(
            check(limits, &nested(4)),
            Err(LimitViolation::TooDeep { limit: 3 })
        );
    }

    #[test]
    fn rejects_large_collections() {
        let limits = ExecutionLimits {
            max_collection_len: 2,
            ..ExecutionLimits::default()
        };
        let err = check(limits, &json!({"a": [1, 2, 3]})).unwrap_err();
        assert!(matches!(err, LimitViolation::CollectionTooLarge { len: 3, .. }));
    }

    #[test]
    fn enforces_global_budget() {
        let limits = ExecutionLimits {
            max_total_elements: 5,
            ..ExecutionLimits::default()
        };
        let err = check(limits, &json!({"a": [1, 2], "b": [3, 4]})).unwrap_err();
        assert_eq!(err, LimitViolation::TooManyElements { limit: 5 });
    }

    #[test]
    fn deserializes_partial_config() {
        let limits: ExecutionLimits = serde_json::from_value(json!({"max_depth": 4})).unwrap();
        assert_eq!(limits.max_depth, 4);
        assert_eq!(limits.max_fields, 256);
    }
}
