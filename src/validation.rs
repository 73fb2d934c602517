// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Input validation shared by engine consumers.
//!
//! Consumers (user management, authorized-keys management) validate their
//! arguments here so that rejections travel through the same fatal channel as
//! engine errors ([`crate::Error::Validation`]).

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_-]*$").expect("username pattern is valid"));

/// Maximum username length accepted by `useradd` on Linux.
const MAX_USERNAME_LENGTH: usize = 32;

/// Error type for input validation failures.
///
/// # Examples
///
/// ```
/// use dspl::validation::ValidationError;
///
/// let err = ValidationError::new("username", "contains invalid characters");
/// assert!(err.to_string().contains("username"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field or input that failed validation
    pub field: String,
    /// Description of why validation failed
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn empty(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            message: format!("{field} cannot be empty"),
            field,
        }
    }

    pub fn too_long(field: impl Into<String>, max_length: usize) -> Self {
        let field = field.into();
        Self {
            message: format!("{field} exceeds maximum length of {max_length}"),
            field,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation error for '{}': {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a POSIX account name before it is interpolated into remote commands.
///
/// Names must start with a lowercase letter and contain only lowercase letters,
/// digits, `_` and `-`.
pub fn validate_username(username: &str) -> Result<&str, ValidationError> {
    if username.is_empty() {
        return Err(ValidationError::empty("username"));
    }
    if username.len() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::too_long("username", MAX_USERNAME_LENGTH));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(ValidationError::new(
            "username",
            "must contain only lower case chars and numbers",
        ));
    }
    Ok(username)
}
