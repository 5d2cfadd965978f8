// Copyright 2024 OctoFHIR Team
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

//! Engine configuration

use serde::{Deserialize, Serialize};

use crate::parser::DEFAULT_MAX_PARSE_DEPTH;

/// Configuration options for FHIRPath evaluation.
///
/// ```rust
/// use octofhir_fhirpath_engine::{EvaluationConfig, FhirPathEngine};
///
/// let config = EvaluationConfig {
///     max_recursion_depth: 128,
///     ..EvaluationConfig::default()
/// };
/// let engine = FhirPathEngine::new().with_config(config);
/// assert_eq!(engine.config().max_recursion_depth, 128);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Maximum AST nesting walked before the call fails with `RecursionLimitExceeded`
    pub max_recursion_depth: usize,
    /// Maximum nesting the parser accepts before failing with a parse error
    pub max_parse_depth: usize,
    /// Number of parsed expressions kept in the AST cache (0 disables caching)
    pub expression_cache_size: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: 512,
            max_parse_depth: DEFAULT_MAX_PARSE_DEPTH,
            expression_cache_size: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_from_json() {
        let config: EvaluationConfig =
            serde_json::from_str(r#"{"max_recursion_depth": 10}"#).unwrap();
        assert_eq!(config.max_recursion_depth, 10);
        assert_eq!(config.expression_cache_size, 1000);
        assert_eq!(config.max_parse_depth, DEFAULT_MAX_PARSE_DEPTH);
    }
}
