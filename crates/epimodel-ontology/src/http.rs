//! Live oracle backed by a knowledge-graph service.
//!
//! One POST per queried pair against `{base_url}/api/relations`, restricted to
//! the subclass-of / part-of relation types and to paths running from the
//! child towards the parent. The service is expected to answer with a JSON
//! array of matching relations; any non-empty answer affirms the pair.
//!
//! Nothing here retries. Transport failures and non-2xx statuses surface as
//! [`OracleError::Unavailable`]; wrap the oracle in a
//! [`CachedOracle`](crate::CachedOracle) to avoid repeat queries.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{split_curie, OracleError, RefinementOracle, REFINEMENT_RELATIONS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpOracleConfig {
    /// Service root, e.g. `http://localhost:8771`
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Relation types the closure is taken over
    pub relations: Vec<String>,
    /// Maximum hop count per query (the service materializes the closure)
    pub max_hops: u32,
}

impl Default for HttpOracleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8771".to_string(),
            timeout_secs: 30,
            relations: REFINEMENT_RELATIONS.iter().map(|r| r.to_string()).collect(),
            max_hops: 1,
        }
    }
}

pub struct HttpOracle {
    client: reqwest::blocking::Client,
    url: String,
    config: HttpOracleConfig,
}

impl HttpOracle {
    pub fn new(config: HttpOracleConfig) -> Result<Self, OracleError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OracleError::Unavailable {
                message: format!("failed to build http client: {e}"),
            })?;
        let url = format!("{}/api/relations", config.base_url.trim_end_matches('/'));
        Ok(Self {
            client,
            url,
            config,
        })
    }

    pub fn config(&self) -> &HttpOracleConfig {
        &self.config
    }
}

impl RefinementOracle for HttpOracle {
    fn is_ontological_child(&self, child: &str, parent: &str) -> Result<bool, OracleError> {
        split_curie(child)?;
        split_curie(parent)?;
        let body = json!({
            "source_curie": child,
            "target_curie": parent,
            "relations": self.config.relations,
            "direction": "right",
            "minimum_length": 1,
            "maximum_length": self.config.max_hops,
            "limit": 1,
        });

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .map_err(|e| OracleError::Unavailable {
                message: format!("failed to reach ontology service at {}: {e}", self.url),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().unwrap_or_default();
            return Err(OracleError::Unavailable {
                message: format!("ontology service http error {status}: {text}"),
            });
        }

        let relations: Vec<serde_json::Value> =
            resp.json().map_err(|e| OracleError::Unavailable {
                message: format!("malformed ontology service response: {e}"),
            })?;
        Ok(!relations.is_empty())
    }
}
