use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GenerateEmbeddingsParams {
    #[schemars(
        description = "Semicolon-delimited tags (e.g. 'Trains; toys; multi word tag'). Tags are trimmed, lower-cased and de-duplicated."
    )]
    #[serde(default)]
    pub tags: String,

    #[schemars(
        description = "Free-text inputs. Each yields exactly one embedding, in order. Long texts are chunked and averaged."
    )]
    #[serde(default)]
    pub texts: Vec<String>,
}
