//! Seam between the credit service and whatever generates tool output.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::domain::AiTool;

#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn generate(&self, tool: AiTool, input: &Value) -> Result<Value, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("invalid tool input: {0}")]
    InvalidInput(String),
    #[error("provider transport failed: {0}")]
    Transport(String),
    #[error("provider returned {status}: {body}")]
    Upstream { status: u16, body: String },
}

fn object<'a>(input: &'a Value) -> Result<&'a Map<String, Value>, ProviderError> {
    input
        .as_object()
        .ok_or_else(|| ProviderError::InvalidInput("expected a JSON object".to_string()))
}

fn required_str<'a>(fields: &'a Map<String, Value>, key: &str) -> Result<&'a str, ProviderError> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ProviderError::InvalidInput(format!("missing field '{key}'")))
}

fn optional_u64(fields: &Map<String, Value>, key: &str) -> Option<u64> {
    fields.get(key).and_then(Value::as_u64)
}

fn string_list(fields: &Map<String, Value>, key: &str) -> Vec<String> {
    fields
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Deterministic, network-free generator. Backs the demo, tests, and any
/// deployment without a configured upstream model.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineProvider;

impl OfflineProvider {
    fn resume(fields: &Map<String, Value>) -> Result<Value, ProviderError> {
        let name = required_str(fields, "name")?;
        let years = optional_u64(fields, "years_experience").unwrap_or(0);
        let specialties = string_list(fields, "specialties");
        let headline = if specialties.is_empty() {
            format!("{name}, real estate professional")
        } else {
            format!("{name}, specialist in {}", specialties.join(", "))
        };

        Ok(json!({
            "headline": headline,
            "summary": format!(
                "{name} brings {years} years of local market experience to every client."
            ),
            "sections": ["Experience", "Specialties", "Transactions", "Certifications"],
        }))
    }

    fn listing(fields: &Map<String, Value>) -> Result<Value, ProviderError> {
        let description = required_str(fields, "description")?;
        let bedrooms = optional_u64(fields, "bedrooms");
        let bathrooms = optional_u64(fields, "bathrooms");
        let mut highlights = Vec::new();
        if let Some(beds) = bedrooms {
            highlights.push(format!("{beds} bedrooms"));
        }
        if let Some(baths) = bathrooms {
            highlights.push(format!("{baths} bathrooms"));
        }
        highlights.extend(string_list(fields, "features"));

        let title = match fields.get("address").and_then(Value::as_str) {
            Some(address) => format!("Welcome home to {address}"),
            None => "Welcome home".to_string(),
        };

        Ok(json!({
            "title": title,
            "description": format!("{}. {}", title, description.trim_end_matches('.')),
            "highlights": highlights,
        }))
    }

    fn agent_match(fields: &Map<String, Value>) -> Result<Value, ProviderError> {
        let city = required_str(fields, "city")?.to_ascii_lowercase();
        let agents = fields
            .get("agents")
            .and_then(Value::as_array)
            .ok_or_else(|| ProviderError::InvalidInput("missing field 'agents'".to_string()))?;

        let mut ranked: Vec<(u64, String)> = agents
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|agent| {
                let name = agent.get("name").and_then(Value::as_str)?;
                let deals = agent
                    .get("closed_deals")
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                let local = agent
                    .get("city")
                    .and_then(Value::as_str)
                    .is_some_and(|value| value.to_ascii_lowercase() == city);
                let score = deals + if local { 100 } else { 0 };
                Some((score, name.to_string()))
            })
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        let matches: Vec<Value> = ranked
            .into_iter()
            .take(3)
            .map(|(score, name)| json!({ "name": name, "score": score }))
            .collect();
        Ok(json!({ "matches": matches }))
    }

    fn seo_schema(fields: &Map<String, Value>) -> Result<Value, ProviderError> {
        let address = required_str(fields, "address")?;
        let price = optional_u64(fields, "price")
            .ok_or_else(|| ProviderError::InvalidInput("missing field 'price'".to_string()))?;

        let mut schema = json!({
            "@context": "https://schema.org",
            "@type": "RealEstateListing",
            "name": address,
            "offers": {
                "@type": "Offer",
                "price": price,
                "priceCurrency": fields
                    .get("currency")
                    .and_then(Value::as_str)
                    .unwrap_or("USD"),
            },
        });
        if let Some(description) = fields.get("description").and_then(Value::as_str) {
            schema["description"] = json!(description);
        }
        if let Some(url) = fields.get("url").and_then(Value::as_str) {
            schema["url"] = json!(url);
        }
        if let Some(rooms) = optional_u64(fields, "bedrooms") {
            schema["numberOfRooms"] = json!(rooms);
        }
        Ok(schema)
    }

    fn brochure(fields: &Map<String, Value>) -> Result<Value, ProviderError> {
        let description = required_str(fields, "description")?;
        let headline = fields
            .get("headline")
            .and_then(Value::as_str)
            .unwrap_or("Your next chapter starts here");
        let features = string_list(fields, "features");

        Ok(json!({
            "headline": headline,
            "body": description,
            "bullets": features,
            "call_to_action": "Schedule a private showing today.",
        }))
    }
}

#[async_trait]
impl AiProvider for OfflineProvider {
    async fn generate(&self, tool: AiTool, input: &Value) -> Result<Value, ProviderError> {
        let fields = object(input)?;
        match tool {
            AiTool::ResumeBuilder => Self::resume(fields),
            AiTool::ListingEnhancer => Self::listing(fields),
            AiTool::AgentMatcher => Self::agent_match(fields),
            AiTool::SeoSchema => Self::seo_schema(fields),
            AiTool::BrochureWriter => Self::brochure(fields),
        }
    }
}

/// Connection settings for an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

pub struct HttpProvider {
    config: HttpProviderConfig,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl HttpProvider {
    pub fn new(config: HttpProviderConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ProviderError::Transport(err.to_string()))?;
        Ok(Self { config, http })
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn system_prompt(tool: AiTool) -> &'static str {
        match tool {
            AiTool::ResumeBuilder => {
                "Write a concise real estate agent resume. Respond with a JSON object."
            }
            AiTool::ListingEnhancer => {
                "Rewrite the property listing to be vivid and accurate. Respond with a JSON object."
            }
            AiTool::AgentMatcher => {
                "Rank the supplied agents for this buyer. Respond with a JSON object."
            }
            AiTool::SeoSchema => "Produce schema.org RealEstateListing JSON-LD for the property.",
            AiTool::BrochureWriter => {
                "Write brochure copy for the property. Respond with a JSON object."
            }
        }
    }
}

#[async_trait]
impl AiProvider for HttpProvider {
    async fn generate(&self, tool: AiTool, input: &Value) -> Result<Value, ProviderError> {
        object(input)?;
        let payload = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": Self::system_prompt(tool) },
                { "role": "user", "content": input.to_string() },
            ],
            "response_format": { "type": "json_object" },
        });

        let mut request = self.http.post(self.completions_url()).json(&payload);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| ProviderError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|err| ProviderError::Transport(err.to_string()))?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::Upstream {
                status: status.as_u16(),
                body: "completion contained no message".to_string(),
            })?;

        // Models occasionally answer in prose; keep it rather than failing the paid call.
        Ok(serde_json::from_str(&content).unwrap_or_else(|_| json!({ "text": content })))
    }
}
