//! Gemini generator client
//!
//! Talks to the Google Generative Language `generateContent` endpoint. Tourist
//! batches are requested as schema-constrained JSON; incident reports come
//! back as free text. The API key travels in the `x-goog-api-key` header and
//! never appears in URLs or logs.
//!
//! Calls are single-shot: no timeout, no retry. Failures are returned to the
//! caller, which decides how to recover.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::config::GeneratorSettings;
use crate::generator::{ExternalGenerator, GenerationError};
use crate::models::{Alert, Tourist};
use crate::validation::validate_generated_tourists;

const MAX_ERROR_BODY_CHARS: usize = 300;

const REPORT_OFFICER: &str = "System Generated - Aegis Dashboard";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    /// Single user turn carrying `prompt`
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.into()),
                }],
            }],
            generation_config: None,
        }
    }

    /// Constrain the response to JSON matching `schema`
    pub fn with_json_schema(mut self, schema: Value) -> Self {
        self.generation_config = Some(GenerationConfig {
            response_mime_type: "application/json".to_string(),
            response_schema: schema,
        });
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
    pub response_schema: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate
    pub fn text(&self) -> Result<String, GenerationError> {
        let candidate = self
            .candidates
            .first()
            .ok_or_else(|| GenerationError::Malformed("no candidates returned".to_string()))?;

        let text: String = candidate
            .content
            .iter()
            .flat_map(|content| content.parts.iter())
            .filter_map(|part| part.text.as_deref())
            .collect();

        if text.trim().is_empty() {
            return Err(GenerationError::Malformed(format!(
                "candidate carried no text (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

fn field(kind: &str, description: &str) -> Value {
    json!({ "type": kind, "description": description })
}

fn object(properties: Value) -> Value {
    json!({ "type": "OBJECT", "properties": properties })
}

fn array_of(items: Value) -> Value {
    json!({ "type": "ARRAY", "items": items })
}

/// Response schema for one tourist record
pub fn tourist_schema() -> Value {
    let kyc = object(json!({
        "type": field("STRING", "ID type, either 'Passport' or 'Aadhaar'."),
        "idNumber": field("STRING", "The ID number."),
        "firstName": field("STRING", "Tourist first name."),
        "lastName": field("STRING", "Tourist last name."),
        "nationality": field("STRING", "Tourist nationality."),
        "dob": field("STRING", "Date of birth in ISO 8601 format (YYYY-MM-DD)."),
    }));

    let itinerary_item = object(json!({
        "location": field("STRING", "Location name in Northeast India."),
        "date": field("STRING", "Date for this itinerary item in ISO 8601 format (YYYY-MM-DD)."),
        "activity": field("STRING", "Planned activity."),
    }));

    let contact = object(json!({
        "name": { "type": "STRING" },
        "phone": { "type": "STRING" },
    }));

    let location_point = object(json!({
        "lat": field("NUMBER", "Latitude between 27 and 29."),
        "lng": field("NUMBER", "Longitude between 77 and 79."),
        "timestamp": field("STRING", "Timestamp in ISO 8601 format."),
    }));

    object(json!({
        "id": field("STRING", "A unique blockchain-style hash ID for the tourist."),
        "kyc": kyc,
        "tripItinerary": array_of(itinerary_item),
        "emergencyContacts": array_of(contact),
        "safetyScore": field("INTEGER", "A score from 0 to 100."),
        "locationHistory": array_of(location_point),
        "status": field("STRING", "Status: 'active', 'inactive', or 'distress'."),
        "entryDate": field("STRING", "Entry date in ISO 8601 format (YYYY-MM-DD)."),
        "exitDate": field("STRING", "Exit date in ISO 8601 format (YYYY-MM-DD)."),
    }))
}

pub fn tourists_prompt(count: u32) -> String {
    format!(
        "Generate a diverse list of {count} tourist profiles for a safety monitoring system in \
         Northeast India. Ensure variety in names, nationalities (include Indian and \
         international), itineraries, and safety scores. The location coordinates (lat, lng) \
         should be within a realistic range for the region, for example, latitude between 27.0 \
         and 29.0, and longitude between 77.0 and 79.0. Create a few location history points \
         for each tourist, oldest first."
    )
}

pub fn report_prompt(alert: &Alert, tourist: &Tourist) -> Result<String, GenerationError> {
    let alert_json = serde_json::to_string_pretty(alert)
        .map_err(|e| GenerationError::Malformed(format!("alert not serializable: {}", e)))?;
    let tourist_json = serde_json::to_string_pretty(tourist)
        .map_err(|e| GenerationError::Malformed(format!("tourist not serializable: {}", e)))?;

    Ok(format!(
        r#"Based on the following JSON data for a tourist and a safety alert, generate a formal E-FIR (First Information Report) for a missing person case. The report should be structured, professional, and ready for police use.

**Alert Data:**
{alert_json}

**Tourist Data:**
{tourist_json}

**Instructions:**
1.  Start with a clear heading: "FIRST INFORMATION REPORT (E-FIR)".
2.  Include sections for:
    - Case Number (generate a placeholder)
    - Date and Time of Report
    - Reporting Officer (use "{REPORT_OFFICER}")
    - Details of the Missing Person (from tourist KYC data)
    - Circumstances of Disappearance (based on the alert type, last known location, and timestamp)
    - Last Known Location Details
    - Itinerary Details
    - Emergency Contact Information
    - Initial Assessment and Recommended Actions
3.  The tone should be formal and official."#
    ))
}

// ---------------------------------------------------------------------------
// Payload parsing
// ---------------------------------------------------------------------------

/// Drop a surrounding markdown code fence, if the model added one
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Decode and validate a generated tourist batch
pub fn parse_tourists(text: &str) -> Result<Vec<Tourist>, GenerationError> {
    let value: Value = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| GenerationError::Malformed(format!("response is not JSON: {}", e)))?;

    if !value.is_array() {
        return Err(GenerationError::Malformed(
            "response is not an array of tourists".to_string(),
        ));
    }

    let tourists: Vec<Tourist> = serde_json::from_value(value)
        .map_err(|e| GenerationError::Malformed(format!("tourist record invalid: {}", e)))?;

    validate_generated_tourists(&tourists)
        .map_err(|e| GenerationError::Malformed(e.to_string()))?;

    Ok(tourists)
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        return body.to_string();
    }
    let mut truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    truncated.push_str("...");
    truncated
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct GeminiGenerator {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiGenerator {
    pub fn new(settings: &GeneratorSettings) -> Self {
        if settings.api_key.is_none() {
            warn!("GEMINI_API_KEY not set; generation requests will fall back to seed data");
        }

        Self {
            client: Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<String, GenerationError> {
        let api_key = self.api_key.as_deref().ok_or(GenerationError::NotConfigured)?;
        let url = self.endpoint();

        info!(
            model = %self.model,
            url_prefix = %self.base_url,
            structured = request.generation_config.is_some(),
            "Calling Gemini generateContent"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Gemini request failed");
                GenerationError::Transport(e.to_string())
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!(error = %e, "Failed to read Gemini response body");
            GenerationError::Transport(e.to_string())
        })?;

        if !status.is_success() {
            error!(status = %status, "Gemini API error");
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message: truncate_body(&body),
            });
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body).map_err(|e| {
            error!(error = %e, "Failed to parse Gemini response JSON");
            GenerationError::Malformed(format!("response envelope: {}", e))
        })?;

        let text = parsed.text()?;
        debug!(chars = text.len(), "Gemini response received");
        Ok(text)
    }
}

#[async_trait]
impl ExternalGenerator for GeminiGenerator {
    async fn generate_tourists(&self, count: u32) -> Result<Vec<Tourist>, GenerationError> {
        let request = GenerateContentRequest::prompt(tourists_prompt(count))
            .with_json_schema(array_of(tourist_schema()));

        let text = self.generate_content(&request).await?;
        let tourists = parse_tourists(&text)?;

        info!(requested = count, received = tourists.len(), "Tourists generated");
        Ok(tourists)
    }

    async fn generate_report(
        &self,
        alert: &Alert,
        tourist: &Tourist,
    ) -> Result<String, GenerationError> {
        let request = GenerateContentRequest::prompt(report_prompt(alert, tourist)?);
        let report = self.generate_content(&request).await?;

        info!(alert_id = %alert.id, tourist_id = %tourist.id, "E-FIR generated");
        Ok(report)
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
    use crate::seed::SeedData;
    use chrono::Utc;

    fn settings(api_key: Option<&str>) -> GeneratorSettings {
        GeneratorSettings {
            api_key: api_key.map(str::to_string),
            base_url: format!("{}/", DEFAULT_GEMINI_BASE_URL),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            tourist_count: 20,
        }
    }

    fn generated_batch() -> String {
        let tourists = SeedData::build(Utc::now()).tourists;
        serde_json::to_string(&tourists).unwrap()
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let generator = GeminiGenerator::new(&settings(Some("k")));
        assert_eq!(
            generator.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert!(generator.is_configured());
    }

    #[test]
    fn test_missing_key_fails_without_calling() {
        let generator = GeminiGenerator::new(&settings(None));
        assert!(!generator.is_configured());

        let result = tokio_test::block_on(generator.generate_tourists(5));
        assert!(matches!(result, Err(GenerationError::NotConfigured)));

        let seed = SeedData::build(Utc::now());
        let result =
            tokio_test::block_on(generator.generate_report(&seed.alerts[0], &seed.tourists[1]));
        assert!(matches!(result, Err(GenerationError::NotConfigured)));
    }

    #[test]
    fn test_structured_request_shape() {
        let request = GenerateContentRequest::prompt("hello")
            .with_json_schema(array_of(tourist_schema()));
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "ARRAY");
        assert_eq!(
            body["generationConfig"]["responseSchema"]["items"]["properties"]["safetyScore"]["type"],
            "INTEGER"
        );
    }

    #[test]
    fn test_plain_request_has_no_generation_config() {
        let body = serde_json::to_value(GenerateContentRequest::prompt("report")).unwrap();
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn test_response_text_joins_parts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "FIRST " }, { "text": "REPORT" }] },
                "finishReason": "STOP"
            }]
        }))
        .unwrap();

        assert_eq!(response.text().unwrap(), "FIRST REPORT");
    }

    #[test]
    fn test_response_without_candidates() {
        let response: GenerateContentResponse =
            serde_json::from_value(json!({ "promptFeedback": { "blockReason": "SAFETY" } }))
                .unwrap();
        assert!(matches!(response.text(), Err(GenerationError::Malformed(_))));

        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        }))
        .unwrap();
        match response.text() {
            Err(GenerationError::Malformed(msg)) => assert!(msg.contains("SAFETY")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_tourists_accepts_valid_batch() {
        let tourists = parse_tourists(&generated_batch()).unwrap();
        assert_eq!(tourists.len(), 3);
        assert_eq!(tourists[1].kyc.first_name, "Priya");
    }

    #[test]
    fn test_parse_tourists_strips_code_fence() {
        let fenced = format!("```json\n{}\n```", generated_batch());
        assert_eq!(parse_tourists(&fenced).unwrap().len(), 3);
    }

    #[test]
    fn test_parse_tourists_rejects_non_array() {
        let result = parse_tourists(r#"{ "tourists": [] }"#);
        match result {
            Err(GenerationError::Malformed(msg)) => assert!(msg.contains("not an array")),
            other => panic!("unexpected: {:?}", other),
        }

        assert!(matches!(
            parse_tourists("definitely not json"),
            Err(GenerationError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_tourists_rejects_missing_fields() {
        let result = parse_tourists(r#"[{ "id": "x" }]"#);
        assert!(matches!(result, Err(GenerationError::Malformed(_))));
    }

    #[test]
    fn test_parse_tourists_rejects_out_of_range_values() {
        let mut value: Value = serde_json::from_str(&generated_batch()).unwrap();
        value[0]["safetyScore"] = json!(150);
        let result = parse_tourists(&value.to_string());
        assert!(matches!(result, Err(GenerationError::Malformed(_))));

        let mut value: Value = serde_json::from_str(&generated_batch()).unwrap();
        value[2]["locationHistory"][0]["lat"] = json!(123.0);
        let result = parse_tourists(&value.to_string());
        assert!(matches!(result, Err(GenerationError::Malformed(_))));
    }

    #[test]
    fn test_report_prompt_embeds_records() {
        let seed = SeedData::build(Utc::now());
        let prompt = report_prompt(&seed.alerts[0], &seed.tourists[1]).unwrap();

        assert!(prompt.contains("FIRST INFORMATION REPORT (E-FIR)"));
        assert!(prompt.contains(REPORT_OFFICER));
        assert!(prompt.contains("\"touristName\": \"Priya Sharma\""));
        assert!(prompt.contains("\"idNumber\": \"1234 5678 9012\""));
    }

    #[test]
    fn test_truncate_body() {
        let long = "é".repeat(MAX_ERROR_BODY_CHARS + 10);
        let truncated = truncate_body(&long);
        assert_eq!(truncated.chars().count(), MAX_ERROR_BODY_CHARS + 3);
        assert_eq!(truncate_body("short"), "short");
    }
}
