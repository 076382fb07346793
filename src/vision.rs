use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::VisionConfig;

/// Instruction sent with every label scan. The model does all normalization:
/// canonical key names, percentages, kcal per 100 g (labels in kcal/kg are
/// divided by 10), synonym mapping, and a `missing` list for unreadable
/// fields. The processor stores whatever comes back, unmodified.
pub const GA_PROMPT: &str = r#"You are an expert at reading pet-food Guaranteed-Analysis (GA) panels.

Return ONLY minified JSON exactly like:
{"productName":"","brandName":"",
"guaranteedAnalysis":{
"Crude Protein":0,"Crude Fat":0,"Calcium":0,"Moisture":0
},
"Calories":0,
"missing":[]}

Rules
- Keys & spelling must match the example (incl. spaces / capitals).
- GA values & Moisture = percentages.
- Calories must be reported as kcal per 100 g:
    - If the label shows kcal/kg, divide by 10.
- If a label uses a synonym, map it to the required key
  (e.g. "Protein" -> Crude Protein, "Water" -> Moisture, etc.).
- If a value is absent or unreadable, set it to 0 and add its key to "missing".
- Do NOT output extra keys, markdown, or prose."#;

/// The fixed response schema the prompt demands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelExtraction {
    #[serde(rename = "productName")]
    pub product_name: String,
    #[serde(rename = "brandName")]
    pub brand_name: String,
    #[serde(rename = "guaranteedAnalysis")]
    pub guaranteed_analysis: GuaranteedAnalysis,
    #[serde(rename = "Calories")]
    pub calories: f64,
    #[serde(default)]
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuaranteedAnalysis {
    #[serde(rename = "Crude Protein")]
    pub crude_protein: f64,
    #[serde(rename = "Crude Fat")]
    pub crude_fat: f64,
    #[serde(rename = "Calcium")]
    pub calcium: f64,
    #[serde(rename = "Moisture")]
    pub moisture: f64,
}

impl LabelExtraction {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw).context("parse label extraction response")
    }
}

/// Multimodal inference collaborator: two image references in, raw JSON text out.
#[async_trait]
pub trait VisionClient: Send + Sync {
    async fn extract_label(&self, front_uri: &str, back_uri: &str) -> anyhow::Result<String>;
}

#[derive(Clone)]
pub struct Gemini {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl Gemini {
    pub fn new(cfg: &VisionConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
        }
    }
}

#[async_trait]
impl VisionClient for Gemini {
    async fn extract_label(&self, front_uri: &str, back_uri: &str) -> anyhow::Result<String> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".into(),
                parts: vec![
                    Part::text(GA_PROMPT),
                    Part::file_data("image/jpeg", front_uri),
                    Part::file_data("image/jpeg", back_uri),
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".into(),
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .context("generateContent request")?
            .error_for_status()
            .context("generateContent status")?;

        let body: GenerateContentResponse =
            response.json().await.context("generateContent body")?;
        debug!(model = %self.model, "generateContent returned");
        body.first_text()
            .ok_or_else(|| anyhow::anyhow!("empty or malformed model response"))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            file_data: None,
        }
    }

    fn file_data(mime_type: &str, file_uri: &str) -> Self {
        Self {
            text: None,
            file_data: Some(FileData {
                mime_type: mime_type.to_string(),
                file_uri: file_uri.to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn first_text(&self) -> Option<String> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .clone()
    }
}

#[cfg(test)]
mod vision_tests {
    use super::*;

    #[test]
    fn parses_well_formed_extraction() {
        let raw = r#"{"productName":"Salmon Feast","brandName":"Acme",
            "guaranteedAnalysis":{"Crude Protein":32.5,"Crude Fat":14.0,
            "Calcium":1.2,"Moisture":10.0},
            "Calories":398.6,"missing":["Calcium"]}"#;
        let parsed = LabelExtraction::parse(raw).expect("parse");
        assert_eq!(parsed.product_name, "Salmon Feast");
        assert_eq!(parsed.brand_name, "Acme");
        assert_eq!(parsed.guaranteed_analysis.crude_protein, 32.5);
        assert_eq!(parsed.guaranteed_analysis.moisture, 10.0);
        assert_eq!(parsed.calories, 398.6);
        assert_eq!(parsed.missing, vec!["Calcium"]);
    }

    #[test]
    fn rejects_non_json() {
        assert!(LabelExtraction::parse("Here is the analysis: ...").is_err());
    }

    #[test]
    fn guaranteed_analysis_keeps_label_key_spelling() {
        let ga = GuaranteedAnalysis {
            crude_protein: 30.0,
            crude_fat: 12.0,
            calcium: 1.0,
            moisture: 9.0,
        };
        let value = serde_json::to_value(&ga).unwrap();
        assert!(value.get("Crude Protein").is_some());
        assert!(value.get("Crude Fat").is_some());
        assert!(value.get("Calcium").is_some());
        assert!(value.get("Moisture").is_some());
    }

    #[test]
    fn first_text_walks_candidates() {
        let body: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"ok\":1}"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(body.first_text().as_deref(), Some("{\"ok\":1}"));

        let empty: GenerateContentResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(empty.first_text().is_none());
    }

    #[test]
    fn prompt_pins_the_contract() {
        assert!(GA_PROMPT.contains("kcal per 100 g"));
        assert!(GA_PROMPT.contains("divide by 10"));
        assert!(GA_PROMPT.contains(r#""missing""#));
        assert!(GA_PROMPT.contains("Crude Protein"));
    }
}
