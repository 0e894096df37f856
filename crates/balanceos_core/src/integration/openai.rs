//! Chat-completion client for nutrition estimates and coaching answers.

use crate::config::OpenAiConfig;
use crate::integration::{check_status, http_client, join_url, IntegrationError, IntegrationResult};
use crate::logging::elapsed_ms;
use crate::model::nutrition::Nutrients;
use crate::model::profile::{Gender, NutrientGoals, SportGoals, VitalGoals};
use chrono::NaiveDate;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;

/// Tip used when the advisor cannot answer.
pub const FALLBACK_TIP: &str = "Bleib aktiv und trink genug Wasser!";

static JSON_OBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[\s\S]*\}").expect("valid JSON object regex"));
static JSON_ARRAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[\s\S]*\]").expect("valid JSON array regex"));

const NUTRITION_SYSTEM_PROMPT: &str = "You are a nutrition expert. Estimate the nutrients of \
the described meal or drink. Answer only with a JSON object with the keys calories (kcal), \
protein, carbs, fat, fiber, sugar, salt (grams), water (ml) and confidence (high|medium|low).";
const GOALS_SYSTEM_PROMPT: &str = "You are a health coach. Suggest daily goals for the user. \
Answer only with a JSON object with the keys nutrient_goals {calories, protein, carbs, fat, \
fiber, sugar, salt, water}, vital_goals {target_weight, target_body_fat, sleep_hours, \
resting_heart_rate}, sport_goals {daily_steps, weekly_workouts} and explanation.";
const WORKOUT_SYSTEM_PROMPT: &str = "You are a fitness coach. Suggest three workouts for \
today. Answer only with a JSON array of objects with the keys type, name, duration (minutes), \
calories_burned and description.";
const TIP_SYSTEM_PROMPT: &str = "You are a friendly health coach. Give one short, concrete \
tip for today in at most two sentences. Answer with the tip only.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    #[default]
    Medium,
    Low,
}

impl Confidence {
    fn parse_lenient(value: Option<&str>) -> Self {
        match value.map(|raw| raw.trim().to_ascii_lowercase()).as_deref() {
            Some("high") => Self::High,
            Some("low") => Self::Low,
            _ => Self::Medium,
        }
    }
}

/// Estimated nutrients of one described meal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionEstimate {
    #[serde(flatten)]
    pub nutrients: Nutrients,
    pub confidence: Confidence,
}

impl NutritionEstimate {
    /// Whole numbers everywhere except salt (one decimal); negatives and
    /// non-numbers become zero.
    fn from_answer(answer: &Value) -> Self {
        let number = |key: &str| {
            answer
                .get(key)
                .and_then(Value::as_f64)
                .filter(|value| value.is_finite() && *value > 0.0)
                .unwrap_or(0.0)
        };
        Self {
            nutrients: Nutrients {
                calories: number("calories").round(),
                protein: number("protein").round(),
                carbs: number("carbs").round(),
                fat: number("fat").round(),
                fiber: number("fiber").round(),
                sugar: number("sugar").round(),
                salt: (number("salt") * 10.0).round() / 10.0,
                water: number("water").round(),
            },
            confidence: Confidence::parse_lenient(answer.get("confidence").and_then(Value::as_str)),
        }
    }
}

/// What the goal advisor knows about the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GoalContext {
    pub birth_date: Option<NaiveDate>,
    pub height: Option<f64>,
    pub gender: Option<Gender>,
    pub weight: Option<f64>,
    pub body_fat: Option<f64>,
    pub goal: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalSuggestions {
    pub nutrient_goals: NutrientGoals,
    pub vital_goals: VitalGoals,
    pub sport_goals: SportGoals,
    pub explanation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkoutContext {
    pub weight: Option<f64>,
    pub target_weight: Option<f64>,
    pub calories_consumed: f64,
    pub calorie_goal: f64,
    pub calories_burned: f64,
    pub steps_today: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkoutSuggestion {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    /// Minutes.
    pub duration: u32,
    pub calories_burned: f64,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TipContext {
    pub sleep_hours: Option<f64>,
    pub steps_today: u32,
    pub water_today: f64,
    pub calorie_balance: f64,
}

pub trait NutritionEstimator {
    /// Estimates nutrients from a free-text description and an optional
    /// base64-encoded JPEG photo.
    fn estimate_nutrition(
        &self,
        description: &str,
        image_base64: Option<&str>,
    ) -> IntegrationResult<NutritionEstimate>;
}

pub trait GoalAdvisor {
    fn suggest_goals(&self, context: &GoalContext) -> IntegrationResult<GoalSuggestions>;
    fn suggest_workouts(&self, context: &WorkoutContext)
        -> IntegrationResult<Vec<WorkoutSuggestion>>;
    fn daily_tip(&self, context: &TipContext) -> IntegrationResult<String>;
}

impl<T: NutritionEstimator + ?Sized> NutritionEstimator for &T {
    fn estimate_nutrition(
        &self,
        description: &str,
        image_base64: Option<&str>,
    ) -> IntegrationResult<NutritionEstimate> {
        (**self).estimate_nutrition(description, image_base64)
    }
}

impl<T: GoalAdvisor + ?Sized> GoalAdvisor for &T {
    fn suggest_goals(&self, context: &GoalContext) -> IntegrationResult<GoalSuggestions> {
        (**self).suggest_goals(context)
    }

    fn suggest_workouts(
        &self,
        context: &WorkoutContext,
    ) -> IntegrationResult<Vec<WorkoutSuggestion>> {
        (**self).suggest_workouts(context)
    }

    fn daily_tip(&self, context: &TipContext) -> IntegrationResult<String> {
        (**self).daily_tip(context)
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

pub struct OpenAiClient {
    http: reqwest::blocking::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(config: &OpenAiConfig) -> IntegrationResult<Self> {
        Ok(Self {
            http: http_client()?,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.clone(),
        })
    }

    /// Sends one chat completion and returns the first answer's text.
    fn complete(
        &self,
        operation: &'static str,
        messages: Vec<Value>,
        max_tokens: u32,
        temperature: f64,
    ) -> IntegrationResult<String> {
        let started = Instant::now();
        let result = self.send(messages, max_tokens, temperature);
        match &result {
            Ok(_) => info!(
                "event=ai_request module=integration status=ok provider=openai op={} duration_ms={}",
                operation,
                elapsed_ms(started)
            ),
            Err(err) => warn!(
                "event=ai_request module=integration status=error provider=openai op={} error_kind={} duration_ms={}",
                operation,
                err.kind(),
                elapsed_ms(started)
            ),
        }
        result
    }

    fn send(
        &self,
        messages: Vec<Value>,
        max_tokens: u32,
        temperature: f64,
    ) -> IntegrationResult<String> {
        let body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": max_tokens,
            "temperature": temperature,
        });
        let response = self
            .http
            .post(join_url(&self.base_url, "chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;
        let response: ChatResponse = check_status("openai", response)?.json()?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| IntegrationError::InvalidResponse("answer has no content".to_string()))
    }
}

impl NutritionEstimator for OpenAiClient {
    fn estimate_nutrition(
        &self,
        description: &str,
        image_base64: Option<&str>,
    ) -> IntegrationResult<NutritionEstimate> {
        let text = format!("Meal: {description}");
        let user_content = match image_base64 {
            Some(image) => json!([
                { "type": "text", "text": text },
                {
                    "type": "image_url",
                    "image_url": { "url": format!("data:image/jpeg;base64,{image}") }
                }
            ]),
            None => Value::String(text),
        };
        let messages = vec![
            json!({ "role": "system", "content": NUTRITION_SYSTEM_PROMPT }),
            json!({ "role": "user", "content": user_content }),
        ];
        let content = self.complete("estimate_nutrition", messages, 500, 0.3)?;
        let answer = extract_json(&content, &JSON_OBJECT)?;
        if !answer.is_object() {
            return Err(IntegrationError::InvalidResponse(
                "nutrition answer is not an object".to_string(),
            ));
        }
        Ok(NutritionEstimate::from_answer(&answer))
    }
}

impl GoalAdvisor for OpenAiClient {
    fn suggest_goals(&self, context: &GoalContext) -> IntegrationResult<GoalSuggestions> {
        let messages = vec![
            json!({ "role": "system", "content": GOALS_SYSTEM_PROMPT }),
            json!({ "role": "user", "content": to_prompt_json(context)? }),
        ];
        let content = self.complete("suggest_goals", messages, 1000, 0.7)?;
        let answer = extract_json(&content, &JSON_OBJECT)?;
        serde_json::from_value(answer).map_err(|err| {
            IntegrationError::InvalidResponse(format!("goal answer has unexpected shape: {err}"))
        })
    }

    fn suggest_workouts(
        &self,
        context: &WorkoutContext,
    ) -> IntegrationResult<Vec<WorkoutSuggestion>> {
        let messages = vec![
            json!({ "role": "system", "content": WORKOUT_SYSTEM_PROMPT }),
            json!({ "role": "user", "content": to_prompt_json(context)? }),
        ];
        let content = self.complete("suggest_workouts", messages, 800, 0.7)?;
        let answer = extract_json(&content, &JSON_ARRAY)?;
        serde_json::from_value(answer).map_err(|err| {
            IntegrationError::InvalidResponse(format!("workout answer has unexpected shape: {err}"))
        })
    }

    fn daily_tip(&self, context: &TipContext) -> IntegrationResult<String> {
        let messages = vec![
            json!({ "role": "system", "content": TIP_SYSTEM_PROMPT }),
            json!({ "role": "user", "content": to_prompt_json(context)? }),
        ];
        self.complete("daily_tip", messages, 150, 0.8)
    }
}

fn to_prompt_json<T: Serialize>(context: &T) -> IntegrationResult<String> {
    serde_json::to_string(context)
        .map_err(|err| IntegrationError::InvalidConfig(format!("prompt context: {err}")))
}

/// Parses `content` as JSON, or the outermost block matched by `block`.
fn extract_json(content: &str, block: &Regex) -> IntegrationResult<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(content.trim()) {
        return Ok(value);
    }
    let found = block
        .find(content)
        .ok_or_else(|| IntegrationError::InvalidResponse("no JSON block in answer".to_string()))?;
    serde_json::from_str(found.as_str())
        .map_err(|err| IntegrationError::InvalidResponse(format!("malformed JSON block: {err}")))
}

#[cfg(test)]
mod tests {
    use super::{
        extract_json, Confidence, GoalAdvisor, GoalContext, NutritionEstimator, OpenAiClient,
        TipContext, WorkoutContext, JSON_ARRAY, JSON_OBJECT,
    };
    use crate::config::OpenAiConfig;
    use crate::integration::IntegrationError;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> OpenAiClient {
        OpenAiClient::new(&OpenAiConfig {
            api_key: "sk-test".to_string(),
            model: "gpt-4o".to_string(),
            base_url: server.base_url(),
        })
        .unwrap()
    }

    fn answer(content: &str) -> serde_json::Value {
        json!({ "choices": [ { "message": { "role": "assistant", "content": content } } ] })
    }

    #[test]
    fn extract_json_accepts_plain_and_embedded_blocks() {
        let plain = extract_json(r#"{"a": 1}"#, &JSON_OBJECT).unwrap();
        assert_eq!(plain["a"], 1);

        let fenced = extract_json("Sure!\n```json\n[{\"x\": 2}]\n```", &JSON_ARRAY).unwrap();
        assert_eq!(fenced[0]["x"], 2);

        assert!(extract_json("no json here", &JSON_OBJECT).is_err());
    }

    #[test]
    fn estimate_rounds_and_clamps_values() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .header("authorization", "Bearer sk-test")
                .body_contains("\"model\":\"gpt-4o\"");
            then.status(200).json_body(answer(
                "Estimate: {\"calories\": 95.4, \"protein\": 0.6, \"carbs\": 25.2, \
                 \"fat\": -1, \"salt\": 0.04, \"water\": 84.7, \"confidence\": \"HIGH\"}",
            ));
        });

        let estimate = client(&server).estimate_nutrition("Apfel", None).unwrap();
        mock.assert();
        assert_eq!(estimate.nutrients.calories, 95.0);
        assert_eq!(estimate.nutrients.protein, 1.0);
        assert_eq!(estimate.nutrients.fat, 0.0);
        assert_eq!(estimate.nutrients.salt, 0.0);
        assert_eq!(estimate.nutrients.water, 85.0);
        assert_eq!(estimate.confidence, Confidence::High);
    }

    #[test]
    fn estimate_with_image_sends_data_url() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .body_contains("data:image/jpeg;base64,AAAA");
            then.status(200).json_body(answer(r#"{"calories": 300}"#));
        });

        let estimate = client(&server)
            .estimate_nutrition("Pizza", Some("AAAA"))
            .unwrap();
        mock.assert();
        assert_eq!(estimate.nutrients.calories, 300.0);
        assert_eq!(estimate.confidence, Confidence::Medium);
    }

    #[test]
    fn unauthorized_key_is_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(401).json_body(json!({ "error": "invalid key" }));
        });

        let error = client(&server)
            .estimate_nutrition("Apfel", None)
            .unwrap_err();
        assert!(matches!(error, IntegrationError::Unauthorized));
    }

    #[test]
    fn server_error_is_reported_with_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(503);
        });

        let error = client(&server)
            .daily_tip(&TipContext::default())
            .unwrap_err();
        assert!(matches!(
            error,
            IntegrationError::Status {
                service: "openai",
                status: 503
            }
        ));
    }

    #[test]
    fn goal_suggestions_fill_missing_fields_with_defaults() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(answer(
                r#"{"nutrient_goals": {"calories": 1800, "protein": 120},
                    "sport_goals": {"daily_steps": 12000},
                    "explanation": "Moderates Defizit."}"#,
            ));
        });

        let context = GoalContext {
            goal: "5 kg abnehmen".to_string(),
            weight: Some(82.0),
            ..GoalContext::default()
        };
        let suggestions = client(&server).suggest_goals(&context).unwrap();
        assert_eq!(suggestions.nutrient_goals.calories, 1800.0);
        assert_eq!(suggestions.nutrient_goals.water, 2000.0);
        assert_eq!(suggestions.sport_goals.daily_steps, 12_000);
        assert_eq!(suggestions.vital_goals.sleep_hours, 8.0);
        assert_eq!(suggestions.explanation, "Moderates Defizit.");
    }

    #[test]
    fn workout_suggestions_parse_embedded_array() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(answer(
                "Hier sind Vorschläge:\n[{\"type\": \"cardio\", \"name\": \"Joggen\", \
                 \"duration\": 30, \"calories_burned\": 300, \"description\": \"locker\"}]",
            ));
        });

        let suggestions = client(&server)
            .suggest_workouts(&WorkoutContext::default())
            .unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].kind, "cardio");
        assert_eq!(suggestions[0].duration, 30);
    }

    #[test]
    fn empty_answer_is_invalid() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(json!({ "choices": [] }));
        });

        let error = client(&server)
            .daily_tip(&TipContext::default())
            .unwrap_err();
        assert!(matches!(error, IntegrationError::InvalidResponse(_)));
    }
}
