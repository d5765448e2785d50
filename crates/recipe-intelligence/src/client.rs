use std::str;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use regex::Regex;
use tracing::{debug, warn};

use forkful_common::cancel::CancelToken;
use forkful_common::gemini::{GeminiClient, GeminiError, Part};

use crate::error::IntelligenceError;
use crate::model::{ImageAnalysisResult, Recipe};
use crate::prompt;

const MAX_LOGGED_PAYLOAD_BYTES: usize = 2048;

/// Transport seam for the upstream generative model.
///
/// Production code uses [`GeminiClient`]; tests substitute a scripted stub to
/// exercise the contract enforcement without a network.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Issue one request and return the complete response text.
    async fn generate(&self, parts: Vec<Part>) -> Result<String, GeminiError>;
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, parts: Vec<Part>) -> Result<String, GeminiError> {
        self.generate_content(parts, None).await
    }
}

#[async_trait]
impl<T: GenerativeModel> GenerativeModel for std::sync::Arc<T> {
    async fn generate(&self, parts: Vec<Part>) -> Result<String, GeminiError> {
        self.as_ref().generate(parts).await
    }
}

/// Contract-enforcing wrapper around the generative model.
///
/// Both operations are stateless single-shot round trips: validate local
/// input, issue one request, strictly decode the untrusted response into the
/// expected shape, and return either a fully populated value or a classified
/// [`IntelligenceError`]. No retries happen here; see [`crate::retry`] for
/// the opt-in decorator.
pub struct RecipeIntelligenceClient<M> {
    model: M,
}

impl<M: GenerativeModel> RecipeIntelligenceClient<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    /// Resolve a free-text query into a fully populated [`Recipe`].
    ///
    /// Blank or whitespace-only queries are rejected before any network
    /// activity. Pass a [`CancelToken`] to abandon the round trip early.
    pub async fn resolve_recipe(
        &self,
        query: &str,
        cancel: Option<&CancelToken>,
    ) -> Result<Recipe, IntelligenceError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(IntelligenceError::Validation(
                "query must not be blank".to_string(),
            ));
        }

        debug!(query, "resolving recipe");
        let parts = vec![Part::text(prompt::recipe_prompt(query))];
        let payload = self.generate(parts, cancel).await?;
        decode_contract::<Recipe>(&payload, "recipe")
    }

    /// Interpret a photograph as ingredients or a prepared dish.
    ///
    /// `image` is either raw encoded image bytes (base64-encoded here before
    /// transmission) or an already-base64 textual payload from a thin camera
    /// adapter. Empty payloads, non-`image/*` mime types, and textual
    /// payloads that are not clean base64 are rejected before any network
    /// activity. Stripping data-URL preambles is the caller's job.
    pub async fn analyze_image(
        &self,
        image: &[u8],
        mime_type: &str,
        cancel: Option<&CancelToken>,
    ) -> Result<ImageAnalysisResult, IntelligenceError> {
        let data = encode_image_payload(image)?;
        validate_mime_type(mime_type)?;

        debug!(mime_type, bytes = image.len(), "analyzing image");
        let parts = vec![
            Part::text(prompt::image_prompt()),
            Part::inline_data(mime_type, data),
        ];
        let payload = self.generate(parts, cancel).await?;
        decode_contract::<ImageAnalysisResult>(&payload, "image analysis")
    }

    async fn generate(
        &self,
        parts: Vec<Part>,
        cancel: Option<&CancelToken>,
    ) -> Result<String, IntelligenceError> {
        match cancel {
            None => self
                .model
                .generate(parts)
                .await
                .map_err(IntelligenceError::from_upstream),
            Some(token) => {
                if token.is_cancelled() {
                    return Err(IntelligenceError::Cancelled);
                }
                tokio::select! {
                    () = token.cancelled() => Err(IntelligenceError::Cancelled),
                    result = self.model.generate(parts) => {
                        result.map_err(IntelligenceError::from_upstream)
                    }
                }
            }
        }
    }
}

/// Strict two-phase contract check on the untrusted response text.
///
/// Phase one decodes the payload as JSON; phase two shape-checks it against
/// the expected type. Both failures surface as the same contract violation,
/// but are logged separately with the (truncated) raw payload. No salvage or
/// substring extraction is attempted: a partial result is worse than a clear
/// failure.
fn decode_contract<T: serde::de::DeserializeOwned>(
    payload: &str,
    what: &str,
) -> Result<T, IntelligenceError> {
    let value: serde_json::Value = serde_json::from_str(payload).map_err(|e| {
        warn!(
            error = %e,
            payload = truncate_for_log(payload),
            "upstream {what} response is not valid JSON"
        );
        IntelligenceError::UpstreamFormat {
            detail: format!("{what} response is not valid JSON: {e}"),
        }
    })?;

    serde_json::from_value(value).map_err(|e| {
        warn!(
            error = %e,
            payload = truncate_for_log(payload),
            "upstream {what} response does not match the expected shape"
        );
        IntelligenceError::UpstreamFormat {
            detail: format!("{what} response does not match the expected shape: {e}"),
        }
    })
}

fn validate_mime_type(mime_type: &str) -> Result<(), IntelligenceError> {
    match mime_type.strip_prefix("image/") {
        Some(subtype) if !subtype.is_empty() => Ok(()),
        _ => Err(IntelligenceError::Validation(format!(
            "unsupported image mime type: {mime_type:?}"
        ))),
    }
}

/// Produce the base64 payload for the wire.
///
/// Raw image bytes are encoded here. A payload that reads as text is taken
/// to be base64 already (real image encodings start with non-ASCII magic
/// bytes) and must consist solely of the base64 alphabet and decode cleanly,
/// otherwise it is rejected before a network call is spent on it.
fn encode_image_payload(image: &[u8]) -> Result<String, IntelligenceError> {
    if image.is_empty() {
        return Err(IntelligenceError::Validation(
            "image payload is empty".to_string(),
        ));
    }

    match str::from_utf8(image) {
        Ok(text) if looks_textual(text) => {
            let alphabet = Regex::new(r"^[A-Za-z0-9+/=]+$").expect("valid regex");
            if !alphabet.is_match(text) {
                return Err(IntelligenceError::Validation(
                    "textual image payload contains characters outside the base64 alphabet"
                        .to_string(),
                ));
            }
            if BASE64.decode(text).is_err() {
                return Err(IntelligenceError::Validation(
                    "textual image payload is not well-formed base64".to_string(),
                ));
            }
            Ok(text.to_string())
        }
        _ => Ok(BASE64.encode(image)),
    }
}

fn looks_textual(text: &str) -> bool {
    text.bytes()
        .all(|b| b.is_ascii_graphic() || matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
}

fn truncate_for_log(payload: &str) -> &str {
    if payload.len() <= MAX_LOGGED_PAYLOAD_BYTES {
        return payload;
    }
    let mut end = MAX_LOGGED_PAYLOAD_BYTES;
    while !payload.is_char_boundary(end) {
        end -= 1;
    }
    &payload[..end]
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use forkful_common::gemini::StatusCode;

    use super::*;
    use crate::error::ErrorKind;
    use crate::model::AnalysisKind;

    /// Scripted upstream: pops one canned result per call and counts calls.
    struct StubModel {
        responses: Mutex<VecDeque<Result<String, GeminiError>>>,
        calls: AtomicUsize,
    }

    impl StubModel {
        fn with_text(text: &str) -> Self {
            Self::with_results(vec![Ok(text.to_string())])
        }

        fn with_results(results: Vec<Result<String, GeminiError>>) -> Self {
            Self {
                responses: Mutex::new(results.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerativeModel for StubModel {
        async fn generate(&self, _parts: Vec<Part>) -> Result<String, GeminiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .expect("stub lock")
                .pop_front()
                .unwrap_or(Err(GeminiError::EmptyResponse))
        }
    }

    /// Upstream that never answers; used to exercise in-flight cancellation.
    struct PendingModel;

    #[async_trait]
    impl GenerativeModel for PendingModel {
        async fn generate(&self, _parts: Vec<Part>) -> Result<String, GeminiError> {
            std::future::pending().await
        }
    }

    const PANCAKES_JSON: &str = r#"{
        "name": "Banana Pancakes",
        "description": "Fluffy banana pancakes",
        "prepTime": "10 minutes",
        "cookTime": "15 minutes",
        "servings": "4",
        "ingredients": ["2 ripe bananas", "2 eggs", "1 cup flour"],
        "instructions": ["Mash the bananas", "Whisk in the eggs", "Fold in flour and fry"],
        "nutritionInfo": {"calories": "210", "protein": "6g", "carbs": "32g", "fat": "7g"}
    }"#;

    #[tokio::test]
    async fn resolve_recipe_returns_the_stub_payload_verbatim() {
        let model = StubModel::with_text(PANCAKES_JSON);
        let client = RecipeIntelligenceClient::new(model);

        let recipe = client
            .resolve_recipe("Banana Pancakes", None)
            .await
            .expect("recipe");

        assert_eq!(recipe.name, "Banana Pancakes");
        assert_eq!(
            recipe.ingredients,
            vec!["2 ripe bananas", "2 eggs", "1 cup flour"]
        );
        assert_eq!(
            recipe.instructions,
            vec!["Mash the bananas", "Whisk in the eggs", "Fold in flour and fry"]
        );
        assert_eq!(client.model.calls(), 1);
    }

    #[tokio::test]
    async fn resolve_recipe_rejects_blank_queries_without_a_call() {
        let client = RecipeIntelligenceClient::new(StubModel::with_text(PANCAKES_JSON));

        let err = client.resolve_recipe("   ", None).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(client.model.calls(), 0);
    }

    #[tokio::test]
    async fn resolve_recipe_classifies_non_json_responses() {
        let client = RecipeIntelligenceClient::new(StubModel::with_text("not json"));

        let err = client.resolve_recipe("soup", None).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UpstreamFormat);
    }

    #[tokio::test]
    async fn resolve_recipe_rejects_a_missing_required_field() {
        // Valid JSON, but no "instructions": must fail, never default-fill.
        let payload = r#"{
            "name": "Toast",
            "description": "Just toast",
            "prepTime": "1 minute",
            "cookTime": "3 minutes",
            "servings": "1",
            "ingredients": ["bread"],
            "nutritionInfo": {"calories": "80", "protein": "3g", "carbs": "15g", "fat": "1g"}
        }"#;
        let client = RecipeIntelligenceClient::new(StubModel::with_text(payload));

        let err = client.resolve_recipe("toast", None).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UpstreamFormat);
    }

    #[tokio::test]
    async fn resolve_recipe_rejects_a_mistyped_field() {
        let payload = PANCAKES_JSON.replace("\"4\"", "4");
        let client = RecipeIntelligenceClient::new(StubModel::with_text(&payload));

        let err = client.resolve_recipe("pancakes", None).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UpstreamFormat);
    }

    #[tokio::test]
    async fn analyze_image_returns_identified_items_verbatim() {
        let payload =
            r#"{"type":"ingredients","identified":["egg","flour"],"suggestedRecipes":["Pancakes"]}"#;
        let client = RecipeIntelligenceClient::new(StubModel::with_text(payload));

        let result = client
            .analyze_image(&[0xFF, 0xD8, 0xFF, 0xE0], "image/jpeg", None)
            .await
            .expect("analysis");

        assert_eq!(result.kind, AnalysisKind::Ingredients);
        assert_eq!(result.identified, vec!["egg", "flour"]);
        assert_eq!(result.suggested_recipes, vec!["Pancakes"]);
        assert_eq!(client.model.calls(), 1);
    }

    #[tokio::test]
    async fn analyze_image_rejects_empty_payloads_without_a_call() {
        let client = RecipeIntelligenceClient::new(StubModel::with_text("{}"));

        let err = client.analyze_image(&[], "image/jpeg", None).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(client.model.calls(), 0);
    }

    #[tokio::test]
    async fn analyze_image_rejects_textual_non_base64_without_a_call() {
        let client = RecipeIntelligenceClient::new(StubModel::with_text("{}"));
        let payload = b"data:image/png;base64,iVBORw0KGgo=";

        let err = client
            .analyze_image(payload, "image/png", None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(client.model.calls(), 0);
    }

    #[tokio::test]
    async fn analyze_image_passes_base64_text_through() {
        let payload =
            r#"{"type":"dish","identified":["ramen"],"suggestedRecipes":["Shoyu Ramen"]}"#;
        let client = RecipeIntelligenceClient::new(StubModel::with_text(payload));

        let result = client
            .analyze_image(b"iVBORw0KGgoAAAANSUhEUg==", "image/png", None)
            .await
            .expect("analysis");

        assert_eq!(result.kind, AnalysisKind::Dish);
        assert_eq!(client.model.calls(), 1);
    }

    #[tokio::test]
    async fn analyze_image_rejects_non_image_mime_types_without_a_call() {
        let client = RecipeIntelligenceClient::new(StubModel::with_text("{}"));

        let err = client
            .analyze_image(&[0xFF, 0xD8], "text/plain", None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(client.model.calls(), 0);
    }

    #[tokio::test]
    async fn analyze_image_rejects_an_unknown_type_discriminator() {
        let payload = r#"{"type":"selfie","identified":[],"suggestedRecipes":[]}"#;
        let client = RecipeIntelligenceClient::new(StubModel::with_text(payload));

        let err = client
            .analyze_image(&[0xFF, 0xD8], "image/jpeg", None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UpstreamFormat);
    }

    #[tokio::test]
    async fn upstream_status_errors_surface_as_transport() {
        let client = RecipeIntelligenceClient::new(StubModel::with_results(vec![Err(
            GeminiError::Upstream {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: "overloaded".to_string(),
            },
        )]));

        let err = client.resolve_recipe("soup", None).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn a_pre_cancelled_token_short_circuits_without_a_call() {
        let client = RecipeIntelligenceClient::new(StubModel::with_text(PANCAKES_JSON));
        let token = CancelToken::new();
        token.cancel();

        let err = client
            .resolve_recipe("soup", Some(&token))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(client.model.calls(), 0);
    }

    #[tokio::test]
    async fn cancelling_mid_flight_abandons_the_request() {
        let client = RecipeIntelligenceClient::new(PendingModel);
        let token = CancelToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let err = client
            .resolve_recipe("soup", Some(&token))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn textual_detection_separates_text_from_binary_bytes() {
        assert!(looks_textual("iVBORw0KGgo="));
        assert!(looks_textual("data:image/png;base64,AAAA"));
        assert!(!looks_textual("\u{0}binary\u{1}"));
        // PNG magic is not valid UTF-8, so raw images never reach the
        // textual path in the first place.
        assert!(str::from_utf8(&[0x89, b'P', b'N', b'G']).is_err());
    }

    #[test]
    fn log_truncation_respects_char_boundaries() {
        let payload = "é".repeat(MAX_LOGGED_PAYLOAD_BYTES);
        let truncated = truncate_for_log(&payload);
        assert!(truncated.len() <= MAX_LOGGED_PAYLOAD_BYTES);
        assert!(payload.starts_with(truncated));
    }
}
