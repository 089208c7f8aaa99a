pub mod catalog_source;
pub mod config;
mod http;
pub mod prompts;
pub mod strategies;

use anyhow::Result;
use giftbot_contracts::catalog::{Catalog, Category};
use giftbot_contracts::chat::{
    normalize, recommend_categories, respond_with_branch, speech_text, ChatTurn, Language,
    NormalizedRequest, RawInput, RequestKind,
};
use giftbot_contracts::error::{BrokerError, TerminalError};
use giftbot_contracts::events::{EventPayload, EventWriter};
use giftbot_contracts::models::{ModelSelector, EDIT, IMAGE, MULTIMODAL_IMAGE, TEXT};
use giftbot_contracts::providers::{
    run_chain, ChainExhausted, FailureKind, NamedProvider, ProviderFailure, ProviderResult,
};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

pub use config::{BackendMode, BrokerConfig, CredentialState};
pub use strategies::{
    GeminiImageStrategy, GeminiTextStrategy, ImageJob, ImageRef, ImageStrategy, ImagenStrategy,
    KeylessUrlStrategy, TextPrompt, TextStrategy,
};

use crate::http::truncate_text;
use crate::prompts::{
    chat_system_prompt, parse_recommended_categories, recommend_prompt, recommend_system_prompt,
};
use crate::strategies::{IMAGEN_EDIT_MODEL, IMAGEN_GENERATE_MODEL};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeliverySource {
    Remote { strategy: String },
    LocalHeuristic,
}

/// What the delivered image actually is relative to the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageOrigin {
    Generated,
    Edited,
    /// An edit request answered by a fresh generation from the instruction;
    /// the source image was not used.
    GeneratedFromInstruction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    pub image: ImageRef,
    pub origin: ImageOrigin,
    pub strategy: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivered {
    Text(String),
    Categories(Vec<Category>),
    Image(RenderedImage),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub payload: Delivered,
    pub source: DeliverySource,
}

/// Routes normalized requests through remote strategies or the local
/// heuristic and always answers with a delivery or a terminal error.
///
/// Strategies are owned by the broker and tried strictly in order; nothing
/// runs concurrently and no strategy is retried.
pub struct ResponseBroker {
    catalog: Catalog,
    credential: CredentialState,
    text: Option<Box<dyn TextStrategy>>,
    images: Vec<Box<dyn ImageStrategy>>,
    events: EventWriter,
    text_model: Option<String>,
    text_model_fallback_reason: Option<String>,
}

impl ResponseBroker {
    /// A broker with no strategies and a disabled audit trail.
    pub fn new(catalog: Catalog, credential: CredentialState) -> Self {
        Self {
            catalog,
            credential,
            text: None,
            images: Vec::new(),
            events: EventWriter::disabled(new_session_id()),
            text_model: None,
            text_model_fallback_reason: None,
        }
    }

    /// Wire the production strategies from configuration.
    pub fn from_config(config: &BrokerConfig, catalog: Catalog) -> Result<Self> {
        let credential = config.credential_state();
        let api_key = config.api_key.clone().unwrap_or_default();
        let session_id = new_session_id();
        let events = match config.events_path.as_ref() {
            Some(path) => EventWriter::new(path, session_id),
            None => EventWriter::disabled(session_id),
        };
        let selector = ModelSelector::new(None);

        let text_selection = selector
            .select(config.text_model.as_deref(), TEXT)
            .map_err(anyhow::Error::msg)?;
        if let (Some(reason), Some(_)) = (
            text_selection.fallback_reason.as_deref(),
            config.text_model.as_deref(),
        ) {
            tracing::warn!(model = %text_selection.model.name, "{reason}");
        }
        let generate_model = selector
            .select(Some(IMAGEN_GENERATE_MODEL), IMAGE)
            .map_err(anyhow::Error::msg)?
            .model
            .name;
        let edit_model = selector
            .select(Some(IMAGEN_EDIT_MODEL), EDIT)
            .map_err(anyhow::Error::msg)?
            .model
            .name;

        let mut broker = Self::new(catalog, credential)
            .with_events(events)
            .with_image_strategy(
                ImagenStrategy::new(&config.api_base, &api_key, config.request_timeout)
                    .with_models(generate_model, edit_model),
            )
            .with_image_strategy(GeminiImageStrategy::new(
                &config.api_base,
                &api_key,
                selector.variants(MULTIMODAL_IMAGE),
                config.request_timeout,
            ))
            .with_image_strategy(KeylessUrlStrategy::new(
                &config.keyless_base,
                config.keyless_timeout,
            ));
        if credential.is_present() {
            broker = broker.with_text_strategy(GeminiTextStrategy::new(
                &config.api_base,
                &api_key,
                &text_selection.model.name,
                config.request_timeout,
            ));
        }
        broker.text_model = Some(text_selection.model.name);
        broker.text_model_fallback_reason = text_selection.fallback_reason;
        Ok(broker)
    }

    pub fn with_text_strategy<S: TextStrategy + 'static>(mut self, strategy: S) -> Self {
        self.text = Some(Box::new(strategy));
        self
    }

    /// Append an image strategy; chain order is insertion order.
    pub fn with_image_strategy<S: ImageStrategy + 'static>(mut self, strategy: S) -> Self {
        self.images.push(Box::new(strategy));
        self
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = events;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn credential_state(&self) -> CredentialState {
        self.credential
    }

    pub fn text_model(&self) -> Option<&str> {
        self.text_model.as_deref()
    }

    pub fn text_model_fallback_reason(&self) -> Option<&str> {
        self.text_model_fallback_reason.as_deref()
    }

    pub fn image_strategy_names(&self) -> Vec<String> {
        self.images
            .iter()
            .map(|strategy| strategy.name().to_string())
            .collect()
    }

    pub fn handle(&self, request: &NormalizedRequest) -> Result<Delivery, BrokerError> {
        let request_id = self.begin(request);
        match request.kind() {
            RequestKind::Chat | RequestKind::Voice => {
                let (text, source) = self.answer_text(request, &request_id);
                Ok(Delivery {
                    payload: Delivered::Text(text),
                    source,
                })
            }
            RequestKind::Recommend => {
                let (categories, source) = self.answer_categories(request, &request_id);
                Ok(Delivery {
                    payload: Delivered::Categories(categories),
                    source,
                })
            }
            RequestKind::GenerateImage | RequestKind::EditImage => {
                let image = self.answer_image(request, &request_id)?;
                Ok(Delivery {
                    source: DeliverySource::Remote {
                        strategy: image.strategy.clone(),
                    },
                    payload: Delivered::Image(image),
                })
            }
        }
    }

    pub fn chat(
        &self,
        message: &str,
        history: Vec<ChatTurn>,
        language: Language,
    ) -> Result<String, BrokerError> {
        let request = normalize(RawInput::Chat {
            message: message.to_string(),
            history,
            language,
        })?;
        let request_id = self.begin(&request);
        Ok(self.answer_text(&request, &request_id).0)
    }

    pub fn voice(
        &self,
        transcript: &str,
        history: Vec<ChatTurn>,
        language: Language,
    ) -> Result<String, BrokerError> {
        let request = normalize(RawInput::Voice {
            transcript: transcript.to_string(),
            history,
            language,
        })?;
        let request_id = self.begin(&request);
        Ok(self.answer_text(&request, &request_id).0)
    }

    pub fn search_recommend(
        &self,
        query: &str,
        language: Language,
    ) -> Result<Vec<Category>, BrokerError> {
        let request = normalize(RawInput::Search {
            query: query.to_string(),
            language,
        })?;
        let request_id = self.begin(&request);
        Ok(self.answer_categories(&request, &request_id).0)
    }

    pub fn generate_image(
        &self,
        prompt: &str,
        size: Option<&str>,
    ) -> Result<RenderedImage, BrokerError> {
        let request = normalize(RawInput::Generate {
            prompt: prompt.to_string(),
            size: size.map(str::to_string),
        })?;
        let request_id = self.begin(&request);
        Ok(self.answer_image(&request, &request_id)?)
    }

    pub fn edit_image(
        &self,
        image: Vec<u8>,
        mime_type: &str,
        instruction: &str,
    ) -> Result<RenderedImage, BrokerError> {
        let request = normalize(RawInput::Edit {
            image,
            mime_type: mime_type.to_string(),
            instruction: instruction.to_string(),
        })?;
        let request_id = self.begin(&request);
        Ok(self.answer_image(&request, &request_id)?)
    }

    fn begin(&self, request: &NormalizedRequest) -> String {
        let request_id = Uuid::new_v4().to_string();
        tracing::debug!(
            request_id = %request_id,
            kind = request.kind().as_str(),
            credential = self.credential.as_str(),
            "request started"
        );
        self.events.record(
            "request_started",
            map_object(json!({
                "request_id": request_id,
                "kind": request.kind().as_str(),
                "language": request.language().as_str(),
                "credential": self.credential.as_str(),
                "history_turns": request.history().len(),
                "catalog_fingerprint": self.catalog.fingerprint(),
            })),
        );
        request_id
    }

    /// The text strategy, but only while a credential is configured.
    fn remote_text(&self) -> Option<&dyn TextStrategy> {
        if !self.credential.is_present() {
            return None;
        }
        self.text.as_deref()
    }

    fn answer_text(&self, request: &NormalizedRequest, request_id: &str) -> (String, DeliverySource) {
        let voice = request.kind() == RequestKind::Voice;
        if let Some(text) = self.remote_text() {
            let prompt = TextPrompt {
                system: chat_system_prompt(request.language(), voice, self.catalog.context()),
                history: request.history().to_vec(),
                message: request.text().to_string(),
            };
            let outcome = run_chain(std::iter::once(text), |strategy| strategy.complete(&prompt));
            self.record_failures(request_id, &outcome.failures);
            if let Some((strategy, reply)) = outcome.winner {
                let reply = if voice { speech_text(&reply) } else { reply };
                let source = DeliverySource::Remote { strategy };
                self.record_delivered(request_id, &source, json!({ "chars": reply.chars().count() }));
                return (reply, source);
            }
        }

        let local = respond_with_branch(&self.catalog, request.text(), request.language());
        self.events.record(
            "heuristic_fallback",
            map_object(json!({
                "request_id": request_id,
                "kind": request.kind().as_str(),
                "branch": local.branch.as_str(),
            })),
        );
        let reply = if voice {
            speech_text(&local.text)
        } else {
            local.text
        };
        let source = DeliverySource::LocalHeuristic;
        self.record_delivered(request_id, &source, json!({ "chars": reply.chars().count() }));
        (reply, source)
    }

    fn answer_categories(
        &self,
        request: &NormalizedRequest,
        request_id: &str,
    ) -> (Vec<Category>, DeliverySource) {
        if let Some(text) = self.remote_text() {
            let prompt = TextPrompt {
                system: recommend_system_prompt(request.language(), self.catalog.context()),
                history: Vec::new(),
                message: recommend_prompt(request.text()),
            };
            let outcome = run_chain(std::iter::once(text), |strategy| {
                match strategy.complete(&prompt) {
                    ProviderResult::Success(reply) => {
                        let categories = parse_recommended_categories(&reply);
                        if categories.is_empty() {
                            ProviderResult::Failure(ProviderFailure::new(
                                strategy.name(),
                                FailureKind::Malformed,
                                format!("no known categories in reply: {}", truncate_text(&reply, 120)),
                            ))
                        } else {
                            ProviderResult::Success(categories)
                        }
                    }
                    ProviderResult::Failure(failure) => ProviderResult::Failure(failure),
                }
            });
            self.record_failures(request_id, &outcome.failures);
            if let Some((strategy, categories)) = outcome.winner {
                let source = DeliverySource::Remote { strategy };
                self.record_delivered(request_id, &source, json!({ "categories": categories }));
                return (categories, source);
            }
        }

        let categories = recommend_categories(request.text());
        self.events.record(
            "heuristic_fallback",
            map_object(json!({
                "request_id": request_id,
                "kind": request.kind().as_str(),
            })),
        );
        let source = DeliverySource::LocalHeuristic;
        self.record_delivered(request_id, &source, json!({ "categories": categories }));
        (categories, source)
    }

    fn answer_image(
        &self,
        request: &NormalizedRequest,
        request_id: &str,
    ) -> Result<RenderedImage, TerminalError> {
        let job = ImageJob {
            prompt: request.text().to_string(),
            size: request.size(),
            source: request.image().cloned(),
        };

        let mut skipped = Vec::new();
        let mut eligible: Vec<&dyn ImageStrategy> = Vec::new();
        for strategy in &self.images {
            if strategy.requires_credential() && !self.credential.is_present() {
                skipped.push(ProviderFailure::new(
                    strategy.name(),
                    FailureKind::MissingCredential,
                    "skipped: no API key configured",
                ));
                continue;
            }
            eligible.push(strategy.as_ref());
        }

        let outcome = run_chain(eligible, |strategy| match strategy.render(&job) {
            ProviderResult::Success(image) => {
                ProviderResult::Success((image, strategy.edits_source()))
            }
            ProviderResult::Failure(failure) => ProviderResult::Failure(failure),
        });
        // Skipped strategies are reported ahead of attempted ones.
        let won = match outcome.into_result() {
            Ok(won) => {
                self.record_failures(request_id, &skipped);
                self.record_failures(request_id, &won.failures);
                won
            }
            Err(exhausted) => {
                skipped.extend(exhausted.failures);
                self.record_failures(request_id, &skipped);
                let error = TerminalError::from(ChainExhausted { failures: skipped });
                tracing::warn!(request_id, kind = %error.kind, "image request failed");
                self.events.record(
                    "request_failed",
                    map_object(json!({
                        "request_id": request_id,
                        "terminal_kind": error.kind.to_string(),
                        "message": error.message,
                        "failures": error.failures,
                    })),
                );
                return Err(error);
            }
        };
        let (image, edits_source) = won.payload;
        let strategy = won.strategy;

        let origin = match (job.is_edit(), edits_source) {
            (false, _) => ImageOrigin::Generated,
            (true, true) => ImageOrigin::Edited,
            (true, false) => {
                tracing::warn!(
                    request_id,
                    strategy = %strategy,
                    "edit answered by generating from the instruction; source image ignored"
                );
                ImageOrigin::GeneratedFromInstruction
            }
        };
        let source = DeliverySource::Remote {
            strategy: strategy.clone(),
        };
        self.record_delivered(
            request_id,
            &source,
            json!({
                "origin": origin,
                "image": match &image {
                    ImageRef::DataUri(_) => "data_uri",
                    ImageRef::Url(_) => "url",
                },
            }),
        );
        Ok(RenderedImage {
            image,
            origin,
            strategy,
        })
    }

    fn record_failures(&self, request_id: &str, failures: &[ProviderFailure]) {
        for failure in failures {
            self.events.record(
                "strategy_failed",
                map_object(json!({
                    "request_id": request_id,
                    "strategy": failure.strategy,
                    "failure_kind": failure.kind,
                    "detail": failure.detail,
                })),
            );
        }
    }

    fn record_delivered(&self, request_id: &str, source: &DeliverySource, detail: Value) {
        if let DeliverySource::Remote { strategy } = source {
            self.events.record(
                "strategy_succeeded",
                map_object(json!({
                    "request_id": request_id,
                    "strategy": strategy,
                })),
            );
        }
        let mut payload = map_object(json!({
            "request_id": request_id,
            "source": source,
        }));
        payload.extend(map_object(detail));
        self.events.record("request_delivered", payload);
    }
}

fn new_session_id() -> String {
    format!("giftbot-{}", Uuid::new_v4().simple())
}

fn map_object(value: Value) -> EventPayload {
    value.as_object().cloned().unwrap_or_default()
}
