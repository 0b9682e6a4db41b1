//! Beauty-consulting assistant features built on the stream client

use super::parse::{extract_inline_image, parse_qa_replies, split_variants, QaReply, VisionReply};
use super::prompts;
use crate::config::ClientConfig;
use crate::history::{
    FileHistoryStore, HistoryStore, NewRecord, PendingTask, RecordKind, RecordMetadata,
};
use crate::http::RequestOptions;
use crate::protocol::{ChatRequest, Message};
use crate::providers::{route_model, ProviderError, ProviderResult};
use crate::stream::{Lifecycle, StreamCallbacks, StreamClient, StreamOutcome};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Sampling temperature for plain completions
const COMPLETION_TEMPERATURE: f32 = 0.7;

/// Token cap for plain completions
const COMPLETION_MAX_TOKENS: u32 = 2000;

/// Sampling temperature for vision and generation requests
const VISION_TEMPERATURE: f32 = 0.5;

/// Options for a plain completion; unset fields use the defaults
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stream: bool,
}

impl CompletionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// What a video script request should do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptMode {
    /// Write a new script about a topic
    Create { topic: String },
    /// Improve an existing script
    Rewrite {
        original_script: String,
        optimization_needs: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoScriptRequest {
    pub platform: String,
    pub style: String,
    pub mode: ScriptMode,
}

/// Entry point for the assistant features
#[derive(Clone)]
pub struct AssistantService {
    client: StreamClient,
    config: ClientConfig,
    history: Option<Arc<dyn HistoryStore>>,
}

impl AssistantService {
    pub fn new(client: StreamClient, config: ClientConfig) -> Self {
        Self {
            client,
            config,
            history: None,
        }
    }

    /// Build the service over `reqwest` with a file history store at the configured path
    pub fn from_config(config: ClientConfig) -> ProviderResult<Self> {
        let client = StreamClient::from_config(&config)?;
        let store = FileHistoryStore::new(&config.history.path);
        Ok(Self::new(client, config).with_history(Arc::new(store)))
    }

    pub fn with_history(mut self, store: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(store);
        self
    }

    pub fn client(&self) -> &StreamClient {
        &self.client
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn history(&self) -> Option<&Arc<dyn HistoryStore>> {
        self.history.as_ref()
    }

    /// Plain chat completion returning the whole reply text
    pub async fn complete(
        &self,
        messages: Vec<Message>,
        options: CompletionOptions,
    ) -> ProviderResult<String> {
        let model = options
            .model
            .unwrap_or_else(|| self.config.default_model.clone());
        let request = ChatRequest::new(model, messages)
            .with_temperature(options.temperature.unwrap_or(COMPLETION_TEMPERATURE))
            .with_max_tokens(options.max_tokens.unwrap_or(COMPLETION_MAX_TOKENS))
            .with_streaming(options.stream);
        self.client
            .complete(request, self.client.request_options())
            .await
    }

    /// Prompt plus optional images, answered in one non-streamed reply
    pub async fn call_vision(
        &self,
        prompt: &str,
        images: &[String],
        model: Option<&str>,
    ) -> ProviderResult<VisionReply> {
        let message = if images.is_empty() {
            Message::user(prompt)
        } else {
            Message::user_with_images(prompt, images.iter().cloned())
        };
        let model = model.unwrap_or(self.config.default_model.as_str());
        debug!("Vision request with {} images via {}", images.len(), model);

        let request = ChatRequest::new(model, vec![message]).with_temperature(VISION_TEMPERATURE);
        let reply = self
            .client
            .complete_reply(request, self.client.request_options())
            .await?;
        Ok(VisionReply {
            model: model.to_string(),
            ..extract_inline_image(&reply.text, reply.image_url)
        })
    }

    pub async fn analyze_facial_images(
        &self,
        images: &[String],
        requirement: &str,
        analysis_type: &str,
    ) -> ProviderResult<String> {
        let prompt = prompts::facial_analysis(requirement, analysis_type);
        let reply = self.call_vision(&prompt, images, None).await?;
        let record = NewRecord::new(RecordKind::Facial, requirement, &reply.text);
        self.remember(record, &reply.model).await;
        Ok(reply.text)
    }

    /// Three social-media post variants
    pub async fn generate_content(
        &self,
        keywords: &str,
        persona: &str,
        style: &str,
    ) -> ProviderResult<Vec<String>> {
        let prompt = prompts::content(keywords, persona, style);
        let reply = self.call_vision(&prompt, &[], None).await?;
        let record = NewRecord::new(RecordKind::Content, keywords, &reply.text);
        self.remember(record, &reply.model).await;
        Ok(split_variants(&reply.text))
    }

    pub async fn generate_video_script(&self, request: &VideoScriptRequest) -> ProviderResult<String> {
        let (prompt, subject) = match &request.mode {
            ScriptMode::Create { topic } => (
                prompts::video_create(&request.platform, topic, &request.style),
                topic.as_str(),
            ),
            ScriptMode::Rewrite {
                original_script,
                optimization_needs,
            } => (
                prompts::video_rewrite(&request.platform, original_script, optimization_needs),
                optimization_needs.as_str(),
            ),
        };
        let reply = self.call_vision(&prompt, &[], None).await?;
        let record = NewRecord::new(RecordKind::Video, subject, &reply.text);
        self.remember(record, &reply.model).await;
        Ok(reply.text)
    }

    /// Five styled replies to a client question
    pub async fn generate_qa_replies(
        &self,
        question: &str,
        scenario: &str,
        style: &str,
    ) -> ProviderResult<Vec<QaReply>> {
        let prompt = prompts::qa(question, scenario, style);
        let reply = self.call_vision(&prompt, &[], None).await?;
        let record = NewRecord::new(RecordKind::Qa, question, &reply.text);
        self.remember(record, &reply.model).await;
        Ok(parse_qa_replies(&reply.text))
    }

    /// Edited photo following the suggestions; fails with `NoImage` when none comes back
    pub async fn generate_comparison_image(
        &self,
        original_image: &str,
        adjustment_suggestions: &str,
    ) -> ProviderResult<String> {
        let prompt = prompts::comparison_image(adjustment_suggestions);
        let images = [original_image.to_string()];
        let reply = self
            .call_vision(&prompt, &images, Some(&self.config.image_model))
            .await?;
        reply.image.ok_or(ProviderError::NoImage)
    }

    /// Stream a facial analysis while checkpointing it into the history store.
    ///
    /// The task is saved before the request, its partial response is saved
    /// every time the text crosses the snapshot cadence, and on completion a
    /// facial record is written and the task removed. A failed run leaves the
    /// task in place for `resume_task`; a cancelled one removes it.
    pub async fn run_tracked_analysis<C: StreamCallbacks + ?Sized>(
        &self,
        mut task: PendingTask,
        options: RequestOptions,
        callbacks: &mut C,
    ) -> ProviderResult<StreamOutcome> {
        let store = self.history.clone();
        if let Some(store) = &store {
            if let Err(e) = store.save_task(&task).await {
                warn!("Failed to save pending task {}: {}", task.id, e);
            }
        }

        let message = Message::user_with_images(task.prompt.clone(), task.image_contents.clone());
        let model = self.config.default_model.clone();
        let request = ChatRequest::new(model.clone(), vec![message])
            .with_temperature(VISION_TEMPERATURE)
            .with_top_p(1.0)
            .with_streaming(true);

        let mut lifecycle = Lifecycle::new(callbacks);
        lifecycle.open();
        let mut normalizer = match self.client.open(request, options).await {
            Ok(normalizer) => normalizer,
            Err(e) => {
                self.finish_task(&store, &task, e.is_cancelled()).await;
                return lifecycle.fail(e, None);
            }
        };

        while let Some(item) = normalizer.next_delta().await {
            match item {
                Ok(delta) => {
                    lifecycle.message(&delta);
                    if normalizer.session_mut().take_snapshot() {
                        if let Some(store) = &store {
                            task.partial_response = normalizer.session().text().to_string();
                            task.timestamp = Utc::now();
                            debug!(
                                "Snapshot of task {} at {} characters",
                                task.id,
                                normalizer.session().char_count()
                            );
                            if let Err(e) = store.save_task(&task).await {
                                warn!("Failed to snapshot task {}: {}", task.id, e);
                            }
                        }
                    }
                }
                Err(e) => {
                    if !e.is_cancelled() {
                        task.partial_response = normalizer.session().text().to_string();
                    }
                    self.finish_task(&store, &task, e.is_cancelled()).await;
                    return lifecycle.fail(e, Some(normalizer.session()));
                }
            }
        }

        let outcome = lifecycle.close(Some(normalizer.session()));
        if let Some(store) = &store {
            let subject = task.requirement.clone().unwrap_or_else(|| task.prompt.clone());
            let record = NewRecord::new(RecordKind::Facial, subject, &outcome.text)
                .with_metadata(self.metadata(&model));
            if let Err(e) = store.save(record).await {
                warn!("Failed to save analysis of task {}: {}", task.id, e);
            }
            if let Err(e) = store.remove_task(&task.id).await {
                warn!("Failed to remove task {}: {}", task.id, e);
            }
        }
        info!("Tracked analysis {} completed", task.id);
        Ok(outcome)
    }

    /// Re-run a pending analysis from its saved prompt.
    ///
    /// The stale partial response is discarded because the prompt is sent again.
    pub async fn resume_task<C: StreamCallbacks + ?Sized>(
        &self,
        id: &str,
        options: RequestOptions,
        callbacks: &mut C,
    ) -> ProviderResult<StreamOutcome> {
        let store = self
            .history
            .as_ref()
            .ok_or_else(|| ProviderError::Configuration("No history store configured".into()))?;
        let mut task = store
            .load_task(id)
            .await?
            .ok_or_else(|| ProviderError::Storage(format!("No pending task {}", id)))?;
        info!(
            "Resuming task {} ({} characters discarded)",
            id,
            task.partial_response.chars().count()
        );
        task.partial_response.clear();
        self.run_tracked_analysis(task, options, callbacks).await
    }

    async fn finish_task(
        &self,
        store: &Option<Arc<dyn HistoryStore>>,
        task: &PendingTask,
        cancelled: bool,
    ) {
        let Some(store) = store else {
            return;
        };
        let result = if cancelled {
            store.remove_task(&task.id).await
        } else {
            store.save_task(task).await
        };
        if let Err(e) = result {
            warn!("Failed to update pending task {}: {}", task.id, e);
        }
    }

    fn metadata(&self, model: &str) -> RecordMetadata {
        RecordMetadata {
            model_provider: Some(route_model(model).as_str().to_string()),
            model_name: Some(model.to_string()),
            temperature: Some(VISION_TEMPERATURE),
            ..RecordMetadata::default()
        }
    }

    /// Save a finished result when a store is configured. Failures are logged only.
    async fn remember(&self, record: NewRecord, model: &str) {
        let Some(store) = &self.history else {
            return;
        };
        let record = record.with_metadata(self.metadata(model));
        if let Err(e) = store.save(record).await {
            warn!("Failed to save history record: {}", e);
        }
    }
}
