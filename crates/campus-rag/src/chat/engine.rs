use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::llm::{GenerationOptions, LanguageModelClient, OllamaClient};
use crate::rag::{
    resolve_settings, ConversationalIntent, DataSource, IntentClassificationResult,
    IntentClassifier, QueryAnalyzer, QueryRewriter,
};
use crate::search::{RetrievalClient, RetrievalParams};
use crate::types::{CacheClearResponse, ChatRequest, ChatResponse, IntentSummary};

use super::{
    build_knowledge_base_prompt, build_messages, normalize_cache_key, preprocess_prompt,
    truncate_context_to_budget, ConversationContext, ConversationContextStore, RequestMetadata,
    ResponseCache, TurnMetadata,
};

pub struct ChatEngine {
    retrieval: Arc<dyn RetrievalClient>,
    llm: Arc<dyn LanguageModelClient>,
    classifier: IntentClassifier,
    analyzer: QueryAnalyzer,
    rewriter: QueryRewriter,
    cache: ResponseCache,
    conversations: ConversationContextStore,
}

impl ChatEngine {
    pub fn new(
        config: &PipelineConfig,
        retrieval: Arc<dyn RetrievalClient>,
        llm: Arc<dyn LanguageModelClient>,
    ) -> Self {
        let info = llm.info();
        tracing::info!(
            provider = %info.name,
            model = %info.model,
            cache_capacity = config.cache.capacity,
            max_turns = config.conversation.max_turns,
            "ChatEngine initialized"
        );
        Self {
            retrieval,
            llm,
            classifier: IntentClassifier::new(),
            analyzer: QueryAnalyzer::with_settings_policy(config.settings.clone()),
            rewriter: QueryRewriter::new(),
            cache: ResponseCache::new(&config.cache),
            conversations: ConversationContextStore::new(config.conversation.clone()),
        }
    }

    /// Engine answering through the Ollama endpoint in `config.llm`.
    pub fn with_ollama(config: &PipelineConfig, retrieval: Arc<dyn RetrievalClient>) -> Result<Self> {
        config.validate().map_err(|e| anyhow!("Invalid pipeline config: {}", e))?;
        let llm = Arc::new(OllamaClient::new(&config.llm)?);
        Ok(Self::new(config, retrieval, llm))
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn conversations(&self) -> &ConversationContextStore {
        &self.conversations
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    pub fn analyzer(&self) -> &QueryAnalyzer {
        &self.analyzer
    }

    pub async fn process_message(
        &self,
        request: ChatRequest,
        metadata: &RequestMetadata,
    ) -> Result<ChatResponse, PipelineError> {
        let start_time = Instant::now();

        // 1. Preprocess
        let prompt = preprocess_prompt(&request.prompt);
        if prompt.is_empty() {
            return Err(PipelineError::EmptyPrompt);
        }

        // 2. Classify and size retrieval
        let classification = self.classifier.classify_intent(&prompt);
        let analysis = self.analyzer.analyze_complexity(&prompt, &classification);
        tracing::debug!("Query analysis:\n{}", self.analyzer.format_analysis(&analysis));

        let policy = self.analyzer.settings_policy();
        let settings = resolve_settings(
            &request.overrides(),
            Some(&analysis.settings),
            &policy.defaults(),
            &policy.caps,
        );

        // 3. Session context, snapshot so no lock outlives this line
        let session_id = self.conversations.get_session_id(metadata);
        let context = self.conversations.get_context(&session_id);

        // 4. Follow-up resolution
        let is_follow_up = analysis.is_follow_up
            || classification.conversational_intent == ConversationalIntent::FollowUp;
        let (query, cacheable) = if is_follow_up {
            let rewritten = self.rewriter.rewrite_follow_up(&prompt, context.as_ref());
            tracing::debug!(
                original = %rewritten.original_query,
                rewritten = %rewritten.rewritten_query,
                explanation = %rewritten.explanation,
                "Follow-up rewrite"
            );
            let resolved = rewritten.used_context;
            (rewritten.rewritten_query, resolved)
        } else {
            (prompt.clone(), true)
        };
        let classification = if is_follow_up {
            self.route_follow_up(classification, &query, context.as_ref())
        } else {
            classification
        };

        tracing::info!(
            session_id = %session_id,
            intent = classification.conversational_intent.as_str(),
            source = classification.source.as_str(),
            category = %classification.category,
            complexity = %analysis.complexity,
            multiplier = analysis.rag_multiplier,
            follow_up = is_follow_up,
            "ChatEngine: request classified"
        );

        let mut detected_topics = analysis.topic_categories();
        if detected_topics.is_empty() && classification.source == DataSource::KnowledgeBase {
            // Lets a chain of follow-ups keep the knowledge base route.
            detected_topics.push(classification.category.clone());
        }
        let turn_metadata = TurnMetadata {
            detected_topics,
            complexity: analysis.complexity,
        };
        let cache_key = normalize_cache_key(&query);

        // 5. Cache
        if cacheable {
            if let Some(reply) = self.cache.get_cached_ai_response(&cache_key) {
                tracing::info!(session_id = %session_id, "ChatEngine: cache hit");
                self.conversations
                    .store_conversation(&session_id, &query, &reply, turn_metadata);
                return Ok(ChatResponse {
                    reply,
                    complexity: analysis.complexity,
                    cached: true,
                    intent: IntentSummary::from(&classification),
                    session_id,
                    settings,
                    duration_ms: start_time.elapsed().as_millis() as u64,
                });
            }
            tracing::debug!("ChatEngine: cache miss");
        } else {
            tracing::debug!("ChatEngine: unresolved follow-up, bypassing cache");
        }

        // 6. Instruction: grounded knowledge base or general knowledge
        let system_prompt = match classification.source {
            DataSource::KnowledgeBase => {
                let params = RetrievalParams::from_settings(query.as_str(), &settings);
                let retrieved = self.retrieval.retrieve(&params).await.map_err(|e| {
                    tracing::warn!(error = %e, "Knowledge base retrieval failed");
                    PipelineError::Retrieval(e)
                })?;
                let context_text = truncate_context_to_budget(&retrieved, settings.rag_max_tokens);
                tracing::info!(
                    max_sections = params.max_sections,
                    max_tokens = params.max_tokens,
                    context_len = context_text.len(),
                    "ChatEngine: knowledge base context retrieved"
                );
                build_knowledge_base_prompt(&classification.category, &context_text)
            }
            DataSource::GeneralKnowledge => self.classifier.get_system_prompt(&classification),
        };

        // 7. Generate
        let messages = build_messages(&system_prompt, context.as_ref(), &query);
        let options = GenerationOptions {
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            num_ctx: settings.num_ctx,
        };
        let reply = self.llm.chat(&messages, &options).await.map_err(|e| {
            tracing::warn!(error = %e, "LLM generation failed");
            PipelineError::Generation(e)
        })?;
        if reply.trim().is_empty() {
            tracing::warn!("LLM returned an empty reply");
            return Err(PipelineError::EmptyReply);
        }

        // 8. Write through
        if cacheable {
            self.cache
                .cache_ai_response(&cache_key, &reply, analysis.complexity.as_str());
        }
        self.conversations
            .store_conversation(&session_id, &query, &reply, turn_metadata);

        let duration_ms = start_time.elapsed().as_millis() as u64;
        tracing::info!(
            session_id = %session_id,
            duration_ms,
            reply_len = reply.len(),
            "ChatEngine: reply generated"
        );

        Ok(ChatResponse {
            reply,
            complexity: analysis.complexity,
            cached: false,
            intent: IntentSummary::from(&classification),
            session_id,
            settings,
            duration_ms,
        })
    }

    /// Picks the data source for a follow-up. The resolved text is classified
    /// again; if it still carries no campus topic, the previous turn's first
    /// topic keeps the conversation on the knowledge base.
    fn route_follow_up(
        &self,
        classification: IntentClassificationResult,
        query: &str,
        context: Option<&ConversationContext>,
    ) -> IntentClassificationResult {
        if classification.source == DataSource::KnowledgeBase {
            return classification;
        }

        let resolved = self.classifier.classify_intent(query);
        if resolved.source == DataSource::KnowledgeBase {
            return IntentClassificationResult {
                source: resolved.source,
                category: resolved.category,
                ..classification
            };
        }

        let inherited = context
            .and_then(|c| c.last_turn())
            .and_then(|turn| turn.detected_topics.first());
        match inherited {
            Some(category) => {
                tracing::debug!(category = %category, "Follow-up inherits knowledge base topic");
                IntentClassificationResult {
                    source: DataSource::KnowledgeBase,
                    category: category.clone(),
                    ..classification
                }
            }
            None => classification,
        }
    }

    pub fn clear_cache(&self) -> CacheClearResponse {
        let cleared = self.cache.clear_ai_response_cache();
        tracing::info!(cleared, "ChatEngine: response cache cleared");
        CacheClearResponse {
            success: true,
            cleared,
            message: format!("Cleared {} cached responses", cleared),
        }
    }
}
