//! Editorial rewrite through the AI service.

use super::{Next, Pipe, StageContext, StageFlow};
use crate::ai::AiService;
use crate::core::PipelineEvent;
use crate::errors::Result;
use crate::payload::{ContentPayload, PayloadPatch};
use crate::store::ContentStore;
use crate::utils::slugify;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::sync::Arc;
use tracing::info;

/// Asks the AI to accept or reject the content and, if accepted, to
/// produce the title, body, SEO fields, image prompt, category and tags.
#[derive(Clone)]
pub struct RewriteStage {
    ai: Arc<AiService>,
    store: Arc<dyn ContentStore>,
}

impl fmt::Debug for RewriteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewriteStage").field("ai", &self.ai).finish_non_exhaustive()
    }
}

impl RewriteStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(ai: Arc<AiService>, store: Arc<dyn ContentStore>) -> Self {
        Self { ai, store }
    }

    async fn categories(&self, payload: &ContentPayload, ctx: &StageContext) -> Result<BTreeMap<i64, String>> {
        if !payload.categories().is_empty() {
            return Ok(payload.categories().clone());
        }
        let stored = self.store.categories().await?;
        if !stored.is_empty() {
            return Ok(stored);
        }
        Ok(ctx.config().categories.clone())
    }
}

fn system_prompt(language: &str, categories: &BTreeMap<i64, String>) -> String {
    let mut prompt = format!(
        "You are the editor of an online news site. Decide whether the article you \
         are given is worth publishing, and if so rewrite it in {language} in your \
         own words, keeping every fact intact.\n\n\
         Reject content that is advertising, spam, a bare list of links, or too \
         short to stand on its own. To reject, answer with:\n\
         {{\"status\": \"reject\", \"reject_reasons\": [\"...\"]}}\n\n\
         Otherwise answer with a single JSON object:\n\
         {{\"status\": \"accept\", \"title\": \"...\", \"content\": \"HTML body\", \
         \"description\": \"one-sentence summary\", \"meta_title\": \"...\", \
         \"meta_description\": \"under 160 characters\", \
         \"text-to-image\": \"a prompt for a featured illustration\", \
         \"category_id\": 0, \"tags\": [\"...\"]}}\n"
    );
    if !categories.is_empty() {
        prompt.push_str("\nPick category_id from:\n");
        for (id, name) in categories {
            let _ = writeln!(prompt, "{id}: {name}");
        }
    }
    prompt.push_str("\nAnswer with JSON only.");
    prompt
}

fn user_prompt(title: Option<&str>, content: &str) -> String {
    format!(
        "Original title: {}\n\nProcess the following article content:\n\n<content>\n{content}\n</content>",
        title.unwrap_or("(none)")
    )
}

fn text_field<'a>(result: &'a Value, key: &str) -> Option<&'a str> {
    result.get(key).and_then(Value::as_str).filter(|s| !s.trim().is_empty())
}

fn reject_reason(result: &Value) -> String {
    let reasons: Vec<String> = match result.get("reject_reasons") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(String::from))
            .filter(|s| !s.trim().is_empty())
            .collect(),
        Some(Value::String(reason)) if !reason.trim().is_empty() => vec![reason.clone()],
        _ => Vec::new(),
    };
    if !reasons.is_empty() {
        return reasons.join("; ");
    }
    text_field(result, "reason").map_or_else(|| "No reason provided".to_string(), String::from)
}

fn tags(result: &Value) -> Vec<String> {
    match result.get("tags") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect(),
        Some(Value::String(list)) => list
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

/// The answered category if it is a known one, else the first known one.
fn resolve_category(result: &Value, categories: &BTreeMap<i64, String>) -> Option<i64> {
    let answered = match result.get("category_id") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    answered
        .filter(|id| categories.contains_key(id))
        .or_else(|| categories.keys().next().copied())
}

#[async_trait]
impl Pipe for RewriteStage {
    fn name(&self) -> &str {
        "rewrite"
    }

    fn label(&self) -> &str {
        "AI Rewrite"
    }

    async fn handle(&self, payload: &ContentPayload, next: Next, ctx: &StageContext) -> Result<StageFlow> {
        let Some(content) = payload.best_content() else {
            ctx.skipped("no content to process");
            return Ok(next.call(payload.clone()));
        };

        let categories = self.categories(payload, ctx).await?;
        let result = self
            .ai
            .complete_json(
                &system_prompt(&ctx.config().ai.output_language, &categories),
                &user_prompt(payload.title(), content),
            )
            .await?;

        if text_field(&result, "status").is_some_and(|s| s.eq_ignore_ascii_case("reject")) {
            let reason = reject_reason(&result);
            info!(reason = %reason, "Content rejected by AI");
            ctx.rejected(&reason);
            return Ok(StageFlow::halt(payload.with(PayloadPatch::new().reject(reason))));
        }

        let title = text_field(&result, "title").or(payload.title());
        let category_id = resolve_category(&result, &categories);

        let mut patch = PayloadPatch::new()
            .content(text_field(&result, "content").unwrap_or(content))
            .tags(tags(&result))
            .categories(categories);
        if let Some(title) = title {
            patch = patch.title(title).slug(slugify(title));
        }
        if let Some(description) = text_field(&result, "description") {
            patch = patch.description(description);
        }
        if let Some(meta_title) = text_field(&result, "meta_title") {
            patch = patch.meta_title(meta_title);
        }
        if let Some(meta_description) = text_field(&result, "meta_description") {
            patch = patch.meta_description(meta_description);
        }
        if let Some(prompt) =
            text_field(&result, "text-to-image").or_else(|| text_field(&result, "image_prompt"))
        {
            patch = patch.image_prompt(prompt);
        }
        if let Some(id) = category_id {
            patch = patch.category_id(id);
        }

        let payload = payload.with(patch);
        info!(
            title = ?payload.title(),
            category_id = ?payload.category_id(),
            tags = payload.tags().len(),
            "Content rewritten"
        );

        ctx.emit(PipelineEvent::ContentRewritten {
            title: payload.title().map(String::from),
            payload: payload.to_snapshot(),
        })
        .await;
        ctx.completed(Some(&format!("\"{}\"", payload.title().unwrap_or("untitled"))));
        Ok(next.call(payload))
    }
}
