use async_trait::async_trait;
use signal_core::{ConflictEvent, ConflictSink, JournalError};

const CONFLICT_COLOR: u32 = 0xff6600;
/// Discord rejects embed descriptions longer than this
const MAX_DESCRIPTION: usize = 4000;

/// Posts conflict events to a Discord-compatible webhook as an embed.
pub struct WebhookSink {
    webhook_url: String,
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }
}

fn embed_payload(event: &ConflictEvent) -> serde_json::Value {
    let mut description = event.reasoning.clone();
    if description.len() > MAX_DESCRIPTION {
        let mut cut = MAX_DESCRIPTION;
        while !description.is_char_boundary(cut) {
            cut -= 1;
        }
        description.truncate(cut);
    }

    let fields: Vec<serde_json::Value> = event
        .agent_scores
        .iter()
        .map(|(agent, score)| {
            serde_json::json!({
                "name": agent,
                "value": format!("{} {:.0}% (weight {:.2})", score.action, score.adjusted_confidence, score.weight),
                "inline": true,
            })
        })
        .collect();

    serde_json::json!({
        "embeds": [{
            "title": format!("Signal conflict: {} ({})", event.symbol, event.interval),
            "description": description,
            "color": CONFLICT_COLOR,
            "fields": fields,
            "footer": {"text": format!("{} @ {:.1}%", event.final_signal, event.confidence)},
            "timestamp": event.timestamp.to_rfc3339(),
        }]
    })
}

#[async_trait]
impl ConflictSink for WebhookSink {
    async fn record(&self, event: &ConflictEvent) -> Result<(), JournalError> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&embed_payload(event))
            .send()
            .await
            .map_err(|e| JournalError::Webhook(e.to_string()))?;

        if !response.status().is_success() {
            return Err(JournalError::Webhook(format!("Status: {}", response.status())));
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "webhook"
    }
}
