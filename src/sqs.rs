//! Queue adapter for post-processing notifications. Delivery is
//! at-least-once; consumers own idempotency.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_sqs::Client;
use aws_sdk_sqs::types::{MessageAttributeValue, QueueAttributeName};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::models::QueueMessage;
use crate::ports::{MessageQueue, ReceivedMessage};

const VISIBILITY_TIMEOUT_SECONDS: &str = "30";
const MESSAGE_RETENTION_SECONDS: &str = "1209600"; // 14 days
const RECEIVE_WAIT_SECONDS: &str = "0"; // short polling

#[derive(Clone)]
pub struct SqsMessageQueue {
    client: Client,
    queue_url: String,
}

impl SqsMessageQueue {
    /// Builds the client and resolves the queue URL, creating the queue with
    /// the declared retention and visibility attributes if it is absent.
    pub async fn new(config: &Config) -> Result<Self> {
        let base = crate::aws_base_config(config).await;
        let client = Client::new(&base);

        let queue_url = ensure_queue(&client, &config.sqs_queue)
            .await
            .with_context(|| format!("failed to ensure queue {} exists", config.sqs_queue))?;

        info!(
            endpoint = %config.aws_endpoint,
            region = %config.aws_region,
            queue = %config.sqs_queue,
            queue_url = %queue_url,
            "SQS client initialized"
        );

        Ok(Self { client, queue_url })
    }
}

async fn ensure_queue(client: &Client, queue_name: &str) -> Result<String> {
    if let Ok(output) = client.get_queue_url().queue_name(queue_name).send().await {
        if let Some(url) = output.queue_url() {
            return Ok(url.to_string());
        }
    }

    let created = client
        .create_queue()
        .queue_name(queue_name)
        .attributes(QueueAttributeName::VisibilityTimeout, VISIBILITY_TIMEOUT_SECONDS)
        .attributes(QueueAttributeName::MessageRetentionPeriod, MESSAGE_RETENTION_SECONDS)
        .attributes(QueueAttributeName::ReceiveMessageWaitTimeSeconds, RECEIVE_WAIT_SECONDS)
        .send()
        .await
        .context("failed to create queue")?;

    created
        .queue_url()
        .map(|url| url.to_string())
        .context("created queue has no URL")
}

fn string_attribute(value: &str) -> Result<MessageAttributeValue, AppError> {
    MessageAttributeValue::builder()
        .data_type("String")
        .string_value(value)
        .build()
        .map_err(|e| AppError::Infra(format!("failed to build message attribute: {e}")))
}

#[async_trait]
impl MessageQueue for SqsMessageQueue {
    async fn publish(&self, msg: &QueueMessage) -> Result<(), AppError> {
        let body = serde_json::to_string(msg)
            .map_err(|e| AppError::Infra(format!("failed to encode queue message: {e}")))?;

        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .message_attributes("Region", string_attribute(&msg.region)?)
            .message_attributes("Action", string_attribute(&msg.action)?)
            .send()
            .await
            .map_err(|e| AppError::Infra(format!("failed to publish queue message: {e}")))?;

        info!(
            transaction_id = %msg.transaction_id,
            action = %msg.action,
            "queue message published"
        );

        Ok(())
    }

    async fn receive(
        &self,
        max_messages: i32,
        wait_seconds: i32,
    ) -> Result<Vec<ReceivedMessage>, AppError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait_seconds)
            .message_attribute_names("All")
            .send()
            .await
            .map_err(|e| AppError::Infra(format!("failed to receive queue messages: {e}")))?;

        let mut received = Vec::new();
        for raw in output.messages.unwrap_or_default() {
            let Some(receipt_handle) = raw.receipt_handle else {
                warn!(message_id = ?raw.message_id, "received message without receipt handle");
                continue;
            };

            // An undecodable body is dropped, not deleted; it reappears
            // after the visibility timeout. Dead-lettering is external.
            match serde_json::from_str::<QueueMessage>(raw.body.as_deref().unwrap_or_default()) {
                Ok(message) => received.push(ReceivedMessage {
                    message,
                    receipt_handle,
                }),
                Err(e) => warn!(
                    message_id = ?raw.message_id,
                    error = %e,
                    "dropping undecodable queue message"
                ),
            }
        }

        Ok(received)
    }

    async fn delete_by_receipt(&self, receipt_handle: &str) -> Result<(), AppError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| AppError::Infra(format!("failed to delete queue message: {e}")))?;

        Ok(())
    }

    async fn health(&self) -> Result<(), AppError> {
        self.client
            .get_queue_attributes()
            .queue_url(&self.queue_url)
            .attribute_names(QueueAttributeName::All)
            .send()
            .await
            .map_err(|e| AppError::Infra(format!("SQS health check failed: {e}")))?;
        Ok(())
    }
}
