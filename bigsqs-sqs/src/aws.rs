//! Amazon SQS client backed by the AWS SDK

use async_trait::async_trait;
use aws_sdk_sqs::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_sqs::operation::RequestId;
use aws_sdk_sqs::primitives::Blob;
use aws_sdk_sqs::types::{
    Message as SdkMessage, MessageAttributeValue as SdkAttributeValue, MessageSystemAttributeName,
};
use aws_sdk_sqs::Client;
use base64::Engine;
use bigsqs_core::{
    DeleteMessageOutput, MessageAttributeValue, QueueClient, QueueError, ReceiveMessageOutput,
    ReceiveMessageRequest, ReceivedMessage, ResponseMetadata, SendMessageOutput,
    SendMessageRequest,
};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Queue client for Amazon SQS
#[derive(Debug, Clone)]
pub struct SqsQueueClient {
    client: Client,
}

impl SqsQueueClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn map_sdk_error<E, R>(err: SdkError<E, R>) -> QueueError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let Some(service) = err.as_service_error() else {
        return QueueError::transport(err);
    };

    let code = service.code().unwrap_or("Unknown").to_string();
    let message = service.message().unwrap_or_default().to_string();
    match code.as_str() {
        "AWS.SimpleQueueService.NonExistentQueue" | "QueueDoesNotExist" => {
            QueueError::QueueNotFound(message)
        }
        "ReceiptHandleIsInvalid" => QueueError::ReceiptHandleIsInvalid(message),
        "InvalidParameterValue" | "InvalidAttributeValue" | "MissingParameter" => {
            QueueError::InvalidParameter(message)
        }
        _ => QueueError::Service { code, message },
    }
}

fn metadata(request_id: Option<&str>) -> ResponseMetadata {
    ResponseMetadata {
        request_id: request_id.map(str::to_string),
        http_status_code: 200,
        http_headers: BTreeMap::new(),
    }
}

fn to_sdk_attribute(value: MessageAttributeValue) -> Result<SdkAttributeValue, QueueError> {
    let binary = match &value.binary_value {
        Some(_) => Some(value.binary_bytes().ok_or_else(|| {
            QueueError::InvalidParameter("binary attribute is not valid base64".to_string())
        })?),
        None => None,
    };

    SdkAttributeValue::builder()
        .data_type(value.data_type)
        .set_string_value(value.string_value)
        .set_binary_value(binary.map(Blob::new))
        .build()
        .map_err(|e| QueueError::InvalidParameter(e.to_string()))
}

fn from_sdk_attribute(value: &SdkAttributeValue) -> MessageAttributeValue {
    MessageAttributeValue {
        data_type: value.data_type().to_string(),
        string_value: value.string_value().map(str::to_string),
        binary_value: value
            .binary_value()
            .map(|b| base64::engine::general_purpose::STANDARD.encode(b.as_ref())),
    }
}

fn from_sdk_message(message: SdkMessage) -> ReceivedMessage {
    ReceivedMessage {
        message_id: message.message_id.unwrap_or_default(),
        receipt_handle: message.receipt_handle.unwrap_or_default(),
        md5_of_body: message.md5_of_body.unwrap_or_default(),
        body: message.body.unwrap_or_default(),
        attributes: message
            .attributes
            .unwrap_or_default()
            .into_iter()
            .map(|(name, value)| (name.as_str().to_string(), value))
            .collect(),
        message_attributes: message
            .message_attributes
            .unwrap_or_default()
            .iter()
            .map(|(name, value)| (name.clone(), from_sdk_attribute(value)))
            .collect::<HashMap<_, _>>(),
    }
}

#[async_trait]
impl QueueClient for SqsQueueClient {
    async fn send_message(
        &self,
        queue_url: &str,
        request: SendMessageRequest,
    ) -> Result<SendMessageOutput, QueueError> {
        let mut builder = self
            .client
            .send_message()
            .queue_url(queue_url)
            .message_body(request.body)
            .set_message_deduplication_id(request.deduplication_id)
            .set_message_group_id(request.group_id);
        for (name, value) in request.message_attributes {
            builder = builder.message_attributes(name, to_sdk_attribute(value)?);
        }

        let output = builder.send().await.map_err(map_sdk_error)?;
        debug!(queue = %queue_url, message_id = ?output.message_id(), "SQS SendMessage");

        Ok(SendMessageOutput {
            message_id: output.message_id().unwrap_or_default().to_string(),
            md5_of_message_body: output.md5_of_message_body().map(str::to_string),
            sequence_number: output.sequence_number().map(str::to_string),
            response_metadata: metadata(output.request_id()),
        })
    }

    async fn receive_message(
        &self,
        queue_url: &str,
        request: ReceiveMessageRequest,
    ) -> Result<ReceiveMessageOutput, QueueError> {
        let output = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(request.max_number_of_messages)
            .set_message_attribute_names(Some(request.message_attribute_names))
            .message_system_attribute_names(MessageSystemAttributeName::All)
            .wait_time_seconds(request.wait_time_seconds)
            .send()
            .await
            .map_err(map_sdk_error)?;

        let response_metadata = metadata(output.request_id());
        let messages: Vec<ReceivedMessage> = output
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(from_sdk_message)
            .collect();
        debug!(queue = %queue_url, count = messages.len(), "SQS ReceiveMessage");

        Ok(ReceiveMessageOutput {
            messages,
            response_metadata,
        })
    }

    async fn delete_message(
        &self,
        queue_url: &str,
        receipt_handle: &str,
    ) -> Result<DeleteMessageOutput, QueueError> {
        let output = self
            .client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(map_sdk_error)?;
        debug!(queue = %queue_url, receipt = %receipt_handle, "SQS DeleteMessage");

        Ok(DeleteMessageOutput {
            response_metadata: metadata(output.request_id()),
        })
    }
}
