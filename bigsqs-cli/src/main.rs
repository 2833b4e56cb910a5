//! bigsqs - send and receive oversize SQS messages from the shell
//!
//! Bodies over the threshold are parked in S3 and the queue carries a
//! pointer record, compatible with the Amazon SQS Extended Client Library.

mod config;

use bigsqs::{
    utf8_len, BigSqsClient, MessageAttributeValue, OutgoingMessage, PointerBody, MAX_SQS_MESSAGE_SIZE,
};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "bigsqs")]
#[command(about = "SQS client that offloads oversize payloads to S3", long_about = None)]
struct Args {
    /// Queue URL
    #[arg(long, global = true, env = "BIGSQS_QUEUE_URL")]
    queue_url: Option<String>,

    /// Bucket for oversize payloads
    #[arg(long, global = true, env = "BIGSQS_BUCKET")]
    bucket: Option<String>,

    /// Payloads larger than this many bytes go to S3
    #[arg(long, global = true, env = "BIGSQS_THRESHOLD")]
    threshold: Option<usize>,

    /// AWS region
    #[arg(long, global = true, env = "AWS_REGION")]
    region: Option<String>,

    /// AWS access key id; the default credential chain is used when unset
    #[arg(long, global = true, env = "BIGSQS_ACCESS_KEY_ID")]
    access_key_id: Option<String>,

    /// AWS secret access key
    #[arg(long, global = true, env = "BIGSQS_SECRET_ACCESS_KEY", hide_env_values = true)]
    secret_access_key: Option<String>,

    /// Custom endpoint for SQS and S3, e.g. a local emulator
    #[arg(long, global = true, env = "BIGSQS_ENDPOINT_URL")]
    endpoint_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn", env = "BIGSQS_LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

/// Message body taken from a file or the command line
#[derive(clap::Args, Debug)]
struct BodyArgs {
    /// Read the body from a file
    #[arg(long, conflicts_with = "body")]
    file: Option<PathBuf>,

    /// Message body
    #[arg(required_unless_present = "file")]
    body: Option<String>,
}

impl BodyArgs {
    async fn read(self) -> anyhow::Result<String> {
        match (self.file, self.body) {
            (Some(path), _) => Ok(tokio::fs::read_to_string(&path).await?),
            (None, Some(body)) => Ok(body),
            (None, None) => anyhow::bail!("no message body given"),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one message
    Send {
        #[command(flatten)]
        body: BodyArgs,

        /// Message group id; a fresh one is generated when unset
        #[arg(long)]
        group_id: Option<String>,

        /// String message attribute, as NAME=VALUE
        #[arg(long = "attr", value_parser = parse_attribute)]
        attributes: Vec<(String, String)>,
    },

    /// Receive messages, resolving S3 pointers
    Receive {
        /// Maximum number of messages
        #[arg(long, default_value = "1")]
        max: i32,

        /// Delete every received message, and its payload
        #[arg(long)]
        ack: bool,
    },

    /// Delete a message from the queue
    Ack {
        receipt_handle: String,
    },

    /// Report whether a body is a pointer record, and whether it would be offloaded
    Inspect {
        #[command(flatten)]
        body: BodyArgs,
    },
}

fn parse_attribute(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got '{s}'")),
    }
}

impl Args {
    /// Command line flags win over file and environment settings
    fn apply(&self, config: &mut Config) {
        fn set<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                target.clone_from(value);
            }
        }

        set(&mut config.queue_url, &self.queue_url);
        set(&mut config.bucket, &self.bucket);
        set(&mut config.threshold, &self.threshold);
        set(&mut config.aws.region, &self.region);
        set(&mut config.aws.access_key_id, &self.access_key_id);
        set(&mut config.aws.secret_access_key, &self.secret_access_key);
        set(&mut config.aws.endpoint_url, &self.endpoint_url);
    }
}

async fn connect(config: &Config) -> anyhow::Result<BigSqsClient> {
    let adapter = config.adapter_config()?;
    let client = match config.credentials() {
        Some(credentials) => BigSqsClient::from_aws_creds(credentials, adapter).await?,
        None => BigSqsClient::from_default_aws_creds_at(config.endpoint(), adapter).await?,
    };
    Ok(client)
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("bigsqs={0},bigsqs_sqs={0},bigsqs_s3={0}", args.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::load()?;
    args.apply(&mut config);

    match args.command {
        Command::Send {
            body,
            group_id,
            attributes,
        } => {
            let client = connect(&config).await?;
            let mut message = OutgoingMessage::new(body.read().await?);
            if let Some(group_id) = group_id {
                message = message.with_group_id(group_id);
            }
            for (name, value) in attributes {
                message = message.with_attribute(name, MessageAttributeValue::string(value));
            }

            let output = client.send_message(message).await?;
            info!(message_id = %output.message_id, "Sent");
            print_json(&output)?;
        }
        Command::Receive { max, ack } => {
            let client = connect(&config).await?;
            let output = client.receive_messages(max, None).await?;
            print_json(&output.messages)?;

            if ack {
                for message in &output.messages {
                    client.delete_message(&message.receipt_handle).await?;
                }
                info!(count = output.messages.len(), "Acknowledged");
            }
        }
        Command::Ack { receipt_handle } => {
            // Payload bindings live in the process that received the message
            warn!("Only the queue entry is deleted; any S3 payload is left in place");
            let client = connect(&config).await?;
            let output = client.delete_message(&receipt_handle).await?;
            print_json(&output)?;
        }
        Command::Inspect { body } => {
            let body = body.read().await?;
            let size = utf8_len(&body);
            let threshold = config.threshold.unwrap_or(MAX_SQS_MESSAGE_SIZE);
            let pointer = match PointerBody::inspect(&body) {
                PointerBody::Plain => json!(null),
                PointerBody::Pointer(pointer) => json!(pointer),
                PointerBody::Malformed(reason) => json!({ "malformed": reason }),
            };
            print_json(&json!({
                "size": size,
                "threshold": threshold,
                "offloaded": size > threshold,
                "pointer": pointer,
            }))?;
        }
    }

    Ok(())
}
