use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use aws_sdk_sqs::types::Message;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha2::{Digest, Sha256};

use evoke_core::{Event, EventBatch};
use evoke_fly::{FlyError, Machine, MachineConfig, MachineFile, MachineProcess, MachinesClient};

use crate::config::EvokeConfig;
use crate::error::BrokerError;
use crate::queue::{ATTR_COMMAND, ATTR_IMAGE, ATTR_SIZE, EventSource};

/// Where the event batch lands inside a launched machine.
pub const EVENTS_GUEST_PATH: &str = "/tmp/events.json";

/// Size used when an event does not name one.
const DEFAULT_SIZE: &str = "performance-2x";

/// Regions tried after the configured one.
const FALLBACK_REGIONS: [&str; 4] = ["bos", "dfw", "den", "mia"];

/// Seam over machine creation so dispatch can run against a stub in tests.
pub trait MachineLauncher: Send + Sync {
    fn launch<'a>(
        &'a self,
        app: &'a str,
        machine: &'a Machine,
    ) -> Pin<Box<dyn Future<Output = Result<Machine, FlyError>> + Send + 'a>>;
}

impl MachineLauncher for MachinesClient {
    fn launch<'a>(
        &'a self,
        app: &'a str,
        machine: &'a Machine,
    ) -> Pin<Box<dyn Future<Output = Result<Machine, FlyError>> + Send + 'a>> {
        Box::pin(self.create_machine(app, machine))
    }
}

/// Seam over message acknowledgement.
pub trait MessageQueue: Send + Sync {
    fn acknowledge<'a>(
        &'a self,
        receipt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), BrokerError>> + Send + 'a>>;
}

impl MessageQueue for EventSource {
    fn acknowledge<'a>(
        &'a self,
        receipt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), BrokerError>> + Send + 'a>> {
        Box::pin(EventSource::acknowledge(self, receipt))
    }
}

/// A group of like events that can share one machine.
#[derive(Debug, Clone, PartialEq)]
pub struct Workload {
    pub image: String,
    pub size: String,
    pub cmd: Vec<String>,
    pub events: Vec<Event>,
    pub receipts: Vec<String>,
}

/// Group messages by the (image, size, command) triple that shapes the
/// machine they need.
///
/// Messages missing an image, or carrying a malformed command attribute or
/// a non-JSON body, are dropped with a warning; SQS redelivers anything left
/// unacknowledged.
pub fn group_messages(messages: &[Message]) -> Vec<Workload> {
    let mut groups: HashMap<String, Workload> = HashMap::new();

    for message in messages {
        let Some(image) = attribute(message, ATTR_IMAGE) else {
            tracing::warn!("an event had no image, dropping it");
            continue;
        };

        let size = attribute(message, ATTR_SIZE).unwrap_or_else(|| {
            tracing::debug!(default = DEFAULT_SIZE, "an event had no size, using the default");
            DEFAULT_SIZE.to_string()
        });

        let cmd_raw = attribute(message, ATTR_COMMAND);
        let cmd: Vec<String> = match &cmd_raw {
            None => Vec::new(),
            Some(raw) => match serde_json::from_str(raw) {
                Ok(cmd) => cmd,
                Err(e) => {
                    tracing::warn!(error = %e, "could not parse an event's command, dropping it");
                    continue;
                }
            },
        };

        let Some(body) = message.body() else {
            tracing::warn!("an event had no body, dropping it");
            continue;
        };
        let event: Event = match serde_json::from_str(body) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "an event body is not valid JSON, dropping it");
                continue;
            }
        };

        let Some(receipt) = message.receipt_handle() else {
            tracing::warn!("an event had no receipt handle, dropping it");
            continue;
        };

        let key = workload_key(&image, &size, cmd_raw.as_deref().unwrap_or(""));
        let workload = groups.entry(key).or_insert_with(|| Workload {
            image: image.clone(),
            size: size.clone(),
            cmd: cmd.clone(),
            events: Vec::new(),
            receipts: Vec::new(),
        });
        workload.events.push(event);
        workload.receipts.push(receipt.to_string());
    }

    groups.into_values().collect()
}

fn attribute(message: &Message, name: &str) -> Option<String> {
    message
        .message_attributes
        .as_ref()?
        .get(name)?
        .string_value()
        .map(str::to_string)
}

/// Stable key for "these events can run on the same machine".
fn workload_key(image: &str, size: &str, cmd_raw: &str) -> String {
    let digest = Sha256::digest(format!("{image}-{size}-{cmd_raw}"));
    hex::encode(digest)
}

/// Build the machine plan for one workload in one region.
pub fn machine_for(workload: &Workload, region: &str) -> Result<Machine, BrokerError> {
    let batch = EventBatch::from_events(workload.events.clone());
    let encoded = BASE64.encode(batch.to_json_string()?);

    let mut config = MachineConfig {
        image: workload.image.clone(),
        size: Some(workload.size.clone()),
        env: HashMap::from([("EVENTS_PATH".to_string(), EVENTS_GUEST_PATH.to_string())]),
        files: vec![MachineFile {
            guest_path: EVENTS_GUEST_PATH.to_string(),
            raw_value: Some(encoded),
            secret_name: None,
        }],
        auto_destroy: true,
        ..MachineConfig::default()
    };

    if !workload.cmd.is_empty() {
        config.processes = vec![MachineProcess {
            cmd: workload.cmd.clone(),
            ..MachineProcess::default()
        }];
    }

    Ok(Machine {
        region: Some(region.to_string()),
        config,
        ..Machine::default()
    })
}

/// Regions to try for a workload: the configured region first, then the
/// static fallbacks.
fn region_attempts(configured: &str) -> Vec<String> {
    let mut regions = vec![configured.to_string()];
    for fallback in FALLBACK_REGIONS {
        if fallback != configured {
            regions.push(fallback.to_string());
        }
    }
    regions
}

/// Turn one received batch of messages into machines.
///
/// Per-workload failures never abort the other workloads. A workload whose
/// machine could not be created in any region keeps its messages
/// unacknowledged so the queue redelivers them.
pub async fn dispatch(
    config: &EvokeConfig,
    launcher: &dyn MachineLauncher,
    queue: &dyn MessageQueue,
    messages: Vec<Message>,
) {
    for workload in group_messages(&messages) {
        tracing::debug!(
            app = %config.fly_app,
            image = %workload.image,
            events = workload.events.len(),
            "creating machine"
        );

        let mut created = None;
        for region in region_attempts(&config.fly_region) {
            let machine = match machine_for(&workload, &region) {
                Ok(machine) => machine,
                Err(e) => {
                    tracing::error!(error = %e, "could not build a machine plan for this workload");
                    break;
                }
            };

            match launcher.launch(&config.fly_app, &machine).await {
                Ok(machine) => {
                    tracing::debug!(
                        machine_id = machine.id.as_deref().unwrap_or("unknown"),
                        region = %region,
                        "machine created"
                    );
                    created = Some(machine);
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, region = %region, "could not create machine, trying next region");
                }
            }
        }

        if created.is_none() {
            tracing::error!(image = %workload.image, "could not create a machine for this workload");
            continue;
        }

        for receipt in &workload.receipts {
            if let Err(e) = queue.acknowledge(receipt).await {
                tracing::error!(error = %e, "machine created but could not delete message");
            }
        }
    }
}
