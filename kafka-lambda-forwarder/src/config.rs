use envconfig::Envconfig;
use rdkafka::ClientConfig;

use crate::rebalance::SeekPosition;

/// Environment prefix recognized by the raw client-property pass-through.
const KAFKA_ENV_PREFIX: &str = "KAFKA_";

/// Names the service consumes itself; never forwarded as client properties.
const RESERVED_ENV_NAMES: [&str; 2] = ["KAFKA_TOPIC_NAME", "KAFKA_POSITION"];

/// Named options already applied through their proper channel (the client
/// config, or the loop's batch cap). Their mechanical transforms
/// ("offset.reset", "max.poll.records") are not librdkafka property names,
/// and librdkafka rejects unknown names at client creation.
const NAMED_OPTION_ENV_NAMES: [&str; 2] = ["KAFKA_OFFSET_RESET", "KAFKA_MAX_POLL_RECORDS"];

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(from = "KAFKA_BOOTSTRAP_SERVERS", default = "localhost:9092")]
    pub kafka_bootstrap_servers: String,

    #[envconfig(from = "KAFKA_GROUP_ID", default = "consumerGroup10")]
    pub kafka_group_id: String,

    #[envconfig(from = "KAFKA_CLIENT_ID", default = "client1")]
    pub kafka_client_id: String,

    #[envconfig(from = "KAFKA_TOPIC_NAME", default = "demo")]
    pub kafka_topic_name: String,

    #[envconfig(from = "KAFKA_OFFSET_RESET", default = "earliest")]
    pub kafka_offset_reset: String,

    /// Initial cursor position applied on first assignment: "", "start" or
    /// "end". Empty disables seeking.
    #[envconfig(from = "KAFKA_POSITION", default = "")]
    pub kafka_position: String,

    #[envconfig(from = "KAFKA_MAX_POLL_RECORDS", default = "500")]
    pub kafka_max_poll_records: usize,

    #[envconfig(from = "LAMBDA_FUNCTION_NAME", default = "kafka-forwarder")]
    pub lambda_function_name: String,

    #[envconfig(from = "BIND_HOST", default = "::")]
    pub bind_host: String,

    #[envconfig(from = "BIND_PORT", default = "3301")]
    pub bind_port: u16,
}

impl Config {
    pub fn init_with_defaults() -> Result<Self, envconfig::Error> {
        Config::init_from_env()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_host, self.bind_port)
    }

    pub fn seek_position(&self) -> Option<SeekPosition> {
        SeekPosition::parse(&self.kafka_position)
    }

    /// Client configuration for the forwarding consumer: the named options
    /// first, then the raw `KAFKA_*` pass-through from the environment so
    /// operators can set any client property without a code change.
    pub fn consumer_client_config(&self) -> ClientConfig {
        self.consumer_client_config_with(raw_client_properties(std::env::vars()))
    }

    pub fn consumer_client_config_with(
        &self,
        raw_properties: impl IntoIterator<Item = (String, String)>,
    ) -> ClientConfig {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &self.kafka_bootstrap_servers)
            .set("group.id", &self.kafka_group_id)
            .set("client.id", &self.kafka_client_id)
            .set("auto.offset.reset", &self.kafka_offset_reset)
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false");

        for (property, value) in raw_properties {
            client_config.set(property, value);
        }

        client_config
    }
}

/// Turns prefixed environment overrides into raw client properties: the
/// prefix is stripped, the rest lower-cased with underscores becoming
/// periods. `KAFKA_FOO_BAR=baz` becomes `foo.bar=baz`. The two reserved
/// names and the named options handled elsewhere are skipped, everything
/// else goes through verbatim.
pub fn raw_client_properties(
    vars: impl IntoIterator<Item = (String, String)>,
) -> Vec<(String, String)> {
    let mut properties = Vec::new();
    for (name, value) in vars {
        if !name.starts_with(KAFKA_ENV_PREFIX)
            || RESERVED_ENV_NAMES.contains(&name.as_str())
            || NAMED_OPTION_ENV_NAMES.contains(&name.as_str())
        {
            continue;
        }
        let property = name[KAFKA_ENV_PREFIX.len()..]
            .to_lowercase()
            .replace('_', ".");
        properties.push((property, value));
    }
    properties
}
