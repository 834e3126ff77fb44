use async_trait::async_trait;
use aws_sdk_lambda::primitives::Blob;

use crate::error::ForwarderError;

/// What the service keeps from a completed invocation: the response payload,
/// for logging only. It is never parsed or acted upon.
#[derive(Debug, Clone)]
pub struct InvocationResponse {
    pub payload: Option<String>,
}

/// Seam over the downstream function client so the forwarder can run against
/// fakes in tests.
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    async fn invoke(&self, payload: Vec<u8>) -> Result<InvocationResponse, ForwarderError>;
}

/// AWS Lambda client bound to one function name.
pub struct LambdaInvoker {
    client: aws_sdk_lambda::Client,
    function_name: String,
}

impl LambdaInvoker {
    /// Region and credentials resolve through the SDK's default environment
    /// chain.
    pub async fn new(function_name: String) -> Self {
        let sdk_config = aws_config::load_from_env().await;
        Self {
            client: aws_sdk_lambda::Client::new(&sdk_config),
            function_name,
        }
    }
}

#[async_trait]
impl FunctionInvoker for LambdaInvoker {
    async fn invoke(&self, payload: Vec<u8>) -> Result<InvocationResponse, ForwarderError> {
        let output = self
            .client
            .invoke()
            .function_name(&self.function_name)
            .payload(Blob::new(payload))
            .send()
            .await
            .map_err(|e| ForwarderError::Invoke {
                function: self.function_name.clone(),
                source: e.into(),
            })?;

        Ok(InvocationResponse {
            payload: output
                .payload()
                .map(|blob| String::from_utf8_lossy(blob.as_ref()).into_owned()),
        })
    }
}
