use std::time::Duration;

use reqwest::{Client, Error};

use crate::configs::ClientConfig;

pub struct HttpClient;

impl HttpClient {
    /// Builds the shared REST client; the node credential is attached per request.
    pub fn new(config: &ClientConfig) -> Result<Client, Error> {
        Client::builder()
            .user_agent(config.client_name.clone())
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
    }
}
