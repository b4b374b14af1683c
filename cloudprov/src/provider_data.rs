//! Provider data shared by every resource type

use crate::api::{Client, DeviceFarmApi, SageMakerApi};
use std::sync::Arc;

#[derive(Clone)]
pub struct ProviderData {
    pub client: Arc<Client>,
    pub region: String,
    pub account_id: Option<String>,
}

impl ProviderData {
    pub fn new(client: Client, region: String, account_id: Option<String>) -> Self {
        Self {
            client: Arc::new(client),
            region,
            account_id,
        }
    }

    pub fn devicefarm(&self) -> Arc<dyn DeviceFarmApi> {
        self.client.clone()
    }

    pub fn sagemaker(&self) -> Arc<dyn SageMakerApi> {
        self.client.clone()
    }
}
