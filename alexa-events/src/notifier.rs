//! Delivery of events to the Alexa event gateway.

use async_trait::async_trait;

use crate::error::NotifyError;
use crate::region::{GatewayConfig, GatewayRegion};
use crate::report::ChangeReport;

/// Outbound sink for change reports.
#[async_trait]
pub trait EventNotifier: Send + Sync {
    async fn notify_change_report(
        &self,
        gateway: GatewayRegion,
        report: &ChangeReport,
    ) -> Result<(), NotifyError>;
}

/// Posts change reports to the Alexa event gateway over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpEventNotifier {
    client: reqwest::Client,
    gateways: GatewayConfig,
}

impl HttpEventNotifier {
    pub fn new(gateways: GatewayConfig) -> Result<Self, NotifyError> {
        gateways.validate()?;
        let client = reqwest::Client::builder()
            .timeout(gateways.request_timeout)
            .build()?;
        Ok(Self { client, gateways })
    }

    pub fn gateways(&self) -> &GatewayConfig {
        &self.gateways
    }
}

#[async_trait]
impl EventNotifier for HttpEventNotifier {
    async fn notify_change_report(
        &self,
        gateway: GatewayRegion,
        report: &ChangeReport,
    ) -> Result<(), NotifyError> {
        let url = self.gateways.url_for(gateway)?;
        tracing::debug!(
            gateway = %gateway,
            url = %url,
            message_id = report.message_id(),
            endpoint_id = report.endpoint_id(),
            "Sending change report"
        );

        let response = self.client.post(url).json(report).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(
            gateway = %gateway,
            status = status.as_u16(),
            message_id = report.message_id(),
            "Alexa event gateway accepted change report"
        );
        Ok(())
    }
}
