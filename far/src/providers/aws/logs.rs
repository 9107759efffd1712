//! Log store adapter (CloudWatch Logs)

use async_trait::async_trait;
use aws_sdk_cloudwatchlogs::Client;

use super::wrap;
use crate::providers::{LogEvent, LogPage, LogStore, ProviderError, SubscriptionFilter};

pub struct CloudWatchLogs {
    client: Client,
}

impl CloudWatchLogs {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl LogStore for CloudWatchLogs {
    async fn create_log_group(&self, group: &str) -> Result<(), ProviderError> {
        self.client
            .create_log_group()
            .log_group_name(group)
            .send()
            .await
            .map_err(wrap)?;
        Ok(())
    }

    async fn put_retention_policy(&self, group: &str, days: i32) -> Result<(), ProviderError> {
        self.client
            .put_retention_policy()
            .log_group_name(group)
            .retention_in_days(days)
            .send()
            .await
            .map_err(wrap)?;
        Ok(())
    }

    async fn describe_subscription_filters(
        &self,
        group: &str,
    ) -> Result<Vec<SubscriptionFilter>, ProviderError> {
        let resp = self
            .client
            .describe_subscription_filters()
            .log_group_name(group)
            .send()
            .await
            .map_err(wrap)?;
        Ok(resp
            .subscription_filters()
            .iter()
            .filter_map(|f| {
                Some(SubscriptionFilter {
                    name: f.filter_name()?.to_string(),
                    destination: f.destination_arn()?.to_string(),
                })
            })
            .collect())
    }

    async fn put_subscription_filter(
        &self,
        group: &str,
        name: &str,
        destination: &str,
    ) -> Result<(), ProviderError> {
        self.client
            .put_subscription_filter()
            .log_group_name(group)
            .filter_name(name)
            .filter_pattern("")
            .destination_arn(destination)
            .send()
            .await
            .map_err(wrap)?;
        Ok(())
    }

    async fn delete_subscription_filter(
        &self,
        group: &str,
        name: &str,
    ) -> Result<(), ProviderError> {
        self.client
            .delete_subscription_filter()
            .log_group_name(group)
            .filter_name(name)
            .send()
            .await
            .map_err(wrap)?;
        Ok(())
    }

    async fn filter_log_events(
        &self,
        group: &str,
        start: i64,
        end: Option<i64>,
        next_token: Option<&str>,
    ) -> Result<LogPage, ProviderError> {
        let resp = self
            .client
            .filter_log_events()
            .log_group_name(group)
            .start_time(start)
            .set_end_time(end)
            .set_next_token(next_token.map(str::to_string))
            .send()
            .await
            .map_err(wrap)?;
        let events = resp
            .events()
            .iter()
            .filter_map(|e| {
                Some(LogEvent {
                    event_id: e.event_id()?.to_string(),
                    timestamp: e.timestamp()?,
                    stream: e.log_stream_name().unwrap_or_default().to_string(),
                    message: e.message().unwrap_or_default().to_string(),
                })
            })
            .collect();
        Ok(LogPage {
            events,
            next_token: resp.next_token().map(str::to_string),
        })
    }
}
