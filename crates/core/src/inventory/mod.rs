//! Worker inventory: discovery of this system's live worker instances.

use std::sync::Arc;

use crate::compute::{
    ComputeError, ComputeProvider, InstanceFilter, InstanceRole, WorkerInstance, TAG_GROUP,
    TAG_ITEM, TAG_PURPOSE,
};

/// Lists pending and running worker instances.
///
/// Every call queries the provider afresh; instances terminate themselves
/// between cycles, so results are never cached.
#[derive(Clone)]
pub struct WorkerInventory {
    provider: Arc<dyn ComputeProvider>,
}

impl WorkerInventory {
    pub fn new(provider: Arc<dyn ComputeProvider>) -> Self {
        Self { provider }
    }

    /// Active workers, optionally limited to one group.
    pub async fn list_active(
        &self,
        group: Option<&str>,
    ) -> Result<Vec<WorkerInstance>, ComputeError> {
        let mut filter = InstanceFilter::new()
            .active()
            .with_tag(TAG_PURPOSE, InstanceRole::Worker.purpose());
        if let Some(group) = group {
            filter = filter.with_tag(TAG_GROUP, group);
        }

        let instances = self.provider.describe_instances(&filter).await?;

        // Re-apply the filter locally so a lax provider cannot inflate the count.
        Ok(instances
            .into_iter()
            .filter(|instance| filter.matches(instance))
            .collect())
    }

    /// Number of active workers, optionally limited to one group.
    pub async fn active_count(&self, group: Option<&str>) -> Result<usize, ComputeError> {
        Ok(self.list_active(group).await?.len())
    }

    /// Whether an active worker was launched for this exact item.
    pub fn has_worker_for(active: &[WorkerInstance], item: &str) -> bool {
        active.iter().any(|instance| instance.tag(TAG_ITEM) == Some(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::{InstanceId, InstanceState, Tags};
    use crate::testing::MockComputeProvider;

    fn tags(purpose: &str, group: &str, item: &str) -> Tags {
        let mut tags = Tags::new();
        tags.insert(TAG_PURPOSE.to_string(), purpose.to_string());
        tags.insert(TAG_GROUP.to_string(), group.to_string());
        tags.insert(TAG_ITEM.to_string(), item.to_string());
        tags
    }

    async fn populated_provider() -> Arc<MockComputeProvider> {
        let provider = Arc::new(MockComputeProvider::new());
        provider
            .add_instance(
                "i-1",
                InstanceState::Running,
                tags("scrapefleet-worker", "UK", "London"),
            )
            .await;
        provider
            .add_instance(
                "i-2",
                InstanceState::Pending,
                tags("scrapefleet-worker", "UK", "Leeds"),
            )
            .await;
        provider
            .add_instance(
                "i-3",
                InstanceState::Terminated,
                tags("scrapefleet-worker", "UK", "York"),
            )
            .await;
        provider
            .add_instance(
                "i-4",
                InstanceState::Running,
                tags("scrapefleet-worker", "FR", "Paris"),
            )
            .await;
        provider
            .add_instance(
                "i-5",
                InstanceState::Running,
                tags("scrapefleet-controller", "UK", "-"),
            )
            .await;
        provider
            .add_instance(
                "i-6",
                InstanceState::Running,
                tags("something-else", "UK", "Hull"),
            )
            .await;
        provider
    }

    #[tokio::test]
    async fn test_list_active_scoped_to_group() {
        let provider = populated_provider().await;
        let inventory = WorkerInventory::new(provider);

        let active = inventory.list_active(Some("UK")).await.unwrap();
        let ids: Vec<&InstanceId> = active.iter().map(|i| &i.id).collect();
        assert_eq!(ids, vec![&InstanceId::new("i-1"), &InstanceId::new("i-2")]);
    }

    #[tokio::test]
    async fn test_list_active_all_groups() {
        let provider = populated_provider().await;
        let inventory = WorkerInventory::new(provider);
        assert_eq!(inventory.active_count(None).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_lax_provider_is_filtered_locally() {
        let provider = populated_provider().await;
        provider.ignore_filters(true).await;
        let inventory = WorkerInventory::new(provider);
        assert_eq!(inventory.active_count(Some("UK")).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let provider = populated_provider().await;
        provider
            .set_next_describe_error(ComputeError::Provider("throttled".to_string()))
            .await;
        let inventory = WorkerInventory::new(provider);
        assert!(inventory.list_active(Some("UK")).await.is_err());
    }

    #[tokio::test]
    async fn test_has_worker_for() {
        let provider = populated_provider().await;
        let inventory = WorkerInventory::new(provider);
        let active = inventory.list_active(Some("UK")).await.unwrap();
        assert!(WorkerInventory::has_worker_for(&active, "London"));
        assert!(!WorkerInventory::has_worker_for(&active, "York"));
    }
}
