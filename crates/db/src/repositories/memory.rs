use std::collections::HashMap;

use tokio::sync::RwLock;

use cartbot_core::domain::order::{OrderId, PlacedOrder};

use super::{OrderRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<String, PlacedOrder>>,
}

impl InMemoryOrderRepository {
    pub async fn saved(&self) -> Vec<PlacedOrder> {
        let orders = self.orders.read().await;
        orders.values().cloned().collect()
    }
}

#[async_trait::async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn save(&self, order: PlacedOrder) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().await;
        orders.insert(order.id.0.clone(), order);
        Ok(())
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<PlacedOrder>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id.0).cloned())
    }
}
