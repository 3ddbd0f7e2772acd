use chrono::{DateTime, Utc};
use sqlx::Row;

use cartbot_core::domain::order::{LineItem, OrderId, PlacedOrder, SessionId};

use super::{OrderRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn save(&self, order: PlacedOrder) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO orders (id, session_id, placed_at) VALUES (?1, ?2, ?3)")
            .bind(&order.id.0)
            .bind(&order.session_id.0)
            .bind(order.placed_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;

        for (position, line) in order.lines.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_lines (order_id, position, product, quantity) \
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&order.id.0)
            .bind(position as i64)
            .bind(&line.product)
            .bind(i64::from(line.quantity))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<PlacedOrder>, RepositoryError> {
        let Some(header) =
            sqlx::query("SELECT session_id, placed_at FROM orders WHERE id = ?1")
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await?
        else {
            return Ok(None);
        };

        let session_id: String =
            header.try_get("session_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let placed_at_str: String =
            header.try_get("placed_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let placed_at = DateTime::parse_from_rfc3339(&placed_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| RepositoryError::Decode(format!("invalid placed_at timestamp: {e}")))?;

        let line_rows = sqlx::query(
            "SELECT product, quantity FROM order_lines WHERE order_id = ?1 ORDER BY position",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        let mut lines = Vec::with_capacity(line_rows.len());
        for row in &line_rows {
            let product: String =
                row.try_get("product").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let quantity: i64 =
                row.try_get("quantity").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let quantity = u32::try_from(quantity)
                .map_err(|_| RepositoryError::Decode(format!("negative quantity: {quantity}")))?;
            lines.push(LineItem { product, quantity });
        }

        Ok(Some(PlacedOrder {
            id: id.clone(),
            session_id: SessionId(session_id),
            lines,
            placed_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use cartbot_core::domain::order::{LineItem, OrderId, PlacedOrder, SessionId};

    use crate::migrations::run_pending;
    use crate::repositories::{OrderRepository, SqlOrderRepository};
    use crate::connect_with_settings;

    async fn prepared_repo() -> SqlOrderRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        run_pending(&pool).await.expect("migrations");
        SqlOrderRepository::new(pool)
    }

    fn order(id: &str) -> PlacedOrder {
        PlacedOrder {
            id: OrderId(id.to_string()),
            session_id: SessionId("session-1".to_string()),
            lines: vec![
                LineItem { product: "pizza".to_string(), quantity: 3 },
                LineItem { product: "soda".to_string(), quantity: 1 },
            ],
            placed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn save_then_find_preserves_lines_in_position_order() {
        let repo = prepared_repo().await;
        let placed = order(&uuid::Uuid::new_v4().to_string());

        repo.save(placed.clone()).await.expect("save");
        let found = repo.find_by_id(&placed.id).await.expect("find").expect("order present");

        assert_eq!(found.session_id, placed.session_id);
        assert_eq!(found.lines, placed.lines);
    }

    #[tokio::test]
    async fn find_of_unknown_order_returns_none() {
        let repo = prepared_repo().await;

        let found =
            repo.find_by_id(&OrderId("missing".to_string())).await.expect("query should run");

        assert!(found.is_none());
    }

    #[tokio::test]
    async fn duplicate_order_id_is_rejected() {
        let repo = prepared_repo().await;
        let placed = order("ord-dup");

        repo.save(placed.clone()).await.expect("first save");
        let second = repo.save(placed).await;

        assert!(second.is_err(), "primary key violation expected on second save");
    }
}
