//! Pool operator

use crate::domain::model::Pool;
use crate::domain::ports::{PoolOperator, RestApiOperatorRef};
use crate::error::Result;
use async_trait::async_trait;

/// Pools through the management API
pub struct RestPoolOperator {
    rest: RestApiOperatorRef,
}

impl RestPoolOperator {
    pub fn new(rest: RestApiOperatorRef) -> Self {
        Self { rest }
    }
}

#[async_trait]
impl PoolOperator for RestPoolOperator {
    async fn pool_create(&self, pool: &Pool) -> Result<String> {
        self.rest.create_pool(pool).await
    }

    async fn pool_list(&self) -> Result<Vec<Pool>> {
        self.rest.get_pools().await
    }
}
