//! 라이브 거래소 어댑터 레지스트리.
//!
//! 실행 시점에 거래소 식별자별로 어댑터 생성 함수를 등록합니다.

use std::collections::HashMap;
use std::sync::Arc;
use trader_core::{ExchangeConfig, ExchangeId};

use crate::traits::{ExchangeAdapter, ExchangeResult};
use crate::ExchangeError;

/// 어댑터 생성 함수. 거래소 설정이 없으면 `None`이 전달됩니다.
pub type AdapterFactory = Arc<
    dyn Fn(&ExchangeId, Option<&ExchangeConfig>) -> ExchangeResult<Arc<dyn ExchangeAdapter>>
        + Send
        + Sync,
>;

/// 거래소 식별자 → 어댑터 생성 함수.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    factories: HashMap<ExchangeId, AdapterFactory>,
}

impl AdapterRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 어댑터 생성 함수를 등록합니다. 같은 식별자는 덮어씁니다.
    pub fn register<F>(&mut self, id: impl Into<ExchangeId>, factory: F) -> &mut Self
    where
        F: Fn(&ExchangeId, Option<&ExchangeConfig>) -> ExchangeResult<Arc<dyn ExchangeAdapter>>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(id.into(), Arc::new(factory));
        self
    }

    /// 등록 여부를 확인합니다.
    pub fn contains(&self, id: &ExchangeId) -> bool {
        self.factories.contains_key(id)
    }

    /// 등록된 거래소 식별자.
    pub fn identities(&self) -> impl Iterator<Item = &ExchangeId> {
        self.factories.keys()
    }

    /// 어댑터를 생성합니다.
    pub fn create(
        &self,
        id: &ExchangeId,
        config: Option<&ExchangeConfig>,
    ) -> ExchangeResult<Arc<dyn ExchangeAdapter>> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| ExchangeError::UnknownExchange(id.to_string()))?;
        factory(id, config)
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("identities", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
