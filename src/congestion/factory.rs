//! 拥塞控制算法工厂与注册表
//! Congestion control algorithm factories and the algorithm registry.
//!
//! A connection is configured with an algorithm *tag*; the registry turns the
//! tag into a fresh algorithm instance without the connection knowing the
//! concrete type.

use super::{rate::RateControl, vegas::Vegas, CongestionControl};
use crate::{
    config::CongestionControlConfig,
    error::{Error, Result},
};
use std::{collections::HashMap, fmt, marker::PhantomData};
use tracing::debug;

/// Algorithms that can be built from the congestion control configuration.
///
/// 可以从拥塞控制配置构建的算法。
pub trait FromConfig: Sized {
    /// The tag the algorithm is registered under.
    /// 算法注册时使用的标签。
    const NAME: &'static str;

    /// Creates a new instance with its own copy of `config`.
    /// 使用 `config` 的副本创建新实例。
    fn from_config(config: &CongestionControlConfig) -> Self;
}

/// A factory producing algorithm instances of one type.
///
/// 生产某一类型算法实例的工厂。
pub trait CongestionFactory: Send + Sync {
    /// The tag of the algorithm this factory creates.
    /// 此工厂创建的算法标签。
    fn name(&self) -> &'static str;

    /// Creates a new, unbound algorithm instance.
    /// 创建一个新的、未绑定的算法实例。
    fn create(&self) -> Box<dyn CongestionControl>;

    /// Creates a new factory of the same type.
    /// 创建一个同类型的新工厂。
    fn clone_factory(&self) -> Box<dyn CongestionFactory>;
}

/// The generic factory for any algorithm implementing [`FromConfig`].
///
/// 适用于任何实现 [`FromConfig`] 的算法的通用工厂。
pub struct AlgorithmFactory<T> {
    config: CongestionControlConfig,
    _marker: PhantomData<fn() -> T>,
}

impl<T> AlgorithmFactory<T> {
    pub fn new(config: CongestionControlConfig) -> Self {
        Self {
            config,
            _marker: PhantomData,
        }
    }
}

impl<T: FromConfig> fmt::Debug for AlgorithmFactory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlgorithmFactory")
            .field("algorithm", &T::NAME)
            .finish()
    }
}

impl<T> CongestionFactory for AlgorithmFactory<T>
where
    T: CongestionControl + FromConfig,
{
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn create(&self) -> Box<dyn CongestionControl> {
        Box::new(T::from_config(&self.config))
    }

    fn clone_factory(&self) -> Box<dyn CongestionFactory> {
        Box::new(Self::new(self.config.clone()))
    }
}

/// A lookup table from algorithm tag to factory.
///
/// 从算法标签到工厂的查找表。
pub struct AlgorithmRegistry {
    factories: HashMap<String, Box<dyn CongestionFactory>>,
}

impl AlgorithmRegistry {
    /// Creates an empty registry.
    /// 创建一个空注册表。
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Creates a registry holding the built-in algorithms, each configured
    /// with a copy of `config`.
    ///
    /// 创建包含内置算法的注册表，每个算法都使用 `config` 的副本进行配置。
    pub fn with_defaults(config: &CongestionControlConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(AlgorithmFactory::<RateControl>::new(config.clone())));
        registry.register(Box::new(AlgorithmFactory::<Vegas>::new(config.clone())));
        registry
    }

    /// Registers `factory` under its own name, returning the factory it replaced.
    ///
    /// 以工厂自身的名称注册 `factory`，返回被替换的工厂。
    pub fn register(
        &mut self,
        factory: Box<dyn CongestionFactory>,
    ) -> Option<Box<dyn CongestionFactory>> {
        let tag = factory.name().to_string();
        self.register_as(tag, factory)
    }

    /// Registers `factory` under an explicit tag.
    ///
    /// 以指定标签注册 `factory`。
    pub fn register_as(
        &mut self,
        tag: impl Into<String>,
        factory: Box<dyn CongestionFactory>,
    ) -> Option<Box<dyn CongestionFactory>> {
        let tag = tag.into();
        debug!(tag = %tag, algorithm = factory.name(), "Congestion control algorithm registered");
        self.factories.insert(tag, factory)
    }

    /// Creates a new instance of the algorithm registered under `tag`.
    ///
    /// 创建以 `tag` 注册的算法的新实例。
    pub fn create(&self, tag: &str) -> Result<Box<dyn CongestionControl>> {
        self.factories
            .get(tag)
            .map(|factory| factory.create())
            .ok_or_else(|| Error::UnknownAlgorithm(tag.to_string()))
    }

    /// Returns a copy of the factory registered under `tag`.
    ///
    /// 返回以 `tag` 注册的工厂的副本。
    pub fn factory(&self, tag: &str) -> Result<Box<dyn CongestionFactory>> {
        self.factories
            .get(tag)
            .map(|factory| factory.clone_factory())
            .ok_or_else(|| Error::UnknownAlgorithm(tag.to_string()))
    }

    /// Whether an algorithm is registered under `tag`.
    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    /// The registered tags, in no particular order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl Default for AlgorithmRegistry {
    fn default() -> Self {
        Self::with_defaults(&CongestionControlConfig::default())
    }
}

impl Clone for AlgorithmRegistry {
    fn clone(&self) -> Self {
        Self {
            factories: self
                .factories
                .iter()
                .map(|(tag, factory)| (tag.clone(), factory.clone_factory()))
                .collect(),
        }
    }
}

impl fmt::Debug for AlgorithmRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.tags().collect();
        tags.sort_unstable();
        f.debug_struct("AlgorithmRegistry").field("tags", &tags).finish()
    }
}
