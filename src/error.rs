//! 定义了库中所有可能的错误类型。
//! Defines all possible error types in the library.

use crate::epoll::EpollId;
use thiserror::Error;

/// The primary error type for the flow-control and readiness core.
/// 流量控制与就绪核心的主要错误类型。
#[derive(Debug, Error)]
pub enum Error {
    /// An underlying I/O error occurred.
    /// 发生了底层的I/O错误。
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The referenced readiness descriptor does not exist or has been released.
    /// 引用的就绪描述符不存在或已被释放。
    #[error("invalid epoll descriptor: {0}")]
    InvalidDescriptor(EpollId),

    /// A wait reached its deadline without any watched entity becoming ready.
    /// 等待到达截止时间，但没有任何被监视的实体就绪。
    #[error("wait timed out")]
    Timeout,

    /// The native polling primitive could not be set up.
    ///
    /// 无法建立本地轮询原语。
    #[error("system resource unavailable: {0}")]
    SystemResource(std::io::Error),

    /// No further descriptor identifiers can be allocated.
    /// 无法再分配更多的描述符标识符。
    #[error("no epoll descriptor identifier available")]
    ResourceExhausted,

    /// No congestion control algorithm is registered under the requested tag.
    /// 请求的标签下没有注册任何拥塞控制算法。
    #[error("unknown congestion control algorithm: {0}")]
    UnknownAlgorithm(String),
}

/// A specialized `Result` type for this library.
/// 本库专用的 `Result` 类型。
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        use std::io::ErrorKind;
        match err {
            Error::Io(e) => e,
            Error::SystemResource(e) => e,
            Error::InvalidDescriptor(id) => {
                std::io::Error::new(ErrorKind::NotFound, format!("epoll descriptor {id}"))
            }
            Error::Timeout => ErrorKind::TimedOut.into(),
            Error::ResourceExhausted => ErrorKind::OutOfMemory.into(),
            Error::UnknownAlgorithm(name) => std::io::Error::new(ErrorKind::InvalidInput, name),
        }
    }
}
