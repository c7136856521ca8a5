use std::borrow::Cow;

use thiserror::Error;

use crate::{CodecError, error::codes};

/// 组合图构建期错误。
///
/// # 教案式说明
/// - **意图 (Why)**：非法的组合声明必须在第一次解码之前暴露，而不是在运行期产出错乱数据；
///   细粒度枚举便于测试与调用方精确匹配失败原因。
/// - **契约 (What)**：
///   - 所有变体都通过 [`From<ComposeError>`](From) 转换为 `config.*` 错误码的 [`CodecError`]，
///     构建入口可直接 `?` 传播；
///   - 原始枚举保留在错误链的 `cause` 中，可用 `downcast_ref` 取回。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ComposeError {
    /// 共享步骤引用了从未登记的标签。
    #[error("composition references `{label}` which is neither registered nor a self reference")]
    DanglingKey { label: Cow<'static, str> },

    /// 同一标签被登记了两次。
    #[error("shared decoder `{label}` is registered more than once")]
    DuplicateKey { label: Cow<'static, str> },

    /// 步骤的结构本身不合法，例如可空套可空或存在标记不是布尔值。
    #[error("invalid composition step: {reason}")]
    InvalidStep { reason: &'static str },

    /// 构建结束时仍有节点停留在“构建中”占位。
    #[error("composition node {index} was reserved but never finalized")]
    Unfinished { index: usize },
}

impl From<ComposeError> for CodecError {
    fn from(error: ComposeError) -> Self {
        let code = match &error {
            ComposeError::DanglingKey { .. } => codes::CONFIG_DANGLING_KEY,
            ComposeError::DuplicateKey { .. } => codes::CONFIG_DUPLICATE_KEY,
            ComposeError::InvalidStep { .. } | ComposeError::Unfinished { .. } => {
                codes::CONFIG_INVALID_STEP
            }
        };
        CodecError::new(code, error.to_string()).with_cause(error)
    }
}
