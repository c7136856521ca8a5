use std::{borrow::Cow, error::Error, fmt, io};

/// 底层原因的装箱类型，约束与 `CodecError` 一致需满足跨线程传播。
pub type ErrorCause = Box<dyn Error + Send + Sync + 'static>;

/// `CodecError` 是编解码引擎的统一错误载体。
///
/// # 教案式说明
/// - **意图 (Why)**：让 Sink/Source、原语编解码器、组合解析器共享同一套错误语义，
///   调用方只需根据 [`CodecError::kind`] 或稳定错误码决定“修参数 / 丢弃流 / 修 Schema”。
/// - **契约 (What)**：
///   - `code` 遵循 `<领域>.<语义>` 命名，取值见 [`codes`]；
///   - `message` 面向排障人员，可为静态或运行时拼接文本；
///   - `cause` 可选，通过 [`Error::source`] 暴露底层错误链（例如 `std::io::Error`）。
/// - **执行逻辑 (How)**：[`ErrorKind`] 不单独存储，而是由错误码前缀推导，确保码值与分类永不漂移。
/// - **设计权衡 (Trade-offs)**：使用 `Cow<'static, str>` 保存消息，静态文本零分配，动态上下文
///   需要一次堆分配；错误路径属于冷路径，可以接受。
#[derive(Debug)]
pub struct CodecError {
    code: &'static str,
    message: Cow<'static, str>,
    cause: Option<ErrorCause>,
}

impl CodecError {
    /// 使用稳定错误码与描述创建错误。
    pub fn new(code: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    /// 参数越界等调用契约违例，对应 [`ErrorKind::Range`]。
    pub fn range(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(codes::BUFFER_OUT_OF_RANGE, message)
    }

    /// 附带底层原因并返回新的错误。
    pub fn with_cause(mut self, cause: impl Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// 获取稳定错误码。
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// 获取描述。
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 获取底层原因。
    pub fn cause(&self) -> Option<&ErrorCause> {
        self.cause.as_ref()
    }

    /// 根据错误码命名空间推导分类。
    ///
    /// 未登记的命名空间归入 [`ErrorKind::Format`]：调用方自定义解码器产出的未知错误码
    /// 一律视为当前解码尝试终止，而不是被误当作可重试条件。
    pub fn kind(&self) -> ErrorKind {
        match self.code.split_once('.').map(|(domain, _)| domain) {
            Some("buffer") => ErrorKind::Range,
            Some("config") => ErrorKind::Configuration,
            Some("io") => ErrorKind::Io,
            _ => ErrorKind::Format,
        }
    }

    /// 是否为载荷格式错误。
    pub fn is_format(&self) -> bool {
        self.kind() == ErrorKind::Format
    }

    /// 是否为构建期配置错误。
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for CodecError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
            .as_ref()
            .map(|boxed| boxed.as_ref() as &(dyn Error + 'static))
    }
}

impl From<io::Error> for CodecError {
    fn from(err: io::Error) -> Self {
        let code = if err.kind() == io::ErrorKind::UnexpectedEof {
            codes::IO_UNEXPECTED_EOF
        } else {
            codes::IO_FAILURE
        };
        CodecError::new(code, format!("byte stream failure: {err}")).with_cause(err)
    }
}

/// 错误分类。
///
/// - `Range`：Sink/Source 参数违例，属于调用方编程错误，不应恢复；
/// - `Format`：载荷损坏或恶意输入，终止本次解码尝试；
/// - `Configuration`：组合图非法，在任何编解码发生前抛出；
/// - `Io`：流/文件适配器失败，或一次性解码遇到输入提前结束。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    Range,
    Format,
    Configuration,
    Io,
}

/// 稳定错误码。
///
/// 命名沿用 `<领域>.<语义>`，领域前缀决定 [`ErrorKind`]。
pub mod codes {
    /// 写入/读取区间越界或与缓冲长度不符。
    pub const BUFFER_OUT_OF_RANGE: &str = "buffer.out_of_range";

    /// 底层流或文件读写失败。
    pub const IO_FAILURE: &str = "io.failure";
    /// 一次性解码时输入在值结束前耗尽。
    pub const IO_UNEXPECTED_EOF: &str = "io.unexpected_eof";

    /// 以结束标记分隔的载荷超过上限仍未终止。
    pub const FORMAT_UNTERMINATED: &str = "format.unterminated";
    /// 长度前缀为负或超过上限。
    pub const FORMAT_INVALID_LENGTH: &str = "format.invalid_length";
    /// 变体序号不在已登记表内。
    pub const FORMAT_INVALID_DISCRIMINANT: &str = "format.invalid_discriminant";
    /// 字节序列不符合字符集编码规则。
    pub const FORMAT_CHARSET: &str = "format.charset";
    /// 待编码载荷内部出现结束标记。
    pub const FORMAT_EMBEDDED_TERMINATOR: &str = "format.embedded_terminator";
    /// 自引用嵌套层级超过上限。
    pub const FORMAT_DEPTH_EXCEEDED: &str = "format.depth_exceeded";

    /// 引用了未声明的共享解码器。
    pub const CONFIG_DANGLING_KEY: &str = "config.dangling_key";
    /// 同一标签被重复注册。
    pub const CONFIG_DUPLICATE_KEY: &str = "config.duplicate_key";
    /// 零宽度原语声明。
    pub const CONFIG_ZERO_WIDTH: &str = "config.zero_width";
    /// 组合步骤的结构不合法（如可空嵌套可空）。
    pub const CONFIG_INVALID_STEP: &str = "config.invalid_step";
    /// 编解码设置不合法。
    pub const CONFIG_INVALID_SETTINGS: &str = "config.invalid_settings";
    /// 终结映射函数读取字段的方式与声明不符。
    pub const CONFIG_FIELD_MISMATCH: &str = "config.field_mismatch";
}
