#![deny(unsafe_code)]

//! # spark-transcoder
//!
//! ## 定位与职责（Why）
//! - 提供与传输介质无关的二进制编解码引擎：值经 [`Encoder`] 写入 [`ByteSink`]，
//!   字节经 [`ByteSource`] 喂给可恢复的 [`Decoder`] 还原为值；
//! - 解码器以返回值表达挂起（`Incomplete`），调用方（通常是读 socket 的事件循环）
//!   决定何时带着更多字节再次调用，核心本身从不阻塞、也不产生并发任务。
//!
//! ## 架构嵌入（Where）
//! - `buffer`：Sink/Source 契约与内存、流、作用域文件适配器；
//! - `codec`：编解码契约、组合子与枚举序号编解码；
//! - `primitive`：定宽数值、布尔、定长字节块、字符串；
//! - `compose`：按声明步骤构建组合解码器（支持自引用与共享子结构）及对称的组合编码器；
//! - `transcoder`：把一对编码器与解码器工厂收拢为单一句柄；
//! - `configuration` / `error`：共享设置与稳定错误码。
//!
//! ## 契约说明（What）
//! - 线格式就是各字段编码按声明顺序的拼接，字节序与字符串分帧在构建期固定，
//!   编码端与解码端必须使用同一份 [`CodecSettings`]；
//! - 错误分为 `buffer.*`（调用约定违例）、`format.*`（载荷非法）、`config.*`（构建期配置错误）
//!   与 `io.*`（底层介质失败），见 [`error::codes`]；
//! - 唯一值得重试的情形是 `Incomplete`：补充字节后用同一实例再次调用。
//!
//! ## 风险提示（Trade-offs）
//! - 单个解码器实例持有可变游标，不可并发驱动；并发解码请为每条逻辑流创建独立实例；
//! - 组合解码器的字段经类型擦除传递，映射函数取值类型与声明不符时以
//!   `config.field_mismatch` 失败，而非编译期报错。

pub mod buffer;
pub mod codec;
pub mod compose;
pub mod configuration;
pub mod error;
pub mod prelude;
pub mod primitive;
mod transcoder;

pub use buffer::{ByteSink, ByteSource, ChunkedSource};
pub use codec::{
    BoxDecoder, BoxEncoder, DecodeOutcome, DecodeResult, Decoder, DecoderExt, DecoderFactory,
    Encoder, EncoderExt,
};
pub use compose::{
    ComposeError, ComposedDecoder, ComposedDecoderFactory, ComposedEncoder, CompositionStep,
    DecoderComposer, DecoderKey, EncodingScope, Fields, PrimitiveKind,
};
pub use configuration::{CodecSettings, StringFraming, StringSettings};
pub use error::{CodecError, ErrorKind};
pub use primitive::{ByteOrder, Charset};
pub use transcoder::Transcoder;

/// 本 crate 统一的结果类型。
pub type Result<T, E = CodecError> = core::result::Result<T, E>;
