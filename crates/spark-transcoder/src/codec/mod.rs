//! 编码器与可恢复解码器的核心契约。
//!
//! # 模块定位（Why）
//! - [`Encoder`] 是无状态的写函数，可跨线程共享；
//! - [`Decoder`] 是有状态的增量状态机，一条逻辑流一个实例；
//! - 二者都通过扩展 trait（[`EncoderExt`] / [`DecoderExt`]）获得组合子与便捷入口，
//!   核心 trait 本身保持对象安全。
//!
//! # 结构（How）
//! - `decoder` / `encoder`：契约与扩展 trait；
//! - `decode_adapters` / `encode_adapters`：组合子的具体类型；
//! - `discriminant`：枚举变体的序号编解码。

mod decode_adapters;
mod decoder;
mod discriminant;
mod encode_adapters;
mod encoder;

pub use decode_adapters::{
    AndThen, ExactRepeat, Map, Optional, Pair, PrefixedRepeat, TryMap, UntilRepeat,
};
pub use decoder::{BoxDecoder, DecodeOutcome, DecodeResult, Decoder, DecoderExt, DecoderFactory};
pub use discriminant::{DiscriminantDecoder, DiscriminantEncoder};
pub use encode_adapters::{
    MapInput, OptionalEncoder, PairEncoder, PrefixedRepeatEncoder, TerminatedRepeatEncoder,
};
pub use encoder::{BoxEncoder, EncodeFn, Encoder, EncoderExt, from_fn};
