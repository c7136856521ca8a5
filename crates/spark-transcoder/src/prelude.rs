//! 常用类型与扩展 trait 的一站式导入。
//!
//! ```
//! use spark_transcoder::prelude::*;
//!
//! let ints = Transcoder::<i32>::fixed_width(ByteOrder::LittleEndian);
//! assert_eq!(ints.encode_to_vec(&1).expect("编码"), [1, 0, 0, 0]);
//! ```

pub use crate::{
    ByteOrder, ByteSink, ByteSource, Charset, CodecError, CodecSettings, ComposedEncoder,
    CompositionStep, DecodeOutcome, Decoder, DecoderComposer, DecoderExt, DecoderFactory, Encoder,
    EncoderExt, Fields, Result, StringSettings, Transcoder,
};
