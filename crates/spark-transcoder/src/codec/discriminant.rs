//! 以 32 位序号表示的枚举变体编解码。

use std::sync::Arc;

use tracing::debug;

use super::{DecodeOutcome, DecodeResult, Decoder, Encoder};
use crate::{
    CodecError, Result,
    buffer::{ByteSink, ByteSource},
    error::codes,
    primitive::{ByteOrder, FixedWidthDecoder, FixedWidthEncoder},
};

/// 按序号查表还原变体；序号越界即为 `format.invalid_discriminant`。
#[derive(Debug)]
pub struct DiscriminantDecoder<T> {
    ordinal: FixedWidthDecoder<i32>,
    variants: Arc<[T]>,
}

impl<T> DiscriminantDecoder<T> {
    pub fn new(order: ByteOrder, variants: impl Into<Arc<[T]>>) -> Self {
        Self {
            ordinal: FixedWidthDecoder::new(order),
            variants: variants.into(),
        }
    }
}

impl<T> Decoder for DiscriminantDecoder<T>
where
    T: Clone + Send + Sync,
{
    type Item = T;

    fn decode(&mut self, src: &mut dyn ByteSource) -> DecodeResult<T> {
        let DecodeOutcome::Done { value, consumed } = self.ordinal.decode(src)? else {
            return Ok(DecodeOutcome::Incomplete);
        };
        let variant = usize::try_from(value)
            .ok()
            .and_then(|index| self.variants.get(index));
        match variant {
            Some(variant) => Ok(DecodeOutcome::done(variant.clone(), consumed)),
            None => {
                debug!(ordinal = value, variants = self.variants.len(), "unknown discriminant");
                Err(CodecError::new(
                    codes::FORMAT_INVALID_DISCRIMINANT,
                    format!(
                        "ordinal {value} is outside the {} registered variants",
                        self.variants.len()
                    ),
                ))
            }
        }
    }

    fn reset(&mut self) {
        self.ordinal.reset();
    }
}

/// 写出变体在表中的序号；未登记的变体无法编码。
#[derive(Debug)]
pub struct DiscriminantEncoder<T> {
    ordinal: FixedWidthEncoder<i32>,
    variants: Arc<[T]>,
}

impl<T> DiscriminantEncoder<T> {
    pub fn new(order: ByteOrder, variants: impl Into<Arc<[T]>>) -> Self {
        Self {
            ordinal: FixedWidthEncoder::new(order),
            variants: variants.into(),
        }
    }
}

impl<T> Encoder<T> for DiscriminantEncoder<T>
where
    T: PartialEq + Send + Sync,
{
    fn encode(&self, value: &T, sink: &mut dyn ByteSink) -> Result<()> {
        let index = self
            .variants
            .iter()
            .position(|variant| variant == value)
            .and_then(|index| i32::try_from(index).ok())
            .ok_or_else(|| {
                CodecError::new(
                    codes::FORMAT_INVALID_DISCRIMINANT,
                    "value is not one of the registered variants",
                )
            })?;
        self.ordinal.encode(&index, sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DecoderExt, EncoderExt};

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Codec {
        Pcmu,
        Pcma,
        Opus,
    }

    const VARIANTS: [Codec; 3] = [Codec::Pcmu, Codec::Pcma, Codec::Opus];

    #[test]
    fn ordinal_maps_to_variant_table() {
        let encoder = DiscriminantEncoder::new(ByteOrder::LittleEndian, VARIANTS);
        let bytes = encoder.encode_to_vec(&Codec::Opus).expect("编码变体");
        assert_eq!(bytes, [2, 0, 0, 0]);

        let mut decoder = DiscriminantDecoder::new(ByteOrder::LittleEndian, VARIANTS);
        assert_eq!(decoder.decode_slice(&bytes).expect("解码变体"), Codec::Opus);
    }

    #[test]
    fn unknown_ordinal_is_format_error() {
        let mut decoder = DiscriminantDecoder::new(ByteOrder::BigEndian, VARIANTS);
        let err = decoder
            .decode_slice(&[0, 0, 0, 3])
            .expect_err("序号 3 未登记");
        assert_eq!(err.code(), codes::FORMAT_INVALID_DISCRIMINANT);
        assert!(err.is_format());
    }
}
