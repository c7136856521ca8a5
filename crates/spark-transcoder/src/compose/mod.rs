//! 组合解析：把声明的步骤序列编织为单个可恢复解码器，并提供对称的组合编码器。
//!
//! # 模块定位（Why）
//! - 复合类型的线格式就是各字段编码按声明顺序的拼接，无额外头部或魔数；
//! - 自引用或共享的子结构通过按 [`DecoderKey`] 去重的解析缓存实现，
//!   构建期以节点索引表示“尚未完成”的引用，解码期才解引用。
//!
//! # 结构（How）
//! - `step` / `key`：声明步骤与缓存键；
//! - `resolver`：单次构建内的占位回填解析；
//! - `decoder` / `fields`：以帧栈驱动的组合解码器及其字段访问器；
//! - `encoder`：与解码端对称的组合编码器；
//! - `builder`：面向调用方的链式声明入口。

mod builder;
mod decoder;
mod encoder;
mod erased;
mod error;
mod fields;
mod key;
mod resolver;
mod step;

pub use builder::DecoderComposer;
pub use decoder::{ComposedDecoder, ComposedDecoderFactory};
pub use encoder::{ComposedEncoder, EncodingScope};
pub use error::ComposeError;
pub use fields::Fields;
pub use key::{DecoderKey, PrimitiveKind};
pub use step::{CompositionStep, NestedStep};

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::*;
    use crate::{
        CodecSettings, DecodeOutcome, Decoder, DecoderExt, EncoderExt, error::codes,
        primitive::FixedWidthDecoder,
    };

    #[derive(Debug, PartialEq)]
    struct Pair {
        left: i16,
        right: Option<String>,
    }

    fn pair_codec() -> (ComposedEncoder<Pair>, ComposedDecoderFactory<Pair>) {
        let settings = CodecSettings::default();
        let encoder = ComposedEncoder::new(&settings, |pair: &Pair, scope| {
            scope
                .short(pair.left)?
                .nullable(pair.right.as_deref(), |scope, text| {
                    scope.string(text).map(drop)
                })?;
            Ok(())
        })
        .expect("编码器设置合法");
        let decoder = DecoderComposer::new(settings)
            .short()
            .nullable(CompositionStep::Primitive(PrimitiveKind::String))
            .build(|fields| {
                Ok(Pair {
                    left: fields.next()?,
                    right: fields.next_optional()?,
                })
            })
            .expect("组合声明合法");
        (encoder, decoder)
    }

    #[traced_test]
    #[test]
    fn build_logs_schema_summary() {
        let (_, factory) = pair_codec();
        assert_eq!(factory.decoder().depth(), 0);
        assert!(logs_contain("composition schema resolved"));
    }

    #[test]
    fn nullable_field_round_trips_both_ways() {
        let (encoder, factory) = pair_codec();
        for pair in [
            Pair {
                left: -3,
                right: Some("spark".into()),
            },
            Pair {
                left: 9,
                right: None,
            },
        ] {
            let bytes = encoder.encode_to_vec(&pair).expect("编码");
            let decoded = factory.decoder().decode_slice(&bytes).expect("解码");
            assert_eq!(decoded, pair);
        }
    }

    #[test]
    fn absent_value_consumes_only_the_presence_flag() {
        let (_, factory) = pair_codec();
        let mut decoder = factory.decoder();
        let mut src: &[u8] = &[0x00, 0x05, 0x00, 0xaa];
        let outcome = decoder.decode(&mut src).expect("解码");
        assert_eq!(
            outcome,
            DecodeOutcome::done(
                Pair {
                    left: 5,
                    right: None
                },
                3
            )
        );
        assert_eq!(src, &[0xaa]);
    }

    #[traced_test]
    #[test]
    fn failures_are_logged_and_reset_state() {
        let (_, factory) = pair_codec();
        let mut decoder = factory.decoder();
        // 负长度前缀
        let mut src: &[u8] = &[0x00, 0x01, 0x01, 0xff, 0xff, 0xff, 0xff];
        let err = decoder.decode(&mut src).expect_err("负长度");
        assert_eq!(err.code(), codes::FORMAT_INVALID_LENGTH);
        assert_eq!(decoder.depth(), 0);
        assert!(logs_contain("composed decode failed"));
    }

    #[test]
    fn duplicate_registration_fails_at_build() {
        let err = DecoderComposer::<u8>::new(CodecSettings::default())
            .register("octet", || FixedWidthDecoder::<u8>::default())
            .register("octet", || FixedWidthDecoder::<u8>::default())
            .shared("octet")
            .build(|fields| fields.next())
            .expect_err("重复登记");
        assert_eq!(err.code(), codes::CONFIG_DUPLICATE_KEY);
    }
}
