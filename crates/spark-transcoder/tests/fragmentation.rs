//! 分片不变性：同一段编码结果无论整块送达还是被切成任意非空分片，解码结果一致。
//!
//! 每次调用只交给解码器当前分片；`Incomplete` 时分片必须被完全吸收，
//! 否则调用方无从得知哪些字节仍需重放。

use proptest::prelude::*;
use spark_transcoder::{
    ByteOrder, Charset, CodecSettings, ComposedEncoder, CompositionStep, DecodeOutcome, Decoder,
    DecoderComposer, PrimitiveKind, StringSettings, Transcoder, error::codes,
    primitive::FixedWidthDecoder,
};

/// 依次送入分片，返回首个 `Done` 的值与累计消费字节数。
fn decode_in_pieces<D: Decoder>(decoder: &mut D, pieces: &[&[u8]]) -> Option<(D::Item, usize)> {
    for &piece in pieces {
        let mut src: &[u8] = piece;
        match decoder.decode(&mut src).expect("合法编码不应解码失败") {
            DecodeOutcome::Done { value, consumed } => return Some((value, consumed)),
            DecodeOutcome::Incomplete => assert!(src.is_empty(), "Incomplete 必须吸收全部可读字节"),
        }
    }
    None
}

/// 按排序去重后的切点把 `bytes` 切成非空分片。
fn split<'a>(bytes: &'a [u8], cuts: &[usize]) -> Vec<&'a [u8]> {
    let mut points: Vec<usize> = cuts
        .iter()
        .map(|cut| cut % bytes.len().max(1))
        .filter(|cut| *cut > 0)
        .collect();
    points.sort_unstable();
    points.dedup();
    let mut pieces = Vec::with_capacity(points.len() + 1);
    let mut start = 0;
    for point in points {
        pieces.push(&bytes[start..point]);
        start = point;
    }
    pieces.push(&bytes[start..]);
    pieces
}

#[derive(Debug, PartialEq)]
struct Message {
    sequence: u32,
    topic: String,
    payload: Option<String>,
    checksum: i64,
}

fn message_transcoder(settings: CodecSettings) -> Transcoder<Message> {
    let encoder = ComposedEncoder::new(&settings, |message: &Message, scope| {
        scope
            .int(message.sequence as i32)?
            .string(&message.topic)?
            .nullable(message.payload.as_deref(), |scope, payload| {
                scope.string(payload).map(drop)
            })?
            .long(message.checksum)?;
        Ok(())
    })
    .expect("编码器设置合法");
    let decoder = DecoderComposer::new(settings)
        .int()
        .string()
        .nullable(CompositionStep::Primitive(PrimitiveKind::String))
        .long()
        .build(|fields| {
            Ok(Message {
                sequence: fields.next::<i32>()? as u32,
                topic: fields.next()?,
                payload: fields.next_optional()?,
                checksum: fields.next()?,
            })
        })
        .expect("组合声明合法");
    Transcoder::composed(encoder, decoder)
}

proptest! {
    #[test]
    fn any_split_yields_the_same_message(
        sequence in any::<u32>(),
        topic in "\\PC{0,16}",
        payload in proptest::option::of("\\PC{0,40}"),
        checksum in any::<i64>(),
        terminated in any::<bool>(),
        cuts in proptest::collection::vec(any::<usize>(), 0..12),
    ) {
        let string = if terminated {
            StringSettings::terminated(Charset::Utf8)
        } else {
            StringSettings::length_prefixed(Charset::Utf8)
        };
        let transcoder = message_transcoder(CodecSettings::new().with_string(string));
        let message = Message { sequence, topic, payload, checksum };
        let bytes = transcoder.encode_to_vec(&message).expect("编码");

        let whole = decode_in_pieces(&mut transcoder.decoder(), &[&bytes]).expect("整块解码");
        let pieces = split(&bytes, &cuts);
        let fragmented = decode_in_pieces(&mut transcoder.decoder(), &pieces).expect("分片解码");
        prop_assert_eq!(&whole, &fragmented);
        prop_assert_eq!(whole.0, message);
        prop_assert_eq!(whole.1, bytes.len());
    }

    #[test]
    fn one_byte_at_a_time_is_equivalent(value in any::<f64>().prop_filter("NaN 不可比较", |v| !v.is_nan())) {
        let transcoder = Transcoder::<f64>::fixed_width(ByteOrder::LittleEndian);
        let bytes = transcoder.encode_to_vec(&value).expect("编码");
        let pieces: Vec<&[u8]> = bytes.chunks(1).collect();
        let (decoded, consumed) =
            decode_in_pieces(&mut transcoder.decoder(), &pieces).expect("逐字节解码");
        prop_assert_eq!(decoded, value);
        prop_assert_eq!(consumed, 8);
    }
}

#[test]
fn three_bytes_are_incomplete_and_the_fourth_completes() {
    let mut decoder = FixedWidthDecoder::<i32>::new(ByteOrder::BigEndian);
    let mut first: &[u8] = &[0x01, 0x02, 0x03];
    assert_eq!(decoder.decode(&mut first).expect("前三字节"), DecodeOutcome::Incomplete);
    assert!(first.is_empty());

    let mut second: &[u8] = &[0x04, 0xee];
    assert_eq!(
        decoder.decode(&mut second).expect("第四字节"),
        DecodeOutcome::done(0x0102_0304, 4)
    );
    assert_eq!(second, &[0xee], "已消费的字节不会被重复请求，多余字节原样保留");
}

#[test]
fn unterminated_string_fails_once_it_passes_the_limit() {
    let settings = StringSettings::terminated(Charset::Latin1).with_max_length(10);
    let transcoder = Transcoder::string_with(ByteOrder::BigEndian, &settings).expect("设置合法");
    let mut decoder = transcoder.decoder();
    let mut outcome = None;
    for byte in [b'a'; 11] {
        let mut src: &[u8] = &[byte];
        match decoder.decode(&mut src) {
            Ok(DecodeOutcome::Incomplete) => continue,
            other => {
                outcome = Some(other);
                break;
            }
        }
    }
    let err = outcome
        .expect("第 11 个非零字节必须终止解码")
        .expect_err("超过上限必须失败");
    assert_eq!(err.code(), codes::FORMAT_UNTERMINATED);
    assert!(err.is_format());
}
