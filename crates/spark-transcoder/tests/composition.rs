//! 组合解析的端到端行为：自引用、共享子结构、构建期配置错误与深度上限。

use spark_transcoder::{
    ByteOrder, CodecSettings, ComposeError, ComposedDecoderFactory, ComposedEncoder,
    CompositionStep, DecodeOutcome, Decoder, DecoderComposer, DecoderExt, EncoderExt,
    PrimitiveKind, Transcoder, codec::DiscriminantDecoder, error::codes,
    primitive::{FixedWidthDecoder, FixedWidthEncoder},
};

#[derive(Clone, Debug, PartialEq)]
struct Node {
    value: i32,
    label: String,
    next: Option<Box<Node>>,
}

fn chain(values: &[i32]) -> Option<Box<Node>> {
    values.iter().rev().fold(None, |next, value| {
        Some(Box::new(Node {
            value: *value,
            label: format!("node-{value}"),
            next,
        }))
    })
}

fn node_encoder(settings: &CodecSettings) -> ComposedEncoder<Node> {
    ComposedEncoder::new(settings, |node: &Node, scope| {
        scope
            .int(node.value)?
            .string(&node.label)?
            .self_or_null(node.next.as_deref())?;
        Ok(())
    })
    .expect("编码器设置合法")
}

fn node_decoder(settings: CodecSettings) -> ComposedDecoderFactory<Node> {
    DecoderComposer::new(settings)
        .int()
        .string()
        .self_or_null()
        .build(|fields| {
            Ok(Node {
                value: fields.next()?,
                label: fields.next()?,
                next: fields.next_optional::<Node>()?.map(Box::new),
            })
        })
        .expect("自引用组合必须能够构建")
}

#[test]
fn three_node_chain_round_trips() {
    let settings = CodecSettings::default();
    let transcoder = Transcoder::composed(node_encoder(&settings), node_decoder(settings));
    let head = *chain(&[1, 2, 3]).expect("非空链表");

    let bytes = transcoder.encode_to_vec(&head).expect("编码");
    let decoded = transcoder.decode_slice(&bytes).expect("解码");
    assert_eq!(decoded, head);
    assert_eq!(
        decoded.next.as_ref().and_then(|n| n.next.as_ref()).map(|n| n.value),
        Some(3)
    );
}

#[test]
fn chain_resumes_at_the_same_field_across_calls() {
    let settings = CodecSettings::default();
    let bytes = node_encoder(&settings)
        .encode_to_vec(&*chain(&[7, 8, 9]).expect("非空链表"))
        .expect("编码");
    let mut decoder = node_decoder(settings).decoder();

    let mut result = None;
    for (index, byte) in bytes.iter().enumerate() {
        let mut src: &[u8] = std::slice::from_ref(byte);
        match decoder.decode(&mut src).expect("逐字节解码") {
            DecodeOutcome::Incomplete => assert!(decoder.depth() >= 1),
            DecodeOutcome::Done { value, consumed } => {
                assert_eq!(index + 1, bytes.len(), "最后一个字节之前不得产出值");
                assert_eq!(consumed, bytes.len());
                result = Some(value);
            }
        }
    }
    assert_eq!(result.map(|node| node.value), Some(7));
    assert_eq!(decoder.depth(), 0, "完成后回到 Ready");
}

#[test]
fn depth_limit_applies_to_both_directions() {
    let shallow = CodecSettings::new().with_max_depth(2);
    let deep_chain = *chain(&[1, 2, 3]).expect("非空链表");

    let err = node_encoder(&shallow)
        .encode_to_vec(&deep_chain)
        .expect_err("三层超过上限");
    assert_eq!(err.code(), codes::FORMAT_DEPTH_EXCEEDED);

    let bytes = node_encoder(&CodecSettings::default())
        .encode_to_vec(&deep_chain)
        .expect("默认上限足够");
    let mut decoder = node_decoder(shallow).decoder();
    let err = decoder.decode_slice(&bytes).expect_err("解码端同样受限");
    assert_eq!(err.code(), codes::FORMAT_DEPTH_EXCEEDED);
    assert!(err.is_format());

    let two = node_encoder(&CodecSettings::default())
        .encode_to_vec(&*chain(&[4, 5]).expect("非空链表"))
        .expect("编码");
    assert_eq!(
        decoder.decode_slice(&two).expect("失败后实例可复用").value,
        4
    );
}

#[test]
fn errors_never_surface_as_partial_values() {
    let settings = CodecSettings::default();
    let mut bytes = node_encoder(&settings)
        .encode_to_vec(&*chain(&[1, 2]).expect("非空链表"))
        .expect("编码");
    // 把第二个节点的字符串长度前缀改为负数
    let second = 4 + 4 + "node-1".len() + 1 + 4;
    bytes[second..second + 4].copy_from_slice(&(-1i32).to_be_bytes());

    let mut decoder = node_decoder(settings).decoder();
    let mut src: &[u8] = &bytes;
    let err = decoder.decode(&mut src).expect_err("负长度前缀");
    assert_eq!(err.code(), codes::FORMAT_INVALID_LENGTH);
    assert_eq!(decoder.depth(), 0);
}

#[derive(Clone, Debug, PartialEq)]
struct Point {
    x: i16,
    y: i16,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Style {
    Solid,
    Dashed,
}

#[derive(Clone, Debug, PartialEq)]
struct Segment {
    start: Point,
    end: Point,
    style: Style,
}

#[test]
fn shared_labels_resolve_to_one_registered_decoder() {
    let settings = CodecSettings::new().with_byte_order(ByteOrder::LittleEndian);
    let point_encoder = ComposedEncoder::new(&settings, |point: &Point, scope| {
        scope.short(point.x)?.short(point.y)?;
        Ok(())
    })
    .expect("编码器设置合法");
    let points = DecoderComposer::new(settings.clone())
        .short()
        .short()
        .build(|fields| {
            Ok(Point {
                x: fields.next()?,
                y: fields.next()?,
            })
        })
        .expect("组合声明合法");

    let styles = [Style::Solid, Style::Dashed];
    let style_encoder =
        spark_transcoder::codec::DiscriminantEncoder::new(settings.byte_order, styles);
    let order = settings.byte_order;
    let segments = DecoderComposer::new(settings.clone())
        .register("point", points)
        .shared("point")
        .shared("point")
        .nested(move || DiscriminantDecoder::new(order, styles))
        .build(|fields| {
            Ok(Segment {
                start: fields.next()?,
                end: fields.next()?,
                style: fields.next()?,
            })
        })
        .expect("共享标签已登记");
    let segment_encoder = ComposedEncoder::new(&settings, move |segment: &Segment, scope| {
        scope
            .nested(&point_encoder, &segment.start)?
            .nested(&point_encoder, &segment.end)?
            .nested(&style_encoder, &segment.style)?;
        Ok(())
    })
    .expect("编码器设置合法");

    let segment = Segment {
        start: Point { x: -1, y: 2 },
        end: Point { x: 300, y: -400 },
        style: Style::Dashed,
    };
    let bytes = segment_encoder.encode_to_vec(&segment).expect("编码");
    assert_eq!(bytes.len(), 2 * 4 + 4);
    assert_eq!(&bytes[..2], &(-1i16).to_le_bytes());
    assert_eq!(segments.decoder().decode_slice(&bytes).expect("解码"), segment);
}

#[test]
fn dangling_label_is_a_build_time_configuration_error() {
    let err = DecoderComposer::<i32>::new(CodecSettings::default())
        .shared("missing")
        .build(|fields| fields.next())
        .expect_err("悬空标签");
    assert_eq!(err.code(), codes::CONFIG_DANGLING_KEY);
    assert!(err.is_configuration());
    let cause = err
        .cause()
        .and_then(|cause| cause.downcast_ref::<ComposeError>())
        .expect("保留原始错误");
    assert!(matches!(cause, ComposeError::DanglingKey { label } if label == "missing"));
}

#[test]
fn zero_width_bytes_fail_before_any_decode() {
    let err = DecoderComposer::<Vec<u8>>::new(CodecSettings::default())
        .bytes(0)
        .build(|fields| fields.next())
        .expect_err("零宽字节块");
    assert_eq!(err.code(), codes::CONFIG_ZERO_WIDTH);
}

#[test]
fn invalid_nullable_shapes_are_rejected() {
    let nested_nullable = DecoderComposer::<Option<i32>>::new(CodecSettings::default())
        .nullable(CompositionStep::nullable(CompositionStep::Primitive(
            PrimitiveKind::Int,
        )))
        .build(|fields| fields.next_optional())
        .expect_err("可空套可空");
    assert_eq!(nested_nullable.code(), codes::CONFIG_INVALID_STEP);

    let byte_presence = DecoderComposer::<Option<i32>>::new(CodecSettings::default())
        .nullable_with(
            CompositionStep::Primitive(PrimitiveKind::Int),
            CompositionStep::nested(|| FixedWidthDecoder::<u8>::default()),
        )
        .build(|fields| fields.next_optional())
        .expect_err("存在标记必须是布尔值");
    assert_eq!(byte_presence.code(), codes::CONFIG_INVALID_STEP);
}

#[test]
fn custom_presence_decoder_is_honoured() {
    // 独立构造的布尔解码器作为存在标记，任意非零字节为真。
    let factory = DecoderComposer::<Option<i32>>::new(CodecSettings::default())
        .nullable_with(
            CompositionStep::Primitive(PrimitiveKind::Int),
            CompositionStep::nested(|| FixedWidthDecoder::<bool>::default()),
        )
        .build(|fields| fields.next_optional())
        .expect("自定义布尔存在标记");
    let mut decoder = factory.decoder();
    assert_eq!(decoder.decode_slice(&[0x7f, 0, 0, 0, 9]).expect("存在"), Some(9));
    assert_eq!(decoder.decode_slice(&[0x00]).expect("缺省"), None);
}

#[test]
fn mismatched_finish_reads_are_reported() {
    let factory = DecoderComposer::<i64>::new(CodecSettings::default())
        .int()
        .build(|fields| fields.next::<i64>())
        .expect("声明本身合法");
    let err = factory
        .decoder()
        .decode_slice(&[0, 0, 0, 1])
        .expect_err("i32 字段不能按 i64 读取");
    assert_eq!(err.code(), codes::CONFIG_FIELD_MISMATCH);
}

#[test]
fn required_self_reference_fails_at_build_time() {
    #[derive(Debug)]
    struct Loop {
        _value: i32,
        _next: Box<Loop>,
    }

    let err = DecoderComposer::<Loop>::new(CodecSettings::default())
        .int()
        .step(CompositionStep::SelfReference)
        .build(|fields| {
            Ok(Loop {
                _value: fields.next()?,
                _next: Box::new(fields.next()?),
            })
        })
        .expect_err("必需的自引用永远无法终止");
    assert_eq!(err.code(), codes::CONFIG_INVALID_STEP);
    assert!(err.is_configuration());
    let cause = err
        .cause()
        .and_then(|cause| cause.downcast_ref::<ComposeError>())
        .expect("保留原始错误");
    assert!(matches!(cause, ComposeError::InvalidStep { .. }));
}

#[derive(Debug, PartialEq)]
struct Blob {
    tag: Vec<u8>,
    n: i32,
}

#[test]
fn byte_block_length_must_match_the_declared_width() {
    let settings = CodecSettings::default();
    let encoder = ComposedEncoder::new(&settings, |blob: &Blob, scope| {
        scope.bytes(2, &blob.tag)?.int(blob.n)?;
        Ok(())
    })
    .expect("编码器设置合法");
    let decoder = DecoderComposer::new(settings)
        .bytes(2)
        .int()
        .build(|fields| {
            Ok(Blob {
                tag: fields.next()?,
                n: fields.next()?,
            })
        })
        .expect("组合声明合法");
    let transcoder = Transcoder::composed(encoder, decoder);

    let err = transcoder
        .encode_to_vec(&Blob {
            tag: vec![1, 2, 3],
            n: 7,
        })
        .expect_err("三个字节写不进两字节的块");
    assert_eq!(err.code(), codes::FORMAT_INVALID_LENGTH);
    assert!(err.is_format());

    let blob = Blob {
        tag: vec![1, 2],
        n: 7,
    };
    let bytes = transcoder.encode_to_vec(&blob).expect("长度一致");
    assert_eq!(bytes, [1, 2, 0, 0, 0, 7]);
    assert_eq!(transcoder.decode_slice(&bytes).expect("解码"), blob);
}

#[derive(Clone, Debug, PartialEq)]
struct Tree {
    id: i32,
    children: Vec<Tree>,
}

fn leaf(id: i32) -> Tree {
    Tree {
        id,
        children: Vec::new(),
    }
}

/// 1 → (2 → (4, 5), 3 → (6))
fn three_level_tree() -> Tree {
    Tree {
        id: 1,
        children: vec![
            Tree {
                id: 2,
                children: vec![leaf(4), leaf(5)],
            },
            Tree {
                id: 3,
                children: vec![leaf(6)],
            },
        ],
    }
}

/// 每个节点：`Int` 编号、两字节保留位、`Int` 子节点个数与子节点。
fn tree_transcoder(settings: CodecSettings) -> Transcoder<Tree> {
    let encoder = ComposedEncoder::new(&settings, |tree: &Tree, scope| {
        scope.int(tree.id)?.skip(2)?.self_list(&tree.children)?;
        Ok(())
    })
    .expect("编码器设置合法");
    let decoder = DecoderComposer::new(settings)
        .int()
        .skip(2)
        .self_list()
        .build(|fields| {
            Ok(Tree {
                id: fields.next()?,
                children: fields.next()?,
            })
        })
        .expect("组合声明合法");
    Transcoder::composed(encoder, decoder)
}

#[test]
fn self_list_tree_round_trips_and_ignores_skipped_bytes() {
    let transcoder = tree_transcoder(CodecSettings::default());
    let tree = three_level_tree();
    let mut bytes = transcoder.encode_to_vec(&tree).expect("编码");
    assert_eq!(bytes.len(), 6 * (4 + 2 + 4));
    assert_eq!(&bytes[4..6], &[0, 0]);
    assert_eq!(transcoder.decode_slice(&bytes).expect("解码"), tree);

    // 保留位的内容不影响解码结果
    bytes[4..6].copy_from_slice(&[0xab, 0xcd]);
    assert_eq!(transcoder.decode_slice(&bytes).expect("保留位被跳过"), tree);
}

#[test]
fn self_list_tree_decodes_one_byte_at_a_time() {
    let transcoder = tree_transcoder(CodecSettings::default());
    let tree = three_level_tree();
    let bytes = transcoder.encode_to_vec(&tree).expect("编码");
    let mut decoder = transcoder.decoder();

    let mut result = None;
    for (index, byte) in bytes.iter().enumerate() {
        let mut src: &[u8] = std::slice::from_ref(byte);
        match decoder.decode(&mut src).expect("逐字节解码") {
            DecodeOutcome::Incomplete => assert!(src.is_empty()),
            DecodeOutcome::Done { value, consumed } => {
                assert_eq!(index + 1, bytes.len(), "最后一个字节之前不得产出值");
                assert_eq!(consumed, bytes.len());
                result = Some(value);
            }
        }
    }
    assert_eq!(result, Some(tree));
}

#[test]
fn self_list_rejects_negative_counts_and_respects_depth() {
    let transcoder = tree_transcoder(CodecSettings::default());
    let err = transcoder
        .decode_slice(&[0, 0, 0, 1, 0, 0, 0xff, 0xff, 0xff, 0xff])
        .expect_err("负的元素个数");
    assert_eq!(err.code(), codes::FORMAT_INVALID_LENGTH);

    let bytes = transcoder.encode_to_vec(&three_level_tree()).expect("编码");
    let shallow = tree_transcoder(CodecSettings::new().with_max_depth(2));
    let err = shallow.decode_slice(&bytes).expect_err("三层超过上限");
    assert_eq!(err.code(), codes::FORMAT_DEPTH_EXCEEDED);
    let err = shallow
        .encode_to_vec(&three_level_tree())
        .expect_err("编码端同样受限");
    assert_eq!(err.code(), codes::FORMAT_DEPTH_EXCEEDED);
}

#[derive(Debug, PartialEq)]
struct Menu {
    label: String,
    items: Option<Vec<Menu>>,
}

#[test]
fn nullable_self_list_distinguishes_absent_from_empty() {
    let settings = CodecSettings::default();
    let encoder = ComposedEncoder::new(&settings, |menu: &Menu, scope| {
        scope
            .string(&menu.label)?
            .self_list_or_null(menu.items.as_deref())?;
        Ok(())
    })
    .expect("编码器设置合法");
    let decoder = DecoderComposer::new(settings)
        .string()
        .self_list_or_null()
        .build(|fields| {
            Ok(Menu {
                label: fields.next()?,
                items: fields.next_optional()?,
            })
        })
        .expect("组合声明合法");
    let transcoder = Transcoder::composed(encoder, decoder);

    let menu = Menu {
        label: "root".to_owned(),
        items: Some(vec![
            Menu {
                label: "open".to_owned(),
                items: None,
            },
            Menu {
                label: "recent".to_owned(),
                items: Some(Vec::new()),
            },
        ]),
    };
    let bytes = transcoder.encode_to_vec(&menu).expect("编码");
    assert_eq!(transcoder.decode_slice(&bytes).expect("解码"), menu);
}

#[derive(Debug, PartialEq)]
struct Polyline {
    name: String,
    xs: Vec<i16>,
}

#[test]
fn scope_lists_pair_with_prefixed_repeat_decoders() {
    let settings = CodecSettings::new().with_byte_order(ByteOrder::LittleEndian);
    let order = settings.byte_order;
    let encoder = ComposedEncoder::new(&settings, move |line: &Polyline, scope| {
        scope
            .string(&line.name)?
            .list(&FixedWidthEncoder::<i16>::new(order), &line.xs)?;
        Ok(())
    })
    .expect("编码器设置合法");
    let decoder = DecoderComposer::new(settings)
        .string()
        .nested(move || {
            FixedWidthDecoder::<i16>::new(order)
                .repeat_prefixed(FixedWidthDecoder::<i32>::new(order))
        })
        .build(|fields| {
            Ok(Polyline {
                name: fields.next()?,
                xs: fields.next()?,
            })
        })
        .expect("组合声明合法");
    let transcoder = Transcoder::composed(encoder, decoder);

    let line = Polyline {
        name: "edge".to_owned(),
        xs: vec![-3, 0, 512],
    };
    let bytes = transcoder.encode_to_vec(&line).expect("编码");
    assert_eq!(&bytes[4 + 4..4 + 4 + 4], &3i32.to_le_bytes());
    assert_eq!(transcoder.decode_slice(&bytes).expect("解码"), line);
}

#[derive(Debug, PartialEq)]
struct Reading {
    value: Option<i64>,
}

#[test]
fn custom_presence_is_symmetric_across_encoder_and_decoder() {
    let settings = CodecSettings::default();
    let order = settings.byte_order;
    let presence =
        FixedWidthEncoder::<i32>::new(order).map_input(|present: &bool| i32::from(*present));
    let encoder = ComposedEncoder::new(&settings, move |reading: &Reading, scope| {
        scope.nullable_with(&presence, reading.value.as_ref(), |scope, value| {
            scope.long(*value).map(drop)
        })?;
        Ok(())
    })
    .expect("编码器设置合法");
    let decoder = DecoderComposer::new(settings)
        .nullable_with(
            CompositionStep::Primitive(PrimitiveKind::Long),
            CompositionStep::nested(move || {
                FixedWidthDecoder::<i32>::new(order).map(|flag| flag != 0)
            }),
        )
        .build(|fields| {
            Ok(Reading {
                value: fields.next_optional()?,
            })
        })
        .expect("四字节存在标记");
    let transcoder = Transcoder::composed(encoder, decoder);

    let present = Reading { value: Some(5) };
    let bytes = transcoder.encode_to_vec(&present).expect("编码");
    assert_eq!(bytes, [0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 5]);
    assert_eq!(transcoder.decode_slice(&bytes).expect("解码"), present);

    let absent = Reading { value: None };
    let bytes = transcoder.encode_to_vec(&absent).expect("编码");
    assert_eq!(bytes, [0, 0, 0, 0]);
    assert_eq!(transcoder.decode_slice(&bytes).expect("解码"), absent);
}
