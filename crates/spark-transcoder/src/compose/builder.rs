use std::{borrow::Cow, collections::hash_map::Entry};

use super::{
    ComposeError,
    decoder::{ComposedDecoderFactory, Schema},
    erased::erase,
    fields::Fields,
    key::PrimitiveKind,
    resolver::{Registry, Resolver},
    step::CompositionStep,
};
use crate::{Result, codec::DecoderFactory, configuration::CodecSettings};

/// 组合解码器的声明入口。
///
/// # 教案式说明
/// - **意图 (Why)**：调用方按线格式顺序声明字段，再给出“字段值 → 目标类型”的终结映射，
///   这是构造新组合解码器的唯一方式。
/// - **契约 (What)**：
///   - 声明顺序即字段顺序，调整顺序会改变线格式；
///   - 所有结构性错误（悬空标签、重复登记、零宽字节块、非法可空）都在 [`build`](Self::build)
///     时以 `config.*` 错误返回，不会推迟到解码期；
///   - 每次 `build` 使用独立的解析缓存，不同组合之间不会发生键冲突。
/// - **执行逻辑 (How)**：链式方法只记录步骤；`build` 先校验设置，再交给解析器生成节点表。
///
/// ```
/// use spark_transcoder::{CodecSettings, DecoderComposer, DecoderExt};
///
/// struct Node {
///     value: i32,
///     next: Option<Box<Node>>,
/// }
///
/// let factory = DecoderComposer::<Node>::new(CodecSettings::default())
///     .int()
///     .self_or_null()
///     .build(|fields| {
///         Ok(Node {
///             value: fields.next()?,
///             next: fields.next_optional::<Node>()?.map(Box::new),
///         })
///     })
///     .expect("组合声明合法");
///
/// let node = factory
///     .decoder()
///     .decode_slice(&[0, 0, 0, 1, 1, 0, 0, 0, 2, 0])
///     .expect("解码两节点链表");
/// assert_eq!(node.value, 1);
/// assert_eq!(node.next.map(|next| next.value), Some(2));
/// ```
pub struct DecoderComposer<T> {
    settings: CodecSettings,
    steps: Vec<CompositionStep>,
    registry: Registry,
    duplicate: Option<Cow<'static, str>>,
    _target: std::marker::PhantomData<fn() -> T>,
}

impl<T: Send + 'static> DecoderComposer<T> {
    pub fn new(settings: CodecSettings) -> Self {
        Self {
            settings,
            steps: Vec::new(),
            registry: Registry::new(),
            duplicate: None,
            _target: std::marker::PhantomData,
        }
    }

    /// 追加任意步骤。
    pub fn step(mut self, step: CompositionStep) -> Self {
        self.steps.push(step);
        self
    }

    fn primitive(self, kind: PrimitiveKind) -> Self {
        self.step(CompositionStep::Primitive(kind))
    }

    pub fn byte(self) -> Self {
        self.primitive(PrimitiveKind::Byte)
    }

    pub fn short(self) -> Self {
        self.primitive(PrimitiveKind::Short)
    }

    pub fn int(self) -> Self {
        self.primitive(PrimitiveKind::Int)
    }

    pub fn long(self) -> Self {
        self.primitive(PrimitiveKind::Long)
    }

    pub fn float(self) -> Self {
        self.primitive(PrimitiveKind::Float)
    }

    pub fn double(self) -> Self {
        self.primitive(PrimitiveKind::Double)
    }

    pub fn boolean(self) -> Self {
        self.primitive(PrimitiveKind::Boolean)
    }

    pub fn string(self) -> Self {
        self.primitive(PrimitiveKind::String)
    }

    /// 定长字节块，产出 `Vec<u8>`。
    pub fn bytes(self, len: usize) -> Self {
        self.primitive(PrimitiveKind::Bytes(len))
    }

    /// 嵌套任意解码器工厂，例如另一个组合类型。
    pub fn nested<U, F>(self, factory: F) -> Self
    where
        U: Send + 'static,
        F: DecoderFactory<U> + 'static,
    {
        self.step(CompositionStep::nested(factory))
    }

    pub fn nullable(self, value: CompositionStep) -> Self {
        self.step(CompositionStep::nullable(value))
    }

    pub fn nullable_with(self, value: CompositionStep, presence: CompositionStep) -> Self {
        self.step(CompositionStep::nullable_with(value, presence))
    }

    /// 同类型的可空字段，典型用法是链表的后继节点。
    ///
    /// 不提供必需的自引用：它在每一层都会再次出现，构建期即以 `config.invalid_step` 拒绝。
    pub fn self_or_null(self) -> Self {
        self.nullable(CompositionStep::SelfReference)
    }

    /// 以 `Int` 个数为前缀的同类型列表，产出 `Vec<T>`，典型用法是树的子节点。
    pub fn self_list(self) -> Self {
        self.step(CompositionStep::SelfList)
    }

    /// 可空的同类型列表，产出 `Option<Vec<T>>`。
    pub fn self_list_or_null(self) -> Self {
        self.nullable(CompositionStep::SelfList)
    }

    /// 跳过 `len` 个原始字节；该步骤不产出字段，终结映射函数无需读取。
    pub fn skip(self, len: usize) -> Self {
        self.step(CompositionStep::Skip(len))
    }

    /// 引用已登记（或稍后登记）的共享解码器。
    pub fn shared(self, label: impl Into<Cow<'static, str>>) -> Self {
        self.step(CompositionStep::Shared(label.into()))
    }

    /// 以标签登记共享解码器；所有同标签的 [`shared`](Self::shared) 步骤解析为同一节点。
    pub fn register<U, F>(mut self, label: impl Into<Cow<'static, str>>, factory: F) -> Self
    where
        U: Send + 'static,
        F: DecoderFactory<U> + 'static,
    {
        match self.registry.entry(label.into()) {
            Entry::Occupied(entry) => {
                self.duplicate.get_or_insert_with(|| entry.key().clone());
            }
            Entry::Vacant(entry) => {
                entry.insert(erase(factory));
            }
        }
        self
    }

    /// 解析组合图并产出解码器工厂。
    pub fn build<F>(self, finish: F) -> Result<ComposedDecoderFactory<T>>
    where
        F: Fn(&mut Fields) -> Result<T> + Send + Sync + 'static,
    {
        self.settings.validate()?;
        if let Some(label) = self.duplicate {
            return Err(ComposeError::DuplicateKey { label }.into());
        }
        let graph = Resolver::new(&self.settings, &self.registry).resolve_root(&self.steps)?;
        Ok(ComposedDecoderFactory::new(Schema {
            graph,
            finish: Box::new(finish),
            max_depth: self.settings.max_depth,
        }))
    }
}
