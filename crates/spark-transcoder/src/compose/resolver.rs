//! 组合图解析：把声明的步骤序列解析为以索引互相引用的节点表。
//!
//! # 教案式说明
//! - **意图 (Why)**：自引用类型在声明上是有环的。若在构建期直接递归构造解码器，
//!   `SelfReference` 会无限展开；改为“先占位、后回填”的节点表，环只以索引形式存在，
//!   直到解码期才被解引用。
//! - **契约 (What)**：
//!   - 缓存按 [`DecoderKey`] 去重，键相等的步骤解析为同一节点；缓存只在单次构建内有效；
//!   - 根节点最先占位，并以 `DecoderKey::SelfRef` 预先登记，因此自引用总是命中根占位；
//!   - 悬空标签、可空套可空、非布尔存在标记、未包在可空步骤里的自引用都在这里以
//!     [`ComposeError`] 失败。
//! - **执行逻辑 (How)**：`reserve` 插入 `InConstruction` 槽位并返回索引，子步骤解析完成后
//!   `finalize` 回填；构建结束时任何残留占位都视为内部错误。

use std::{any::TypeId, borrow::Cow, collections::HashMap, sync::Arc};

use tracing::{debug, trace};

use super::{
    ComposeError,
    erased::ErasedFactory,
    key::{DecoderKey, PrimitiveKind},
    step::CompositionStep,
};
use crate::{Result, configuration::CodecSettings};

pub(crate) type NodeId = usize;

/// 根节点在节点表中的固定位置。
pub(crate) const ROOT: NodeId = 0;

pub(crate) enum Node {
    /// 由工厂产出解码器的叶子。
    Leaf(Arc<dyn ErasedFactory>),
    /// 存在标记为真时才解码 `value`。
    Nullable { presence: NodeId, value: NodeId },
    /// 组合类型本身，按声明顺序列出字段节点。
    Composite(Vec<NodeId>),
    /// 先解码 `count` 个数，再展开同样多个根节点。
    SelfList { count: NodeId },
    /// 丢弃固定数量的字节。
    Skip(usize),
}

enum Slot {
    InConstruction,
    Resolved(Node),
}

/// 解析完成的节点表。
pub(crate) struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// 根节点的字段列表。
    pub(crate) fn fields(&self) -> &[NodeId] {
        match &self.nodes[ROOT] {
            Node::Composite(fields) => fields,
            _ => &[],
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }
}

pub(crate) type Registry = HashMap<Cow<'static, str>, Arc<dyn ErasedFactory>>;

pub(crate) struct Resolver<'a> {
    settings: &'a CodecSettings,
    registry: &'a Registry,
    cache: HashMap<DecoderKey, NodeId>,
    slots: Vec<Slot>,
    cache_hits: usize,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(settings: &'a CodecSettings, registry: &'a Registry) -> Self {
        Self {
            settings,
            registry,
            cache: HashMap::new(),
            slots: Vec::new(),
            cache_hits: 0,
        }
    }

    /// 解析根组合类型。
    pub(crate) fn resolve_root(mut self, steps: &[CompositionStep]) -> Result<Graph> {
        // 必需的自引用在每一层都会再次出现，解码只能以深度超限告终。
        if steps
            .iter()
            .any(|step| matches!(step, CompositionStep::SelfReference))
        {
            return Err(ComposeError::InvalidStep {
                reason: "a required self reference never terminates; wrap it in a nullable step",
            }
            .into());
        }

        let root = self.reserve();
        debug_assert_eq!(root, ROOT);
        self.cache.insert(DecoderKey::SelfRef, root);

        let fields = steps
            .iter()
            .map(|step| self.resolve(step))
            .collect::<Result<Vec<_>>>()?;
        self.finalize(root, Node::Composite(fields));

        let cache_hits = self.cache_hits;
        let nodes = self
            .slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| match slot {
                Slot::Resolved(node) => Ok(node),
                Slot::InConstruction => Err(ComposeError::Unfinished { index }.into()),
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(
            fields = steps.len(),
            nodes = nodes.len(),
            cache_hits,
            "composition schema resolved"
        );
        Ok(Graph { nodes })
    }

    fn resolve(&mut self, step: &CompositionStep) -> Result<NodeId> {
        let key = step.key();
        if let Some(key) = &key
            && let Some(&id) = self.cache.get(key)
        {
            self.cache_hits += 1;
            trace!(%key, node = id, "composition cache hit");
            return Ok(id);
        }

        let id = match step {
            CompositionStep::Primitive(kind) => {
                let factory = kind.factory(self.settings)?;
                self.push(Node::Leaf(factory))
            }
            CompositionStep::Nested(nested) => self.push(Node::Leaf(nested.factory.clone())),
            CompositionStep::Shared(label) => {
                let factory = self
                    .registry
                    .get(label)
                    .ok_or_else(|| ComposeError::DanglingKey {
                        label: label.clone(),
                    })?
                    .clone();
                self.push(Node::Leaf(factory))
            }
            CompositionStep::SelfReference => {
                // 根占位在解析任何字段前已登记，走到这里说明缓存被破坏。
                return Err(ComposeError::InvalidStep {
                    reason: "self reference resolved outside of a composite",
                }
                .into());
            }
            CompositionStep::SelfList => {
                let count = self.resolve(&CompositionStep::Primitive(PrimitiveKind::Int))?;
                self.push(Node::SelfList { count })
            }
            CompositionStep::Skip(len) => self.push(Node::Skip(*len)),
            CompositionStep::Nullable { value, presence } => {
                match **value {
                    CompositionStep::Nullable { .. } => {
                        return Err(ComposeError::InvalidStep {
                            reason: "a nullable value must not itself be nullable",
                        }
                        .into());
                    }
                    CompositionStep::Skip(_) => {
                        return Err(ComposeError::InvalidStep {
                            reason: "a skipped block produces no value to make nullable",
                        }
                        .into());
                    }
                    _ => {}
                }
                let id = self.reserve();
                if let Some(key) = &key {
                    self.cache.insert(key.clone(), id);
                }
                let presence = self.resolve(presence)?;
                self.ensure_bool(presence)?;
                let value = self.resolve(value)?;
                self.finalize(id, Node::Nullable { presence, value });
                id
            }
        };

        if let Some(key) = key {
            self.cache.entry(key).or_insert(id);
        }
        Ok(id)
    }

    fn ensure_bool(&self, id: NodeId) -> Result<()> {
        match &self.slots[id] {
            Slot::Resolved(Node::Leaf(factory)) if factory.value_type() == TypeId::of::<bool>() => {
                Ok(())
            }
            _ => Err(ComposeError::InvalidStep {
                reason: "a presence step must decode a bool",
            }
            .into()),
        }
    }

    fn reserve(&mut self) -> NodeId {
        self.slots.push(Slot::InConstruction);
        self.slots.len() - 1
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.slots.push(Slot::Resolved(node));
        self.slots.len() - 1
    }

    fn finalize(&mut self, id: NodeId, node: Node) {
        self.slots[id] = Slot::Resolved(node);
    }
}
