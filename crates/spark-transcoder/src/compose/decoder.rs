use std::{fmt, sync::Arc};

use tracing::debug;

use super::{
    erased::{AnyValue, ErasedDecoder},
    fields::{FieldValue, Fields},
    resolver::{Graph, Node, NodeId, ROOT},
};
use crate::{
    CodecError, Result,
    buffer::ByteSource,
    codec::{BoxDecoder, DecodeOutcome, DecodeResult, Decoder, DecoderFactory},
    error::codes,
};

pub(crate) type Finish<T> = dyn Fn(&mut Fields) -> Result<T> + Send + Sync;

/// 构建完成、可被多个解码器实例共享的组合描述。
pub(crate) struct Schema<T> {
    pub(crate) graph: Graph,
    pub(crate) finish: Box<Finish<T>>,
    pub(crate) max_depth: usize,
}

/// 组合解码器的工厂，由 [`DecoderComposer::build`](super::DecoderComposer::build) 产出。
pub struct ComposedDecoderFactory<T> {
    schema: Arc<Schema<T>>,
}

impl<T> ComposedDecoderFactory<T> {
    pub(crate) fn new(schema: Schema<T>) -> Self {
        Self {
            schema: Arc::new(schema),
        }
    }

    /// 直接创建具体类型的解码器实例。
    pub fn decoder(&self) -> ComposedDecoder<T> {
        ComposedDecoder::new(Arc::clone(&self.schema))
    }
}

impl<T> Clone for ComposedDecoderFactory<T> {
    fn clone(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
        }
    }
}

impl<T> fmt::Debug for ComposedDecoderFactory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedDecoderFactory")
            .field("fields", &self.schema.graph.fields().len())
            .field("max_depth", &self.schema.max_depth)
            .finish()
    }
}

impl<T: Send + 'static> DecoderFactory<T> for ComposedDecoderFactory<T> {
    fn create(&self) -> BoxDecoder<T> {
        Box::new(self.decoder())
    }
}

enum Active<T> {
    /// 正在解码叶子字段，或可空字段的值。
    Leaf(Box<dyn ErasedDecoder>),
    /// 正在解码存在标记，结果为真时继续解码 `value`。
    Presence {
        decoder: Box<dyn ErasedDecoder>,
        value: NodeId,
    },
    /// 正在解码自引用列表的元素个数。
    Count(Box<dyn ErasedDecoder>),
    /// 自引用列表还差 `remaining` 个元素；每个元素占用一层子帧。
    Repeat { remaining: usize, items: Vec<T> },
    /// 还需丢弃的字节数。
    Skip { remaining: usize },
}

/// 一层组合值的解码进度。
struct Frame<T> {
    cursor: usize,
    fields: Vec<FieldValue>,
    active: Option<Active<T>>,
}

impl<T> Frame<T> {
    fn new(capacity: usize) -> Self {
        Self {
            cursor: 0,
            fields: Vec::with_capacity(capacity),
            active: None,
        }
    }

    fn complete_field(&mut self, value: FieldValue) {
        self.fields.push(value);
        self.cursor += 1;
        self.active = None;
    }

    /// 不产出值的步骤完成，只移动游标。
    fn pass_field(&mut self) {
        self.cursor += 1;
        self.active = None;
    }
}

/// 驱动帧栈的下一步动作；与帧的可变借用分离，便于随后压栈或出栈。
enum Step {
    Suspend,
    Descend,
    Ascend,
    Continue,
}

/// 按组合图解码的可恢复解码器。
///
/// # 教案式说明
/// - **意图 (Why)**：自引用字段在运行期展开为嵌套层级；以显式帧栈代替递归调用，
///   挂起时整条路径（每层的字段游标与活跃子解码器）都保存在栈中，恢复时从栈顶继续。
/// - **契约 (What)**：
///   - 字段严格按声明顺序解码，子解码器返回 `Incomplete` 时整体返回 `Incomplete`，
///     下一次调用从同一字段继续；
///   - 嵌套层数超过设置的 `max_depth` 以 `format.depth_exceeded` 失败，
///     自引用列表的每个元素同样占用一层；
///   - 任何错误都会清空帧栈，绝不以 `Done` 产出部分值。
/// - **执行逻辑 (How)**：栈顶帧的字段全部完成时调用终结映射函数，产出值装箱后作为
///   父帧的一个字段；栈清空即整个值完成。
pub struct ComposedDecoder<T> {
    schema: Arc<Schema<T>>,
    frames: Vec<Frame<T>>,
    consumed: usize,
}

impl<T> ComposedDecoder<T> {
    fn new(schema: Arc<Schema<T>>) -> Self {
        Self {
            schema,
            frames: Vec::new(),
            consumed: 0,
        }
    }

    /// 当前展开的嵌套层数；空闲时为零。
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn clear(&mut self) {
        self.frames.clear();
        self.consumed = 0;
    }
}

impl<T: Send + 'static> ComposedDecoder<T> {
    fn drive(&mut self, src: &mut dyn ByteSource) -> DecodeResult<T> {
        if self.frames.is_empty() {
            self.frames.push(Frame::new(self.schema.graph.fields().len()));
        }
        loop {
            match self.advance(src)? {
                Step::Suspend => return Ok(DecodeOutcome::Incomplete),
                Step::Continue => {}
                Step::Descend => {
                    if self.frames.len() >= self.schema.max_depth {
                        return Err(CodecError::new(
                            codes::FORMAT_DEPTH_EXCEEDED,
                            format!(
                                "self reference nests deeper than {} levels",
                                self.schema.max_depth
                            ),
                        ));
                    }
                    self.frames.push(Frame::new(self.schema.graph.fields().len()));
                }
                Step::Ascend => {
                    let Some(frame) = self.frames.pop() else {
                        continue;
                    };
                    let value = (self.schema.finish)(&mut Fields::new(frame.fields))?;
                    let Some(parent) = self.frames.last_mut() else {
                        let consumed = std::mem::take(&mut self.consumed);
                        return Ok(DecodeOutcome::done(value, consumed));
                    };
                    match parent.active.take() {
                        Some(Active::Repeat {
                            remaining,
                            mut items,
                        }) => {
                            items.push(value);
                            if remaining > 1 {
                                parent.active = Some(Active::Repeat {
                                    remaining: remaining - 1,
                                    items,
                                });
                            } else {
                                parent.complete_field(FieldValue::Present(
                                    Box::new(items) as AnyValue
                                ));
                            }
                        }
                        _ => parent
                            .complete_field(FieldValue::Present(Box::new(value) as AnyValue)),
                    }
                }
            }
        }
    }

    /// 推进栈顶帧一步。
    fn advance(&mut self, src: &mut dyn ByteSource) -> Result<Step> {
        let Self {
            schema,
            frames,
            consumed,
        } = self;
        let graph = &schema.graph;
        let Some(frame) = frames.last_mut() else {
            return Ok(Step::Continue);
        };
        let fields = graph.fields();
        if frame.cursor == fields.len() {
            return Ok(Step::Ascend);
        }

        let Some(active) = frame.active.take() else {
            let node = fields[frame.cursor];
            return start(graph, frame, node);
        };
        match active {
            Active::Leaf(mut decoder) => match decoder.decode_any(src)? {
                DecodeOutcome::Done {
                    value,
                    consumed: used,
                } => {
                    *consumed += used;
                    frame.complete_field(FieldValue::Present(value));
                    Ok(Step::Continue)
                }
                DecodeOutcome::Incomplete => {
                    frame.active = Some(Active::Leaf(decoder));
                    Ok(Step::Suspend)
                }
            },
            Active::Count(mut decoder) => match decoder.decode_any(src)? {
                DecodeOutcome::Done {
                    value,
                    consumed: used,
                } => {
                    *consumed += used;
                    let count = *value.downcast::<i32>().map_err(|_| {
                        CodecError::new(
                            codes::CONFIG_FIELD_MISMATCH,
                            "list count step produced a non-i32 value",
                        )
                    })?;
                    let remaining = usize::try_from(count).map_err(|_| {
                        CodecError::new(
                            codes::FORMAT_INVALID_LENGTH,
                            format!("negative list element count {count}"),
                        )
                    })?;
                    if remaining == 0 {
                        frame.complete_field(FieldValue::Present(
                            Box::new(Vec::<T>::new()) as AnyValue
                        ));
                        return Ok(Step::Continue);
                    }
                    frame.active = Some(Active::Repeat {
                        remaining,
                        items: Vec::new(),
                    });
                    Ok(Step::Descend)
                }
                DecodeOutcome::Incomplete => {
                    frame.active = Some(Active::Count(decoder));
                    Ok(Step::Suspend)
                }
            },
            active @ Active::Repeat { .. } => {
                frame.active = Some(active);
                Ok(Step::Descend)
            }
            Active::Skip { remaining } => {
                let available = remaining.min(src.remaining());
                src.advance(available)?;
                *consumed += available;
                if available == remaining {
                    frame.pass_field();
                    Ok(Step::Continue)
                } else {
                    frame.active = Some(Active::Skip {
                        remaining: remaining - available,
                    });
                    Ok(Step::Suspend)
                }
            }
            Active::Presence { mut decoder, value } => match decoder.decode_any(src)? {
                DecodeOutcome::Done {
                    value: present,
                    consumed: used,
                } => {
                    *consumed += used;
                    let present = present.downcast::<bool>().map_err(|_| {
                        CodecError::new(
                            codes::CONFIG_FIELD_MISMATCH,
                            "presence step produced a non-bool value",
                        )
                    })?;
                    if *present {
                        start(graph, frame, value)
                    } else {
                        frame.complete_field(FieldValue::Absent);
                        Ok(Step::Continue)
                    }
                }
                DecodeOutcome::Incomplete => {
                    frame.active = Some(Active::Presence { decoder, value });
                    Ok(Step::Suspend)
                }
            },
        }
    }
}

/// 为 `node` 安排下一个活跃子步骤。
fn start<T>(graph: &Graph, frame: &mut Frame<T>, node: NodeId) -> Result<Step> {
    match graph.node(node) {
        Node::Leaf(factory) => {
            frame.active = Some(Active::Leaf(factory.instantiate()));
            Ok(Step::Continue)
        }
        Node::Nullable { presence, value } => match graph.node(*presence) {
            Node::Leaf(factory) => {
                frame.active = Some(Active::Presence {
                    decoder: factory.instantiate(),
                    value: *value,
                });
                Ok(Step::Continue)
            }
            _ => Err(CodecError::new(
                codes::CONFIG_INVALID_STEP,
                "presence node is not a leaf decoder",
            )),
        },
        Node::SelfList { count } => match graph.node(*count) {
            Node::Leaf(factory) => {
                frame.active = Some(Active::Count(factory.instantiate()));
                Ok(Step::Continue)
            }
            _ => Err(CodecError::new(
                codes::CONFIG_INVALID_STEP,
                "list count node is not a leaf decoder",
            )),
        },
        Node::Skip(len) => {
            frame.active = Some(Active::Skip { remaining: *len });
            Ok(Step::Continue)
        }
        Node::Composite(_) => {
            debug_assert_eq!(node, ROOT);
            Ok(Step::Descend)
        }
    }
}

impl<T: Send + 'static> Decoder for ComposedDecoder<T> {
    type Item = T;

    fn decode(&mut self, src: &mut dyn ByteSource) -> DecodeResult<T> {
        match self.drive(src) {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                debug!(
                    error.code = error.code(),
                    depth = self.frames.len(),
                    consumed = self.consumed,
                    "composed decode failed; state reset"
                );
                self.clear();
                Err(error)
            }
        }
    }

    fn reset(&mut self) {
        self.clear();
    }
}
