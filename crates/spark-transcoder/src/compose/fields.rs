use std::any::type_name;

use super::erased::AnyValue;
use crate::{CodecError, Result, error::codes};

pub(crate) enum FieldValue {
    Present(AnyValue),
    /// 可空字段的存在标记为假。
    Absent,
}

/// 一次组合解码产出的字段值，按声明顺序逐个取出。
///
/// 终结映射函数必须以与声明相同的顺序和类型取值；类型不符或越界以
/// `config.field_mismatch` 失败，表明组合声明与映射函数不一致。
/// `skip(len)` 步骤不产出字段，不占用这里的顺序位置。
pub struct Fields {
    values: std::vec::IntoIter<FieldValue>,
    index: usize,
}

impl Fields {
    pub(crate) fn new(values: Vec<FieldValue>) -> Self {
        Self {
            values: values.into_iter(),
            index: 0,
        }
    }

    /// 取出下一个必需字段。
    pub fn next<U: 'static>(&mut self) -> Result<U> {
        let index = self.index;
        match self.take::<U>()? {
            FieldValue::Present(value) => downcast(value, index),
            FieldValue::Absent => Err(mismatch(format!(
                "field {index} is absent but was read as required {}",
                type_name::<U>()
            ))),
        }
    }

    /// 取出下一个可空字段。
    pub fn next_optional<U: 'static>(&mut self) -> Result<Option<U>> {
        let index = self.index;
        match self.take::<U>()? {
            FieldValue::Present(value) => downcast(value, index).map(Some),
            FieldValue::Absent => Ok(None),
        }
    }

    /// 丢弃下一个字段，常用于保留字段或对齐填充。
    pub fn skip(&mut self) -> Result<()> {
        self.take::<()>().map(drop)
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }

    fn take<U>(&mut self) -> Result<FieldValue> {
        let value = self.values.next().ok_or_else(|| {
            mismatch(format!(
                "field {} of type {} was requested but only {} fields were declared",
                self.index,
                type_name::<U>(),
                self.index
            ))
        })?;
        self.index += 1;
        Ok(value)
    }
}

fn downcast<U: 'static>(value: AnyValue, index: usize) -> Result<U> {
    value.downcast::<U>().map(|value| *value).map_err(|_| {
        mismatch(format!(
            "field {index} was read as {} which does not match its declared step",
            type_name::<U>()
        ))
    })
}

fn mismatch(message: String) -> CodecError {
    CodecError::new(codes::CONFIG_FIELD_MISMATCH, message)
}
