//! 编解码设置。
//!
//! # 模块定位（Why）
//! - 字节序、字符串分帧与递归深度都在构建期固定，编码端与解码端必须使用同一份设置，
//!   否则线格式无法互通；
//! - 设置支持 serde，可直接从 TOML/JSON 片段加载，缺省字段回落到默认值。
//!
//! # 契约（What）
//! - [`CodecSettings::validate`] 在任何编解码器构建前调用，非法组合以
//!   `config.invalid_settings` 拒绝；
//! - 默认值：大端序、UTF-8、32 位有符号长度前缀、载荷上限 1 MiB、自引用深度上限 512。

use serde::{Deserialize, Serialize};

use crate::{
    CodecError, Result,
    error::codes,
    primitive::{ByteOrder, Charset},
};

/// 字符串载荷的默认字节上限。
pub const DEFAULT_MAX_STRING_LENGTH: usize = 1 << 20;

/// 自引用嵌套的默认深度上限。
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// 整个编解码族共享的设置。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecSettings {
    pub byte_order: ByteOrder,
    pub string: StringSettings,
    /// 组合编解码器允许的自引用嵌套层数。
    pub max_depth: usize,
}

impl Default for CodecSettings {
    fn default() -> Self {
        Self {
            byte_order: ByteOrder::default(),
            string: StringSettings::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl CodecSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub fn with_string(mut self, string: StringSettings) -> Self {
        self.string = string;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(invalid("max_depth must be at least 1"));
        }
        self.string.validate()
    }
}

/// 字符串的分帧方式。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StringFraming {
    /// 32 位有符号字节数前缀，随后是载荷。
    #[default]
    LengthPrefixed,
    /// 载荷后跟结束标记；`None` 使用字符集的默认标记。
    Terminated {
        #[serde(default)]
        terminator: Option<Vec<u8>>,
    },
}

/// 字符串编解码设置。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StringSettings {
    pub charset: Charset,
    pub framing: StringFraming,
    /// 载荷（不含结束标记或长度前缀）的字节上限。
    pub max_length: usize,
}

impl Default for StringSettings {
    fn default() -> Self {
        Self {
            charset: Charset::default(),
            framing: StringFraming::default(),
            max_length: DEFAULT_MAX_STRING_LENGTH,
        }
    }
}

impl StringSettings {
    /// 以字符集默认结束标记分帧。
    pub fn terminated(charset: Charset) -> Self {
        Self {
            charset,
            framing: StringFraming::Terminated { terminator: None },
            ..Self::default()
        }
    }

    /// 以 32 位长度前缀分帧。
    pub fn length_prefixed(charset: Charset) -> Self {
        Self {
            charset,
            framing: StringFraming::LengthPrefixed,
            ..Self::default()
        }
    }

    pub fn with_terminator(mut self, terminator: impl Into<Vec<u8>>) -> Self {
        self.framing = StringFraming::Terminated {
            terminator: Some(terminator.into()),
        };
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// 实际生效的结束标记；长度前缀模式下也返回字符集默认值。
    pub fn terminator(&self) -> &[u8] {
        match &self.framing {
            StringFraming::Terminated {
                terminator: Some(terminator),
            } => terminator,
            _ => self.charset.default_terminator(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_length == 0 {
            return Err(invalid("string max_length must be at least 1"));
        }
        if let StringFraming::Terminated {
            terminator: Some(terminator),
        } = &self.framing
        {
            if terminator.is_empty() {
                return Err(CodecError::new(
                    codes::CONFIG_ZERO_WIDTH,
                    "string end marker must not be empty",
                ));
            }
            if terminator.len() % self.charset.unit_width() != 0 {
                return Err(invalid(format!(
                    "end marker of {} bytes is not aligned to {:?} code units",
                    terminator.len(),
                    self.charset
                )));
            }
        }
        Ok(())
    }
}

fn invalid(message: impl Into<std::borrow::Cow<'static, str>>) -> CodecError {
    CodecError::new(codes::CONFIG_INVALID_SETTINGS, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let settings: CodecSettings = toml::from_str(
            r#"
            byte_order = "little_endian"

            [string]
            charset = "utf16_le"
            framing = { mode = "terminated" }
            "#,
        )
        .expect("解析部分配置");
        assert_eq!(settings.byte_order, ByteOrder::LittleEndian);
        assert_eq!(settings.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(settings.string.max_length, DEFAULT_MAX_STRING_LENGTH);
        assert_eq!(settings.string.terminator(), &[0, 0]);
        settings.validate().expect("默认补全后的配置合法");
    }

    #[test]
    fn settings_survive_toml_round_trip() {
        let settings = CodecSettings::new()
            .with_byte_order(ByteOrder::LittleEndian)
            .with_max_depth(8)
            .with_string(StringSettings::terminated(Charset::Latin1).with_terminator([0xff]));
        let text = toml::to_string(&settings).expect("序列化");
        let back: CodecSettings = toml::from_str(&text).expect("反序列化");
        assert_eq!(back, settings);
    }

    #[test]
    fn invalid_terminators_are_configuration_errors() {
        let empty = StringSettings::terminated(Charset::Utf8).with_terminator(Vec::new());
        assert_eq!(
            empty.validate().expect_err("空结束标记").code(),
            codes::CONFIG_ZERO_WIDTH
        );

        let misaligned = StringSettings::terminated(Charset::Utf16Be).with_terminator([0]);
        assert!(misaligned.validate().expect_err("未按码元对齐").is_configuration());

        let depth = CodecSettings::new().with_max_depth(0);
        assert_eq!(
            depth.validate().expect_err("零深度").code(),
            codes::CONFIG_INVALID_SETTINGS
        );
    }
}
