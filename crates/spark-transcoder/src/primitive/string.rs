use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{ByteOrder, FixedWidthDecoder, FixedWidthEncoder};
use crate::{
    CodecError, Result,
    buffer::{ByteSink, ByteSource},
    codec::{DecodeOutcome, DecodeResult, Decoder, Encoder},
    configuration::{StringFraming, StringSettings},
    error::codes,
};

/// 字符串载荷使用的字符集。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Charset {
    #[default]
    Utf8,
    Ascii,
    /// ISO-8859-1。
    Latin1,
    Utf16Be,
    Utf16Le,
}

impl Charset {
    /// 码元宽度：结束标记只在码元边界上识别。
    pub fn unit_width(self) -> usize {
        match self {
            Charset::Utf8 | Charset::Ascii | Charset::Latin1 => 1,
            Charset::Utf16Be | Charset::Utf16Le => 2,
        }
    }

    /// 默认结束标记：单字节字符集为 `[0]`，双字节字符集为 `[0, 0]`。
    pub fn default_terminator(self) -> &'static [u8] {
        match self.unit_width() {
            1 => &[0],
            _ => &[0, 0],
        }
    }

    /// 将文本编码为该字符集的字节序列；无法表示的字符为 `format.charset`。
    pub fn encode(self, text: &str) -> Result<Vec<u8>> {
        match self {
            Charset::Utf8 => Ok(text.as_bytes().to_vec()),
            Charset::Ascii => {
                if text.is_ascii() {
                    Ok(text.as_bytes().to_vec())
                } else {
                    Err(charset_error(self, "text contains non-ASCII characters"))
                }
            }
            Charset::Latin1 => text
                .chars()
                .map(|ch| u8::try_from(u32::from(ch)))
                .collect::<std::result::Result<Vec<u8>, _>>()
                .map_err(|_| charset_error(self, "text contains characters above U+00FF")),
            Charset::Utf16Be => Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
            Charset::Utf16Le => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
        }
    }

    /// 将字节序列解码为文本；非法序列为 `format.charset`。
    pub fn decode(self, bytes: Vec<u8>) -> Result<String> {
        match self {
            Charset::Utf8 => String::from_utf8(bytes)
                .map_err(|err| charset_error(self, "invalid UTF-8 sequence").with_cause(err)),
            Charset::Ascii => {
                if bytes.is_ascii() {
                    String::from_utf8(bytes)
                        .map_err(|err| charset_error(self, "invalid ASCII").with_cause(err))
                } else {
                    Err(charset_error(self, "byte above 0x7F in ASCII payload"))
                }
            }
            Charset::Latin1 => Ok(bytes.into_iter().map(char::from).collect()),
            Charset::Utf16Be | Charset::Utf16Le => {
                if bytes.len() % 2 != 0 {
                    return Err(charset_error(self, "odd number of bytes in UTF-16 payload"));
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| match self {
                        Charset::Utf16Le => u16::from_le_bytes([pair[0], pair[1]]),
                        _ => u16::from_be_bytes([pair[0], pair[1]]),
                    })
                    .collect();
                String::from_utf16(&units)
                    .map_err(|err| charset_error(self, "unpaired UTF-16 surrogate").with_cause(err))
            }
        }
    }
}

fn charset_error(charset: Charset, detail: &str) -> CodecError {
    CodecError::new(codes::FORMAT_CHARSET, format!("{charset:?}: {detail}"))
}

/// `payload` 是否以位于码元边界的 `terminator` 结尾。
fn ends_with_terminator(payload: &[u8], terminator: &[u8], unit: usize) -> bool {
    payload.len() >= terminator.len()
        && (payload.len() - terminator.len()) % unit == 0
        && payload.ends_with(terminator)
}

#[derive(Clone, Debug)]
enum Framing {
    Terminated { terminator: Vec<u8> },
    LengthPrefixed { prefix: FixedWidthDecoder<i32> },
}

/// 扫描一个分片后的结论。
enum Scan {
    More,
    Terminated,
    Overflow,
}

/// 字符串解码器。
///
/// # 教案式说明
/// - **意图 (Why)**：字符串是唯一长度可变的原语，必须同时防住“永不终止”的恶意输入。
/// - **契约 (What)**：
///   - 结束标记模式：逐字节吸收直到在码元边界上遇到结束标记；载荷超过 `max_length`
///     仍未终止时返回 `format.unterminated`，不再继续缓冲；
///   - 长度前缀模式：先解码 32 位有符号字节数，负数或超过 `max_length` 为
///     `format.invalid_length`，随后读取恰好该数量的载荷字节；
///   - `consumed` 包含结束标记或长度前缀本身。
/// - **执行逻辑 (How)**：载荷累积在 `payload` 中，跨调用保留；任何 `Done`/`Err` 都清空状态。
#[derive(Clone, Debug)]
pub struct StringDecoder {
    charset: Charset,
    max_length: usize,
    framing: Framing,
    payload: Vec<u8>,
    expected: Option<usize>,
    prefix_len: usize,
}

impl StringDecoder {
    /// 依据设置构造；非法设置（空结束标记等）为配置错误。
    pub fn new(order: ByteOrder, settings: &StringSettings) -> Result<Self> {
        settings.validate()?;
        let framing = match &settings.framing {
            StringFraming::LengthPrefixed => Framing::LengthPrefixed {
                prefix: FixedWidthDecoder::new(order),
            },
            StringFraming::Terminated { .. } => Framing::Terminated {
                terminator: settings.terminator().to_vec(),
            },
        };
        Ok(Self {
            charset: settings.charset,
            max_length: settings.max_length,
            framing,
            payload: Vec::new(),
            expected: None,
            prefix_len: 0,
        })
    }

    fn finish(&mut self, consumed: usize) -> DecodeResult<String> {
        let payload = std::mem::take(&mut self.payload);
        self.expected = None;
        self.prefix_len = 0;
        let text = self.charset.decode(payload)?;
        Ok(DecodeOutcome::done(text, consumed))
    }
}

impl Decoder for StringDecoder {
    type Item = String;

    fn decode(&mut self, src: &mut dyn ByteSource) -> DecodeResult<String> {
        match &mut self.framing {
            Framing::Terminated { terminator } => {
                let unit = self.charset.unit_width();
                let limit = self.max_length.saturating_add(terminator.len() - 1);
                loop {
                    let chunk = src.chunk();
                    if chunk.is_empty() {
                        trace!(buffered = self.payload.len(), "terminated string incomplete");
                        return Ok(DecodeOutcome::Incomplete);
                    }
                    let mut taken = 0;
                    let mut scan = Scan::More;
                    for &byte in chunk {
                        taken += 1;
                        self.payload.push(byte);
                        if ends_with_terminator(&self.payload, terminator, unit) {
                            scan = Scan::Terminated;
                            break;
                        }
                        if self.payload.len() > limit {
                            scan = Scan::Overflow;
                            break;
                        }
                    }
                    src.advance(taken)?;
                    match scan {
                        Scan::More => continue,
                        Scan::Terminated => {
                            let consumed = self.payload.len();
                            self.payload.truncate(consumed - terminator.len());
                            return self.finish(consumed);
                        }
                        Scan::Overflow => {
                            debug!(
                                max_length = self.max_length,
                                "terminated string exceeded its maximum length"
                            );
                            self.payload.clear();
                            return Err(CodecError::new(
                                codes::FORMAT_UNTERMINATED,
                                format!(
                                    "string did not terminate within {} bytes",
                                    self.max_length
                                ),
                            ));
                        }
                    }
                }
            }
            Framing::LengthPrefixed { prefix } => {
                let expected = match self.expected {
                    Some(expected) => expected,
                    None => match prefix.decode(src)? {
                        DecodeOutcome::Done { value, consumed } => {
                            let expected = usize::try_from(value)
                                .ok()
                                .filter(|len| *len <= self.max_length)
                                .ok_or_else(|| {
                                    debug!(length = value, "string length prefix rejected");
                                    CodecError::new(
                                        codes::FORMAT_INVALID_LENGTH,
                                        format!(
                                            "string length {value} outside 0..={}",
                                            self.max_length
                                        ),
                                    )
                                })?;
                            self.prefix_len = consumed;
                            *self.expected.insert(expected)
                        }
                        DecodeOutcome::Incomplete => return Ok(DecodeOutcome::Incomplete),
                    },
                };
                let start = self.payload.len();
                self.payload.resize(expected, 0);
                let read = src.read_available(&mut self.payload[start..]);
                self.payload.truncate(start + read);
                if self.payload.len() < expected {
                    trace!(
                        buffered = self.payload.len(),
                        expected, "length-prefixed string incomplete"
                    );
                    return Ok(DecodeOutcome::Incomplete);
                }
                let consumed = self.prefix_len + expected;
                self.finish(consumed)
            }
        }
    }

    fn reset(&mut self) {
        if let Framing::LengthPrefixed { prefix } = &mut self.framing {
            prefix.reset();
        }
        self.payload.clear();
        self.expected = None;
        self.prefix_len = 0;
    }
}

/// 字符串编码器，与同一设置构造的 [`StringDecoder`] 互为逆操作。
#[derive(Clone, Debug)]
pub struct StringEncoder {
    charset: Charset,
    max_length: usize,
    terminator: Option<Vec<u8>>,
    prefix: FixedWidthEncoder<i32>,
}

impl StringEncoder {
    pub fn new(order: ByteOrder, settings: &StringSettings) -> Result<Self> {
        settings.validate()?;
        let terminator = match settings.framing {
            StringFraming::LengthPrefixed => None,
            StringFraming::Terminated { .. } => Some(settings.terminator().to_vec()),
        };
        Ok(Self {
            charset: settings.charset,
            max_length: settings.max_length,
            terminator,
            prefix: FixedWidthEncoder::new(order),
        })
    }
}

impl Encoder<str> for StringEncoder {
    fn encode(&self, value: &str, sink: &mut dyn ByteSink) -> Result<()> {
        let bytes = self.charset.encode(value)?;
        if bytes.len() > self.max_length {
            return Err(CodecError::new(
                codes::FORMAT_INVALID_LENGTH,
                format!(
                    "encoded string is {} bytes, maximum is {}",
                    bytes.len(),
                    self.max_length
                ),
            ));
        }
        match &self.terminator {
            Some(terminator) => {
                let unit = self.charset.unit_width();
                let embedded = (0..bytes.len())
                    .step_by(unit)
                    .any(|offset| bytes[offset..].starts_with(terminator));
                if embedded {
                    return Err(CodecError::new(
                        codes::FORMAT_EMBEDDED_TERMINATOR,
                        "string payload contains its own end marker",
                    ));
                }
                sink.write_all(&bytes)?;
                sink.write_all(terminator)
            }
            None => {
                let len = i32::try_from(bytes.len()).map_err(|_| {
                    CodecError::new(
                        codes::FORMAT_INVALID_LENGTH,
                        "string does not fit a 32-bit length prefix",
                    )
                })?;
                self.prefix.encode(&len, sink)?;
                sink.write_all(&bytes)
            }
        }
    }
}

impl Encoder<String> for StringEncoder {
    fn encode(&self, value: &String, sink: &mut dyn ByteSink) -> Result<()> {
        Encoder::<str>::encode(self, value, sink)
    }
}
