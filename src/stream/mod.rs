//! NDJSON 编解码：每行一个JSON事件，以 `\n` 分隔

use crate::research::ResearchEvent;

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// 将事件编码为一行（含结尾换行符）
pub fn encode_line(event: &ResearchEvent) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(event)?;
    line.push('\n');
    Ok(line)
}

/// 增量解码器
///
/// 输入可以在任意字节处切分（包括多字节字符内部）。每个非空行独立解析，
/// 某一行解析失败不影响后续行。
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_line(line: &[u8]) -> Option<Result<ResearchEvent, serde_json::Error>> {
        let text = String::from_utf8_lossy(line);
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(serde_json::from_str(text))
    }

    /// 追加一段数据，返回其中完整的行
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<ResearchEvent, serde_json::Error>> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(position) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=position).collect();
            if let Some(event) = Self::parse_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// 处理流结束时缓冲区中剩余的最后一行
    pub fn finish(&mut self) -> Option<Result<ResearchEvent, serde_json::Error>> {
        let rest = std::mem::take(&mut self.buffer);
        Self::parse_line(&rest)
    }
}

/// 解码完整的响应体
pub fn decode_all(body: &[u8]) -> Vec<Result<ResearchEvent, serde_json::Error>> {
    let mut decoder = NdjsonDecoder::new();
    let mut events = decoder.push(body);
    events.extend(decoder.finish());
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_line_ends_with_newline() {
        let line = encode_line(&ResearchEvent::Done).unwrap();
        assert_eq!(line, "{\"type\":\"done\"}\n");
    }

    #[test]
    fn test_decoder_handles_split_chunks() {
        let body = format!(
            "{}{}",
            encode_line(&ResearchEvent::started()).unwrap(),
            encode_line(&ResearchEvent::error("発生")).unwrap()
        );
        let bytes = body.as_bytes();
        // 在多字节字符内部切分
        let split = body.find('発').unwrap() + 1;

        let mut decoder = NdjsonDecoder::new();
        let mut events = decoder.push(&bytes[..split]);
        assert_eq!(events.len(), 1);
        events.extend(decoder.push(&bytes[split..]));
        assert!(decoder.finish().is_none());

        let events: Vec<ResearchEvent> = events.into_iter().map(Result::unwrap).collect();
        assert_eq!(
            events,
            vec![ResearchEvent::started(), ResearchEvent::error("発生")]
        );
    }

    #[test]
    fn test_bad_line_does_not_abort_decoding() {
        let events = decode_all(b"{\"type\":\"status\",\"status\":\"started\"}\nnot json\n\n{\"type\":\"done\"}");
        assert_eq!(events.len(), 3);
        assert!(events[0].is_ok());
        assert!(events[1].is_err());
        assert_eq!(events[2].as_ref().unwrap(), &ResearchEvent::Done);
    }
}
