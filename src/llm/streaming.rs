use super::sse::{Line, LineBuffer, classify_line};
use super::types::{Annotation, FunctionCall, ToolCall, Usage};
use super::wire::{StreamEvent, ToolCallFragment, pick_reasoning};
use crate::error::{AiError, CODE_NETWORK};
use futures_util::{Stream, StreamExt};
use std::collections::BTreeMap;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};

pub const FINISH_TOOL_CALLS: &str = "tool_calls";
pub const FINISH_ERROR: &str = "error";

/// One unit of an incrementally streamed completion.
///
/// Text, reasoning and annotations cover this event only; `tool_calls` is
/// filled solely on the event that closes a tool-call sequence.
#[derive(Debug, Default)]
pub struct Chunk {
    pub text: String,
    pub reasoning: String,
    pub usage: Option<Usage>,
    pub tool_calls: Vec<ToolCall>,
    pub annotations: Vec<Annotation>,
    pub finish_reason: Option<String>,
    pub error: Option<AiError>,
}

impl Chunk {
    pub fn is_terminal(&self) -> bool {
        self.finish_reason.is_some() || self.error.is_some()
    }
}

/// In-progress tool calls keyed by slot index.
#[derive(Debug, Default)]
pub struct ToolCallAggregator {
    slots: BTreeMap<u32, ToolCall>,
}

impl ToolCallAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one fragment into its slot.
    ///
    /// Identity fields are overwritten only by non-empty values; argument
    /// text is always appended in arrival order.
    pub fn merge(&mut self, fragment: &ToolCallFragment) {
        let name = fragment.function.as_ref().and_then(|f| f.name.as_deref());
        let arguments = fragment
            .function
            .as_ref()
            .and_then(|f| f.arguments.as_deref())
            .unwrap_or_default();

        let Some(call) = self.slots.get_mut(&fragment.index) else {
            self.slots.insert(
                fragment.index,
                ToolCall {
                    id: fragment.id.clone().unwrap_or_default(),
                    kind: fragment.kind.clone().unwrap_or_default(),
                    function: FunctionCall {
                        name: name.unwrap_or_default().to_string(),
                        arguments: arguments.to_string(),
                    },
                },
            );
            return;
        };

        overwrite_if_present(&mut call.id, fragment.id.as_deref());
        overwrite_if_present(&mut call.kind, fragment.kind.as_deref());
        overwrite_if_present(&mut call.function.name, name);
        call.function.arguments.push_str(arguments);
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Hand out every accumulated call and start fresh.
    pub fn finish(&mut self) -> Vec<ToolCall> {
        std::mem::take(&mut self.slots).into_values().collect()
    }
}

fn overwrite_if_present(field: &mut String, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        value.clone_into(field);
    }
}

/// Outcome of feeding one body line to the decoder.
#[derive(Debug)]
pub enum Decoded {
    Skip,
    Chunk(Chunk),
    Done,
}

/// Turns event-stream lines into [`Chunk`]s, carrying tool-call state
/// across events.
#[derive(Debug)]
pub struct ChunkDecoder {
    provider: String,
    model: String,
    tool_calls: ToolCallAggregator,
}

impl ChunkDecoder {
    pub fn new(provider: &str, model: &str) -> Self {
        Self {
            provider: provider.to_string(),
            model: model.to_string(),
            tool_calls: ToolCallAggregator::new(),
        }
    }

    pub fn pending_tool_calls(&self) -> usize {
        self.tool_calls.len()
    }

    /// Malformed payloads are logged and skipped; they never end the stream.
    pub fn decode_line(&mut self, line: &str) -> Decoded {
        match classify_line(line) {
            Line::Ignored => Decoded::Skip,
            Line::Done => Decoded::Done,
            Line::Data(payload) => match serde_json::from_str::<StreamEvent>(payload) {
                Ok(event) => Decoded::Chunk(self.decode_event(event)),
                Err(err) => {
                    tracing::warn!(
                        provider = %self.provider,
                        model = %self.model,
                        "Skipping malformed stream event: {err}"
                    );
                    Decoded::Skip
                }
            },
        }
    }

    pub fn decode_event(&mut self, event: StreamEvent) -> Chunk {
        let mut chunk = Chunk {
            usage: event.usage,
            ..Chunk::default()
        };

        for choice in event.choices {
            let delta = choice.delta;
            if let Some(text) = delta.content {
                chunk.text.push_str(&text);
            }
            chunk.reasoning.push_str(&pick_reasoning(
                delta.reasoning.as_deref(),
                delta.reasoning_content.as_deref(),
            ));
            if let Some(annotations) = delta.annotations {
                chunk.annotations.extend(annotations);
            }
            for fragment in delta.tool_calls.iter().flatten() {
                self.tool_calls.merge(fragment);
            }

            match choice.finish_reason.as_deref() {
                Some(FINISH_TOOL_CALLS) => {
                    chunk.tool_calls = self.tool_calls.finish();
                }
                Some(FINISH_ERROR) => {
                    chunk.error = Some(self.in_stream_error(event.error.as_ref()));
                }
                _ => {}
            }
            if choice.finish_reason.is_some() {
                chunk.finish_reason = choice.finish_reason;
            }
        }

        if chunk.error.is_none()
            && let Some(error) = &event.error
        {
            chunk.error = Some(self.in_stream_error(Some(error)));
        }

        chunk
    }

    fn in_stream_error(&self, body: Option<&super::wire::ApiErrorBody>) -> AiError {
        let Some(body) = body else {
            return AiError::new(
                &self.provider,
                &self.model,
                FINISH_ERROR,
                "stream finished with an error",
            );
        };
        let mut error = AiError::new(
            &self.provider,
            &self.model,
            body.code_string(),
            body.message.clone(),
        );
        if let Some(status) = body.status_hint() {
            error = error.with_status(status);
        }
        error
    }
}

/// Consumer side of a streamed completion.
///
/// Chunks arrive in the order their events were parsed. Dropping the stream
/// (or calling [`cancel`](Self::cancel)) tells the producer to stop and close
/// the response body.
pub struct ChunkStream {
    inner: UnboundedReceiverStream<Chunk>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl ChunkStream {
    pub(crate) fn channel() -> (mpsc::UnboundedSender<Chunk>, CancellationToken, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let stream = Self {
            inner: UnboundedReceiverStream::new(rx),
            _guard: cancel.clone().drop_guard(),
            cancel: cancel.clone(),
        };
        (tx, cancel, stream)
    }

    /// A stream over already-decoded chunks.
    pub fn from_chunks(chunks: Vec<Chunk>) -> Self {
        let (tx, _cancel, stream) = Self::channel();
        for chunk in chunks {
            let _ = tx.send(chunk);
        }
        stream
    }

    pub async fn recv(&mut self) -> Option<Chunk> {
        self.inner.next().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Drain the stream, concatenating text and collecting tool calls.
    pub async fn collect_text(mut self) -> Result<(String, Vec<ToolCall>), AiError> {
        let mut text = String::new();
        let mut tool_calls = Vec::new();
        while let Some(chunk) = self.recv().await {
            if let Some(error) = chunk.error {
                return Err(error);
            }
            text.push_str(&chunk.text);
            tool_calls.extend(chunk.tool_calls);
        }
        Ok((text, tool_calls))
    }
}

impl std::fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStream")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Stream for ChunkStream {
    type Item = Chunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// Spawn the decode-and-forward task for a streamed response.
///
/// The body is dropped, closing the connection, on every exit path: the
/// sentinel line, end of body, a read error, or the consumer going away.
pub fn spawn_chunk_producer(response: reqwest::Response, decoder: ChunkDecoder) -> ChunkStream {
    let (tx, cancel, stream) = ChunkStream::channel();
    let body = response.bytes_stream();
    tokio::spawn(produce_chunks(body, decoder, tx, cancel));
    stream
}

async fn produce_chunks<S, B, E>(
    body: S,
    mut decoder: ChunkDecoder,
    tx: mpsc::UnboundedSender<Chunk>,
    cancel: CancellationToken,
) where
    S: Stream<Item = Result<B, E>> + Send,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut body = std::pin::pin!(body);
    let mut lines = LineBuffer::new();

    'read: loop {
        let next = tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!(provider = %decoder.provider, "Stream consumer went away, closing body");
                break 'read;
            }
            next = body.next() => next,
        };

        match next {
            Some(Ok(bytes)) => {
                lines.push_chunk(bytes.as_ref());
                while let Some(line) = lines.next_line() {
                    if !forward(&mut decoder, &line, &tx) {
                        break 'read;
                    }
                }
            }
            Some(Err(err)) => {
                tracing::warn!(provider = %decoder.provider, "Stream read failed: {err}");
                let error = AiError::new(
                    &decoder.provider,
                    &decoder.model,
                    CODE_NETWORK,
                    format!("stream read failed: {err}"),
                )
                .with_source(err);
                let _ = tx.send(Chunk {
                    error: Some(error),
                    ..Chunk::default()
                });
                break 'read;
            }
            None => {
                if let Some(line) = lines.take_remainder() {
                    forward(&mut decoder, &line, &tx);
                }
                break 'read;
            }
        }
    }

    if decoder.pending_tool_calls() > 0 {
        tracing::warn!(
            provider = %decoder.provider,
            pending = decoder.pending_tool_calls(),
            "Stream ended with unfinished tool calls"
        );
    }
}

/// Decode one line and push its chunk. `false` means stop reading.
fn forward(decoder: &mut ChunkDecoder, line: &str, tx: &mpsc::UnboundedSender<Chunk>) -> bool {
    match decoder.decode_line(line) {
        Decoded::Skip => true,
        Decoded::Done => false,
        Decoded::Chunk(chunk) => tx.send(chunk).is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::wire::FunctionFragment;

    fn fragment(index: u32, id: &str, kind: &str, name: &str, args: &str) -> ToolCallFragment {
        let some = |value: &str| (!value.is_empty()).then(|| value.to_string());
        ToolCallFragment {
            index,
            id: some(id),
            kind: some(kind),
            function: Some(FunctionFragment {
                name: some(name),
                arguments: some(args),
            }),
        }
    }

    #[test]
    fn fragments_reassemble_arguments_and_late_identity() {
        let mut aggregator = ToolCallAggregator::new();
        aggregator.merge(&fragment(0, "", "", "", "{\"a\""));
        aggregator.merge(&fragment(0, "", "", "", ":1}"));
        aggregator.merge(&fragment(0, "call_1", "function", "f", ""));

        let calls = aggregator.finish();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.arguments, "{\"a\":1}");
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].kind, "function");
        assert_eq!(calls[0].function.name, "f");
        assert!(aggregator.is_empty());
    }

    #[test]
    fn empty_identity_never_overwrites_and_last_non_empty_wins() {
        let mut aggregator = ToolCallAggregator::new();
        aggregator.merge(&fragment(0, "call_a", "function", "first", ""));
        aggregator.merge(&fragment(0, "", "", "", "{}"));
        aggregator.merge(&fragment(0, "call_b", "", "", ""));

        let calls = aggregator.finish();
        assert_eq!(calls[0].id, "call_b");
        assert_eq!(calls[0].function.name, "first");
        assert_eq!(calls[0].function.arguments, "{}");
    }

    #[test]
    fn slots_are_independent() {
        let mut aggregator = ToolCallAggregator::new();
        aggregator.merge(&fragment(1, "call_2", "function", "g", "{\"b\":"));
        aggregator.merge(&fragment(0, "call_1", "function", "f", "{}"));
        aggregator.merge(&fragment(1, "", "", "", "2}"));

        let calls = aggregator.finish();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[1].function.arguments, "{\"b\":2}");
    }

    #[test]
    fn finish_reason_tool_calls_flushes_slots() {
        let mut decoder = ChunkDecoder::new("openrouter", "gpt-x");
        let first = r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"weather","arguments":"{\"city\""}}]}}]}"#;
        let second = r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":":\"Oslo\"}"}}]},"finish_reason":"tool_calls"}]}"#;

        let Decoded::Chunk(chunk) = decoder.decode_line(first) else {
            panic!("expected chunk");
        };
        assert!(chunk.tool_calls.is_empty());
        assert_eq!(decoder.pending_tool_calls(), 1);

        let Decoded::Chunk(chunk) = decoder.decode_line(second) else {
            panic!("expected chunk");
        };
        assert_eq!(chunk.tool_calls.len(), 1);
        assert_eq!(
            chunk.tool_calls[0].arguments_json().unwrap(),
            serde_json::json!({"city": "Oslo"})
        );
        assert_eq!(chunk.finish_reason.as_deref(), Some("tool_calls"));
        assert_eq!(decoder.pending_tool_calls(), 0);
    }

    #[test]
    fn text_reasoning_and_usage_stay_per_event() {
        let mut decoder = ChunkDecoder::new("openai", "gpt-x");
        let Decoded::Chunk(chunk) = decoder.decode_line(
            r#"data: {"choices":[{"delta":{"content":"Hel","reasoning_content":"hmm"}}],"usage":{"prompt_tokens":3,"completion_tokens":1,"total_tokens":4}}"#,
        ) else {
            panic!("expected chunk");
        };
        assert_eq!(chunk.text, "Hel");
        assert_eq!(chunk.reasoning, "hmm");
        assert_eq!(chunk.usage.as_ref().map(|u| u.total_tokens), Some(4));
        assert!(!chunk.is_terminal());
    }

    #[test]
    fn error_finish_attaches_terminal_error() {
        let mut decoder = ChunkDecoder::new("openrouter", "gpt-x");
        let Decoded::Chunk(chunk) = decoder.decode_line(
            r#"data: {"error":{"code":502,"message":"Provider disconnected"},"choices":[{"delta":{"content":""},"finish_reason":"error"}]}"#,
        ) else {
            panic!("expected chunk");
        };
        let error = chunk.error.as_ref().expect("terminal error");
        assert_eq!(error.message, "Provider disconnected");
        assert_eq!(error.status, 502);
        assert!(error.is_retryable());
        assert!(chunk.is_terminal());
    }

    #[test]
    fn malformed_and_noise_lines_are_skipped() {
        let mut decoder = ChunkDecoder::new("local", "mini");
        assert!(matches!(decoder.decode_line("data: {not json"), Decoded::Skip));
        assert!(matches!(decoder.decode_line(": keep-alive"), Decoded::Skip));
        assert!(matches!(decoder.decode_line("data: [DONE]"), Decoded::Done));
    }

    #[tokio::test]
    async fn producer_stops_at_sentinel_and_skips_bad_lines() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n",
            "data: {oops\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
        );
        let parts: Vec<Result<Vec<u8>, std::io::Error>> = body
            .as_bytes()
            .chunks(7)
            .map(|part| Ok(part.to_vec()))
            .collect();

        let (tx, cancel, mut stream) = ChunkStream::channel();
        produce_chunks(
            futures_util::stream::iter(parts),
            ChunkDecoder::new("local", "mini"),
            tx,
            cancel,
        )
        .await;

        let mut texts = Vec::new();
        while let Some(chunk) = stream.recv().await {
            texts.push(chunk.text);
        }
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn read_error_is_delivered_then_stream_closes() {
        let parts: Vec<Result<Vec<u8>, std::io::Error>> = vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n".to_vec()),
            Err(std::io::Error::other("connection reset")),
        ];
        let (tx, cancel, mut stream) = ChunkStream::channel();
        produce_chunks(
            futures_util::stream::iter(parts),
            ChunkDecoder::new("local", "mini"),
            tx,
            cancel,
        )
        .await;

        assert_eq!(stream.recv().await.unwrap().text, "a");
        let failed = stream.recv().await.unwrap();
        assert!(failed.error.unwrap().is_retryable());
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn cancelled_stream_stops_producer() {
        let (tx, cancel, stream) = ChunkStream::channel();
        stream.cancel();
        produce_chunks(
            futures_util::stream::pending::<Result<Vec<u8>, std::io::Error>>(),
            ChunkDecoder::new("local", "mini"),
            tx,
            cancel.clone(),
        )
        .await;
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn dropping_the_consumer_cancels() {
        let (_tx, cancel, stream) = ChunkStream::channel();
        assert!(!cancel.is_cancelled());
        drop(stream);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn collect_text_surfaces_errors() {
        let stream = ChunkStream::from_chunks(vec![
            Chunk {
                text: "par".into(),
                ..Chunk::default()
            },
            Chunk {
                error: Some(AiError::new("local", "mini", "boom", "failed")),
                ..Chunk::default()
            },
        ]);
        assert_eq!(stream.collect_text().await.unwrap_err().code, "boom");

        let ok = ChunkStream::from_chunks(vec![Chunk {
            text: "done".into(),
            ..Chunk::default()
        }]);
        assert_eq!(ok.collect_text().await.unwrap().0, "done");
    }
}
