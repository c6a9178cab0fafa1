use std::collections::VecDeque;
use std::sync::Arc;

use futures::StreamExt as _;
use futures::stream::{self, BoxStream};
use tracing::{debug, error, info, warn};

use crate::agent::{AgentEventStream, AgentInput, ReasoningAgent};
use crate::chunk::Chunk;
use crate::config::PipelineConfig;
use crate::conversation::{ChatRequest, Message, build_conversation_prompt, validate_messages};
use crate::errors::StreamError;
use crate::event::RawAgentEvent;
use crate::filter::thinking_lines;
use crate::final_answer::{FinalAnswerHandler, Stage};
use crate::segment::{Phase, Segmenter};
use crate::tool_call::build_tool_call_chunk;
use crate::tracer::{LogTraceReporter, TraceContext, TraceReporter};

/// Chunks produced for one request, ending with the end-of-stream sentinel or
/// a single error.
pub type ChunkStream = BoxStream<'static, Result<Chunk, StreamError>>;

/// One request as seen by the driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RespondRequest {
    /// Prior turns, latest last.
    pub messages: Vec<Message>,
    pub trace_id: String,
    pub session_id: String,
}

impl RespondRequest {
    pub fn new(
        messages: Vec<Message>,
        trace_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            messages,
            trace_id: trace_id.into(),
            session_id: session_id.into(),
        }
    }

    /// Builds a request from a boundary chat payload and a fresh trace id.
    pub fn from_chat(chat: ChatRequest, trace_id: impl Into<String>) -> Self {
        Self::new(chat.chat_messages, trace_id, chat.session_id)
    }
}

/// Synchronous per-request state machine that classifies agent events into
/// chunks.
///
/// Owns the narration phase and the completion stage; both start fresh for
/// every request and are dropped with the pipeline.
#[derive(Debug)]
pub struct ChunkPipeline {
    trace_id: String,
    config: Arc<PipelineConfig>,
    segmenter: Segmenter,
    final_answer: FinalAnswerHandler,
}

impl ChunkPipeline {
    /// Starts a pipeline for one request, in the thinking phase.
    pub fn new(trace_id: impl Into<String>, config: Arc<PipelineConfig>) -> Self {
        Self {
            trace_id: trace_id.into(),
            config,
            segmenter: Segmenter::new(),
            final_answer: FinalAnswerHandler::default(),
        }
    }

    /// Trace id stamped on every chunk.
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Current narration phase.
    pub fn phase(&self) -> Phase {
        self.segmenter.phase()
    }

    /// Current completion stage.
    pub fn stage(&self) -> Stage {
        self.final_answer.stage()
    }

    /// Processes one agent event and returns the chunks it produces, in order.
    pub fn process(&mut self, event: &RawAgentEvent) -> Result<Vec<Chunk>, StreamError> {
        let trace_id = self.trace_id.as_str();
        let chunks = match event {
            RawAgentEvent::PhaseCompletion => self
                .final_answer
                .on_phase_completion(trace_id)
                .into_iter()
                .collect(),
            RawAgentEvent::FinalOutput { content } => self
                .final_answer
                .on_final_output(trace_id, content)
                .into_iter()
                .collect(),
            other if self.final_answer.is_past_thinking() => {
                self.final_answer.reject(trace_id, other);
                Vec::new()
            }
            RawAgentEvent::ToolCallResult {
                tool_name,
                tool_output,
            } => build_tool_call_chunk(tool_name, tool_output, trace_id, &self.config)?
                .into_iter()
                .collect(),
            RawAgentEvent::NarrationDelta { delta } => self
                .segmenter
                .segment(delta)
                .iter()
                .flat_map(|fragment| thinking_lines(fragment))
                .map(|line| Chunk::thinking(trace_id, line))
                .collect(),
            RawAgentEvent::Other => {
                debug!(trace_id, "ignoring unrecognised agent event");
                Vec::new()
            }
        };
        Ok(chunks)
    }

    /// The end-of-stream sentinel for this request.
    pub fn finish(&self) -> Chunk {
        if self.final_answer.stage() != Stage::Done {
            warn!(trace_id = %self.trace_id, stage = ?self.final_answer.stage(), "agent stream ended without a final answer");
        }
        Chunk::end_of_stream(self.trace_id.as_str())
    }
}

/// Top-level driver: runs the agent for a request and streams its chunks.
#[derive(Clone)]
pub struct StreamDriver {
    agent: Arc<dyn ReasoningAgent>,
    tracer: Arc<dyn TraceReporter>,
    config: Arc<PipelineConfig>,
}

impl StreamDriver {
    /// Starts a builder for registering collaborators.
    pub fn builder() -> StreamDriverBuilder {
        StreamDriverBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Validates the request, starts the agent and returns the chunk stream.
    ///
    /// The returned stream is pull-based: upstream events are awaited only
    /// when the consumer asks for the next chunk. Dropping it cancels the
    /// request and drops the agent's event stream.
    pub async fn respond(&self, request: RespondRequest) -> Result<ChunkStream, StreamError> {
        validate_messages(&request.messages)?;
        let RespondRequest {
            messages,
            trace_id,
            session_id,
        } = request;
        let prompt = build_conversation_prompt(&messages);
        info!(trace_id = %trace_id, session_id = %session_id, messages = messages.len(), "running agent");

        let ctx = TraceContext {
            trace_id: trace_id.clone(),
            session_id: session_id.clone(),
            input: prompt.clone(),
        };
        let timeout = self.config.trace_timeout;
        match tokio::time::timeout(timeout, self.tracer.report(&ctx)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(trace_id = %trace_id, error = %err, "trace report failed; continuing");
            }
            Err(_) => {
                warn!(
                    trace_id = %trace_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "trace report timed out; continuing"
                );
            }
        }

        let events = self
            .agent
            .run(AgentInput {
                prompt,
                trace_id: trace_id.clone(),
                session_id,
            })
            .await
            .map_err(|err| {
                error!(trace_id = %trace_id, error = %err, "agent failed to start");
                StreamError::Agent(err)
            })?;

        Ok(chunk_stream(
            ChunkPipeline::new(trace_id, self.config.clone()),
            events,
        ))
    }
}

/// Builder used to inject the agent, tracer and config into a `StreamDriver`.
#[derive(Default)]
pub struct StreamDriverBuilder {
    agent: Option<Arc<dyn ReasoningAgent>>,
    tracer: Option<Arc<dyn TraceReporter>>,
    config: Option<PipelineConfig>,
}

impl StreamDriverBuilder {
    /// Registers the reasoning agent. Required.
    pub fn agent(mut self, agent: Arc<dyn ReasoningAgent>) -> Self {
        self.agent = Some(agent);
        self
    }

    /// Registers the tracing collaborator. Defaults to `LogTraceReporter`.
    pub fn tracer(mut self, tracer: Arc<dyn TraceReporter>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    /// Sets the pipeline config. Defaults to `PipelineConfig::default()`.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the driver.
    ///
    /// Fails with `StreamError::Config` when no agent is registered or the
    /// HTML tool name is blank.
    pub fn build(self) -> Result<StreamDriver, StreamError> {
        let agent = self
            .agent
            .ok_or_else(|| StreamError::Config("no reasoning agent registered".into()))?;
        let config = self.config.unwrap_or_default();
        if config.html_tool.trim().is_empty() {
            return Err(StreamError::Config("html_tool must not be empty".into()));
        }
        Ok(StreamDriver {
            agent,
            tracer: self.tracer.unwrap_or_else(|| Arc::new(LogTraceReporter)),
            config: Arc::new(config),
        })
    }
}

/// Serializes every chunk as one NDJSON line, as soon as it is produced.
pub fn ndjson_lines(chunks: ChunkStream) -> BoxStream<'static, Result<String, StreamError>> {
    chunks
        .map(|chunk| chunk.and_then(|chunk| chunk.to_ndjson_line()))
        .boxed()
}

fn chunk_stream(pipeline: ChunkPipeline, events: AgentEventStream) -> ChunkStream {
    struct State {
        pipeline: ChunkPipeline,
        events: AgentEventStream,
        pending: VecDeque<Chunk>,
        exhausted: bool,
    }

    stream::try_unfold(
        State {
            pipeline,
            events,
            pending: VecDeque::new(),
            exhausted: false,
        },
        |mut state| async move {
            loop {
                if let Some(chunk) = state.pending.pop_front() {
                    return Ok(Some((chunk, state)));
                }
                if state.exhausted {
                    return Ok(None);
                }

                match state.events.next().await {
                    Some(Ok(event)) => {
                        let chunks = state.pipeline.process(&event)?;
                        state.pending.extend(chunks);
                    }
                    Some(Err(err)) => {
                        error!(trace_id = %state.pipeline.trace_id(), error = %err, "agent stream failed");
                        return Err(StreamError::Agent(err));
                    }
                    None => {
                        state.exhausted = true;
                        let sentinel = state.pipeline.finish();
                        state.pending.push_back(sentinel);
                    }
                }
            }
        },
    )
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ScriptedAgent;
    use crate::errors::{AgentError, TraceError};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    fn rendering(text: &str) -> String {
        format!(
            "meta=None content=[TextContent(type='text', text='{text}', annotations=None, meta=None)] isError=False"
        )
    }

    fn delta(text: &str) -> RawAgentEvent {
        RawAgentEvent::NarrationDelta { delta: text.into() }
    }

    fn tool(name: &str, output: &str) -> RawAgentEvent {
        RawAgentEvent::ToolCallResult {
            tool_name: name.into(),
            tool_output: output.into(),
        }
    }

    fn final_output(text: &str) -> RawAgentEvent {
        RawAgentEvent::FinalOutput {
            content: text.into(),
        }
    }

    fn driver_for(agent: impl ReasoningAgent + 'static) -> StreamDriver {
        StreamDriver::builder()
            .agent(Arc::new(agent))
            .build()
            .expect("driver")
    }

    fn request() -> RespondRequest {
        RespondRequest::new(vec![Message::user("What is 2+2?")], "trace-1", "session-1")
    }

    async fn collect(stream: ChunkStream) -> Vec<Result<Chunk, StreamError>> {
        stream.collect().await
    }

    async fn collect_ok(driver: &StreamDriver) -> Vec<Chunk> {
        let stream = driver.respond(request()).await.expect("respond");
        collect(stream)
            .await
            .into_iter()
            .map(|chunk| chunk.expect("chunk"))
            .collect()
    }

    struct OnceAgent {
        events: Mutex<Option<AgentEventStream>>,
    }

    #[async_trait::async_trait]
    impl ReasoningAgent for OnceAgent {
        async fn run(&self, _input: AgentInput) -> Result<AgentEventStream, AgentError> {
            self.events
                .lock()
                .expect("lock")
                .take()
                .ok_or_else(|| AgentError::start("already started"))
        }
    }

    struct FailingAgent;

    #[async_trait::async_trait]
    impl ReasoningAgent for FailingAgent {
        async fn run(&self, _input: AgentInput) -> Result<AgentEventStream, AgentError> {
            Err(AgentError::start("model unavailable"))
        }
    }

    struct RecordingTracer {
        calls: AtomicUsize,
        fail: bool,
        seen: Mutex<Vec<TraceContext>>,
    }

    #[async_trait::async_trait]
    impl TraceReporter for RecordingTracer {
        async fn report(&self, ctx: &TraceContext) -> Result<(), TraceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().expect("lock").push(ctx.clone());
            if self.fail {
                Err(TraceError("collector unreachable".into()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn full_run_emits_ordered_chunks_and_one_sentinel() {
        let driver = driver_for(ScriptedAgent::new(vec![
            delta("Thought: I need a map."),
            delta("\nAction: build_map\nAction Input: {\"city\": \"Oslo\"}"),
            tool(
                "build_map",
                &rendering(r#"{"input_arguments": {"city": "Oslo"}, "html_content": "<div/>"}"#),
            ),
            tool("delete_temp_dir", &rendering("{}")),
            delta("Thought: I can answer now."),
            delta(""),
            delta("Answer: here is the map"),
            RawAgentEvent::PhaseCompletion,
            final_output("Here is the map of Oslo."),
        ]));

        let chunks = collect_ok(&driver).await;
        assert_eq!(
            chunks,
            vec![
                Chunk::thinking("trace-1", "Thought: I need a map."),
                Chunk::thinking("trace-1", "\n"),
                Chunk::tool_call(
                    "trace-1",
                    "Calling build_map with arguments:\n   city: Oslo\n",
                    Some("<div/>".into())
                ),
                Chunk::thinking("trace-1", "Thought: I can answer now."),
                Chunk::thinking_finished("trace-1"),
                Chunk::final_answer("trace-1", "Here is the map of Oslo."),
                Chunk::end_of_stream("trace-1"),
            ]
        );
    }

    #[tokio::test]
    async fn sentinel_and_final_answer_appear_exactly_once() {
        let driver = driver_for(ScriptedAgent::new(vec![
            delta("Thought: 2+2"),
            RawAgentEvent::PhaseCompletion,
            final_output("4"),
            final_output("4 again"),
            delta("Thought: late"),
            tool("add", &rendering("{}")),
            RawAgentEvent::Other,
        ]));

        let chunks = collect_ok(&driver).await;
        assert_eq!(chunks.iter().filter(|c| c.is_end_of_stream()).count(), 1);
        assert!(chunks.last().expect("last").is_end_of_stream());
        assert_eq!(chunks.iter().filter(|c| c.is_final_answer).count(), 1);
        assert_eq!(chunks.len(), 4);
    }

    #[tokio::test]
    async fn empty_agent_stream_still_terminates() {
        let driver = driver_for(ScriptedAgent::new(vec![]));
        assert_eq!(
            collect_ok(&driver).await,
            vec![Chunk::end_of_stream("trace-1")]
        );
    }

    #[tokio::test]
    async fn upstream_failure_ends_stream_with_error_after_produced_chunks() {
        let driver = driver_for(ScriptedAgent::with_results(vec![
            Ok(delta("Thought: working")),
            Err(AgentError::stream("rate limited")),
            Ok(delta("Thought: never seen")),
        ]));

        let items = collect(driver.respond(request()).await.expect("respond")).await;
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0].as_ref().expect("chunk"),
            &Chunk::thinking("trace-1", "Thought: working")
        );
        assert!(matches!(
            &items[1],
            Err(StreamError::Agent(AgentError::Stream(msg))) if msg == "rate limited"
        ));
    }

    #[tokio::test]
    async fn structural_tool_failure_terminates_the_stream() {
        let driver = driver_for(ScriptedAgent::new(vec![
            tool("search", &rendering(r#"{"input_arguments": "oops"}"#)),
            delta("Thought: unreachable"),
        ]));
        let items = collect(driver.respond(request()).await.expect("respond")).await;
        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], Err(StreamError::ToolCall { tool, .. }) if tool == "search"));
    }

    #[tokio::test]
    async fn agent_start_failure_is_returned_from_respond() {
        let driver = driver_for(FailingAgent);
        let err = match driver.respond(request()).await {
            Ok(_) => panic!("start failure expected"),
            Err(err) => err,
        };
        assert!(matches!(err, StreamError::Agent(AgentError::Start(_))));
        assert!(err.to_string().starts_with("Error running agent:"));
    }

    #[tokio::test]
    async fn empty_chat_is_rejected_before_the_agent_runs() {
        let driver = driver_for(FailingAgent);
        let err = match driver
            .respond(RespondRequest::new(vec![], "t", "s"))
            .await
        {
            Ok(_) => panic!("validation failure expected"),
            Err(err) => err,
        };
        assert!(matches!(err, StreamError::Validation(_)));
    }

    #[tokio::test]
    async fn tracer_failure_does_not_interrupt_delivery() {
        let tracer = Arc::new(RecordingTracer {
            calls: AtomicUsize::new(0),
            fail: true,
            seen: Mutex::new(Vec::new()),
        });
        let driver = StreamDriver::builder()
            .agent(Arc::new(ScriptedAgent::new(vec![
                RawAgentEvent::PhaseCompletion,
                final_output("done"),
            ])))
            .tracer(tracer.clone())
            .build()
            .expect("driver");

        let chunks = collect_ok(&driver).await;
        assert_eq!(chunks.len(), 3);
        assert_eq!(tracer.calls.load(Ordering::SeqCst), 1);
        let seen = tracer.seen.lock().expect("lock");
        assert_eq!(seen[0].trace_id, "trace-1");
        assert_eq!(seen[0].session_id, "session-1");
        assert_eq!(seen[0].input, "User: What is 2+2?");
    }

    struct StalledTracer;

    #[async_trait::async_trait]
    impl TraceReporter for StalledTracer {
        async fn report(&self, _ctx: &TraceContext) -> Result<(), TraceError> {
            futures::future::pending::<()>().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn stalled_tracer_is_abandoned_after_timeout() {
        let driver = StreamDriver::builder()
            .agent(Arc::new(ScriptedAgent::new(vec![
                RawAgentEvent::PhaseCompletion,
                final_output("done"),
            ])))
            .tracer(Arc::new(StalledTracer))
            .config(PipelineConfig::default().trace_timeout(Duration::from_millis(20)))
            .build()
            .expect("driver");

        let chunks = tokio::time::timeout(Duration::from_secs(5), collect_ok(&driver))
            .await
            .expect("delivery must not wait on the tracer");
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1], Chunk::final_answer("trace-1", "done"));
        assert!(chunks[2].is_end_of_stream());
    }

    #[tokio::test]
    async fn ndjson_lines_end_with_the_sentinel_record() {
        let driver = driver_for(ScriptedAgent::new(vec![
            delta("Thought: 2+2"),
            RawAgentEvent::PhaseCompletion,
            final_output("4"),
        ]));
        let lines: Vec<String> = ndjson_lines(driver.respond(request()).await.expect("respond"))
            .map(|line| line.expect("line"))
            .collect()
            .await;

        assert_eq!(lines.len(), 4);
        assert!(lines.iter().all(|line| line.ends_with('\n')));
        let last: Chunk = serde_json::from_str(lines[3].trim_end()).expect("chunk");
        assert!(last.is_end_of_stream());
        let answer: Chunk = serde_json::from_str(lines[2].trim_end()).expect("chunk");
        assert!(answer.is_final_answer);
        assert_eq!(answer.response, "4");
    }

    #[tokio::test]
    async fn dropping_the_stream_releases_the_agent_stream() {
        struct DropFlag(Arc<AtomicBool>);
        impl Drop for DropFlag {
            fn drop(&mut self) {
                self.0.store(true, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicBool::new(false));
        let guard = DropFlag(dropped.clone());
        let events: AgentEventStream = stream::iter(vec![Ok(delta("Thought: first"))])
            .chain(stream::pending())
            .map(move |event| {
                let _keep = &guard;
                event
            })
            .boxed();
        let driver = driver_for(OnceAgent {
            events: Mutex::new(Some(events)),
        });

        let mut chunks = driver.respond(request()).await.expect("respond");
        let first = chunks.next().await.expect("first").expect("chunk");
        assert_eq!(first.response, "Thought: first");
        assert!(
            tokio::time::timeout(Duration::from_millis(20), chunks.next())
                .await
                .is_err()
        );
        assert!(!dropped.load(Ordering::SeqCst));
        drop(chunks);
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[test]
    fn pipeline_never_forwards_action_text() {
        let mut pipeline = ChunkPipeline::new("t", Arc::new(PipelineConfig::default()));
        let chunks = pipeline
            .process(&delta("Thought: search it\nAction: search{\"q\": 1}\nAction Input: x"))
            .expect("process");
        assert_eq!(
            chunks,
            vec![
                Chunk::thinking("t", "Thought: search it"),
                Chunk::thinking("t", "\n"),
            ]
        );
        assert_eq!(pipeline.phase(), Phase::Acting);

        let chunks = pipeline.process(&delta(" more input")).expect("process");
        assert!(chunks.is_empty());
    }

    #[test]
    fn pipeline_stages_follow_completion_and_final_output() {
        let mut pipeline = ChunkPipeline::new("t", Arc::new(PipelineConfig::default()));
        assert_eq!(pipeline.stage(), Stage::Thinking);
        pipeline
            .process(&RawAgentEvent::PhaseCompletion)
            .expect("process");
        assert_eq!(pipeline.stage(), Stage::AwaitingFinal);
        assert!(pipeline.process(&delta("Thought: x")).expect("process").is_empty());
        pipeline.process(&final_output("ok")).expect("process");
        assert_eq!(pipeline.stage(), Stage::Done);
        assert_eq!(pipeline.finish(), Chunk::end_of_stream("t"));
    }

    #[test]
    fn builder_requires_an_agent() {
        let result = StreamDriver::builder().build();
        assert!(
            matches!(result, Err(StreamError::Config(message)) if message.contains("reasoning agent"))
        );
    }
}
