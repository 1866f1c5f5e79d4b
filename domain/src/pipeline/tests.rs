use super::*;
use crate::store::InMemoryStore;
use crate::{attendees, insight_records, NewSession, SessionFilter};
use async_trait::async_trait;
use entity::delivery_outcome::DeliveryOutcome;
use entity::failure_kind::FailureKind;
use entity::session_state::SessionState;
use entity_api::attendee::NewAttendee;
use meeting_ai::types::insights::{Extraction, ExtractionRequest, Insights, Usage};
use meeting_ai::types::notification::{OutboundMessage, Receipt};
use meeting_ai::types::transcription::{AudioRequest, Transcript};
use mockall::{mock, Sequence};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

mock! {
    pub Transcriber {}

    #[async_trait]
    impl TranscriptionProvider for Transcriber {
        async fn transcribe(&self, request: AudioRequest) -> Result<Transcript, AdapterError>;
        fn provider_id(&self) -> &'static str;
        async fn health_check(&self) -> Result<bool, AdapterError>;
        fn estimate_cost(&self, duration_seconds: f64) -> f64;
    }
}

mock! {
    pub InsightExtractor {}

    #[async_trait]
    impl Extractor for InsightExtractor {
        async fn extract(&self, request: ExtractionRequest) -> Result<Extraction, AdapterError>;
        fn provider_id(&self) -> &'static str;
        fn model(&self) -> String;
        async fn health_check(&self) -> Result<bool, AdapterError>;
        fn estimate_cost(&self, word_count: u64) -> f64;
    }
}

mock! {
    pub Notifier {}

    #[async_trait]
    impl Sender for Notifier {
        async fn send(&self, message: OutboundMessage) -> Result<Receipt, AdapterError>;
        fn provider_id(&self) -> &'static str;
        async fn health_check(&self) -> Result<bool, AdapterError>;
    }
}

fn fast_settings() -> PipelineSettings {
    PipelineSettings {
        retry: RetryPolicy::new(3, 2)
            .with_delays(Duration::from_millis(1), Duration::from_millis(4)),
        stage_timeout: Duration::from_secs(5),
        max_audio_bytes: 1024,
    }
}

fn transcriber(provider_id: &'static str) -> MockTranscriber {
    let mut transcriber = MockTranscriber::new();
    transcriber.expect_provider_id().return_const(provider_id);
    transcriber
}

fn extractor() -> MockInsightExtractor {
    let mut extractor = MockInsightExtractor::new();
    extractor.expect_provider_id().return_const("openai");
    extractor
        .expect_model()
        .returning(|| "gpt-4-turbo-preview".to_string());
    extractor
}

fn notifier() -> MockNotifier {
    let mut notifier = MockNotifier::new();
    notifier.expect_provider_id().return_const("smtp");
    notifier
}

fn short_timeout_settings() -> PipelineSettings {
    PipelineSettings {
        stage_timeout: Duration::from_millis(50),
        ..fast_settings()
    }
}

fn orchestrator(
    transcribers: Vec<MockTranscriber>,
    extractor: MockInsightExtractor,
    notifier: MockNotifier,
) -> Orchestrator {
    let adapters = Adapters {
        transcribers: transcribers
            .into_iter()
            .map(|t| Arc::new(t) as Arc<dyn TranscriptionProvider>)
            .collect(),
        extractor: Arc::new(extractor),
        sender: Arc::new(notifier),
    };
    Orchestrator::new(Arc::new(InMemoryStore::new()), adapters, fast_settings())
}

fn hello_team() -> Transcript {
    Transcript::new("hello team".to_string(), Some(60.0), Some("en".to_string()))
}

fn standup_extraction() -> Extraction {
    Extraction {
        insights: Insights {
            summary: "The team synced on progress.".to_string(),
            decisions: vec![],
            action_items: vec![],
            open_questions: vec![],
            topics: vec!["standup".to_string()],
        },
        usage: Usage {
            model: "gpt-4-turbo-preview".to_string(),
            tokens_used: 120,
        },
    }
}

fn recording() -> TranscriptionInput {
    TranscriptionInput {
        audio: vec![1, 2, 3, 4],
        file_name: "standup.mp3".to_string(),
        ..Default::default()
    }
}

async fn standup(orchestrator: &Orchestrator) -> Id {
    let (session, _) = orchestrator
        .create_session(CreateSession {
            title: "Standup".to_string(),
            attendees: vec![NewAttendee {
                name: "Ada".to_string(),
                email: "a@x.com".to_string(),
                is_organizer: true,
            }],
            ..Default::default()
        })
        .await
        .unwrap();
    session.id
}

fn accept_all(message: OutboundMessage) -> Result<Receipt, AdapterError> {
    Ok(Receipt::all_accepted(
        &message.recipients,
        Some("msg-1".to_string()),
    ))
}

#[tokio::test]
async fn standup_runs_end_to_end() {
    let mut whisper = transcriber("whisper");
    whisper
        .expect_transcribe()
        .times(1)
        .returning(|_| Ok(hello_team()));
    let mut extractor = extractor();
    extractor
        .expect_extract()
        .withf(|request| request.transcript == "hello team")
        .times(1)
        .returning(|_| Ok(standup_extraction()));
    let mut notifier = notifier();
    notifier
        .expect_send()
        .withf(|message| {
            message.recipients == vec!["a@x.com".to_string()]
                && message.subject == "Meeting Synthesis: Standup"
        })
        .times(1)
        .returning(accept_all);
    let orchestrator = orchestrator(vec![whisper], extractor, notifier);
    let id = standup(&orchestrator).await;

    let session = orchestrator.transcribe(id, recording(), None).await.unwrap();
    assert_eq!(session.state, SessionState::Transcribed);
    assert_eq!(session.transcript.as_deref(), Some("hello team"));
    assert_eq!(session.word_count, Some(2));
    assert_eq!(session.transcription_provider.as_deref(), Some("whisper"));

    let insight = orchestrator.synthesize(id, false, None).await.unwrap();
    assert_eq!(insight.topics.0, vec!["standup".to_string()]);
    assert_eq!(insight.extraction_model, "gpt-4-turbo-preview");
    assert_eq!(
        orchestrator.status(id).await.unwrap().state,
        SessionState::Synthesized
    );

    let delivered = orchestrator.deliver(id, None, false, None).await.unwrap();
    assert_eq!(delivered.delivered_recipients.0, vec!["a@x.com".to_string()]);
    assert_eq!(delivered.delivery_outcome, Some(DeliveryOutcome::Sent));
    assert!(delivered.delivered_at.is_some());

    let session = orchestrator.status(id).await.unwrap();
    assert_eq!(session.state, SessionState::Delivered);
    assert_eq!(session.last_error_kind, None);
}

#[tokio::test]
async fn synthesis_before_transcription_is_out_of_sequence() {
    let mut extractor = extractor();
    extractor.expect_extract().never();
    let orchestrator = orchestrator(vec![transcriber("whisper")], extractor, notifier());
    let id = standup(&orchestrator).await;

    let err = orchestrator.synthesize(id, false, None).await.unwrap_err();

    assert_eq!(
        err.error_kind,
        DomainErrorKind::StageSequence {
            stage: PipelineStage::Synthesize,
            state: SessionState::Created,
        }
    );
    assert_eq!(
        orchestrator.status(id).await.unwrap().state,
        SessionState::Created
    );
}

#[tokio::test]
async fn repeated_synthesis_calls_the_extractor_once() {
    let mut whisper = transcriber("whisper");
    whisper.expect_transcribe().returning(|_| Ok(hello_team()));
    let mut extractor = extractor();
    extractor
        .expect_extract()
        .times(1)
        .returning(|_| Ok(standup_extraction()));
    let orchestrator = orchestrator(vec![whisper], extractor, notifier());
    let id = standup(&orchestrator).await;
    orchestrator.transcribe(id, recording(), None).await.unwrap();

    let first = orchestrator.synthesize(id, false, None).await.unwrap();
    let second = orchestrator.synthesize(id, false, None).await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn forced_regeneration_overwrites_the_record_in_place() {
    let mut whisper = transcriber("whisper");
    whisper.expect_transcribe().returning(|_| Ok(hello_team()));
    let mut extractor = extractor();
    let mut sequence = Sequence::new();
    extractor
        .expect_extract()
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|_| Ok(standup_extraction()));
    extractor
        .expect_extract()
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|_| {
            let mut extraction = standup_extraction();
            extraction.insights.summary = "A shorter sync.".to_string();
            Ok(extraction)
        });
    let orchestrator = orchestrator(vec![whisper], extractor, notifier());
    let id = standup(&orchestrator).await;
    orchestrator.transcribe(id, recording(), None).await.unwrap();

    let original = orchestrator.synthesize(id, false, None).await.unwrap();
    let regenerated = orchestrator.synthesize(id, true, None).await.unwrap();

    assert_eq!(regenerated.id, original.id);
    assert_eq!(regenerated.summary, "A shorter sync.");
}

#[tokio::test]
async fn failed_transcription_can_be_retried() {
    let mut whisper = transcriber("whisper");
    let mut sequence = Sequence::new();
    whisper
        .expect_transcribe()
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|_| Err(AdapterError::Authentication("invalid api key".to_string())));
    whisper
        .expect_transcribe()
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|_| Ok(hello_team()));
    let orchestrator = orchestrator(vec![whisper], extractor(), notifier());
    let id = standup(&orchestrator).await;

    let err = orchestrator
        .transcribe(id, recording(), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err.error_kind,
        DomainErrorKind::StageFailed {
            stage: PipelineStage::Transcribe,
            kind: FailureKind::AuthOrQuotaError,
            retryable: false,
            ..
        }
    ));
    let failed = orchestrator.status(id).await.unwrap();
    assert_eq!(failed.state, SessionState::Failed);
    assert_eq!(failed.failed_stage, Some(PipelineStage::Transcribe));
    assert_eq!(failed.transcript, None);
    assert_eq!(failed.last_error_kind, Some(FailureKind::AuthOrQuotaError));

    let session = orchestrator.transcribe(id, recording(), None).await.unwrap();
    assert_eq!(session.state, SessionState::Transcribed);
    assert_eq!(session.failed_stage, None);
    assert_eq!(session.last_error_kind, None);
    assert_eq!(session.last_error_message, None);
}

#[tokio::test]
async fn falls_back_to_a_healthy_secondary() {
    let mut whisper = transcriber("whisper");
    whisper
        .expect_transcribe()
        .times(4)
        .returning(|_| Err(AdapterError::Provider("503 Service Unavailable".to_string())));
    whisper.expect_health_check().never();
    let mut assembly = transcriber("assemblyai");
    assembly.expect_health_check().returning(|| Ok(true));
    assembly
        .expect_transcribe()
        .times(1)
        .returning(|_| Ok(hello_team()));
    let orchestrator = orchestrator(vec![whisper, assembly], extractor(), notifier());
    let id = standup(&orchestrator).await;

    let session = orchestrator.transcribe(id, recording(), None).await.unwrap();

    assert_eq!(session.state, SessionState::Transcribed);
    assert_eq!(
        session.transcription_provider.as_deref(),
        Some("assemblyai")
    );
}

#[tokio::test]
async fn unhealthy_secondary_is_skipped() {
    let mut whisper = transcriber("whisper");
    whisper
        .expect_transcribe()
        .returning(|_| Err(AdapterError::Network("connection reset".to_string())));
    let mut assembly = transcriber("assemblyai");
    assembly.expect_health_check().returning(|| Ok(false));
    assembly.expect_transcribe().never();
    let orchestrator = orchestrator(vec![whisper, assembly], extractor(), notifier());
    let id = standup(&orchestrator).await;

    let err = orchestrator
        .transcribe(id, recording(), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err.error_kind,
        DomainErrorKind::StageFailed {
            kind: FailureKind::TransientProviderError,
            retryable: true,
            ..
        }
    ));
    let session = orchestrator.status(id).await.unwrap();
    assert_eq!(session.failed_stage, Some(PipelineStage::Transcribe));
    assert_eq!(
        session.last_error_kind,
        Some(FailureKind::TransientProviderError)
    );
}

#[tokio::test]
async fn preferred_provider_is_tried_first() {
    let mut whisper = transcriber("whisper");
    whisper.expect_transcribe().never();
    let mut assembly = transcriber("assemblyai");
    assembly
        .expect_transcribe()
        .times(1)
        .returning(|_| Ok(hello_team()));
    let orchestrator = orchestrator(vec![whisper, assembly], extractor(), notifier());
    let id = standup(&orchestrator).await;

    let input = TranscriptionInput {
        prefer_provider: Some("assemblyai".to_string()),
        ..recording()
    };
    let session = orchestrator.transcribe(id, input, None).await.unwrap();

    assert_eq!(
        session.transcription_provider.as_deref(),
        Some("assemblyai")
    );
}

#[tokio::test]
async fn blank_transcript_is_a_malformed_response() {
    let mut whisper = transcriber("whisper");
    // First attempt plus two malformed retries.
    whisper
        .expect_transcribe()
        .times(3)
        .returning(|_| Ok(Transcript::new("  ".to_string(), None, None)));
    let orchestrator = orchestrator(vec![whisper], extractor(), notifier());
    let id = standup(&orchestrator).await;

    let err = orchestrator
        .transcribe(id, recording(), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err.error_kind,
        DomainErrorKind::StageFailed {
            kind: FailureKind::MalformedResponseError,
            ..
        }
    ));
    assert_eq!(orchestrator.status(id).await.unwrap().transcript, None);
}

#[tokio::test]
async fn invalid_recordings_are_rejected_before_any_state_change() {
    let mut whisper = transcriber("whisper");
    whisper.expect_transcribe().never();
    let orchestrator = orchestrator(vec![whisper], extractor(), notifier());
    let id = standup(&orchestrator).await;

    let inputs = [
        TranscriptionInput {
            audio: vec![],
            ..recording()
        },
        TranscriptionInput {
            audio: vec![0; 2048],
            ..recording()
        },
        TranscriptionInput {
            file_name: "notes.txt".to_string(),
            ..recording()
        },
        TranscriptionInput {
            prefer_provider: Some("soniox".to_string()),
            ..recording()
        },
    ];

    for input in inputs {
        let err = orchestrator.transcribe(id, input, None).await.unwrap_err();
        assert!(
            matches!(err.error_kind, DomainErrorKind::Validation(_)),
            "{err}"
        );
    }
    assert_eq!(
        orchestrator.status(id).await.unwrap().state,
        SessionState::Created
    );
}

#[tokio::test]
async fn cancelled_trigger_leaves_the_session_untouched() {
    let mut whisper = transcriber("whisper");
    whisper.expect_transcribe().never();
    let orchestrator = orchestrator(vec![whisper], extractor(), notifier());
    let id = standup(&orchestrator).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = orchestrator
        .transcribe(id, recording(), Some(&cancel))
        .await
        .unwrap_err();

    assert_eq!(err.error_kind, DomainErrorKind::Cancelled);
    assert_eq!(
        orchestrator.status(id).await.unwrap().state,
        SessionState::Created
    );
}

/// Transcriber that holds its call open until released.
struct GatedTranscriber {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl TranscriptionProvider for GatedTranscriber {
    async fn transcribe(&self, _request: AudioRequest) -> Result<Transcript, AdapterError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(hello_team())
    }

    fn provider_id(&self) -> &'static str {
        "whisper"
    }

    async fn health_check(&self) -> Result<bool, AdapterError> {
        Ok(true)
    }

    fn estimate_cost(&self, _duration_seconds: f64) -> f64 {
        0.0
    }
}

#[tokio::test]
async fn concurrent_triggers_run_the_stage_once() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let adapters = Adapters {
        transcribers: vec![Arc::new(GatedTranscriber {
            started: Arc::clone(&started),
            release: Arc::clone(&release),
        })],
        extractor: Arc::new(extractor()),
        sender: Arc::new(notifier()),
    };
    let orchestrator = Orchestrator::new(
        Arc::new(InMemoryStore::new()),
        adapters,
        fast_settings(),
    );
    let id = standup(&orchestrator).await;

    let running = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.transcribe(id, recording(), None).await }
    });
    started.notified().await;

    let err = orchestrator
        .transcribe(id, recording(), None)
        .await
        .unwrap_err();
    assert_eq!(
        err.error_kind,
        DomainErrorKind::StageAlreadyRunning {
            stage: PipelineStage::Transcribe
        }
    );

    release.notify_one();
    let session = running.await.unwrap().unwrap();
    assert_eq!(session.state, SessionState::Transcribed);
}

#[tokio::test]
async fn failed_delivery_keeps_the_insight_record() {
    let mut whisper = transcriber("whisper");
    whisper.expect_transcribe().returning(|_| Ok(hello_team()));
    let mut extractor = extractor();
    extractor
        .expect_extract()
        .returning(|_| Ok(standup_extraction()));
    let mut notifier = notifier();
    let mut sequence = Sequence::new();
    notifier
        .expect_send()
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|_| Err(AdapterError::Authentication("535 bad credentials".to_string())));
    notifier
        .expect_send()
        .times(1)
        .in_sequence(&mut sequence)
        .returning(accept_all);
    let orchestrator = orchestrator(vec![whisper], extractor, notifier);
    let id = standup(&orchestrator).await;
    orchestrator.transcribe(id, recording(), None).await.unwrap();
    let synthesized = orchestrator.synthesize(id, false, None).await.unwrap();

    let err = orchestrator
        .deliver(id, None, false, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err.error_kind,
        DomainErrorKind::StageFailed {
            stage: PipelineStage::Deliver,
            kind: FailureKind::AuthOrQuotaError,
            ..
        }
    ));
    assert_eq!(orchestrator.insight(id).await.unwrap(), synthesized);
    let session = orchestrator.status(id).await.unwrap();
    assert_eq!(session.failed_stage, Some(PipelineStage::Deliver));
    assert_eq!(session.last_error_kind, Some(FailureKind::AuthOrQuotaError));

    let delivered = orchestrator.deliver(id, None, false, None).await.unwrap();
    assert_eq!(delivered.id, synthesized.id);
    assert_eq!(delivered.summary, synthesized.summary);
    assert_eq!(delivered.topics, synthesized.topics);
    assert_eq!(delivered.created_at, synthesized.created_at);
    assert_eq!(delivered.delivered_recipients.0, vec!["a@x.com".to_string()]);
    assert_eq!(
        orchestrator.status(id).await.unwrap().state,
        SessionState::Delivered
    );
}

#[tokio::test]
async fn delivered_session_is_resent_only_when_forced() {
    let mut whisper = transcriber("whisper");
    whisper.expect_transcribe().returning(|_| Ok(hello_team()));
    let mut extractor = extractor();
    extractor
        .expect_extract()
        .returning(|_| Ok(standup_extraction()));
    let mut notifier = notifier();
    notifier.expect_send().times(2).returning(accept_all);
    let orchestrator = orchestrator(vec![whisper], extractor, notifier);
    let id = standup(&orchestrator).await;
    orchestrator.transcribe(id, recording(), None).await.unwrap();
    orchestrator.synthesize(id, false, None).await.unwrap();
    orchestrator.deliver(id, None, false, None).await.unwrap();

    let err = orchestrator
        .deliver(id, None, false, None)
        .await
        .unwrap_err();
    assert_eq!(
        err.error_kind,
        DomainErrorKind::StageSequence {
            stage: PipelineStage::Deliver,
            state: SessionState::Delivered,
        }
    );

    let resent = orchestrator
        .deliver(id, Some(vec!["b@x.com".to_string()]), true, None)
        .await
        .unwrap();
    assert_eq!(resent.delivered_recipients.0, vec!["b@x.com".to_string()]);
}

#[tokio::test]
async fn invalid_recipients_are_rejected_before_sending() {
    let mut whisper = transcriber("whisper");
    whisper.expect_transcribe().returning(|_| Ok(hello_team()));
    let mut extractor = extractor();
    extractor
        .expect_extract()
        .returning(|_| Ok(standup_extraction()));
    let mut notifier = notifier();
    notifier.expect_send().never();
    let orchestrator = orchestrator(vec![whisper], extractor, notifier);
    let id = standup(&orchestrator).await;
    orchestrator.transcribe(id, recording(), None).await.unwrap();
    orchestrator.synthesize(id, false, None).await.unwrap();

    for recipients in [vec![], vec!["not-an-address".to_string()]] {
        let err = orchestrator
            .deliver(id, Some(recipients), false, None)
            .await
            .unwrap_err();
        assert!(matches!(err.error_kind, DomainErrorKind::Validation(_)));
    }
    assert_eq!(
        orchestrator.status(id).await.unwrap().state,
        SessionState::Synthesized
    );
}

#[tokio::test]
async fn cost_estimate_uses_stored_duration_and_word_count() {
    let mut whisper = transcriber("whisper");
    whisper.expect_transcribe().returning(|_| Ok(hello_team()));
    whisper
        .expect_estimate_cost()
        .returning(|duration_seconds| duration_seconds / 60.0 * 0.006);
    let mut extractor = extractor();
    extractor
        .expect_estimate_cost()
        .withf(|word_count| *word_count == 2)
        .returning(|_| 0.0155);
    extractor.expect_extract().never();
    let orchestrator = orchestrator(vec![whisper], extractor, notifier());
    let id = standup(&orchestrator).await;

    let before = orchestrator.estimate_costs(id).await.unwrap();
    assert_eq!(before.transcription_usd, None);
    assert_eq!(before.synthesis_usd, None);

    orchestrator.transcribe(id, recording(), None).await.unwrap();
    let estimate = orchestrator.estimate_costs(id).await.unwrap();

    assert_eq!(estimate.transcription_provider.as_deref(), Some("whisper"));
    assert!((estimate.transcription_usd.unwrap() - 0.006).abs() < 1e-9);
    assert!((estimate.synthesis_usd.unwrap() - 0.0155).abs() < 1e-9);
    assert!((estimate.total_usd - 0.0215).abs() < 1e-9);
    assert_eq!(
        orchestrator.status(id).await.unwrap().state,
        SessionState::Transcribed
    );
}

#[tokio::test]
async fn health_reports_each_adapter() {
    let mut whisper = transcriber("whisper");
    whisper.expect_health_check().returning(|| Ok(true));
    let mut extractor = extractor();
    extractor.expect_health_check().returning(|| Ok(true));
    let mut notifier = notifier();
    notifier
        .expect_health_check()
        .returning(|| Err(AdapterError::Network("connection refused".to_string())));
    let orchestrator = orchestrator(vec![whisper], extractor, notifier);

    let health = orchestrator.health().await;

    assert!(health.transcription[0].healthy);
    assert!(health.extraction.healthy);
    assert!(!health.notification.healthy);
    assert!(health.notification.error.is_some());
    assert!(!health.all_healthy());
}

#[tokio::test]
async fn blank_titles_and_attendee_emails_are_rejected() {
    let orchestrator = orchestrator(vec![transcriber("whisper")], extractor(), notifier());

    let err = orchestrator
        .create_session(CreateSession {
            title: "  ".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err.error_kind, DomainErrorKind::Validation(_)));

    let err = orchestrator
        .create_session(CreateSession {
            title: "Standup".to_string(),
            attendees: vec![NewAttendee {
                name: "Ada".to_string(),
                email: "ada".to_string(),
                is_organizer: false,
            }],
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err.error_kind, DomainErrorKind::Validation(_)));
}

#[tokio::test]
async fn malformed_insights_fail_synthesis_until_retried() {
    let mut whisper = transcriber("whisper");
    whisper.expect_transcribe().returning(|_| Ok(hello_team()));
    let mut extractor = extractor();
    let mut sequence = Sequence::new();
    // First attempt plus two malformed retries.
    extractor
        .expect_extract()
        .times(3)
        .in_sequence(&mut sequence)
        .returning(|_| {
            let mut extraction = standup_extraction();
            extraction.insights.summary = " ".to_string();
            Ok(extraction)
        });
    extractor
        .expect_extract()
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|_| Ok(standup_extraction()));
    let orchestrator = orchestrator(vec![whisper], extractor, notifier());
    let id = standup(&orchestrator).await;
    orchestrator.transcribe(id, recording(), None).await.unwrap();

    let err = orchestrator.synthesize(id, false, None).await.unwrap_err();
    assert!(matches!(
        err.error_kind,
        DomainErrorKind::StageFailed {
            stage: PipelineStage::Synthesize,
            kind: FailureKind::MalformedResponseError,
            retryable: true,
            ..
        }
    ));
    let failed = orchestrator.status(id).await.unwrap();
    assert_eq!(failed.state, SessionState::Failed);
    assert_eq!(failed.failed_stage, Some(PipelineStage::Synthesize));
    assert_eq!(
        failed.last_error_kind,
        Some(FailureKind::MalformedResponseError)
    );
    assert_eq!(
        orchestrator.insight(id).await.unwrap_err().error_kind,
        DomainErrorKind::NotFound
    );

    let insight = orchestrator.synthesize(id, false, None).await.unwrap();
    assert_eq!(insight.summary, "The team synced on progress.");
    assert_eq!(
        orchestrator.status(id).await.unwrap().state,
        SessionState::Synthesized
    );
}

#[tokio::test]
async fn failed_regeneration_keeps_the_previous_record() {
    let mut whisper = transcriber("whisper");
    whisper.expect_transcribe().returning(|_| Ok(hello_team()));
    let mut extractor = extractor();
    let mut sequence = Sequence::new();
    extractor
        .expect_extract()
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|_| Ok(standup_extraction()));
    extractor
        .expect_extract()
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|_| Err(AdapterError::QuotaExceeded("monthly quota used".to_string())));
    let orchestrator = orchestrator(vec![whisper], extractor, notifier());
    let id = standup(&orchestrator).await;
    orchestrator.transcribe(id, recording(), None).await.unwrap();
    let original = orchestrator.synthesize(id, false, None).await.unwrap();

    let err = orchestrator.synthesize(id, true, None).await.unwrap_err();
    assert!(matches!(
        err.error_kind,
        DomainErrorKind::StageFailed {
            kind: FailureKind::AuthOrQuotaError,
            ..
        }
    ));
    assert_eq!(
        orchestrator.status(id).await.unwrap().failed_stage,
        Some(PipelineStage::Synthesize)
    );

    let kept = orchestrator.synthesize(id, false, None).await.unwrap();
    assert_eq!(kept, original);
    let session = orchestrator.status(id).await.unwrap();
    assert_eq!(session.state, SessionState::Synthesized);
    assert_eq!(session.failed_stage, None);
    assert_eq!(session.last_error_kind, None);
}

/// Transcriber whose calls never complete.
struct StalledTranscriber {
    provider_id: &'static str,
    transcribe_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl TranscriptionProvider for StalledTranscriber {
    async fn transcribe(&self, _request: AudioRequest) -> Result<Transcript, AdapterError> {
        self.transcribe_calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }

    fn provider_id(&self) -> &'static str {
        self.provider_id
    }

    async fn health_check(&self) -> Result<bool, AdapterError> {
        std::future::pending().await
    }

    fn estimate_cost(&self, _duration_seconds: f64) -> f64 {
        0.0
    }
}

#[tokio::test]
async fn unresponsive_provider_times_out_into_failed() {
    let calls = Arc::new(AtomicUsize::new(0));
    let adapters = Adapters {
        transcribers: vec![Arc::new(StalledTranscriber {
            provider_id: "whisper",
            transcribe_calls: Arc::clone(&calls),
        })],
        extractor: Arc::new(extractor()),
        sender: Arc::new(notifier()),
    };
    let orchestrator = Orchestrator::new(
        Arc::new(InMemoryStore::new()),
        adapters,
        short_timeout_settings(),
    );
    let id = standup(&orchestrator).await;

    let err = orchestrator
        .transcribe(id, recording(), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err.error_kind,
        DomainErrorKind::StageFailed {
            kind: FailureKind::TransientProviderError,
            retryable: true,
            ..
        }
    ));
    // First attempt plus three transient retries, each cut off by the timeout.
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    let session = orchestrator.status(id).await.unwrap();
    assert_eq!(session.state, SessionState::Failed);
    assert_eq!(session.failed_stage, Some(PipelineStage::Transcribe));
}

#[tokio::test]
async fn unresponsive_secondary_health_check_is_skipped() {
    let mut whisper = transcriber("whisper");
    whisper
        .expect_transcribe()
        .times(1)
        .returning(|_| Err(AdapterError::Authentication("invalid api key".to_string())));
    let calls = Arc::new(AtomicUsize::new(0));
    let adapters = Adapters {
        transcribers: vec![
            Arc::new(whisper),
            Arc::new(StalledTranscriber {
                provider_id: "assemblyai",
                transcribe_calls: Arc::clone(&calls),
            }),
        ],
        extractor: Arc::new(extractor()),
        sender: Arc::new(notifier()),
    };
    let orchestrator = Orchestrator::new(
        Arc::new(InMemoryStore::new()),
        adapters,
        short_timeout_settings(),
    );
    let id = standup(&orchestrator).await;

    let err = orchestrator
        .transcribe(id, recording(), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err.error_kind,
        DomainErrorKind::StageFailed {
            kind: FailureKind::AuthOrQuotaError,
            ..
        }
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    let session = orchestrator.status(id).await.unwrap();
    assert_eq!(session.state, SessionState::Failed);
    assert_eq!(session.failed_stage, Some(PipelineStage::Transcribe));
}

/// In-memory store whose writes into one state error a fixed number of times.
struct FailingWrites {
    inner: InMemoryStore,
    failing_state: SessionState,
    remaining: AtomicUsize,
}

impl FailingWrites {
    fn new(failing_state: SessionState, times: usize) -> Self {
        Self {
            inner: InMemoryStore::new(),
            failing_state,
            remaining: AtomicUsize::new(times),
        }
    }
}

#[async_trait]
impl RecordStore for FailingWrites {
    async fn get(&self, id: Id) -> Result<sessions::Model, Error> {
        self.inner.get(id).await
    }

    async fn list(&self, filter: &SessionFilter) -> Result<Vec<sessions::Model>, Error> {
        self.inner.list(filter).await
    }

    async fn create_session(
        &self,
        new_session: NewSession,
        new_attendees: Vec<NewAttendee>,
    ) -> Result<(sessions::Model, Vec<attendees::Model>), Error> {
        self.inner.create_session(new_session, new_attendees).await
    }

    async fn cas_transition(
        &self,
        id: Id,
        expected: Lifecycle,
        transition: Transition,
    ) -> Result<CasOutcome, Error> {
        if transition.state == self.failing_state
            && self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Err(Error::persistence("connection reset by peer"));
        }
        self.inner.cas_transition(id, expected, transition).await
    }

    async fn attendees(&self, id: Id) -> Result<Vec<attendees::Model>, Error> {
        self.inner.attendees(id).await
    }

    async fn add_attendee(
        &self,
        id: Id,
        new_attendee: NewAttendee,
    ) -> Result<attendees::Model, Error> {
        self.inner.add_attendee(id, new_attendee).await
    }

    async fn insight(&self, id: Id) -> Result<Option<insight_records::Model>, Error> {
        self.inner.insight(id).await
    }

    async fn delete(&self, id: Id) -> Result<(), Error> {
        self.inner.delete(id).await
    }
}

#[tokio::test]
async fn failed_result_write_releases_the_claim() {
    let mut whisper = transcriber("whisper");
    whisper
        .expect_transcribe()
        .times(2)
        .returning(|_| Ok(hello_team()));
    let adapters = Adapters {
        transcribers: vec![Arc::new(whisper)],
        extractor: Arc::new(extractor()),
        sender: Arc::new(notifier()),
    };
    let orchestrator = Orchestrator::new(
        Arc::new(FailingWrites::new(SessionState::Transcribed, 1)),
        adapters,
        fast_settings(),
    );
    let id = standup(&orchestrator).await;

    let err = orchestrator
        .transcribe(id, recording(), None)
        .await
        .unwrap_err();
    assert_eq!(err.error_kind, DomainErrorKind::Persistence);
    let failed = orchestrator.status(id).await.unwrap();
    assert_eq!(failed.state, SessionState::Failed);
    assert_eq!(failed.failed_stage, Some(PipelineStage::Transcribe));
    assert_eq!(failed.transcript, None);
    assert_eq!(
        failed.last_error_kind,
        Some(FailureKind::TransientProviderError)
    );

    let session = orchestrator.transcribe(id, recording(), None).await.unwrap();
    assert_eq!(session.state, SessionState::Transcribed);
    assert_eq!(session.last_error_kind, None);
}

#[tokio::test]
async fn failed_sessions_are_listed_by_stage() {
    let mut whisper = transcriber("whisper");
    let mut sequence = Sequence::new();
    whisper
        .expect_transcribe()
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|_| Err(AdapterError::Authentication("invalid api key".to_string())));
    let orchestrator = orchestrator(vec![whisper], extractor(), notifier());
    let failed = standup(&orchestrator).await;
    let untouched = standup(&orchestrator).await;
    orchestrator
        .transcribe(failed, recording(), None)
        .await
        .unwrap_err();

    let sessions = orchestrator
        .list_sessions(SessionFilter {
            state: Some(SessionState::Failed),
            failed_stage: Some(PipelineStage::Transcribe),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, failed);

    let created = orchestrator
        .list_sessions(SessionFilter {
            state: Some(SessionState::Created),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].id, untouched);

    let err = orchestrator
        .list_sessions(SessionFilter {
            state: Some(SessionState::Created),
            failed_stage: Some(PipelineStage::Transcribe),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err.error_kind, DomainErrorKind::Validation(_)));
}
