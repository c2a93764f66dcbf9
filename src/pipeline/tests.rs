use super::*;
use crate::RagError;
use crate::database::SharedVectorStore;
use crate::embeddings::{ChunkingConfig, Document, Embedder};
use crate::indexer::Indexer;
use crate::prompt::PromptConfig;
use crate::test_support::{
    FailingEmbedder, HashingEmbedder, PageScript, RecordingGenerator, ScriptedWebSearch,
};
use tempfile::TempDir;

const NETWORK_NOTES: &str = "Network Layer basics. Packets route via IP. DNS resolves names.";
const EMPTY_WEB_SECTION: &str = "WEB_SNIPPETS (Optional):\n(none)\n\nAnswer:";

struct Fixture {
    _temp_dir: TempDir,
    generator: Arc<RecordingGenerator>,
    web: Arc<ScriptedWebSearch>,
    pipeline: AnswerPipeline,
}

async fn fixture_with(
    embedder: Arc<dyn Embedder>,
    generator: RecordingGenerator,
    web: ScriptedWebSearch,
) -> Fixture {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = Arc::new(
        SharedVectorStore::open(temp_dir.path().join("index"))
            .await
            .expect("should open store"),
    );

    let indexer = Indexer::new(
        Arc::new(HashingEmbedder::default()),
        Arc::clone(&store),
        ChunkingConfig {
            size: 5,
            overlap: 2,
        },
    )
    .expect("should create indexer");
    indexer
        .ingest_document(Document::new("network.txt", NETWORK_NOTES))
        .await
        .expect("should ingest");

    let generator = Arc::new(generator);
    let web = Arc::new(web);
    let pipeline = AnswerPipeline::new(
        Retriever::new(embedder, store, 1200),
        Arc::clone(&generator) as Arc<dyn Generator>,
        Some(Arc::clone(&web) as Arc<dyn WebSearch>),
        WebConfig {
            fetch_timeout_seconds: 1,
            ..WebConfig::default()
        },
        PromptAssembler::new(PromptConfig::default()),
    );

    Fixture {
        _temp_dir: temp_dir,
        generator,
        web,
        pipeline,
    }
}

async fn fixture(web: ScriptedWebSearch) -> Fixture {
    fixture_with(
        Arc::new(HashingEmbedder::default()),
        RecordingGenerator::replying("DNS resolves names [L1]."),
        web,
    )
    .await
}

#[tokio::test]
async fn answers_from_the_most_relevant_chunk() {
    let fx = fixture(ScriptedWebSearch::default()).await;

    let report = fx
        .pipeline
        .answer_with_report("What resolves names on the network?", false, 1)
        .await
        .expect("should answer");

    assert_eq!(report.answer, "DNS resolves names [L1].");
    assert_eq!(report.lecture_sources, vec!["network.txt".to_string()]);

    let prompt = fx.generator.last_prompt();
    assert!(prompt.contains("[L1] IP. DNS resolves names."));
    assert!(!prompt.contains("[L2]"));
}

#[tokio::test]
async fn web_disabled_never_touches_web() {
    let fx = fixture(
        ScriptedWebSearch::default().with_page(
            "Page",
            "https://a.example/1",
            PageScript::Text("web text".into()),
        ),
    )
    .await;

    let answer = fx
        .pipeline
        .answer("What resolves names?", false, 2)
        .await
        .expect("should answer");

    assert!(!answer.is_empty());
    assert_eq!(fx.web.total_calls(), 0);
    assert!(fx.generator.last_prompt().contains(EMPTY_WEB_SECTION));
}

#[tokio::test]
async fn all_web_sources_failing_still_answers() {
    let fx = fixture(
        ScriptedWebSearch::default()
            .with_page("A", "https://a.example/1", PageScript::Fail("503".into()))
            .with_page("B", "https://a.example/2", PageScript::Fail("reset".into()))
            .with_page("C", "https://a.example/3", PageScript::Hang),
    )
    .await;

    let report = fx
        .pipeline
        .answer_with_report("What resolves names?", true, 2)
        .await
        .expect("should answer");

    assert!(!report.answer.is_empty());
    assert!(report.web_sources.is_empty());
    assert_eq!(report.web_failures.len(), 3);
    let prompt = fx.generator.last_prompt();
    assert!(prompt.contains(EMPTY_WEB_SECTION));
    assert!(prompt.contains("[L1]"));
}

#[tokio::test]
async fn successful_web_sources_are_cited() {
    let fx = fixture(
        ScriptedWebSearch::default()
            .with_page("Bad", "https://a.example/bad", PageScript::Fail("404".into()))
            .with_page(
                "DNS explained",
                "https://a.example/dns",
                PageScript::Text("DNS is the phone book of the internet.".into()),
            ),
    )
    .await;

    let report = fx
        .pipeline
        .answer_with_report("What resolves names?", true, 1)
        .await
        .expect("should answer");

    assert_eq!(report.web_sources, vec!["https://a.example/dns".to_string()]);
    assert_eq!(report.web_failures.len(), 1);
    assert_eq!(
        report.stages,
        vec![
            PipelineStage::RetrievingLocal,
            PipelineStage::FetchingWeb,
            PipelineStage::Assembling,
            PipelineStage::Generating,
            PipelineStage::Done,
        ]
    );
    assert!(fx.generator.last_prompt().contains(
        "[W1] DNS explained\nDNS is the phone book of the internet.\n(Source: https://a.example/dns)"
    ));
}

#[tokio::test]
async fn web_search_failure_is_not_fatal() {
    let fx = fixture(ScriptedWebSearch::failing_search("blocked")).await;

    let report = fx
        .pipeline
        .answer_with_report("What resolves names?", true, 1)
        .await
        .expect("should answer");

    assert_eq!(report.web_failures.len(), 1);
    assert!(fx.generator.last_prompt().contains(EMPTY_WEB_SECTION));
}

#[tokio::test]
async fn generator_failure_fails_the_request() {
    let fx = fixture_with(
        Arc::new(HashingEmbedder::default()),
        RecordingGenerator::failing("out of memory"),
        ScriptedWebSearch::default(),
    )
    .await;

    let result = fx.pipeline.answer("What resolves names?", false, 1).await;
    assert!(matches!(result, Err(RagError::Generation(ref reason)) if reason == "out of memory"));
}

#[tokio::test]
async fn empty_generation_is_an_error_not_a_blank_answer() {
    let fx = fixture_with(
        Arc::new(HashingEmbedder::default()),
        RecordingGenerator::replying("   \n"),
        ScriptedWebSearch::default(),
    )
    .await;

    let result = fx.pipeline.answer("What resolves names?", false, 1).await;
    assert!(matches!(result, Err(RagError::Generation(_))));
}

#[tokio::test]
async fn retrieval_failure_does_not_wait_for_web_sources() {
    let fx = fixture_with(
        Arc::new(FailingEmbedder),
        RecordingGenerator::replying("unused"),
        ScriptedWebSearch::default()
            .with_page("Slow", "https://slow.example", PageScript::Hang)
            .with_page("Slower", "https://slower.example", PageScript::Hang),
    )
    .await;

    let started = tokio::time::Instant::now();
    let result = fx.pipeline.answer("What resolves names?", true, 1).await;

    assert!(matches!(result, Err(RagError::Embedding(_))));
    assert!(started.elapsed() < std::time::Duration::from_millis(500));
    assert_eq!(fx.generator.call_count(), 0);
}

#[tokio::test]
async fn embedder_failure_stops_before_generation() {
    let fx = fixture_with(
        Arc::new(FailingEmbedder),
        RecordingGenerator::replying("unused"),
        ScriptedWebSearch::default(),
    )
    .await;

    let result = fx.pipeline.answer("What resolves names?", true, 1).await;
    assert!(matches!(result, Err(RagError::Embedding(_))));
    assert_eq!(fx.generator.call_count(), 0);
}

#[tokio::test]
async fn generation_request_uses_prompt_settings() {
    let fx = fixture(ScriptedWebSearch::default()).await;

    fx.pipeline
        .answer("What resolves names?", false, 1)
        .await
        .expect("should answer");

    let requests = fx.generator.requests.lock().expect("lock should not be poisoned");
    assert_eq!(requests[0].max_output_tokens, 124);
    assert_eq!(requests[0].context_tokens, 3072 + 124);
    assert!((requests[0].temperature - 0.7).abs() < f32::EPSILON);
    assert!((requests[0].top_p - 0.9).abs() < f32::EPSILON);
}

#[tokio::test]
async fn pipeline_without_web_collaborator_ignores_use_web() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = Arc::new(SharedVectorStore::open(temp_dir.path()).await.expect("should open"));
    let generator = Arc::new(RecordingGenerator::replying("nothing indexed yet"));
    let pipeline = AnswerPipeline::new(
        Retriever::new(Arc::new(HashingEmbedder::default()), store, 1200),
        Arc::clone(&generator) as Arc<dyn Generator>,
        None,
        WebConfig::default(),
        PromptAssembler::new(PromptConfig::default()),
    );

    let report = pipeline
        .answer_with_report("anything", true, 4)
        .await
        .expect("should answer");

    assert!(!report.stages.contains(&PipelineStage::FetchingWeb));
    assert!(generator.last_prompt().contains("CONTEXT (Lectures):\n(none)"));
}
