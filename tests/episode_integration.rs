//! End-to-end episode generation: stored posts, a mocked script model and a
//! mocked synthesis endpoint, rendered to WAV.

mod support;

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{TimeZone, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::json;
use support::fixtures;
use support::socket_guard::start_mock_server_or_skip;
use tempfile::TempDir;
use threadcast_core::audio::{AudioClip, AudioFormat};
use threadcast_core::episode::{
    EpisodeError, EpisodeGenerator, EpisodeRequest, GenerateEvent, GeneratorPaths, ScriptWriter,
    SelectionMode,
};
use threadcast_core::llm::AnthropicClient;
use threadcast_core::store::{CandidateFilter, CandidateOrder, NewPost, Store};
use threadcast_core::tts::{GoogleCloudBackend, TtsConfig};
use threadcast_core::Database;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEGMENT: &str = "<Person1>Welcome back, today we have a good one.</Person1>\n<Person2>Really? Tell me more!</Person2>";

fn post(reddit_id: &str, score: i64) -> NewPost {
    NewPost {
        reddit_id: reddit_id.to_string(),
        subreddit: "rust".to_string(),
        title: format!("Thread {reddit_id}"),
        content: Some(format!("Body of {reddit_id}")),
        url: format!("https://www.reddit.com/r/rust/comments/{reddit_id}/"),
        author: "poster".to_string(),
        score,
        num_comments: 1,
        created_utc: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        comments: Vec::new(),
    }
}

async fn mount_services(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::anthropic_message(SEGMENT)))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/text:synthesize"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"audioContent": STANDARD.encode(vec![0u8; 4800])})),
        )
        .mount(server)
        .await;
}

fn request(user: &str) -> EpisodeRequest {
    EpisodeRequest {
        user: user.to_string(),
        count: 2,
        subreddits: Vec::new(),
        mode: SelectionMode::ByEngagement,
        include_covered: false,
        longform: true,
        smart: false,
        format: AudioFormat::Wav,
    }
}

#[tokio::test]
async fn test_generate_episode_end_to_end() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_services(&server).await;

    let dir = TempDir::new().unwrap();
    let store = Store::new(Database::new(&dir.path().join("threadcast.db")).await.unwrap());
    store
        .insert_posts(&[post("a1", 10), post("a2", 50), post("a3", 30)])
        .await
        .unwrap();
    let bob = store.get_or_create_user("bob").await.unwrap();

    let writer = ScriptWriter::new(Arc::new(
        AnthropicClient::new("a-key", "claude-sonnet-4-5").with_base_url(server.uri()),
    ));
    let backend = GoogleCloudBackend::from_config(&TtsConfig {
        google_api_key: Some("g-key".to_string()),
        google_base_url: server.uri(),
        ..TtsConfig::default()
    })
    .unwrap();
    let log_path = dir.path().join("logs/generation_log.csv");
    let paths = GeneratorPaths {
        output_dir: dir.path().join("audio"),
        transcript_dir: dir.path().join("transcripts"),
        generation_log: Some(log_path.clone()),
    };
    let generator = EpisodeGenerator::new(&store, writer, &backend, paths);

    let mut rng = StdRng::seed_from_u64(7);
    let mut events = Vec::new();
    let generated = generator
        .generate(&request("alice"), &mut rng, &mut |event| events.push(event))
        .await
        .unwrap();

    let episode = &generated.episode;
    assert_eq!(episode.post_count, 2);
    assert_eq!(episode.description, "Generated from 2 Reddit posts");
    assert!(events.contains(&GenerateEvent::Selected { count: 2 }));
    assert!(events.contains(&GenerateEvent::WritingScript { done: 2, total: 2 }));

    let a2 = store.post_by_reddit_id("a2").await.unwrap().unwrap();
    let a3 = store.post_by_reddit_id("a3").await.unwrap().unwrap();
    let mut covered = store.episode_post_ids(episode.id).await.unwrap();
    covered.sort_unstable();
    assert_eq!(covered, vec![a2.id, a3.id]);

    let audio = AudioClip::read_wav(std::path::Path::new(&episode.audio_path)).unwrap();
    assert!((audio.duration_secs() - 0.1).abs() < 1e-6);
    assert_eq!(episode.duration_seconds, Some(audio.duration_secs()));
    assert!(episode.audio_path.ends_with(".wav"));
    let transcript = std::fs::read_to_string(&episode.transcript_path).unwrap();
    assert!(transcript.contains("<Person2>Really? Tell me more!</Person2>"));
    let log = std::fs::read_to_string(&log_path).unwrap();
    assert_eq!(log.lines().count(), 2);

    // bob's pool is untouched by alice's episode
    let bob_filter = CandidateFilter {
        user_id: bob.id,
        include_covered: false,
        subreddits: Vec::new(),
    };
    let bob_pool = store
        .candidate_posts(&bob_filter, CandidateOrder::Engagement, 10)
        .await
        .unwrap();
    assert_eq!(bob_pool.len(), 3);

    // alice has one post left, then nothing
    let second = generator
        .generate(&request("alice"), &mut rng, &mut |_| {})
        .await
        .unwrap();
    assert_eq!(second.episode.post_count, 1);
    let err = generator
        .generate(&request("alice"), &mut rng, &mut |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, EpisodeError::NoCandidates));
}

#[tokio::test]
async fn test_generate_script_failure_records_nothing() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = Store::new(Database::new(&dir.path().join("threadcast.db")).await.unwrap());
    store.insert_posts(&[post("b1", 5)]).await.unwrap();

    let writer = ScriptWriter::new(Arc::new(
        AnthropicClient::new("a-key", "claude-sonnet-4-5").with_base_url(server.uri()),
    ));
    let backend = GoogleCloudBackend::from_config(&TtsConfig {
        google_api_key: Some("g-key".to_string()),
        google_base_url: server.uri(),
        ..TtsConfig::default()
    })
    .unwrap();
    let paths = GeneratorPaths {
        output_dir: dir.path().join("audio"),
        transcript_dir: dir.path().join("transcripts"),
        generation_log: None,
    };
    let generator = EpisodeGenerator::new(&store, writer, &backend, paths);

    let err = generator
        .generate(&request("carol"), &mut StdRng::seed_from_u64(1), &mut |_| {})
        .await
        .unwrap_err();

    assert!(matches!(err, EpisodeError::Script(_)));
    assert_eq!(store.count_episodes().await.unwrap(), 0);
}
