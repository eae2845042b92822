//! Full pipeline runs against HTTP provider stand-ins.

mod common;

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use secrecy::SecretString;
use serde_json::json;

use common::harness::{LESSON, OWNER};
use common::{wait_for_terminal, TestHarness};
use lexora::{ElevenLabsClient, LipSyncClient, SubmitRequest, VideoStatus};

fn clients(server: &mockito::Server) -> (Arc<ElevenLabsClient>, Arc<LipSyncClient>) {
    let speech = ElevenLabsClient::new(
        Client::new(),
        Some(SecretString::from("tts-key".to_string())),
        &format!("{}/v1", server.url()),
        "eleven_monolingual_v1",
    );
    let lipsync = LipSyncClient::new(
        Client::new(),
        Some(SecretString::from("hf-key".to_string())),
        &format!("{}/run/predict", server.url()),
    );
    (Arc::new(speech), Arc::new(lipsync))
}

fn request() -> SubmitRequest {
    SubmitRequest {
        user_id: OWNER,
        lesson_id: LESSON,
        voice_id: None,
        avatar: None,
    }
}

#[tokio::test]
async fn test_reference_result_is_downloaded() {
    let mut server = mockito::Server::new_async().await;
    let _tts = server
        .mock("POST", "/v1/text-to-speech/voice-default")
        .with_status(200)
        .with_body(b"remote-audio")
        .create_async()
        .await;
    let result_url = format!("{}/file/out.mp4", server.url());
    let _predict = server
        .mock("POST", "/run/predict")
        .match_header("authorization", "Bearer hf-key")
        .with_status(200)
        .with_body(json!({ "data": [result_url] }).to_string())
        .create_async()
        .await;
    let download = server
        .mock("GET", "/file/out.mp4")
        .with_status(200)
        .with_body(b"fetched-video-bytes")
        .expect(1)
        .create_async()
        .await;

    let harness = TestHarness::new();
    harness.install_default_avatar(OWNER);
    let (speech, lipsync) = clients(&server);
    let service = harness.start_service(speech, lipsync).await;

    let receipt = service.submit(request()).await.unwrap();
    let job = wait_for_terminal(&service, &receipt.job_id).await;

    assert_eq!(job.status, VideoStatus::Completed);
    download.assert_async().await;

    let storage = service.storage();
    let video = storage.resolve_reference(job.video_url.as_deref().unwrap());
    let audio = storage.resolve_reference(job.audio_url.as_deref().unwrap());
    assert_eq!(std::fs::read(video).unwrap(), b"fetched-video-bytes");
    assert_eq!(std::fs::read(audio).unwrap(), b"remote-audio");

    service.shutdown().await;
}

#[tokio::test]
async fn test_inline_result_is_decoded() {
    let mut server = mockito::Server::new_async().await;
    let _tts = server
        .mock("POST", "/v1/text-to-speech/voice-default")
        .with_status(200)
        .with_body(b"remote-audio")
        .create_async()
        .await;
    let inline = format!("data:video/mp4;base64,{}", STANDARD.encode(b"inline-video"));
    let _predict = server
        .mock("POST", "/run/predict")
        .with_status(200)
        .with_body(json!({ "data": [inline] }).to_string())
        .create_async()
        .await;

    let harness = TestHarness::new();
    harness.install_default_avatar(OWNER);
    let (speech, lipsync) = clients(&server);
    let service = harness.start_service(speech, lipsync).await;

    let receipt = service.submit(request()).await.unwrap();
    let job = wait_for_terminal(&service, &receipt.job_id).await;

    assert_eq!(job.status, VideoStatus::Completed);
    let video = service
        .storage()
        .resolve_reference(job.video_url.as_deref().unwrap());
    assert_eq!(std::fs::read(video).unwrap(), b"inline-video");

    service.shutdown().await;
}

#[tokio::test]
async fn test_speech_error_status_never_reaches_lipsync() {
    let mut server = mockito::Server::new_async().await;
    let _tts = server
        .mock("POST", "/v1/text-to-speech/voice-default")
        .with_status(401)
        .with_body("invalid api key")
        .create_async()
        .await;
    let predict = server
        .mock("POST", "/run/predict")
        .expect(0)
        .create_async()
        .await;

    let harness = TestHarness::new();
    harness.install_default_avatar(OWNER);
    let (speech, lipsync) = clients(&server);
    let service = harness.start_service(speech, lipsync).await;

    let receipt = service.submit(request()).await.unwrap();
    let job = wait_for_terminal(&service, &receipt.job_id).await;

    assert_eq!(job.status, VideoStatus::Failed);
    assert_eq!(
        job.failure_reason.as_deref(),
        Some("audio generation failed: provider returned status 401: invalid api key")
    );
    predict.assert_async().await;

    service.shutdown().await;
}
