use std::sync::Arc;

use serde_json::json;

use super::*;
use crate::api::{
    settings_complete, DeletePromptRequest, HistoryIndexPayload, ModelKind, Prompt, PromptKind,
    SelectModelRequest,
};
use crate::core::error::SettingsError;
use crate::core::message::Sender;
use crate::core::session_pointer::MemorySessionPointer;
use crate::utils::test_utils::{Call, FakeBackend};

struct Harness {
    backend: Arc<FakeBackend>,
    pointer: Arc<MemorySessionPointer>,
    controller: Arc<ChatController>,
}

fn harness_with_pointer(pointer: MemorySessionPointer) -> Harness {
    let backend = Arc::new(FakeBackend::new());
    let pointer = Arc::new(pointer);
    let controller = Arc::new(ChatController::new(
        backend.clone(),
        pointer.clone(),
        ControllerOptions::default(),
    ));
    Harness {
        backend,
        pointer,
        controller,
    }
}

fn harness() -> Harness {
    harness_with_pointer(MemorySessionPointer::new())
}

fn summary(messages: &[Message]) -> Vec<(u64, Sender, &str)> {
    messages
        .iter()
        .map(|message| (message.id, message.sender, message.text.as_str()))
        .collect()
}

async fn wait_for_len(controller: &ChatController, len: usize) {
    let mut rx = controller.subscribe_transcript();
    rx.wait_for(|transcript| transcript.messages.len() == len)
        .await
        .expect("store alive");
}

fn two_exchange_session() -> Vec<serde_json::Value> {
    vec![
        json!({ "title": "Budget", "date": "2024-05-01 10:00:00.000000" }),
        json!({ "query": "a", "response": "b" }),
        json!({ "query": "c", "response": "d" }),
    ]
}

#[tokio::test]
async fn submit_shows_placeholder_then_streams_reply() {
    let h = harness();
    let feed = h.backend.script_reply();

    let controller = h.controller.clone();
    let task = tokio::spawn(async move { controller.submit("hello", true).await });

    wait_for_len(&h.controller, 2).await;
    assert_eq!(
        summary(&h.controller.messages()),
        vec![(1, Sender::User, "hello"), (2, Sender::Bot, "")]
    );
    assert!(h.controller.is_sending());

    feed.send("Hi");
    feed.send(" there");
    drop(feed);

    let reply = task.await.expect("join").expect("reply");
    assert_eq!(reply.id, 2);
    assert_eq!(reply.text, "Hi there");
    assert!(!reply.detached);
    assert_eq!(
        summary(&h.controller.messages()),
        vec![(1, Sender::User, "hello"), (2, Sender::Bot, "Hi there")]
    );
    assert_eq!(h.controller.activity(), Activity::Idle);

    let calls = h.backend.calls();
    assert!(matches!(
        &calls[0],
        Call::Query(QueryRequest { query, use_query_engine: true }) if query == "hello"
    ));
}

#[tokio::test]
async fn empty_query_never_reaches_the_backend() {
    let h = harness();
    let result = h.controller.submit("   \n", false).await;

    assert!(matches!(result, Err(SendError::EmptyQuery)));
    assert!(h.controller.messages().is_empty());
    assert!(h.backend.calls().is_empty());
}

#[tokio::test]
async fn second_submit_while_sending_is_rejected() {
    let h = harness();
    let feed = h.backend.script_reply();

    let controller = h.controller.clone();
    let first = tokio::spawn(async move { controller.submit("one", false).await });
    wait_for_len(&h.controller, 2).await;

    let second = h.controller.submit("two", false).await;
    assert!(matches!(second, Err(SendError::Busy(Activity::Sending))));
    assert_eq!(h.controller.messages().len(), 2);

    drop(feed);
    first.await.expect("join").expect("reply");
}

#[tokio::test]
async fn refused_submit_keeps_pending_switch_waiting() {
    let h = harness();
    let feed = h.backend.script_reply();

    let controller = h.controller.clone();
    let first = tokio::spawn(async move { controller.submit("one", false).await });
    wait_for_len(&h.controller, 2).await;

    assert!(h.controller.submit("two", false).await.is_err());
    assert_eq!(h.controller.activity(), Activity::Sending);

    let controller = h.controller.clone();
    let switch = tokio::spawn(async move { controller.switch_model(ModelTarget::llm("mistral")).await });
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(h.backend.count(|call| matches!(call, Call::SelectModel(_))), 0);
    assert_eq!(h.backend.count(|call| matches!(call, Call::Query(_))), 1);

    drop(feed);
    first.await.expect("join").expect("reply");
    switch.await.expect("join");
    assert_eq!(h.backend.count(|call| matches!(call, Call::SelectModel(_))), 1);
}

#[tokio::test]
async fn follow_up_ids_continue_after_loaded_session() {
    let h = harness();
    h.backend.add_session("session_7.json", two_exchange_session());
    h.controller
        .select_session("session_7.json")
        .await
        .expect("load");

    h.backend.script_complete_reply(&["e", "f"]);
    let reply = h.controller.submit("next", false).await.expect("reply");

    assert_eq!(reply.id, 6);
    assert_eq!(
        summary(&h.controller.messages()),
        vec![
            (1, Sender::User, "a"),
            (2, Sender::Bot, "b"),
            (3, Sender::User, "c"),
            (4, Sender::Bot, "d"),
            (5, Sender::User, "next"),
            (6, Sender::Bot, "ef"),
        ]
    );
}

#[tokio::test]
async fn connection_failure_keeps_the_user_turn() {
    let h = harness();
    h.backend
        .script_refusal(BackendError::Interrupted("connection refused".into()));

    let result = h.controller.submit("anyone there?", true).await;

    assert!(matches!(result, Err(SendError::Connection(_))));
    assert_eq!(
        summary(&h.controller.messages()),
        vec![(1, Sender::User, "anyone there?")]
    );
    assert_eq!(h.controller.activity(), Activity::Idle);
}

#[tokio::test]
async fn mid_stream_failure_keeps_partial_reply() {
    let h = harness();
    let feed = h.backend.script_reply();

    let controller = h.controller.clone();
    let task = tokio::spawn(async move { controller.submit("explain", true).await });
    wait_for_len(&h.controller, 2).await;

    feed.send("The short answer");
    feed.fail("connection reset");

    match task.await.expect("join") {
        Err(SendError::Interrupted { partial, .. }) => assert_eq!(partial, "The short answer"),
        other => panic!("expected interruption, got {other:?}"),
    }
    assert_eq!(h.controller.messages()[1].text, "The short answer");
    assert!(!h.controller.is_sending());
}

#[tokio::test]
async fn select_session_replaces_transcript_and_pointer() {
    let h = harness();
    h.backend.add_session("session_7.json", two_exchange_session());

    let loaded = h
        .controller
        .select_session("session_7.json")
        .await
        .expect("load");

    assert_eq!(loaded.title.as_deref(), Some("Budget"));
    assert_eq!(loaded.exchanges, 2);
    assert_eq!(
        summary(&h.controller.messages()),
        vec![
            (1, Sender::User, "a"),
            (2, Sender::Bot, "b"),
            (3, Sender::User, "c"),
            (4, Sender::Bot, "d"),
        ]
    );
    assert_eq!(h.controller.active_session().as_deref(), Some("session_7.json"));
    assert_eq!(h.pointer.load().as_deref(), Some("session_7.json"));

    let first = h.controller.messages();
    h.controller
        .select_session("session_7.json")
        .await
        .expect("reload");
    assert_eq!(h.controller.messages(), first);
}

#[tokio::test]
async fn failed_session_load_leaves_everything_in_place() {
    let h = harness();
    h.backend.script_complete_reply(&["pong"]);
    h.controller.submit("ping", false).await.expect("reply");
    let before = h.controller.messages();

    let missing = h.controller.select_session("session_404.json").await;
    assert!(matches!(missing, Err(SessionLoadError::Fetch(_))));

    h.backend.add_session(
        "session_bad.json",
        vec![json!({ "title": "x" }), json!({ "question": "?" })],
    );
    let malformed = h.controller.select_session("session_bad.json").await;
    assert!(matches!(
        malformed,
        Err(SessionLoadError::Malformed { index: 1, .. })
    ));

    assert_eq!(h.controller.messages(), before);
    assert_eq!(h.controller.active_session(), None);
    assert_eq!(h.pointer.load(), None);
}

#[tokio::test]
async fn switching_session_mid_stream_detaches_the_reply() {
    let h = harness();
    h.backend.add_session("session_2.json", two_exchange_session());
    let feed = h.backend.script_reply();

    let controller = h.controller.clone();
    let task = tokio::spawn(async move { controller.submit("first question", true).await });
    wait_for_len(&h.controller, 2).await;
    feed.send("early ");

    h.controller
        .select_session("session_2.json")
        .await
        .expect("load");
    let loaded = h.controller.messages();

    feed.send("late");
    drop(feed);

    let reply = task.await.expect("join").expect("reply");
    assert!(reply.detached);
    assert_eq!(reply.text, "early late");
    assert_eq!(h.controller.messages(), loaded);
}

#[tokio::test]
async fn restore_on_startup_loads_the_remembered_session() {
    let h = harness_with_pointer(MemorySessionPointer::with_handle("session_7.json"));
    h.backend.add_session("session_7.json", two_exchange_session());

    let restored = h.controller.restore_on_startup().await.expect("restore");

    assert_eq!(restored.map(|s| s.handle).as_deref(), Some("session_7.json"));
    assert_eq!(h.controller.messages().len(), 4);
}

#[tokio::test]
async fn restore_without_pointer_does_nothing() {
    let h = harness();
    assert_eq!(h.controller.restore_on_startup().await.expect("restore"), None);
    assert!(h.backend.calls().is_empty());
}

#[tokio::test]
async fn new_session_clears_then_tells_backend_then_refreshes_history() {
    let h = harness();
    h.backend.add_session("session_7.json", two_exchange_session());
    h.controller
        .select_session("session_7.json")
        .await
        .expect("load");
    h.backend.set_history(Some(HistoryIndexPayload::Flat(vec![
        json!("session_7.json"),
        json!("session_8.json"),
    ])));

    h.controller.start_new_session().await;

    assert!(h.controller.messages().is_empty());
    assert_eq!(h.controller.active_session(), None);
    assert_eq!(h.pointer.load(), None);
    assert_eq!(h.controller.history().len(), 2);

    let calls = h.backend.calls();
    let tail: Vec<_> = calls.iter().skip(1).collect();
    assert!(matches!(tail.as_slice(), [Call::NewChat, Call::HistoryIndex]));

    h.backend.script_complete_reply(&["fresh"]);
    let reply = h.controller.submit("again", false).await.expect("reply");
    assert_eq!(reply.id, 2);
}

#[tokio::test]
async fn history_failure_keeps_previous_catalog() {
    let h = harness();
    h.backend.set_history(Some(HistoryIndexPayload::Flat(vec![
        json!(["Groceries", "session_1.json"]),
    ])));
    h.controller.load_history_index().await.expect("history");

    h.backend.set_history(None);
    assert!(h.controller.load_history_index().await.is_err());
    assert_eq!(h.controller.history()[0].title, "Groceries");
}

#[tokio::test]
async fn model_switch_waits_for_reply_to_finish() {
    let h = harness();
    let feed = h.backend.script_reply();

    let controller = h.controller.clone();
    let send = tokio::spawn(async move { controller.submit("long answer", true).await });
    wait_for_len(&h.controller, 2).await;

    let controller = h.controller.clone();
    let switch = tokio::spawn(async move { controller.switch_model(ModelTarget::llm("mistral")).await });
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(h.backend.count(|call| matches!(call, Call::SelectModel(_))), 0);

    feed.send("done");
    drop(feed);
    send.await.expect("join").expect("reply");
    switch.await.expect("join");

    let calls = h.backend.calls();
    let query_at = calls.iter().position(|c| matches!(c, Call::Query(_)));
    let select_at = calls.iter().position(|c| matches!(c, Call::SelectModel(_)));
    assert!(query_at < select_at);
    assert_eq!(h.controller.models().selected_llm.as_deref(), Some("mistral"));
    assert_eq!(h.controller.activity(), Activity::Idle);
}

#[tokio::test]
async fn model_switch_when_idle_goes_straight_through() {
    let h = harness();
    h.controller.switch_model(ModelTarget::embed("bge-m3")).await;

    let calls = h.backend.calls();
    assert!(matches!(
        calls.as_slice(),
        [Call::SelectModel(SelectModelRequest { model, kind: Some(ModelKind::Embed) }), Call::ListModels]
            if model == "bge-m3"
    ));
    let models = h.controller.models();
    assert_eq!(models.selected(ModelKind::Embed), Some("bge-m3"));
    assert!(models.contains(ModelKind::Embed, "bge-m3"));
}

#[tokio::test]
async fn delete_model_refreshes_catalog() {
    let h = harness();
    h.controller.delete_model("mistral").await;

    assert!(!h.controller.models().contains(ModelKind::Llm, "mistral"));
    assert_eq!(h.controller.activity(), Activity::Idle);
}

#[tokio::test]
async fn upload_sends_every_file_and_metadata_once() {
    let h = harness();
    h.controller
        .upload_documents(
            vec![
                UploadFile::new("a.pdf", b"%PDF-1.7".to_vec()),
                UploadFile::new("b.md", b"# notes".to_vec()),
            ],
            vec![MetadataPair::new("project", "apollo")],
        )
        .await
        .expect("upload");

    let calls = h.backend.calls();
    let [Call::AddDocuments(batch)] = calls.as_slice() else {
        panic!("expected one upload, got {calls:?}");
    };
    let names: Vec<&str> = batch.files.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["a.pdf", "b.md"]);
    assert_eq!(batch.metadata, vec![MetadataPair::new("project", "apollo")]);
    assert!(!h.controller.is_uploading());
}

#[tokio::test]
async fn upload_failure_clears_the_flag() {
    let h = harness();
    h.backend.fail_uploads(true);

    let result = h
        .controller
        .upload_documents(vec![UploadFile::new("a.txt", b"x".to_vec())], Vec::new())
        .await;

    assert!(matches!(result, Err(UploadError::Backend(_))));
    assert!(!h.controller.is_uploading());
}

#[tokio::test]
async fn upload_without_files_is_rejected_locally() {
    let h = harness();
    let result = h.controller.upload_documents(Vec::new(), Vec::new()).await;

    assert!(matches!(result, Err(UploadError::NoFiles)));
    assert!(h.backend.calls().is_empty());
}

#[tokio::test]
async fn update_setting_posts_the_whole_document() {
    let h = harness();
    h.backend.set_settings(json!({
        "database": "neo4j",
        "password": null,
        "chunk_size": 1024
    }));

    let updated = h
        .controller
        .update_setting("password", json!("hunter2"))
        .await
        .expect("update");
    assert_eq!(updated["chunk_size"], 1024);

    let posted: Vec<_> = h
        .backend
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::UpdateSettings(body) => Some(body),
            _ => None,
        })
        .collect();
    assert_eq!(
        posted,
        vec![json!({ "database": "neo4j", "password": "hunter2", "chunk_size": 1024 })]
    );
    assert!(settings_complete(&h.controller.settings().await.expect("settings")));
}

#[tokio::test]
async fn unknown_setting_never_reaches_the_backend() {
    let h = harness();
    h.backend.set_settings(json!({ "chunk_size": 1024 }));

    let err = h.controller.update_setting("chunk_sise", json!(512)).await.unwrap_err();
    assert!(matches!(err, SettingsError::UnknownKey { .. }));
    assert_eq!(h.backend.count(|call| matches!(call, Call::UpdateSettings(_))), 0);
}

#[tokio::test]
async fn save_prompt_sends_back_the_full_library() {
    let h = harness();
    h.controller
        .save_prompt(PromptKind::Chat, Prompt::new("terse", "One line. {context_str}"), true)
        .await
        .expect("save");

    let body = h
        .backend
        .calls()
        .into_iter()
        .find_map(|call| match call {
            Call::UpdatePrompts(body) => Some(body),
            _ => None,
        })
        .expect("prompts posted");
    assert_eq!(body["Chat"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["LLM"][0]["label"], "default_prompt");
    assert_eq!(body["selectedChatEnginePrompt"]["label"], "terse");
    assert_eq!(body["defaults"]["Chat"]["label"], "default_prompt");
}

#[tokio::test]
async fn select_prompt_requires_an_existing_label() {
    let h = harness();
    let err = h.controller.select_prompt(PromptKind::Llm, "pirate").await.unwrap_err();
    assert!(matches!(err, SettingsError::NoSuchPrompt { .. }));
    assert_eq!(h.backend.count(|call| matches!(call, Call::UpdatePrompts(_))), 0);

    h.controller
        .select_prompt(PromptKind::Llm, "default_prompt")
        .await
        .expect("select");
    assert_eq!(h.backend.count(|call| matches!(call, Call::UpdatePrompts(_))), 1);
}

#[tokio::test]
async fn delete_prompt_names_family_and_label() {
    let h = harness();
    h.controller
        .delete_prompt(PromptKind::Chat, "default_prompt")
        .await
        .expect("delete");
    assert!(h.backend.calls().iter().any(|call| matches!(
        call,
        Call::DeletePrompt(DeletePromptRequest { kind: PromptKind::Chat, label }) if label == "default_prompt"
    )));

    assert!(h.controller.delete_prompt(PromptKind::Llm, "missing").await.is_err());
    assert_eq!(h.backend.count(|call| matches!(call, Call::DeletePrompt(_))), 1);
}
