//! Integration tests for the dialogue controller.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use featsum_chat::mock::ScriptedBackend;
use featsum_chat::{
    CallbackAction, CompletionClient, DialogueController, DialogueStep, ReportGenerator,
    SessionStore, TransportError,
};
use featsum_data::{DataError, DataResult, Row, RowProvider, StaticRows, Year};
use featsum_prompts::PromptLoader;

const USER: i64 = 42;
const VALID_REPORT: &str = "• Лучший звук у Alpha\n\n• Фича: ANC\nГод: 2023\nПроект: Alpha";

fn sample_rows() -> Vec<Row> {
    vec![
        Row::new("ANC", Year::Numeric(2023), "MOS", "4.2", 1.0, "Alpha")
            .with_product("Buds")
            .with_category("Audio"),
        Row::new("ANC", Year::Numeric(2023), "MOS", "3.9", 2.0, "Beta")
            .with_product("Buds")
            .with_category("Audio"),
        Row::new("Sleep", Year::Numeric(2024), "Score", "88", 1.0, "Gamma")
            .with_product("Watch")
            .with_category("Wellbeing"),
    ]
}

fn controller(backend: &ScriptedBackend, rows: Arc<dyn RowProvider>) -> DialogueController {
    let client = CompletionClient::new(Arc::new(backend.clone()));
    let generator = ReportGenerator::new(client, PromptLoader::builtin());
    DialogueController::new(Arc::new(SessionStore::new()), rows, Arc::new(generator))
}

fn static_controller(backend: &ScriptedBackend) -> DialogueController {
    controller(backend, Arc::new(StaticRows::new(sample_rows())))
}

/// Serves the sample rows once, then rows of an unrelated category.
struct ShiftingRows {
    calls: AtomicUsize,
}

impl RowProvider for ShiftingRows {
    fn rows(&self) -> DataResult<Arc<Vec<Row>>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Ok(Arc::new(sample_rows()))
        } else {
            Ok(Arc::new(vec![Row::new(
                "Voice",
                Year::Numeric(2024),
                "WER",
                "5%",
                1.0,
                "Delta",
            )
            .with_category("Smart Home")]))
        }
    }
}

struct BrokenRows;

impl RowProvider for BrokenRows {
    fn rows(&self) -> DataResult<Arc<Vec<Row>>> {
        Err(DataError::NotFound("missing.xlsx".into()))
    }
}

/// Test the whole flow from /start to a delivered report.
#[tokio::test]
async fn test_full_dialogue() {
    let backend = ScriptedBackend::new().reply(VALID_REPORT);
    let dialogue = static_controller(&backend);

    let greeting = dialogue.start(USER);
    assert!(greeting.text.contains("По какой теме агрегировать?"));
    assert_eq!(dialogue.session(USER).unwrap().step, DialogueStep::Topic);

    let reply = dialogue.submit_topic(USER, "  Качество звука ").await.unwrap();
    assert!(reply.text.contains("\"Качество звука\""));
    let labels: Vec<&str> = reply.buttons().map(|b| b.label.as_str()).collect();
    assert_eq!(labels, vec!["Audio", "Wellbeing", "❌ Отмена"]);

    let session = dialogue.session(USER).unwrap();
    assert_eq!(session.step, DialogueStep::Categories);
    assert_eq!(session.topic.as_deref(), Some("Качество звука"));
    assert_eq!(session.available_categories, vec!["Audio", "Wellbeing"]);

    let replies = dialogue.handle_callback(USER, "category:Audio").await;
    assert_eq!(replies.len(), 1);
    let labels: Vec<&str> = replies[0].buttons().map(|b| b.label.as_str()).collect();
    assert_eq!(
        labels,
        vec!["✅ Audio", "Wellbeing", "🚀 Сгенерировать", "❌ Отмена"]
    );

    let replies = dialogue.handle_callback(USER, "generate").await;
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0].text, VALID_REPORT);
    assert!(replies[1].text.starts_with("✅ Отчет сгенерирован!"));
    assert_eq!(
        replies[1].buttons().next().map(|b| b.action.clone()),
        Some(CallbackAction::StartNew)
    );

    assert!(dialogue.session(USER).is_none());
    let request = &backend.requests()[0];
    assert!(request.user.contains("Alpha"));
    assert!(!request.user.contains("Gamma"));
}

/// Test that free text outside the topic step is ignored.
#[tokio::test]
async fn test_topic_outside_topic_step() {
    let backend = ScriptedBackend::new();
    let dialogue = static_controller(&backend);

    assert!(dialogue.submit_topic(USER, "Звук").await.is_none());

    dialogue.start(USER);
    let reply = dialogue.submit_topic(USER, "   ").await.unwrap();
    assert!(reply.text.contains("введите тему"));
    assert_eq!(dialogue.session(USER).unwrap().step, DialogueStep::Topic);

    dialogue.submit_topic(USER, "Звук").await.unwrap();
    assert!(dialogue.submit_topic(USER, "Другая тема").await.is_none());
}

/// Test toggling on and off and toggling without a session.
#[tokio::test]
async fn test_toggle_category() {
    let backend = ScriptedBackend::new();
    let dialogue = static_controller(&backend);

    let reply = dialogue.toggle_category(USER, "Audio");
    assert!(reply.text.contains("/start"));

    dialogue.start(USER);
    dialogue.submit_topic(USER, "Звук").await.unwrap();

    dialogue.toggle_category(USER, "Wellbeing");
    dialogue.toggle_category(USER, "Audio");
    dialogue.toggle_category(USER, "Unknown");
    assert_eq!(
        dialogue.session(USER).unwrap().selected_categories,
        vec!["Wellbeing", "Audio"]
    );

    let reply = dialogue.toggle_category(USER, "Wellbeing");
    assert!(reply.text.contains("Выбрано: Audio"));
    assert_eq!(
        dialogue.session(USER).unwrap().selected_categories,
        vec!["Audio"]
    );
}

/// Test that generation needs a topic and at least one category.
#[tokio::test]
async fn test_generate_requires_selection() {
    let backend = ScriptedBackend::new().reply(VALID_REPORT);
    let dialogue = static_controller(&backend);

    let replies = dialogue.generate(USER).await;
    assert!(replies[0].text.contains("хотя бы одну категорию"));

    dialogue.start(USER);
    dialogue.submit_topic(USER, "Звук").await.unwrap();
    let replies = dialogue.generate(USER).await;
    assert!(replies[0].text.contains("хотя бы одну категорию"));
    assert_eq!(backend.call_count(), 0);
}

/// Test that a selection without rows gets its own message and keeps the session.
#[tokio::test]
async fn test_no_data_message() {
    let backend = ScriptedBackend::new().reply(VALID_REPORT);
    let dialogue = controller(
        &backend,
        Arc::new(ShiftingRows {
            calls: AtomicUsize::new(0),
        }),
    );

    dialogue.start(USER);
    dialogue.submit_topic(USER, "Звук").await.unwrap();
    dialogue.toggle_category(USER, "Audio");

    let replies = dialogue.generate(USER).await;
    assert_eq!(replies.len(), 1);
    assert!(replies[0].text.contains("Нет данных"));
    assert!(replies[0]
        .buttons()
        .any(|b| b.action == CallbackAction::Generate));

    let session = dialogue.session(USER).unwrap();
    assert_eq!(session.step, DialogueStep::Categories);
    assert_eq!(session.selected_categories, vec!["Audio"]);
    assert_eq!(backend.call_count(), 0);
}

/// Test that a backend failure is reported and generation can be retried.
#[tokio::test]
async fn test_generation_failure_then_retry() {
    let backend = ScriptedBackend::new()
        .fail(TransportError::RateLimited("429".into()))
        .reply(VALID_REPORT);
    let dialogue = static_controller(&backend);

    dialogue.start(USER);
    dialogue.submit_topic(USER, "Звук").await.unwrap();
    dialogue.toggle_category(USER, "Audio");

    let replies = dialogue.generate(USER).await;
    assert!(replies[0].text.contains("Ошибка при генерации отчета"));
    assert_eq!(
        dialogue.session(USER).unwrap().step,
        DialogueStep::Categories
    );

    let replies = dialogue.generate(USER).await;
    assert_eq!(replies[0].text, VALID_REPORT);
    assert!(dialogue.session(USER).is_none());
}

/// Test that data source failures surface while loading categories.
#[tokio::test]
async fn test_data_error_on_topic() {
    let backend = ScriptedBackend::new();
    let dialogue = controller(&backend, Arc::new(BrokenRows));

    dialogue.start(USER);
    let reply = dialogue.submit_topic(USER, "Звук").await.unwrap();
    assert!(reply.text.contains("Ошибка при загрузке категорий"));

    let session = dialogue.session(USER).unwrap();
    assert_eq!(session.step, DialogueStep::Topic);
    assert!(session.topic.is_none());
}

/// Test that a second generate is refused and a cancelled result is dropped.
#[tokio::test]
async fn test_cancel_during_generation_discards_result() {
    let backend = ScriptedBackend::gated().reply(VALID_REPORT);
    let dialogue = Arc::new(static_controller(&backend));

    dialogue.start(USER);
    dialogue.submit_topic(USER, "Звук").await.unwrap();
    dialogue.toggle_category(USER, "Audio");

    let in_flight = {
        let dialogue = Arc::clone(&dialogue);
        tokio::spawn(async move { dialogue.generate(USER).await })
    };
    while backend.call_count() == 0 {
        tokio::task::yield_now().await;
    }

    let replies = dialogue.generate(USER).await;
    assert!(replies[0].text.contains("уже генерируется"));
    let reply = dialogue.toggle_category(USER, "Wellbeing");
    assert!(reply.text.contains("уже генерируется"));

    dialogue.cancel(USER);
    backend.release(1);

    let replies = in_flight.await.unwrap();
    assert!(replies.is_empty());
    assert!(dialogue.session(USER).is_none());
    assert_eq!(backend.call_count(), 1);
}

/// Test that a cancelled generation cannot deliver into a restarted dialogue.
#[tokio::test]
async fn test_stale_generation_after_restart_is_discarded() {
    let stale_report = "• Старый отчет\nПроект: Alpha";
    let backend = ScriptedBackend::gated()
        .reply(stale_report)
        .reply(VALID_REPORT);
    let dialogue = Arc::new(static_controller(&backend));

    dialogue.start(USER);
    dialogue.submit_topic(USER, "Звук").await.unwrap();
    dialogue.toggle_category(USER, "Audio");

    let first = {
        let dialogue = Arc::clone(&dialogue);
        tokio::spawn(async move { dialogue.generate(USER).await })
    };
    while backend.call_count() < 1 {
        tokio::task::yield_now().await;
    }

    dialogue.cancel(USER);
    dialogue.start(USER);
    dialogue.submit_topic(USER, "Wellbeing").await.unwrap();
    dialogue.toggle_category(USER, "Wellbeing");

    let second = {
        let dialogue = Arc::clone(&dialogue);
        tokio::spawn(async move { dialogue.generate(USER).await })
    };
    while backend.call_count() < 2 {
        tokio::task::yield_now().await;
    }
    let restarted = dialogue.session(USER).unwrap();
    assert_eq!(restarted.step, DialogueStep::Generating);

    backend.release(1);
    let replies = first.await.unwrap();
    assert!(replies.is_empty());

    let session = dialogue.session(USER).unwrap();
    assert_eq!(session.step, DialogueStep::Generating);
    assert_eq!(session.topic.as_deref(), Some("Wellbeing"));
    assert_eq!(session.generation_id, restarted.generation_id);

    backend.release(1);
    let replies = second.await.unwrap();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0].text, VALID_REPORT);
    assert!(dialogue.session(USER).is_none());
}

/// Test that long reports are split for display.
#[tokio::test]
async fn test_long_report_is_split() {
    let paragraph = "• Проект: Alpha показал стабильный рост";
    let report = vec![paragraph; 6].join("\n\n");
    let backend = ScriptedBackend::new().reply(report.clone());
    let dialogue = static_controller(&backend).with_max_message_chars(100);

    dialogue.start(USER);
    dialogue.submit_topic(USER, "Звук").await.unwrap();
    dialogue.toggle_category(USER, "Audio");

    let replies = dialogue.generate(USER).await;
    let pieces = &replies[..replies.len() - 1];
    assert!(pieces.len() > 1);
    assert!(pieces.iter().all(|r| r.text.chars().count() <= 100));
    assert_eq!(
        pieces
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"),
        report
    );
}

/// Test the start_new and cancel callbacks.
#[tokio::test]
async fn test_start_new_and_cancel_callbacks() {
    let backend = ScriptedBackend::new();
    let dialogue = static_controller(&backend);

    dialogue.start(USER);
    dialogue.submit_topic(USER, "Звук").await.unwrap();

    let replies = dialogue.handle_callback(USER, "start_new").await;
    assert!(replies[0].text.starts_with("По какой теме агрегировать?"));
    let session = dialogue.session(USER).unwrap();
    assert_eq!(session.step, DialogueStep::Topic);
    assert!(session.available_categories.is_empty());

    let replies = dialogue.handle_callback(USER, "cancel").await;
    assert!(replies[0].text.starts_with("❌ Диалог отменен"));
    assert!(dialogue.session(USER).is_none());

    assert!(dialogue.handle_callback(USER, "bogus").await.is_empty());
}

/// Test that sessions of different users do not interfere.
#[tokio::test]
async fn test_users_are_isolated() {
    let backend = ScriptedBackend::new();
    let dialogue = static_controller(&backend);

    dialogue.start(1);
    dialogue.start(2);
    dialogue.submit_topic(1, "Звук").await.unwrap();
    dialogue.toggle_category(1, "Audio");

    assert_eq!(dialogue.session(2).unwrap().step, DialogueStep::Topic);
    assert!(dialogue.session(2).unwrap().selected_categories.is_empty());

    dialogue.cancel(1);
    assert!(dialogue.session(1).is_none());
    assert!(dialogue.session(2).is_some());
}
