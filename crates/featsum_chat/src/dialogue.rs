//! Transport-agnostic dialogue controller.
//!
//! Drives a user from topic to category selection to a generated report.
//! Every operation returns [`Reply`] values; rendering them (chat message,
//! inline keyboard, terminal line) is left to the transport.

use std::sync::Arc;

use featsum_data::{list_categories, Row, RowProvider};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::display::split_message;
use crate::error::{ChatError, ChatResult, ReportError};
use crate::llm::new_request_id;
use crate::report::{ReportGenerator, ReportRequest};
use crate::session::{DialogueStep, SessionState, SessionStore, UserId};

const TOPIC_PROMPT: &str = "По какой теме агрегировать?\n\n\
    Примеры тем:\n\
    • Качество звука\n\
    • Wellbeing\n\
    • Умный дом";

const GREETING: &str = "👋 Привет! Я помогу вам получить агрегированные выводы и детальное \
    саммари по результатам тестов фичей.";

const HELP: &str = "📖 Справка по использованию бота:\n\n\
    1. Отправьте /start для начала работы\n\
    2. Введите тему для агрегации (например: 'Качество звука')\n\
    3. Выберите категории из предложенного списка\n\
    4. Нажмите 'Сгенерировать'\n\
    5. Получите агрегированные выводы и детальное саммари\n\n\
    Команды:\n\
    /start - начать работу\n\
    /help - показать эту справку\n\
    /cancel - отменить текущий диалог";

const CANCELLED: &str = "❌ Диалог отменен. Используйте /start для начала нового диалога.";
const EMPTY_TOPIC: &str = "Пожалуйста, введите тему для агрегации.";
const START_FIRST: &str = "Пожалуйста, начните с команды /start";
const SELECT_CATEGORY: &str = "Пожалуйста, выберите хотя бы одну категорию.";
const ALREADY_GENERATING: &str = "⏳ Отчет уже генерируется. Пожалуйста, подождите.";
const GENERATING: &str = "⏳ Генерирую отчет... Это может занять некоторое время.";
const DONE: &str = "✅ Отчет сгенерирован!\n\nИспользуйте /start для создания нового отчета.";
const NO_CATEGORIES: &str = "❌ Не удалось найти категории в Excel файле. Убедитесь, что файл \
    содержит колонку 'Категория' или 'Продукт'.";
const CATEGORIES_LOAD_FAILED: &str = "❌ Ошибка при загрузке категорий из Excel файла. \
    Проверьте путь к файлу и его структуру.";
const DATA_LOAD_FAILED: &str = "❌ Не удалось загрузить данные из Excel файла. \
    Проверьте путь к файлу и его структуру.";
const NO_DATA: &str = "❌ Нет данных по выбранным категориям. Выберите другие категории.";
const GENERATION_FAILED: &str = "❌ Ошибка при генерации отчета. Попробуйте еще раз или \
    используйте /cancel для отмены.";

const CATEGORIES_PER_ROW: usize = 3;
const SELECTED_PREFIX: &str = "✅ ";

/// Action carried by a keyboard button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "category", rename_all = "snake_case")]
pub enum CallbackAction {
    Cancel,
    StartNew,
    Generate,
    ToggleCategory(String),
}

impl CallbackAction {
    /// Parse a callback payload (`cancel`, `start_new`, `generate`,
    /// `category:<label>`).
    pub fn parse(payload: &str) -> Option<Self> {
        match payload {
            "cancel" => Some(Self::Cancel),
            "start_new" => Some(Self::StartNew),
            "generate" => Some(Self::Generate),
            other => other
                .strip_prefix("category:")
                .map(|label| Self::ToggleCategory(label.to_string())),
        }
    }

    /// The payload [`CallbackAction::parse`] accepts for this action.
    pub fn payload(&self) -> String {
        match self {
            Self::Cancel => "cancel".to_string(),
            Self::StartNew => "start_new".to_string(),
            Self::Generate => "generate".to_string(),
            Self::ToggleCategory(label) => format!("category:{}", label),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    pub label: String,
    pub action: CallbackAction,
}

impl Button {
    fn new(label: impl Into<String>, action: CallbackAction) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// A message for the user, optionally with a keyboard of buttons in rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub text: String,
    pub keyboard: Vec<Vec<Button>>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: Vec::new(),
        }
    }

    fn with_keyboard(mut self, keyboard: Vec<Vec<Button>>) -> Self {
        self.keyboard = keyboard;
        self
    }

    /// Every button, row by row.
    pub fn buttons(&self) -> impl Iterator<Item = &Button> {
        self.keyboard.iter().flatten()
    }
}

/// Keyboard for category selection: three labels per row, selected ones
/// marked, a generate button once anything is selected, and cancel.
pub fn category_keyboard(available: &[String], selected: &[String]) -> Vec<Vec<Button>> {
    let mut keyboard: Vec<Vec<Button>> = available
        .chunks(CATEGORIES_PER_ROW)
        .map(|row| {
            row.iter()
                .map(|category| {
                    let label = if selected.contains(category) {
                        format!("{}{}", SELECTED_PREFIX, category)
                    } else {
                        category.clone()
                    };
                    Button::new(label, CallbackAction::ToggleCategory(category.clone()))
                })
                .collect()
        })
        .collect();

    if !selected.is_empty() {
        keyboard.push(vec![Button::new("🚀 Сгенерировать", CallbackAction::Generate)]);
    }
    keyboard.push(vec![Button::new("❌ Отмена", CallbackAction::Cancel)]);
    keyboard
}

enum GenerateGate {
    Ready {
        token: String,
        topic: String,
        selected: Vec<String>,
    },
    Busy,
    Incomplete,
}

/// Routes user actions to the session store and the report pipeline.
pub struct DialogueController {
    store: Arc<SessionStore>,
    rows: Arc<dyn RowProvider>,
    generator: Arc<ReportGenerator>,
    max_message_chars: usize,
}

impl DialogueController {
    pub fn new(
        store: Arc<SessionStore>,
        rows: Arc<dyn RowProvider>,
        generator: Arc<ReportGenerator>,
    ) -> Self {
        Self {
            store,
            rows,
            generator,
            max_message_chars: 4000,
        }
    }

    pub fn with_max_message_chars(mut self, max_message_chars: usize) -> Self {
        self.max_message_chars = max_message_chars;
        self
    }

    /// Snapshot of a user's dialogue state.
    pub fn session(&self, user: UserId) -> Option<SessionState> {
        self.store.get(user)
    }

    /// Reset the user's dialogue and ask for a topic.
    pub fn start(&self, user: UserId) -> Reply {
        self.reset(user);
        Reply::text(format!("{}\n\n{}", GREETING, TOPIC_PROMPT))
    }

    pub fn help(&self) -> Reply {
        Reply::text(HELP)
    }

    pub fn cancel(&self, user: UserId) -> Reply {
        self.store.clear(user);
        info!(user_id = user, "Dialogue cancelled");
        Reply::text(CANCELLED)
    }

    /// Notice to show while [`DialogueController::generate`] runs.
    pub fn generating_notice(&self) -> Reply {
        Reply::text(GENERATING)
    }

    /// Accept a topic. Returns `None` when the user is not at the topic step.
    pub async fn submit_topic(&self, user: UserId, text: &str) -> Option<Reply> {
        let state = self.store.get(user)?;
        if state.step != DialogueStep::Topic {
            return None;
        }

        let topic = text.trim();
        if topic.is_empty() {
            return Some(Reply::text(EMPTY_TOPIC));
        }

        self.store.set(
            user,
            SessionState {
                topic: Some(topic.to_string()),
                step: DialogueStep::Categories,
                ..state
            },
        );

        let categories = match self.load_rows().await {
            Ok(rows) => list_categories(&rows),
            Err(e) => {
                error!(user_id = user, error = %e, "Failed to load categories");
                self.back_to_topic(user);
                return Some(Reply::text(CATEGORIES_LOAD_FAILED));
            }
        };

        if categories.is_empty() {
            self.back_to_topic(user);
            return Some(Reply::text(NO_CATEGORIES));
        }

        let keyboard = category_keyboard(&categories, &[]);
        self.store.update(user, |s| {
            s.available_categories = categories;
            s.selected_categories.clear();
        });
        info!(user_id = user, topic, "Topic set");

        Some(
            Reply::text(format!(
                "✅ Тема установлена: \"{}\"\n\nВыберите категории (можно выбрать несколько):",
                topic
            ))
            .with_keyboard(keyboard),
        )
    }

    /// Select or deselect an offered category.
    pub fn toggle_category(&self, user: UserId, category: &str) -> Reply {
        let toggled = self.store.update(user, |state| {
            if state.available_categories.is_empty() {
                return None;
            }
            if state.step == DialogueStep::Generating {
                return Some(Err(()));
            }
            if state.available_categories.iter().any(|c| c == category) {
                state.toggle_category(category);
            }
            Some(Ok(state.clone()))
        });

        match toggled.flatten() {
            None => Reply::text(START_FIRST),
            Some(Err(())) => Reply::text(ALREADY_GENERATING),
            Some(Ok(state)) => self.selection_reply(&state),
        }
    }

    /// Generate the report for the user's topic and selection.
    ///
    /// On success the report comes back split for display followed by a
    /// completion notice, and the session is cleared. A result whose
    /// generation is no longer the session's current one (cancelled, or
    /// cancelled and restarted) is discarded and nothing is returned.
    pub async fn generate(&self, user: UserId) -> Vec<Reply> {
        let gate = self.store.update(user, |state| {
            if state.step == DialogueStep::Generating {
                return GenerateGate::Busy;
            }
            match &state.topic {
                Some(topic) if !state.selected_categories.is_empty() => {
                    let token = new_request_id();
                    state.step = DialogueStep::Generating;
                    state.generation_id = Some(token.clone());
                    GenerateGate::Ready {
                        token,
                        topic: topic.clone(),
                        selected: state.selected_categories.clone(),
                    }
                }
                _ => GenerateGate::Incomplete,
            }
        });

        let (token, topic, selected) = match gate {
            Some(GenerateGate::Ready {
                token,
                topic,
                selected,
            }) => (token, topic, selected),
            Some(GenerateGate::Busy) => return vec![Reply::text(ALREADY_GENERATING)],
            Some(GenerateGate::Incomplete) | None => return vec![Reply::text(SELECT_CATEGORY)],
        };

        info!(user_id = user, topic = %topic, categories = selected.len(), "Generating report");

        let outcome = match self.load_rows().await {
            Ok(rows) => self
                .generator
                .generate_report(ReportRequest {
                    topic: &topic,
                    selected_categories: &selected,
                    rows: &rows,
                })
                .await
                .map_err(ChatError::from),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(report) => {
                if !self.store.clear_if(user, |s| s.is_generating(&token)) {
                    return self.discarded(user, &token);
                }
                let mut replies: Vec<Reply> = split_message(&report.content, self.max_message_chars)
                    .into_iter()
                    .map(Reply::text)
                    .collect();
                replies.push(Reply::text(DONE).with_keyboard(vec![vec![Button::new(
                    "🔄 Начать заново",
                    CallbackAction::StartNew,
                )]]));
                replies
            }
            Err(e) => {
                let state = self
                    .store
                    .update(user, |s| {
                        if !s.is_generating(&token) {
                            return None;
                        }
                        s.step = DialogueStep::Categories;
                        s.generation_id = None;
                        Some(s.clone())
                    })
                    .flatten();
                let Some(state) = state else {
                    return self.discarded(user, &token);
                };

                error!(user_id = user, error = %e, "Failed to generate report");
                let message = match &e {
                    ChatError::Report(ReportError::NoData(_)) => NO_DATA,
                    ChatError::Data(_) => DATA_LOAD_FAILED,
                    _ => GENERATION_FAILED,
                };
                vec![Reply::text(message).with_keyboard(category_keyboard(
                    &state.available_categories,
                    &state.selected_categories,
                ))]
            }
        }
    }

    /// Dispatch a keyboard callback payload.
    pub async fn handle_callback(&self, user: UserId, payload: &str) -> Vec<Reply> {
        match CallbackAction::parse(payload) {
            Some(CallbackAction::Cancel) => vec![self.cancel(user)],
            Some(CallbackAction::StartNew) => {
                self.reset(user);
                vec![Reply::text(TOPIC_PROMPT)]
            }
            Some(CallbackAction::Generate) => self.generate(user).await,
            Some(CallbackAction::ToggleCategory(category)) => {
                vec![self.toggle_category(user, &category)]
            }
            None => {
                warn!(user_id = user, payload, "Unknown callback payload");
                Vec::new()
            }
        }
    }

    fn discarded(&self, user: UserId, token: &str) -> Vec<Reply> {
        info!(
            user_id = user,
            generation_id = token,
            "Generation no longer current, discarding result"
        );
        Vec::new()
    }

    fn reset(&self, user: UserId) {
        self.store.clear(user);
        self.store.set(user, SessionState::new());
    }

    fn back_to_topic(&self, user: UserId) {
        self.store.update(user, |s| {
            s.topic = None;
            s.step = DialogueStep::Topic;
        });
    }

    fn selection_reply(&self, state: &SessionState) -> Reply {
        let topic = state.topic.as_deref().unwrap_or_default();
        let text = if state.selected_categories.is_empty() {
            format!("Тема: \"{}\"\n\nВыберите категории (можно выбрать несколько):", topic)
        } else {
            format!(
                "Тема: \"{}\"\n\nВыбрано: {}",
                topic,
                state.selected_categories.join(", ")
            )
        };
        Reply::text(text).with_keyboard(category_keyboard(
            &state.available_categories,
            &state.selected_categories,
        ))
    }

    async fn load_rows(&self) -> ChatResult<Arc<Vec<Row>>> {
        let provider = Arc::clone(&self.rows);
        let rows = tokio::task::spawn_blocking(move || provider.rows())
            .await
            .map_err(|e| ChatError::Task(e.to_string()))??;
        Ok(rows)
    }
}
