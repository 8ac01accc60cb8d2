//! Named backends with one selected at a time

use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::backend::error::BackendError;
use crate::backend::{AnthropicBackend, Backend, ChatRequest, CompletionRequest, OpenAiBackend};
use crate::config::{BackendKind, Config};

#[derive(Default)]
struct Inner {
    backends: IndexMap<String, Arc<dyn Backend>>,
    selected: Option<String>,
}

/// Holds the available backends and forwards calls to the selected one.
///
/// The backend handle is cloned out of the lock before it is called, so a
/// slow backend never blocks registration or selection.
#[derive(Default)]
pub struct BackendRegistry {
    inner: RwLock<Inner>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every backend that has an API key and selects the configured
    /// handler.
    pub fn from_config(config: &Config) -> Result<Self, BackendError> {
        let registry = Self::new();
        let timeout = config.fetch_timeout();

        if let Some(key) = config.openai_key.as_deref().filter(|k| !k.is_empty()) {
            let backend = OpenAiBackend::new(
                &config.openai_endpoint,
                key,
                &config.openai_model,
                &config.openai_model_for_chat,
                timeout,
            )?;
            registry.register(BackendKind::Openai.name(), Arc::new(backend));
        }

        if let Some(key) = config.anthropic_key.as_deref().filter(|k| !k.is_empty()) {
            let backend = AnthropicBackend::new(
                &config.anthropic_endpoint,
                key,
                &config.anthropic_model,
                &config.anthropic_model_for_chat,
                timeout,
            )?;
            registry.register(BackendKind::Anthropic.name(), Arc::new(backend));
        }

        registry.select(config.handler.name())?;
        Ok(registry)
    }

    /// Stores `backend` under `name`, replacing any previous entry
    pub fn register(&self, name: &str, backend: Arc<dyn Backend>) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.backends.insert(name.to_string(), backend);
        info!("Registered backend {}", name);
    }

    /// Marks `name` as the backend used for subsequent calls
    pub fn select(&self, name: &str) -> Result<(), BackendError> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if !inner.backends.contains_key(name) {
            return Err(BackendError::NotFound(name.to_string()));
        }
        inner.selected = Some(name.to_string());
        info!("Selected backend {}", name);
        Ok(())
    }

    pub fn selected(&self) -> Option<String> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.selected.clone()
    }

    /// Registered names, in registration order
    pub fn names(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.backends.keys().cloned().collect()
    }

    pub fn current(&self) -> Result<Arc<dyn Backend>, BackendError> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let name = inner.selected.as_ref().ok_or(BackendError::NotConfigured)?;
        inner
            .backends
            .get(name)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(name.clone()))
    }

    pub async fn completion(
        &self,
        request: &CompletionRequest,
        file_path: &str,
        language_id: &str,
        count: usize,
    ) -> Result<Vec<String>, BackendError> {
        let backend = self.current()?;
        debug!(file_path, language_id, count, "Requesting completion");
        backend
            .completion(request, file_path, language_id, count)
            .await
    }

    pub async fn chat(
        &self,
        request: &ChatRequest,
        file_path: &str,
        language_id: &str,
    ) -> Result<String, BackendError> {
        let backend = self.current()?;
        debug!(file_path, language_id, "Requesting chat");
        backend.chat(request, file_path, language_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    fn backend_returning(text: &'static str) -> Arc<dyn Backend> {
        let mut mock = MockBackend::new();
        mock.expect_completion()
            .returning(move |_, _, _, _| Ok(vec![text.to_string()]));
        mock.expect_chat()
            .returning(move |_, _, _| Ok(text.to_string()));
        Arc::new(mock)
    }

    #[tokio::test]
    async fn completion_without_selection_is_not_configured() {
        let registry = BackendRegistry::new();
        registry.register("openai", backend_returning("a"));

        let result = registry
            .completion(&CompletionRequest::default(), "file:///a.rs", "rust", 1)
            .await;

        assert!(matches!(result, Err(BackendError::NotConfigured)));
    }

    #[test]
    fn select_unknown_backend_is_not_found() {
        let registry = BackendRegistry::new();

        let result = registry.select("missing");

        assert!(matches!(result, Err(BackendError::NotFound(name)) if name == "missing"));
        assert_eq!(registry.selected(), None);
    }

    #[tokio::test]
    async fn calls_go_to_selected_backend() {
        let registry = BackendRegistry::new();
        registry.register("openai", backend_returning("from openai"));
        registry.register("anthropic", backend_returning("from anthropic"));

        registry.select("anthropic").unwrap();

        let completions = registry
            .completion(&CompletionRequest::default(), "file:///a.rs", "rust", 1)
            .await
            .unwrap();
        let chat = registry
            .chat(&ChatRequest::default(), "file:///a.rs", "rust")
            .await
            .unwrap();
        assert_eq!(completions, vec!["from anthropic".to_string()]);
        assert_eq!(chat, "from anthropic");
    }

    #[tokio::test]
    async fn register_overwrites_existing_entry() {
        let registry = BackendRegistry::new();
        registry.register("openai", backend_returning("old"));
        registry.register("openai", backend_returning("new"));
        registry.select("openai").unwrap();

        let chat = registry
            .chat(&ChatRequest::default(), "file:///a.rs", "rust")
            .await
            .unwrap();

        assert_eq!(chat, "new");
        assert_eq!(registry.names(), vec!["openai".to_string()]);
    }

    #[tokio::test]
    async fn completion_forwards_arguments() {
        let mut mock = MockBackend::new();
        mock.expect_completion()
            .withf(|request, file_path, language_id, count| {
                request.content_before == "fn main() {"
                    && file_path.to_string() == "file:///main.rs"
                    && language_id.to_string() == "rust"
                    && *count == 2
            })
            .times(1)
            .returning(|_, _, _, _| Ok(vec!["}".to_string()]));

        let registry = BackendRegistry::new();
        registry.register("mock", Arc::new(mock));
        registry.select("mock").unwrap();

        let request = CompletionRequest {
            content_before: "fn main() {".to_string(),
            content_after: String::new(),
            deadline: None,
        };
        let result = registry
            .completion(&request, "file:///main.rs", "rust", 2)
            .await
            .unwrap();

        assert_eq!(result, vec!["}".to_string()]);
    }

    #[test]
    fn from_config_registers_backends_with_keys() {
        let config = Config {
            handler: BackendKind::Anthropic,
            openai_key: Some(String::new()),
            anthropic_key: Some("sk-ant".to_string()),
            ..Config::default()
        };

        let registry = BackendRegistry::from_config(&config).unwrap();

        assert_eq!(registry.names(), vec!["anthropic".to_string()]);
        assert_eq!(registry.selected().as_deref(), Some("anthropic"));
    }

    #[test]
    fn from_config_fails_when_handler_has_no_backend() {
        let config = Config {
            handler: BackendKind::Openai,
            anthropic_key: Some("sk-ant".to_string()),
            ..Config::default()
        };

        let result = BackendRegistry::from_config(&config);

        assert!(matches!(result, Err(BackendError::NotFound(name)) if name == "openai"));
    }

    #[test]
    fn names_keep_registration_order() {
        let registry = BackendRegistry::new();
        registry.register("openai", backend_returning("a"));
        registry.register("anthropic", backend_returning("b"));

        assert_eq!(
            registry.names(),
            vec!["openai".to_string(), "anthropic".to_string()]
        );
    }
}
