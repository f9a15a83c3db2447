use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    Success,
    Error,
    Warning,
    Info,
}

/// A yes/no question for the user. Presenting it is the display layer's
/// job; the answer comes back through the owning component, e.g.
/// [`crate::editor::Editor::resolve_draft_recovery`], exactly once.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub title: String,
    pub message: String,
}

/// Seam between the editor core and whatever surface shows notifications.
/// The core never draws; it hands the display layer these requests.
pub trait Notifier: Send + Sync {
    fn toast(&self, kind: ToastKind, message: &str);
    fn confirm(&self, request: ConfirmRequest);
}

/// Fallback notifier that writes to stderr. Useful for headless embedders
/// and as the default until a real surface attaches.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn toast(&self, kind: ToastKind, message: &str) {
        eprintln!("[editor] toast {kind:?}: {message}");
    }

    fn confirm(&self, request: ConfirmRequest) {
        eprintln!("[editor] confirm requested: {}", request.title);
    }
}
