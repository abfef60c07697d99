/// A change of the frontmost (activated) application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontmostEvent {
    /// Process id of the newly frontmost application, -1 when unknown.
    pub pid: i32,
    /// Localized name or bundle identifier, whichever resolves first.
    pub app: String,
}
