#[derive(Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// The only error surfaced synchronously to callers: there is no signed-in
    /// user, so the operation cannot even be staged locally.
    #[error("no user is currently signed in")]
    NotAuthenticated,

    /// Network or server failure. Background flows log and absorb this so a
    /// transient blip never undoes an otherwise-successful optimistic write.
    #[error("remote store unavailable: {0}")]
    RemoteUnavailable(String),

    /// The unread-counts endpoint answered with an unexpected shape. Carries
    /// zero information; reconciliation continues without it.
    #[error("malformed server payload: {0}")]
    MalformedPayload(String),
}
