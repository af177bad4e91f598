/// The transport whose URIs need an explicit listener mode.
pub const LISTENER_MODE_PROTOCOL: &str = "srt";

/// Formats the URI an encoder listens on.
///
/// The protocol is used verbatim; validating it is up to the caller.
pub fn listen_resource(protocol: &str, host: &str, port: u16) -> String {
    if protocol == LISTENER_MODE_PROTOCOL {
        format!("{protocol}://{host}:{port}?mode=listener")
    } else {
        format!("{protocol}://{host}:{port}")
    }
}
