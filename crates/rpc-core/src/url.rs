//! Transport URL formatting.
//!
//! Grounded on `dao.common.rpc_driver.base.build_url`: substitute `{ip}`
//! and `{port}` into the configured pattern, dropping the port suffix
//! entirely when no port is given.

/// Format `ip`/`port` into a transport URL using `pattern`.
///
/// `pattern` must contain a `{ip}` token and may contain a `{port}`
/// token. When `port` is `None`, everything from the last `:` onward in
/// the formatted string is truncated (so `tcp://{ip}:{port}` becomes
/// `tcp://10.0.0.1` rather than `tcp://10.0.0.1:`).
pub fn build_url(pattern: &str, ip: &str, port: Option<u16>) -> String {
    let with_ip = pattern.replace("{ip}", ip);
    match port {
        Some(p) => with_ip.replace("{port}", &p.to_string()),
        None => match with_ip.rfind(':') {
            Some(idx) => with_ip[..idx].to_string(),
            None => with_ip,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_ip_and_port() {
        assert_eq!(
            build_url("tcp://{ip}:{port}", "127.0.0.1", Some(5555)),
            "tcp://127.0.0.1:5555"
        );
    }

    #[test]
    fn strips_trailing_colon_without_port() {
        assert_eq!(
            build_url("tcp://{ip}:{port}", "127.0.0.1", None),
            "tcp://127.0.0.1"
        );
    }

    #[test]
    fn custom_pattern_without_port_token() {
        // `rfind(':')` truncates at the *first* colon from the right
        // that it finds, including the one inside `"ipc://"` itself when
        // there's no later `{port}` colon to take precedence — faithful
        // to the original's unconditional `rsplit(':', 1)[0]`.
        assert_eq!(build_url("ipc://{ip}", "my-host", None), "ipc");
    }

    proptest::proptest! {
        #[test]
        fn with_port_never_truncates(ip in "[a-z0-9.]{1,20}", port in 1u16..=65535) {
            let url = build_url("tcp://{ip}:{port}", &ip, Some(port));
            proptest::prop_assert!(url.ends_with(&port.to_string()));
        }

        #[test]
        fn without_port_has_no_trailing_colon(ip in "[a-z0-9.]{1,20}") {
            let url = build_url("tcp://{ip}:{port}", &ip, None);
            proptest::prop_assert!(!url.ends_with(':'));
        }
    }
}
