use std::future::Future;
use std::net::{IpAddr, SocketAddr};

use membership_slack::SlackWebhookState;
use shared::error::CommonError;
use tracing::info;

use crate::router::initiate_routers;

/// How long in-flight requests may run once shutdown starts
const GRACEFUL_SHUTDOWN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

pub struct StartAxumServerParams {
    pub host: String,
    pub port: u16,
    pub system_shutdown_signal_rx: tokio::sync::broadcast::Receiver<()>,
    pub state: SlackWebhookState,
}

/// Binds the webhook server and returns its future together with the handle
/// used to stop it
pub fn start_axum_server(
    params: StartAxumServerParams,
) -> Result<
    (
        impl Future<Output = Result<(), std::io::Error>>,
        axum_server::Handle,
        SocketAddr,
    ),
    CommonError,
> {
    let mut system_shutdown_signal_rx = params.system_shutdown_signal_rx;
    let addr = bind_address(&params.host, params.port)?;

    info!("Starting server on {}", addr);

    let handle = axum_server::Handle::new();
    let router = initiate_routers(params.state);

    info!("Router initiated");

    let server_fut = axum_server::bind(addr)
        .handle(handle.clone())
        .serve(router.into_make_service());

    let handle_clone = handle.clone();

    tokio::spawn(async move {
        let _ = system_shutdown_signal_rx.recv().await;

        info!("Shutting down axum server, waiting for in-flight requests to complete...");

        handle_clone.graceful_shutdown(Some(GRACEFUL_SHUTDOWN_TIMEOUT));
    });

    Ok((server_fut, handle, addr))
}

fn bind_address(host: &str, port: u16) -> Result<SocketAddr, CommonError> {
    let ip: IpAddr = host
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse()?;
    Ok(SocketAddr::new(ip, port))
}

#[cfg(test)]
mod tests {
    mod unit {
        use std::sync::Arc;
        use std::time::Duration;

        use membership::{MembershipConfig, MembershipProcessor};
        use membership_slack::{SignatureVerifier, SlackClient};

        use super::super::*;

        fn test_state() -> SlackWebhookState {
            let client = Arc::new(SlackClient::with_base_url(
                "xoxb-test".to_string(),
                "http://127.0.0.1:9/api".to_string(),
            ));
            SlackWebhookState::new(
                Arc::new(MembershipProcessor::new(MembershipConfig::new("C1"), client)),
                SignatureVerifier::new("secret"),
            )
        }

        #[test]
        fn test_bind_address() {
            assert_eq!(
                bind_address("0.0.0.0", 10000).unwrap(),
                "0.0.0.0:10000".parse::<SocketAddr>().unwrap()
            );
            assert_eq!(
                bind_address("[::1]", 8080).unwrap(),
                "[::1]:8080".parse::<SocketAddr>().unwrap()
            );
            assert!(matches!(
                bind_address("localhost-ish", 80),
                Err(CommonError::AddrParseError { .. })
            ));
        }

        #[tokio::test]
        async fn test_server_stops_on_shutdown_signal() {
            let (tx, rx) = tokio::sync::broadcast::channel(1);
            let (server_fut, handle, _) = start_axum_server(StartAxumServerParams {
                host: "127.0.0.1".to_string(),
                port: 0,
                system_shutdown_signal_rx: rx,
                state: test_state(),
            })
            .unwrap();

            let server = tokio::spawn(server_fut);
            let bound = handle.listening().await.expect("server did not bind");
            assert_ne!(bound.port(), 0);

            tx.send(()).unwrap();
            let result = tokio::time::timeout(Duration::from_secs(5), server)
                .await
                .expect("server did not shut down")
                .unwrap();
            assert!(result.is_ok());
        }
    }
}
