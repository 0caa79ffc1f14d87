//! Client/server exchanges over a real Unix socket

use headroom_api::{
    ClientRole, Command, ErrorCode, ErrorInfo, Event, EventPayload, Response, ResponsePayload,
    ResponseResult,
};
use headroom_ipc::{IpcClient, IpcError, IpcServer, ServerMessage};
use headroom_util::LoadId;
use std::sync::Arc;
use std::time::Duration;

/// Start a server with a minimal responder: Ping, Subscribe, and a
/// reload that needs the admin role.
async fn serve(dir: &tempfile::TempDir) -> Arc<IpcServer> {
    let mut server = IpcServer::new(dir.path().join("headroomd.sock"));
    server.start().await.unwrap();
    let server = Arc::new(server);
    let mut messages = server.take_message_receiver().await.unwrap();

    let accept = server.clone();
    tokio::spawn(async move {
        let _ = accept.run().await;
    });

    let responder = server.clone();
    tokio::spawn(async move {
        while let Some(msg) = messages.recv().await {
            let ServerMessage::Request { client_id, request } = msg else {
                continue;
            };
            let role = responder
                .get_client_info(&client_id)
                .await
                .map(|i| i.role)
                .unwrap_or(ClientRole::Observer);
            let response = match request.command {
                Command::Ping => Response::success(request.request_id, ResponsePayload::Pong),
                Command::SubscribeEvents => Response::success(
                    request.request_id,
                    ResponsePayload::Subscribed { client_id: client_id.clone() },
                ),
                Command::ReloadConfig if role.can_reload_config() => Response::success(
                    request.request_id,
                    ResponsePayload::ConfigReloaded { load_count: 0 },
                ),
                _ => Response::error(
                    request.request_id,
                    ErrorInfo::new(ErrorCode::PermissionDenied, "Admin role required"),
                ),
            };
            let _ = responder.send_response(&client_id, response).await;
        }
    });

    server
}

#[tokio::test]
async fn ping_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let server = serve(&dir).await;

    let mut client = IpcClient::connect(server.socket_path()).await.unwrap();
    let payload = client.request(Command::Ping).await.unwrap();
    assert!(matches!(payload, ResponsePayload::Pong));

    // Request ids advance per request
    let response = client.send(Command::Ping).await.unwrap();
    assert_eq!(response.request_id, 2);
}

#[tokio::test]
async fn own_uid_is_admin() {
    let dir = tempfile::tempdir().unwrap();
    let server = serve(&dir).await;

    let mut client = IpcClient::connect(server.socket_path()).await.unwrap();
    let response = client.send(Command::ReloadConfig).await.unwrap();
    assert!(matches!(
        response.result,
        ResponseResult::Ok(ResponsePayload::ConfigReloaded { .. })
    ));
}

#[tokio::test]
async fn server_errors_surface_through_request() {
    let dir = tempfile::tempdir().unwrap();
    let server = serve(&dir).await;

    let mut client = IpcClient::connect(server.socket_path()).await.unwrap();
    let result = client.request(Command::GetReport).await;
    assert!(matches!(result, Err(IpcError::ServerError(_))));
}

#[tokio::test]
async fn subscribed_client_receives_events() {
    let dir = tempfile::tempdir().unwrap();
    let server = serve(&dir).await;

    let client = IpcClient::connect(server.socket_path()).await.unwrap();
    let mut events = client.subscribe().await.unwrap();

    server.broadcast_event(Event::new(EventPayload::QuotaRolledOver {
        load_id: LoadId::new("pool-pump"),
        windows: 1,
    }));

    let event = tokio::time::timeout(Duration::from_secs(2), events.next())
        .await
        .unwrap()
        .unwrap();
    match event.payload {
        EventPayload::QuotaRolledOver { load_id, windows } => {
            assert_eq!(load_id.as_str(), "pool-pump");
            assert_eq!(windows, 1);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn disconnect_removes_client() {
    let dir = tempfile::tempdir().unwrap();
    let server = serve(&dir).await;

    let mut client = IpcClient::connect(server.socket_path()).await.unwrap();
    client.request(Command::Ping).await.unwrap();
    assert_eq!(server.client_count().await, 1);

    drop(client);
    for _ in 0..50 {
        if server.client_count().await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(server.client_count().await, 0);
}
