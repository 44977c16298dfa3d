use pulsehub::client::HubClient;
use pulsehub::config::{HubConfig, ListenConfig, SchedulerConfig};
use pulsehub::device::SimulatedActuator;
use pulsehub::engine::ClientRegistry;
use pulsehub::hub::Hub;
use pulsehub::request::{Request, RequestCommand, RequestType};
use chrono::Utc;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

async fn start_hub() -> (String, Arc<ClientRegistry>) {
    let config = HubConfig {
        listen: ListenConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        scheduler: SchedulerConfig::default(),
    };
    let hub = Hub::bind(&config).await.unwrap();
    let addr = hub.local_addr().unwrap().to_string();
    let registry = hub.registry();
    tokio::spawn(hub.run());
    (addr, registry)
}

/// A request old enough that its deadline has already passed, so the
/// scheduler dispatches it on the next check.
fn overdue_request(command: RequestCommand, request_type: RequestType, data: &str) -> Request {
    let mut request = Request::new(request_type, command, data);
    request.timestamp = Utc::now().timestamp_millis() as f64 - 5000.0;
    request
}

#[tokio::test]
async fn sensor_events_reach_the_client_engine() {
    let (addr, registry) = start_hub().await;

    let mut stream = TcpStream::connect(&addr).await.unwrap();
    stream
        .write_all(b"SensorEvent{,1000,9,3,TempSensor,21.5,}\n")
        .await
        .unwrap();
    stream
        .write_all(b"SensorEvent{,2000,9,3,TempSensor,22.0,}\n")
        .await
        .unwrap();
    sleep(Duration::from_millis(300)).await;

    let engine = registry.get(9).expect("engine created for client 9");
    let events = engine.last_n_events(10);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].timestamp(), 1000.0);
    assert_eq!(events[1].timestamp(), 2000.0);
}

#[tokio::test]
async fn overdue_request_is_answered_with_one_line() {
    let (addr, _registry) = start_hub().await;

    let mut stream = TcpStream::connect(&addr).await.unwrap();
    stream
        .write_all(b"SensorEvent{,1000,5,3,TempSensor,21.5,}\n")
        .await
        .unwrap();
    sleep(Duration::from_millis(200)).await;

    let mut client = HubClient::connect(5, &addr).await.unwrap();
    client
        .send_request(overdue_request(
            RequestCommand::AnalysisGetAllEntities,
            RequestType::Analysis,
            "",
        ))
        .await
        .unwrap();

    let response = timeout(Duration::from_secs(2), client.read_response())
        .await
        .expect("response before timeout")
        .unwrap()
        .expect("connection stays open");
    assert!(response.contains("These are all the entities"));
    assert!(response.contains('3'));
}

#[tokio::test]
async fn config_request_updates_client_max_wait() {
    let (addr, registry) = start_hub().await;

    let mut client = HubClient::connect(11, &addr).await.unwrap();
    client
        .send_request(overdue_request(
            RequestCommand::ConfigUpdateMaxWaitTime,
            RequestType::Config,
            "1",
        ))
        .await
        .unwrap();

    let response = timeout(Duration::from_secs(2), client.read_response())
        .await
        .expect("response before timeout")
        .unwrap()
        .unwrap();
    assert!(response.contains("max wait time updated to 1s"));
    assert_eq!(registry.get(11).unwrap().max_wait_seconds(), 1.0);
}

#[tokio::test]
async fn fresh_request_waits_for_its_deadline() {
    let (addr, _registry) = start_hub().await;

    let mut client = HubClient::connect(12, &addr).await.unwrap();
    // Stamped now: with the default 2s max wait it must not fire inside
    // the first few hundred milliseconds.
    client
        .send_request(Request::new(
            RequestType::Analysis,
            RequestCommand::AnalysisGetMostActiveEntity,
            "",
        ))
        .await
        .unwrap();

    assert!(
        timeout(Duration::from_millis(500), client.read_response())
            .await
            .is_err()
    );
    let response = timeout(Duration::from_secs(3), client.read_response())
        .await
        .expect("response after the deadline")
        .unwrap()
        .unwrap();
    assert!(response.contains("The most active entity was"));
}

#[tokio::test]
async fn one_connection_serves_multiple_client_ids() {
    let (addr, _registry) = start_hub().await;

    let mut client = HubClient::connect(21, &addr).await.unwrap();
    client
        .send_request(overdue_request(
            RequestCommand::AnalysisGetMostActiveEntity,
            RequestType::Analysis,
            "",
        ))
        .await
        .unwrap();
    let mut second = overdue_request(
        RequestCommand::AnalysisGetMostActiveEntity,
        RequestType::Analysis,
        "",
    );
    second.client_id = 22;
    client.send_request(second).await.unwrap();

    for _ in 0..2 {
        let response = timeout(Duration::from_secs(2), client.read_response())
            .await
            .expect("response before timeout")
            .unwrap()
            .expect("connection stays open");
        assert!(response.contains("The most active entity was"));
    }
}

#[tokio::test]
async fn unattributed_requests_are_dropped() {
    let (addr, registry) = start_hub().await;

    let mut stream = TcpStream::connect(&addr).await.unwrap();
    let line = format!(
        "Request{{,-1,{},ANALYSIS,ANALYSIS_GET_ALL_ENTITIES,,}}\n",
        Utc::now().timestamp_millis() as f64 - 5000.0
    );
    stream.write_all(line.as_bytes()).await.unwrap();
    sleep(Duration::from_millis(300)).await;

    assert!(registry.is_empty());
}

#[tokio::test]
async fn malformed_lines_do_not_kill_the_connection() {
    let (addr, registry) = start_hub().await;

    let mut stream = TcpStream::connect(&addr).await.unwrap();
    stream.write_all(b"garbage that is not a message\n").await.unwrap();
    stream
        .write_all(b"SensorEvent{,1000,6,2,TempSensor,19.0,}\n")
        .await
        .unwrap();
    sleep(Duration::from_millis(300)).await;

    let engine = registry.get(6).expect("later lines still processed");
    assert_eq!(engine.last_n_events(10).len(), 1);
}

#[tokio::test]
async fn actuator_receives_set_state_command() {
    let (addr, _registry) = start_hub().await;

    let actuator = SimulatedActuator::new(7, 42, "Switch", false);
    let state = actuator.state_handle();
    {
        let addr = addr.clone();
        tokio::spawn(async move {
            let _ = actuator.run(&addr, Duration::from_millis(100)).await;
        });
    }
    // Let registration land and a few state events accumulate.
    sleep(Duration::from_millis(400)).await;

    let mut client = HubClient::connect(7, &addr).await.unwrap();
    client
        .send_request(overdue_request(
            RequestCommand::ControlSetActuatorState,
            RequestType::Control,
            "42#DoubleFilter{,timestamp,GREATER_THAN,-1,}",
        ))
        .await
        .unwrap();

    let response = timeout(Duration::from_secs(2), client.read_response())
        .await
        .expect("response before timeout")
        .unwrap()
        .unwrap();
    assert!(response.contains("actuator 42 state set to true"));

    // The command travels over the reverse connection; poll for the flip.
    let mut flipped = false;
    for _ in 0..20 {
        if state.load(Ordering::SeqCst) {
            flipped = true;
            break;
        }
        sleep(Duration::from_millis(100)).await;
    }
    assert!(flipped, "actuator device never applied the command");
}
