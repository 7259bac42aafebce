use super::*;

use std::thread;

use cdr_bulk::Operation;
use serde_json::json;

fn config(ssl: Option<&str>) -> KafkaConfig {
    KafkaConfig {
        topic: "cdr".into(),
        brokers: Some("k1:9092,k2:9092".into()),
        ssl_keys_path: ssl.map(PathBuf::from),
        flush_timeout: Duration::from_secs(1),
    }
}

#[test]
fn plain_client_config() {
    let client = config(None).client_config();

    assert_eq!(client.get("bootstrap.servers"), Some("k1:9092,k2:9092"));
    assert_eq!(client.get("compression.type"), Some("gzip"));
    assert_eq!(client.get("message.max.bytes"), Some("10485760"));
    assert_eq!(client.get("security.protocol"), None);
}

#[test]
fn ssl_keys_path_enables_ssl() {
    let client = config(Some("/etc/keys")).client_config();

    assert_eq!(client.get("security.protocol"), Some("ssl"));
    assert_eq!(client.get("ssl.ca.location"), Some("/etc/keys/ca-cert.pem"));
    assert_eq!(client.get("ssl.certificate.location"), Some("/etc/keys/client-cert.pem"));
    assert_eq!(client.get("ssl.key.location"), Some("/etc/keys/client-key.pem"));
}

#[test]
fn message_value_restores_id_first() {
    let mut payload = Map::new();
    payload.insert("url".into(), json!("http://example.com"));
    payload.insert("timestamp_index".into(), json!("t"));
    let action = Action::new(Operation::Index, "cdr", None, "ABC", payload);

    let value = message_value(&action);
    let keys: Vec<_> = value.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["_id", "url", "timestamp_index"]);
    assert_eq!(value["_id"], json!("ABC"));
}

#[test]
fn reports_arriving_after_flush_are_collected() {
    let (tx, rx) = channel::unbounded();
    let mut outcomes = vec![None; 3];
    tx.send((1, Ok(()))).expect("send");

    // Another producer thread delivers the rest a little later.
    let late = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        tx.send((0, Err("broker down".to_string()))).expect("send");
        tx.send((2, Ok(()))).expect("send");
    });

    await_reports(&rx, &mut outcomes, Instant::now() + Duration::from_secs(5));
    late.join().expect("sender thread");

    assert_eq!(
        outcomes,
        vec![Some(Err("broker down".to_string())), Some(Ok(())), Some(Ok(()))]
    );
}

#[test]
fn missing_reports_give_up_at_the_deadline() {
    let (tx, rx) = channel::unbounded::<DeliveryReport>();
    let mut outcomes = vec![None, None];
    tx.send((0, Ok(()))).expect("send");

    let started = Instant::now();
    await_reports(&rx, &mut outcomes, started + Duration::from_millis(100));

    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(outcomes, vec![Some(Ok(())), None]);
    drop(tx);
}
