// mesh-test-utils: shared test harnesses for the registry and discovery
// client integration suites.

pub mod mock_registry_server;
pub mod raw_client;

pub use mock_registry_server::MockRegistryServer;
pub use raw_client::RawClient;

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_protocol::{GetValueReq, SetValueReq, StatusCode, WireMessage};

    #[tokio::test]
    async fn raw_client_round_trips_a_set_and_get_through_a_mock_registry() {
        let server = MockRegistryServer::start("/tmp/mesh-test-utils-roundtrip.json").await;
        let mut client = RawClient::connect(server.local_addr()).await.unwrap();
        client.authenticate("").await;

        client
            .send(WireMessage::SetValueReq(SetValueReq { key: "k".to_owned(), value: b"v".to_vec() }))
            .await
            .unwrap();
        assert!(matches!(
            client.recv().await.unwrap().unwrap(),
            WireMessage::ValueChangeNotifyAck(_)
        ));
        assert!(matches!(client.recv().await.unwrap().unwrap(), WireMessage::SetValueAck(_)));

        client.send(WireMessage::GetValueReq(GetValueReq { key: "k".to_owned() })).await.unwrap();
        match client.recv().await.unwrap().unwrap() {
            WireMessage::GetValueAck(ack) => {
                assert_eq!(ack.code, StatusCode::Ok);
                assert_eq!(ack.value.unwrap(), b"v");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn two_raw_clients_can_authenticate_against_the_same_mock_registry() {
        let server = MockRegistryServer::start("/tmp/mesh-test-utils-two-clients.json").await;
        let mut a = RawClient::connect(server.local_addr()).await.unwrap();
        let mut b = RawClient::connect(server.local_addr()).await.unwrap();
        let token_a = a.authenticate("").await;
        let token_b = b.authenticate("").await;
        assert_ne!(token_a, token_b);
    }
}
