/// End-to-end tests driving two terminals over real loopback transports
use std::time::Duration;
use termline::domain::config::{
    GlobalConfig, LengthLineBreak, LineBreakConfig, TerminalConfig, TerminalMode, TransportConfig,
};
use termline::{Direction, DisplayElement, RepositoryKind, Terminal, TerminalEvent};

fn free_tcp_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn free_udp_port() -> u16 {
    let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap().port()
}

fn terminal_config(transport: TransportConfig) -> TerminalConfig {
    TerminalConfig {
        transport,
        ..Default::default()
    }
}

async fn wait_for_lines(
    terminal: &Terminal,
    direction: Direction,
    count: usize,
    timeout_ms: u64,
) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    while tokio::time::Instant::now() < deadline {
        if terminal.lines(direction).await.len() >= count {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[tokio::test]
    async fn test_text_line_travels_between_tcp_terminals() {
        let port = free_tcp_port();
        let global = GlobalConfig::default();

        let server = Terminal::new(
            &terminal_config(TransportConfig::TcpServer {
                bind: format!("127.0.0.1:{}", port),
            }),
            &global,
        )
        .await;
        server.open().await.unwrap();

        let client = Terminal::new(
            &terminal_config(TransportConfig::TcpClient {
                host: "127.0.0.1".to_string(),
                port,
                connect_timeout_ms: 1000,
            }),
            &global,
        )
        .await;
        client.open().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        client.send(b"A\n".to_vec()).await.unwrap();

        assert!(wait_for_lines(&client, Direction::Tx, 1, 2000).await);
        assert!(wait_for_lines(&server, Direction::Rx, 1, 2000).await);

        // One character plus EOL yields exactly one data element and one
        // terminating break on both sides
        let sent = &client.lines(Direction::Tx).await[0];
        assert_eq!(
            sent.elements,
            vec![
                DisplayElement::TxData("A".to_string()),
                DisplayElement::LineBreak,
            ]
        );

        let received = &server.lines(Direction::Rx).await[0];
        assert_eq!(
            received.elements,
            vec![
                DisplayElement::RxData("A".to_string()),
                DisplayElement::LineBreak,
            ]
        );

        client.dispose().await.unwrap();
        server.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn test_binary_length_break_over_udp() {
        let port_a = free_udp_port();
        let port_b = free_udp_port();
        let global = GlobalConfig::default();

        let mut config_a = terminal_config(TransportConfig::Udp {
            local: format!("127.0.0.1:{}", port_a),
            remote: format!("127.0.0.1:{}", port_b),
        });
        config_a.mode = TerminalMode::Binary;
        config_a.line_break = LineBreakConfig {
            length: LengthLineBreak {
                enabled: true,
                max_length: 4,
            },
            ..Default::default()
        };

        let mut config_b = terminal_config(TransportConfig::Udp {
            local: format!("127.0.0.1:{}", port_b),
            remote: format!("127.0.0.1:{}", port_a),
        });
        config_b.mode = TerminalMode::Binary;
        config_b.line_break = config_a.line_break.clone();

        let sender = Terminal::new(&config_a, &global).await;
        let receiver = Terminal::new(&config_b, &global).await;
        sender.open().await.unwrap();
        receiver.open().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        sender.send(vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]).await.unwrap();

        assert!(wait_for_lines(&sender, Direction::Tx, 2, 2000).await);
        assert!(wait_for_lines(&receiver, Direction::Rx, 2, 2000).await);

        let sent = sender.lines(Direction::Tx).await;
        assert_eq!(sent[0].data_count(), 4);
        assert_eq!(sent[1].data_count(), 4);
        assert_eq!(sent[0].text(), "01 02 03 04");

        let received = receiver.lines(Direction::Rx).await;
        assert_eq!(received[0].data_count(), 4);
        assert_eq!(received[0].text(), "01 02 03 04");

        sender.dispose().await.unwrap();
        receiver.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_repository_resets_line_view() {
        let port_a = free_udp_port();
        let port_b = free_udp_port();
        let global = GlobalConfig::default();

        let terminal = Terminal::new(
            &terminal_config(TransportConfig::Udp {
                local: format!("127.0.0.1:{}", port_a),
                remote: format!("127.0.0.1:{}", port_b),
            }),
            &global,
        )
        .await;
        let mut events = terminal.subscribe().await;
        terminal.open().await.unwrap();

        terminal.send(b"hello\n".to_vec()).await.unwrap();
        assert!(wait_for_lines(&terminal, Direction::Tx, 1, 2000).await);
        assert_eq!(
            terminal
                .repository_to_elements(RepositoryKind::Bidir)
                .await
                .len(),
            1
        );

        terminal.clear_repository(RepositoryKind::Bidir).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(terminal
            .repository_to_elements(RepositoryKind::Bidir)
            .await
            .is_empty());
        assert!(terminal.lines(Direction::Tx).await.is_empty());

        let mut cleared = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, TerminalEvent::RepositoryCleared(RepositoryKind::Bidir)) {
                cleared += 1;
            }
        }
        assert_eq!(cleared, 1);

        terminal.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn test_autosocket_terminals_negotiate_and_exchange() {
        let port = free_tcp_port();
        let global = GlobalConfig::default();
        let transport = TransportConfig::AutoSocket {
            remote_host: "127.0.0.1".to_string(),
            remote_port: port,
            local_bind: format!("127.0.0.1:{}", port),
            retry: Default::default(),
        };

        let first = Terminal::new(&terminal_config(transport.clone()), &global).await;
        first.open().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let second = Terminal::new(&terminal_config(transport), &global).await;
        second.open().await.unwrap();

        // The late starter finds the early one listening and connects
        let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
        while tokio::time::Instant::now() < deadline {
            if first.is_connected().await && second.is_connected().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(first.is_connected().await);
        assert!(second.is_connected().await);

        second.send(b"ping\n".to_vec()).await.unwrap();
        assert!(wait_for_lines(&first, Direction::Rx, 1, 2000).await);
        assert_eq!(first.lines(Direction::Rx).await[0].text(), "ping");

        second.dispose().await.unwrap();
        first.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn test_disposed_terminal_rejects_operations() {
        let port_a = free_udp_port();
        let port_b = free_udp_port();
        let global = GlobalConfig::default();

        let terminal = Terminal::new(
            &terminal_config(TransportConfig::Udp {
                local: format!("127.0.0.1:{}", port_a),
                remote: format!("127.0.0.1:{}", port_b),
            }),
            &global,
        )
        .await;
        terminal.open().await.unwrap();
        terminal.dispose().await.unwrap();

        assert!(terminal.send(b"late".to_vec()).await.is_err());
        assert!(terminal.open().await.is_err());
    }
}
