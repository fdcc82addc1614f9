// Serial module - serialport-backed transport
use crate::core::transport::{Transport, TransportEvent, TransportKind};
use crate::domain::config::{FlowControlConfig, ParityConfig, TransportConfig};
use crate::domain::error::{TermLineError, TermLineResult};
use async_trait::async_trait;
use serialport::SerialPort;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info};

/// Serial port transport.
///
/// The blocking `serialport` handle is driven from background tasks with a
/// short read timeout, the same way the rest of the crate treats sockets.
pub struct SerialTransport {
    config: TransportConfig,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    inbound: Arc<Mutex<Vec<u8>>>,
    writer: Option<mpsc::UnboundedSender<Vec<u8>>>,
    tasks: Vec<tokio::task::JoinHandle<()>>,
    started: bool,
}

impl SerialTransport {
    pub fn new(config: TransportConfig, event_tx: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            config,
            event_tx,
            inbound: Arc::new(Mutex::new(Vec::new())),
            writer: None,
            tasks: Vec::new(),
            started: false,
        }
    }

    fn open_port(&self) -> TermLineResult<Box<dyn SerialPort>> {
        let (port, baud_rate, data_bits, stop_bits, parity, flow_control) = match &self.config {
            TransportConfig::Serial {
                port,
                baud_rate,
                data_bits,
                stop_bits,
                parity,
                flow_control,
            } => (port, *baud_rate, *data_bits, *stop_bits, parity, flow_control),
            _ => {
                return Err(TermLineError::Transport {
                    message: "Invalid configuration for serial transport".to_string(),
                })
            }
        };

        let mut builder = serialport::new(port, baud_rate);

        builder = builder.data_bits(match data_bits {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            8 => serialport::DataBits::Eight,
            _ => {
                return Err(TermLineError::Transport {
                    message: format!("Invalid data bits: {}", data_bits),
                })
            }
        });

        builder = builder.stop_bits(match stop_bits {
            1 => serialport::StopBits::One,
            2 => serialport::StopBits::Two,
            _ => {
                return Err(TermLineError::Transport {
                    message: format!("Invalid stop bits: {}", stop_bits),
                })
            }
        });

        builder = builder.parity(match parity {
            ParityConfig::None => serialport::Parity::None,
            ParityConfig::Even => serialport::Parity::Even,
            ParityConfig::Odd => serialport::Parity::Odd,
        });

        builder = builder.flow_control(match flow_control {
            FlowControlConfig::None => serialport::FlowControl::None,
            FlowControlConfig::Software => serialport::FlowControl::Software,
            FlowControlConfig::Hardware => serialport::FlowControl::Hardware,
        });

        builder = builder.timeout(Duration::from_millis(100));

        builder.open().map_err(|e| TermLineError::Transport {
            message: format!("Failed to open serial port: {}", e),
        })
    }
}

#[async_trait]
impl Transport for SerialTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Serial
    }

    async fn start(&mut self) -> TermLineResult<()> {
        if self.started {
            return Err(TermLineError::Transport {
                message: "Serial transport is already started".to_string(),
            });
        }

        let port = self.open_port()?;
        info!("Serial port opened");

        let port: Arc<Mutex<Box<dyn SerialPort>>> = Arc::new(Mutex::new(port));
        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<Vec<u8>>();

        // TX task
        let port_tx = Arc::clone(&port);
        let event_tx = self.event_tx.clone();
        self.tasks.push(tokio::spawn(async move {
            while let Some(data) = writer_rx.recv().await {
                let mut port = port_tx.lock().await;
                match port.write_all(&data) {
                    Ok(_) => debug!("Sent {} bytes over serial", data.len()),
                    Err(e) => {
                        error!("Failed to write to serial port: {}", e);
                        let _ = event_tx
                            .send(TransportEvent::Error(format!("Serial write failed: {}", e)));
                    }
                }
            }
        }));

        // RX task - short-timeout polling reads
        let port_rx = Arc::clone(&port);
        let inbound = Arc::clone(&self.inbound);
        let event_tx = self.event_tx.clone();
        self.tasks.push(tokio::spawn(async move {
            let mut buffer = vec![0u8; 1024];
            loop {
                tokio::time::sleep(Duration::from_millis(10)).await;

                let mut port = port_rx.lock().await;
                match port.read(&mut buffer) {
                    Ok(0) => continue,
                    Ok(n) => {
                        debug!("Received {} bytes over serial", n);
                        drop(port);
                        inbound.lock().await.extend_from_slice(&buffer[..n]);
                        let _ = event_tx.send(TransportEvent::DataReceived);
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                    Err(e) => {
                        error!("Failed to read from serial port: {}", e);
                        let _ = event_tx
                            .send(TransportEvent::Error(format!("Serial read failed: {}", e)));
                        let _ = event_tx.send(TransportEvent::ControlChanged);
                        break;
                    }
                }
            }
        }));

        self.writer = Some(writer_tx);
        self.started = true;
        let _ = self.event_tx.send(TransportEvent::Changed);
        Ok(())
    }

    async fn stop(&mut self) -> TermLineResult<()> {
        if !self.started {
            return Ok(());
        }
        self.started = false;
        self.writer = None;
        for task in self.tasks.drain(..) {
            task.abort();
        }
        let _ = self.event_tx.send(TransportEvent::Changed);
        info!("Serial transport stopped");
        Ok(())
    }

    async fn send(&self, data: Vec<u8>) -> TermLineResult<()> {
        let writer = self.writer.as_ref().ok_or(TermLineError::NotConnected)?;
        writer.send(data).map_err(|e| TermLineError::Transport {
            message: format!("Failed to queue data for serial send: {}", e),
        })
    }

    async fn receive(&self) -> Vec<u8> {
        std::mem::take(&mut *self.inbound.lock().await)
    }

    fn has_started(&self) -> bool {
        self.started
    }

    async fn is_connected(&self) -> bool {
        self.started
    }

    async fn bytes_available(&self) -> usize {
        self.inbound.lock().await.len()
    }

    fn underlying(&self) -> &dyn std::any::Any {
        self
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
