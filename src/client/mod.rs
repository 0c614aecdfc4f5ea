use log::info;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;
use thiserror::Error;

use crate::protocol::{ArmSequence, ArmStep, Command};

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to bind command socket on port {port}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to send {command:?} to {target}")]
    Send {
        command: String,
        target: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Anything that can carry a command towards the vehicle
pub trait CommandSink {
    fn send(&mut self, command: &Command) -> Result<(), LinkError>;
}

/// Blocking pause used between arm steps
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// Real wall-clock sleeper
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Fire-and-forget UDP link to the vehicle.
///
/// The socket is bound to a fixed local port because the vehicle answers to the
/// port it heard from; we never read those answers.
pub struct CommandChannel {
    socket: UdpSocket,
    target: SocketAddr,
}

impl CommandChannel {
    /// Bind `0.0.0.0:<local_port>` and aim at `target`
    pub fn bind(local_port: u16, target: SocketAddr) -> Result<Self, LinkError> {
        let local = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, local_port);
        let socket = UdpSocket::bind(local).map_err(|source| LinkError::Bind {
            port: local_port,
            source,
        })?;
        Ok(Self { socket, target })
    }

    #[cfg(test)]
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl CommandSink for CommandChannel {
    fn send(&mut self, command: &Command) -> Result<(), LinkError> {
        info!(">> {}", command);
        self.socket
            .send_to(command.as_bytes(), self.target)
            .map_err(|source| LinkError::Send {
                command: command.to_string(),
                target: self.target,
                source,
            })?;
        Ok(())
    }
}

/// Play the arm sequence through `sink`, pausing with `sleeper`
pub fn arm(
    sink: &mut dyn CommandSink,
    sequence: &ArmSequence,
    sleeper: &mut dyn Sleeper,
) -> Result<(), LinkError> {
    for step in sequence.steps() {
        match step {
            ArmStep::Send(command) => sink.send(command)?,
            ArmStep::Pause(duration) => sleeper.sleep(*duration),
        }
    }
    Ok(())
}
