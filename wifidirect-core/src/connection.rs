//! Connection controller. Owns the group/link resource for the whole session and
//! makes sure it is torn down exactly once.

use tracing::debug;

use crate::device::{Device, Passphrase};
use crate::transport::{HostingRequest, TransportCommand};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Link {
    Closed,
    /// Hosting a group, waiting for a client.
    Group { advertising: bool },
    /// Outbound attempt in flight.
    Pending { target: Device },
    /// Link up. Hosts may not know the client's identity.
    Active {
        peer: Option<Device>,
        advertising: bool,
    },
}

#[derive(Debug)]
pub struct ConnectionController {
    link: Link,
    teardowns: u64,
}

impl Default for ConnectionController {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionController {
    pub fn new() -> Self {
        Self {
            link: Link::Closed,
            teardowns: 0,
        }
    }

    pub fn host(&mut self, request: HostingRequest) -> TransportCommand {
        self.link = Link::Group { advertising: true };
        TransportCommand::StartHosting(request)
    }

    /// Withdraw the advertised service. Returns None if nothing is advertised.
    pub fn withdraw_service(&mut self) -> Option<TransportCommand> {
        match &mut self.link {
            Link::Group { advertising } | Link::Active { advertising, .. } if *advertising => {
                *advertising = false;
                Some(TransportCommand::RemoveService)
            }
            _ => None,
        }
    }

    pub fn connect(&mut self, target: Device, passphrase: Passphrase) -> TransportCommand {
        let address = target.address.clone();
        self.link = Link::Pending { target };
        TransportCommand::Connect {
            address,
            passphrase,
        }
    }

    /// Abandon the pending attempt. Returns None if no attempt is pending.
    pub fn cancel(&mut self) -> Option<TransportCommand> {
        match self.link {
            Link::Pending { .. } => {
                self.link = Link::Closed;
                Some(TransportCommand::CancelConnect)
            }
            _ => None,
        }
    }

    /// The pending attempt failed. Returns the device that was targeted.
    pub fn fail(&mut self) -> Option<Device> {
        match std::mem::replace(&mut self.link, Link::Closed) {
            Link::Pending { target } => Some(target),
            other => {
                self.link = other;
                None
            }
        }
    }

    /// Client side: the pending attempt succeeded.
    pub fn establish(&mut self, reported: Option<Device>) -> Option<Device> {
        let peer = match std::mem::replace(&mut self.link, Link::Closed) {
            Link::Pending { target } => Some(reported.unwrap_or(target)),
            _ => reported,
        };
        self.link = Link::Active {
            peer: peer.clone(),
            advertising: false,
        };
        peer
    }

    /// Host side: a client joined the group. Returns `RemoveService` so the host
    /// stops advertising once it has its single peer.
    pub fn accept_client(&mut self, peer: Option<Device>) -> Option<TransportCommand> {
        let advertising = matches!(self.link, Link::Group { advertising: true });
        self.link = Link::Active {
            peer,
            advertising: false,
        };
        advertising.then_some(TransportCommand::RemoveService)
    }

    /// Close the group/link. Returns the commands needed, empty if already closed.
    pub fn teardown(&mut self) -> Vec<TransportCommand> {
        let mut commands = Vec::new();
        match std::mem::replace(&mut self.link, Link::Closed) {
            Link::Closed => {
                debug!("link already closed");
                return commands;
            }
            Link::Group { advertising } | Link::Active { advertising, .. } => {
                if advertising {
                    commands.push(TransportCommand::RemoveService);
                }
            }
            Link::Pending { .. } => commands.push(TransportCommand::CancelConnect),
        }
        commands.push(TransportCommand::Disconnect);
        self.teardowns += 1;
        commands
    }

    pub fn pending(&self) -> Option<&Device> {
        match &self.link {
            Link::Pending { target } => Some(target),
            _ => None,
        }
    }

    pub fn peer(&self) -> Option<&Device> {
        match &self.link {
            Link::Active { peer, .. } => peer.as_ref(),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.link != Link::Closed
    }

    pub fn is_advertising(&self) -> bool {
        matches!(
            self.link,
            Link::Group { advertising: true } | Link::Active { advertising: true, .. }
        )
    }

    /// Number of times a live link was torn down.
    pub fn teardowns(&self) -> u64 {
        self.teardowns
    }
}
