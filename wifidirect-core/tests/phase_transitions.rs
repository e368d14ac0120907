//! Random command and event sequences against `SessionManager`: the phase only
//! moves along legal edges, and rejected commands never move it.

use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use wifidirect_core::{
    Device, DeviceAddress, PlatformEvent, PlatformReason, SessionConfig, SessionError,
    SessionManager, SessionPhase, TransportError, TransportErrorKind,
};

use SessionPhase::*;

const LEGAL: &[(SessionPhase, SessionPhase)] = &[
    (Idle, Hosting),
    (Idle, Discovering),
    (Discovering, Idle),
    (Discovering, Connecting),
    (Connecting, Connected),
    (Connecting, Discovering),
    (Connecting, Idle),
    // A client joining the hosted group.
    (Hosting, Connected),
    (Hosting, Disconnecting),
    (Connected, Disconnecting),
    (Disconnecting, Idle),
];

const KINDS: [TransportErrorKind; 10] = [
    TransportErrorKind::GroupCreation,
    TransportErrorKind::ServiceRequest,
    TransportErrorKind::ServiceRegistration,
    TransportErrorKind::Discovery,
    TransportErrorKind::Connection,
    TransportErrorKind::SocketConnection,
    TransportErrorKind::ServerSocket,
    TransportErrorKind::Send,
    TransportErrorKind::Receive,
    TransportErrorKind::UnhandledAction,
];

fn device(addr: &str) -> Device {
    Device::new(DeviceAddress::parse(addr).unwrap(), addr)
}

fn command(m: &mut SessionManager, rng: &mut StdRng) -> Result<(), SessionError> {
    let address = ["AA:BB", "CC:DD", "EE:FF"][rng.gen_range(0..3)];
    let passphrase = ["ABCD1234", "short"][rng.gen_range(0..2)];
    let result = match rng.gen_range(0..11) {
        0 => m.create_discoverable_server(passphrase),
        1 => m.remove_service(),
        2 => m.remove_group(),
        3 => m.discover_services(),
        4 => m.discover_peers(),
        5 => m.cancel_discovery(),
        6 => m.connect(address, passphrase),
        7 => m.cancel_connect(),
        8 => m.disconnect(),
        9 => m.send(b"ping"),
        _ => m.discover_default(),
    };
    result.map(|_| ())
}

fn event(rng: &mut StdRng, service_name: &str) -> PlatformEvent {
    let addr = ["AA:BB", "CC:DD"][rng.gen_range(0..2)];
    match rng.gen_range(0..12) {
        0 => PlatformEvent::ServiceFound {
            instance_name: service_name.to_string(),
            device: device(addr),
        },
        1 => PlatformEvent::PeersFound(vec![device(addr)]),
        2 => PlatformEvent::PeerLost(DeviceAddress::parse(addr).unwrap()),
        3 => PlatformEvent::Connected { peer: None },
        4 => PlatformEvent::Connected {
            peer: Some(device(addr)),
        },
        5 => PlatformEvent::Disconnected,
        6 => PlatformEvent::ConnectionLost,
        7 => PlatformEvent::DiscoveryStopped,
        8 => PlatformEvent::ServiceRegistered,
        9 => PlatformEvent::MessageReceived(vec![0, 1]),
        10 => PlatformEvent::RadioChanged {
            enabled: rng.gen(),
        },
        _ => PlatformEvent::Failed(TransportError::new(
            KINDS[rng.gen_range(0..KINDS.len())],
            PlatformReason::BUSY,
        )),
    }
}

#[test]
fn random_sequences_follow_legal_transitions() {
    for seed in 0..64u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut m = SessionManager::new(SessionConfig::default());
        let service_name = m.config().service_name.clone();
        let changes = Rc::new(RefCell::new(Vec::new()));
        let c = changes.clone();
        m.listeners()
            .on_phase(move |change| c.borrow_mut().push((change.from, change.to)));

        for step in 0..500 {
            if rng.gen_bool(0.5) {
                let before = m.phase();
                let recorded = changes.borrow().len();
                if let Err(e) = command(&mut m, &mut rng) {
                    assert_eq!(m.phase(), before, "seed {seed} step {step}: {e}");
                    assert_eq!(changes.borrow().len(), recorded, "seed {seed} step {step}");
                }
            } else {
                m.handle_platform_event(event(&mut rng, &service_name));
            }
            assert!(
                !(m.is_hosting() && m.is_discovering()),
                "seed {seed} step {step}: hosting while discovering"
            );
        }

        for &(from, to) in changes.borrow().iter() {
            assert!(
                LEGAL.contains(&(from, to)),
                "seed {seed}: illegal transition {from:?} -> {to:?}"
            );
        }
    }
}

#[test]
fn illegal_commands_report_invalid_state() {
    let mut m = SessionManager::new(SessionConfig::default());
    m.create_discoverable_server("ABCD1234").unwrap();
    for result in [
        m.discover_services(),
        m.cancel_discovery(),
        m.connect("AA:BB", "ABCD1234"),
        m.cancel_connect(),
    ] {
        assert!(matches!(result, Err(SessionError::InvalidState { .. })));
        assert_eq!(m.phase(), Hosting);
    }
}
