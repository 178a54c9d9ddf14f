use std::time::Duration;

use clap::ValueEnum;
use mfc_monitor::{Connector, SimConnector, TcpConnector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum InterfaceMode {
    #[default]
    Remote,
    Simulation,
}

impl InterfaceMode {
    pub fn connector(self, timeout: Duration) -> Box<dyn Connector + Send + Sync> {
        match self {
            Self::Remote => Box::new(TcpConnector::new(timeout)),
            Self::Simulation => Box::new(SimConnector::spawning()),
        }
    }
}
